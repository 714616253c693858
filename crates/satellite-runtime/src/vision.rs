//! 视觉循环
//!
//! 按固定周期从链路读取视频帧，交给 `FrameSink`（人脸检测等）。
//! 接收方可以通过 `TrackingFeed` 推送头部跟踪偏移；停止推送时偏移保持最后的值。

use crate::audio::pace;
use crate::error::SatelliteError;
use crate::metrics::LoopMetrics;
use crate::worker::{IoWorker, impl_io_service};
use satellite_link::{
    BoundedBuffer, Caller, FlushableBuffer, HardwareLink, LinkArbiter, VideoFrame,
};
use satellite_motion::{StateCell, TrackingFeed};
use satellite_tools::IoConfig;
use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::{Duration, Instant};
use tracing::{debug, error, warn};

/// 视频帧接收方
pub trait FrameSink: Send + 'static {
    fn on_frame(&mut self, frame: &VideoFrame, tracking: &TrackingFeed);
}

impl<F: FnMut(&VideoFrame, &TrackingFeed) + Send + 'static> FrameSink for F {
    fn on_frame(&mut self, frame: &VideoFrame, tracking: &TrackingFeed) {
        self(frame, tracking)
    }
}

/// 视觉循环
pub struct VisionLoop {
    worker: IoWorker,
}

impl VisionLoop {
    /// 启动视觉线程
    pub fn spawn<L, S>(
        arbiter: Arc<LinkArbiter<L>>,
        state: Arc<StateCell>,
        tracking: Arc<TrackingFeed>,
        mut sink: S,
        config: &IoConfig,
        ack_timeout: Duration,
    ) -> Result<Self, SatelliteError>
    where
        L: HardwareLink + 'static,
        S: FrameSink,
    {
        let period = config.vision_period();
        let capacity = config.frame_buffer_capacity.max(1);

        let asleep = !state.get().computes_pose();
        let worker = IoWorker::spawn("vision", ack_timeout, asleep, move |control, metrics| {
            let mut frames = BoundedBuffer::<VideoFrame>::new(capacity);
            let mut next = Instant::now();

            while control.checkpoint(|| {
                frames.flush();
            }) {
                let robot_state = state.get();
                if let Some(mut link) =
                    arbiter.acquire_or_flush(Caller::Vision, robot_state, &mut frames)
                {
                    match link.read_frame() {
                        Ok(Some(frame)) => {
                            frames.push(frame);
                            metrics.items.fetch_add(1, Ordering::Relaxed);
                        },
                        Ok(None) => {},
                        Err(e) if e.is_fatal() => {
                            error!("Vision loop: {}, exiting", e);
                            return;
                        },
                        Err(e) => warn!("Frame read failed: {}", e),
                    }
                } else {
                    metrics.skipped.fetch_add(1, Ordering::Relaxed);
                }

                while let Some(frame) = frames.pop_front() {
                    sink.on_frame(&frame, &tracking);
                    LoopMetrics::add(&metrics.delivered, 1);
                }

                metrics.cycles.fetch_add(1, Ordering::Relaxed);
                next = pace(next, period);
            }
            debug!("Vision loop exiting");
        })?;

        Ok(Self { worker })
    }
}

impl_io_service!(VisionLoop);
