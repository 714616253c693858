//! 带超时的线程 join

use std::thread::{JoinHandle, spawn};
use std::time::Duration;

/// 带超时的 `JoinHandle::join`
pub trait JoinTimeout {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()>;
}

impl<T: Send + 'static> JoinTimeout for JoinHandle<T> {
    fn join_timeout(self, timeout: Duration) -> std::thread::Result<()> {
        let (tx, rx) = crossbeam_channel::bounded(1);

        // 看门狗线程负责真正的 join；超时后它继续运行，进程退出时由系统回收
        spawn(move || {
            let _ = tx.send(self.join().map(|_| ()));
        });

        match rx.recv_timeout(timeout) {
            Ok(join_result) => join_result,
            Err(crossbeam_channel::RecvTimeoutError::Timeout) => Err(Box::new(
                std::io::Error::new(std::io::ErrorKind::TimedOut, "Thread join timeout"),
            )),
            Err(crossbeam_channel::RecvTimeoutError::Disconnected) => Err(Box::new(
                std::io::Error::new(
                    std::io::ErrorKind::ConnectionReset,
                    "Thread panicked during join",
                ),
            )),
        }
    }
}
