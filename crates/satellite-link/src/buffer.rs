//! 有界缓冲区
//!
//! 每个硬件子系统的缓冲区所有者（音频采集、音频播放、视频帧）只暴露一个
//! `flush()` 操作，后置条件：缓冲区为空。不使用分散的"排空"布尔标志。

use std::collections::VecDeque;

/// 可清空的缓冲区
///
/// 当调用方获取链路超时时，由仲裁器调用 `flush()` 丢弃该调用方积压的数据，
/// 防止长时间竞争导致缓冲区无限增长。
pub trait FlushableBuffer {
    /// 清空缓冲区，返回被丢弃的元素数量
    ///
    /// **后置条件**：`self.is_empty() == true`
    fn flush(&mut self) -> usize;

    /// 当前元素数量
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// 有界 FIFO 缓冲区
///
/// 超出容量时丢弃最旧的元素（Overwrite 策略），并计数。
#[derive(Debug, Clone)]
pub struct BoundedBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    /// 因超出容量被丢弃的元素总数
    overflowed: u64,
}

impl<T> BoundedBuffer<T> {
    /// 创建缓冲区（容量至少为 1）
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            overflowed: 0,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// 因超出容量被丢弃的元素总数
    pub fn overflowed(&self) -> u64 {
        self.overflowed
    }

    /// 追加一个元素；满时丢弃最旧元素
    pub fn push(&mut self, item: T) {
        if self.items.len() == self.capacity {
            self.items.pop_front();
            self.overflowed += 1;
        }
        self.items.push_back(item);
    }

    /// 追加多个元素
    pub fn extend(&mut self, items: impl IntoIterator<Item = T>) {
        for item in items {
            self.push(item);
        }
    }

    /// 从头部取出最多 `max` 个元素
    pub fn take_front(&mut self, max: usize) -> Vec<T> {
        let n = max.min(self.items.len());
        self.items.drain(..n).collect()
    }

    /// 取出最旧的一个元素
    pub fn pop_front(&mut self) -> Option<T> {
        self.items.pop_front()
    }

    /// 把元素放回头部（写入失败时归还未消费的数据）
    pub fn push_front(&mut self, item: T) {
        if self.items.len() == self.capacity {
            // 头部归还优先级高于尾部新数据
            self.items.pop_back();
            self.overflowed += 1;
        }
        self.items.push_front(item);
    }

    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.items.iter()
    }
}

impl<T: Clone> BoundedBuffer<T> {
    /// 批量追加切片
    pub fn extend_from_slice(&mut self, items: &[T]) {
        self.extend(items.iter().cloned());
    }
}

impl<T> FlushableBuffer for BoundedBuffer<T> {
    fn flush(&mut self) -> usize {
        let dropped = self.items.len();
        self.items.clear();
        dropped
    }

    fn len(&self) -> usize {
        self.items.len()
    }
}
