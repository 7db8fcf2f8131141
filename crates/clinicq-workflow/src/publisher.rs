//! 队列状态发布
//!
//! 三个持续更新的可观察值（完整队列、当前就诊患者、统计）使用 `watch` 通道，
//! 新订阅者立即拿到最新快照；事件流使用 `broadcast` 通道。

use clinicq_core::{QueueEntry, QueueEvent, QueueStatistics};
use tokio::sync::{broadcast, watch};

/// 默认事件缓冲容量
pub const DEFAULT_EVENT_CAPACITY: usize = 64;

/// 队列发布器
#[derive(Debug)]
pub struct QueuePublisher {
    queue_tx: watch::Sender<Vec<QueueEntry>>,
    current_tx: watch::Sender<Option<QueueEntry>>,
    stats_tx: watch::Sender<QueueStatistics>,
    event_tx: broadcast::Sender<QueueEvent>,
}

/// 一个订阅者持有的全部接收端
#[derive(Debug)]
pub struct QueueSubscription {
    pub queue: watch::Receiver<Vec<QueueEntry>>,
    pub current: watch::Receiver<Option<QueueEntry>>,
    pub stats: watch::Receiver<QueueStatistics>,
    pub events: broadcast::Receiver<QueueEvent>,
}

impl QueuePublisher {
    pub fn new(event_capacity: usize) -> Self {
        let (queue_tx, _) = watch::channel(Vec::new());
        let (current_tx, _) = watch::channel(None);
        let (stats_tx, _) = watch::channel(QueueStatistics::default());
        let (event_tx, _) = broadcast::channel(event_capacity.max(1));

        Self {
            queue_tx,
            current_tx,
            stats_tx,
            event_tx,
        }
    }

    /// 替换三个快照；没有订阅者时同样生效
    pub fn publish(&self, queue: Vec<QueueEntry>, current: Option<QueueEntry>, stats: QueueStatistics) {
        self.queue_tx.send_replace(queue);
        self.current_tx.send_replace(current);
        self.stats_tx.send_replace(stats);
    }

    /// 发出事件，无人接收时丢弃
    pub fn emit(&self, event: QueueEvent) {
        if let Err(e) = self.event_tx.send(event) {
            tracing::trace!("Queue event dropped, no listeners: {:?}", e.0.kind);
        }
    }

    pub fn subscribe(&self) -> QueueSubscription {
        QueueSubscription {
            queue: self.queue_tx.subscribe(),
            current: self.current_tx.subscribe(),
            stats: self.stats_tx.subscribe(),
            events: self.event_tx.subscribe(),
        }
    }

    pub fn subscribe_events(&self) -> broadcast::Receiver<QueueEvent> {
        self.event_tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.queue_tx.receiver_count()
    }
}

impl Default for QueuePublisher {
    fn default() -> Self {
        Self::new(DEFAULT_EVENT_CAPACITY)
    }
}
