//! # 排队工作流模块
//!
//! 提供门诊当日排队的完整管理功能，包括：
//! - 排队状态机：候诊、就诊中、已完成、未到、已取消
//! - 队列管理器：签到、叫号、结束就诊自动顺延、移除、重排
//! - 统计与查询：候诊统计、医生负载、搜索过滤排序、导出
//! - 发布与通知：快照订阅、事件通知、周期刷新

pub mod export;
pub mod manager;
pub mod notify;
pub mod publisher;
pub mod query;
pub mod service;
pub mod state_machine;
pub mod statistics;

// 重新导出主要类型
pub use export::{export_json, export_records, ExportRecord};
pub use manager::{CompletionOutcome, QueueManager, QueuePolicy};
pub use notify::{spawn_notification_forwarder, LoggingNotificationSink, NotificationSink};
pub use publisher::{QueuePublisher, QueueSubscription};
pub use query::{QueueFilter, SortKey};
pub use service::{QueueService, RefreshHandle, RefreshSettings};
pub use state_machine::{EntryEvent, EntryStateMachine};
pub use statistics::compute_statistics;
