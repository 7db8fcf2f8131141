//! 错误定义模块

use std::time::Duration;
use thiserror::Error;

/// 排队系统统一错误类型
#[derive(Error, Debug)]
pub enum QueueError {
    #[error("患者未在队列中: {0}")]
    NotFound(u32),

    #[error("无效的队列重排: {0}")]
    InvalidReorder(String),

    #[error("无效状态转换: 从 {from} 到 {event}")]
    InvalidStateTransition { from: String, event: String },

    #[error("已有患者正在就诊: {current}")]
    ConsultationInProgress { current: u32 },

    #[error("队列刷新超时: {0:?}")]
    RefreshTimeout(Duration),

    #[error("序列化错误: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// 排队系统统一结果类型
pub type Result<T> = std::result::Result<T, QueueError>;

impl QueueError {
    /// 是否为"未找到"类错误，调用方通常只需提示用户
    pub fn is_not_found(&self) -> bool {
        matches!(self, QueueError::NotFound(_))
    }
}
