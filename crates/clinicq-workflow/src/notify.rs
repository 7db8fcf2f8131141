//! 队列通知
//!
//! 把队列事件转交给界面提示、短信等外部通知渠道

use anyhow::Result;
use clinicq_core::{QueueEvent, QueueEventKind};
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// 通知接收方接口
#[async_trait::async_trait]
pub trait NotificationSink: Send + Sync {
    /// 处理一个队列事件
    async fn notify(&self, event: &QueueEvent) -> Result<()>;

    /// 获取接收方名称
    fn name(&self) -> &str;
}

/// 写入日志的默认接收方
pub struct LoggingNotificationSink {
    name: String,
}

impl LoggingNotificationSink {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

#[async_trait::async_trait]
impl NotificationSink for LoggingNotificationSink {
    async fn notify(&self, event: &QueueEvent) -> Result<()> {
        match &event.kind {
            // 下一位开始就诊需要醒目提示
            QueueEventKind::NextPatientStarted { .. } => {
                info!(sink = %self.name, "{}", event.message());
            }
            _ => debug!(sink = %self.name, "{}", event.message()),
        }
        Ok(())
    }

    fn name(&self) -> &str {
        &self.name
    }
}

/// 启动事件转发任务，直到所有发送端关闭
pub fn spawn_notification_forwarder(
    mut events: broadcast::Receiver<QueueEvent>,
    sink: Arc<dyn NotificationSink>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!("Forwarding queue events to sink: {}", sink.name());
        loop {
            match events.recv().await {
                Ok(event) => {
                    if let Err(e) = sink.notify(&event).await {
                        warn!("Sink {} failed to handle event {}: {}", sink.name(), event.id, e);
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    warn!("Sink {} lagged behind, skipped {} events", sink.name(), skipped);
                }
                Err(RecvError::Closed) => break,
            }
        }
        debug!("Event forwarding to {} stopped", sink.name());
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::Mutex;

    struct RecordingSink {
        seen: Mutex<Vec<QueueEventKind>>,
    }

    #[async_trait::async_trait]
    impl NotificationSink for RecordingSink {
        async fn notify(&self, event: &QueueEvent) -> Result<()> {
            self.seen.lock().await.push(event.kind.clone());
            Ok(())
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_forwarder_delivers_until_closed() {
        let (tx, rx) = broadcast::channel(8);
        let sink = Arc::new(RecordingSink {
            seen: Mutex::new(Vec::new()),
        });

        let handle = spawn_notification_forwarder(rx, sink.clone());
        tx.send(QueueEvent::new(QueueEventKind::PatientCalled { patient_id: 1 })).unwrap();
        tx.send(QueueEvent::new(QueueEventKind::ConsultationCompleted { patient_id: 1 })).unwrap();
        drop(tx);

        handle.await.unwrap();
        let seen = sink.seen.lock().await;
        assert_eq!(
            *seen,
            vec![
                QueueEventKind::PatientCalled { patient_id: 1 },
                QueueEventKind::ConsultationCompleted { patient_id: 1 },
            ]
        );
    }

    #[tokio::test]
    async fn test_logging_sink_accepts_events() {
        let sink = LoggingNotificationSink::new("log");
        let event = QueueEvent::new(QueueEventKind::NextPatientStarted {
            patient_id: 2,
            patient_name: "Jonas Berg".to_string(),
        });
        assert!(sink.notify(&event).await.is_ok());
        assert_eq!(sink.name(), "log");
    }
}
