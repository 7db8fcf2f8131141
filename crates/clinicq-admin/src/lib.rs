//! # 排队管理运维模块
//!
//! 提供配置管理、日志初始化，以及把队列服务、周期刷新和通知组装起来的运行时

pub mod config;
pub mod logging;

use anyhow::{Context, Result};
use clinicq_core::{NewQueueEntry, SystemClock};
use clinicq_workflow::{
    spawn_notification_forwarder, LoggingNotificationSink, NotificationSink, QueueManager,
    QueueService, RefreshHandle,
};
use std::sync::Arc;
use tokio::task::JoinHandle;

pub use config::{ClinicqConfig, ConfigManager, LoggingConfig, QueueSettings};

/// 按配置构建队列服务
pub fn build_service(settings: &QueueSettings) -> QueueService {
    let manager = QueueManager::with_options(
        settings.policy(),
        Arc::new(SystemClock),
        settings.event_capacity,
    );
    QueueService::new(manager, settings.refresh_settings())
}

/// 从 JSON 文件读取签到数据
pub async fn load_seed_file(path: &str) -> Result<Vec<NewQueueEntry>> {
    let content = tokio::fs::read_to_string(path)
        .await
        .with_context(|| format!("Failed to read seed file {}", path))?;
    let entries: Vec<NewQueueEntry> =
        serde_json::from_str(&content).with_context(|| format!("Invalid seed file {}", path))?;
    Ok(entries)
}

/// 队列运行时
///
/// 应用的组装入口：持有配置、队列服务、周期刷新任务和通知转发任务
pub struct QueueRuntime {
    /// 配置管理器
    config_manager: Arc<ConfigManager>,
    /// 队列服务
    service: QueueService,
    /// 周期刷新任务
    refresh: Option<RefreshHandle>,
    /// 通知转发任务
    forwarders: Vec<JoinHandle<()>>,
}

impl QueueRuntime {
    /// 创建运行时
    pub async fn new(config_manager: Arc<ConfigManager>) -> Result<Self> {
        let config = config_manager.get_config().await;
        let service = build_service(&config.queue);

        Ok(Self {
            config_manager,
            service,
            refresh: None,
            forwarders: Vec::new(),
        })
    }

    /// 导入签到数据，返回导入条数
    pub async fn seed(&self, entries: Vec<NewQueueEntry>) -> usize {
        let count = entries.len();
        for entry in entries {
            self.service.add_patient_to_queue(entry).await;
        }
        tracing::info!("Seeded {} patients into the queue", count);
        count
    }

    /// 启动周期刷新和默认通知
    pub async fn start(&mut self) -> Result<()> {
        tracing::info!("Starting queue runtime");

        let config = self.config_manager.get_config().await;
        if let Some(path) = config.queue.seed_file.as_deref() {
            let entries = load_seed_file(path).await?;
            self.seed(entries).await;
        }

        self.add_sink(Arc::new(LoggingNotificationSink::new("log"))).await;
        self.refresh = Some(self.service.spawn_auto_refresh(config.queue.refresh_interval()));

        tracing::info!("Queue runtime started");
        Ok(())
    }

    /// 注册通知接收方
    pub async fn add_sink(&mut self, sink: Arc<dyn NotificationSink>) {
        let events = self.service.subscribe().await.events;
        self.forwarders.push(spawn_notification_forwarder(events, sink));
    }

    /// 停止运行时
    pub async fn stop(&mut self) {
        tracing::info!("Stopping queue runtime");

        if let Some(refresh) = self.refresh.take() {
            refresh.stop().await;
        }
        for forwarder in self.forwarders.drain(..) {
            forwarder.abort();
        }

        tracing::info!("Queue runtime stopped");
    }

    /// 获取队列服务
    pub fn service(&self) -> &QueueService {
        &self.service
    }

    /// 获取配置管理器
    pub fn config_manager(&self) -> &Arc<ConfigManager> {
        &self.config_manager
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicq_core::EntryStatus;

    #[tokio::test]
    async fn test_runtime_seeds_and_stops() {
        let config_manager = Arc::new(ConfigManager::from_config(ClinicqConfig::default(), None).unwrap());
        let mut runtime = QueueRuntime::new(config_manager).await.unwrap();

        let seeded = runtime
            .seed(vec![
                NewQueueEntry::new(1, "Rosa Diaz", 2),
                NewQueueEntry::new(2, "Tomas Novak", 2),
            ])
            .await;
        assert_eq!(seeded, 2);

        runtime.start().await.unwrap();
        runtime.service().call_patient(1).await.unwrap();
        let outcome = runtime.service().complete_consultation(1).await.unwrap();
        assert_eq!(outcome.next_started.unwrap().status, EntryStatus::InProgress);
        runtime.stop().await;
    }

    #[tokio::test]
    async fn test_seeded_entries_use_configured_duration() {
        let mut config = ClinicqConfig::default();
        config.queue.default_estimated_duration = 20;
        let config_manager = Arc::new(ConfigManager::from_config(config, None).unwrap());
        let runtime = QueueRuntime::new(config_manager).await.unwrap();

        runtime
            .seed(vec![
                NewQueueEntry::new(1, "Rosa Diaz", 2),
                NewQueueEntry::new(2, "Tomas Novak", 2).with_estimated_duration(5),
            ])
            .await;

        let entries = runtime.service().entries().await;
        assert_eq!(entries[0].estimated_duration, 20);
        assert_eq!(entries[1].estimated_duration, 5);
    }

    #[tokio::test]
    async fn test_load_seed_file() {
        let path = std::env::temp_dir().join(format!("clinicq-seed-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"[{"patientId": 4, "patientName": "Ivan Petrov", "doctorId": 1, "priority": "HIGH"}]"#,
        )
        .unwrap();

        let entries = load_seed_file(path.to_str().unwrap()).await.unwrap();
        std::fs::remove_file(&path).ok();
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].priority, clinicq_core::Priority::High);

        assert!(load_seed_file("/nonexistent/clinicq-seed.json").await.is_err());
    }
}
