//! 队列服务
//!
//! `QueueManager` 本身是同步的；在多任务环境下通过这个句柄访问，
//! 所有修改都经过同一把锁串行执行，避免交错的重算与发布。

use crate::export;
use crate::manager::{CompletionOutcome, QueueManager};
use crate::publisher::QueueSubscription;
use crate::query::QueueFilter;
use clinicq_core::{EntryStatus, NewQueueEntry, QueueEntry, QueueError, QueueStatistics, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, timeout, Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

/// 刷新设置
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshSettings {
    /// 模拟的服务端往返时间
    pub latency: Duration,
    /// 单次刷新的上限
    pub timeout: Duration,
}

impl Default for RefreshSettings {
    fn default() -> Self {
        Self {
            latency: Duration::from_millis(500),
            timeout: Duration::from_secs(5),
        }
    }
}

/// 队列服务句柄，可廉价克隆
#[derive(Debug, Clone)]
pub struct QueueService {
    manager: Arc<Mutex<QueueManager>>,
    refresh: RefreshSettings,
}

impl QueueService {
    pub fn new(manager: QueueManager, refresh: RefreshSettings) -> Self {
        Self {
            manager: Arc::new(Mutex::new(manager)),
            refresh,
        }
    }

    pub async fn subscribe(&self) -> QueueSubscription {
        self.manager.lock().await.subscribe()
    }

    pub async fn add_patient_to_queue(&self, new: NewQueueEntry) -> QueueEntry {
        self.manager.lock().await.add_patient_to_queue(new)
    }

    pub async fn call_patient(&self, patient_id: u32) -> Result<QueueEntry> {
        self.manager.lock().await.call_patient(patient_id)
    }

    pub async fn complete_consultation(&self, patient_id: u32) -> Result<CompletionOutcome> {
        self.manager.lock().await.complete_consultation(patient_id)
    }

    pub async fn update_patient_notes(&self, patient_id: u32, notes: impl Into<String>) -> Result<()> {
        self.manager.lock().await.update_patient_notes(patient_id, notes)
    }

    pub async fn remove_patient_from_queue(&self, patient_id: u32) -> Result<QueueEntry> {
        self.manager.lock().await.remove_patient_from_queue(patient_id)
    }

    pub async fn mark_no_show(&self, patient_id: u32) -> Result<QueueEntry> {
        self.manager.lock().await.mark_no_show(patient_id)
    }

    pub async fn cancel_patient(&self, patient_id: u32) -> Result<QueueEntry> {
        self.manager.lock().await.cancel_patient(patient_id)
    }

    pub async fn reorder_queue(&self, ordered: &[QueueEntry]) -> Result<()> {
        self.manager.lock().await.reorder_queue(ordered)
    }

    pub async fn reorder_by_ids(&self, order: &[u32]) -> Result<()> {
        self.manager.lock().await.reorder_by_ids(order)
    }

    pub async fn search_patients(&self, term: &str) -> Vec<QueueEntry> {
        self.manager.lock().await.search_patients(term)
    }

    pub async fn filter_patients_by_status(&self, status: Option<EntryStatus>) -> Vec<QueueEntry> {
        self.manager.lock().await.filter_patients_by_status(status)
    }

    pub async fn sort_patients(&self, key: &str) -> Vec<QueueEntry> {
        self.manager.lock().await.sort_patients(key)
    }

    pub async fn query(&self, filter: &QueueFilter) -> Vec<QueueEntry> {
        self.manager.lock().await.query(filter)
    }

    pub async fn entries(&self) -> Vec<QueueEntry> {
        self.manager.lock().await.entries().to_vec()
    }

    pub async fn current_patient(&self) -> Option<QueueEntry> {
        self.manager.lock().await.current_patient().cloned()
    }

    pub async fn statistics(&self) -> QueueStatistics {
        self.manager.lock().await.statistics()
    }

    pub async fn export_json(&self) -> Result<String> {
        let manager = self.manager.lock().await;
        export::export_json(manager.entries())
    }

    /// 刷新队列：等待一次模拟往返，然后把候诊时间加一分钟
    ///
    /// 在等待期间丢弃该 future 不会留下任何修改；锁只在计时那一刻持有。
    pub async fn refresh_queue(&self) -> Result<QueueStatistics> {
        let limit = self.refresh.timeout;
        if timeout(limit, sleep(self.refresh.latency)).await.is_err() {
            warn!("Queue refresh did not finish within {:?}", limit);
            return Err(QueueError::RefreshTimeout(limit));
        }

        let mut manager = self.manager.lock().await;
        let waiting = manager.tick_wait_times();
        debug!("Queue refreshed, {} patients waiting", waiting);
        Ok(manager.statistics())
    }

    /// 按固定间隔周期刷新，直到句柄被停止或丢弃
    pub fn spawn_auto_refresh(&self, period: Duration) -> RefreshHandle {
        let service = self.clone();
        let (shutdown_tx, mut shutdown_rx) = oneshot::channel::<()>();

        let handle = tokio::spawn(async move {
            info!("Starting queue auto refresh every {:?}", period);
            let mut ticker = interval_at(Instant::now() + period, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    _ = ticker.tick() => {}
                }

                tokio::select! {
                    _ = &mut shutdown_rx => break,
                    result = service.refresh_queue() => {
                        if let Err(e) = result {
                            warn!("Scheduled queue refresh failed: {}", e);
                        }
                    }
                }
            }

            info!("Queue auto refresh stopped");
        });

        RefreshHandle {
            shutdown: Some(shutdown_tx),
            handle,
        }
    }
}

/// 周期刷新任务句柄，丢弃即停止
#[derive(Debug)]
pub struct RefreshHandle {
    shutdown: Option<oneshot::Sender<()>>,
    handle: JoinHandle<()>,
}

impl RefreshHandle {
    /// 停止刷新并等待任务退出
    pub async fn stop(self) {
        let RefreshHandle { shutdown, handle } = self;
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        if let Err(e) = handle.await {
            warn!("Auto refresh task ended abnormally: {}", e);
        }
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
