//! 队列管理器
//!
//! 持有当天排队患者的有序列表，是队列状态的唯一权威来源。
//! 所有操作都是同步的：修改列表、重算当前患者和统计、发布快照，然后返回。
//! 列表顺序即叫号顺序，`queue_position` 始终是 1..N 的连续编号。

use crate::publisher::{QueuePublisher, QueueSubscription, DEFAULT_EVENT_CAPACITY};
use crate::query::{self, QueueFilter};
use crate::state_machine::{EntryEvent, EntryStateMachine};
use crate::statistics::compute_statistics;
use clinicq_core::utils::format_time_of_day;
use clinicq_core::{
    Clock, EntryStatus, DEFAULT_ESTIMATED_DURATION, NewQueueEntry, QueueEntry, QueueError, QueueEvent, QueueEventKind,
    QueueStatistics, Result, SystemClock,
};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;

/// 队列策略
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct QueuePolicy {
    /// 已有患者就诊时拒绝再次叫号
    pub enforce_single_in_progress: bool,
    /// 签到未给出预计时长时使用的分钟数
    pub default_estimated_duration: u32,
}

impl Default for QueuePolicy {
    fn default() -> Self {
        Self {
            enforce_single_in_progress: true,
            default_estimated_duration: DEFAULT_ESTIMATED_DURATION,
        }
    }
}

/// 结束就诊的结果
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionOutcome {
    pub completed: QueueEntry,
    /// 自动开始就诊的下一位患者
    pub next_started: Option<QueueEntry>,
}

/// 队列管理器
#[derive(Debug)]
pub struct QueueManager {
    entries: Vec<QueueEntry>,
    last_queue_id: u32,
    state_machine: EntryStateMachine,
    publisher: QueuePublisher,
    clock: Arc<dyn Clock>,
    policy: QueuePolicy,
}

impl QueueManager {
    /// 创建空队列
    pub fn new() -> Self {
        Self::with_options(QueuePolicy::default(), Arc::new(SystemClock), DEFAULT_EVENT_CAPACITY)
    }

    pub fn with_options(policy: QueuePolicy, clock: Arc<dyn Clock>, event_capacity: usize) -> Self {
        let manager = Self {
            entries: Vec::new(),
            last_queue_id: 0,
            state_machine: EntryStateMachine::new(),
            publisher: QueuePublisher::new(event_capacity),
            clock,
            policy,
        };
        manager.publish();
        manager
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self.publish();
        self
    }

    pub fn with_policy(mut self, policy: QueuePolicy) -> Self {
        self.policy = policy;
        self
    }

    /// 患者签到入队
    pub fn add_patient_to_queue(&mut self, mut new: NewQueueEntry) -> QueueEntry {
        new.estimated_duration.get_or_insert(self.policy.default_estimated_duration);

        // 队列号只增不减，移除后也不会复用
        let max_existing = self.entries.iter().map(|e| e.queue_id).max().unwrap_or(0);
        let queue_id = self.last_queue_id.max(max_existing) + 1;
        self.last_queue_id = queue_id;

        let queue_position = self.entries.len() as u32 + 1;
        let check_in_time = format_time_of_day(self.clock.now());
        let entry = QueueEntry::from_new(new, queue_id, queue_position, check_in_time);

        tracing::info!(
            "Patient {} checked in as queue #{} at position {}",
            entry.patient_id,
            queue_id,
            queue_position
        );

        self.entries.push(entry.clone());
        self.publisher.emit(QueueEvent::new(QueueEventKind::PatientAdded {
            patient_id: entry.patient_id,
            queue_id,
            queue_position,
        }));
        self.publish();
        entry
    }

    /// 叫号：候诊 → 就诊中
    pub fn call_patient(&mut self, patient_id: u32) -> Result<QueueEntry> {
        let index = self.index_of(patient_id)?;
        let new_status = self.state_machine.transition(self.entries[index].status, EntryEvent::Call)?;

        if self.policy.enforce_single_in_progress {
            if let Some(current) = self
                .entries
                .iter()
                .find(|e| e.status == EntryStatus::InProgress)
            {
                tracing::warn!(
                    "Refusing to call patient {} while patient {} is in consultation",
                    patient_id,
                    current.patient_id
                );
                return Err(QueueError::ConsultationInProgress {
                    current: current.patient_id,
                });
            }
        }

        let now = format_time_of_day(self.clock.now());
        let entry = &mut self.entries[index];
        entry.status = new_status;
        entry.actual_start_time = Some(now);
        let called = entry.clone();

        tracing::info!("Patient {} called into consultation", patient_id);
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::PatientCalled { patient_id }));
        self.publish();
        Ok(called)
    }

    /// 结束就诊，并按队列位置自动开始下一位候诊患者
    pub fn complete_consultation(&mut self, patient_id: u32) -> Result<CompletionOutcome> {
        let index = self.index_of(patient_id)?;
        let new_status = self
            .state_machine
            .transition(self.entries[index].status, EntryEvent::Complete)?;

        let now = format_time_of_day(self.clock.now());
        let entry = &mut self.entries[index];
        entry.status = new_status;
        entry.actual_end_time = Some(now.clone());
        let completed = entry.clone();

        tracing::info!("Consultation completed for patient {}", patient_id);
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::ConsultationCompleted { patient_id }));

        let next_started = self.advance_next(now)?;

        self.publish();
        Ok(CompletionOutcome {
            completed,
            next_started,
        })
    }

    fn advance_next(&mut self, now: String) -> Result<Option<QueueEntry>> {
        let next_index = self
            .entries
            .iter()
            .enumerate()
            .filter(|(_, e)| e.status == EntryStatus::Waiting)
            .min_by_key(|(_, e)| e.queue_position)
            .map(|(i, _)| i);

        let Some(next_index) = next_index else {
            tracing::debug!("No waiting patients left to advance");
            return Ok(None);
        };

        let new_status = self
            .state_machine
            .transition(self.entries[next_index].status, EntryEvent::Call)?;
        let next = &mut self.entries[next_index];
        next.status = new_status;
        next.actual_start_time = Some(now);
        let next = next.clone();

        tracing::info!(
            "Auto-advanced patient {} (position {}) into consultation",
            next.patient_id,
            next.queue_position
        );
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::NextPatientStarted {
                patient_id: next.patient_id,
                patient_name: next.patient_name.clone(),
            }));
        Ok(Some(next))
    }

    /// 覆盖备注
    pub fn update_patient_notes(&mut self, patient_id: u32, notes: impl Into<String>) -> Result<()> {
        let index = self.index_of(patient_id)?;
        self.entries[index].notes = Some(notes.into());

        tracing::debug!("Updated notes for patient {}", patient_id);
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::NotesUpdated { patient_id }));
        self.publish();
        Ok(())
    }

    /// 移出队列并压缩位置编号，保持其余条目的相对顺序
    pub fn remove_patient_from_queue(&mut self, patient_id: u32) -> Result<QueueEntry> {
        let index = self.index_of(patient_id)?;
        let removed = self.entries.remove(index);
        self.renumber();

        tracing::info!(
            "Removed patient {} from queue position {}",
            patient_id,
            removed.queue_position
        );
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::PatientRemoved { patient_id }));
        self.publish();
        Ok(removed)
    }

    /// 过号：候诊 → 未到，条目保留在列表中
    pub fn mark_no_show(&mut self, patient_id: u32) -> Result<QueueEntry> {
        let entry = self.apply_event(patient_id, EntryEvent::MarkNoShow)?;
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::MarkedNoShow { patient_id }));
        self.publish();
        Ok(entry)
    }

    /// 取消：候诊 → 已取消，条目保留在列表中
    pub fn cancel_patient(&mut self, patient_id: u32) -> Result<QueueEntry> {
        let entry = self.apply_event(patient_id, EntryEvent::Cancel)?;
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::Cancelled { patient_id }));
        self.publish();
        Ok(entry)
    }

    fn apply_event(&mut self, patient_id: u32, event: EntryEvent) -> Result<QueueEntry> {
        let index = self.index_of(patient_id)?;
        let entry = &mut self.entries[index];
        let old_status = entry.status;
        entry.status = self.state_machine.transition(old_status, event)?;

        tracing::info!(
            "Patient {} status changed from {} to {}",
            patient_id,
            old_status,
            entry.status
        );
        Ok(entry.clone())
    }

    /// 按给定的完整顺序重排（拖拽排序）
    pub fn reorder_queue(&mut self, ordered: &[QueueEntry]) -> Result<()> {
        let order: Vec<u32> = ordered.iter().map(|e| e.queue_id).collect();
        self.reorder_by_ids(&order)
    }

    /// 按队列号序列重排，必须恰好覆盖当前队列的全部条目
    pub fn reorder_by_ids(&mut self, order: &[u32]) -> Result<()> {
        self.validate_order(order)?;

        let mut by_id: HashMap<u32, QueueEntry> =
            self.entries.drain(..).map(|e| (e.queue_id, e)).collect();
        self.entries = order.iter().filter_map(|id| by_id.remove(id)).collect();
        self.renumber();

        tracing::info!("Queue reordered: {:?}", order);
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::QueueReordered {
                order: order.to_vec(),
            }));
        self.publish();
        Ok(())
    }

    fn validate_order(&self, order: &[u32]) -> Result<()> {
        if order.len() != self.entries.len() {
            tracing::warn!(
                "Rejected reorder with {} entries, queue has {}",
                order.len(),
                self.entries.len()
            );
            return Err(QueueError::InvalidReorder(format!(
                "expected {} entries, got {}",
                self.entries.len(),
                order.len()
            )));
        }

        let known: HashSet<u32> = self.entries.iter().map(|e| e.queue_id).collect();
        let mut seen = HashSet::with_capacity(order.len());
        for id in order {
            if !known.contains(id) {
                return Err(QueueError::InvalidReorder(format!("unknown queue id {}", id)));
            }
            if !seen.insert(*id) {
                return Err(QueueError::InvalidReorder(format!("duplicate queue id {}", id)));
            }
        }
        Ok(())
    }

    /// 候诊时间加一分钟，返回被计时的候诊人数
    pub fn tick_wait_times(&mut self) -> u32 {
        let mut waiting = 0;
        for entry in self
            .entries
            .iter_mut()
            .filter(|e| e.status == EntryStatus::Waiting)
        {
            entry.wait_time = entry.wait_time.saturating_add(1);
            waiting += 1;
        }

        tracing::debug!("Queue tick aged {} waiting patients", waiting);
        self.publisher
            .emit(QueueEvent::new(QueueEventKind::QueueRefreshed { waiting }));
        self.publish();
        waiting
    }

    /// 获取全部条目（按位置顺序）
    pub fn entries(&self) -> &[QueueEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get_entry(&self, patient_id: u32) -> Option<&QueueEntry> {
        self.entries.iter().find(|e| e.patient_id == patient_id)
    }

    /// 当前就诊患者（位置最靠前的就诊中条目）
    pub fn current_patient(&self) -> Option<&QueueEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::InProgress)
            .min_by_key(|e| e.queue_position)
    }

    /// 下一位候诊患者
    pub fn next_waiting(&self) -> Option<&QueueEntry> {
        self.entries
            .iter()
            .filter(|e| e.status == EntryStatus::Waiting)
            .min_by_key(|e| e.queue_position)
    }

    pub fn statistics(&self) -> QueueStatistics {
        compute_statistics(&self.entries, self.clock.now())
    }

    /// 相对预约时间的延误分钟数
    pub fn delay_minutes(&self, patient_id: u32) -> Option<u32> {
        self.get_entry(patient_id)
            .map(|entry| entry.delay_minutes_at(self.clock.now()))
    }

    pub fn search_patients(&self, term: &str) -> Vec<QueueEntry> {
        query::search_patients(&self.entries, term)
    }

    pub fn filter_patients_by_status(&self, status: Option<EntryStatus>) -> Vec<QueueEntry> {
        query::filter_patients_by_status(&self.entries, status)
    }

    pub fn sort_patients(&self, key: &str) -> Vec<QueueEntry> {
        query::sort_patients(&self.entries, key)
    }

    pub fn query(&self, filter: &QueueFilter) -> Vec<QueueEntry> {
        filter.apply(&self.entries)
    }

    pub fn subscribe(&self) -> QueueSubscription {
        self.publisher.subscribe()
    }

    pub fn publisher(&self) -> &QueuePublisher {
        &self.publisher
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    fn index_of(&self, patient_id: u32) -> Result<usize> {
        self.entries
            .iter()
            .position(|e| e.patient_id == patient_id)
            .ok_or_else(|| {
                tracing::warn!("Patient {} is not in the queue", patient_id);
                QueueError::NotFound(patient_id)
            })
    }

    fn renumber(&mut self) {
        for (index, entry) in self.entries.iter_mut().enumerate() {
            entry.queue_position = index as u32 + 1;
        }
    }

    /// 重算当前患者和统计并发布
    fn publish(&self) {
        let stats = self.statistics();
        let current = self.current_patient().cloned();
        self.publisher.publish(self.entries.clone(), current, stats);
    }
}

impl Default for QueueManager {
    fn default() -> Self {
        Self::new()
    }
}
