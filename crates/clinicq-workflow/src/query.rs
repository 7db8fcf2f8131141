//! 队列查询
//!
//! 搜索、过滤和排序都是只读投影，不修改队列也不触发发布

use clinicq_core::{EntryStatus, QueueEntry};
use serde::{Deserialize, Serialize};
use std::cmp::Reverse;
use std::str::FromStr;

/// 排序字段
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SortKey {
    QueuePosition, // 升序
    Priority,      // 按严重程度降序
    WaitTime,      // 降序
    CheckInTime,   // 升序
}

impl FromStr for SortKey {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "queuePosition" | "queue_position" => Ok(SortKey::QueuePosition),
            "priority" => Ok(SortKey::Priority),
            "waitTime" | "wait_time" => Ok(SortKey::WaitTime),
            "checkInTime" | "check_in_time" => Ok(SortKey::CheckInTime),
            _ => Err(format!("Unknown sort key: '{}'", value)),
        }
    }
}

/// 组合过滤条件
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct QueueFilter {
    pub status: Option<EntryStatus>,
    pub doctor_id: Option<u32>,
    pub term: Option<String>,
}

impl QueueFilter {
    /// 是否会收窄可见集合；收窄时不允许拖拽重排
    pub fn is_narrowing(&self) -> bool {
        self.status.is_some()
            || self.doctor_id.is_some()
            || self.term.as_deref().map_or(false, |t| !t.trim().is_empty())
    }

    pub fn apply(&self, entries: &[QueueEntry]) -> Vec<QueueEntry> {
        let term = self.term.as_deref().map(str::trim).unwrap_or("").to_lowercase();
        entries
            .iter()
            .filter(|entry| self.status.map_or(true, |status| entry.status == status))
            .filter(|entry| self.doctor_id.map_or(true, |id| entry.doctor_id == id))
            .filter(|entry| term.is_empty() || matches_term(entry, &term))
            .cloned()
            .collect()
    }
}

fn matches_term(entry: &QueueEntry, term: &str) -> bool {
    entry.patient_name.to_lowercase().contains(term)
        || entry.patient_id.to_string().contains(term)
        || entry.doctor_name.to_lowercase().contains(term)
        || entry.reason_for_visit.to_lowercase().contains(term)
        || entry.phone.as_deref().map_or(false, |phone| phone.contains(term))
}

/// 按姓名、患者号、电话、就诊原因或医生搜索（不区分大小写）
pub fn search_patients(entries: &[QueueEntry], term: &str) -> Vec<QueueEntry> {
    QueueFilter {
        term: Some(term.to_string()),
        ..Default::default()
    }
    .apply(entries)
}

/// 按状态过滤，`None` 表示全部
pub fn filter_patients_by_status(entries: &[QueueEntry], status: Option<EntryStatus>) -> Vec<QueueEntry> {
    QueueFilter {
        status,
        ..Default::default()
    }
    .apply(entries)
}

/// 按医生过滤
pub fn filter_by_doctor(entries: &[QueueEntry], doctor_id: u32) -> Vec<QueueEntry> {
    QueueFilter {
        doctor_id: Some(doctor_id),
        ..Default::default()
    }
    .apply(entries)
}

/// 按字段排序（稳定排序）
pub fn sort_by_key(entries: &[QueueEntry], key: SortKey) -> Vec<QueueEntry> {
    let mut sorted = entries.to_vec();
    match key {
        SortKey::QueuePosition => sorted.sort_by_key(|entry| entry.queue_position),
        SortKey::Priority => sorted.sort_by_key(|entry| Reverse(entry.priority)),
        SortKey::WaitTime => sorted.sort_by_key(|entry| Reverse(entry.wait_time)),
        SortKey::CheckInTime => sorted.sort_by(|a, b| a.check_in_time.cmp(&b.check_in_time)),
    }
    sorted
}

/// 按字段名排序，未知字段保持原顺序
pub fn sort_patients(entries: &[QueueEntry], key: &str) -> Vec<QueueEntry> {
    match key.parse::<SortKey>() {
        Ok(key) => sort_by_key(entries, key),
        Err(e) => {
            tracing::debug!("{}, keeping queue order", e);
            entries.to_vec()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicq_core::{NewQueueEntry, Priority};

    fn sample() -> Vec<QueueEntry> {
        let rows = [
            (1, "Maria Lopez", Priority::Normal, 12, "08:10", "Follow-up"),
            (2, "Kwame Mensah", Priority::Emergency, 3, "08:40", "Chest pain"),
            (3, "Li Wei", Priority::Low, 25, "07:55", "Prescription refill"),
            (4, "Sara Haddad", Priority::High, 12, "08:05", "Fever"),
        ];
        rows.iter()
            .map(|(id, name, priority, wait, check_in, reason)| {
                let mut entry = QueueEntry::from_new(
                    NewQueueEntry::new(100 + id, *name, if id % 2 == 0 { 2 } else { 1 })
                        .with_priority(*priority)
                        .with_reason(*reason)
                        .with_doctor_name(if id % 2 == 0 { "Dr. Okafor" } else { "Dr. Brandt" })
                        .with_phone(format!("555-01{}", id)),
                    *id,
                    *id,
                    check_in.to_string(),
                );
                entry.wait_time = *wait;
                entry
            })
            .collect()
    }

    fn ids(entries: &[QueueEntry]) -> Vec<u32> {
        entries.iter().map(|e| e.queue_id).collect()
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let entries = sample();
        assert_eq!(ids(&search_patients(&entries, "maria")), vec![1]);
        assert_eq!(ids(&search_patients(&entries, "FEVER")), vec![4]);
        assert_eq!(ids(&search_patients(&entries, "okafor")), vec![2, 4]);
        assert_eq!(ids(&search_patients(&entries, "103")), vec![3]);
        assert_eq!(ids(&search_patients(&entries, "555-014")), vec![4]);
        assert_eq!(search_patients(&entries, "  ").len(), 4);
    }

    #[test]
    fn test_filter_by_status() {
        let mut entries = sample();
        entries[1].status = EntryStatus::InProgress;

        assert_eq!(ids(&filter_patients_by_status(&entries, Some(EntryStatus::InProgress))), vec![2]);
        assert_eq!(filter_patients_by_status(&entries, Some(EntryStatus::Waiting)).len(), 3);
        assert_eq!(filter_patients_by_status(&entries, None).len(), 4);
        assert_eq!(ids(&filter_by_doctor(&entries, 1)), vec![1, 3]);
    }

    #[test]
    fn test_sorting() {
        let entries = sample();

        assert_eq!(ids(&sort_patients(&entries, "priority")), vec![2, 4, 1, 3]);
        // 等待时间相同时保持原顺序
        assert_eq!(ids(&sort_patients(&entries, "waitTime")), vec![3, 1, 4, 2]);
        assert_eq!(ids(&sort_patients(&entries, "checkInTime")), vec![3, 4, 1, 2]);

        let reversed: Vec<QueueEntry> = entries.iter().rev().cloned().collect();
        assert_eq!(ids(&sort_patients(&reversed, "queuePosition")), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_unknown_sort_key_keeps_order() {
        let reversed: Vec<QueueEntry> = sample().into_iter().rev().collect();
        assert_eq!(ids(&sort_patients(&reversed, "age")), vec![4, 3, 2, 1]);
    }

    #[test]
    fn test_filter_narrowing() {
        assert!(!QueueFilter::default().is_narrowing());
        let filter = QueueFilter {
            term: Some(" ".to_string()),
            ..Default::default()
        };
        assert!(!filter.is_narrowing());
        let filter = QueueFilter {
            status: Some(EntryStatus::Waiting),
            ..Default::default()
        };
        assert!(filter.is_narrowing());
    }
}
