//! 队列导出
//!
//! 把当前队列投影为下载用的 JSON 记录，只读，不会被读回。

use clinicq_core::{EntryStatus, Priority, QueueEntry, Result};
use serde::{Deserialize, Serialize};

/// 导出记录
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ExportRecord {
    pub name: String,
    pub status: EntryStatus,
    pub priority: Priority,
    pub check_in_time: String,
    pub wait_time: u32,
    pub reason_for_visit: String,
    pub room_number: Option<String>,
}

impl From<&QueueEntry> for ExportRecord {
    fn from(entry: &QueueEntry) -> Self {
        Self {
            name: entry.patient_name.clone(),
            status: entry.status,
            priority: entry.priority,
            check_in_time: entry.check_in_time.clone(),
            wait_time: entry.wait_time,
            reason_for_visit: entry.reason_for_visit.clone(),
            room_number: entry.room_number.clone(),
        }
    }
}

pub fn export_records(entries: &[QueueEntry]) -> Vec<ExportRecord> {
    entries.iter().map(ExportRecord::from).collect()
}

/// 导出为格式化的 JSON 数组
pub fn export_json(entries: &[QueueEntry]) -> Result<String> {
    let json = serde_json::to_string_pretty(&export_records(entries))?;
    tracing::debug!("Exported {} queue entries", entries.len());
    Ok(json)
}

#[cfg(test)]
mod tests {
    use super::*;
    use clinicq_core::NewQueueEntry;

    #[test]
    fn test_export_shape() {
        let entry = QueueEntry::from_new(
            NewQueueEntry::new(5, "Noor Rahman", 2)
                .with_priority(Priority::High)
                .with_reason("Migraine")
                .with_room("B-12"),
            1,
            1,
            "10:15".to_string(),
        );

        let json = export_json(&[entry]).unwrap();
        let value: serde_json::Value = serde_json::from_str(&json).unwrap();
        let record = &value[0];

        assert_eq!(record["name"], "Noor Rahman");
        assert_eq!(record["status"], "WAITING");
        assert_eq!(record["priority"], "HIGH");
        assert_eq!(record["checkInTime"], "10:15");
        assert_eq!(record["waitTime"], 0);
        assert_eq!(record["reasonForVisit"], "Migraine");
        assert_eq!(record["roomNumber"], "B-12");
        assert_eq!(record.as_object().unwrap().len(), 7);
    }

    #[test]
    fn test_export_empty_queue() {
        assert_eq!(export_json(&[]).unwrap(), "[]");
    }
}
