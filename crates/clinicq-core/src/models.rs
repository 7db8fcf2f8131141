//! 核心数据模型定义

use crate::utils::{minutes_past, parse_time_of_day};
use chrono::{DateTime, NaiveTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// 未提供预计时长时的默认值（分钟）
pub const DEFAULT_ESTIMATED_DURATION: u32 = 15;

/// 排队状态
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EntryStatus {
    Waiting,    // 候诊
    InProgress, // 就诊中
    Completed,  // 已完成
    NoShow,     // 过号未到
    Cancelled,  // 已取消
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Waiting => "WAITING",
            EntryStatus::InProgress => "IN_PROGRESS",
            EntryStatus::Completed => "COMPLETED",
            EntryStatus::NoShow => "NO_SHOW",
            EntryStatus::Cancelled => "CANCELLED",
        }
    }

    /// 终态不再允许任何转换
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            EntryStatus::Completed | EntryStatus::NoShow | EntryStatus::Cancelled
        )
    }
}

impl fmt::Display for EntryStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EntryStatus {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().replace('-', "_").as_str() {
            "WAITING" => Ok(EntryStatus::Waiting),
            "IN_PROGRESS" => Ok(EntryStatus::InProgress),
            "COMPLETED" => Ok(EntryStatus::Completed),
            "NO_SHOW" => Ok(EntryStatus::NoShow),
            "CANCELLED" => Ok(EntryStatus::Cancelled),
            _ => Err(format!("Invalid status: '{}'", value)),
        }
    }
}

/// 优先级，按严重程度排序
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Priority {
    Low,
    #[default]
    Normal,
    High,
    Emergency,
}

impl Priority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::Low => "LOW",
            Priority::Normal => "NORMAL",
            Priority::High => "HIGH",
            Priority::Emergency => "EMERGENCY",
        }
    }
}

impl fmt::Display for Priority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Priority {
    type Err = String;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_uppercase().as_str() {
            "LOW" => Ok(Priority::Low),
            "NORMAL" => Ok(Priority::Normal),
            "HIGH" => Ok(Priority::High),
            "EMERGENCY" => Ok(Priority::Emergency),
            _ => Err(format!(
                "Invalid priority: '{}'. Must be one of: low, normal, high, emergency",
                value
            )),
        }
    }
}

/// 签到请求：由预约/患者数据源提供，不含队列分配的字段
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct NewQueueEntry {
    pub patient_id: u32,
    pub patient_name: String,
    #[serde(default)]
    pub age: Option<u32>,
    #[serde(default)]
    pub gender: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub appointment_id: Option<u32>,
    #[serde(default)]
    pub appointment_time: Option<String>, // HH:MM
    pub doctor_id: u32,
    #[serde(default)]
    pub doctor_name: String,
    #[serde(default)]
    pub department: Option<String>,
    #[serde(default)]
    pub priority: Priority,
    /// 预计时长（分钟），缺省时入队使用队列策略的默认值
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub estimated_duration: Option<u32>,
    #[serde(default)]
    pub room_number: Option<String>,
    #[serde(default)]
    pub reason_for_visit: String,
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub is_urgent: bool,
}

impl NewQueueEntry {
    /// 以最少字段创建签到请求
    pub fn new(patient_id: u32, patient_name: impl Into<String>, doctor_id: u32) -> Self {
        Self {
            patient_id,
            patient_name: patient_name.into(),
            age: None,
            gender: None,
            phone: None,
            email: None,
            appointment_id: None,
            appointment_time: None,
            doctor_id,
            doctor_name: String::new(),
            department: None,
            priority: Priority::Normal,
            estimated_duration: None,
            room_number: None,
            reason_for_visit: String::new(),
            notes: None,
            is_urgent: false,
        }
    }

    pub fn with_priority(mut self, priority: Priority) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_doctor_name(mut self, doctor_name: impl Into<String>) -> Self {
        self.doctor_name = doctor_name.into();
        self
    }

    pub fn with_estimated_duration(mut self, minutes: u32) -> Self {
        self.estimated_duration = Some(minutes);
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason_for_visit = reason.into();
        self
    }

    pub fn with_room(mut self, room_number: impl Into<String>) -> Self {
        self.room_number = Some(room_number.into());
        self
    }

    pub fn with_appointment_time(mut self, time: impl Into<String>) -> Self {
        self.appointment_time = Some(time.into());
        self
    }

    pub fn with_phone(mut self, phone: impl Into<String>) -> Self {
        self.phone = Some(phone.into());
        self
    }
}

/// 队列条目：某位患者在当天队列中的位置与状态
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct QueueEntry {
    pub queue_id: u32,
    pub queue_position: u32,
    pub patient_id: u32,
    pub patient_name: String,
    pub age: Option<u32>,
    pub gender: Option<String>,
    pub phone: Option<String>,
    pub email: Option<String>,
    pub appointment_id: Option<u32>,
    pub appointment_time: Option<String>,
    pub doctor_id: u32,
    pub doctor_name: String,
    pub department: Option<String>,
    pub status: EntryStatus,
    pub priority: Priority,
    pub check_in_time: String,
    pub estimated_duration: u32,
    pub wait_time: u32,
    pub actual_start_time: Option<String>,
    pub actual_end_time: Option<String>,
    pub room_number: Option<String>,
    pub reason_for_visit: String,
    pub notes: Option<String>,
    pub is_urgent: bool,
}

impl QueueEntry {
    /// 由签到请求生成候诊条目
    pub fn from_new(new: NewQueueEntry, queue_id: u32, queue_position: u32, check_in_time: String) -> Self {
        Self {
            queue_id,
            queue_position,
            patient_id: new.patient_id,
            patient_name: new.patient_name,
            age: new.age,
            gender: new.gender,
            phone: new.phone,
            email: new.email,
            appointment_id: new.appointment_id,
            appointment_time: new.appointment_time,
            doctor_id: new.doctor_id,
            doctor_name: new.doctor_name,
            department: new.department,
            status: EntryStatus::Waiting,
            priority: new.priority,
            check_in_time,
            // 预计时长必须为正
            estimated_duration: new
                .estimated_duration
                .unwrap_or(DEFAULT_ESTIMATED_DURATION)
                .max(1),
            wait_time: 0,
            actual_start_time: None,
            actual_end_time: None,
            room_number: new.room_number,
            reason_for_visit: new.reason_for_visit,
            notes: new.notes,
            is_urgent: new.is_urgent,
        }
    }

    /// 是否仍在队列中活动
    pub fn is_active(&self) -> bool {
        matches!(self.status, EntryStatus::Waiting | EntryStatus::InProgress)
    }

    /// 相对预约时间的延误分钟数
    pub fn delay_minutes_at(&self, now: NaiveTime) -> u32 {
        self.appointment_time
            .as_deref()
            .and_then(parse_time_of_day)
            .map(|scheduled| minutes_past(now, scheduled))
            .unwrap_or(0)
    }
}

/// 医生工作负载
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct DoctorWorkload {
    pub doctor_id: u32,
    pub doctor_name: String,
    pub in_progress: u32,
    pub waiting: u32,
    pub estimated_wait_minutes: u64,
}

/// 队列统计快照
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatistics {
    pub total_patients: u32,
    pub waiting: u32,
    pub in_progress: u32,
    pub completed: u32,
    pub no_show: u32,
    pub cancelled: u32,
    pub average_wait_time: f64,
    pub estimated_completion_time: String,
    pub doctor_workload: BTreeMap<u32, DoctorWorkload>,
}

/// 队列事件类型
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum QueueEventKind {
    PatientAdded { patient_id: u32, queue_id: u32, queue_position: u32 },
    PatientCalled { patient_id: u32 },
    ConsultationCompleted { patient_id: u32 },
    NextPatientStarted { patient_id: u32, patient_name: String },
    PatientRemoved { patient_id: u32 },
    MarkedNoShow { patient_id: u32 },
    Cancelled { patient_id: u32 },
    NotesUpdated { patient_id: u32 },
    QueueReordered { order: Vec<u32> },
    QueueRefreshed { waiting: u32 },
}

/// 队列事件，供通知层展示
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QueueEvent {
    pub id: Uuid,
    pub occurred_at: DateTime<Utc>,
    pub kind: QueueEventKind,
}

impl QueueEvent {
    pub fn new(kind: QueueEventKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            occurred_at: Utc::now(),
            kind,
        }
    }

    /// 面向用户的简短提示
    pub fn message(&self) -> String {
        match &self.kind {
            QueueEventKind::PatientAdded { patient_id, queue_position, .. } => {
                format!("Patient {} added to queue at position {}", patient_id, queue_position)
            }
            QueueEventKind::PatientCalled { patient_id } => format!("Patient {} called", patient_id),
            QueueEventKind::ConsultationCompleted { patient_id } => {
                format!("Consultation completed for patient {}", patient_id)
            }
            QueueEventKind::NextPatientStarted { patient_name, .. } => {
                format!("Next patient {} started consultation", patient_name)
            }
            QueueEventKind::PatientRemoved { patient_id } => {
                format!("Patient {} removed from queue", patient_id)
            }
            QueueEventKind::MarkedNoShow { patient_id } => {
                format!("Patient {} marked as no-show", patient_id)
            }
            QueueEventKind::Cancelled { patient_id } => format!("Patient {} cancelled", patient_id),
            QueueEventKind::NotesUpdated { patient_id } => {
                format!("Notes updated for patient {}", patient_id)
            }
            QueueEventKind::QueueReordered { order } => {
                format!("Queue reordered ({} entries)", order.len())
            }
            QueueEventKind::QueueRefreshed { waiting } => {
                format!("Queue refreshed, {} waiting", waiting)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_priority_ordering_by_severity() {
        assert!(Priority::Emergency > Priority::High);
        assert!(Priority::High > Priority::Normal);
        assert!(Priority::Normal > Priority::Low);
        assert_eq!("emergency".parse::<Priority>(), Ok(Priority::Emergency));
        assert!("urgent".parse::<Priority>().is_err());
    }

    #[test]
    fn test_status_serialization() {
        let json = serde_json::to_string(&EntryStatus::InProgress).unwrap();
        assert_eq!(json, "\"IN_PROGRESS\"");
        assert_eq!("no-show".parse::<EntryStatus>(), Ok(EntryStatus::NoShow));
        assert!(EntryStatus::Cancelled.is_terminal());
        assert!(!EntryStatus::Waiting.is_terminal());
    }

    #[test]
    fn test_new_entry_defaults_from_json() {
        let json = r#"{"patientId": 7, "patientName": "Amina Yusuf", "doctorId": 3}"#;
        let new: NewQueueEntry = serde_json::from_str(json).unwrap();
        assert_eq!(new.estimated_duration, None);
        assert_eq!(new.priority, Priority::Normal);
        assert!(!new.is_urgent);

        let entry = QueueEntry::from_new(new, 1, 1, "08:00".to_string());
        assert_eq!(entry.estimated_duration, DEFAULT_ESTIMATED_DURATION);
    }

    #[test]
    fn test_delay_minutes() {
        let entry = QueueEntry::from_new(
            NewQueueEntry::new(1, "Test", 1).with_appointment_time("10:00"),
            1,
            1,
            "09:50".to_string(),
        );
        let now = NaiveTime::from_hms_opt(10, 12, 30).unwrap();
        assert_eq!(entry.delay_minutes_at(now), 12);
        let early = NaiveTime::from_hms_opt(9, 55, 0).unwrap();
        assert_eq!(entry.delay_minutes_at(early), 0);

        let walk_in = QueueEntry::from_new(NewQueueEntry::new(2, "Walk-in", 1), 2, 2, "09:51".to_string());
        assert_eq!(walk_in.delay_minutes_at(now), 0);
    }
}
