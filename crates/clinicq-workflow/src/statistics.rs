//! 队列统计
//!
//! 每次队列变化后重新计算的只读汇总

use chrono::NaiveTime;
use clinicq_core::utils::time_after_minutes;
use clinicq_core::{DoctorWorkload, EntryStatus, QueueEntry, QueueStatistics};

/// 根据当前队列计算统计快照
pub fn compute_statistics(entries: &[QueueEntry], now: NaiveTime) -> QueueStatistics {
    let mut stats = QueueStatistics {
        total_patients: entries.len() as u32,
        ..Default::default()
    };

    let mut total_wait: u64 = 0;
    let mut remaining_minutes: u64 = 0;

    for entry in entries {
        match entry.status {
            EntryStatus::Waiting => {
                stats.waiting += 1;
                total_wait += u64::from(entry.wait_time);
                remaining_minutes += u64::from(entry.estimated_duration);
            }
            EntryStatus::InProgress => stats.in_progress += 1,
            EntryStatus::Completed => stats.completed += 1,
            EntryStatus::NoShow => stats.no_show += 1,
            EntryStatus::Cancelled => stats.cancelled += 1,
        }

        // 只统计仍在排队的患者
        if entry.is_active() {
            let workload = stats
                .doctor_workload
                .entry(entry.doctor_id)
                .or_insert_with(|| DoctorWorkload {
                    doctor_id: entry.doctor_id,
                    doctor_name: entry.doctor_name.clone(),
                    ..Default::default()
                });

            if entry.status == EntryStatus::InProgress {
                workload.in_progress += 1;
            } else {
                workload.waiting += 1;
                workload.estimated_wait_minutes += u64::from(entry.estimated_duration);
            }
        }
    }

    if stats.waiting > 0 {
        stats.average_wait_time = total_wait as f64 / f64::from(stats.waiting);
    }
    stats.estimated_completion_time = time_after_minutes(now, remaining_minutes);

    stats
}
