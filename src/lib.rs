//! # Clinicq
//!
//! 门诊患者排队管理系统，汇总导出各子模块。

pub use clinicq_admin as admin;
pub use clinicq_core as queue_core;
pub use clinicq_workflow as workflow;

pub use clinicq_core::{NewQueueEntry, Priority, QueueEntry, QueueError};
pub use clinicq_workflow::{QueueManager, QueueService};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_facade_exports() {
        let mut manager = QueueManager::new();
        let entry = manager.add_patient_to_queue(
            NewQueueEntry::new(1, "Nadia Haddad", 1).with_priority(Priority::High),
        );
        assert_eq!(entry.status, queue_core::EntryStatus::Waiting);
        assert!(workflow::EntryStateMachine::new().can_transition(entry.status, workflow::EntryEvent::Call));
    }
}
