//! 排队状态机
//!
//! 管理队列条目从候诊到就诊结束的状态转换

use clinicq_core::{EntryStatus, QueueError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// 状态转换事件
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum EntryEvent {
    Call,
    Complete,
    MarkNoShow,
    Cancel,
}

/// 排队状态机
#[derive(Debug)]
pub struct EntryStateMachine {
    transitions: HashMap<(EntryStatus, EntryEvent), EntryStatus>,
}

impl EntryStateMachine {
    /// 创建新的状态机实例
    pub fn new() -> Self {
        let mut transitions = HashMap::new();

        // 只允许向前推进，不存在回到候诊的路径
        transitions.insert((EntryStatus::Waiting, EntryEvent::Call), EntryStatus::InProgress);
        transitions.insert((EntryStatus::InProgress, EntryEvent::Complete), EntryStatus::Completed);
        transitions.insert((EntryStatus::Waiting, EntryEvent::MarkNoShow), EntryStatus::NoShow);
        transitions.insert((EntryStatus::Waiting, EntryEvent::Cancel), EntryStatus::Cancelled);

        Self { transitions }
    }

    /// 检查状态转换是否有效
    pub fn can_transition(&self, from: EntryStatus, event: EntryEvent) -> bool {
        self.transitions.contains_key(&(from, event))
    }

    /// 执行状态转换
    pub fn transition(&self, from: EntryStatus, event: EntryEvent) -> Result<EntryStatus> {
        match self.transitions.get(&(from, event)) {
            Some(to) => Ok(*to),
            None => Err(QueueError::InvalidStateTransition {
                from: from.to_string(),
                event: format!("{:?}", event),
            }),
        }
    }

    /// 获取所有可能的状态
    pub fn get_all_states() -> Vec<EntryStatus> {
        vec![
            EntryStatus::Waiting,
            EntryStatus::InProgress,
            EntryStatus::Completed,
            EntryStatus::NoShow,
            EntryStatus::Cancelled,
        ]
    }

    /// 获取状态的所有可能事件
    pub fn get_possible_events(&self, current_state: EntryStatus) -> Vec<EntryEvent> {
        self.transitions
            .keys()
            .filter(|(state, _)| *state == current_state)
            .map(|(_, event)| *event)
            .collect()
    }
}

impl Default for EntryStateMachine {
    fn default() -> Self {
        Self::new()
    }
}
