use serde::{Deserialize, Serialize};

use crate::{TeamId, ThreadId};

const fn four_cc(code: &[u8; 4]) -> u32 {
    u32::from_be_bytes(*code)
}

/// `what` of raw team events handed in by the event source.
pub const TEAM_MONITOR: u32 = four_cc(b"_Tm_");
pub const TEAM_ADDED: u32 = 0x01;
pub const TEAM_REMOVED: u32 = 0x02;
pub const TEAM_EXEC: u32 = 0x04;

/// `what` of raw thread events handed in by the event source.
pub const THREAD_MONITOR: u32 = four_cc(b"_tm_");
pub const THREAD_ADDED: u32 = 0x01;
pub const THREAD_REMOVED: u32 = 0x02;
pub const THREAD_NAME_CHANGED: u32 = 0x04;

/// `what` of every outbound notification.
pub const SYSTEM_OBJECT_UPDATE: u32 = four_cc(b"SOUP");

/// Raw lifecycle event as produced by the team/thread event source.
///
/// The record is opaque to producers: the service decides what it means
/// from `what` and `event` and silently drops anything it does not know.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct EventRecord {
    pub what: u32,
    pub event: u32,
    pub team: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl EventRecord {
    pub fn team(event: u32, team: TeamId) -> Self {
        Self {
            what: TEAM_MONITOR,
            event,
            team,
            thread: None,
            name: None,
        }
    }

    pub fn thread(event: u32, team: TeamId, thread: ThreadId, name: Option<String>) -> Self {
        Self {
            what: THREAD_MONITOR,
            event,
            team,
            thread: Some(thread),
            name,
        }
    }
}

/// Opcode carried by outbound notifications.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Opcode {
    TeamCreated = 0,
    TeamDeleted = 1,
    TeamExec = 2,
    ThreadCreated = 3,
    ThreadDeleted = 4,
    ThreadNameChanged = 5,
}

impl Opcode {
    pub const ALL: [Opcode; 6] = [
        Opcode::TeamCreated,
        Opcode::TeamDeleted,
        Opcode::TeamExec,
        Opcode::ThreadCreated,
        Opcode::ThreadDeleted,
        Opcode::ThreadNameChanged,
    ];

    pub fn raw(self) -> u32 {
        self as u32
    }

    pub fn is_team_event(self) -> bool {
        matches!(
            self,
            Opcode::TeamCreated | Opcode::TeamDeleted | Opcode::TeamExec
        )
    }
}

/// Message delivered to every matching watcher.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct Notification {
    pub what: u32,
    pub opcode: Opcode,
    pub team: TeamId,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thread: Option<ThreadId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}
