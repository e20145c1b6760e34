use notify_api::{
    EventRecord, Notification, Opcode, TeamId, ThreadId, WatchFlags, SYSTEM_OBJECT_UPDATE,
    TEAM_ADDED, TEAM_EXEC, TEAM_MONITOR, TEAM_REMOVED, THREAD_ADDED, THREAD_MONITOR,
    THREAD_NAME_CHANGED, THREAD_REMOVED,
};

/// A raw event translated into what the dispatcher needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassifiedEvent {
    pub opcode: Opcode,
    /// Listener bits that match; any one of them is enough.
    pub flags: WatchFlags,
    pub team: TeamId,
    pub thread: Option<ThreadId>,
    pub name: Option<String>,
}

impl ClassifiedEvent {
    /// Team whose own group is consulted besides the wildcard group.
    ///
    /// Team lifecycle events only fan out through the wildcard group.
    pub fn team_group(&self) -> Option<TeamId> {
        if self.opcode.is_team_event() {
            None
        } else {
            Some(self.team)
        }
    }

    pub fn message(&self) -> Notification {
        Notification {
            what: SYSTEM_OBJECT_UPDATE,
            opcode: self.opcode,
            team: self.team,
            thread: self.thread,
            name: self.name.clone(),
        }
    }
}

/// Translate a raw record. Unknown monitors, unknown codes and thread events
/// without a thread id yield `None`.
pub fn classify(record: &EventRecord) -> Option<ClassifiedEvent> {
    let (opcode, flags) = match (record.what, record.event) {
        (TEAM_MONITOR, TEAM_ADDED) => (Opcode::TeamCreated, WatchFlags::TEAM_CREATION),
        (TEAM_MONITOR, TEAM_REMOVED) => (Opcode::TeamDeleted, WatchFlags::TEAM_DELETION),
        (TEAM_MONITOR, TEAM_EXEC) => (
            Opcode::TeamExec,
            WatchFlags::TEAM_CREATION | WatchFlags::TEAM_DELETION,
        ),
        (THREAD_MONITOR, THREAD_ADDED) => (Opcode::ThreadCreated, WatchFlags::THREAD_CREATION),
        (THREAD_MONITOR, THREAD_REMOVED) => (Opcode::ThreadDeleted, WatchFlags::THREAD_DELETION),
        (THREAD_MONITOR, THREAD_NAME_CHANGED) => {
            (Opcode::ThreadNameChanged, WatchFlags::THREAD_PROPERTIES)
        }
        _ => return None,
    };

    if opcode.is_team_event() {
        return Some(ClassifiedEvent {
            opcode,
            flags,
            team: record.team,
            thread: None,
            name: None,
        });
    }

    Some(ClassifiedEvent {
        opcode,
        flags,
        team: record.team,
        thread: Some(record.thread?),
        name: record.name.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn team_events() {
        let created = classify(&EventRecord::team(TEAM_ADDED, 8)).unwrap();
        assert_eq!(created.opcode, Opcode::TeamCreated);
        assert_eq!(created.flags, WatchFlags::TEAM_CREATION);
        assert_eq!(created.team_group(), None);

        let deleted = classify(&EventRecord::team(TEAM_REMOVED, 8)).unwrap();
        assert_eq!(deleted.opcode, Opcode::TeamDeleted);
        assert_eq!(deleted.flags, WatchFlags::TEAM_DELETION);
    }

    #[test]
    fn exec_matches_either_team_bit() {
        let exec = classify(&EventRecord::team(TEAM_EXEC, 3)).unwrap();
        assert_eq!(exec.opcode, Opcode::TeamExec);
        assert!(exec.flags.intersects(WatchFlags::TEAM_CREATION));
        assert!(exec.flags.intersects(WatchFlags::TEAM_DELETION));
        assert!(!exec.flags.intersects(WatchFlags::THREAD_CREATION));
    }

    #[test]
    fn thread_events_keep_team_group() {
        let record = EventRecord::thread(THREAD_NAME_CHANGED, 42, 420, Some("renamed".into()));
        let ev = classify(&record).unwrap();
        assert_eq!(ev.opcode, Opcode::ThreadNameChanged);
        assert_eq!(ev.flags, WatchFlags::THREAD_PROPERTIES);
        assert_eq!(ev.team_group(), Some(42));

        let msg = ev.message();
        assert_eq!(msg.what, SYSTEM_OBJECT_UPDATE);
        assert_eq!(msg.team, 42);
        assert_eq!(msg.thread, Some(420));
        assert_eq!(msg.name.as_deref(), Some("renamed"));
    }

    #[test]
    fn thread_event_without_thread_dropped() {
        let mut record = EventRecord::thread(THREAD_ADDED, 1, 2, None);
        record.thread = None;
        assert!(classify(&record).is_none());
    }

    #[test]
    fn unknown_events_dropped() {
        assert!(classify(&EventRecord::team(0x40, 1)).is_none());
        let mut record = EventRecord::team(TEAM_ADDED, 1);
        record.what = 0;
        assert!(classify(&record).is_none());
    }
}
