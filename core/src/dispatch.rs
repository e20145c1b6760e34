use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use notify_api::EventRecord;
use serde::Serialize;
use tracing::{debug, trace, warn};

use crate::events::classify;
use crate::registry::Registry;
use crate::target::WatchTarget;
use crate::transport::{SendError, Target};

/// Upper bound of destinations sharing one outbound message.
pub const MAX_BATCH_TARGETS: usize = 8;

/// Callback handed to the event source.
pub type EventSink = Arc<dyn Fn(&EventRecord) + Send + Sync>;

/// A destination picked for one event, with the group it came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Matched {
    pub(crate) group: WatchTarget,
    pub(crate) target: Target,
}

#[derive(Default)]
pub(crate) struct DispatchStats {
    events: AtomicU64,
    batches: AtomicU64,
    deliveries: AtomicU64,
    removed: AtomicU64,
    transient_failures: AtomicU64,
}

/// Counters since the registry was created.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    /// Recognized events handed to `notify`.
    pub events: u64,
    pub batches: u64,
    pub deliveries: u64,
    /// Listeners removed because their port was gone.
    pub removed: u64,
    pub transient_failures: u64,
}

impl DispatchStats {
    fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            events: self.events.load(Ordering::Relaxed),
            batches: self.batches.load(Ordering::Relaxed),
            deliveries: self.deliveries.load(Ordering::Relaxed),
            removed: self.removed.load(Ordering::Relaxed),
            transient_failures: self.transient_failures.load(Ordering::Relaxed),
        }
    }
}

impl Registry {
    /// Deliver an event to every matching listener. Never fails; send errors
    /// are absorbed here.
    pub fn notify(&self, record: &EventRecord) {
        let Some(event) = classify(record) else {
            trace!(what = record.what, event = record.event, "dropping unrecognized event");
            return;
        };
        let stats = &self.shared.stats;
        stats.events.fetch_add(1, Ordering::Relaxed);

        let matched = {
            let state = self.shared.state.lock();
            state.matching_targets(event.team_group(), event.flags)
        };
        if matched.is_empty() {
            return;
        }

        let message = event.message();
        debug!(
            opcode = ?event.opcode,
            team = event.team,
            targets = matched.len(),
            "dispatching event"
        );

        for batch in matched.chunks(MAX_BATCH_TARGETS) {
            let targets: Vec<Target> = batch.iter().map(|m| m.target).collect();
            let failures = self.shared.transport.send_batch(&targets, &message);
            stats.batches.fetch_add(1, Ordering::Relaxed);
            stats
                .deliveries
                .fetch_add((targets.len() - failures.len()) as u64, Ordering::Relaxed);

            for (index, err) in failures {
                let Some(failed) = batch.get(index) else {
                    continue;
                };
                match err {
                    SendError::DestinationGone => {
                        let Target { port, token } = failed.target;
                        if self.remove_matching(failed.group, port, token) {
                            stats.removed.fetch_add(1, Ordering::Relaxed);
                        }
                    }
                    SendError::Transient => {
                        stats.transient_failures.fetch_add(1, Ordering::Relaxed);
                        warn!(
                            port = failed.target.port,
                            token = failed.target.token,
                            opcode = ?event.opcode,
                            "notification dropped: {err}"
                        );
                    }
                }
            }
        }
    }

    /// Callback for the event source. Holds the registry weakly, so events
    /// arriving after shutdown are ignored.
    pub fn event_sink(&self) -> EventSink {
        let shared = Arc::downgrade(&self.shared);
        Arc::new(move |record: &EventRecord| {
            if let Some(shared) = shared.upgrade() {
                Registry { shared }.notify(record);
            }
        })
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.shared.stats.snapshot()
    }
}
