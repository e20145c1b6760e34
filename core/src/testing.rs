use std::collections::HashSet;

use notify_api::{Notification, PortId};
use parking_lot::Mutex;

use crate::transport::{SendError, Target, Transport};

/// Transport that records every batch and fails on demand.
#[derive(Default)]
pub(crate) struct RecordingTransport {
    batches: Mutex<Vec<(Vec<Target>, Notification)>>,
    gone: Mutex<HashSet<PortId>>,
    full: Mutex<HashSet<PortId>>,
}

impl RecordingTransport {
    pub(crate) fn mark_gone(&self, port: PortId) {
        self.gone.lock().insert(port);
    }

    pub(crate) fn mark_full(&self, port: PortId) {
        self.full.lock().insert(port);
    }

    pub(crate) fn batches(&self) -> Vec<(Vec<Target>, Notification)> {
        self.batches.lock().clone()
    }

    pub(crate) fn messages(&self) -> Vec<Notification> {
        self.batches.lock().iter().map(|(_, m)| m.clone()).collect()
    }

    /// Messages that reached `target` successfully.
    pub(crate) fn deliveries_to(&self, target: Target) -> Vec<Notification> {
        let gone = self.gone.lock().clone();
        let full = self.full.lock().clone();
        if gone.contains(&target.port) || full.contains(&target.port) {
            return Vec::new();
        }
        self.batches
            .lock()
            .iter()
            .filter(|(targets, _)| targets.contains(&target))
            .map(|(_, m)| m.clone())
            .collect()
    }
}

impl Transport for RecordingTransport {
    fn send(&self, target: Target, _message: &Notification) -> Result<(), SendError> {
        if self.gone.lock().contains(&target.port) {
            Err(SendError::DestinationGone)
        } else if self.full.lock().contains(&target.port) {
            Err(SendError::Transient)
        } else {
            Ok(())
        }
    }

    fn send_batch(&self, targets: &[Target], message: &Notification) -> Vec<(usize, SendError)> {
        self.batches.lock().push((targets.to_vec(), message.clone()));
        targets
            .iter()
            .enumerate()
            .filter_map(|(i, t)| self.send(*t, message).err().map(|e| (i, e)))
            .collect()
    }
}
