use std::collections::HashMap;
use std::sync::atomic::{AtomicI32, Ordering};

use notify_api::{Delivery, Notification, PortId};
use parking_lot::Mutex;
use tokio::sync::mpsc::{self, error::TrySendError};
use tracing::debug;

use crate::transport::{SendError, Target, Transport};

pub type PortReceiver = mpsc::Receiver<Delivery>;

pub const DEFAULT_PORT_CAPACITY: usize = 64;

/// In-process message ports backed by bounded channels.
pub struct PortTable {
    ports: Mutex<HashMap<PortId, mpsc::Sender<Delivery>>>,
    next_port: AtomicI32,
    default_capacity: usize,
}

impl PortTable {
    pub fn new(default_capacity: usize) -> Self {
        Self {
            ports: Mutex::new(HashMap::new()),
            next_port: AtomicI32::new(1),
            default_capacity: default_capacity.max(1),
        }
    }

    /// Create a port. The port lives until deleted or until its receiver
    /// is dropped.
    pub fn create_port(&self, capacity: Option<usize>) -> (PortId, PortReceiver) {
        let capacity = capacity.unwrap_or(self.default_capacity).max(1);
        let (tx, rx) = mpsc::channel(capacity);
        let port = self.next_port.fetch_add(1, Ordering::Relaxed);
        self.ports.lock().insert(port, tx);
        debug!(port, capacity, "port created");
        (port, rx)
    }

    /// Delete a port. Messages already queued stay readable.
    pub fn delete_port(&self, port: PortId) -> bool {
        let removed = self.ports.lock().remove(&port).is_some();
        if removed {
            debug!(port, "port deleted");
        }
        removed
    }

    /// Delete every port.
    pub fn close_all(&self) {
        let closed = std::mem::take(&mut *self.ports.lock());
        if !closed.is_empty() {
            debug!(ports = closed.len(), "ports closed");
        }
    }

    pub fn contains(&self, port: PortId) -> bool {
        self.ports.lock().contains_key(&port)
    }
}

impl Default for PortTable {
    fn default() -> Self {
        Self::new(DEFAULT_PORT_CAPACITY)
    }
}

impl Transport for PortTable {
    fn send(&self, target: Target, message: &Notification) -> Result<(), SendError> {
        let sender = self
            .ports
            .lock()
            .get(&target.port)
            .cloned()
            .ok_or(SendError::DestinationGone)?;
        let delivery = Delivery {
            port: target.port,
            token: target.token,
            message: message.clone(),
        };
        match sender.try_send(delivery) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(SendError::Transient),
            Err(TrySendError::Closed(_)) => {
                // receiver dropped: the port is dead for good
                self.ports.lock().remove(&target.port);
                Err(SendError::DestinationGone)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify_api::{Opcode, SYSTEM_OBJECT_UPDATE};

    fn message() -> Notification {
        Notification {
            what: SYSTEM_OBJECT_UPDATE,
            opcode: Opcode::TeamCreated,
            team: 1,
            thread: None,
            name: None,
        }
    }

    #[tokio::test]
    async fn delivers_with_token() {
        let table = PortTable::default();
        let (port, mut rx) = table.create_port(None);
        table.send(Target { port, token: 9 }, &message()).unwrap();
        let delivery = rx.recv().await.unwrap();
        assert_eq!(delivery.port, port);
        assert_eq!(delivery.token, 9);
        assert_eq!(delivery.message, message());
    }

    #[test]
    fn unknown_port_is_gone() {
        let table = PortTable::default();
        assert_eq!(
            table.send(Target { port: 77, token: 0 }, &message()),
            Err(SendError::DestinationGone)
        );
    }

    #[test]
    fn full_port_is_transient() {
        let table = PortTable::new(1);
        let (port, _rx) = table.create_port(None);
        let target = Target { port, token: 0 };
        table.send(target, &message()).unwrap();
        assert_eq!(table.send(target, &message()), Err(SendError::Transient));
        assert!(table.contains(port));
    }

    #[test]
    fn dropped_receiver_is_gone() {
        let table = PortTable::default();
        let (port, rx) = table.create_port(Some(4));
        drop(rx);
        assert_eq!(
            table.send(Target { port, token: 0 }, &message()),
            Err(SendError::DestinationGone)
        );
        assert!(!table.contains(port));
    }

    #[tokio::test]
    async fn deleted_port_drains_then_closes() {
        let table = PortTable::default();
        let (port, mut rx) = table.create_port(None);
        table.send(Target { port, token: 1 }, &message()).unwrap();
        assert!(table.delete_port(port));
        assert!(!table.delete_port(port));
        assert_eq!(
            table.send(Target { port, token: 1 }, &message()),
            Err(SendError::DestinationGone)
        );
        assert!(rx.recv().await.is_some());
        assert!(rx.recv().await.is_none());
    }

    #[test]
    fn batch_reports_failed_indices() {
        let table = PortTable::default();
        let (a, _rx_a) = table.create_port(None);
        let (b, rx_b) = table.create_port(None);
        drop(rx_b);
        let targets = [
            Target { port: a, token: 0 },
            Target { port: b, token: 0 },
            Target { port: 999, token: 0 },
        ];
        let failures = table.send_batch(&targets, &message());
        assert_eq!(
            failures,
            vec![(1, SendError::DestinationGone), (2, SendError::DestinationGone)]
        );
    }
}
