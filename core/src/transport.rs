use notify_api::{Notification, PortId, Token};
use thiserror::Error;

/// One delivery address.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Target {
    pub port: PortId,
    pub token: Token,
}

/// Why a single delivery failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SendError {
    /// The port no longer exists; the listener should go.
    #[error("destination gone")]
    DestinationGone,
    /// The port exists but cannot take the message right now.
    #[error("transient send failure")]
    Transient,
}

/// Message transport the dispatcher sends through.
pub trait Transport: Send + Sync {
    fn send(&self, target: Target, message: &Notification) -> Result<(), SendError>;

    /// Deliver one message to several targets.
    ///
    /// Returns the failed targets as indices into `targets`. Transports with
    /// native multi-target delivery override this.
    fn send_batch(&self, targets: &[Target], message: &Notification) -> Vec<(usize, SendError)> {
        targets
            .iter()
            .enumerate()
            .filter_map(|(i, target)| self.send(*target, message).err().map(|e| (i, e)))
            .collect()
    }
}
