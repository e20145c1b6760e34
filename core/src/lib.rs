pub mod cli;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod events;
pub mod ipc;
pub mod owner;
pub mod ports;
pub mod registry;
pub mod server;
pub mod target;
pub mod transport;

#[cfg(test)]
mod testing;

pub use config::Config;
pub use dispatch::{EventSink, StatsSnapshot, MAX_BATCH_TARGETS};
pub use error::{Error, Result};
pub use owner::Owner;
pub use ports::PortTable;
pub use registry::{ListenerId, ListenerInfo, Registry};
pub use target::WatchTarget;
pub use transport::{SendError, Target, Transport};
