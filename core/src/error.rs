use notify_api::{PortId, RpcError, Token};
use thiserror::Error;

use crate::target::WatchTarget;

/// Errors returned by the subscription API and the stdio host.
#[derive(Debug, Error)]
pub enum Error {
    /// Malformed subscribe/unsubscribe request.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// No listener matches the given object, port and token.
    #[error("no listener for {target} on port {port} with token {token}")]
    NotFound {
        target: WatchTarget,
        port: PortId,
        token: Token,
    },

    /// The listener table is at capacity.
    #[error("listener table full ({0} listeners)")]
    ResourceExhausted(usize),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, Error>;

impl Error {
    /// Numeric code used in stdio error responses.
    pub fn code(&self) -> i32 {
        match self {
            Error::InvalidArgument(_) | Error::Json(_) => -32602,
            Error::NotFound { .. } => -32004,
            Error::ResourceExhausted(_) => -32005,
            Error::Io(_) => -32603,
        }
    }
}

impl From<&Error> for RpcError {
    fn from(err: &Error) -> Self {
        RpcError {
            code: err.code(),
            message: err.to_string(),
        }
    }
}
