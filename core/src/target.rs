use std::fmt;

use notify_api::{TeamId, ANY_OBJECT};

use crate::error::{Error, Result};

/// Object a listener watches.
///
/// `All` is the wildcard; it never collides with a real team id because it
/// is not a team id at all. Only the wire format spells it `-1`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WatchTarget {
    All,
    Team(TeamId),
}

impl WatchTarget {
    /// Parse a raw object id: `-1` is the wildcard, other negatives are invalid.
    pub fn from_raw(object: i32) -> Result<Self> {
        match object {
            ANY_OBJECT => Ok(WatchTarget::All),
            id if id >= 0 => Ok(WatchTarget::Team(id)),
            id => Err(Error::InvalidArgument(format!("bad object id {id}"))),
        }
    }
}

impl fmt::Display for WatchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WatchTarget::All => write!(f, "all teams"),
            WatchTarget::Team(id) => write!(f, "team {id}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn raw_conversion() {
        assert_eq!(WatchTarget::from_raw(-1).unwrap(), WatchTarget::All);
        assert_eq!(WatchTarget::from_raw(0).unwrap(), WatchTarget::Team(0));
        assert_eq!(WatchTarget::from_raw(42).unwrap(), WatchTarget::Team(42));
        assert!(matches!(
            WatchTarget::from_raw(-2),
            Err(Error::InvalidArgument(_))
        ));
    }
}
