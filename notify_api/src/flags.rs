use std::fmt;
use std::ops::{BitOr, BitOrAssign};

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Interest mask of a system watcher.
///
/// Only the bits named below are representable; [`WatchFlags::from_bits`]
/// rejects anything else.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct WatchFlags(u32);

impl WatchFlags {
    /// Team creation. Also fires on `exec()`.
    pub const TEAM_CREATION: Self = Self(0x01);
    /// Team deletion. Also fires on `exec()`.
    pub const TEAM_DELETION: Self = Self(0x02);
    pub const THREAD_CREATION: Self = Self(0x04);
    pub const THREAD_DELETION: Self = Self(0x08);
    /// Thread name or priority changes.
    pub const THREAD_PROPERTIES: Self = Self(0x10);
    pub const ALL: Self = Self(0x1f);

    const NAMES: [(Self, &'static str); 5] = [
        (Self::TEAM_CREATION, "team_creation"),
        (Self::TEAM_DELETION, "team_deletion"),
        (Self::THREAD_CREATION, "thread_creation"),
        (Self::THREAD_DELETION, "thread_deletion"),
        (Self::THREAD_PROPERTIES, "thread_properties"),
    ];

    pub const fn empty() -> Self {
        Self(0)
    }

    /// Convert a raw mask, returning `None` if it carries unknown bits.
    pub const fn from_bits(bits: u32) -> Option<Self> {
        if bits & !Self::ALL.0 != 0 {
            None
        } else {
            Some(Self(bits))
        }
    }

    pub const fn bits(self) -> u32 {
        self.0
    }

    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// True if every bit of `other` is set.
    pub const fn contains(self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    /// True if at least one bit of `other` is set.
    pub const fn intersects(self, other: Self) -> bool {
        self.0 & other.0 != 0
    }

    pub fn remove(&mut self, other: Self) {
        self.0 &= !other.0;
    }

    /// Iterate the names of the set bits, lowest first.
    pub fn names(self) -> impl Iterator<Item = &'static str> {
        Self::NAMES
            .into_iter()
            .filter(move |(flag, _)| self.contains(*flag))
            .map(|(_, name)| name)
    }
}

impl BitOr for WatchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for WatchFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl fmt::Debug for WatchFlags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            return write!(f, "WatchFlags(empty)");
        }
        let names: Vec<_> = self.names().collect();
        write!(f, "WatchFlags({})", names.join(" | "))
    }
}

impl Serialize for WatchFlags {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u32(self.0)
    }
}

impl<'de> Deserialize<'de> for WatchFlags {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let bits = u32::deserialize(deserializer)?;
        Self::from_bits(bits)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown watch flags {bits:#x}")))
    }
}
