//! Core type definitions.

use std::fmt;

/// Identifier of an open table.
///
/// Assigned by the registry on the first open of a name. Ids increase
/// monotonically and are never handed out twice, so a stale id held after
/// its table was retired can never alias a newer table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TableId(pub u64);

impl TableId {
    /// Creates a table ID.
    #[must_use]
    pub const fn new(id: u64) -> Self {
        Self(id)
    }

    /// Returns the raw ID value.
    #[must_use]
    pub const fn as_u64(self) -> u64 {
        self.0
    }
}

impl From<TableId> for u64 {
    fn from(id: TableId) -> Self {
        id.0
    }
}

impl fmt::Display for TableId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "table:{}", self.0)
    }
}

/// A point-in-time view of one open table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableInfo {
    /// The table's id.
    pub id: TableId,
    /// The host-visible table name.
    pub name: String,
    /// Outstanding open calls.
    pub open_refs: u64,
}

/// What a `close` did to the handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CloseOutcome {
    /// Other references remain; the id stays valid.
    StillOpen {
        /// References left after this close.
        remaining: u64,
    },
    /// This was the last reference; the id is now permanently invalid.
    Retired,
}

impl CloseOutcome {
    /// Returns true if the close removed the handle.
    #[must_use]
    pub const fn is_retired(self) -> bool {
        matches!(self, Self::Retired)
    }
}
