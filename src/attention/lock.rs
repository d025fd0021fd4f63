//! Lock records

use crate::runtime::{EntityRef, TimerId};
use std::fmt;
use std::time::Instant;

/// Issued in increasing order and never reused
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LockId(u64);

impl LockId {
    pub(crate) const fn new(raw: u64) -> Self {
        Self(raw)
    }
}

impl fmt::Display for LockId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// How an entity is held in place
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockKind {
    /// Scheduler-driven entity. Faces its target, then has scheduling
    /// disabled. `pending_freeze` is set while a turn animation plays out.
    Normal { pending_freeze: Option<TimerId> },
    /// Tracked follower: movement halted directly, scheduler untouched
    Companion,
    /// Immovable or animation-driven; bookkeeping only
    Static,
}

impl LockKind {
    pub fn label(&self) -> &'static str {
        match self {
            LockKind::Normal { .. } => "normal",
            LockKind::Companion => "companion",
            LockKind::Static => "static",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Lock {
    pub id: LockId,
    pub entity: EntityRef,
    pub target: EntityRef,
    pub kind: LockKind,
    /// True once the entity is actually held (deferred for large turns)
    pub is_locked: bool,
    pub created_at: Instant,
}

impl Lock {
    /// Subject to periodic re-facing
    pub fn wants_reface(&self) -> bool {
        matches!(self.kind, LockKind::Normal { .. }) && self.is_locked
    }
}

/// Lowercase alphanumerics only, so "Sir Nicholas" and "sir-nicholas" match
pub fn normalize_name(name: &str) -> String {
    name.chars()
        .filter(|c| c.is_alphanumeric())
        .flat_map(char::to_lowercase)
        .collect()
}
