//! Attention locks: face a conversation partner and hold still for a turn

mod geometry;
mod lock;
mod manager;

pub use geometry::{bearing_deg, heading_delta_deg, required_turn_deg, Vec3};
pub use lock::{normalize_name, Lock, LockId, LockKind};
pub use manager::{AttentionLocks, LockRefused};
