//! Lock bookkeeping, settlement and periodic re-facing

use super::geometry::required_turn_deg;
use super::lock::{normalize_name, Lock, LockId, LockKind};
use crate::config::AttentionConfig;
use crate::runtime::{DeferredAction, EntityId, EntityRef, TimerId, Timers, World};
use std::collections::{HashMap, HashSet};
use std::time::Instant;
use thiserror::Error;

/// Routine refusal; callers log it and carry on
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("lock refused for {entity}: {reason}")]
pub struct LockRefused {
    pub entity: String,
    pub reason: String,
}

/// All active attention locks.
///
/// An entity holds at most one lock. The name index lets callers ask whether
/// a character is mid-conversation without touching live entity state.
#[derive(Debug)]
pub struct AttentionLocks {
    config: AttentionConfig,
    static_names: HashSet<String>,
    next_id: u64,
    locks: HashMap<LockId, Lock>,
    by_entity: HashMap<EntityId, LockId>,
    names: HashMap<LockId, String>,
    name_counts: HashMap<String, usize>,
    last_refresh: Option<Instant>,
}

impl AttentionLocks {
    pub fn new(config: AttentionConfig) -> Self {
        let static_names = config
            .static_entities
            .iter()
            .map(|n| normalize_name(n))
            .filter(|n| !n.is_empty())
            .collect();
        Self {
            config,
            static_names,
            next_id: 0,
            locks: HashMap::new(),
            by_entity: HashMap::new(),
            names: HashMap::new(),
            name_counts: HashMap::new(),
            last_refresh: None,
        }
    }

    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }

    pub fn get(&self, id: LockId) -> Option<&Lock> {
        self.locks.get(&id)
    }

    pub fn lock_for(&self, entity: EntityId) -> Option<LockId> {
        self.by_entity.get(&entity).copied()
    }

    /// Whether a character with this name currently holds a lock
    pub fn is_in_conversation(&self, name: &str) -> bool {
        self.name_counts
            .get(&normalize_name(name))
            .is_some_and(|n| *n > 0)
    }

    fn kind_for(&self, world: &dyn World, entity: &EntityRef) -> LockKind {
        if world.is_companion(entity) {
            LockKind::Companion
        } else if self.static_names.contains(&normalize_name(&entity.name))
            || world.is_stationed(entity)
        {
            LockKind::Static
        } else {
            LockKind::Normal {
                pending_freeze: None,
            }
        }
    }

    /// Turn `entity` toward `target` and hold it there.
    ///
    /// Re-locking an entity releases its previous lock first. A large turn
    /// returns immediately with the freeze scheduled on `timers`.
    pub fn lock(
        &mut self,
        world: &dyn World,
        timers: &mut Timers,
        entity: &EntityRef,
        target: &EntityRef,
        now: Instant,
    ) -> Result<LockId, LockRefused> {
        let refusal = world
            .lock_refusal()
            .or_else(|| world.entity_refusal(entity));
        if let Some(reason) = refusal {
            tracing::info!(entity = %entity.name, reason = %reason, "Attention lock refused");
            return Err(LockRefused {
                entity: entity.name.clone(),
                reason,
            });
        }

        if let Some(previous) = self.lock_for(entity.id) {
            self.release(world, timers, previous);
        }

        self.next_id += 1;
        let id = LockId::new(self.next_id);
        let mut kind = self.kind_for(world, entity);
        let mut is_locked = true;

        match &mut kind {
            LockKind::Static => {}
            LockKind::Companion => world.halt_movement(entity),
            LockKind::Normal { pending_freeze } => {
                let turn = match (world.pose(entity), world.pose(target)) {
                    (Some(from), Some(to)) => {
                        required_turn_deg(from.position, from.yaw_deg, to.position)
                    }
                    _ => 0.0,
                };
                // The scheduler only stops default behavior while a task is
                // assigned, so the face task always goes first
                world.face_toward(entity, target);
                if turn > self.config.turn_threshold_deg {
                    *pending_freeze = Some(timers.schedule(
                        now + self.config.turn_settle_delay,
                        DeferredAction::FreezeLock(id),
                    ));
                    is_locked = false;
                } else {
                    world.set_scheduling(entity, false);
                    world.freeze(entity);
                }
            }
        }

        tracing::info!(
            lock_id = %id,
            entity = %entity.name,
            target = %target.name,
            kind = kind.label(),
            settled = is_locked,
            "Attention locked"
        );

        let name = normalize_name(&entity.name);
        *self.name_counts.entry(name.clone()).or_insert(0) += 1;
        self.names.insert(id, name);
        self.by_entity.insert(entity.id, id);
        self.locks.insert(
            id,
            Lock {
                id,
                entity: entity.clone(),
                target: target.clone(),
                kind,
                is_locked,
                created_at: now,
            },
        );
        Ok(id)
    }

    /// Restore autonomous behavior. Unknown ids are ignored.
    pub fn release(&mut self, world: &dyn World, timers: &mut Timers, id: LockId) -> bool {
        let Some(lock) = self.locks.remove(&id) else {
            tracing::debug!(lock_id = %id, "Release of unknown lock ignored");
            return false;
        };

        if self.by_entity.get(&lock.entity.id) == Some(&id) {
            self.by_entity.remove(&lock.entity.id);
        }
        if let Some(name) = self.names.remove(&id) {
            if let Some(count) = self.name_counts.get_mut(&name) {
                *count -= 1;
                if *count == 0 {
                    self.name_counts.remove(&name);
                }
            }
        }

        match lock.kind {
            LockKind::Normal { pending_freeze } => {
                if let Some(timer) = pending_freeze {
                    timers.cancel(timer);
                }
                world.set_scheduling(&lock.entity, true);
            }
            LockKind::Companion => world.resume_movement(&lock.entity),
            LockKind::Static => {}
        }

        tracing::info!(lock_id = %id, entity = %lock.entity.name, "Attention released");
        true
    }

    /// Release every lock; returns how many were held
    pub fn release_all(&mut self, world: &dyn World, timers: &mut Timers) -> usize {
        let mut ids: Vec<LockId> = self.locks.keys().copied().collect();
        ids.sort();
        for id in &ids {
            self.release(world, timers, *id);
        }
        self.last_refresh = None;
        ids.len()
    }

    /// Deferred half of a large-turn lock. Does nothing if the lock was
    /// released or re-issued since the timer was armed.
    pub fn complete_deferred(&mut self, world: &dyn World, id: LockId, timer: TimerId) -> bool {
        let Some(lock) = self.locks.get_mut(&id) else {
            tracing::debug!(lock_id = %id, "Deferred freeze for released lock");
            return false;
        };
        match &mut lock.kind {
            LockKind::Normal { pending_freeze } if *pending_freeze == Some(timer) => {
                *pending_freeze = None;
            }
            _ => {
                tracing::debug!(lock_id = %id, "Stale deferred freeze ignored");
                return false;
            }
        }
        if world.pose(&lock.entity).is_none() {
            tracing::debug!(lock_id = %id, entity = %lock.entity.name, "Entity gone before freeze");
            return false;
        }
        world.set_scheduling(&lock.entity, false);
        world.freeze(&lock.entity);
        lock.is_locked = true;
        tracing::info!(lock_id = %id, entity = %lock.entity.name, "Attention lock settled");
        true
    }

    /// Periodic maintenance while locks are held. Releases everything if
    /// locking became disallowed; otherwise re-locks settled normal locks
    /// whose bearing drifted past the turn threshold. Returns the number of
    /// locks released or replaced.
    pub fn refresh(&mut self, world: &dyn World, timers: &mut Timers, now: Instant) -> usize {
        if self.locks.is_empty() {
            return 0;
        }
        if let Some(reason) = world.lock_refusal() {
            tracing::info!(reason = %reason, "Locking disallowed, releasing all attention locks");
            return self.release_all(world, timers);
        }
        if self
            .last_refresh
            .is_some_and(|at| now.saturating_duration_since(at) < self.config.refresh_interval)
        {
            return 0;
        }
        self.last_refresh = Some(now);

        let mut drifted: Vec<(LockId, EntityRef, EntityRef)> = self
            .locks
            .values()
            .filter(|lock| lock.wants_reface())
            .filter(|lock| {
                match (world.pose(&lock.entity), world.pose(&lock.target)) {
                    (Some(from), Some(to)) => {
                        required_turn_deg(from.position, from.yaw_deg, to.position)
                            > self.config.turn_threshold_deg
                    }
                    _ => false,
                }
            })
            .map(|lock| (lock.id, lock.entity.clone(), lock.target.clone()))
            .collect();
        drifted.sort_by_key(|(id, _, _)| *id);

        for (id, entity, target) in &drifted {
            tracing::debug!(lock_id = %id, entity = %entity.name, "Re-facing drifted entity");
            self.release(world, timers, *id);
            if let Err(e) = self.lock(world, timers, entity, target, now) {
                tracing::info!(error = %e, "Re-lock after drift failed");
            }
        }
        drifted.len()
    }
}
