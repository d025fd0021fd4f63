//! Collaborator seams for the simulation client
//!
//! The runtime never touches the game directly; everything entity-related
//! goes through these traits so the executor can be driven by mocks.

use crate::attention::Vec3;
use std::fmt;
use std::sync::Arc;

/// Opaque handle the simulation uses for a live entity
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EntityId(pub u64);

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Entity reference resolved once at turn admission
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct EntityRef {
    pub id: EntityId,
    pub name: String,
}

impl EntityRef {
    pub fn new(id: u64, name: impl Into<String>) -> Self {
        Self {
            id: EntityId(id),
            name: name.into(),
        }
    }
}

/// Result row of a nearby-entity scan
#[derive(Debug, Clone)]
pub struct NearbyEntity {
    pub entity: EntityRef,
    pub distance: f32,
    /// Horizontal bearing from the player, degrees
    pub bearing_deg: f32,
    pub visible: bool,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EntityPose {
    pub position: Vec3,
    /// Facing, degrees
    pub yaw_deg: f32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CameraPose {
    pub position: Vec3,
    pub yaw_deg: f32,
    pub pitch_deg: f32,
}

/// Nearby-entity scan and camera lookup
pub trait EntityLookup: Send + Sync {
    /// Named entities around the player
    fn nearby(&self) -> Vec<NearbyEntity>;

    /// The player character, if spawned
    fn player(&self) -> Option<EntityRef>;

    fn camera(&self) -> Option<CameraPose>;
}

/// Movement and scheduling control over live entities
pub trait World: Send + Sync {
    /// Reason locking is disallowed for everyone right now (player in a
    /// restricted movement mode, cutscene)
    fn lock_refusal(&self) -> Option<String>;

    /// Reason this entity cannot be locked (combat, dead)
    fn entity_refusal(&self, entity: &EntityRef) -> Option<String>;

    /// `None` when the entity has despawned
    fn pose(&self, entity: &EntityRef) -> Option<EntityPose>;

    /// The tracked follower
    fn is_companion(&self, entity: &EntityRef) -> bool;

    /// Stationed at a fixed post and animation-driven
    fn is_stationed(&self, entity: &EntityRef) -> bool;

    /// Assign a turn-to-face task
    fn face_toward(&self, entity: &EntityRef, target: &EntityRef);

    fn set_scheduling(&self, entity: &EntityRef, enabled: bool);

    fn freeze(&self, entity: &EntityRef);

    fn halt_movement(&self, entity: &EntityRef);

    fn resume_movement(&self, entity: &EntityRef);
}

/// Subtitle and HUD text
pub trait Display: Send + Sync {
    fn show_text(&self, speaker: &str, text: &str);

    fn hide_text(&self);

    fn notify(&self, text: &str);
}

/// Silences an entity's native voice while the backend's audio plays
pub trait AudioMuter: Send + Sync {
    fn mute(&self, entity: &EntityRef);

    fn unmute_all(&self);
}

/// Facial blend-shape output
pub trait FacialRig: Send + Sync {
    fn set_channel(&self, entity: &EntityRef, channel: &str, value: f32);
}

/// Everything the runtime needs from the simulation
pub trait Simulation: EntityLookup + World + Display + AudioMuter + FacialRig {}
impl<T: EntityLookup + World + Display + AudioMuter + FacialRig> Simulation for T {}

// ============================================================================
// Arc implementations for shared collaborators
// ============================================================================

impl<T: EntityLookup + ?Sized> EntityLookup for Arc<T> {
    fn nearby(&self) -> Vec<NearbyEntity> {
        (**self).nearby()
    }

    fn player(&self) -> Option<EntityRef> {
        (**self).player()
    }

    fn camera(&self) -> Option<CameraPose> {
        (**self).camera()
    }
}

impl<T: World + ?Sized> World for Arc<T> {
    fn lock_refusal(&self) -> Option<String> {
        (**self).lock_refusal()
    }

    fn entity_refusal(&self, entity: &EntityRef) -> Option<String> {
        (**self).entity_refusal(entity)
    }

    fn pose(&self, entity: &EntityRef) -> Option<EntityPose> {
        (**self).pose(entity)
    }

    fn is_companion(&self, entity: &EntityRef) -> bool {
        (**self).is_companion(entity)
    }

    fn is_stationed(&self, entity: &EntityRef) -> bool {
        (**self).is_stationed(entity)
    }

    fn face_toward(&self, entity: &EntityRef, target: &EntityRef) {
        (**self).face_toward(entity, target);
    }

    fn set_scheduling(&self, entity: &EntityRef, enabled: bool) {
        (**self).set_scheduling(entity, enabled);
    }

    fn freeze(&self, entity: &EntityRef) {
        (**self).freeze(entity);
    }

    fn halt_movement(&self, entity: &EntityRef) {
        (**self).halt_movement(entity);
    }

    fn resume_movement(&self, entity: &EntityRef) {
        (**self).resume_movement(entity);
    }
}

impl<T: Display + ?Sized> Display for Arc<T> {
    fn show_text(&self, speaker: &str, text: &str) {
        (**self).show_text(speaker, text);
    }

    fn hide_text(&self) {
        (**self).hide_text();
    }

    fn notify(&self, text: &str) {
        (**self).notify(text);
    }
}

impl<T: AudioMuter + ?Sized> AudioMuter for Arc<T> {
    fn mute(&self, entity: &EntityRef) {
        (**self).mute(entity);
    }

    fn unmute_all(&self) {
        (**self).unmute_all();
    }
}

impl<T: FacialRig + ?Sized> FacialRig for Arc<T> {
    fn set_channel(&self, entity: &EntityRef, channel: &str, value: f32) {
        (**self).set_channel(entity, channel, value);
    }
}
