//! Mock implementations for testing
//!
//! These mocks enable runtime and transport tests without a game client or
//! a backend socket.

use super::traits::*;
use crate::attention::Vec3;
use crate::transport::Dialer;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet, VecDeque};
use std::io;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::DuplexStream;

// ============================================================================
// Scripted Dialer
// ============================================================================

/// Hands out pre-created in-memory pipes; refuses when none are queued.
/// Clones share the same script.
#[derive(Clone, Default)]
pub struct ScriptedDialer {
    streams: Arc<Mutex<VecDeque<DuplexStream>>>,
    attempts: Arc<AtomicUsize>,
    /// How long each dial takes before answering
    latency: Duration,
}

impl ScriptedDialer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Dialer whose every attempt takes `latency` to resolve, like a slow
    /// or unreachable host
    pub fn with_latency(latency: Duration) -> Self {
        Self {
            latency,
            ..Self::default()
        }
    }

    /// Queue a connection for the next dial and return the backend's end
    pub fn push_stream(&self) -> DuplexStream {
        let (ours, peer) = tokio::io::duplex(64 * 1024);
        self.streams.lock().unwrap().push_back(ours);
        peer
    }

    /// Shared dial counter
    pub fn attempts(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.attempts)
    }
}

#[async_trait]
impl Dialer for ScriptedDialer {
    type Stream = DuplexStream;

    async fn dial(&self) -> io::Result<DuplexStream> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if !self.latency.is_zero() {
            tokio::time::sleep(self.latency).await;
        }
        self.streams.lock().unwrap().pop_front().ok_or_else(|| {
            io::Error::new(io::ErrorKind::ConnectionRefused, "no scripted connection")
        })
    }
}

// ============================================================================
// Mock Simulation
// ============================================================================

/// Movement command issued through `World`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WorldCall {
    FaceToward(EntityId, EntityId),
    SetScheduling(EntityId, bool),
    Freeze(EntityId),
    HaltMovement(EntityId),
    ResumeMovement(EntityId),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayCall {
    Show { speaker: String, text: String },
    Hide,
    Notify(String),
}

/// In-memory world implementing every collaborator trait, recording calls
#[derive(Default)]
pub struct MockSimulation {
    nearby: Mutex<Vec<NearbyEntity>>,
    poses: Mutex<HashMap<EntityId, EntityPose>>,
    player: Mutex<Option<EntityRef>>,
    camera: Mutex<Option<CameraPose>>,
    global_refusal: Mutex<Option<String>>,
    entity_refusals: Mutex<HashMap<EntityId, String>>,
    companions: Mutex<HashSet<EntityId>>,
    stationed: Mutex<HashSet<EntityId>>,
    /// Record of all movement commands
    pub world_calls: Mutex<Vec<WorldCall>>,
    pub display_calls: Mutex<Vec<DisplayCall>>,
    pub muted: Mutex<Vec<EntityId>>,
    pub unmute_all_calls: AtomicUsize,
    /// (entity, channel, value) in call order
    pub facial: Mutex<Vec<(EntityId, String, f32)>>,
}

impl MockSimulation {
    pub fn new() -> Self {
        Self::default()
    }

    /// Spawn a visible entity near the player
    pub fn add_entity(&self, entity: &EntityRef, pose: EntityPose) {
        let distance = (pose.position.x.powi(2) + pose.position.y.powi(2)).sqrt();
        self.nearby.lock().unwrap().push(NearbyEntity {
            entity: entity.clone(),
            distance,
            bearing_deg: 0.0,
            visible: true,
        });
        self.poses.lock().unwrap().insert(entity.id, pose);
    }

    pub fn add_nearby(&self, row: NearbyEntity) {
        self.nearby.lock().unwrap().push(row);
    }

    pub fn set_pose(&self, id: EntityId, pose: EntityPose) {
        self.poses.lock().unwrap().insert(id, pose);
    }

    pub fn despawn(&self, id: EntityId) {
        self.poses.lock().unwrap().remove(&id);
        self.nearby.lock().unwrap().retain(|n| n.entity.id != id);
    }

    pub fn set_player(&self, player: &EntityRef, pose: EntityPose) {
        *self.player.lock().unwrap() = Some(player.clone());
        self.poses.lock().unwrap().insert(player.id, pose);
    }

    pub fn set_camera(&self, position: Vec3, yaw_deg: f32, pitch_deg: f32) {
        *self.camera.lock().unwrap() = Some(CameraPose {
            position,
            yaw_deg,
            pitch_deg,
        });
    }

    pub fn refuse_all(&self, reason: Option<String>) {
        *self.global_refusal.lock().unwrap() = reason;
    }

    pub fn refuse_entity(&self, entity: &EntityRef, reason: &str) {
        self.entity_refusals
            .lock()
            .unwrap()
            .insert(entity.id, reason.to_string());
    }

    pub fn mark_companion(&self, entity: &EntityRef) {
        self.companions.lock().unwrap().insert(entity.id);
    }

    pub fn mark_stationed(&self, entity: &EntityRef) {
        self.stationed.lock().unwrap().insert(entity.id);
    }

    pub fn world_calls(&self) -> Vec<WorldCall> {
        self.world_calls.lock().unwrap().clone()
    }

    pub fn display_calls(&self) -> Vec<DisplayCall> {
        self.display_calls.lock().unwrap().clone()
    }

    pub fn muted(&self) -> Vec<EntityId> {
        self.muted.lock().unwrap().clone()
    }

    pub fn unmute_all_count(&self) -> usize {
        self.unmute_all_calls.load(Ordering::SeqCst)
    }

    /// Last value written to a facial channel
    pub fn channel(&self, id: EntityId, channel: &str) -> Option<f32> {
        self.facial
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|(e, c, _)| *e == id && c == channel)
            .map(|(_, _, v)| *v)
    }

    pub fn clear_calls(&self) {
        self.world_calls.lock().unwrap().clear();
        self.display_calls.lock().unwrap().clear();
        self.facial.lock().unwrap().clear();
    }

    fn record(&self, call: WorldCall) {
        self.world_calls.lock().unwrap().push(call);
    }
}

impl EntityLookup for MockSimulation {
    fn nearby(&self) -> Vec<NearbyEntity> {
        self.nearby.lock().unwrap().clone()
    }

    fn player(&self) -> Option<EntityRef> {
        self.player.lock().unwrap().clone()
    }

    fn camera(&self) -> Option<CameraPose> {
        *self.camera.lock().unwrap()
    }
}

impl World for MockSimulation {
    fn lock_refusal(&self) -> Option<String> {
        self.global_refusal.lock().unwrap().clone()
    }

    fn entity_refusal(&self, entity: &EntityRef) -> Option<String> {
        self.entity_refusals.lock().unwrap().get(&entity.id).cloned()
    }

    fn pose(&self, entity: &EntityRef) -> Option<EntityPose> {
        self.poses.lock().unwrap().get(&entity.id).copied()
    }

    fn is_companion(&self, entity: &EntityRef) -> bool {
        self.companions.lock().unwrap().contains(&entity.id)
    }

    fn is_stationed(&self, entity: &EntityRef) -> bool {
        self.stationed.lock().unwrap().contains(&entity.id)
    }

    fn face_toward(&self, entity: &EntityRef, target: &EntityRef) {
        self.record(WorldCall::FaceToward(entity.id, target.id));
    }

    fn set_scheduling(&self, entity: &EntityRef, enabled: bool) {
        self.record(WorldCall::SetScheduling(entity.id, enabled));
    }

    fn freeze(&self, entity: &EntityRef) {
        self.record(WorldCall::Freeze(entity.id));
    }

    fn halt_movement(&self, entity: &EntityRef) {
        self.record(WorldCall::HaltMovement(entity.id));
    }

    fn resume_movement(&self, entity: &EntityRef) {
        self.record(WorldCall::ResumeMovement(entity.id));
    }
}

impl Display for MockSimulation {
    fn show_text(&self, speaker: &str, text: &str) {
        self.display_calls.lock().unwrap().push(DisplayCall::Show {
            speaker: speaker.to_string(),
            text: text.to_string(),
        });
    }

    fn hide_text(&self) {
        self.display_calls.lock().unwrap().push(DisplayCall::Hide);
    }

    fn notify(&self, text: &str) {
        self.display_calls
            .lock()
            .unwrap()
            .push(DisplayCall::Notify(text.to_string()));
    }
}

impl AudioMuter for MockSimulation {
    fn mute(&self, entity: &EntityRef) {
        self.muted.lock().unwrap().push(entity.id);
    }

    fn unmute_all(&self) {
        self.unmute_all_calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl FacialRig for MockSimulation {
    fn set_channel(&self, entity: &EntityRef, channel: &str, value: f32) {
        self.facial
            .lock()
            .unwrap()
            .push((entity.id, channel.to_string(), value));
    }
}
