//! Conversation runtime executor
//!
//! Owns every piece of mutable conversation state: playback state, transport,
//! viseme engine, attention locks, timers and the actor cache. Nothing else
//! mutates them, and all mutation happens inside `tick`.

use super::timers::{DeferredAction, Timers};
use super::traits::{EntityRef, Simulation};
use crate::attention::{normalize_name, AttentionLocks};
use crate::config::SyncConfig;
use crate::protocol::{AudioAnchors, InboundMessage, OutboundMessage, TurnAnnouncement};
use crate::state_machine::{transition, ConvContext, ConvState, Effect, Event, Phase, Turn};
use crate::transport::{Dialer, Transport};
use crate::viseme::{CloseStep, Pose, VisemeEngine};
use std::collections::{HashMap, VecDeque};
use std::time::{Duration, Instant};

/// Conversation runtime, generic over how the backend is reached and over
/// the simulation it drives
pub struct ConversationRuntime<D: Dialer, S: Simulation> {
    context: ConvContext,
    state: ConvState,
    transport: Transport<D>,
    sim: S,
    viseme: VisemeEngine,
    locks: AttentionLocks,
    timers: Timers,
    /// Normalized name -> entity, filled by resolution scans
    actor_cache: HashMap<String, EntityRef>,
    /// Entity whose face the viseme engine currently drives
    animated: Option<EntityRef>,
    positions_interval: Duration,
    last_positions: Option<Instant>,
}

impl<D: Dialer, S: Simulation> ConversationRuntime<D, S> {
    pub fn new(config: &SyncConfig, dialer: D, sim: S) -> Self {
        Self {
            context: ConvContext::new(config.player_id.clone()),
            state: ConvState::default(),
            transport: Transport::new(dialer, &config.transport),
            sim,
            viseme: VisemeEngine::new(config.viseme.clone()),
            locks: AttentionLocks::new(config.attention.clone()),
            timers: Timers::new(),
            actor_cache: HashMap::new(),
            animated: None,
            positions_interval: config.driver.positions_interval,
            last_positions: None,
        }
    }

    pub fn state(&self) -> &ConvState {
        &self.state
    }

    pub fn transport(&self) -> &Transport<D> {
        &self.transport
    }

    pub fn locks(&self) -> &AttentionLocks {
        &self.locks
    }

    pub fn viseme(&self) -> &VisemeEngine {
        &self.viseme
    }

    pub fn timers(&self) -> &Timers {
        &self.timers
    }

    pub fn simulation(&self) -> &S {
        &self.sim
    }

    /// Whether a character is part of the running conversation
    pub fn is_in_conversation(&self, name: &str) -> bool {
        self.locks.is_in_conversation(name)
    }

    /// One simulation tick. Order is fixed so a frame received this tick
    /// affects this tick's animation output.
    pub async fn tick(&mut self, now: Instant) {
        self.transport.connect(now);

        for message in self.transport.poll() {
            self.handle_message(message, now).await;
        }

        for (timer, action) in self.timers.drain_due(now) {
            match action {
                DeferredAction::FreezeLock(lock_id) => {
                    self.locks.complete_deferred(&self.sim, lock_id, timer);
                }
            }
        }

        self.locks.refresh(&self.sim, &mut self.timers, now);
        self.animate(now).await;
        self.send_positions(now).await;
    }

    /// Drop all local conversation state and close the connection. Used on
    /// shutdown; the backend is not notified.
    pub async fn shutdown(&mut self) {
        self.timers.clear();
        self.reset_face();
        self.locks.release_all(&self.sim, &mut self.timers);
        self.sim.unmute_all();
        self.sim.hide_text();
        self.actor_cache.clear();
        self.state = ConvState::default();
        self.transport.disconnect();
        tracing::info!("Conversation runtime stopped");
    }

    // ========================================================================
    // Inbound dispatch
    // ========================================================================

    pub async fn handle_message(&mut self, message: InboundMessage, now: Instant) {
        match message {
            InboundMessage::PlayTurn(announcement) | InboundMessage::QueueItem { item: announcement } => {
                self.admit(announcement, now).await;
            }
            InboundMessage::LipsyncStart {
                turn_id,
                visemes,
                speaker,
                scale,
            } => {
                tracing::debug!(speaker = %speaker, frames = visemes.len(), "Lipsync start");
                self.process_event(
                    Event::LipsyncStart {
                        turn_id: InboundMessage::non_empty(turn_id),
                        visemes,
                        scale,
                    },
                    now,
                )
                .await;
            }
            InboundMessage::LipsyncStop => self.process_event(Event::LipsyncStop, now).await,
            InboundMessage::Visemes { turn_id, frames } => {
                let count = frames.len();
                let turn_id = InboundMessage::non_empty(turn_id);
                if !self.viseme.load_frames(turn_id.as_deref(), frames) {
                    tracing::debug!(turn_id = ?turn_id, count, "Dropped visemes for inactive turn");
                }
            }
            InboundMessage::AudioSync { turn_id, position } => {
                match self.viseme.drift_correct(position, &turn_id, now) {
                    Some(offset) => {
                        tracing::trace!(turn_id = %turn_id, position, offset, "Audio drift corrected");
                    }
                    None => {
                        tracing::debug!(turn_id = %turn_id, "Dropped audio sync for inactive turn");
                    }
                }
            }
            InboundMessage::ConversationState { state, interrupted } => match state.as_str() {
                "idle" => self.process_event(Event::BackendIdle, now).await,
                "playing" => {
                    self.process_event(Event::BackendPlaying { interrupted }, now)
                        .await;
                }
                other => tracing::debug!(state = %other, "Ignoring conversation state"),
            },
            InboundMessage::Reset => self.process_event(Event::Reset, now).await,
            InboundMessage::PlayerMessage { speaker, text } => {
                let speaker = if speaker.is_empty() {
                    self.context.player_id.clone()
                } else {
                    speaker
                };
                self.sim.show_text(&speaker, &text);
            }
            InboundMessage::Notification { text } => self.sim.notify(&text),
            InboundMessage::PrepareSpeaker {
                speaker_id,
                speaker_name,
            } => {
                let found = self.resolve(&speaker_id).is_some()
                    || speaker_name
                        .as_deref()
                        .is_some_and(|name| self.resolve(name).is_some());
                tracing::info!(speaker_id = %speaker_id, found, "Speaker prepared");
                self.send(OutboundMessage::SpeakerReady { speaker_id, found }, now)
                    .await;
            }
        }
    }

    /// Resolve entities once, at admission, and queue the turn. A turn that
    /// starts a conversation resolves against a fresh scan.
    async fn admit(&mut self, announcement: TurnAnnouncement, now: Instant) {
        if self.state.phase == Phase::Idle {
            self.actor_cache.clear();
        }
        let mut speaker = self.resolve(&announcement.speaker_id);
        if speaker.is_none() && !announcement.display_name.is_empty() {
            speaker = self.resolve(&announcement.display_name);
        }
        let target = announcement
            .target_id
            .as_deref()
            .and_then(|id| self.resolve(id));

        if speaker.is_none() {
            tracing::info!(
                turn_id = %announcement.turn_id,
                speaker_id = %announcement.speaker_id,
                "Speaker not found, playing without actor"
            );
        }
        let turn = Turn::from_announcement(announcement, speaker, target);
        self.process_event(Event::TurnAdmitted { turn }, now).await;
    }

    /// Find an entity by backend id or name. The player id maps to the
    /// player; everyone else comes from a nearby scan, visible and closest
    /// first.
    fn resolve(&mut self, id: &str) -> Option<EntityRef> {
        if self.context.is_player(id) {
            return self.sim.player();
        }
        let key = normalize_name(id);
        if key.is_empty() {
            return None;
        }
        if let Some(hit) = self.actor_cache.get(&key) {
            return Some(hit.clone());
        }

        let found = self
            .sim
            .nearby()
            .into_iter()
            .filter(|n| normalize_name(&n.entity.name) == key)
            .min_by(|a, b| {
                b.visible
                    .cmp(&a.visible)
                    .then(a.distance.total_cmp(&b.distance))
            })
            .map(|n| n.entity)?;
        self.actor_cache.insert(key, found.clone());
        Some(found)
    }

    // ========================================================================
    // State machine
    // ========================================================================

    async fn process_event(&mut self, event: Event, now: Instant) {
        // Effects may produce follow-up events; handle them in order
        let mut events_to_process = VecDeque::from([event]);

        while let Some(current_event) = events_to_process.pop_front() {
            let name = current_event.name();
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    tracing::debug!(event = name, phase = %self.state.phase, error = %e, "Event rejected");
                    continue;
                }
            };

            let old_phase = self.state.phase;
            self.state = result.new_state;
            if old_phase != self.state.phase {
                tracing::info!(
                    event = name,
                    from = %old_phase,
                    to = %self.state.phase,
                    turn_id = ?self.state.current_turn_id,
                    "Phase changed"
                );
            }

            for effect in result.effects {
                if let Some(generated_event) = self.execute_effect(effect, now).await {
                    events_to_process.push_back(generated_event);
                }
            }
        }
    }

    async fn execute_effect(&mut self, effect: Effect, now: Instant) -> Option<Event> {
        match effect {
            Effect::SendTurnReady { turn_id } => {
                let turn = self.state.queue.get(&turn_id)?.clone();
                let positions = turn.speaker.as_ref().and_then(|s| self.anchors(s));
                let message = OutboundMessage::TurnReady {
                    actor_found: turn.speaker.is_some(),
                    is_player_speaker: self.context.is_player(&turn.speaker_id),
                    has_positions: positions.is_some(),
                    positions,
                    turn_id,
                };
                self.send(message, now).await;
                None
            }
            Effect::SendLipsyncReady { turn_id } => {
                self.send(OutboundMessage::LipsyncReady { turn_id }, now).await;
                None
            }
            Effect::SendTurnComplete => {
                self.send(OutboundMessage::TurnComplete, now).await;
                None
            }
            Effect::SendResetAck => {
                self.send(OutboundMessage::Reset, now).await;
                None
            }

            Effect::StartTimeline {
                turn_id,
                visemes,
                scale,
            } => {
                if let Some(previous) = self.animated.take() {
                    apply_pose(&self.sim, &previous, Pose::NEUTRAL);
                }
                // The player's face belongs to the game, not the backend
                self.animated = self
                    .state
                    .queue
                    .get(&turn_id)
                    .filter(|t| !self.context.is_player(&t.speaker_id))
                    .and_then(|t| t.speaker.clone());
                self.viseme.begin_turn(&turn_id, visemes, scale, now);
                self.last_positions = None;
                None
            }
            Effect::StopTimeline => {
                if self.animated.is_none() {
                    // Actor-less turn: no mouth to close
                    self.viseme.reset();
                    return Some(Event::CloseComplete);
                }
                self.viseme.stop();
                None
            }
            Effect::ResetTimeline => {
                self.reset_face();
                None
            }

            Effect::LockAttention { turn_id } => {
                if let Some(turn) = self.state.queue.get(&turn_id).cloned() {
                    self.lock_turn(&turn, now);
                }
                None
            }
            Effect::ReleaseAllLocks => {
                let released = self.locks.release_all(&self.sim, &mut self.timers);
                if released > 0 {
                    tracing::info!(count = released, "Released attention locks");
                }
                None
            }

            Effect::MuteSpeaker { turn_id } => {
                let turn = self.state.queue.get(&turn_id)?;
                if let Some(speaker) = &turn.speaker {
                    if !self.context.is_player(&turn.speaker_id) {
                        self.sim.mute(speaker);
                    }
                }
                None
            }
            Effect::UnmuteAll => {
                self.sim.unmute_all();
                None
            }
            Effect::ShowTurnText { turn_id } => {
                let turn = self.state.queue.get(&turn_id)?;
                if !turn.text.is_empty() {
                    self.sim.show_text(turn.label(), &turn.text);
                }
                None
            }
            Effect::HideText => {
                self.sim.hide_text();
                None
            }
            Effect::ClearActorCache => {
                self.actor_cache.clear();
                None
            }
            Effect::CancelTimers => {
                self.timers.clear();
                None
            }
        }
    }

    /// Speaker faces target; target faces speaker unless it is the player.
    /// Refusals are routine and only logged.
    fn lock_turn(&mut self, turn: &Turn, now: Instant) {
        let (Some(speaker), Some(target)) = (&turn.speaker, &turn.target) else {
            return;
        };
        if speaker.id == target.id {
            return;
        }
        let speaker_is_player = self.context.is_player(&turn.speaker_id);
        let target_is_player = turn
            .target_id
            .as_deref()
            .is_some_and(|id| self.context.is_player(id));

        if !speaker_is_player {
            if let Err(e) = self
                .locks
                .lock(&self.sim, &mut self.timers, speaker, target, now)
            {
                tracing::info!(turn_id = %turn.turn_id, error = %e, "Speaker not locked");
            }
        }
        if !target_is_player {
            if let Err(e) = self
                .locks
                .lock(&self.sim, &mut self.timers, target, speaker, now)
            {
                tracing::info!(turn_id = %turn.turn_id, error = %e, "Target not locked");
            }
        }
    }

    // ========================================================================
    // Per-tick output
    // ========================================================================

    async fn animate(&mut self, now: Instant) {
        match self.state.phase {
            Phase::Playing => {
                if let Some(pose) = self.viseme.tick(now) {
                    if let Some(entity) = &self.animated {
                        apply_pose(&self.sim, entity, pose);
                    }
                }
            }
            Phase::Closing => match self.viseme.close_step() {
                Some(CloseStep::Decaying(pose)) => {
                    if let Some(entity) = &self.animated {
                        apply_pose(&self.sim, entity, pose);
                    }
                }
                Some(CloseStep::Complete { timed_out }) => {
                    if timed_out {
                        tracing::warn!(turn_id = ?self.state.current_turn_id, "Mouth close timed out, forcing completion");
                    }
                    if let Some(entity) = self.animated.take() {
                        apply_pose(&self.sim, &entity, Pose::NEUTRAL);
                    }
                    self.process_event(Event::CloseComplete, now).await;
                }
                None => {
                    // Engine was reset underneath us; never stall in closing
                    self.animated = None;
                    self.process_event(Event::CloseComplete, now).await;
                }
            },
            Phase::Idle | Phase::Preparing => {}
        }
    }

    async fn send_positions(&mut self, now: Instant) {
        if self.state.phase != Phase::Playing {
            return;
        }
        if self
            .last_positions
            .is_some_and(|at| now.saturating_duration_since(at) < self.positions_interval)
        {
            return;
        }
        let Some(speaker) = self.state.current_turn().and_then(|t| t.speaker.clone()) else {
            return;
        };
        if let Some(anchors) = self.anchors(&speaker) {
            self.last_positions = Some(now);
            self.send(OutboundMessage::Positions(anchors), now).await;
        }
    }

    /// Camera and speaker positions for 3D audio, if both are known
    fn anchors(&self, speaker: &EntityRef) -> Option<AudioAnchors> {
        let camera = self.sim.camera()?;
        let npc = self.sim.pose(speaker)?;
        Some(AudioAnchors {
            cam_x: camera.position.x,
            cam_y: camera.position.y,
            cam_z: camera.position.z,
            cam_yaw: camera.yaw_deg,
            cam_pitch: camera.pitch_deg,
            npc_x: npc.position.x,
            npc_y: npc.position.y,
            npc_z: npc.position.z,
        })
    }

    fn reset_face(&mut self) {
        if let Some(entity) = self.animated.take() {
            apply_pose(&self.sim, &entity, Pose::NEUTRAL);
        }
        self.viseme.reset();
    }

    async fn send(&mut self, message: OutboundMessage, now: Instant) -> bool {
        let kind = message.kind();
        let sent = self.transport.send(&message, now).await;
        if sent {
            tracing::debug!(kind, "Sent message");
        }
        sent
    }
}

fn apply_pose<S: Simulation>(sim: &S, entity: &EntityRef, pose: Pose) {
    for (channel, value) in pose.channels() {
        sim.set_channel(entity, channel, value);
    }
}
