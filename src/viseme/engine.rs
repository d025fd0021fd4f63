//! Per-turn mouth animation: sampling, drift correction, and closing

use super::timeline::{Pose, VisemeFrame, VisemeTimeline};
use crate::config::VisemeConfig;
use std::time::Instant;

/// Result of one closing frame
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum CloseStep {
    /// Still decaying; apply this pose
    Decaying(Pose),
    /// Pose is exactly neutral. Reported once per close.
    Complete { timed_out: bool },
}

/// Drives one speaker's mouth for the active turn.
///
/// Two smoothing stages run back to back: the timeline interpolates between
/// samples, then the applied pose chases that target at `pose_lerp` per
/// frame. Irregular sample arrival is hidden by the second stage.
#[derive(Debug)]
pub struct VisemeEngine {
    config: VisemeConfig,
    timeline: VisemeTimeline,
    turn_id: Option<String>,
    local_start: Option<Instant>,
    /// Smoothed seconds to add to local elapsed time
    audio_offset: f64,
    applied: Pose,
    scale: f32,
    closing: bool,
    close_frames: u32,
}

impl VisemeEngine {
    pub fn new(config: VisemeConfig) -> Self {
        Self {
            config,
            timeline: VisemeTimeline::new(),
            turn_id: None,
            local_start: None,
            audio_offset: 0.0,
            applied: Pose::NEUTRAL,
            scale: 1.0,
            closing: false,
            close_frames: 0,
        }
    }

    pub fn active_turn(&self) -> Option<&str> {
        self.turn_id.as_deref()
    }

    pub fn is_closing(&self) -> bool {
        self.closing
    }

    pub fn applied_pose(&self) -> Pose {
        self.applied
    }

    pub fn audio_offset(&self) -> f64 {
        self.audio_offset
    }

    pub fn frame_count(&self) -> usize {
        self.timeline.len()
    }

    /// Start a turn: drop the previous timeline and seed it with any inline
    /// samples from the start handshake.
    pub fn begin_turn(
        &mut self,
        turn_id: &str,
        initial: Vec<VisemeFrame>,
        scale: Option<f32>,
        now: Instant,
    ) {
        self.timeline.clear();
        self.timeline.append(initial);
        self.turn_id = Some(turn_id.to_string());
        self.local_start = Some(now);
        self.audio_offset = 0.0;
        self.scale = match scale {
            Some(s) if s.is_finite() && s > 0.0 => s,
            _ => 1.0,
        };
        self.closing = false;
        self.close_frames = 0;
    }

    /// Append streamed samples. Returns false when they were dropped because
    /// no turn is playing or they belong to a different turn.
    pub fn load_frames(&mut self, turn_id: Option<&str>, frames: Vec<VisemeFrame>) -> bool {
        let Some(active) = self.turn_id.as_deref() else {
            return false;
        };
        if self.closing || turn_id.is_some_and(|id| id != active) {
            return false;
        }
        self.timeline.append(frames);
        true
    }

    /// Fold an authoritative audio position into the smoothed offset.
    /// Returns the new offset, or `None` if the report was for another turn.
    pub fn drift_correct(&mut self, audio_position: f64, turn_id: &str, now: Instant) -> Option<f64> {
        if self.closing || self.turn_id.as_deref() != Some(turn_id) || !audio_position.is_finite() {
            return None;
        }
        let local = self.local_elapsed(now)?;
        let drift = audio_position - local;
        let alpha = self.config.drift_alpha;
        self.audio_offset = self.audio_offset * (1.0 - alpha) + drift * alpha;
        Some(self.audio_offset)
    }

    fn local_elapsed(&self, now: Instant) -> Option<f64> {
        self.local_start
            .map(|start| now.saturating_duration_since(start).as_secs_f64())
    }

    /// Corrected playback position for `now`
    pub fn elapsed(&self, now: Instant) -> Option<f64> {
        self.local_elapsed(now).map(|local| local + self.audio_offset)
    }

    /// Advance one animation frame while playing. Returns the pose to apply.
    pub fn tick(&mut self, now: Instant) -> Option<Pose> {
        if self.closing {
            return None;
        }
        let elapsed = self.elapsed(now)?;
        let target = self.timeline.sample(elapsed).scaled(self.scale);
        self.applied = self.applied.lerp(target, self.config.pose_lerp);
        Some(self.applied)
    }

    /// The turn's audio ended: stop interpolating and start closing from the
    /// current pose.
    pub fn stop(&mut self) {
        self.timeline.clear();
        self.closing = true;
        self.close_frames = 0;
    }

    /// Advance one closing frame. `None` when not closing.
    pub fn close_step(&mut self) -> Option<CloseStep> {
        if !self.closing {
            return None;
        }
        self.close_frames += 1;
        let keep = 1.0 - self.config.close_decay;
        self.applied = Pose {
            jaw: self.applied.jaw * keep,
            smile: self.applied.smile * keep,
            funnel: self.applied.funnel * keep,
        };

        let converged = self.applied.max_channel() < self.config.close_epsilon;
        let timed_out = !converged && self.close_frames >= self.config.close_timeout_frames;
        if converged || timed_out {
            self.finish_close();
            return Some(CloseStep::Complete { timed_out });
        }
        Some(CloseStep::Decaying(self.applied))
    }

    fn finish_close(&mut self) {
        self.applied = Pose::NEUTRAL;
        self.timeline.clear();
        self.turn_id = None;
        self.local_start = None;
        self.audio_offset = 0.0;
        self.closing = false;
        self.close_frames = 0;
    }

    /// Drop everything, including the applied pose
    pub fn reset(&mut self) {
        self.finish_close();
        self.scale = 1.0;
    }
}
