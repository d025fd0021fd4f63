//! Timestamped mouth-shape samples and interpolation between them

use serde::{Deserialize, Serialize};

/// Mouth shape: three blend channels in [0, 1]
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct Pose {
    pub jaw: f32,
    pub smile: f32,
    pub funnel: f32,
}

impl Pose {
    pub const NEUTRAL: Pose = Pose {
        jaw: 0.0,
        smile: 0.0,
        funnel: 0.0,
    };

    /// Channel names understood by the facial rig, in output order
    pub const CHANNELS: [&'static str; 3] = ["jaw", "smile", "funnel"];

    pub fn channels(self) -> [(&'static str, f32); 3] {
        [
            (Self::CHANNELS[0], self.jaw),
            (Self::CHANNELS[1], self.smile),
            (Self::CHANNELS[2], self.funnel),
        ]
    }

    /// Move toward `target` by `rate` of the remaining distance
    pub fn lerp(self, target: Pose, rate: f32) -> Pose {
        Pose {
            jaw: self.jaw + (target.jaw - self.jaw) * rate,
            smile: self.smile + (target.smile - self.smile) * rate,
            funnel: self.funnel + (target.funnel - self.funnel) * rate,
        }
    }

    /// Multiply every channel, keeping the result in [0, 1]
    pub fn scaled(self, factor: f32) -> Pose {
        Pose {
            jaw: (self.jaw * factor).clamp(0.0, 1.0),
            smile: (self.smile * factor).clamp(0.0, 1.0),
            funnel: (self.funnel * factor).clamp(0.0, 1.0),
        }
    }

    pub fn max_channel(self) -> f32 {
        self.jaw.max(self.smile).max(self.funnel)
    }
}

/// One sample. `t` is seconds from the start of the turn's audio.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireFrame")]
pub struct VisemeFrame {
    pub t: f64,
    pub jaw: f32,
    pub smile: f32,
    pub funnel: f32,
}

impl VisemeFrame {
    pub fn new(t: f64, jaw: f32, smile: f32, funnel: f32) -> Self {
        Self {
            t,
            jaw: clamp_channel(jaw),
            smile: clamp_channel(smile),
            funnel: clamp_channel(funnel),
        }
    }

    pub fn pose(&self) -> Pose {
        Pose {
            jaw: self.jaw,
            smile: self.smile,
            funnel: self.funnel,
        }
    }
}

fn clamp_channel(value: f32) -> f32 {
    if value.is_nan() {
        0.0
    } else {
        value.clamp(0.0, 1.0)
    }
}

/// The backend sends `[t, jaw, smile, funnel]`; older builds sent objects
#[derive(Deserialize)]
#[serde(untagged)]
enum WireFrame {
    Packed(f64, f32, f32, f32),
    Fields {
        t: f64,
        #[serde(default)]
        jaw: f32,
        #[serde(default)]
        smile: f32,
        #[serde(default)]
        funnel: f32,
    },
}

impl From<WireFrame> for VisemeFrame {
    fn from(wire: WireFrame) -> Self {
        match wire {
            WireFrame::Packed(t, jaw, smile, funnel) | WireFrame::Fields { t, jaw, smile, funnel } => {
                VisemeFrame::new(t, jaw, smile, funnel)
            }
        }
    }
}

/// Samples ordered by `t`
#[derive(Debug, Clone, Default)]
pub struct VisemeTimeline {
    frames: Vec<VisemeFrame>,
    /// Index of the last bracketing frame found; playback mostly moves forward
    cursor: usize,
}

impl VisemeTimeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.frames.len()
    }

    pub fn is_empty(&self) -> bool {
        self.frames.is_empty()
    }

    pub fn frames(&self) -> &[VisemeFrame] {
        &self.frames
    }

    pub fn clear(&mut self) {
        self.frames.clear();
        self.cursor = 0;
    }

    /// Append streamed samples, keeping time order. Samples with a
    /// non-finite timestamp are discarded.
    pub fn append(&mut self, frames: impl IntoIterator<Item = VisemeFrame>) {
        for frame in frames {
            if !frame.t.is_finite() {
                continue;
            }
            match self.frames.last() {
                Some(last) if frame.t < last.t => {
                    let at = self.frames.partition_point(|f| f.t <= frame.t);
                    self.frames.insert(at, frame);
                    self.cursor = 0;
                }
                _ => self.frames.push(frame),
            }
        }
    }

    /// Interpolated pose at `elapsed` seconds.
    ///
    /// Clamps to the first/last sample outside the covered range; an empty
    /// timeline is neutral.
    pub fn sample(&mut self, elapsed: f64) -> Pose {
        let (Some(first), Some(last)) = (self.frames.first(), self.frames.last()) else {
            return Pose::NEUTRAL;
        };
        if elapsed.is_nan() || elapsed <= first.t {
            return first.pose();
        }
        if elapsed >= last.t {
            return last.pose();
        }

        // Invariant from here: first.t < elapsed < last.t, so at least two
        // frames exist and a bracketing pair is found before running off.
        let mut i = if self.cursor < self.frames.len() && self.frames[self.cursor].t <= elapsed {
            self.cursor
        } else {
            0
        };
        while i + 1 < self.frames.len() && self.frames[i + 1].t <= elapsed {
            i += 1;
        }
        self.cursor = i;

        let a = self.frames[i];
        let b = self.frames[i + 1];
        let span = b.t - a.t;
        if span <= 0.0 {
            return b.pose();
        }
        #[allow(clippy::cast_possible_truncation)] // fraction in [0, 1)
        let frac = ((elapsed - a.t) / span) as f32;
        a.pose().lerp(b.pose(), frac)
    }
}
