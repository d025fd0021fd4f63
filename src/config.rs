//! Runtime configuration
//!
//! Every tunable has a default matching the values the client has shipped
//! with; `COLLOQUY_*` environment variables override them.

use crate::transport::Framing;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Default backend port (the speech backend listens on localhost only)
pub const DEFAULT_BACKEND_ADDR: &str = "127.0.0.1:8173";

/// Upper bound for every delay and interval setting. Deadlines are computed
/// as `Instant + delay` on the tick path.
pub const MAX_DELAY: Duration = Duration::from_secs(60 * 60);

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} ({reason})")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
    #[error("{key} must be {constraint}")]
    OutOfRange {
        key: &'static str,
        constraint: &'static str,
    },
}

/// Transport settings
#[derive(Debug, Clone)]
pub struct TransportConfig {
    pub addr: String,
    /// Inbound framing; outbound is always length-prefixed
    pub framing: Framing,
    pub connect_timeout: Duration,
    pub write_timeout: Duration,
    /// Minimum gap between attempts while in fast backoff
    pub fast_retry_delay: Duration,
    /// Minimum gap between attempts while in normal backoff
    pub normal_retry_delay: Duration,
    /// Consecutive fast-mode failures before demoting to normal backoff
    pub fast_failure_threshold: u32,
    pub max_frame_len: usize,
    pub read_chunk: usize,
    /// Upper bound on reads per poll so a chatty backend cannot starve the tick
    pub max_reads_per_poll: usize,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            addr: DEFAULT_BACKEND_ADDR.to_string(),
            framing: Framing::LengthPrefixed,
            connect_timeout: Duration::from_millis(250),
            write_timeout: Duration::from_millis(500),
            fast_retry_delay: Duration::from_secs(1),
            normal_retry_delay: Duration::from_secs(10),
            fast_failure_threshold: 5,
            max_frame_len: 1_000_000,
            read_chunk: 4096,
            max_reads_per_poll: 16,
        }
    }
}

/// Viseme engine tunables. The smoothing constants were picked by eye.
#[derive(Debug, Clone)]
pub struct VisemeConfig {
    /// Exponential smoothing weight for drift corrections
    pub drift_alpha: f64,
    /// Per-frame lerp of the applied pose toward the sampled target
    pub pose_lerp: f32,
    /// Per-frame decay applied while closing
    pub close_decay: f32,
    pub close_epsilon: f32,
    /// Closing frames before completion is forced
    pub close_timeout_frames: u32,
}

impl Default for VisemeConfig {
    fn default() -> Self {
        Self {
            drift_alpha: 0.3,
            pose_lerp: 0.5,
            close_decay: 0.3,
            close_epsilon: 0.01,
            close_timeout_frames: 30,
        }
    }
}

/// Attention lock settings
#[derive(Debug, Clone)]
pub struct AttentionConfig {
    /// Bearing error above which an entity turns before freezing
    pub turn_threshold_deg: f32,
    /// Time allowed for the turn animation before scheduling is disabled
    pub turn_settle_delay: Duration,
    /// Re-facing check interval while locks are held
    pub refresh_interval: Duration,
    /// Names of entities that must never be moved (statues, posed actors)
    pub static_entities: Vec<String>,
}

impl Default for AttentionConfig {
    fn default() -> Self {
        Self {
            turn_threshold_deg: 45.0,
            turn_settle_delay: Duration::from_millis(600),
            refresh_interval: Duration::from_secs(1),
            static_entities: Vec::new(),
        }
    }
}

/// Tick driver settings
#[derive(Debug, Clone)]
pub struct DriverConfig {
    pub tick_interval: Duration,
    /// Interval between 3D-audio anchor updates while a turn plays
    pub positions_interval: Duration,
}

impl Default for DriverConfig {
    fn default() -> Self {
        Self {
            tick_interval: Duration::from_millis(50),
            positions_interval: Duration::from_millis(100),
        }
    }
}

/// Complete configuration for a conversation runtime
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub transport: TransportConfig,
    pub viseme: VisemeConfig,
    pub attention: AttentionConfig,
    pub driver: DriverConfig,
    /// Speaker/target id the backend uses for the player character
    pub player_id: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            transport: TransportConfig::default(),
            viseme: VisemeConfig::default(),
            attention: AttentionConfig::default(),
            driver: DriverConfig::default(),
            player_id: "player".to_string(),
        }
    }
}

impl SyncConfig {
    /// Load from process environment over defaults
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load using an arbitrary key lookup (tests pass a map)
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        let env = Env { lookup: &lookup };

        if let Some(addr) = lookup("COLLOQUY_BACKEND_ADDR") {
            config.transport.addr = addr;
        }
        if let Some(framing) = env.parse::<Framing>("COLLOQUY_FRAMING")? {
            config.transport.framing = framing;
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_CONNECT_TIMEOUT_MS")? {
            config.transport.connect_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_WRITE_TIMEOUT_MS")? {
            config.transport.write_timeout = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_FAST_RETRY_MS")? {
            config.transport.fast_retry_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_NORMAL_RETRY_MS")? {
            config.transport.normal_retry_delay = Duration::from_millis(ms);
        }
        if let Some(n) = env.parse::<u32>("COLLOQUY_FAST_FAILURE_THRESHOLD")? {
            config.transport.fast_failure_threshold = n;
        }
        if let Some(n) = env.parse::<usize>("COLLOQUY_MAX_FRAME_LEN")? {
            config.transport.max_frame_len = n;
        }

        if let Some(alpha) = env.parse::<f64>("COLLOQUY_DRIFT_ALPHA")? {
            config.viseme.drift_alpha = alpha;
        }
        if let Some(rate) = env.parse::<f32>("COLLOQUY_POSE_LERP")? {
            config.viseme.pose_lerp = rate;
        }
        if let Some(rate) = env.parse::<f32>("COLLOQUY_CLOSE_DECAY")? {
            config.viseme.close_decay = rate;
        }
        if let Some(frames) = env.parse::<u32>("COLLOQUY_CLOSE_TIMEOUT_FRAMES")? {
            config.viseme.close_timeout_frames = frames;
        }

        if let Some(deg) = env.parse::<f32>("COLLOQUY_TURN_THRESHOLD_DEG")? {
            config.attention.turn_threshold_deg = deg;
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_TURN_SETTLE_MS")? {
            config.attention.turn_settle_delay = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_REFACE_INTERVAL_MS")? {
            config.attention.refresh_interval = Duration::from_millis(ms);
        }
        if let Some(names) = lookup("COLLOQUY_STATIC_ENTITIES") {
            config.attention.static_entities = names
                .split(',')
                .map(str::trim)
                .filter(|n| !n.is_empty())
                .map(ToString::to_string)
                .collect();
        }

        if let Some(ms) = env.parse::<u64>("COLLOQUY_TICK_MS")? {
            config.driver.tick_interval = Duration::from_millis(ms);
        }
        if let Some(ms) = env.parse::<u64>("COLLOQUY_POSITIONS_MS")? {
            config.driver.positions_interval = Duration::from_millis(ms);
        }
        if let Some(player) = lookup("COLLOQUY_PLAYER_ID") {
            config.player_id = player;
        }

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if !(self.viseme.drift_alpha > 0.0 && self.viseme.drift_alpha <= 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "COLLOQUY_DRIFT_ALPHA",
                constraint: "in (0, 1]",
            });
        }
        if !(self.viseme.pose_lerp > 0.0 && self.viseme.pose_lerp <= 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "COLLOQUY_POSE_LERP",
                constraint: "in (0, 1]",
            });
        }
        if !(self.viseme.close_decay > 0.0 && self.viseme.close_decay <= 1.0) {
            return Err(ConfigError::OutOfRange {
                key: "COLLOQUY_CLOSE_DECAY",
                constraint: "in (0, 1]",
            });
        }
        if self.driver.tick_interval.is_zero() {
            return Err(ConfigError::OutOfRange {
                key: "COLLOQUY_TICK_MS",
                constraint: "greater than zero",
            });
        }
        let delays = [
            ("COLLOQUY_CONNECT_TIMEOUT_MS", self.transport.connect_timeout),
            ("COLLOQUY_WRITE_TIMEOUT_MS", self.transport.write_timeout),
            ("COLLOQUY_FAST_RETRY_MS", self.transport.fast_retry_delay),
            ("COLLOQUY_NORMAL_RETRY_MS", self.transport.normal_retry_delay),
            ("COLLOQUY_TURN_SETTLE_MS", self.attention.turn_settle_delay),
            ("COLLOQUY_REFACE_INTERVAL_MS", self.attention.refresh_interval),
            ("COLLOQUY_TICK_MS", self.driver.tick_interval),
            ("COLLOQUY_POSITIONS_MS", self.driver.positions_interval),
        ];
        for (key, delay) in delays {
            if delay > MAX_DELAY {
                return Err(ConfigError::OutOfRange {
                    key,
                    constraint: "at most one hour",
                });
            }
        }
        if self.transport.max_frame_len == 0 {
            return Err(ConfigError::OutOfRange {
                key: "COLLOQUY_MAX_FRAME_LEN",
                constraint: "greater than zero",
            });
        }
        Ok(())
    }
}

struct Env<'a, F> {
    lookup: &'a F,
}

impl<F> Env<'_, F>
where
    F: Fn(&str) -> Option<String>,
{
    fn parse<T>(&self, key: &'static str) -> Result<Option<T>, ConfigError>
    where
        T: FromStr,
        T::Err: std::fmt::Display,
    {
        let Some(raw) = (self.lookup)(key) else {
            return Ok(None);
        };
        raw.trim()
            .parse::<T>()
            .map(Some)
            .map_err(|e| ConfigError::InvalidValue {
                key,
                value: raw.clone(),
                reason: e.to_string(),
            })
    }
}
