//! Headless conversation client
//!
//! Connects to the speech backend and runs the full sync engine against a
//! simulation with no entities. Useful for exercising a backend's protocol
//! handling without the game running; every collaborator call is logged.

use colloquy::runtime::{
    AudioMuter, CameraPose, Display, EntityLookup, EntityPose, EntityRef, FacialRig,
    NearbyEntity, World,
};
use colloquy::transport::TcpDialer;
use colloquy::{ConversationRuntime, SyncConfig, TickDriver};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

/// Simulation with nobody in it: lookups come back empty, output is logged
struct LoggedSimulation;

impl EntityLookup for LoggedSimulation {
    fn nearby(&self) -> Vec<NearbyEntity> {
        Vec::new()
    }

    fn player(&self) -> Option<EntityRef> {
        None
    }

    fn camera(&self) -> Option<CameraPose> {
        None
    }
}

impl World for LoggedSimulation {
    fn lock_refusal(&self) -> Option<String> {
        None
    }

    fn entity_refusal(&self, _entity: &EntityRef) -> Option<String> {
        None
    }

    fn pose(&self, _entity: &EntityRef) -> Option<EntityPose> {
        None
    }

    fn is_companion(&self, _entity: &EntityRef) -> bool {
        false
    }

    fn is_stationed(&self, _entity: &EntityRef) -> bool {
        false
    }

    fn face_toward(&self, entity: &EntityRef, target: &EntityRef) {
        tracing::debug!(entity = %entity.name, target = %target.name, "face_toward");
    }

    fn set_scheduling(&self, entity: &EntityRef, enabled: bool) {
        tracing::debug!(entity = %entity.name, enabled, "set_scheduling");
    }

    fn freeze(&self, entity: &EntityRef) {
        tracing::debug!(entity = %entity.name, "freeze");
    }

    fn halt_movement(&self, entity: &EntityRef) {
        tracing::debug!(entity = %entity.name, "halt_movement");
    }

    fn resume_movement(&self, entity: &EntityRef) {
        tracing::debug!(entity = %entity.name, "resume_movement");
    }
}

impl Display for LoggedSimulation {
    fn show_text(&self, speaker: &str, text: &str) {
        tracing::info!(speaker = %speaker, text = %text, "Subtitle");
    }

    fn hide_text(&self) {
        tracing::debug!("Subtitle hidden");
    }

    fn notify(&self, text: &str) {
        tracing::info!(text = %text, "Notification");
    }
}

impl AudioMuter for LoggedSimulation {
    fn mute(&self, entity: &EntityRef) {
        tracing::debug!(entity = %entity.name, "mute");
    }

    fn unmute_all(&self) {
        tracing::debug!("unmute_all");
    }
}

impl FacialRig for LoggedSimulation {
    fn set_channel(&self, entity: &EntityRef, channel: &str, value: f32) {
        tracing::trace!(entity = %entity.name, channel, value, "set_channel");
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "colloquy=info,colloquy_headless=info".into()),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_current_span(false)
                .with_span_list(false),
        )
        .init();

    // Configuration
    let config = SyncConfig::from_env()?;
    tracing::info!(
        backend = %config.transport.addr,
        framing = ?config.transport.framing,
        tick_ms = config.driver.tick_interval.as_millis(),
        "Starting headless client"
    );

    let dialer = TcpDialer::new(config.transport.addr.clone(), config.transport.connect_timeout);
    let runtime = ConversationRuntime::new(&config, dialer, LoggedSimulation);
    let driver = TickDriver::start(runtime, config.driver.tick_interval);

    tokio::signal::ctrl_c().await?;
    tracing::info!("Shutdown requested");
    driver.cancel();
    driver.join().await?;

    Ok(())
}
