//! Fixed-rate tick loop

use super::executor::ConversationRuntime;
use super::traits::Simulation;
use crate::transport::Dialer;
use std::time::{Duration, Instant};
use tokio::task::{JoinError, JoinHandle};
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

/// Handle to a running tick loop. Stopping is explicit: cancel the token,
/// then `join` to get the runtime back after it has shut down.
pub struct TickDriver<D: Dialer + 'static, S: Simulation + 'static> {
    token: CancellationToken,
    handle: JoinHandle<ConversationRuntime<D, S>>,
}

impl<D, S> TickDriver<D, S>
where
    D: Dialer + 'static,
    S: Simulation + 'static,
{
    /// Spawn the loop. Ticks that run late are delayed rather than burst.
    pub fn start(mut runtime: ConversationRuntime<D, S>, interval: Duration) -> Self {
        let token = CancellationToken::new();
        let cancel = token.clone();

        let handle = tokio::spawn(async move {
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(interval_ms = interval.as_millis(), "Tick driver started");

            loop {
                tokio::select! {
                    biased;
                    () = cancel.cancelled() => break,
                    _ = ticker.tick() => runtime.tick(Instant::now()).await,
                }
            }

            runtime.shutdown().await;
            tracing::info!("Tick driver stopped");
            runtime
        });

        Self { token, handle }
    }

    /// Token that stops the loop after the current tick
    pub fn token(&self) -> CancellationToken {
        self.token.clone()
    }

    pub fn cancel(&self) {
        self.token.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Wait for the loop to exit and return the runtime
    pub async fn join(self) -> Result<ConversationRuntime<D, S>, JoinError> {
        self.handle.await
    }
}
