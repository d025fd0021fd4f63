//! The persistent backend connection

use super::backoff::{BackoffMode, BackoffPolicy, ConnectionState};
use super::codec::{encode_frame, FrameDecoder, FrameError};
use super::dialer::Dialer;
use crate::config::TransportConfig;
use crate::protocol::{DecodeError, InboundMessage, OutboundMessage};
use futures::future::BoxFuture;
use futures::FutureExt;
use std::io;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("not connected")]
    NotConnected,
    #[error("connection closed by peer")]
    Closed,
    #[error("write timed out after {0:?}")]
    WriteTimeout(Duration),
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("failed to encode message: {0}")]
    Encode(#[from] serde_json::Error),
    #[error(transparent)]
    Frame(#[from] FrameError),
}

impl TransportError {
    /// Whether the error leaves the socket unusable
    fn is_fatal(&self) -> bool {
        matches!(
            self,
            TransportError::Closed | TransportError::WriteTimeout(_) | TransportError::Io(_)
        )
    }
}

/// Single logical connection to the backend.
///
/// Connecting and reading never wait: a dial in progress is kept and
/// checked again on the next call. Only `send` waits, bounded by the write
/// timeout.
pub struct Transport<D: Dialer> {
    dialer: Arc<D>,
    /// Dial started by `connect` that has not resolved yet
    pending_dial: Option<BoxFuture<'static, io::Result<D::Stream>>>,
    stream: Option<D::Stream>,
    decoder: FrameDecoder,
    state: ConnectionState,
    policy: BackoffPolicy,
    write_timeout: Duration,
    read_chunk: usize,
    max_reads_per_poll: usize,
    /// Identifies the current connection in logs
    session_id: Option<Uuid>,
}

impl<D: Dialer> Transport<D> {
    pub fn new(dialer: D, config: &TransportConfig) -> Self {
        Self {
            dialer: Arc::new(dialer),
            pending_dial: None,
            stream: None,
            decoder: FrameDecoder::new(config.framing, config.max_frame_len),
            state: ConnectionState::default(),
            policy: BackoffPolicy {
                fast_delay: config.fast_retry_delay,
                normal_delay: config.normal_retry_delay,
                fast_failure_threshold: config.fast_failure_threshold,
            },
            write_timeout: config.write_timeout,
            read_chunk: config.read_chunk.max(1),
            max_reads_per_poll: config.max_reads_per_poll.max(1),
            session_id: None,
        }
    }

    pub fn is_connected(&self) -> bool {
        self.stream.is_some()
    }

    /// Whether a dial is in flight
    pub fn is_connecting(&self) -> bool {
        self.pending_dial.is_some()
    }

    pub fn state(&self) -> &ConnectionState {
        &self.state
    }

    pub fn session_id(&self) -> Option<Uuid> {
        self.session_id
    }

    /// Try to establish the connection without waiting.
    ///
    /// No-op when connected. A new dial is started only when the backoff
    /// mode allows it, so calling this every tick is fine; a dial that is
    /// still in flight is checked and left running. Returns whether a
    /// connection is up afterwards.
    pub fn connect(&mut self, now: Instant) -> bool {
        if self.stream.is_some() {
            return true;
        }
        if self.pending_dial.is_none() {
            if !self.state.ready_to_attempt(now, &self.policy) {
                return false;
            }
            self.state.record_attempt(now);
            let dialer = Arc::clone(&self.dialer);
            self.pending_dial = Some(async move { dialer.dial().await }.boxed());
        }

        let Some(result) = self
            .pending_dial
            .as_mut()
            .and_then(|dial| dial.now_or_never())
        else {
            return false;
        };
        self.pending_dial = None;

        match result {
            Ok(stream) => {
                let session_id = Uuid::new_v4();
                self.stream = Some(stream);
                self.decoder.clear();
                self.state.record_success();
                self.session_id = Some(session_id);
                tracing::info!(session = %session_id, "Connected to backend");
                true
            }
            Err(e) => {
                let demoted = self.state.record_failure(&self.policy);
                if demoted {
                    tracing::warn!(
                        error = %e,
                        failures = self.state.consecutive_failures,
                        retry_secs = self.policy.delay(BackoffMode::Normal).as_secs(),
                        "Backend unreachable, slowing reconnect attempts"
                    );
                } else {
                    tracing::debug!(
                        error = %e,
                        failures = self.state.consecutive_failures,
                        "Backend connect failed"
                    );
                }
                false
            }
        }
    }

    /// Read whatever is available without waiting and return every complete
    /// message. Undecodable frames are dropped; the connection stays up.
    pub fn poll(&mut self) -> Vec<InboundMessage> {
        let Some(stream) = self.stream.as_mut() else {
            return Vec::new();
        };

        let mut chunk = vec![0u8; self.read_chunk];
        let mut failure = None;
        for _ in 0..self.max_reads_per_poll {
            match stream.read(&mut chunk).now_or_never() {
                None => break,
                Some(Ok(0)) => {
                    failure = Some(TransportError::Closed);
                    break;
                }
                Some(Ok(n)) => self.decoder.extend(&chunk[..n]),
                Some(Err(e)) if e.kind() == io::ErrorKind::Interrupted => {}
                Some(Err(e)) if e.kind() == io::ErrorKind::WouldBlock => break,
                Some(Err(e)) => {
                    failure = Some(TransportError::Io(e));
                    break;
                }
            }
        }

        let messages = self.drain_frames();
        if let Some(err) = failure {
            self.teardown(&err);
        }
        messages
    }

    fn drain_frames(&mut self) -> Vec<InboundMessage> {
        let mut messages = Vec::new();
        loop {
            match self.decoder.next_frame() {
                Ok(Some(body)) => match InboundMessage::decode(&body) {
                    Ok(message) => messages.push(message),
                    Err(DecodeError::UnknownType(kind)) => {
                        tracing::debug!(kind = %kind, "Ignoring unhandled message type");
                    }
                    Err(e) => {
                        tracing::warn!(error = %e, len = body.len(), "Dropping undecodable frame");
                    }
                },
                Ok(None) => break,
                Err(e) => {
                    tracing::warn!(error = %e, "Inbound stream desynchronized, buffer reset");
                    break;
                }
            }
        }
        messages
    }

    /// Send one message. Connects first if needed; fails closed instead of
    /// queueing when the backend is unreachable.
    pub async fn send(&mut self, message: &OutboundMessage, now: Instant) -> bool {
        if self.stream.is_none() && !self.connect(now) {
            tracing::debug!(kind = message.kind(), "Dropping outbound message, not connected");
            return false;
        }
        match self.write_message(message).await {
            Ok(()) => true,
            Err(e) if e.is_fatal() => {
                self.teardown(&e);
                false
            }
            Err(e) => {
                tracing::warn!(error = %e, kind = message.kind(), "Failed to send message");
                false
            }
        }
    }

    async fn write_message(&mut self, message: &OutboundMessage) -> Result<(), TransportError> {
        let body = serde_json::to_vec(message)?;
        let frame = encode_frame(&body)?;
        let stream = self.stream.as_mut().ok_or(TransportError::NotConnected)?;

        // write_all keeps going across partial writes
        let write = async {
            stream.write_all(&frame).await?;
            stream.flush().await
        };
        match tokio::time::timeout(self.write_timeout, write).await {
            Ok(result) => result.map_err(TransportError::from),
            Err(_) => Err(TransportError::WriteTimeout(self.write_timeout)),
        }
    }

    /// Close the connection on purpose (shutdown)
    pub fn disconnect(&mut self) {
        self.pending_dial = None;
        if self.stream.take().is_some() {
            tracing::info!(session = ?self.session_id, "Disconnected from backend");
        }
        self.decoder.clear();
        self.state.connected = false;
        self.session_id = None;
    }

    fn teardown(&mut self, reason: &TransportError) {
        tracing::warn!(session = ?self.session_id, error = %reason, "Backend connection lost");
        self.stream = None;
        self.decoder.clear();
        self.session_id = None;
        self.state.record_disconnect();
    }
}
