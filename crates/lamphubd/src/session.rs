//! Per-device connection state machine.
//!
//! ```text
//!            first frame DEVICE_NAME:<n>              silent / closed / superseded
//! Accepted ────────────────────────────▶ Active ─────────────────────────────▶ Closed
//!     │                                   │  ▲
//!     │ other frame / timeout             │  │ sleep(interval), send PING,
//!     ▼                                   │  │ wait up to timeout for a reply
//!   Closed                                └──┘
//! ```
//!
//! A session only reads from its device inside the probe window that
//! follows each `PING`. Anything the device sends in between is buffered by
//! the transport and picked up by the next probe.
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Transport failures end the session and are reported as [`SessionError`]
//! - Teardown always runs, whatever ended the loop

use std::sync::Arc;
use std::time::Duration;

use futures::stream::SplitStream;
use futures::StreamExt;
use lamphub_core::{DeviceName, DeviceUpdate};
use lamphub_protocol::{parse_inbound, parse_registration, FrameError, InboundFrame, PING_FRAME};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::HubConfig;
use crate::events::{EventBus, HubEvent};
use crate::registry::{ConnectionHandle, ConnectionId, FrameSink, Registry, WsFrameSink};

/// Heartbeat and registration timings for device sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionTimings {
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub registration_timeout: Duration,
}

impl SessionTimings {
    pub fn from_config(config: &HubConfig) -> Self {
        Self {
            heartbeat_interval: config.heartbeat_interval(),
            heartbeat_timeout: config.heartbeat_timeout(),
            registration_timeout: config.registration_timeout(),
        }
    }
}

impl Default for SessionTimings {
    fn default() -> Self {
        Self::from_config(&HubConfig::default())
    }
}

/// Why a session ended.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Protocol violation: {0}")]
    ProtocolViolation(#[from] FrameError),

    #[error("Device did not register within {0:?}")]
    RegistrationTimeout(Duration),

    #[error("Device did not answer heartbeat within {0:?}")]
    HeartbeatTimeout(Duration),

    #[error("Connection closed by device")]
    TransportClosed,

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Connection superseded by a newer registration")]
    Superseded,
}

/// Result of one receive attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProbeOutcome {
    /// A text frame arrived
    Text(String),

    /// A ping or pong control frame arrived; the device is alive
    Control,

    /// A binary frame arrived; the device is alive
    Other,

    /// The device closed the connection
    Closed,

    /// The transport failed
    Failed(String),

    /// Nothing arrived before the deadline
    TimedOut,
}

/// One device connection from accept to teardown.
pub struct DeviceSession<S> {
    stream: SplitStream<WebSocketStream<S>>,
    sink: Arc<WsFrameSink<S>>,
    registry: Registry,
    bus: EventBus,
    timings: SessionTimings,
    cancel: CancellationToken,
    peer: String,
}

impl<S> DeviceSession<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    pub fn new(
        ws: WebSocketStream<S>,
        registry: Registry,
        bus: EventBus,
        timings: SessionTimings,
        cancel: CancellationToken,
        peer: impl Into<String>,
    ) -> Self {
        let (sink, stream) = ws.split();
        Self {
            stream,
            sink: Arc::new(WsFrameSink::new(sink)),
            registry,
            bus,
            timings,
            cancel,
            peer: peer.into(),
        }
    }

    /// Drives the session to completion.
    ///
    /// Returns `Ok(())` only when the hub is shutting down.
    pub async fn run(mut self) -> Result<(), SessionError> {
        debug!(peer = %self.peer, "Device connection accepted");

        let name = match self.await_registration().await {
            Ok(Some(name)) => name,
            Ok(None) => {
                self.close().await;
                return Ok(());
            }
            Err(e) => {
                warn!(peer = %self.peer, error = %e, "Device registration failed");
                self.close().await;
                return Err(e);
            }
        };

        let handle = ConnectionHandle::new(self.sink.clone());
        let connection = handle.id();
        if let Some(displaced) = self.registry.register(name.clone(), handle).await {
            displaced.close().await;
        }
        info!(device = %name, peer = %self.peer, connection = %connection, "Device connected");
        self.bus.publish(HubEvent::DevicesChanged).await;

        let result = self.heartbeat_loop(&name, connection).await;
        match &result {
            Ok(()) => info!(device = %name, "Device session stopped for shutdown"),
            Err(e) => info!(device = %name, reason = %e, "Device disconnected"),
        }

        self.teardown(&name, connection).await;
        result
    }

    /// Waits for `DEVICE_NAME:<name>`. `Ok(None)` means shutdown.
    ///
    /// Control frames are skipped; the deadline covers the whole wait.
    async fn await_registration(&mut self) -> Result<Option<DeviceName>, SessionError> {
        let deadline = self.timings.registration_timeout;
        let expires_at = Instant::now() + deadline;

        loop {
            let remaining = expires_at.saturating_duration_since(Instant::now());
            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(None),
                outcome = receive_within(&mut self.stream, remaining) => outcome,
            };

            return match outcome {
                ProbeOutcome::Text(frame) => Ok(Some(parse_registration(&frame)?)),
                ProbeOutcome::Control => {
                    debug!(peer = %self.peer, "Control frame before registration skipped");
                    continue;
                }
                ProbeOutcome::Other => Err(SessionError::ProtocolViolation(
                    FrameError::NotRegistration {
                        frame: "<binary frame>".to_string(),
                    },
                )),
                ProbeOutcome::Closed => Err(SessionError::TransportClosed),
                ProbeOutcome::Failed(e) => Err(SessionError::Transport(e)),
                ProbeOutcome::TimedOut => Err(SessionError::RegistrationTimeout(deadline)),
            };
        }
    }

    async fn heartbeat_loop(
        &mut self,
        name: &DeviceName,
        connection: ConnectionId,
    ) -> Result<(), SessionError> {
        loop {
            if !self.registry.owns(name, connection).await {
                return Err(SessionError::Superseded);
            }

            tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                _ = tokio::time::sleep(self.timings.heartbeat_interval) => {}
            }

            debug!(device = %name, "Sending PING");
            self.sink_text(PING_FRAME).await?;

            let outcome = tokio::select! {
                _ = self.cancel.cancelled() => return Ok(()),
                outcome = receive_within(&mut self.stream, self.timings.heartbeat_timeout) => outcome,
            };

            match outcome {
                ProbeOutcome::Text(frame) => self.handle_frame(name, &frame).await,
                ProbeOutcome::Control | ProbeOutcome::Other => {
                    debug!(device = %name, "Non-text frame treated as heartbeat reply")
                }
                ProbeOutcome::Closed => return Err(SessionError::TransportClosed),
                ProbeOutcome::Failed(e) => return Err(SessionError::Transport(e)),
                ProbeOutcome::TimedOut => {
                    warn!(device = %name, "Device unresponsive");
                    return Err(SessionError::HeartbeatTimeout(self.timings.heartbeat_timeout));
                }
            }
        }
    }

    async fn handle_frame(&self, name: &DeviceName, frame: &str) {
        match parse_inbound(frame) {
            InboundFrame::Status(report) => {
                let update = DeviceUpdate::light(report.brightness, report.color);
                if self.registry.update(name, &update).await {
                    self.bus.publish(HubEvent::DevicesChanged).await;
                }
            }
            InboundFrame::Malformed(e) => {
                warn!(device = %name, frame, error = %e, "Malformed status report ignored");
            }
            InboundFrame::Registration(other) => {
                warn!(device = %name, announced = %other, "Repeated registration frame ignored");
            }
            InboundFrame::Unrecognized(_) => {
                debug!(device = %name, frame, "Unexpected response");
            }
        }
    }

    async fn sink_text(&self, text: &str) -> Result<(), SessionError> {
        self.sink
            .send_text(text)
            .await
            .map_err(|e| SessionError::Transport(e.to_string()))
    }

    async fn teardown(&self, name: &DeviceName, connection: ConnectionId) {
        if self.registry.unregister_connection(name, connection).await {
            self.bus.publish(HubEvent::DevicesChanged).await;
        }
        self.close().await;
        debug!(device = %name, connection = %connection, "Cleaned up device session");
    }

    async fn close(&self) {
        self.sink.close().await;
    }
}

/// Receives the next frame, giving up after `deadline`.
///
/// On timeout the pending receive is dropped in place; no read outlives
/// this call.
pub async fn receive_within<S>(
    stream: &mut SplitStream<WebSocketStream<S>>,
    deadline: Duration,
) -> ProbeOutcome
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    match tokio::time::timeout(deadline, stream.next()).await {
        Err(_) => ProbeOutcome::TimedOut,
        Ok(None) | Ok(Some(Ok(Message::Close(_)))) => ProbeOutcome::Closed,
        Ok(Some(Ok(Message::Text(text)))) => ProbeOutcome::Text(text.as_str().to_owned()),
        Ok(Some(Ok(Message::Ping(_) | Message::Pong(_)))) => ProbeOutcome::Control,
        Ok(Some(Ok(_))) => ProbeOutcome::Other,
        Ok(Some(Err(e))) => ProbeOutcome::Failed(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_timings_follow_config() {
        let mut config = HubConfig::default();
        config.heartbeat_interval_ms = 100;
        config.heartbeat_timeout_ms = 200;
        config.registration_timeout_ms = 300;

        let timings = SessionTimings::from_config(&config);
        assert_eq!(timings.heartbeat_interval, Duration::from_millis(100));
        assert_eq!(timings.heartbeat_timeout, Duration::from_millis(200));
        assert_eq!(timings.registration_timeout, Duration::from_millis(300));
    }

    #[test]
    fn test_error_display() {
        let err = SessionError::HeartbeatTimeout(Duration::from_secs(5));
        assert!(err.to_string().contains("5s"));

        let err: SessionError = FrameError::EmptyDeviceName.into();
        assert!(matches!(err, SessionError::ProtocolViolation(_)));
    }
}
