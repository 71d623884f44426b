//! Outbound side of a device connection.
//!
//! The registry stores a [`ConnectionHandle`] per device so the command
//! dispatcher can write to a device without touching the session task that
//! owns the read half.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures::stream::SplitSink;
use futures::SinkExt;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::{Mutex, OwnedMutexGuard};
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::WebSocketStream;

static NEXT_CONNECTION_ID: AtomicU64 = AtomicU64::new(1);

/// Process-unique identifier of one accepted device connection.
///
/// Two connections announcing the same device name still get distinct ids,
/// which is how a session notices it has been superseded.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConnectionId(u64);

impl ConnectionId {
    /// Allocates the next identifier.
    pub fn next() -> Self {
        Self(NEXT_CONNECTION_ID.fetch_add(1, Ordering::Relaxed))
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Write failure on a device connection.
#[derive(Debug, Clone, Error)]
pub enum TransportError {
    #[error("connection closed")]
    Closed,

    #[error("send failed: {0}")]
    Send(String),
}

/// Something the hub can push text frames into.
#[async_trait]
pub trait FrameSink: Send + Sync {
    /// Sends one text frame.
    async fn send_text(&self, text: &str) -> Result<(), TransportError>;

    /// Closes the connection. Errors are swallowed; the peer may already be gone.
    async fn close(&self);
}

/// [`FrameSink`] over the write half of a device WebSocket.
pub struct WsFrameSink<S> {
    inner: Mutex<SplitSink<WebSocketStream<S>, Message>>,
}

impl<S> WsFrameSink<S> {
    pub fn new(sink: SplitSink<WebSocketStream<S>, Message>) -> Self {
        Self {
            inner: Mutex::new(sink),
        }
    }
}

#[async_trait]
impl<S> FrameSink for WsFrameSink<S>
where
    S: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        let mut sink = self.inner.lock().await;
        sink.send(Message::Text(text.into()))
            .await
            .map_err(|e| match e {
                tokio_tungstenite::tungstenite::Error::ConnectionClosed
                | tokio_tungstenite::tungstenite::Error::AlreadyClosed => TransportError::Closed,
                other => TransportError::Send(other.to_string()),
            })
    }

    async fn close(&self) {
        let mut sink = self.inner.lock().await;
        let _ = sink.close().await;
    }
}

/// Registry entry for a live device connection.
#[derive(Clone)]
pub struct ConnectionHandle {
    id: ConnectionId,
    sink: Arc<dyn FrameSink>,
    commands: Arc<Mutex<()>>,
}

impl ConnectionHandle {
    /// Wraps a sink under a freshly allocated [`ConnectionId`].
    pub fn new(sink: Arc<dyn FrameSink>) -> Self {
        Self {
            id: ConnectionId::next(),
            sink,
            commands: Arc::new(Mutex::new(())),
        }
    }

    pub fn id(&self) -> ConnectionId {
        self.id
    }

    pub async fn send_text(&self, text: &str) -> Result<(), TransportError> {
        self.sink.send_text(text).await
    }

    /// Serializes command delivery on this connection.
    ///
    /// Held across a command's send and its registry update, so the
    /// recorded state always matches the last command the device received.
    pub async fn lock_commands(&self) -> OwnedMutexGuard<()> {
        self.commands.clone().lock_owned().await
    }

    pub async fn close(&self) {
        self.sink.close().await
    }
}

impl fmt::Debug for ConnectionHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ConnectionHandle")
            .field("id", &self.id)
            .finish_non_exhaustive()
    }
}


#[cfg(test)]
mod tests {
    use super::testing::RecordingSink;
    use super::*;

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::next();
        let b = ConnectionId::next();
        assert_ne!(a, b);
        assert!(b.as_u64() > a.as_u64());
    }

    #[tokio::test]
    async fn test_handle_forwards_to_sink() {
        let sink = Arc::new(RecordingSink::default());
        let handle = ConnectionHandle::new(sink.clone());

        handle.send_text("Blue 80").await.unwrap();
        handle.close().await;

        assert_eq!(sink.frames(), vec!["Blue 80".to_string()]);
        assert!(sink.closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_handle_reports_failure() {
        let handle = ConnectionHandle::new(Arc::new(RecordingSink::failing()));
        assert!(matches!(
            handle.send_text("PING").await,
            Err(TransportError::Closed)
        ));
    }
}
