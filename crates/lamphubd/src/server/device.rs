//! Device WebSocket listener.

use std::net::SocketAddr;

use tokio::net::{TcpListener, TcpStream};
use tracing::{debug, error, info, warn};

use crate::hub::Hub;
use crate::session::{DeviceSession, SessionError};

/// Accepts device connections until the hub is cancelled.
///
/// Each connection gets its own task running a [`DeviceSession`]; a failing
/// device never affects the listener or other devices.
pub async fn serve_devices(listener: TcpListener, hub: Hub) {
    if let Ok(addr) = listener.local_addr() {
        info!(addr = %addr, "Device listener ready");
    }

    loop {
        tokio::select! {
            _ = hub.cancel.cancelled() => {
                info!("Device listener shutting down");
                break;
            }

            result = listener.accept() => {
                match result {
                    Ok((stream, peer)) => {
                        tokio::spawn(handle_device(stream, peer, hub.clone()));
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to accept device connection");
                    }
                }
            }
        }
    }
}

async fn handle_device(stream: TcpStream, peer: SocketAddr, hub: Hub) {
    debug!(peer = %peer, "New device attempting to connect");

    let ws = match tokio_tungstenite::accept_async(stream).await {
        Ok(ws) => ws,
        Err(e) => {
            warn!(peer = %peer, error = %e, "Device WebSocket handshake failed");
            return;
        }
    };

    let session = DeviceSession::new(
        ws,
        hub.registry.clone(),
        hub.bus.clone(),
        hub.session_timings(),
        hub.cancel.clone(),
        peer.to_string(),
    );

    match session.run().await {
        Ok(()) => {}
        Err(SessionError::ProtocolViolation(e)) => {
            warn!(peer = %peer, error = %e, "Invalid registration message");
        }
        Err(e) => debug!(peer = %peer, reason = %e, "Device session ended"),
    }
}
