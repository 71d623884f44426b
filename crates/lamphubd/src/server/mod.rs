//! Network front-ends of the hub.
//!
//! Three listeners share one [`Hub`]:
//!
//! ```text
//! ┌──────────────┐   ┌────────────────────────┐   ┌──────────────┐
//! │ device :8765 │   │ operator HTTP+WS :8080 │   │ display :8766│
//! │  (raw WS)    │   │        (axum)          │   │   (axum)     │
//! └──────┬───────┘   └───────────┬────────────┘   └──────┬───────┘
//!        │ DeviceSession         │ handlers / observers   │ observers
//!        ▼                       ▼                        ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │  Registry · EventBus · ChangeNotifier · ChecklistPolicy         │
//! └─────────────────────────────────────────────────────────────────┘
//! ```
//!
//! All three stop when the hub's cancellation token fires.

mod device;
mod http;
mod observer;

pub use device::serve_devices;
pub use http::{operator_router, with_api_layers, ApiError};
pub use observer::display_router;

use std::future::IntoFuture;
use std::net::SocketAddr;

use thiserror::Error;
use tokio::net::TcpListener;
use tracing::{error, info};

use crate::hub::Hub;

/// Bound listeners for the three hub ports.
pub struct HubListeners {
    pub device: TcpListener,
    pub http: TcpListener,
    pub display: TcpListener,
}

impl HubListeners {
    /// Binds every listener configured on the hub.
    pub async fn bind(hub: &Hub) -> Result<Self, ServerError> {
        let config = &hub.config;
        Ok(Self {
            device: bind(config.device_addr()).await?,
            http: bind(config.http_addr()).await?,
            display: bind(config.display_addr()).await?,
        })
    }

    /// Addresses actually bound, useful when a port was configured as 0.
    pub fn local_addrs(&self) -> Result<BoundAddrs, ServerError> {
        let addr = |listener: &TcpListener| {
            listener.local_addr().map_err(|e| ServerError::Io(e.to_string()))
        };
        Ok(BoundAddrs {
            device: addr(&self.device)?,
            http: addr(&self.http)?,
            display: addr(&self.display)?,
        })
    }
}

/// Socket addresses of a bound [`HubListeners`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoundAddrs {
    pub device: SocketAddr,
    pub http: SocketAddr,
    pub display: SocketAddr,
}

async fn bind(addr: String) -> Result<TcpListener, ServerError> {
    TcpListener::bind(&addr)
        .await
        .map_err(|e| ServerError::Bind {
            addr,
            error: e.to_string(),
        })
}

/// Runs the hub's listeners until cancellation.
pub struct HubServer {
    hub: Hub,
}

impl HubServer {
    pub fn new(hub: Hub) -> Self {
        Self { hub }
    }

    pub fn hub(&self) -> &Hub {
        &self.hub
    }

    /// Binds the configured ports and serves until cancelled.
    pub async fn run(&self) -> Result<(), ServerError> {
        let listeners = HubListeners::bind(&self.hub).await?;
        self.serve(listeners).await
    }

    /// Serves on already-bound listeners until cancelled.
    pub async fn serve(&self, listeners: HubListeners) -> Result<(), ServerError> {
        let addrs = listeners.local_addrs()?;
        info!(
            device = %addrs.device,
            http = %addrs.http,
            display = %addrs.display,
            "Hub listening"
        );

        let devices = tokio::spawn(serve_devices(listeners.device, self.hub.clone()));

        let cancel = self.hub.cancel.clone();
        let http = axum::serve(listeners.http, operator_router(self.hub.clone()))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .into_future();

        let cancel = self.hub.cancel.clone();
        let display = axum::serve(listeners.display, display_router(self.hub.clone()))
            .with_graceful_shutdown(async move { cancel.cancelled().await })
            .into_future();

        let (http_result, display_result) = tokio::join!(http, display);

        // Either server failing stops the whole hub.
        self.hub.cancel.cancel();
        if let Err(e) = devices.await {
            error!(error = %e, "Device listener task failed");
        }

        http_result.map_err(|e| ServerError::Io(e.to_string()))?;
        display_result.map_err(|e| ServerError::Io(e.to_string()))?;

        info!("Hub server stopped");
        Ok(())
    }
}

/// Errors that can occur while running the server.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("Failed to bind {addr}: {error}")]
    Bind { addr: String, error: String },

    #[error("IO error: {0}")]
    Io(String),
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::HubConfig;
    use tokio_util::sync::CancellationToken;

    #[test]
    fn test_server_error_display() {
        let err = ServerError::Bind {
            addr: "0.0.0.0:8080".to_string(),
            error: "address in use".to_string(),
        };
        assert!(err.to_string().contains("0.0.0.0:8080"));
    }

    #[tokio::test]
    async fn test_bind_ephemeral_ports() {
        let mut config = HubConfig::default();
        config.host = "127.0.0.1".to_string();
        config.device_port = 0;
        config.http_port = 0;
        config.display_port = 0;
        let hub = Hub::new(config, CancellationToken::new());

        let listeners = HubListeners::bind(&hub).await.unwrap();
        let addrs = listeners.local_addrs().unwrap();
        assert_ne!(addrs.device.port(), 0);
        assert_ne!(addrs.http, addrs.display);
    }

    #[tokio::test]
    async fn test_serve_stops_on_cancel() {
        let mut config = HubConfig::default();
        config.host = "127.0.0.1".to_string();
        config.device_port = 0;
        config.http_port = 0;
        config.display_port = 0;
        let cancel = CancellationToken::new();
        let hub = Hub::new(config, cancel.clone());

        let listeners = HubListeners::bind(&hub).await.unwrap();
        let server = HubServer::new(hub);
        let task = tokio::spawn(async move { server.serve(listeners).await });

        cancel.cancel();
        let result = tokio::time::timeout(std::time::Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap();
        assert!(result.is_ok());
    }
}
