//! Shared, cheap-to-clone access to the registry state.

use std::sync::Arc;

use lamphub_core::{DeviceName, DeviceRecord, DeviceUpdate};
use tokio::sync::Mutex;

use super::connection::{ConnectionHandle, ConnectionId};
use super::state::{DeviceSnapshot, RegistryState};

/// Handle to the device registry.
///
/// Every method takes the lock once, so each call is atomic with respect to
/// every other call. Nothing is awaited while the lock is held except the
/// lock itself.
///
/// # Usage
///
/// ```ignore
/// let registry = Registry::new();
/// registry.register(name.clone(), handle).await;
/// registry.update(&name, &DeviceUpdate::light(80, "Blue")).await;
/// let devices = registry.snapshot().await;
/// ```
#[derive(Clone, Default)]
pub struct Registry {
    inner: Arc<Mutex<RegistryState>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a device, replacing any prior entry of the same name.
    ///
    /// Returns the displaced connection so the caller can close it.
    pub async fn register(
        &self,
        name: DeviceName,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        self.inner.lock().await.register(name, handle)
    }

    /// Removes a device by name. Returns false if it was absent.
    pub async fn unregister(&self, name: &DeviceName) -> bool {
        self.inner.lock().await.unregister(name)
    }

    /// Removes a device only if `id` is still its registered connection.
    pub async fn unregister_connection(&self, name: &DeviceName, id: ConnectionId) -> bool {
        self.inner.lock().await.unregister_connection(name, id)
    }

    /// Merges a partial update. Returns false for unknown devices.
    pub async fn update(&self, name: &DeviceName, update: &DeviceUpdate) -> bool {
        self.inner.lock().await.update(name, update)
    }

    /// Clones out the connection handle so callers can send without the lock.
    pub async fn connection(&self, name: &DeviceName) -> Option<ConnectionHandle> {
        self.inner.lock().await.connection(name)
    }

    pub async fn owns(&self, name: &DeviceName, id: ConnectionId) -> bool {
        self.inner.lock().await.owns(name, id)
    }

    pub async fn get(&self, name: &DeviceName) -> Option<DeviceRecord> {
        self.inner.lock().await.get(name)
    }

    pub async fn contains(&self, name: &DeviceName) -> bool {
        self.inner.lock().await.get(name).is_some()
    }

    /// Copies every device record, ordered by name.
    pub async fn snapshot(&self) -> DeviceSnapshot {
        self.inner.lock().await.snapshot()
    }

    /// Device records as a list, for HTTP responses.
    pub async fn devices(&self) -> Vec<DeviceRecord> {
        self.inner.lock().await.snapshot().into_values().collect()
    }

    pub async fn len(&self) -> usize {
        self.inner.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.inner.lock().await.is_empty()
    }

    pub async fn is_consistent(&self) -> bool {
        self.inner.lock().await.is_consistent()
    }
}
