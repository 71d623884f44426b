//! The registry's owned state.
//!
//! `RegistryState` is plain synchronous data; [`super::Registry`] wraps it
//! in a lock so every mutation is atomic with respect to the others.

use std::collections::{BTreeMap, HashMap};

use lamphub_core::{DeviceName, DeviceRecord, DeviceUpdate};
use tracing::{debug, info};

use super::connection::{ConnectionHandle, ConnectionId};

/// Point-in-time copy of all device records, ordered by name.
pub type DeviceSnapshot = BTreeMap<DeviceName, DeviceRecord>;

/// Connections and device records, always keyed by the same names.
#[derive(Debug, Default)]
pub struct RegistryState {
    connections: HashMap<DeviceName, ConnectionHandle>,
    states: DeviceSnapshot,
}

impl RegistryState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a device.
    ///
    /// The device record is reset to offline/0/"off" even if the name was
    /// already present. Returns the displaced connection, if any.
    pub fn register(
        &mut self,
        name: DeviceName,
        handle: ConnectionHandle,
    ) -> Option<ConnectionHandle> {
        let connection_id = handle.id();
        let displaced = self.connections.insert(name.clone(), handle);
        self.states
            .insert(name.clone(), DeviceRecord::registered(name.clone()));

        match &displaced {
            Some(old) => info!(
                device = %name,
                connection = %connection_id,
                displaced = %old.id(),
                "Device re-registered, previous connection superseded"
            ),
            None => info!(device = %name, connection = %connection_id, "Device registered"),
        }

        displaced
    }

    /// Removes a device unconditionally. Returns false if it was absent.
    pub fn unregister(&mut self, name: &DeviceName) -> bool {
        let had_connection = self.connections.remove(name).is_some();
        let had_state = self.states.remove(name).is_some();
        if had_connection || had_state {
            info!(device = %name, "Device unregistered");
        }
        had_connection || had_state
    }

    /// Removes a device only while `id` is still its live connection.
    ///
    /// A superseded session calling this on teardown leaves the newer
    /// registration untouched.
    pub fn unregister_connection(&mut self, name: &DeviceName, id: ConnectionId) -> bool {
        if !self.owns(name, id) {
            debug!(device = %name, connection = %id, "Stale connection, registry untouched");
            return false;
        }
        self.unregister(name)
    }

    /// Merges a partial update into an existing record.
    ///
    /// Unknown names are ignored and return false.
    pub fn update(&mut self, name: &DeviceName, update: &DeviceUpdate) -> bool {
        match self.states.get_mut(name) {
            Some(record) => {
                record.apply(update);
                debug!(
                    device = %name,
                    status = %record.status,
                    brightness = record.brightness,
                    color = %record.color,
                    "Device state updated"
                );
                true
            }
            None => {
                debug!(device = %name, "Update for unknown device ignored");
                false
            }
        }
    }

    pub fn connection(&self, name: &DeviceName) -> Option<ConnectionHandle> {
        self.connections.get(name).cloned()
    }

    /// True while `id` is the registered connection for `name`.
    pub fn owns(&self, name: &DeviceName, id: ConnectionId) -> bool {
        self.connections
            .get(name)
            .is_some_and(|handle| handle.id() == id)
    }

    pub fn get(&self, name: &DeviceName) -> Option<DeviceRecord> {
        self.states.get(name).cloned()
    }

    pub fn snapshot(&self) -> DeviceSnapshot {
        self.states.clone()
    }

    pub fn len(&self) -> usize {
        self.states.len()
    }

    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// Both maps hold exactly the same set of names.
    pub fn is_consistent(&self) -> bool {
        self.connections.len() == self.states.len()
            && self.states.keys().all(|name| self.connections.contains_key(name))
    }
}
