//! State-change events and their listeners.
//!
//! Sessions, the dispatcher and the HTTP handlers publish a [`HubEvent`]
//! after they change something. Listeners (the change notifier and the task
//! checklist) react in registration order. Publishing awaits every
//! listener, so a caller that returns has already had its change fanned out.

use std::sync::Arc;

use async_trait::async_trait;
use lamphub_core::DeviceName;
use tracing::trace;

/// Something observable happened in the hub.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HubEvent {
    /// Registry contents changed (registration, status report, command, removal)
    DevicesChanged,

    /// An operator observer connected
    ObserverConnected,

    /// The operator started device discovery
    AddDeviceRequested,

    /// The operator selected a device, bringing it online
    DeviceSelected { device: DeviceName },

    /// The operator opened a device's control screen
    DeviceEntered { device: DeviceName },

    /// A command was forwarded to a device
    CommandApplied {
        device: DeviceName,
        brightness: i64,
        color: String,
    },
}

impl HubEvent {
    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DevicesChanged => "devices_changed",
            Self::ObserverConnected => "observer_connected",
            Self::AddDeviceRequested => "add_device_requested",
            Self::DeviceSelected { .. } => "device_selected",
            Self::DeviceEntered { .. } => "device_entered",
            Self::CommandApplied { .. } => "command_applied",
        }
    }
}

/// Reacts to hub events.
#[async_trait]
pub trait StateChangeListener: Send + Sync {
    /// Name used in logs.
    fn name(&self) -> &'static str;

    async fn on_event(&self, event: &HubEvent);
}

/// Ordered, fixed set of listeners.
#[derive(Clone, Default)]
pub struct EventBus {
    listeners: Arc<Vec<Arc<dyn StateChangeListener>>>,
}

impl EventBus {
    pub fn new(listeners: Vec<Arc<dyn StateChangeListener>>) -> Self {
        Self {
            listeners: Arc::new(listeners),
        }
    }

    /// Delivers `event` to every listener in order.
    pub async fn publish(&self, event: HubEvent) {
        for listener in self.listeners.iter() {
            trace!(event = event.kind(), listener = listener.name(), "Dispatching event");
            listener.on_event(&event).await;
        }
    }

    pub fn listener_count(&self) -> usize {
        self.listeners.len()
    }
}
