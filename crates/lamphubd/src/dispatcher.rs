//! Operator command delivery.

use lamphub_core::{DeviceName, DeviceUpdate};
use lamphub_protocol::{resolve_command, CommandError, ParseFailurePolicy};
use thiserror::Error;
use tracing::{info, warn};

use crate::events::{EventBus, HubEvent};
use crate::registry::Registry;

/// Why a command was not delivered.
///
/// The display strings are the messages returned to the operator.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DispatchError {
    #[error("Error: Device '{device}' not connected.")]
    DeviceNotConnected { device: DeviceName },

    #[error("Error: Failed to send command. Device '{device}' disconnected.")]
    DeviceDisconnected { device: DeviceName },

    #[error("Error: Malformed command: {0}")]
    MalformedCommand(#[from] CommandError),
}

/// Forwards operator commands to devices and records their expected effect.
#[derive(Clone)]
pub struct CommandDispatcher {
    registry: Registry,
    bus: EventBus,
    policy: ParseFailurePolicy,
}

impl CommandDispatcher {
    pub fn new(registry: Registry, bus: EventBus, policy: ParseFailurePolicy) -> Self {
        Self {
            registry,
            bus,
            policy,
        }
    }

    pub fn policy(&self) -> ParseFailurePolicy {
        self.policy
    }

    /// Sends `command` verbatim to `device`.
    ///
    /// On success the registry is updated optimistically with the brightness
    /// and color the command implies, before the device confirms. Commands to
    /// one connection are serialized from send through update. A failed send
    /// removes the device.
    pub async fn send_command(
        &self,
        device: &DeviceName,
        command: &str,
    ) -> Result<String, DispatchError> {
        let Some(handle) = self.registry.connection(device).await else {
            warn!(device = %device, "Command for unknown device");
            return Err(DispatchError::DeviceNotConnected {
                device: device.clone(),
            });
        };

        let light = resolve_command(command, self.policy).map_err(|e| {
            warn!(device = %device, command, error = %e, "Command rejected");
            DispatchError::MalformedCommand(e)
        })?;

        let commands = handle.lock_commands().await;
        if let Err(e) = handle.send_text(command).await {
            warn!(device = %device, error = %e, "Failed to send command");
            if self
                .registry
                .unregister_connection(device, handle.id())
                .await
            {
                self.bus.publish(HubEvent::DevicesChanged).await;
            }
            return Err(DispatchError::DeviceDisconnected {
                device: device.clone(),
            });
        }
        info!(device = %device, command, "Command sent");

        let update = DeviceUpdate::light(light.brightness, light.color.clone());
        if !self.registry.update(device, &update).await {
            warn!(device = %device, "Device vanished before its state could be updated");
        }
        drop(commands);

        self.bus
            .publish(HubEvent::CommandApplied {
                device: device.clone(),
                brightness: light.brightness,
                color: light.color,
            })
            .await;
        self.bus.publish(HubEvent::DevicesChanged).await;

        Ok(format!("Success: Command '{command}' sent to '{device}'."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::RecordingSink;
    use crate::registry::ConnectionHandle;
    use std::sync::Arc;

    async fn setup(policy: ParseFailurePolicy) -> (CommandDispatcher, Registry, Arc<RecordingSink>) {
        let registry = Registry::new();
        let sink = Arc::new(RecordingSink::default());
        registry
            .register(DeviceName::new("Rectangle"), ConnectionHandle::new(sink.clone()))
            .await;
        let dispatcher = CommandDispatcher::new(registry.clone(), EventBus::default(), policy);
        (dispatcher, registry, sink)
    }

    #[tokio::test]
    async fn test_command_forwarded_and_applied() {
        let (dispatcher, registry, sink) = setup(ParseFailurePolicy::UseDefault).await;
        let name = DeviceName::new("Rectangle");

        let message = dispatcher.send_command(&name, "Blue 80").await.unwrap();
        assert_eq!(message, "Success: Command 'Blue 80' sent to 'Rectangle'.");
        assert_eq!(sink.frames(), vec!["Blue 80"]);

        let record = registry.get(&name).await.unwrap();
        assert_eq!(record.brightness, 80);
        assert_eq!(record.color, "Blue");
    }

    #[tokio::test]
    async fn test_last_command_wins() {
        let (dispatcher, registry, _) = setup(ParseFailurePolicy::UseDefault).await;
        let name = DeviceName::new("Rectangle");

        dispatcher.send_command(&name, "B1 300").await.unwrap();
        dispatcher.send_command(&name, "B2 10").await.unwrap();

        let record = registry.get(&name).await.unwrap();
        assert_eq!(record.color, "B2");
        assert_eq!(record.brightness, 10);
    }

    #[tokio::test]
    async fn test_unparseable_command_sent_raw_with_fallback() {
        let (dispatcher, registry, sink) = setup(ParseFailurePolicy::UseDefault).await;
        let name = DeviceName::new("Rectangle");
        dispatcher.send_command(&name, "Red 40").await.unwrap();

        dispatcher.send_command(&name, "justonetoken").await.unwrap();

        assert_eq!(sink.frames().last().map(String::as_str), Some("justonetoken"));
        let record = registry.get(&name).await.unwrap();
        assert_eq!(record.brightness, 0);
        assert_eq!(record.color, "off");
    }

    #[tokio::test]
    async fn test_reject_policy_sends_nothing() {
        let (dispatcher, registry, sink) = setup(ParseFailurePolicy::Reject).await;
        let name = DeviceName::new("Rectangle");

        let err = dispatcher.send_command(&name, "justonetoken").await.unwrap_err();
        assert!(matches!(err, DispatchError::MalformedCommand(_)));
        assert!(sink.frames().is_empty());
        assert!(registry.contains(&name).await);
    }

    #[tokio::test]
    async fn test_unknown_device() {
        let (dispatcher, _, _) = setup(ParseFailurePolicy::UseDefault).await;
        let err = dispatcher
            .send_command(&DeviceName::new("Circle"), "Blue 80")
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Error: Device 'Circle' not connected.");
    }

    #[tokio::test]
    async fn test_send_failure_removes_device() {
        let registry = Registry::new();
        let name = DeviceName::new("Rectangle");
        registry
            .register(name.clone(), ConnectionHandle::new(Arc::new(RecordingSink::failing())))
            .await;
        let dispatcher =
            CommandDispatcher::new(registry.clone(), EventBus::default(), ParseFailurePolicy::UseDefault);

        let err = dispatcher.send_command(&name, "Blue 80").await.unwrap_err();
        assert_eq!(
            err.to_string(),
            "Error: Failed to send command. Device 'Rectangle' disconnected."
        );
        assert!(registry.is_empty().await);
        assert!(registry.is_consistent().await);
    }

    /// Records each frame as it arrives and stalls the first send.
    #[derive(Default)]
    struct StallFirstSink {
        frames: std::sync::Mutex<Vec<String>>,
    }

    impl StallFirstSink {
        fn frames(&self) -> Vec<String> {
            self.frames.lock().unwrap().clone()
        }
    }

    #[async_trait::async_trait]
    impl crate::registry::FrameSink for StallFirstSink {
        async fn send_text(&self, text: &str) -> Result<(), crate::registry::TransportError> {
            let first = {
                let mut frames = self.frames.lock().unwrap();
                frames.push(text.to_string());
                frames.len() == 1
            };
            if first {
                tokio::time::sleep(std::time::Duration::from_millis(50)).await;
            }
            Ok(())
        }

        async fn close(&self) {}
    }

    #[tokio::test]
    async fn test_concurrent_commands_record_last_delivered() {
        let registry = Registry::new();
        let sink = Arc::new(StallFirstSink::default());
        let name = DeviceName::new("Rectangle");
        registry
            .register(name.clone(), ConnectionHandle::new(sink.clone()))
            .await;
        let dispatcher = CommandDispatcher::new(
            registry.clone(),
            EventBus::default(),
            ParseFailurePolicy::UseDefault,
        );

        let slow = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let name = name.clone();
            async move { dispatcher.send_command(&name, "Red 10").await }
        });
        while sink.frames().is_empty() {
            tokio::time::sleep(std::time::Duration::from_millis(1)).await;
        }
        let fast = tokio::spawn({
            let dispatcher = dispatcher.clone();
            let name = name.clone();
            async move { dispatcher.send_command(&name, "Blue 80").await }
        });

        slow.await.unwrap().unwrap();
        fast.await.unwrap().unwrap();

        assert_eq!(sink.frames(), vec!["Red 10", "Blue 80"]);
        let record = registry.get(&name).await.unwrap();
        assert_eq!(record.color, "Blue");
        assert_eq!(record.brightness, 80);
    }
}
