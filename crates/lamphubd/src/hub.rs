//! Wiring of the hub's shared services.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::HubConfig;
use crate::dispatcher::CommandDispatcher;
use crate::events::{EventBus, StateChangeListener};
use crate::notifier::ChangeNotifier;
use crate::observers::ObserverSet;
use crate::registry::Registry;
use crate::session::SessionTimings;
use crate::tasks::ChecklistPolicy;

/// Every service a connection handler may need, cheap to clone.
///
/// The event bus delivers to the change notifier first, then to the
/// checklist.
#[derive(Clone)]
pub struct Hub {
    pub config: Arc<HubConfig>,
    pub registry: Registry,
    pub bus: EventBus,
    pub notifier: Arc<ChangeNotifier>,
    pub tasks: Arc<ChecklistPolicy>,
    pub dispatcher: CommandDispatcher,
    pub operators: Arc<ObserverSet>,
    pub displays: Arc<ObserverSet>,
    pub cancel: CancellationToken,
}

impl Hub {
    pub fn new(config: HubConfig, cancel: CancellationToken) -> Self {
        let registry = Registry::new();
        let operators = Arc::new(ObserverSet::new("operator", config.observer_queue));
        let displays = Arc::new(ObserverSet::new("display", config.observer_queue));

        let notifier = Arc::new(ChangeNotifier::new(registry.clone(), operators.clone()));
        let tasks = Arc::new(ChecklistPolicy::new(
            config.tasks.clone(),
            displays.clone(),
        ));

        let listeners: Vec<Arc<dyn StateChangeListener>> = vec![
            notifier.clone() as Arc<dyn StateChangeListener>,
            tasks.clone() as Arc<dyn StateChangeListener>,
        ];
        let bus = EventBus::new(listeners);

        let dispatcher =
            CommandDispatcher::new(registry.clone(), bus.clone(), config.on_parse_failure);

        Self {
            config: Arc::new(config),
            registry,
            bus,
            notifier,
            tasks,
            dispatcher,
            operators,
            displays,
            cancel,
        }
    }

    pub fn session_timings(&self) -> SessionTimings {
        SessionTimings::from_config(&self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::RecordingSink;
    use crate::registry::ConnectionHandle;
    use lamphub_core::{DeviceName, TaskKind, TaskStatus};

    #[tokio::test]
    async fn test_command_reaches_operators_and_displays() {
        let hub = Hub::new(HubConfig::default(), CancellationToken::new());
        let (_, mut operator) = hub.operators.add().await;
        let (_, mut display) = hub.displays.add().await;

        let name = DeviceName::new("Rectangle");
        hub.registry
            .register(name.clone(), ConnectionHandle::new(Arc::new(RecordingSink::default())))
            .await;

        hub.dispatcher.send_command(&name, "Blue 80").await.unwrap();

        let update: serde_json::Value =
            serde_json::from_str(&operator.recv().await.unwrap()).unwrap();
        assert_eq!(update["type"], "device_update");
        assert_eq!(update["data"][0]["brightness"], 80);
        assert_eq!(update["data"][0]["color"], "Blue");

        let tasks: serde_json::Value =
            serde_json::from_str(&display.recv().await.unwrap()).unwrap();
        assert_eq!(tasks["type"], "task_update");

        let statuses = hub.tasks.tasks().await;
        for kind in [
            TaskKind::ControlDevice,
            TaskKind::AdjustBrightness,
            TaskKind::ChangeColor,
        ] {
            assert!(statuses
                .iter()
                .any(|t| t.name == kind && t.status == TaskStatus::Completed));
        }
    }
}
