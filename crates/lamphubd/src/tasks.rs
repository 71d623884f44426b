//! Task checklist policy.
//!
//! Scores operator activity against a fixed seven-step checklist and pushes
//! the list to display observers whenever a step is re-evaluated.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use lamphub_core::{
    default_checklist, DeviceName, TaskKind, TaskRecord, TaskStatus, UserAction, OFF_COLOR,
};
use lamphub_protocol::ObserverMessage;
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::config::TaskTargets;
use crate::events::{HubEvent, StateChangeListener};
use crate::observers::{ObserverId, ObserverSet};

#[derive(Debug)]
struct ChecklistState {
    tasks: Vec<TaskRecord>,
    actions: Vec<UserAction>,
}

impl ChecklistState {
    fn record(&mut self, task: TaskKind, value: impl Into<String>) {
        let action = UserAction {
            task,
            time: Utc::now(),
            value: value.into(),
        };
        debug!(task = %action.task, value = %action.value, "User action recorded");
        self.actions.push(action);
    }

    fn set(&mut self, task: TaskKind, status: TaskStatus) {
        if let Some(entry) = self.tasks.iter_mut().find(|t| t.name == task) {
            if entry.status != status {
                info!(task = %task, status = ?status, "Task status changed");
            }
            entry.status = status;
        }
    }
}

/// Default task policy: the seven-step checklist.
pub struct ChecklistPolicy {
    targets: TaskTargets,
    displays: Arc<ObserverSet>,
    state: Mutex<ChecklistState>,
    started_at: DateTime<Utc>,
}

impl ChecklistPolicy {
    pub fn new(targets: TaskTargets, displays: Arc<ObserverSet>) -> Self {
        let started_at = Utc::now();
        info!(
            target_device = %targets.device,
            target_brightness = targets.brightness,
            target_color = %targets.color,
            started_at = %started_at.to_rfc3339(),
            "Checklist started"
        );
        Self {
            targets,
            displays,
            state: Mutex::new(ChecklistState {
                tasks: default_checklist(),
                actions: Vec::new(),
            }),
            started_at,
        }
    }

    pub fn started_at(&self) -> DateTime<Utc> {
        self.started_at
    }

    pub async fn tasks(&self) -> Vec<TaskRecord> {
        self.state.lock().await.tasks.clone()
    }

    pub async fn actions(&self) -> Vec<UserAction> {
        self.state.lock().await.actions.clone()
    }

    /// Sends the current list to one display observer, typically right
    /// after it connects.
    pub async fn send_current(&self, observer: ObserverId) -> bool {
        let tasks = self.tasks().await;
        self.displays
            .send_to(observer, &ObserverMessage::task_update(tasks))
            .await
    }

    fn is_target(&self, device: &DeviceName) -> bool {
        device.as_str() == self.targets.device
    }

    /// Applies one event. Returns true if the checklist was re-evaluated.
    async fn evaluate(&self, event: &HubEvent) -> bool {
        let mut state = self.state.lock().await;
        match event {
            HubEvent::ObserverConnected => {
                state.record(TaskKind::OpenApp, "WebSocket Connected");
                state.set(TaskKind::OpenApp, TaskStatus::Completed);
                true
            }
            HubEvent::AddDeviceRequested => {
                state.record(TaskKind::AddDevice, "User clicked add device");
                state.set(TaskKind::AddDevice, TaskStatus::Completed);
                true
            }
            HubEvent::DeviceSelected { device } => {
                state.record(TaskKind::SelectDevice, device.as_str());
                if !self.is_target(device) {
                    debug!(device = %device, "Selected device is not the target");
                    return false;
                }
                state.set(TaskKind::SelectDevice, TaskStatus::Completed);
                true
            }
            HubEvent::DeviceEntered { device } => {
                state.record(TaskKind::EnterDevice, device.as_str());
                if !self.is_target(device) {
                    debug!(device = %device, "Entered device is not the target");
                    return false;
                }
                state.set(TaskKind::EnterDevice, TaskStatus::Completed);
                true
            }
            HubEvent::CommandApplied {
                device,
                brightness,
                color,
            } => {
                if !self.is_target(device) {
                    debug!(device = %device, "Command on non-target device ignored");
                    return false;
                }
                state.record(TaskKind::ControlDevice, format!("{color} {brightness}"));
                state.set(
                    TaskKind::ControlDevice,
                    TaskStatus::from_check(color != OFF_COLOR),
                );
                state.set(
                    TaskKind::AdjustBrightness,
                    TaskStatus::from_check(*brightness == self.targets.brightness),
                );
                state.set(
                    TaskKind::ChangeColor,
                    TaskStatus::from_check(*color == self.targets.color),
                );
                true
            }
            HubEvent::DevicesChanged => false,
        }
    }
}

#[async_trait]
impl StateChangeListener for ChecklistPolicy {
    fn name(&self) -> &'static str {
        "checklist"
    }

    async fn on_event(&self, event: &HubEvent) {
        if self.evaluate(event).await {
            let tasks = self.tasks().await;
            self.displays
                .broadcast(&ObserverMessage::task_update(tasks))
                .await;
        }
    }
}
