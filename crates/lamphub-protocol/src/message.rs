//! Push messages sent to observer WebSocket clients.

use lamphub_core::{DeviceRecord, TaskRecord};
use serde::{Deserialize, Serialize};

/// Messages pushed from the hub to observers.
///
/// Serialized as `{"type": "...", "data": [...]}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all = "snake_case")]
pub enum ObserverMessage {
    /// Device states, sent to operator observers
    DeviceUpdate(Vec<DeviceRecord>),

    /// The full task checklist, sent to display observers
    TaskUpdate(Vec<TaskRecord>),
}

impl ObserverMessage {
    /// Creates a device update message.
    pub fn device_update(devices: Vec<DeviceRecord>) -> Self {
        Self::DeviceUpdate(devices)
    }

    /// Creates a task update message.
    pub fn task_update(tasks: Vec<TaskRecord>) -> Self {
        Self::TaskUpdate(tasks)
    }

    /// Returns the wire `type` tag.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::DeviceUpdate(_) => "device_update",
            Self::TaskUpdate(_) => "task_update",
        }
    }

    /// Serializes the message to its JSON text form.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use lamphub_core::{default_checklist, DeviceName};

    #[test]
    fn test_device_update_shape() {
        let msg = ObserverMessage::device_update(vec![DeviceRecord::registered(DeviceName::new(
            "Rectangle",
        ))]);
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(
            json,
            serde_json::json!({
                "type": "device_update",
                "data": [{
                    "device_name": "Rectangle",
                    "status": "offline",
                    "brightness": 0,
                    "color": "off"
                }]
            })
        );
    }

    #[test]
    fn test_task_update_shape() {
        let msg = ObserverMessage::task_update(default_checklist());
        let json: serde_json::Value = serde_json::from_str(&msg.to_json().unwrap()).unwrap();
        assert_eq!(json["type"], "task_update");
        assert_eq!(json["data"][0], serde_json::json!({"id": 1, "name": "open_app", "status": "pending"}));
        assert_eq!(json["data"].as_array().map(Vec::len), Some(7));
        assert_eq!(msg.kind(), "task_update");
    }
}
