//! Request and response bodies of the operator HTTP API.

use lamphub_core::DeviceRecord;
use serde::{Deserialize, Serialize};

/// `POST /command` body.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CommandRequest {
    #[serde(default)]
    pub device: Option<String>,
    #[serde(default)]
    pub command: Option<String>,
}

impl CommandRequest {
    /// Returns `(device, command)` when both are present and non-empty.
    pub fn fields(&self) -> Option<(&str, &str)> {
        let device = non_empty(self.device.as_deref())?;
        let command = non_empty(self.command.as_deref())?;
        Some((device, command))
    }
}

/// Body of the endpoints that only name a device
/// (`/set_device_online`, `/enter_device`).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DeviceNameRequest {
    #[serde(default)]
    pub device_name: Option<String>,
}

impl DeviceNameRequest {
    /// Returns the device name when present and non-empty.
    pub fn device_name(&self) -> Option<&str> {
        non_empty(self.device_name.as_deref())
    }
}

/// `GET /devices` response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceListResponse {
    pub devices: Vec<DeviceRecord>,
}

/// Outcome label of an API call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ApiStatus {
    Success,
    Error,
}

/// `{status, message}` body returned by every mutating endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiResponse {
    pub status: ApiStatus,
    pub message: String,
}

impl ApiResponse {
    /// Creates a success body.
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Success,
            message: message.into(),
        }
    }

    /// Creates an error body.
    pub fn error(message: impl Into<String>) -> Self {
        Self {
            status: ApiStatus::Error,
            message: message.into(),
        }
    }
}

fn non_empty(value: Option<&str>) -> Option<&str> {
    value.filter(|v| !v.is_empty())
}
