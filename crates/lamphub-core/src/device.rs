//! Device entities and value objects.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::DomainError;

/// Color token a device reports when its light is switched off.
pub const OFF_COLOR: &str = "off";

// ============================================================================
// Type-Safe Identifiers
// ============================================================================

/// Name a device announces in its registration frame.
///
/// Device names are the registry's primary key; two connections announcing
/// the same name refer to the same device.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DeviceName(String);

impl DeviceName {
    /// Creates a device name without validation.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Creates a device name from raw wire text, trimming surrounding
    /// whitespace and rejecting empty names.
    pub fn parse(raw: &str) -> Result<Self, DomainError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(DomainError::EmptyDeviceName);
        }
        Ok(Self(trimmed.to_string()))
    }

    /// Returns the name as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DeviceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for DeviceName {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DeviceName {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl AsRef<str> for DeviceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

// ============================================================================
// Device Status
// ============================================================================

/// Whether the operator has brought a device online.
///
/// Devices always register as `Offline`; the operator client flips them to
/// `Online` once the user selects them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeviceStatus {
    #[default]
    Offline,
    Online,
}

impl DeviceStatus {
    /// Returns the wire label for this status.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Offline => "offline",
            Self::Online => "online",
        }
    }
}

impl fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DeviceStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "offline" => Ok(Self::Offline),
            "online" => Ok(Self::Online),
            other => Err(DomainError::InvalidStatus {
                value: other.to_string(),
            }),
        }
    }
}

// ============================================================================
// Device Record
// ============================================================================

/// Authoritative state of one connected device.
///
/// Serializes to the observer/HTTP wire shape
/// `{device_name, status, brightness, color}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceRecord {
    #[serde(rename = "device_name")]
    pub name: DeviceName,
    pub status: DeviceStatus,
    pub brightness: i64,
    pub color: String,
}

impl DeviceRecord {
    /// Creates the record a device starts with right after registration.
    pub fn registered(name: DeviceName) -> Self {
        Self {
            name,
            status: DeviceStatus::Offline,
            brightness: 0,
            color: OFF_COLOR.to_string(),
        }
    }

    /// Creates the entry observers receive for a device that went away.
    ///
    /// Same shape as a freshly registered device: offline, dark, "off".
    pub fn removed(name: DeviceName) -> Self {
        Self::registered(name)
    }

    /// Compares the observable state of two records.
    ///
    /// Colors compare case-insensitively, so a device echoing "blue" after
    /// the operator sent "Blue" is not reported as a change.
    pub fn same_observable_state(&self, other: &DeviceRecord) -> bool {
        self.status == other.status
            && self.brightness == other.brightness
            && self.color.to_lowercase() == other.color.to_lowercase()
    }

    /// Applies a partial update. Returns true if any field was present.
    pub fn apply(&mut self, update: &DeviceUpdate) -> bool {
        if let Some(status) = update.status {
            self.status = status;
        }
        if let Some(brightness) = update.brightness {
            self.brightness = brightness;
        }
        if let Some(color) = &update.color {
            self.color = color.clone();
        }
        !update.is_empty()
    }
}

/// Partial device state used by registry updates.
///
/// Fields left as `None` keep their current value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DeviceUpdate {
    pub status: Option<DeviceStatus>,
    pub brightness: Option<i64>,
    pub color: Option<String>,
}

impl DeviceUpdate {
    /// Update carrying brightness and color, as reported by a device or
    /// implied by a command.
    pub fn light(brightness: i64, color: impl Into<String>) -> Self {
        Self {
            status: None,
            brightness: Some(brightness),
            color: Some(color.into()),
        }
    }

    /// Update changing only the status.
    pub fn status(status: DeviceStatus) -> Self {
        Self {
            status: Some(status),
            ..Self::default()
        }
    }

    /// Returns true if no field is set.
    pub fn is_empty(&self) -> bool {
        self.status.is_none() && self.brightness.is_none() && self.color.is_none()
    }
}
