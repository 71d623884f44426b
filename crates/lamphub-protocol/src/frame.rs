//! Text frames exchanged with smart-light devices.
//!
//! Devices speak a tiny line-oriented protocol over a WebSocket:
//!
//! ```text
//! device -> hub   DEVICE_NAME:<name>                      (first frame only)
//! hub -> device   PING                                    (every heartbeat)
//! device -> hub   STATUS:brightness=<int>,color=<token>   (any key order)
//! hub -> device   <color> <brightness>                    (operator command)
//! ```

use lamphub_core::{DeviceName, DomainError};
use thiserror::Error;

/// Prefix of the registration frame.
pub const REGISTRATION_PREFIX: &str = "DEVICE_NAME:";

/// Prefix of a status report frame.
pub const STATUS_PREFIX: &str = "STATUS:";

/// Liveness probe sent by the hub.
pub const PING_FRAME: &str = "PING";

/// A parsed device-to-hub frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundFrame {
    /// `DEVICE_NAME:<name>`
    Registration(DeviceName),

    /// `STATUS:` with both brightness and color present
    Status(StatusReport),

    /// A frame with a known prefix whose body could not be parsed
    Malformed(FrameError),

    /// Anything else (including bare `PONG` replies)
    Unrecognized(String),
}

/// Brightness and color reported by a device.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub brightness: i64,
    pub color: String,
}

/// Errors produced while parsing device frames.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum FrameError {
    #[error("expected registration frame, got {frame:?}")]
    NotRegistration { frame: String },

    #[error("registration frame carries an empty device name")]
    EmptyDeviceName,

    #[error("status report is missing {field}")]
    MissingField { field: &'static str },

    #[error("status report entry {entry:?} is not a key=value pair")]
    InvalidPair { entry: String },

    #[error("status report brightness {value:?} is not an integer")]
    InvalidBrightness { value: String },
}

impl From<DomainError> for FrameError {
    fn from(_: DomainError) -> Self {
        FrameError::EmptyDeviceName
    }
}

/// Classifies a device-to-hub text frame.
///
/// Prefix checks happen here so the session state machine only ever
/// matches on [`InboundFrame`] variants.
pub fn parse_inbound(frame: &str) -> InboundFrame {
    if let Some(name) = frame.strip_prefix(REGISTRATION_PREFIX) {
        return match DeviceName::parse(name) {
            Ok(name) => InboundFrame::Registration(name),
            Err(e) => InboundFrame::Malformed(e.into()),
        };
    }

    if let Some(body) = frame.strip_prefix(STATUS_PREFIX) {
        return match parse_status_report(body) {
            Ok(report) => InboundFrame::Status(report),
            Err(e) => InboundFrame::Malformed(e),
        };
    }

    InboundFrame::Unrecognized(frame.to_string())
}

/// Parses the first frame of a device connection.
pub fn parse_registration(frame: &str) -> Result<DeviceName, FrameError> {
    match parse_inbound(frame) {
        InboundFrame::Registration(name) => Ok(name),
        InboundFrame::Malformed(FrameError::EmptyDeviceName) => Err(FrameError::EmptyDeviceName),
        _ => Err(FrameError::NotRegistration {
            frame: frame.to_string(),
        }),
    }
}

/// Parses the body of a status report (everything after `STATUS:`).
///
/// Every comma-separated entry must be a single `key=value` pair. Unknown
/// keys are ignored; a repeated key keeps its last value. Both `brightness`
/// and `color` must be present.
pub fn parse_status_report(body: &str) -> Result<StatusReport, FrameError> {
    let mut brightness = None;
    let mut color = None;

    for entry in body.split(',') {
        let mut parts = entry.split('=');
        let (key, value) = match (parts.next(), parts.next(), parts.next()) {
            (Some(key), Some(value), None) => (key.trim(), value.trim()),
            _ => {
                return Err(FrameError::InvalidPair {
                    entry: entry.to_string(),
                })
            }
        };

        match key {
            "brightness" => {
                let parsed = value
                    .parse::<i64>()
                    .map_err(|_| FrameError::InvalidBrightness {
                        value: value.to_string(),
                    })?;
                brightness = Some(parsed);
            }
            "color" => color = Some(value.to_string()),
            _ => {}
        }
    }

    let brightness = brightness.ok_or(FrameError::MissingField {
        field: "brightness",
    })?;
    let color = color.ok_or(FrameError::MissingField { field: "color" })?;

    Ok(StatusReport { brightness, color })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_registration_frame() {
        assert_eq!(
            parse_inbound("DEVICE_NAME: Rectangle "),
            InboundFrame::Registration(DeviceName::new("Rectangle"))
        );
    }

    #[test]
    fn test_registration_keeps_colons_in_name() {
        assert_eq!(
            parse_registration("DEVICE_NAME:lamp:kitchen"),
            Ok(DeviceName::new("lamp:kitchen"))
        );
    }

    #[test]
    fn test_registration_rejects_other_first_frames() {
        assert!(matches!(
            parse_registration("HELLO"),
            Err(FrameError::NotRegistration { .. })
        ));
        assert!(matches!(
            parse_registration("STATUS:brightness=1,color=red"),
            Err(FrameError::NotRegistration { .. })
        ));
        assert_eq!(
            parse_registration("DEVICE_NAME:   "),
            Err(FrameError::EmptyDeviceName)
        );
    }

    #[test]
    fn test_status_any_order_with_whitespace() {
        assert_eq!(
            parse_inbound("STATUS: color = Blue , brightness= 80"),
            InboundFrame::Status(StatusReport {
                brightness: 80,
                color: "Blue".to_string()
            })
        );
    }

    #[test]
    fn test_status_ignores_unknown_keys() {
        let report = parse_status_report("brightness=5,color=red,temp=3").unwrap();
        assert_eq!(report.brightness, 5);
        assert_eq!(report.color, "red");
    }

    #[test]
    fn test_status_missing_field() {
        assert_eq!(
            parse_status_report("brightness=5"),
            Err(FrameError::MissingField { field: "color" })
        );
        assert_eq!(
            parse_status_report("color=red"),
            Err(FrameError::MissingField {
                field: "brightness"
            })
        );
    }

    #[test]
    fn test_status_malformed_entries() {
        assert!(matches!(
            parse_status_report(""),
            Err(FrameError::InvalidPair { .. })
        ));
        assert!(matches!(
            parse_status_report("brightness=5=6,color=red"),
            Err(FrameError::InvalidPair { .. })
        ));
        assert!(matches!(
            parse_status_report("brightness=bright,color=red"),
            Err(FrameError::InvalidBrightness { .. })
        ));
    }

    #[test]
    fn test_malformed_status_is_tagged() {
        assert!(matches!(
            parse_inbound("STATUS:brightness=x,color=red"),
            InboundFrame::Malformed(FrameError::InvalidBrightness { .. })
        ));
    }

    #[test]
    fn test_unrecognized_frame() {
        assert_eq!(
            parse_inbound("PONG"),
            InboundFrame::Unrecognized("PONG".to_string())
        );
    }
}
