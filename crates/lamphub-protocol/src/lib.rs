//! lamphub Protocol - Wire formats for hub communication
//!
//! This crate provides message types and parsing for the three kinds of
//! peers the hub talks to:
//! - smart-light devices (`frame`, `command`): plain text frames
//! - operator and display observers (`message`): JSON push messages
//! - the operator HTTP API (`api`): JSON request and response bodies

pub mod api;
pub mod command;
pub mod frame;
pub mod message;

pub use api::{ApiResponse, ApiStatus, CommandRequest, DeviceListResponse, DeviceNameRequest};
pub use command::{parse_command, resolve_command, CommandError, LightCommand, ParseFailurePolicy};
pub use frame::{
    parse_inbound, parse_registration, parse_status_report, FrameError, InboundFrame,
    StatusReport, PING_FRAME, REGISTRATION_PREFIX, STATUS_PREFIX,
};
pub use message::ObserverMessage;
