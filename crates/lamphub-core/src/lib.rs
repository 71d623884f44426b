//! lamphub Core - Shared types for the device-state hub
//!
//! This crate provides the domain types shared between the wire
//! protocol (lamphub-protocol) and the hub daemon (lamphubd).
//!
//! All code follows the panic-free policy: no `.unwrap()`, `.expect()`,
//! `panic!()`, `unreachable!()`, `todo!()`, or direct indexing `[i]`.

pub mod device;
pub mod error;
pub mod task;

// Re-exports for convenience
pub use device::{DeviceName, DeviceRecord, DeviceStatus, DeviceUpdate, OFF_COLOR};
pub use error::{DomainError, DomainResult};
pub use task::{default_checklist, TaskKind, TaskRecord, TaskStatus, UserAction};
