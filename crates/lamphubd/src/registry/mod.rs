//! Device registry.
//!
//! The registry is the single source of truth for which devices are
//! connected and what state they are in. It pairs each device name with the
//! outbound half of its connection and with its last known record.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐  register/update   ┌──────────────────────────────┐
//! │ DeviceSession  │───────────────────▶│          Registry            │
//! └────────────────┘                    │  connections: name -> handle │
//! ┌────────────────┐  connection/update │  states:      name -> record │
//! │CommandDispatch │───────────────────▶│                              │
//! └────────────────┘                    └──────────────┬───────────────┘
//!                                                      │ snapshot
//!                                                      ▼
//!                                              ChangeNotifier / HTTP
//! ```
//!
//! # Panic-Free Guarantees
//!
//! - No `.unwrap()` or `.expect()` in production code
//! - Unknown names are reported through return values, never errors
//! - Both maps are mutated under one lock so their key sets never diverge

mod connection;
mod handle;
mod state;

pub use connection::{ConnectionHandle, ConnectionId, FrameSink, TransportError, WsFrameSink};
pub use handle::Registry;
pub use state::{DeviceSnapshot, RegistryState};

#[cfg(test)]
pub(crate) use connection::testing;
