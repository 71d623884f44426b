//! lamphub daemon: device registry, heartbeat sessions and observer fan-out.
//!
//! - `registry` - device connections and their last known state
//! - `session` - per-device registration and heartbeat state machine
//! - `dispatcher` - operator commands forwarded to devices
//! - `notifier` - `device_update` diffs pushed to operator observers
//! - `tasks` - checklist scoring pushed to display observers
//! - `server` - device, operator HTTP and display listeners
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────┐ register/update ┌──────────┐  snapshot  ┌────────────────┐
//! │ DeviceSession │────────────────▶│ Registry │◀───────────│ ChangeNotifier │──▶ operators
//! └──────┬────────┘                 └──────────┘            └───────▲────────┘
//!        │                               ▲                          │
//!        │ HubEvent               update │                          │ HubEvent
//!        ▼                               │                          │
//! ┌───────────────┐             ┌────────┴──────────┐        ┌──────┴─────────┐
//! │   EventBus    │◀────────────│ CommandDispatcher │        │ ChecklistPolicy│──▶ displays
//! └───────┬───────┘             └───────────────────┘        └──────▲─────────┘
//!         └─────────────────────────────────────────────────────────┘
//! ```
//!
//! # Panic-Free Guarantees
//!
//! All production code in this crate is panic-free:
//! - No `.unwrap()`, `.expect()`, `panic!()`, `unreachable!()`, `todo!()`
//! - All fallible operations return `Result` or `Option`
//! - Per-connection failures end only that connection

pub mod config;
pub mod dispatcher;
pub mod events;
pub mod hub;
pub mod notifier;
pub mod observers;
pub mod registry;
pub mod server;
pub mod session;
pub mod tasks;

pub use config::{ConfigError, HubConfig, TaskTargets};
pub use dispatcher::{CommandDispatcher, DispatchError};
pub use events::{EventBus, HubEvent, StateChangeListener};
pub use hub::Hub;
pub use notifier::{ChangeNotifier, NotifyOutcome};
pub use observers::{BroadcastReport, ObserverId, ObserverSet};
pub use registry::{ConnectionHandle, ConnectionId, DeviceSnapshot, FrameSink, Registry};
pub use server::{BoundAddrs, HubListeners, HubServer, ServerError};
pub use session::{DeviceSession, ProbeOutcome, SessionError, SessionTimings};
pub use tasks::ChecklistPolicy;
