// viperlink-core: status model, merge logic, and the polling
// coordinator between viperlink-api and platform adapters.

pub mod cadence;
pub mod config;
pub mod coordinator;
pub mod error;
pub mod merge;
pub mod model;
pub mod registry;

// ── Primary re-exports ──────────────────────────────────────────────
pub use cadence::{ACTION_REFRESH_DELAY, BOOSTED_INTERVAL, BOOSTED_MAX_DURATION, Cadence};
pub use config::AccountConfig;
pub use coordinator::Coordinator;
pub use error::CoreError;
pub use merge::merge_status_reads;
pub use model::{Snapshot, Vehicle, VehicleStatus};
pub use registry::CoordinatorRegistry;
