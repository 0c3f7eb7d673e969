//! Async client for the Viper SmartStart vehicle telematics cloud API.
//!
//! Exposes authentication, the account's vehicle list, the two
//! independent per-vehicle status reads, and remote commands.
//! `viperlink-core` builds the polling coordinator on top of this.

pub mod auth;
pub mod client;
pub mod error;
pub mod models;
pub mod transport;

// ── Primary re-exports ──────────────────────────────────────────────
pub use client::{DEFAULT_BASE_URL, ViperClient};
pub use error::Error;
pub use models::{AuthToken, StatusReads, VehicleCommand, VehicleRecord};
pub use transport::TransportConfig;
