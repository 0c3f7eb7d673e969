// SmartStart cloud API wire types
//
// The API wraps everything in a `{ "results": ... }` envelope and is
// loose about field types (numeric ids, string coordinates). Device
// identity is parsed into `VehicleRecord`; the two status-read payloads
// stay `serde_json::Value` because field extraction is lenient-by-key
// and belongs to the merge layer in viperlink-core.

use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::AsRefStr;

use crate::error::Error;

/// Bearer credential obtained from `/auth/login`.
#[derive(Debug, Clone)]
pub struct AuthToken {
    pub access_token: SecretString,
    /// Expiry as reported by the API. Kept for diagnostics only; the
    /// 401-retry path is what actually handles expiry.
    pub expiration: Option<i64>,
}

/// Vehicle identity as returned by the device search endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VehicleRecord {
    /// Stable device id. The API sometimes returns it as a number;
    /// it is always stringified here.
    pub id: String,
    pub name: String,
    pub make: Option<String>,
    pub model: Option<String>,
    pub year: Option<String>,
}

/// Commands accepted by `/devices/command`.
///
/// `ReadActive` and `ReadCurrent` are the two status queries; the rest
/// are remote actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, AsRefStr)]
#[strum(serialize_all = "snake_case")]
pub enum VehicleCommand {
    /// Lock doors / arm the security system.
    Arm,
    /// Unlock doors / disarm the security system.
    Disarm,
    /// Remote start.
    Remote,
    ReadActive,
    ReadCurrent,
}

/// The outcome of both status reads for one vehicle.
///
/// Each read succeeds or fails independently; neither outcome
/// short-circuits the other. The merge layer consumes this as-is.
#[derive(Debug)]
pub struct StatusReads {
    /// `read_active`: position, motion, battery, door/ignition state.
    pub active: Result<Value, Error>,
    /// `read_current`: locks, security system, remote-start state.
    pub current: Result<Value, Error>,
}
