// SmartStart cloud HTTP client
//
// Wraps `reqwest::Client` with URL construction, bearer-header
// injection, and `{ "results": ... }` envelope handling. The login flow
// lives in `auth.rs`; this module is transport mechanics plus the
// vehicle and command endpoints.

use std::sync::{PoisonError, RwLock};

use reqwest::StatusCode;
use reqwest::header::AUTHORIZATION;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;
use url::Url;

use crate::error::Error;
use crate::models::{AuthToken, StatusReads, VehicleCommand, VehicleRecord};
use crate::transport::TransportConfig;

/// Production API root.
pub const DEFAULT_BASE_URL: &str = "https://www.vcp.cloud/v1";

const LOGIN_PATH: &str = "/auth/login";
const DEVICES_PATH: &str = "/devices/search/null";
const COMMAND_PATH: &str = "/devices/command";

/// Async client for the SmartStart cloud API.
///
/// Holds the account credentials and the bearer token obtained from
/// [`authenticate`](ViperClient::authenticate). All methods take `&self`;
/// the token sits behind interior mutability so one client instance can
/// be shared between the coordinator and command-issuing adapters.
pub struct ViperClient {
    http: reqwest::Client,
    base_url: Url,
    username: String,
    password: SecretString,
    token: RwLock<Option<AuthToken>>,
}

impl ViperClient {
    /// Create a client against an explicit API root.
    pub fn new(
        base_url: Url,
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, username, password))
    }

    /// Create a client against the production cloud.
    pub fn cloud(
        username: String,
        password: SecretString,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        let base_url = Url::parse(DEFAULT_BASE_URL)?;
        Self::new(base_url, username, password, transport)
    }

    /// Create a client with a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: Url,
        username: String,
        password: SecretString,
    ) -> Self {
        Self {
            http,
            base_url,
            username,
            password,
            token: RwLock::new(None),
        }
    }

    /// The API root this client talks to.
    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// The underlying HTTP client.
    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    /// `true` once a login has succeeded and the token is held.
    ///
    /// Presence only -- an expired token still counts, and is repaired
    /// by the caller's 401-driven re-authentication path.
    pub fn is_authenticated(&self) -> bool {
        self.token
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .is_some()
    }

    /// Drop the stored bearer token, forcing a fresh login before the
    /// next authenticated call.
    pub fn invalidate_token(&self) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = None;
    }

    // ── Endpoints ────────────────────────────────────────────────────

    /// Fetch the full list of vehicles visible to the account.
    pub async fn get_vehicles(&self) -> Result<Vec<VehicleRecord>, Error> {
        let url = self.endpoint(DEVICES_PATH)?;
        let auth = self.bearer()?;

        debug!("GET {url}");

        let resp = self
            .http
            .get(url)
            .header(AUTHORIZATION, auth)
            .send()
            .await
            .map_err(Error::Transport)?;

        let payload = parse_envelope(resp).await?;

        Ok(payload
            .pointer("/results/devices")
            .and_then(Value::as_array)
            .into_iter()
            .flatten()
            .filter_map(vehicle_from_device)
            .collect())
    }

    /// Issue both status reads for one vehicle, concurrently.
    ///
    /// Each read succeeds or fails on its own; a timeout on one never
    /// cancels or hides the other.
    pub async fn vehicle_status_reads(&self, device_id: &str) -> StatusReads {
        let (active, current) = tokio::join!(
            self.send_command(device_id, VehicleCommand::ReadActive),
            self.send_command(device_id, VehicleCommand::ReadCurrent),
        );

        StatusReads { active, current }
    }

    /// Send a command to a vehicle and return the raw response payload.
    pub async fn send_command(
        &self,
        device_id: &str,
        command: VehicleCommand,
    ) -> Result<Value, Error> {
        let url = self.endpoint(COMMAND_PATH)?;
        let auth = self.bearer()?;

        debug!(device = device_id, command = command.as_ref(), "POST {url}");

        let body = serde_json::json!({
            "command": command.as_ref(),
            "deviceId": device_id,
        });

        let resp = self
            .http
            .post(url)
            .header(AUTHORIZATION, auth)
            .json(&body)
            .send()
            .await
            .map_err(Error::Transport)?;

        parse_envelope(resp).await
    }

    /// Remote start. Success is the presence of the response envelope.
    pub async fn remote_start(&self, device_id: &str) -> Result<bool, Error> {
        let payload = self.send_command(device_id, VehicleCommand::Remote).await?;
        Ok(acknowledged(&payload))
    }

    /// Lock doors / arm the security system.
    pub async fn lock(&self, device_id: &str) -> Result<bool, Error> {
        let payload = self.send_command(device_id, VehicleCommand::Arm).await?;
        Ok(acknowledged(&payload))
    }

    /// Unlock doors / disarm the security system.
    pub async fn unlock(&self, device_id: &str) -> Result<bool, Error> {
        let payload = self.send_command(device_id, VehicleCommand::Disarm).await?;
        Ok(acknowledged(&payload))
    }

    // ── Internals shared with auth.rs ────────────────────────────────

    /// Build a full URL for an API path under the configured root.
    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, Error> {
        let full = format!("{}{path}", self.base_url.as_str().trim_end_matches('/'));
        Url::parse(&full).map_err(Error::InvalidUrl)
    }

    pub(crate) fn login_url(&self) -> Result<Url, Error> {
        self.endpoint(LOGIN_PATH)
    }

    pub(crate) fn credentials(&self) -> (&str, &SecretString) {
        (&self.username, &self.password)
    }

    pub(crate) fn store_token(&self, token: AuthToken) {
        *self.token.write().unwrap_or_else(PoisonError::into_inner) = Some(token);
    }

    /// Authorization header value, or `NotAuthenticated` if no login
    /// has succeeded yet.
    fn bearer(&self) -> Result<String, Error> {
        let guard = self.token.read().unwrap_or_else(PoisonError::into_inner);
        let token = guard.as_ref().ok_or(Error::NotAuthenticated)?;
        Ok(format!("Bearer {}", token.access_token.expose_secret()))
    }
}

// ── Response handling ────────────────────────────────────────────────

/// Check the HTTP status and parse the body as JSON.
///
/// 401 is surfaced as `SessionExpired` so callers can re-authenticate;
/// any other non-success status becomes `Api`.
async fn parse_envelope(resp: reqwest::Response) -> Result<Value, Error> {
    let status = resp.status();

    if status == StatusCode::UNAUTHORIZED {
        return Err(Error::SessionExpired);
    }

    if !status.is_success() {
        let message = resp.text().await.unwrap_or_default();
        return Err(Error::Api {
            message: if message.is_empty() {
                "request failed".into()
            } else {
                message
            },
            status: status.as_u16(),
        });
    }

    let body = resp.text().await.map_err(Error::Transport)?;

    serde_json::from_str(&body).map_err(|e| Error::Deserialization {
        message: e.to_string(),
        body,
    })
}

/// `true` if the command response carries the expected envelope.
pub(crate) fn acknowledged(payload: &Value) -> bool {
    payload.get("results").is_some()
}

/// Convert one raw device record into a `VehicleRecord`.
///
/// Records without an id are dropped -- there is nothing to key them
/// by. Ids and years arrive as strings or numbers depending on the
/// backend mood; both are accepted.
fn vehicle_from_device(device: &Value) -> Option<VehicleRecord> {
    let id = lenient_string(device.get("id")?)?;

    Some(VehicleRecord {
        name: device
            .get("name")
            .and_then(lenient_string)
            .unwrap_or_else(|| format!("Vehicle {id}")),
        make: device.get("make").and_then(lenient_string),
        model: device.get("model").and_then(lenient_string),
        year: device.get("year").and_then(lenient_string),
        id,
    })
}

fn lenient_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn vehicle_from_device_stringifies_numeric_id_and_year() {
        let device = json!({ "id": 4321, "name": "Truck", "year": 2019 });
        let record = vehicle_from_device(&device).unwrap();

        assert_eq!(record.id, "4321");
        assert_eq!(record.year.as_deref(), Some("2019"));
    }

    #[test]
    fn vehicle_from_device_defaults_missing_name() {
        let device = json!({ "id": "abc" });
        let record = vehicle_from_device(&device).unwrap();

        assert_eq!(record.name, "Vehicle abc");
        assert!(record.make.is_none());
    }

    #[test]
    fn vehicle_from_device_drops_idless_records() {
        assert!(vehicle_from_device(&json!({ "name": "ghost" })).is_none());
        assert!(vehicle_from_device(&json!({ "id": null })).is_none());
    }

    #[test]
    fn acknowledged_requires_results_key() {
        assert!(acknowledged(&json!({ "results": {} })));
        assert!(!acknowledged(&json!({ "error": "nope" })));
    }
}
