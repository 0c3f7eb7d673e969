// ── Runtime account configuration ──
//
// Describes one SmartStart account to poll. Carries credential data and
// polling tuning, but never touches disk -- the config crate (or any
// other consumer) constructs an `AccountConfig` and hands it in.

use std::time::Duration;

use secrecy::SecretString;
use url::Url;

use viperlink_api::DEFAULT_BASE_URL;

/// Configuration for one tracked account.
#[derive(Debug, Clone)]
pub struct AccountConfig {
    /// API root (the production cloud unless overridden for testing).
    pub base_url: Url,
    pub username: String,
    pub password: SecretString,
    /// Vehicle ids to track. Vehicles on the account but not listed
    /// here are ignored.
    pub vehicle_ids: Vec<String>,
    /// Normal refresh interval in seconds. 0 disables automatic polling
    /// (manual refresh only) -- the default, since the cloud enforces a
    /// yearly API call budget.
    pub refresh_interval_secs: u64,
    /// Request timeout.
    pub timeout: Duration,
}

impl AccountConfig {
    /// The normal polling interval, `None` when disabled.
    pub fn normal_interval(&self) -> Option<Duration> {
        (self.refresh_interval_secs > 0).then(|| Duration::from_secs(self.refresh_interval_secs))
    }
}

impl Default for AccountConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_BASE_URL).expect("default base URL is valid"),
            username: String::new(),
            password: SecretString::from(String::new()),
            vehicle_ids: Vec::new(),
            refresh_interval_secs: 0,
            timeout: Duration::from_secs(30),
        }
    }
}
