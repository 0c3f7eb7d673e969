//! Account configuration for viperlink.
//!
//! TOML profiles, credential resolution (env + keyring + plaintext),
//! and translation to `viperlink_core::AccountConfig`. Platform glue
//! loads a profile here and hands the result to a `Coordinator`.

use std::collections::HashMap;
use std::path::PathBuf;
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use viperlink_core::AccountConfig;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no credentials configured for account '{account}'")]
    NoCredentials { account: String },

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Deserialize, Serialize)]
pub struct Config {
    /// Default account name.
    pub default_account: Option<String>,

    /// Named SmartStart account profiles.
    #[serde(default)]
    pub accounts: HashMap<String, AccountProfile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_account: Some("default".into()),
            accounts: HashMap::new(),
        }
    }
}

/// A named account profile.
#[derive(Debug, Deserialize, Serialize)]
pub struct AccountProfile {
    /// Account username (email).
    pub username: String,

    /// Password (plaintext — prefer keyring or env var).
    pub password: Option<String>,

    /// Environment variable name containing the password.
    pub password_env: Option<String>,

    /// API root override (regional endpoints, testing).
    pub endpoint: Option<String>,

    /// Vehicle ids to track.
    #[serde(default)]
    pub vehicles: Vec<String>,

    /// Normal refresh interval in seconds. 0 = manual refresh only
    /// (the sensible default under the cloud's yearly call budget).
    #[serde(default)]
    pub refresh_interval: u64,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,
}

// ── Config file path ────────────────────────────────────────────────

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    ProjectDirs::from("com", "viperlink", "viperlink").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("viperlink");
    p
}

// ── Config loading / saving ─────────────────────────────────────────

/// Load the full Config from file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    let path = config_path();

    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(&path))
        .merge(Env::prefixed("VIPER_").split("_"));

    let config: Config = figment.extract()?;
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    let path = config_path();
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(&path, toml_str)?;
    Ok(())
}

// ── Credential resolution ───────────────────────────────────────────

/// Resolve an account's password from the credential chain.
pub fn resolve_password(
    profile: &AccountProfile,
    account_name: &str,
) -> Result<SecretString, ConfigError> {
    // 1. Profile's password_env → env var lookup
    if let Some(ref env_name) = profile.password_env {
        if let Ok(val) = std::env::var(env_name) {
            return Ok(SecretString::from(val));
        }
    }

    // 2. System keyring
    if let Ok(entry) = keyring::Entry::new("viperlink", &format!("{account_name}/password")) {
        if let Ok(secret) = entry.get_password() {
            return Ok(SecretString::from(secret));
        }
    }

    // 3. Plaintext in config
    if let Some(ref password) = profile.password {
        return Ok(SecretString::from(password.clone()));
    }

    Err(ConfigError::NoCredentials {
        account: account_name.into(),
    })
}

/// Build an `AccountConfig` from a profile.
pub fn profile_to_account_config(
    profile: &AccountProfile,
    account_name: &str,
) -> Result<AccountConfig, ConfigError> {
    if profile.username.is_empty() {
        return Err(ConfigError::Validation {
            field: "username".into(),
            reason: "must not be empty".into(),
        });
    }

    let defaults = AccountConfig::default();

    let base_url = match &profile.endpoint {
        Some(endpoint) => endpoint
            .parse::<url::Url>()
            .map_err(|_| ConfigError::Validation {
                field: "endpoint".into(),
                reason: format!("invalid URL: {endpoint}"),
            })?,
        None => defaults.base_url,
    };

    let password = resolve_password(profile, account_name)?;

    Ok(AccountConfig {
        base_url,
        username: profile.username.clone(),
        password,
        vehicle_ids: profile.vehicles.clone(),
        refresh_interval_secs: profile.refresh_interval,
        timeout: Duration::from_secs(profile.timeout.unwrap_or(30)),
    })
}
