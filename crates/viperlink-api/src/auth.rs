// Authentication flow
//
// Form-encoded login against `/auth/login`. A rejected login or a
// response without the expected token structure is auth-class; network
// and content problems are API-class, matching how the coordinator
// decides between credential re-entry and retry.

use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use tracing::debug;

use crate::client::ViperClient;
use crate::error::Error;
use crate::models::AuthToken;

impl ViperClient {
    /// Authenticate with the account credentials and store the bearer
    /// token for subsequent calls.
    pub async fn authenticate(&self) -> Result<(), Error> {
        let url = self.login_url()?;
        let (username, password) = self.credentials();

        debug!(username, "attempting authentication");

        let resp = self
            .http()
            .post(url)
            .form(&[("username", username), ("password", password.expose_secret())])
            .send()
            .await
            .map_err(Error::Transport)?;

        let status = resp.status();
        debug!(status = status.as_u16(), "auth response");

        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            debug!(body = %body, "auth error response");
            return Err(Error::Authentication {
                message: format!("login rejected (HTTP {status})"),
            });
        }

        let body = resp.text().await.map_err(Error::Transport)?;
        let payload: Value = serde_json::from_str(&body).map_err(|e| Error::Deserialization {
            message: e.to_string(),
            body,
        })?;

        let Some(access_token) = payload
            .pointer("/results/authToken/accessToken")
            .and_then(Value::as_str)
        else {
            debug!("auth response missing access token");
            return Err(Error::Authentication {
                message: "invalid authentication response".into(),
            });
        };

        let expiration = payload
            .pointer("/results/authToken/expiration")
            .and_then(Value::as_i64);

        self.store_token(AuthToken {
            access_token: SecretString::from(access_token.to_owned()),
            expiration,
        });

        debug!("authentication successful");
        Ok(())
    }
}
