//! Twilio REST API over `reqwest`.

use std::{sync::Arc, time::Duration};

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::base::{config::Config, types::Res};

use super::{GenericTwilioClient, TwilioClient};

const API_BASE: &str = "https://api.twilio.com/2010-04-01";
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Recording URLs from status callbacks have no extension; Twilio serves the
/// media in the format named by the suffix.
const RECORDING_FORMAT: &str = ".mp3";

// Extra methods on `TwilioClient` applied by the rest implementation.

impl TwilioClient {
    pub fn rest(config: &Config) -> Res<Self> {
        let client = RestTwilioClient::new(config)?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Specific implementations.

/// Twilio REST client.
#[derive(Clone)]
pub struct RestTwilioClient {
    http: reqwest::Client,
    base_url: String,
    account_sid: Option<String>,
    username: Option<String>,
    password: Option<String>,
}

impl RestTwilioClient {
    /// Create a client from the configured credentials.
    ///
    /// Requests authenticate with the API key pair when present, else with the account SID and auth token.
    #[instrument(name = "RestTwilioClient::new", skip_all)]
    pub fn new(config: &Config) -> Res<Self> {
        let http = reqwest::Client::builder().timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS)).build()?;

        let (username, password) = match (&config.twilio_api_key, &config.twilio_api_secret) {
            (Some(key), Some(secret)) => (Some(key.clone()), Some(secret.clone())),
            _ => (config.twilio_account_sid.clone(), config.twilio_auth_token.clone()),
        };

        Ok(Self {
            http,
            base_url: API_BASE.to_string(),
            account_sid: config.twilio_account_sid.clone(),
            username,
            password,
        })
    }

    fn account_sid(&self) -> Res<&str> {
        self.account_sid.as_deref().ok_or_else(|| anyhow::anyhow!("TWILIO_ACCOUNT_SID is not configured."))
    }

    fn authorized(&self, url: &str) -> Res<reqwest::RequestBuilder> {
        let username = self.username.as_deref().ok_or_else(|| anyhow::anyhow!("Twilio REST credentials are not configured."))?;

        Ok(self.http.get(url).basic_auth(username, self.password.as_deref()))
    }

    async fn get_json(&self, url: String) -> Res<Value> {
        debug!("GET {url}");

        let response = self.authorized(&url)?.send().await?;
        let status = response.status();
        let body: Value = response.json().await?;

        if !status.is_success() {
            let message = body.get("message").and_then(Value::as_str).unwrap_or("unknown error");
            return Err(anyhow::anyhow!("Twilio returned {status}: {message}"));
        }

        Ok(body)
    }
}

#[async_trait]
impl GenericTwilioClient for RestTwilioClient {
    #[instrument(skip(self))]
    async fn fetch_account(&self) -> Res<Value> {
        let url = format!("{}/Accounts/{}.json", self.base_url, self.account_sid()?);

        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn fetch_application(&self, app_sid: &str) -> Res<Value> {
        let url = format!("{}/Accounts/{}/Applications/{app_sid}.json", self.base_url, self.account_sid()?);

        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn fetch_api_key(&self, key_sid: &str) -> Res<Value> {
        let url = format!("{}/Accounts/{}/Keys/{key_sid}.json", self.base_url, self.account_sid()?);

        self.get_json(url).await
    }

    #[instrument(skip(self))]
    async fn download_recording(&self, recording_url: &str) -> Res<Vec<u8>> {
        let url = recording_media_url(recording_url);

        let response = self.authorized(&url)?.send().await?.error_for_status()?;
        let bytes = response.bytes().await?;

        debug!("Downloaded {} bytes of recording audio.", bytes.len());

        Ok(bytes.to_vec())
    }
}

/// The downloadable media URL for a recording URL.
pub fn recording_media_url(recording_url: &str) -> String {
    let path = recording_url.split('?').next().unwrap_or(recording_url);
    let has_extension = path.rsplit('/').next().is_some_and(|segment| segment.contains('.'));

    if has_extension {
        recording_url.to_string()
    } else {
        format!("{recording_url}{RECORDING_FORMAT}")
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::config::ConfigInner;

    #[test]
    fn recording_urls_get_a_media_format() {
        assert_eq!(
            recording_media_url("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.mp3"
        );
        assert_eq!(
            recording_media_url("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.wav"),
            "https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1.wav"
        );
    }

    #[tokio::test]
    async fn missing_credentials_fail_without_a_request() {
        let client = RestTwilioClient::new(&Config::from(ConfigInner::default())).unwrap();

        assert!(client.fetch_account().await.is_err());
        assert!(client.download_recording("https://api.twilio.com/rec").await.is_err());
    }

    #[test]
    fn prefers_the_api_key_pair() {
        let client = RestTwilioClient::new(&Config::from(ConfigInner {
            twilio_account_sid: Some("AC".to_string()),
            twilio_auth_token: Some("token".to_string()),
            twilio_api_key: Some("SK".to_string()),
            twilio_api_secret: Some("secret".to_string()),
            ..ConfigInner::default()
        }))
        .unwrap();

        assert_eq!(client.username.as_deref(), Some("SK"));
        assert_eq!(client.password.as_deref(), Some("secret"));
    }
}
