//! Load configuration via `config` crate with env-override support.

use std::{ops::Deref, sync::Arc};

use serde::Deserialize;

use super::types::Res;

/// Default conference dial-in number when none is configured.
fn default_twilio_conference_number() -> String {
    "+1-555-RECORD".to_string()
}

/// Default access-token lifetime, in seconds.
fn default_twilio_token_ttl() -> u64 {
    3600
}

/// Default OpenAI chat model.
fn default_openai_model() -> String {
    "gpt-4".to_string()
}

/// Default OpenAI transcription model.
fn default_openai_transcription_model() -> String {
    "whisper-1".to_string()
}

/// Default sampling temperature for call analysis.
fn default_openai_analysis_temperature() -> f32 {
    0.3
}

/// Default sampling temperature for email generation.
fn default_openai_email_temperature() -> f32 {
    0.7
}

/// Default HTTP port.
fn default_port() -> u16 {
    3001
}

/// Default database endpoint (a local file store).
fn default_db_endpoint() -> String {
    "surrealkv://sales_platform.db".to_string()
}

/// Default upload directory.
fn default_upload_dir() -> String {
    "./uploads".to_string()
}

/// Configuration for the sales call recorder.
#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub inner: Arc<ConfigInner>,
}

impl Deref for Config {
    type Target = ConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

#[derive(Debug, Deserialize, Clone)]
pub struct ConfigInner {
    /// Twilio account SID (`TWILIO_ACCOUNT_SID`).
    #[serde(default)]
    pub twilio_account_sid: Option<String>,
    /// Twilio auth token (`TWILIO_AUTH_TOKEN`).
    #[serde(default)]
    pub twilio_auth_token: Option<String>,
    /// Twilio API key SID (`TWILIO_API_KEY`).
    #[serde(default)]
    pub twilio_api_key: Option<String>,
    /// Twilio API key secret (`TWILIO_API_SECRET`).
    #[serde(default)]
    pub twilio_api_secret: Option<String>,
    /// TwiML application SID (`TWILIO_APP_SID`).
    #[serde(default)]
    pub twilio_app_sid: Option<String>,
    /// Caller id used by the voice bridge (`TWILIO_PHONE_NUMBER`).
    #[serde(default)]
    pub twilio_phone_number: Option<String>,
    /// Conference dial-in number (`TWILIO_CONFERENCE_NUMBER`).
    #[serde(default = "default_twilio_conference_number")]
    pub twilio_conference_number: String,
    /// Default access-token TTL in seconds (`TWILIO_TOKEN_TTL`).
    #[serde(default = "default_twilio_token_ttl")]
    pub twilio_token_ttl: u64,
    /// OpenAI API key (`OPENAI_API_KEY`). When absent, analysis falls back to demo content.
    #[serde(default)]
    pub openai_api_key: Option<String>,
    /// OpenAI chat model (`OPENAI_MODEL`).
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    /// OpenAI transcription model (`OPENAI_TRANSCRIPTION_MODEL`).
    #[serde(default = "default_openai_transcription_model")]
    pub openai_transcription_model: String,
    /// Sampling temperature for call analysis (`OPENAI_ANALYSIS_TEMPERATURE`).
    #[serde(default = "default_openai_analysis_temperature")]
    pub openai_analysis_temperature: f32,
    /// Sampling temperature for follow-up emails (`OPENAI_EMAIL_TEMPERATURE`).
    #[serde(default = "default_openai_email_temperature")]
    pub openai_email_temperature: f32,
    /// HTTP port (`PORT`).
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL used for Twilio callbacks (`PUBLIC_BASE_URL`).
    #[serde(default)]
    pub public_base_url: Option<String>,
    /// Database endpoint (`DB_ENDPOINT`), e.g. `mem://`, `surrealkv://path` or `ws://host:8000`.
    #[serde(default = "default_db_endpoint")]
    pub db_endpoint: String,
    /// Database username for remote endpoints (`DB_USERNAME`).
    #[serde(default)]
    pub db_username: Option<String>,
    /// Database password for remote endpoints (`DB_PASSWORD`).
    #[serde(default)]
    pub db_password: Option<String>,
    /// Directory for uploaded recordings (`UPLOAD_DIR`).
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

impl Default for ConfigInner {
    fn default() -> Self {
        Self {
            twilio_account_sid: None,
            twilio_auth_token: None,
            twilio_api_key: None,
            twilio_api_secret: None,
            twilio_app_sid: None,
            twilio_phone_number: None,
            twilio_conference_number: default_twilio_conference_number(),
            twilio_token_ttl: default_twilio_token_ttl(),
            openai_api_key: None,
            openai_model: default_openai_model(),
            openai_transcription_model: default_openai_transcription_model(),
            openai_analysis_temperature: default_openai_analysis_temperature(),
            openai_email_temperature: default_openai_email_temperature(),
            port: default_port(),
            public_base_url: None,
            db_endpoint: default_db_endpoint(),
            db_username: None,
            db_password: None,
            upload_dir: default_upload_dir(),
        }
    }
}

impl Config {
    pub fn load(explicit_path: Option<&std::path::Path>) -> Res<Self> {
        let mut cfg = config::Config::builder().add_source(config::Environment::default());

        if let Some(p) = explicit_path {
            cfg = cfg.add_source(config::File::from(p.to_path_buf()));
        } else if std::path::Path::new(".hidden/config.toml").exists() {
            cfg = cfg.add_source(config::File::with_name(".hidden/config.toml"));
        }

        let result = Config {
            inner: Arc::new(cfg.build()?.try_deserialize()?),
        };

        result.validate()?;

        Ok(result)
    }

    /// Check ranges that serde cannot express.
    pub fn validate(&self) -> Res<()> {
        if self.openai_analysis_temperature < 0.0 || self.openai_analysis_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI analysis temperature must be between 0 and 2."));
        }

        if self.openai_email_temperature < 0.0 || self.openai_email_temperature > 2.0 {
            return Err(anyhow::anyhow!("OpenAI email temperature must be between 0 and 2."));
        }

        if self.twilio_token_ttl < 1 || self.twilio_token_ttl > crate::base::token::MAX_TTL {
            return Err(anyhow::anyhow!("Twilio token TTL must be between 1 and {} seconds.", crate::base::token::MAX_TTL));
        }

        Ok(())
    }

    /// Base URL that Twilio should call back into.
    pub fn public_base_url(&self) -> String {
        match &self.public_base_url {
            Some(url) => url.trim_end_matches('/').to_string(),
            None => format!("http://localhost:{}", self.port),
        }
    }

    /// Whether an OpenAI key is present.
    pub fn openai_configured(&self) -> bool {
        self.openai_api_key.as_deref().is_some_and(|k| !k.is_empty())
    }

    /// Whether every Twilio credential is present.
    pub fn twilio_configured(&self) -> bool {
        [&self.twilio_account_sid, &self.twilio_auth_token, &self.twilio_api_key, &self.twilio_api_secret]
            .iter()
            .all(|v| v.as_deref().is_some_and(|s| !s.is_empty()))
    }
}

impl From<ConfigInner> for Config {
    fn from(inner: ConfigInner) -> Self {
        Self { inner: Arc::new(inner) }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn defaults() -> ConfigInner {
        ConfigInner::default()
    }

    #[test]
    fn defaults_are_valid() {
        let config = Config::from(defaults());

        assert!(config.validate().is_ok());
        assert_eq!(config.public_base_url(), "http://localhost:3001");
        assert!(!config.openai_configured());
        assert!(!config.twilio_configured());
    }

    #[test]
    fn rejects_out_of_range_temperature() {
        let config = Config::from(ConfigInner {
            openai_email_temperature: 2.5,
            ..defaults()
        });

        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_out_of_range_ttl() {
        let config = Config::from(ConfigInner { twilio_token_ttl: 0, ..defaults() });

        assert!(config.validate().is_err());
    }

    #[test]
    fn trims_public_base_url() {
        let config = Config::from(ConfigInner {
            public_base_url: Some("https://calls.example.com/".to_string()),
            ..defaults()
        });

        assert_eq!(config.public_base_url(), "https://calls.example.com");
    }
}
