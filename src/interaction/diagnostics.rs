//! One-stop check of the Twilio voice configuration.
//!
//! Reports credential presence and format, mints and verifies a short-lived test token,
//! and looks up the account, TwiML application and API key over the REST API.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::{
    base::{
        config::Config,
        token::{TokenInspection, TokenRequest, VoiceTokenIssuer, is_valid_sid},
        types::Res,
    },
    service::twilio::TwilioClient,
};

/// Lifetime of the diagnostic test token, in seconds.
pub const TEST_TOKEN_TTL: u64 = 300;

const TEST_IDENTITY: &str = "diagnostic_test";

/// Presence and format of each configured credential. Secrets are reported by length only.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct CredentialReport {
    pub has_account_sid: bool,
    pub has_auth_token: bool,
    pub has_api_key: bool,
    pub has_api_secret: bool,
    pub has_app_sid: bool,
    pub has_phone_number: bool,
    pub account_sid_format: bool,
    pub api_key_format: bool,
    pub app_sid_format: bool,
    pub auth_token_length: Option<usize>,
    pub api_secret_length: Option<usize>,
}

impl CredentialReport {
    pub fn from_config(config: &Config) -> Self {
        let present = |value: &Option<String>| value.as_deref().is_some_and(|v| !v.is_empty());
        let format = |value: &Option<String>, prefix: &str| value.as_deref().is_some_and(|v| is_valid_sid(v, prefix));

        Self {
            has_account_sid: present(&config.twilio_account_sid),
            has_auth_token: present(&config.twilio_auth_token),
            has_api_key: present(&config.twilio_api_key),
            has_api_secret: present(&config.twilio_api_secret),
            has_app_sid: present(&config.twilio_app_sid),
            has_phone_number: present(&config.twilio_phone_number),
            account_sid_format: format(&config.twilio_account_sid, "AC"),
            api_key_format: format(&config.twilio_api_key, "SK"),
            app_sid_format: format(&config.twilio_app_sid, "AP"),
            auth_token_length: config.twilio_auth_token.as_deref().map(str::len),
            api_secret_length: config.twilio_api_secret.as_deref().map(str::len),
        }
    }
}

/// Outcome of minting and verifying a test token.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TokenTest {
    pub success: bool,
    pub method: Option<String>,
    pub identity: Option<String>,
    pub token_length: Option<usize>,
    pub error: Option<String>,
    pub inspection: Option<TokenInspection>,
}

impl TokenTest {
    fn failed(error: impl ToString) -> Self {
        Self {
            success: false,
            method: None,
            identity: None,
            token_length: None,
            error: Some(error.to_string()),
            inspection: None,
        }
    }
}

/// Outcome of one REST lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum Lookup {
    Ok { data: Value },
    Failed { error: String },
    Skipped { reason: String },
}

impl Lookup {
    fn from_result(result: Res<Value>) -> Self {
        match result {
            Ok(data) => Lookup::Ok { data },
            Err(err) => Lookup::Failed { error: err.to_string() },
        }
    }

    fn skipped(reason: &str) -> Self {
        Lookup::Skipped { reason: reason.to_string() }
    }

    pub fn is_ok(&self) -> bool {
        matches!(self, Lookup::Ok { .. })
    }
}

/// The full diagnostic report.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticsReport {
    pub timestamp: DateTime<Utc>,
    pub credentials: CredentialReport,
    pub token_test: TokenTest,
    pub account: Lookup,
    pub twiml_app: Lookup,
    pub api_key: Lookup,
    pub all_valid: bool,
}

/// Run every check against the configured credentials.
#[instrument(skip_all)]
pub async fn run_diagnostics(config: &Config, twilio: &TwilioClient) -> DiagnosticsReport {
    let now = Utc::now();
    let credentials = CredentialReport::from_config(config);
    let token_test = test_token(config, now);

    let can_call_rest = credentials.has_account_sid && (credentials.has_auth_token || (credentials.has_api_key && credentials.has_api_secret));

    let (account, twiml_app, api_key) = if can_call_rest {
        let account = Lookup::from_result(twilio.fetch_account().await);

        let twiml_app = match config.twilio_app_sid.as_deref() {
            Some(app_sid) if !app_sid.is_empty() => Lookup::from_result(twilio.fetch_application(app_sid).await),
            _ => Lookup::skipped("TWILIO_APP_SID is not set"),
        };

        let api_key = match config.twilio_api_key.as_deref() {
            Some(key_sid) if !key_sid.is_empty() => Lookup::from_result(twilio.fetch_api_key(key_sid).await),
            _ => Lookup::skipped("TWILIO_API_KEY is not set"),
        };

        (account, twiml_app, api_key)
    } else {
        let reason = "account credentials are not configured";
        (Lookup::skipped(reason), Lookup::skipped(reason), Lookup::skipped(reason))
    };

    let all_valid = token_test.success && account.is_ok() && twiml_app.is_ok() && !matches!(api_key, Lookup::Failed { .. });

    if all_valid {
        info!("Twilio diagnostics passed.");
    } else {
        warn!("Twilio diagnostics found problems.");
    }

    DiagnosticsReport {
        timestamp: now,
        credentials,
        token_test,
        account,
        twiml_app,
        api_key,
        all_valid,
    }
}

/// Mint a short-lived token and verify it independently.
fn test_token(config: &Config, now: DateTime<Utc>) -> TokenTest {
    let issuer = match VoiceTokenIssuer::from_config(config) {
        Ok(issuer) => issuer,
        Err(err) => return TokenTest::failed(err),
    };

    let request = TokenRequest {
        identity: Some(TEST_IDENTITY.to_string()),
        ttl: Some(TEST_TOKEN_TTL),
        app_sid: None,
    };

    let issued = match issuer.issue_at(&request, now) {
        Ok(issued) => issued,
        Err(err) => return TokenTest::failed(err),
    };

    match issuer.inspect(&issued.token, now) {
        Ok(inspection) => TokenTest {
            success: inspection.all_valid,
            method: Some(issued.method),
            identity: Some(issued.identity),
            token_length: Some(issued.token.len()),
            error: None,
            inspection: Some(inspection),
        },
        Err(err) => TokenTest::failed(err),
    }
}

// Tests.
