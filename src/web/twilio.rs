//! Token, TwiML and callback endpoints.

use axum::{
    Form, Json,
    body::Bytes,
    extract::{Query, State, rejection::QueryRejection},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tracing::{info, instrument, warn};

use crate::{
    base::{
        token::{IssuedToken, TokenError, TokenRequest, VoiceTokenIssuer},
        twiml::{self, VoiceResponse},
    },
    interaction::{
        call_processing::{CallStatusWebhook, handle_call_status},
        diagnostics::{DiagnosticsReport, run_diagnostics},
    },
    runtime::Runtime,
};

use super::error::{ApiError, ApiResult};

/// Successful token response.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct TokenResponse {
    pub success: bool,
    pub token: String,
    pub identity: String,
    pub ttl: u64,
    pub timestamp: DateTime<Utc>,
    pub expires_at: i64,
    pub method: String,
}

impl From<IssuedToken> for TokenResponse {
    fn from(issued: IssuedToken) -> Self {
        Self {
            success: true,
            token: issued.token,
            identity: issued.identity,
            ttl: issued.ttl,
            timestamp: DateTime::from_timestamp(issued.issued_at, 0).unwrap_or_else(Utc::now),
            expires_at: issued.expires_at,
            method: issued.method,
        }
    }
}

fn issue_token(runtime: &Runtime, request: &TokenRequest) -> ApiResult<Json<TokenResponse>> {
    let issuer = VoiceTokenIssuer::from_config(&runtime.config)?;
    let issued = issuer.issue(request)?;

    info!("Issued voice token for `{}` ({}).", issued.identity, issued.method);

    Ok(Json(issued.into()))
}

/// Parse a token request body; a blank body asks for all defaults.
fn parse_token_body(body: &[u8]) -> Result<TokenRequest, TokenError> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(TokenRequest::default());
    }

    serde_json::from_slice(body).map_err(|err| TokenError::Validation(format!("invalid request body: {err}")))
}

#[instrument(skip_all)]
pub async fn token_from_body(State(runtime): State<Runtime>, body: Bytes) -> ApiResult<Json<TokenResponse>> {
    let request = parse_token_body(&body)?;

    issue_token(&runtime, &request)
}

#[instrument(skip_all)]
pub async fn token_from_query(State(runtime): State<Runtime>, query: Result<Query<TokenRequest>, QueryRejection>) -> ApiResult<Json<TokenResponse>> {
    let Query(request) = query.map_err(|rejection| TokenError::Validation(format!("invalid query string: {}", rejection.body_text())))?;

    issue_token(&runtime, &request)
}

/// Form posted by Twilio when the browser client places a call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct VoiceRequest {
    #[serde(rename = "To", default)]
    pub to: Option<String>,
}

fn twiml_response(status: StatusCode, response: VoiceResponse) -> Response {
    match response.to_xml() {
        Ok(xml) => (status, [(header::CONTENT_TYPE, "text/xml")], xml).into_response(),
        Err(err) => ApiError::Internal(err).into_response(),
    }
}

/// Bridge the browser client to the dialed number, recording both legs.
#[instrument(skip_all)]
pub async fn voice(State(runtime): State<Runtime>, Form(request): Form<VoiceRequest>) -> Response {
    let to = request.to.as_deref().map(str::trim).filter(|to| !to.is_empty());
    let caller_id = runtime.config.twilio_phone_number.as_deref().filter(|id| !id.is_empty());

    match (to, caller_id) {
        (Some(to), Some(caller_id)) => {
            info!("Bridging call to {}.", to);

            let callback = format!("{}/api/twilio/recording-callback", runtime.config.public_base_url());
            twiml_response(StatusCode::OK, twiml::recorded_dial(caller_id, to, &callback))
        }
        (None, _) => {
            warn!("Voice request without a `To` number.");
            twiml_response(StatusCode::INTERNAL_SERVER_ERROR, twiml::error_response())
        }
        (_, None) => {
            warn!("TWILIO_PHONE_NUMBER is not set; cannot bridge the call.");
            twiml_response(StatusCode::INTERNAL_SERVER_ERROR, twiml::error_response())
        }
    }
}

/// Form posted by Twilio when a recording is ready.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RecordingCallback {
    #[serde(rename = "CallSid", default)]
    pub call_sid: Option<String>,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "RecordingSid", default)]
    pub recording_sid: Option<String>,
    #[serde(rename = "RecordingDuration", default)]
    pub recording_duration: Option<String>,
}

pub async fn recording_callback(Form(callback): Form<RecordingCallback>) -> Json<Value> {
    info!(
        "Call {} recording {} available at {} ({}s).",
        callback.call_sid.as_deref().unwrap_or("?"),
        callback.recording_sid.as_deref().unwrap_or("?"),
        callback.recording_url.as_deref().unwrap_or("?"),
        callback.recording_duration.as_deref().unwrap_or("?"),
    );

    Json(json!({ "status": "success" }))
}

/// Acknowledge a call-status webhook immediately; completed recordings are processed in the background.
pub async fn webhook(State(runtime): State<Runtime>, Form(webhook): Form<CallStatusWebhook>) -> &'static str {
    handle_call_status(webhook, runtime);

    "OK"
}

pub async fn diagnostics(State(runtime): State<Runtime>) -> Json<DiagnosticsReport> {
    Json(run_diagnostics(&runtime.config, &runtime.twilio).await)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blank_token_body_uses_defaults() {
        assert_eq!(parse_token_body(b"").unwrap(), TokenRequest::default());
        assert_eq!(parse_token_body(b" \n").unwrap(), TokenRequest::default());
    }

    #[test]
    fn malformed_token_body_is_rejected() {
        let bodies: [&[u8]; 4] = [br#"{"identity":"alice","ttl":-5}"#, br#"{"identity":"alice","ttl":"1800"}"#, br#"{"identity":42}"#, b"not json"];

        for body in bodies {
            assert!(matches!(parse_token_body(body), Err(TokenError::Validation(_))), "{}", String::from_utf8_lossy(body));
        }

        let request = parse_token_body(br#"{"identity":"alice","ttl":1800}"#).unwrap();
        assert_eq!(request.identity.as_deref(), Some("alice"));
        assert_eq!(request.ttl, Some(1800));
    }
}
