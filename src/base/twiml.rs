//! Minimal TwiML documents for the voice bridge.

use serde::Serialize;

use super::types::Res;

/// Recording mode for bridged calls: both legs, from the moment the callee answers.
pub const DUAL_CHANNEL_RECORDING: &str = "record-from-answer-dual-channel";

/// Apology spoken when a call cannot be bridged.
pub const ERROR_MESSAGE: &str = "Sorry, there was an error processing your call.";

const XML_DECLARATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>"#;

/// A `<Response>` document.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
#[serde(rename = "Response")]
pub struct VoiceResponse {
    #[serde(rename = "$value")]
    verbs: Vec<Verb>,
}

/// The verbs this service emits.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub enum Verb {
    Dial(Dial),
    Say(String),
}

/// `<Dial>` with optional recording.
#[derive(Debug, Clone, Default, Serialize, PartialEq, Eq)]
pub struct Dial {
    #[serde(rename = "@callerId", skip_serializing_if = "Option::is_none")]
    pub caller_id: Option<String>,
    #[serde(rename = "@record", skip_serializing_if = "Option::is_none")]
    pub record: Option<String>,
    #[serde(rename = "@recordingStatusCallback", skip_serializing_if = "Option::is_none")]
    pub recording_status_callback: Option<String>,
    #[serde(rename = "Number")]
    pub numbers: Vec<String>,
}

impl VoiceResponse {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn dial(mut self, dial: Dial) -> Self {
        self.verbs.push(Verb::Dial(dial));
        self
    }

    pub fn say(mut self, text: impl Into<String>) -> Self {
        self.verbs.push(Verb::Say(text.into()));
        self
    }

    /// Render with an XML declaration.
    pub fn to_xml(&self) -> Res<String> {
        Ok(format!("{XML_DECLARATION}{}", quick_xml::se::to_string(self)?))
    }
}

/// Bridge the browser client to `to`, recording both legs and reporting the recording to `callback_url`.
pub fn recorded_dial(caller_id: &str, to: &str, callback_url: &str) -> VoiceResponse {
    VoiceResponse::new().dial(Dial {
        caller_id: Some(caller_id.to_string()),
        record: Some(DUAL_CHANNEL_RECORDING.to_string()),
        recording_status_callback: Some(callback_url.to_string()),
        numbers: vec![to.to_string()],
    })
}

/// The response returned when a call cannot be bridged.
pub fn error_response() -> VoiceResponse {
    VoiceResponse::new().say(ERROR_MESSAGE)
}

// Tests.
