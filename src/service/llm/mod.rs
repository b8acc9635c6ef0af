pub mod openai;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde::de::DeserializeOwned;

use crate::base::types::{CallAnalysis, EmailDraft, Prospect, Res};

// Traits.

/// Generic LLM client trait that clients must implement.
///
/// Implementing this trait allows different speech-to-text and LLM providers to back the call pipeline.
/// Callers treat any error as "AI unavailable" and substitute demo content.
#[async_trait]
pub trait GenericLlmClient: Send + Sync + 'static {
    /// Transcribe a recording to text.
    async fn transcribe_audio(&self, file_name: &str, audio: Vec<u8>) -> Res<String>;

    /// Analyze a call transcript.
    async fn analyze_call(&self, transcript: &str, prospect: &Prospect) -> Res<CallAnalysis>;

    /// Write a follow-up email for an analyzed call.
    async fn generate_follow_up_email(&self, analysis: &CallAnalysis, prospect: &Prospect) -> Res<EmailDraft>;
}

// Structs.

/// LLM client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct LlmClient {
    inner: Arc<dyn GenericLlmClient>,
}

impl Deref for LlmClient {
    type Target = dyn GenericLlmClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl LlmClient {
    pub fn new(inner: Arc<dyn GenericLlmClient>) -> Self {
        Self { inner }
    }
}

// Helpers.

/// Parse a JSON object out of a model reply.
///
/// Models sometimes wrap the object in code fences or a sentence of prose, so only
/// the outermost `{ ... }` span is parsed.
pub fn parse_json_reply<T: DeserializeOwned>(reply: &str) -> Res<T> {
    let start = reply.find('{');
    let end = reply.rfind('}');

    let json = match (start, end) {
        (Some(start), Some(end)) if start < end => &reply[start..=end],
        _ => return Err(anyhow::anyhow!("Model reply did not contain a JSON object.")),
    };

    Ok(serde_json::from_str(json)?)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_fenced_reply() {
        let reply = "```json\n{\"subject\": \"Thanks\", \"body\": \"Hi there\"}\n```";
        let email: EmailDraft = parse_json_reply(reply).unwrap();

        assert_eq!(email.subject, "Thanks");
        assert_eq!(email.body, "Hi there");
    }

    #[test]
    fn parses_reply_with_prose() {
        let reply = "Here is the analysis: {\"summary\": \"Ok\", \"leadScore\": 3, \"sentiment\": {\"score\": 0.1, \"label\": \"neutral\"}} Hope it helps.";
        let analysis: CallAnalysis = parse_json_reply(reply).unwrap();

        assert_eq!(analysis.lead_score, 3);
        assert!(analysis.action_items.is_empty());
    }

    #[test]
    fn rejects_reply_without_json() {
        assert!(parse_json_reply::<EmailDraft>("I cannot help with that.").is_err());
        assert!(parse_json_reply::<EmailDraft>("{\"subject\": 1}").is_err());
    }
}
