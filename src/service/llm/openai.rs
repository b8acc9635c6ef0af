//! OpenAI-backed transcription, call analysis and email drafting.

use std::{sync::Arc, time::Duration};

use async_openai::{
    Client,
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        AudioInput, ChatCompletionRequestMessage, ChatCompletionRequestUserMessage, ChatCompletionRequestUserMessageContent, CreateChatCompletionRequestArgs,
        CreateTranscriptionRequestArgs,
    },
};
use async_trait::async_trait;
use tokio::time::timeout;
use tracing::{debug, info, instrument, warn};

use crate::base::{
    config::Config,
    prompts::{analysis_prompt, email_prompt},
    types::{CallAnalysis, EmailDraft, Prospect, Res},
};

use super::{GenericLlmClient, LlmClient, parse_json_reply};

const MAX_RETRIES: u32 = 3;
const TIMEOUT_SECS: u64 = 120;
const RETRY_DELAY_MS: u64 = 1000;

// Extra methods on `LlmClient` applied by the openai implementation.

impl LlmClient {
    pub fn openai(config: &Config) -> Self {
        let client = OpenAiLlmClient::new(config);
        Self { inner: Arc::new(client) }
    }
}

// Specific implementations.

/// OpenAI LLM client implementation.
#[derive(Clone)]
pub struct OpenAiLlmClient {
    client: Option<Client<OpenAIConfig>>,
    config: Config,
}

impl OpenAiLlmClient {
    /// Create a new OpenAI LLM client.
    ///
    /// Without an API key every call fails fast, which the call pipeline treats as "AI unavailable".
    #[instrument(name = "OpenAiLlmClient::new", skip_all)]
    pub fn new(config: &Config) -> Self {
        let client = match &config.openai_api_key {
            Some(key) if !key.is_empty() => Some(Client::with_config(OpenAIConfig::new().with_api_key(key.clone()))),
            _ => {
                warn!("OPENAI_API_KEY is not set; calls will be processed with demo content.");
                None
            }
        };

        Self { client, config: config.clone() }
    }

    fn client(&self) -> Res<&Client<OpenAIConfig>> {
        self.client.as_ref().ok_or_else(|| anyhow::anyhow!("OpenAI API key is not configured."))
    }

    /// Send a single user prompt and return the text of the first choice.
    async fn complete(&self, prompt: String, temperature: f32) -> Res<String> {
        let client = self.client()?;

        let messages = vec![ChatCompletionRequestMessage::User(ChatCompletionRequestUserMessage {
            content: ChatCompletionRequestUserMessageContent::Text(prompt),
            name: None,
        })];

        let request = CreateChatCompletionRequestArgs::default()
            .model(&self.config.openai_model)
            .messages(messages)
            .temperature(temperature)
            .build()?;

        let response = with_retries("chat completion", || {
            let request = request.clone();
            async move { client.chat().create(request).await }
        })
        .await?;
        let content = response.choices.first().and_then(|choice| choice.message.content.clone()).unwrap_or_default();

        debug!("Model replied with {} characters.", content.len());

        Ok(content)
    }
}

/// Run an OpenAI call with a timeout, retrying failures with exponential backoff.
async fn with_retries<T, F, Fut>(operation: &str, mut call: F) -> Res<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OpenAIError>>,
{
    let mut retries = 0;

    loop {
        let result = timeout(Duration::from_secs(TIMEOUT_SECS), call()).await;

        let failure = match result {
            Ok(Ok(value)) => {
                info!("OpenAI {operation} succeeded after {} attempts", retries + 1);
                return Ok(value);
            }
            Ok(Err(err)) => err.to_string(),
            Err(_) => "timed out".to_string(),
        };

        if retries >= MAX_RETRIES {
            return Err(anyhow::anyhow!("OpenAI {operation} failed after {MAX_RETRIES} retries: {failure}"));
        }

        retries += 1;
        warn!("OpenAI {operation} failed, retrying {retries}/{MAX_RETRIES}: {failure}");

        tokio::time::sleep(Duration::from_millis(RETRY_DELAY_MS * 2_u64.pow(retries - 1))).await;
    }
}

#[async_trait]
impl GenericLlmClient for OpenAiLlmClient {
    #[instrument(name = "OpenAiLlmClient::transcribe_audio", skip(self, audio))]
    async fn transcribe_audio(&self, file_name: &str, audio: Vec<u8>) -> Res<String> {
        let client = self.client()?;

        let request = CreateTranscriptionRequestArgs::default()
            .file(AudioInput::from_vec_u8(file_name.to_string(), audio))
            .model(&self.config.openai_transcription_model)
            .build()?;

        let response = with_retries("transcription", || {
            let request = request.clone();
            async move { client.audio().transcribe(request).await }
        })
        .await?;

        Ok(response.text)
    }

    #[instrument(name = "OpenAiLlmClient::analyze_call", skip_all)]
    async fn analyze_call(&self, transcript: &str, prospect: &Prospect) -> Res<CallAnalysis> {
        let reply = self.complete(analysis_prompt(transcript, prospect), self.config.openai_analysis_temperature).await?;

        parse_json_reply(&reply)
    }

    #[instrument(name = "OpenAiLlmClient::generate_follow_up_email", skip_all)]
    async fn generate_follow_up_email(&self, analysis: &CallAnalysis, prospect: &Prospect) -> Res<EmailDraft> {
        let reply = self.complete(email_prompt(analysis, prospect)?, self.config.openai_email_temperature).await?;

        parse_json_reply(&reply)
    }
}

// Tests.
