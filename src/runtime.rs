//! Runtime services and shared state for the recorder.

use crate::{
    prelude::*,
    service::{db::DbClient, llm::LlmClient, twilio::TwilioClient},
};

/// Runtime service context that can be shared across the application.
///
/// This struct holds the configuration and a handle to each external service.
/// It is designed to be trivially cloneable, allowing it to be passed around
/// without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct Runtime {
    /// The configuration for the application.
    pub config: Config,
    /// The database client instance.
    pub db: DbClient,
    /// The LLM client instance.
    pub llm: LlmClient,
    /// The Twilio client instance.
    pub twilio: TwilioClient,
}

impl Runtime {
    /// Create a new runtime instance backed by the configured services.
    #[instrument(skip_all)]
    pub async fn new(config: Config) -> Res<Self> {
        // Initialize the database.
        let db = DbClient::surreal(&config).await?;

        // Initialize the LLM client.
        let llm = LlmClient::openai(&config);

        // Initialize the Twilio client.
        let twilio = TwilioClient::rest(&config)?;

        Ok(Self::with_services(config, db, llm, twilio))
    }

    /// Assemble a runtime from existing service handles.
    pub fn with_services(config: Config, db: DbClient, llm: LlmClient, twilio: TwilioClient) -> Self {
        Self { config, db, llm, twilio }
    }

    /// Serve the HTTP API until shutdown.
    pub async fn start(&self) -> Void {
        tokio::fs::create_dir_all(&self.config.upload_dir).await?;

        crate::web::serve(self.clone()).await
    }
}
