pub mod rest;

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;
use serde_json::Value;

use crate::base::types::Res;

// Traits.

/// Generic Twilio client trait that clients must implement.
///
/// Covers the REST lookups used by diagnostics and the authenticated download of call recordings.
#[async_trait]
pub trait GenericTwilioClient: Send + Sync + 'static {
    /// Fetch the configured account resource.
    async fn fetch_account(&self) -> Res<Value>;

    /// Fetch a TwiML application resource.
    async fn fetch_application(&self, app_sid: &str) -> Res<Value>;

    /// Fetch an API key resource.
    async fn fetch_api_key(&self, key_sid: &str) -> Res<Value>;

    /// Download the audio behind a recording URL.
    async fn download_recording(&self, recording_url: &str) -> Res<Vec<u8>>;
}

// Structs.

/// Twilio client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct TwilioClient {
    inner: Arc<dyn GenericTwilioClient>,
}

impl Deref for TwilioClient {
    type Target = dyn GenericTwilioClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl TwilioClient {
    pub fn new(inner: Arc<dyn GenericTwilioClient>) -> Self {
        Self { inner }
    }
}
