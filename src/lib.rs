//! Library root for `sales-call-recorder`.
//!
//! The recorder backs a browser-based sales dialer:
//! - Mints Twilio Voice access tokens and answers Twilio's TwiML and status callbacks
//! - Records conference calls and uploaded audio
//! - Transcribes and analyzes each call with OpenAI and drafts a follow-up email
//! - Serves contacts, call history and analytics to the front end
//!
//! SurrealDB provides storage. Each external service sits behind a trait so that
//! tests can swap in mocks.

pub mod base;
pub mod interaction;
pub mod prelude;
pub mod runtime;
pub mod service;
pub mod web;

use base::{config::Config, types::Void};
use tracing::info;

/// Public async entry for the binary crate.
///
/// Creates the runtime context with database, LLM and Twilio clients, then serves HTTP until shutdown.
pub async fn start(config: Config) -> Void {
    info!("Starting sales-call-recorder ...");

    // Initialize the runtime.
    let runtime = runtime::Runtime::new(config).await?;

    // Start the runtime.
    runtime.start().await?;

    Ok(())
}
