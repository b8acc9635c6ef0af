//! Workflows that orchestrate the services.
//!
//! - Opening conference recording sessions
//! - Processing completed calls through transcription, analysis and email drafting
//! - Diagnosing the Twilio voice configuration

pub mod call_processing;
pub mod conference;
pub mod diagnostics;
