//! Service integrations for external APIs and clients.
//!
//! - Database services (e.g., SurrealDB)
//! - LLM services (e.g., OpenAI)
//! - Telephony services (e.g., the Twilio REST API)
//!
//! Each service module defines both generic traits and concrete implementations,
//! allowing for extensibility and easy testing.

pub mod db;
pub mod llm;
pub mod twilio;
