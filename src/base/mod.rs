//! Core components, types, and utilities for the sales call recorder.
//!
//! This module contains fundamental building blocks used throughout the application:
//! - Configuration handling and environment variables.
//! - Prompts for LLM interactions, and demo fallbacks.
//! - Voice access-token issuance and TwiML rendering.
//! - Common types and result handling.

pub mod config;
pub mod prompts;
pub mod token;
pub mod twiml;
pub mod types;
