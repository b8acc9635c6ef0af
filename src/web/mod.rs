//! HTTP surface: JSON endpoints for the front end and form/TwiML endpoints for Twilio.

pub mod calls;
pub mod contacts;
pub mod error;
pub mod twilio;

use std::net::SocketAddr;

use axum::{
    Json, Router,
    extract::{DefaultBodyLimit, State},
    routing::{get, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use crate::{prelude::*, runtime::Runtime};

/// Largest accepted upload.
pub const MAX_UPLOAD_BYTES: usize = 100 * 1024 * 1024;

const SERVICE_NAME: &str = "Sales Platform API";

/// Build the application router over a runtime.
pub fn router(runtime: Runtime) -> Router {
    Router::new()
        .route("/api/health", get(health))
        .route("/api/twilio/token", get(twilio::token_from_query).post(twilio::token_from_body))
        .route("/api/twilio/voice", post(twilio::voice))
        .route("/api/twilio/recording-callback", post(twilio::recording_callback))
        .route("/api/twilio/webhook", post(twilio::webhook))
        .route("/api/twilio/diagnostics", get(twilio::diagnostics))
        .route("/api/conference/create", post(calls::create_conference))
        .route("/api/calls/upload", post(calls::upload).layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES)))
        .route("/api/calls", get(calls::list))
        .route("/api/calls/:call_id", get(calls::get))
        .route("/api/contacts", get(contacts::list).post(contacts::create))
        .route("/api/analytics", get(calls::analytics))
        .route("/api/demo/process-call", post(calls::demo))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(runtime)
}

/// Bind the configured port and serve until ctrl-c.
#[instrument(skip_all)]
pub async fn serve(runtime: Runtime) -> Void {
    let addr = SocketAddr::from(([0, 0, 0, 0], runtime.config.port));
    let listener = tokio::net::TcpListener::bind(addr).await?;

    info!("{} listening on http://{}", SERVICE_NAME, addr);
    info!("Conference recording number: {}", runtime.config.twilio_conference_number);

    axum::serve(listener, router(runtime)).with_graceful_shutdown(shutdown_signal()).await?;

    info!("Server stopped.");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        error!("Failed to listen for ctrl-c: {}", err);
        std::future::pending::<()>().await;
    }

    info!("Shutting down ...");
}

// Health.

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Health {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
    pub openai_configured: bool,
    pub twilio_configured: bool,
}

async fn health(State(runtime): State<Runtime>) -> Json<Health> {
    Json(Health {
        status: "OK".to_string(),
        service: SERVICE_NAME.to_string(),
        timestamp: Utc::now(),
        openai_configured: runtime.config.openai_configured(),
        twilio_configured: runtime.config.twilio_configured(),
    })
}
