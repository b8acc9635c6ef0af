//! Conference sessions, uploads, call history, analytics and the demo run.

use std::{collections::HashMap, path::Path};

use axum::{
    Json,
    extract::{Multipart, Path as UrlPath, State},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::{error, info, instrument};
use uuid::Uuid;

use crate::{
    base::types::{Analytics, CallAnalysisRecord, CallView, NewCall, RecordingMethod},
    interaction::{
        call_processing::{DemoResult, demo_process, process_call_with_ai},
        conference::{ConferenceRequest, ConferenceSession, create_conference_call},
    },
    runtime::Runtime,
};

use super::error::{ApiError, ApiResult};

const DEFAULT_UPLOAD_EXTENSION: &str = "webm";

pub async fn create_conference(State(runtime): State<Runtime>, Json(request): Json<ConferenceRequest>) -> ApiResult<Json<ConferenceSession>> {
    Ok(Json(create_conference_call(request, &runtime.db, &runtime.config).await?))
}

/// Response to a successful upload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub call_id: String,
    pub message: String,
    pub filename: String,
}

/// Store an uploaded recording, create its call, and run it through the AI pipeline.
#[instrument(skip_all)]
pub async fn upload(State(runtime): State<Runtime>, mut multipart: Multipart) -> ApiResult<Json<UploadResponse>> {
    let mut audio = None;
    let mut contact_id = None;

    while let Some(field) = multipart.next_field().await.map_err(|e| ApiError::BadRequest(e.to_string()))? {
        match field.name() {
            Some("audio") => {
                let original = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                audio = Some((original, bytes));
            }
            Some("contactId") => {
                let value = field.text().await.map_err(|e| ApiError::BadRequest(e.to_string()))?;
                contact_id = Some(value.trim().to_string()).filter(|v| !v.is_empty());
            }
            _ => {}
        }
    }

    let Some((original, bytes)) = audio.filter(|(_, bytes)| !bytes.is_empty()) else {
        return Err(ApiError::BadRequest("No audio file provided".to_string()));
    };

    let filename = upload_file_name(&original);
    let path = Path::new(&runtime.config.upload_dir).join(&filename);

    tokio::fs::create_dir_all(&runtime.config.upload_dir).await.map_err(anyhow::Error::from)?;
    tokio::fs::write(&path, &bytes).await.map_err(anyhow::Error::from)?;

    info!("Stored upload `{}` ({} bytes).", filename, bytes.len());

    let audio_url = path.to_string_lossy().to_string();
    let call = runtime
        .db
        .create_call(NewCall {
            contact_id: contact_id.clone(),
            audio_url: Some(audio_url.clone()),
            duration: None,
            recording_method: RecordingMethod::Upload,
            twilio_call_sid: None,
        })
        .await?;

    if let Err(err) = process_call_with_ai(&call.id, Some(&audio_url), contact_id.as_deref(), &runtime).await {
        error!("AI processing failed for upload `{}`: {}", call.id, err);
    }

    Ok(Json(UploadResponse {
        call_id: call.id,
        message: "File uploaded and processing started".to_string(),
        filename,
    }))
}

/// A unique name for an upload that keeps the original extension.
fn upload_file_name(original: &str) -> String {
    let extension = original
        .rsplit_once('.')
        .map(|(_, ext)| ext)
        .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
        .unwrap_or(DEFAULT_UPLOAD_EXTENSION);

    let suffix = Uuid::new_v4().simple().to_string();

    format!("call_{}_{}.{}", Utc::now().timestamp_millis(), &suffix[..9], extension.to_ascii_lowercase())
}

/// Every call, newest first, joined with its analysis and contact.
pub async fn list(State(runtime): State<Runtime>) -> ApiResult<Json<Vec<CallView>>> {
    let calls = runtime.db.list_calls().await?;
    let analyses = latest_by_call(runtime.db.list_call_analyses().await?);
    let contacts = runtime.db.list_contacts().await?;

    let views = calls
        .into_iter()
        .map(|call| {
            let analysis = analyses.get(&call.id);
            let contact = call.contact_id.as_ref().and_then(|id| contacts.iter().find(|c| &c.id == id));

            CallView::new(call, analysis, contact)
        })
        .collect();

    Ok(Json(views))
}

fn latest_by_call(analyses: Vec<CallAnalysisRecord>) -> HashMap<String, CallAnalysisRecord> {
    let mut latest: HashMap<String, CallAnalysisRecord> = HashMap::new();

    for analysis in analyses {
        match latest.get(&analysis.call_id) {
            Some(existing) if existing.created_at >= analysis.created_at => {}
            _ => {
                latest.insert(analysis.call_id.clone(), analysis);
            }
        }
    }

    latest
}

/// One call with its analysis, contact and follow-up email.
pub async fn get(State(runtime): State<Runtime>, UrlPath(call_id): UrlPath<String>) -> ApiResult<Json<CallView>> {
    let Some(call) = runtime.db.get_call(&call_id).await? else {
        return Err(ApiError::NotFound("Call not found".to_string()));
    };

    let analysis = runtime.db.get_call_analysis(&call_id).await?;
    let email = runtime.db.get_follow_up_email(&call_id).await?;
    let contact = match &call.contact_id {
        Some(id) => runtime.db.get_contact(id).await?,
        None => None,
    };

    Ok(Json(CallView::new(call, analysis.as_ref(), contact.as_ref()).with_email(email.as_ref())))
}

pub async fn analytics(State(runtime): State<Runtime>) -> ApiResult<Json<Analytics>> {
    let calls = runtime.db.list_calls().await?;
    let analyses = runtime.db.list_call_analyses().await?;
    let contacts = runtime.db.list_contacts().await?;

    Ok(Json(Analytics::compute(&calls, &analyses, &contacts, Utc::now())))
}

pub async fn demo(State(runtime): State<Runtime>) -> Json<DemoResult> {
    info!("Demo: processing mock call ...");

    Json(demo_process(&runtime.llm).await)
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn upload_names_keep_a_safe_extension() {
        let name = upload_file_name("meeting.WAV");
        assert!(name.starts_with("call_"));
        assert!(name.ends_with(".wav"));

        assert!(upload_file_name("recording").ends_with(".webm"));
        assert!(upload_file_name("../../etc/passwd.sh;rm").ends_with(".webm"));
        assert_ne!(upload_file_name("a.webm"), upload_file_name("a.webm"));
    }
}
