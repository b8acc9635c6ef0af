use std::time::Instant;

use serde::{Deserialize, Serialize};
use tokio::task::JoinHandle;
use tracing::{Instrument, error, info, instrument, warn};

use crate::{
    base::{
        prompts::{DEMO_TRANSCRIPT, FALLBACK_TRANSCRIPT, demo_prospect, fallback_analysis, fallback_email},
        types::{CallAnalysis, EmailDraft, NewCall, Prospect, RecordingMethod, Res, Void},
    },
    runtime::Runtime,
    service::llm::LlmClient,
};

/// Twilio appends no extension to recording URLs and serves MP3 by default.
const DEFAULT_AUDIO_EXTENSION: &str = "mp3";

/// The fields of a Twilio call-status webhook that matter here.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct CallStatusWebhook {
    #[serde(rename = "CallSid", default)]
    pub call_sid: String,
    #[serde(rename = "CallStatus", default)]
    pub call_status: String,
    #[serde(rename = "RecordingUrl", default)]
    pub recording_url: Option<String>,
    #[serde(rename = "From", default)]
    pub from: Option<String>,
    #[serde(rename = "To", default)]
    pub to: Option<String>,
}

impl CallStatusWebhook {
    /// The recording URL, when this webhook reports a completed, recorded call.
    pub fn completed_recording(&self) -> Option<&str> {
        if self.call_status != "completed" {
            return None;
        }

        self.recording_url.as_deref().filter(|url| !url.is_empty())
    }
}

/// Result of the demo pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DemoResult {
    pub transcript: String,
    pub analysis: CallAnalysis,
    pub email: EmailDraft,
    pub processing_time: String,
    pub savings: String,
}

/// Acknowledge a call-status webhook and process a completed recording in the background.
///
/// Returns the handle of the spawned task, if any work was scheduled.
#[instrument(skip_all, fields(call_sid = %webhook.call_sid, status = %webhook.call_status))]
pub fn handle_call_status(webhook: CallStatusWebhook, runtime: Runtime) -> Option<JoinHandle<()>> {
    info!("Twilio webhook: {} for {}", webhook.call_status, webhook.call_sid);

    let recording_url = webhook.completed_recording()?.to_string();

    let Some(to) = webhook.to.clone().filter(|to| !to.is_empty()) else {
        warn!("Completed call `{}` has no `To` number; nothing to match.", webhook.call_sid);
        return None;
    };

    let handle = tokio::spawn(
        async move {
            // Process the call.
            let result = process_completed_call(&webhook.call_sid, &recording_url, &to, &runtime).await;

            // Log any errors.
            if let Err(err) = &result {
                error!("Error while processing completed call: {}", err);
            }
        }
        .in_current_span(),
    );

    Some(handle)
}

/// Turn a completed conference into a call row and analyze it.
///
/// Returns the id of the created call, or `None` when no pending conference matches `to`.
#[instrument(skip(runtime))]
pub async fn process_completed_call(call_sid: &str, recording_url: &str, to: &str, runtime: &Runtime) -> Res<Option<String>> {
    let Some(conference) = runtime.db.find_pending_conference_call(to).await? else {
        warn!("No pending conference call for `{}`.", to);
        return Ok(None);
    };

    let call = runtime
        .db
        .complete_conference_call(
            &conference.id,
            recording_url,
            NewCall {
                contact_id: conference.contact_id.clone(),
                audio_url: Some(recording_url.to_string()),
                duration: None,
                recording_method: RecordingMethod::Conference,
                twilio_call_sid: Some(call_sid.to_string()),
            },
        )
        .await?;

    process_call_with_ai(&call.id, Some(recording_url), conference.contact_id.as_deref(), runtime).await?;

    Ok(Some(call.id))
}

/// Transcribe, analyze and draft a follow-up for a call, then store the results.
///
/// Each AI step falls back to demo content when it fails; only storage errors are returned.
#[instrument(skip(runtime))]
pub async fn process_call_with_ai(call_id: &str, audio_url: Option<&str>, contact_id: Option<&str>, runtime: &Runtime) -> Void {
    info!("Starting AI processing for call `{}`.", call_id);

    let transcript = match audio_url {
        Some(url) => match transcribe(url, runtime).await {
            Ok(text) if !text.trim().is_empty() => text,
            Ok(_) => {
                warn!("Transcription of `{}` was empty; using the fallback transcript.", url);
                FALLBACK_TRANSCRIPT.trim().to_string()
            }
            Err(err) => {
                warn!("Transcription of `{}` failed; using the fallback transcript: {}", url, err);
                FALLBACK_TRANSCRIPT.trim().to_string()
            }
        },
        None => FALLBACK_TRANSCRIPT.trim().to_string(),
    };

    let contact = match contact_id {
        Some(id) => runtime.db.get_contact(id).await.unwrap_or_else(|err| {
            warn!("Could not load contact `{}`: {}", id, err);
            None
        }),
        None => None,
    };

    let prospect = contact.as_ref().map(Prospect::from).unwrap_or_default();

    let (analysis, email) = analyze_with_fallback(&runtime.llm, &transcript, &prospect).await;

    runtime.db.save_analysis_results(call_id, &transcript, &analysis, &email).await?;

    info!("AI processing complete for call `{}`.", call_id);

    Ok(())
}

/// Run the analysis and email steps on the fixed demo call.
#[instrument(skip_all)]
pub async fn demo_process(llm: &LlmClient) -> DemoResult {
    let started = Instant::now();
    let transcript = DEMO_TRANSCRIPT.trim().to_string();

    let (analysis, email) = analyze_with_fallback(llm, &transcript, &demo_prospect()).await;

    DemoResult {
        transcript,
        analysis,
        email,
        processing_time: format!("{:.1} seconds", started.elapsed().as_secs_f64()),
        savings: "Saved 25 minutes of manual work".to_string(),
    }
}

async fn analyze_with_fallback(llm: &LlmClient, transcript: &str, prospect: &Prospect) -> (CallAnalysis, EmailDraft) {
    let mut analysis = llm.analyze_call(transcript, prospect).await.unwrap_or_else(|err| {
        warn!("Call analysis failed; using the fallback analysis: {}", err);
        fallback_analysis()
    });

    analysis.lead_score = analysis.lead_score.clamp(1, 10);

    let email = llm.generate_follow_up_email(&analysis, prospect).await.unwrap_or_else(|err| {
        warn!("Email generation failed; using the fallback email: {}", err);
        fallback_email(prospect)
    });

    (analysis, email)
}

/// Load the audio behind `audio_url` and transcribe it.
async fn transcribe(audio_url: &str, runtime: &Runtime) -> Res<String> {
    let audio = if is_remote(audio_url) {
        runtime.twilio.download_recording(audio_url).await?
    } else {
        tokio::fs::read(audio_url).await?
    };

    runtime.llm.transcribe_audio(&audio_file_name(audio_url), audio).await
}

fn is_remote(audio_url: &str) -> bool {
    audio_url.starts_with("http://") || audio_url.starts_with("https://")
}

/// A file name whose extension tells the transcription service the audio format.
fn audio_file_name(audio_url: &str) -> String {
    let path = audio_url.split('?').next().unwrap_or(audio_url);
    let name = path.rsplit(['/', '\\']).next().filter(|n| !n.is_empty()).unwrap_or("recording");

    if name.contains('.') {
        name.to_string()
    } else {
        format!("{name}.{DEFAULT_AUDIO_EXTENSION}")
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;

    fn webhook(status: &str, recording_url: Option<&str>) -> CallStatusWebhook {
        CallStatusWebhook {
            call_sid: "CA1".to_string(),
            call_status: status.to_string(),
            recording_url: recording_url.map(str::to_string),
            from: Some("+15550001111".to_string()),
            to: Some("+15559990000".to_string()),
        }
    }

    #[test]
    fn only_completed_recordings_are_processed() {
        assert_eq!(webhook("completed", Some("https://api.twilio.com/rec")).completed_recording(), Some("https://api.twilio.com/rec"));
        assert_eq!(webhook("completed", None).completed_recording(), None);
        assert_eq!(webhook("completed", Some("")).completed_recording(), None);
        assert_eq!(webhook("in-progress", Some("https://api.twilio.com/rec")).completed_recording(), None);
    }

    #[test]
    fn webhook_parses_twilio_form_fields() {
        let webhook: CallStatusWebhook = serde_json::from_value(serde_json::json!({
            "CallSid": "CA9",
            "CallStatus": "completed",
            "RecordingUrl": "https://api.twilio.com/rec",
            "To": "+15559990000",
            "AccountSid": "AC1"
        }))
        .unwrap();

        assert_eq!(webhook.call_sid, "CA9");
        assert_eq!(webhook.from, None);
        assert_eq!(webhook.to.as_deref(), Some("+15559990000"));
    }

    #[test]
    fn audio_file_names_carry_a_format() {
        assert_eq!(audio_file_name("https://api.twilio.com/2010-04-01/Accounts/AC1/Recordings/RE1"), "RE1.mp3");
        assert_eq!(audio_file_name("uploads/call_1_abc.webm"), "call_1_abc.webm");
        assert_eq!(audio_file_name("https://example.com/a/b.wav?download=true"), "b.wav");
        assert!(is_remote("https://api.twilio.com/rec"));
        assert!(!is_remote("./uploads/call.webm"));
    }
}
