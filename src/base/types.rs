use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub type Err = anyhow::Error;
pub type Res<T> = Result<T, Err>;
pub type Void = Res<()>;

/// A request that was rejected before any work was done.
///
/// Carried inside `Err` so the HTTP layer can answer with a client error.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{0}")]
pub struct InvalidInput(pub String);

impl InvalidInput {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }
}

/// How the audio for a call was captured.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RecordingMethod {
    Browser,
    Upload,
    Conference,
    Twilio,
}

/// Lifecycle of a conference-call recording session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ConferenceStatus {
    Pending,
    Completed,
}

/// A contact (prospect) in the store.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Contact {
    pub id: String,
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewContact {
    pub name: String,
    pub company: Option<String>,
    pub email: Option<String>,
    pub phone: Option<String>,
}

/// A recorded call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Call {
    pub id: String,
    pub contact_id: Option<String>,
    pub audio_url: Option<String>,
    pub transcript: Option<String>,
    pub duration: Option<i64>,
    pub recording_method: RecordingMethod,
    pub twilio_call_sid: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewCall {
    pub contact_id: Option<String>,
    pub audio_url: Option<String>,
    pub duration: Option<i64>,
    pub recording_method: RecordingMethod,
    pub twilio_call_sid: Option<String>,
}

/// Sentiment of a call as judged by the LLM.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Sentiment {
    pub score: f64,
    pub label: String,
}

/// A follow-up task extracted from a call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionItem {
    pub task: String,
    #[serde(default)]
    pub priority: String,
    #[serde(default, rename = "dueDate", alias = "due_date")]
    pub due_date: Option<String>,
}

/// Free-form facts pulled from a call (budget, timeline, decision makers, ...).
///
/// Values keep whatever JSON shape the model produced.
pub type KeyInfo = BTreeMap<String, Value>;

/// Structured analysis of a call transcript, in the shape the LLM is asked to produce.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct CallAnalysis {
    pub summary: String,
    pub lead_score: i64,
    pub sentiment: Sentiment,
    #[serde(default)]
    pub key_info: KeyInfo,
    #[serde(default)]
    pub action_items: Vec<ActionItem>,
    #[serde(default)]
    pub next_steps: Option<String>,
}

/// A persisted analysis row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallAnalysisRecord {
    pub id: String,
    pub call_id: String,
    pub summary: String,
    pub lead_score: i64,
    pub sentiment_score: f64,
    pub sentiment_label: String,
    pub action_items: Vec<ActionItem>,
    pub key_info: KeyInfo,
    pub next_steps: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Subject and body of a generated follow-up email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmailDraft {
    pub subject: String,
    pub body: String,
}

/// A persisted follow-up email row.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FollowUpEmail {
    pub id: String,
    pub call_id: String,
    pub subject: String,
    pub body: String,
    pub sent: bool,
    pub scheduled_for: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

/// A conference-call recording session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConferenceCall {
    pub id: String,
    pub conference_number: String,
    pub salesperson_phone: String,
    pub customer_phone: Option<String>,
    pub contact_id: Option<String>,
    pub status: ConferenceStatus,
    pub recording_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NewConferenceCall {
    pub conference_number: String,
    pub salesperson_phone: String,
    pub customer_phone: Option<String>,
    pub contact_id: Option<String>,
}

/// Who the salesperson was talking to, as far as the prompts are concerned.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Prospect {
    pub name: Option<String>,
    pub company: Option<String>,
    pub email: Option<String>,
}

impl From<&Contact> for Prospect {
    fn from(contact: &Contact) -> Self {
        Self {
            name: Some(contact.name.clone()),
            company: contact.company.clone(),
            email: contact.email.clone(),
        }
    }
}

impl Prospect {
    /// A one-line description used inside prompts.
    pub fn describe(&self, unknown: &str) -> String {
        match (&self.name, &self.company) {
            (Some(name), Some(company)) => format!("{name} from {company}"),
            (Some(name), None) => name.clone(),
            (None, Some(company)) => format!("Someone from {company}"),
            (None, None) => unknown.to_string(),
        }
    }
}

/// A call joined with its analysis, contact and (optionally) follow-up email.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CallView {
    #[serde(flatten)]
    pub call: Call,
    pub summary: Option<String>,
    pub lead_score: Option<i64>,
    pub sentiment_score: Option<f64>,
    pub sentiment_label: Option<String>,
    pub action_items: Option<Vec<ActionItem>>,
    pub key_info: Option<KeyInfo>,
    pub contact_name: Option<String>,
    pub contact_company: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_subject: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_body: Option<String>,
}

impl CallView {
    pub fn new(call: Call, analysis: Option<&CallAnalysisRecord>, contact: Option<&Contact>) -> Self {
        Self {
            call,
            summary: analysis.map(|a| a.summary.clone()),
            lead_score: analysis.map(|a| a.lead_score),
            sentiment_score: analysis.map(|a| a.sentiment_score),
            sentiment_label: analysis.map(|a| a.sentiment_label.clone()),
            action_items: analysis.map(|a| a.action_items.clone()),
            key_info: analysis.map(|a| a.key_info.clone()),
            contact_name: contact.map(|c| c.name.clone()),
            contact_company: contact.and_then(|c| c.company.clone()),
            email_subject: None,
            email_body: None,
        }
    }

    pub fn with_email(mut self, email: Option<&FollowUpEmail>) -> Self {
        self.email_subject = email.map(|e| e.subject.clone());
        self.email_body = email.map(|e| e.body.clone());
        self
    }
}

/// One entry of the "top performing calls" list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TopCall {
    pub id: String,
    pub created_at: DateTime<Utc>,
    pub lead_score: i64,
    pub name: Option<String>,
    pub company: Option<String>,
}

/// Aggregate numbers for the analytics dashboard.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Analytics {
    pub total_calls: usize,
    pub avg_lead_score: Option<f64>,
    pub calls_this_week: usize,
    pub top_performing_calls: Vec<TopCall>,
}

impl Analytics {
    /// Number of entries in `top_performing_calls`.
    pub const TOP_CALLS: usize = 5;

    /// Aggregate the given rows as of `now`.
    pub fn compute(calls: &[Call], analyses: &[CallAnalysisRecord], contacts: &[Contact], now: DateTime<Utc>) -> Self {
        let week_ago = now - chrono::Duration::days(7);

        let avg_lead_score = if analyses.is_empty() {
            None
        } else {
            Some(analyses.iter().map(|a| a.lead_score as f64).sum::<f64>() / analyses.len() as f64)
        };

        let mut top_performing_calls: Vec<TopCall> = analyses
            .iter()
            .filter_map(|analysis| {
                let call = calls.iter().find(|c| c.id == analysis.call_id)?;
                let contact = call.contact_id.as_ref().and_then(|id| contacts.iter().find(|c| &c.id == id));

                Some(TopCall {
                    id: call.id.clone(),
                    created_at: call.created_at,
                    lead_score: analysis.lead_score,
                    name: contact.map(|c| c.name.clone()),
                    company: contact.and_then(|c| c.company.clone()),
                })
            })
            .collect();

        top_performing_calls.sort_by(|a, b| b.lead_score.cmp(&a.lead_score).then(b.created_at.cmp(&a.created_at)));
        top_performing_calls.truncate(Self::TOP_CALLS);

        Self {
            total_calls: calls.len(),
            avg_lead_score,
            calls_this_week: calls.iter().filter(|c| c.created_at >= week_ago).count(),
            top_performing_calls,
        }
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn call(id: &str, contact_id: Option<&str>, created_at: DateTime<Utc>) -> Call {
        Call {
            id: id.to_string(),
            contact_id: contact_id.map(str::to_string),
            audio_url: None,
            transcript: None,
            duration: None,
            recording_method: RecordingMethod::Upload,
            twilio_call_sid: None,
            created_at,
        }
    }

    fn analysis(call_id: &str, lead_score: i64, created_at: DateTime<Utc>) -> CallAnalysisRecord {
        CallAnalysisRecord {
            id: format!("analysis-{call_id}"),
            call_id: call_id.to_string(),
            summary: "Summary".to_string(),
            lead_score,
            sentiment_score: 0.5,
            sentiment_label: "neutral".to_string(),
            action_items: vec![],
            key_info: BTreeMap::new(),
            next_steps: None,
            created_at,
        }
    }

    #[test]
    fn analytics_aggregates_known_rows() {
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 12, 0, 0).unwrap();
        let old = now - chrono::Duration::days(30);

        let contacts = vec![Contact {
            id: "c1".to_string(),
            name: "Jane Doe".to_string(),
            company: Some("Acme".to_string()),
            email: None,
            phone: None,
            created_at: old,
            updated_at: old,
        }];

        let calls = vec![call("a", Some("c1"), now), call("b", None, old), call("c", None, now - chrono::Duration::days(1))];
        let analyses = vec![analysis("a", 9, now), analysis("b", 4, old), analysis("c", 5, now)];

        let analytics = Analytics::compute(&calls, &analyses, &contacts, now);

        assert_eq!(analytics.total_calls, 3);
        assert_eq!(analytics.calls_this_week, 2);
        assert_eq!(analytics.avg_lead_score, Some(6.0));
        assert_eq!(analytics.top_performing_calls.len(), 3);
        assert_eq!(analytics.top_performing_calls[0].id, "a");
        assert_eq!(analytics.top_performing_calls[0].name.as_deref(), Some("Jane Doe"));
        assert_eq!(analytics.top_performing_calls[0].company.as_deref(), Some("Acme"));
        assert_eq!(analytics.top_performing_calls[2].id, "b");
    }

    #[test]
    fn analytics_without_analyses_has_no_average() {
        let now = Utc::now();
        let analytics = Analytics::compute(&[call("a", None, now)], &[], &[], now);

        assert_eq!(analytics.total_calls, 1);
        assert_eq!(analytics.avg_lead_score, None);
        assert!(analytics.top_performing_calls.is_empty());
    }

    #[test]
    fn analysis_parses_llm_shape() {
        let json = r#"{
            "summary": "Good call.",
            "leadScore": 8,
            "sentiment": {"score": 0.8, "label": "positive"},
            "keyInfo": {"budget": "$20k", "timeline": "2 months"},
            "actionItems": [{"task": "Send deck", "priority": "high", "dueDate": "Today"}],
            "nextSteps": "Schedule demo"
        }"#;

        let analysis: CallAnalysis = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.lead_score, 8);
        assert_eq!(analysis.key_info["budget"], "$20k");
        assert_eq!(analysis.action_items[0].due_date.as_deref(), Some("Today"));
        assert_eq!(analysis.next_steps.as_deref(), Some("Schedule demo"));
    }

    #[test]
    fn analysis_keeps_structured_key_info() {
        let json = r#"{
            "summary": "Good call.",
            "leadScore": 7,
            "sentiment": {"score": 0.7, "label": "positive"},
            "keyInfo": {"decisionMakers": ["CEO Michael", "Head of Ops"], "budget": 25000, "timeline": null}
        }"#;

        let analysis: CallAnalysis = serde_json::from_str(json).unwrap();

        assert_eq!(analysis.key_info["decisionMakers"], serde_json::json!(["CEO Michael", "Head of Ops"]));
        assert_eq!(analysis.key_info["budget"], 25000);
        assert!(analysis.key_info["timeline"].is_null());
        assert!(analysis.action_items.is_empty());
    }

    #[test]
    fn prospect_describes_itself() {
        let prospect = Prospect {
            name: Some("John".to_string()),
            company: Some("TechStart".to_string()),
            email: None,
        };

        assert_eq!(prospect.describe("Unknown"), "John from TechStart");
        assert_eq!(Prospect::default().describe("Unknown"), "Unknown");
    }
}
