//! SurrealDB implementation of the record store.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use serde::{Serialize, de::DeserializeOwned};
use surrealdb::{
    Surreal,
    engine::any::{self, Any},
    opt::auth::Root,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::base::{
    config::Config,
    types::{
        ActionItem, Call, CallAnalysis, CallAnalysisRecord, ConferenceCall, ConferenceStatus, Contact, EmailDraft, FollowUpEmail, KeyInfo, NewCall, NewConferenceCall,
        NewContact, Res, Void,
    },
};

use super::{DbClient, GenericDbClient};

const NAMESPACE: &str = "sales";
const DATABASE: &str = "recorder";

// Projections that surface the record key as a plain `id` string.

const CONTACT_FIELDS: &str = "record::id(id) AS id, name, company, email, phone, created_at, updated_at";
const CALL_FIELDS: &str = "record::id(id) AS id, contact_id, audio_url, transcript, duration, recording_method, twilio_call_sid, created_at";
const ANALYSIS_FIELDS: &str =
    "record::id(id) AS id, call_id, summary, lead_score, sentiment_score, sentiment_label, action_items, key_info, next_steps, created_at";
const EMAIL_FIELDS: &str = "record::id(id) AS id, call_id, subject, body, sent, scheduled_for, created_at";
const CONFERENCE_FIELDS: &str = "record::id(id) AS id, conference_number, salesperson_phone, customer_phone, contact_id, status, recording_url, created_at";

// Extra methods on `DbClient` applied by the surreal implementation.

impl DbClient {
    /// Connects to the endpoint named in the configuration.
    pub async fn surreal(config: &Config) -> Res<Self> {
        let client = SurrealDbClient::new(config).await?;
        Ok(Self { inner: Arc::new(client) })
    }

    /// Creates an in-memory database, mostly for tests.
    pub async fn surreal_memory() -> Res<Self> {
        let client = SurrealDbClient::memory().await?;
        Ok(Self { inner: Arc::new(client) })
    }
}

// Structs.

/// SurrealDB client.
#[derive(Clone)]
pub struct SurrealDbClient {
    db: Surreal<Any>,
}

impl SurrealDbClient {
    /// Connect, sign in when credentials are given, and define the schema.
    #[instrument(name = "SurrealDbClient::new", skip_all)]
    pub async fn new(config: &Config) -> Res<Self> {
        let db = any::connect(config.db_endpoint.as_str()).await?;

        if let (Some(username), Some(password)) = (&config.db_username, &config.db_password) {
            db.signin(Root {
                username: username.as_str(),
                password: password.as_str(),
            })
            .await?;
        }

        Self::initialize(db).await
    }

    /// Create an in-memory instance.
    #[instrument(name = "SurrealDbClient::memory", skip_all)]
    pub async fn memory() -> Res<Self> {
        let db = any::connect("mem://").await?;

        Self::initialize(db).await
    }

    async fn initialize(db: Surreal<Any>) -> Res<Self> {
        db.use_ns(NAMESPACE).use_db(DATABASE).await?;

        // Define schemas.

        db.query(
            r#"
            DEFINE TABLE IF NOT EXISTS contact SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS call SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS call_analysis SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS follow_up_email SCHEMALESS;
            DEFINE TABLE IF NOT EXISTS conference_call SCHEMALESS;
            DEFINE INDEX IF NOT EXISTS call_analysis_call ON call_analysis FIELDS call_id;
            DEFINE INDEX IF NOT EXISTS follow_up_email_call ON follow_up_email FIELDS call_id;
            DEFINE INDEX IF NOT EXISTS conference_call_pending ON conference_call FIELDS conference_number, status;
            "#,
        )
        .await?
        .check()?;

        info!("Database initialized successfully.");

        Ok(Self { db })
    }

    /// Run a `SELECT` and deserialize its rows.
    async fn select_rows<T>(&self, query: String, bindings: Vec<(&'static str, String)>) -> Res<Vec<T>>
    where
        T: DeserializeOwned,
    {
        let mut request = self.db.query(query);

        for binding in bindings {
            request = request.bind(binding);
        }

        let mut response = request.await?.check()?;
        let rows: Vec<T> = response.take(0)?;

        Ok(rows)
    }

    /// Create a record with a known key.
    async fn create_record<T>(&self, table: &'static str, id: String, content: T) -> Void
    where
        T: Serialize + 'static,
    {
        self.db
            .query("CREATE type::thing($table, $id) CONTENT $content RETURN NONE")
            .bind(("table", table))
            .bind(("id", id))
            .bind(("content", content))
            .await?
            .check()?;

        Ok(())
    }
}

// Stored shapes (everything but the key).

#[derive(Serialize)]
struct ContactContent {
    name: String,
    company: Option<String>,
    email: Option<String>,
    phone: Option<String>,
    created_at: chrono::DateTime<Utc>,
    updated_at: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct CallContent {
    contact_id: Option<String>,
    audio_url: Option<String>,
    transcript: Option<String>,
    duration: Option<i64>,
    recording_method: crate::base::types::RecordingMethod,
    twilio_call_sid: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

impl From<&Call> for CallContent {
    fn from(call: &Call) -> Self {
        Self {
            contact_id: call.contact_id.clone(),
            audio_url: call.audio_url.clone(),
            transcript: call.transcript.clone(),
            duration: call.duration,
            recording_method: call.recording_method,
            twilio_call_sid: call.twilio_call_sid.clone(),
            created_at: call.created_at,
        }
    }
}

#[derive(Serialize)]
struct AnalysisContent {
    call_id: String,
    summary: String,
    lead_score: i64,
    sentiment_score: f64,
    sentiment_label: String,
    action_items: Vec<ActionItem>,
    key_info: KeyInfo,
    next_steps: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct EmailContent {
    call_id: String,
    subject: String,
    body: String,
    sent: bool,
    scheduled_for: Option<chrono::DateTime<Utc>>,
    created_at: chrono::DateTime<Utc>,
}

#[derive(Serialize)]
struct ConferenceContent {
    conference_number: String,
    salesperson_phone: String,
    customer_phone: Option<String>,
    contact_id: Option<String>,
    status: ConferenceStatus,
    recording_url: Option<String>,
    created_at: chrono::DateTime<Utc>,
}

fn new_call(call: NewCall) -> Call {
    Call {
        id: Uuid::new_v4().to_string(),
        contact_id: call.contact_id,
        audio_url: call.audio_url,
        transcript: None,
        duration: call.duration,
        recording_method: call.recording_method,
        twilio_call_sid: call.twilio_call_sid,
        created_at: Utc::now(),
    }
}

#[async_trait]
impl GenericDbClient for SurrealDbClient {
    #[instrument(skip(self))]
    async fn create_contact(&self, contact: NewContact) -> Res<Contact> {
        let now = Utc::now();
        let contact = Contact {
            id: Uuid::new_v4().to_string(),
            name: contact.name,
            company: contact.company,
            email: contact.email,
            phone: contact.phone,
            created_at: now,
            updated_at: now,
        };

        let content = ContactContent {
            name: contact.name.clone(),
            company: contact.company.clone(),
            email: contact.email.clone(),
            phone: contact.phone.clone(),
            created_at: contact.created_at,
            updated_at: contact.updated_at,
        };

        self.create_record("contact", contact.id.clone(), content).await?;

        info!("Contact `{}` created.", contact.id);

        Ok(contact)
    }

    #[instrument(skip(self))]
    async fn get_contact(&self, contact_id: &str) -> Res<Option<Contact>> {
        let rows: Vec<Contact> = self
            .select_rows(format!("SELECT {CONTACT_FIELDS} FROM type::thing('contact', $id)"), vec![("id", contact_id.to_string())])
            .await?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list_contacts(&self) -> Res<Vec<Contact>> {
        let mut rows: Vec<Contact> = self.select_rows(format!("SELECT {CONTACT_FIELDS} FROM contact"), vec![]).await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn create_call(&self, call: NewCall) -> Res<Call> {
        let call = new_call(call);

        self.create_record("call", call.id.clone(), CallContent::from(&call)).await?;

        info!("Call `{}` created ({:?}).", call.id, call.recording_method);

        Ok(call)
    }

    #[instrument(skip(self))]
    async fn get_call(&self, call_id: &str) -> Res<Option<Call>> {
        let rows: Vec<Call> = self
            .select_rows(format!("SELECT {CALL_FIELDS} FROM type::thing('call', $id)"), vec![("id", call_id.to_string())])
            .await?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn list_calls(&self) -> Res<Vec<Call>> {
        let mut rows: Vec<Call> = self.select_rows(format!("SELECT {CALL_FIELDS} FROM call"), vec![]).await?;
        rows.sort_by(|a, b| b.created_at.cmp(&a.created_at));

        Ok(rows)
    }

    #[instrument(skip(self))]
    async fn get_call_analysis(&self, call_id: &str) -> Res<Option<CallAnalysisRecord>> {
        let rows: Vec<CallAnalysisRecord> = self
            .select_rows(format!("SELECT {ANALYSIS_FIELDS} FROM call_analysis WHERE call_id = $call_id"), vec![("call_id", call_id.to_string())])
            .await?;

        Ok(rows.into_iter().max_by(|a, b| a.created_at.cmp(&b.created_at)))
    }

    #[instrument(skip(self))]
    async fn list_call_analyses(&self) -> Res<Vec<CallAnalysisRecord>> {
        self.select_rows(format!("SELECT {ANALYSIS_FIELDS} FROM call_analysis"), vec![]).await
    }

    #[instrument(skip(self))]
    async fn get_follow_up_email(&self, call_id: &str) -> Res<Option<FollowUpEmail>> {
        let rows: Vec<FollowUpEmail> = self
            .select_rows(format!("SELECT {EMAIL_FIELDS} FROM follow_up_email WHERE call_id = $call_id"), vec![("call_id", call_id.to_string())])
            .await?;

        Ok(rows.into_iter().max_by(|a, b| a.created_at.cmp(&b.created_at)))
    }

    #[instrument(skip(self))]
    async fn create_conference_call(&self, conference: NewConferenceCall) -> Res<ConferenceCall> {
        let conference = ConferenceCall {
            id: Uuid::new_v4().to_string(),
            conference_number: conference.conference_number,
            salesperson_phone: conference.salesperson_phone,
            customer_phone: conference.customer_phone,
            contact_id: conference.contact_id,
            status: ConferenceStatus::Pending,
            recording_url: None,
            created_at: Utc::now(),
        };

        let content = ConferenceContent {
            conference_number: conference.conference_number.clone(),
            salesperson_phone: conference.salesperson_phone.clone(),
            customer_phone: conference.customer_phone.clone(),
            contact_id: conference.contact_id.clone(),
            status: conference.status,
            recording_url: None,
            created_at: conference.created_at,
        };

        self.create_record("conference_call", conference.id.clone(), content).await?;

        info!("Conference call `{}` created for `{}`.", conference.id, conference.conference_number);

        Ok(conference)
    }

    #[instrument(skip(self))]
    async fn get_conference_call(&self, conference_id: &str) -> Res<Option<ConferenceCall>> {
        let rows: Vec<ConferenceCall> = self
            .select_rows(
                format!("SELECT {CONFERENCE_FIELDS} FROM type::thing('conference_call', $id)"),
                vec![("id", conference_id.to_string())],
            )
            .await?;

        Ok(rows.into_iter().next())
    }

    #[instrument(skip(self))]
    async fn find_pending_conference_call(&self, conference_number: &str) -> Res<Option<ConferenceCall>> {
        let rows: Vec<ConferenceCall> = self
            .select_rows(
                format!("SELECT {CONFERENCE_FIELDS} FROM conference_call WHERE conference_number = $number AND status = 'pending'"),
                vec![("number", conference_number.to_string())],
            )
            .await?;

        if rows.len() > 1 {
            warn!("{} pending conference calls for `{}`; choosing the oldest.", rows.len(), conference_number);
        }

        Ok(rows.into_iter().min_by(|a, b| a.created_at.cmp(&b.created_at)))
    }

    #[instrument(skip(self, call))]
    async fn complete_conference_call(&self, conference_id: &str, recording_url: &str, call: NewCall) -> Res<Call> {
        let call = new_call(call);

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE type::thing('conference_call', $conference_id) SET status = 'completed', recording_url = $recording_url RETURN NONE;
                CREATE type::thing('call', $call_id) CONTENT $call RETURN NONE;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("conference_id", conference_id.to_string()))
            .bind(("recording_url", recording_url.to_string()))
            .bind(("call_id", call.id.clone()))
            .bind(("call", CallContent::from(&call)))
            .await?
            .check()?;

        info!("Conference call `{}` completed as call `{}`.", conference_id, call.id);

        Ok(call)
    }

    #[instrument(skip(self, transcript, analysis, email))]
    async fn save_analysis_results(&self, call_id: &str, transcript: &str, analysis: &CallAnalysis, email: &EmailDraft) -> Res<()> {
        let now = Utc::now();

        let analysis = AnalysisContent {
            call_id: call_id.to_string(),
            summary: analysis.summary.clone(),
            lead_score: analysis.lead_score,
            sentiment_score: analysis.sentiment.score,
            sentiment_label: analysis.sentiment.label.clone(),
            action_items: analysis.action_items.clone(),
            key_info: analysis.key_info.clone(),
            next_steps: analysis.next_steps.clone(),
            created_at: now,
        };

        let email = EmailContent {
            call_id: call_id.to_string(),
            subject: email.subject.clone(),
            body: email.body.clone(),
            sent: false,
            scheduled_for: None,
            created_at: now,
        };

        self.db
            .query(
                r#"
                BEGIN TRANSACTION;
                UPDATE type::thing('call', $call_id) SET transcript = $transcript RETURN NONE;
                CREATE type::thing('call_analysis', $analysis_id) CONTENT $analysis RETURN NONE;
                CREATE type::thing('follow_up_email', $email_id) CONTENT $email RETURN NONE;
                COMMIT TRANSACTION;
                "#,
            )
            .bind(("call_id", call_id.to_string()))
            .bind(("transcript", transcript.to_string()))
            .bind(("analysis_id", Uuid::new_v4().to_string()))
            .bind(("analysis", analysis))
            .bind(("email_id", Uuid::new_v4().to_string()))
            .bind(("email", email))
            .await?
            .check()?;

        info!("Analysis results saved for call `{}`.", call_id);

        Ok(())
    }
}

// Tests.

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::base::types::{RecordingMethod, Sentiment};

    async fn db() -> DbClient {
        DbClient::surreal_memory().await.unwrap()
    }

    fn upload(contact_id: Option<String>) -> NewCall {
        NewCall {
            contact_id,
            audio_url: Some("uploads/call.webm".to_string()),
            duration: Some(42),
            recording_method: RecordingMethod::Upload,
            twilio_call_sid: None,
        }
    }

    #[tokio::test]
    async fn contacts_round_trip() {
        let db = db().await;

        let created = db
            .create_contact(NewContact {
                name: "Jane Doe".to_string(),
                company: Some("Acme".to_string()),
                email: None,
                phone: Some("+15550001111".to_string()),
            })
            .await
            .unwrap();

        let fetched = db.get_contact(&created.id).await.unwrap().unwrap();
        assert_eq!(fetched.name, "Jane Doe");
        assert_eq!(fetched.company.as_deref(), Some("Acme"));
        assert_eq!(fetched.email, None);

        assert_eq!(db.list_contacts().await.unwrap().len(), 1);
        assert!(db.get_contact("missing").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn analysis_results_are_saved_together() {
        let db = db().await;
        let call = db.create_call(upload(None)).await.unwrap();

        let analysis = CallAnalysis {
            summary: "Interested.".to_string(),
            lead_score: 7,
            sentiment: Sentiment {
                score: 0.6,
                label: "positive".to_string(),
            },
            key_info: BTreeMap::from([
                ("budget".to_string(), serde_json::json!(10000)),
                ("decisionMakers".to_string(), serde_json::json!(["CFO", "Head of Sales"])),
            ]),
            action_items: vec![ActionItem {
                task: "Send pricing".to_string(),
                priority: "high".to_string(),
                due_date: None,
            }],
            next_steps: None,
        };
        let email = EmailDraft {
            subject: "Thanks".to_string(),
            body: "Hi".to_string(),
        };

        db.save_analysis_results(&call.id, "transcript text", &analysis, &email).await.unwrap();

        let stored_call = db.get_call(&call.id).await.unwrap().unwrap();
        assert_eq!(stored_call.transcript.as_deref(), Some("transcript text"));
        assert_eq!(stored_call.duration, Some(42));

        let stored_analysis = db.get_call_analysis(&call.id).await.unwrap().unwrap();
        assert_eq!(stored_analysis.lead_score, 7);
        assert_eq!(stored_analysis.sentiment_label, "positive");
        assert_eq!(stored_analysis.action_items.len(), 1);
        assert_eq!(stored_analysis.key_info["budget"], 10000);
        assert_eq!(stored_analysis.key_info["decisionMakers"], serde_json::json!(["CFO", "Head of Sales"]));

        let stored_email = db.get_follow_up_email(&call.id).await.unwrap().unwrap();
        assert_eq!(stored_email.subject, "Thanks");
        assert!(!stored_email.sent);
    }

    #[tokio::test]
    async fn completing_a_conference_creates_its_call() {
        let db = db().await;

        let conference = db
            .create_conference_call(NewConferenceCall {
                conference_number: "+15559990000".to_string(),
                salesperson_phone: "+15550001111".to_string(),
                customer_phone: None,
                contact_id: None,
            })
            .await
            .unwrap();

        let pending = db.find_pending_conference_call("+15559990000").await.unwrap().unwrap();
        assert_eq!(pending.id, conference.id);
        assert!(db.find_pending_conference_call("+15550000000").await.unwrap().is_none());

        let call = db
            .complete_conference_call(
                &conference.id,
                "https://api.twilio.com/recording",
                NewCall {
                    contact_id: None,
                    audio_url: Some("https://api.twilio.com/recording".to_string()),
                    duration: None,
                    recording_method: RecordingMethod::Conference,
                    twilio_call_sid: Some("CA123".to_string()),
                },
            )
            .await
            .unwrap();

        let completed = db.get_conference_call(&conference.id).await.unwrap().unwrap();
        assert_eq!(completed.status, ConferenceStatus::Completed);
        assert_eq!(completed.recording_url.as_deref(), Some("https://api.twilio.com/recording"));
        assert!(db.find_pending_conference_call("+15559990000").await.unwrap().is_none());

        let stored = db.get_call(&call.id).await.unwrap().unwrap();
        assert_eq!(stored.recording_method, RecordingMethod::Conference);
        assert_eq!(stored.twilio_call_sid.as_deref(), Some("CA123"));
    }
}
