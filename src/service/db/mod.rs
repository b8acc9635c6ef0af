//! Record storage for contacts, calls, analyses, follow-up emails and conference sessions.

use std::{ops::Deref, sync::Arc};

use async_trait::async_trait;

use crate::base::types::{
    Call, CallAnalysis, CallAnalysisRecord, ConferenceCall, Contact, EmailDraft, FollowUpEmail, NewCall, NewConferenceCall, NewContact, Res,
};

pub mod surreal;

// Traits.

/// Generic database client trait that clients must implement.
///
/// Every operation is a plain awaited call. Operations that write more than one
/// record run inside a single transaction.
#[async_trait]
pub trait GenericDbClient: Send + Sync + 'static {
    /// Inserts a contact.
    async fn create_contact(&self, contact: NewContact) -> Res<Contact>;

    /// Gets a contact by id.
    async fn get_contact(&self, contact_id: &str) -> Res<Option<Contact>>;

    /// Lists contacts, newest first.
    async fn list_contacts(&self) -> Res<Vec<Contact>>;

    /// Inserts a call.
    async fn create_call(&self, call: NewCall) -> Res<Call>;

    /// Gets a call by id.
    async fn get_call(&self, call_id: &str) -> Res<Option<Call>>;

    /// Lists calls, newest first.
    async fn list_calls(&self) -> Res<Vec<Call>>;

    /// Gets the latest analysis of a call.
    async fn get_call_analysis(&self, call_id: &str) -> Res<Option<CallAnalysisRecord>>;

    /// Lists every stored analysis.
    async fn list_call_analyses(&self) -> Res<Vec<CallAnalysisRecord>>;

    /// Gets the latest follow-up email of a call.
    async fn get_follow_up_email(&self, call_id: &str) -> Res<Option<FollowUpEmail>>;

    /// Inserts a pending conference-call session.
    async fn create_conference_call(&self, conference: NewConferenceCall) -> Res<ConferenceCall>;

    /// Gets a conference-call session by id.
    async fn get_conference_call(&self, conference_id: &str) -> Res<Option<ConferenceCall>>;

    /// Finds a pending session for a conference number.
    ///
    /// Several sessions may be pending for the same number; the oldest one is returned.
    async fn find_pending_conference_call(&self, conference_number: &str) -> Res<Option<ConferenceCall>>;

    /// Marks a session completed and inserts its call, atomically.
    async fn complete_conference_call(&self, conference_id: &str, recording_url: &str, call: NewCall) -> Res<Call>;

    /// Stores the transcript, analysis and follow-up email of a call, atomically.
    async fn save_analysis_results(&self, call_id: &str, transcript: &str, analysis: &CallAnalysis, email: &EmailDraft) -> Res<()>;
}

// Structs.

/// Database client for the application.
///
/// This is trivially cloneable and can be passed around without the need for `Arc` or `Mutex`.
#[derive(Clone)]
pub struct DbClient {
    inner: Arc<dyn GenericDbClient>,
}

impl Deref for DbClient {
    type Target = dyn GenericDbClient;

    fn deref(&self) -> &Self::Target {
        &*self.inner
    }
}

impl DbClient {
    pub fn new(inner: Arc<dyn GenericDbClient>) -> Self {
        Self { inner }
    }
}
