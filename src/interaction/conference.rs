use serde::{Deserialize, Serialize};
use tracing::{info, instrument};

use crate::{
    base::{
        config::Config,
        types::{InvalidInput, NewConferenceCall, Res},
    },
    service::db::DbClient,
};

/// Request to open a conference recording session.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceRequest {
    #[serde(default)]
    pub salesperson_phone: String,
    #[serde(default)]
    pub customer_phone: Option<String>,
    #[serde(default)]
    pub contact_id: Option<String>,
}

/// What the salesperson needs to start the recorded conference.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ConferenceSession {
    pub call_id: String,
    pub conference_number: String,
    pub instructions: String,
}

/// Register a pending conference session on the configured dial-in number.
#[instrument(skip(db, config))]
pub async fn create_conference_call(request: ConferenceRequest, db: &DbClient, config: &Config) -> Res<ConferenceSession> {
    let salesperson_phone = request.salesperson_phone.trim();

    if salesperson_phone.is_empty() {
        return Err(InvalidInput::new("salespersonPhone is required").into());
    }

    let conference = db
        .create_conference_call(NewConferenceCall {
            conference_number: config.twilio_conference_number.clone(),
            salesperson_phone: salesperson_phone.to_string(),
            customer_phone: non_empty(request.customer_phone),
            contact_id: non_empty(request.contact_id),
        })
        .await?;

    info!("Conference session `{}` is waiting on `{}`.", conference.id, conference.conference_number);

    Ok(ConferenceSession {
        instructions: instructions(&conference.conference_number, &conference.id),
        call_id: conference.id,
        conference_number: conference.conference_number,
    })
}

fn instructions(conference_number: &str, call_id: &str) -> String {
    format!(
        "1. Call {conference_number} from your phone\n\
         2. Ask your customer to dial the same number\n\
         3. The call will be automatically recorded\n\
         4. AI analysis will begin when the call ends\n\
         \n\
         Call ID: {call_id}"
    )
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

// Tests.

#[cfg(test)]
mod tests {
    use super::*;
    use crate::base::{config::ConfigInner, types::ConferenceStatus};

    #[tokio::test]
    async fn creates_pending_session_on_configured_number() {
        let db = DbClient::surreal_memory().await.unwrap();
        let config = Config::from(ConfigInner {
            twilio_conference_number: "+15559990000".to_string(),
            ..ConfigInner::default()
        });

        let session = create_conference_call(
            ConferenceRequest {
                salesperson_phone: "+15550001111".to_string(),
                customer_phone: Some("".to_string()),
                contact_id: None,
            },
            &db,
            &config,
        )
        .await
        .unwrap();

        assert_eq!(session.conference_number, "+15559990000");
        assert!(session.instructions.contains("Call +15559990000"));
        assert!(session.instructions.ends_with(&format!("Call ID: {}", session.call_id)));

        let stored = db.get_conference_call(&session.call_id).await.unwrap().unwrap();
        assert_eq!(stored.status, ConferenceStatus::Pending);
        assert_eq!(stored.customer_phone, None);
    }

    #[tokio::test]
    async fn rejects_missing_salesperson_phone() {
        let db = DbClient::surreal_memory().await.unwrap();
        let config = Config::from(ConfigInner::default());

        let err = create_conference_call(ConferenceRequest::default(), &db, &config).await.unwrap_err();

        assert!(err.downcast_ref::<InvalidInput>().is_some());
    }
}
