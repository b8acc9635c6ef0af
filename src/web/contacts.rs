use axum::{Json, extract::State};
use serde::{Deserialize, Serialize};

use crate::{
    base::types::{Contact, NewContact},
    runtime::Runtime,
};

use super::error::{ApiError, ApiResult};

/// Body of a contact creation request.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq, Eq)]
pub struct ContactRequest {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub company: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ContactCreated {
    pub contact_id: String,
    pub message: String,
}

fn optional(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

pub async fn create(State(runtime): State<Runtime>, Json(request): Json<ContactRequest>) -> ApiResult<Json<ContactCreated>> {
    let Some(name) = optional(request.name) else {
        return Err(ApiError::BadRequest("name is required".to_string()));
    };

    let contact = runtime
        .db
        .create_contact(NewContact {
            name,
            company: optional(request.company),
            email: optional(request.email),
            phone: optional(request.phone),
        })
        .await?;

    Ok(Json(ContactCreated {
        contact_id: contact.id,
        message: "Contact created successfully".to_string(),
    }))
}

pub async fn list(State(runtime): State<Runtime>) -> ApiResult<Json<Vec<Contact>>> {
    Ok(Json(runtime.db.list_contacts().await?))
}
