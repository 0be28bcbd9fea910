//! Contact form submissions.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct ContactRequest {
    pub id: i64,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub church_name: String,
    pub phone: Option<String>,
    pub church_size: Option<String>,
    pub message: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// Validated submission ready to persist
#[derive(Debug, Clone)]
pub struct NewContactRequest {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub church_name: String,
    pub phone: Option<String>,
    pub church_size: Option<String>,
    pub message: Option<String>,
}

/// Raw form body. Every field defaults so a missing required field is
/// reported as a validation error instead of a deserialization failure.
#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ContactSubmission {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub church_name: String,
    pub phone: Option<String>,
    pub church_size: Option<String>,
    pub message: Option<String>,
}

impl From<ContactSubmission> for NewContactRequest {
    fn from(form: ContactSubmission) -> Self {
        Self {
            first_name: form.first_name.trim().to_string(),
            last_name: form.last_name.trim().to_string(),
            email: form.email.trim().to_string(),
            church_name: form.church_name.trim().to_string(),
            phone: non_blank(form.phone),
            church_size: non_blank(form.church_size),
            message: non_blank(form.message),
        }
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Serialize)]
pub struct ContactCreatedResponse {
    pub message: String,
    pub id: i64,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ContactListResponse {
    pub contact_requests: Vec<ContactRequest>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_submission_trims_and_drops_blank_optionals() {
        let form: ContactSubmission = serde_json::from_str(
            r#"{"firstName": " Ada ", "lastName": "L", "email": "ada@example.org",
                "churchName": "Grace", "phone": "  ", "message": "Hi"}"#,
        )
        .unwrap();
        let new = NewContactRequest::from(form);
        assert_eq!(new.first_name, "Ada");
        assert_eq!(new.phone, None);
        assert_eq!(new.church_size, None);
        assert_eq!(new.message.as_deref(), Some("Hi"));
    }

    #[test]
    fn test_missing_fields_default_to_empty() {
        let form: ContactSubmission = serde_json::from_str(r#"{"firstName": "Ada"}"#).unwrap();
        assert!(form.email.is_empty());
        assert!(form.church_name.is_empty());
    }
}
