use axum::{
    extract::{rejection::JsonRejection, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::db::{ContactCreatedResponse, ContactListResponse, ContactSubmission, NewContactRequest};
use crate::AppState;

use super::auth::AdminContext;
use super::error::ApiError;
use super::validation::validate_contact;

/// Public contact form
///
/// POST /api/contact
pub async fn submit_contact(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<ContactSubmission>, JsonRejection>,
) -> Result<(StatusCode, Json<ContactCreatedResponse>), ApiError> {
    let Json(form) = payload?;
    validate_contact(&form)?;

    let request = state
        .store
        .create_contact_request(NewContactRequest::from(form), chrono::Utc::now())
        .await?;

    tracing::info!(
        contact_id = request.id,
        church = %request.church_name,
        "Contact request received"
    );

    Ok((
        StatusCode::CREATED,
        Json(ContactCreatedResponse {
            message: "Contact request submitted successfully".to_string(),
            id: request.id,
        }),
    ))
}

/// Every submission, newest first
///
/// GET /api/contact
pub async fn list_contact_requests(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
) -> Result<Json<ContactListResponse>, ApiError> {
    let contact_requests = state.store.list_contact_requests().await?;
    tracing::debug!(
        admin_id = ctx.admin.id,
        count = contact_requests.len(),
        "Listed contact requests"
    );
    Ok(Json(ContactListResponse { contact_requests }))
}
