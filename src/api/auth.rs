use axum::{
    async_trait,
    body::Body,
    extract::{rejection::JsonRejection, FromRequestParts, State},
    http::{header::AUTHORIZATION, request::Parts, HeaderMap, Request},
    middleware::Next,
    response::Response,
    Json,
};
use serde::Serialize;
use std::sync::Arc;

use crate::db::{AdminProfile, LoginRequest, LoginResponse, VerifyResponse};
use crate::AppState;

use super::error::{ApiError, ValidationErrorBuilder};

/// Authenticated admin attached to the request by [`require_admin`]
#[derive(Debug, Clone)]
pub struct AdminContext {
    pub admin: AdminProfile,
    pub token: String,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Extract the bearer token. Anything other than `Bearer <token>` is `None`.
fn extract_bearer(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    if !scheme.eq_ignore_ascii_case("bearer") || token.is_empty() {
        return None;
    }
    Some(token)
}

/// Login endpoint
///
/// POST /api/admin/login
pub async fn login(
    State(state): State<Arc<AppState>>,
    payload: Result<Json<LoginRequest>, JsonRejection>,
) -> Result<Json<LoginResponse>, ApiError> {
    let Json(request) = payload?;

    let mut errors = ValidationErrorBuilder::new();
    if request.username.is_empty() {
        errors.add("username", "Username is required");
    }
    if request.password.is_empty() {
        errors.add("password", "Password is required");
    }
    errors.finish()?;

    let issued = match state.auth.login(&request.username, &request.password).await {
        Ok(issued) => issued,
        Err(e) => {
            tracing::info!(error = %e, "Admin login rejected");
            return Err(e.into());
        }
    };

    Ok(Json(LoginResponse {
        session_token: issued.token,
        admin: issued.admin,
        expires_at: issued.expires_at,
    }))
}

/// Logout endpoint
///
/// POST /api/admin/logout
pub async fn logout(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.logout(&ctx.token).await?;
    tracing::info!(admin_id = ctx.admin.id, "Admin logged out");
    Ok(Json(MessageResponse::new("Logged out successfully")))
}

/// Session check endpoint
///
/// GET /api/admin/verify
pub async fn verify(ctx: AdminContext) -> Json<VerifyResponse> {
    Json(VerifyResponse { admin: ctx.admin })
}

/// Gate for every admin route. Resolves the bearer token to a live session
/// and admin, or answers 401 before the handler runs.
pub async fn require_admin(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, ApiError> {
    let token = extract_bearer(request.headers())
        .ok_or_else(ApiError::unauthorized)?
        .to_string();

    let admin = state.auth.verify(&token).await?;

    request
        .extensions_mut()
        .insert(AdminContext { admin, token });
    Ok(next.run(request).await)
}

/// Extractor for handlers behind [`require_admin`]
#[async_trait]
impl<S> FromRequestParts<S> for AdminContext
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<AdminContext>()
            .cloned()
            .ok_or_else(ApiError::unauthorized)
    }
}
