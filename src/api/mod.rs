pub mod auth;
mod contact;
mod documents;
pub mod error;
pub mod rate_limit;
mod validation;


pub use error::{ApiError, ErrorCode};
pub use validation::validate_username;

use axum::{
    extract::DefaultBodyLimit,
    handler::Handler,
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    let upload_limit = DefaultBodyLimit::max(state.config.server.max_upload_bytes);

    // Admin routes; everything above the route_layer requires a session
    let admin_routes = Router::new()
        .route("/logout", post(auth::logout))
        .route("/verify", get(auth::verify))
        .route(
            "/eciple-documents",
            get(documents::list_documents).post(documents::create_document),
        )
        .route("/eciple-documents/upload", post(documents::upload_document))
        .route(
            "/eciple-documents/:id",
            put(documents::update_document).delete(documents::delete_document),
        )
        .route(
            "/eciple-documents/:id/upload",
            put(documents::replace_document_file),
        )
        .layer(upload_limit)
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth::require_admin,
        ))
        .route(
            "/login",
            post(auth::login).route_layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_auth,
            )),
        );

    let public_routes = Router::new()
        .route("/eciple-documents", get(documents::list_public_documents))
        .route(
            "/eciple-documents/:id/download",
            get(documents::download_document),
        )
        .route(
            "/contact",
            get(contact::list_contact_requests.layer(middleware::from_fn_with_state(
                state.clone(),
                auth::require_admin,
            )))
            .post(contact::submit_contact.layer(middleware::from_fn_with_state(
                state.clone(),
                rate_limit::rate_limit_contact,
            ))),
        );

    Router::new()
        .route("/health", get(health_check))
        .nest("/api/admin", admin_routes)
        .nest("/api", public_routes)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "OK"
}
