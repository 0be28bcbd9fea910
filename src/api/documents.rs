//! Investor document library endpoints.
//!
//! Admin routes sit behind `require_admin`; the public listing and download
//! only ever expose active documents.

use axum::{
    extract::{
        multipart::MultipartRejection, rejection::JsonRejection, Multipart, Path, State,
    },
    http::{header, StatusCode},
    response::IntoResponse,
    Json,
};
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::Utc;
use std::sync::Arc;
use tracing::info;

use crate::db::{
    CreateDocumentRequest, DocumentListResponse, DocumentPatch, DocumentResponse,
    DocumentSummary, NewDocument, PublicDocumentListResponse,
};
use crate::AppState;

use super::auth::{AdminContext, MessageResponse};
use super::error::{ApiError, ValidationErrorBuilder};
use super::validation::{validate_document_patch, validate_new_document};

fn parse_document_id(raw: &str) -> Result<i64, ApiError> {
    raw.parse::<i64>()
        .map_err(|_| ApiError::not_found("Document not found"))
}

/// List every document, active or not
///
/// GET /api/admin/eciple-documents
pub async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<DocumentListResponse>, ApiError> {
    let documents = state.store.list_documents(false).await?;
    Ok(Json(DocumentListResponse { documents }))
}

/// List active documents for the public site
///
/// GET /api/eciple-documents
pub async fn list_public_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<PublicDocumentListResponse>, ApiError> {
    let documents = state
        .store
        .list_documents(true)
        .await?
        .into_iter()
        .map(DocumentSummary::from)
        .collect();
    Ok(Json(PublicDocumentListResponse { documents }))
}

/// Create a document from JSON metadata
///
/// POST /api/admin/eciple-documents
pub async fn create_document(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
    payload: Result<Json<CreateDocumentRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let Json(req) = payload?;
    let new = NewDocument::from(req);
    validate_new_document(&new)?;

    let document = state.store.create_document(new, Utc::now()).await?;
    info!(
        admin_id = ctx.admin.id,
        document_id = document.id,
        title = %document.title,
        "Document created"
    );

    Ok((StatusCode::CREATED, Json(DocumentResponse { document })))
}

/// Apply a partial update
///
/// PUT /api/admin/eciple-documents/:id
pub async fn update_document(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
    Path(id): Path<String>,
    payload: Result<Json<DocumentPatch>, JsonRejection>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let id = parse_document_id(&id)?;
    let Json(patch) = payload?;
    validate_document_patch(&patch)?;
    if patch.is_empty() {
        tracing::debug!(document_id = id, "Empty patch, only updatedAt changes");
    }

    apply_patch(&state, &ctx, id, patch).await
}

async fn apply_patch(
    state: &AppState,
    ctx: &AdminContext,
    id: i64,
    patch: DocumentPatch,
) -> Result<Json<DocumentResponse>, ApiError> {
    let document = state
        .store
        .update_document(id, patch, Utc::now())
        .await?
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    info!(admin_id = ctx.admin.id, document_id = id, "Document updated");
    Ok(Json(DocumentResponse { document }))
}

/// Delete a document. Answers the same whether or not it existed.
///
/// DELETE /api/admin/eciple-documents/:id
pub async fn delete_document(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    if let Ok(id) = id.parse::<i64>() {
        if state.store.delete_document(id).await? {
            info!(admin_id = ctx.admin.id, document_id = id, "Document deleted");
        }
    }
    Ok(Json(MessageResponse::new("Document deleted successfully")))
}

/// File part of a multipart upload
#[derive(Debug)]
struct UploadedFile {
    filename: Option<String>,
    content_type: Option<String>,
    bytes: Vec<u8>,
}

impl UploadedFile {
    /// Declared type unless it is the generic fallback, else a guess from
    /// the filename
    fn resolved_content_type(&self, filename: &str) -> String {
        match self.content_type.as_deref() {
            Some(ct) if !ct.is_empty() && ct != "application/octet-stream" => ct.to_string(),
            _ => mime_guess::from_path(filename)
                .first_or_octet_stream()
                .to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct UploadForm {
    file: Option<UploadedFile>,
    filename: Option<String>,
    title: Option<String>,
    description: Option<String>,
    display_order: Option<i64>,
    is_active: Option<bool>,
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "on" | "yes" => Some(true),
        "false" | "0" | "off" | "no" => Some(false),
        _ => None,
    }
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadForm, ApiError> {
    let mut form = UploadForm::default();
    let mut errors = ValidationErrorBuilder::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                let filename = field.file_name().map(str::to_string);
                let content_type = field.content_type().map(str::to_string);
                let bytes = field.bytes().await?.to_vec();
                form.file = Some(UploadedFile {
                    filename,
                    content_type,
                    bytes,
                });
            }
            "title" => form.title = Some(field.text().await?),
            "filename" => form.filename = Some(field.text().await?),
            "description" => form.description = Some(field.text().await?),
            "displayOrder" => {
                let raw = field.text().await?;
                match raw.trim().parse::<i64>() {
                    Ok(order) => form.display_order = Some(order),
                    Err(_) => {
                        errors.add("displayOrder", "Display order must be an integer");
                    }
                }
            }
            "isActive" => {
                let raw = field.text().await?;
                match parse_flag(&raw) {
                    Some(flag) => form.is_active = Some(flag),
                    None => {
                        errors.add("isActive", "isActive must be true or false");
                    }
                }
            }
            other => {
                tracing::debug!(field = %other, "Ignoring unknown upload field");
            }
        }
    }

    match &form.file {
        None => {
            errors.add("file", "A file is required");
        }
        Some(file) if file.bytes.is_empty() => {
            errors.add("file", "Uploaded file is empty");
        }
        Some(_) => {}
    }

    errors.finish()?;
    Ok(form)
}

/// Filename for the stored record: explicit field first, then the
/// filename the browser sent with the file part
fn upload_filename(form: &UploadForm, file: &UploadedFile) -> String {
    form.filename
        .clone()
        .filter(|f| !f.trim().is_empty())
        .or_else(|| file.filename.clone())
        .unwrap_or_default()
}

/// Create a document from a multipart upload
///
/// POST /api/admin/eciple-documents/upload
pub async fn upload_document(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<(StatusCode, Json<DocumentResponse>), ApiError> {
    let mut form = read_upload(multipart?).await?;
    let file = form
        .file
        .take()
        .ok_or_else(|| ApiError::validation_field("file", "A file is required"))?;

    let filename = upload_filename(&form, &file);
    let new = NewDocument {
        content_type: Some(file.resolved_content_type(&filename)),
        file_size: Some(file.bytes.len() as i64),
        file_data: Some(BASE64.encode(&file.bytes)),
        title: form.title.unwrap_or_default(),
        filename,
        description: form.description.filter(|d| !d.trim().is_empty()),
        display_order: form.display_order.unwrap_or(0),
        is_active: form.is_active.unwrap_or(true),
    };
    validate_new_document(&new)?;

    let document = state.store.create_document(new, Utc::now()).await?;
    info!(
        admin_id = ctx.admin.id,
        document_id = document.id,
        file_size = document.file_size.unwrap_or(0),
        "Document uploaded"
    );

    Ok((StatusCode::CREATED, Json(DocumentResponse { document })))
}

/// Replace the file of an existing document, optionally with new metadata
///
/// PUT /api/admin/eciple-documents/:id/upload
pub async fn replace_document_file(
    State(state): State<Arc<AppState>>,
    ctx: AdminContext,
    Path(id): Path<String>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<DocumentResponse>, ApiError> {
    let id = parse_document_id(&id)?;
    let mut form = read_upload(multipart?).await?;
    let file = form
        .file
        .take()
        .ok_or_else(|| ApiError::validation_field("file", "A file is required"))?;

    let filename = upload_filename(&form, &file);
    let patch = DocumentPatch {
        content_type: Some(Some(file.resolved_content_type(&filename))),
        file_size: Some(Some(file.bytes.len() as i64)),
        file_data: Some(Some(BASE64.encode(&file.bytes))),
        filename: Some(filename).filter(|f| !f.is_empty()),
        title: form.title,
        description: form.description.map(|d| Some(d).filter(|d| !d.trim().is_empty())),
        display_order: form.display_order,
        is_active: form.is_active,
    };
    validate_document_patch(&patch)?;

    apply_patch(&state, &ctx, id, patch).await
}

/// ASCII-only rendition of a filename for the Content-Disposition header
fn header_safe_filename(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if (c.is_ascii_graphic() && c != '"' && c != '\\') || c == ' ' {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// Serve the stored file of an active document
///
/// GET /api/eciple-documents/:id/download
pub async fn download_document(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_document_id(&id)?;
    let document = state
        .store
        .find_document(id)
        .await?
        .filter(|d| d.is_active)
        .ok_or_else(|| ApiError::not_found("Document not found"))?;

    let encoded = document
        .file_data
        .as_deref()
        .ok_or_else(|| ApiError::not_found("Document has no file"))?;

    let bytes = BASE64.decode(encoded).map_err(|e| {
        tracing::error!(document_id = id, error = %e, "Stored file data is not valid base64");
        ApiError::internal("Stored file is unreadable")
    })?;

    let content_type = document
        .content_type
        .clone()
        .unwrap_or_else(|| {
            mime_guess::from_path(&document.filename)
                .first_or_octet_stream()
                .to_string()
        });
    let disposition = format!(
        "attachment; filename=\"{}\"",
        header_safe_filename(&document.filename)
    );

    Ok((
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, disposition),
        ],
        bytes,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert_eq!(parse_flag("true"), Some(true));
        assert_eq!(parse_flag(" 0 "), Some(false));
        assert_eq!(parse_flag("maybe"), None);
    }

    #[test]
    fn test_content_type_resolution() {
        let declared = UploadedFile {
            filename: Some("deck.pdf".to_string()),
            content_type: Some("application/pdf".to_string()),
            bytes: vec![1],
        };
        assert_eq!(declared.resolved_content_type("deck.pdf"), "application/pdf");

        let generic = UploadedFile {
            filename: Some("deck.pdf".to_string()),
            content_type: Some("application/octet-stream".to_string()),
            bytes: vec![1],
        };
        assert_eq!(generic.resolved_content_type("deck.pdf"), "application/pdf");

        let unknown = UploadedFile {
            filename: None,
            content_type: None,
            bytes: vec![1],
        };
        assert_eq!(
            unknown.resolved_content_type("blob"),
            "application/octet-stream"
        );
    }

    #[test]
    fn test_header_safe_filename() {
        assert_eq!(header_safe_filename("Deck 2026.pdf"), "Deck 2026.pdf");
        assert_eq!(header_safe_filename("résumé.pdf"), "r_sum_.pdf");
    }

    #[test]
    fn test_parse_document_id() {
        assert_eq!(parse_document_id("12").unwrap(), 12);
        assert_eq!(
            parse_document_id("abc").unwrap_err().status(),
            StatusCode::NOT_FOUND
        );
    }
}
