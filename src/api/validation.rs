//! Input validation for API requests.
//!
//! Field checks return `Err(message)`; handlers collect them with the
//! `ValidationErrorBuilder` from the `error` module so that a single 400
//! response lists every problem.

use lazy_static::lazy_static;
use regex::Regex;

use crate::db::{ContactSubmission, DocumentPatch, NewDocument};

use super::error::{ApiError, ValidationErrorBuilder};

pub const MAX_USERNAME_LEN: usize = 50;
pub const MAX_TITLE_LEN: usize = 200;
pub const MAX_FILENAME_LEN: usize = 255;
pub const MAX_CONTACT_FIELD_LEN: usize = 200;
pub const MAX_MESSAGE_LEN: usize = 5000;

lazy_static! {
    /// Loose shape check: something@domain.tld, no whitespace
    static ref EMAIL_REGEX: Regex = Regex::new(
        r"^[^@\s]+@[^@\s]+\.[^@\s]+$"
    ).unwrap();
}

fn required(value: &str, label: &str, max: usize) -> Result<(), String> {
    if value.trim().is_empty() {
        return Err(format!("{} is required", label));
    }
    if value.chars().count() > max {
        return Err(format!("{} is too long (max {} characters)", label, max));
    }
    Ok(())
}

fn optional(value: Option<&str>, label: &str, max: usize) -> Result<(), String> {
    match value {
        Some(v) if v.chars().count() > max => {
            Err(format!("{} is too long (max {} characters)", label, max))
        }
        _ => Ok(()),
    }
}

/// Validate an admin username
pub fn validate_username(username: &str) -> Result<(), String> {
    required(username, "Username", MAX_USERNAME_LEN)
}

pub fn validate_title(title: &str) -> Result<(), String> {
    required(title, "Title", MAX_TITLE_LEN)
}

/// Validate a stored filename. Path separators are rejected so the name is
/// safe to echo back in a Content-Disposition header.
pub fn validate_filename(filename: &str) -> Result<(), String> {
    required(filename, "Filename", MAX_FILENAME_LEN)?;
    if filename.contains('/') || filename.contains('\\') || filename.contains('"') {
        return Err("Filename cannot contain path separators or quotes".to_string());
    }
    if filename.chars().any(|c| c.is_control()) {
        return Err("Filename cannot contain control characters".to_string());
    }
    Ok(())
}

pub fn validate_email(email: &str) -> Result<(), String> {
    required(email, "Email", MAX_CONTACT_FIELD_LEN)?;
    if !EMAIL_REGEX.is_match(email.trim()) {
        return Err("Invalid email format".to_string());
    }
    Ok(())
}

pub fn validate_file_size(size: Option<i64>) -> Result<(), String> {
    match size {
        Some(s) if s < 0 => Err("File size cannot be negative".to_string()),
        _ => Ok(()),
    }
}

pub fn validate_new_document(doc: &NewDocument) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("title", validate_title(&doc.title))
        .check("filename", validate_filename(&doc.filename))
        .check("fileSize", validate_file_size(doc.file_size));
    errors.finish()
}

pub fn validate_document_patch(patch: &DocumentPatch) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    if let Some(title) = &patch.title {
        errors.check("title", validate_title(title));
    }
    if let Some(filename) = &patch.filename {
        errors.check("filename", validate_filename(filename));
    }
    if let Some(size) = patch.file_size {
        errors.check("fileSize", validate_file_size(size));
    }
    errors.finish()
}

pub fn validate_contact(form: &ContactSubmission) -> Result<(), ApiError> {
    let mut errors = ValidationErrorBuilder::new();
    errors
        .check("firstName", required(&form.first_name, "First name", MAX_CONTACT_FIELD_LEN))
        .check("lastName", required(&form.last_name, "Last name", MAX_CONTACT_FIELD_LEN))
        .check("email", validate_email(&form.email))
        .check("churchName", required(&form.church_name, "Church name", MAX_CONTACT_FIELD_LEN))
        .check("phone", optional(form.phone.as_deref(), "Phone", MAX_CONTACT_FIELD_LEN))
        .check(
            "churchSize",
            optional(form.church_size.as_deref(), "Church size", MAX_CONTACT_FIELD_LEN),
        )
        .check("message", optional(form.message.as_deref(), "Message", MAX_MESSAGE_LEN));
    errors.finish()
}
