//! Investor document models and DTOs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use sqlx::FromRow;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub description: Option<String>,
    /// Base64 of the file content
    pub file_data: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub display_order: i64,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Public listing entry, without the inline payload
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentSummary {
    pub id: i64,
    pub title: String,
    pub filename: String,
    pub description: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub display_order: i64,
    pub has_file: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Document> for DocumentSummary {
    fn from(doc: Document) -> Self {
        Self {
            id: doc.id,
            has_file: doc.file_data.is_some(),
            title: doc.title,
            filename: doc.filename,
            description: doc.description,
            content_type: doc.content_type,
            file_size: doc.file_size,
            display_order: doc.display_order,
            created_at: doc.created_at,
            updated_at: doc.updated_at,
        }
    }
}

/// Fields for a document about to be inserted
#[derive(Debug, Clone)]
pub struct NewDocument {
    pub title: String,
    pub filename: String,
    pub description: Option<String>,
    pub file_data: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub display_order: i64,
    pub is_active: bool,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CreateDocumentRequest {
    pub title: String,
    pub filename: String,
    pub description: Option<String>,
    pub file_data: Option<String>,
    pub content_type: Option<String>,
    pub file_size: Option<i64>,
    pub display_order: Option<i64>,
    pub is_active: Option<bool>,
}

impl From<CreateDocumentRequest> for NewDocument {
    fn from(req: CreateDocumentRequest) -> Self {
        Self {
            title: req.title,
            filename: req.filename,
            description: req.description,
            file_data: req.file_data,
            content_type: req.content_type,
            file_size: req.file_size,
            display_order: req.display_order.unwrap_or(0),
            is_active: req.is_active.unwrap_or(true),
        }
    }
}

/// Partial update. An absent field is left alone; for nullable fields an
/// explicit JSON `null` clears the stored value.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DocumentPatch {
    pub title: Option<String>,
    pub filename: Option<String>,
    #[serde(deserialize_with = "present")]
    pub description: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub file_data: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub content_type: Option<Option<String>>,
    #[serde(deserialize_with = "present")]
    pub file_size: Option<Option<i64>>,
    pub display_order: Option<i64>,
    pub is_active: Option<bool>,
}

/// Marks a field as supplied, keeping `null` distinct from "absent"
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

impl DocumentPatch {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Merge the supplied fields into `doc` and stamp `updated_at`
    pub fn apply(self, doc: &mut Document, now: DateTime<Utc>) {
        if let Some(title) = self.title {
            doc.title = title;
        }
        if let Some(filename) = self.filename {
            doc.filename = filename;
        }
        if let Some(description) = self.description {
            doc.description = description;
        }
        if let Some(file_data) = self.file_data {
            doc.file_data = file_data;
        }
        if let Some(content_type) = self.content_type {
            doc.content_type = content_type;
        }
        if let Some(file_size) = self.file_size {
            doc.file_size = file_size;
        }
        if let Some(display_order) = self.display_order {
            doc.display_order = display_order;
        }
        if let Some(is_active) = self.is_active {
            doc.is_active = is_active;
        }
        doc.updated_at = now;
    }
}

#[derive(Debug, Serialize)]
pub struct DocumentResponse {
    pub document: Document,
}

#[derive(Debug, Serialize)]
pub struct DocumentListResponse {
    pub documents: Vec<Document>,
}

#[derive(Debug, Serialize)]
pub struct PublicDocumentListResponse {
    pub documents: Vec<DocumentSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Document {
        let at = DateTime::parse_from_rfc3339("2026-01-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        Document {
            id: 1,
            title: "Pitch deck".to_string(),
            filename: "deck.pdf".to_string(),
            description: Some("Q3".to_string()),
            file_data: None,
            content_type: Some("application/pdf".to_string()),
            file_size: None,
            display_order: 2,
            is_active: true,
            created_at: at,
            updated_at: at,
        }
    }

    #[test]
    fn test_patch_absent_vs_null() {
        let patch: DocumentPatch = serde_json::from_str(r#"{"description": null}"#).unwrap();
        assert_eq!(patch.description, Some(None));
        assert_eq!(patch.content_type, None);

        let mut doc = sample();
        patch.apply(&mut doc, Utc::now());
        assert_eq!(doc.description, None);
        assert_eq!(doc.content_type.as_deref(), Some("application/pdf"));
    }

    #[test]
    fn test_patch_only_touches_supplied_fields() {
        let patch: DocumentPatch =
            serde_json::from_str(r#"{"title": "New deck", "isActive": false}"#).unwrap();
        let mut doc = sample();
        let before = doc.clone();
        let now = Utc::now();
        patch.apply(&mut doc, now);

        assert_eq!(doc.title, "New deck");
        assert!(!doc.is_active);
        assert_eq!(doc.filename, before.filename);
        assert_eq!(doc.description, before.description);
        assert_eq!(doc.display_order, before.display_order);
        assert_eq!(doc.created_at, before.created_at);
        assert_eq!(doc.updated_at, now);
    }

    #[test]
    fn test_empty_patch() {
        let patch: DocumentPatch = serde_json::from_str("{}").unwrap();
        assert!(patch.is_empty());
    }

    #[test]
    fn test_create_request_defaults() {
        let req: CreateDocumentRequest =
            serde_json::from_str(r#"{"title": "Deck", "filename": "deck.pdf"}"#).unwrap();
        let new = NewDocument::from(req);
        assert_eq!(new.display_order, 0);
        assert!(new.is_active);
        assert!(new.description.is_none());
    }

    #[test]
    fn test_summary_hides_payload() {
        let mut doc = sample();
        doc.file_data = Some("JVBERi0=".to_string());
        let json = serde_json::to_value(DocumentSummary::from(doc)).unwrap();
        assert!(json.get("fileData").is_none());
        assert_eq!(json["hasFile"], true);
        assert_eq!(json["displayOrder"], 2);
    }
}
