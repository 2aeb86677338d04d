use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A stored snippet row.
///
/// The same identifier may appear twice in the `documents` table: once as the
/// approved version (`awaiting_moderation = false`) and once as a pending
/// edit awaiting review. The primary key is `(id, awaiting_moderation)`.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Document {
    /// Store-assigned identifier, stable across edits of the same document.
    pub id: i64,
    /// Opaque, caller-asserted owner token. See `crate::identity`.
    pub owner: String,
    /// Human-readable title.
    pub title: String,
    /// Free-form category label.
    pub category: String,
    /// Serialized content blob, typically JSON text. Exact-match uniqueness
    /// on this column (per moderation state) drives duplicate detection.
    pub content: String,
    /// Number of attachments submitted with the document.
    pub attachment_count: i32,
    /// True while the document sits in the moderation queue and is not yet
    /// publicly visible.
    pub awaiting_moderation: bool,
    /// Store-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

/// Column values for a document insert; the store assigns id and timestamp.
#[derive(Debug, Clone, Copy)]
pub struct NewDocument<'a> {
    pub owner: &'a str,
    pub title: &'a str,
    pub category: &'a str,
    pub content: &'a str,
    pub attachment_count: i32,
    pub awaiting_moderation: bool,
}

/// Result of the approved-duplicate pre-check in the save workflow.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DuplicateMatch {
    pub id: i64,
    pub owner: String,
}

/// The request payload for `POST /save`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveRequest {
    /// Caller-asserted user token; absent or empty means anonymous.
    #[serde(default)]
    pub user: Option<String>,
    /// Identifier of an existing document the caller wants to edit.
    #[serde(rename = "documentID", default)]
    pub document_id: Option<i64>,
    pub title: String,
    pub category: String,
    /// The serialized content blob.
    pub document: String,
    /// Attachment payloads; only their count is persisted.
    #[serde(default)]
    pub attachments: Vec<serde_json::Value>,
    #[serde(default)]
    pub keywords: Vec<String>,
}

/// The response from `POST /save`.
///
/// `success` is true only on a clean insert or update. A soft duplicate or a
/// concurrent uniqueness conflict reports `success = false` with the existing
/// document's id and the violated constraint name.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SaveResponse {
    pub success: bool,
    #[serde(rename = "documentID", skip_serializing_if = "Option::is_none")]
    pub document_id: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub constraint: Option<String>,
}

impl SaveResponse {
    /// Failure response with no further detail, used for precondition and
    /// storage failures.
    pub fn rejected() -> Self {
        Self {
            success: false,
            document_id: None,
            constraint: None,
        }
    }

    pub fn saved(document_id: i64) -> Self {
        Self {
            success: true,
            document_id: Some(document_id),
            constraint: None,
        }
    }

    /// Soft-failure response pointing the caller at the already-existing
    /// document.
    pub fn duplicate(document_id: Option<i64>, constraint: String) -> Self {
        Self {
            success: false,
            document_id,
            constraint: Some(constraint),
        }
    }
}

/// The request payload for `POST /load`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoadRequest {
    #[serde(default)]
    pub user: Option<String>,
    #[serde(rename = "documentID")]
    pub document_id: i64,
    /// When set by an administrator, returns the most recent version even if
    /// it is still awaiting moderation.
    #[serde(rename = "forModeration", default)]
    pub for_moderation: bool,
}
