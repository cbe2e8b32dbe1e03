use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

/// Identifier of a document, unique within its collection.
///
/// Imported content keeps its numeric ids, documents created through the
/// API get a UUID string. Both forms serialize as plain JSON/BSON scalars.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(untagged)]
pub enum DocumentId {
    Int(i64),
    Text(String),
}

impl DocumentId {
    /// Generate a fresh random id.
    pub fn generate() -> Self {
        DocumentId::Text(uuid::Uuid::new_v4().to_string())
    }

    /// Parse an id coming from a URL path segment.
    ///
    /// Segments in canonical integer form are treated as integer ids.
    pub fn from_path(segment: &str) -> Self {
        match canonical_int(segment) {
            Some(n) => DocumentId::Int(n),
            None => DocumentId::Text(segment.to_string()),
        }
    }

    /// The form this id takes once stored.
    ///
    /// A string holding a canonical integer (`"123"`, not `"0123"`) becomes
    /// an integer id, so every stored id can be addressed by its path.
    pub fn canonical(self) -> Self {
        match self {
            DocumentId::Text(s) => DocumentId::from_path(&s),
            id => id,
        }
    }
}

fn canonical_int(s: &str) -> Option<i64> {
    s.parse::<i64>().ok().filter(|n| n.to_string() == s)
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocumentId::Int(n) => write!(f, "{n}"),
            DocumentId::Text(s) => f.write_str(s),
        }
    }
}

impl From<i64> for DocumentId {
    fn from(n: i64) -> Self {
        DocumentId::Int(n)
    }
}

impl From<&str> for DocumentId {
    fn from(s: &str) -> Self {
        DocumentId::Text(s.to_string())
    }
}

impl From<String> for DocumentId {
    fn from(s: String) -> Self {
        DocumentId::Text(s)
    }
}

/// Publication state of a document.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentStatus {
    #[default]
    Draft,
    Published,
}

/// A content entry stored in one of the collections (`pages`, `blogs`, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Document {
    #[serde(rename = "_id")]
    pub id: DocumentId,
    /// Human-readable title, the source of the slug.
    pub title: String,
    /// URL-safe identifier, unique within the collection.
    /// Absent for collections that are not addressed by URL.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,
    /// Parent document in the same collection. `None` for roots.
    #[serde(default)]
    pub parent: Option<DocumentId>,
    #[serde(default)]
    pub status: DocumentStatus,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Payload for creating a document.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NewDocument {
    /// Caller-assigned id. Generated by the service when absent.
    #[serde(default)]
    pub id: Option<DocumentId>,
    pub title: String,
    /// Explicit slug; skips normalization but is still made unique.
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub parent: Option<DocumentId>,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

/// Partial update of a document.
///
/// `parent` is tri-state: missing leaves the parent untouched, `null`
/// turns the document into a root, a value re-parents it.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DocumentPatch {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(
        default,
        deserialize_with = "double_option",
        skip_serializing_if = "Option::is_none"
    )]
    pub parent: Option<Option<DocumentId>>,
    #[serde(default)]
    pub status: Option<DocumentStatus>,
}

fn double_option<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Deserialize::deserialize(deserializer).map(Some)
}
