use thiserror::Error;

/// Application-wide error types.
#[derive(Debug, Error)]
pub enum AppError {
    /// The document store failed (lookup, listing or write).
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    /// A field-level rejection that is shown to the editor as-is.
    #[error("Invalid {field}: {message}")]
    Validation { field: String, message: String },

    /// The store refused a write because another document already holds the slug.
    #[error("Slug '{slug}' is already taken in collection '{collection}'")]
    UniquenessViolation { collection: String, slug: String },

    /// A unique slug could not be committed within the retry budget.
    #[error("Could not save document: no unique slug for '{base}' in collection '{collection}' after {attempts} attempts")]
    SlugConflict {
        collection: String,
        base: String,
        attempts: u32,
    },

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Shorthand for a rejection of the `parent` field.
    pub fn invalid_parent(message: impl Into<String>) -> Self {
        AppError::Validation {
            field: "parent".to_string(),
            message: message.into(),
        }
    }
}

/// Helper conversion from anyhow::Error
impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::Internal(err.to_string())
    }
}
