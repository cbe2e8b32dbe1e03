use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::db::models::{Document, DocumentId};
use crate::db::repository::DocumentStore;
use crate::error::AppError;

/// Parent hierarchy settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HierarchyConfig {
    /// Maximum number of ancestors a document may have.
    pub max_depth: usize,
}

impl Default for HierarchyConfig {
    fn default() -> Self {
        Self { max_depth: 50 }
    }
}

/// Why a candidate parent was refused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentRejection {
    SelfReference,
    Circular,
    TooDeep { max_depth: usize },
}

impl fmt::Display for ParentRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRejection::SelfReference => {
                write!(f, "A document cannot be its own parent (self-reference)")
            }
            ParentRejection::Circular => write!(f, "Circular parent reference detected"),
            ParentRejection::TooDeep { max_depth } => write!(
                f,
                "Parent hierarchy too deep (at most {} ancestors allowed)",
                max_depth
            ),
        }
    }
}

/// Outcome of [`validate_parent`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParentCheck {
    Accepted,
    Rejected(ParentRejection),
}

impl ParentCheck {
    pub fn is_accepted(&self) -> bool {
        matches!(self, ParentCheck::Accepted)
    }

    /// Turn a rejection into a field-level `parent` validation error.
    pub fn into_result(self) -> Result<(), AppError> {
        match self {
            ParentCheck::Accepted => Ok(()),
            ParentCheck::Rejected(reason) => Err(AppError::invalid_parent(reason.to_string())),
        }
    }
}

/// Documents looked up while walking parent chains, keyed by collection and id.
///
/// Create one per incoming request and drop it with the request; it is
/// never shared. Misses are remembered too, so a dangling parent is looked
/// up once.
#[derive(Debug, Default)]
pub struct ParentCache {
    entries: HashMap<(String, DocumentId), Option<Document>>,
}

impl ParentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn contains(&self, collection: &str, id: &DocumentId) -> bool {
        self.entries
            .contains_key(&(collection.to_string(), id.clone()))
    }

    /// Record the committed state of a document written during this request,
    /// so later validations see its new parent.
    pub fn remember(&mut self, collection: &str, doc: &Document) {
        self.entries
            .insert((collection.to_string(), doc.id.clone()), Some(doc.clone()));
    }

    async fn fetch(
        &mut self,
        store: &dyn DocumentStore,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, AppError> {
        let key = (collection.to_string(), id.clone());
        if let Some(hit) = self.entries.get(&key) {
            return Ok(hit.clone());
        }
        let found = store.find_by_id(collection, id).await?;
        self.entries.insert(key, found.clone());
        Ok(found)
    }
}

/// Decide whether `document_id` may take `candidate_parent` as its parent.
///
/// Walks the chain upward from the candidate. Rejects when the document
/// itself shows up in it (directly or further up) or when the chain holds
/// more than `max_depth` ancestors. A chain that ends at a missing
/// document is treated as ending at a root.
pub async fn validate_parent(
    store: &dyn DocumentStore,
    cache: &mut ParentCache,
    collection: &str,
    document_id: Option<&DocumentId>,
    candidate_parent: Option<&DocumentId>,
    max_depth: usize,
) -> Result<ParentCheck, AppError> {
    let Some(candidate) = candidate_parent else {
        return Ok(ParentCheck::Accepted);
    };
    // A document without an id yet cannot appear in anybody's chain.
    let Some(document_id) = document_id else {
        return Ok(ParentCheck::Accepted);
    };
    if candidate == document_id {
        return Ok(ParentCheck::Rejected(ParentRejection::SelfReference));
    }

    let mut current = candidate.clone();
    let mut depth = 0usize;
    loop {
        if &current == document_id {
            tracing::debug!(
                "Rejected parent '{}' for '{}' in '{}': cycle at depth {}",
                candidate,
                document_id,
                collection,
                depth
            );
            return Ok(ParentCheck::Rejected(ParentRejection::Circular));
        }

        depth += 1;
        if depth > max_depth {
            return Ok(ParentCheck::Rejected(ParentRejection::TooDeep { max_depth }));
        }

        match cache.fetch(store, collection, &current).await? {
            Some(doc) => match doc.parent {
                Some(next) => current = next,
                None => return Ok(ParentCheck::Accepted),
            },
            None => {
                tracing::warn!(
                    "Parent chain of '{}' in '{}' ends at missing document '{}', treating it as a root",
                    document_id,
                    collection,
                    current
                );
                return Ok(ParentCheck::Accepted);
            }
        }
    }
}
