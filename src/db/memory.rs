use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::db::models::{Document, DocumentId};
use crate::db::repository::DocumentStore;
use crate::error::AppError;

/// Process-local DocumentStore.
///
/// Enforces the same per-collection slug uniqueness as the MongoDB index,
/// atomically under one lock, so concurrent writers racing for a slug see
/// exactly one success. Used by the development server and the tests.
#[derive(Default)]
pub struct InMemoryDocumentStore {
    collections: Mutex<HashMap<String, Vec<Document>>>,
}

impl InMemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// All documents of a collection, in insertion order.
    pub fn documents(&self, collection: &str) -> Vec<Document> {
        self.lock()
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Vec<Document>>> {
        // A panic while holding the lock cannot leave a half-written Vec behind.
        self.collections
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

fn slug_taken(docs: &[Document], slug: Option<&str>, except: &DocumentId) -> bool {
    match slug {
        Some(slug) => docs
            .iter()
            .any(|d| &d.id != except && d.slug.as_deref() == Some(slug)),
        None => false,
    }
}

#[async_trait]
impl DocumentStore for InMemoryDocumentStore {
    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, AppError> {
        Ok(self
            .lock()
            .get(collection)
            .and_then(|docs| docs.iter().find(|d| &d.id == id))
            .cloned())
    }

    async fn find_slugs_with_prefix(
        &self,
        collection: &str,
        prefix: &str,
    ) -> Result<Vec<(DocumentId, String)>, AppError> {
        Ok(self
            .lock()
            .get(collection)
            .map(|docs| {
                docs.iter()
                    .filter_map(|d| {
                        d.slug
                            .as_ref()
                            .filter(|s| s.starts_with(prefix))
                            .map(|s| (d.id.clone(), s.clone()))
                    })
                    .collect()
            })
            .unwrap_or_default())
    }

    async fn create(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
        let mut collections = self.lock();
        let docs = collections.entry(collection.to_string()).or_default();

        if docs.iter().any(|d| d.id == doc.id) {
            return Err(AppError::BadRequest(format!(
                "Document '{}' already exists in collection '{}'",
                doc.id, collection
            )));
        }
        if slug_taken(docs, doc.slug.as_deref(), &doc.id) {
            return Err(AppError::UniquenessViolation {
                collection: collection.to_string(),
                slug: doc.slug.clone().unwrap_or_default(),
            });
        }

        docs.push(doc.clone());
        Ok(doc)
    }

    async fn update(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
        let mut collections = self.lock();
        let not_found = || {
            AppError::NotFound(format!(
                "Document '{}' not found in collection '{}'",
                doc.id, collection
            ))
        };
        let docs = collections.get_mut(collection).ok_or_else(not_found)?;

        if slug_taken(docs, doc.slug.as_deref(), &doc.id) {
            return Err(AppError::UniquenessViolation {
                collection: collection.to_string(),
                slug: doc.slug.clone().unwrap_or_default(),
            });
        }

        let slot = docs
            .iter_mut()
            .find(|d| d.id == doc.id)
            .ok_or_else(not_found)?;
        *slot = doc.clone();
        Ok(doc)
    }

    async fn ensure_indexes(&self, _collection: &str) -> Result<(), AppError> {
        Ok(())
    }
}
