use std::sync::Arc;

use chrono::Utc;

use crate::content::collections::CollectionConfig;
use crate::content::hierarchy::{validate_parent, HierarchyConfig, ParentCache};
use crate::content::slug::{base_slug, explicit_slug, unique_slug, SlugConfig};
use crate::db::models::{Document, DocumentId, DocumentPatch, NewDocument};
use crate::db::repository::DocumentStore;
use crate::error::AppError;

#[derive(Debug, Clone, Copy)]
enum WriteOp {
    Create,
    Update,
}

/// Create/update hooks for content documents.
///
/// Runs parent validation and slug resolution before handing the write to
/// the store, and retries when the store reports that a concurrent writer
/// took the chosen slug first.
pub struct DocumentService {
    store: Arc<dyn DocumentStore>,
    collections: Vec<CollectionConfig>,
    slug: SlugConfig,
    hierarchy: HierarchyConfig,
}

impl DocumentService {
    pub fn new(
        store: Arc<dyn DocumentStore>,
        collections: Vec<CollectionConfig>,
        slug: SlugConfig,
        hierarchy: HierarchyConfig,
    ) -> Self {
        Self {
            store,
            collections,
            slug,
            hierarchy,
        }
    }

    pub fn store(&self) -> &dyn DocumentStore {
        self.store.as_ref()
    }

    /// Look up a configured collection.
    pub fn collection(&self, name: &str) -> Result<&CollectionConfig, AppError> {
        self.collections
            .iter()
            .find(|c| c.name == name)
            .ok_or_else(|| AppError::NotFound(format!("Unknown collection '{}'", name)))
    }

    /// Create the unique slug index on every slugged collection.
    pub async fn ensure_indexes(&self) -> Result<(), AppError> {
        for collection in self.collections.iter().filter(|c| c.slugged) {
            self.store.ensure_indexes(&collection.name).await?;
        }
        Ok(())
    }

    pub async fn find(&self, collection: &str, id: &DocumentId) -> Result<Document, AppError> {
        self.collection(collection)?;
        let id = id.clone().canonical();
        self.store
            .find_by_id(collection, &id)
            .await?
            .ok_or_else(|| {
                AppError::NotFound(format!(
                    "Document '{}' not found in collection '{}'",
                    id, collection
                ))
            })
    }

    /// Create a document.
    ///
    /// `cache` is the request's parent cache; pass the same one to every
    /// write of a request.
    pub async fn create(
        &self,
        cache: &mut ParentCache,
        collection: &str,
        input: NewDocument,
    ) -> Result<Document, AppError> {
        let settings = self.collection(collection)?;
        // Stored ids take the form their URL path parses to.
        let id = input.id.map(DocumentId::canonical);
        let parent = input.parent.map(DocumentId::canonical);

        if parent.is_some() && !settings.hierarchical {
            return Err(AppError::BadRequest(format!(
                "Collection '{}' does not support parent documents",
                collection
            )));
        }
        if input.slug.is_some() && !settings.slugged {
            return Err(AppError::BadRequest(format!(
                "Collection '{}' does not use slugs",
                collection
            )));
        }

        validate_parent(
            self.store(),
            cache,
            collection,
            id.as_ref(),
            parent.as_ref(),
            self.hierarchy.max_depth,
        )
        .await?
        .into_result()?;

        let base = if settings.slugged {
            Some(match input.slug.as_deref() {
                Some(explicit) => explicit_slug(explicit, &self.slug)?,
                None => base_slug(&input.title, self.slug.max_length),
            })
        } else {
            None
        };

        let now = Utc::now();
        let doc = Document {
            id: id.unwrap_or_else(DocumentId::generate),
            title: input.title,
            slug: None,
            parent,
            status: input.status.unwrap_or_default(),
            created_at: now,
            updated_at: now,
        };

        let created = self
            .commit(collection, doc, base.as_deref(), WriteOp::Create)
            .await?;
        cache.remember(collection, &created);

        tracing::info!(
            "Created document '{}' in '{}' (slug: {})",
            created.id,
            collection,
            created.slug.as_deref().unwrap_or("-")
        );
        Ok(created)
    }

    /// Apply a partial update.
    ///
    /// The slug is regenerated when the title changes or an explicit slug is
    /// given; the parent is re-validated when it changes.
    pub async fn update(
        &self,
        cache: &mut ParentCache,
        collection: &str,
        id: &DocumentId,
        patch: DocumentPatch,
    ) -> Result<Document, AppError> {
        let settings = self.collection(collection)?;
        let existing = self.find(collection, id).await?;

        if patch.slug.is_some() && !settings.slugged {
            return Err(AppError::BadRequest(format!(
                "Collection '{}' does not use slugs",
                collection
            )));
        }

        let parent = match patch.parent {
            None => existing.parent.clone(),
            Some(new_parent) => {
                let new_parent = new_parent.map(DocumentId::canonical);
                if new_parent.is_some() && !settings.hierarchical {
                    return Err(AppError::BadRequest(format!(
                        "Collection '{}' does not support parent documents",
                        collection
                    )));
                }
                if new_parent != existing.parent {
                    validate_parent(
                        self.store(),
                        cache,
                        collection,
                        Some(&existing.id),
                        new_parent.as_ref(),
                        self.hierarchy.max_depth,
                    )
                    .await?
                    .into_result()?;
                }
                new_parent
            }
        };

        let title = patch.title.unwrap_or_else(|| existing.title.clone());

        let base = if !settings.slugged {
            None
        } else if let Some(explicit) = patch.slug.as_deref() {
            Some(explicit_slug(explicit, &self.slug)?)
        } else if title != existing.title || existing.slug.is_none() {
            Some(base_slug(&title, self.slug.max_length))
        } else {
            None
        };

        let doc = Document {
            id: existing.id.clone(),
            title,
            slug: existing.slug.clone(),
            parent,
            status: patch.status.unwrap_or(existing.status),
            created_at: existing.created_at,
            updated_at: Utc::now(),
        };

        let updated = self
            .commit(collection, doc, base.as_deref(), WriteOp::Update)
            .await?;
        cache.remember(collection, &updated);

        tracing::info!("Updated document '{}' in '{}'", updated.id, collection);
        Ok(updated)
    }

    async fn write(&self, collection: &str, doc: Document, op: WriteOp) -> Result<Document, AppError> {
        match op {
            WriteOp::Create => self.store.create(collection, doc).await,
            WriteOp::Update => self.store.update(collection, doc).await,
        }
    }

    async fn pick_slug(
        &self,
        collection: &str,
        base: &str,
        id: &DocumentId,
    ) -> Result<String, AppError> {
        if self.slug.enforce_uniqueness {
            unique_slug(self.store(), collection, base, Some(id), &self.slug).await
        } else {
            Ok(base.to_string())
        }
    }

    /// Write `doc`, resolving its slug from `base` when one is given.
    ///
    /// Each lost race re-reads the taken slugs and tries the next free one,
    /// up to `max_attempts` writes.
    async fn commit(
        &self,
        collection: &str,
        mut doc: Document,
        base: Option<&str>,
        op: WriteOp,
    ) -> Result<Document, AppError> {
        let Some(base) = base else {
            return self.write(collection, doc, op).await;
        };

        let max_attempts = self.slug.max_attempts;
        for attempt in 1..=max_attempts {
            doc.slug = Some(self.pick_slug(collection, base, &doc.id).await?);

            match self.write(collection, doc.clone(), op).await {
                Ok(saved) => return Ok(saved),
                Err(AppError::UniquenessViolation { slug, .. }) => {
                    tracing::warn!(
                        "Slug '{}' in '{}' was taken by a concurrent write (attempt {}/{})",
                        slug,
                        collection,
                        attempt,
                        max_attempts
                    );
                }
                Err(e) => return Err(e),
            }
        }

        tracing::error!(
            "Giving up on slug '{}' in '{}' after {} attempts",
            base,
            collection,
            max_attempts
        );
        Err(AppError::SlugConflict {
            collection: collection.to_string(),
            base: base.to_string(),
            attempts: max_attempts,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::content::collections::default_collections;
    use crate::db::memory::InMemoryDocumentStore;
    use crate::db::repository::MockDocumentStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    // -- Mock implementations --

    /// Lets a competing writer grab the requested slug right before the
    /// first `races` creates, as if it had won the race.
    struct RacingStore {
        inner: InMemoryDocumentStore,
        races: AtomicU32,
        creates: AtomicU32,
    }

    impl RacingStore {
        fn new(races: u32) -> Self {
            Self {
                inner: InMemoryDocumentStore::new(),
                races: AtomicU32::new(races),
                creates: AtomicU32::new(0),
            }
        }
    }

    #[async_trait]
    impl DocumentStore for RacingStore {
        async fn find_by_id(
            &self,
            collection: &str,
            id: &DocumentId,
        ) -> Result<Option<Document>, AppError> {
            self.inner.find_by_id(collection, id).await
        }

        async fn find_slugs_with_prefix(
            &self,
            collection: &str,
            prefix: &str,
        ) -> Result<Vec<(DocumentId, String)>, AppError> {
            self.inner.find_slugs_with_prefix(collection, prefix).await
        }

        async fn create(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
            self.creates.fetch_add(1, Ordering::SeqCst);
            let raced = self
                .races
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_ok();
            if raced {
                let mut rival = doc.clone();
                rival.id = DocumentId::generate();
                rival.title = "Rival".to_string();
                self.inner.create(collection, rival).await?;
            }
            self.inner.create(collection, doc).await
        }

        async fn update(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
            self.inner.update(collection, doc).await
        }

        async fn ensure_indexes(&self, collection: &str) -> Result<(), AppError> {
            self.inner.ensure_indexes(collection).await
        }
    }

    fn service_with(store: Arc<dyn DocumentStore>) -> DocumentService {
        DocumentService::new(
            store,
            default_collections(),
            SlugConfig::default(),
            HierarchyConfig::default(),
        )
    }

    fn service() -> (Arc<InMemoryDocumentStore>, DocumentService) {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = service_with(store.clone());
        (store, service)
    }

    fn titled(title: &str) -> NewDocument {
        NewDocument {
            title: title.to_string(),
            ..NewDocument::default()
        }
    }

    fn child_of(id: &str, title: &str, parent: Option<&str>) -> NewDocument {
        NewDocument {
            id: Some(DocumentId::from(id)),
            title: title.to_string(),
            parent: parent.map(DocumentId::from),
            ..NewDocument::default()
        }
    }

    #[tokio::test]
    async fn test_sequential_creates_are_suffixed_in_order() {
        let (_, service) = service();
        let mut cache = ParentCache::new();

        let mut slugs = Vec::new();
        for _ in 0..4 {
            let doc = service
                .create(&mut cache, "blogs", titled("Hello World"))
                .await
                .unwrap();
            slugs.push(doc.slug.unwrap());
        }
        assert_eq!(
            slugs,
            vec!["hello-world", "hello-world-2", "hello-world-3", "hello-world-4"]
        );
    }

    #[tokio::test]
    async fn test_same_slug_in_different_collections() {
        let (_, service) = service();
        let mut cache = ParentCache::new();

        let page = service.create(&mut cache, "pages", titled("About")).await.unwrap();
        let blog = service.create(&mut cache, "blogs", titled("About")).await.unwrap();
        assert_eq!(page.slug.as_deref(), Some("about"));
        assert_eq!(blog.slug.as_deref(), Some("about"));
    }

    #[tokio::test]
    async fn test_empty_title_uses_placeholder() {
        let (_, service) = service();
        let mut cache = ParentCache::new();

        let first = service.create(&mut cache, "pages", titled("   ")).await.unwrap();
        let second = service.create(&mut cache, "pages", titled("")).await.unwrap();
        assert_eq!(first.slug.as_deref(), Some("untitled"));
        assert_eq!(second.slug.as_deref(), Some("untitled-2"));
    }

    #[tokio::test]
    async fn test_explicit_slug_is_made_unique() {
        let (_, service) = service();
        let mut cache = ParentCache::new();

        let mut input = titled("Anything");
        input.slug = Some("custom-path".to_string());
        let first = service.create(&mut cache, "pages", input.clone()).await.unwrap();
        let second = service.create(&mut cache, "pages", input).await.unwrap();
        assert_eq!(first.slug.as_deref(), Some("custom-path"));
        assert_eq!(second.slug.as_deref(), Some("custom-path-2"));
    }

    #[tokio::test]
    async fn test_malformed_explicit_slug_rejected() {
        let (_, service) = service();
        let mut input = titled("Anything");
        input.slug = Some("Not A Slug".to_string());

        let err = service
            .create(&mut ParentCache::new(), "pages", input)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("Invalid slug")));
    }

    #[tokio::test]
    async fn test_unknown_collection() {
        let (_, service) = service();
        let err = service
            .create(&mut ParentCache::new(), "recipes", titled("Soup"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(msg) if msg.contains("recipes")));
    }

    #[tokio::test]
    async fn test_slugless_collection() {
        let (store, service) = service();
        let mut cache = ParentCache::new();

        let doc = service
            .create(&mut cache, "contacts", titled("Jane Doe"))
            .await
            .unwrap();
        assert_eq!(doc.slug, None);
        assert_eq!(store.documents("contacts").len(), 1);

        let mut with_slug = titled("John");
        with_slug.slug = Some("john".to_string());
        let err = service
            .create(&mut cache, "contacts", with_slug)
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(_)));
    }

    #[tokio::test]
    async fn test_parent_on_flat_collection_rejected() {
        let (_, service) = service();
        let err = service
            .create(&mut ParentCache::new(), "blogs", child_of("b", "B", Some("a")))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::BadRequest(msg) if msg.contains("parent")));
    }

    #[tokio::test]
    async fn test_create_with_own_id_as_parent() {
        let (store, service) = service();
        let err = service
            .create(
                &mut ParentCache::new(),
                "pages",
                child_of("page-1", "Page 1", Some("page-1")),
            )
            .await
            .unwrap_err();
        match err {
            AppError::Validation { field, message } => {
                assert_eq!(field, "parent");
                assert!(message.contains("self-reference"));
            }
            other => panic!("Expected Validation error, got: {:?}", other),
        }
        assert!(store.documents("pages").is_empty());
    }

    #[tokio::test]
    async fn test_reparent_into_cycle_rejected() {
        let (_, service) = service();
        let mut cache = ParentCache::new();
        service
            .create(&mut cache, "pages", child_of("page-1", "Page 1", None))
            .await
            .unwrap();
        service
            .create(&mut cache, "pages", child_of("page-2", "Page 2", Some("page-1")))
            .await
            .unwrap();
        service
            .create(&mut cache, "pages", child_of("page-3", "Page 3", Some("page-2")))
            .await
            .unwrap();

        let patch = DocumentPatch {
            parent: Some(Some(DocumentId::from("page-3"))),
            ..DocumentPatch::default()
        };
        let err = service
            .update(&mut ParentCache::new(), "pages", &DocumentId::from("page-1"), patch)
            .await
            .unwrap_err();
        assert!(err
            .to_string()
            .contains("Circular parent reference detected"));

        let page1 = service.find("pages", &DocumentId::from("page-1")).await.unwrap();
        assert_eq!(page1.parent, None);
    }

    #[tokio::test]
    async fn test_cycle_within_one_request_detected() {
        let (_, service) = service();
        let mut cache = ParentCache::new();
        service
            .create(&mut cache, "pages", child_of("a", "A", None))
            .await
            .unwrap();
        service
            .create(&mut cache, "pages", child_of("b", "B", None))
            .await
            .unwrap();

        let under = |p: &str| DocumentPatch {
            parent: Some(Some(DocumentId::from(p))),
            ..DocumentPatch::default()
        };
        service
            .update(&mut cache, "pages", &DocumentId::from("a"), under("b"))
            .await
            .unwrap();
        let err = service
            .update(&mut cache, "pages", &DocumentId::from("b"), under("a"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Validation { .. }));
    }

    #[tokio::test]
    async fn test_update_to_root_and_unchanged_parent_skip_walk() {
        let mut store = MockDocumentStore::new();
        let existing = Document {
            id: DocumentId::from("page-2"),
            title: "Page 2".to_string(),
            slug: Some("page-2".to_string()),
            parent: Some(DocumentId::from("page-1")),
            status: Default::default(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        let returned = existing.clone();
        // Only the document itself is ever looked up.
        store
            .expect_find_by_id()
            .withf(|c, id| c == "pages" && *id == DocumentId::from("page-2"))
            .returning(move |_, _| Ok(Some(returned.clone())));
        store.expect_update().returning(|_, doc| Ok(doc));

        let service = service_with(Arc::new(store));
        let id = DocumentId::from("page-2");

        let same = DocumentPatch {
            parent: Some(Some(DocumentId::from("page-1"))),
            ..DocumentPatch::default()
        };
        let doc = service
            .update(&mut ParentCache::new(), "pages", &id, same)
            .await
            .unwrap();
        assert_eq!(doc.parent, Some(DocumentId::from("page-1")));

        let root = DocumentPatch {
            parent: Some(None),
            ..DocumentPatch::default()
        };
        let doc = service
            .update(&mut ParentCache::new(), "pages", &id, root)
            .await
            .unwrap();
        assert_eq!(doc.parent, None);
        assert_eq!(doc.slug.as_deref(), Some("page-2"));
    }

    #[tokio::test]
    async fn test_update_slug_regeneration() {
        let (_, service) = service();
        let mut cache = ParentCache::new();
        let first = service.create(&mut cache, "pages", titled("Services")).await.unwrap();
        let second = service.create(&mut cache, "pages", titled("Pricing")).await.unwrap();

        // Status-only change keeps the slug.
        let patch = DocumentPatch {
            status: Some(crate::db::models::DocumentStatus::Published),
            ..DocumentPatch::default()
        };
        let doc = service.update(&mut cache, "pages", &second.id, patch).await.unwrap();
        assert_eq!(doc.slug.as_deref(), Some("pricing"));

        // Retitling onto a slug it already owns keeps it bare.
        let patch = DocumentPatch {
            title: Some("Pricing!".to_string()),
            ..DocumentPatch::default()
        };
        let doc = service.update(&mut cache, "pages", &second.id, patch).await.unwrap();
        assert_eq!(doc.slug.as_deref(), Some("pricing"));

        // Retitling onto another document's slug gets suffixed.
        let patch = DocumentPatch {
            title: Some("Services".to_string()),
            ..DocumentPatch::default()
        };
        let doc = service.update(&mut cache, "pages", &second.id, patch).await.unwrap();
        assert_eq!(doc.slug.as_deref(), Some("services-2"));
        assert_eq!(first.slug.as_deref(), Some("services"));

        // Explicit slug.
        let patch = DocumentPatch {
            slug: Some("our-services".to_string()),
            ..DocumentPatch::default()
        };
        let doc = service.update(&mut cache, "pages", &second.id, patch).await.unwrap();
        assert_eq!(doc.slug.as_deref(), Some("our-services"));
        assert_eq!(doc.title, "Services");
    }

    #[tokio::test]
    async fn test_update_missing_document() {
        let (_, service) = service();
        let err = service
            .update(
                &mut ParentCache::new(),
                "pages",
                &DocumentId::from("ghost"),
                DocumentPatch::default(),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_lost_race_is_retried() {
        let store = Arc::new(RacingStore::new(2));
        let service = service_with(store.clone());

        let doc = service
            .create(&mut ParentCache::new(), "blogs", titled("Breaking News"))
            .await
            .unwrap();
        // Two rivals took "breaking-news" and "breaking-news-2" in turn.
        assert_eq!(doc.slug.as_deref(), Some("breaking-news-3"));
        assert_eq!(store.creates.load(Ordering::SeqCst), 3);
        assert_eq!(store.inner.documents("blogs").len(), 3);
    }

    #[tokio::test]
    async fn test_retry_budget_exhausted() {
        let store = Arc::new(RacingStore::new(u32::MAX));
        let service = service_with(store.clone());

        let err = service
            .create(&mut ParentCache::new(), "blogs", titled("Hot Topic"))
            .await
            .unwrap_err();
        match err {
            AppError::SlugConflict {
                collection,
                base,
                attempts,
            } => {
                assert_eq!(collection, "blogs");
                assert_eq!(base, "hot-topic");
                assert_eq!(attempts, SlugConfig::default().max_attempts);
            }
            other => panic!("Expected SlugConflict, got: {:?}", other),
        }
        assert_eq!(
            store.creates.load(Ordering::SeqCst),
            SlugConfig::default().max_attempts
        );
    }

    #[tokio::test]
    async fn test_store_failure_is_not_retried() {
        let mut store = MockDocumentStore::new();
        store
            .expect_find_slugs_with_prefix()
            .returning(|_, _| Ok(vec![]));
        store
            .expect_create()
            .times(1)
            .returning(|_, _| Err(AppError::Database("disk full".into())));

        let service = service_with(Arc::new(store));
        let err = service
            .create(&mut ParentCache::new(), "blogs", titled("Hello"))
            .await
            .unwrap_err();
        assert!(matches!(err, AppError::Database(msg) if msg == "disk full"));
    }

    #[tokio::test]
    async fn test_ensure_indexes_only_for_slugged_collections() {
        let mut store = MockDocumentStore::new();
        store
            .expect_ensure_indexes()
            .withf(|c| c != "contacts")
            .times(4)
            .returning(|_| Ok(()));

        service_with(Arc::new(store)).ensure_indexes().await.unwrap();
    }
}
