use async_trait::async_trait;

use crate::db::models::{Document, DocumentId};
use crate::error::AppError;

/// Name of the unique slug index created in every slugged collection.
pub const SLUG_INDEX: &str = "slug_unique";

/// Storage seam for content documents.
///
/// Collections are independent namespaces: slug uniqueness and parent
/// links never cross them. Implementations must reject a write that would
/// give two documents of the same collection the same slug with
/// [`AppError::UniquenessViolation`]; that constraint is the final
/// authority the slug retry loop relies on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Find a document by id.
    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, AppError>;

    /// List `(id, slug)` for every document whose slug equals or starts with `prefix`.
    async fn find_slugs_with_prefix(
        &self,
        collection: &str,
        prefix: &str,
    ) -> Result<Vec<(DocumentId, String)>, AppError>;

    /// Insert a new document.
    async fn create(&self, collection: &str, doc: Document) -> Result<Document, AppError>;

    /// Replace an existing document (matched by id).
    async fn update(&self, collection: &str, doc: Document) -> Result<Document, AppError>;

    /// Make sure the collection enforces slug uniqueness. Idempotent.
    async fn ensure_indexes(&self, collection: &str) -> Result<(), AppError>;
}

/// MongoDB implementation of the DocumentStore.
///
/// Each content collection maps to a MongoDB collection of the same name.
/// This is only available when the `server` feature is enabled.
#[cfg(feature = "server")]
pub struct MongoDocumentStore {
    db: mongodb::Database,
}

#[cfg(feature = "server")]
impl MongoDocumentStore {
    pub fn new(db: &mongodb::Database) -> Self {
        Self { db: db.clone() }
    }

    fn collection(&self, name: &str) -> mongodb::Collection<Document> {
        self.db.collection(name)
    }

    fn id_filter(id: &DocumentId) -> Result<mongodb::bson::Document, AppError> {
        let id = mongodb::bson::to_bson(id).map_err(|e| AppError::Database(e.to_string()))?;
        Ok(mongodb::bson::doc! { "_id": id })
    }
}

#[cfg(feature = "server")]
const DUPLICATE_KEY: i32 = 11000;

/// Classify a failed write: slug clashes and id clashes get their own errors.
#[cfg(feature = "server")]
fn map_write_error(collection: &str, doc: &Document, err: mongodb::error::Error) -> AppError {
    use mongodb::error::{ErrorKind, WriteFailure};

    let duplicate_message = match err.kind.as_ref() {
        ErrorKind::Write(WriteFailure::WriteError(e)) if e.code == DUPLICATE_KEY => {
            Some(e.message.clone())
        }
        ErrorKind::Command(e) if e.code == DUPLICATE_KEY => Some(e.message.clone()),
        _ => None,
    };

    match duplicate_message {
        Some(msg) if msg.contains(SLUG_INDEX) => AppError::UniquenessViolation {
            collection: collection.to_string(),
            slug: doc.slug.clone().unwrap_or_default(),
        },
        Some(_) => AppError::BadRequest(format!(
            "Document '{}' already exists in collection '{}'",
            doc.id, collection
        )),
        None => AppError::Database(err.to_string()),
    }
}

#[cfg(feature = "server")]
#[async_trait]
impl DocumentStore for MongoDocumentStore {
    async fn find_by_id(
        &self,
        collection: &str,
        id: &DocumentId,
    ) -> Result<Option<Document>, AppError> {
        self.collection(collection)
            .find_one(Self::id_filter(id)?)
            .await
            .map_err(|e| AppError::Database(e.to_string()))
    }

    async fn find_slugs_with_prefix(
        &self,
        collection: &str,
        prefix: &str,
    ) -> Result<Vec<(DocumentId, String)>, AppError> {
        use futures::TryStreamExt;
        use mongodb::bson::doc;
        use mongodb::options::FindOptions;

        // Prefixes are slug stems ([a-z0-9-]), so they carry no regex metacharacters.
        let filter = doc! { "slug": { "$regex": format!("^{prefix}") } };
        let options = FindOptions::builder()
            .projection(doc! { "_id": 1, "slug": 1 })
            .build();

        let mut cursor = self
            .db
            .collection::<mongodb::bson::Document>(collection)
            .find(filter)
            .with_options(options)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        let mut slugs = Vec::new();
        while let Some(row) = cursor
            .try_next()
            .await
            .map_err(|e| AppError::Database(e.to_string()))?
        {
            let Some(id) = row.get("_id").cloned() else {
                continue;
            };
            let id: DocumentId =
                mongodb::bson::from_bson(id).map_err(|e| AppError::Database(e.to_string()))?;
            if let Ok(slug) = row.get_str("slug") {
                slugs.push((id, slug.to_string()));
            }
        }

        Ok(slugs)
    }

    async fn create(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
        self.collection(collection)
            .insert_one(&doc)
            .await
            .map_err(|e| map_write_error(collection, &doc, e))?;

        Ok(doc)
    }

    async fn update(&self, collection: &str, doc: Document) -> Result<Document, AppError> {
        let result = self
            .collection(collection)
            .replace_one(Self::id_filter(&doc.id)?, &doc)
            .await
            .map_err(|e| map_write_error(collection, &doc, e))?;

        if result.matched_count == 0 {
            return Err(AppError::NotFound(format!(
                "Document '{}' not found in collection '{}'",
                doc.id, collection
            )));
        }

        Ok(doc)
    }

    async fn ensure_indexes(&self, collection: &str) -> Result<(), AppError> {
        use mongodb::bson::doc;
        use mongodb::options::IndexOptions;
        use mongodb::IndexModel;

        // Sparse: documents of slug-less collections carry no slug field at all.
        let options = IndexOptions::builder()
            .name(SLUG_INDEX.to_string())
            .unique(true)
            .sparse(true)
            .build();
        let model = IndexModel::builder()
            .keys(doc! { "slug": 1 })
            .options(options)
            .build();

        self.collection(collection)
            .create_index(model)
            .await
            .map_err(|e| AppError::Database(e.to_string()))?;

        tracing::debug!("Ensured unique slug index on '{}'", collection);
        Ok(())
    }
}
