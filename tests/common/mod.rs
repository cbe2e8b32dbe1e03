use std::sync::Arc;

use axum::Router;

use quire::app::{router, AppState};
use quire::content::collections::default_collections;
use quire::content::hierarchy::HierarchyConfig;
use quire::content::service::DocumentService;
use quire::content::slug::SlugConfig;
use quire::db::memory::InMemoryDocumentStore;

/// In-process application wired to an in-memory store.
pub struct TestEnv {
    pub router: Router,
    pub store: Arc<InMemoryDocumentStore>,
    pub service: Arc<DocumentService>,
}

impl TestEnv {
    /// Build an environment with default slug and hierarchy settings.
    pub fn start() -> Self {
        Self::with_config(SlugConfig::default(), HierarchyConfig::default())
    }

    pub fn with_config(slug: SlugConfig, hierarchy: HierarchyConfig) -> Self {
        let store = Arc::new(InMemoryDocumentStore::new());
        let service = Arc::new(DocumentService::new(
            store.clone(),
            default_collections(),
            slug,
            hierarchy,
        ));
        let router = router(AppState {
            service: service.clone(),
        });

        Self {
            router,
            store,
            service,
        }
    }

    /// Build an `axum_test::TestServer` from this environment's router.
    pub fn server(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .expect_success_by_default()
            .build(self.router.clone())
    }

    /// Build a `TestServer` that does NOT expect success by default (for error tests).
    pub fn server_permissive(&self) -> axum_test::TestServer {
        axum_test::TestServer::builder()
            .build(self.router.clone())
    }

    /// Helper: create a document via the API.
    pub async fn create(
        &self,
        server: &axum_test::TestServer,
        collection: &str,
        body: serde_json::Value,
    ) -> axum_test::TestResponse {
        server
            .post(&format!("/api/v1/{collection}"))
            .json(&body)
            .await
    }

    /// Helper: create a page with a fixed id and optional parent.
    pub async fn create_page(
        &self,
        server: &axum_test::TestServer,
        id: &str,
        parent: Option<&str>,
    ) -> axum_test::TestResponse {
        self.create(
            server,
            "pages",
            serde_json::json!({
                "id": id,
                "title": format!("Page {id}"),
                "parent": parent,
            }),
        )
        .await
    }
}
