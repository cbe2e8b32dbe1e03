use std::sync::Arc;

use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::api::documents::{
    create_document_handler, get_document_handler, update_document_handler,
};
use crate::content::service::DocumentService;

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub service: Arc<DocumentService>,
}

/// Build the API router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(|| async { "ok" }))
        .route("/api/v1/{collection}", post(create_document_handler))
        .route(
            "/api/v1/{collection}/{id}",
            get(get_document_handler).patch(update_document_handler),
        )
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
