use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;

use crate::app::AppState;
use crate::content::hierarchy::ParentCache;
use crate::db::models::{Document, DocumentId, DocumentPatch, NewDocument};
use crate::error::AppError;

/// Axum handler for `POST /api/v1/{collection}`.
pub async fn create_document_handler(
    State(state): State<AppState>,
    Path(collection): Path<String>,
    Json(input): Json<NewDocument>,
) -> Result<(StatusCode, Json<Document>), AppError> {
    let mut cache = ParentCache::new();
    let doc = state.service.create(&mut cache, &collection, input).await?;
    Ok((StatusCode::CREATED, Json(doc)))
}

/// Axum handler for `GET /api/v1/{collection}/{id}`.
pub async fn get_document_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
) -> Result<Json<Document>, AppError> {
    let doc = state
        .service
        .find(&collection, &DocumentId::from_path(&id))
        .await?;
    Ok(Json(doc))
}

/// Axum handler for `PATCH /api/v1/{collection}/{id}`.
pub async fn update_document_handler(
    State(state): State<AppState>,
    Path((collection, id)): Path<(String, String)>,
    Json(patch): Json<DocumentPatch>,
) -> Result<Json<Document>, AppError> {
    let mut cache = ParentCache::new();
    let doc = state
        .service
        .update(&mut cache, &collection, &DocumentId::from_path(&id), patch)
        .await?;
    Ok(Json(doc))
}
