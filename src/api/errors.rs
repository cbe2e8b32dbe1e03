use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::error::AppError;

/// Converts AppError into a JSON HTTP response.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::Validation { message, .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, message.clone())
            }
            AppError::UniquenessViolation { .. } => (StatusCode::CONFLICT, self.to_string()),
            // Base slug is logged by the service.
            AppError::SlugConflict { .. } => (
                StatusCode::CONFLICT,
                "Could not save document, please try again".to_string(),
            ),
            AppError::Database(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Database error: {}", msg),
            ),
            AppError::Config(msg) | AppError::Internal(msg) => {
                (StatusCode::INTERNAL_SERVER_ERROR, msg.clone())
            }
        };

        let mut body = serde_json::json!({
            "error": message
        });
        if let AppError::Validation { field, .. } = &self {
            body["field"] = serde_json::Value::String(field.clone());
        }

        (status, axum::Json(body)).into_response()
    }
}
