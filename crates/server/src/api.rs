//! JSON handlers of the highlight API.

use crate::AppState;
use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use highlight_model::{CreateHighlightRequest, DocumentRef, Highlight, HighlightId};
use highlight_storage::StorageError;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Deserialize)]
pub(crate) struct HighlightQuery {
    #[serde(rename = "pdfUrl")]
    pdf_url: Option<String>,
}

#[derive(Debug, Serialize)]
pub(crate) struct Success {
    success: bool,
}

#[derive(Debug)]
pub(crate) struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn bad_request(message: impl Into<String>) -> Self {
        Self { status: StatusCode::BAD_REQUEST, message: message.into() }
    }
}

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        let status = match err {
            StorageError::Duplicate(_) => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        if status.is_server_error() {
            tracing::error!(%err, "storage failure");
        }
        Self { status, message: err.to_string() }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(serde_json::json!({ "error": self.message }))).into_response()
    }
}

pub(crate) async fn list_documents(
    State(state): State<Arc<AppState>>,
) -> Result<Json<Vec<String>>, ApiError> {
    Ok(Json(state.library.list_pdfs()?))
}

pub(crate) async fn list_highlights(
    State(state): State<Arc<AppState>>,
    Query(query): Query<HighlightQuery>,
) -> Result<Json<Vec<Highlight>>, ApiError> {
    let Some(pdf_url) = query.pdf_url.filter(|url| !url.is_empty()) else {
        return Ok(Json(Vec::new()));
    };

    let highlights = state.db().list_for_document(&DocumentRef::new(pdf_url))?;
    Ok(Json(highlights))
}

pub(crate) async fn create_highlight(
    State(state): State<Arc<AppState>>,
    body: Bytes,
) -> Result<Json<Success>, ApiError> {
    let request: CreateHighlightRequest = serde_json::from_slice(&body)
        .map_err(|err| ApiError::bad_request(format!("invalid request body: {err}")))?;
    let highlight = request.into_highlight().map_err(|err| ApiError::bad_request(err.to_string()))?;

    state.db().insert(&highlight)?;
    tracing::info!(id = %highlight.id(), document = %highlight.document(), "highlight stored");
    Ok(Json(Success { success: true }))
}

pub(crate) async fn delete_highlight(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<Success>, ApiError> {
    let removed = state.db().delete(&HighlightId::new(id))?;
    tracing::debug!(removed, "delete handled");
    Ok(Json(Success { success: true }))
}
