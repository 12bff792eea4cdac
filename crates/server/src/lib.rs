//! Remote highlight store: a small JSON API over SQLite, plus the PDF files
//! the viewer opens.
//!
//! | Route                        | Behaviour                                       |
//! |------------------------------|-------------------------------------------------|
//! | `GET /api/pdfs`              | `.pdf` file names in the document directory     |
//! | `GET /api/highlights?pdfUrl` | highlights of one document, empty when unknown  |
//! | `POST /api/highlights`       | store a new highlight; `400`/`409` on rejection |
//! | `DELETE /api/highlights/{id}`| remove a highlight; always `{success: true}`    |
//! | `GET /pdf/*`                 | static document files                           |

mod api;
pub mod config;

pub use config::ServerConfig;

use axum::http::{header, HeaderValue, Method};
use axum::routing::{delete, get};
use axum::Router;
use highlight_storage::{DocumentLibrary, HighlightDb, StorageError};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;

#[derive(Debug, thiserror::Error)]
pub enum ServerError {
    #[error("invalid CORS origin: {0}")]
    InvalidOrigin(String),
    #[error(transparent)]
    Storage(#[from] StorageError),
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared by every request handler.
#[derive(Debug)]
pub struct AppState {
    db: Mutex<HighlightDb>,
    library: DocumentLibrary,
}

impl AppState {
    pub fn new(db: HighlightDb, library: DocumentLibrary) -> Self {
        Self { db: Mutex::new(db), library }
    }

    pub fn open(config: &ServerConfig) -> Result<Self, ServerError> {
        let db = HighlightDb::open(&config.database)?;
        Ok(Self::new(db, DocumentLibrary::with_root(&config.pdf_dir)))
    }

    fn db(&self) -> MutexGuard<'_, HighlightDb> {
        self.db.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

pub fn router(state: Arc<AppState>, config: &ServerConfig) -> Result<Router, ServerError> {
    let origin = HeaderValue::from_str(&config.cors_origin)
        .map_err(|_| ServerError::InvalidOrigin(config.cors_origin.clone()))?;

    let cors = CorsLayer::new()
        .allow_origin(origin)
        .allow_methods([Method::GET, Method::POST, Method::DELETE])
        .allow_headers([header::CONTENT_TYPE]);

    let pdf_dir = state.library.root().to_path_buf();

    Ok(Router::new()
        .route("/api/pdfs", get(api::list_documents))
        .route("/api/highlights", get(api::list_highlights).post(api::create_highlight))
        .route("/api/highlights/{id}", delete(api::delete_highlight))
        .nest_service("/pdf", ServeDir::new(pdf_dir))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state))
}

/// Serve on an already bound listener until the task is dropped.
pub async fn serve_listener(
    listener: tokio::net::TcpListener,
    state: Arc<AppState>,
    config: &ServerConfig,
) -> Result<(), ServerError> {
    let app = router(state, config)?;
    tracing::info!(addr = ?listener.local_addr().ok(), "highlight server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

pub async fn serve(config: ServerConfig) -> Result<(), ServerError> {
    let state = Arc::new(AppState::open(&config)?);
    tracing::info!(
        database = %config.database.display(),
        pdf_dir = %config.pdf_dir.display(),
        cors_origin = %config.cors_origin,
        "opened highlight store"
    );

    let listener = tokio::net::TcpListener::bind(config.bind).await?;
    serve_listener(listener, state, &config).await
}
