//! HTTP surface for docshelf.
//!
//! Serves a read-only view of the index root: directories become JSON
//! listings, files are streamed inline or as downloads, and `/api/*` exposes
//! the document index.
//!
//! | route               | handler                               |
//! |---------------------|---------------------------------------|
//! | `GET /api/search`   | prefix search, `?q=<query>`           |
//! | `GET /api/stats`    | index statistics                      |
//! | `POST /api/refresh` | force a refresh and wait for it       |
//! | `GET /` `GET /{*p}` | directory listing or file contents    |

mod api;
mod browse;
mod error;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use axum::Router;
use axum::http::StatusCode;
use axum::routing::{get, post};
use tokio_util::sync::CancellationToken;
use tracing::info;

use docshelf_index::DocumentIndex;

pub use browse::{Crumb, DirectoryListing, EntryInfo};
pub use error::ServeError;

/// Shared state handed to every handler.
#[derive(Debug, Clone)]
pub struct AppState {
    index: Arc<DocumentIndex>,
    root: PathBuf,
}

impl AppState {
    /// Create state serving `root`, which is canonicalized here.
    pub fn new(index: Arc<DocumentIndex>, root: impl AsRef<Path>) -> std::io::Result<Self> {
        let root = root.as_ref().canonicalize()?;
        Ok(Self { index, root })
    }

    /// The index queried by the API routes.
    pub fn index(&self) -> &Arc<DocumentIndex> {
        &self.index
    }

    /// Canonical root of the served tree.
    pub fn root(&self) -> &Path {
        &self.root
    }
}

/// Build the application router.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/api/search", get(api::search))
        .route("/api/stats", get(api::stats))
        .route("/api/refresh", post(api::refresh))
        .route("/favicon.ico", get(|| async { StatusCode::NO_CONTENT }))
        .route("/", get(browse::browse_root))
        .route("/{*path}", get(browse::browse))
        .with_state(Arc::new(state))
}

/// Bind `addr` and serve until `shutdown` is cancelled.
pub async fn serve(
    addr: SocketAddr,
    state: AppState,
    shutdown: CancellationToken,
) -> std::io::Result<()> {
    let listener = tokio::net::TcpListener::bind(addr).await?;
    info!("Listening on http://{}", listener.local_addr()?);

    axum::serve(listener, router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
}
