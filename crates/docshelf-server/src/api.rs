//! Index query and refresh endpoints.

use std::path::PathBuf;
use std::sync::Arc;

use axum::Json;
use axum::extract::{Query, State};
use serde::{Deserialize, Serialize};

use docshelf_core::{IndexStats, SearchResult};
use docshelf_index::{RefreshOutcome, RefreshState};

use crate::AppState;
use crate::error::ServeError;

#[derive(Debug, Deserialize)]
pub(crate) struct SearchParams {
    #[serde(default)]
    q: String,
}

/// Stats plus the live refresh phase.
#[derive(Debug, Serialize)]
pub(crate) struct StatsResponse {
    #[serde(flatten)]
    stats: IndexStats,
    refresh_state: RefreshState,
    root: PathBuf,
}

pub(crate) async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Json<SearchResult> {
    Json(state.index().search(&params.q))
}

pub(crate) async fn stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(StatsResponse {
        stats: state.index().stats(),
        refresh_state: state.index().refresh_state(),
        root: state.root().to_path_buf(),
    })
}

pub(crate) async fn refresh(
    State(state): State<Arc<AppState>>,
) -> Result<Json<RefreshOutcome>, ServeError> {
    let outcome = state.index().force_refresh(state.root()).await?;
    Ok(Json(outcome))
}
