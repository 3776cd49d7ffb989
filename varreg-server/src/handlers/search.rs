//! Overlap-range search.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub accession: String,
    pub start: u64,
    pub end: u64,
}

/// GET /search - all Alleles intersecting `[start, end)` on an accession.
pub async fn search(
    State(state): State<AppState>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let alleles = tokio::task::spawn_blocking(move || {
        registry.search_variations(&params.accession, params.start, params.end)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    let variations: Vec<Value> = alleles.iter().map(|a| a.to_wire_json()).collect();
    Ok(Json(json!({ "variations": variations })))
}
