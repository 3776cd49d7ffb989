//! Reference-sequence passthrough.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use serde::Deserialize;

use varreg_refget::SequenceRepository;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct SequenceParams {
    pub start: Option<u64>,
    pub end: Option<u64>,
}

/// GET /sequence/{accession} - fetch (a substring of) a sequence.
pub async fn get_sequence(
    State(state): State<AppState>,
    Path(accession): Path<String>,
    Query(params): Query<SequenceParams>,
) -> Result<String, ApiError> {
    let repo = Arc::clone(state.registry.data_proxy());
    let sequence = tokio::task::spawn_blocking(move || -> Result<String, ApiError> {
        let accession = repo.translate_identifier(&accession)?;
        let end = match params.end {
            Some(end) => end,
            None => repo.sequence_length(&accession)?,
        };
        Ok(repo.get_sequence(&accession, params.start.unwrap_or(0), end)?)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(sequence)
}
