//! Variation mappings.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use varreg_storage::VariationMapping;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct MappingRequest {
    pub dest_id: String,
    pub mapping_type: String,
}

fn mapping_json(m: &VariationMapping) -> Value {
    json!({
        "source_id": m.source_id,
        "dest_id": m.dest_id,
        "mapping_type": m.mapping_type,
    })
}

/// PUT /variation/{vrs_id}/mappings - add a directed mapping.
pub async fn put_mapping(
    State(state): State<AppState>,
    Path(vrs_id): Path<String>,
    Json(request): Json<MappingRequest>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let mapping = VariationMapping {
        source_id: vrs_id.clone(),
        dest_id: request.dest_id,
        mapping_type: request.mapping_type,
    };
    let stored = mapping.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        if !registry.contains(&mapping.source_id)? {
            return Err(ApiError::not_found(format!(
                "No object found for {}",
                mapping.source_id
            )));
        }
        registry.put_mapping(&mapping)?;
        Ok(())
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({ "mapping": mapping_json(&stored) })))
}

async fn list_mappings(
    state: AppState,
    vrs_id: String,
    mapping_type: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let mappings = tokio::task::spawn_blocking(move || {
        registry.get_object_mappings(&vrs_id, mapping_type.as_deref())
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    let mappings: Vec<Value> = mappings.iter().map(mapping_json).collect();
    Ok(Json(json!({ "mappings": mappings })))
}

/// GET /variation/{vrs_id}/mappings - all outgoing mappings.
pub async fn get_mappings(
    State(state): State<AppState>,
    Path(vrs_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    list_mappings(state, vrs_id, None).await
}

/// GET /variation/{vrs_id}/mappings/{mapping_type} - filtered by type.
pub async fn get_mappings_typed(
    State(state): State<AppState>,
    Path((vrs_id, mapping_type)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    list_mappings(state, vrs_id, Some(mapping_type)).await
}
