//! Variation registration and dereferencing.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct VariationRequest {
    pub definition: String,
}

/// PUT /variation - register a variant from a definition string.
pub async fn put_variation(
    State(state): State<AppState>,
    Json(request): Json<VariationRequest>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let registered = tokio::task::spawn_blocking(move || {
        registry.register_definition(&request.definition)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({
        "object_id": registered.object_id,
        "object": registered.object.to_wire_json(),
        "messages": registered.messages,
    })))
}

/// GET /variation/{vrs_id} - dereference an identifier.
pub async fn get_variation(
    State(state): State<AppState>,
    Path(vrs_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let id = vrs_id.clone();
    let object = tokio::task::spawn_blocking(move || registry.get_object(&id))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    match object {
        Some(object) => Ok(Json(json!({ "data": object.to_wire_json() }))),
        None => Err(ApiError::not_found(format!("No object found for {vrs_id}"))),
    }
}
