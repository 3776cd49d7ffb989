//! Service metadata and summary statistics.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde_json::{json, Value};

use varreg_storage::VariationKind;

use crate::error::ApiError;
use crate::state::AppState;

/// GET /service-info - GA4GH service-info document.
pub async fn service_info() -> Json<Value> {
    Json(json!({
        "id": "org.varreg",
        "name": "varreg",
        "type": {
            "group": "org.varreg",
            "artifact": "varreg",
            "version": env!("CARGO_PKG_VERSION"),
        },
        "description": "Register, retrieve, and search GA4GH VRS variation",
        "organization": {
            "name": "varreg",
            "url": "https://github.com/databio/varreg",
        },
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

/// GET /stats/{variation_type} - registered-variation counts.
pub async fn stats(
    State(state): State<AppState>,
    Path(variation_type): Path<String>,
) -> Result<Json<Value>, ApiError> {
    let kind = VariationKind::parse(&variation_type).ok_or_else(|| {
        ApiError::bad_request(format!(
            "unknown variation type {variation_type:?} (expected substitution, insertion, deletion, or all)"
        ))
    })?;

    let registry = Arc::clone(&state.registry);
    let count = tokio::task::spawn_blocking(move || registry.variation_count(kind))
        .await
        .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({
        "variation_type": kind.as_str(),
        "count": count,
    })))
}
