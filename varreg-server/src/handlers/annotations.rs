//! Object annotations.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::response::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use varreg_storage::Annotation;

use crate::error::ApiError;
use crate::state::AppState;

#[derive(Debug, Deserialize)]
pub struct AnnotationRequest {
    pub annotation_type: String,
    pub annotation: Value,
}

fn annotation_json(a: &Annotation) -> Value {
    json!({
        "object_id": a.object_id,
        "annotation_type": a.annotation_type,
        "annotation": a.annotation,
    })
}

/// POST /variation/{vrs_id}/annotations - attach an annotation.
pub async fn post_annotation(
    State(state): State<AppState>,
    Path(vrs_id): Path<String>,
    Json(request): Json<AnnotationRequest>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let annotation = Annotation {
        object_id: vrs_id,
        annotation_type: request.annotation_type,
        annotation: request.annotation,
    };
    let stored = annotation.clone();
    tokio::task::spawn_blocking(move || -> Result<(), ApiError> {
        if !registry.contains(&annotation.object_id)? {
            return Err(ApiError::not_found(format!(
                "No object found for {}",
                annotation.object_id
            )));
        }
        registry.put_annotation(&annotation)?;
        Ok(())
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok(Json(json!({ "annotation": annotation_json(&stored) })))
}

async fn list_annotations(
    state: AppState,
    vrs_id: String,
    annotation_type: Option<String>,
) -> Result<Json<Value>, ApiError> {
    let registry = Arc::clone(&state.registry);
    let annotations = tokio::task::spawn_blocking(move || {
        registry.get_object_annotations(&vrs_id, annotation_type.as_deref())
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    let annotations: Vec<Value> = annotations.iter().map(annotation_json).collect();
    Ok(Json(json!({ "annotations": annotations })))
}

/// GET /variation/{vrs_id}/annotations - all annotations on an object.
pub async fn get_annotations(
    State(state): State<AppState>,
    Path(vrs_id): Path<String>,
) -> Result<Json<Value>, ApiError> {
    list_annotations(state, vrs_id, None).await
}

/// GET /variation/{vrs_id}/annotations/{annotation_type}.
pub async fn get_annotations_typed(
    State(state): State<AppState>,
    Path((vrs_id, annotation_type)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    list_annotations(state, vrs_id, Some(annotation_type)).await
}
