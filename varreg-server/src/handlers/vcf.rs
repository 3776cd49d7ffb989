//! Bulk VCF ingestion: synchronous annotate-and-return, asynchronous
//! submit-and-poll.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, Query, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Json, Response};
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use varreg_queue::{RunStatus, VcfTask};
use varreg_vcf::{AnnotateOptions, VcfRegistrar};

use crate::error::ApiError;
use crate::state::AppState;

/// Advisory throughput estimate for Retry-After, in rows per second.
const ANNOTATION_ROWS_PER_SEC: u64 = 333;

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
pub struct VcfParams {
    #[serde(default = "default_true")]
    pub for_ref: bool,
    #[serde(default)]
    pub enable_async: bool,
    /// Accepted alias for `enable_async`.
    #[serde(default)]
    pub run_async: bool,
    pub run_id: Option<String>,
}

/// PUT /vcf - register all REF/ALT alleles of the uploaded file and
/// return (or queue) the annotated copy.
pub async fn put_vcf(
    State(state): State<AppState>,
    Query(params): Query<VcfParams>,
    body: Bytes,
) -> Result<Response, ApiError> {
    if params.enable_async || params.run_async {
        submit_async(state, params, body).await
    } else {
        annotate_sync(state, params, body).await
    }
}

async fn annotate_sync(
    state: AppState,
    params: VcfParams,
    body: Bytes,
) -> Result<Response, ApiError> {
    // One batch scope per registry: serialize synchronous ingests.
    let _guard = state.vcf_lock.lock().await;

    let registry = Arc::clone(&state.registry);
    let options = AnnotateOptions {
        for_ref: params.for_ref,
        flush_on_exit: state.config.flush_on_batchctx_exit,
        deadline: None,
    };

    let annotated = tokio::task::spawn_blocking(move || -> Result<String, ApiError> {
        let dir = tempfile::tempdir()?;
        let input_path = dir.path().join("input.vcf");
        let output_path = dir.path().join("output.vcf");
        std::fs::write(&input_path, &body)?;
        VcfRegistrar::new(&registry).annotate(&input_path, &output_path, &options)?;
        Ok(std::fs::read_to_string(&output_path)?)
    })
    .await
    .map_err(|e| ApiError::internal(e.to_string()))??;

    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
        annotated,
    )
        .into_response())
}

/// Client-supplied run ids become file names in the shared working
/// directory; restrict them accordingly.
fn validate_run_id(run_id: &str) -> Result<(), ApiError> {
    let ok = !run_id.is_empty()
        && run_id.len() <= 128
        && run_id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_' || b == b'.');
    if ok {
        Ok(())
    } else {
        Err(ApiError::bad_request(format!("invalid run_id: {run_id:?}")))
    }
}

async fn submit_async(
    state: AppState,
    params: VcfParams,
    body: Bytes,
) -> Result<Response, ApiError> {
    let Some(queue) = state.queue.as_ref() else {
        return Err(ApiError::bad_request(
            "Asynchronous VCF annotation is not enabled",
        ));
    };

    let run_id = match params.run_id {
        Some(run_id) => {
            validate_run_id(&run_id)?;
            run_id
        }
        None => Uuid::new_v4().to_string(),
    };

    let input_path = queue.work_dir.join(format!("{run_id}.vcf"));
    let output_path = queue.work_dir.join(format!("{run_id}.annotated.vcf"));
    let site_count = body.iter().filter(|&&b| b == b'\n').count() as u64;

    queue.backend.create(&run_id, &input_path, &output_path)?;

    {
        let input_path = input_path.clone();
        tokio::task::spawn_blocking(move || std::fs::write(&input_path, &body))
            .await
            .map_err(|e| ApiError::internal(e.to_string()))??;
    }

    queue.broker.submit(VcfTask {
        run_id: run_id.clone(),
        input_path,
        output_path,
        for_ref: params.for_ref,
    })?;
    tracing::info!(run_id = %run_id, sites = site_count, "async run submitted");

    let slots = site_count.max(1) * if params.for_ref { 2 } else { 1 };
    let retry_after = (slots / ANNOTATION_ROWS_PER_SEC).max(1);

    Ok((
        StatusCode::ACCEPTED,
        [
            (header::LOCATION, format!("/vcf/{run_id}")),
            (header::RETRY_AFTER, retry_after.to_string()),
        ],
        Json(json!({
            "run_id": run_id,
            "status": RunStatus::Pending.as_str(),
            "status_message": format!("Run submitted. Check status at /vcf/{run_id}"),
        })),
    )
        .into_response())
}

/// GET /vcf/{run_id} - poll an asynchronous run.
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<String>,
) -> Result<Response, ApiError> {
    let Some(queue) = state.queue.as_ref() else {
        return Err(ApiError::not_found(format!("Unknown run: {run_id}")));
    };

    let Some(record) = queue.backend.get(&run_id)? else {
        return Err(ApiError::not_found(format!("Unknown run: {run_id}")));
    };

    match record.observed_status(state.config.hard_time_limit, Utc::now()) {
        RunStatus::Pending | RunStatus::Running => Ok(pending_response(&record.run_id)),
        RunStatus::Failed => {
            let status = StatusCode::from_u16(state.config.failure_status_code)
                .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            let message = record
                .error_message
                .unwrap_or_else(|| "run failed".to_string());
            Ok((status, Json(json!({ "error": message }))).into_response())
        }
        RunStatus::Completed => {
            let output_path = record.output_path.clone();
            let contents =
                tokio::task::spawn_blocking(move || std::fs::read_to_string(&output_path))
                    .await
                    .map_err(|e| ApiError::internal(e.to_string()))?;
            match contents {
                Ok(annotated) => Ok((
                    StatusCode::OK,
                    [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
                    annotated,
                )
                    .into_response()),
                // Output not visible yet (shared filesystem lag): still
                // pending from the client's point of view.
                Err(_) => Ok(pending_response(&record.run_id)),
            }
        }
    }
}

fn pending_response(run_id: &str) -> Response {
    (
        StatusCode::ACCEPTED,
        [(header::RETRY_AFTER, "5".to_string())],
        Json(json!({
            "run_id": run_id,
            "status": RunStatus::Pending.as_str(),
            "status_message": format!("Run not complete. Check status at /vcf/{run_id}"),
        })),
    )
        .into_response()
}
