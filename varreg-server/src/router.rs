//! Route table.
//!
//! axum 0.8 `/{param}` path syntax; TraceLayer provides request-level
//! logging.

use axum::routing::{get, post, put};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::handlers;
use crate::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/variation", put(handlers::variation::put_variation))
        .route("/variation/{vrs_id}", get(handlers::variation::get_variation))
        .route(
            "/variation/{vrs_id}/mappings",
            put(handlers::mappings::put_mapping).get(handlers::mappings::get_mappings),
        )
        .route(
            "/variation/{vrs_id}/mappings/{mapping_type}",
            get(handlers::mappings::get_mappings_typed),
        )
        .route(
            "/variation/{vrs_id}/annotations",
            post(handlers::annotations::post_annotation).get(handlers::annotations::get_annotations),
        )
        .route(
            "/variation/{vrs_id}/annotations/{annotation_type}",
            get(handlers::annotations::get_annotations_typed),
        )
        .route("/search", get(handlers::search::search))
        .route("/vcf", put(handlers::vcf::put_vcf))
        .route("/vcf/{run_id}", get(handlers::vcf::get_run))
        .route("/sequence/{accession}", get(handlers::sequence::get_sequence))
        .route("/stats/{variation_type}", get(handlers::info::stats))
        .route("/service-info", get(handlers::info::service_info))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
