//! # HTTP surface
//!
//! axum application exposing the registry: variation registration and
//! dereferencing, overlap search, mappings and annotations, bulk VCF
//! (synchronous and asynchronous with run polling), sequence passthrough,
//! summary statistics, and GA4GH service-info.

pub mod error;
pub mod handlers;
pub mod router;
pub mod state;

pub use error::ApiError;
pub use router::build_router;
pub use state::{build_state, AppState, AsyncQueue};

use std::net::SocketAddr;

/// Bind and serve until shutdown.
pub async fn serve(addr: SocketAddr, state: AppState) -> anyhow::Result<()> {
    let app = build_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "listening");
    axum::serve(listener, app).await?;
    Ok(())
}
