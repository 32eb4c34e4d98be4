//! HTTP front end for the power-line bridge.
//!
//! Two routes cover the whole surface: `GET /api/read` hands out whatever
//! the device produced since the last call, `POST /api/write` pushes raw
//! bytes at it. Everything device-side lives behind [`Backend`], so the
//! same router serves the serial driver and the radio stub.

pub mod api;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    routing::{get, post},
};
use tracing::info;
use x10_driver::Backend;

/// Build the API router over the active backend.
pub fn router(backend: Arc<Backend>) -> Router {
    Router::new()
        .route("/api/read", get(api::read_bytes))
        .route("/api/write", post(api::write_bytes))
        .with_state(backend)
}

/// Bind the listen address and serve until the process is torn down.
pub async fn serve(listen: SocketAddr, backend: Backend) -> x10_core::Result<()> {
    let app = router(Arc::new(backend));
    let listener = tokio::net::TcpListener::bind(listen).await?;
    info!("HTTP front end listening on http://{}", listen);
    axum::serve(listener, app).await?;
    Ok(())
}
