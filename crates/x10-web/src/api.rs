//! The two JSON endpoints.

use std::sync::Arc;

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Deserialize;
use serde_json::json;
use tracing::warn;
use x10_core::Error;
use x10_driver::{Backend, X10Controller};

/// Body accepted by `POST /api/write`. Every field is a decimal
/// string-encoded byte.
#[derive(Debug, Deserialize)]
pub struct WriteRequest {
    house: String,
    unit: String,
    command: String,
}

impl WriteRequest {
    fn decode(&self) -> Option<[u8; 3]> {
        Some([
            parse_byte(&self.house)?,
            parse_byte(&self.unit)?,
            parse_byte(&self.command)?,
        ])
    }
}

fn parse_byte(field: &str) -> Option<u8> {
    field.trim().parse().ok()
}

/// `GET /api/read`: drain the device read buffer into an ASCII string.
/// Bytes outside the ASCII range decode as `?`.
pub async fn read_bytes(State(backend): State<Arc<Backend>>) -> Response {
    match backend.get_bytes().await {
        Ok(bytes) => {
            let data: String = bytes
                .iter()
                .map(|byte| if byte.is_ascii() { *byte as char } else { '?' })
                .collect();
            Json(json!({ "data": data })).into_response()
        }
        Err(err) => failed(&err, "read"),
    }
}

/// `POST /api/write`: forward three raw bytes to the device. The body is
/// parsed by hand so every malformed shape gets the same bare 400.
pub async fn write_bytes(State(backend): State<Arc<Backend>>, body: Bytes) -> Response {
    let Ok(request) = serde_json::from_slice::<WriteRequest>(&body) else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    let Some(message) = request.decode() else {
        return StatusCode::BAD_REQUEST.into_response();
    };
    match backend.write_bytes(&message).await {
        Ok(()) => Json(json!({})).into_response(),
        Err(err) => failed(&err, "write"),
    }
}

/// Client errors get 400, everything else 500. Bodies stay empty; device
/// traffic never reaches the caller.
fn failed(err: &Error, operation: &str) -> Response {
    warn!("API {} request failed: {}", operation, err);
    match err {
        Error::InvalidArgument(_) => StatusCode::BAD_REQUEST.into_response(),
        _ => StatusCode::INTERNAL_SERVER_ERROR.into_response(),
    }
}
