//! REST dispatcher (C8): the native HTTP surface in spec §6.
//!
//! Three routes: `GET /api/tool/{name}/` (discovery), `POST
//! /api/tool/{name}/invoke` (invocation), `GET /api/toolset/{name}/`
//! (scoped discovery). Errors are surfaced as non-200 status with
//! `{"error": "..."}`; successes as `{"result": ...}`.

use std::collections::HashMap;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Map, Value};
use tracing::error;

use toolhost_core::{pipeline, Context};

use crate::auth_service;
use crate::state::AppState;

/// Build the REST router, grounded on the teacher's layered-router
/// convention (trace layer applied by the caller in `main.rs`).
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/api/tool/{name}/", get(get_tool_manifest))
        .route("/api/tool/{name}/invoke", post(invoke_tool))
        .route("/api/toolset/{name}/", get(get_toolset_manifest))
        .with_state(state)
}

fn headers_to_map(headers: &HeaderMap) -> HashMap<String, String> {
    headers
        .iter()
        .filter_map(|(name, value)| {
            value
                .to_str()
                .ok()
                .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect()
}

async fn get_tool_manifest(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.tools.get(&name) {
        Some(tool) => {
            let mut body = Map::new();
            body.insert(
                name,
                serde_json::to_value(tool.manifest()).unwrap_or(Value::Null),
            );
            (StatusCode::OK, Json(Value::Object(body))).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("no tool named \"{name}\"")),
    }
}

async fn get_toolset_manifest(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
) -> Response {
    match state.toolsets.get(&name) {
        Some(toolset) => {
            let mut body = Map::new();
            for tool in toolset.tools() {
                body.insert(
                    tool.name.clone(),
                    serde_json::to_value(tool.manifest()).unwrap_or(Value::Null),
                );
            }
            (StatusCode::OK, Json(Value::Object(body))).into_response()
        }
        None => error_response(StatusCode::NOT_FOUND, format!("no toolset named \"{name}\"")),
    }
}

async fn invoke_tool(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let Some(tool) = state.tools.get(&name) else {
        return error_response(StatusCode::NOT_FOUND, format!("no tool named \"{name}\""));
    };

    let input = if body.is_empty() {
        Map::new()
    } else {
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Object(map)) => map,
            Ok(Value::Null) => Map::new(),
            Ok(_) => {
                return error_response(
                    StatusCode::BAD_REQUEST,
                    "request body must be a JSON object".to_string(),
                );
            }
            Err(e) => {
                return error_response(StatusCode::BAD_REQUEST, format!("invalid JSON body: {e}"));
            }
        }
    };

    let header_map = headers_to_map(&headers);
    let (claims, verified) = auth_service::verify_request(&state.auth_services, &header_map);

    let ctx = Context::new(state.next_request_id());
    match pipeline::invoke(&ctx, tool, &input, &claims, &verified).await {
        Ok(result) => {
            (StatusCode::OK, Json(json!({ "result": result.into_display_string() }))).into_response()
        }
        Err(e) => {
            error!(request_id = ctx.request_id(), tool = %name, error = %e, "invocation failed");
            let status = StatusCode::from_u16(e.to_http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
            error_response(status, e.to_string())
        }
    }
}

fn error_response(status: StatusCode, message: String) -> Response {
    (status, Json(json!({ "error": message }))).into_response()
}
