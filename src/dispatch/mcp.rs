//! MCP dispatcher (C9): the JSON-RPC 2.0 subset `tools/list` / `tools/call`
//! in spec §4.8/§6, reusing C5–C7 via [`pipeline::invoke`] and the tool's
//! cached manifests.
//!
//! Exposed over both transports the spec allows: an axum route for
//! Streamable-HTTP-style POST delivery (`router`), and a line-delimited
//! stdio loop (`serve_stdio`) for agents that launch this server as a
//! subprocess.

use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tracing::error;

use toolhost_core::error::rpc_codes;
use toolhost_core::{pipeline, Context};

use crate::auth_service;
use crate::protocol::{JsonRpcRequest, JsonRpcResponse, ToolsCallParams};
use crate::state::AppState;

/// Build the `/mcp` HTTP route.
#[must_use]
pub fn router(state: Arc<AppState>) -> Router {
    Router::new().route("/mcp", post(handle_http)).with_state(state)
}

async fn handle_http(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: axum::body::Bytes,
) -> Response {
    let header_map: HashMap<String, String> = headers
        .iter()
        .filter_map(|(n, v)| v.to_str().ok().map(|v| (n.as_str().to_string(), v.to_string())))
        .collect();

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return Json(JsonRpcResponse::error(None, rpc_codes::PARSE_ERROR, e.to_string()))
                .into_response();
        }
    };

    let response = handle_request(&state, &header_map, request).await;
    Json(response).into_response()
}

/// Run a stdio JSON-RPC loop: one request per line on stdin, one response
/// per line on stdout. No session state is kept between lines (§4.8
/// "state is minimal").
pub async fn serve_stdio(state: Arc<AppState>) -> std::io::Result<()> {
    let stdin = tokio::io::stdin();
    let mut lines = BufReader::new(stdin).lines();
    let mut stdout = tokio::io::stdout();

    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let response = match serde_json::from_str::<JsonRpcRequest>(&line) {
            Ok(request) => handle_request(&state, &HashMap::new(), request).await,
            Err(e) => JsonRpcResponse::error(None, rpc_codes::PARSE_ERROR, e.to_string()),
        };
        let mut out = serde_json::to_vec(&response).unwrap_or_default();
        out.push(b'\n');
        stdout.write_all(&out).await?;
        stdout.flush().await?;
    }
    Ok(())
}

async fn handle_request(
    state: &AppState,
    headers: &HashMap<String, String>,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    if request.jsonrpc != "2.0" {
        return JsonRpcResponse::error(request.id, rpc_codes::INVALID_REQUEST, "jsonrpc must be \"2.0\"");
    }

    match request.method.as_str() {
        "tools/list" => handle_tools_list(state, request),
        "tools/call" => handle_tools_call(state, headers, request).await,
        other => JsonRpcResponse::error(
            request.id,
            rpc_codes::METHOD_NOT_FOUND,
            format!("unsupported method \"{other}\""),
        ),
    }
}

fn handle_tools_list(state: &AppState, request: JsonRpcRequest) -> JsonRpcResponse {
    let Some(id) = request.id else {
        return JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "tools/list requires an id");
    };

    let toolset_name = request
        .params
        .as_ref()
        .and_then(|p| p.get("toolset"))
        .and_then(Value::as_str);

    let tools: Vec<Value> = match toolset_name {
        Some(name) => match state.toolsets.get(name) {
            Some(toolset) => toolset
                .tools()
                .iter()
                .map(|t| serde_json::to_value(t.mcp_schema()).unwrap_or(Value::Null))
                .collect(),
            None => {
                return JsonRpcResponse::error(
                    Some(id),
                    rpc_codes::INVALID_PARAMS,
                    format!("no toolset named \"{name}\""),
                );
            }
        },
        None => state
            .tools
            .values()
            .map(|t| serde_json::to_value(t.mcp_schema()).unwrap_or(Value::Null))
            .collect(),
    };

    JsonRpcResponse::success(id, json!({ "tools": tools }))
}

async fn handle_tools_call(
    state: &AppState,
    headers: &HashMap<String, String>,
    request: JsonRpcRequest,
) -> JsonRpcResponse {
    let Some(id) = request.id else {
        return JsonRpcResponse::error(None, rpc_codes::INVALID_REQUEST, "tools/call requires an id");
    };

    let Some(params) = request.params else {
        return JsonRpcResponse::error(Some(id), rpc_codes::INVALID_REQUEST, "missing params");
    };
    let params: ToolsCallParams = match serde_json::from_value(params) {
        Ok(p) => p,
        Err(e) => {
            return JsonRpcResponse::error(Some(id), rpc_codes::INVALID_REQUEST, e.to_string());
        }
    };

    let Some(tool) = state.tools.get(&params.name) else {
        return JsonRpcResponse::error(
            Some(id),
            rpc_codes::INVALID_PARAMS,
            format!("no tool named \"{}\"", params.name),
        );
    };

    let input = match params.arguments {
        Value::Object(map) => map,
        Value::Null => serde_json::Map::new(),
        _ => {
            return JsonRpcResponse::error(Some(id), rpc_codes::INVALID_REQUEST, "arguments must be an object");
        }
    };

    let (claims, verified) = auth_service::verify_request(&state.auth_services, headers);
    let ctx = Context::new(format!("mcp-{}", id));

    match pipeline::invoke(&ctx, tool, &input, &claims, &verified).await {
        Ok(result) => JsonRpcResponse::success(id, text_content(&result.into_display_string(), false)),
        Err(e) if e.is_invocation_failure() => {
            error!(request_id = ctx.request_id(), tool = %params.name, error = %e, "tool invocation failed");
            JsonRpcResponse::success(id, text_content(&e.to_string(), true))
        }
        Err(e) => JsonRpcResponse::error(Some(id), e.to_rpc_code(), e.to_string()),
    }
}

fn text_content(text: &str, is_error: bool) -> Value {
    let mut envelope = serde_json::Map::new();
    envelope.insert(
        "content".to_string(),
        json!([{ "type": "text", "text": text }]),
    );
    if is_error {
        envelope.insert("isError".to_string(), Value::Bool(true));
    }
    Value::Object(envelope)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_content_wraps_plain_text() {
        let v = text_content("hello", false);
        assert_eq!(v["content"][0]["type"], "text");
        assert_eq!(v["content"][0]["text"], "hello");
        assert!(v.get("isError").is_none());
    }

    #[test]
    fn text_content_sets_is_error() {
        let v = text_content("boom", true);
        assert_eq!(v["isError"], true);
    }
}
