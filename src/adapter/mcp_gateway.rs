//! Reference JSON-RPC gateway-proxy adapter: the third reference adapter
//! family, standing in for the graph/document/key-value backends the
//! invocation pipeline spec describes generically ("pass named parameters;
//! return the native row/record stream mapped to the same map shape as
//! SQL"). A tool of this kind forwards its resolved data parameters as the
//! `arguments` of a `tools/call` request against one remote tool on an
//! upstream MCP server, unwraps the upstream `TextContent` envelope, and
//! reshapes it into the same `{column -> value}` row sequence the SQL
//! family returns (see [`shape_call_result`]).

use std::any::Any;
use std::collections::HashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Map, Value};
use tracing::debug;

use toolhost_core::context::Context;
use toolhost_core::error::{Error, Result};
use toolhost_core::param::{ParamValues, Parameter};
use toolhost_core::source::{Source, SourceFactory, SourceMap};
use toolhost_core::tool::{InvokeResult, Tool, ToolFactory, ToolInvoker};

/// An upstream MCP server reachable over HTTP JSON-RPC, shared by every
/// `mcp-proxy` tool bound to it.
pub struct McpGatewaySource {
    name: String,
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    next_id: Arc<AtomicI64>,
}

impl Source for McpGatewaySource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "mcp-gateway"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct McpGatewaySourceConfig {
    url: String,
    #[serde(default)]
    headers: HashMap<String, String>,
}

/// Builds [`McpGatewaySource`]s from `{url, headers?}` blocks.
pub struct McpGatewaySourceFactory;

#[async_trait]
impl SourceFactory for McpGatewaySourceFactory {
    fn kind(&self) -> &'static str {
        "mcp-gateway"
    }

    async fn build(&self, _ctx: &Context, name: &str, raw: Value) -> Result<Arc<dyn Source>> {
        let cfg: McpGatewaySourceConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("source \"{name}\": {e}")))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::ConfigInvalid(format!("source \"{name}\": {e}")))?;

        Ok(Arc::new(McpGatewaySource {
            name: name.to_string(),
            client,
            url: cfg.url,
            headers: cfg.headers,
            next_id: Arc::new(AtomicI64::new(1)),
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct McpProxyToolConfig {
    source: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    auth_required: Vec<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
    remote_tool: String,
}

/// Builds `mcp-proxy` tools: each forwards its resolved parameters as one
/// remote `tools/call` on an [`McpGatewaySource`].
pub struct McpProxyToolFactory;

#[async_trait]
impl ToolFactory for McpProxyToolFactory {
    fn kind(&self) -> &'static str {
        "mcp-proxy"
    }

    fn compatible_sources(&self) -> &'static [&'static str] {
        &["mcp-gateway"]
    }

    async fn build(&self, name: &str, raw: Value, sources: &SourceMap) -> Result<Arc<Tool>> {
        let cfg: McpProxyToolConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("tool \"{name}\": {e}")))?;

        let source = sources.get(&cfg.source).ok_or_else(|| {
            Error::ConfigInvalid(format!(
                "tool \"{name}\": unknown source \"{}\"",
                cfg.source
            ))
        })?;
        let gateway_source = source
            .as_any()
            .downcast_ref::<McpGatewaySource>()
            .ok_or_else(|| {
                Error::ConfigInvalid(format!(
                    "tool \"{name}\": source \"{}\" (kind \"{}\") is not an mcp-gateway source",
                    cfg.source,
                    source.kind()
                ))
            })?;

        let invoker = Arc::new(McpProxyInvoker {
            client: gateway_source.client.clone(),
            url: gateway_source.url.clone(),
            headers: gateway_source.headers.clone(),
            next_id: Arc::clone(&gateway_source.next_id),
            remote_tool: cfg.remote_tool,
        });

        let tool = Tool::new(
            name.to_string(),
            self.kind().to_string(),
            cfg.description,
            cfg.source,
            cfg.auth_required,
            cfg.parameters,
            Vec::new(),
            invoker,
        )?;
        Ok(Arc::new(tool))
    }
}

/// `next_id` is owned by the source and shared (via `Arc`) with every tool
/// bound to it, so every tool sharing one gateway draws from a single
/// monotonic JSON-RPC id sequence rather than each starting its own at 1.
struct McpProxyInvoker {
    client: reqwest::Client,
    url: String,
    headers: HashMap<String, String>,
    next_id: Arc<AtomicI64>,
    remote_tool: String,
}

#[async_trait]
impl ToolInvoker for McpProxyInvoker {
    async fn invoke(&self, ctx: &Context, data: &ParamValues, _template: &ParamValues) -> Result<InvokeResult> {
        let mut arguments = Map::with_capacity(data.len());
        for (name, value) in data.iter() {
            arguments.insert(name.to_string(), value.clone());
        }

        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        let request_body = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": "tools/call",
            "params": {
                "name": self.remote_tool,
                "arguments": Value::Object(arguments),
            }
        });

        debug!(request_id = ctx.request_id(), remote_tool = %self.remote_tool, "proxying mcp tool call");

        let mut request = self.client.post(&self.url).json(&request_body);
        for (name, value) in &self.headers {
            request = request.header(name, value);
        }

        let cancellation = ctx.cancellation();
        let response = tokio::select! {
            result = request.send() => result.map_err(|e| Error::BackendError(e.to_string()))?,
            () = cancellation.cancelled() => return Err(Error::BackendError("request cancelled".to_string())),
        };

        if response.status().as_u16() != 200 {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::BackendError(format!(
                "upstream gateway returned status {status}: {body}"
            )));
        }

        let envelope: Value = response
            .json()
            .await
            .map_err(|e| Error::BackendError(format!("invalid JSON-RPC response: {e}")))?;

        if let Some(error) = envelope.get("error") {
            let message = error
                .get("message")
                .and_then(Value::as_str)
                .unwrap_or("upstream error");
            return Err(Error::InvocationFailed(message.to_string()));
        }

        let result = envelope
            .get("result")
            .ok_or_else(|| Error::BackendError("JSON-RPC response carried neither result nor error".to_string()))?;

        shape_call_result(result)
    }
}

/// Unwrap an upstream `tools/call` result's `content: [{type:"text", text}]`
/// envelope and reshape it into the `{column -> value}` row sequence the SQL
/// adapter family returns, per SPEC_FULL.md §1's "return the same `map` row
/// shape as the SQL family after unwrapping the upstream `TextContent`".
///
/// `result.isError: true` ("protocol success carrying application failure",
/// per spec §4.8) is translated into an [`Error::InvocationFailed`] here so
/// it propagates like any other backend-rejected operation; a missing
/// `content` array (a remote tool not shaped like MCP `TextContent` at all)
/// falls back to the result verbatim, since there is nothing to unwrap.
fn shape_call_result(result: &Value) -> Result<InvokeResult> {
    if result.get("isError").and_then(Value::as_bool).unwrap_or(false) {
        let message = first_text(result).unwrap_or_else(|| "remote tool reported failure".to_string());
        return Err(Error::InvocationFailed(message));
    }

    let Some(content) = result.get("content").and_then(Value::as_array) else {
        return Ok(InvokeResult::Json(result.clone()));
    };

    let mut rows = Vec::new();
    for item in content {
        if let Some(text) = item.get("text").and_then(Value::as_str) {
            rows.extend(text_to_rows(text));
        }
    }
    Ok(InvokeResult::Rows(rows))
}

/// Parse one `TextContent.text` string into row maps: a JSON array becomes
/// one row per element, a bare JSON object becomes one row, anything else
/// (non-JSON text, or a JSON scalar) becomes a single `{"value": ...}` row
/// so every element still satisfies the row-map shape.
fn text_to_rows(text: &str) -> Vec<Map<String, Value>> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Array(items)) => items.into_iter().map(value_to_row).collect(),
        Ok(Value::Object(map)) => vec![map],
        Ok(other) => vec![value_to_row(other)],
        Err(_) => vec![value_to_row(Value::String(text.to_string()))],
    }
}

fn value_to_row(value: Value) -> Map<String, Value> {
    match value {
        Value::Object(map) => map,
        other => {
            let mut row = Map::new();
            row.insert("value".to_string(), other);
            row
        }
    }
}

fn first_text(result: &Value) -> Option<String> {
    result
        .get("content")?
        .as_array()?
        .iter()
        .find_map(|item| item.get("text").and_then(Value::as_str))
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn unwraps_json_array_text_content_into_rows() {
        let result = json!({
            "content": [{"type": "text", "text": "[{\"id\":1},{\"id\":2}]"}],
        });
        let shaped = shape_call_result(&result).unwrap();
        match shaped {
            InvokeResult::Rows(rows) => {
                assert_eq!(rows.len(), 2);
                assert_eq!(rows[0].get("id"), Some(&json!(1)));
                assert_eq!(rows[1].get("id"), Some(&json!(2)));
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn non_json_text_content_becomes_a_single_value_row() {
        let result = json!({
            "content": [{"type": "text", "text": "plain text"}],
        });
        let shaped = shape_call_result(&result).unwrap();
        match shaped {
            InvokeResult::Rows(rows) => {
                assert_eq!(rows.len(), 1);
                assert_eq!(rows[0].get("value"), Some(&json!("plain text")));
            }
            other => panic!("expected Rows, got {other:?}"),
        }
    }

    #[test]
    fn is_error_true_becomes_invocation_failed() {
        let result = json!({
            "isError": true,
            "content": [{"type": "text", "text": "remote blew up"}],
        });
        let err = shape_call_result(&result).unwrap_err();
        assert!(matches!(err, Error::InvocationFailed(msg) if msg == "remote blew up"));
    }

    #[test]
    fn missing_content_falls_back_to_verbatim_json() {
        let result = json!({"ok": true});
        let shaped = shape_call_result(&result).unwrap();
        assert!(matches!(shaped, InvokeResult::Json(v) if v == json!({"ok": true})));
    }
}
