//! Full-pipeline integration coverage that does not depend on a live
//! backend: parameter parsing, authorization gating, and result dispatch,
//! exercised against a stub [`ToolInvoker`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Map, Value};

use toolhost_core::error::rpc_codes;
use toolhost_core::param::{ClaimsMap, ParamValues, Parameter};
use toolhost_core::tool::{InvokeResult, Tool, ToolInvoker};
use toolhost_core::{pipeline, Context};

struct EchoInvoker;

#[async_trait]
impl ToolInvoker for EchoInvoker {
    async fn invoke(&self, _ctx: &Context, data: &ParamValues, template: &ParamValues) -> toolhost_core::Result<InvokeResult> {
        let mut obj = Map::new();
        for (name, value) in data.iter() {
            obj.insert(name.to_string(), value.clone());
        }
        for (name, value) in template.iter() {
            obj.insert(format!("tmpl_{name}"), value.clone());
        }
        Ok(InvokeResult::Json(Value::Object(obj)))
    }
}

fn string_param(name: &str, required: bool) -> Parameter {
    let raw = json!({ "name": name, "type": "string", "required": required });
    serde_json::from_value(raw).unwrap()
}

fn auth_bound_param(name: &str, service: &str, field: &str) -> Parameter {
    let raw = json!({
        "name": name,
        "type": "string",
        "authServices": [{"name": service, "field": field}],
    });
    serde_json::from_value(raw).unwrap()
}

fn build_tool(auth_required: Vec<String>, data: Vec<Parameter>, template: Vec<Parameter>) -> Arc<Tool> {
    Arc::new(
        Tool::new(
            "echo".to_string(),
            "stub".to_string(),
            "echoes its input".to_string(),
            "stub-source".to_string(),
            auth_required,
            data,
            template,
            Arc::new(EchoInvoker),
        )
        .unwrap(),
    )
}

#[tokio::test]
async fn resolved_parameters_reach_the_invoker_split_by_category() {
    let tool = build_tool(
        vec![],
        vec![string_param("id", true)],
        vec![string_param("label", true)],
    );

    let mut input = Map::new();
    input.insert("id".to_string(), json!("7"));
    input.insert("label".to_string(), json!("widget"));

    let ctx = Context::new("req-1");
    let result = pipeline::invoke(&ctx, &tool, &input, &ClaimsMap::new(), &[]).await.unwrap();

    let Value::Object(obj) = result.into_value() else {
        panic!("expected object result");
    };
    assert_eq!(obj.get("id"), Some(&json!("7")));
    assert_eq!(obj.get("tmpl_label"), Some(&json!("widget")));
}

#[tokio::test]
async fn missing_required_parameter_is_rejected_before_dispatch() {
    let tool = build_tool(vec![], vec![string_param("id", true)], vec![]);
    let ctx = Context::new("req-2");
    let err = pipeline::invoke(&ctx, &tool, &Map::new(), &ClaimsMap::new(), &[])
        .await
        .unwrap_err();
    assert_eq!(err.to_rpc_code(), rpc_codes::INVALID_PARAMS);
    assert_eq!(err.to_http_status(), 400);
}

#[tokio::test]
async fn auth_required_tool_rejects_caller_without_verified_service() {
    let tool = build_tool(vec!["gauth".to_string()], vec![], vec![]);
    let ctx = Context::new("req-3");
    let err = pipeline::invoke(&ctx, &tool, &Map::new(), &ClaimsMap::new(), &[])
        .await
        .unwrap_err();
    assert_eq!(err.to_http_status(), 401);
    assert_eq!(err.to_rpc_code(), rpc_codes::INVALID_REQUEST);
}

#[tokio::test]
async fn auth_required_tool_accepts_caller_with_verified_service() {
    let tool = build_tool(vec!["gauth".to_string()], vec![], vec![]);
    let ctx = Context::new("req-4");
    let result = pipeline::invoke(
        &ctx,
        &tool,
        &Map::new(),
        &ClaimsMap::new(),
        &["gauth".to_string()],
    )
    .await
    .unwrap();
    assert!(matches!(result, InvokeResult::Json(Value::Object(_))));
}

#[tokio::test]
async fn auth_bound_parameter_ignores_caller_supplied_value() {
    let tool = build_tool(
        vec![],
        vec![auth_bound_param("email", "gauth", "email")],
        vec![],
    );

    let mut input = Map::new();
    input.insert("email".to_string(), json!("caller@example.com"));

    let mut claims = ClaimsMap::new();
    let mut fields = HashMap::new();
    fields.insert("email".to_string(), json!("verified@example.com"));
    claims.insert("gauth".to_string(), fields);

    let ctx = Context::new("req-5");
    let result = pipeline::invoke(&ctx, &tool, &input, &claims, &[]).await.unwrap();

    let Value::Object(obj) = result.into_value() else {
        panic!("expected object result");
    };
    assert_eq!(obj.get("email"), Some(&json!("verified@example.com")));
}
