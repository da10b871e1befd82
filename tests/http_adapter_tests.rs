//! Integration coverage for the reference `http` adapter (scenario (G) in
//! spec §8): a templated path, a data-bound query parameter, and the
//! pass-through-text result contract, all against a mocked upstream.

use std::collections::HashMap;

use serde_json::{json, Map};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use toolhost::adapter::http::{HttpSourceFactory, HttpToolFactory};
use toolhost_core::source::{SourceFactory, SourceMap};
use toolhost_core::tool::{InvokeResult, ToolFactory};
use toolhost_core::{pipeline, Context};

async fn build_source(base_url: &str) -> SourceMap {
    let factory = HttpSourceFactory;
    let ctx = Context::new("test-source");
    let raw = json!({ "baseUrl": base_url, "defaultHeaders": {} });
    let source = factory.build(&ctx, "api", raw).await.unwrap();
    std::iter::once(("api".to_string(), source)).collect()
}

#[tokio::test]
async fn templated_path_and_query_param_reach_upstream() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets/42"))
        .and(query_param("color", "red"))
        .respond_with(ResponseTemplate::new(200).set_body_string("widget 42 is red"))
        .mount(&server)
        .await;

    let sources = build_source(&server.uri()).await;

    let tool_cfg = json!({
        "source": "api",
        "description": "fetch a widget",
        "method": "GET",
        "path": "/widgets/{{.id}}",
        "pathParams": [{"name": "id", "type": "string"}],
        "queryParams": [{"name": "color", "type": "string"}],
    });
    let tool = HttpToolFactory.build("get_widget", tool_cfg, &sources).await.unwrap();

    let mut input = Map::new();
    input.insert("id".to_string(), json!("42"));
    input.insert("color".to_string(), json!("red"));

    let ctx = Context::new("req-1");
    let result = pipeline::invoke(&ctx, &tool, &input, &HashMap::new(), &[]).await.unwrap();

    match result {
        InvokeResult::Text(body) => assert_eq!(body, "widget 42 is red"),
        other => panic!("expected Text result, got {other:?}"),
    }
}

#[tokio::test]
async fn non_200_upstream_status_is_a_backend_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/widgets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .mount(&server)
        .await;

    let sources = build_source(&server.uri()).await;
    let tool_cfg = json!({
        "source": "api",
        "method": "GET",
        "path": "/widgets/missing",
    });
    let tool = HttpToolFactory.build("get_missing", tool_cfg, &sources).await.unwrap();

    let ctx = Context::new("req-2");
    let err = pipeline::invoke(&ctx, &tool, &Map::new(), &HashMap::new(), &[])
        .await
        .unwrap_err();
    assert!(err.to_string().contains("404"));
}

#[tokio::test]
async fn body_param_is_templated_into_request_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/widgets"))
        .respond_with(ResponseTemplate::new(200).set_body_string("created"))
        .mount(&server)
        .await;

    let sources = build_source(&server.uri()).await;
    let tool_cfg = json!({
        "source": "api",
        "method": "POST",
        "path": "/widgets",
        "bodyParams": [{"name": "name", "type": "string"}],
        "body": "{\"name\": {{json .name}}}",
    });
    let tool = HttpToolFactory.build("create_widget", tool_cfg, &sources).await.unwrap();

    let mut input = Map::new();
    input.insert("name".to_string(), json!("gadget"));

    let ctx = Context::new("req-3");
    let result = pipeline::invoke(&ctx, &tool, &input, &HashMap::new(), &[]).await.unwrap();
    match result {
        InvokeResult::Text(body) => assert_eq!(body, "created"),
        other => panic!("expected Text result, got {other:?}"),
    }
}
