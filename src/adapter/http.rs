//! Reference HTTP adapter: an HTTP source (base URL plus default headers)
//! and the `http` tool kind bound to it.

use std::any::Any;
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use toolhost_core::context::Context;
use toolhost_core::error::{Error, Result};
use toolhost_core::param::{ParamValues, Parameter};
use toolhost_core::source::{Source, SourceFactory, SourceMap};
use toolhost_core::tool::{InvokeResult, Tool, ToolFactory, ToolInvoker};

/// An HTTP client bound to a base URL and a set of default headers, shared
/// by every `http` tool bound to it.
pub struct HttpSource {
    name: String,
    client: reqwest::Client,
    base_url: String,
    default_headers: HashMap<String, String>,
}

impl Source for HttpSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "http"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HttpSourceConfig {
    base_url: String,
    #[serde(default)]
    default_headers: HashMap<String, String>,
}

/// Builds [`HttpSource`]s from `{baseUrl, defaultHeaders?}` blocks.
pub struct HttpSourceFactory;

#[async_trait]
impl SourceFactory for HttpSourceFactory {
    fn kind(&self) -> &'static str {
        "http"
    }

    async fn build(&self, _ctx: &Context, name: &str, raw: Value) -> Result<Arc<dyn Source>> {
        let cfg: HttpSourceConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("source \"{name}\": {e}")))?;

        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| Error::ConfigInvalid(format!("source \"{name}\": {e}")))?;

        Ok(Arc::new(HttpSource {
            name: name.to_string(),
            client,
            base_url: cfg.base_url,
            default_headers: cfg.default_headers,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct HttpToolConfig {
    source: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    auth_required: Vec<String>,
    #[serde(default = "default_method")]
    method: String,
    path: String,
    #[serde(default)]
    default_headers: HashMap<String, String>,
    #[serde(default)]
    query_params: Vec<Parameter>,
    #[serde(default)]
    header_params: Vec<Parameter>,
    #[serde(default)]
    path_params: Vec<Parameter>,
    #[serde(default)]
    body_params: Vec<Parameter>,
    #[serde(default)]
    body: Option<String>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Builds `http` tools. `queryParams`/`headerParams` are data parameters,
/// bound directly into the request's query string and headers. `pathParams`
/// and `bodyParams` are template parameters, text-interpolated into `path`
/// and `body` respectively.
pub struct HttpToolFactory;

#[async_trait]
impl ToolFactory for HttpToolFactory {
    fn kind(&self) -> &'static str {
        "http"
    }

    fn compatible_sources(&self) -> &'static [&'static str] {
        &["http"]
    }

    async fn build(&self, name: &str, raw: Value, sources: &SourceMap) -> Result<Arc<Tool>> {
        let cfg: HttpToolConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("tool \"{name}\": {e}")))?;

        let source = sources.get(&cfg.source).ok_or_else(|| {
            Error::ConfigInvalid(format!(
                "tool \"{name}\": unknown source \"{}\"",
                cfg.source
            ))
        })?;
        let http_source = source.as_any().downcast_ref::<HttpSource>().ok_or_else(|| {
            Error::ConfigInvalid(format!(
                "tool \"{name}\": source \"{}\" (kind \"{}\") is not an http source",
                cfg.source,
                source.kind()
            ))
        })?;

        let method = cfg
            .method
            .parse::<reqwest::Method>()
            .map_err(|_| Error::ConfigInvalid(format!("tool \"{name}\": invalid method \"{}\"", cfg.method)))?;

        let query_param_names: Vec<String> = cfg.query_params.iter().map(|p| p.name.clone()).collect();
        let header_param_names: Vec<String> = cfg.header_params.iter().map(|p| p.name.clone()).collect();
        let path_param_names: Vec<String> = cfg.path_params.iter().map(|p| p.name.clone()).collect();
        let body_param_names: Vec<String> = cfg.body_params.iter().map(|p| p.name.clone()).collect();

        let data_parameters: Vec<Parameter> = cfg
            .query_params
            .iter()
            .chain(cfg.header_params.iter())
            .cloned()
            .collect();
        let template_parameters: Vec<Parameter> = cfg
            .path_params
            .iter()
            .chain(cfg.body_params.iter())
            .cloned()
            .collect();

        let invoker = Arc::new(HttpInvoker {
            client: http_source.client.clone(),
            base_url: http_source.base_url.clone(),
            source_default_headers: http_source.default_headers.clone(),
            tool_default_headers: cfg.default_headers,
            method,
            path: cfg.path,
            body: cfg.body,
            query_param_names,
            header_param_names,
            path_param_names,
            body_param_names,
        });

        let tool = Tool::new(
            name.to_string(),
            self.kind().to_string(),
            cfg.description,
            cfg.source,
            cfg.auth_required,
            data_parameters,
            template_parameters,
            invoker,
        )?;
        Ok(Arc::new(tool))
    }
}

struct HttpInvoker {
    client: reqwest::Client,
    base_url: String,
    source_default_headers: HashMap<String, String>,
    tool_default_headers: HashMap<String, String>,
    method: reqwest::Method,
    path: String,
    body: Option<String>,
    query_param_names: Vec<String>,
    header_param_names: Vec<String>,
    path_param_names: Vec<String>,
    body_param_names: Vec<String>,
}

#[async_trait]
impl ToolInvoker for HttpInvoker {
    async fn invoke(&self, ctx: &Context, data: &ParamValues, template: &ParamValues) -> Result<InvokeResult> {
        let path = if self.path_param_names.is_empty() {
            self.path.clone()
        } else {
            let values = to_template_map(&template.subset(&self.path_param_names));
            toolhost_core::template::render(&self.path, &values)?
        };

        let joined = format!("{}{}", self.base_url.trim_end_matches('/'), path);
        let mut url = url::Url::parse(&joined)
            .map_err(|e| Error::BackendError(format!("invalid request URL \"{joined}\": {e}")))?;

        {
            let mut query = url.query_pairs_mut();
            for (name, value) in data.subset(&self.query_param_names).iter() {
                match value {
                    Value::Array(items) => {
                        for item in items {
                            query.append_pair(name, &scalar_to_query_string(item));
                        }
                    }
                    other => {
                        query.append_pair(name, &scalar_to_query_string(other));
                    }
                }
            }
        }

        let mut headers = reqwest::header::HeaderMap::new();
        for (name, value) in self
            .source_default_headers
            .iter()
            .chain(self.tool_default_headers.iter())
        {
            insert_header(&mut headers, name, value)?;
        }
        for (name, value) in data.subset(&self.header_param_names).iter() {
            insert_header(&mut headers, name, &scalar_to_query_string(value))?;
        }

        let body = match &self.body {
            Some(body_template) => {
                let values = to_template_map(&template.subset(&self.body_param_names));
                Some(toolhost_core::template::render(body_template, &values)?)
            }
            None => None,
        };

        debug!(request_id = ctx.request_id(), %url, method = %self.method, "invoking http tool");

        let mut request = self.client.request(self.method.clone(), url).headers(headers);
        if let Some(body) = body {
            request = request.body(body);
        }

        let cancellation = ctx.cancellation();
        let response = tokio::select! {
            result = request.send() => result.map_err(|e| Error::BackendError(e.to_string()))?,
            () = cancellation.cancelled() => return Err(Error::BackendError("request cancelled".to_string())),
        };

        let status = response.status();
        let body_text = response
            .text()
            .await
            .map_err(|e| Error::BackendError(format!("failed to read response body: {e}")))?;

        if status.as_u16() != 200 {
            return Err(Error::BackendError(format!(
                "backend returned status {status}: {body_text}"
            )));
        }

        Ok(InvokeResult::Text(body_text))
    }
}

fn to_template_map(values: &ParamValues) -> HashMap<String, Value> {
    values.iter().map(|(n, v)| (n.to_string(), v.clone())).collect()
}

fn scalar_to_query_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

fn insert_header(headers: &mut reqwest::header::HeaderMap, name: &str, value: &str) -> Result<()> {
    let header_name = name
        .parse::<reqwest::header::HeaderName>()
        .map_err(|e| Error::BackendError(format!("invalid header name \"{name}\": {e}")))?;
    let header_value = value
        .parse::<reqwest::header::HeaderValue>()
        .map_err(|e| Error::BackendError(format!("invalid header value for \"{name}\": {e}")))?;
    headers.insert(header_name, header_value);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scalar_to_query_string_renders_bare_values() {
        assert_eq!(scalar_to_query_string(&Value::String("US".to_string())), "US");
        assert_eq!(scalar_to_query_string(&Value::Bool(true)), "true");
        assert_eq!(scalar_to_query_string(&serde_json::json!(2)), "2");
    }
}
