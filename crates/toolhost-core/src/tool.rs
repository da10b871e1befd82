//! Tool registry (C3): the `kind -> factory` mapping that produces frozen,
//! immutable [`Tool`] instances bound to one source.

use std::collections::HashMap;
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::error::{Error, Result};
use crate::manifest::{self, McpToolSchema, ToolManifest};
use crate::param::{ParamValues, Parameter};
use crate::source::SourceMap;

/// The shaped result of one backend call, already normalised per the
/// backend-family contract in the invocation pipeline spec (§4.4 step 5).
/// `Rows`/`Text` are produced by adapters that follow the SQL result-shaping
/// contract; `Json` is returned verbatim by every other adapter family.
#[derive(Debug, Clone)]
pub enum InvokeResult {
    /// An ordered sequence of `{column -> value}` rows.
    Rows(Vec<Map<String, Value>>),
    /// A pre-shaped, already-final string (e.g. the "0 rows"/"no content"
    /// literals, or an HTTP response body).
    Text(String),
    /// Any other backend-native value, returned verbatim.
    Json(Value),
}

impl InvokeResult {
    /// Collapse this result to the single JSON value a caller not
    /// concerned with wire-shape would want: rows as a native array,
    /// everything else verbatim.
    #[must_use]
    pub fn into_value(self) -> Value {
        match self {
            Self::Rows(rows) => Value::Array(rows.into_iter().map(Value::Object).collect()),
            Self::Text(s) => Value::String(s),
            Self::Json(v) => v,
        }
    }

    /// Render this result the way the REST `{result: ...}` envelope and the
    /// MCP `TextContent.text` field both want it: an already-textual result
    /// (`Text`) passes through unchanged; a structured result (`Rows`,
    /// `Json`) is JSON-stringified, matching the `"result":"[{...}]"`
    /// shape in the REST surface's worked examples.
    #[must_use]
    pub fn into_display_string(self) -> String {
        match self {
            Self::Text(s) => s,
            other => {
                serde_json::to_string(&other.into_value()).unwrap_or_else(|_| String::new())
            }
        }
    }
}

/// Backend-family-specific half of a tool: template resolution, the backend
/// call, and result shaping (§4.4 steps 3-5). Parameter parsing and
/// authorization (steps 1-2) are handled once, generically, by the
/// invocation pipeline before an invoker ever runs.
#[async_trait]
pub trait ToolInvoker: Send + Sync {
    /// Run one invocation.
    ///
    /// `data` holds the resolved data-parameter subset (bound to the
    /// backend call); `template` holds the resolved template-parameter
    /// subset (text-interpolated into the tool's statement before
    /// execution). Both preserve the tool's declared parameter order.
    async fn invoke(&self, ctx: &Context, data: &ParamValues, template: &ParamValues) -> Result<InvokeResult>;
}

/// Immutable after construction. See the data model spec for field
/// semantics; this is `ToolConfig.Initialize`'s return value.
pub struct Tool {
    /// Tool name, unique within a document.
    pub name: String,
    /// Tool `kind`, selecting the factory that built it.
    pub kind: String,
    /// Human-readable description.
    pub description: String,
    /// Name of the source this tool is bound to.
    pub source_name: String,
    /// Auth-service names required to invoke this tool. Empty means no
    /// authorization check is performed.
    pub auth_required: Vec<String>,
    data_parameters: Vec<Parameter>,
    template_parameters: Vec<Parameter>,
    invoker: Arc<dyn ToolInvoker>,
    manifest: OnceLock<ToolManifest>,
    mcp_schema: OnceLock<McpToolSchema>,
}

impl Tool {
    /// Construct a frozen tool. Called by adapter [`ToolFactory`]
    /// implementations once they have validated the source's compatibility
    /// and built a concrete [`ToolInvoker`].
    pub fn new(
        name: String,
        kind: String,
        description: String,
        source_name: String,
        auth_required: Vec<String>,
        data_parameters: Vec<Parameter>,
        template_parameters: Vec<Parameter>,
        invoker: Arc<dyn ToolInvoker>,
    ) -> Result<Self> {
        validate_name(&name)?;
        validate_unique_names(&data_parameters, &template_parameters)?;
        validate_template_parameters(&template_parameters)?;
        Ok(Self {
            name,
            kind,
            description,
            source_name,
            auth_required,
            data_parameters,
            template_parameters,
            invoker,
            manifest: OnceLock::new(),
            mcp_schema: OnceLock::new(),
        })
    }

    /// The combined parameter schema: data parameters followed by template
    /// parameters, in declaration order within each group. Parameter
    /// parsing runs once over this combined list; the tool then separates
    /// the two subsets by name for template resolution and the backend
    /// call.
    #[must_use]
    pub fn combined_parameters(&self) -> Vec<Parameter> {
        self.data_parameters
            .iter()
            .chain(self.template_parameters.iter())
            .cloned()
            .collect()
    }

    /// Names of the declared template parameters, in order.
    #[must_use]
    pub fn template_parameter_names(&self) -> Vec<String> {
        self.template_parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// Names of the declared data parameters, in order.
    #[must_use]
    pub fn data_parameter_names(&self) -> Vec<String> {
        self.data_parameters.iter().map(|p| p.name.clone()).collect()
    }

    /// The native manifest, computed once and served cached thereafter.
    #[must_use]
    pub fn manifest(&self) -> &ToolManifest {
        self.manifest.get_or_init(|| {
            manifest::project_manifest(&self.description, &self.combined_parameters(), &self.auth_required)
        })
    }

    /// The MCP `inputSchema` manifest, computed once and served cached
    /// thereafter.
    #[must_use]
    pub fn mcp_schema(&self) -> &McpToolSchema {
        self.mcp_schema.get_or_init(|| {
            manifest::project_mcp_schema(&self.name, &self.description, &self.combined_parameters())
        })
    }

    /// Dispatch an already-parsed, already-authorized combined parameter
    /// set to the backend-specific invoker, splitting it into the
    /// data/template subsets the invoker expects.
    ///
    /// Parameter parsing and authorization are orchestrated by
    /// `crate::pipeline::invoke`, which calls this only after both have
    /// succeeded, per the step ordering in the invocation pipeline spec.
    pub(crate) async fn dispatch(&self, ctx: &Context, parsed: &ParamValues) -> Result<InvokeResult> {
        let data = parsed.subset(&self.data_parameter_names());
        let template = parsed.subset(&self.template_parameter_names());
        self.invoker.invoke(ctx, &data, &template).await
    }
}

fn validate_name(name: &str) -> Result<()> {
    if name.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-') && !name.is_empty() {
        Ok(())
    } else {
        Err(Error::ConfigInvalid(format!(
            "tool name \"{name}\" must match ^[A-Za-z0-9_-]*$"
        )))
    }
}

fn validate_unique_names(data: &[Parameter], template: &[Parameter]) -> Result<()> {
    let mut seen = std::collections::HashSet::new();
    for p in data.iter().chain(template.iter()) {
        if !seen.insert(&p.name) {
            return Err(Error::ConfigInvalid(format!(
                "duplicate parameter name \"{}\"",
                p.name
            )));
        }
    }
    Ok(())
}

fn validate_template_parameters(template: &[Parameter]) -> Result<()> {
    use crate::param::{ParamShape, ScalarKind};
    for p in template {
        let ok = match &p.shape {
            ParamShape::Scalar(ScalarKind::String) => true,
            ParamShape::Array(items) => matches!(items.shape, ParamShape::Scalar(ScalarKind::String)),
            _ => false,
        };
        if !ok {
            return Err(Error::ConfigInvalid(format!(
                "template parameter \"{}\" must be string or string-array",
                p.name
            )));
        }
    }
    Ok(())
}

/// Produces a `ToolConfig` (an `Arc<Tool>`) from one `kind`-tagged config
/// block, after binding it to one named, compatible source.
#[async_trait]
pub trait ToolFactory: Send + Sync {
    /// The `kind` string this factory handles.
    fn kind(&self) -> &'static str;

    /// Source kinds this tool kind may bind to.
    fn compatible_sources(&self) -> &'static [&'static str];

    /// Decode `raw`, look up and capability-check the named source, and
    /// build the frozen [`Tool`].
    async fn build(&self, name: &str, raw: Value, sources: &SourceMap) -> Result<Arc<Tool>>;
}

/// Process-wide `kind -> factory` mapping for tools.
#[derive(Default)]
pub struct ToolRegistry {
    factories: HashMap<&'static str, Arc<dyn ToolFactory>>,
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a factory for a `kind`. Returns [`Error::ConfigInvalid`] if
    /// that `kind` is already registered.
    pub fn register(&mut self, factory: Arc<dyn ToolFactory>) -> Result<()> {
        let kind = factory.kind();
        if self.factories.insert(kind, factory).is_some() {
            return Err(Error::ConfigInvalid(format!(
                "duplicate tool kind registration: \"{kind}\""
            )));
        }
        Ok(())
    }

    /// Look up the factory for a `kind`, if one is registered.
    #[must_use]
    pub fn factory(&self, kind: &str) -> Option<Arc<dyn ToolFactory>> {
        self.factories.get(kind).cloned()
    }

    /// Build every configured tool, keyed by name, binding each to its
    /// named source via the factory's `build`.
    pub async fn build_all(
        &self,
        entries: Vec<(String, String, Value)>,
        sources: &SourceMap,
    ) -> Result<HashMap<String, Arc<Tool>>> {
        let mut tools = HashMap::new();
        for (name, kind, raw) in entries {
            let factory = self
                .factory(&kind)
                .ok_or_else(|| Error::ConfigInvalid(format!("unknown tool kind \"{kind}\"")))?;
            let tool = factory.build(&name, raw, sources).await?;
            tools.insert(name, tool);
        }
        Ok(tools)
    }
}

#[cfg(test)]
mod invoke_result_tests {
    use super::InvokeResult;
    use serde_json::json;

    #[test]
    fn rows_are_json_stringified() {
        let rows = vec![json!({"one": 1}).as_object().cloned().unwrap()];
        let result = InvokeResult::Rows(rows);
        assert_eq!(result.into_display_string(), "[{\"one\":1}]");
    }

    #[test]
    fn text_passes_through_unchanged() {
        let result = InvokeResult::Text("The query returned 0 rows.".to_string());
        assert_eq!(result.into_display_string(), "The query returned 0 rows.");
    }
}
