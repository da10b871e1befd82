//! Manifest projector (C7): two pure, cache-once views of a frozen tool.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::param::{ParamManifest, Parameter};

/// The native manifest projection, served by `GET /api/tool/{name}/` and
/// `GET /api/toolset/{name}/`.
#[derive(Debug, Clone, Serialize)]
pub struct ToolManifest {
    /// Tool description.
    pub description: String,
    /// One entry per declared parameter, in declaration order.
    pub parameters: Vec<ParamManifest>,
    /// Auth-service names required to invoke this tool.
    #[serde(rename = "authRequired")]
    pub auth_required: Vec<String>,
}

/// The MCP `inputSchema` projection, served by `tools/list`.
#[derive(Debug, Clone, Serialize)]
pub struct McpToolSchema {
    /// Tool name, used as the MCP tool identifier.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema `object` describing the tool's call arguments.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Build the native manifest for a tool from its frozen parameter list.
#[must_use]
pub fn project_manifest(description: &str, parameters: &[Parameter], auth_required: &[String]) -> ToolManifest {
    ToolManifest {
        description: description.to_string(),
        parameters: parameters.iter().map(Parameter::manifest).collect(),
        auth_required: auth_required.to_vec(),
    }
}

/// Build the MCP `inputSchema` JSON Schema object for a tool.
#[must_use]
pub fn project_mcp_schema(name: &str, description: &str, parameters: &[Parameter]) -> McpToolSchema {
    let mut properties = Map::new();
    let mut required = Vec::new();
    for param in parameters {
        properties.insert(param.name.clone(), param.mcp_schema());
        if param.manifest_required() {
            required.push(Value::String(param.name.clone()));
        }
    }

    let mut schema = Map::new();
    schema.insert("type".to_string(), Value::String("object".to_string()));
    schema.insert("properties".to_string(), Value::Object(properties));
    schema.insert("required".to_string(), Value::Array(required));

    McpToolSchema {
        name: name.to_string(),
        description: description.to_string(),
        input_schema: Value::Object(schema),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::param::ScalarKind;
    use serde_json::json;

    fn sample_parameters() -> Vec<Parameter> {
        let id: Parameter = serde_json::from_value(json!({
            "name": "id",
            "type": "integer",
            "description": "row id",
        }))
        .unwrap();
        let limit: Parameter = serde_json::from_value(json!({
            "name": "limit",
            "type": "integer",
            "description": "max rows",
            "default": 10,
        }))
        .unwrap();
        vec![id, limit]
    }

    /// Testable property (7), "manifest stability": projecting the same
    /// frozen parameter list twice is pure and produces byte-identical
    /// output both times, for both manifest views.
    #[test]
    fn projection_is_pure_and_stable_across_repeated_calls() {
        let parameters = sample_parameters();
        let auth_required = vec!["gauth".to_string()];

        let first = project_manifest("desc", &parameters, &auth_required);
        let second = project_manifest("desc", &parameters, &auth_required);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );

        let mcp_first = project_mcp_schema("t", "desc", &parameters);
        let mcp_second = project_mcp_schema("t", "desc", &parameters);
        assert_eq!(
            serde_json::to_string(&mcp_first.input_schema).unwrap(),
            serde_json::to_string(&mcp_second.input_schema).unwrap()
        );
    }

    #[test]
    fn reparsing_the_same_declaration_reproduces_the_same_manifest() {
        // A config document re-loaded after a restart decodes each
        // parameter declaration fresh; the resulting manifest bytes must
        // match what the first load produced (spec §8 property 7).
        let raw = json!({
            "name": "count",
            "type": "integer",
            "description": "how many",
        });
        let first: Parameter = serde_json::from_value(raw.clone()).unwrap();
        let second: Parameter = serde_json::from_value(raw).unwrap();

        let m1 = project_manifest("d", std::slice::from_ref(&first), &[]);
        let m2 = project_manifest("d", std::slice::from_ref(&second), &[]);
        assert_eq!(
            serde_json::to_string(&m1).unwrap(),
            serde_json::to_string(&m2).unwrap()
        );
        assert!(matches!(
            first.shape,
            crate::param::ParamShape::Scalar(ScalarKind::Integer)
        ));
    }
}
