//! Parameter model (C1): typed parameter definitions, parsing, and the two
//! manifest projections (native + MCP `inputSchema`).

use std::collections::HashMap;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{Map, Number, Value};

use crate::error::{Error, Result};

/// `{auth-service-name -> {claim-field -> value}}`, the verified identity
/// context for one request. The core never validates tokens; it only reads
/// claims handed to it by the boundary.
pub type ClaimsMap = HashMap<String, HashMap<String, Value>>;

/// One `{service-name, claim-field}` pair declared on an auth-bound parameter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthBinding {
    /// Auth-service name, matched against the verified names presented at
    /// invocation time and against the keys of the [`ClaimsMap`].
    pub name: String,
    /// Claim field within that service's claims to read the value from.
    pub field: String,
}

/// The four scalar parameter kinds. Arrays and maps are composed from these.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScalarKind {
    /// UTF-8 text, accepted only from native JSON strings.
    String,
    /// Conceptually a signed 64-bit integer.
    Integer,
    /// 64-bit float.
    Float,
    /// Accepted only from native JSON booleans.
    Boolean,
}

impl ScalarKind {
    fn name(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "float",
            Self::Boolean => "boolean",
        }
    }

    /// JSON Schema `type` keyword for this scalar kind.
    fn json_schema_type(self) -> &'static str {
        match self {
            Self::String => "string",
            Self::Integer => "integer",
            Self::Float => "number",
            Self::Boolean => "boolean",
        }
    }

    /// Coerce a caller-/claims-/default-supplied value to this scalar kind.
    ///
    /// Integers accept native integers of any width or a textual number that
    /// narrows losslessly to i64. Floats accept native floats (or integers)
    /// and textual numbers convertible to f64. Booleans and strings accept
    /// only their own native JSON kind — never a textual coercion.
    fn coerce(self, name: &str, value: &Value) -> Result<Value> {
        let detail = |msg: String| Error::ParamType {
            name: name.to_string(),
            detail: msg,
        };
        match self {
            Self::String => match value {
                Value::String(_) => Ok(value.clone()),
                other => Err(detail(format!("expected string, got {}", kind_of(other)))),
            },
            Self::Boolean => match value {
                Value::Bool(_) => Ok(value.clone()),
                other => Err(detail(format!("expected boolean, got {}", kind_of(other)))),
            },
            Self::Integer => match value {
                Value::Number(n) if n.is_i64() || n.is_u64() => Ok(value.clone()),
                Value::Number(n) => Err(detail(format!(
                    "integer parameter cannot hold non-integral number {n}"
                ))),
                Value::String(s) => s
                    .parse::<i64>()
                    .map(|i| Value::Number(Number::from(i)))
                    .map_err(|_| detail(format!("\"{s}\" is not a valid integer"))),
                other => Err(detail(format!("expected integer, got {}", kind_of(other)))),
            },
            Self::Float => match value {
                Value::Number(_) => Ok(value.clone()),
                Value::String(s) => s
                    .parse::<f64>()
                    .ok()
                    .and_then(Number::from_f64)
                    .map(Value::Number)
                    .ok_or_else(|| detail(format!("\"{s}\" is not a valid number"))),
                other => Err(detail(format!("expected number, got {}", kind_of(other)))),
            },
        }
    }
}

fn kind_of(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// The shape of a parameter: a bare scalar, an array of scalar items, or a
/// (optionally typed) map.
#[derive(Debug, Clone)]
pub enum ParamShape {
    /// A scalar value of the given kind.
    Scalar(ScalarKind),
    /// An ordered sequence whose items each satisfy the nested parameter.
    /// The nested parameter's own `auth_services` must be empty.
    Array(Box<Parameter>),
    /// A keyed collection. `None` accepts any value type, recursively
    /// narrowing embedded textual numbers; `Some(kind)` validates every
    /// value against that scalar kind.
    Map(Option<ScalarKind>),
}

/// A named, typed contract for one input slot of a tool.
///
/// Immutable once constructed by [`Parameter::from_raw`]. `required` is
/// `true` unless the raw declaration said otherwise; `default`, if present,
/// implies `required=false` semantics for manifest purposes regardless of
/// the declared `required` flag (see [`Parameter::manifest_required`]).
#[derive(Debug, Clone)]
pub struct Parameter {
    /// Identifier, unique within a tool across all parameter categories.
    pub name: String,
    /// Human-readable description, surfaced in both manifest projections.
    pub description: String,
    /// Declared `required` flag (defaults to `true` when absent).
    pub required: bool,
    /// Default value, if configured.
    pub default: Option<Value>,
    /// Non-empty iff this parameter is authentication-bound.
    pub auth_services: Vec<AuthBinding>,
    /// Scalar / array / map shape.
    pub shape: ParamShape,
}

/// Wire shape of a parameter declaration, as it appears under `parameters`,
/// `templateParameters`, or any of the HTTP parameter categories.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawParameter {
    name: String,
    #[serde(rename = "type")]
    type_: String,
    #[serde(default)]
    description: String,
    #[serde(default = "default_true")]
    required: bool,
    #[serde(default)]
    default: Option<Value>,
    #[serde(default)]
    auth_services: Vec<AuthBinding>,
    /// Deprecated alias for `auth_services`, accepted on any parameter.
    #[serde(default)]
    auth_sources: Vec<AuthBinding>,
    #[serde(default)]
    items: Option<Box<RawParameter>>,
    #[serde(default)]
    value_type: Option<String>,
}

fn default_true() -> bool {
    true
}

impl<'de> Deserialize<'de> for Parameter {
    fn deserialize<D>(deserializer: D) -> std::result::Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = RawParameter::deserialize(deserializer)?;
        Parameter::from_raw(raw, true).map_err(serde::de::Error::custom)
    }
}

impl Parameter {
    fn from_raw(mut raw: RawParameter, top_level: bool) -> Result<Self> {
        if !raw.auth_sources.is_empty() {
            tracing::warn!(
                parameter = %raw.name,
                "field \"authSources\" is deprecated; use \"authServices\" instead"
            );
            raw.auth_services.append(&mut raw.auth_sources);
        }

        let shape = match raw.type_.as_str() {
            "string" => ParamShape::Scalar(ScalarKind::String),
            "integer" => ParamShape::Scalar(ScalarKind::Integer),
            "float" => ParamShape::Scalar(ScalarKind::Float),
            "boolean" => ParamShape::Scalar(ScalarKind::Boolean),
            "array" => {
                let items = raw.items.take().ok_or_else(|| {
                    Error::ConfigInvalid(format!(
                        "parameter \"{}\": type=array requires \"items\"",
                        raw.name
                    ))
                })?;
                let nested = Parameter::from_raw(*items, false)?;
                if !nested.auth_services.is_empty() {
                    return Err(Error::ConfigInvalid(format!(
                        "parameter \"{}\": array items must not carry authServices",
                        raw.name
                    )));
                }
                if !matches!(nested.shape, ParamShape::Scalar(_)) {
                    return Err(Error::ConfigInvalid(format!(
                        "parameter \"{}\": array items must be scalar",
                        raw.name
                    )));
                }
                ParamShape::Array(Box::new(nested))
            }
            "map" => {
                let value_type = match raw.value_type.as_deref() {
                    None | Some("") => None,
                    Some("string") => Some(ScalarKind::String),
                    Some("integer") => Some(ScalarKind::Integer),
                    Some("float") => Some(ScalarKind::Float),
                    Some("boolean") => Some(ScalarKind::Boolean),
                    Some(other) => {
                        return Err(Error::ConfigInvalid(format!(
                            "parameter \"{}\": invalid valueType \"{other}\"",
                            raw.name
                        )));
                    }
                };
                ParamShape::Map(value_type)
            }
            other => {
                return Err(Error::ConfigInvalid(format!(
                    "parameter \"{}\": unknown type \"{other}\"",
                    raw.name
                )));
            }
        };

        if top_level && raw.items.is_some() && !matches!(raw.type_.as_str(), "array") {
            return Err(Error::ConfigInvalid(format!(
                "parameter \"{}\": \"items\" is only valid for type=array",
                raw.name
            )));
        }

        Ok(Self {
            name: raw.name,
            description: raw.description,
            required: raw.required,
            default: raw.default,
            auth_services: raw.auth_services,
            shape,
        })
    }

    /// Whether caller-supplied values are ignored for this parameter because
    /// its value is drawn from verified claims instead.
    #[must_use]
    pub fn is_auth_bound(&self) -> bool {
        !self.auth_services.is_empty()
    }

    /// Whether this parameter is listed in the MCP `required` array:
    /// `required ∧ default=∅`.
    #[must_use]
    pub fn manifest_required(&self) -> bool {
        self.required && self.default.is_none()
    }

    /// Resolve and type-check this parameter's value for one invocation.
    ///
    /// Implements the three-step resolution in the parameter model spec:
    /// auth-bound substitution, caller/default/required resolution, then
    /// type coercion of the sourced value.
    pub fn resolve(&self, input: Option<&Map<String, Value>>, claims: &ClaimsMap) -> Result<Option<Value>> {
        let sourced = if self.is_auth_bound() {
            Some(self.resolve_auth_bound(claims)?)
        } else {
            match input.and_then(|m| m.get(&self.name)) {
                Some(v) => Some(v.clone()),
                None => match &self.default {
                    Some(d) => Some(d.clone()),
                    None => {
                        if self.required {
                            return Err(Error::ParamMissing(self.name.clone()));
                        }
                        None
                    }
                },
            }
        };

        match sourced {
            None | Some(Value::Null) => Ok(None),
            Some(v) => self.parse(&v).map(Some),
        }
    }

    fn resolve_auth_bound(&self, claims: &ClaimsMap) -> Result<Value> {
        // A binding "matches" once its service name appears in the claims
        // map at all — a missing field within that matched service is a more
        // specific error than a wholesale missing service (Open Question a).
        for binding in &self.auth_services {
            if let Some(service_claims) = claims.get(&binding.name) {
                if let Some(value) = service_claims.get(&binding.field) {
                    return Ok(value.clone());
                }
                return Err(Error::Unauthorized(format!(
                    "no field named {} in claims for service {}",
                    binding.field, binding.name
                )));
            }
        }
        Err(Error::Unauthorized(
            "missing or invalid authentication header".to_string(),
        ))
    }

    fn parse(&self, value: &Value) -> Result<Value> {
        match &self.shape {
            ParamShape::Scalar(kind) => kind.coerce(&self.name, value),
            ParamShape::Array(items) => match value {
                Value::Array(arr) => {
                    let mut out = Vec::with_capacity(arr.len());
                    for item in arr {
                        out.push(items.parse(item)?);
                    }
                    Ok(Value::Array(out))
                }
                other => Err(Error::ParamType {
                    name: self.name.clone(),
                    detail: format!("expected array, got {}", kind_of(other)),
                }),
            },
            ParamShape::Map(value_type) => match value {
                Value::Object(map) => {
                    let mut out = Map::with_capacity(map.len());
                    for (k, v) in map {
                        let coerced = match value_type {
                            Some(kind) => kind.coerce(&self.name, v)?,
                            None => narrow_textual_numbers(v),
                        };
                        out.insert(k.clone(), coerced);
                    }
                    Ok(Value::Object(out))
                }
                other => Err(Error::ParamType {
                    name: self.name.clone(),
                    detail: format!("expected map, got {}", kind_of(other)),
                }),
            },
        }
    }

    /// The native manifest projection for one parameter.
    #[must_use]
    pub fn manifest(&self) -> ParamManifest {
        let (type_name, items, value_type) = match &self.shape {
            ParamShape::Scalar(k) => (k.name(), None, None),
            ParamShape::Array(items) => ("array", Some(Box::new(items.manifest())), None),
            ParamShape::Map(vt) => ("map", None, vt.map(ScalarKind::name)),
        };
        ParamManifest {
            name: self.name.clone(),
            r#type: type_name.to_string(),
            required: self.required,
            description: self.description.clone(),
            auth_sources: self
                .auth_services
                .iter()
                .map(|b| b.name.clone())
                .collect(),
            items,
            value_type: value_type.map(str::to_string),
        }
    }

    /// The JSON-Schema projection of this parameter for MCP `inputSchema`.
    #[must_use]
    pub fn mcp_schema(&self) -> Value {
        let mut obj = Map::new();
        obj.insert(
            "description".to_string(),
            Value::String(self.description.clone()),
        );
        match &self.shape {
            ParamShape::Scalar(kind) => {
                obj.insert(
                    "type".to_string(),
                    Value::String(kind.json_schema_type().to_string()),
                );
            }
            ParamShape::Array(items) => {
                obj.insert("type".to_string(), Value::String("array".to_string()));
                obj.insert("items".to_string(), items.mcp_schema());
            }
            ParamShape::Map(value_type) => {
                obj.insert("type".to_string(), Value::String("object".to_string()));
                let additional = match value_type {
                    Some(kind) => Value::Object({
                        let mut m = Map::new();
                        m.insert(
                            "type".to_string(),
                            Value::String(kind.json_schema_type().to_string()),
                        );
                        m
                    }),
                    None => Value::Bool(true),
                };
                obj.insert("additionalProperties".to_string(), additional);
            }
        }
        Value::Object(obj)
    }
}

/// Recursively narrow embedded textual numbers in an untyped map value to
/// their narrowest native form, per the parameter model's `valueType=""`
/// coercion rule. Non-numeric strings and other value kinds pass through.
fn narrow_textual_numbers(value: &Value) -> Value {
    match value {
        Value::String(s) => {
            if let Ok(i) = s.parse::<i64>() {
                Value::Number(Number::from(i))
            } else if let Ok(f) = s.parse::<f64>() {
                Number::from_f64(f).map_or_else(|| value.clone(), Value::Number)
            } else {
                value.clone()
            }
        }
        Value::Object(map) => Value::Object(
            map.iter()
                .map(|(k, v)| (k.clone(), narrow_textual_numbers(v)))
                .collect(),
        ),
        Value::Array(arr) => Value::Array(arr.iter().map(narrow_textual_numbers).collect()),
        other => other.clone(),
    }
}

/// Native manifest projection of one parameter — see [`Parameter::manifest`].
#[derive(Debug, Clone, Serialize)]
pub struct ParamManifest {
    /// Parameter name.
    pub name: String,
    /// Declared type tag.
    pub r#type: String,
    /// Declared `required` flag (not adjusted for `default`; see
    /// [`Parameter::manifest_required`] for the MCP-required computation).
    pub required: bool,
    /// Human-readable description.
    pub description: String,
    /// Auth-service names this parameter is bound to, if any. Named
    /// `authSources` for backward compatibility with the historical
    /// manifest shape, even though the config-side field is `authServices`.
    #[serde(rename = "authSources")]
    pub auth_sources: Vec<String>,
    /// Nested manifest for array items.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<ParamManifest>>,
    /// Declared map value type, if typed.
    #[serde(skip_serializing_if = "Option::is_none", rename = "valueType")]
    pub value_type: Option<String>,
}

/// An ordered list of `{name, value}` pairs — the output of parameter
/// parsing and the input to backend calls. Insertion order equals the
/// tool's declared parameter order.
#[derive(Debug, Clone, Default)]
pub struct ParamValues(Vec<(String, Value)>);

impl ParamValues {
    /// Parse every declared parameter against caller input and claims, in
    /// declaration order, short-circuiting on the first error.
    pub fn parse(parameters: &[Parameter], input: &Map<String, Value>, claims: &ClaimsMap) -> Result<Self> {
        let mut out = Vec::with_capacity(parameters.len());
        for param in parameters {
            if let Some(value) = param.resolve(Some(input), claims)? {
                out.push((param.name.clone(), value));
            }
        }
        Ok(Self(out))
    }

    /// Number of resolved values.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Whether no values were resolved.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Look up a resolved value by parameter name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.0.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    /// Iterate resolved `{name, value}` pairs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Value)> {
        self.0.iter().map(|(n, v)| (n.as_str(), v))
    }

    /// Restrict to the subset of values whose name is in `names`, preserving
    /// relative order. Used to split a combined parse into the
    /// data-parameter and template-parameter subsets.
    #[must_use]
    pub fn subset(&self, names: &[String]) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(n, _)| names.iter().any(|name| name == n))
                .cloned()
                .collect(),
        )
    }

    /// Values in order, discarding names — used for positional binding.
    #[must_use]
    pub fn values(&self) -> Vec<&Value> {
        self.0.iter().map(|(_, v)| v).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn scalar(name: &str, type_: &str, required: bool, default: Option<Value>) -> Parameter {
        let raw = RawParameter {
            name: name.to_string(),
            type_: type_.to_string(),
            description: String::new(),
            required,
            default,
            auth_services: Vec::new(),
            auth_sources: Vec::new(),
            items: None,
            value_type: None,
        };
        Parameter::from_raw(raw, true).unwrap()
    }

    #[test]
    fn required_defaults_true_when_absent() {
        let p = scalar("id", "integer", true, None);
        assert!(p.manifest_required());
    }

    #[test]
    fn default_overrides_manifest_required() {
        let p = scalar("id", "integer", true, Some(json!(1)));
        assert!(!p.manifest_required());
    }

    #[test]
    fn integer_accepts_textual_number_losslessly() {
        let p = scalar("id", "integer", true, None);
        let mut input = Map::new();
        input.insert("id".to_string(), json!("42"));
        let resolved = p.resolve(Some(&input), &ClaimsMap::new()).unwrap();
        assert_eq!(resolved, Some(json!(42)));
    }

    #[test]
    fn boolean_rejects_textual_coercion() {
        let p = scalar("flag", "boolean", true, None);
        let mut input = Map::new();
        input.insert("flag".to_string(), json!("true"));
        assert!(p.resolve(Some(&input), &ClaimsMap::new()).is_err());
    }

    #[test]
    fn required_without_default_or_input_errors() {
        let p = scalar("id", "integer", true, None);
        let err = p.resolve(Some(&Map::new()), &ClaimsMap::new()).unwrap_err();
        assert!(matches!(err, Error::ParamMissing(name) if name == "id"));
    }

    #[test]
    fn auth_bound_ignores_caller_value() {
        let raw = RawParameter {
            name: "email".to_string(),
            type_: "string".to_string(),
            description: String::new(),
            required: true,
            default: None,
            auth_services: vec![AuthBinding {
                name: "gauth".to_string(),
                field: "email".to_string(),
            }],
            auth_sources: Vec::new(),
            items: None,
            value_type: None,
        };
        let p = Parameter::from_raw(raw, true).unwrap();

        let mut input = Map::new();
        input.insert("email".to_string(), json!("caller@example.com"));

        let mut claims = ClaimsMap::new();
        claims.insert("gauth".to_string(), {
            let mut m = HashMap::new();
            m.insert("email".to_string(), json!("svc@acct"));
            m
        });

        let resolved = p.resolve(Some(&input), &claims).unwrap();
        assert_eq!(resolved, Some(json!("svc@acct")));
    }

    #[test]
    fn auth_bound_missing_service_is_generic_error() {
        let raw = RawParameter {
            name: "email".to_string(),
            type_: "string".to_string(),
            description: String::new(),
            required: true,
            default: None,
            auth_services: vec![AuthBinding {
                name: "gauth".to_string(),
                field: "email".to_string(),
            }],
            auth_sources: Vec::new(),
            items: None,
            value_type: None,
        };
        let p = Parameter::from_raw(raw, true).unwrap();
        let err = p.resolve(Some(&Map::new()), &ClaimsMap::new()).unwrap_err();
        assert!(err.to_string().contains("missing or invalid authentication header"));
    }

    #[test]
    fn auth_bound_missing_field_is_specific_error() {
        let raw = RawParameter {
            name: "email".to_string(),
            type_: "string".to_string(),
            description: String::new(),
            required: true,
            default: None,
            auth_services: vec![AuthBinding {
                name: "gauth".to_string(),
                field: "email".to_string(),
            }],
            auth_sources: Vec::new(),
            items: None,
            value_type: None,
        };
        let p = Parameter::from_raw(raw, true).unwrap();
        let mut claims = ClaimsMap::new();
        claims.insert("gauth".to_string(), HashMap::new());
        let err = p.resolve(Some(&Map::new()), &claims).unwrap_err();
        assert!(err.to_string().contains("no field named email in claims"));
    }

    #[test]
    fn array_items_must_be_scalar() {
        let nested = RawParameter {
            name: "items".to_string(),
            type_: "array".to_string(),
            description: String::new(),
            required: true,
            default: None,
            auth_services: Vec::new(),
            auth_sources: Vec::new(),
            items: Some(Box::new(RawParameter {
                name: "inner".to_string(),
                type_: "string".to_string(),
                description: String::new(),
                required: true,
                default: None,
                auth_services: Vec::new(),
                auth_sources: Vec::new(),
                items: None,
                value_type: None,
            })),
            value_type: None,
        };
        let raw = RawParameter {
            name: "outer".to_string(),
            type_: "array".to_string(),
            description: String::new(),
            required: true,
            default: None,
            auth_services: Vec::new(),
            auth_sources: Vec::new(),
            items: Some(Box::new(nested)),
            value_type: None,
        };
        assert!(Parameter::from_raw(raw, true).is_err());
    }

    #[test]
    fn map_without_value_type_narrows_embedded_numbers() {
        let p = scalar("extra", "map", true, None);
        let mut input = Map::new();
        input.insert("extra".to_string(), json!({"count": "7", "label": "x"}));
        let resolved = p.resolve(Some(&input), &ClaimsMap::new()).unwrap().unwrap();
        assert_eq!(resolved, json!({"count": 7, "label": "x"}));
    }

    #[test]
    fn mcp_schema_marks_only_default_free_required_params() {
        let required = scalar("id", "integer", true, None);
        let optional_with_default = scalar("limit", "integer", true, Some(json!(10)));
        let params = vec![required, optional_with_default];
        let schema = crate::manifest::project_mcp_schema("t", "desc", &params);
        let required_field = schema.input_schema.get("required").unwrap().as_array().unwrap();
        assert_eq!(required_field, &vec![json!("id")]);
    }
}
