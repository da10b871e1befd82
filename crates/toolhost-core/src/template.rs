//! A minimal text-template engine for interpolating template parameters into
//! a tool's backend-specific statement or request body.
//!
//! Deliberately small: the only placeholder form is `{{.name}}`, plus two
//! whitelisted helper calls, `{{array .name}}` (comma-joins a string array)
//! and `{{json .name}}` (renders any value as JSON). Templates operate on a
//! map of already-parsed [`Value`]s, never on raw caller input, and must
//! never substitute for proper parameter binding of data values.

use serde_json::Value;
use std::collections::HashMap;

use crate::error::{Error, Result};

/// Render `template`, substituting each `{{.name}}` / `{{array .name}}` /
/// `{{json .name}}` placeholder from `values`.
///
/// Returns [`Error::Internal`] if the template references a name absent
/// from `values` — callers are expected to pre-populate `values` with
/// exactly the tool's declared template parameters, so a miss here means a
/// template referenced a name outside that set (a configuration/test-time
/// error per the template-scoping invariant).
pub fn render(template: &str, values: &HashMap<String, Value>) -> Result<String> {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find("{{") {
        out.push_str(&rest[..start]);
        let after = &rest[start + 2..];
        let end = after.find("}}").ok_or_else(|| {
            Error::Internal("unterminated template placeholder \"{{\"".to_string())
        })?;
        let expr = after[..end].trim();
        out.push_str(&render_expr(expr, values)?);
        rest = &after[end + 2..];
    }
    out.push_str(rest);
    Ok(out)
}

fn render_expr(expr: &str, values: &HashMap<String, Value>) -> Result<String> {
    if let Some(name) = expr.strip_prefix('.') {
        return lookup(name, values).map(render_scalar);
    }
    if let Some(name) = expr.strip_prefix("array ") {
        let name = name.trim().trim_start_matches('.');
        let value = lookup(name, values)?;
        return render_array(name, value);
    }
    if let Some(name) = expr.strip_prefix("json ") {
        let name = name.trim().trim_start_matches('.');
        let value = lookup(name, values)?;
        return serde_json::to_string(value)
            .map_err(|e| Error::Internal(format!("failed to render template value as json: {e}")));
    }
    Err(Error::Internal(format!(
        "unsupported template expression \"{{{{{expr}}}}}\""
    )))
}

fn lookup<'a>(name: &str, values: &'a HashMap<String, Value>) -> Result<&'a Value> {
    values.get(name).ok_or_else(|| {
        Error::Internal(format!(
            "template referenced undeclared template parameter \"{name}\""
        ))
    })
}

fn render_scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

fn render_array(name: &str, value: &Value) -> Result<String> {
    match value {
        Value::Array(items) => Ok(items
            .iter()
            .map(render_scalar)
            .collect::<Vec<_>>()
            .join(",")),
        other => Err(Error::Internal(format!(
            "template helper \"array\" applied to non-array template parameter \"{name}\" ({other})"
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn interpolates_scalar() {
        let mut values = HashMap::new();
        values.insert("tableName".to_string(), json!("widgets"));
        let rendered = render("SELECT * FROM {{.tableName}} WHERE id=$1", &values).unwrap();
        assert_eq!(rendered, "SELECT * FROM widgets WHERE id=$1");
    }

    #[test]
    fn array_helper_comma_joins() {
        let mut values = HashMap::new();
        values.insert("ids".to_string(), json!(["a", "b", "c"]));
        let rendered = render("WHERE id IN ({{array .ids}})", &values).unwrap();
        assert_eq!(rendered, "WHERE id IN (a,b,c)");
    }

    #[test]
    fn undeclared_reference_is_an_error() {
        let values = HashMap::new();
        let err = render("{{.missing}}", &values).unwrap_err();
        assert!(err.to_string().contains("missing"));
    }
}
