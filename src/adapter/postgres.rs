//! Reference SQL adapter: a Postgres source and the `postgres-sql` tool
//! kind bound to it.

use std::any::Any;
use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Map, Number, Value};
use sqlx::postgres::{PgColumn, PgPoolOptions, PgRow};
use sqlx::{Column, Row, TypeInfo};
use tracing::{debug, info};

use toolhost_core::context::Context;
use toolhost_core::error::{Error, Result};
use toolhost_core::param::{ParamValues, Parameter};
use toolhost_core::source::{Source, SourceFactory, SourceMap};
use toolhost_core::tool::{InvokeResult, Tool, ToolFactory, ToolInvoker};

/// A dialed Postgres connection pool, shared by every `postgres-sql` tool
/// bound to it.
pub struct PostgresSource {
    name: String,
    pool: sqlx::PgPool,
}

impl PostgresSource {
    /// The underlying pool, recovered by [`PostgresSqlToolFactory`] via
    /// [`Source::as_any`].
    #[must_use]
    pub fn pool(&self) -> &sqlx::PgPool {
        &self.pool
    }
}

impl Source for PostgresSource {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> &str {
        "postgres"
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PostgresSourceConfig {
    url: String,
    #[serde(default = "default_max_connections")]
    max_connections: u32,
}

fn default_max_connections() -> u32 {
    5
}

/// Builds [`PostgresSource`]s from `{url, maxConnections?}` blocks.
pub struct PostgresSourceFactory;

#[async_trait]
impl SourceFactory for PostgresSourceFactory {
    fn kind(&self) -> &'static str {
        "postgres"
    }

    async fn build(&self, _ctx: &Context, name: &str, raw: Value) -> Result<Arc<dyn Source>> {
        let cfg: PostgresSourceConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("source \"{name}\": {e}")))?;

        let pool = PgPoolOptions::new()
            .max_connections(cfg.max_connections)
            .connect(&cfg.url)
            .await
            .map_err(|e| {
                Error::ConfigInvalid(format!("source \"{name}\": failed to connect: {e}"))
            })?;

        info!(source = name, "dialed postgres source");
        Ok(Arc::new(PostgresSource {
            name: name.to_string(),
            pool,
        }))
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct PostgresSqlToolConfig {
    source: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    auth_required: Vec<String>,
    #[serde(default)]
    parameters: Vec<Parameter>,
    #[serde(default)]
    template_parameters: Vec<Parameter>,
    statement: String,
}

/// Builds `postgres-sql` tools: one statement, bound positionally to the
/// tool's declared data parameters, against a [`PostgresSource`].
pub struct PostgresSqlToolFactory;

#[async_trait]
impl ToolFactory for PostgresSqlToolFactory {
    fn kind(&self) -> &'static str {
        "postgres-sql"
    }

    fn compatible_sources(&self) -> &'static [&'static str] {
        &["postgres"]
    }

    async fn build(&self, name: &str, raw: Value, sources: &SourceMap) -> Result<Arc<Tool>> {
        let cfg: PostgresSqlToolConfig = serde_json::from_value(raw)
            .map_err(|e| Error::ConfigInvalid(format!("tool \"{name}\": {e}")))?;

        let source = sources.get(&cfg.source).ok_or_else(|| {
            Error::ConfigInvalid(format!(
                "tool \"{name}\": unknown source \"{}\"",
                cfg.source
            ))
        })?;
        let pg_source = source
            .as_any()
            .downcast_ref::<PostgresSource>()
            .ok_or_else(|| {
                Error::ConfigInvalid(format!(
                    "tool \"{name}\": source \"{}\" (kind \"{}\") is not a postgres source",
                    cfg.source,
                    source.kind()
                ))
            })?;

        let invoker = Arc::new(PostgresSqlInvoker {
            pool: pg_source.pool().clone(),
            statement: cfg.statement,
        });

        let tool = Tool::new(
            name.to_string(),
            self.kind().to_string(),
            cfg.description,
            cfg.source,
            cfg.auth_required,
            cfg.parameters,
            cfg.template_parameters,
            invoker,
        )?;
        Ok(Arc::new(tool))
    }
}

/// SELECT vs everything-else classification of a rendered statement, used
/// only to pick the zero-row result text (Open Question (b)): this server
/// has no live dry-run/EXPLAIN hop, so classification is a lexical
/// heuristic on the first non-comment keyword rather than a round-trip to
/// the backend. A statement opening with a CTE (`WITH ...`) is treated as
/// SELECT, matching the common case of a read query built from one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Classification {
    Select,
    NonSelect,
}

fn classify_statement(statement: &str) -> Classification {
    let first_word = statement
        .trim_start()
        .split(|c: char| c.is_whitespace() || c == '(')
        .find(|w| !w.is_empty())
        .unwrap_or("")
        .to_ascii_uppercase();
    match first_word.as_str() {
        "SELECT" | "WITH" | "TABLE" => Classification::Select,
        _ => Classification::NonSelect,
    }
}

struct PostgresSqlInvoker {
    pool: sqlx::PgPool,
    statement: String,
}

#[async_trait]
impl ToolInvoker for PostgresSqlInvoker {
    async fn invoke(&self, ctx: &Context, data: &ParamValues, template: &ParamValues) -> Result<InvokeResult> {
        let statement = render_statement(&self.statement, template)?;
        let classification = classify_statement(&statement);

        debug!(request_id = ctx.request_id(), %statement, "executing postgres-sql tool");

        let mut query = sqlx::query(&statement);
        for value in data.values() {
            query = bind_json_value(query, value)?;
        }

        let cancellation = ctx.cancellation();
        let rows = tokio::select! {
            result = query.fetch_all(&self.pool) => {
                result.map_err(|e| Error::BackendError(e.to_string()))?
            }
            () = cancellation.cancelled() => {
                return Err(Error::BackendError("request cancelled".to_string()));
            }
        };

        if rows.is_empty() {
            let text = match classification {
                Classification::Select => "The query returned 0 rows.",
                Classification::NonSelect => "Query executed successfully and returned no content.",
            };
            return Ok(InvokeResult::Text(text.to_string()));
        }

        let mapped = rows.iter().map(row_to_map).collect::<Result<Vec<_>>>()?;
        Ok(InvokeResult::Rows(mapped))
    }
}

fn render_statement(statement: &str, template: &ParamValues) -> Result<String> {
    if statement.contains("{{") {
        let values = template
            .iter()
            .map(|(n, v)| (n.to_string(), v.clone()))
            .collect();
        toolhost_core::template::render(statement, &values)
    } else {
        Ok(statement.to_string())
    }
}

type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, sqlx::postgres::PgArguments>;

fn bind_json_value<'q>(query: PgQuery<'q>, value: &'q Value) -> Result<PgQuery<'q>> {
    match value {
        Value::Null => Ok(query.bind(None::<String>)),
        Value::Bool(b) => Ok(query.bind(*b)),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                Ok(query.bind(i))
            } else if let Some(f) = n.as_f64() {
                Ok(query.bind(f))
            } else {
                Err(Error::BackendError(format!(
                    "cannot bind numeric literal {n} as a SQL parameter"
                )))
            }
        }
        Value::String(s) => Ok(query.bind(s.as_str())),
        Value::Array(_) | Value::Object(_) => Ok(query.bind(sqlx::types::Json(value.clone()))),
    }
}

fn row_to_map(row: &PgRow) -> Result<Map<String, Value>> {
    let mut map = Map::with_capacity(row.columns().len());
    for (i, column) in row.columns().iter().enumerate() {
        map.insert(column.name().to_string(), decode_column(row, i, column)?);
    }
    Ok(map)
}

fn decode_column(row: &PgRow, i: usize, column: &PgColumn) -> Result<Value> {
    let type_name = column.type_info().name();
    let as_json = |r: sqlx::Result<Option<Value>>| {
        r.map(|v| v.unwrap_or(Value::Null))
            .map_err(|e| Error::BackendError(format!("column \"{}\": {e}", column.name())))
    };

    match type_name {
        "BOOL" => as_json(row.try_get::<Option<bool>, _>(i).map(|v| v.map(Value::Bool))),
        "INT2" | "INT4" => as_json(
            row.try_get::<Option<i32>, _>(i)
                .map(|v| v.map(|n| Value::Number(Number::from(n)))),
        ),
        "INT8" => as_json(
            row.try_get::<Option<i64>, _>(i)
                .map(|v| v.map(|n| Value::Number(Number::from(n)))),
        ),
        "FLOAT4" | "FLOAT8" | "NUMERIC" => as_json(
            row.try_get::<Option<f64>, _>(i)
                .map(|v| v.and_then(|f| Number::from_f64(f).map(Value::Number))),
        ),
        "JSON" | "JSONB" => as_json(row.try_get::<Option<Value>, _>(i)),
        "TIMESTAMP" | "TIMESTAMPTZ" | "DATE" | "TIME" => as_json(
            row.try_get::<Option<chrono::NaiveDateTime>, _>(i)
                .map(|v| v.map(|dt| Value::String(dt.to_string())))
                .or_else(|_| {
                    row.try_get::<Option<String>, _>(i)
                        .map(|v| v.map(Value::String))
                }),
        ),
        _ => as_json(
            row.try_get::<Option<String>, _>(i)
                .map(|v| v.map(Value::String)),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_select() {
        assert_eq!(classify_statement("  select 1"), Classification::Select);
        assert_eq!(
            classify_statement("WITH t AS (SELECT 1) SELECT * FROM t"),
            Classification::Select
        );
    }

    #[test]
    fn classifies_non_select() {
        assert_eq!(
            classify_statement("INSERT INTO t VALUES (1)"),
            Classification::NonSelect
        );
        assert_eq!(
            classify_statement("update t set x=1"),
            Classification::NonSelect
        );
    }

    #[test]
    fn renders_template_only_when_placeholder_present() {
        let values = ParamValues::default();
        assert_eq!(
            render_statement("SELECT 1", &values).unwrap(),
            "SELECT 1"
        );
    }
}
