//! Configuration document loading.
//!
//! The document has four top-level sections, parsed in the order the
//! config loader spec requires: `sources`, `authServices`, `tools`,
//! `toolsets`. Kind-specific fields under `sources`/`tools` are left as
//! raw JSON for the relevant registry factory to decode; every other
//! field is strongly typed and strict (`deny_unknown_fields`) so a typo
//! in the document surfaces as a startup error rather than silent data
//! loss. `flatten` and `deny_unknown_fields` cannot coexist on the same
//! struct in serde, so strictness for kind-specific blocks is enforced
//! one level down, inside each adapter's own config struct.
//!
//! The environment overlay is deliberately scoped to its own
//! `TOOLHOST_DOC_` prefix, distinct from the `TOOLHOST_{CONFIG,HOST,PORT,
//! LOG_LEVEL,LOG_FORMAT}` variables [`crate::cli::Cli`] reads. Sharing one
//! `TOOLHOST_` prefix between the two would feed the CLI's own env vars
//! into this document's strict decode (e.g. `TOOLHOST_CONFIG` would surface
//! as a top-level `config` key), tripping `deny_unknown_fields` on every
//! startup that sets `TOOLHOST_CONFIG` instead of `--config`.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use figment::providers::{Env, Format, Yaml};
use figment::Figment;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use toolhost_core::Error;

/// Top-level configuration document.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Ambient server-bind and shutdown settings; not part of the
    /// tool-server data model, but every deployment needs them.
    pub server: ServerConfig,
    /// `name -> {kind, kind-specific fields}`.
    pub sources: HashMap<String, RawBlock>,
    /// `name -> auth service declaration`.
    #[serde(rename = "authServices")]
    pub auth_services: HashMap<String, AuthServiceConfig>,
    /// `name -> {kind, source, description, authRequired?, parameters?,
    /// templateParameters?, kind-specific fields}`.
    pub tools: HashMap<String, RawBlock>,
    /// `name -> [tool name, ...]`.
    pub toolsets: HashMap<String, Vec<String>>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            sources: HashMap::new(),
            auth_services: HashMap::new(),
            tools: HashMap::new(),
            toolsets: HashMap::new(),
        }
    }
}

/// Ambient HTTP server settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Host to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Graceful shutdown drain timeout.
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Maximum request body size, in bytes.
    pub max_body_size: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 5000,
            shutdown_timeout: Duration::from_secs(30),
            max_body_size: 10 * 1024 * 1024,
        }
    }
}

/// A `sources`/`tools` entry: a `kind` tag plus arbitrary kind-specific
/// fields, left raw for the owning registry's factory to decode.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    /// The `kind` tag selecting a registered factory.
    pub kind: String,
    /// Every other field in the block, untouched.
    #[serde(flatten)]
    pub rest: Map<String, Value>,
}

impl RawBlock {
    /// The kind-specific fields as a JSON object, suitable for decoding
    /// into the concrete adapter config struct a factory expects.
    #[must_use]
    pub fn fields(&self) -> Value {
        Value::Object(self.rest.clone())
    }
}

/// An `authServices` entry.
///
/// Identity-provider token verification (OIDC/JWT key fetch, signature
/// checks) is an external collaborator the core never performs; this
/// reference boundary implements only the simplest possible verifier —
/// a static, config-supplied `token -> claims` table — so the rest of
/// the pipeline (claim-bound parameters, `authRequired`) can be
/// exercised end-to-end without a real identity provider.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct AuthServiceConfig {
    /// Verifier kind. Only `"static"` is implemented by this server.
    pub kind: String,
    /// `token -> {claim-field -> value}`, consulted when `kind = "static"`.
    #[serde(default)]
    pub claims: HashMap<String, HashMap<String, Value>>,
}

static NAME_PATTERN: &str = r"^[A-Za-z0-9_-]*$";

impl Config {
    /// Load the configuration document from `path` (if given) merged
    /// over environment variables prefixed `TOOLHOST_DOC_`, then validate
    /// name syntax and cross-section referential integrity.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigInvalid`] if the file is missing, fails to
    /// parse, or fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, Error> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::ConfigInvalid(format!(
                    "config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // Scoped to its own prefix so it never collides with the CLI's
        // `TOOLHOST_CONFIG`/`TOOLHOST_HOST`/`TOOLHOST_PORT`/
        // `TOOLHOST_LOG_LEVEL`/`TOOLHOST_LOG_FORMAT` env vars (see module
        // doc comment). A document override of `server.port` is then set
        // via `TOOLHOST_DOC_SERVER__PORT`, for example.
        figment = figment.merge(Env::prefixed("TOOLHOST_DOC_").split("__"));

        let config: Self = figment
            .extract()
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<(), Error> {
        let name_re = Regex::new(NAME_PATTERN).expect("static regex is valid");

        for name in self.sources.keys() {
            validate_name(&name_re, "source", name)?;
        }
        for name in self.auth_services.keys() {
            validate_name(&name_re, "auth service", name)?;
        }
        for name in self.tools.keys() {
            validate_name(&name_re, "tool", name)?;
        }
        for name in self.toolsets.keys() {
            validate_name(&name_re, "toolset", name)?;
        }

        for (tool_name, tool) in &self.tools {
            let source_name = tool.rest.get("source").and_then(Value::as_str);
            match source_name {
                Some(s) if self.sources.contains_key(s) => {}
                Some(s) => {
                    return Err(Error::ConfigInvalid(format!(
                        "tool \"{tool_name}\" references unknown source \"{s}\""
                    )));
                }
                None => {
                    return Err(Error::ConfigInvalid(format!(
                        "tool \"{tool_name}\" is missing required field \"source\""
                    )));
                }
            }
        }

        for (toolset_name, tool_names) in &self.toolsets {
            for tool_name in tool_names {
                if !self.tools.contains_key(tool_name) {
                    return Err(Error::ConfigInvalid(format!(
                        "toolset \"{toolset_name}\" references unknown tool \"{tool_name}\""
                    )));
                }
            }
        }

        Ok(())
    }
}

fn validate_name(re: &Regex, category: &str, name: &str) -> Result<(), Error> {
    if re.is_match(name) {
        Ok(())
    } else {
        Err(Error::ConfigInvalid(format!(
            "{category} name \"{name}\" must match ^[A-Za-z0-9_-]*$"
        )))
    }
}

/// `humantime`-flavoured `Duration` (de)serialization, matching the
/// teacher's server-config convention (`"30s"`, `"5m"`, `"100ms"`).
mod humantime_serde {
    use std::time::Duration;

    use serde::{self, Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format!("{}s", duration.as_secs()))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s = String::deserialize(deserializer)?;
        if let Some(secs) = s.strip_suffix('s') {
            secs.parse::<u64>().map(Duration::from_secs).map_err(serde::de::Error::custom)
        } else if let Some(mins) = s.strip_suffix('m') {
            mins.parse::<u64>()
                .map(|m| Duration::from_secs(m * 60))
                .map_err(serde::de::Error::custom)
        } else if let Some(ms) = s.strip_suffix("ms") {
            ms.parse::<u64>().map(Duration::from_millis).map_err(serde::de::Error::custom)
        } else {
            s.parse::<u64>().map(Duration::from_secs).map_err(serde::de::Error::custom)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_yaml(contents: &str) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("toolhost.yaml");
        let mut f = std::fs::File::create(&path).unwrap();
        write!(f, "{contents}").unwrap();
        dir
    }

    #[test]
    fn loads_minimal_document() {
        let dir = write_temp_yaml(
            r#"
sources:
  pg:
    kind: postgres
    url: "postgres://localhost/test"
tools:
  echo:
    kind: postgres-sql
    source: pg
    description: "echo"
    statement: "SELECT 1"
toolsets:
  all:
    - echo
"#,
        );
        let config = Config::load(Some(&dir.path().join("toolhost.yaml"))).unwrap();
        assert_eq!(config.sources.len(), 1);
        assert_eq!(config.tools.len(), 1);
        assert_eq!(config.toolsets["all"], vec!["echo".to_string()]);
    }

    #[test]
    fn rejects_tool_referencing_unknown_source() {
        let dir = write_temp_yaml(
            r#"
tools:
  echo:
    kind: postgres-sql
    source: missing
    description: "echo"
    statement: "SELECT 1"
"#,
        );
        let err = Config::load(Some(&dir.path().join("toolhost.yaml"))).unwrap_err();
        assert!(err.to_string().contains("unknown source"));
    }

    #[test]
    fn rejects_toolset_referencing_unknown_tool() {
        let dir = write_temp_yaml(
            r#"
toolsets:
  all:
    - ghost
"#,
        );
        let err = Config::load(Some(&dir.path().join("toolhost.yaml"))).unwrap_err();
        assert!(err.to_string().contains("unknown tool"));
    }

    #[test]
    fn rejects_invalid_name() {
        let dir = write_temp_yaml(
            r#"
sources:
  "bad name!":
    kind: postgres
"#,
        );
        let err = Config::load(Some(&dir.path().join("toolhost.yaml"))).unwrap_err();
        assert!(err.to_string().contains("must match"));
    }

    #[test]
    fn rejects_unknown_top_level_key() {
        let dir = write_temp_yaml(
            r#"
unexpected_section:
  foo: bar
"#,
        );
        let err = Config::load(Some(&dir.path().join("toolhost.yaml"))).unwrap_err();
        assert!(err.to_string().to_lowercase().contains("unexpected_section") || err.to_string().contains("unknown field"));
    }
}
