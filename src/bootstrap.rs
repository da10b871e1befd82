//! Wires the process-wide registries (C2/C3) to the reference adapters and
//! materialises a loaded [`Config`] into the runtime objects the
//! dispatchers serve: sources, tools, and toolsets.
//!
//! Per Design Notes §9 "process-wide registry", factory registration is an
//! explicit batch call made once in `main` before config parsing, rather
//! than relying on module-init side effects.

use std::collections::HashMap;
use std::sync::Arc;

use toolhost_core::source::{SourceFactory, SourceRegistry};
use toolhost_core::tool::{Tool, ToolFactory, ToolRegistry};
use toolhost_core::{Context, Error, Result, SourceMap, Toolset};

use crate::adapter::{http, mcp_gateway, postgres};
use crate::config::Config;

/// The materialised runtime state produced by [`build`]: every source kept
/// alive for the process lifetime, every tool bound to one, and every
/// named toolset.
pub struct Runtime {
    /// Materialised sources, keyed by name.
    pub sources: SourceMap,
    /// Materialised tools, keyed by name.
    pub tools: HashMap<String, Arc<Tool>>,
    /// Materialised toolsets, keyed by name.
    pub toolsets: HashMap<String, Arc<Toolset>>,
}

/// Register the three reference adapter families. Registering a duplicate
/// `kind` is a fatal configuration error, surfaced here as a panic since it
/// can only happen from a programming mistake in this function, never from
/// operator input.
#[must_use]
pub fn register_builtin_factories() -> (SourceRegistry, ToolRegistry) {
    let mut sources = SourceRegistry::new();
    let mut tools = ToolRegistry::new();

    let source_factories: Vec<Arc<dyn SourceFactory>> = vec![
        Arc::new(postgres::PostgresSourceFactory),
        Arc::new(http::HttpSourceFactory),
        Arc::new(mcp_gateway::McpGatewaySourceFactory),
    ];
    for factory in source_factories {
        sources
            .register(factory)
            .expect("builtin source factory kinds must be unique");
    }

    let tool_factories: Vec<Arc<dyn ToolFactory>> = vec![
        Arc::new(postgres::PostgresSqlToolFactory),
        Arc::new(http::HttpToolFactory),
        Arc::new(mcp_gateway::McpProxyToolFactory),
    ];
    for factory in tool_factories {
        tools
            .register(factory)
            .expect("builtin tool factory kinds must be unique");
    }

    (sources, tools)
}

/// Build sources, then tools, then toolsets from a loaded, validated
/// [`Config`] document — the ordering the config loader spec requires.
pub async fn build(
    ctx: &Context,
    config: &Config,
    source_registry: &SourceRegistry,
    tool_registry: &ToolRegistry,
) -> Result<Runtime> {
    let source_entries: Vec<(String, String, serde_json::Value)> = config
        .sources
        .iter()
        .map(|(name, block)| (name.clone(), block.kind.clone(), block.fields()))
        .collect();
    let sources = source_registry.build_all(ctx, source_entries).await?;

    let tool_entries: Vec<(String, String, serde_json::Value)> = config
        .tools
        .iter()
        .map(|(name, block)| (name.clone(), block.kind.clone(), block.fields()))
        .collect();
    let tools = tool_registry.build_all(tool_entries, &sources).await?;

    let mut toolsets = HashMap::with_capacity(config.toolsets.len());
    for (name, tool_names) in &config.toolsets {
        let toolset = Toolset::build(name.clone(), tool_names, &tools)
            .map_err(|e| Error::ConfigInvalid(e.to_string()))?;
        toolsets.insert(name.clone(), Arc::new(toolset));
    }

    Ok(Runtime {
        sources,
        tools,
        toolsets,
    })
}
