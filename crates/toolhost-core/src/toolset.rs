//! Toolset (C3 data model): a named subset of tools, consulted only to
//! answer MCP `tools/list` queries scoped to that subset.

use std::collections::HashMap;
use std::sync::Arc;

use crate::error::{Error, Result};
use crate::tool::Tool;

/// A named, immutable subset of tools.
pub struct Toolset {
    /// Toolset name.
    pub name: String,
    tools: Vec<Arc<Tool>>,
}

impl Toolset {
    /// Build a toolset by resolving `tool_names` against the materialised
    /// tool map. Any unresolved name is a fatal configuration error.
    pub fn build(name: String, tool_names: &[String], tools: &HashMap<String, Arc<Tool>>) -> Result<Self> {
        let mut resolved = Vec::with_capacity(tool_names.len());
        for tool_name in tool_names {
            let tool = tools
                .get(tool_name)
                .ok_or_else(|| Error::ConfigInvalid(format!("toolset \"{name}\" references unknown tool \"{tool_name}\"")))?;
            resolved.push(Arc::clone(tool));
        }
        Ok(Self { name, tools: resolved })
    }

    /// The tools in this toolset, in configured order.
    #[must_use]
    pub fn tools(&self) -> &[Arc<Tool>] {
        &self.tools
    }
}
