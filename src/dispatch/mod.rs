//! The dual-protocol dispatcher (C8/C9): REST endpoints plus the MCP
//! JSON-RPC subset, both built over the same [`crate::state::AppState`]
//! and reusing the core's invocation pipeline.

pub mod mcp;
pub mod rest;
