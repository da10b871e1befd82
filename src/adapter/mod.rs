//! Reference backend adapters: one [`toolhost_core::source::SourceFactory`]
//! / [`toolhost_core::tool::ToolFactory`] pair per backend family, wired
//! into the process-wide registries by [`crate::bootstrap`].

pub mod http;
pub mod mcp_gateway;
pub mod postgres;
