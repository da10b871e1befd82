//! Tool/source abstraction, configuration-to-runtime binding primitives,
//! and the invocation pipeline shared by every `toolhost` adapter.
//!
//! This crate is the core described in the tool-server specification: the
//! parameter model (C1), the source and tool registries (C2/C3), the
//! invocation pipeline (C5), the authorization gate (C6), and the manifest
//! projector (C7). Concrete backend adapters, the config document loader,
//! and the REST/MCP dispatchers live in the `toolhost` binary crate, which
//! depends on this one.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod auth;
pub mod context;
pub mod error;
pub mod manifest;
pub mod param;
pub mod pipeline;
pub mod source;
pub mod template;
pub mod tool;
pub mod toolset;

pub use context::Context;
pub use error::{Error, Result};
pub use param::{AuthBinding, ClaimsMap, ParamValues, Parameter, ScalarKind};
pub use source::{Source, SourceFactory, SourceMap, SourceRegistry};
pub use tool::{InvokeResult, Tool, ToolFactory, ToolInvoker, ToolRegistry};
pub use toolset::Toolset;
