//! `toolhost` — a configuration-driven tool server.
//!
//! An operator declares, in one YAML document, a set of **sources** (typed
//! backend connections) and a set of **tools** (parameterised operations
//! bound to a source). At startup the server validates the document, dials
//! every source, instantiates every tool, and serves invocations over two
//! wire protocols: a native REST/JSON surface and the Model Context
//! Protocol (MCP) JSON-RPC surface used by AI agents.
//!
//! The tool/source abstraction, parameter model, and invocation pipeline
//! live in [`toolhost_core`]; this crate supplies the reference backend
//! adapters ([`adapter`]), the configuration loader ([`config`]), the
//! process-wide registry wiring ([`bootstrap`]), the (reference) auth
//! service verifier ([`auth_service`]), and the dual-protocol dispatcher
//! ([`dispatch`]).

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod adapter;
pub mod auth_service;
pub mod bootstrap;
pub mod cli;
pub mod config;
pub mod dispatch;
pub mod protocol;
pub mod state;

pub use toolhost_core::{Error, Result};

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialise `tracing`: an env-filter layer (defaulting to `level` when
/// `RUST_LOG` is unset) plus either the plain-text or JSON `fmt` layer.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber.with(fmt::layer().json()).init(),
        _ => subscriber.with(fmt::layer()).init(),
    }

    Ok(())
}
