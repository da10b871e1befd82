//! Command-line interface.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// A configuration-driven tool server.
#[derive(Parser, Debug)]
#[command(name = "toolhost")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to the configuration document (YAML).
    #[arg(short, long, env = "TOOLHOST_CONFIG")]
    pub config: Option<PathBuf>,

    /// Host to bind to, overriding the document's `server.host`.
    #[arg(long, env = "TOOLHOST_HOST")]
    pub host: Option<String>,

    /// Port to listen on, overriding the document's `server.port`.
    #[arg(short, long, env = "TOOLHOST_PORT")]
    pub port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, default_value = "info", env = "TOOLHOST_LOG_LEVEL")]
    pub log_level: String,

    /// Log format (text, json).
    #[arg(long, env = "TOOLHOST_LOG_FORMAT")]
    pub log_format: Option<String>,

    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Transport subcommands. Defaults to [`Command::Serve`] when omitted.
#[derive(Subcommand, Debug, Clone, Copy, Default)]
pub enum Command {
    /// Serve the REST and MCP surfaces over HTTP (default).
    #[default]
    Serve,
    /// Serve the MCP JSON-RPC surface over stdio, one request per line.
    McpStdio,
}
