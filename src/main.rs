//! `toolhost` binary entry point: parse the CLI, load configuration, build
//! the runtime, and serve.

use std::process::ExitCode;
use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::compression::CompressionLayer;
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use tracing::{error, info};

use toolhost::cli::{Cli, Command};
use toolhost::config::{Config, ServerConfig};
use toolhost::state::AppState;
use toolhost::{bootstrap, dispatch, setup_tracing};
use toolhost_core::Context;

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("failed to set up tracing: {e}");
        return ExitCode::FAILURE;
    }

    let mut config = match Config::load(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "failed to load configuration");
            return ExitCode::FAILURE;
        }
    };

    if let Some(ref host) = cli.host {
        config.server.host = host.clone();
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        version = env!("CARGO_PKG_VERSION"),
        sources = config.sources.len(),
        tools = config.tools.len(),
        toolsets = config.toolsets.len(),
        "starting toolhost"
    );

    let (source_registry, tool_registry) = bootstrap::register_builtin_factories();
    let boot_ctx = Context::new("bootstrap");
    let runtime = match bootstrap::build(&boot_ctx, &config, &source_registry, &tool_registry).await {
        Ok(runtime) => runtime,
        Err(e) => {
            error!(error = %e, "failed to build runtime from configuration");
            return ExitCode::FAILURE;
        }
    };

    info!(
        tools = runtime.tools.len(),
        toolsets = runtime.toolsets.len(),
        "runtime ready"
    );

    let state = Arc::new(AppState::new(runtime, config.auth_services.clone()));

    match cli.command.unwrap_or_default() {
        Command::McpStdio => {
            info!("serving MCP over stdio");
            if let Err(e) = dispatch::mcp::serve_stdio(state).await {
                error!(error = %e, "stdio MCP loop failed");
                return ExitCode::FAILURE;
            }
        }
        Command::Serve => {
            if let Err(e) = serve_http(state, &config.server).await {
                error!(error = %e, "server error");
                return ExitCode::FAILURE;
            }
        }
    }

    info!("toolhost shutdown complete");
    ExitCode::SUCCESS
}

async fn serve_http(state: Arc<AppState>, server: &ServerConfig) -> std::io::Result<()> {
    let app = dispatch::rest::router(state.clone())
        .merge(dispatch::mcp::router(state))
        .layer(TraceLayer::new_for_http())
        .layer(CompressionLayer::new())
        .layer(TimeoutLayer::new(Duration::from_secs(30)))
        .layer(CatchPanicLayer::new())
        .layer(RequestBodyLimitLayer::new(server.max_body_size));

    let addr = format!("{}:{}", server.host, server.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(%addr, "listening");

    let shutdown_timeout = server.shutdown_timeout;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(shutdown_timeout))
        .await
}

async fn shutdown_signal(drain_timeout: Duration) {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!(?drain_timeout, "shutdown signal received, draining in-flight requests");

    // axum waits indefinitely for in-flight requests to finish once this
    // future resolves; bound that wait by the configured drain timeout so a
    // stuck backend call can't hang the process forever.
    tokio::spawn(async move {
        tokio::time::sleep(drain_timeout).await;
        error!("drain timeout elapsed, forcing exit");
        std::process::exit(1);
    });
}
