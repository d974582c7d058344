// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Lookout server binary.
//!
//! Hosts the backend core behind an HTTP/SSE surface for the browser UI.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use clap::Parser;
use lo_adapters::ClaudeLauncher;
use lo_core::UserConfig;
use lo_daemon::{env, lifecycle, Config};
use std::path::PathBuf;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(name = "lookout", about = "Local viewer/controller for Claude Code sessions")]
struct Args {
    /// Port to listen on
    #[arg(long)]
    port: Option<u16>,

    /// Hostname to bind
    #[arg(long)]
    hostname: Option<String>,

    /// Password protecting the API (Bearer token)
    #[arg(long)]
    password: Option<String>,

    /// Path to the agent executable
    #[arg(long)]
    executable: Option<PathBuf>,

    /// The agent's state directory (default: ~/.claude)
    #[arg(long, value_name = "DIR")]
    claude_dir: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    let state_dir = env::state_dir();
    std::fs::create_dir_all(&state_dir)?;
    setup_logging(&state_dir)?;

    // Background task panics must never take the server down; they are
    // logged and the task dies alone.
    std::panic::set_hook(Box::new(|info| {
        tracing::error!("background panic: {info}");
    }));

    let projects_dir = args
        .claude_dir
        .map(|dir| dir.join("projects"))
        .unwrap_or_else(lo_adapters::env::projects_dir);
    let port = args.port.unwrap_or_else(env::port);
    let hostname = args.hostname.unwrap_or_else(env::hostname);
    let password = args.password.or_else(env::password);

    let launcher = ClaudeLauncher::discover(args.executable).await?;

    let config = Config {
        projects_dir,
        state_dir,
        user_config: UserConfig::default(),
        password,
    };
    let mut daemon = lifecycle::startup(config, launcher).await?;
    let app = daemon.router();

    let addr = format!("{hostname}:{port}");
    let tcp = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!(%addr, "listening");

    axum::serve(tcp, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    daemon.shutdown();
    Ok(())
}

async fn shutdown_signal() {
    use tokio::signal::unix::{signal, SignalKind};
    let mut sigterm = match signal(SignalKind::terminate()) {
        Ok(sigterm) => sigterm,
        Err(e) => {
            tracing::warn!(error = %e, "failed to install SIGTERM handler");
            let _ = tokio::signal::ctrl_c().await;
            return;
        }
    };
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {}
        _ = sigterm.recv() => {}
    }
    tracing::info!("shutdown signal received");
}

/// Log to stderr and to a rolling file under the state directory.
fn setup_logging(state_dir: &std::path::Path) -> std::io::Result<()> {
    let file_appender = tracing_appender::rolling::daily(state_dir.join("logs"), "lookout.log");
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(fmt::layer().with_ansi(false).with_writer(file_appender))
        .init();
    Ok(())
}
