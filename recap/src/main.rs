// Copyright 2026 The Recap Project
// SPDX-License-Identifier: Apache-2.0

use clap::Parser;
use recap::config::{self, ConfigSource};
use recap::server;

use std::net::SocketAddr;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "recap", about = "Streams language-model summaries of web pages")]
struct Cli {
    /// Path to the recap.yaml config file
    #[arg(long, default_value = "recap.yaml", env = "RECAP_CONFIG")]
    config: String,

    /// Port to listen on. Overrides server.port from the config.
    #[arg(long, env = "RECAP_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() {
    // A missing .env is fine; variables may come from the real environment.
    let dotenv = dotenvy::dotenv();

    tracing_subscriber::fmt()
        .json()
        .with_target(false)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "loaded .env");
    }

    let cli = Cli::parse();

    let source = config::FileSource::new(&cli.config);
    let config = match config::load_config(&source) {
        Ok(c) => c,
        Err(e) => {
            tracing::error!(source = %source.describe(), "failed to load config: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(
        version = %config.version,
        config_hash = %config.config_hash,
        model = %config.completion.model,
        base_url = %config.completion.base_url,
        open_marker = %config.markers.open,
        close_marker = %config.markers.close,
        "config loaded"
    );

    let state = match server::AppState::from_config(&config, reqwest::Client::new()) {
        Ok(s) => s,
        Err(e) => {
            tracing::error!("failed to initialize: {e}");
            std::process::exit(1);
        }
    };
    let app = server::build_router(state);

    let addr = SocketAddr::new(config.server.bind, cli.port.unwrap_or(config.server.port));
    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            tracing::error!(%addr, "failed to bind: {e}");
            std::process::exit(1);
        }
    };

    tracing::info!(%addr, "recap listening");

    if let Err(e) = axum::serve(listener, app).await {
        tracing::error!("server error: {e}");
        std::process::exit(1);
    }
}
