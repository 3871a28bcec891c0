use anyhow::{Context, Result};
use clap::Parser;
use loqa_asr::{build_collaborators, create_api_router, create_ws_router, AppState, Config, NatsClient};
use std::net::SocketAddr;
use std::time::Duration;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "loqa-asr", about = "Streaming speech transcription gateway")]
struct Cli {
    /// Config file path (without extension)
    #[arg(long, default_value = "config/loqa-asr")]
    config: String,

    /// Bind address for both services
    #[arg(long)]
    host: Option<String>,

    /// WebSocket port
    #[arg(long)]
    ws_port: Option<u16>,

    /// HTTP API port
    #[arg(long)]
    api_port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();
    let mut cfg = Config::load(&cli.config)
        .with_context(|| format!("Failed to load config from {}", cli.config))?;

    if let Some(host) = cli.host {
        cfg.service.http.bind = host.clone();
        cfg.service.websocket.bind = host;
    }
    if let Some(port) = cli.ws_port {
        cfg.service.websocket.port = port;
    }
    if let Some(port) = cli.api_port {
        cfg.service.http.port = port;
    }

    info!("Loqa ASR v{}", env!("CARGO_PKG_VERSION"));
    info!("Loaded config: {}", cfg.service.name);

    let nats = NatsClient::connect(
        &cfg.nats.url,
        &cfg.nats.subject_prefix,
        Duration::from_millis(cfg.nats.request_timeout_ms),
    )
    .await?;
    let collaborators = build_collaborators(&nats, &cfg);

    let ws_addr = format!("{}:{}", cfg.service.websocket.bind, cfg.service.websocket.port);
    let api_addr = format!("{}:{}", cfg.service.http.bind, cfg.service.http.port);

    let state = AppState::new(collaborators, cfg);
    let ws_app = create_ws_router(state.clone());
    let api_app = create_api_router(state);

    let ws_listener = TcpListener::bind(&ws_addr)
        .await
        .with_context(|| format!("Failed to bind WebSocket server to {}", ws_addr))?;
    let api_listener = TcpListener::bind(&api_addr)
        .await
        .with_context(|| format!("Failed to bind HTTP server to {}", api_addr))?;

    info!("WebSocket server listening on ws://{}", ws_addr);
    info!("HTTP API listening on http://{}", api_addr);

    let ws_server = axum::serve(
        ws_listener,
        ws_app.into_make_service_with_connect_info::<SocketAddr>(),
    );
    let api_server = axum::serve(api_listener, api_app);

    tokio::try_join!(
        async { ws_server.await.context("WebSocket server failed") },
        async { api_server.await.context("HTTP server failed") },
    )?;

    nats.close().await?;
    Ok(())
}
