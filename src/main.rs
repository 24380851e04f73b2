#![cfg_attr(not(test), deny(clippy::panic))]

use clap::Parser;
use maze_hunt_server::config;
use maze_hunt_server::logging;
use maze_hunt_server::websocket::{self, AppState};
use std::net::SocketAddr;

/// Maze Hunt -- authoritative WebSocket server for a realtime multiplayer
/// maze game
#[derive(Parser, Debug)]
#[command(name = "maze-hunt-server")]
#[command(about = "Authoritative in-memory WebSocket server for a realtime multiplayer maze game")]
#[command(version)]
struct Cli {
    /// Validate configuration and exit without starting the server.
    /// Useful for CI/CD pipelines and pre-deployment checks.
    #[arg(long, short = 'c', conflicts_with = "print_config")]
    validate_config: bool,

    /// Print the loaded configuration to stdout (as JSON) and exit.
    /// Useful for debugging configuration loading from multiple sources.
    #[arg(long, conflicts_with = "validate_config")]
    print_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Load configuration from config.json and the environment; code
    // defaults otherwise.
    let cfg = config::load();

    if cli.print_config {
        let json = serde_json::to_string_pretty(&cfg)
            .map_err(|e| anyhow::anyhow!("Failed to serialize config: {e}"))?;
        println!("{json}");
        return Ok(());
    }

    // config::load() already validates warn-only; here the result decides
    // the exit code.
    let validation_result = config::validate_config(&cfg);

    if cli.validate_config {
        match validation_result {
            Ok(()) => {
                println!("Configuration validation passed");
                println!();
                println!("Configuration summary:");
                println!("  Port: {}", cfg.port);
                println!("  Production mode: {}", cfg.security.production);
                println!("  CORS origins: {}", cfg.security.cors_origins);
                println!("  Max players per room: {}", cfg.server.default_max_players);
                println!("  Game duration: {} ms", cfg.game.game_total_duration_ms);
                println!("  Reconnect grace: {} ms", cfg.game.reconnect_grace_ms);
                return Ok(());
            }
            Err(e) => {
                eprintln!("Configuration validation failed:\n{e}");
                std::process::exit(1);
            }
        }
    }

    validation_result?;

    logging::init_with_config(&cfg.logging);

    let port: u16 = cfg.port;
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!(%addr, "Starting Maze Hunt server");

    let cors_origins = cfg.security.cors_origins.clone();
    let cors_methods = cfg.security.cors_methods.clone();
    let state = AppState::new(cfg);

    let router = websocket::create_router(&cors_origins, &cors_methods).with_state(state);
    let make_service = router.into_make_service_with_connect_info::<SocketAddr>();

    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(
        %addr,
        cors_origins = %cors_origins,
        "Server started - WebSocket: /ws, Health: /healthz, Metrics: /metrics"
    );

    axum::serve(listener, make_service)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::error!(error = %err, "Failed to listen for shutdown signal");
        return;
    }
    tracing::info!("Shutdown signal received");
}
