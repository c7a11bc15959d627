use std::time::Duration;

use axum::routing::get;
use axum::Router;
use tokio::sync::{broadcast, mpsc};
use tower_http::cors::CorsLayer;
use vrclub_server::config::ServerConfig;
use vrclub_server::relay::{run_relay, RelayBroadcast, RelayCommand};
use vrclub_server::ws::{ws_handler, AppState};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let config = ServerConfig::default();

    // Validate configuration before starting
    if let Err(e) = config.validate() {
        eprintln!("Invalid server configuration: {}", e);
        std::process::exit(1);
    }

    let (relay_tx, relay_rx) = mpsc::channel::<RelayCommand>(config.command_buffer);
    let (broadcast_tx, _) = broadcast::channel::<RelayBroadcast>(config.broadcast_buffer);

    // Spawn relay actor
    tokio::spawn(async move {
        run_relay(relay_rx, broadcast_tx).await;
    });

    // Axum app
    let app_state = AppState {
        relay_tx,
        ping_interval: Duration::from_secs(config.ping_interval_secs),
    };
    let app = Router::new()
        .route("/ws", get(ws_handler))
        .layer(CorsLayer::permissive())
        .with_state(app_state);

    tracing::info!("Starting club server on {}", config.listen_addr);
    println!("Club server listening on {}", config.listen_addr);

    let listener = tokio::net::TcpListener::bind(&config.listen_addr).await.unwrap();
    axum::serve(listener, app).await.unwrap();
}
