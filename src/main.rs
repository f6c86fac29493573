//! Group chat server - Entry Point
//!
//! Loads configuration, starts the Hub actor and accepts WebSocket connections.

use std::env;
use std::sync::Arc;

use tokio::net::TcpListener;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use chat_hub::{handle_connection, ChatService, Config, Hub, MemoryService, ServerContext};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Use RUST_LOG env var to control log level
    // e.g., RUST_LOG=debug or RUST_LOG=chat_hub=trace
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("chat_hub=info")),
        )
        .init();

    // Optional config file path as the first argument
    let config = match env::args().nth(1) {
        Some(path) => {
            info!("Loading config from {}", path);
            Config::load(&path)?
        }
        None => Config::default(),
    }
    .with_env_overrides();
    config.warn_on_weak_settings();
    let config = Arc::new(config);

    let service: Arc<dyn ChatService> =
        Arc::new(MemoryService::new(config.service.encryption_key.as_bytes()));

    let (hub, hub_handle) = Hub::new(service.clone(), &config.hub);
    tokio::spawn(hub.run());
    info!("Hub actor started");

    // Make stored rooms known to the hub before accepting joins
    match service.get_all_chat_rooms().await {
        Ok(rooms) => {
            for room in rooms {
                hub_handle.open_room(room.id, room.name).await?;
            }
        }
        Err(e) => warn!("Could not load rooms at startup: {}", e),
    }

    let listener = TcpListener::bind(&config.server.addr).await?;
    info!("Chat server listening on {}", config.server.addr);

    let ctx = ServerContext {
        hub: hub_handle,
        service,
        config,
    };

    // Connection accept loop
    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                info!("New connection from {}", addr);
                let ctx = ctx.clone();

                // Spawn handler task for each connection
                tokio::spawn(async move {
                    if let Err(e) = handle_connection(stream, ctx).await {
                        error!("Connection handler error: {}", e);
                    }
                });
            }
            Err(e) => {
                error!("Failed to accept connection: {}", e);
            }
        }
    }
}
