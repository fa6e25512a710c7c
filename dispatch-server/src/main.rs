use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use dispatch_server::clock::SystemClock;
use dispatch_server::dispatch::{DispatchConfig, DispatchService};
use dispatch_server::routing::{HaversineRouting, MotisClient, MotisConfig, RoutingBackend};
use dispatch_server::store::{MemoryStore, Records};
use dispatch_server::web::{AppState, create_router};

/// Default bind address.
const DEFAULT_ADDR: &str = "127.0.0.1:3000";

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = DispatchConfig::default();

    let router = match std::env::var("DISPATCH_ROUTING").as_deref() {
        Ok("haversine") => {
            info!("using straight-line routing");
            RoutingBackend::Haversine(HaversineRouting {
                max_travel: config.max_travel(),
                ..HaversineRouting::default()
            })
        }
        _ => {
            let motis = match std::env::var("MOTIS_BASE_URL") {
                Ok(url) => MotisConfig::new(url),
                Err(_) => {
                    warn!("MOTIS_BASE_URL not set, using the public MOTIS instance");
                    MotisConfig::default()
                }
            };
            RoutingBackend::Motis(MotisClient::new(motis.with_max_travel(config.max_travel_secs))?)
        }
    };

    let store = match std::env::var_os("DISPATCH_SNAPSHOT").map(PathBuf::from) {
        Some(path) => MemoryStore::load(&path)?,
        None => {
            warn!("DISPATCH_SNAPSHOT not set, starting without vehicles");
            MemoryStore::new(Records::default())
        }
    };

    let dispatch = DispatchService::new(
        Arc::new(store),
        Arc::new(router),
        Arc::new(SystemClock),
        config,
    );
    let app = create_router(AppState::new(dispatch));

    let addr: SocketAddr = std::env::var("DISPATCH_ADDR")
        .as_deref()
        .unwrap_or(DEFAULT_ADDR)
        .parse()?;
    info!(%addr, "dispatch server listening");
    info!("  GET    /health");
    info!("  POST   /blacklist");
    info!("  POST   /whitelist");
    info!("  POST   /booking");
    info!("  DELETE /booking/:request_id");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
