//! Timetable Schedules Server
//!
//! Stores the schedule map for every teacher in a file-backed KV namespace
//! and pushes every write to WebSocket subscribers.
//!
//! # Configuration
//!
//! Environment variables:
//! - `TIMETABLE_PORT`: Port to listen on (default: 8080)
//! - `TIMETABLE_KV_DIR`: Directory of the KV namespace
//! - `TIMETABLE_SERVER_CONFIG`: Path to config file
//!
//! Without a KV directory the server still starts but every schedules
//! request answers 503.
//!
//! # Endpoints
//!
//! - `GET /health`: Health check endpoint
//! - `GET|POST /api/schedules`: Read or replace all schedules
//! - `GET /api/schedules/subscribe`: WebSocket push channel

use std::net::SocketAddr;
use std::sync::Arc;

use timetable::server::{build_router, FileKv, KvNamespace, ScheduleHub, ServerConfig};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "timetable_server=info,timetable=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = run().await {
        tracing::error!("{}", e);
        std::process::exit(1);
    }
}

async fn run() -> Result<(), Box<dyn std::error::Error>> {
    // Load configuration
    let config = ServerConfig::from_env()?;
    tracing::info!("Config file: {}", config.config_path.display());

    let kv: Option<Arc<dyn KvNamespace>> = match &config.kv_dir {
        Some(dir) => {
            // Ensure KV directory exists
            std::fs::create_dir_all(dir)?;
            tracing::info!("KV directory: {}", dir.display());
            Some(Arc::new(FileKv::new(dir)))
        }
        None => {
            tracing::warn!("No KV directory configured - schedules requests will return 503");
            None
        }
    };

    let app = build_router(kv, Arc::new(ScheduleHub::default()));

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    tracing::info!("Starting server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
