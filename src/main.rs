mod config;
mod handlers;
mod protocol;
mod server;
mod shell;
mod state;

use std::sync::Arc;

use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use config::Args;
use state::DaemonState;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Parse CLI arguments
    let args = Args::parse();

    if let Some(dir) = &args.working_dir {
        if !dir.exists() {
            warn!("Working directory does not exist: {}", dir.display());
        }
    }

    // Create shared state
    let state = Arc::new(DaemonState::new(args.working_dir.clone()));
    let app = server::router(state);

    // Bind and serve
    let listener = TcpListener::bind(&args.listen).await?;
    info!("Listening on {}", args.listen);

    axum::serve(listener, app).await?;
    Ok(())
}
