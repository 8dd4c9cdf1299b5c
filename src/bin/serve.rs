//! HTTP serving entry point.

use std::net::SocketAddr;
use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crop_yield_predictor::server::{self, AppState};
use crop_yield_predictor::{DEFAULT_DATA_PATH, DEFAULT_MODEL_PATH};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let state = Arc::new(AppState::new(DEFAULT_MODEL_PATH, DEFAULT_DATA_PATH));
    let addr = SocketAddr::from(([0, 0, 0, 0], 5000));
    server::serve(state, addr).await
}
