//! Stocky - Stock Reward Ledger Service
//! Mission: Every granted share exactly once, every rupee accounted for

use anyhow::{Context, Result};
use clap::Parser;
use tokio::net::TcpListener;
use tower_http::cors::CorsLayer;
use tracing::info;

use stocky_backend::{
    api::{create_router, AppState},
    config::{init_tracing, load_env, Config},
    price_sampler::PriceSampler,
    store::{PriceStore, Store},
};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize environment and logging
    load_env();
    init_tracing();
    let config = Config::parse();

    info!("🚀 Stocky reward ledger starting");

    let store = Store::open(&config.db_path).context("Failed to open reward ledger database")?;
    let fees = config.fee_schedule()?;
    info!(
        "💸 Fees: brokerage {} | STT {} | GST {}",
        fees.brokerage_rate, fees.stt_rate, fees.gst_rate
    );

    if config.price_sampler_enabled {
        PriceSampler::new(PriceStore::new(store.clone()), config.price_interval()).spawn();
    } else {
        info!("📉 Mock price sampler disabled");
    }

    let app = create_router(AppState::new(store, fees)).layer(CorsLayer::permissive());

    let addr = config.socket_addr()?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!("🎯 API server listening on {}", addr);

    axum::serve(listener, app).await.context("Server error")?;

    Ok(())
}
