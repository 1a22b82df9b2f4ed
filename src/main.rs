//! ngsi-gateway - cache-aside NGSI-LD context gateway

use clap::Parser;
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use ngsi_gateway::{config::Args, server, AppState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let json_logs = args.json_logs();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("ngsi_gateway={},info", args.log_level).into()),
        )
        .with(json_logs.then(|| tracing_subscriber::fmt::layer().json()))
        .with((!json_logs).then(|| tracing_subscriber::fmt::layer()))
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  ngsi-gateway - NGSI-LD cache gateway");
    info!("======================================");
    info!("Listen: {}", args.listen);
    info!("Mode: {}", if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" });
    if args.dev_mode {
        info!("Entity store: in-memory");
    } else {
        info!(
            "Entity store: {} (batch upsert: {})",
            args.context_broker_url, args.broker_batch_upsert
        );
    }
    info!("OpenAQ: {} (key configured: {})", args.openaq_url, args.openaq_api_key.is_some());
    info!(
        "OpenWeather: {} (key configured: {})",
        args.openweather_url,
        args.openweather_api_key.is_some()
    );
    info!("Cache TTL: {}s", args.cache_ttl_secs);
    info!(
        "Timeouts: request {}ms, coalesce {}ms",
        args.request_timeout_ms, args.coalesce_timeout_ms
    );
    info!("Defaults: locality '{}', country {}", args.default_locality, args.default_country);
    info!("======================================");

    let state = Arc::new(AppState::new(args)?);
    server::run(state).await?;

    Ok(())
}
