use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use aegis_fit::api::{create_routes, AppState};
use aegis_fit::config::AppConfig;
use aegis_fit::services::{PaymentProvider, StripeClient};
use anyhow::{Context, Result};
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    let config = AppConfig::from_env().context("Failed to load configuration")?;
    init_tracing(&config);

    info!("Starting AEGIS FIT backend with {}", config);

    let payments: Option<Arc<dyn PaymentProvider>> = match &config.stripe {
        Some(stripe) => {
            let client: Arc<dyn PaymentProvider> = Arc::new(StripeClient::new(stripe)?);
            Some(client)
        }
        None => {
            warn!("Stripe not configured, paid plans will be recorded without checkout");
            None
        }
    };
    if config.stripe.is_some() && config.webhook_secret().is_none() {
        warn!("STRIPE_WEBHOOK_SECRET not set, webhook signatures will not be verified");
    }

    let address = config.server_address();
    let state = AppState::new(config, payments);
    if let Some(rate_limiter) = &state.rate_limiter {
        rate_limiter.spawn_cleanup(Duration::from_secs(60));
    }
    let app = create_routes(state);

    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("Failed to bind {}", address))?;
    info!("AEGIS FIT server listening on http://{}", address);
    info!("Health check available at http://{}/api/health", address);

    // Peer addresses key the rate limiter when no proxy headers are present
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Server stopped");
    Ok(())
}

fn init_tracing(config: &AppConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.filter_directive()));

    if config.structured_logging {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .json()
            .init();
    } else {
        tracing_subscriber::fmt().with_env_filter(filter).init();
    }
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", err);
    }
}
