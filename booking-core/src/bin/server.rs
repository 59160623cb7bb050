//! Booking server binary
//!
//! Opens the store, audits every train's seat counter against the ledger and
//! keeps the service resident until Ctrl-C.

use anyhow::Context;
use booking_core::{BookingService, Config};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::INFO.into()),
        )
        .init();

    tracing::info!("Starting booking server");

    // Load configuration
    let config = match std::env::var("BOOKING_CONFIG") {
        Ok(path) => Config::from_file(&path)
            .with_context(|| format!("loading config from {}", path))?,
        Err(_) => Config::from_env().context("loading config from environment")?,
    };

    let service = BookingService::open(config)
        .await
        .context("opening booking service")?;

    let audits = service.audit().await.context("auditing seat inventory")?;
    let stats = service.stats()?;
    tracing::info!(
        trains = audits.len(),
        users = stats.total_users,
        bookings = stats.total_bookings,
        "Seat inventory consistent"
    );

    tokio::signal::ctrl_c().await?;

    tracing::info!("Shutting down booking server");
    if let Ok(text) = service.metrics().render() {
        tracing::debug!(metrics = %text, "Final metrics");
    }
    service.shutdown()?;
    Ok(())
}
