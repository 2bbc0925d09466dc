use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use common_observability::FulfillmentMetrics;
use common_orders::PgOrderStore;
use payment_service::{build_router, AppState, PaymentServiceConfig, TBankGateway};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = PaymentServiceConfig::from_env()?;
    if !config.gateway.is_configured() {
        warn!("TBANK_TERMINAL_KEY / TBANK_SECRET_KEY not set; payment init will answer 503 and webhooks are not verified");
    }

    let db = PgPool::connect(&config.database_url).await?;
    let gateway = TBankGateway::new(config.gateway.api_url.clone(), config.gateway.timeout)?;
    let metrics = Arc::new(FulfillmentMetrics::new()?);
    let state = AppState::new(Arc::new(PgOrderStore::new(db)), Arc::new(gateway), config.gateway.clone(), metrics);
    let app = build_router(state, &config.cors_allowed_origins);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, api_url = %config.gateway.api_url, "starting payment-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
