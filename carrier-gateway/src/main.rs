use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use carrier_gateway::{build_router, AppState, CarrierClient, CarrierGatewayConfig};
use common_observability::FulfillmentMetrics;
use common_orders::PgOrderStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = CarrierGatewayConfig::from_env()?;
    if config.webhook_allow_list.is_empty() {
        warn!("CDEK_WEBHOOK_ALLOWED_NETWORKS is explicitly empty; every carrier webhook will be rejected");
    }

    let db = PgPool::connect(&config.database_url).await?;
    let metrics = Arc::new(FulfillmentMetrics::new()?);
    let client = Arc::new(CarrierClient::new(config.carrier.clone(), metrics.clone())?);
    let state = AppState::new(Arc::new(PgOrderStore::new(db)), client, config.webhook_allow_list.clone(), metrics);
    let app = build_router(state, &config.cors_allowed_origins);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(
        %addr,
        api_url = %config.carrier.api_url,
        test_mode = config.carrier.test_mode,
        allowed_networks = config.webhook_allow_list.len(),
        "starting carrier-gateway"
    );
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app.into_make_service_with_connect_info::<SocketAddr>()).await?;
    Ok(())
}
