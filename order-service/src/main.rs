use std::net::SocketAddr;
use std::sync::Arc;

use sqlx::PgPool;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;

use common_observability::FulfillmentMetrics;
use common_orders::PgOrderStore;
use order_service::{build_router, AppState, OrderServiceConfig};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();
    let config = OrderServiceConfig::from_env()?;

    let db = PgPool::connect(&config.database_url).await?;
    if config.run_migrations {
        sqlx::migrate!("./migrations").run(&db).await?;
        info!("migrations applied");
    }

    let metrics = Arc::new(FulfillmentMetrics::new()?);
    let state = AppState::new(Arc::new(PgOrderStore::new(db)), metrics);
    let app = build_router(state, &config.cors_allowed_origins);

    let ip: std::net::IpAddr = config.host.parse()?;
    let addr = SocketAddr::from((ip, config.port));
    info!(%addr, "starting order-service");
    let listener = TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
