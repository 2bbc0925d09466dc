pub mod app;
pub mod config;
pub mod creation;
pub mod order_handlers;

pub use app::{build_router, AppState};
pub use config::OrderServiceConfig;
