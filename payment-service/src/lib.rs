pub mod app;
pub mod config;
pub mod error;
pub mod gateway;
pub mod init;
pub mod payment_handlers;
pub mod webhook;

pub use app::{build_router, AppState};
pub use config::{GatewayConfig, PaymentServiceConfig};
pub use error::PaymentError;
pub use gateway::{InitRequest, InitResponse, PaymentGateway, TBankGateway};
