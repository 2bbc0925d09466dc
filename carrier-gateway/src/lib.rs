//! Carrier integration: shipment registration, lookups, printed documents and
//! the carrier's status callback.
pub mod allowlist;
pub mod app;
pub mod carrier_handlers;
pub mod client;
pub mod config;
pub mod error;
pub mod model;
pub mod shipments;
pub mod webhook_handlers;

pub use allowlist::{AllowList, IpNetwork};
pub use app::{build_router, AppState};
pub use client::CarrierClient;
pub use config::{CarrierConfig, CarrierGatewayConfig};
pub use error::CarrierError;
pub use shipments::{build_shipment_request, ShipmentService};
