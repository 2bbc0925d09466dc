//! Order domain shared by the order, payment and carrier services.
//!
//! The `OrderStore` trait is the only way services touch orders and stock;
//! `PgOrderStore` backs production and `InMemoryOrderStore` backs tests.
pub mod error;
pub mod memory;
pub mod model;
pub mod pg;
pub mod planning;
pub mod status;
pub mod store;

#[cfg(any(test, feature = "test-helpers"))]
pub mod fixtures;

pub use error::OrderError;
pub use memory::InMemoryOrderStore;
pub use model::{BuyerProfile, DeliveryMethod, Order, OrderDetail, OrderItemRequest, OrderLine, OrderStatus, Variant};
pub use pg::PgOrderStore;
pub use planning::{condense_items, plan_order, OrderPlan, PlannedLine};
pub use status::{next_status, PaymentSignal, Reconciliation, Transition};
pub use store::{OrderStore, CARRIER_CLAIM_TTL};
