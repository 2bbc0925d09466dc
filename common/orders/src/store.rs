use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::model::{BuyerProfile, Order, OrderDetail};
use crate::status::{PaymentSignal, Reconciliation};
use crate::OrderError;

/// How long a carrier registration claim blocks other registrations of the same order.
pub const CARRIER_CLAIM_TTL: Duration = Duration::from_secs(10 * 60);

/// Persistence for orders, their line items and the stock they consume.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Price the condensed items, decrement stock and persist the order as one unit of work.
    ///
    /// Either everything is committed or nothing is.
    async fn create_order(
        &self,
        buyer: &BuyerProfile,
        user_id: Option<i64>,
        items: &BTreeMap<i64, i32>,
    ) -> Result<OrderDetail, OrderError>;

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, OrderError>;

    async fn order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, OrderError>;

    /// Newest first.
    async fn list_orders(&self, skip: i64, limit: i64) -> Result<Vec<Order>, OrderError>;

    async fn record_payment_reference(&self, order_id: i64, payment_id: &str) -> Result<(), OrderError>;

    /// Apply one verified gateway notification under a row lock.
    ///
    /// `payment_id` is stored when the order has none yet (an empty id counts as none), whatever the outcome.
    async fn reconcile_payment(
        &self,
        order_id: i64,
        signal: PaymentSignal,
        payment_id: Option<&str>,
    ) -> Result<Reconciliation, OrderError>;

    /// Mark the order as being registered with the carrier.
    ///
    /// Fails with `ShipmentAlreadyRegistered` when a shipment id is stored and with
    /// `ShipmentRegistrationPending` while another claim younger than [`CARRIER_CLAIM_TTL`] is held.
    async fn claim_carrier_registration(&self, order_id: i64) -> Result<(), OrderError>;

    /// Drop a claim taken by `claim_carrier_registration`; a no-op once a shipment id is stored.
    async fn release_carrier_registration(&self, order_id: i64) -> Result<(), OrderError>;

    /// Fails with `ShipmentAlreadyRegistered` if the order already carries a shipment id.
    /// Clears any registration claim.
    async fn record_carrier_shipment(&self, order_id: i64, shipment_id: &str) -> Result<(), OrderError>;

    /// Store the carrier's tracking number and latest status; `None` leaves a field untouched.
    async fn record_carrier_tracking(
        &self,
        order_id: i64,
        tracking_number: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), OrderError>;

    /// Returns the id of the updated order, `None` when no order carries `shipment_id`.
    async fn update_carrier_status(&self, shipment_id: &str, status: &str) -> Result<Option<i64>, OrderError>;
}
