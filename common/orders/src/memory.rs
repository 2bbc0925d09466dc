use async_trait::async_trait;
use bigdecimal::BigDecimal;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Mutex, MutexGuard};
use std::time::Instant;

use crate::model::{BuyerProfile, DeliveryMethod, Order, OrderDetail, OrderLine, Variant};
use crate::planning::plan_order;
use crate::status::{next_status, PaymentSignal, Reconciliation, Transition};
use crate::store::{OrderStore, CARRIER_CLAIM_TTL};
use crate::OrderError;

#[derive(Clone)]
struct StoredLine {
    id: i64,
    variant_id: i64,
    quantity: i32,
    unit_price: BigDecimal,
}

#[derive(Default)]
struct State {
    variants: HashMap<i64, Variant>,
    orders: BTreeMap<i64, (Order, Vec<StoredLine>)>,
    carrier_claims: HashMap<i64, Instant>,
    next_order_id: i64,
    next_line_id: i64,
}

impl State {
    fn hydrate(&self, order: &Order, lines: &[StoredLine]) -> OrderDetail {
        let products = lines
            .iter()
            .filter_map(|l| {
                let v = self.variants.get(&l.variant_id)?;
                Some(OrderLine {
                    id: l.id,
                    variant_id: l.variant_id,
                    product_id: v.product_id.clone(),
                    color_id: v.color_id,
                    slug: v.slug.clone(),
                    title: v.title.clone(),
                    label: v.label.clone(),
                    hex: v.hex.clone(),
                    price: v.price.clone(),
                    discount_price: v.discount_price.clone(),
                    unit_price: l.unit_price.clone(),
                    currency: v.currency.clone(),
                    size: v.size.clone(),
                    quantity: l.quantity,
                    weight_grams: v.weight_grams,
                })
            })
            .collect();
        OrderDetail { order: order.clone(), products }
    }
}

/// Process-local store. Check and decrement happen under one lock, which is
/// the same guarantee the row locks give `PgOrderStore`.
#[derive(Default)]
pub struct InMemoryOrderStore {
    state: Mutex<State>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_variants(variants: impl IntoIterator<Item = Variant>) -> Self {
        let store = Self::new();
        {
            let mut state = store.lock();
            for v in variants {
                state.variants.insert(v.variant_id, v);
            }
        }
        store
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|p| p.into_inner())
    }

    pub fn set_price(&self, variant_id: i64, price: BigDecimal, discount_price: Option<BigDecimal>) {
        if let Some(v) = self.lock().variants.get_mut(&variant_id) {
            v.price = price;
            v.discount_price = discount_price;
        }
    }

    pub fn variant_quantity(&self, variant_id: i64) -> Option<i32> {
        self.lock().variants.get(&variant_id).map(|v| v.quantity_available)
    }

    pub fn order_count(&self) -> usize {
        self.lock().orders.len()
    }

    pub fn line_count(&self) -> usize {
        self.lock().orders.values().map(|(_, lines)| lines.len()).sum()
    }

    /// Overwrite an order's status without going through the payment state machine.
    pub fn force_status(&self, order_id: i64, status: crate::OrderStatus) {
        if let Some((order, _)) = self.lock().orders.get_mut(&order_id) {
            order.status = status;
        }
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn create_order(
        &self,
        buyer: &BuyerProfile,
        user_id: Option<i64>,
        items: &BTreeMap<i64, i32>,
    ) -> Result<OrderDetail, OrderError> {
        let mut state = self.lock();
        let variants: Vec<Variant> = items.keys().filter_map(|id| state.variants.get(id).cloned()).collect();
        let plan = plan_order(items, &variants)?;

        state.next_order_id += 1;
        let order_id = state.next_order_id;
        let mut lines = Vec::with_capacity(plan.lines.len());
        for line in &plan.lines {
            state.next_line_id += 1;
            lines.push(StoredLine {
                id: state.next_line_id,
                variant_id: line.variant.variant_id,
                quantity: line.quantity,
                unit_price: line.unit_price.clone(),
            });
        }
        for line in &plan.lines {
            if let Some(v) = state.variants.get_mut(&line.variant.variant_id) {
                v.quantity_available -= line.quantity;
            }
        }
        let order = Order {
            id: order_id,
            email: buyer.email.clone(),
            first_name: buyer.first_name.clone(),
            last_name: buyer.last_name.clone(),
            phone: buyer.phone.clone(),
            city: buyer.city.clone(),
            postal_code: buyer.postal_code.clone(),
            address: buyer.address.clone(),
            total_price: plan.total_price.clone(),
            delivery_method: DeliveryMethod::Cdek,
            status: crate::OrderStatus::NotPaid,
            payment_id: None,
            carrier_shipment_id: None,
            carrier_tracking_number: None,
            carrier_status: None,
            user_id,
            created_at: Utc::now(),
        };
        let detail = state.hydrate(&order, &lines);
        state.orders.insert(order_id, (order, lines));
        Ok(detail)
    }

    async fn get_order(&self, order_id: i64) -> Result<Option<Order>, OrderError> {
        Ok(self.lock().orders.get(&order_id).map(|(o, _)| o.clone()))
    }

    async fn order_detail(&self, order_id: i64) -> Result<Option<OrderDetail>, OrderError> {
        let state = self.lock();
        Ok(state.orders.get(&order_id).map(|(o, lines)| state.hydrate(o, lines)))
    }

    async fn list_orders(&self, skip: i64, limit: i64) -> Result<Vec<Order>, OrderError> {
        let state = self.lock();
        Ok(state
            .orders
            .values()
            .rev()
            .skip(skip.max(0) as usize)
            .take(limit.max(0) as usize)
            .map(|(o, _)| o.clone())
            .collect())
    }

    async fn record_payment_reference(&self, order_id: i64, payment_id: &str) -> Result<(), OrderError> {
        let mut state = self.lock();
        let (order, _) = state.orders.get_mut(&order_id).ok_or(OrderError::OrderNotFound(order_id))?;
        order.payment_id = Some(payment_id.to_string());
        Ok(())
    }

    async fn reconcile_payment(
        &self,
        order_id: i64,
        signal: PaymentSignal,
        payment_id: Option<&str>,
    ) -> Result<Reconciliation, OrderError> {
        let mut state = self.lock();
        let Some((order, _)) = state.orders.get_mut(&order_id) else {
            return Ok(Reconciliation::OrderMissing);
        };
        let current = order.status;
        let transition = next_status(current, signal);
        if let Transition::Apply(to) = transition {
            order.status = to;
        }
        if order.payment_id.as_deref().map_or(true, str::is_empty) {
            if let Some(id) = payment_id.map(str::trim).filter(|id| !id.is_empty()) {
                order.payment_id = Some(id.to_string());
            }
        }
        Ok(Reconciliation::from_transition(current, signal, transition))
    }

    async fn claim_carrier_registration(&self, order_id: i64) -> Result<(), OrderError> {
        let mut state = self.lock();
        let (order, _) = state.orders.get(&order_id).ok_or(OrderError::OrderNotFound(order_id))?;
        if order.carrier_shipment_id.is_some() {
            return Err(OrderError::ShipmentAlreadyRegistered(order_id));
        }
        let now = Instant::now();
        if state.carrier_claims.get(&order_id).is_some_and(|at| now.duration_since(*at) < CARRIER_CLAIM_TTL) {
            return Err(OrderError::ShipmentRegistrationPending(order_id));
        }
        state.carrier_claims.insert(order_id, now);
        Ok(())
    }

    async fn release_carrier_registration(&self, order_id: i64) -> Result<(), OrderError> {
        self.lock().carrier_claims.remove(&order_id);
        Ok(())
    }

    async fn record_carrier_shipment(&self, order_id: i64, shipment_id: &str) -> Result<(), OrderError> {
        let mut state = self.lock();
        let (order, _) = state.orders.get_mut(&order_id).ok_or(OrderError::OrderNotFound(order_id))?;
        if order.carrier_shipment_id.is_some() {
            return Err(OrderError::ShipmentAlreadyRegistered(order_id));
        }
        order.carrier_shipment_id = Some(shipment_id.to_string());
        state.carrier_claims.remove(&order_id);
        Ok(())
    }

    async fn record_carrier_tracking(
        &self,
        order_id: i64,
        tracking_number: Option<&str>,
        status: Option<&str>,
    ) -> Result<(), OrderError> {
        let mut state = self.lock();
        let (order, _) = state.orders.get_mut(&order_id).ok_or(OrderError::OrderNotFound(order_id))?;
        if let Some(n) = tracking_number {
            order.carrier_tracking_number = Some(n.to_string());
        }
        if let Some(s) = status {
            order.carrier_status = Some(s.to_string());
        }
        Ok(())
    }

    async fn update_carrier_status(&self, shipment_id: &str, status: &str) -> Result<Option<i64>, OrderError> {
        let mut state = self.lock();
        let found = state
            .orders
            .values_mut()
            .find(|(o, _)| o.carrier_shipment_id.as_deref() == Some(shipment_id));
        Ok(found.map(|(order, _)| {
            order.carrier_status = Some(status.to_string());
            order.id
        }))
    }
}
