use std::sync::Arc;
use tracing::{info, warn};

use common_observability::FulfillmentMetrics;
use common_orders::{condense_items, BuyerProfile, OrderDetail, OrderError, OrderItemRequest, OrderStore};

/// Validates a checkout request and hands it to the store, which prices it,
/// decrements stock and persists the order atomically.
#[derive(Clone)]
pub struct OrderCreationService {
    store: Arc<dyn OrderStore>,
    metrics: Arc<FulfillmentMetrics>,
}

impl OrderCreationService {
    pub fn new(store: Arc<dyn OrderStore>, metrics: Arc<FulfillmentMetrics>) -> Self {
        Self { store, metrics }
    }

    pub async fn create(
        &self,
        buyer: &BuyerProfile,
        items: &[OrderItemRequest],
        user_id: Option<i64>,
    ) -> Result<OrderDetail, OrderError> {
        let result = self.create_inner(buyer, items, user_id).await;
        match &result {
            Ok(detail) => {
                self.metrics.orders_created_total.inc();
                info!(order_id = detail.order.id, user_id = ?user_id, total_price = %detail.order.total_price, "checkout accepted");
            }
            Err(OrderError::Database(_)) => {
                self.metrics.order_create_rejections_total.with_label_values(&["internal_error"]).inc();
            }
            Err(e) => {
                self.metrics.order_create_rejections_total.with_label_values(&[e.code()]).inc();
                warn!(error = %e, user_id = ?user_id, "checkout rejected");
            }
        }
        result
    }

    async fn create_inner(
        &self,
        buyer: &BuyerProfile,
        items: &[OrderItemRequest],
        user_id: Option<i64>,
    ) -> Result<OrderDetail, OrderError> {
        buyer.validate()?;
        let condensed = condense_items(items)?;
        self.store.create_order(buyer, user_id, &condensed).await
    }
}
