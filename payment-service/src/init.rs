use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{error, info};

use common_money::to_minor_units;
use common_observability::FulfillmentMetrics;
use common_orders::{OrderDetail, OrderStatus, OrderStore};
use common_security::{ensure_owner_or_admin, SecurityContext};

use crate::config::GatewayConfig;
use crate::error::PaymentError;
use crate::gateway::{InitRequest, PaymentGateway, Receipt, ReceiptItem, RECEIPT_TAXATION};

pub const WIDGET_CONNECTION: &str = "Widget";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct InitPaymentRequest {
    pub order_id: i64,
    #[serde(default)]
    pub success_url: Option<String>,
    #[serde(default)]
    pub fail_url: Option<String>,
    #[serde(default)]
    pub connection_type: Option<String>,
    #[serde(default)]
    pub data: Option<Map<String, Value>>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct InitPaymentResponse {
    pub success: bool,
    pub payment_url: String,
    pub payment_id: String,
}

fn wants_widget(req: &InitPaymentRequest) -> bool {
    req.connection_type.as_deref() == Some(WIDGET_CONNECTION)
        || req
            .data
            .as_ref()
            .and_then(|d| d.get("connection_type"))
            .and_then(Value::as_str)
            == Some(WIDGET_CONNECTION)
}

/// Assemble the unsigned `Init` request for an order.
pub fn build_init_request(
    config: &GatewayConfig,
    terminal_key: &str,
    detail: &OrderDetail,
    req: &InitPaymentRequest,
) -> Result<InitRequest, PaymentError> {
    let order = &detail.order;
    let amount = to_minor_units(&order.total_price)?;
    let description: String = format!("Заказ #{}", order.id).chars().take(250).collect();

    let mut data = Map::new();
    data.insert("Email".into(), Value::String(order.email.clone()));
    if wants_widget(req) {
        data.insert("connection_type".into(), Value::String(WIDGET_CONNECTION.into()));
    }
    if let Some(extra) = &req.data {
        data.extend(extra.iter().map(|(k, v)| (k.clone(), v.clone())));
    }

    let mut items = Vec::with_capacity(detail.products.len());
    for line in &detail.products {
        let price = to_minor_units(&line.unit_price)?;
        items.push(ReceiptItem::commodity(&format!("{} ({})", line.title, line.size), price, line.quantity));
    }
    if items.is_empty() {
        items.push(ReceiptItem::commodity(&description, amount, 1));
    }

    Ok(InitRequest {
        terminal_key: terminal_key.to_string(),
        amount,
        order_id: order.id.to_string(),
        description,
        success_url: req
            .success_url
            .clone()
            .unwrap_or_else(|| format!("{}?orderId={}", config.success_url, order.id)),
        fail_url: req
            .fail_url
            .clone()
            .unwrap_or_else(|| format!("{}?orderId={}", config.fail_url, order.id)),
        data,
        receipt: Receipt { email: order.email.clone(), taxation: RECEIPT_TAXATION.into(), items },
        token: None,
    })
}

#[derive(Clone)]
pub struct PaymentInitService {
    store: Arc<dyn OrderStore>,
    gateway: Arc<dyn PaymentGateway>,
    config: Arc<GatewayConfig>,
    metrics: Arc<FulfillmentMetrics>,
}

impl PaymentInitService {
    pub fn new(
        store: Arc<dyn OrderStore>,
        gateway: Arc<dyn PaymentGateway>,
        config: Arc<GatewayConfig>,
        metrics: Arc<FulfillmentMetrics>,
    ) -> Self {
        Self { store, gateway, config, metrics }
    }

    pub async fn initiate(
        &self,
        ctx: &SecurityContext,
        req: &InitPaymentRequest,
    ) -> Result<InitPaymentResponse, PaymentError> {
        let result = self.run(ctx, req).await;
        let label = match &result {
            Ok(_) => "ok",
            Err(PaymentError::Gateway { .. }) => "rejected",
            Err(PaymentError::Timeout) => "timeout",
            Err(_) => "error",
        };
        self.metrics.payment_inits_total.with_label_values(&[label]).inc();
        result
    }

    async fn run(&self, ctx: &SecurityContext, req: &InitPaymentRequest) -> Result<InitPaymentResponse, PaymentError> {
        let (Some(terminal_key), Some(secret)) = (self.config.terminal_key.as_deref(), self.config.secret.as_ref())
        else {
            return Err(PaymentError::NotConfigured);
        };
        let detail = self
            .store
            .order_detail(req.order_id)
            .await?
            .ok_or(PaymentError::OrderNotFound(req.order_id))?;
        ensure_owner_or_admin(ctx, detail.order.user_id)?;
        if detail.order.status != OrderStatus::NotPaid {
            return Err(PaymentError::AlreadyProcessed {
                order_id: detail.order.id,
                status: detail.order.status.to_string(),
            });
        }

        let request = build_init_request(&self.config, terminal_key, &detail, req)?.sign(secret)?;
        info!(order_id = detail.order.id, amount = request.amount, widget = wants_widget(req), "initializing payment");
        let response = self.gateway.init(&request).await.map_err(|e| {
            error!(order_id = detail.order.id, error = %e, "payment init failed");
            e
        })?;
        let (payment_url, payment_id) = response.into_accepted().map_err(|e| {
            error!(order_id = detail.order.id, error = %e, "payment init rejected");
            e
        })?;
        self.store.record_payment_reference(detail.order.id, &payment_id).await?;
        Ok(InitPaymentResponse { success: true, payment_url, payment_id })
    }
}
