use bigdecimal::ToPrimitive;
use std::sync::Arc;
use tracing::{error, info, warn};

use common_orders::{OrderDetail, OrderStore};

use crate::client::{latest_status, CarrierClient};
use crate::config::CarrierConfig;
use crate::error::CarrierError;
use crate::model::{
    DocumentKind, ItemPayment, Package, PackageItem, Phone, PrintJob, Recipient, RegisteredShipment, ShipmentPatch,
    ShipmentRequest, ShipmentSummary,
};

pub const DEFAULT_ITEM_WEIGHT_GRAMS: i64 = 500;
pub const MIN_PACKAGE_WEIGHT_GRAMS: i64 = 100;

/// Registration payload for one order: a single package holding every line.
pub fn build_shipment_request(
    detail: &OrderDetail,
    config: &CarrierConfig,
    shipment_point: &str,
    delivery_point: &str,
) -> Result<ShipmentRequest, CarrierError> {
    let order = &detail.order;
    if detail.products.is_empty() {
        return Err(CarrierError::NoItems(order.id));
    }

    let items: Vec<PackageItem> = detail
        .products
        .iter()
        .map(|line| PackageItem {
            name: format!("{} ({}, {})", line.title, line.label, line.size),
            ware_key: format!("{}-{}-{}", line.slug, line.label.to_lowercase(), line.size.to_lowercase()),
            payment: ItemPayment { value: 0.0 },
            cost: line.unit_price.to_f64().unwrap_or_default(),
            weight: line
                .weight_grams
                .filter(|w| *w > 0)
                .map(i64::from)
                .unwrap_or(DEFAULT_ITEM_WEIGHT_GRAMS),
            amount: line.quantity,
        })
        .collect();
    let weight = items
        .iter()
        .map(|i| i.weight * i64::from(i.amount))
        .sum::<i64>()
        .max(MIN_PACKAGE_WEIGHT_GRAMS);

    let phone = order
        .phone
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty())
        .unwrap_or(&config.default_phone)
        .to_string();
    let email = Some(order.email.trim().to_string()).filter(|e| !e.is_empty());

    Ok(ShipmentRequest {
        order_type: 1,
        number: order.id.to_string(),
        tariff_code: config.tariff_code,
        shipment_point: shipment_point.to_string(),
        delivery_point: delivery_point.to_string(),
        recipient: Recipient { name: order.recipient_name(), phones: vec![Phone { number: phone }], email },
        packages: vec![Package { number: order.id.to_string(), weight, items }],
    })
}

/// Carrier-side lifecycle of an order's shipment.
#[derive(Clone)]
pub struct ShipmentService {
    store: Arc<dyn OrderStore>,
    client: Arc<CarrierClient>,
}

impl ShipmentService {
    pub fn new(store: Arc<dyn OrderStore>, client: Arc<CarrierClient>) -> Self {
        Self { store, client }
    }

    async fn detail(&self, order_id: i64) -> Result<OrderDetail, CarrierError> {
        self.store.order_detail(order_id).await?.ok_or(CarrierError::OrderNotFound(order_id))
    }

    async fn shipment_id(&self, order_id: i64) -> Result<String, CarrierError> {
        let order = self.store.get_order(order_id).await?.ok_or(CarrierError::OrderNotFound(order_id))?;
        order.carrier_shipment_id.ok_or(CarrierError::NotRegistered(order_id))
    }

    pub async fn register(
        &self,
        order_id: i64,
        shipment_point: Option<&str>,
        delivery_point: &str,
    ) -> Result<RegisteredShipment, CarrierError> {
        let delivery_point = delivery_point.trim();
        if delivery_point.is_empty() {
            return Err(CarrierError::InvalidRequest("delivery_point is required".into()));
        }
        let shipment_point = shipment_point
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .unwrap_or(&self.client.config().shipment_point)
            .to_string();

        let detail = self.detail(order_id).await?;
        if detail.order.carrier_shipment_id.is_some() {
            return Err(CarrierError::AlreadyRegistered(order_id));
        }
        if !detail.order.status.is_shippable() {
            return Err(CarrierError::NotPayable { order_id, status: detail.order.status.to_string() });
        }

        let request = build_shipment_request(&detail, self.client.config(), &shipment_point, delivery_point)?;
        self.store.claim_carrier_registration(order_id).await?;
        let shipment_id = match self.client.create_shipment(&request).await {
            Ok(id) => id,
            // The carrier may still have created the order; keep the claim until it goes stale.
            Err(CarrierError::Timeout) => {
                warn!(order_id, "carrier registration timed out; claim kept");
                return Err(CarrierError::Timeout);
            }
            Err(e) => {
                if let Err(release) = self.store.release_carrier_registration(order_id).await {
                    error!(order_id, error = %release, "failed to release carrier registration claim");
                }
                return Err(e);
            }
        };
        if let Err(e) = self.store.record_carrier_shipment(order_id, &shipment_id).await {
            error!(order_id, shipment_id = %shipment_id, error = %e, "carrier accepted shipment but it was not recorded");
            return Err(e.into());
        }
        info!(order_id, shipment_id = %shipment_id, weight = request.packages[0].weight, "shipment registered");
        Ok(RegisteredShipment { order_id, shipment_id })
    }

    pub async fn update(&self, order_id: i64, patch: ShipmentPatch) -> Result<ShipmentSummary, CarrierError> {
        if patch.is_empty() {
            return Err(CarrierError::InvalidRequest("nothing to update".into()));
        }
        let shipment_id = self.shipment_id(order_id).await?;
        self.client.update_shipment(&patch.into_request(shipment_id)).await?;
        info!(order_id, "shipment updated");
        self.info(order_id).await
    }

    /// Fetch the carrier's view of the shipment and keep tracking number and status locally.
    pub async fn info(&self, order_id: i64) -> Result<ShipmentSummary, CarrierError> {
        let shipment_id = self.shipment_id(order_id).await?;
        let entity = self.client.shipment_info(&shipment_id).await?;
        let status = latest_status(&entity.statuses).map(|s| s.code.clone());
        self.store
            .record_carrier_tracking(order_id, entity.cdek_number.as_deref(), status.as_deref())
            .await?;
        Ok(ShipmentSummary {
            order_id,
            shipment_id,
            tracking_number: entity.cdek_number,
            status,
            statuses: entity.statuses,
        })
    }

    pub async fn request_document(&self, order_id: i64, kind: DocumentKind) -> Result<PrintJob, CarrierError> {
        let shipment_id = self.shipment_id(order_id).await?;
        self.client.request_document(kind, &shipment_id).await
    }
}
