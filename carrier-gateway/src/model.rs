//! Carrier API payloads and the summaries this service returns.
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) if !s.is_empty() => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

// ---- shipment registration ----

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Phone {
    pub number: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Recipient {
    pub name: String,
    pub phones: Vec<Phone>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ItemPayment {
    pub value: f64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PackageItem {
    pub name: String,
    pub ware_key: String,
    pub payment: ItemPayment,
    pub cost: f64,
    pub weight: i64,
    pub amount: i32,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Package {
    pub number: String,
    pub weight: i64,
    pub items: Vec<PackageItem>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShipmentRequest {
    #[serde(rename = "type")]
    pub order_type: u8,
    pub number: String,
    pub tariff_code: i32,
    pub shipment_point: String,
    pub delivery_point: String,
    pub recipient: Recipient,
    pub packages: Vec<Package>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct RecipientPatch {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phones: Option<Vec<Phone>>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ShipmentUpdateRequest {
    pub uuid: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub delivery_point: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tariff_code: Option<i32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub recipient: Option<RecipientPatch>,
}

/// Fields a caller may change on a registered shipment.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ShipmentPatch {
    #[serde(default)]
    pub delivery_point: Option<String>,
    #[serde(default)]
    pub tariff_code: Option<i32>,
    #[serde(default)]
    pub recipient_name: Option<String>,
    #[serde(default)]
    pub recipient_phone: Option<String>,
}

impl ShipmentPatch {
    pub fn is_empty(&self) -> bool {
        self.delivery_point.is_none()
            && self.tariff_code.is_none()
            && self.recipient_name.is_none()
            && self.recipient_phone.is_none()
    }

    pub fn into_request(self, uuid: String) -> ShipmentUpdateRequest {
        let recipient = if self.recipient_name.is_some() || self.recipient_phone.is_some() {
            Some(RecipientPatch {
                name: self.recipient_name,
                phones: self.recipient_phone.map(|number| vec![Phone { number }]),
            })
        } else {
            None
        };
        ShipmentUpdateRequest {
            uuid,
            delivery_point: self.delivery_point,
            tariff_code: self.tariff_code,
            recipient,
        }
    }
}

// ---- generic carrier envelopes ----

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CarrierMessage {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct StatusEntry {
    #[serde(default)]
    pub code: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub date_time: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Entity {
    #[serde(default)]
    pub uuid: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub cdek_number: Option<String>,
    #[serde(default)]
    pub statuses: Vec<StatusEntry>,
    #[serde(default)]
    pub url: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct RequestState {
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub errors: Vec<CarrierMessage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EntityResponse {
    #[serde(default)]
    pub entity: Option<Entity>,
    #[serde(default)]
    pub requests: Vec<RequestState>,
    #[serde(default)]
    pub errors: Vec<CarrierMessage>,
}

impl EntityResponse {
    /// Every carrier error message, top level first, then per request.
    pub fn error_messages(&self) -> Vec<String> {
        self.errors
            .iter()
            .chain(self.requests.iter().flat_map(|r| r.errors.iter()))
            .map(|e| match (&e.message, &e.code) {
                (Some(m), _) => m.clone(),
                (None, Some(c)) => c.clone(),
                (None, None) => "Unknown error".to_string(),
            })
            .collect()
    }

    pub fn entity_uuid(&self) -> Option<&str> {
        self.entity.as_ref().and_then(|e| e.uuid.as_deref()).filter(|u| !u.is_empty())
    }
}

// ---- lookups ----

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct City {
    pub city_uuid: String,
    pub code: i64,
    pub full_name: String,
    pub country_code: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawDeliveryPoint {
    pub code: String,
    pub uuid: String,
    #[serde(rename = "type", default = "default_point_type")]
    pub point_type: String,
    #[serde(default)]
    pub work_time: Option<String>,
    pub location: RawLocation,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct RawLocation {
    pub city_code: i64,
    pub city: String,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
}

fn default_point_type() -> String {
    "PVZ".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DeliveryPoint {
    pub code: String,
    pub uuid: String,
    #[serde(rename = "type")]
    pub point_type: String,
    pub work_time: Option<String>,
    pub city_code: i64,
    pub city: String,
    pub longitude: f64,
    pub latitude: f64,
    pub address: String,
}

impl From<RawDeliveryPoint> for DeliveryPoint {
    fn from(raw: RawDeliveryPoint) -> Self {
        Self {
            code: raw.code,
            uuid: raw.uuid,
            point_type: raw.point_type,
            work_time: raw.work_time,
            city_code: raw.location.city_code,
            city: raw.location.city,
            longitude: raw.location.longitude,
            latitude: raw.location.latitude,
            address: raw.location.address,
        }
    }
}

// ---- tariffs ----

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TariffLocation {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub postal_code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TariffPackage {
    pub weight: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub length: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub width: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub height: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TariffRequest {
    pub from_location: TariffLocation,
    pub to_location: TariffLocation,
    pub packages: Vec<TariffPackage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tariff_code: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Tariff {
    pub tariff_code: i32,
    pub tariff_name: String,
    #[serde(default)]
    pub tariff_description: Option<String>,
    #[serde(default)]
    pub delivery_mode: Option<i32>,
    pub delivery_sum: f64,
    #[serde(default)]
    pub period_min: Option<i32>,
    #[serde(default)]
    pub period_max: Option<i32>,
}

// ---- documents ----

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Waybill,
    Barcode,
}

impl DocumentKind {
    /// Path segment under `/print/`.
    pub fn print_path(&self) -> &'static str {
        match self {
            DocumentKind::Waybill => "orders",
            DocumentKind::Barcode => "barcodes",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentKind::Waybill => "waybill",
            DocumentKind::Barcode => "barcode",
        }
    }

    pub(crate) fn print_request(&self, shipment_id: &str) -> Value {
        let orders = serde_json::json!([{ "order_uuid": shipment_id }]);
        match self {
            DocumentKind::Waybill => serde_json::json!({ "orders": orders, "copy_count": 2 }),
            DocumentKind::Barcode => serde_json::json!({ "orders": orders, "copy_count": 1, "format": "A4" }),
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct PrintJob {
    pub kind: DocumentKind,
    pub print_id: String,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct DocumentStatus {
    pub kind: DocumentKind,
    pub print_id: String,
    pub status: Option<String>,
    pub url: Option<String>,
}

// ---- summaries ----

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct ShipmentSummary {
    pub order_id: i64,
    pub shipment_id: String,
    pub tracking_number: Option<String>,
    pub status: Option<String>,
    pub statuses: Vec<StatusEntry>,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RegisteredShipment {
    pub order_id: i64,
    pub shipment_id: String,
}
