use bigdecimal::BigDecimal;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::OrderError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    NotPaid,
    Paid,
    Processing,
    Shipped,
    Delivered,
    Cancelled,
    PaymentFailed,
}

impl OrderStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            OrderStatus::NotPaid => "not_paid",
            OrderStatus::Paid => "paid",
            OrderStatus::Processing => "processing",
            OrderStatus::Shipped => "shipped",
            OrderStatus::Delivered => "delivered",
            OrderStatus::Cancelled => "cancelled",
            OrderStatus::PaymentFailed => "payment_failed",
        }
    }

    pub fn parse(s: &str) -> Option<OrderStatus> {
        match s {
            "not_paid" => Some(OrderStatus::NotPaid),
            "paid" => Some(OrderStatus::Paid),
            "processing" => Some(OrderStatus::Processing),
            "shipped" => Some(OrderStatus::Shipped),
            "delivered" => Some(OrderStatus::Delivered),
            "cancelled" => Some(OrderStatus::Cancelled),
            "payment_failed" => Some(OrderStatus::PaymentFailed),
            _ => None,
        }
    }

    /// Statuses in which goods may be handed to the carrier.
    pub fn is_shippable(&self) -> bool {
        matches!(self, OrderStatus::Paid | OrderStatus::Processing)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DeliveryMethod {
    Cdek,
}

impl DeliveryMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeliveryMethod::Cdek => "cdek",
        }
    }
}

/// Contact and delivery details supplied by the buyer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuyerProfile {
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    #[serde(default)]
    pub phone: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
    #[serde(default)]
    pub address: Option<String>,
}

fn check_len(field: &str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.chars().count() > max {
        return Err(OrderError::InvalidRequest(format!("{field} exceeds {max} characters")));
    }
    Ok(())
}

fn check_required(field: &str, value: &str, max: usize) -> Result<(), OrderError> {
    if value.trim().is_empty() {
        return Err(OrderError::InvalidRequest(format!("{field} is required")));
    }
    check_len(field, value, max)
}

impl BuyerProfile {
    /// Column limits of the `orders` table.
    pub fn validate(&self) -> Result<(), OrderError> {
        check_required("email", &self.email, 100)?;
        if !self.email.contains('@') {
            return Err(OrderError::InvalidRequest("email is malformed".into()));
        }
        check_required("first_name", &self.first_name, 50)?;
        check_required("last_name", &self.last_name, 50)?;
        let optional = [
            ("phone", &self.phone, 15),
            ("city", &self.city, 255),
            ("postal_code", &self.postal_code, 10),
            ("address", &self.address, 200),
        ];
        for (field, value, max) in optional {
            if let Some(v) = value {
                check_len(field, v, max)?;
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct OrderItemRequest {
    #[serde(alias = "product_size_id")]
    pub variant_id: i64,
    pub quantity: i32,
}

/// A sellable size of a product colour, joined with its product for pricing.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Variant {
    pub variant_id: i64,
    pub size: String,
    pub quantity_available: i32,
    pub color_id: i64,
    pub slug: String,
    pub title: String,
    pub label: String,
    pub hex: String,
    pub product_id: String,
    pub price: BigDecimal,
    pub discount_price: Option<BigDecimal>,
    pub currency: String,
    pub weight_grams: Option<i32>,
}

impl Variant {
    pub fn unit_price(&self) -> &BigDecimal {
        common_money::unit_price(&self.price, self.discount_price.as_ref())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Order {
    pub id: i64,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub phone: Option<String>,
    pub city: Option<String>,
    pub postal_code: Option<String>,
    pub address: Option<String>,
    pub total_price: BigDecimal,
    pub delivery_method: DeliveryMethod,
    pub status: OrderStatus,
    pub payment_id: Option<String>,
    pub carrier_shipment_id: Option<String>,
    pub carrier_tracking_number: Option<String>,
    pub carrier_status: Option<String>,
    pub user_id: Option<i64>,
    pub created_at: DateTime<Utc>,
}

impl Order {
    pub fn recipient_name(&self) -> String {
        format!("{} {}", self.first_name.trim(), self.last_name.trim()).trim().to_string()
    }
}

/// Line item hydrated with catalog data. `unit_price` is the price charged at creation.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct OrderLine {
    pub id: i64,
    pub variant_id: i64,
    pub product_id: String,
    pub color_id: i64,
    pub slug: String,
    pub title: String,
    pub label: String,
    pub hex: String,
    pub price: BigDecimal,
    pub discount_price: Option<BigDecimal>,
    pub unit_price: BigDecimal,
    pub currency: String,
    pub size: String,
    pub quantity: i32,
    pub weight_grams: Option<i32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub order: Order,
    pub products: Vec<OrderLine>,
}
