//! Wire types and HTTP client for the acquiring gateway's `Init` call.
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::time::Duration;
use tracing::{debug, warn};

use common_crypto::{sign_params, GatewaySecret};

use crate::error::PaymentError;

pub const RECEIPT_TAXATION: &str = "usn_income";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct ReceiptItem {
    pub name: String,
    pub price: i64,
    pub quantity: i32,
    pub amount: i64,
    pub tax: String,
    pub payment_method: String,
    pub payment_object: String,
}

impl ReceiptItem {
    pub fn commodity(name: &str, price: i64, quantity: i32) -> Self {
        Self {
            name: name.chars().take(64).collect(),
            price,
            quantity,
            amount: price * i64::from(quantity),
            tax: "none".into(),
            payment_method: "full_payment".into(),
            payment_object: "commodity".into(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Receipt {
    pub email: String,
    pub taxation: String,
    pub items: Vec<ReceiptItem>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitRequest {
    pub terminal_key: String,
    pub amount: i64,
    pub order_id: String,
    pub description: String,
    #[serde(rename = "SuccessURL")]
    pub success_url: String,
    #[serde(rename = "FailURL")]
    pub fail_url: String,
    #[serde(rename = "DATA", skip_serializing_if = "Map::is_empty")]
    pub data: Map<String, Value>,
    pub receipt: Receipt,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<String>,
}

impl InitRequest {
    /// Compute and attach `Token` over the request's own top-level scalars.
    pub fn sign(mut self, secret: &GatewaySecret) -> Result<Self, PaymentError> {
        self.token = None;
        let params = match serde_json::to_value(&self) {
            Ok(Value::Object(map)) => map,
            Ok(_) => return Err(PaymentError::Transport("init request is not a JSON object".into())),
            Err(e) => return Err(PaymentError::Transport(e.to_string())),
        };
        self.token = Some(sign_params(&params, secret));
        Ok(self)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct InitResponse {
    #[serde(default)]
    pub success: bool,
    #[serde(default, deserialize_with = "lenient_string")]
    pub error_code: Option<String>,
    #[serde(default, rename = "PaymentURL")]
    pub payment_url: Option<String>,
    #[serde(default, deserialize_with = "lenient_string")]
    pub payment_id: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub details: Option<String>,
}

/// The gateway sends identifiers either as strings or as bare numbers.
pub(crate) fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

impl InitResponse {
    /// `(payment_url, payment_id)` for an accepted initiation, otherwise the gateway's error.
    pub fn into_accepted(self) -> Result<(String, String), PaymentError> {
        let payment_id = self.payment_id.map(|id| id.trim().to_string()).filter(|id| !id.is_empty());
        match (self.success, self.payment_url, payment_id) {
            (true, Some(url), Some(id)) if !url.is_empty() => Ok((url, id)),
            (true, _, _) => Err(PaymentError::Gateway {
                message: "gateway accepted the payment without PaymentURL or PaymentId".into(),
                details: self.details.unwrap_or_default(),
                error_code: self.error_code.unwrap_or_default(),
            }),
            _ => Err(PaymentError::Gateway {
                message: self.message.unwrap_or_else(|| "Unknown error".into()),
                details: self.details.unwrap_or_default(),
                error_code: self.error_code.unwrap_or_default(),
            }),
        }
    }
}

#[async_trait]
pub trait PaymentGateway: Send + Sync {
    async fn init(&self, request: &InitRequest) -> Result<InitResponse, PaymentError>;
}

pub struct TBankGateway {
    http: reqwest::Client,
    api_url: String,
}

impl TBankGateway {
    pub fn new(api_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_url: api_url.into().trim_end_matches('/').to_string() })
    }
}

#[async_trait]
impl PaymentGateway for TBankGateway {
    async fn init(&self, request: &InitRequest) -> Result<InitResponse, PaymentError> {
        let url = format!("{}/Init", self.api_url);
        debug!(order_id = %request.order_id, amount = request.amount, "posting Init");
        let resp = self.http.post(&url).json(request).send().await?;
        let status = resp.status();
        let body = resp.text().await?;
        match serde_json::from_str::<InitResponse>(&body) {
            Ok(parsed) => Ok(parsed),
            Err(e) => {
                warn!(%status, error = %e, "unparseable Init response");
                Err(PaymentError::Transport(format!("gateway answered {status} with an unreadable body")))
            }
        }
    }
}
