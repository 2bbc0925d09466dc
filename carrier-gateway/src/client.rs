//! HTTP client for the carrier API.
//!
//! Every call goes through one bearer token held in a [`CredentialCache`];
//! city and pickup-point lookups are answered from [`LookupCache`]s first.
use bytes::Bytes;
use reqwest::{Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use common_cache::{CredentialCache, IssuedCredential, LookupCache, DEFAULT_REFRESH_MARGIN, MAX_CREDENTIAL_LIFETIME};
use common_observability::FulfillmentMetrics;

use crate::config::CarrierConfig;
use crate::error::CarrierError;
use crate::model::{
    City, DeliveryPoint, DocumentKind, DocumentStatus, Entity, EntityResponse, PrintJob, RawDeliveryPoint,
    ShipmentRequest, ShipmentUpdateRequest, StatusEntry, Tariff, TariffRequest,
};

pub const DEFAULT_TOKEN_TTL: Duration = Duration::from_secs(3600);
pub const DEFAULT_POINT_TYPE: &str = "PVZ";
const MAX_ERROR_BODY: usize = 500;

#[derive(Debug, Deserialize)]
struct TokenResponse {
    #[serde(default)]
    access_token: Option<String>,
    #[serde(default)]
    expires_in: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct TariffListResponse {
    #[serde(default)]
    tariff_codes: Vec<Value>,
    #[serde(default)]
    errors: Vec<crate::model::CarrierMessage>,
}

/// Most recent status: latest `date_time` when the carrier sends them, else the first entry.
pub fn latest_status(statuses: &[StatusEntry]) -> Option<&StatusEntry> {
    let dated = statuses.iter().filter(|s| s.date_time.is_some()).max_by(|a, b| a.date_time.cmp(&b.date_time));
    dated.or_else(|| statuses.first()).filter(|s| !s.code.is_empty())
}

/// Keep the entries that deserialize; log and drop the rest.
fn decode_entries<T: DeserializeOwned>(kind: &'static str, entries: Vec<Value>) -> Vec<T> {
    entries
        .into_iter()
        .filter_map(|raw| match serde_json::from_value::<T>(raw.clone()) {
            Ok(v) => Some(v),
            Err(e) => {
                warn!(kind, error = %e, entry = %raw, "skipping malformed carrier entry");
                None
            }
        })
        .collect()
}

fn truncate(text: &str) -> String {
    text.chars().take(MAX_ERROR_BODY).collect()
}

fn parse_print_id(print_id: &str) -> Result<Uuid, CarrierError> {
    Uuid::parse_str(print_id.trim()).map_err(|_| CarrierError::InvalidRequest(format!("invalid print id {print_id:?}")))
}

pub struct CarrierClient {
    http: reqwest::Client,
    config: CarrierConfig,
    credentials: CredentialCache,
    cities: LookupCache<Vec<City>>,
    points: LookupCache<Vec<DeliveryPoint>>,
    metrics: Arc<FulfillmentMetrics>,
}

impl CarrierClient {
    pub fn new(config: CarrierConfig, metrics: Arc<FulfillmentMetrics>) -> Result<Self, CarrierError> {
        let http = reqwest::Client::builder().build()?;
        if !config.has_credentials() {
            warn!("CDEK_ACCOUNT / CDEK_SECURE_PASSWORD not set; carrier calls will fail with carrier_not_configured");
        }
        Ok(Self {
            http,
            cities: LookupCache::new(config.lookup_ttl, config.lookup_capacity),
            points: LookupCache::new(config.lookup_ttl, config.lookup_capacity),
            credentials: CredentialCache::new(DEFAULT_REFRESH_MARGIN),
            config,
            metrics,
        })
    }

    pub fn config(&self) -> &CarrierConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.config.api_url.trim_end_matches('/'), path.trim_start_matches('/'))
    }

    /// Cached bearer token, refreshed once per expiry window.
    pub async fn access_token(&self) -> Result<String, CarrierError> {
        let (Some(account), Some(password)) = (self.config.account.as_deref(), self.config.secure_password.as_deref())
        else {
            return Err(CarrierError::NotConfigured);
        };
        self.credentials.token_with(|| self.fetch_token(account, password)).await
    }

    async fn fetch_token(&self, account: &str, password: &str) -> Result<IssuedCredential, CarrierError> {
        let result = self.exchange_credentials(account, password).await;
        let label = if result.is_ok() { "ok" } else { "error" };
        self.metrics.carrier_token_refresh_total.with_label_values(&[label]).inc();
        result
    }

    async fn exchange_credentials(&self, account: &str, password: &str) -> Result<IssuedCredential, CarrierError> {
        let resp = self
            .http
            .post(self.url("oauth/token"))
            .timeout(self.config.read_timeout)
            .form(&[("grant_type", "client_credentials"), ("client_id", account), ("client_secret", password)])
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            warn!(%status, body = %truncate(&body), "carrier token request failed");
            return Err(CarrierError::Upstream(format!("failed to get access token: HTTP {status}")));
        }
        let token: TokenResponse = resp
            .json()
            .await
            .map_err(|_| CarrierError::Upstream("unreadable token response".into()))?;
        let access_token = token
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| CarrierError::Upstream("token response missing access_token".into()))?;
        let expires_in = token
            .expires_in
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_TOKEN_TTL)
            .min(MAX_CREDENTIAL_LIFETIME);
        info!(expires_in_secs = expires_in.as_secs(), "carrier access token obtained");
        Ok(IssuedCredential { access_token, expires_in })
    }

    async fn authorized(&self, method: Method, path: &str, timeout: Duration) -> Result<RequestBuilder, CarrierError> {
        let token = self.access_token().await?;
        Ok(self.http.request(method, self.url(path)).bearer_auth(token).timeout(timeout))
    }

    /// Time and count one carrier operation.
    async fn observe<T, F>(&self, operation: &'static str, call: F) -> Result<T, CarrierError>
    where
        F: Future<Output = Result<T, CarrierError>>,
    {
        let timer = self.metrics.carrier_request_duration_seconds.with_label_values(&[operation]).start_timer();
        let result = call.await;
        timer.observe_duration();
        let label = match &result {
            Ok(_) => "ok",
            Err(e) => e.kind(),
        };
        self.metrics.carrier_requests_total.with_label_values(&[operation, label]).inc();
        if let Err(e) = &result {
            warn!(operation, error = %e, "carrier call failed");
        }
        result
    }

    /// Non-2xx responses become `Upstream` errors carrying every carrier message.
    async fn checked(&self, resp: Response) -> Result<Bytes, CarrierError> {
        let status = resp.status();
        let body = resp.bytes().await?;
        if status.is_success() {
            return Ok(body);
        }
        if status == StatusCode::UNAUTHORIZED {
            self.credentials.invalidate();
        }
        let messages = serde_json::from_slice::<EntityResponse>(&body)
            .map(|r| r.error_messages())
            .unwrap_or_default();
        Err(CarrierError::Upstream(if messages.is_empty() {
            format!("HTTP {}: {}", status.as_u16(), truncate(&String::from_utf8_lossy(&body)))
        } else {
            messages.join("; ")
        }))
    }

    async fn entity_call(&self, request: RequestBuilder) -> Result<EntityResponse, CarrierError> {
        let body = self.checked(request.send().await?).await?;
        let parsed: EntityResponse = if body.is_empty() {
            EntityResponse::default()
        } else {
            serde_json::from_slice(&body)
                .map_err(|e| CarrierError::Upstream(format!("unreadable carrier response: {e}")))?
        };
        let messages = parsed.error_messages();
        if !messages.is_empty() {
            return Err(CarrierError::Upstream(messages.join("; ")));
        }
        Ok(parsed)
    }

    async fn json_list(&self, request: RequestBuilder) -> Result<Vec<Value>, CarrierError> {
        let body = self.checked(request.send().await?).await?;
        match serde_json::from_slice::<Value>(&body) {
            Ok(Value::Array(entries)) => Ok(entries),
            Ok(_) => Err(CarrierError::Upstream("expected a JSON list".into())),
            Err(e) => Err(CarrierError::Upstream(format!("unreadable carrier response: {e}"))),
        }
    }

    /// `POST /orders`; returns the carrier's shipment uuid.
    pub async fn create_shipment(&self, request: &ShipmentRequest) -> Result<String, CarrierError> {
        self.observe("create_shipment", async {
            let builder = self.authorized(Method::POST, "orders", self.config.write_timeout).await?.json(request);
            let parsed = self.entity_call(builder).await?;
            parsed
                .entity_uuid()
                .map(str::to_string)
                .ok_or_else(|| CarrierError::Upstream("Invalid response from CDEK: missing uuid".into()))
        })
        .await
    }

    pub async fn update_shipment(&self, request: &ShipmentUpdateRequest) -> Result<(), CarrierError> {
        self.observe("update_shipment", async {
            let builder = self.authorized(Method::PATCH, "orders", self.config.write_timeout).await?.json(request);
            self.entity_call(builder).await.map(|_| ())
        })
        .await
    }

    pub async fn shipment_info(&self, shipment_id: &str) -> Result<Entity, CarrierError> {
        self.observe("shipment_info", async {
            let path = format!("orders/{shipment_id}");
            let builder = self.authorized(Method::GET, &path, self.config.read_timeout).await?;
            self.entity_call(builder)
                .await?
                .entity
                .ok_or_else(|| CarrierError::Upstream("order info without entity".into()))
        })
        .await
    }

    /// City suggestions by name, cached under the trimmed lowercase name.
    pub async fn suggest_cities(&self, name: &str) -> Result<Vec<City>, CarrierError> {
        let name = name.trim();
        if name.is_empty() {
            return Err(CarrierError::InvalidRequest("City name cannot be empty".into()));
        }
        let key = name.to_lowercase();
        if let Some(hit) = self.cities.get(&key) {
            self.metrics.lookup_cache_requests_total.with_label_values(&["cities", "hit"]).inc();
            debug!(key = %key, "cities served from cache");
            return Ok(hit);
        }
        self.metrics.lookup_cache_requests_total.with_label_values(&["cities", "miss"]).inc();
        let cities = self
            .observe("suggest_cities", async {
                let builder = self
                    .authorized(Method::GET, "location/suggest/cities", self.config.read_timeout)
                    .await?
                    .query(&[("name", name)]);
                Ok(decode_entries::<City>("city", self.json_list(builder).await?))
            })
            .await?;
        self.cities.insert(key, cities.clone());
        Ok(cities)
    }

    /// Pickup points of one type in a city, cached under `<city_code>_<TYPE>`.
    pub async fn delivery_points(&self, city_code: i64, point_type: Option<&str>) -> Result<Vec<DeliveryPoint>, CarrierError> {
        let point_type = point_type.map(str::trim).filter(|t| !t.is_empty()).unwrap_or(DEFAULT_POINT_TYPE).to_uppercase();
        let key = format!("{city_code}_{point_type}");
        if let Some(hit) = self.points.get(&key) {
            self.metrics.lookup_cache_requests_total.with_label_values(&["delivery_points", "hit"]).inc();
            return Ok(hit);
        }
        self.metrics.lookup_cache_requests_total.with_label_values(&["delivery_points", "miss"]).inc();
        let points = self
            .observe("delivery_points", async {
                let builder = self
                    .authorized(Method::GET, "deliverypoints", self.config.read_timeout)
                    .await?
                    .query(&[("city_code", city_code.to_string()), ("type", point_type.clone())]);
                let raw = decode_entries::<RawDeliveryPoint>("delivery_point", self.json_list(builder).await?);
                Ok(raw.into_iter().map(DeliveryPoint::from).collect::<Vec<_>>())
            })
            .await?;
        self.points.insert(key, points.clone());
        Ok(points)
    }

    pub async fn calculate_tariffs(&self, request: &TariffRequest) -> Result<Vec<Tariff>, CarrierError> {
        if request.packages.is_empty() {
            return Err(CarrierError::InvalidRequest("at least one package is required".into()));
        }
        self.observe("calculate_tariffs", async {
            let builder = self
                .authorized(Method::POST, "calculator/tarifflist", self.config.read_timeout)
                .await?
                .json(request);
            let body = self.checked(builder.send().await?).await?;
            let parsed: TariffListResponse = serde_json::from_slice(&body)
                .map_err(|e| CarrierError::Upstream(format!("unreadable tariff list: {e}")))?;
            if !parsed.errors.is_empty() {
                let messages: Vec<String> =
                    parsed.errors.iter().filter_map(|e| e.message.clone().or_else(|| e.code.clone())).collect();
                return Err(CarrierError::Upstream(messages.join("; ")));
            }
            Ok(decode_entries::<Tariff>("tariff", parsed.tariff_codes))
        })
        .await
    }

    /// Start a print job for a registered shipment.
    pub async fn request_document(&self, kind: DocumentKind, shipment_id: &str) -> Result<PrintJob, CarrierError> {
        self.observe("request_document", async {
            let path = format!("print/{}", kind.print_path());
            let builder = self
                .authorized(Method::POST, &path, self.config.write_timeout)
                .await?
                .json(&kind.print_request(shipment_id));
            let parsed = self.entity_call(builder).await?;
            let print_id = parsed
                .entity_uuid()
                .map(str::to_string)
                .ok_or_else(|| CarrierError::Upstream("print job response missing uuid".into()))?;
            Ok(PrintJob { kind, print_id })
        })
        .await
    }

    pub async fn document_status(&self, kind: DocumentKind, print_id: &str) -> Result<DocumentStatus, CarrierError> {
        let id = parse_print_id(print_id)?;
        self.observe("document_status", async {
            let path = format!("print/{}/{id}", kind.print_path());
            let builder = self.authorized(Method::GET, &path, self.config.read_timeout).await?;
            let entity = self.entity_call(builder).await?.entity.unwrap_or_default();
            Ok(DocumentStatus {
                kind,
                print_id: id.to_string(),
                status: latest_status(&entity.statuses).map(|s| s.code.clone()),
                url: entity.url,
            })
        })
        .await
    }

    /// PDF bytes of a finished print job, fetched with this service's token.
    pub async fn download_document(&self, kind: DocumentKind, print_id: &str) -> Result<Bytes, CarrierError> {
        let id = parse_print_id(print_id)?;
        self.observe("download_document", async {
            let path = format!("print/{}/{id}.pdf", kind.print_path());
            let builder = self.authorized(Method::GET, &path, self.config.read_timeout).await?;
            self.checked(builder.send().await?).await
        })
        .await
    }

    pub fn cached_city_lookups(&self) -> usize {
        self.cities.len()
    }

    pub fn cached_point_lookups(&self) -> usize {
        self.points.len()
    }
}
