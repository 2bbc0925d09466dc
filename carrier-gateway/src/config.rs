use anyhow::{Context, Result};
use std::env;
use std::time::Duration;

use crate::allowlist::AllowList;

pub const TEST_API_URL: &str = "https://api.edu.cdek.ru/v2";
pub const PRODUCTION_API_URL: &str = "https://api.cdek.ru/v2";

/// Warehouse-to-warehouse parcel.
pub const DEFAULT_TARIFF_CODE: i32 = 136;

/// Carrier account, endpoints and request shaping.
#[derive(Debug, Clone)]
pub struct CarrierConfig {
    pub account: Option<String>,
    pub secure_password: Option<String>,
    pub api_url: String,
    pub test_mode: bool,
    pub tariff_code: i32,
    pub shipment_point: String,
    pub default_phone: String,
    pub read_timeout: Duration,
    pub write_timeout: Duration,
    pub lookup_ttl: Duration,
    pub lookup_capacity: usize,
}

impl CarrierConfig {
    pub fn has_credentials(&self) -> bool {
        matches!((&self.account, &self.secure_password), (Some(a), Some(p)) if !a.is_empty() && !p.is_empty())
    }

    /// Defaults for a test-mode client pointed at `api_url`.
    pub fn for_api(api_url: impl Into<String>) -> Self {
        Self {
            account: None,
            secure_password: None,
            api_url: api_url.into(),
            test_mode: true,
            tariff_code: DEFAULT_TARIFF_CODE,
            shipment_point: "MSK5".into(),
            default_phone: "+79991234567".into(),
            read_timeout: Duration::from_secs(10),
            write_timeout: Duration::from_secs(30),
            lookup_ttl: common_cache::DEFAULT_TTL,
            lookup_capacity: common_cache::DEFAULT_CAPACITY,
        }
    }

    pub fn from_env() -> Self {
        let non_empty = |name: &str| env::var(name).ok().map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let secs = |name: &str, default: u64| {
            env::var(name).ok().and_then(|v| v.parse::<u64>().ok()).unwrap_or(default).max(1)
        };
        let test_mode = env::var("CDEK_TEST_MODE")
            .map(|v| matches!(v.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
            .unwrap_or(true);
        let api_url = non_empty("CDEK_API_URL").unwrap_or_else(|| {
            if test_mode { TEST_API_URL.to_string() } else { PRODUCTION_API_URL.to_string() }
        });
        let tariff_code = env::var("CDEK_TARIFF_CODE")
            .ok()
            .and_then(|v| v.parse::<i32>().ok())
            .unwrap_or(DEFAULT_TARIFF_CODE);
        let lookup_capacity = env::var("CDEK_LOOKUP_CAPACITY")
            .ok()
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(common_cache::DEFAULT_CAPACITY)
            .max(1);

        Self {
            account: non_empty("CDEK_ACCOUNT"),
            secure_password: non_empty("CDEK_SECURE_PASSWORD"),
            api_url: api_url.trim_end_matches('/').to_string(),
            test_mode,
            tariff_code,
            shipment_point: non_empty("CDEK_SHIPMENT_POINT").unwrap_or_else(|| "MSK5".to_string()),
            default_phone: non_empty("CDEK_DEFAULT_PHONE").unwrap_or_else(|| "+79991234567".to_string()),
            read_timeout: Duration::from_secs(secs("CDEK_READ_TIMEOUT_SECONDS", 10)),
            write_timeout: Duration::from_secs(secs("CDEK_WRITE_TIMEOUT_SECONDS", 30)),
            lookup_ttl: Duration::from_secs(secs("CDEK_LOOKUP_TTL_SECONDS", 86_400)),
            lookup_capacity,
        }
    }
}

#[derive(Debug, Clone)]
pub struct CarrierGatewayConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub webhook_allow_list: AllowList,
    pub carrier: CarrierConfig,
}

impl CarrierGatewayConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8083);
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]);
        let webhook_allow_list = webhook_allow_list(env::var("CDEK_WEBHOOK_ALLOWED_NETWORKS").ok().as_deref())?;
        Ok(Self {
            database_url,
            host,
            port,
            cors_allowed_origins,
            webhook_allow_list,
            carrier: CarrierConfig::from_env(),
        })
    }
}

/// Parses the carrier webhook allow-list. The variable must be set; an explicit empty value rejects every source.
pub fn webhook_allow_list(value: Option<&str>) -> Result<AllowList> {
    let networks = value.context(
        "CDEK_WEBHOOK_ALLOWED_NETWORKS must be set (comma separated CIDRs, or empty to reject every carrier webhook)",
    )?;
    AllowList::parse(networks).context("CDEK_WEBHOOK_ALLOWED_NETWORKS must be a comma separated CIDR list")
}
