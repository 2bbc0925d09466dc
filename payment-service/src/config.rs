use anyhow::{Context, Result};
use common_crypto::GatewaySecret;
use std::env;
use std::time::Duration;

pub const DEFAULT_API_URL: &str = "https://securepay.tinkoff.ru/v2";

/// Terminal credentials and redirect targets for the payment gateway.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    pub terminal_key: Option<String>,
    pub secret: Option<GatewaySecret>,
    pub api_url: String,
    pub success_url: String,
    pub fail_url: String,
    pub timeout: Duration,
}

impl GatewayConfig {
    pub fn is_configured(&self) -> bool {
        let has_key = self.terminal_key.as_deref().map(|k| !k.trim().is_empty()).unwrap_or(false);
        let has_secret = self.secret.as_ref().map(|s| !s.is_empty()).unwrap_or(false);
        has_key && has_secret
    }

    pub fn from_env() -> Self {
        let terminal_key = env::var("TBANK_TERMINAL_KEY").ok().filter(|v| !v.trim().is_empty());
        let secret = env::var("TBANK_SECRET_KEY").ok().filter(|v| !v.trim().is_empty()).map(GatewaySecret::new);
        let api_url = env::var("TBANK_API_URL").unwrap_or_else(|_| DEFAULT_API_URL.to_string());
        let success_url = env::var("TBANK_SUCCESS_URL")
            .unwrap_or_else(|_| "http://localhost:3000/payment/success".to_string());
        let fail_url = env::var("TBANK_FAIL_URL")
            .unwrap_or_else(|_| "http://localhost:3000/payment/fail".to_string());
        let timeout_secs = env::var("TBANK_TIMEOUT_SECONDS")
            .ok()
            .and_then(|value| value.parse::<u64>().ok())
            .unwrap_or(30);
        Self {
            terminal_key,
            secret,
            api_url: api_url.trim_end_matches('/').to_string(),
            success_url,
            fail_url,
            timeout: Duration::from_secs(timeout_secs.max(1)),
        }
    }
}

#[derive(Debug, Clone)]
pub struct PaymentServiceConfig {
    pub database_url: String,
    pub host: String,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
    pub gateway: GatewayConfig,
}

impl PaymentServiceConfig {
    pub fn from_env() -> Result<Self> {
        let database_url = env::var("DATABASE_URL").context("DATABASE_URL must be set")?;
        let host = env::var("HOST").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("PORT")
            .ok()
            .and_then(|value| value.parse::<u16>().ok())
            .unwrap_or(8086);
        let cors_allowed_origins = env::var("CORS_ALLOWED_ORIGINS")
            .ok()
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_else(|| vec!["http://localhost:3000".to_string()]);
        Ok(Self { database_url, host, port, cors_allowed_origins, gateway: GatewayConfig::from_env() })
    }
}
