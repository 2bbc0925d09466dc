//! Request and notification signing for the payment gateway.
//!
//! The gateway signs a flat parameter set: every scalar top-level field except
//! the nested/excluded ones, plus the merchant password, sorted by key and
//! concatenated value-only, then hashed with SHA-256.
use serde_json::{Map, Value};
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use subtle::ConstantTimeEq;
use thiserror::Error;
use zeroize::Zeroizing;

/// Field that carries the signature itself.
pub const TOKEN_FIELD: &str = "Token";
const PASSWORD_FIELD: &str = "Password";

/// Top-level fields never included in the signature.
pub const EXCLUDED_FIELDS: [&str; 5] = [TOKEN_FIELD, "Receipt", "DATA", "Shops", "Receipts"];

/// Errors produced by the common-crypto helpers.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("notification carries no token")]
    MissingToken,
    #[error("notification token does not match")]
    TokenMismatch,
    #[error("signing secret is not configured")]
    MissingSecret,
}

/// Merchant password shared with the gateway. Never printed.
#[derive(Clone)]
pub struct GatewaySecret(Zeroizing<String>);

impl GatewaySecret {
    pub fn new(value: impl Into<String>) -> Self {
        Self(Zeroizing::new(value.into()))
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }

    fn expose(&self) -> &str {
        self.0.as_str()
    }
}

impl std::fmt::Debug for GatewaySecret {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GatewaySecret")
            .field("value", &"***redacted***")
            .finish()
    }
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}

/// Value-only concatenation of the signed fields in key order. Contains the secret.
fn canonical_string(params: &Map<String, Value>, secret: &GatewaySecret) -> Zeroizing<String> {
    let mut signed: BTreeMap<&str, String> = params
        .iter()
        .filter(|(k, _)| !EXCLUDED_FIELDS.contains(&k.as_str()))
        .filter_map(|(k, v)| scalar_to_string(v).map(|s| (k.as_str(), s)))
        .collect();
    signed.insert(PASSWORD_FIELD, secret.expose().to_string());
    Zeroizing::new(signed.into_values().collect::<String>())
}

/// Lowercase hex SHA-256 token for an outgoing request or an expected notification.
pub fn sign_params(params: &Map<String, Value>, secret: &GatewaySecret) -> String {
    let canonical = canonical_string(params, secret);
    let digest = Sha256::digest(canonical.as_bytes());
    hex::encode(digest)
}

/// Recompute the token from the notification's own fields and compare it in constant time.
///
/// Hex case is ignored.
pub fn verify_params(params: &Map<String, Value>, secret: &GatewaySecret) -> Result<(), CryptoError> {
    if secret.is_empty() {
        return Err(CryptoError::MissingSecret);
    }
    let received = params
        .get(TOKEN_FIELD)
        .and_then(Value::as_str)
        .map(|t| t.trim().to_ascii_lowercase())
        .filter(|t| !t.is_empty())
        .ok_or(CryptoError::MissingToken)?;
    let expected = sign_params(params, secret);
    if expected.as_bytes().ct_eq(received.as_bytes()).into() {
        Ok(())
    } else {
        Err(CryptoError::TokenMismatch)
    }
}
