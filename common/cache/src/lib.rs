//! In-process caches for carrier integration: bounded lookup results and a
//! single-flight bearer credential.
pub mod credential;
pub mod lookup;

pub use credential::{CredentialCache, IssuedCredential, DEFAULT_REFRESH_MARGIN, MAX_CREDENTIAL_LIFETIME};
pub use lookup::{LookupCache, DEFAULT_CAPACITY, DEFAULT_TTL};
