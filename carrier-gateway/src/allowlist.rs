//! Source-address allow-list for carrier callbacks.
use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use thiserror::Error;
use tracing::warn;

use common_http_errors::ApiError;

use crate::AppState;

pub const FORWARDED_FOR_HEADER: &str = "x-forwarded-for";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum AllowListError {
    #[error("invalid address in network {0:?}")]
    InvalidAddress(String),
    #[error("invalid prefix length in network {0:?}")]
    InvalidPrefix(String),
}

/// IPv4-mapped IPv6 addresses compare as their IPv4 form.
pub fn canonical_ip(ip: IpAddr) -> IpAddr {
    match ip {
        IpAddr::V6(v6) => v6.to_ipv4_mapped().map(IpAddr::V4).unwrap_or(IpAddr::V6(v6)),
        v4 => v4,
    }
}

/// One CIDR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IpNetwork {
    addr: IpAddr,
    prefix: u8,
}

impl IpNetwork {
    pub fn contains(&self, ip: IpAddr) -> bool {
        match (self.addr, canonical_ip(ip)) {
            (IpAddr::V4(net), IpAddr::V4(ip)) => {
                let mask = if self.prefix == 0 { 0 } else { u32::MAX << (32 - u32::from(self.prefix)) };
                u32::from(net) & mask == u32::from(ip) & mask
            }
            (IpAddr::V6(net), IpAddr::V6(ip)) => {
                let mask = if self.prefix == 0 { 0 } else { u128::MAX << (128 - u32::from(self.prefix)) };
                u128::from(net) & mask == u128::from(ip) & mask
            }
            _ => false,
        }
    }
}

impl FromStr for IpNetwork {
    type Err = AllowListError;

    /// `a.b.c.d/nn`, `v6::addr/nn` or a bare address (full-length prefix).
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let raw = s.trim();
        let (addr_part, prefix_part) = match raw.split_once('/') {
            Some((a, p)) => (a, Some(p)),
            None => (raw, None),
        };
        let addr = canonical_ip(
            IpAddr::from_str(addr_part.trim()).map_err(|_| AllowListError::InvalidAddress(raw.to_string()))?,
        );
        let max = if addr.is_ipv4() { 32 } else { 128 };
        let mut prefix = match prefix_part {
            Some(p) => p.trim().parse::<u8>().map_err(|_| AllowListError::InvalidPrefix(raw.to_string()))?,
            None => max,
        };
        // An IPv4-mapped block written in v6 notation: ::ffff:10.0.0.0/104 -> 10.0.0.0/8.
        if addr.is_ipv4() && prefix_part.is_some() && addr_part.contains(':') {
            prefix = prefix.checked_sub(96).ok_or_else(|| AllowListError::InvalidPrefix(raw.to_string()))?;
        }
        if prefix > max {
            return Err(AllowListError::InvalidPrefix(raw.to_string()));
        }
        Ok(Self { addr, prefix })
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AllowList {
    networks: Vec<IpNetwork>,
}

impl AllowList {
    pub fn new(networks: Vec<IpNetwork>) -> Self {
        Self { networks }
    }

    /// Comma separated CIDR list. Blank entries are skipped; an empty list allows nobody.
    pub fn parse(list: &str) -> Result<Self, AllowListError> {
        let networks = list
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(IpNetwork::from_str)
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { networks })
    }

    pub fn is_empty(&self) -> bool {
        self.networks.is_empty()
    }

    pub fn len(&self) -> usize {
        self.networks.len()
    }

    pub fn allows(&self, ip: IpAddr) -> bool {
        self.networks.iter().any(|n| n.contains(ip))
    }
}

/// First `X-Forwarded-For` hop, else the TCP peer.
pub fn source_ip(request: &Request) -> Option<IpAddr> {
    if let Some(forwarded) = request.headers().get(FORWARDED_FOR_HEADER).and_then(|v| v.to_str().ok()) {
        let first = forwarded.split(',').next().map(str::trim).unwrap_or_default();
        // Malformed header: treat the source as unknown rather than falling back to the proxy.
        return parse_hop(first).map(canonical_ip);
    }
    request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ci| canonical_ip(ci.0.ip()))
}

fn parse_hop(hop: &str) -> Option<IpAddr> {
    if let Ok(ip) = IpAddr::from_str(hop) {
        return Some(ip);
    }
    // "1.2.3.4:5678" or "[::1]:5678"
    SocketAddr::from_str(hop).ok().map(|s| s.ip())
}

pub async fn require_carrier_source(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let source = source_ip(&request);
    match source {
        Some(ip) if state.webhook_allow_list.allows(ip) => next.run(request).await,
        _ => {
            warn!(source = ?source, path = %request.uri().path(), "carrier webhook from disallowed source");
            state.metrics.carrier_webhooks_total.with_label_values(&["forbidden_source"]).inc();
            ApiError::Denied { code: "webhook_source_forbidden", trace_id: None }.into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn v4_blocks() {
        let list = AllowList::parse("178.154.0.0/16, 10.1.2.3").unwrap();
        assert_eq!(list.len(), 2);
        assert!(list.allows(ip("178.154.200.1")));
        assert!(list.allows(ip("10.1.2.3")));
        assert!(!list.allows(ip("10.1.2.4")));
        assert!(!list.allows(ip("178.155.0.1")));
    }

    #[test]
    fn mapped_v6_matches_v4_block() {
        let list = AllowList::parse("192.168.0.0/24").unwrap();
        assert!(list.allows(ip("::ffff:192.168.0.77")));
        let mapped_block = AllowList::parse("::ffff:192.168.0.0/120").unwrap();
        assert!(mapped_block.allows(ip("192.168.0.9")));
    }

    #[test]
    fn v6_blocks_and_zero_prefix() {
        let list = AllowList::parse("2a02:6b8::/32").unwrap();
        assert!(list.allows(ip("2a02:6b8:c00::1")));
        assert!(!list.allows(ip("2a02:6b9::1")));
        assert!(!list.allows(ip("10.0.0.1")));
        assert!(AllowList::parse("0.0.0.0/0").unwrap().allows(ip("8.8.8.8")));
    }

    #[test]
    fn empty_list_allows_nobody() {
        let list = AllowList::parse(" , ").unwrap();
        assert!(list.is_empty());
        assert!(!list.allows(ip("127.0.0.1")));
    }

    #[test]
    fn rejects_bad_entries() {
        assert!(matches!(AllowList::parse("10.0.0.0/33"), Err(AllowListError::InvalidPrefix(_))));
        assert!(matches!(AllowList::parse("not-an-ip/8"), Err(AllowListError::InvalidAddress(_))));
        assert!(matches!(AllowList::parse("10.0.0.0/x"), Err(AllowListError::InvalidPrefix(_))));
    }

    #[test]
    fn forwarded_header_wins_over_peer() {
        let mut req = Request::builder()
            .header(FORWARDED_FOR_HEADER, "203.0.113.5, 10.0.0.1")
            .body(axum::body::Body::empty())
            .unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 443))));
        assert_eq!(source_ip(&req), Some(ip("203.0.113.5")));

        let mut req = Request::builder().body(axum::body::Body::empty()).unwrap();
        req.extensions_mut().insert(ConnectInfo(SocketAddr::from(([10, 0, 0, 1], 443))));
        assert_eq!(source_ip(&req), Some(ip("10.0.0.1")));

        let req = Request::builder().body(axum::body::Body::empty()).unwrap();
        assert_eq!(source_ip(&req), None);
    }
}
