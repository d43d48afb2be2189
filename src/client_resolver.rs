use std::net::IpAddr;

use axum::http::HeaderMap;
use log::{debug, warn};

use crate::policy::Policy;

pub(crate) const X_FORWARDED_FOR: &str = "x-forwarded-for";
pub(crate) const X_REAL_IP: &str = "x-real-ip";

/// Work out which textual address to treat as "the client" for this
/// request. Returns the raw resolved text: well-formedness is judged by the
/// decision engine, not here. Empty text means no client address could be
/// determined.
///
/// Forwarded headers are honored whenever any trusted proxy is configured,
/// even if the immediate peer is not one of them. Kept for compatibility
/// with existing deployments; it means the edge proxy must strip or
/// overwrite inbound `x-forwarded-for` / `x-real-ip`, otherwise any direct
/// client can claim an arbitrary address. A warning is logged when the lax
/// case is hit so operators can spot it.
pub fn resolve_client_text(peer: IpAddr, headers: &HeaderMap, policy: &Policy) -> String {
    if !policy.trusted_proxies.is_empty() {
        if let Some(xff) = headers.get(X_FORWARDED_FOR) {
            warn_on_untrusted_peer(peer, policy);
            let full = xff.to_str().unwrap_or("");
            // first token is the originally-claimed client; each hop appends
            let first = full.split(',').next().unwrap_or("").trim();
            debug!("resolved client '{}' from {}", first, X_FORWARDED_FOR);
            return first.to_string();
        }
        if let Some(xri) = headers.get(X_REAL_IP) {
            warn_on_untrusted_peer(peer, policy);
            let trimmed = xri.to_str().unwrap_or("").trim();
            debug!("resolved client '{}' from {}", trimmed, X_REAL_IP);
            return trimmed.to_string();
        }
    }
    peer.to_string()
}

fn warn_on_untrusted_peer(peer: IpAddr, policy: &Policy) {
    if !policy.is_trusted_proxy(&peer) {
        warn!(
            "honoring forwarded headers although peer {} matches no trusted proxy entry",
            peer
        );
    }
}

#[cfg(test)]
mod client_resolver_test {
    use std::net::IpAddr;
    use std::str::FromStr;

    use axum::http::{HeaderMap, HeaderName, HeaderValue};

    use super::resolve_client_text;
    use crate::address_pattern::AddressPattern;
    use crate::policy::Policy;

    fn peer(s: &str) -> IpAddr {
        IpAddr::from_str(s).unwrap()
    }

    fn trusting_policy() -> Policy {
        Policy {
            trusted_proxies: vec![AddressPattern::parse("127.0.0.1").unwrap()],
            ..Policy::default()
        }
    }

    #[test]
    fn test_peer_is_authoritative_without_trusted_proxies() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.2"));
        let resolved = resolve_client_text(peer("10.0.0.5"), &headers, &Policy::default());
        assert_eq!(resolved, "10.0.0.5");
    }

    #[test]
    fn test_first_forwarded_for_token_wins() {
        let mut headers = HeaderMap::new();
        headers.insert(
            "x-forwarded-for",
            HeaderValue::from_static(" 203.0.113.1 , 10.0.0.1, 10.0.0.2"),
        );
        let resolved = resolve_client_text(peer("127.0.0.1"), &headers, &trusting_policy());
        assert_eq!(resolved, "203.0.113.1");
    }

    #[test]
    fn test_real_ip_used_when_forwarded_for_absent() {
        let mut headers = HeaderMap::new();
        headers.insert("x-real-ip", HeaderValue::from_static("  203.0.113.9  "));
        let resolved = resolve_client_text(peer("127.0.0.1"), &headers, &trusting_policy());
        assert_eq!(resolved, "203.0.113.9");
    }

    #[test]
    fn test_forwarded_for_takes_precedence_over_real_ip() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        headers.insert("x-real-ip", HeaderValue::from_static("203.0.113.2"));
        let resolved = resolve_client_text(peer("127.0.0.1"), &headers, &trusting_policy());
        assert_eq!(resolved, "203.0.113.1");
    }

    #[test]
    fn test_header_name_lookup_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(
            HeaderName::from_bytes(b"X-Forwarded-For").unwrap(),
            HeaderValue::from_static("203.0.113.1"),
        );
        let resolved = resolve_client_text(peer("127.0.0.1"), &headers, &trusting_policy());
        assert_eq!(resolved, "203.0.113.1");
    }

    #[test]
    fn test_empty_forwarded_token_resolves_to_empty_text() {
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static(" , 10.0.0.1"));
        let resolved = resolve_client_text(peer("127.0.0.1"), &headers, &trusting_policy());
        assert_eq!(resolved, "");
    }

    #[test]
    fn test_headers_honored_even_from_untrusted_peer() {
        // the lax behavior kept on purpose: any trusted proxy configured
        // enables header resolution for every peer
        let mut headers = HeaderMap::new();
        headers.insert("x-forwarded-for", HeaderValue::from_static("203.0.113.1"));
        let resolved = resolve_client_text(peer("198.51.100.7"), &headers, &trusting_policy());
        assert_eq!(resolved, "203.0.113.1");
    }

    #[test]
    fn test_no_headers_falls_back_to_peer() {
        let headers = HeaderMap::new();
        let resolved = resolve_client_text(peer("192.168.1.50"), &headers, &trusting_policy());
        assert_eq!(resolved, "192.168.1.50");
    }
}
