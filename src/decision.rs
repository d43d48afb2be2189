use std::collections::HashSet;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::str::FromStr;

use axum::http::HeaderMap;
use lazy_static::lazy_static;
use log::{debug, warn};

use crate::client_resolver::resolve_client_text;
use crate::policy::Policy;

/// Outcome of the access check for one request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Allow,
    Deny(DenyReason),
}

/// Reason codes map 1:1 onto the wire-level rejection text (see the
/// rejection module); clients may branch on them, so keep them stable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DenyReason {
    NoClientIp,
    InvalidFormat,
    NotInAllowlist,
}

lazy_static! {
    /// Loopback spellings that always pass: the v4 loopback, the v6
    /// loopback, and the v4-mapped-v6 loopback. The mapped form is its own
    /// 128-bit value and would otherwise fail an allowlist holding only
    /// `127.0.0.1`.
    static ref LOCALHOST_ADDRS: HashSet<IpAddr> = {
        let mut s = HashSet::new();
        s.insert(IpAddr::V4(Ipv4Addr::LOCALHOST));
        s.insert(IpAddr::V6(Ipv6Addr::LOCALHOST));
        s.insert(IpAddr::V6(Ipv4Addr::LOCALHOST.to_ipv6_mapped()));
        s
    };
}

/// Decide whether the request may proceed. Pure function of its inputs:
/// no hidden state, no I/O, nothing here can panic on request data.
///
/// Five ordered checks, first match wins:
/// 1. protection disabled: allow everything;
/// 2. no client address resolved: deny (`NoClientIp`) when
///    `block_unknown`, allow otherwise;
/// 3. resolved text does not parse as an address: deny (`InvalidFormat`)
///    regardless of `block_unknown` (malformed is a stronger signal than
///    unknown);
/// 4. loopback client: allow unconditionally, even with an empty or
///    non-matching allowlist (checked after parsing so a malformed
///    loopback-looking string still denies);
/// 5. allowlist membership decides.
///
/// The second element of the returned pair is the resolved client text,
/// handed to the rejection responder for the deny payload.
pub fn decide(peer: IpAddr, headers: &HeaderMap, policy: &Policy) -> (Decision, Option<String>) {
    if !policy.enabled {
        return (Decision::Allow, None);
    }

    let client_text = resolve_client_text(peer, headers, policy);
    if client_text.is_empty() {
        return if policy.block_unknown {
            warn!(
                "denying request from peer {}: no client address could be determined",
                peer
            );
            (Decision::Deny(DenyReason::NoClientIp), None)
        } else {
            (Decision::Allow, None)
        };
    }

    let client_addr = match IpAddr::from_str(&client_text) {
        Ok(addr) => addr,
        Err(_) => {
            warn!(
                "denying request from peer {}: unparsable client address '{}'",
                peer, client_text
            );
            return (Decision::Deny(DenyReason::InvalidFormat), Some(client_text));
        }
    };

    if LOCALHOST_ADDRS.contains(&client_addr) {
        debug!("allowing loopback client {}", client_addr);
        return (Decision::Allow, Some(client_text));
    }

    if policy.allowlist.iter().any(|p| p.matches(&client_addr)) {
        debug!("client {} matched allowlist", client_addr);
        (Decision::Allow, Some(client_text))
    } else {
        warn!("denying request: client {} not in allowlist", client_addr);
        (Decision::Deny(DenyReason::NotInAllowlist), Some(client_text))
    }
}
