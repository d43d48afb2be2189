use std::net::IpAddr;
use std::sync::{Arc, RwLock};

use crate::address_pattern::AddressPattern;

/// The resolved access-control configuration. A `Policy` is an immutable
/// snapshot: reconfiguration builds a whole new value and swaps it in via
/// [`PolicyStore::replace`], never patches fields in place.
#[derive(Debug, Clone)]
pub struct Policy {
    /// When false the access check is a no-op: every request is allowed.
    pub enabled: bool,
    /// Allowlist entries in insertion order (order does not affect
    /// matching, it is kept for diagnostics).
    pub allowlist: Vec<AddressPattern>,
    /// Proxies permitted to supply forwarded-address headers. A non-empty
    /// list switches client resolution to header-based mode.
    pub trusted_proxies: Vec<AddressPattern>,
    /// Deny (true) or allow (false) when no client address can be
    /// determined at all.
    pub block_unknown: bool,
}

impl Default for Policy {
    fn default() -> Self {
        Self {
            enabled: false,
            allowlist: Vec::new(),
            trusted_proxies: Vec::new(),
            block_unknown: true,
        }
    }
}

impl Policy {
    pub fn is_trusted_proxy(&self, addr: &IpAddr) -> bool {
        self.trusted_proxies.iter().any(|p| p.matches(addr))
    }
}

/// Holder for the process-wide policy snapshot.
///
/// Readers clone out an `Arc`, so a decision in flight keeps whichever
/// snapshot it started with; `replace` is a single pointer swap under the
/// lock and can never be observed half-applied.
pub struct PolicyStore {
    inner: RwLock<Arc<Policy>>,
}

impl PolicyStore {
    pub fn new(policy: Policy) -> Self {
        Self {
            inner: RwLock::new(Arc::new(policy)),
        }
    }

    pub fn current(&self) -> Arc<Policy> {
        match self.inner.read() {
            Ok(guard) => guard.clone(),
            // a poisoned lock still holds a complete snapshot
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn replace(&self, policy: Policy) {
        let snapshot = Arc::new(policy);
        match self.inner.write() {
            Ok(mut guard) => *guard = snapshot,
            Err(poisoned) => *poisoned.into_inner() = snapshot,
        }
    }
}
