use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::{ConnectInfo, Request, State};
use axum::middleware::Next;
use axum::response::Response;
use axum::Json;
use log::debug;
use serde_json::{json, Value};

use crate::decision::{decide, Decision};
use crate::policy::{Policy, PolicyStore};
use crate::rejection::forbidden_response;

pub mod address_pattern;
pub mod client_resolver;
pub mod config;
pub mod decision;
pub mod exceptions;
pub mod policy;
pub mod rejection;

pub use crate::address_pattern::AddressPattern;
pub use crate::decision::DenyReason;
pub use crate::exceptions::IpGuardException;

/// Shared state handed to the axum layer via `from_fn_with_state`.
pub type IGState = Arc<IpGuardState>;

pub struct IpGuardState {
    store: PolicyStore,
}

/// Network-boundary access control for an axum service: every inbound
/// request is judged against the current policy snapshot before any
/// application handler runs, and denied requests are answered with the
/// standard 403 rejection.
///
/// Register the middleware with `axum::middleware::from_fn_with_state` and
/// make sure the app is served with
/// `into_make_service_with_connect_info::<SocketAddr>()` so the peer
/// address is available:
///
/// ```no_run
/// use std::net::SocketAddr;
/// use axum::{middleware::from_fn_with_state, routing::get, Router};
/// use axum_ip_guard::{config, IpGuard, IpGuardBuilder};
///
/// # async fn run() -> Result<(), axum_ip_guard::IpGuardException> {
/// let guard = IpGuardBuilder::new()
///     .with_policy(config::load_policy_from_env()?)
///     .build();
///
/// let app = Router::new()
///     .route("/", get(|| async { "hello" }))
///     .route("/health/ip-protection", get(IpGuard::status_handler))
///     .layer(from_fn_with_state(guard.state(), IpGuard::enforce))
///     .with_state(guard.state());
///
/// let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
/// axum::serve(
///     listener,
///     app.into_make_service_with_connect_info::<SocketAddr>(),
/// )
/// .await
/// .unwrap();
/// # Ok(())
/// # }
/// ```
pub struct IpGuard {
    state: IGState,
}

impl IpGuard {
    pub fn new(policy: Policy) -> Self {
        Self {
            state: Arc::new(IpGuardState {
                store: PolicyStore::new(policy),
            }),
        }
    }

    pub fn state(&self) -> IGState {
        self.state.clone()
    }

    /// Whether protection is currently switched on, for diagnostics
    /// payloads assembled elsewhere.
    pub fn is_enabled(&self) -> bool {
        self.state.store.current().enabled
    }

    pub fn current_policy(&self) -> Arc<Policy> {
        self.state.store.current()
    }

    /// Swap in a whole new policy snapshot. Requests already past
    /// `enforce` keep the snapshot they started with.
    pub fn replace_policy(&self, policy: Policy) {
        debug!("replacing ip guard policy snapshot");
        self.state.store.replace(policy);
    }

    /// The middleware itself. Runs before any application logic; on allow
    /// the request is forwarded unchanged, on deny the pipeline halts with
    /// the standard rejection response.
    pub async fn enforce(
        State(state): State<IGState>,
        ConnectInfo(addr): ConnectInfo<SocketAddr>,
        request: Request,
        next: Next,
    ) -> Response {
        let policy = state.store.current();
        match decide(addr.ip(), request.headers(), &policy) {
            (Decision::Allow, _) => next.run(request).await,
            (Decision::Deny(reason), client) => forbidden_response(&reason, client.as_deref()),
        }
    }

    /// Health surface: reports whether protection is enabled, e.g.
    /// `{"ipProtection": true}`.
    pub async fn status_handler(State(state): State<IGState>) -> Json<Value> {
        Json(json!({ "ipProtection": state.store.current().enabled }))
    }
}

pub struct IpGuardBuilder {
    policy: Policy,
}

impl IpGuardBuilder {
    pub fn new() -> Self {
        Self {
            policy: Policy::default(),
        }
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.policy.enabled = enabled;
        self
    }

    pub fn with_allowlist(mut self, allowlist: Vec<AddressPattern>) -> Self {
        self.policy.allowlist = allowlist;
        self
    }

    pub fn with_trusted_proxies(mut self, trusted_proxies: Vec<AddressPattern>) -> Self {
        self.policy.trusted_proxies = trusted_proxies;
        self
    }

    pub fn with_block_unknown(mut self, block_unknown: bool) -> Self {
        self.policy.block_unknown = block_unknown;
        self
    }

    pub fn build(self) -> IpGuard {
        IpGuard::new(self.policy)
    }
}

impl Default for IpGuardBuilder {
    fn default() -> Self {
        Self::new()
    }
}
