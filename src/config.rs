use std::collections::HashMap;
use std::env;

use log::info;

use crate::address_pattern::parse_pattern_list;
use crate::exceptions::{IgexKind, IpGuardException};
use crate::policy::Policy;

pub const OPT_ENABLED: &str = "enabled";
pub const OPT_ALLOWLIST: &str = "allowlist";
pub const OPT_BLOCK_UNKNOWN: &str = "blockUnknown";
pub const OPT_TRUSTED_PROXIES: &str = "trustedProxies";

pub const ENV_ENABLED: &str = "IP_GUARD_ENABLED";
pub const ENV_ALLOWLIST: &str = "IP_GUARD_ALLOWLIST";
pub const ENV_BLOCK_UNKNOWN: &str = "IP_GUARD_BLOCK_UNKNOWN";
pub const ENV_TRUSTED_PROXIES: &str = "IP_GUARD_TRUSTED_PROXIES";

/// Build a policy from environment-style key/value options.
///
/// Unknown keys are ignored; recognized keys with malformed values are hard
/// errors. This must abort startup: an allowlist entry that silently fails
/// to parse would match nothing and turn a configuration typo into a
/// lockout (or, for trusted proxies, a bypass) discovered at request time.
pub fn load_policy(options: &HashMap<String, String>) -> Result<Policy, IpGuardException> {
    let mut policy = Policy::default();
    if let Some(raw) = options.get(OPT_ENABLED) {
        policy.enabled = parse_bool_option(OPT_ENABLED, raw)?;
    }
    if let Some(raw) = options.get(OPT_ALLOWLIST) {
        policy.allowlist = parse_pattern_list(raw)?;
    }
    if let Some(raw) = options.get(OPT_BLOCK_UNKNOWN) {
        policy.block_unknown = parse_bool_option(OPT_BLOCK_UNKNOWN, raw)?;
    }
    if let Some(raw) = options.get(OPT_TRUSTED_PROXIES) {
        policy.trusted_proxies = parse_pattern_list(raw)?;
    }
    Ok(policy)
}

/// Same options sourced from the `IP_GUARD_*` environment variables.
pub fn load_policy_from_env() -> Result<Policy, IpGuardException> {
    let mut options = HashMap::new();
    for (opt, var) in [
        (OPT_ENABLED, ENV_ENABLED),
        (OPT_ALLOWLIST, ENV_ALLOWLIST),
        (OPT_BLOCK_UNKNOWN, ENV_BLOCK_UNKNOWN),
        (OPT_TRUSTED_PROXIES, ENV_TRUSTED_PROXIES),
    ] {
        if let Ok(v) = env::var(var) {
            options.insert(opt.to_string(), v);
        }
    }
    let policy = load_policy(&options)?;
    info!(
        "ip guard policy loaded: enabled={}, allowlist entries={}, trusted proxies={}, blockUnknown={}",
        policy.enabled,
        policy.allowlist.len(),
        policy.trusted_proxies.len(),
        policy.block_unknown
    );
    Ok(policy)
}

fn parse_bool_option(name: &str, raw: &str) -> Result<bool, IpGuardException> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "true" | "1" => Ok(true),
        "false" | "0" => Ok(false),
        other => Err(IpGuardException::new(format!(
            "option '{}' expects a boolean, got '{}'",
            name, other
        ))
        .with_err_kind(IgexKind::InvalidConfigValue_0003)),
    }
}

#[cfg(test)]
mod config_test {
    use std::collections::HashMap;

    use super::{load_policy, OPT_ALLOWLIST, OPT_BLOCK_UNKNOWN, OPT_ENABLED, OPT_TRUSTED_PROXIES};
    use crate::exceptions::IgexKind;

    fn options(entries: &[(&str, &str)]) -> HashMap<String, String> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_empty_options_yield_defaults() {
        let policy = load_policy(&HashMap::new()).unwrap();
        assert!(!policy.enabled);
        assert!(policy.block_unknown);
        assert!(policy.allowlist.is_empty());
        assert!(policy.trusted_proxies.is_empty());
    }

    #[test]
    fn test_full_option_set() {
        let policy = load_policy(&options(&[
            (OPT_ENABLED, "true"),
            (OPT_ALLOWLIST, "192.168.1.0/24, 10.0.0.1"),
            (OPT_BLOCK_UNKNOWN, "false"),
            (OPT_TRUSTED_PROXIES, "127.0.0.1, ::1"),
        ]))
        .unwrap();
        assert!(policy.enabled);
        assert!(!policy.block_unknown);
        assert_eq!(policy.allowlist.len(), 2);
        assert_eq!(policy.trusted_proxies.len(), 2);
    }

    #[test]
    fn test_bool_options_accept_numeric_and_mixed_case() {
        let policy = load_policy(&options(&[
            (OPT_ENABLED, "1"),
            (OPT_BLOCK_UNKNOWN, "False"),
        ]))
        .unwrap();
        assert!(policy.enabled);
        assert!(!policy.block_unknown);
    }

    #[test]
    fn test_garbage_bool_is_a_config_error() {
        let err = load_policy(&options(&[(OPT_ENABLED, "yes please")])).unwrap_err();
        assert_eq!(err.kind(), IgexKind::InvalidConfigValue_0003);
    }

    #[test]
    fn test_out_of_bounds_allowlist_prefix_aborts_loading() {
        // must fail at configuration time, not silently match nothing
        let err = load_policy(&options(&[(OPT_ALLOWLIST, "192.168.1.0/40")])).unwrap_err();
        assert_eq!(err.kind(), IgexKind::InvalidPrefix_0002);
    }

    #[test]
    fn test_malformed_trusted_proxy_aborts_loading() {
        assert!(load_policy(&options(&[(OPT_TRUSTED_PROXIES, "proxy.example.com")])).is_err());
    }

    #[test]
    fn test_unknown_keys_are_ignored() {
        let policy = load_policy(&options(&[("rateLimit", "100")])).unwrap();
        assert!(!policy.enabled);
    }
}
