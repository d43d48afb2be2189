use std::fmt::{Display, Formatter};
use std::net::IpAddr;
use std::str::FromStr;

use crate::exceptions::{IgexKind, IpGuardException};

/// One allowlist / trusted-proxy entry: a literal address or a CIDR block.
/// The address family is fixed at parse time; matching an address of the
/// other family is always `false`, never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AddressPattern {
    Single(IpAddr),
    Range { network: IpAddr, prefix_len: u8 },
}

impl AddressPattern {
    /// Parse one textual entry. Text without `/` is an exact address, text
    /// with `/prefix` a CIDR block. Fails when the address side does not
    /// parse or the prefix is non-numeric or beyond the family bit width.
    pub fn parse(text: &str) -> Result<AddressPattern, IpGuardException> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(IpGuardException::new("empty address pattern".to_string())
                .with_err_kind(IgexKind::InvalidAddress_0001));
        }
        match trimmed.split_once('/') {
            None => {
                let addr = parse_addr(trimmed)?;
                Ok(AddressPattern::Single(addr))
            }
            Some((addr_part, prefix_part)) => {
                let network = parse_addr(addr_part)?;
                let prefix_len = u8::from_str(prefix_part).map_err(|_| {
                    IpGuardException::new(format!(
                        "non-numeric prefix length in pattern '{}'",
                        trimmed
                    ))
                    .with_err_kind(IgexKind::InvalidPrefix_0002)
                })?;
                let width = family_bits(&network);
                if prefix_len > width {
                    return Err(IpGuardException::new(format!(
                        "prefix /{} out of bounds for '{}' (family width {})",
                        prefix_len, trimmed, width
                    ))
                    .with_err_kind(IgexKind::InvalidPrefix_0002));
                }
                Ok(AddressPattern::Range {
                    network,
                    prefix_len,
                })
            }
        }
    }

    /// True when `addr` is covered by this pattern. Range comparison is done
    /// on the full-width integer value, so any textual spelling of an equal
    /// v6 address behaves identically.
    pub fn matches(&self, addr: &IpAddr) -> bool {
        match self {
            AddressPattern::Single(single) => single == addr,
            AddressPattern::Range {
                network,
                prefix_len,
            } => match (network, addr) {
                (IpAddr::V4(net), IpAddr::V4(a)) => {
                    let mask = prefix_mask_v4(*prefix_len);
                    (u32::from(*a) & mask) == (u32::from(*net) & mask)
                }
                (IpAddr::V6(net), IpAddr::V6(a)) => {
                    let mask = prefix_mask_v6(*prefix_len);
                    (u128::from(*a) & mask) == (u128::from(*net) & mask)
                }
                _ => false,
            },
        }
    }
}

impl Display for AddressPattern {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            AddressPattern::Single(addr) => write!(f, "{}", addr),
            AddressPattern::Range {
                network,
                prefix_len,
            } => write!(f, "{}/{}", network, prefix_len),
        }
    }
}

/// Parse a comma-separated pattern list from configuration. One malformed
/// entry fails the whole list: a dropped allowlist entry is a security hole,
/// not a warning.
pub fn parse_pattern_list(text: &str) -> Result<Vec<AddressPattern>, IpGuardException> {
    let mut patterns = Vec::new();
    for entry in text.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        patterns.push(AddressPattern::parse(entry)?);
    }
    Ok(patterns)
}

fn parse_addr(text: &str) -> Result<IpAddr, IpGuardException> {
    IpAddr::from_str(text).map_err(|e| {
        IpGuardException::new(format!("invalid address '{}': {}", text, e))
            .with_err_kind(IgexKind::InvalidAddress_0001)
    })
}

fn family_bits(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

// Shifting by the full width overflows, so prefix 0 (match everything) is
// special-cased to an all-zero mask.
fn prefix_mask_v4(prefix_len: u8) -> u32 {
    if prefix_len == 0 {
        0
    } else {
        !0u32 << (32 - prefix_len)
    }
}

fn prefix_mask_v6(prefix_len: u8) -> u128 {
    if prefix_len == 0 {
        0
    } else {
        !0u128 << (128 - prefix_len)
    }
}
