use std::error::Error;
use std::fmt::{Display, Formatter};

/// The one exception type of this crate. Only configuration-time code paths
/// produce it: per-request failures resolve to a `Decision` value instead of
/// an error, so nothing can throw past the access check while a request is
/// in flight.
#[derive(Debug, Clone)]
pub struct IpGuardException {
    reason: String,
    kind: IgexKind,
}

/// Numbered exception kinds for log grepping.
#[allow(non_camel_case_types)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgexKind {
    Unknown_0000,
    InvalidAddress_0001,
    InvalidPrefix_0002,
    InvalidConfigValue_0003,
}

impl IpGuardException {
    pub fn new(reason: String) -> Self {
        Self {
            reason,
            kind: IgexKind::Unknown_0000,
        }
    }

    pub fn with_err_kind(mut self, kind: IgexKind) -> Self {
        self.kind = kind;
        self
    }

    pub fn kind(&self) -> IgexKind {
        self.kind
    }

    pub fn reason(&self) -> &str {
        &self.reason
    }
}

impl Display for IpGuardException {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "IP guard exception: {}", self.reason)
    }
}

impl Error for IpGuardException {}

#[test]
fn test_exception_display_and_kind() {
    let ex = IpGuardException::new("prefix /40 out of bounds".to_string())
        .with_err_kind(IgexKind::InvalidPrefix_0002);
    assert_eq!(
        format!("{}", ex),
        "IP guard exception: prefix /40 out of bounds"
    );
    assert_eq!(ex.kind(), IgexKind::InvalidPrefix_0002);
}
