//! Key source identification.

use std::fmt;

/// Where a resolved realm/tenant/org key came from.
///
/// Carried through resolution for logging: a production incident involving a
/// surprising tenant is usually a question of *which source won*.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeySource {
    /// A verified token claim.
    Claim,
    /// A client-supplied header.
    Header,
    /// An explicit job payload field.
    Payload,
    /// A configured default.
    Default,
}

impl fmt::Display for KeySource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeySource::Claim => write!(f, "claim"),
            KeySource::Header => write!(f, "header"),
            KeySource::Payload => write!(f, "payload"),
            KeySource::Default => write!(f, "default"),
        }
    }
}
