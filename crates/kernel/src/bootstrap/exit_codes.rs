//! Process exit-code classification.
//!
//! Exit codes are a contract with the process supervisor: they identify the
//! failure class without access to logs, and they must not change between
//! releases.
//!
//! | Code | Failure class |
//! |------|----------------------------------------------|
//! | 1 | Unclassified bootstrap error |
//! | 10 | Configuration file unreadable or unparseable |
//! | 11 | Configuration schema violation |
//! | 12 | Secret reference unresolved |
//! | 13 | Default realm missing from configuration |
//! | 20 | Unknown realm |
//! | 21 | Unknown tenant |
//! | 22 | Unknown org |
//! | 23 | Org configured without tenant |
//! | 24 | Tenant context required |
//!
//! The 2x block covers validation of the configured default
//! realm/tenant/org triple, which runs at boot through the same validator as
//! per-request resolution.

use atrium_core::error::{ConfigError, TenantContextError};

use super::{BootError, BootFailure};

/// Unclassified bootstrap failure.
pub const EXIT_BOOTSTRAP_ERROR: i32 = 1;
/// Configuration file unreadable or unparseable.
pub const EXIT_CONFIG_FILE_ERROR: i32 = 10;
/// Configuration schema violation.
pub const EXIT_CONFIG_SCHEMA_ERROR: i32 = 11;
/// Secret reference named in configuration did not resolve.
pub const EXIT_MISSING_SECRET: i32 = 12;
/// The configured default realm is absent from the realm tree.
pub const EXIT_MISSING_DEFAULT_REALM: i32 = 13;
/// Resolved realm not present in configuration.
pub const EXIT_UNKNOWN_REALM: i32 = 20;
/// Resolved tenant not present under its realm.
pub const EXIT_UNKNOWN_TENANT: i32 = 21;
/// Resolved org not present under its tenant.
pub const EXIT_UNKNOWN_ORG: i32 = 22;
/// Org key configured without a tenant key.
pub const EXIT_ORG_WITHOUT_TENANT: i32 = 23;
/// Strict mode resolved no tenant.
pub const EXIT_TENANT_CONTEXT_REQUIRED: i32 = 24;

/// Maps a bootstrap failure to its stable process exit code.
///
/// Pure: classification depends only on the error value, never on process
/// state.
pub fn classify(error: &BootError) -> i32 {
    match &error.source {
        BootFailure::Config(config) => match config {
            ConfigError::FileRead { .. } | ConfigError::FileParse { .. } => {
                EXIT_CONFIG_FILE_ERROR
            }
            ConfigError::Schema { .. } => EXIT_CONFIG_SCHEMA_ERROR,
            ConfigError::MissingSecret { .. } => EXIT_MISSING_SECRET,
            ConfigError::MissingDefaultRealm { .. } => EXIT_MISSING_DEFAULT_REALM,
        },
        BootFailure::TenantContext(tenant) => match tenant {
            TenantContextError::UnknownRealm { .. } => EXIT_UNKNOWN_REALM,
            TenantContextError::UnknownTenant { .. } => EXIT_UNKNOWN_TENANT,
            TenantContextError::UnknownOrg { .. } => EXIT_UNKNOWN_ORG,
            TenantContextError::OrgWithoutTenant { .. } => EXIT_ORG_WITHOUT_TENANT,
            TenantContextError::TenantContextRequired => EXIT_TENANT_CONTEXT_REQUIRED,
        },
        BootFailure::Container(_) | BootFailure::Other(_) => EXIT_BOOTSTRAP_ERROR,
    }
}
