//! Error types for the platform core.
//!
//! This module defines the error hierarchies shared across the kernel,
//! separated by failure class: configuration errors (fatal at boot),
//! tenant-context errors (per-request client errors), and secret resolution
//! errors.
//!
//! Every error exposes a stable machine-readable code via `code()`. The codes
//! are part of the operational contract: supervisors and log pipelines match
//! on them, so they must not change between releases.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use thiserror::Error;

/// Errors raised while loading or validating the platform configuration.
///
/// All of these are fatal at boot: the process logs the code, exits with the
/// matching exit code, and is never retried.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("configuration file unreadable: {path}: {message}")]
    FileRead { path: String, message: String },

    /// The configuration file could not be parsed.
    #[error("configuration file invalid: {path}: {message}")]
    FileParse { path: String, message: String },

    /// The parsed configuration violates a semantic constraint.
    #[error("configuration schema violation: {message}")]
    Schema { message: String },

    /// A secret reference named in configuration could not be resolved.
    #[error("secret reference unresolved: {reference}")]
    MissingSecret { reference: String },

    /// The configured default realm is not present in the realm tree.
    #[error("default realm {realm_key} not present in configuration")]
    MissingDefaultRealm { realm_key: String },
}

impl ConfigError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            ConfigError::FileRead { .. } => "config_file_error",
            ConfigError::FileParse { .. } => "config_file_error",
            ConfigError::Schema { .. } => "config_schema_error",
            ConfigError::MissingSecret { .. } => "config_missing_secret",
            ConfigError::MissingDefaultRealm { .. } => "config_missing_default_realm",
        }
    }
}

/// Errors raised while resolving a tenant context.
///
/// These surface per request (or per job) as client errors and are never
/// fatal to the process. Each not-found variant carries the attempted key and
/// the list of keys that would have been valid, so an operator can diagnose a
/// misrouted request without consulting the configuration by hand. Key lists
/// contain identifiers only, never secrets.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TenantContextError {
    /// The resolved realm key is not present in configuration.
    #[error("unknown realm: {attempted:?} (known realms: {available:?})")]
    UnknownRealm {
        attempted: String,
        available: Vec<String>,
    },

    /// The resolved tenant key is not present under the realm.
    #[error("unknown tenant {attempted:?} in realm {realm_key} (known tenants: {available:?})")]
    UnknownTenant {
        realm_key: String,
        attempted: String,
        available: Vec<String>,
    },

    /// The resolved org key is not present under the tenant.
    #[error(
        "unknown org {attempted:?} in tenant {realm_key}/{tenant_key} (known orgs: {available:?})"
    )]
    UnknownOrg {
        realm_key: String,
        tenant_key: String,
        attempted: String,
        available: Vec<String>,
    },

    /// An org key was supplied without a tenant key.
    #[error("org {org_key:?} supplied without a tenant")]
    OrgWithoutTenant { org_key: String },

    /// Strict mode is active and no tenant could be resolved.
    #[error("tenant context required: no tenant resolved in strict mode")]
    TenantContextRequired,
}

impl TenantContextError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            TenantContextError::UnknownRealm { .. } => "tenant_unknown_realm",
            TenantContextError::UnknownTenant { .. } => "tenant_unknown_tenant",
            TenantContextError::UnknownOrg { .. } => "tenant_unknown_org",
            TenantContextError::OrgWithoutTenant { .. } => "tenant_org_without_tenant",
            TenantContextError::TenantContextRequired => "tenant_context_required",
        }
    }
}

/// Errors raised by secret resolution backends.
#[derive(Error, Debug)]
pub enum SecretError {
    /// The backing store could not be reached or read.
    #[error("secret store access failed: {message}")]
    Access { message: String },
}

impl SecretError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            SecretError::Access { .. } => "secret_access_error",
        }
    }
}
