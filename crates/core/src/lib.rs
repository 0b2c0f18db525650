//! # atrium-core - Platform Core Types
//!
//! This crate provides the foundation types shared across the Atrium platform
//! kernel: the validated configuration model, the per-scope context carriers,
//! secret resolution, the cascaded-defaults merge, and the error taxonomies
//! for configuration and tenancy failures.
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`config`] - Platform configuration model, loader, and validation
//! - [`context`] - RequestContext, TenantContext, and AuthContext carriers
//! - [`defaults`] - Deep merge and the realm/tenant/org defaults cascade
//! - [`secrets`] - Secret references, resolvers, and redacted values
//! - [`error`] - Configuration, tenancy, and secret error hierarchies
//!
//! ## Tenancy model
//!
//! The platform partitions data three levels deep:
//!
//! | Level | Meaning |
//! |--------|----------------------------------------------------------|
//! | Realm | Identity-provider partition (one OIDC issuer per realm) |
//! | Tenant | Customer-level partition within a realm |
//! | Org | Organizational unit within a tenant |
//!
//! Each level contributes a free-form defaults map; the effective defaults
//! for a resolved context are the deep merge of the three (see [`defaults`]).
//!
//! ## Error codes
//!
//! Every error type exposes a stable machine-readable `code()`. These codes
//! feed the process exit-code table in the kernel's bootstrap sequencer and
//! the JSON error envelope on the HTTP surface; they are a contract with
//! operators and must stay stable across releases.

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod config;
pub mod context;
pub mod defaults;
pub mod error;
pub mod secrets;

// Re-export commonly used types
pub use config::{Environment, PlatformConfig, RealmConfig};
pub use context::{AuthContext, RequestContext, TenantContext};
pub use error::{ConfigError, SecretError, TenantContextError};
pub use secrets::{SecretResolver, SecretValue};
