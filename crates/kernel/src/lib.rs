//! # atrium-kernel - Platform Runtime Kernel
//!
//! This crate is the runtime core of the Atrium multi-tenant backend
//! platform: a scoped dependency container, a tenant/realm context resolver,
//! a defense-in-depth JWT authentication pipeline, and the ordered bootstrap
//! sequence that wires them together. Route tables, persistence, and the
//! other feature subsystems live outside the kernel and plug in as container
//! registrations.
//!
//! ## Request flow
//!
//! ```text
//! bootstrap -> root container (kernel defaults registered)
//!     per request:
//!         child scope
//!             -> RequestContext   (request id, method, path)
//!             -> TenantContext    (headers/claims vs configuration)
//!             -> AuthContext      (verify, defense checks, normalize)
//!         -> HandlerContext handed to the injected RequestHandler
//! ```
//!
//! ## Architecture
//!
//! The crate is organized into several modules:
//!
//! - [`container`] - Token-keyed DI registry with singleton/scoped/transient
//!   caching and parent/child scope chaining
//! - [`lifecycle`] - Ordered, idempotent shutdown hooks with a stop timeout
//! - [`tenant`] - Tenant context resolution and validation
//! - [`auth`] - Per-realm verifier cache and the JWT auth pipeline
//! - [`audit`] - Best-effort structured audit trail
//! - [`bootstrap`] - Staged startup, runtime modes, signals, exit codes
//! - [`entrypoint`] - The axum HTTP entrypoint composing per-request scopes
//! - [`tokens`] - Well-known container tokens
//!
//! ## Multi-tenant guarantees
//!
//! Tenant isolation is enforced twice on every authenticated request: once
//! when the tenant context is resolved and validated against configuration,
//! and again by the auth pipeline's tenant-binding check, which rejects
//! cryptographically valid tokens replayed across tenants. In production
//! with `requireTenantClaimsInProd`, verified claims are authoritative over
//! client-supplied headers and requests without a tenant are rejected
//! outright.
//!
//! ## Quick start
//!
//! ```rust,ignore
//! use atrium_kernel::bootstrap::{self, BootOptions, RuntimeMode};
//!
//! #[tokio::main]
//! async fn main() {
//!     atrium_kernel::init_logging("info");
//!     let options = BootOptions::new("atrium.json", RuntimeMode::Api);
//!     match bootstrap::run(options).await {
//!         Ok(kernel) => kernel.wait().await,
//!         Err(error) => std::process::exit(bootstrap::classify(&error)),
//!     }
//! }
//! ```
//!
//! ## Error codes
//!
//! Every kernel error carries a stable machine-readable code, surfaced in
//! the HTTP JSON error envelope and, for boot failures, mapped to the
//! process exit-code table in [`bootstrap::exit_codes`].

// Enforce documentation
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]

pub mod audit;
pub mod auth;
pub mod bootstrap;
pub mod container;
pub mod entrypoint;
pub mod lifecycle;
pub mod tenant;
pub mod tokens;

// Re-export commonly used types
pub use audit::{AuditEvent, AuditKind, AuditWriter};
pub use auth::{AuthError, AuthPipeline};
pub use bootstrap::{BootError, BootOptions, BootedKernel, RuntimeMode};
pub use container::{CacheMode, Container, ContainerError, Token};
pub use entrypoint::{HandlerContext, RequestHandler};
pub use lifecycle::Lifecycle;
pub use tenant::TenantResolver;

/// Initializes the tracing subscriber for logging.
///
/// This should be called once at application startup.
///
/// # Arguments
///
/// * `level` - The log level (error, warn, info, debug, trace)
pub fn init_logging(level: &str) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("atrium_kernel={level},tower_http=debug")));

    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(filter)
        .init();
}
