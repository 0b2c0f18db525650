//! Well-known container tokens.
//!
//! Tokens are process-wide constants; the kernel registers the `kernel.*`
//! set during bootstrap, and feature modules contribute the rest.

use crate::container::Token;

/// The shared [`atrium_core::PlatformConfig`] (`Arc<PlatformConfig>`).
pub const CONFIG: Token = Token::new("kernel.config");

/// The secret resolver (`Arc<dyn SecretResolver>`).
pub const SECRETS: Token = Token::new("kernel.secrets");

/// The audit writer (`Arc<dyn AuditWriter>`).
pub const AUDIT: Token = Token::new("kernel.audit");

/// The tenant resolver (`Arc<TenantResolver>`).
pub const TENANT_RESOLVER: Token = Token::new("kernel.tenant_resolver");

/// The auth pipeline (`Arc<AuthPipeline>`).
pub const AUTH_PIPELINE: Token = Token::new("kernel.auth_pipeline");

/// The request handler the HTTP entrypoint dispatches to
/// (`Arc<dyn RequestHandler>`), contributed by a feature module.
pub const REQUEST_HANDLER: Token = Token::new("http.request_handler");

/// The job queue drained by the worker runtime (`Arc<dyn JobQueue>`).
pub const JOB_QUEUE: Token = Token::new("jobs.queue");

/// The job handler invoked per dequeued job (`Arc<dyn JobHandler>`).
pub const JOB_HANDLER: Token = Token::new("jobs.handler");

/// The handler invoked on each scheduler tick (`Arc<dyn TickHandler>`).
pub const TICK_HANDLER: Token = Token::new("scheduler.tick_handler");
