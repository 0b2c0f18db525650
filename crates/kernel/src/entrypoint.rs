//! HTTP entrypoint.
//!
//! The entrypoint owns the per-request kernel flow: it creates a child scope,
//! resolves the RequestContext, TenantContext, and AuthContext in that order,
//! and hands the composed [`HandlerContext`] (plus the untouched request) to
//! the injected [`RequestHandler`]. Route tables and handler business logic
//! live outside the kernel; a deployment contributes its handler through the
//! [`crate::tokens::REQUEST_HANDLER`] token.
//!
//! Failures map to a JSON error envelope with the error's stable code:
//!
//! | Failure | HTTP status |
//! |----------------------------------------|-------------|
//! | Unknown realm / tenant / org | 404 |
//! | Org without tenant, tenant required | 400 |
//! | Auth errors (all JWT kinds, required) | 401 |
//! | Verifier unavailable | 503 |
//! | No request handler registered | 404 |
//! | Anything else | 500 |

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use atrium_core::config::PlatformConfig;
use atrium_core::error::TenantContextError;
use atrium_core::{AuthContext, RequestContext, TenantContext};
use axum::extract::{Request, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use http::header::HeaderName;
use http::HeaderMap;
use tower::ServiceBuilder;
use tower_http::cors::{Any, CorsLayer};
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::audit::{AuditEvent, AuditKind, AuditWriter};
use crate::auth::{AuthError, AuthPipeline};
use crate::container::{Container, ContainerError};
use crate::tenant::TenantResolver;
use crate::tokens;

/// Header carrying the request correlation ID.
pub static X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// The composed context handed to business-logic handlers.
pub struct HandlerContext {
    /// The request's container scope.
    pub scope: Container,
    /// Request identity.
    pub request: RequestContext,
    /// Resolved tenant identity.
    pub tenant: TenantContext,
    /// Authentication outcome.
    pub auth: AuthContext,
}

/// Business-logic request handler, contributed by a feature module.
#[async_trait]
pub trait RequestHandler: Send + Sync {
    /// Handles one request within its composed context.
    async fn handle(&self, ctx: HandlerContext, request: Request) -> Response;
}

/// Shared state for the entrypoint router.
#[derive(Clone)]
pub struct EntrypointState {
    container: Container,
    config: Arc<PlatformConfig>,
    resolver: Arc<TenantResolver>,
    pipeline: Arc<AuthPipeline>,
    audit: Arc<dyn AuditWriter>,
}

impl EntrypointState {
    /// Assembles the state by resolving the kernel defaults from the
    /// container.
    pub async fn from_container(container: &Container) -> Result<Self, ContainerError> {
        Ok(Self {
            container: container.clone(),
            config: container.resolve(tokens::CONFIG).await?,
            resolver: container.resolve(tokens::TENANT_RESOLVER).await?,
            pipeline: container.resolve(tokens::AUTH_PIPELINE).await?,
            audit: container.resolve(tokens::AUDIT).await?,
        })
    }
}

/// Builds the entrypoint router with the kernel's middleware stack.
pub fn create_app(state: EntrypointState) -> Router {
    let config = state.config.clone();

    let router = Router::new()
        .route("/healthz", get(health))
        .fallback(dispatch)
        .with_state(state);

    let service_builder = ServiceBuilder::new()
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(config.server.request_timeout_secs),
        ));

    let router = if config.server.enable_cors {
        router.layer(build_cors_layer(&config))
    } else {
        router
    };

    router.layer(service_builder)
}

/// Builds the CORS layer based on configuration.
fn build_cors_layer(config: &PlatformConfig) -> CorsLayer {
    let mut cors = CorsLayer::new().allow_methods(Any).allow_headers(Any);

    if config.server.cors_origins == "*" {
        cors = cors.allow_origin(Any);
    } else {
        let origins: Vec<_> = config
            .server
            .cors_origins
            .split(',')
            .filter_map(|origin| origin.trim().parse().ok())
            .collect();
        cors = cors.allow_origin(origins);
    }

    cors
}

/// Liveness endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

/// Fallback handler running the kernel's per-request flow.
async fn dispatch(State(state): State<EntrypointState>, request: Request) -> Response {
    match handle_request(&state, request).await {
        Ok(response) => response,
        Err(error) => error.into_response(),
    }
}

async fn handle_request(
    state: &EntrypointState,
    request: Request,
) -> Result<Response, ApiError> {
    let headers = request.headers().clone();
    let request_ctx = RequestContext::new(
        request_id_from_headers(&headers),
        request.method().to_string(),
        request.uri().path().to_string(),
    );

    let scope = state.container.create_scope();

    // The kernel verifies tokens itself below, so no pre-decoded claims are
    // attached here; gateways that verify upstream use the resolver's
    // claims-accepting path directly.
    let tenant = match state.resolver.resolve_request(&headers, None) {
        Ok(tenant) => tenant,
        Err(error) => {
            state
                .audit
                .write(
                    AuditEvent::new(
                        AuditKind::TenantRejected,
                        serde_json::json!({ "code": error.code() }),
                    )
                    .with_request_id(&request_ctx.request_id),
                )
                .await;
            return Err(ApiError::Tenant(error));
        }
    };

    let auth = state
        .pipeline
        .authenticate(
            &headers,
            &request_ctx,
            &tenant,
            state.config.iam.require_authentication,
        )
        .await
        .map_err(ApiError::Auth)?;

    let handler = match scope
        .resolve::<Arc<dyn RequestHandler>>(tokens::REQUEST_HANDLER)
        .await
    {
        Ok(handler) => handler,
        Err(ContainerError::UnknownToken { .. }) => return Err(ApiError::NoHandler),
        Err(error) => {
            return Err(ApiError::Internal {
                message: error.to_string(),
            });
        }
    };

    let ctx = HandlerContext {
        scope,
        request: request_ctx,
        tenant,
        auth,
    };
    Ok(handler.handle(ctx, request).await)
}

/// Returns the propagated request ID, generating one if the middleware did
/// not run (e.g. direct router tests).
fn request_id_from_headers(headers: &HeaderMap) -> String {
    headers
        .get(&X_REQUEST_ID)
        .and_then(|value| value.to_str().ok())
        .filter(|value| !value.is_empty())
        .map(String::from)
        .unwrap_or_else(|| Uuid::new_v4().to_string())
}

/// Kernel-level request failures, mapped to the JSON error envelope.
#[derive(Debug)]
pub enum ApiError {
    /// Tenant resolution failed.
    Tenant(TenantContextError),
    /// Authentication failed.
    Auth(AuthError),
    /// No request handler is registered.
    NoHandler,
    /// Unexpected kernel failure.
    Internal {
        /// Failure description.
        message: String,
    },
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            ApiError::Tenant(error) => {
                let status = match error {
                    TenantContextError::UnknownRealm { .. }
                    | TenantContextError::UnknownTenant { .. }
                    | TenantContextError::UnknownOrg { .. } => StatusCode::NOT_FOUND,
                    TenantContextError::OrgWithoutTenant { .. }
                    | TenantContextError::TenantContextRequired => StatusCode::BAD_REQUEST,
                };
                (status, error.code(), error.to_string())
            }
            ApiError::Auth(error) => {
                let status = match error {
                    AuthError::VerifierUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
                    _ => StatusCode::UNAUTHORIZED,
                };
                (status, error.code(), error.to_string())
            }
            ApiError::NoHandler => (
                StatusCode::NOT_FOUND,
                "no_handler",
                "no request handler registered".to_string(),
            ),
            ApiError::Internal { message } => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                message.clone(),
            ),
        };

        let body = serde_json::json!({ "code": code, "message": message });
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use http::HeaderValue;

    use super::*;

    #[test]
    fn test_request_id_prefers_header() {
        let mut headers = HeaderMap::new();
        headers.insert(&X_REQUEST_ID, HeaderValue::from_static("req-7"));
        assert_eq!(request_id_from_headers(&headers), "req-7");
    }

    #[test]
    fn test_request_id_generated_when_absent() {
        let id = request_id_from_headers(&HeaderMap::new());
        assert!(Uuid::parse_str(&id).is_ok());
    }

    #[tokio::test]
    async fn test_tenant_errors_map_to_client_statuses() {
        let not_found = ApiError::Tenant(TenantContextError::UnknownTenant {
            realm_key: "main".to_string(),
            attempted: "ghost".to_string(),
            available: vec![],
        })
        .into_response();
        assert_eq!(not_found.status(), StatusCode::NOT_FOUND);

        let required =
            ApiError::Tenant(TenantContextError::TenantContextRequired).into_response();
        assert_eq!(required.status(), StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_auth_errors_map_to_401_and_503() {
        let unauthorized = ApiError::Auth(AuthError::JwtExpired).into_response();
        assert_eq!(unauthorized.status(), StatusCode::UNAUTHORIZED);

        let unavailable = ApiError::Auth(AuthError::VerifierUnavailable {
            realm_key: "main".to_string(),
            message: "down".to_string(),
        })
        .into_response();
        assert_eq!(unavailable.status(), StatusCode::SERVICE_UNAVAILABLE);
    }
}
