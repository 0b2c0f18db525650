//! Integration tests for the per-request kernel flow.
//!
//! Boots the kernel (worker mode, so no socket is bound), mounts the HTTP
//! entrypoint on an in-process test server, and drives it end to end:
//! tenant resolution, token verification, the defense-in-depth checks, and
//! handler-context composition.

mod common;

use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::Request;
use axum::response::{IntoResponse, Response};
use axum::Json;
use axum_test::TestServer;
use http::header::AUTHORIZATION;
use http::HeaderName;
use http::StatusCode;
use serde_json::json;

use atrium_kernel::audit::{AuditKind, MemoryAuditWriter};
use atrium_kernel::bootstrap::{self, BootOptions, KernelModule, RuntimeMode};
use atrium_kernel::container::{CacheMode, Container};
use atrium_kernel::entrypoint::{create_app, EntrypointState, HandlerContext, RequestHandler};
use atrium_kernel::tokens;

use common::{make_token, memory_secrets, test_config, write_config};

const X_TENANT: HeaderName = HeaderName::from_static("x-tenant");
const X_ORG: HeaderName = HeaderName::from_static("x-org");

/// Handler echoing the composed context, so assertions can see exactly what
/// the kernel resolved.
struct EchoHandler;

#[async_trait]
impl RequestHandler for EchoHandler {
    async fn handle(&self, ctx: HandlerContext, _request: Request) -> Response {
        Json(json!({
            "requestId": ctx.request.request_id,
            "realm": ctx.tenant.realm_key(),
            "tenant": ctx.tenant.tenant_key(),
            "org": ctx.tenant.org_key(),
            "plan": ctx.tenant.defaults().get("plan"),
            "oncall": ctx.tenant.defaults().get("oncall"),
            "authenticated": ctx.auth.is_authenticated(),
            "user": ctx.auth.user_id(),
            "roles": ctx.auth.roles(),
        }))
        .into_response()
    }
}

struct EchoModule;

#[async_trait]
impl KernelModule for EchoModule {
    fn name(&self) -> &'static str {
        "echo"
    }

    fn register(&self, container: &Container) -> anyhow::Result<()> {
        container.register(tokens::REQUEST_HANDLER, CacheMode::Singleton, |_| async {
            Ok(Arc::new(EchoHandler) as Arc<dyn RequestHandler>)
        })?;
        Ok(())
    }
}

/// Boots the kernel and mounts the entrypoint on a test server.
async fn boot_test_server(config: serde_json::Value) -> (TestServer, Arc<MemoryAuditWriter>) {
    let (_dir, path) = write_config(&config);
    let audit = Arc::new(MemoryAuditWriter::new());

    let kernel = bootstrap::run(
        BootOptions::new(&path, RuntimeMode::Worker)
            .with_secrets(memory_secrets())
            .with_audit(audit.clone())
            .with_module(Arc::new(EchoModule)),
    )
    .await
    .expect("bootstrap succeeds");

    let state = EntrypointState::from_container(&kernel.container)
        .await
        .expect("entrypoint state resolves");
    let server = TestServer::new(create_app(state)).expect("test server");
    (server, audit)
}

#[tokio::test]
async fn test_healthz() {
    let (server, _) = boot_test_server(test_config()).await;
    let response = server.get("/healthz").await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>()["status"], "ok");
}

#[tokio::test]
async fn test_anonymous_request_uses_default_tenant() {
    let (server, _) = boot_test_server(test_config()).await;
    let response = server.get("/orders").await;
    response.assert_status(StatusCode::OK);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["realm"], "main");
    assert_eq!(body["tenant"], "acme");
    assert_eq!(body["plan"], "standard");
    assert_eq!(body["authenticated"], false);
}

#[tokio::test]
async fn test_header_selects_tenant_and_org_defaults_cascade() {
    let (server, _) = boot_test_server(test_config()).await;
    let response = server
        .get("/orders")
        .add_header(X_TENANT, "acme")
        .add_header(X_ORG, "ops")
        .await;
    response.assert_status(StatusCode::OK);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["org"], "ops");
    assert_eq!(body["plan"], "standard");
    assert_eq!(body["oncall"], true);
}

#[tokio::test]
async fn test_unknown_tenant_is_404_with_stable_code() {
    let (server, audit) = boot_test_server(test_config()).await;
    let response = server.get("/orders").add_header(X_TENANT, "ghost").await;
    response.assert_status(StatusCode::NOT_FOUND);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["code"], "tenant_unknown_tenant");

    let events = audit.events().await;
    assert!(events
        .iter()
        .any(|event| event.kind == AuditKind::TenantRejected));
}

#[tokio::test]
async fn test_valid_token_is_authenticated_and_normalized() {
    let (server, _) = boot_test_server(test_config()).await;
    let token = make_token(json!({
        "typ": "Bearer",
        "azp": "atrium-api",
        "tenant_key": "acme",
        "realm_access": { "roles": ["viewer"] },
        "resource_access": { "atrium-api": { "roles": ["orders:read"] } },
    }));

    let response = server
        .get("/orders")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    response.assert_status(StatusCode::OK);

    let body = response.json::<serde_json::Value>();
    assert_eq!(body["authenticated"], true);
    assert_eq!(body["user"], "jdoe");
    assert_eq!(body["roles"], json!(["orders:read", "viewer"]));
}

#[tokio::test]
async fn test_refresh_token_rejected() {
    let (server, _) = boot_test_server(test_config()).await;
    let token = make_token(json!({ "typ": "Refresh" }));

    let response = server
        .get("/orders")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "jwt_invalid_type"
    );
}

#[tokio::test]
async fn test_sibling_client_token_rejected() {
    let (server, _) = boot_test_server(test_config()).await;
    let token = make_token(json!({ "azp": "atrium-admin" }));

    let response = server
        .get("/orders")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "jwt_azp_mismatch"
    );
}

#[tokio::test]
async fn test_cross_tenant_token_replay_rejected_and_audited() {
    let (server, audit) = boot_test_server(test_config()).await;
    // Request resolves tenant acme (default); token is bound to globex.
    let token = make_token(json!({ "tenant_key": "globex" }));

    let response = server
        .get("/orders")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "jwt_tenant_mismatch"
    );

    let events = audit.events().await;
    let violation = events
        .iter()
        .find(|event| event.kind == AuditKind::AuthCheckViolation)
        .expect("violation audited");
    assert_eq!(violation.details["code"], "jwt_tenant_mismatch");
    assert_eq!(violation.tenant_key.as_deref(), Some("acme"));
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let (server, _) = boot_test_server(test_config()).await;
    let token = make_token(json!({
        "exp": chrono::Utc::now().timestamp() - 3600
    }));

    let response = server
        .get("/orders")
        .add_header(AUTHORIZATION, format!("Bearer {token}"))
        .await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(response.json::<serde_json::Value>()["code"], "jwt_expired");
}

#[tokio::test]
async fn test_auth_required_rejects_missing_token() {
    let mut config = test_config();
    config["iam"]["requireAuthentication"] = json!(true);
    let (server, _) = boot_test_server(config).await;

    let response = server.get("/orders").await;
    response.assert_status(StatusCode::UNAUTHORIZED);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "auth_required"
    );
}

#[tokio::test]
async fn test_strict_mode_rejects_tenantless_request() {
    let mut config = test_config();
    config["env"] = json!("production");
    config["server"]["port"] = json!(8080);
    config["iam"]["requireTenantClaimsInProd"] = json!(true);
    let (server, _) = boot_test_server(config).await;

    let response = server.get("/orders").await;
    response.assert_status(StatusCode::BAD_REQUEST);
    assert_eq!(
        response.json::<serde_json::Value>()["code"],
        "tenant_context_required"
    );
}

#[tokio::test]
async fn test_request_id_propagated_to_handler() {
    let (server, _) = boot_test_server(test_config()).await;
    let response = server
        .get("/orders")
        .add_header(HeaderName::from_static("x-request-id"), "req-I7")
        .await;
    response.assert_status(StatusCode::OK);
    assert_eq!(response.json::<serde_json::Value>()["requestId"], "req-I7");
}
