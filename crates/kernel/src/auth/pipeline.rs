//! The request-level authentication pipeline.

use std::sync::Arc;

use atrium_core::config::PlatformConfig;
use atrium_core::secrets::SecretResolver;
use atrium_core::{AuthContext, RequestContext, TenantContext};
use http::header::AUTHORIZATION;
use http::HeaderMap;
use tracing::debug;

use crate::audit::{AuditEvent, AuditKind, AuditWriter};

use super::cache::VerifierCache;
use super::checks::run_defense_checks;
use super::claims::normalize_claims;
use super::error::AuthError;

/// Per-request authentication over the per-realm verifier cache.
pub struct AuthPipeline {
    verifiers: VerifierCache,
    audit: Arc<dyn AuditWriter>,
}

impl AuthPipeline {
    /// Creates a pipeline over the given configuration, secret resolver, and
    /// audit writer.
    pub fn new(
        config: Arc<PlatformConfig>,
        secrets: Arc<dyn SecretResolver>,
        audit: Arc<dyn AuditWriter>,
    ) -> Self {
        Self {
            verifiers: VerifierCache::new(config, secrets),
            audit,
        }
    }

    /// Returns the verifier cache, for boot-time seeding.
    pub fn verifiers(&self) -> &VerifierCache {
        &self.verifiers
    }

    /// Authenticates one request within its resolved tenant context.
    ///
    /// Without a bearer token this fails with [`AuthError::AuthRequired`]
    /// when `auth_required`, and otherwise returns the anonymous context
    /// carrying only the tenant identity. With a token, verification and the
    /// defense-in-depth checks run as described on [`crate::auth`].
    pub async fn authenticate(
        &self,
        headers: &HeaderMap,
        request: &RequestContext,
        tenant: &TenantContext,
        auth_required: bool,
    ) -> Result<AuthContext, AuthError> {
        let Some(token) = extract_bearer(headers) else {
            if auth_required {
                self.audit_rejection(request, tenant, &AuthError::AuthRequired)
                    .await;
                return Err(AuthError::AuthRequired);
            }
            debug!(request_id = %request.request_id, "no token presented, continuing anonymously");
            return Ok(AuthContext::anonymous(tenant));
        };

        let verifier = match self.verifiers.get(tenant.realm_key()).await {
            Ok(verifier) => verifier,
            Err(error) => {
                self.audit_rejection(request, tenant, &error).await;
                return Err(error);
            }
        };

        let claims = match verifier.verify(&token).await {
            Ok(claims) => claims,
            Err(error) => {
                let error = match AuthError::from(error) {
                    AuthError::VerifierUnavailable { message, .. } => {
                        AuthError::VerifierUnavailable {
                            realm_key: tenant.realm_key().to_string(),
                            message,
                        }
                    }
                    other => other,
                };
                self.audit_rejection(request, tenant, &error).await;
                return Err(error);
            }
        };

        // Cryptographic verification passed; every defense check still runs
        // so the audit trail records all violations, and the first one (in
        // the fixed check order) is surfaced.
        let violations = run_defense_checks(&claims, verifier.client_id(), tenant.tenant_key());
        for violation in &violations {
            self.audit
                .write(
                    AuditEvent::new(
                        AuditKind::AuthCheckViolation,
                        serde_json::json!({ "code": violation.code() }),
                    )
                    .with_request_id(&request.request_id)
                    .with_tenant(tenant.realm_key(), tenant.tenant_key()),
                )
                .await;
        }
        if let Some(first) = violations.into_iter().next() {
            return Err(first);
        }

        Ok(normalize_claims(tenant, claims))
    }

    async fn audit_rejection(
        &self,
        request: &RequestContext,
        tenant: &TenantContext,
        error: &AuthError,
    ) {
        self.audit
            .write(
                AuditEvent::new(
                    AuditKind::AuthRejected,
                    serde_json::json!({ "code": error.code() }),
                )
                .with_request_id(&request.request_id)
                .with_tenant(tenant.realm_key(), tenant.tenant_key()),
            )
            .await;
    }
}

/// Extracts a bearer token from the `Authorization` header.
///
/// The scheme comparison is case-insensitive; a missing header, a different
/// scheme, or an empty token all yield `None`.
pub fn extract_bearer(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    if !scheme.eq_ignore_ascii_case("bearer") {
        return None;
    }
    let token = token.trim();
    if token.is_empty() {
        None
    } else {
        Some(token.to_string())
    }
}

#[cfg(test)]
mod tests {
    use atrium_core::config::PlatformConfig;
    use atrium_core::secrets::MemorySecretResolver;
    use http::HeaderValue;
    use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};

    use crate::audit::MemoryAuditWriter;

    use super::*;

    const SECRET: &str = "pipeline-unit-test-secret";

    fn pipeline() -> (AuthPipeline, Arc<MemoryAuditWriter>) {
        let mut config = PlatformConfig::for_testing();
        config
            .iam
            .realms
            .get_mut("main")
            .unwrap()
            .iam
            .client_secret_ref = Some("kv:main-client".to_string());

        let secrets = MemorySecretResolver::new();
        secrets.insert("kv:main-client", SECRET);

        let audit = Arc::new(MemoryAuditWriter::new());
        let pipeline = AuthPipeline::new(
            Arc::new(config),
            Arc::new(secrets),
            audit.clone() as Arc<dyn AuditWriter>,
        );
        (pipeline, audit)
    }

    fn tenant() -> TenantContext {
        TenantContext::new(
            "main",
            Some("acme".to_string()),
            None,
            serde_json::Map::new(),
        )
    }

    fn request() -> RequestContext {
        RequestContext::new("req-1", "GET", "/orders")
    }

    fn bearer_headers(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        headers
    }

    fn token(extra: serde_json::Value) -> String {
        let mut claims = serde_json::json!({
            "iss": "https://id.example.com/realms/main",
            "aud": "atrium-api",
            "sub": "user-1",
            "preferred_username": "jdoe",
            "exp": chrono::Utc::now().timestamp() + 600,
        });
        if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
            for (key, value) in extra {
                base.insert(key.clone(), value.clone());
            }
        }
        encode(
            &Header::new(Algorithm::HS256),
            &claims,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap()
    }

    #[test]
    fn test_extract_bearer_is_case_insensitive() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("bEaReR abc.def.ghi"));
        assert_eq!(extract_bearer(&headers), Some("abc.def.ghi".to_string()));
    }

    #[test]
    fn test_extract_bearer_rejects_other_schemes() {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic dXNlcjpwdw=="));
        assert_eq!(extract_bearer(&headers), None);
        assert_eq!(extract_bearer(&HeaderMap::new()), None);
    }

    #[tokio::test]
    async fn test_missing_token_with_auth_required() {
        let (pipeline, audit) = pipeline();
        let err = pipeline
            .authenticate(&HeaderMap::new(), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::AuthRequired));
        assert_eq!(audit.events().await.len(), 1);
    }

    #[tokio::test]
    async fn test_missing_token_yields_anonymous_context() {
        let (pipeline, _) = pipeline();
        let auth = pipeline
            .authenticate(&HeaderMap::new(), &request(), &tenant(), false)
            .await
            .unwrap();
        assert!(!auth.is_authenticated());
        assert_eq!(auth.tenant_key(), Some("acme"));
    }

    #[tokio::test]
    async fn test_valid_token_is_normalized() {
        let (pipeline, _) = pipeline();
        let token = token(serde_json::json!({
            "typ": "Bearer",
            "azp": "atrium-api",
            "tenant_key": "acme",
            "realm_access": { "roles": ["viewer"] },
        }));

        let auth = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap();
        assert!(auth.is_authenticated());
        assert_eq!(auth.user_id(), Some("jdoe"));
        assert!(auth.has_role("viewer"));
    }

    #[tokio::test]
    async fn test_refresh_token_rejected_despite_valid_signature() {
        let (pipeline, _) = pipeline();
        let token = token(serde_json::json!({ "typ": "Refresh" }));

        let err = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JwtInvalidType { .. }));
    }

    #[tokio::test]
    async fn test_sibling_client_token_rejected() {
        let (pipeline, _) = pipeline();
        let token = token(serde_json::json!({ "azp": "atrium-admin" }));

        let err = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JwtAzpMismatch { .. }));
    }

    #[tokio::test]
    async fn test_cross_tenant_replay_rejected_and_audited() {
        let (pipeline, audit) = pipeline();
        let token = token(serde_json::json!({ "tenant_key": "globex" }));

        let err = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JwtTenantMismatch { .. }));

        let events = audit.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::AuthCheckViolation);
        assert_eq!(events[0].details["code"], "jwt_tenant_mismatch");
    }

    #[tokio::test]
    async fn test_all_violations_audited_first_returned() {
        let (pipeline, audit) = pipeline();
        let token = token(serde_json::json!({
            "typ": "Refresh",
            "azp": "atrium-admin",
            "tenant_key": "globex",
        }));

        let err = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JwtInvalidType { .. }));

        let events = audit.events().await;
        assert_eq!(events.len(), 3);
    }

    #[tokio::test]
    async fn test_expired_token_rejected_and_audited() {
        let (pipeline, audit) = pipeline();
        let expired = serde_json::json!({
            "iss": "https://id.example.com/realms/main",
            "aud": "atrium-api",
            "sub": "user-1",
            "exp": chrono::Utc::now().timestamp() - 3600,
        });
        let token = encode(
            &Header::new(Algorithm::HS256),
            &expired,
            &EncodingKey::from_secret(SECRET.as_bytes()),
        )
        .unwrap();

        let err = pipeline
            .authenticate(&bearer_headers(&token), &request(), &tenant(), true)
            .await
            .unwrap_err();
        assert!(matches!(err, AuthError::JwtExpired));

        let events = audit.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].details["code"], "jwt_expired");
    }
}
