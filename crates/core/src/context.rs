//! Per-scope context types.
//!
//! Each request, job, or scheduled run owns one [`RequestContext`], one
//! [`TenantContext`], and one [`AuthContext`], resolved in that order when the
//! scope is created. All three are immutable data carriers: once constructed
//! they are never mutated, so they can be shared freely across the handler
//! code running inside the scope.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::config::DefaultsMap;

/// Identity of a single inbound request or job execution.
#[derive(Debug, Clone, Serialize)]
pub struct RequestContext {
    /// Correlation ID, taken from the `x-request-id` header or generated.
    pub request_id: String,
    /// HTTP method, or a synthetic verb for jobs (`"JOB"`, `"TICK"`).
    pub method: String,
    /// Request path, or the job kind for jobs.
    pub path: String,
    /// When the kernel first saw the request.
    pub received_at: DateTime<Utc>,
}

impl RequestContext {
    /// Creates a request context stamped with the current time.
    pub fn new(
        request_id: impl Into<String>,
        method: impl Into<String>,
        path: impl Into<String>,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            method: method.into(),
            path: path.into(),
            received_at: Utc::now(),
        }
    }
}

/// The resolved tenant identity for one scope.
///
/// Invariants, guaranteed by the resolver that constructs this type:
/// `realm_key` is non-empty; an org key is only ever present together with a
/// tenant key; every key present exists in configuration under the resolved
/// realm.
#[derive(Debug, Clone, Serialize)]
pub struct TenantContext {
    realm_key: String,
    tenant_key: Option<String>,
    org_key: Option<String>,
    defaults: DefaultsMap,
}

impl TenantContext {
    /// Creates a tenant context from validated keys.
    pub fn new(
        realm_key: impl Into<String>,
        tenant_key: Option<String>,
        org_key: Option<String>,
        defaults: DefaultsMap,
    ) -> Self {
        let context = Self {
            realm_key: realm_key.into(),
            tenant_key,
            org_key,
            defaults,
        };
        debug_assert!(!context.realm_key.is_empty());
        debug_assert!(context.org_key.is_none() || context.tenant_key.is_some());
        context
    }

    /// Returns the realm key.
    pub fn realm_key(&self) -> &str {
        &self.realm_key
    }

    /// Returns the tenant key, if one was resolved.
    pub fn tenant_key(&self) -> Option<&str> {
        self.tenant_key.as_deref()
    }

    /// Returns the org key, if one was resolved.
    pub fn org_key(&self) -> Option<&str> {
        self.org_key.as_deref()
    }

    /// Returns the cascaded defaults for this context.
    pub fn defaults(&self) -> &DefaultsMap {
        &self.defaults
    }
}

/// The authentication outcome for one scope.
///
/// Constructed exactly once per scope, either from verified token claims or
/// as the anonymous default when no token was required. Immutable thereafter.
#[derive(Debug, Clone)]
pub struct AuthContext {
    authenticated: bool,
    realm_key: String,
    tenant_key: Option<String>,
    org_key: Option<String>,
    subject: Option<String>,
    user_id: Option<String>,
    email: Option<String>,
    name: Option<String>,
    roles: BTreeSet<String>,
    groups: BTreeSet<String>,
    claims: serde_json::Map<String, serde_json::Value>,
}

impl AuthContext {
    /// Creates the anonymous context for a scope that required no token.
    ///
    /// Carries only the tenant identity; every principal field is empty.
    pub fn anonymous(tenant: &TenantContext) -> Self {
        Self {
            authenticated: false,
            realm_key: tenant.realm_key().to_string(),
            tenant_key: tenant.tenant_key().map(String::from),
            org_key: tenant.org_key().map(String::from),
            subject: None,
            user_id: None,
            email: None,
            name: None,
            roles: BTreeSet::new(),
            groups: BTreeSet::new(),
            claims: serde_json::Map::new(),
        }
    }

    /// Creates an authenticated context from normalized claim data.
    #[allow(clippy::too_many_arguments)]
    pub fn authenticated(
        tenant: &TenantContext,
        subject: Option<String>,
        user_id: Option<String>,
        email: Option<String>,
        name: Option<String>,
        roles: BTreeSet<String>,
        groups: BTreeSet<String>,
        claims: serde_json::Map<String, serde_json::Value>,
    ) -> Self {
        Self {
            authenticated: true,
            realm_key: tenant.realm_key().to_string(),
            tenant_key: tenant.tenant_key().map(String::from),
            org_key: tenant.org_key().map(String::from),
            subject,
            user_id,
            email,
            name,
            roles,
            groups,
            claims,
        }
    }

    /// Returns `true` when this scope carries a verified principal.
    pub fn is_authenticated(&self) -> bool {
        self.authenticated
    }

    /// Returns the realm key copied from the tenant context.
    pub fn realm_key(&self) -> &str {
        &self.realm_key
    }

    /// Returns the tenant key copied from the tenant context.
    pub fn tenant_key(&self) -> Option<&str> {
        self.tenant_key.as_deref()
    }

    /// Returns the org key copied from the tenant context.
    pub fn org_key(&self) -> Option<&str> {
        self.org_key.as_deref()
    }

    /// Returns the token subject.
    pub fn subject(&self) -> Option<&str> {
        self.subject.as_deref()
    }

    /// Returns the normalized user ID (preferred username, else subject).
    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    /// Returns the email claim, if present.
    pub fn email(&self) -> Option<&str> {
        self.email.as_deref()
    }

    /// Returns the display-name claim, if present.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Returns the union of realm-level and per-client roles.
    pub fn roles(&self) -> &BTreeSet<String> {
        &self.roles
    }

    /// Returns the group memberships.
    pub fn groups(&self) -> &BTreeSet<String> {
        &self.groups
    }

    /// Returns the raw verified claim map.
    pub fn claims(&self) -> &serde_json::Map<String, serde_json::Value> {
        &self.claims
    }

    /// Returns `true` when the principal carries the given role.
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.contains(role)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn tenant() -> TenantContext {
        TenantContext::new(
            "main",
            Some("acme".to_string()),
            None,
            serde_json::Map::new(),
        )
    }

    #[test]
    fn test_request_context_stamps_time() {
        let ctx = RequestContext::new("req-1", "GET", "/orders");
        assert_eq!(ctx.request_id, "req-1");
        assert!(ctx.received_at <= Utc::now());
    }

    #[test]
    fn test_tenant_context_accessors() {
        let ctx = tenant();
        assert_eq!(ctx.realm_key(), "main");
        assert_eq!(ctx.tenant_key(), Some("acme"));
        assert_eq!(ctx.org_key(), None);
    }

    #[test]
    fn test_anonymous_copies_tenant_identity() {
        let auth = AuthContext::anonymous(&tenant());
        assert!(!auth.is_authenticated());
        assert_eq!(auth.realm_key(), "main");
        assert_eq!(auth.tenant_key(), Some("acme"));
        assert!(auth.subject().is_none());
        assert!(auth.roles().is_empty());
    }

    #[test]
    fn test_authenticated_context_roles() {
        let roles: BTreeSet<String> = ["admin", "viewer"]
            .into_iter()
            .map(String::from)
            .collect();
        let auth = AuthContext::authenticated(
            &tenant(),
            Some("sub-1".to_string()),
            Some("jdoe".to_string()),
            None,
            None,
            roles,
            BTreeSet::new(),
            serde_json::Map::new(),
        );
        assert!(auth.is_authenticated());
        assert!(auth.has_role("admin"));
        assert!(!auth.has_role("owner"));
        assert_eq!(auth.user_id(), Some("jdoe"));
    }
}
