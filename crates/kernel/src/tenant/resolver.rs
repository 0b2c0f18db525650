//! Tenant resolution from headers, claims, and configuration.

use std::sync::Arc;

use atrium_core::config::PlatformConfig;
use atrium_core::error::TenantContextError;
use atrium_core::TenantContext;
use http::header::HeaderName;
use http::HeaderMap;
use tracing::debug;

use super::source::KeySource;
use super::validation::validate_and_build;

/// Header carrying the realm key.
pub static X_REALM: HeaderName = HeaderName::from_static("x-realm");
/// Header carrying the tenant key.
pub static X_TENANT: HeaderName = HeaderName::from_static("x-tenant");
/// Header carrying the org key.
pub static X_ORG: HeaderName = HeaderName::from_static("x-org");

/// Claim-key aliases accepted for each level, checked in order.
const REALM_CLAIM_ALIASES: &[&str] = &["realmKey", "realm", "realm_key"];
const TENANT_CLAIM_ALIASES: &[&str] = &["tenantKey", "tenant", "tenant_key"];
const ORG_CLAIM_ALIASES: &[&str] = &["orgKey", "org", "org_key"];

/// A verified claim map, as produced by the auth pipeline's verifier.
pub type ClaimsMap = serde_json::Map<String, serde_json::Value>;

/// Explicit realm/tenant/org overrides carried by a job payload.
#[derive(Debug, Clone, Default)]
pub struct JobTenantSelector {
    /// Realm key, falling back to the configured default when absent.
    pub realm_key: Option<String>,
    /// Tenant key, falling back to the configured default when absent.
    pub tenant_key: Option<String>,
    /// Org key, falling back to the configured default when absent.
    pub org_key: Option<String>,
}

/// Resolves tenant contexts for requests and jobs.
pub struct TenantResolver {
    config: Arc<PlatformConfig>,
}

impl TenantResolver {
    /// Creates a resolver over the given configuration.
    pub fn new(config: Arc<PlatformConfig>) -> Self {
        Self { config }
    }

    /// Resolves a tenant context for an inbound request.
    ///
    /// `claims` are claims the caller has already verified (e.g. a gateway
    /// that authenticated upstream); pass `None` when no verified claims are
    /// attached. In strict mode claims take precedence over headers and
    /// configured defaults do not apply; otherwise headers win and defaults
    /// fill the gaps.
    pub fn resolve_request(
        &self,
        headers: &HeaderMap,
        claims: Option<&ClaimsMap>,
    ) -> Result<TenantContext, TenantContextError> {
        let strict = self.config.strict_tenant_resolution();

        let realm = self.pick(
            strict,
            header_value(headers, &X_REALM),
            claim_value(claims, REALM_CLAIM_ALIASES),
            Some(self.config.iam.default_realm_key.as_str()),
        );
        let tenant = self.pick(
            strict,
            header_value(headers, &X_TENANT),
            claim_value(claims, TENANT_CLAIM_ALIASES),
            self.config.iam.default_tenant_key.as_deref(),
        );
        let org = self.pick(
            strict,
            header_value(headers, &X_ORG),
            claim_value(claims, ORG_CLAIM_ALIASES),
            self.config.iam.default_org_key.as_deref(),
        );

        if strict && tenant.is_none() {
            return Err(TenantContextError::TenantContextRequired);
        }

        let (realm, realm_source) = match realm {
            Some(resolved) => resolved,
            None => {
                // Only reachable in strict mode, where the configured default
                // realm does not apply; fails realm validation below.
                (String::new(), KeySource::Default)
            }
        };

        debug!(
            realm = %realm,
            realm_source = %realm_source,
            tenant = tenant.as_ref().map(|(key, _)| key.as_str()).unwrap_or("-"),
            org = org.as_ref().map(|(key, _)| key.as_str()).unwrap_or("-"),
            strict,
            "resolved tenant candidates"
        );

        validate_and_build(
            &self.config,
            &realm,
            tenant.as_ref().map(|(key, _)| key.as_str()),
            org.as_ref().map(|(key, _)| key.as_str()),
        )
    }

    /// Resolves a tenant context for a job payload.
    ///
    /// Keys come directly from the payload, falling back to configured
    /// defaults; the header/claim precedence logic does not apply.
    pub fn resolve_job(
        &self,
        selector: &JobTenantSelector,
    ) -> Result<TenantContext, TenantContextError> {
        let realm = selector
            .realm_key
            .clone()
            .unwrap_or_else(|| self.config.iam.default_realm_key.clone());
        let tenant = selector
            .tenant_key
            .clone()
            .or_else(|| self.config.iam.default_tenant_key.clone());
        let org = selector
            .org_key
            .clone()
            .or_else(|| self.config.iam.default_org_key.clone());

        validate_and_build(&self.config, &realm, tenant.as_deref(), org.as_deref())
    }

    /// Applies the precedence rule for one key level.
    ///
    /// Strict: claim over header, no default. Non-strict: header over claim,
    /// then the configured default. The non-strict default fallback applies
    /// even when a verified token is present but carries no claim for the
    /// level; that behavior is intentional and preserved.
    fn pick(
        &self,
        strict: bool,
        header: Option<String>,
        claim: Option<String>,
        configured: Option<&str>,
    ) -> Option<(String, KeySource)> {
        if strict {
            claim
                .map(|key| (key, KeySource::Claim))
                .or(header.map(|key| (key, KeySource::Header)))
        } else {
            header
                .map(|key| (key, KeySource::Header))
                .or(claim.map(|key| (key, KeySource::Claim)))
                .or_else(|| {
                    configured.map(|key| (key.to_string(), KeySource::Default))
                })
        }
    }
}

/// Reads a non-empty header value.
fn header_value(headers: &HeaderMap, name: &HeaderName) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Reads the first non-empty string claim among the aliases.
fn claim_value(claims: Option<&ClaimsMap>, aliases: &[&str]) -> Option<String> {
    let claims = claims?;
    aliases
        .iter()
        .filter_map(|alias| claims.get(*alias))
        .filter_map(|value| value.as_str())
        .map(str::trim)
        .find(|value| !value.is_empty())
        .map(String::from)
}

#[cfg(test)]
mod tests {
    use atrium_core::config::{Environment, PlatformConfig};
    use http::HeaderValue;

    use super::*;

    fn resolver(strict: bool) -> TenantResolver {
        let mut config = PlatformConfig::for_testing();
        if strict {
            config.env = Environment::Production;
            config.iam.require_tenant_claims_in_prod = true;
            config.server.port = 8080;
        }
        TenantResolver::new(Arc::new(config))
    }

    fn headers(pairs: &[(&'static HeaderName, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    fn claims(pairs: &[(&str, &str)]) -> ClaimsMap {
        pairs
            .iter()
            .map(|(key, value)| ((*key).to_string(), serde_json::json!(value)))
            .collect()
    }

    #[test]
    fn test_non_strict_header_overrides_claim() {
        let resolver = resolver(false);
        let headers = headers(&[(&X_TENANT, "acme")]);
        let claims = claims(&[("tenant_key", "globex")]);

        let ctx = resolver.resolve_request(&headers, Some(&claims)).unwrap();
        assert_eq!(ctx.tenant_key(), Some("acme"));
    }

    #[test]
    fn test_strict_claim_overrides_header() {
        let resolver = resolver(true);
        let headers = headers(&[(&X_REALM, "main"), (&X_TENANT, "acme")]);
        let claims = claims(&[("tenantKey", "globex"), ("realmKey", "main")]);

        let ctx = resolver.resolve_request(&headers, Some(&claims)).unwrap();
        assert_eq!(ctx.tenant_key(), Some("globex"));
    }

    #[test]
    fn test_strict_claim_only_resolution_succeeds() {
        let resolver = resolver(true);
        let claims = claims(&[("realmKey", "main"), ("tenantKey", "acme")]);

        let ctx = resolver.resolve_request(&HeaderMap::new(), Some(&claims)).unwrap();
        assert_eq!(ctx.realm_key(), "main");
        assert_eq!(ctx.tenant_key(), Some("acme"));
    }

    #[test]
    fn test_strict_without_tenant_is_rejected() {
        let resolver = resolver(true);
        let err = resolver.resolve_request(&HeaderMap::new(), None).unwrap_err();
        assert_eq!(err, TenantContextError::TenantContextRequired);
    }

    #[test]
    fn test_strict_does_not_fall_back_to_default_tenant() {
        // The testing config carries defaultTenantKey=acme; strict mode must
        // ignore it even when a verified token is present.
        let resolver = resolver(true);
        let claims = claims(&[("realmKey", "main")]);
        let err = resolver
            .resolve_request(&HeaderMap::new(), Some(&claims))
            .unwrap_err();
        assert_eq!(err, TenantContextError::TenantContextRequired);
    }

    #[test]
    fn test_non_strict_defaults_fill_missing_keys() {
        let resolver = resolver(false);
        let ctx = resolver.resolve_request(&HeaderMap::new(), None).unwrap();
        assert_eq!(ctx.realm_key(), "main");
        // defaultTenantKey from configuration.
        assert_eq!(ctx.tenant_key(), Some("acme"));
        assert_eq!(ctx.defaults()["plan"], "standard");
    }

    #[test]
    fn test_non_strict_default_applies_with_tenantless_token() {
        // A verified token without tenant claims still falls back to the
        // configured default tenant outside strict mode.
        let resolver = resolver(false);
        let claims = claims(&[("sub", "user-1")]);
        let ctx = resolver.resolve_request(&HeaderMap::new(), Some(&claims)).unwrap();
        assert_eq!(ctx.tenant_key(), Some("acme"));
    }

    #[test]
    fn test_unknown_header_tenant_is_rejected() {
        let resolver = resolver(false);
        let headers = headers(&[(&X_TENANT, "ghost")]);
        let err = resolver.resolve_request(&headers, None).unwrap_err();
        assert!(matches!(err, TenantContextError::UnknownTenant { .. }));
    }

    #[test]
    fn test_org_header_without_tenant_rejected() {
        let mut config = PlatformConfig::for_testing();
        config.iam.default_tenant_key = None;
        let resolver = TenantResolver::new(Arc::new(config));

        let headers = headers(&[(&X_ORG, "ops")]);
        let err = resolver.resolve_request(&headers, None).unwrap_err();
        assert!(matches!(err, TenantContextError::OrgWithoutTenant { .. }));
    }

    #[test]
    fn test_empty_header_values_are_ignored() {
        let resolver = resolver(false);
        let headers = headers(&[(&X_TENANT, "")]);
        let ctx = resolver.resolve_request(&headers, None).unwrap();
        assert_eq!(ctx.tenant_key(), Some("acme"));
    }

    #[test]
    fn test_job_payload_keys_win_over_defaults() {
        let resolver = resolver(false);
        let selector = JobTenantSelector {
            tenant_key: Some("globex".to_string()),
            ..Default::default()
        };
        let ctx = resolver.resolve_job(&selector).unwrap();
        assert_eq!(ctx.realm_key(), "main");
        assert_eq!(ctx.tenant_key(), Some("globex"));
    }

    #[test]
    fn test_job_payload_unknown_tenant_rejected() {
        let resolver = resolver(false);
        let selector = JobTenantSelector {
            tenant_key: Some("ghost".to_string()),
            ..Default::default()
        };
        let err = resolver.resolve_job(&selector).unwrap_err();
        assert!(matches!(err, TenantContextError::UnknownTenant { .. }));
    }
}
