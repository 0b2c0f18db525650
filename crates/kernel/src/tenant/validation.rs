//! Validation of resolved keys against the configuration tree.

use atrium_core::config::PlatformConfig;
use atrium_core::defaults::effective_defaults;
use atrium_core::error::TenantContextError;
use atrium_core::TenantContext;

/// Validates a resolved `{realm, tenant, org}` triple against configuration
/// and builds the immutable [`TenantContext`] with its cascaded defaults.
///
/// Checks run in a fixed order, each with its own failure kind: unknown
/// realm, unknown tenant under the realm, org without tenant, unknown org
/// under the tenant.
pub fn validate_and_build(
    config: &PlatformConfig,
    realm_key: &str,
    tenant_key: Option<&str>,
    org_key: Option<&str>,
) -> Result<TenantContext, TenantContextError> {
    let realm = config
        .realm(realm_key)
        .ok_or_else(|| TenantContextError::UnknownRealm {
            attempted: realm_key.to_string(),
            available: config.realm_keys(),
        })?;

    let tenant = match tenant_key {
        Some(key) => Some(realm.tenants.get(key).ok_or_else(|| {
            TenantContextError::UnknownTenant {
                realm_key: realm_key.to_string(),
                attempted: key.to_string(),
                available: realm.tenants.keys().cloned().collect(),
            }
        })?),
        None => None,
    };

    let org = match org_key {
        Some(key) => {
            let (tenant_key, tenant) = match (tenant_key, tenant) {
                (Some(tenant_key), Some(tenant)) => (tenant_key, tenant),
                _ => {
                    return Err(TenantContextError::OrgWithoutTenant {
                        org_key: key.to_string(),
                    });
                }
            };
            Some(tenant.orgs.get(key).ok_or_else(|| {
                TenantContextError::UnknownOrg {
                    realm_key: realm_key.to_string(),
                    tenant_key: tenant_key.to_string(),
                    attempted: key.to_string(),
                    available: tenant.orgs.keys().cloned().collect(),
                }
            })?)
        }
        None => None,
    };

    let defaults = effective_defaults(
        &realm.defaults,
        tenant.map(|t| &t.defaults),
        org.map(|o| &o.defaults),
    );

    Ok(TenantContext::new(
        realm_key,
        tenant_key.map(String::from),
        org_key.map(String::from),
        defaults,
    ))
}
