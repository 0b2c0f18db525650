//! Defense-in-depth claim checks.
//!
//! Each check is a standalone predicate over already-verified claims, capable
//! of rejecting a token that passed cryptographic verification. The check
//! order is fixed (type, authorized party, tenant binding) and all checks run
//! even when an earlier one has already failed, so the audit trail records
//! every violation while the returned error is deterministic.

use tracing::warn;

use crate::tenant::ClaimsMap;

use super::error::AuthError;

/// Rejects tokens whose `typ` claim marks them as something other than an
/// access token (refresh or ID tokens presented as bearer tokens).
///
/// A token without a `typ` claim passes.
pub fn check_token_type(claims: &ClaimsMap) -> Result<(), AuthError> {
    match claims.get("typ").and_then(|value| value.as_str()) {
        Some(typ) if typ != "Bearer" => Err(AuthError::JwtInvalidType {
            typ: typ.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Rejects tokens issued to a sibling client in the same identity realm.
///
/// A token without an `azp` claim passes.
pub fn check_authorized_party(claims: &ClaimsMap, client_id: &str) -> Result<(), AuthError> {
    match claims.get("azp").and_then(|value| value.as_str()) {
        Some(azp) if azp != client_id => Err(AuthError::JwtAzpMismatch {
            azp: azp.to_string(),
            client_id: client_id.to_string(),
        }),
        _ => Ok(()),
    }
}

/// Rejects tokens replayed across tenants: a `tenant_key` claim, when present
/// alongside a resolved request tenant, must match it.
///
/// Passes when either side is absent.
pub fn check_tenant_binding(
    claims: &ClaimsMap,
    request_tenant: Option<&str>,
) -> Result<(), AuthError> {
    let token_tenant = claims.get("tenant_key").and_then(|value| value.as_str());
    match (token_tenant, request_tenant) {
        (Some(token_tenant), Some(request_tenant)) if token_tenant != request_tenant => {
            Err(AuthError::JwtTenantMismatch {
                token_tenant: token_tenant.to_string(),
                request_tenant: request_tenant.to_string(),
            })
        }
        _ => Ok(()),
    }
}

/// Runs every defense check in the fixed order and returns all violations.
///
/// The caller audits each violation and surfaces the first.
pub fn run_defense_checks(
    claims: &ClaimsMap,
    client_id: &str,
    request_tenant: Option<&str>,
) -> Vec<AuthError> {
    let outcomes = [
        check_token_type(claims),
        check_authorized_party(claims, client_id),
        check_tenant_binding(claims, request_tenant),
    ];

    let violations: Vec<AuthError> = outcomes
        .into_iter()
        .filter_map(Result::err)
        .collect();
    for violation in &violations {
        warn!(code = violation.code(), "defense-in-depth check rejected token");
    }
    violations
}
