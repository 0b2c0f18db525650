//! Normalization of verified claims into an [`AuthContext`].

use std::collections::BTreeSet;

use atrium_core::{AuthContext, TenantContext};
use serde_json::Value;

use crate::tenant::ClaimsMap;

/// Builds the immutable [`AuthContext`] from verified claims.
///
/// - `user_id` is the `preferred_username` claim, falling back to `sub`.
/// - Roles are the union of realm-level roles (`realm_access.roles`) and the
///   resource roles of every client present in `resource_access`.
/// - Groups come from the `groups` claim, keeping string entries only;
///   malformed entries are dropped silently.
pub fn normalize_claims(tenant: &TenantContext, claims: ClaimsMap) -> AuthContext {
    let string_claim =
        |name: &str| claims.get(name).and_then(Value::as_str).map(String::from);

    let subject = string_claim("sub");
    let user_id = string_claim("preferred_username").or_else(|| subject.clone());
    let email = string_claim("email");
    let name = string_claim("name");

    let mut roles: BTreeSet<String> = BTreeSet::new();
    collect_roles(claims.get("realm_access"), &mut roles);
    if let Some(Value::Object(clients)) = claims.get("resource_access") {
        for client_access in clients.values() {
            collect_roles(Some(client_access), &mut roles);
        }
    }

    let groups: BTreeSet<String> = claims
        .get("groups")
        .and_then(Value::as_array)
        .map(|entries| {
            entries
                .iter()
                .filter_map(Value::as_str)
                .map(String::from)
                .collect()
        })
        .unwrap_or_default();

    AuthContext::authenticated(tenant, subject, user_id, email, name, roles, groups, claims)
}

/// Appends the string entries of an access object's `roles` array.
fn collect_roles(access: Option<&Value>, roles: &mut BTreeSet<String>) {
    if let Some(entries) = access
        .and_then(|value| value.get("roles"))
        .and_then(Value::as_array)
    {
        roles.extend(entries.iter().filter_map(Value::as_str).map(String::from));
    }
}
