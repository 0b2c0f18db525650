//! Tenant context resolution.
//!
//! Derives the `{realm, tenant, org}` triple and its cascaded defaults from
//! request headers, verified token claims, and configuration.
//!
//! # Sources and precedence
//!
//! Candidates come from the `x-realm` / `x-tenant` / `x-org` headers and from
//! claim aliases (`realmKey`/`realm`/`realm_key` and friends). Precedence
//! depends on strictness:
//!
//! - **Strict** (production with `requireTenantClaimsInProd`): verified token
//!   claims are authoritative over client-supplied headers, configured
//!   defaults do not apply, and a request that resolves no tenant is
//!   rejected with `TenantContextRequired`.
//! - **Non-strict**: headers override claims, and configured defaults fill
//!   whatever remains unset.
//!
//! Job payloads carry their keys explicitly and skip the header/claim logic
//! entirely; validation and the defaults cascade are shared between both
//! paths.
//!
//! Every resolved triple is validated against the configuration tree; the
//! distinct failure kinds carry the attempted key and the list of valid keys
//! for operator diagnosis.

mod resolver;
mod source;
mod validation;

pub use resolver::{ClaimsMap, JobTenantSelector, TenantResolver, X_ORG, X_REALM, X_TENANT};
pub use source::KeySource;
pub use validation::validate_and_build;
