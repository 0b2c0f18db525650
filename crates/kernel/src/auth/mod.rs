//! Defense-in-depth JWT authentication.
//!
//! The pipeline runs once per scope that needs authentication:
//!
//! 1. **Bearer extraction** from the `Authorization` header
//!    (case-insensitive scheme). A missing token either fails with
//!    `AuthRequired` or yields the anonymous [`atrium_core::AuthContext`],
//!    depending on whether the endpoint requires auth.
//! 2. **Cryptographic verification** against the realm's verifier: signature
//!    over the issuer's published key set (or the realm's client secret for
//!    symmetric realms), issuer, audience, and expiry with the configured
//!    clock tolerance. Verifiers are constructed lazily, at most once per
//!    realm, with the in-flight construction shared under concurrency.
//! 3. **Defense-in-depth checks**, each an independent predicate that can
//!    reject an otherwise valid token, run in fixed order: token type
//!    (`typ`), authorized party (`azp`), tenant binding (`tenant_key`).
//!    All three always run so the audit trail reflects every violation; the
//!    first in check order is returned.
//! 4. **Claim normalization** into the immutable `AuthContext`: user ID from
//!    `preferred_username` falling back to `sub`, realm-level roles unioned
//!    with every client's resource roles, groups filtered to strings.
//!
//! No claim is trusted before step 2 succeeds, and a rejected token is never
//! re-verified.

mod cache;
mod checks;
mod claims;
mod error;
mod pipeline;
mod verifier;

pub use cache::VerifierCache;
pub use checks::{
    check_authorized_party, check_tenant_binding, check_token_type, run_defense_checks,
};
pub use claims::normalize_claims;
pub use error::{AuthError, VerifyError, VerifyErrorKind};
pub use pipeline::{extract_bearer, AuthPipeline};
pub use verifier::{RealmVerifier, VerifierOptions};
