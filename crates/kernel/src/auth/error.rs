//! Authentication error types.

// Error enum variant fields are self-documenting via their #[error(...)] messages
#![allow(missing_docs)]

use std::fmt;

use thiserror::Error;

/// Failure classes reported by a realm verifier.
///
/// The verifier reports a tagged kind so the pipeline never classifies
/// failures by inspecting message text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyErrorKind {
    /// The signature does not verify against the realm's keys.
    SignatureInvalid,
    /// The token is outside its validity window.
    Expired,
    /// The `iss` claim does not match the realm's issuer.
    IssuerMismatch,
    /// The `aud` claim does not include the realm's client.
    AudienceMismatch,
    /// The token names a signing key the issuer does not publish.
    UnknownKey,
    /// The issuer's key set could not be fetched.
    KeySetUnavailable,
    /// The token is structurally invalid.
    Malformed,
}

impl fmt::Display for VerifyErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VerifyErrorKind::SignatureInvalid => "signature_invalid",
            VerifyErrorKind::Expired => "expired",
            VerifyErrorKind::IssuerMismatch => "issuer_mismatch",
            VerifyErrorKind::AudienceMismatch => "audience_mismatch",
            VerifyErrorKind::UnknownKey => "unknown_key",
            VerifyErrorKind::KeySetUnavailable => "key_set_unavailable",
            VerifyErrorKind::Malformed => "malformed",
        };
        f.write_str(name)
    }
}

/// A verification failure with its tagged kind.
#[derive(Error, Debug, Clone)]
#[error("token verification failed ({kind}): {message}")]
pub struct VerifyError {
    /// The failure class.
    pub kind: VerifyErrorKind,
    /// Human-readable detail; never used for classification.
    pub message: String,
}

impl VerifyError {
    /// Creates a verify error.
    pub fn new(kind: VerifyErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

/// Errors raised by the request-level auth pipeline.
///
/// Surfaced per request as client errors (401 on the HTTP surface) and never
/// retried: a rejected token is never silently re-verified.
#[derive(Error, Debug)]
pub enum AuthError {
    /// Authentication is required and no token was presented.
    #[error("authentication required")]
    AuthRequired,

    /// The token is outside its validity window.
    #[error("token expired")]
    JwtExpired,

    /// The token signature does not verify.
    #[error("token signature invalid")]
    JwtInvalidSignature,

    /// The token's issuer does not match the realm's issuer.
    #[error("token issuer mismatch")]
    JwtIssuerMismatch,

    /// The token's audience does not include the realm's client.
    #[error("token audience mismatch")]
    JwtAudienceMismatch,

    /// The token is invalid for a reason with no more specific kind.
    #[error("token invalid: {message}")]
    JwtInvalid { message: String },

    /// The token's `typ` claim marks it as something other than an access
    /// token (e.g. a refresh or ID token).
    #[error("token type {typ:?} is not acceptable as a bearer token")]
    JwtInvalidType { typ: String },

    /// The token was issued to a different client in the same realm.
    #[error("token authorized party {azp:?} does not match client {client_id:?}")]
    JwtAzpMismatch { azp: String, client_id: String },

    /// The token is bound to a different tenant than the request resolved.
    #[error("token tenant {token_tenant:?} does not match request tenant {request_tenant:?}")]
    JwtTenantMismatch {
        token_tenant: String,
        request_tenant: String,
    },

    /// The realm's verifier could not be constructed or its key material is
    /// unavailable. An infrastructure failure, not a client error.
    #[error("verifier unavailable for realm {realm_key}: {message}")]
    VerifierUnavailable { realm_key: String, message: String },
}

impl AuthError {
    /// Returns the stable machine-readable code for this error.
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::AuthRequired => "auth_required",
            AuthError::JwtExpired => "jwt_expired",
            AuthError::JwtInvalidSignature => "jwt_invalid_signature",
            AuthError::JwtIssuerMismatch => "jwt_issuer_mismatch",
            AuthError::JwtAudienceMismatch => "jwt_audience_mismatch",
            AuthError::JwtInvalid { .. } => "jwt_invalid",
            AuthError::JwtInvalidType { .. } => "jwt_invalid_type",
            AuthError::JwtAzpMismatch { .. } => "jwt_azp_mismatch",
            AuthError::JwtTenantMismatch { .. } => "jwt_tenant_mismatch",
            AuthError::VerifierUnavailable { .. } => "auth_verifier_unavailable",
        }
    }
}

impl From<VerifyError> for AuthError {
    fn from(error: VerifyError) -> Self {
        match error.kind {
            VerifyErrorKind::SignatureInvalid => AuthError::JwtInvalidSignature,
            VerifyErrorKind::Expired => AuthError::JwtExpired,
            VerifyErrorKind::IssuerMismatch => AuthError::JwtIssuerMismatch,
            VerifyErrorKind::AudienceMismatch => AuthError::JwtAudienceMismatch,
            VerifyErrorKind::UnknownKey | VerifyErrorKind::Malformed => AuthError::JwtInvalid {
                message: error.message,
            },
            VerifyErrorKind::KeySetUnavailable => AuthError::VerifierUnavailable {
                realm_key: String::new(),
                message: error.message,
            },
        }
    }
}
