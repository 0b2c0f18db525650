//! Realm-scoped token verification.
//!
//! A [`RealmVerifier`] checks signature, issuer, audience, and validity
//! window for tokens of one realm. Asymmetric realms verify against the
//! issuer's published key set, fetched lazily and refreshed once when a token
//! names an unknown key; symmetric realms (HS*) verify against the realm's
//! client secret. Failures are reported as tagged [`VerifyError`] kinds; the
//! caller never classifies by message text.

use atrium_core::SecretValue;
use jsonwebtoken::jwk::{Jwk, JwkSet};
use jsonwebtoken::{decode, decode_header, Algorithm, DecodingKey, Validation};
use tokio::sync::RwLock;
use tracing::debug;

use crate::tenant::ClaimsMap;

use super::error::{VerifyError, VerifyErrorKind};

/// Settings for one realm's verifier.
#[derive(Debug, Clone)]
pub struct VerifierOptions {
    /// Expected `iss` claim.
    pub issuer: String,
    /// Expected audience (the realm's client identifier).
    pub client_id: String,
    /// URL of the issuer's published key set.
    pub jwks_url: String,
    /// Accepted signature algorithms.
    pub allowed_algorithms: Vec<Algorithm>,
    /// Leeway applied to time-based claims, in seconds.
    pub clock_tolerance_secs: u64,
}

/// Verifies tokens for a single realm.
pub struct RealmVerifier {
    realm_key: String,
    options: VerifierOptions,
    client_secret: Option<SecretValue>,
    http: reqwest::Client,
    /// Cached key set; `None` until first fetched.
    keys: RwLock<Option<JwkSet>>,
}

impl std::fmt::Debug for RealmVerifier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealmVerifier")
            .field("realm_key", &self.realm_key)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

impl RealmVerifier {
    /// Creates a verifier that fetches the realm's key set on first use.
    pub fn new(
        realm_key: impl Into<String>,
        options: VerifierOptions,
        client_secret: Option<SecretValue>,
    ) -> Self {
        Self {
            realm_key: realm_key.into(),
            options,
            client_secret,
            http: reqwest::Client::new(),
            keys: RwLock::new(None),
        }
    }

    /// Creates a verifier with a pre-seeded key set that is never refreshed.
    /// For tests and air-gapped deployments.
    pub fn with_key_set(
        realm_key: impl Into<String>,
        options: VerifierOptions,
        client_secret: Option<SecretValue>,
        keys: JwkSet,
    ) -> Self {
        Self {
            realm_key: realm_key.into(),
            options,
            client_secret,
            http: reqwest::Client::new(),
            keys: RwLock::new(Some(keys)),
        }
    }

    /// Returns the realm key this verifier serves.
    pub fn realm_key(&self) -> &str {
        &self.realm_key
    }

    /// Returns the client identifier tokens must be issued to.
    pub fn client_id(&self) -> &str {
        &self.options.client_id
    }

    /// Verifies a token and returns its claims.
    ///
    /// Checks, in order: accepted algorithm, signature against the resolved
    /// key, `iss`, `aud`, and the validity window with the configured clock
    /// tolerance.
    pub async fn verify(&self, token: &str) -> Result<ClaimsMap, VerifyError> {
        let header = decode_header(token).map_err(|e| {
            VerifyError::new(VerifyErrorKind::Malformed, format!("undecodable header: {e}"))
        })?;

        if !self.options.allowed_algorithms.contains(&header.alg) {
            return Err(VerifyError::new(
                VerifyErrorKind::SignatureInvalid,
                format!("algorithm {:?} not accepted for realm {}", header.alg, self.realm_key),
            ));
        }

        let decoding_key = self.decoding_key(&header.alg, header.kid.as_deref()).await?;

        let mut validation = Validation::new(header.alg);
        validation.algorithms = self.options.allowed_algorithms.clone();
        validation.set_issuer(&[&self.options.issuer]);
        validation.set_audience(&[&self.options.client_id]);
        validation.leeway = self.options.clock_tolerance_secs;

        let data = decode::<ClaimsMap>(token, &decoding_key, &validation)
            .map_err(map_decode_error)?;
        Ok(data.claims)
    }

    /// Resolves the decoding key for a token header.
    async fn decoding_key(
        &self,
        algorithm: &Algorithm,
        kid: Option<&str>,
    ) -> Result<DecodingKey, VerifyError> {
        if matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            let secret = self.client_secret.as_ref().ok_or_else(|| {
                VerifyError::new(
                    VerifyErrorKind::KeySetUnavailable,
                    format!("realm {} has no client secret for symmetric verification", self.realm_key),
                )
            })?;
            return Ok(DecodingKey::from_secret(secret.expose().as_bytes()));
        }

        let kid = kid.ok_or_else(|| {
            VerifyError::new(VerifyErrorKind::Malformed, "token header missing kid")
        })?;
        let jwk = self.key_for(kid).await?;
        DecodingKey::from_jwk(&jwk).map_err(|e| {
            VerifyError::new(
                VerifyErrorKind::KeySetUnavailable,
                format!("published key {kid} unusable: {e}"),
            )
        })
    }

    /// Returns the published key with the given id, refreshing the cached
    /// key set once if the id is unknown (covers issuer key rotation).
    async fn key_for(&self, kid: &str) -> Result<Jwk, VerifyError> {
        if let Some(keys) = &*self.keys.read().await {
            if let Some(jwk) = keys.find(kid) {
                return Ok(jwk.clone());
            }
        }

        let fetched = self.fetch_key_set().await?;
        let jwk = fetched.find(kid).cloned();
        *self.keys.write().await = Some(fetched);

        jwk.ok_or_else(|| {
            VerifyError::new(
                VerifyErrorKind::UnknownKey,
                format!("issuer for realm {} publishes no key {kid}", self.realm_key),
            )
        })
    }

    async fn fetch_key_set(&self) -> Result<JwkSet, VerifyError> {
        debug!(realm = %self.realm_key, url = %self.options.jwks_url, "fetching key set");
        let response = self
            .http
            .get(&self.options.jwks_url)
            .send()
            .await
            .and_then(reqwest::Response::error_for_status)
            .map_err(|e| {
                VerifyError::new(
                    VerifyErrorKind::KeySetUnavailable,
                    format!("key set fetch failed: {e}"),
                )
            })?;
        response.json::<JwkSet>().await.map_err(|e| {
            VerifyError::new(
                VerifyErrorKind::KeySetUnavailable,
                format!("key set unparseable: {e}"),
            )
        })
    }
}

/// Maps a jsonwebtoken failure to a tagged kind, structurally.
fn map_decode_error(error: jsonwebtoken::errors::Error) -> VerifyError {
    use jsonwebtoken::errors::ErrorKind;

    let message = error.to_string();
    let kind = match error.kind() {
        ErrorKind::ExpiredSignature => VerifyErrorKind::Expired,
        ErrorKind::InvalidSignature => VerifyErrorKind::SignatureInvalid,
        ErrorKind::InvalidIssuer => VerifyErrorKind::IssuerMismatch,
        ErrorKind::InvalidAudience => VerifyErrorKind::AudienceMismatch,
        ErrorKind::MissingRequiredClaim(claim) if claim == "aud" => {
            VerifyErrorKind::AudienceMismatch
        }
        ErrorKind::MissingRequiredClaim(claim) if claim == "iss" => {
            VerifyErrorKind::IssuerMismatch
        }
        _ => VerifyErrorKind::Malformed,
    };
    VerifyError::new(kind, message)
}
