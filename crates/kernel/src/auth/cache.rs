//! Per-realm verifier cache.

use std::collections::HashMap;
use std::str::FromStr;
use std::sync::{Arc, RwLock};

use atrium_core::config::{PlatformConfig, RealmConfig};
use atrium_core::secrets::SecretResolver;
use jsonwebtoken::Algorithm;
use tokio::sync::OnceCell;
use tracing::info;

use super::error::AuthError;
use super::verifier::{RealmVerifier, VerifierOptions};

type VerifierSlot = Arc<OnceCell<Arc<RealmVerifier>>>;

/// Lazily constructs and shares one verifier per realm.
///
/// The cache stores the in-flight construction, not just the eventual result:
/// concurrent first uses of one realm all await the same construction and the
/// secret resolution and key-set wiring run at most once per realm. The map
/// is write-once-per-realm; entries are never evicted.
pub struct VerifierCache {
    config: Arc<PlatformConfig>,
    secrets: Arc<dyn SecretResolver>,
    slots: RwLock<HashMap<String, VerifierSlot>>,
}

impl VerifierCache {
    /// Creates an empty cache over the given configuration.
    pub fn new(config: Arc<PlatformConfig>, secrets: Arc<dyn SecretResolver>) -> Self {
        Self {
            config,
            secrets,
            slots: RwLock::new(HashMap::new()),
        }
    }

    /// Returns the shared verifier for a realm, constructing it on first use.
    pub async fn get(&self, realm_key: &str) -> Result<Arc<RealmVerifier>, AuthError> {
        let realm = self
            .config
            .realm(realm_key)
            .ok_or_else(|| AuthError::VerifierUnavailable {
                realm_key: realm_key.to_string(),
                message: "realm not present in configuration".to_string(),
            })?;

        let slot = self.slot(realm_key);
        let verifier = slot
            .get_or_try_init(|| self.build(realm_key, realm))
            .await?;
        Ok(verifier.clone())
    }

    /// Seeds a realm with a pre-built verifier. For tests and air-gapped
    /// deployments; seeding an already-constructed realm has no effect.
    pub fn seed(&self, realm_key: &str, verifier: Arc<RealmVerifier>) {
        let slot = self.slot(realm_key);
        let _ = slot.set(verifier);
    }

    fn slot(&self, realm_key: &str) -> VerifierSlot {
        if let Some(slot) = self
            .slots
            .read()
            .expect("verifier cache lock poisoned")
            .get(realm_key)
        {
            return slot.clone();
        }
        self.slots
            .write()
            .expect("verifier cache lock poisoned")
            .entry(realm_key.to_string())
            .or_insert_with(|| Arc::new(OnceCell::new()))
            .clone()
    }

    async fn build(
        &self,
        realm_key: &str,
        realm: &RealmConfig,
    ) -> Result<Arc<RealmVerifier>, AuthError> {
        let client_secret = match &realm.iam.client_secret_ref {
            Some(reference) => {
                let secret = self
                    .secrets
                    .resolve(reference)
                    .await
                    .map_err(|e| AuthError::VerifierUnavailable {
                        realm_key: realm_key.to_string(),
                        message: e.to_string(),
                    })?
                    .ok_or_else(|| AuthError::VerifierUnavailable {
                        realm_key: realm_key.to_string(),
                        message: format!("secret reference {reference:?} resolved to nothing"),
                    })?;
                Some(secret)
            }
            None => None,
        };

        let allowed_algorithms = realm
            .iam
            .allowed_algorithms
            .iter()
            .map(|name| Algorithm::from_str(name))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| AuthError::VerifierUnavailable {
                realm_key: realm_key.to_string(),
                message: format!("unparseable algorithm in configuration: {e}"),
            })?;

        let jwks_url = realm.iam.jwks_url.clone().unwrap_or_else(|| {
            format!(
                "{}/.well-known/jwks.json",
                realm.iam.issuer_url.trim_end_matches('/')
            )
        });

        let options = VerifierOptions {
            issuer: realm.iam.issuer_url.clone(),
            client_id: realm.iam.client_id.clone(),
            jwks_url,
            allowed_algorithms,
            clock_tolerance_secs: realm.iam.clock_tolerance_secs,
        };

        info!(realm = %realm_key, issuer = %options.issuer, "constructed realm verifier");
        Ok(Arc::new(RealmVerifier::new(
            realm_key,
            options,
            client_secret,
        )))
    }
}
