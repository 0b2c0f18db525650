//! Platform configuration model.
//!
//! The platform is configured from a single JSON document describing the
//! deployment environment, the server endpoint, and the IAM tree of realms,
//! tenants, and orgs. The document is loaded once at boot, validated, and
//! shared read-only for the lifetime of the process.
//!
//! # Document shape
//!
//! ```json
//! {
//!   "env": "production",
//!   "server": { "host": "0.0.0.0", "port": 8080 },
//!   "iam": {
//!     "requireTenantClaimsInProd": true,
//!     "defaultRealmKey": "main",
//!     "defaultTenantKey": "acme",
//!     "realms": {
//!       "main": {
//!         "iam": {
//!           "issuerUrl": "https://id.example.com/realms/main",
//!           "clientId": "atrium-api",
//!           "clientSecretRef": "env:ATRIUM_MAIN_CLIENT_SECRET"
//!         },
//!         "defaults": { "locale": "en" },
//!         "tenants": {
//!           "acme": {
//!             "defaults": { "plan": "standard" },
//!             "orgs": { "ops": { "defaults": {} } }
//!           }
//!         }
//!       }
//!     }
//!   }
//! }
//! ```
//!
//! Secret material is never inlined: `clientSecretRef` is an opaque reference
//! resolved through the secret resolver at boot.

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::ConfigError;

/// Free-form defaults attached to a realm, tenant, or org node.
pub type DefaultsMap = serde_json::Map<String, serde_json::Value>;

/// Deployment environment.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    /// Local development.
    #[default]
    Development,
    /// Pre-production staging.
    Staging,
    /// Production.
    Production,
}

impl Environment {
    /// Returns `true` for the production environment.
    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }
}

/// Server endpoint configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerConfig {
    /// Host address to bind to.
    pub host: String,
    /// Port to listen on.
    pub port: u16,
    /// Request timeout in seconds.
    pub request_timeout_secs: u64,
    /// Upper bound on the ordered shutdown run, in seconds.
    pub shutdown_timeout_secs: u64,
    /// Enable CORS.
    pub enable_cors: bool,
    /// Allowed CORS origins (comma-separated, or * for all).
    pub cors_origins: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            request_timeout_secs: 30,
            shutdown_timeout_secs: 15,
            enable_cors: true,
            cors_origins: "*".to_string(),
        }
    }
}

/// Scheduler tick configuration, used by the scheduler runtime mode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct SchedulerConfig {
    /// Seconds between scheduler ticks.
    pub tick_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { tick_secs: 60 }
    }
}

/// Identity configuration for a single realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmIamConfig {
    /// OIDC issuer URL for this realm.
    pub issuer_url: String,
    /// Client identifier tokens must be issued to.
    pub client_id: String,
    /// Secret reference for the client secret, resolved at boot.
    #[serde(default)]
    pub client_secret_ref: Option<String>,
    /// Override for the published key-set URL. Defaults to
    /// `<issuerUrl>/.well-known/jwks.json`.
    #[serde(default)]
    pub jwks_url: Option<String>,
    /// Signature algorithms accepted from this realm's issuer.
    #[serde(default = "default_allowed_algorithms")]
    pub allowed_algorithms: Vec<String>,
    /// Clock tolerance applied to time-based claims, in seconds.
    #[serde(default = "default_clock_tolerance_secs")]
    pub clock_tolerance_secs: u64,
}

fn default_allowed_algorithms() -> Vec<String> {
    vec!["RS256".to_string()]
}

fn default_clock_tolerance_secs() -> u64 {
    30
}

/// Configuration for one org under a tenant.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgConfig {
    /// Free-form defaults contributed at the org level.
    #[serde(default)]
    pub defaults: DefaultsMap,
}

/// Configuration for one tenant under a realm.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TenantConfig {
    /// Free-form defaults contributed at the tenant level.
    #[serde(default)]
    pub defaults: DefaultsMap,
    /// Orgs under this tenant, keyed by org key.
    #[serde(default)]
    pub orgs: BTreeMap<String, OrgConfig>,
}

/// Configuration for one realm.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RealmConfig {
    /// Identity-provider settings for this realm.
    pub iam: RealmIamConfig,
    /// Free-form defaults contributed at the realm level.
    #[serde(default)]
    pub defaults: DefaultsMap,
    /// Tenants under this realm, keyed by tenant key.
    #[serde(default)]
    pub tenants: BTreeMap<String, TenantConfig>,
}

/// The IAM section: realm tree plus resolution policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IamConfig {
    /// Require tenant claims in production (enables strict resolution).
    #[serde(default)]
    pub require_tenant_claims_in_prod: bool,
    /// Reject unauthenticated requests at the entrypoint.
    #[serde(default)]
    pub require_authentication: bool,
    /// Realm used when no realm is supplied (non-strict resolution only).
    pub default_realm_key: String,
    /// Tenant used when no tenant is supplied (non-strict resolution only).
    #[serde(default)]
    pub default_tenant_key: Option<String>,
    /// Org used when no org is supplied (non-strict resolution only).
    #[serde(default)]
    pub default_org_key: Option<String>,
    /// The realm tree, keyed by realm key.
    #[serde(default)]
    pub realms: BTreeMap<String, RealmConfig>,
}

/// The validated platform configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlatformConfig {
    /// Deployment environment.
    #[serde(default)]
    pub env: Environment,
    /// Server endpoint settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Scheduler settings.
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    /// IAM realm tree and resolution policy.
    pub iam: IamConfig,
}

impl PlatformConfig {
    /// Loads and validates a configuration document from a JSON file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::FileRead {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let config: Self =
            serde_json::from_str(&raw).map_err(|e| ConfigError::FileParse {
                path: path.display().to_string(),
                message: e.to_string(),
            })?;
        config.validate()?;
        Ok(config)
    }

    /// Validates semantic constraints the serde model cannot express.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.server.port == 0 && !matches!(self.env, Environment::Development) {
            return Err(ConfigError::Schema {
                message: "server.port must be non-zero outside development".to_string(),
            });
        }

        let default_realm = self
            .iam
            .realms
            .get(&self.iam.default_realm_key)
            .ok_or_else(|| ConfigError::MissingDefaultRealm {
                realm_key: self.iam.default_realm_key.clone(),
            })?;

        if let Some(tenant_key) = &self.iam.default_tenant_key {
            if !default_realm.tenants.contains_key(tenant_key) {
                return Err(ConfigError::Schema {
                    message: format!(
                        "iam.defaultTenantKey {tenant_key:?} not present under realm {:?}",
                        self.iam.default_realm_key
                    ),
                });
            }
        }

        if self.iam.default_org_key.is_some() && self.iam.default_tenant_key.is_none() {
            return Err(ConfigError::Schema {
                message: "iam.defaultOrgKey requires iam.defaultTenantKey".to_string(),
            });
        }

        for (realm_key, realm) in &self.iam.realms {
            let url = Url::parse(&realm.iam.issuer_url).map_err(|e| ConfigError::Schema {
                message: format!("realm {realm_key:?} issuerUrl invalid: {e}"),
            })?;
            if !matches!(url.scheme(), "http" | "https") {
                return Err(ConfigError::Schema {
                    message: format!("realm {realm_key:?} issuerUrl must be http(s)"),
                });
            }
            if realm.iam.client_id.trim().is_empty() {
                return Err(ConfigError::Schema {
                    message: format!("realm {realm_key:?} clientId must not be empty"),
                });
            }
            if realm.iam.allowed_algorithms.is_empty() {
                return Err(ConfigError::Schema {
                    message: format!("realm {realm_key:?} allowedAlgorithms must not be empty"),
                });
            }
        }

        Ok(())
    }

    /// Returns the realm configuration for the given key.
    pub fn realm(&self, realm_key: &str) -> Option<&RealmConfig> {
        self.iam.realms.get(realm_key)
    }

    /// Returns the known realm keys, in order.
    pub fn realm_keys(&self) -> Vec<String> {
        self.iam.realms.keys().cloned().collect()
    }

    /// Returns `true` when tenant resolution must treat token claims as
    /// authoritative and reject requests without a tenant.
    pub fn strict_tenant_resolution(&self) -> bool {
        self.env.is_production() && self.iam.require_tenant_claims_in_prod
    }

    /// Returns the socket address to bind to.
    pub fn socket_addr(&self) -> String {
        format!("{}:{}", self.server.host, self.server.port)
    }

    /// Creates a configuration suitable for tests: one realm with one tenant
    /// and one org, ephemeral port, development environment.
    pub fn for_testing() -> Self {
        let config_json = serde_json::json!({
            "env": "development",
            "server": { "host": "127.0.0.1", "port": 0, "shutdownTimeoutSecs": 2 },
            "iam": {
                "defaultRealmKey": "main",
                "defaultTenantKey": "acme",
                "realms": {
                    "main": {
                        "iam": {
                            "issuerUrl": "https://id.example.com/realms/main",
                            "clientId": "atrium-api",
                            "allowedAlgorithms": ["HS256"]
                        },
                        "defaults": { "locale": "en" },
                        "tenants": {
                            "acme": {
                                "defaults": { "plan": "standard" },
                                "orgs": { "ops": { "defaults": { "oncall": true } } }
                            },
                            "globex": { "defaults": {} }
                        }
                    }
                }
            }
        });
        serde_json::from_value(config_json).expect("test configuration is well-formed")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_for_testing_validates() {
        let config = PlatformConfig::for_testing();
        assert!(config.validate().is_ok());
        assert_eq!(config.iam.default_realm_key, "main");
        assert!(!config.strict_tenant_resolution());
    }

    #[test]
    fn test_strict_requires_production_and_flag() {
        let mut config = PlatformConfig::for_testing();
        config.env = Environment::Production;
        assert!(!config.strict_tenant_resolution());

        config.iam.require_tenant_claims_in_prod = true;
        assert!(config.strict_tenant_resolution());
    }

    #[test]
    fn test_missing_default_realm() {
        let mut config = PlatformConfig::for_testing();
        config.iam.default_realm_key = "ghost".to_string();
        let err = config.validate().unwrap_err();
        assert!(matches!(err, ConfigError::MissingDefaultRealm { .. }));
        assert_eq!(err.code(), "config_missing_default_realm");
    }

    #[test]
    fn test_default_tenant_must_exist() {
        let mut config = PlatformConfig::for_testing();
        config.iam.default_tenant_key = Some("ghost".to_string());
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Schema { .. })
        ));
    }

    #[test]
    fn test_issuer_url_must_be_http() {
        let mut config = PlatformConfig::for_testing();
        config
            .iam
            .realms
            .get_mut("main")
            .unwrap()
            .iam
            .issuer_url = "ftp://id.example.com".to_string();
        assert!(matches!(
            config.validate(),
            Err(ConfigError::Schema { .. })
        ));
    }

    #[test]
    fn test_load_rejects_unparseable_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atrium.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = PlatformConfig::load(&path).unwrap_err();
        assert!(matches!(err, ConfigError::FileParse { .. }));
        assert_eq!(err.code(), "config_file_error");
    }

    #[test]
    fn test_load_rejects_missing_file() {
        let err = PlatformConfig::load("/nonexistent/atrium.json").unwrap_err();
        assert!(matches!(err, ConfigError::FileRead { .. }));
    }

    #[test]
    fn test_load_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("atrium.json");
        let config = PlatformConfig::for_testing();
        std::fs::write(&path, serde_json::to_string_pretty(&config).unwrap()).unwrap();

        let loaded = PlatformConfig::load(&path).unwrap();
        assert_eq!(loaded.iam.default_realm_key, "main");
        assert!(loaded.realm("main").is_some());
        assert!(loaded.realm("ghost").is_none());
    }
}
