//! Shared helpers for kernel integration tests.

#![allow(dead_code)]

use std::path::PathBuf;
use std::sync::Arc;

use atrium_core::secrets::MemorySecretResolver;
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use tempfile::TempDir;

/// Symmetric signing secret shared by the test realm and the test tokens.
pub const TEST_SECRET: &str = "integration-test-secret";

/// A platform configuration document with one HS256 realm (`main`), two
/// tenants (`acme` with org `ops`, `globex`), and a client secret reference
/// backed by [`memory_secrets`].
pub fn test_config() -> serde_json::Value {
    serde_json::json!({
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
                        "clientSecretRef": "kv:main-client",
                        "allowedAlgorithms": ["HS256"]
                    },
                    "defaults": { "locale": "en" },
                    "tenants": {
                        "acme": {
                            "defaults": { "plan": "standard" },
                            "orgs": { "ops": { "defaults": { "oncall": true } } }
                        },
                        "globex": { "defaults": { "plan": "trial" } }
                    }
                }
            }
        }
    })
}

/// Writes a configuration document to a temp file, returning the directory
/// guard alongside the path.
pub fn write_config(config: &serde_json::Value) -> (TempDir, PathBuf) {
    let dir = tempfile::tempdir().expect("create temp dir");
    let path = dir.path().join("atrium.json");
    std::fs::write(&path, serde_json::to_string_pretty(config).expect("serialize config"))
        .expect("write config file");
    (dir, path)
}

/// A secret resolver pre-loaded with the test realm's client secret.
pub fn memory_secrets() -> Arc<MemorySecretResolver> {
    let secrets = MemorySecretResolver::new();
    secrets.insert("kv:main-client", TEST_SECRET);
    Arc::new(secrets)
}

/// Signs an HS256 token for the test realm. `extra` entries override the
/// valid base claims (issuer, audience, subject, expiry).
pub fn make_token(extra: serde_json::Value) -> String {
    let mut claims = serde_json::json!({
        "iss": "https://id.example.com/realms/main",
        "aud": "atrium-api",
        "sub": "user-1",
        "preferred_username": "jdoe",
        "exp": chrono::Utc::now().timestamp() + 600,
    });
    if let (Some(base), Some(extra)) = (claims.as_object_mut(), extra.as_object()) {
        for (key, value) in extra {
            base.insert(key.clone(), value.clone());
        }
    }
    encode(
        &Header::new(Algorithm::HS256),
        &claims,
        &EncodingKey::from_secret(TEST_SECRET.as_bytes()),
    )
    .expect("sign test token")
}
