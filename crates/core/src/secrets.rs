//! Secret resolution.
//!
//! Configuration never inlines secret material; it carries opaque references
//! (e.g. `env:ATRIUM_MAIN_CLIENT_SECRET`) that are resolved at boot through a
//! [`SecretResolver`]. Resolved values are wrapped in [`SecretValue`], whose
//! `Debug` output is always redacted so secrets cannot leak through logs or
//! error messages.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use crate::error::SecretError;

/// An opaque secret value that never appears in logs.
#[derive(Clone)]
pub struct SecretValue(String);

impl SecretValue {
    /// Creates a new secret value.
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    /// Exposes the secret value. Use only at the point of consumption.
    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Debug for SecretValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("__REDACTED__")
    }
}

/// Resolves secret references to values.
///
/// Returns `Ok(None)` when the reference is syntactically valid but no secret
/// is stored under it; the caller decides whether that is fatal (it is, for
/// client secret references named in configuration).
#[async_trait]
pub trait SecretResolver: Send + Sync {
    /// Resolves a secret reference.
    async fn resolve(&self, reference: &str) -> Result<Option<SecretValue>, SecretError>;
}

/// Resolves `env:NAME` references from process environment variables.
///
/// References without the `env:` prefix are treated as plain variable names.
#[derive(Debug, Default)]
pub struct EnvSecretResolver;

impl EnvSecretResolver {
    /// Creates a new environment-backed resolver.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl SecretResolver for EnvSecretResolver {
    async fn resolve(&self, reference: &str) -> Result<Option<SecretValue>, SecretError> {
        let name = reference.strip_prefix("env:").unwrap_or(reference);
        match std::env::var(name) {
            Ok(value) if !value.is_empty() => Ok(Some(SecretValue::new(value))),
            _ => Ok(None),
        }
    }
}

/// In-memory secret resolver for tests and local development.
#[derive(Debug, Default)]
pub struct MemorySecretResolver {
    secrets: RwLock<HashMap<String, String>>,
}

impl MemorySecretResolver {
    /// Creates an empty resolver.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores a secret under the given reference, overwriting any existing
    /// value.
    pub fn insert(&self, reference: impl Into<String>, value: impl Into<String>) {
        self.secrets
            .write()
            .expect("secret map lock poisoned")
            .insert(reference.into(), value.into());
    }
}

#[async_trait]
impl SecretResolver for MemorySecretResolver {
    async fn resolve(&self, reference: &str) -> Result<Option<SecretValue>, SecretError> {
        let secrets = self
            .secrets
            .read()
            .map_err(|_| SecretError::Access {
                message: "secret map lock poisoned".to_string(),
            })?;
        Ok(secrets.get(reference).map(SecretValue::new))
    }
}
