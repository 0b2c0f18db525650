//! Best-effort audit trail.
//!
//! The kernel emits structured audit events at security-relevant points:
//! rejected tokens, defense-in-depth violations, boot failures, shutdown.
//! Writes are fire-and-forget from the kernel's perspective; an implementation
//! that fails must swallow the failure (logging it if it can) and must never
//! block or fail the request that produced the event. Secret values are
//! redacted before events reach the writer.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

/// Audit event type discriminator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditKind {
    /// A bootstrap stage failed.
    BootFailed,
    /// A presented token was rejected.
    AuthRejected,
    /// A defense-in-depth check rejected a cryptographically valid token.
    AuthCheckViolation,
    /// Tenant resolution failed for a request or job.
    TenantRejected,
    /// Process shutdown began.
    Shutdown,
}

/// A single structured audit event.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// When the event occurred.
    pub timestamp: DateTime<Utc>,
    /// Event type.
    pub kind: AuditKind,
    /// Correlation ID of the originating request, if any.
    pub request_id: Option<String>,
    /// Realm key in effect, if resolved.
    pub realm_key: Option<String>,
    /// Tenant key in effect, if resolved.
    pub tenant_key: Option<String>,
    /// Free-form, secret-redacted detail payload.
    pub details: serde_json::Value,
}

impl AuditEvent {
    /// Creates an event stamped with the current time.
    pub fn new(kind: AuditKind, details: serde_json::Value) -> Self {
        Self {
            timestamp: Utc::now(),
            kind,
            request_id: None,
            realm_key: None,
            tenant_key: None,
            details,
        }
    }

    /// Attaches the originating request ID.
    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    /// Attaches the realm and tenant in effect.
    pub fn with_tenant(mut self, realm_key: &str, tenant_key: Option<&str>) -> Self {
        self.realm_key = Some(realm_key.to_string());
        self.tenant_key = tenant_key.map(String::from);
        self
    }
}

/// Sink for audit events.
#[async_trait]
pub trait AuditWriter: Send + Sync {
    /// Writes one event. Must not fail or block the caller's request path.
    async fn write(&self, event: AuditEvent);
}

/// Audit writer emitting events to the `audit` tracing target as JSON.
#[derive(Debug, Default)]
pub struct LogAuditWriter;

impl LogAuditWriter {
    /// Creates a new log-backed writer.
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl AuditWriter for LogAuditWriter {
    async fn write(&self, event: AuditEvent) {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(target: "audit", %payload, "audit event"),
            // Serialization of our own event type failing is unreachable in
            // practice; swallow per the best-effort contract.
            Err(_) => info!(target: "audit", kind = ?event.kind, "audit event (unserializable)"),
        }
    }
}

/// In-memory audit writer for tests.
#[derive(Debug, Default)]
pub struct MemoryAuditWriter {
    events: tokio::sync::Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditWriter {
    /// Creates an empty writer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns a snapshot of the recorded events.
    pub async fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().await.clone()
    }
}

#[async_trait]
impl AuditWriter for MemoryAuditWriter {
    async fn write(&self, event: AuditEvent) {
        self.events.lock().await.push(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_memory_writer_records_events() {
        let writer = MemoryAuditWriter::new();
        writer
            .write(
                AuditEvent::new(AuditKind::AuthRejected, serde_json::json!({ "code": "jwt_expired" }))
                    .with_request_id("req-1")
                    .with_tenant("main", Some("acme")),
            )
            .await;

        let events = writer.events().await;
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, AuditKind::AuthRejected);
        assert_eq!(events[0].request_id.as_deref(), Some("req-1"));
        assert_eq!(events[0].tenant_key.as_deref(), Some("acme"));
    }

    #[test]
    fn test_event_serializes_with_snake_case_kind() {
        let event = AuditEvent::new(AuditKind::BootFailed, serde_json::json!({}));
        let payload = serde_json::to_value(&event).unwrap();
        assert_eq!(payload["kind"], "boot_failed");
    }
}
