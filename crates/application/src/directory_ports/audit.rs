use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use castellan_core::AppResult;
use castellan_domain::{AdminId, AuditAction};

/// Immutable audit event payload emitted by application services.
#[derive(Debug, Clone, PartialEq)]
pub struct AuditEvent {
    /// Admin that performed the action; absent for bootstrap writes.
    pub actor: Option<AdminId>,
    /// Stable audit action identifier.
    pub action: AuditAction,
    /// Resource type label.
    pub resource_type: String,
    /// Resource identifier.
    pub resource_id: String,
    /// Snapshot before the change.
    pub before: Option<Value>,
    /// Snapshot after the change.
    pub after: Option<Value>,
    /// Event timestamp.
    pub occurred_at: DateTime<Utc>,
}

/// Port for persisting append-only audit events.
#[async_trait]
pub trait AuditRepository: Send + Sync {
    /// Persists one audit event.
    async fn append_event(&self, event: AuditEvent) -> AppResult<()>;
}
