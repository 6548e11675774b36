//! Audit sink for development. Writes events to tracing output.

use async_trait::async_trait;
use castellan_application::{AuditEvent, AuditRepository};
use castellan_core::AppResult;
use tracing::info;

/// Audit repository that logs every event instead of storing it.
#[derive(Clone)]
pub struct TracingAuditRepository;

impl TracingAuditRepository {
    /// Creates a new tracing audit repository.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl Default for TracingAuditRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditRepository for TracingAuditRepository {
    async fn append_event(&self, event: AuditEvent) -> AppResult<()> {
        let actor = event
            .actor
            .map(|actor| actor.to_string())
            .unwrap_or_else(|| "bootstrap".to_owned());
        let before = event.before.map(|value| value.to_string()).unwrap_or_default();
        let after = event.after.map(|value| value.to_string()).unwrap_or_default();

        info!(
            target: "castellan::audit",
            actor = actor.as_str(),
            action = event.action.as_str(),
            resource_type = event.resource_type.as_str(),
            resource_id = event.resource_id.as_str(),
            before = before.as_str(),
            after = after.as_str(),
            occurred_at = %event.occurred_at.to_rfc3339(),
            "audit event"
        );

        Ok(())
    }
}
