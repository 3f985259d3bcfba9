//! Audit trail for mutating calls.
//!
//! The engine performs no authentication; callers pass an already-authorized
//! [`ActorId`] and every committed mutation is handed to an [`AuditSink`].
//! The default sink writes through the `log` facade under the
//! `zonemap::audit` target so it can be routed separately.

use parking_lot::Mutex;
use std::fmt;
use zonemap_types::actor::ActorId;
use zonemap_types::version::BoundaryVersion;

/// Log target used by [`LogAuditSink`].
pub const AUDIT_TARGET: &str = "zonemap::audit";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AuditAction {
    CommitZone,
    RemoveZone,
    RebuildIndex,
    Shutdown,
}

impl fmt::Display for AuditAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AuditAction::CommitZone => "commit_zone",
            AuditAction::RemoveZone => "remove_zone",
            AuditAction::RebuildIndex => "rebuild_index",
            AuditAction::Shutdown => "shutdown",
        };
        f.write_str(name)
    }
}

/// One audited mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEvent {
    pub actor: ActorId,
    pub action: AuditAction,
    /// What was touched, e.g. `zone:12`.
    pub subject: String,
    /// Boundary version after the mutation.
    pub version: BoundaryVersion,
}

pub trait AuditSink: Send + Sync {
    fn record(&self, event: &AuditEvent);
}

/// Writes audit events as `info` records on [`AUDIT_TARGET`].
#[derive(Debug, Clone, Copy, Default)]
pub struct LogAuditSink;

impl AuditSink for LogAuditSink {
    fn record(&self, event: &AuditEvent) {
        log::info!(
            target: AUDIT_TARGET,
            "actor={} action={} subject={} version={}",
            event.actor,
            event.action,
            event.subject,
            event.version
        );
    }
}

/// Keeps events in memory. Handy for tests and for callers that forward
/// events in batches.
#[derive(Debug, Default)]
pub struct MemoryAuditSink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        self.events.lock().clone()
    }

    /// Remove and return everything recorded so far.
    pub fn drain(&self) -> Vec<AuditEvent> {
        std::mem::take(&mut *self.events.lock())
    }
}

impl AuditSink for MemoryAuditSink {
    fn record(&self, event: &AuditEvent) {
        self.events.lock().push(event.clone());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_sink_collects_and_drains() {
        let sink = MemoryAuditSink::new();
        let event = AuditEvent {
            actor: ActorId::new("clerk-7"),
            action: AuditAction::CommitZone,
            subject: "zone:3".to_string(),
            version: BoundaryVersion(4),
        };
        sink.record(&event);
        LogAuditSink.record(&event);

        assert_eq!(sink.events(), vec![event.clone()]);
        assert_eq!(sink.drain().len(), 1);
        assert!(sink.events().is_empty());
        assert_eq!(AuditAction::RemoveZone.to_string(), "remove_zone");
    }
}
