//! In-memory audit sink.
//!
//! Keeps a bounded ring of recent events. When the ring is full the
//! oldest events are discarded, so the sink never grows without limit
//! and never refuses a write.

use std::collections::VecDeque;

use async_trait::async_trait;
use tokio::sync::RwLock;

use signet_auth::AuthResult;
use signet_auth::audit::{AuditEvent, AuditSink};

/// Default ring capacity.
const DEFAULT_MAX_EVENTS: usize = 10_000;

/// Audit sink holding the most recent events in memory.
#[derive(Debug)]
pub struct MemoryAuditSink {
    events: RwLock<VecDeque<AuditEvent>>,
    max_events: usize,
}

impl MemoryAuditSink {
    /// Creates a sink with the default capacity.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_MAX_EVENTS)
    }

    /// Creates a sink holding at most `max_events` events.
    #[must_use]
    pub fn with_capacity(max_events: usize) -> Self {
        let max_events = max_events.max(1);
        Self {
            events: RwLock::new(VecDeque::with_capacity(max_events.min(1024))),
            max_events,
        }
    }

    /// Returns up to `limit` events, newest first.
    pub async fn recent(&self, limit: usize) -> Vec<AuditEvent> {
        let events = self.events.read().await;
        events.iter().rev().take(limit).cloned().collect()
    }

    /// Number of retained events.
    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    /// Returns `true` if nothing has been recorded yet.
    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

impl Default for MemoryAuditSink {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl AuditSink for MemoryAuditSink {
    async fn record(&self, event: AuditEvent) -> AuthResult<()> {
        let mut events = self.events.write().await;
        if events.len() >= self.max_events {
            events.pop_front();
        }
        events.push_back(event);
        Ok(())
    }
}
