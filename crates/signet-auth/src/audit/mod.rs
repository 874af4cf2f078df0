//! Audit trail for authorization decisions.
//!
//! Every grant, denial, login, logout, and revocation produces an
//! [`AuditEvent`]. Events are handed to an [`AuditEmitter`], which queues
//! them on a bounded channel and returns immediately; a background task
//! drains the queue into the configured [`AuditSink`]. A slow or broken
//! sink therefore never adds latency to the request path. When the queue
//! is full the event is dropped and counted, not waited for.

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use axum::http::HeaderMap;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::AuthResult;
use crate::config::AuditConfig;

/// Actor recorded when no principal is signed in.
pub const ACTOR_ANONYMOUS: &str = "anonymous";

/// Actor recorded for server-initiated activity.
pub const ACTOR_SYSTEM: &str = "system";

/// Audit target names for the OAuth surface.
pub mod target {
    /// The authorization endpoint.
    pub const AUTHORIZE: &str = "OAuth:Authorize";
    /// The token endpoint.
    pub const TOKEN: &str = "OAuth:Token";
    /// The userinfo endpoint.
    pub const USERINFO: &str = "OAuth:UserInfo";
    /// The revocation endpoint.
    pub const REVOKE: &str = "OAuth:Revoke";
    /// The logout endpoint.
    pub const LOGOUT: &str = "OAuth:Logout";
}

// =============================================================================
// Event
// =============================================================================

/// What happened, from the audit trail's point of view.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditAction {
    /// A protected operation was performed.
    Access,
    /// A protected operation was attempted and refused.
    Failed,
    /// A principal signed in.
    Login,
    /// A principal signed out.
    Logout,
    /// A token was revoked.
    Revoke,
}

impl AuditAction {
    /// Returns the action as a string.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Access => "access",
            Self::Failed => "failed",
            Self::Login => "login",
            Self::Logout => "logout",
            Self::Revoke => "revoke",
        }
    }
}

impl std::fmt::Display for AuditAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One recorded audit event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// Who acted: a principal ID, [`ACTOR_ANONYMOUS`], or [`ACTOR_SYSTEM`].
    pub actor: String,

    /// What kind of thing happened.
    pub action: AuditAction,

    /// What it happened to, e.g. `"OAuth:Token"`.
    pub target: String,

    /// Event-specific details.
    pub metadata: serde_json::Value,

    /// Client IP, from `X-Forwarded-For` when present.
    pub ip_address: String,

    /// Client user agent.
    pub user_agent: String,

    /// When the event happened.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl AuditEvent {
    /// Creates an event with default request context.
    #[must_use]
    pub fn new(actor: impl Into<String>, action: AuditAction, target: impl Into<String>) -> Self {
        Self {
            actor: actor.into(),
            action,
            target: target.into(),
            metadata: serde_json::Value::Null,
            ip_address: RequestContext::FALLBACK_IP.to_string(),
            user_agent: RequestContext::FALLBACK_USER_AGENT.to_string(),
            created_at: OffsetDateTime::now_utc(),
        }
    }

    /// Attaches event-specific details.
    #[must_use]
    pub fn with_metadata(mut self, metadata: serde_json::Value) -> Self {
        self.metadata = metadata;
        self
    }

    /// Attaches the originating request's context.
    #[must_use]
    pub fn with_context(mut self, context: &RequestContext) -> Self {
        self.ip_address = context.ip_address.clone();
        self.user_agent = context.user_agent.clone();
        self
    }
}

/// Where a request came from, extracted once per request.
#[derive(Debug, Clone)]
pub struct RequestContext {
    /// Client IP address.
    pub ip_address: String,
    /// Client user agent.
    pub user_agent: String,
}

impl RequestContext {
    const FALLBACK_IP: &'static str = "127.0.0.1";
    const FALLBACK_USER_AGENT: &'static str = "Unknown";

    /// Extracts the request context from HTTP headers.
    ///
    /// `X-Forwarded-For` may carry a proxy chain; only the first hop (the
    /// original client) is kept.
    #[must_use]
    pub fn from_headers(headers: &HeaderMap) -> Self {
        let ip_address = headers
            .get("x-forwarded-for")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.split(',').next())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(Self::FALLBACK_IP)
            .to_string();

        let user_agent = headers
            .get(axum::http::header::USER_AGENT)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .unwrap_or(Self::FALLBACK_USER_AGENT)
            .to_string();

        Self {
            ip_address,
            user_agent,
        }
    }
}

// =============================================================================
// Sink
// =============================================================================

/// Destination for audit events.
///
/// Implementations live in backend crates. Writes happen on the drain
/// task, off the request path, so a sink is allowed to be slow.
#[async_trait]
pub trait AuditSink: Send + Sync {
    /// Records one event.
    ///
    /// # Errors
    ///
    /// Returns an error if the event cannot be persisted.
    async fn record(&self, event: AuditEvent) -> AuthResult<()>;
}

// =============================================================================
// Emitter
// =============================================================================

/// Queues audit events for background delivery.
///
/// Cloning is cheap; every handler holds one. [`AuditEmitter::emit`] is
/// synchronous and never blocks: a full queue drops the event and bumps
/// the drop counter.
#[derive(Clone)]
pub struct AuditEmitter {
    sender: mpsc::Sender<AuditEvent>,
    dropped: Arc<AtomicU64>,
}

impl AuditEmitter {
    /// Creates an emitter and spawns its drain task.
    ///
    /// The drain task runs until every emitter clone has been dropped and
    /// the queue is empty; await the returned handle during shutdown to
    /// flush remaining events.
    #[must_use]
    pub fn spawn(sink: Arc<dyn AuditSink>, config: &AuditConfig) -> (Self, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(config.queue_capacity);
        let handle = tokio::spawn(drain(receiver, sink, config.write_timeout));

        let emitter = Self {
            sender,
            dropped: Arc::new(AtomicU64::new(0)),
        };
        (emitter, handle)
    }

    /// Queues an event for delivery.
    pub fn emit(&self, event: AuditEvent) {
        match self.sender.try_send(event) {
            Ok(()) => {}
            Err(TrySendError::Full(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    target = %event.target,
                    action = %event.action,
                    dropped_total = dropped,
                    "Audit queue is full, dropping event"
                );
            }
            Err(TrySendError::Closed(event)) => {
                let dropped = self.dropped.fetch_add(1, Ordering::Relaxed) + 1;
                tracing::warn!(
                    target = %event.target,
                    action = %event.action,
                    dropped_total = dropped,
                    "Audit pipeline is closed, dropping event"
                );
            }
        }
    }

    /// Number of events dropped since startup.
    #[must_use]
    pub fn dropped_count(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }
}

/// Drains the queue into the sink until all senders are gone.
async fn drain(
    mut receiver: mpsc::Receiver<AuditEvent>,
    sink: Arc<dyn AuditSink>,
    write_timeout: Duration,
) {
    while let Some(event) = receiver.recv().await {
        let target = event.target.clone();
        match tokio::time::timeout(write_timeout, sink.record(event)).await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                tracing::error!(target = %target, error = %e, "Failed to record audit event");
            }
            Err(_) => {
                tracing::error!(target = %target, "Audit sink write timed out");
            }
        }
    }
    tracing::debug!("Audit pipeline drained");
}

// =============================================================================
// Tests
// =============================================================================
