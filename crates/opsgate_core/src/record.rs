//! Append-only outcome and audit records.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// An append-only record of a workflow or action result.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Outcome {
    /// Unique outcome id
    id: String,
    /// Outcome kind, e.g. `morning_run`
    kind: String,
    /// Human-readable summary
    summary: String,
    /// Structured detail
    #[serde(default)]
    data: Value,
    /// When the outcome was recorded
    created_at: DateTime<Utc>,
}

impl Outcome {
    /// Record an outcome.
    pub fn record(
        kind: impl Into<String>,
        summary: impl Into<String>,
        data: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            kind: kind.into(),
            summary: summary.into(),
            data,
            created_at: now,
        }
    }
}

/// An append-only audit-log entry.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct AuditEntry {
    /// Unique entry id
    id: String,
    /// Identity that performed the action
    actor: String,
    /// Action name, e.g. `approvals.resolve`
    action: String,
    /// Workspace the action applied to
    workspace: String,
    /// Structured detail
    #[serde(default)]
    detail: Value,
    /// When the action happened
    created_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Record an audit entry.
    pub fn record(
        actor: impl Into<String>,
        action: impl Into<String>,
        workspace: impl Into<String>,
        detail: Value,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            actor: actor.into(),
            action: action.into(),
            workspace: workspace.into(),
            detail,
            created_at: now,
        }
    }
}
