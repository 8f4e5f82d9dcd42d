//! Operational alerts with idempotent dedupe.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// Alert severity.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertSeverity {
    /// Informational
    Low,
    /// Needs attention
    Medium,
    /// Needs immediate attention
    High,
}

/// Alert lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AlertStatus {
    /// Raised, not yet acknowledged
    Open,
    /// Acknowledged by an operator
    Acked,
}

/// Input for raising an alert.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct NewAlert {
    /// Alert type, e.g. `spend_threshold_exceeded`
    alert_type: String,
    /// Severity
    severity: AlertSeverity,
    /// Human-readable message
    message: String,
    /// Structured detail
    #[builder(default)]
    #[serde(default)]
    meta: Value,
    /// Identity for open-alert deduplication
    #[builder(default)]
    #[serde(default)]
    dedupe_key: Option<String>,
}

/// A raised alert.
///
/// While an alert with a given dedupe key is open, raising another
/// with the same key returns the existing alert unchanged.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Alert {
    /// Unique alert id
    id: String,
    /// Alert type
    alert_type: String,
    /// Severity
    severity: AlertSeverity,
    /// Human-readable message
    message: String,
    /// Structured detail
    #[serde(default)]
    meta: Value,
    /// Lifecycle status
    status: AlertStatus,
    /// Identity for open-alert deduplication
    #[serde(default)]
    dedupe_key: Option<String>,
    /// When the alert was raised
    created_at: DateTime<Utc>,
    /// When the alert was acknowledged
    #[serde(default)]
    ack_at: Option<DateTime<Utc>>,
}

impl Alert {
    /// Raise a new open alert.
    pub fn raise(input: NewAlert, now: DateTime<Utc>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            alert_type: input.alert_type,
            severity: input.severity,
            message: input.message,
            meta: input.meta,
            status: AlertStatus::Open,
            dedupe_key: input.dedupe_key,
            created_at: now,
            ack_at: None,
        }
    }

    /// Whether this alert blocks a duplicate with the given key.
    pub fn blocks_duplicate(&self, key: &str) -> bool {
        self.status == AlertStatus::Open && self.dedupe_key.as_deref() == Some(key)
    }

    /// Acknowledge the alert. Acknowledging twice keeps the first
    /// timestamp.
    pub fn ack(&mut self, now: DateTime<Utc>) {
        if self.status == AlertStatus::Open {
            self.status = AlertStatus::Acked;
            self.ack_at = Some(now);
        }
    }
}
