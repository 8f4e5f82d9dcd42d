//! Leads tracked per workspace.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Lead follow-up status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum LeadStatus {
    /// Newly captured
    New,
    /// Flagged for follow-up by the morning run
    NeedsFollowUp,
    /// Contacted via an approved bulk action
    Contacted,
    /// Closed out
    Closed,
}

/// A lead record.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters, derive_builder::Builder)]
#[builder(setter(into))]
pub struct Lead {
    /// Unique lead id
    #[builder(default = "uuid::Uuid::new_v4().to_string()")]
    id: String,
    /// Contact name
    name: String,
    /// Phone number in E.164 form
    #[builder(default)]
    #[serde(default)]
    phone: Option<String>,
    /// Follow-up status
    status: LeadStatus,
    /// When the lead was last contacted
    #[builder(default)]
    #[serde(default)]
    last_contact_at: Option<DateTime<Utc>>,
}

impl Lead {
    /// Whether the morning run should flag this lead.
    pub fn needs_follow_up(&self) -> bool {
        self.status == LeadStatus::NeedsFollowUp
    }

    /// Mark the lead contacted with a timestamp.
    pub fn mark_contacted(&mut self, now: DateTime<Utc>) {
        self.status = LeadStatus::Contacted;
        self.last_contact_at = Some(now);
    }
}
