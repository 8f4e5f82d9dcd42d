//! Risk tiers for SDK-style actions.

use opsgate_error::{OpsgateResult, ValidationError};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Fixed risk classification of an action.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "UPPERCASE")]
#[strum(serialize_all = "UPPERCASE")]
pub enum RiskTier {
    /// Runs without an approval token
    Low,
    /// Requires an approval token
    Medium,
    /// Requires an approval token and a human-supplied justification
    High,
}

impl RiskTier {
    /// Whether this tier requires an approval token.
    pub fn requires_approval(&self) -> bool {
        *self >= RiskTier::Medium
    }
}

/// The fixed action -> risk table.
///
/// Unknown actions are rejected, never defaulted to low risk.
pub fn risk_table() -> &'static [(&'static str, RiskTier)] {
    &[
        ("list_ads", RiskTier::Low),
        ("list_campaigns", RiskTier::Low),
        ("get_account", RiskTier::Low),
        ("create_post", RiskTier::Medium),
        ("send_whatsapp", RiskTier::Medium),
        ("send_bulk_whatsapp", RiskTier::High),
        ("update_budget", RiskTier::High),
        ("pause_campaign", RiskTier::High),
        ("marketing.pause_overspend", RiskTier::High),
    ]
}

/// Classify an action, rejecting unknown names.
pub fn risk_for_action(action: &str) -> OpsgateResult<RiskTier> {
    risk_table()
        .iter()
        .find(|(name, _)| *name == action)
        .map(|(_, tier)| *tier)
        .ok_or_else(|| ValidationError::new(format!("unknown action '{}'", action)).into())
}
