//! Guard and ops policy documents with typed patches.
//!
//! Updates are expressed as patch structs with per-field `Option`s,
//! merged field-by-field: unspecified fields retain their prior
//! values. There is no generic JSON deep merge.

use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

/// Guard operating mode.
///
/// `AutoSafe` is a configuration surface only: the mode, its limit
/// fields, and the `guard_auto_execute` permission are validated and
/// persisted, but no autonomous executor exists yet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum GuardMode {
    /// Record observations only
    Observe,
    /// Raise approvals for every automated action
    Approval,
    /// Reserved for autonomous execution of safe actions
    AutoSafe,
}

/// Spike/drop thresholds that trip the guard.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GuardThresholds {
    /// Spend spike percentage
    spend_spike_pct: f64,
    /// Cost-per-acquisition spike percentage
    cpa_spike_pct: f64,
    /// Return-on-ad-spend drop percentage
    roas_drop_pct: f64,
}

impl Default for GuardThresholds {
    fn default() -> Self {
        Self {
            spend_spike_pct: 50.0,
            cpa_spike_pct: 40.0,
            roas_drop_pct: 30.0,
        }
    }
}

/// Limits on automated actions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GuardLimits {
    /// Largest budget adjustment per action, in percent
    max_budget_adjustment_pct: f64,
    /// Campaigns touched per run
    max_campaigns_per_run: u32,
    /// Automated actions per day
    max_daily_auto_actions: u32,
    /// Whether pausing a campaign always raises an approval
    require_approval_for_pause: bool,
}

impl Default for GuardLimits {
    fn default() -> Self {
        Self {
            max_budget_adjustment_pct: 20.0,
            max_campaigns_per_run: 5,
            max_daily_auto_actions: 10,
            require_approval_for_pause: true,
        }
    }
}

/// Per-workspace guard policy.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct GuardPolicy {
    /// Whether the guard is active
    enabled: bool,
    /// Operating mode
    mode: GuardMode,
    /// Trip thresholds
    thresholds: GuardThresholds,
    /// Action limits
    limits: GuardLimits,
    /// Cooldown between automated actions, in minutes
    cooldown_minutes: u32,
}

impl Default for GuardPolicy {
    fn default() -> Self {
        Self {
            enabled: false,
            mode: GuardMode::Observe,
            thresholds: GuardThresholds::default(),
            limits: GuardLimits::default(),
            cooldown_minutes: 60,
        }
    }
}

/// Patch for [`GuardThresholds`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardThresholdsPatch {
    /// New spend spike percentage
    #[serde(default)]
    pub spend_spike_pct: Option<f64>,
    /// New CPA spike percentage
    #[serde(default)]
    pub cpa_spike_pct: Option<f64>,
    /// New ROAS drop percentage
    #[serde(default)]
    pub roas_drop_pct: Option<f64>,
}

/// Patch for [`GuardLimits`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardLimitsPatch {
    /// New budget adjustment cap
    #[serde(default)]
    pub max_budget_adjustment_pct: Option<f64>,
    /// New campaigns-per-run cap
    #[serde(default)]
    pub max_campaigns_per_run: Option<u32>,
    /// New daily auto-action cap
    #[serde(default)]
    pub max_daily_auto_actions: Option<u32>,
    /// New pause-approval requirement
    #[serde(default)]
    pub require_approval_for_pause: Option<bool>,
}

/// Patch for [`GuardPolicy`]. Nested patches merge recursively;
/// unspecified fields keep their prior values.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GuardPolicyPatch {
    /// New enabled flag
    #[serde(default)]
    pub enabled: Option<bool>,
    /// New operating mode
    #[serde(default)]
    pub mode: Option<GuardMode>,
    /// Threshold updates
    #[serde(default)]
    pub thresholds: Option<GuardThresholdsPatch>,
    /// Limit updates
    #[serde(default)]
    pub limits: Option<GuardLimitsPatch>,
    /// New cooldown, in minutes
    #[serde(default)]
    pub cooldown_minutes: Option<u32>,
}

impl GuardPolicy {
    /// Apply a patch field-by-field.
    pub fn apply(&mut self, patch: GuardPolicyPatch) {
        if let Some(enabled) = patch.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = patch.mode {
            self.mode = mode;
        }
        if let Some(t) = patch.thresholds {
            if let Some(v) = t.spend_spike_pct {
                self.thresholds.spend_spike_pct = v;
            }
            if let Some(v) = t.cpa_spike_pct {
                self.thresholds.cpa_spike_pct = v;
            }
            if let Some(v) = t.roas_drop_pct {
                self.thresholds.roas_drop_pct = v;
            }
        }
        if let Some(l) = patch.limits {
            if let Some(v) = l.max_budget_adjustment_pct {
                self.limits.max_budget_adjustment_pct = v;
            }
            if let Some(v) = l.max_campaigns_per_run {
                self.limits.max_campaigns_per_run = v;
            }
            if let Some(v) = l.max_daily_auto_actions {
                self.limits.max_daily_auto_actions = v;
            }
            if let Some(v) = l.require_approval_for_pause {
                self.limits.require_approval_for_pause = v;
            }
        }
        if let Some(cooldown) = patch.cooldown_minutes {
            self.cooldown_minutes = cooldown;
        }
    }

    /// Set the operating mode.
    pub fn set_mode(&mut self, mode: GuardMode) {
        self.mode = mode;
    }
}

/// Per-workspace ops policy consulted by the morning run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, derive_getters::Getters)]
pub struct OpsPolicy {
    /// Daily spend threshold that trips an overspend alert
    spend_threshold: f64,
    /// Whether bulk WhatsApp follow-ups require an approval
    require_approval_for_bulk_whatsapp: bool,
}

impl Default for OpsPolicy {
    fn default() -> Self {
        Self {
            spend_threshold: 100.0,
            require_approval_for_bulk_whatsapp: true,
        }
    }
}

/// Patch for [`OpsPolicy`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct OpsPolicyPatch {
    /// New spend threshold
    #[serde(default)]
    pub spend_threshold: Option<f64>,
    /// New bulk-WhatsApp approval requirement
    #[serde(default)]
    pub require_approval_for_bulk_whatsapp: Option<bool>,
}

impl OpsPolicy {
    /// Apply a patch field-by-field.
    pub fn apply(&mut self, patch: OpsPolicyPatch) {
        if let Some(v) = patch.spend_threshold {
            self.spend_threshold = v;
        }
        if let Some(v) = patch.require_approval_for_bulk_whatsapp {
            self.require_approval_for_bulk_whatsapp = v;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_patch_retains_unspecified_fields() {
        let mut policy = GuardPolicy::default();
        let before = policy.clone();

        policy.apply(GuardPolicyPatch {
            thresholds: Some(GuardThresholdsPatch {
                spend_spike_pct: Some(75.0),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert_eq!(*policy.thresholds().spend_spike_pct(), 75.0);
        assert_eq!(
            policy.thresholds().cpa_spike_pct(),
            before.thresholds().cpa_spike_pct()
        );
        assert_eq!(policy.limits(), before.limits());
        assert_eq!(policy.mode(), before.mode());
    }

    #[test]
    fn test_mode_and_limits_patch() {
        let mut policy = GuardPolicy::default();
        policy.apply(GuardPolicyPatch {
            enabled: Some(true),
            mode: Some(GuardMode::Approval),
            limits: Some(GuardLimitsPatch {
                max_daily_auto_actions: Some(3),
                ..Default::default()
            }),
            ..Default::default()
        });

        assert!(policy.enabled());
        assert_eq!(*policy.mode(), GuardMode::Approval);
        assert_eq!(*policy.limits().max_daily_auto_actions(), 3);
        // Untouched nested field survives.
        assert!(policy.limits().require_approval_for_pause());
    }

    #[test]
    fn test_ops_policy_patch() {
        let mut policy = OpsPolicy::default();
        policy.apply(OpsPolicyPatch {
            spend_threshold: Some(200.0),
            ..Default::default()
        });
        assert_eq!(*policy.spend_threshold(), 200.0);
        assert!(policy.require_approval_for_bulk_whatsapp());
    }

    #[test]
    fn test_unknown_mode_rejected_at_parse() {
        assert!("auto_safe".parse::<GuardMode>().is_ok());
        assert!("yolo".parse::<GuardMode>().is_err());
    }
}
