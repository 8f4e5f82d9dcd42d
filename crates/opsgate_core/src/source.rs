//! External-data connectors.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::{Display, EnumString};

/// The closed set of supported connectors.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Connector {
    /// Meta advertising account
    MetaAds,
    /// Google advertising account
    GoogleAds,
    /// WhatsApp business messaging
    Whatsapp,
    /// Spreadsheet import
    Sheet,
    /// Inbound webhook feed
    Webhook,
}

impl Connector {
    /// The config-store token category this connector requires, if any.
    pub fn required_token(&self) -> Option<&'static str> {
        match self {
            Connector::MetaAds => Some("meta_ads"),
            Connector::GoogleAds => Some("google_ads"),
            Connector::Whatsapp => Some("whatsapp"),
            Connector::Sheet | Connector::Webhook => None,
        }
    }
}

/// How the source is refreshed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SyncMode {
    /// Refreshed on operator request
    Manual,
    /// Refreshed by scheduled runs
    Scheduled,
}

/// Source sync status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Display, EnumString)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SourceStatus {
    /// Never synced
    Idle,
    /// Sync in progress
    Syncing,
    /// Last sync succeeded
    Ready,
    /// Last sync failed
    Error,
    /// Source disabled
    Disabled,
}

/// Partial input merged against the current record before a
/// whole-record replace.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SourceInput {
    /// Existing source id; absent for creation
    #[serde(default)]
    pub id: Option<String>,
    /// Display name
    #[serde(default)]
    pub name: Option<String>,
    /// Connector kind; required on creation
    #[serde(default)]
    pub connector: Option<Connector>,
    /// Whether the source is enabled
    #[serde(default)]
    pub enabled: Option<bool>,
    /// Refresh mode
    #[serde(default)]
    pub sync_mode: Option<SyncMode>,
    /// Connector-specific configuration
    #[serde(default)]
    pub config: Option<Value>,
}

/// A named external-data connector instance.
///
/// Updates replace the whole record at the storage layer; callers
/// merge partial input against the current record first.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct Source {
    /// Unique source id
    id: String,
    /// Display name
    name: String,
    /// Connector kind
    connector: Connector,
    /// Whether the source is enabled
    enabled: bool,
    /// Refresh mode
    sync_mode: SyncMode,
    /// Sync status
    status: SourceStatus,
    /// Items fetched on the last successful sync
    item_count: u64,
    /// When the source last synced
    #[serde(default)]
    last_sync_at: Option<DateTime<Utc>>,
    /// Status string of the last sync
    #[serde(default)]
    last_sync_status: Option<String>,
    /// Error from the last failed sync
    #[serde(default)]
    last_error: Option<String>,
    /// Connector-specific configuration
    #[serde(default)]
    config: Value,
}

impl Source {
    /// Create a new idle source.
    pub fn create(name: impl Into<String>, connector: Connector) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            name: name.into(),
            connector,
            enabled: true,
            sync_mode: SyncMode::Manual,
            status: SourceStatus::Idle,
            item_count: 0,
            last_sync_at: None,
            last_sync_status: None,
            last_error: None,
            config: Value::Null,
        }
    }

    /// Merge partial input into this record.
    pub fn merge_input(&mut self, input: SourceInput) {
        if let Some(name) = input.name {
            self.name = name;
        }
        if let Some(connector) = input.connector {
            self.connector = connector;
        }
        if let Some(enabled) = input.enabled {
            self.enabled = enabled;
        }
        if let Some(mode) = input.sync_mode {
            self.sync_mode = mode;
        }
        if let Some(config) = input.config {
            self.config = config;
        }
    }

    /// Mark a successful sync: ready status, new item count, cleared
    /// error.
    pub fn mark_synced(&mut self, item_count: u64, now: DateTime<Utc>) {
        self.status = SourceStatus::Ready;
        self.item_count = item_count;
        self.last_sync_at = Some(now);
        self.last_sync_status = Some("ok".to_string());
        self.last_error = None;
    }

    /// Mark a failed sync. The item count from the last good sync is
    /// left untouched.
    pub fn mark_sync_error(&mut self, error: impl Into<String>, now: DateTime<Utc>) {
        self.status = SourceStatus::Error;
        self.last_sync_at = Some(now);
        self.last_sync_status = Some("error".to_string());
        self.last_error = Some(error.into());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_merge_input_partial() {
        let mut source = Source::create("Meta spend", Connector::MetaAds);
        source.merge_input(SourceInput {
            enabled: Some(false),
            ..Default::default()
        });
        assert!(!source.enabled());
        assert_eq!(source.name(), "Meta spend");
        assert_eq!(*source.connector(), Connector::MetaAds);
    }

    #[test]
    fn test_sync_error_preserves_item_count() {
        let now = Utc::now();
        let mut source = Source::create("Meta spend", Connector::MetaAds);
        source.mark_synced(42, now);
        source.mark_sync_error("token missing", now);

        assert_eq!(*source.status(), SourceStatus::Error);
        assert_eq!(*source.item_count(), 42);
        assert_eq!(source.last_error().as_deref(), Some("token missing"));
    }

    #[test]
    fn test_success_clears_error() {
        let now = Utc::now();
        let mut source = Source::create("Sheet", Connector::Sheet);
        source.mark_sync_error("boom", now);
        source.mark_synced(7, now);

        assert_eq!(*source.status(), SourceStatus::Ready);
        assert!(source.last_error().is_none());
        assert_eq!(*source.item_count(), 7);
    }

    #[test]
    fn test_required_tokens() {
        assert_eq!(Connector::MetaAds.required_token(), Some("meta_ads"));
        assert_eq!(Connector::Sheet.required_token(), None);
    }
}
