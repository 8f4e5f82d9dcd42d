//! Source management and connector sync.

use crate::engine::OpsEngine;
use crate::upstream::ConnectorRefresh;
use chrono::{DateTime, Utc};
use opsgate_core::{Identity, OpsAction, Outcome, Source, SourceInput, WorkspaceName};
use opsgate_error::{NotFoundError, OpsgateResult, ValidationError};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::{info, instrument, warn};

/// Result of one source attempted by a sync.
#[derive(Debug, Clone, Serialize, Deserialize, derive_getters::Getters)]
pub struct SourceSyncResult {
    /// Source id
    source_id: String,
    /// Source name
    name: String,
    /// `ok` or `error`
    status: String,
    /// Items fetched on success
    #[serde(default)]
    item_count: Option<u64>,
    /// Failure detail
    #[serde(default)]
    error: Option<String>,
}

impl OpsEngine {
    /// All sources for a workspace.
    pub fn sources(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
    ) -> OpsgateResult<Vec<Source>> {
        self.authorize(workspace, OpsAction::Read, identity)?;
        self.store().sources(workspace)
    }

    /// Create a source, or merge partial input into an existing one.
    ///
    /// The storage write is always a whole-record replace; the merge
    /// happens here against the current record.
    #[instrument(skip(self, identity, input), fields(workspace = %workspace))]
    pub fn upsert_source(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        input: SourceInput,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Source> {
        self.authorize(workspace, OpsAction::Write, identity)?;

        let mut source = match &input.id {
            Some(id) => self
                .store()
                .sources(workspace)?
                .into_iter()
                .find(|s| s.id() == id)
                .ok_or_else(|| NotFoundError::new(format!("source '{}' not found", id)))?,
            None => {
                let connector = input
                    .connector
                    .ok_or_else(|| ValidationError::new("connector is required for a new source"))?;
                let name = input
                    .name
                    .clone()
                    .ok_or_else(|| ValidationError::new("name is required for a new source"))?;
                Source::create(name, connector)
            }
        };
        source.merge_input(input);
        let source = self.store().replace_source(workspace, source)?;
        self.audit(
            workspace,
            identity,
            "sources.upsert",
            json!({"source_id": source.id(), "connector": source.connector()}),
            now,
        )?;
        Ok(source)
    }

    /// Sync the named sources, or every enabled source when `ids` is
    /// empty.
    ///
    /// Each source is attempted independently. A connector whose
    /// required token is absent from the config store fails without
    /// calling upstream; the item count from the last good sync is
    /// preserved on every failure path.
    #[instrument(skip(self, identity, refresher), fields(workspace = %workspace))]
    pub async fn sync_sources(
        &self,
        workspace: &WorkspaceName,
        identity: &Identity,
        ids: &[String],
        refresher: &dyn ConnectorRefresh,
        now: DateTime<Utc>,
    ) -> OpsgateResult<Vec<SourceSyncResult>> {
        self.authorize(workspace, OpsAction::Execute, identity)?;

        let sources = self.store().sources(workspace)?;
        let selected: Vec<Source> = if ids.is_empty() {
            sources.into_iter().filter(|s| *s.enabled()).collect()
        } else {
            let mut selected = Vec::new();
            for id in ids {
                let source = sources
                    .iter()
                    .find(|s| s.id() == id)
                    .cloned()
                    .ok_or_else(|| NotFoundError::new(format!("source '{}' not found", id)))?;
                selected.push(source);
            }
            selected
        };

        let mut results = Vec::new();
        for mut source in selected {
            let outcome = self.sync_one(&mut source, refresher, now).await;
            let result = match outcome {
                Ok(count) => SourceSyncResult {
                    source_id: source.id().clone(),
                    name: source.name().clone(),
                    status: "ok".to_string(),
                    item_count: Some(count),
                    error: None,
                },
                Err(message) => {
                    warn!(source_id = %source.id(), %message, "Source sync failed");
                    SourceSyncResult {
                        source_id: source.id().clone(),
                        name: source.name().clone(),
                        status: "error".to_string(),
                        item_count: None,
                        error: Some(message),
                    }
                }
            };
            self.store().replace_source(workspace, source)?;
            results.push(result);
        }

        self.store().append_outcome(
            workspace,
            Outcome::record(
                "source_sync",
                format!(
                    "synced {} of {} sources",
                    results.iter().filter(|r| r.status() == "ok").count(),
                    results.len()
                ),
                serde_json::to_value(&results).unwrap_or(serde_json::Value::Null),
                now,
            ),
        )?;
        self.audit(
            workspace,
            identity,
            "sources.sync",
            json!({"attempted": results.len()}),
            now,
        )?;
        info!(attempted = results.len(), "Source sync complete");
        Ok(results)
    }

    async fn sync_one(
        &self,
        source: &mut Source,
        refresher: &dyn ConnectorRefresh,
        now: DateTime<Utc>,
    ) -> Result<u64, String> {
        if let Some(api) = source.connector().required_token() {
            let token = self
                .config()
                .get_token(api)
                .map_err(|e| e.to_string())?;
            if token.is_none() {
                let message = format!("no API token configured for {}", api);
                source.mark_sync_error(message.clone(), now);
                return Err(message);
            }
        }
        match refresher.refresh(source).await {
            Ok(count) => {
                source.mark_synced(count, now);
                Ok(count)
            }
            Err(e) => {
                let message = e.to_string();
                source.mark_sync_error(message.clone(), now);
                Err(message)
            }
        }
    }
}
