//! Document kinds and atomic file I/O.

use opsgate_error::{OpsgateResult, StorageError};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::path::Path;

/// One JSON document per entity category inside a workspace directory.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DocKind {
    /// Lead records
    Leads,
    /// Raised alerts
    Alerts,
    /// Approval requests
    Approvals,
    /// Workflow outcome records
    Outcomes,
    /// Scheduled runs
    Schedules,
    /// External-data connectors
    Sources,
    /// Ops policy
    Policy,
    /// Guard policy
    GuardPolicy,
    /// Engine state (day stamps)
    State,
    /// Operator-connected integrations
    Integrations,
    /// Append-only audit log
    ActionLog,
    /// Rollback snapshots taken before policy mutations
    Snapshots,
}

impl DocKind {
    /// File name of this document.
    pub fn file_name(&self) -> &'static str {
        match self {
            DocKind::Leads => "leads.json",
            DocKind::Alerts => "alerts.json",
            DocKind::Approvals => "approvals.json",
            DocKind::Outcomes => "outcomes.json",
            DocKind::Schedules => "schedules.json",
            DocKind::Sources => "sources.json",
            DocKind::Policy => "policy.json",
            DocKind::GuardPolicy => "guard_policy.json",
            DocKind::State => "state.json",
            DocKind::Integrations => "integrations.json",
            DocKind::ActionLog => "action_log.json",
            DocKind::Snapshots => "snapshots.json",
        }
    }
}

/// Read a JSON document, returning the default value when the file
/// does not exist yet.
pub(crate) fn read_or_default<T>(path: &Path) -> OpsgateResult<T>
where
    T: DeserializeOwned + Default,
{
    match std::fs::read(path) {
        Ok(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
            StorageError::new(format!("corrupt document {}: {}", path.display(), e)).into()
        }),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(T::default()),
        Err(e) => {
            Err(StorageError::new(format!("read {}: {}", path.display(), e)).into())
        }
    }
}

/// Write a JSON document atomically: serialize to a sibling temp file,
/// then rename over the target. A crash mid-write never yields a
/// corrupt document.
pub(crate) fn write_atomic<T>(path: &Path, value: &T) -> OpsgateResult<()>
where
    T: Serialize,
{
    let parent = path.parent().ok_or_else(|| {
        StorageError::new(format!("document path {} has no parent", path.display()))
    })?;
    std::fs::create_dir_all(parent)
        .map_err(|e| StorageError::new(format!("create {}: {}", parent.display(), e)))?;

    let bytes = serde_json::to_vec_pretty(value)
        .map_err(|e| StorageError::new(format!("serialize {}: {}", path.display(), e)))?;

    let tmp = path.with_extension(format!("tmp.{}", uuid::Uuid::new_v4().simple()));
    std::fs::write(&tmp, &bytes)
        .map_err(|e| StorageError::new(format!("write {}: {}", tmp.display(), e)))?;
    std::fs::rename(&tmp, path).map_err(|e| {
        let _ = std::fs::remove_file(&tmp);
        StorageError::new(format!("rename {} -> {}: {}", tmp.display(), path.display(), e))
    })?;
    Ok(())
}
