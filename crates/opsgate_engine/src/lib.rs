//! Workflow engine for the Opsgate control plane.
//!
//! State-machine operations over the workspace store, each RBAC-gated
//! before mutation and audit-logged after: the idempotent morning
//! run, the due-schedule runner, approval resolution with
//! action-specific side effects, source sync, guard/ops policy
//! updates, and the invite lifecycle.
//!
//! Failure semantics: storage errors (not-found, invalid input)
//! propagate to the caller; errors from individual batch items
//! (schedules, sources) are caught and reported per item so one bad
//! job cannot block the rest.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod engine;
mod invites;
mod morning;
mod schedules;
mod sources;
mod upstream;

pub use engine::OpsEngine;
pub use morning::{MorningRunInput, MorningRunReport};
pub use schedules::ScheduleJobResult;
pub use sources::SourceSyncResult;
pub use upstream::{ConnectorRefresh, UpstreamClient};
