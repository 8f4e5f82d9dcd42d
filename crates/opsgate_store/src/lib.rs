//! Atomic JSON-document persistence for Opsgate workspaces.
//!
//! One directory per workspace under a resolved root, one JSON
//! document per entity category. Writes are crash-atomic at the file
//! level (temp file + rename). Two racing writers on the same
//! document are last-writer-wins; the control plane accepts this
//! known race given its low write contention.

#![warn(missing_docs)]
#![forbid(unsafe_code)]

mod config_store;
mod doc;
mod root;
mod store;

pub use config_store::{ConfigStore, Operator};
pub use doc::DocKind;
pub use root::resolve_root;
pub use store::{Snapshot, WorkspaceStore};
