//! Caller identity.

use serde::{Deserialize, Serialize};

/// The identity performing an operation.
///
/// Always threaded explicitly through engine and security calls; there
/// is no ambient current-user fallback.
#[derive(
    Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters, derive_new::new,
)]
pub struct Identity {
    /// Stable user id
    #[new(into)]
    id: String,
    /// Display name
    #[new(into)]
    name: String,
}
