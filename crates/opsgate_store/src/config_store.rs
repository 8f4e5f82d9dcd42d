//! Key-value config store: upstream API tokens and the operator
//! identity. Simple get/set semantics, no transactions.

use crate::doc::{read_or_default, write_atomic};
use opsgate_error::OpsgateResult;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

/// The configured operator identity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, derive_getters::Getters, derive_new::new)]
pub struct Operator {
    /// Operator user id
    #[new(into)]
    id: String,
    /// Display name
    #[new(into)]
    name: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct TokenDoc {
    #[serde(default)]
    tokens: HashMap<String, String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct OperatorDoc {
    #[serde(default)]
    operator: Option<Operator>,
}

/// File-backed config store at the storage root.
#[derive(Debug, Clone)]
pub struct ConfigStore {
    root: PathBuf,
}

impl ConfigStore {
    /// Open a config store rooted at `root`.
    pub fn open(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn tokens_path(&self) -> PathBuf {
        self.root.join("tokens.json")
    }

    fn operator_path(&self) -> PathBuf {
        self.root.join("operator.json")
    }

    /// Get the token configured for an API category, e.g. `meta_ads`.
    pub fn get_token(&self, api: &str) -> OpsgateResult<Option<String>> {
        let doc: TokenDoc = read_or_default(&self.tokens_path())?;
        Ok(doc.tokens.get(api).cloned())
    }

    /// Set the token for an API category.
    pub fn set_token(&self, api: impl Into<String>, value: impl Into<String>) -> OpsgateResult<()> {
        let mut doc: TokenDoc = read_or_default(&self.tokens_path())?;
        let api = api.into();
        debug!(%api, "Setting API token");
        doc.tokens.insert(api, value.into());
        write_atomic(&self.tokens_path(), &doc)
    }

    /// Get the configured operator identity.
    pub fn get_operator(&self) -> OpsgateResult<Option<Operator>> {
        let doc: OperatorDoc = read_or_default(&self.operator_path())?;
        Ok(doc.operator)
    }

    /// Set the operator identity.
    pub fn set_operator(&self, operator: Operator) -> OpsgateResult<()> {
        write_atomic(&self.operator_path(), &OperatorDoc {
            operator: Some(operator),
        })
    }
}
