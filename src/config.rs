//! Facade configuration.
//!
//! ```json
//! { "policy": "WORM", "label": "ledger", "audit_path": "/var/log/ledger.jsonl" }
//! ```
//!
//! Every field is optional; an empty object builds an OPEN facade labelled
//! `spdg` with no audit file.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::policy::Policy;

pub const DEFAULT_LABEL: &str = "spdg";

fn default_label() -> String {
    DEFAULT_LABEL.to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FacadeConfig {
    #[serde(default)]
    pub policy: Policy,
    /// Appears in logs and audit records.
    #[serde(default = "default_label")]
    pub label: String,
    /// Journal file, written as JSON lines.
    #[serde(default)]
    pub audit_path: Option<PathBuf>,
}

impl Default for FacadeConfig {
    fn default() -> Self {
        Self {
            policy: Policy::default(),
            label: default_label(),
            audit_path: None,
        }
    }
}

impl FacadeConfig {
    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
