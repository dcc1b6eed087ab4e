//! Tenant identity and per-tenant chain head.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::GENESIS_CHAIN_HASH;

/// Stable identifier of a tenant project.
///
/// Every chain, head, and anchor entry is scoped to exactly one project.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectId(pub String);

impl ProjectId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ProjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ProjectId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for ProjectId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The singleton pointer to a project's latest event.
///
/// Invariant: `last_chain_hash` equals the `chain_hash` of the event whose
/// sequence is `last_sequence`, or the genesis sentinel when no event exists.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChainHead {
    pub project_id: ProjectId,
    pub last_sequence: u64,
    pub last_chain_hash: String,
}

impl ChainHead {
    /// The head a project starts with: sequence 0, linked to genesis.
    pub fn genesis(project_id: ProjectId) -> Self {
        Self {
            project_id,
            last_sequence: 0,
            last_chain_hash: GENESIS_CHAIN_HASH.to_string(),
        }
    }
}

/// A project as listed by the admin API.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectSummary {
    #[serde(alias = "id")]
    pub project_id: ProjectId,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tombstoned: bool,
}
