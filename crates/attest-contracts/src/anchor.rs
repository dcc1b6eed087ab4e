//! Anchor snapshot wire formats and anchor run records.
//!
//! An anchor snapshot is a JSON file holding every project's chain head at
//! one moment. In prod mode each snapshot is committed into a git history
//! that the database never has write access to, so a rewritten database
//! cannot also rewrite what was anchored.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
    event::HashAlgorithm,
    project::{ChainHead, ProjectId},
};

/// How strongly a snapshot is protected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnchorMode {
    /// Plain files, no commit chain. Not tamper-proof.
    Dev,
    /// Committed into the anchor git repository.
    Prod,
}

impl AnchorMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnchorMode::Dev => "dev",
            AnchorMode::Prod => "prod",
        }
    }
}

impl fmt::Display for AnchorMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One project's head as recorded in a snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorEntry {
    pub project_id: ProjectId,
    pub last_sequence: u64,
    pub last_chain_hash: String,
}

impl From<ChainHead> for AnchorEntry {
    fn from(head: ChainHead) -> Self {
        Self {
            project_id: head.project_id,
            last_sequence: head.last_sequence,
            last_chain_hash: head.last_chain_hash,
        }
    }
}

/// The bucketed snapshot file, `<YYYY-MM-DD-HH>.json`.
///
/// `anchor_commit` is always `null` on disk: the commit that introduces the
/// file cannot name itself. The writer fills it in on the value it returns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorSnapshot {
    pub mode: AnchorMode,
    pub timestamp: DateTime<Utc>,
    #[serde(default)]
    pub hash_algorithm: Option<HashAlgorithm>,
    pub anchors: Vec<AnchorEntry>,
    #[serde(default)]
    pub previous_anchor_commit: Option<String>,
    #[serde(default)]
    pub anchor_commit: Option<String>,
}

impl AnchorSnapshot {
    /// Find the entry recorded for `project_id`.
    pub fn entry(&self, project_id: &ProjectId) -> Option<&AnchorEntry> {
        self.anchors.iter().find(|a| &a.project_id == project_id)
    }
}

/// The legacy single-project file, `project-<id>.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LegacyAnchor {
    pub project_id: ProjectId,
    pub last_sequence: u64,
    pub last_chain_hash: String,
    /// Milliseconds since the Unix epoch.
    pub anchored_at: i64,
}

/// One project's anchor as resolved by the anchor reader.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnchorPayload {
    pub project_id: ProjectId,
    pub last_sequence: u64,
    pub last_chain_hash: String,
    pub anchored_at: DateTime<Utc>,
    /// File name (not path) the anchor was read from.
    pub source_file: String,
    /// `None` for legacy files, which predate the mode field.
    pub mode: Option<AnchorMode>,
    pub previous_anchor_commit: Option<String>,
}

/// Lifecycle of one anchor writer run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunStatus {
    Running,
    Success,
    Failed,
}

/// Operational record of one anchor writer run.
///
/// Runs are append-only: a report is never edited after it is recorded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnchorRunReport {
    pub run_id: Uuid,
    pub mode: AnchorMode,
    pub status: RunStatus,
    pub started_at: DateTime<Utc>,
    pub finished_at: Option<DateTime<Utc>>,
    pub project_count: Option<usize>,
    pub anchor_file: Option<String>,
    pub git_commit: Option<String>,
    pub previous_anchor_commit: Option<String>,
    pub error: Option<String>,
}

impl AnchorRunReport {
    /// A fresh `running` report stamped with the current time.
    pub fn start(mode: AnchorMode) -> Self {
        Self {
            run_id: Uuid::new_v4(),
            mode,
            status: RunStatus::Running,
            started_at: Utc::now(),
            finished_at: None,
            project_count: None,
            anchor_file: None,
            git_commit: None,
            previous_anchor_commit: None,
            error: None,
        }
    }

    pub fn succeed(mut self, project_count: usize) -> Self {
        self.status = RunStatus::Success;
        self.project_count = Some(project_count);
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn fail(mut self, error: impl fmt::Display) -> Self {
        self.status = RunStatus::Failed;
        self.error = Some(error.to_string());
        self.finished_at = Some(Utc::now());
        self
    }

    pub fn is_success(&self) -> bool {
        self.status == RunStatus::Success
    }
}
