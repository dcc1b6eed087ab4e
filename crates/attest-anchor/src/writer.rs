//! The Anchor Writer: snapshots every project's chain head.
//!
//! Two modes:
//!
//! - `DevAnchorWriter` reads heads from a `HeadSource` and writes a plain
//!   snapshot file. Nothing links one snapshot to the next, so anyone with
//!   write access to the directory can rewrite it. Local development only.
//! - `ProdAnchorWriter` reads heads through the admin API, writes the
//!   snapshot, commits it into the anchor git repository with the previous
//!   `HEAD` recorded inside, and optionally pushes.
//!
//! A run never panics and never retries. Any failed step aborts the run and
//! the returned report says why; reporting it onward is the caller's job.
//! A failed prod run leaves the git work tree exactly as the failure found it.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, SecondsFormat, SubsecRound, Utc};
use tracing::{debug, error, info, warn};

use attest_chain::CURRENT_ALGORITHM;
use attest_contracts::{
    AnchorEntry, AnchorMode, AnchorRunReport, AnchorSnapshot, AttestError, AttestResult,
    ChainHead,
};
use attest_core::{AdminApi, AnchorRepository, HeadSource};

/// `chrono` format of a bucketed snapshot's file stem (UTC).
pub const SNAPSHOT_STEM_FORMAT: &str = "%Y-%m-%d-%H";

/// `YYYY-MM-DD-HH.json` for the hour containing `timestamp`.
pub fn snapshot_file_name(timestamp: DateTime<Utc>) -> String {
    format!("{}.json", timestamp.format(SNAPSHOT_STEM_FORMAT))
}

/// What one writer run produced.
#[derive(Debug, Clone)]
pub struct AnchorRun {
    pub report: AnchorRunReport,
    /// The snapshot as written, with `anchor_commit` filled in when one was
    /// made. `None` when the run failed or there was nothing to anchor.
    pub snapshot: Option<AnchorSnapshot>,
}

/// A strategy for taking one anchor snapshot.
pub trait AnchorWriter {
    fn mode(&self) -> AnchorMode;

    /// Take one snapshot. Failures are reported in the returned run.
    fn run(&self) -> AnchorRun;
}

// ── Dev ───────────────────────────────────────────────────────────────────────

/// Writes unprotected snapshot files. Not tamper-proof.
pub struct DevAnchorWriter {
    heads: Arc<dyn HeadSource>,
    dir: PathBuf,
}

impl DevAnchorWriter {
    pub fn new(heads: Arc<dyn HeadSource>, dir: impl Into<PathBuf>) -> Self {
        Self {
            heads,
            dir: dir.into(),
        }
    }

    fn try_run(&self, report: &mut AnchorRunReport) -> AttestResult<Option<AnchorSnapshot>> {
        fs::create_dir_all(&self.dir).map_err(|e| AttestError::Storage {
            reason: format!(
                "failed to create anchor directory '{}': {}",
                self.dir.display(),
                e
            ),
        })?;

        let heads = self.heads.list_heads()?;
        if heads.is_empty() {
            info!("no projects to anchor");
            return Ok(None);
        }

        let snapshot = build_snapshot(AnchorMode::Dev, heads, None);
        let file = write_snapshot(&self.dir, &snapshot)?;
        report.anchor_file = Some(file);

        warn!(
            dir = %self.dir.display(),
            "dev anchor written; dev snapshots are not tamper-proof"
        );
        Ok(Some(snapshot))
    }
}

impl AnchorWriter for DevAnchorWriter {
    fn mode(&self) -> AnchorMode {
        AnchorMode::Dev
    }

    fn run(&self) -> AnchorRun {
        let mut report = AnchorRunReport::start(AnchorMode::Dev);
        finish(self.try_run(&mut report), report)
    }
}

// ── Prod ──────────────────────────────────────────────────────────────────────

/// Commits snapshots into the anchor git repository.
pub struct ProdAnchorWriter {
    api: Arc<dyn AdminApi>,
    repo: Arc<dyn AnchorRepository>,
    dir: PathBuf,
    push: Option<(String, String)>,
}

impl ProdAnchorWriter {
    /// `dir` must be the work tree `repo` operates on.
    pub fn new(
        api: Arc<dyn AdminApi>,
        repo: Arc<dyn AnchorRepository>,
        dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            api,
            repo,
            dir: dir.into(),
            push: None,
        }
    }

    /// Push `branch` to `remote` after every commit.
    pub fn with_push(mut self, remote: impl Into<String>, branch: impl Into<String>) -> Self {
        self.push = Some((remote.into(), branch.into()));
        self
    }

    fn fetch_heads(&self) -> AttestResult<Vec<ChainHead>> {
        let projects = self.api.list_projects()?;
        debug!(count = projects.len(), "projects fetched");

        let mut heads = Vec::with_capacity(projects.len());
        for project in &projects {
            heads.push(self.api.chain_head(&project.project_id)?);
        }
        heads.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(heads)
    }

    fn try_run(&self, report: &mut AnchorRunReport) -> AttestResult<Option<AnchorSnapshot>> {
        if !self.dir.join(".git").exists() {
            return Err(AttestError::Git {
                reason: format!(
                    "anchor directory '{}' is not a git repository; run 'git init' first",
                    self.dir.display()
                ),
            });
        }

        let previous = self.repo.current_commit()?;
        report.previous_anchor_commit = previous.clone();
        debug!(previous_anchor_commit = ?previous, "resolved anchor repository HEAD");

        let heads = self.fetch_heads()?;
        if heads.is_empty() {
            info!("no projects to anchor");
            return Ok(None);
        }

        let mut snapshot = build_snapshot(AnchorMode::Prod, heads, previous);
        let file = write_snapshot(&self.dir, &snapshot)?;
        report.anchor_file = Some(file.clone());

        let message = format!(
            "anchor: {}",
            snapshot.timestamp.to_rfc3339_opts(SecondsFormat::Millis, true)
        );
        let commit = self.repo.commit_file(Path::new(&file), &message)?;
        report.git_commit = Some(commit.clone());
        snapshot.anchor_commit = Some(commit);

        if let Some((remote, branch)) = &self.push {
            self.repo.push(remote, branch)?;
        }

        Ok(Some(snapshot))
    }
}

impl AnchorWriter for ProdAnchorWriter {
    fn mode(&self) -> AnchorMode {
        AnchorMode::Prod
    }

    fn run(&self) -> AnchorRun {
        let mut report = AnchorRunReport::start(AnchorMode::Prod);
        finish(self.try_run(&mut report), report)
    }
}

// ── Shared steps ──────────────────────────────────────────────────────────────

fn build_snapshot(
    mode: AnchorMode,
    heads: Vec<ChainHead>,
    previous_anchor_commit: Option<String>,
) -> AnchorSnapshot {
    AnchorSnapshot {
        mode,
        timestamp: Utc::now().trunc_subsecs(3),
        hash_algorithm: Some(CURRENT_ALGORITHM),
        anchors: heads.into_iter().map(AnchorEntry::from).collect(),
        previous_anchor_commit,
        anchor_commit: None,
    }
}

/// Write `snapshot` into `dir` and return its file name.
///
/// The body is staged in a sibling temp file and renamed into place, so a
/// reader never sees a half-written snapshot.
fn write_snapshot(dir: &Path, snapshot: &AnchorSnapshot) -> AttestResult<String> {
    let file = snapshot_file_name(snapshot.timestamp);
    let path = dir.join(&file);
    let staging = dir.join(format!(".{}.tmp", file));

    let body = serde_json::to_string_pretty(snapshot).map_err(|e| AttestError::Storage {
        reason: format!("failed to encode snapshot: {}", e),
    })?;
    fs::write(&staging, body + "\n").map_err(|e| AttestError::Storage {
        reason: format!("failed to write '{}': {}", staging.display(), e),
    })?;
    fs::rename(&staging, &path).map_err(|e| AttestError::Storage {
        reason: format!("failed to move snapshot into '{}': {}", path.display(), e),
    })?;

    info!(
        file = %file,
        mode = %snapshot.mode,
        projects = snapshot.anchors.len(),
        "anchor snapshot written"
    );
    Ok(file)
}

fn finish(result: AttestResult<Option<AnchorSnapshot>>, report: AnchorRunReport) -> AnchorRun {
    match result {
        Ok(snapshot) => {
            let count = snapshot.as_ref().map(|s| s.anchors.len()).unwrap_or(0);
            let report = report.succeed(count);
            info!(
                run_id = %report.run_id,
                mode = %report.mode,
                projects = count,
                commit = ?report.git_commit,
                "anchor run succeeded"
            );
            AnchorRun { report, snapshot }
        }
        Err(e) => {
            error!(error = %e, mode = %report.mode, "anchor run failed");
            AnchorRun {
                report: report.fail(&e),
                snapshot: None,
            }
        }
    }
}
