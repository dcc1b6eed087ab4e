//! End-to-end verification of one project.
//!
//!   Local chain → (anchor directory configured?) → Anchor → (lineage requested?) → Lineage
//!
//! Each stage runs only if the previous one passed. A broken local chain is
//! reported as local corruption and the anchor is never consulted; a
//! consistent chain that disagrees with the anchor is reported as anchor
//! divergence.

use std::path::PathBuf;

use chrono::Utc;
use tracing::{info, warn};

use attest_chain::verify_chain;
use attest_contracts::{
    AttestError, AuditEvent, ProjectId, VerificationOutcome, VerificationReport,
};
use attest_core::AnchorRepository;

use crate::reader::read_anchor;
use crate::verifier::{verify_against_anchor, verify_anchor_lineage};

/// What to check beyond the local chain.
#[derive(Default)]
pub struct VerifyOptions<'a> {
    /// Where anchor snapshots live. `None` skips anchor checks.
    pub anchor_dir: Option<PathBuf>,
    /// The anchor git repository. `None` skips the lineage check.
    pub lineage: Option<&'a dyn AnchorRepository>,
}

impl<'a> VerifyOptions<'a> {
    pub fn with_anchor_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.anchor_dir = Some(dir.into());
        self
    }

    pub fn with_lineage(mut self, repo: &'a dyn AnchorRepository) -> Self {
        self.lineage = Some(repo);
        self
    }
}

/// Verify `events` (ordered by sequence) for `project_id`.
///
/// Never fails: every outcome, including infrastructure errors while
/// reading the anchor, is folded into the report.
pub fn verify_project(
    project_id: &ProjectId,
    events: &[AuditEvent],
    options: &VerifyOptions<'_>,
) -> VerificationReport {
    let outcome = run(project_id, events, options);

    match &outcome {
        VerificationOutcome::ChainBroken(e) => {
            warn!(project_id = %project_id, error = %e, "local chain is corrupt")
        }
        VerificationOutcome::AnchorFailed(e) => {
            warn!(project_id = %project_id, error = %e, "history diverges from anchor")
        }
        VerificationOutcome::NoAnchorFound { reason } => {
            warn!(project_id = %project_id, reason = %reason, "anchor check skipped")
        }
        _ => info!(project_id = %project_id, events = events.len(), "project verified"),
    }

    VerificationReport {
        project_id: project_id.clone(),
        event_count: events.len(),
        outcome,
        verified_at: Utc::now(),
    }
}

fn run(
    project_id: &ProjectId,
    events: &[AuditEvent],
    options: &VerifyOptions<'_>,
) -> VerificationOutcome {
    if let Err(e) = verify_chain(events) {
        return VerificationOutcome::ChainBroken(e);
    }

    let Some(dir) = &options.anchor_dir else {
        return VerificationOutcome::ChainOk;
    };

    let anchor = match read_anchor(project_id, dir) {
        Ok(anchor) => anchor,
        Err(e @ (AttestError::AnchorNotFound { .. } | AttestError::ProjectNotAnchored { .. })) => {
            return VerificationOutcome::NoAnchorFound {
                reason: e.to_string(),
            }
        }
        Err(e) => return VerificationOutcome::AnchorFailed(e),
    };

    if let Err(e) = verify_against_anchor(events, &anchor) {
        return VerificationOutcome::AnchorFailed(e);
    }

    let lineage_checked = match options.lineage {
        Some(repo) => match verify_anchor_lineage(dir, repo) {
            Ok(checked) => checked,
            Err(e) => return VerificationOutcome::AnchorFailed(e),
        },
        None => false,
    };

    VerificationOutcome::AnchorOk {
        anchor,
        lineage_checked,
    }
}
