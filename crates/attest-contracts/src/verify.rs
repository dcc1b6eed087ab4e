//! End-to-end verification outcome and report types.
//!
//! A verification run first re-derives the local chain, then (when an anchor
//! directory is configured) cross-checks it against the latest anchor. Every
//! outcome is terminal and maps directly to pass or fail.

use chrono::{DateTime, Utc};

use crate::{
    anchor::AnchorPayload,
    error::{AttestError, ChainIntegrityError},
    project::ProjectId,
};

/// The terminal state of one verification run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// The stored chain does not re-derive. Anchor checks never ran.
    ChainBroken(ChainIntegrityError),

    /// The chain is intact and no anchor directory was configured.
    ChainOk,

    /// The chain is intact but there was no anchor covering this project.
    NoAnchorFound { reason: String },

    /// The chain is intact and agrees with the latest anchor.
    AnchorOk {
        anchor: AnchorPayload,
        lineage_checked: bool,
    },

    /// The chain is intact but diverges from the anchor, or the anchor
    /// store's own history was rewritten.
    AnchorFailed(AttestError),
}

/// How an operator should read a verification outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Ok,
    /// Passed, but without external cross-checking.
    Warning,
    /// The database is internally inconsistent.
    LocalCorruption,
    /// The database is consistent but disagrees with the immutable record.
    AnchorDivergence,
}

impl VerificationOutcome {
    pub fn severity(&self) -> Severity {
        match self {
            VerificationOutcome::AnchorOk { .. } => Severity::Ok,
            VerificationOutcome::ChainOk | VerificationOutcome::NoAnchorFound { .. } => {
                Severity::Warning
            }
            VerificationOutcome::ChainBroken(_) => Severity::LocalCorruption,
            VerificationOutcome::AnchorFailed(_) => Severity::AnchorDivergence,
        }
    }

    pub fn passed(&self) -> bool {
        self.severity() <= Severity::Warning
    }
}

/// The result of verifying one project.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationReport {
    pub project_id: ProjectId,
    pub event_count: usize,
    pub outcome: VerificationOutcome,
    pub verified_at: DateTime<Utc>,
}

impl VerificationReport {
    pub fn passed(&self) -> bool {
        self.outcome.passed()
    }

    pub fn severity(&self) -> Severity {
        self.outcome.severity()
    }
}
