//! Error types for the attest audit log.
//!
//! All fallible operations return `AttestResult<T>`. Variants carry enough
//! context (sequence numbers, file names, commit hashes) for an operator to
//! act on the failure without re-running anything.

use std::fmt;

use thiserror::Error;

/// How a stored chain link failed to re-derive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChainBreakKind {
    /// `prevChainHash` differs from the preceding event's `chainHash`.
    PrevHashMismatch,
    /// `chainHash` differs from `H(payloadHash ++ prevChainHash)`.
    ChainHashMismatch,
    /// Sequence 1 does not link to the genesis sentinel.
    GenesisMismatch,
    /// Sequence is not exactly one greater than its predecessor.
    SequenceDiscontinuity,
}

impl fmt::Display for ChainBreakKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ChainBreakKind::PrevHashMismatch => "previous chain hash does not match",
            ChainBreakKind::ChainHashMismatch => "chain hash does not match recomputed value",
            ChainBreakKind::GenesisMismatch => "first event does not link to genesis",
            ChainBreakKind::SequenceDiscontinuity => "sequence is not contiguous",
        };
        f.write_str(s)
    }
}

/// A local hash-chain failure, reported at the first offending sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainIntegrityError {
    /// The stored payload no longer hashes to the stored `payloadHash`.
    #[error("payload hash mismatch at sequence {sequence}")]
    PayloadHashMismatch { sequence: u64 },

    /// The link between this event and its predecessor is broken.
    #[error("chain break at sequence {sequence}: {kind}")]
    ChainBreak { sequence: u64, kind: ChainBreakKind },
}

impl ChainIntegrityError {
    /// The sequence at which the chain first diverged.
    pub fn sequence(&self) -> u64 {
        match self {
            ChainIntegrityError::PayloadHashMismatch { sequence }
            | ChainIntegrityError::ChainBreak { sequence, .. } => *sequence,
        }
    }
}

/// Which trust domain an error belongs to.
///
/// Operators must be able to tell "the database is internally broken"
/// (`LocalChain`) apart from "the database is consistent but disagrees with
/// the external record" (`Anchor`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorLayer {
    /// Rejected input; nothing was written.
    Input,
    /// The stored hash chain does not re-derive.
    LocalChain,
    /// Live history diverges from the anchor, or the anchor store itself was rewritten.
    Anchor,
    /// Storage, network, git, or configuration failure.
    Infrastructure,
}

/// The unified error type for the attest crates.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AttestError {
    /// The payload does not conform to the audit payload schema.
    #[error("schema violation: {reason}")]
    SchemaViolation { reason: String },

    /// No chain head exists for the project.
    #[error("unknown project '{project_id}'")]
    UnknownProject { project_id: String },

    /// The project was irreversibly closed and accepts no further events.
    #[error("project '{project_id}' is tombstoned")]
    ProjectTombstoned { project_id: String },

    #[error(transparent)]
    ChainIntegrity(#[from] ChainIntegrityError),

    /// No snapshot file exists in the anchor directory.
    #[error("no anchor file found in '{dir}'")]
    AnchorNotFound { dir: String },

    /// The snapshot file is not valid JSON or lacks required fields.
    #[error("invalid anchor file '{file}': {reason}")]
    AnchorFormat { file: String, reason: String },

    /// The latest snapshot has no entry for this project.
    #[error("project '{project_id}' not found in anchor file '{file}'")]
    ProjectNotAnchored { project_id: String, file: String },

    /// Live history ends before the anchored sequence.
    #[error("{}", truncation_message(.anchored_sequence, .history_end))]
    AnchorTruncation {
        anchored_sequence: u64,
        history_end: Option<u64>,
    },

    /// History reaches past the anchored sequence but the anchored event is missing.
    #[error("event at anchored sequence {sequence} is missing from history")]
    AnchorSequenceGap { sequence: u64 },

    /// The event at the anchored sequence does not carry the anchored hash.
    #[error(
        "chain hash mismatch at anchored sequence {sequence}: anchor {anchored_hash}, history {history_hash}"
    )]
    AnchorChainMismatch {
        sequence: u64,
        anchored_hash: String,
        history_hash: String,
    },

    /// The anchor repository's commit graph no longer links this snapshot to its predecessor.
    #[error("anchor lineage broken for '{file}' (previous commit {previous_commit}): {reason}")]
    AnchorLineageBroken {
        file: String,
        previous_commit: String,
        reason: String,
    },

    /// The head moved underneath an append transaction.
    #[error("transaction conflict on project '{project_id}': {reason}")]
    TransactionConflict { project_id: String, reason: String },

    #[error("unsupported hash algorithm '{tag}'")]
    UnsupportedHashAlgorithm { tag: String },

    #[error("storage error: {reason}")]
    Storage { reason: String },

    #[error("git error: {reason}")]
    Git { reason: String },

    #[error("admin API error: {reason}")]
    AdminApi { reason: String },

    /// A bounded I/O call did not finish in time.
    #[error("{operation} timed out after {timeout_secs}s")]
    Timeout { operation: String, timeout_secs: u64 },

    #[error("configuration error: {reason}")]
    Config { reason: String },
}

fn truncation_message(anchored_sequence: &u64, history_end: &Option<u64>) -> String {
    match history_end {
        None => format!(
            "history is empty but anchor exists at sequence {}",
            anchored_sequence
        ),
        Some(end) => format!(
            "history ends at sequence {}, but anchor requires {}",
            end, anchored_sequence
        ),
    }
}

impl AttestError {
    /// Classify this error into the trust domain it reports on.
    pub fn layer(&self) -> ErrorLayer {
        match self {
            AttestError::SchemaViolation { .. }
            | AttestError::UnknownProject { .. }
            | AttestError::ProjectTombstoned { .. } => ErrorLayer::Input,

            AttestError::ChainIntegrity(_) => ErrorLayer::LocalChain,

            AttestError::AnchorNotFound { .. }
            | AttestError::AnchorFormat { .. }
            | AttestError::ProjectNotAnchored { .. }
            | AttestError::AnchorTruncation { .. }
            | AttestError::AnchorSequenceGap { .. }
            | AttestError::AnchorChainMismatch { .. }
            | AttestError::AnchorLineageBroken { .. } => ErrorLayer::Anchor,

            AttestError::TransactionConflict { .. }
            | AttestError::UnsupportedHashAlgorithm { .. }
            | AttestError::Storage { .. }
            | AttestError::Git { .. }
            | AttestError::AdminApi { .. }
            | AttestError::Timeout { .. }
            | AttestError::Config { .. } => ErrorLayer::Infrastructure,
        }
    }
}

/// Convenience alias used throughout the attest crates.
pub type AttestResult<T> = Result<T, AttestError>;
