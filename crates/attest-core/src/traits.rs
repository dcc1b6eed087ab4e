//! Collaborator contracts for the attest core.
//!
//! The core never talks to a database, a git binary, or an HTTP server
//! directly. It talks to these traits:
//!
//! - `EventStore` / `ProjectTransaction`: per-project atomic storage
//! - `HeadSource`: every project's chain head, read directly from storage
//! - `AnchorRunLog`: append-only record of anchor writer runs
//! - `AdminApi`: the admin collaborator used by prod anchoring and the CLI
//! - `AnchorRepository`: the anchor git repository
//!
//! The atomicity contract of an append is enforced at the
//! `ProjectTransaction` boundary rather than by whatever backs it.

use std::path::Path;

use attest_contracts::{
    AnchorRunReport, AttestResult, AuditEvent, ChainHead, ProjectId, ProjectSummary,
};

/// Storage for audit events, scoped per project.
pub trait EventStore: Send + Sync {
    /// Open a transaction scoped to `project_id`.
    ///
    /// While the transaction is open no other transaction for the same
    /// project may observe or change its head. Transactions for different
    /// projects must not wait on each other.
    fn begin(&self, project_id: &ProjectId) -> AttestResult<Box<dyn ProjectTransaction>>;

    /// Every committed event for `project_id`, ordered by sequence.
    ///
    /// Never observes an event whose head update has not committed, or the
    /// other way around.
    fn load_events(&self, project_id: &ProjectId) -> AttestResult<Vec<AuditEvent>>;
}

/// One open read-modify-write unit against a single project.
///
/// Dropping a transaction without calling `commit` discards staged writes.
pub trait ProjectTransaction: Send {
    fn project_id(&self) -> &ProjectId;

    /// The project's chain head as of transaction start, or `None` if the
    /// project does not exist.
    fn head(&self) -> Option<&ChainHead>;

    /// True when the project has been irreversibly closed.
    fn is_tombstoned(&self) -> bool;

    /// Stage `event` and the head update to `(event.sequence, event.chain_hash)`
    /// as one unit.
    ///
    /// Returns `AttestError::TransactionConflict` if `event` does not extend
    /// the current head by exactly one sequence.
    fn insert_event_and_advance_head(&mut self, event: AuditEvent) -> AttestResult<()>;

    /// Durably apply everything staged. Either both the event and the head
    /// update become visible, or neither does.
    fn commit(self: Box<Self>) -> AttestResult<()>;

    /// Discard everything staged.
    fn rollback(self: Box<Self>);
}

/// Reads every project's chain head.
pub trait HeadSource: Send + Sync {
    fn list_heads(&self) -> AttestResult<Vec<ChainHead>>;
}

/// Append-only record of anchor writer runs.
pub trait AnchorRunLog: Send + Sync {
    fn record_run(&self, report: &AnchorRunReport) -> AttestResult<()>;
}

/// The admin collaborator.
///
/// Prod anchoring goes through this rather than storage so the anchoring
/// process never holds database credentials.
pub trait AdminApi: Send + Sync {
    /// `GET /projects`
    fn list_projects(&self) -> AttestResult<Vec<ProjectSummary>>;

    /// `GET /projects/:id/head`
    fn chain_head(&self, project_id: &ProjectId) -> AttestResult<ChainHead>;

    /// `GET /projects/:id/events`, ordered by sequence.
    fn events(&self, project_id: &ProjectId) -> AttestResult<Vec<AuditEvent>>;

    /// `POST /anchor-report`
    fn report_anchor_run(&self, report: &AnchorRunReport) -> AttestResult<()>;

    /// `GET /anchor/logs?limit=N`, newest first.
    fn anchor_runs(&self, limit: usize) -> AttestResult<Vec<AnchorRunReport>>;
}

/// The anchor git repository.
///
/// Paths are relative to the repository work tree.
pub trait AnchorRepository: Send + Sync {
    /// The commit `HEAD` points at, or `None` for a repository with no commits.
    fn current_commit(&self) -> AttestResult<Option<String>>;

    /// Stage and commit `file`, returning the new commit hash.
    fn commit_file(&self, file: &Path, message: &str) -> AttestResult<String>;

    /// True if `commit` names a commit object in this repository.
    fn contains_commit(&self, commit: &str) -> AttestResult<bool>;

    /// True if `ancestor` is reachable from `descendant` (or equal to it).
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> AttestResult<bool>;

    /// The earliest commit that added `file`, or `None` if it was never committed.
    fn introducing_commit(&self, file: &Path) -> AttestResult<Option<String>>;

    /// Push `branch` to `remote`.
    fn push(&self, remote: &str, branch: &str) -> AttestResult<()>;
}
