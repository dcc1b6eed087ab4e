//! In-memory implementation of the storage collaborator.
//!
//! `InMemoryEventStore` is the reference `EventStore`. Each project owns its
//! own `Mutex`-guarded ledger (head, tombstone flag, events). A transaction
//! holds that project's lock from `begin` until `commit`/`rollback`, which
//! serializes appends per project. The project map itself is only read-locked
//! long enough to clone the ledger's `Arc`, so appends to different projects
//! never wait on each other.
//!
//! Readers (`load_events`, `list_heads`) take the same per-project lock, so
//! they see a project either before or after a commit, never in between.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::{ArcMutexGuard, Mutex, RawMutex, RwLock};
use tracing::{debug, info};

use attest_contracts::{
    AnchorRunReport, AttestError, AttestResult, AuditEvent, ChainHead, ProjectId,
};
use attest_core::traits::{AnchorRunLog, EventStore, HeadSource, ProjectTransaction};

// ── Internal state ────────────────────────────────────────────────────────────

/// Everything stored for one project.
pub(crate) struct ProjectLedger {
    pub(crate) head: ChainHead,
    pub(crate) tombstoned: bool,
    /// Committed events, in sequence order.
    pub(crate) events: Vec<AuditEvent>,
}

type LedgerGuard = ArcMutexGuard<RawMutex, ProjectLedger>;

// ── Public store ──────────────────────────────────────────────────────────────

/// An in-memory, per-project-locked event store.
#[derive(Default)]
pub struct InMemoryEventStore {
    projects: RwLock<HashMap<ProjectId, Arc<Mutex<ProjectLedger>>>>,
    runs: Mutex<Vec<AnchorRunReport>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create `project_id` with its genesis head.
    ///
    /// Returns `AttestError::Storage` if the project already exists.
    pub fn create_project(&self, project_id: &ProjectId) -> AttestResult<ChainHead> {
        let mut projects = self.projects.write();
        if projects.contains_key(project_id) {
            return Err(AttestError::Storage {
                reason: format!("project '{}' already exists", project_id),
            });
        }

        let head = ChainHead::genesis(project_id.clone());
        projects.insert(
            project_id.clone(),
            Arc::new(Mutex::new(ProjectLedger {
                head: head.clone(),
                tombstoned: false,
                events: Vec::new(),
            })),
        );

        info!(project_id = %project_id, "project created at genesis");
        Ok(head)
    }

    /// Irreversibly close `project_id`. Its history and head are kept.
    pub fn tombstone(&self, project_id: &ProjectId) -> AttestResult<()> {
        let ledger = self.ledger(project_id)?;
        ledger.lock().tombstoned = true;
        info!(project_id = %project_id, "project tombstoned");
        Ok(())
    }

    /// The committed head for `project_id`, if the project exists.
    pub fn head(&self, project_id: &ProjectId) -> Option<ChainHead> {
        let ledger = self.ledger(project_id).ok()?;
        let head = ledger.lock().head.clone();
        Some(head)
    }

    /// Recorded anchor runs, newest first.
    pub fn recent_runs(&self, limit: usize) -> Vec<AnchorRunReport> {
        self.runs.lock().iter().rev().take(limit).cloned().collect()
    }

    /// Replace a project's stored events and head without any checks.
    ///
    /// Bypasses the append path entirely. This is what a compromised
    /// database looks like, and exists so that detection can be exercised.
    pub fn overwrite_unchecked(
        &self,
        project_id: &ProjectId,
        events: Vec<AuditEvent>,
        head: ChainHead,
    ) -> AttestResult<()> {
        let ledger = self.ledger(project_id)?;
        let mut guard = ledger.lock();
        guard.events = events;
        guard.head = head;
        Ok(())
    }

    /// Mutate a project's stored events in place without any checks.
    pub fn mutate_unchecked<F>(&self, project_id: &ProjectId, f: F) -> AttestResult<()>
    where
        F: FnOnce(&mut Vec<AuditEvent>),
    {
        let ledger = self.ledger(project_id)?;
        f(&mut ledger.lock().events);
        Ok(())
    }

    fn ledger(&self, project_id: &ProjectId) -> AttestResult<Arc<Mutex<ProjectLedger>>> {
        self.projects
            .read()
            .get(project_id)
            .cloned()
            .ok_or_else(|| AttestError::UnknownProject {
                project_id: project_id.to_string(),
            })
    }
}

// ── EventStore impl ───────────────────────────────────────────────────────────

impl EventStore for InMemoryEventStore {
    /// Lock `project_id`'s ledger for the lifetime of the transaction.
    ///
    /// An unknown project still yields a transaction (with no head) so the
    /// caller reports `UnknownProject` through the normal path.
    fn begin(&self, project_id: &ProjectId) -> AttestResult<Box<dyn ProjectTransaction>> {
        // The map read guard is released before blocking on the project lock.
        let ledger = self.projects.read().get(project_id).cloned();
        let guard = ledger.map(|l| l.lock_arc());
        let head = guard.as_ref().map(|g| g.head.clone());

        debug!(project_id = %project_id, exists = head.is_some(), "transaction begun");

        Ok(Box::new(InMemoryTransaction {
            project_id: project_id.clone(),
            guard,
            head,
            staged: None,
        }))
    }

    fn load_events(&self, project_id: &ProjectId) -> AttestResult<Vec<AuditEvent>> {
        let ledger = self.ledger(project_id)?;
        let events = ledger.lock().events.clone();
        Ok(events)
    }
}

impl HeadSource for InMemoryEventStore {
    /// Every project's head, ordered by project id.
    fn list_heads(&self) -> AttestResult<Vec<ChainHead>> {
        let ledgers: Vec<Arc<Mutex<ProjectLedger>>> =
            self.projects.read().values().cloned().collect();

        let mut heads: Vec<ChainHead> = ledgers.iter().map(|l| l.lock().head.clone()).collect();
        heads.sort_by(|a, b| a.project_id.cmp(&b.project_id));
        Ok(heads)
    }
}

impl AnchorRunLog for InMemoryEventStore {
    fn record_run(&self, report: &AnchorRunReport) -> AttestResult<()> {
        self.runs.lock().push(report.clone());
        Ok(())
    }
}

// ── Transaction ───────────────────────────────────────────────────────────────

/// An open transaction holding one project's lock.
pub struct InMemoryTransaction {
    project_id: ProjectId,
    /// `None` when the project does not exist.
    guard: Option<LedgerGuard>,
    head: Option<ChainHead>,
    staged: Option<AuditEvent>,
}

impl InMemoryTransaction {
    fn conflict(&self, reason: String) -> AttestError {
        AttestError::TransactionConflict {
            project_id: self.project_id.to_string(),
            reason,
        }
    }
}

impl ProjectTransaction for InMemoryTransaction {
    fn project_id(&self) -> &ProjectId {
        &self.project_id
    }

    fn head(&self) -> Option<&ChainHead> {
        self.head.as_ref()
    }

    fn is_tombstoned(&self) -> bool {
        self.guard.as_ref().map(|g| g.tombstoned).unwrap_or(false)
    }

    fn insert_event_and_advance_head(&mut self, event: AuditEvent) -> AttestResult<()> {
        let head = self.head.as_ref().ok_or_else(|| AttestError::UnknownProject {
            project_id: self.project_id.to_string(),
        })?;

        if self.staged.is_some() {
            return Err(self.conflict("an event is already staged in this transaction".into()));
        }
        if event.project_id != self.project_id {
            return Err(self.conflict(format!(
                "event belongs to project '{}'",
                event.project_id
            )));
        }
        if event.sequence != head.last_sequence + 1 {
            return Err(self.conflict(format!(
                "expected sequence {}, got {}",
                head.last_sequence + 1,
                event.sequence
            )));
        }
        if event.prev_chain_hash != head.last_chain_hash {
            return Err(self.conflict(format!(
                "event links to {} but head is {}",
                event.prev_chain_hash, head.last_chain_hash
            )));
        }

        self.staged = Some(event);
        Ok(())
    }

    fn commit(self: Box<Self>) -> AttestResult<()> {
        let InMemoryTransaction {
            project_id,
            guard,
            staged,
            ..
        } = *self;

        let (Some(mut guard), Some(event)) = (guard, staged) else {
            return Ok(());
        };

        guard.head = ChainHead {
            project_id,
            last_sequence: event.sequence,
            last_chain_hash: event.chain_hash.clone(),
        };
        guard.events.push(event);
        Ok(())
    }

    fn rollback(self: Box<Self>) {
        debug!(project_id = %self.project_id, "transaction rolled back");
    }
}
