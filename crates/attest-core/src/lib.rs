//! # attest-core
//!
//! Collaborator contracts and the append coordinator for the attest audit log.
//!
//! This crate provides:
//! - The collaborator traits (`EventStore`, `ProjectTransaction`,
//!   `HeadSource`, `AnchorRunLog`, `AdminApi`, `AnchorRepository`)
//! - The `AppendCoordinator`, which wraps the chain builder in one atomic
//!   per-project transaction
//!
//! ## Usage
//!
//! ```rust,ignore
//! use attest_core::AppendCoordinator;
//!
//! let coordinator = AppendCoordinator::new(store);
//! let event = coordinator.append_event_persistent(&project_id, &payload)?;
//! ```

pub mod coordinator;
pub mod traits;

pub use coordinator::AppendCoordinator;
pub use traits::{
    AdminApi, AnchorRepository, AnchorRunLog, EventStore, HeadSource, ProjectTransaction,
};

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use std::collections::HashMap;
    use std::sync::{Arc, Mutex};

    use serde_json::json;

    use attest_chain::verify_chain;
    use attest_contracts::{
        AttestError, AttestResult, AuditEvent, AuditPayload, ChainHead, EntityRef, ProjectId,
    };

    use super::{AppendCoordinator, EventStore, ProjectTransaction};

    // ── Mock store ────────────────────────────────────────────────────────────

    #[derive(Default)]
    struct Ledger {
        head: Option<ChainHead>,
        tombstoned: bool,
        events: Vec<AuditEvent>,
    }

    /// A single-lock store. Good enough to exercise the coordinator's
    /// control flow; the real per-project store lives in attest-store.
    #[derive(Default)]
    struct MockStore {
        ledgers: Arc<Mutex<HashMap<ProjectId, Ledger>>>,
        fail_commit: bool,
        begun: Arc<Mutex<u32>>,
    }

    impl MockStore {
        fn with_project(id: &str) -> Self {
            let store = Self::default();
            store.ledgers.lock().unwrap().insert(
                ProjectId::from(id),
                Ledger {
                    head: Some(ChainHead::genesis(ProjectId::from(id))),
                    ..Ledger::default()
                },
            );
            store
        }

        fn events(&self, id: &str) -> Vec<AuditEvent> {
            self.ledgers
                .lock()
                .unwrap()
                .get(&ProjectId::from(id))
                .map(|l| l.events.clone())
                .unwrap_or_default()
        }

        fn head(&self, id: &str) -> Option<ChainHead> {
            self.ledgers
                .lock()
                .unwrap()
                .get(&ProjectId::from(id))
                .and_then(|l| l.head.clone())
        }
    }

    struct MockTx {
        project_id: ProjectId,
        head: Option<ChainHead>,
        tombstoned: bool,
        staged: Option<AuditEvent>,
        ledgers: Arc<Mutex<HashMap<ProjectId, Ledger>>>,
        fail_commit: bool,
    }

    impl EventStore for MockStore {
        fn begin(&self, project_id: &ProjectId) -> AttestResult<Box<dyn ProjectTransaction>> {
            *self.begun.lock().unwrap() += 1;
            let ledgers = self.ledgers.lock().unwrap();
            let ledger = ledgers.get(project_id);
            Ok(Box::new(MockTx {
                project_id: project_id.clone(),
                head: ledger.and_then(|l| l.head.clone()),
                tombstoned: ledger.map(|l| l.tombstoned).unwrap_or(false),
                staged: None,
                ledgers: Arc::clone(&self.ledgers),
                fail_commit: self.fail_commit,
            }))
        }

        fn load_events(&self, project_id: &ProjectId) -> AttestResult<Vec<AuditEvent>> {
            Ok(self.events(project_id.as_str()))
        }
    }

    impl ProjectTransaction for MockTx {
        fn project_id(&self) -> &ProjectId {
            &self.project_id
        }

        fn head(&self) -> Option<&ChainHead> {
            self.head.as_ref()
        }

        fn is_tombstoned(&self) -> bool {
            self.tombstoned
        }

        fn insert_event_and_advance_head(&mut self, event: AuditEvent) -> AttestResult<()> {
            self.staged = Some(event);
            Ok(())
        }

        fn commit(self: Box<Self>) -> AttestResult<()> {
            if self.fail_commit {
                return Err(AttestError::Storage {
                    reason: "disk full".to_string(),
                });
            }
            let mut ledgers = self.ledgers.lock().unwrap();
            let ledger = ledgers.get_mut(&self.project_id).unwrap();
            if let Some(event) = self.staged {
                ledger.head = Some(ChainHead {
                    project_id: self.project_id.clone(),
                    last_sequence: event.sequence,
                    last_chain_hash: event.chain_hash.clone(),
                });
                ledger.events.push(event);
            }
            Ok(())
        }

        fn rollback(self: Box<Self>) {}
    }

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn login(actor: &str) -> AuditPayload {
        AuditPayload::new(
            "login",
            EntityRef::new("user", actor),
            EntityRef::new("app", "web"),
        )
    }

    // ── Tests ─────────────────────────────────────────────────────────────────

    #[test]
    fn appends_advance_head_and_chain() {
        let store = Arc::new(MockStore::with_project("p1"));
        let coordinator = AppendCoordinator::new(store.clone());
        let project = ProjectId::from("p1");

        let first = coordinator.append_event_persistent(&project, &login("alice")).unwrap();
        let second = coordinator.append_event_persistent(&project, &login("bob")).unwrap();

        assert_eq!(first.sequence, 1);
        assert_eq!(first.prev_chain_hash, "GENESIS");
        assert_eq!(second.sequence, 2);
        assert_eq!(second.prev_chain_hash, first.chain_hash);

        let head = store.head("p1").unwrap();
        assert_eq!(head.last_sequence, 2);
        assert_eq!(head.last_chain_hash, second.chain_hash);
        assert!(verify_chain(&store.events("p1")).is_ok());
    }

    #[test]
    fn unknown_project_is_rejected_without_writes() {
        let store = Arc::new(MockStore::with_project("p1"));
        let coordinator = AppendCoordinator::new(store.clone());

        let err = coordinator
            .append_event_persistent(&ProjectId::from("ghost"), &login("alice"))
            .unwrap_err();

        assert_eq!(
            err,
            AttestError::UnknownProject {
                project_id: "ghost".to_string()
            }
        );
        assert!(store.events("ghost").is_empty());
    }

    #[test]
    fn schema_violation_never_opens_a_transaction() {
        let store = Arc::new(MockStore::with_project("p1"));
        let coordinator = AppendCoordinator::new(store.clone());
        let bad = AuditPayload::new("", EntityRef::new("user", "a"), EntityRef::new("app", "b"));

        let err = coordinator
            .append_event_persistent(&ProjectId::from("p1"), &bad)
            .unwrap_err();

        assert!(matches!(err, AttestError::SchemaViolation { .. }));
        assert_eq!(*store.begun.lock().unwrap(), 0);
        assert_eq!(store.head("p1").unwrap().last_sequence, 0);
    }

    #[test]
    fn tombstoned_project_rejects_appends() {
        let store = Arc::new(MockStore::with_project("p1"));
        store
            .ledgers
            .lock()
            .unwrap()
            .get_mut(&ProjectId::from("p1"))
            .unwrap()
            .tombstoned = true;
        let coordinator = AppendCoordinator::new(store.clone());

        let err = coordinator
            .append_event_persistent(&ProjectId::from("p1"), &login("alice"))
            .unwrap_err();

        assert!(matches!(err, AttestError::ProjectTombstoned { .. }));
        assert!(store.events("p1").is_empty());
    }

    #[test]
    fn failed_commit_leaves_no_partial_state() {
        let store = Arc::new(MockStore {
            fail_commit: true,
            ..MockStore::with_project("p1")
        });
        let coordinator = AppendCoordinator::new(store.clone());

        let err = coordinator
            .append_event_persistent(&ProjectId::from("p1"), &login("alice"))
            .unwrap_err();

        assert!(matches!(err, AttestError::Storage { .. }));
        assert!(store.events("p1").is_empty());
        assert_eq!(store.head("p1").unwrap().last_sequence, 0);
    }

    #[test]
    fn append_document_validates_untyped_json() {
        let store = Arc::new(MockStore::with_project("p1"));
        let coordinator = AppendCoordinator::new(store.clone());
        let project = ProjectId::from("p1");

        let event = coordinator
            .append_document(
                &project,
                &json!({
                    "action": "login",
                    "actor": { "type": "user", "id": "alice" },
                    "resource": { "type": "app", "id": "web" },
                    "metadata": { "ip": "10.0.0.1" }
                }),
            )
            .unwrap();
        assert_eq!(event.payload["metadata"]["ip"], "10.0.0.1");

        let err = coordinator
            .append_document(&project, &json!({ "action": "grant_admin" }))
            .unwrap_err();
        assert!(matches!(err, AttestError::SchemaViolation { .. }));
        assert_eq!(store.events("p1").len(), 1);
    }
}
