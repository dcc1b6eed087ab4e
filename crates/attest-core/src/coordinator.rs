//! The append coordinator: the only path that creates audit events.
//!
//! Each append is one read-modify-write against a single project:
//!
//!   Validate → Begin → Read head → Build event → Insert + advance head → Commit
//!
//! Validation and project lookup both fail before anything is staged, so a
//! rejected append never leaves partial state behind. The event is returned
//! only after the commit succeeds.

use std::sync::Arc;

use serde_json::Value;
use tracing::{debug, info, warn};

use attest_chain::{append_event, ensure_conforms, validate_payload};
use attest_contracts::{AttestError, AttestResult, AuditEvent, AuditPayload, ProjectId};

use crate::traits::{EventStore, ProjectTransaction};

/// Serializes appends per project on top of an `EventStore`.
///
/// The coordinator holds no locks of its own: per-project isolation comes
/// from `EventStore::begin`, so appends to different projects proceed in
/// parallel.
pub struct AppendCoordinator {
    store: Arc<dyn EventStore>,
}

impl AppendCoordinator {
    pub fn new(store: Arc<dyn EventStore>) -> Self {
        Self { store }
    }

    /// Append `payload` to `project_id`'s chain.
    ///
    /// # Errors
    ///
    /// - `SchemaViolation` if the payload is invalid (nothing is opened)
    /// - `UnknownProject` if the project has no chain head
    /// - `ProjectTombstoned` if the project was closed
    /// - `TransactionConflict` / `Storage` from the store; the transaction is
    ///   rolled back and no event becomes visible
    pub fn append_event_persistent(
        &self,
        project_id: &ProjectId,
        payload: &AuditPayload,
    ) -> AttestResult<AuditEvent> {
        ensure_conforms(&payload.to_document())?;
        self.append_validated(project_id, payload)
    }

    /// Validate an untyped JSON payload, then append it.
    pub fn append_document(
        &self,
        project_id: &ProjectId,
        document: &Value,
    ) -> AttestResult<AuditEvent> {
        let payload = validate_payload(document)?;
        self.append_validated(project_id, &payload)
    }

    /// Append a payload that has already passed the schema check.
    fn append_validated(
        &self,
        project_id: &ProjectId,
        payload: &AuditPayload,
    ) -> AttestResult<AuditEvent> {
        let mut tx = self.store.begin(project_id)?;

        let event = match stage_append(&mut *tx, payload) {
            Ok(event) => event,
            Err(e) => {
                warn!(project_id = %project_id, error = %e, "append rejected, rolling back");
                tx.rollback();
                return Err(e);
            }
        };

        tx.commit()?;

        info!(
            project_id = %project_id,
            sequence = event.sequence,
            chain_hash = %event.chain_hash,
            "audit event appended"
        );

        Ok(event)
    }
}

/// Read the head, build the next event, and stage it. Does not commit.
fn stage_append(
    tx: &mut dyn ProjectTransaction,
    payload: &AuditPayload,
) -> AttestResult<AuditEvent> {
    let project_id = tx.project_id().clone();

    let head = tx
        .head()
        .cloned()
        .ok_or_else(|| AttestError::UnknownProject {
            project_id: project_id.to_string(),
        })?;

    if tx.is_tombstoned() {
        return Err(AttestError::ProjectTombstoned {
            project_id: project_id.to_string(),
        });
    }

    let sequence = head.last_sequence + 1;
    debug!(
        project_id = %project_id,
        sequence,
        prev_chain_hash = %head.last_chain_hash,
        "building next event"
    );

    let event = append_event(&project_id, &head.last_chain_hash, sequence, payload)?;
    tx.insert_event_and_advance_head(event.clone())?;
    Ok(event)
}
