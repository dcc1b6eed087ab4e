//! Chain builder: derives one event from the previous chain state.

use chrono::Utc;

use attest_contracts::{AttestResult, AuditEvent, AuditPayload, ProjectId};

use crate::{hash::Hasher, schema::ensure_conforms};

/// Build the event at `sequence` that links to `prev_chain_hash`.
///
/// The payload is schema-checked first; a violation returns
/// `AttestError::SchemaViolation` before anything is hashed. Pure apart from
/// reading the clock for `created_at`, which is not part of any hash.
pub fn append_event(
    project_id: &ProjectId,
    prev_chain_hash: &str,
    sequence: u64,
    payload: &AuditPayload,
) -> AttestResult<AuditEvent> {
    let document = payload.to_document();
    ensure_conforms(&document)?;

    let hasher = Hasher::current();
    let payload_hash = hasher.payload_hash(&document);
    let chain_hash = hasher.chain_hash(&payload_hash, prev_chain_hash);

    Ok(AuditEvent {
        project_id: project_id.clone(),
        sequence,
        payload: document,
        payload_hash,
        prev_chain_hash: prev_chain_hash.to_string(),
        chain_hash,
        created_at: Utc::now(),
        hash_algorithm: hasher.algorithm(),
    })
}
