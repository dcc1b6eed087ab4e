//! The Anchor Verifier: cross-checks live history against the external record.
//!
//! `verify_chain` alone cannot catch an attacker who rewrites history and
//! recomputes every hash, because the rewritten chain is self-consistent.
//! The anchor pins a hash the attacker cannot reproduce. The lineage check
//! goes one level further and pins the anchor repository's own history.

use std::path::Path;

use tracing::{debug, warn};

use attest_contracts::{
    AnchorMode, AnchorPayload, AttestError, AttestResult, AuditEvent, GENESIS_CHAIN_HASH,
};
use attest_core::AnchorRepository;

use crate::reader::{latest_snapshot_file, read_snapshot};

/// Check that `events` still contain the anchored head.
///
/// `events` must be ordered by sequence. History past the anchored sequence
/// is legitimate growth and is not inspected.
pub fn verify_against_anchor(events: &[AuditEvent], anchor: &AnchorPayload) -> AttestResult<()> {
    let anchored = anchor.last_sequence;

    // Anchored before the first append: only the genesis sentinel can match.
    if anchored == 0 {
        if anchor.last_chain_hash != GENESIS_CHAIN_HASH {
            return Err(AttestError::AnchorChainMismatch {
                sequence: 0,
                anchored_hash: anchor.last_chain_hash.clone(),
                history_hash: GENESIS_CHAIN_HASH.to_string(),
            });
        }
        return Ok(());
    }

    let Some(last) = events.last() else {
        warn!(project_id = %anchor.project_id, anchored, "history is empty");
        return Err(AttestError::AnchorTruncation {
            anchored_sequence: anchored,
            history_end: None,
        });
    };

    if last.sequence < anchored {
        warn!(
            project_id = %anchor.project_id,
            anchored,
            history_end = last.sequence,
            "history ends before the anchor"
        );
        return Err(AttestError::AnchorTruncation {
            anchored_sequence: anchored,
            history_end: Some(last.sequence),
        });
    }

    let event = events
        .iter()
        .find(|e| e.sequence == anchored)
        .ok_or(AttestError::AnchorSequenceGap { sequence: anchored })?;

    if event.chain_hash != anchor.last_chain_hash {
        warn!(
            project_id = %anchor.project_id,
            sequence = anchored,
            "chain hash diverges from anchor"
        );
        return Err(AttestError::AnchorChainMismatch {
            sequence: anchored,
            anchored_hash: anchor.last_chain_hash.clone(),
            history_hash: event.chain_hash.clone(),
        });
    }

    debug!(project_id = %anchor.project_id, sequence = anchored, "history matches anchor");
    Ok(())
}

/// Check that the newest snapshot in `dir` descends from the commit it
/// declares as its predecessor.
///
/// Returns `Ok(true)` when the commit graph was checked, and `Ok(false)` when
/// there was nothing to link: no bucketed snapshot, a dev snapshot, or a
/// snapshot that declares no previous commit.
///
/// # Errors
///
/// `AnchorLineageBroken` when the snapshot file was never committed, the
/// declared previous commit does not exist, or it is not an ancestor of the
/// commit that introduced the snapshot.
pub fn verify_anchor_lineage(dir: &Path, repo: &dyn AnchorRepository) -> AttestResult<bool> {
    let Some(file) = latest_snapshot_file(dir)? else {
        return Ok(false);
    };
    let snapshot = read_snapshot(&dir.join(&file))?;

    if snapshot.mode == AnchorMode::Dev {
        debug!(file = %file, "dev snapshot, lineage not checked");
        return Ok(false);
    }
    let Some(previous) = snapshot.previous_anchor_commit else {
        debug!(file = %file, "first snapshot, lineage not checked");
        return Ok(false);
    };

    let broken = |reason: String| {
        warn!(file = %file, previous_commit = %previous, reason = %reason, "anchor lineage broken");
        AttestError::AnchorLineageBroken {
            file: file.clone(),
            previous_commit: previous.clone(),
            reason,
        }
    };

    let Some(introduced) = repo.introducing_commit(Path::new(&file))? else {
        return Err(broken("snapshot file was never committed".to_string()));
    };
    if !repo.contains_commit(&previous)? {
        return Err(broken(
            "previous anchor commit does not exist in the repository".to_string(),
        ));
    }
    if !repo.is_ancestor(&previous, &introduced)? {
        return Err(broken(format!(
            "previous anchor commit is not an ancestor of {}",
            introduced
        )));
    }

    debug!(file = %file, introduced = %introduced, previous = %previous, "anchor lineage intact");
    Ok(true)
}
