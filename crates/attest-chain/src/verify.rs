//! Chain verification: re-derive every stored hash and compare.
//!
//! Rules, checked per event in sequence order:
//!
//! 1. **Payload**: `payload_hash` equals `H(canonicalize(payload))`.
//! 2. **Continuity**: sequence is exactly one past the previous event's.
//! 3. **Linkage**: `prev_chain_hash` equals the previous event's `chain_hash`
//!    (or `GENESIS` when the event is sequence 1).
//! 4. **Chain hash**: `chain_hash` equals `H(payload_hash ++ prev_chain_hash)`.
//!
//! History must start at sequence 1: a slice whose first event is anything
//! else is missing its prefix and fails continuity. The first failure is
//! returned and nothing after it is examined.

use attest_contracts::{AuditEvent, ChainBreakKind, ChainIntegrityError, GENESIS_CHAIN_HASH};

use crate::hash::Hasher;

/// Verify `events`, which must be ordered by sequence.
///
/// An empty slice is valid.
pub fn verify_chain(events: &[AuditEvent]) -> Result<(), ChainIntegrityError> {
    let mut previous: Option<&AuditEvent> = None;

    for event in events {
        let sequence = event.sequence;
        let hasher = Hasher::new(event.hash_algorithm);

        if event.payload_hash != hasher.payload_hash(&event.payload) {
            return Err(ChainIntegrityError::PayloadHashMismatch { sequence });
        }

        match previous {
            Some(prev) => {
                if sequence != prev.sequence + 1 {
                    return Err(ChainIntegrityError::ChainBreak {
                        sequence,
                        kind: ChainBreakKind::SequenceDiscontinuity,
                    });
                }
                if event.prev_chain_hash != prev.chain_hash {
                    return Err(ChainIntegrityError::ChainBreak {
                        sequence,
                        kind: ChainBreakKind::PrevHashMismatch,
                    });
                }
            }
            None if sequence != 1 => {
                return Err(ChainIntegrityError::ChainBreak {
                    sequence,
                    kind: ChainBreakKind::SequenceDiscontinuity,
                });
            }
            None if event.prev_chain_hash != GENESIS_CHAIN_HASH => {
                return Err(ChainIntegrityError::ChainBreak {
                    sequence,
                    kind: ChainBreakKind::GenesisMismatch,
                });
            }
            None => {}
        }

        let expected = hasher.chain_hash(&event.payload_hash, &event.prev_chain_hash);
        if event.chain_hash != expected {
            return Err(ChainIntegrityError::ChainBreak {
                sequence,
                kind: ChainBreakKind::ChainHashMismatch,
            });
        }

        previous = Some(event);
    }

    Ok(())
}
