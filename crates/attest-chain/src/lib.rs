//! # attest-chain
//!
//! Canonical encoding, SHA-256 hash chaining, and chain verification for the
//! attest audit log.
//!
//! ## Overview
//!
//! Every event's `payload_hash` commits to its canonically encoded payload,
//! and its `chain_hash` commits to that payload hash plus the previous
//! event's `chain_hash`. Editing any stored payload or hash breaks the chain
//! at that sequence, which `verify_chain` reports.
//!
//! Nothing in this crate performs I/O.
//!
//! ## Usage
//!
//! ```rust,ignore
//! use attest_chain::{append_event, verify_chain};
//! use attest_contracts::GENESIS_CHAIN_HASH;
//!
//! let first = append_event(&project_id, GENESIS_CHAIN_HASH, 1, &payload)?;
//! let second = append_event(&project_id, &first.chain_hash, 2, &payload)?;
//! verify_chain(&[first, second])?;
//! ```

pub mod builder;
pub mod canonical;
pub mod hash;
pub mod schema;
pub mod verify;

pub use builder::append_event;
pub use canonical::canonicalize;
pub use hash::{Hasher, CURRENT_ALGORITHM};
pub use schema::{ensure_conforms, payload_schema, validate_payload};
pub use verify::verify_chain;

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use proptest::prelude::*;
    use serde_json::{json, Map, Value};
    use sha2::{Digest, Sha256};

    use attest_contracts::{
        AttestError, AuditEvent, AuditPayload, ChainBreakKind, ChainIntegrityError, EntityRef,
        ProjectId, GENESIS_CHAIN_HASH,
    };

    use super::*;

    // ── Helpers ───────────────────────────────────────────────────────────────

    fn payload(action: &str, actor: &str) -> AuditPayload {
        AuditPayload::new(
            action,
            EntityRef::new("user", actor),
            EntityRef::new("app", "web"),
        )
    }

    /// Build a valid chain from genesis, one event per payload.
    fn build_chain(payloads: &[AuditPayload]) -> Vec<AuditEvent> {
        let project = ProjectId::from("proj-test");
        let mut prev = GENESIS_CHAIN_HASH.to_string();
        let mut events = Vec::new();
        for (i, p) in payloads.iter().enumerate() {
            let event = append_event(&project, &prev, i as u64 + 1, p).unwrap();
            prev = event.chain_hash.clone();
            events.push(event);
        }
        events
    }

    fn sha256_hex(s: &str) -> String {
        hex::encode(Sha256::digest(s.as_bytes()))
    }

    // ── Canonicalizer ─────────────────────────────────────────────────────────

    #[test]
    fn canonical_sorts_keys_at_every_depth() {
        let value = json!({
            "b": 1,
            "a": { "z": true, "m": null, "a": [3, 1, 2] }
        });
        assert_eq!(
            canonicalize(&value),
            r#"{"a":{"a":[3,1,2],"m":null,"z":true},"b":1}"#
        );
    }

    #[test]
    fn canonical_preserves_array_order() {
        assert_ne!(canonicalize(&json!([1, 2])), canonicalize(&json!([2, 1])));
    }

    #[test]
    fn canonical_escapes_strings_like_json() {
        let value = json!("quote\" slash\\ nl\n ctl\u{1}");
        assert_eq!(
            canonicalize(&value),
            "\"quote\\\" slash\\\\ nl\\n ctl\\u0001\""
        );
        let round: Value = serde_json::from_str(&canonicalize(&value)).unwrap();
        assert_eq!(round, value);
    }

    #[test]
    fn canonical_is_independent_of_transport_formatting() {
        let compact: Value =
            serde_json::from_str(r#"{"actor":{"id":"alice","type":"user"},"action":"login"}"#)
                .unwrap();
        let pretty: Value = serde_json::from_str(
            "{\n  \"action\" : \"login\",\n  \"actor\" : { \"type\": \"user\", \"id\": \"alice\" }\n}",
        )
        .unwrap();
        assert_eq!(canonicalize(&compact), canonicalize(&pretty));
    }

    #[test]
    fn canonical_reorders_source_document_keys() {
        // Parsed with `preserve_order`, so the map iterates in source order.
        let value: Value = serde_json::from_str(
            r#"{"resource":{"type":"app","id":"web"},"metadata":{"z":1,"b":[{"y":2,"x":1}]},"action":"login"}"#,
        )
        .unwrap();
        let source_order: Vec<&str> = value
            .as_object()
            .unwrap()
            .keys()
            .map(String::as_str)
            .collect();
        assert_eq!(source_order, ["resource", "metadata", "action"]);

        assert_eq!(
            canonicalize(&value),
            r#"{"action":"login","metadata":{"b":[{"x":1,"y":2}],"z":1},"resource":{"id":"web","type":"app"}}"#
        );
    }

    fn json_leaf() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(|n| json!(n)),
            "[a-z0-9 \"\\\\]{0,8}".prop_map(Value::String),
        ]
    }

    fn json_value() -> impl Strategy<Value = Value> {
        json_leaf().prop_recursive(4, 32, 6, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..6).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,4}", inner, 0..6)
                    .prop_map(|m| Value::Object(m.into_iter().collect())),
            ]
        })
    }

    proptest! {
        #[test]
        fn canonical_ignores_key_insertion_order(
            entries in prop::collection::btree_map("[a-z]{1,6}", json_value(), 0..8)
        ) {
            let forward: Map<String, Value> = entries.clone().into_iter().collect();
            let reversed: Map<String, Value> = entries.into_iter().rev().collect();
            prop_assert_eq!(
                canonicalize(&Value::Object(forward)),
                canonicalize(&Value::Object(reversed))
            );
        }

        #[test]
        fn canonical_distinguishes_content(a in json_value(), b in json_value()) {
            prop_assert_eq!(a == b, canonicalize(&a) == canonicalize(&b));
        }

        #[test]
        fn fresh_chain_always_verifies(actions in prop::collection::vec("[a-z_]{1,12}", 0..20)) {
            let payloads: Vec<AuditPayload> =
                actions.iter().map(|a| payload(a, "alice")).collect();
            let events = build_chain(&payloads);
            prop_assert!(verify_chain(&events).is_ok());
        }
    }

    // ── Hasher ────────────────────────────────────────────────────────────────

    #[test]
    fn hasher_is_tagged_sha256_v1() {
        let hasher = Hasher::current();
        assert_eq!(hasher.algorithm().as_str(), "sha256-v1");
        assert_eq!(
            hasher.hash(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn chain_hash_is_hash_of_concatenation() {
        let hasher = Hasher::current();
        assert_eq!(
            hasher.chain_hash("aa", "GENESIS"),
            sha256_hex("aaGENESIS")
        );
    }

    // ── Schema ────────────────────────────────────────────────────────────────

    #[test]
    fn valid_payload_decodes() {
        let decoded = validate_payload(&json!({
            "action": "login",
            "actor": { "type": "user", "id": "alice" },
            "resource": { "type": "app", "id": "web" },
            "metadata": { "ip": "10.0.0.1", "attempts": 2 }
        }))
        .unwrap();

        assert_eq!(decoded.action, "login");
        assert_eq!(decoded.actor.kind, "user");
        assert_eq!(decoded.metadata.unwrap()["attempts"], 2);
    }

    #[test]
    fn payload_validator_is_compiled_once() {
        let first = schema::payload_validator().unwrap();
        let second = schema::payload_validator().unwrap();
        assert!(std::ptr::eq(first, second));

        let handles: Vec<_> = (0..4)
            .map(|_| std::thread::spawn(|| schema::payload_validator().unwrap() as *const _ as usize))
            .collect();
        for handle in handles {
            assert_eq!(handle.join().unwrap(), first as *const _ as usize);
        }
    }

    #[test]
    fn empty_action_is_a_schema_violation() {
        let err = validate_payload(&json!({
            "action": "",
            "actor": { "type": "user", "id": "alice" },
            "resource": { "type": "app", "id": "web" }
        }))
        .unwrap_err();
        assert!(matches!(err, AttestError::SchemaViolation { .. }));
    }

    #[test]
    fn missing_actor_and_unknown_field_are_both_reported() {
        let err = validate_payload(&json!({
            "action": "grant_admin",
            "resource": { "type": "app", "id": "web" },
            "extra": 1
        }))
        .unwrap_err();

        match err {
            AttestError::SchemaViolation { reason } => {
                assert!(reason.contains("actor"), "reason was: {reason}");
                assert!(reason.contains("extra"), "reason was: {reason}");
            }
            other => panic!("expected SchemaViolation, got {other:?}"),
        }
    }

    #[test]
    fn metadata_must_be_a_map() {
        assert!(validate_payload(&json!({
            "action": "login",
            "actor": { "type": "user", "id": "alice" },
            "resource": { "type": "app", "id": "web" },
            "metadata": [1, 2]
        }))
        .is_err());
    }

    // ── Builder ───────────────────────────────────────────────────────────────

    #[test]
    fn genesis_chain_hash_matches_definition() {
        let p = payload("login", "alice");
        let event = append_event(&ProjectId::from("p1"), GENESIS_CHAIN_HASH, 1, &p).unwrap();

        let expected_payload_hash = sha256_hex(&canonicalize(&p.to_document()));
        assert_eq!(event.payload_hash, expected_payload_hash);
        assert_eq!(event.prev_chain_hash, "GENESIS");
        assert_eq!(
            event.chain_hash,
            sha256_hex(&format!("{expected_payload_hash}GENESIS"))
        );
    }

    #[test]
    fn builder_rejects_invalid_payload_before_hashing() {
        let bad = AuditPayload::new("", EntityRef::new("user", "a"), EntityRef::new("app", "b"));
        let err = append_event(&ProjectId::from("p1"), GENESIS_CHAIN_HASH, 1, &bad).unwrap_err();
        assert!(matches!(err, AttestError::SchemaViolation { .. }));
    }

    #[test]
    fn metadata_key_order_does_not_change_hash() {
        let a = payload("login", "alice")
            .with_metadata("x", json!(1))
            .with_metadata("y", json!({ "q": 1, "p": 2 }));
        let b = payload("login", "alice")
            .with_metadata("y", json!({ "p": 2, "q": 1 }))
            .with_metadata("x", json!(1));

        let project = ProjectId::from("p1");
        let ea = append_event(&project, GENESIS_CHAIN_HASH, 1, &a).unwrap();
        let eb = append_event(&project, GENESIS_CHAIN_HASH, 1, &b).unwrap();
        assert_eq!(ea.chain_hash, eb.chain_hash);
    }

    // ── Verifier ──────────────────────────────────────────────────────────────

    #[test]
    fn empty_chain_is_valid() {
        assert!(verify_chain(&[]).is_ok());
    }

    #[test]
    fn payload_tamper_reports_exact_sequence() {
        let payloads: Vec<_> = (0..5).map(|i| payload("read", &format!("u{i}"))).collect();
        for k in 1..=5u64 {
            let mut events = build_chain(&payloads);
            events[(k - 1) as usize].payload = json!({ "action": "grant_admin" });

            assert_eq!(
                verify_chain(&events),
                Err(ChainIntegrityError::PayloadHashMismatch { sequence: k })
            );
        }
    }

    #[test]
    fn rehashed_payload_without_chain_update_is_a_chain_break() {
        let mut events = build_chain(&[payload("a", "u1"), payload("b", "u2"), payload("c", "u3")]);
        let forged = json!({
            "action": "grant_admin",
            "actor": { "type": "user", "id": "u2" },
            "resource": { "type": "app", "id": "web" }
        });
        events[1].payload_hash = Hasher::current().payload_hash(&forged);
        events[1].payload = forged;

        assert_eq!(
            verify_chain(&events),
            Err(ChainIntegrityError::ChainBreak {
                sequence: 2,
                kind: ChainBreakKind::ChainHashMismatch
            })
        );
    }

    #[test]
    fn relinked_prev_hash_is_detected() {
        let mut events = build_chain(&[payload("a", "u1"), payload("b", "u2"), payload("c", "u3")]);
        events[2].prev_chain_hash = events[0].chain_hash.clone();

        assert_eq!(
            verify_chain(&events),
            Err(ChainIntegrityError::ChainBreak {
                sequence: 3,
                kind: ChainBreakKind::PrevHashMismatch
            })
        );
    }

    #[test]
    fn deleted_middle_event_is_a_discontinuity() {
        let mut events = build_chain(&[payload("a", "u1"), payload("b", "u2"), payload("c", "u3")]);
        events.remove(1);

        assert_eq!(
            verify_chain(&events),
            Err(ChainIntegrityError::ChainBreak {
                sequence: 3,
                kind: ChainBreakKind::SequenceDiscontinuity
            })
        );
    }

    #[test]
    fn first_event_must_link_to_genesis() {
        let project = ProjectId::from("p1");
        let event = append_event(&project, "not-genesis", 1, &payload("a", "u1")).unwrap();

        assert_eq!(
            verify_chain(&[event]),
            Err(ChainIntegrityError::ChainBreak {
                sequence: 1,
                kind: ChainBreakKind::GenesisMismatch
            })
        );
    }

    #[test]
    fn deleted_prefix_is_a_discontinuity() {
        let events = build_chain(&[
            payload("a", "u1"),
            payload("b", "u2"),
            payload("c", "u3"),
            payload("d", "u4"),
        ]);

        assert_eq!(
            verify_chain(&events[2..]),
            Err(ChainIntegrityError::ChainBreak {
                sequence: 3,
                kind: ChainBreakKind::SequenceDiscontinuity
            })
        );
    }

    #[test]
    fn lone_event_past_genesis_is_a_discontinuity() {
        let events = build_chain(&[payload("a", "u1"), payload("b", "u2")]);

        let err = verify_chain(&events[1..]).unwrap_err();
        assert_eq!(err.sequence(), 2);
    }

    #[test]
    fn verification_stops_at_first_failure() {
        let mut events = build_chain(&[payload("a", "u1"), payload("b", "u2"), payload("c", "u3")]);
        events[1].payload = json!({ "action": "x" });
        events[2].chain_hash = "garbage".to_string();

        let err = verify_chain(&events).unwrap_err();
        assert_eq!(err.sequence(), 2);
    }
}
