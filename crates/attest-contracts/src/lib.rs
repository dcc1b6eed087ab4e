//! # attest-contracts
//!
//! Shared types, wire formats, and error contracts for the attest
//! tamper-evident audit log.
//!
//! All crates in the workspace import from here. No business logic lives in
//! this crate, only data definitions and error types.

pub mod anchor;
pub mod error;
pub mod event;
pub mod project;
pub mod verify;

pub use anchor::{
    AnchorEntry, AnchorMode, AnchorPayload, AnchorRunReport, AnchorSnapshot, LegacyAnchor,
    RunStatus,
};
pub use error::{AttestError, AttestResult, ChainBreakKind, ChainIntegrityError, ErrorLayer};
pub use event::{AuditEvent, AuditPayload, EntityRef, HashAlgorithm, GENESIS_CHAIN_HASH};
pub use project::{ChainHead, ProjectId, ProjectSummary};
pub use verify::{Severity, VerificationOutcome, VerificationReport};

#[cfg(test)]
mod tests {
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    use super::*;

    // ── Payload document ─────────────────────────────────────────────────────

    #[test]
    fn payload_document_uses_type_key_and_omits_absent_metadata() {
        let payload = AuditPayload::new(
            "login",
            EntityRef::new("user", "alice"),
            EntityRef::new("app", "web"),
        );

        assert_eq!(
            payload.to_document(),
            json!({
                "action": "login",
                "actor": { "type": "user", "id": "alice" },
                "resource": { "type": "app", "id": "web" }
            })
        );
    }

    #[test]
    fn payload_document_matches_serde_form() {
        let payload = AuditPayload::new(
            "export",
            EntityRef::new("service", "billing"),
            EntityRef::new("report", "q3"),
        )
        .with_metadata("rows", json!(1200))
        .with_metadata("format", json!("csv"));

        let via_serde = serde_json::to_value(&payload).unwrap();
        assert_eq!(payload.to_document(), via_serde);
    }

    // ── HashAlgorithm ────────────────────────────────────────────────────────

    #[test]
    fn hash_algorithm_serializes_as_tag() {
        let json = serde_json::to_string(&HashAlgorithm::Sha256V1).unwrap();
        assert_eq!(json, "\"sha256-v1\"");
    }

    #[test]
    fn unknown_hash_algorithm_is_rejected() {
        let err = HashAlgorithm::parse("blake3-v1").unwrap_err();
        assert_eq!(
            err,
            AttestError::UnsupportedHashAlgorithm {
                tag: "blake3-v1".to_string()
            }
        );
        assert!(serde_json::from_str::<HashAlgorithm>("\"sha512-v9\"").is_err());
    }

    #[test]
    fn event_without_algorithm_tag_defaults_to_sha256_v1() {
        let event: AuditEvent = serde_json::from_value(json!({
            "projectId": "p1",
            "sequence": 1,
            "payload": { "action": "login" },
            "payloadHash": "aa",
            "prevChainHash": "GENESIS",
            "chainHash": "bb",
            "createdAt": 1_700_000_000_000_i64
        }))
        .unwrap();

        assert_eq!(event.hash_algorithm, HashAlgorithm::Sha256V1);
        assert_eq!(event.created_at.timestamp_millis(), 1_700_000_000_000);
    }

    // ── Anchor wire format ───────────────────────────────────────────────────

    #[test]
    fn snapshot_serializes_null_commits_and_camel_case() {
        let snapshot = AnchorSnapshot {
            mode: AnchorMode::Prod,
            timestamp: Utc.with_ymd_and_hms(2026, 3, 1, 14, 5, 0).unwrap(),
            hash_algorithm: Some(HashAlgorithm::Sha256V1),
            anchors: vec![AnchorEntry {
                project_id: ProjectId::from("p1"),
                last_sequence: 7,
                last_chain_hash: "abc".to_string(),
            }],
            previous_anchor_commit: None,
            anchor_commit: None,
        };

        let value = serde_json::to_value(&snapshot).unwrap();
        assert_eq!(value["mode"], "prod");
        assert_eq!(value["hashAlgorithm"], "sha256-v1");
        assert!(value["previousAnchorCommit"].is_null());
        assert!(value["anchorCommit"].is_null());
        assert_eq!(value["anchors"][0]["projectId"], "p1");
        assert_eq!(value["anchors"][0]["lastSequence"], 7);
    }

    #[test]
    fn dev_snapshot_without_commit_fields_decodes() {
        let snapshot: AnchorSnapshot = serde_json::from_value(json!({
            "mode": "dev",
            "timestamp": "2026-03-01T14:05:00.000Z",
            "anchors": [{ "projectId": "p1", "lastSequence": 0, "lastChainHash": "GENESIS" }]
        }))
        .unwrap();

        assert_eq!(snapshot.mode, AnchorMode::Dev);
        assert_eq!(snapshot.previous_anchor_commit, None);
        assert_eq!(snapshot.hash_algorithm, None);
        assert!(snapshot.entry(&ProjectId::from("p1")).is_some());
        assert!(snapshot.entry(&ProjectId::from("p2")).is_none());
    }

    #[test]
    fn genesis_head_links_to_sentinel() {
        let head = ChainHead::genesis(ProjectId::from("p1"));
        assert_eq!(head.last_sequence, 0);
        assert_eq!(head.last_chain_hash, "GENESIS");
    }

    #[test]
    fn project_summary_accepts_id_alias() {
        let summary: ProjectSummary =
            serde_json::from_value(json!({ "id": "p9", "name": "payments" })).unwrap();
        assert_eq!(summary.project_id, ProjectId::from("p9"));
        assert!(!summary.tombstoned);
    }

    // ── AnchorRunReport ──────────────────────────────────────────────────────

    #[test]
    fn run_report_transitions() {
        let running = AnchorRunReport::start(AnchorMode::Prod);
        assert_eq!(running.status, RunStatus::Running);
        assert!(running.finished_at.is_none());

        let ok = running.clone().succeed(3);
        assert!(ok.is_success());
        assert_eq!(ok.project_count, Some(3));

        let failed = running.fail("git push rejected");
        assert_eq!(failed.status, RunStatus::Failed);
        assert_eq!(failed.error.as_deref(), Some("git push rejected"));
        assert!(failed.finished_at.is_some());
    }

    // ── Error display and layering ───────────────────────────────────────────

    #[test]
    fn truncation_display_distinguishes_empty_history() {
        let empty = AttestError::AnchorTruncation {
            anchored_sequence: 5,
            history_end: None,
        };
        assert!(empty.to_string().contains("history is empty"));

        let short = AttestError::AnchorTruncation {
            anchored_sequence: 5,
            history_end: Some(3),
        };
        let msg = short.to_string();
        assert!(msg.contains("ends at sequence 3"));
        assert!(msg.contains("requires 5"));
    }

    #[test]
    fn chain_integrity_display_names_sequence() {
        let err: AttestError = ChainIntegrityError::ChainBreak {
            sequence: 4,
            kind: ChainBreakKind::PrevHashMismatch,
        }
        .into();
        let msg = err.to_string();
        assert!(msg.contains("sequence 4"));
        assert!(msg.contains("previous chain hash"));
    }

    #[test]
    fn errors_are_layered_by_trust_domain() {
        assert_eq!(
            AttestError::SchemaViolation { reason: "x".into() }.layer(),
            ErrorLayer::Input
        );
        assert_eq!(
            AttestError::from(ChainIntegrityError::PayloadHashMismatch { sequence: 1 }).layer(),
            ErrorLayer::LocalChain
        );
        assert_eq!(
            AttestError::AnchorChainMismatch {
                sequence: 1,
                anchored_hash: "a".into(),
                history_hash: "b".into(),
            }
            .layer(),
            ErrorLayer::Anchor
        );
        assert_eq!(
            AttestError::Timeout {
                operation: "GET /projects".into(),
                timeout_secs: 10,
            }
            .layer(),
            ErrorLayer::Infrastructure
        );
    }

    // ── Verification outcome ─────────────────────────────────────────────────

    #[test]
    fn outcome_pass_fail_mapping() {
        assert!(VerificationOutcome::ChainOk.passed());
        assert!(VerificationOutcome::NoAnchorFound {
            reason: "none".into()
        }
        .passed());
        assert!(!VerificationOutcome::ChainBroken(ChainIntegrityError::PayloadHashMismatch {
            sequence: 1
        })
        .passed());

        let divergence = VerificationOutcome::AnchorFailed(AttestError::AnchorSequenceGap {
            sequence: 9,
        });
        assert!(!divergence.passed());
        assert!(divergence.severity() > Severity::LocalCorruption);
    }
}
