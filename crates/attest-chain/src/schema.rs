//! Audit payload schema validation.
//!
//! Payloads arrive as untyped JSON. They are checked against a JSON Schema
//! document with the `jsonschema` crate before they are decoded or hashed,
//! and every violation is reported in one `SchemaViolation` so a caller
//! sees the full failure set in one pass.
//!
//! `metadata` is the only open field. Unknown top-level or entity keys are
//! rejected: they would be silently dropped by the typed record and the
//! stored hash would not cover what the caller sent.

use std::sync::LazyLock;

use jsonschema::Validator;
use serde_json::{json, Value};
use tracing::debug;

use attest_contracts::{AttestError, AttestResult, AuditPayload};

/// The JSON Schema every audit payload must satisfy.
pub fn payload_schema() -> Value {
    let entity = json!({
        "type": "object",
        "required": ["type", "id"],
        "additionalProperties": false,
        "properties": {
            "type": { "type": "string" },
            "id": { "type": "string" }
        }
    });

    json!({
        "type": "object",
        "required": ["action", "actor", "resource"],
        "additionalProperties": false,
        "properties": {
            "action": { "type": "string", "minLength": 1 },
            "actor": entity,
            "resource": entity,
            "metadata": { "type": "object" }
        }
    })
}

/// Compiled once per process from `payload_schema()`.
static PAYLOAD_VALIDATOR: LazyLock<Result<Validator, String>> =
    LazyLock::new(|| jsonschema::validator_for(&payload_schema()).map_err(|e| e.to_string()));

/// The shared compiled validator.
pub(crate) fn payload_validator() -> AttestResult<&'static Validator> {
    PAYLOAD_VALIDATOR
        .as_ref()
        .map_err(|e| AttestError::SchemaViolation {
            reason: format!("invalid payload schema document: {e}"),
        })
}

/// Check `document` against the payload schema without decoding it.
///
/// Returns `AttestError::SchemaViolation` listing every violation.
pub fn ensure_conforms(document: &Value) -> AttestResult<()> {
    let validator = payload_validator()?;

    let violations: Vec<String> = validator
        .iter_errors(document)
        .map(|error| format!("at '{}': {}", error.instance_path, error))
        .collect();

    if violations.is_empty() {
        Ok(())
    } else {
        debug!(violation_count = violations.len(), "payload rejected by schema");
        Err(AttestError::SchemaViolation {
            reason: violations.join("; "),
        })
    }
}

/// Validate an untyped payload and decode it into an `AuditPayload`.
pub fn validate_payload(document: &Value) -> AttestResult<AuditPayload> {
    ensure_conforms(document)?;
    serde_json::from_value(document.clone()).map_err(|e| AttestError::SchemaViolation {
        reason: e.to_string(),
    })
}
