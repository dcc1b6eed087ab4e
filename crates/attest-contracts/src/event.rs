//! Audit payload and event types.
//!
//! `AuditPayload` is what callers submit. `AuditEvent` is the immutable,
//! hash-linked record the append path produces from it. Events carry the
//! payload as a JSON document rather than the typed record so that stored
//! history can be re-hashed exactly as stored, including history that no
//! longer matches the payload schema because someone edited it.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::{error::AttestError, project::ProjectId};

/// The `prevChainHash` of sequence 1 in every project.
pub const GENESIS_CHAIN_HASH: &str = "GENESIS";

/// The digest algorithm (and its encoding version) behind every hash.
///
/// Serialized as a plain tag such as `"sha256-v1"`. Unknown tags fail to
/// decode, so history produced by a future algorithm is rejected rather than
/// re-hashed with the wrong one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum HashAlgorithm {
    #[default]
    Sha256V1,
}

impl HashAlgorithm {
    pub fn as_str(&self) -> &'static str {
        match self {
            HashAlgorithm::Sha256V1 => "sha256-v1",
        }
    }

    /// Parse an algorithm tag.
    ///
    /// Returns `AttestError::UnsupportedHashAlgorithm` for any tag this build
    /// does not implement.
    pub fn parse(tag: &str) -> Result<Self, AttestError> {
        match tag {
            "sha256-v1" => Ok(HashAlgorithm::Sha256V1),
            other => Err(AttestError::UnsupportedHashAlgorithm {
                tag: other.to_string(),
            }),
        }
    }
}

impl fmt::Display for HashAlgorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl TryFrom<String> for HashAlgorithm {
    type Error = AttestError;

    fn try_from(tag: String) -> Result<Self, Self::Error> {
        HashAlgorithm::parse(&tag)
    }
}

impl From<HashAlgorithm> for String {
    fn from(algorithm: HashAlgorithm) -> Self {
        algorithm.as_str().to_string()
    }
}

/// A typed reference to an actor or resource, e.g. `{type: "user", id: "alice"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntityRef {
    #[serde(rename = "type")]
    pub kind: String,
    pub id: String,
}

impl EntityRef {
    pub fn new(kind: impl Into<String>, id: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            id: id.into(),
        }
    }
}

/// A validated audit payload.
///
/// The required fields are typed; `metadata` is the only open extension
/// point and is canonicalized like everything else before hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditPayload {
    /// What happened, e.g. `"login"`. Never empty.
    pub action: String,
    /// Who did it.
    pub actor: EntityRef,
    /// What it was done to.
    pub resource: EntityRef,
    /// Free-form key/value context.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<Map<String, Value>>,
}

impl AuditPayload {
    pub fn new(action: impl Into<String>, actor: EntityRef, resource: EntityRef) -> Self {
        Self {
            action: action.into(),
            actor,
            resource,
            metadata: None,
        }
    }

    /// Attach one metadata entry, creating the map on first use.
    pub fn with_metadata(mut self, key: impl Into<String>, value: Value) -> Self {
        self.metadata
            .get_or_insert_with(Map::new)
            .insert(key.into(), value);
        self
    }

    /// The JSON document form that is stored and hashed.
    pub fn to_document(&self) -> Value {
        let mut doc = Map::new();
        doc.insert("action".to_string(), Value::String(self.action.clone()));
        doc.insert("actor".to_string(), entity_document(&self.actor));
        doc.insert("resource".to_string(), entity_document(&self.resource));
        if let Some(metadata) = &self.metadata {
            doc.insert("metadata".to_string(), Value::Object(metadata.clone()));
        }
        Value::Object(doc)
    }
}

fn entity_document(entity: &EntityRef) -> Value {
    let mut doc = Map::new();
    doc.insert("type".to_string(), Value::String(entity.kind.clone()));
    doc.insert("id".to_string(), Value::String(entity.id.clone()));
    Value::Object(doc)
}

/// One immutable link in a project's hash chain.
///
/// Created exactly once by the append path and never mutated. Any observed
/// difference between a stored event and what its fields re-derive to is
/// tampering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEvent {
    pub project_id: ProjectId,

    /// Position in the project's chain, contiguous from 1.
    pub sequence: u64,

    /// The stored payload document.
    pub payload: Value,

    /// `H(canonicalize(payload))`, lowercase hex.
    pub payload_hash: String,

    /// `chainHash` of the previous event, or `GENESIS` for sequence 1.
    pub prev_chain_hash: String,

    /// `H(payloadHash ++ prevChainHash)`, lowercase hex.
    pub chain_hash: String,

    #[serde(with = "chrono::serde::ts_milliseconds")]
    pub created_at: DateTime<Utc>,

    #[serde(default)]
    pub hash_algorithm: HashAlgorithm,
}
