//! Versioned digest wrapper.
//!
//! Every hash in a chain is produced by a `Hasher` bound to one
//! `HashAlgorithm`. The algorithm travels with each event, so a verifier
//! always re-derives with the algorithm that produced the stored hash, and
//! an unknown algorithm never decodes in the first place.
//!
//! Hash input layout:
//!   - payload hash: UTF-8 bytes of `canonicalize(payload)`
//!   - chain hash:   UTF-8 bytes of `payload_hash` followed by `prev_chain_hash`

use serde_json::Value;
use sha2::{Digest, Sha256};

use attest_contracts::HashAlgorithm;

use crate::canonical::canonicalize;

/// The algorithm new events are produced with.
pub const CURRENT_ALGORITHM: HashAlgorithm = HashAlgorithm::Sha256V1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hasher {
    algorithm: HashAlgorithm,
}

impl Hasher {
    pub fn new(algorithm: HashAlgorithm) -> Self {
        Self { algorithm }
    }

    /// A hasher for `CURRENT_ALGORITHM`.
    pub fn current() -> Self {
        Self::new(CURRENT_ALGORITHM)
    }

    pub fn algorithm(&self) -> HashAlgorithm {
        self.algorithm
    }

    /// Digest `bytes`, returning lowercase hex.
    pub fn hash(&self, bytes: &[u8]) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256V1 => hex::encode(Sha256::digest(bytes)),
        }
    }

    /// `H(canonicalize(payload))`.
    pub fn payload_hash(&self, payload: &Value) -> String {
        self.hash(canonicalize(payload).as_bytes())
    }

    /// `H(payload_hash ++ prev_chain_hash)`.
    pub fn chain_hash(&self, payload_hash: &str, prev_chain_hash: &str) -> String {
        match self.algorithm {
            HashAlgorithm::Sha256V1 => {
                let mut hasher = Sha256::new();
                hasher.update(payload_hash.as_bytes());
                hasher.update(prev_chain_hash.as_bytes());
                hex::encode(hasher.finalize())
            }
        }
    }
}

impl Default for Hasher {
    fn default() -> Self {
        Self::current()
    }
}
