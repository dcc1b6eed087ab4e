//! # attest-store
//!
//! In-memory, per-project-locked storage for the attest audit log.
//!
//! `InMemoryEventStore` implements the `EventStore`, `HeadSource`, and
//! `AnchorRunLog` contracts from `attest-core`. It is the storage used by
//! tests and local tooling; production deployments put a relational store
//! behind the same traits.

pub mod memory;

pub use memory::{InMemoryEventStore, InMemoryTransaction};

// ── Tests ─────────────────────────────────────────────────────────────────────
