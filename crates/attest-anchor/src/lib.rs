//! # attest-anchor
//!
//! External anchoring for the attest audit log.
//!
//! The local hash chain proves that history is internally consistent. It
//! cannot prove that history was not wholesale regenerated by someone with
//! database access. This crate closes that gap:
//!
//! - `writer`: periodically snapshots every project's chain head, in prod
//!   mode into a git repository the database cannot write to
//! - `reader`: resolves the latest anchored head for a project
//! - `verifier`: checks live history against that head, and the anchor
//!   repository's commit graph against itself
//! - `pipeline`: the end-to-end verification run behind `attest verify`
//!
//! plus the collaborators those need: `config`, the `git` subprocess adapter,
//! and the `admin` HTTP client.

pub mod admin;
pub mod config;
pub mod git;
pub mod pipeline;
pub mod reader;
pub mod verifier;
pub mod writer;

pub use admin::AdminClient;
pub use config::{AnchorConfig, ApiConfig, AttestConfig, GitConfig};
pub use git::GitCli;
pub use pipeline::{verify_project, VerifyOptions};
pub use reader::{is_snapshot_file_name, latest_snapshot_file, read_anchor, read_snapshot};
pub use verifier::{verify_against_anchor, verify_anchor_lineage};
pub use writer::{
    snapshot_file_name, AnchorRun, AnchorWriter, DevAnchorWriter, ProdAnchorWriter,
};

// ── Tests ─────────────────────────────────────────────────────────────────────
