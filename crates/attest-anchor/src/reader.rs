//! The Anchor Reader: resolves the latest anchored head for one project.
//!
//! Selection rule: the lexicographically greatest bucketed snapshot
//! (`YYYY-MM-DD-HH.json`) wins. Only when the directory holds no bucketed
//! snapshot is the legacy single-project file `project-<id>.json` read.
//! Every other file in the directory is ignored.

use std::fs;
use std::path::Path;

use chrono::{TimeZone, Utc};
use serde::de::DeserializeOwned;
use serde_json::Value;
use tracing::debug;

use attest_contracts::{
    AnchorPayload, AnchorSnapshot, AttestError, AttestResult, LegacyAnchor, ProjectId,
};

/// True for names of the form `YYYY-MM-DD-HH.json`.
pub fn is_snapshot_file_name(name: &str) -> bool {
    let Some(stem) = name.strip_suffix(".json") else {
        return false;
    };
    let bytes = stem.as_bytes();
    bytes.len() == 13
        && bytes.iter().enumerate().all(|(i, b)| match i {
            4 | 7 | 10 => *b == b'-',
            _ => b.is_ascii_digit(),
        })
}

pub fn legacy_file_name(project_id: &ProjectId) -> String {
    format!("project-{}.json", project_id)
}

/// The file name of the newest bucketed snapshot in `dir`, if any.
///
/// Returns `AnchorNotFound` if `dir` cannot be listed.
pub fn latest_snapshot_file(dir: &Path) -> AttestResult<Option<String>> {
    let entries = fs::read_dir(dir).map_err(|e| {
        debug!(dir = %dir.display(), error = %e, "anchor directory unreadable");
        AttestError::AnchorNotFound {
            dir: dir.display().to_string(),
        }
    })?;

    let latest = entries
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter_map(|entry| entry.file_name().into_string().ok())
        .filter(|name| is_snapshot_file_name(name))
        .max();
    Ok(latest)
}

/// Parse the bucketed snapshot at `path`.
pub fn read_snapshot(path: &Path) -> AttestResult<AnchorSnapshot> {
    parse_file(path)
}

/// The latest anchor recorded for `project_id` in `dir`.
///
/// # Errors
///
/// - `AnchorNotFound` if `dir` holds neither a bucketed snapshot nor this
///   project's legacy file
/// - `AnchorFormat` if the selected file is not valid JSON, lacks a required
///   field, or names an unknown hash algorithm
/// - `ProjectNotAnchored` if the latest snapshot has no entry for the project
pub fn read_anchor(project_id: &ProjectId, dir: &Path) -> AttestResult<AnchorPayload> {
    if let Some(file) = latest_snapshot_file(dir)? {
        let snapshot = read_snapshot(&dir.join(&file))?;
        let entry = snapshot
            .entry(project_id)
            .ok_or_else(|| AttestError::ProjectNotAnchored {
                project_id: project_id.to_string(),
                file: file.clone(),
            })?;

        debug!(
            project_id = %project_id,
            file = %file,
            sequence = entry.last_sequence,
            "anchor resolved from snapshot"
        );

        return Ok(AnchorPayload {
            project_id: entry.project_id.clone(),
            last_sequence: entry.last_sequence,
            last_chain_hash: entry.last_chain_hash.clone(),
            anchored_at: snapshot.timestamp,
            source_file: file,
            mode: Some(snapshot.mode),
            previous_anchor_commit: snapshot.previous_anchor_commit.clone(),
        });
    }

    let file = legacy_file_name(project_id);
    let path = dir.join(&file);
    if !path.is_file() {
        return Err(AttestError::AnchorNotFound {
            dir: dir.display().to_string(),
        });
    }

    let legacy: LegacyAnchor = parse_file(&path)?;
    if &legacy.project_id != project_id {
        return Err(AttestError::AnchorFormat {
            file,
            reason: format!("file records project '{}'", legacy.project_id),
        });
    }
    let anchored_at = Utc
        .timestamp_millis_opt(legacy.anchored_at)
        .single()
        .ok_or_else(|| AttestError::AnchorFormat {
            file: file.clone(),
            reason: format!("anchoredAt {} is out of range", legacy.anchored_at),
        })?;

    debug!(project_id = %project_id, file = %file, "anchor resolved from legacy file");

    Ok(AnchorPayload {
        project_id: legacy.project_id,
        last_sequence: legacy.last_sequence,
        last_chain_hash: legacy.last_chain_hash,
        anchored_at,
        source_file: file,
        mode: None,
        previous_anchor_commit: None,
    })
}

/// Read `path` as JSON, then decode it as `T`.
///
/// Kept as two steps so a syntax error and a shape error report differently.
fn parse_file<T: DeserializeOwned>(path: &Path) -> AttestResult<T> {
    let file = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string());

    let contents = fs::read_to_string(path).map_err(|e| AttestError::AnchorFormat {
        file: file.clone(),
        reason: format!("unreadable: {}", e),
    })?;
    let value: Value = serde_json::from_str(&contents).map_err(|e| AttestError::AnchorFormat {
        file: file.clone(),
        reason: format!("invalid JSON: {}", e),
    })?;
    serde_json::from_value(value).map_err(|e| AttestError::AnchorFormat {
        file,
        reason: e.to_string(),
    })
}
