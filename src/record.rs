use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::error::Error;

/// One unit of history to replay. Immutable once decoded; the engine
/// only ever reads it.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitRecord {
    /// Authorial time of the original commit, seconds since epoch.
    pub unixtime: i64,
    pub branch: String,
    pub author: String,
    /// Commit message, reproduced verbatim on the destination.
    #[serde(rename = "log")]
    pub message: String,
    pub files: Vec<FileChange>,
}

/// One path's mutation within a commit.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileChange {
    /// Destination-relative file path.
    pub path: String,
    /// Source revision to fetch content at. Irrelevant for deletions.
    pub revision: String,
    pub state: FileState,
    /// Opaque locator for the file's RCS storage unit, used to resolve
    /// permission bits when the file is first introduced.
    #[serde(rename = "file")]
    pub rcs_file: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileState {
    Present,
    Deleted,
}

/// Decode a commit log: one self-describing JSON record per non-empty
/// line. Records whose branch differs from `branch` are dropped;
/// relative order of the rest is preserved. A malformed line fails the
/// whole decode — no partial batch is ever accepted.
pub fn decode_log(input: &str, branch: &str) -> Result<Vec<CommitRecord>> {
    let mut records = Vec::new();
    for (idx, line) in input.lines().enumerate() {
        if line.trim().is_empty() {
            continue;
        }
        let record: CommitRecord =
            serde_json::from_str(line).map_err(|e| Error::Decode {
                line: idx + 1,
                reason: e.to_string(),
            })?;
        if record.branch == branch {
            records.push(record);
        }
    }
    Ok(records)
}

pub fn read_log(path: &Path, branch: &str) -> Result<Vec<CommitRecord>> {
    let input = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read commit log {:?}", path))?;
    decode_log(&input, branch)
}
