use std::fmt;

/// Fatal conditions surfaced to the top level. Every variant terminates
/// the run; there is no local recovery.
#[derive(Debug)]
pub enum Error {
    Decode { line: usize, reason: String },
    NoHistoryFound { branch: String },
    OutOfOrderReplay { commit_time: i64, watermark: i64 },
    ContentFetch { path: String, revision: String, reason: String },
    RepositoryMutation { operation: String, detail: String },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::Decode { line, reason } => {
                write!(f, "malformed commit record at line {}: {}", line, reason)
            }
            Error::NoHistoryFound { branch } => {
                write!(f, "no history found on destination branch '{}'", branch)
            }
            Error::OutOfOrderReplay {
                commit_time,
                watermark,
            } => write!(
                f,
                "commit at {} predates destination tip at {} (use --force to replay anyway)",
                commit_time, watermark
            ),
            Error::ContentFetch {
                path,
                revision,
                reason,
            } => write!(
                f,
                "failed to fetch content for {} at revision {}: {}",
                path, revision, reason
            ),
            Error::RepositoryMutation { operation, detail } => {
                write!(f, "repository operation '{}' failed: {}", operation, detail)
            }
        }
    }
}

impl std::error::Error for Error {}
