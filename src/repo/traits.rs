use anyhow::Result;

/// Identity and timestamp for one replayed commit, passed explicitly
/// into the commit call rather than through ambient state. Author and
/// committer are deliberately the same on the destination.
#[derive(Debug, Clone, PartialEq)]
pub struct CommitMeta {
    pub name: String,
    pub email: String,
    /// Authorial time, seconds since epoch, applied to both dates.
    pub unixtime: i64,
    pub message: String,
}

/// Thin mutating operations on the destination repository. Each call
/// maps to a single blocking external invocation; failure propagates as
/// a fatal error.
pub trait DestinationRepo {
    /// Raw textual log of the branch tip, for watermark extraction.
    fn tip_log(&self, branch: &str) -> Result<String>;

    fn checkout_branch(&self, branch: &str) -> Result<()>;

    /// Stage a path for the next commit.
    fn stage_path(&self, path: &str) -> Result<()>;

    /// Remove a path from the working tree and from tracking.
    /// Removing an already-absent path is not an error.
    fn remove_path(&self, path: &str) -> Result<()>;

    fn commit(&self, meta: &CommitMeta) -> Result<()>;
}
