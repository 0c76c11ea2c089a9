use anyhow::Result;

/// Read-only access to historical file content in the source
/// repository. Both operations block on an external process and impose
/// no timeout; a failure aborts the current commit and the run.
pub trait ContentSource {
    /// Exact byte content of `path` at `revision`.
    fn fetch(&self, path: &str, revision: &str) -> Result<Vec<u8>>;

    /// Permission bits of the file's underlying storage unit, consulted
    /// when a path is first introduced on the destination.
    fn file_mode(&self, rcs_file: &str) -> Result<u32>;
}
