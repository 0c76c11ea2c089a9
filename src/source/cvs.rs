use std::{
    fs,
    path::{Path, PathBuf},
    process::Command,
};

use anyhow::{Context, Result};

use super::traits::ContentSource;
use crate::error::Error;

/// Content source backed by a checked-out CVS working copy. The
/// repository root and module path come from the checkout's own
/// administrative files (`CVS/Root`, `CVS/Repository`).
pub struct CvsCheckout {
    root: String,
    /// Filesystem path of the root, when the root is local. Needed to
    /// stat RCS files for permission bits.
    root_dir: Option<PathBuf>,
    module: String,
}

impl CvsCheckout {
    pub fn open<P: AsRef<Path>>(checkout_dir: P) -> Result<Self> {
        let dir = checkout_dir.as_ref();
        let root = read_admin_file(&dir.join("CVS").join("Root"))?;
        let module = read_admin_file(&dir.join("CVS").join("Repository"))?;
        let root_dir = local_root_dir(&root);
        if root_dir.is_none() {
            tracing::warn!(
                "CVS root '{}' is not local; file modes will default to 0644",
                root
            );
        }
        tracing::debug!("source checkout: root={} module={}", root, module);
        Ok(CvsCheckout {
            root,
            root_dir,
            module,
        })
    }
}

fn read_admin_file(path: &Path) -> Result<String> {
    let content = fs::read_to_string(path)
        .with_context(|| format!("failed to read CVS administrative file {:?}", path))?;
    Ok(content.trim().to_string())
}

/// Resolve a CVS root string to a local directory, if it names one.
/// Roots look like `/cvsroot`, `:local:/cvsroot`, or a remote form
/// such as `:pserver:user@host:/cvsroot`.
fn local_root_dir(root: &str) -> Option<PathBuf> {
    if let Some(stripped) = root.strip_prefix(":local:") {
        return Some(PathBuf::from(stripped));
    }
    if root.starts_with('/') {
        return Some(PathBuf::from(root));
    }
    None
}

impl ContentSource for CvsCheckout {
    fn fetch(&self, path: &str, revision: &str) -> Result<Vec<u8>> {
        let module_path = format!("{}/{}", self.module, path);
        let output = Command::new("cvs")
            .arg("-d")
            .arg(&self.root)
            .args(["-q", "checkout", "-p", "-r", revision])
            .arg(&module_path)
            .output()
            .context("failed to execute cvs checkout")?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::ContentFetch {
                path: path.to_string(),
                revision: revision.to_string(),
                reason: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(output.stdout)
    }

    fn file_mode(&self, rcs_file: &str) -> Result<u32> {
        use std::os::unix::fs::MetadataExt;

        let Some(root_dir) = &self.root_dir else {
            return Ok(0o644);
        };

        let direct = if Path::new(rcs_file).is_absolute() {
            PathBuf::from(rcs_file)
        } else {
            root_dir.join(rcs_file)
        };

        // Files removed on the trunk at some point live in Attic/.
        let candidate = if direct.exists() {
            direct
        } else {
            attic_path(&direct)
        };

        let meta = fs::metadata(&candidate)
            .with_context(|| format!("failed to stat RCS file {:?}", candidate))?;
        Ok(meta.mode() & 0o777)
    }
}

fn attic_path(rcs_file: &Path) -> PathBuf {
    match (rcs_file.parent(), rcs_file.file_name()) {
        (Some(parent), Some(name)) => parent.join("Attic").join(name),
        _ => rcs_file.to_path_buf(),
    }
}
