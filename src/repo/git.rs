use std::{
    path::{Path, PathBuf},
    process::{Command, Output},
};

use anyhow::{Context, Result};
use chrono::{TimeZone, Utc};

use super::traits::{CommitMeta, DestinationRepo};
use crate::error::Error;

/// Destination adapter shelling out to the `git` binary with the
/// repository directory as the working directory.
pub struct GitRepo {
    repo_dir: PathBuf,
}

impl GitRepo {
    pub fn new<P: AsRef<Path>>(repo_dir: P) -> Self {
        GitRepo {
            repo_dir: repo_dir.as_ref().to_path_buf(),
        }
    }

    fn run(&self, cmd: &mut Command, operation: &str) -> Result<Output> {
        let output = cmd
            .current_dir(&self.repo_dir)
            .output()
            .with_context(|| format!("failed to execute git for '{}'", operation))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(Error::RepositoryMutation {
                operation: operation.to_string(),
                detail: stderr.trim().to_string(),
            }
            .into());
        }

        Ok(output)
    }
}

/// Render a unix timestamp as an RFC-822-style date, always in UTC with
/// an explicit +0000 offset. Git accepts this form for both dates.
pub fn rfc822_utc(unixtime: i64) -> Result<String> {
    let ts = Utc
        .timestamp_opt(unixtime, 0)
        .single()
        .with_context(|| format!("timestamp {} is not representable", unixtime))?;
    Ok(ts.format("%a, %d %b %Y %H:%M:%S +0000").to_string())
}

impl DestinationRepo for GitRepo {
    fn tip_log(&self, branch: &str) -> Result<String> {
        let mut cmd = Command::new("git");
        cmd.args(["log", "-1", "-p", "--date=unix"]).arg(branch);
        let output = self.run(&mut cmd, "log")?;
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    fn checkout_branch(&self, branch: &str) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["checkout", "-q"]).arg(branch);
        self.run(&mut cmd, "checkout")?;
        Ok(())
    }

    fn stage_path(&self, path: &str) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["add", "--"]).arg(path);
        self.run(&mut cmd, "add")?;
        Ok(())
    }

    fn remove_path(&self, path: &str) -> Result<()> {
        let mut cmd = Command::new("git");
        cmd.args(["rm", "-f", "-q", "--ignore-unmatch", "--"]).arg(path);
        self.run(&mut cmd, "rm")?;
        Ok(())
    }

    fn commit(&self, meta: &CommitMeta) -> Result<()> {
        let date = rfc822_utc(meta.unixtime)?;
        tracing::debug!("committing as {} <{}> at {}", meta.name, meta.email, date);

        // Identity and dates are scoped to this one child process.
        let mut cmd = Command::new("git");
        cmd.env("GIT_AUTHOR_NAME", &meta.name)
            .env("GIT_AUTHOR_EMAIL", &meta.email)
            .env("GIT_COMMITTER_NAME", &meta.name)
            .env("GIT_COMMITTER_EMAIL", &meta.email)
            .env("GIT_AUTHOR_DATE", &date)
            .env("GIT_COMMITTER_DATE", &date)
            .args(["commit", "-q", "-m"])
            .arg(&meta.message);
        self.run(&mut cmd, "commit")?;
        Ok(())
    }
}
