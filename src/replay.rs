use std::{
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};

use crate::record::{CommitRecord, FileChange, FileState};
use crate::repo::{rfc822_utc, CommitMeta, DestinationRepo};
use crate::source::ContentSource;

/// Domain appended to the recorded author name to synthesize the
/// destination commit identity.
const AUTHOR_EMAIL_DOMAIN: &str = "localhost";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileAction {
    Add,
    Modify,
    Delete,
}

/// Three-way classification of a file change. Deletion is driven by
/// the recorded state; for everything else the working tree's actual
/// presence of the path is the ground truth for add vs. modify, since
/// the recorded state cannot distinguish the two reliably.
pub fn classify(state: FileState, present_in_tree: bool) -> FileAction {
    match (state, present_in_tree) {
        (FileState::Deleted, _) => FileAction::Delete,
        (FileState::Present, true) => FileAction::Modify,
        (FileState::Present, false) => FileAction::Add,
    }
}

/// Permission bits for a newly added file, derived from the mode of its
/// source storage unit: owner read/write is forced on, group and other
/// receive a copy of the owner bits, and the result is confined to
/// rwxr-xr-x.
pub fn derived_mode(source_mode: u32) -> u32 {
    let owner = source_mode & 0o700;
    (0o600 | owner | (owner >> 3) | (owner >> 6)) & 0o755
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ReplayOptions {
    pub dry_run: bool,
    pub verbose: bool,
}

/// Applies validated commit records to the destination, one commit at a
/// time in decode order. Owns only the iteration state; all durable
/// state lives in the destination repository itself.
pub struct ReplayEngine<'a, S, R> {
    source: &'a S,
    repo: &'a R,
    worktree: PathBuf,
    opts: ReplayOptions,
}

impl<'a, S: ContentSource, R: DestinationRepo> ReplayEngine<'a, S, R> {
    pub fn new(source: &'a S, repo: &'a R, worktree: &Path, opts: ReplayOptions) -> Self {
        ReplayEngine {
            source,
            repo,
            worktree: worktree.to_path_buf(),
            opts,
        }
    }

    pub fn replay(&self, records: &[CommitRecord]) -> Result<()> {
        let total = records.len();
        for (idx, record) in records.iter().enumerate() {
            self.apply_commit(idx + 1, total, record)?;
        }
        Ok(())
    }

    fn apply_commit(&self, idx: usize, total: usize, record: &CommitRecord) -> Result<()> {
        println!(
            "commit {}/{} by {} on {}",
            idx,
            total,
            record.author,
            rfc822_utc(record.unixtime)?
        );
        for line in record.message.lines() {
            println!("    {}", line);
        }

        for change in &record.files {
            let present = self.worktree.join(&change.path).exists();
            let action = classify(change.state, present);
            self.report(action, change);
            self.apply_change(action, change)?;
        }

        if self.opts.dry_run {
            tracing::info!("dry-run: not committing");
            return Ok(());
        }

        let meta = CommitMeta {
            name: record.author.clone(),
            email: format!("{}@{}", record.author, AUTHOR_EMAIL_DOMAIN),
            unixtime: record.unixtime,
            message: record.message.clone(),
        };
        self.repo.commit(&meta)?;
        Ok(())
    }

    /// Audit line for one file action, printed before the action runs.
    fn report(&self, action: FileAction, change: &FileChange) {
        match action {
            FileAction::Add => println!("  add     {} ({})", change.path, change.revision),
            FileAction::Modify => println!("  modify  {} ({})", change.path, change.revision),
            FileAction::Delete => println!("  delete  {}", change.path),
        }
        if self.opts.verbose {
            println!("          rcs file: {}", change.rcs_file);
        }
    }

    fn apply_change(&self, action: FileAction, change: &FileChange) -> Result<()> {
        if self.opts.dry_run {
            return Ok(());
        }

        let abs = self.worktree.join(&change.path);
        match action {
            FileAction::Delete => {
                self.repo.remove_path(&change.path)?;
            }
            FileAction::Modify => {
                let content = self.source.fetch(&change.path, &change.revision)?;
                fs::write(&abs, content)
                    .with_context(|| format!("failed to overwrite {:?}", abs))?;
                self.repo.stage_path(&change.path)?;
            }
            FileAction::Add => {
                ensure_parent_dirs(&self.worktree, &change.path)?;
                let content = self.source.fetch(&change.path, &change.revision)?;
                fs::write(&abs, content).with_context(|| format!("failed to write {:?}", abs))?;
                self.set_mode(&abs, change)?;
                self.repo.stage_path(&change.path)?;
            }
        }
        Ok(())
    }

    fn set_mode(&self, abs: &Path, change: &FileChange) -> Result<()> {
        use std::os::unix::fs::PermissionsExt;

        let mode = derived_mode(self.source.file_mode(&change.rcs_file)?);
        fs::set_permissions(abs, fs::Permissions::from_mode(mode))
            .with_context(|| format!("failed to set mode {:o} on {:?}", mode, abs))?;
        Ok(())
    }
}

/// Create the parent directories of `rel_path` under `root`, one
/// segment at a time, skipping segments that already exist.
fn ensure_parent_dirs(root: &Path, rel_path: &str) -> Result<()> {
    let rel = Path::new(rel_path);
    let Some(parent) = rel.parent() else {
        return Ok(());
    };

    let mut dir = root.to_path_buf();
    for segment in parent.components() {
        dir.push(segment);
        if !dir.exists() {
            fs::create_dir(&dir)
                .with_context(|| format!("failed to create directory {:?}", dir))?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::collections::HashMap;

    use tempfile::TempDir;

    use super::*;
    use crate::error::Error;
    use crate::record::{CommitRecord, FileChange, FileState};

    struct FakeSource {
        contents: HashMap<(String, String), Vec<u8>>,
        modes: HashMap<String, u32>,
    }

    impl FakeSource {
        fn new() -> Self {
            FakeSource {
                contents: HashMap::new(),
                modes: HashMap::new(),
            }
        }

        fn with(mut self, path: &str, revision: &str, content: &[u8]) -> Self {
            self.contents
                .insert((path.to_string(), revision.to_string()), content.to_vec());
            self
        }

        fn with_mode(mut self, rcs_file: &str, mode: u32) -> Self {
            self.modes.insert(rcs_file.to_string(), mode);
            self
        }
    }

    impl ContentSource for FakeSource {
        fn fetch(&self, path: &str, revision: &str) -> anyhow::Result<Vec<u8>> {
            self.contents
                .get(&(path.to_string(), revision.to_string()))
                .cloned()
                .ok_or_else(|| {
                    Error::ContentFetch {
                        path: path.to_string(),
                        revision: revision.to_string(),
                        reason: "no such revision".to_string(),
                    }
                    .into()
                })
        }

        fn file_mode(&self, rcs_file: &str) -> anyhow::Result<u32> {
            Ok(self.modes.get(rcs_file).copied().unwrap_or(0o644))
        }
    }

    #[derive(Debug, PartialEq)]
    enum RepoOp {
        Stage(String),
        Remove(String),
        Commit(CommitMeta),
    }

    struct FakeRepo {
        worktree: PathBuf,
        ops: RefCell<Vec<RepoOp>>,
        fail_stage: bool,
    }

    impl FakeRepo {
        fn new(worktree: &Path) -> Self {
            FakeRepo {
                worktree: worktree.to_path_buf(),
                ops: RefCell::new(Vec::new()),
                fail_stage: false,
            }
        }
    }

    impl DestinationRepo for FakeRepo {
        fn tip_log(&self, _branch: &str) -> anyhow::Result<String> {
            Ok(String::new())
        }

        fn checkout_branch(&self, _branch: &str) -> anyhow::Result<()> {
            Ok(())
        }

        fn stage_path(&self, path: &str) -> anyhow::Result<()> {
            if self.fail_stage {
                return Err(Error::RepositoryMutation {
                    operation: "add".to_string(),
                    detail: "index locked".to_string(),
                }
                .into());
            }
            self.ops.borrow_mut().push(RepoOp::Stage(path.to_string()));
            Ok(())
        }

        fn remove_path(&self, path: &str) -> anyhow::Result<()> {
            let abs = self.worktree.join(path);
            if abs.exists() {
                fs::remove_file(&abs)?;
            }
            self.ops.borrow_mut().push(RepoOp::Remove(path.to_string()));
            Ok(())
        }

        fn commit(&self, meta: &CommitMeta) -> anyhow::Result<()> {
            self.ops.borrow_mut().push(RepoOp::Commit(meta.clone()));
            Ok(())
        }
    }

    fn change(path: &str, revision: &str, state: FileState) -> FileChange {
        FileChange {
            path: path.to_string(),
            revision: revision.to_string(),
            state,
            rcs_file: format!("mod/{},v", path),
        }
    }

    fn record(unixtime: i64, author: &str, message: &str, files: Vec<FileChange>) -> CommitRecord {
        CommitRecord {
            unixtime,
            branch: "trunk".to_string(),
            author: author.to_string(),
            message: message.to_string(),
            files,
        }
    }

    #[test]
    fn classification_is_three_way() {
        assert_eq!(classify(FileState::Deleted, true), FileAction::Delete);
        assert_eq!(classify(FileState::Deleted, false), FileAction::Delete);
        assert_eq!(classify(FileState::Present, true), FileAction::Modify);
        assert_eq!(classify(FileState::Present, false), FileAction::Add);
    }

    #[test]
    fn mode_derivation_matches_bit_rule() {
        assert_eq!(derived_mode(0o644), 0o644);
        assert_eq!(derived_mode(0o744), 0o755);
        assert_eq!(derived_mode(0o444), 0o644);
        assert_eq!(derived_mode(0o600), 0o644);
        assert_eq!(derived_mode(0o777), 0o755);
    }

    #[test]
    fn add_then_modify_across_two_commits() {
        let tree = TempDir::new().unwrap();
        let source = FakeSource::new()
            .with("a.txt", "1.1", b"one")
            .with("a.txt", "1.2", b"two");
        let repo = FakeRepo::new(tree.path());
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        let records = vec![
            record(
                1000,
                "alice",
                "add a",
                vec![change("a.txt", "1.1", FileState::Present)],
            ),
            record(
                2000,
                "alice",
                "update a",
                vec![change("a.txt", "1.2", FileState::Present)],
            ),
        ];
        engine.replay(&records).unwrap();

        assert_eq!(fs::read(tree.path().join("a.txt")).unwrap(), b"two");

        let ops = repo.ops.borrow();
        assert_eq!(ops.len(), 4);
        assert_eq!(ops[0], RepoOp::Stage("a.txt".to_string()));
        match (&ops[1], &ops[3]) {
            (RepoOp::Commit(first), RepoOp::Commit(second)) => {
                assert_eq!(first.email, "alice@localhost");
                assert_eq!(second.email, "alice@localhost");
                assert_eq!(first.unixtime, 1000);
                assert_eq!(second.unixtime, 2000);
                assert_eq!(first.message, "add a");
            }
            other => panic!("unexpected op order: {:?}", other),
        }
    }

    #[test]
    fn add_creates_parent_dirs_and_applies_mode() {
        use std::os::unix::fs::PermissionsExt;

        let tree = TempDir::new().unwrap();
        let source = FakeSource::new()
            .with("src/deep/tool.sh", "1.1", b"#!/bin/sh\n")
            .with_mode("mod/src/deep/tool.sh,v", 0o744);
        let repo = FakeRepo::new(tree.path());
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        let records = vec![record(
            1000,
            "bob",
            "add tool",
            vec![change("src/deep/tool.sh", "1.1", FileState::Present)],
        )];
        engine.replay(&records).unwrap();

        let abs = tree.path().join("src/deep/tool.sh");
        assert_eq!(fs::read(&abs).unwrap(), b"#!/bin/sh\n");
        let mode = fs::metadata(&abs).unwrap().permissions().mode() & 0o777;
        assert_eq!(mode, 0o755);
    }

    #[test]
    fn delete_removes_path_and_tracking() {
        let tree = TempDir::new().unwrap();
        fs::write(tree.path().join("old.c"), b"stale").unwrap();

        let source = FakeSource::new();
        let repo = FakeRepo::new(tree.path());
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        let records = vec![record(
            1000,
            "carol",
            "drop old.c",
            vec![change("old.c", "1.5", FileState::Deleted)],
        )];
        engine.replay(&records).unwrap();

        assert!(!tree.path().join("old.c").exists());
        let ops = repo.ops.borrow();
        assert_eq!(ops[0], RepoOp::Remove("old.c".to_string()));
        assert!(matches!(ops[1], RepoOp::Commit(_)));
    }

    #[test]
    fn dry_run_performs_no_mutation() {
        let tree = TempDir::new().unwrap();
        let source = FakeSource::new().with("a.txt", "1.1", b"one");
        let repo = FakeRepo::new(tree.path());
        let opts = ReplayOptions {
            dry_run: true,
            verbose: false,
        };
        let engine = ReplayEngine::new(&source, &repo, tree.path(), opts);

        let records = vec![record(
            1000,
            "alice",
            "add a",
            vec![change("a.txt", "1.1", FileState::Present)],
        )];
        engine.replay(&records).unwrap();

        assert!(!tree.path().join("a.txt").exists());
        assert!(repo.ops.borrow().is_empty());
    }

    #[test]
    fn staging_failure_aborts_before_commit() {
        let tree = TempDir::new().unwrap();
        let source = FakeSource::new().with("a.txt", "1.1", b"one");
        let mut repo = FakeRepo::new(tree.path());
        repo.fail_stage = true;
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        let records = vec![record(
            1000,
            "alice",
            "add a",
            vec![change("a.txt", "1.1", FileState::Present)],
        )];
        let err = engine.replay(&records).unwrap_err();
        assert!(err.to_string().contains("repository operation"));
        assert!(repo.ops.borrow().is_empty());
    }

    #[test]
    fn missing_revision_aborts_run() {
        let tree = TempDir::new().unwrap();
        let source = FakeSource::new();
        let repo = FakeRepo::new(tree.path());
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        let records = vec![record(
            1000,
            "alice",
            "add a",
            vec![change("a.txt", "1.9", FileState::Present)],
        )];
        let err = engine.replay(&records).unwrap_err();
        let err = err.downcast::<Error>().unwrap();
        assert!(matches!(err, Error::ContentFetch { .. }));
        assert!(repo.ops.borrow().is_empty());
    }

    #[test]
    fn records_replay_in_source_order_not_timestamp_order() {
        let tree = TempDir::new().unwrap();
        let source = FakeSource::new()
            .with("a.txt", "1.1", b"one")
            .with("b.txt", "1.1", b"two");
        let repo = FakeRepo::new(tree.path());
        let engine = ReplayEngine::new(&source, &repo, tree.path(), ReplayOptions::default());

        // Equal timestamps would pass validation in either order; the
        // engine must keep decode order regardless.
        let records = vec![
            record(
                1000,
                "alice",
                "second in time, first in log",
                vec![change("b.txt", "1.1", FileState::Present)],
            ),
            record(
                1000,
                "alice",
                "first in time, second in log",
                vec![change("a.txt", "1.1", FileState::Present)],
            ),
        ];
        engine.replay(&records).unwrap();

        let ops = repo.ops.borrow();
        let messages: Vec<&str> = ops
            .iter()
            .filter_map(|op| match op {
                RepoOp::Commit(meta) => Some(meta.message.as_str()),
                _ => None,
            })
            .collect();
        assert_eq!(
            messages,
            vec!["second in time, first in log", "first in time, second in log"]
        );
    }
}
