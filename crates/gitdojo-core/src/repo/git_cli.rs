//! [`RepositoryEngine`] over the `git` executable.
//!
//! Every invocation runs with system and global configuration disabled so
//! a player's own `~/.gitconfig` cannot change what a stage looks like.

use std::path::Path;
use std::process::{Output, Stdio};

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use super::{
    resolve_in_repo, BranchInfo, CommitInfo, CommitStamp, EngineError, EngineOutput,
    EngineResult, RepositoryEngine, WorktreeStatus,
};
use crate::domain::Identity;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

const FIELD_SEP: char = '\u{1f}';
const RECORD_SEP: char = '\u{1e}';

/// Git CLI engine.
#[derive(Debug, Clone)]
pub struct GitCliEngine {
    git_bin: String,
}

impl Default for GitCliEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GitCliEngine {
    pub fn new() -> Self {
        Self::with_binary("git")
    }

    pub fn with_binary(git_bin: impl Into<String>) -> Self {
        Self {
            git_bin: git_bin.into(),
        }
    }

    pub fn binary(&self) -> &str {
        &self.git_bin
    }

    /// Raw `git --version` line, e.g. `git version 2.43.0`.
    pub async fn version(&self) -> EngineResult<String> {
        let cwd = std::env::temp_dir();
        let out = self.run(&cwd, &["--version"]).await?;
        Ok(out.trim().to_string())
    }

    fn command(&self, repo: &Path) -> Command {
        let mut cmd = Command::new(&self.git_bin);
        cmd.current_dir(repo)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .env("GIT_CONFIG_NOSYSTEM", "1")
            .env("GIT_CONFIG_GLOBAL", NULL_DEVICE)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("GIT_EDITOR", "true")
            .env("GIT_SEQUENCE_EDITOR", "true")
            .env("GIT_MERGE_AUTOEDIT", "no")
            .env("GIT_PAGER", "cat")
            .env("LC_ALL", "C");
        cmd
    }

    async fn output(
        &self,
        repo: &Path,
        args: &[&str],
        stamp: Option<&CommitStamp>,
    ) -> EngineResult<Output> {
        let mut cmd = self.command(repo);
        cmd.args(args);
        if let Some(stamp) = stamp {
            let date = format!("@{} +0000", stamp.timestamp);
            cmd.env("GIT_AUTHOR_NAME", &stamp.identity.name)
                .env("GIT_AUTHOR_EMAIL", &stamp.identity.email)
                .env("GIT_AUTHOR_DATE", &date)
                .env("GIT_COMMITTER_NAME", &stamp.identity.name)
                .env("GIT_COMMITTER_EMAIL", &stamp.identity.email)
                .env("GIT_COMMITTER_DATE", &date);
        }
        debug!(repo = %repo.display(), args = ?args, "git");
        cmd.output().await.map_err(|source| EngineError::Spawn {
            program: self.git_bin.clone(),
            source,
        })
    }

    /// Run and require a zero exit; returns stdout.
    async fn run(&self, repo: &Path, args: &[&str]) -> EngineResult<String> {
        self.run_stamped(repo, args, None).await
    }

    async fn run_stamped(
        &self,
        repo: &Path,
        args: &[&str],
        stamp: Option<&CommitStamp>,
    ) -> EngineResult<String> {
        let output = self.output(repo, args, stamp).await?;
        if !output.status.success() {
            return Err(EngineError::CommandFailed {
                command: args.join(" "),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    async fn has_head(&self, repo: &Path) -> EngineResult<bool> {
        let output = self
            .output(repo, &["rev-parse", "--verify", "--quiet", "HEAD"], None)
            .await?;
        Ok(output.status.success())
    }
}

fn lines(stdout: &str) -> Vec<String> {
    stdout
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_log(stdout: &str) -> EngineResult<Vec<CommitInfo>> {
    let mut commits = Vec::new();
    for record in stdout.split(RECORD_SEP) {
        let record = record.trim_start_matches('\n');
        if record.trim().is_empty() {
            continue;
        }
        let mut fields = record.splitn(3, FIELD_SEP);
        let hash = fields.next().unwrap_or_default().trim();
        let parents = fields
            .next()
            .ok_or_else(|| EngineError::Parse(format!("log record without parents: {record:?}")))?;
        let message = fields.next().unwrap_or_default();
        if hash.is_empty() {
            return Err(EngineError::Parse(format!("log record without hash: {record:?}")));
        }
        commits.push(CommitInfo {
            hash: hash.to_string(),
            parents: parents.split_whitespace().map(str::to_string).collect(),
            message: message.trim_end().to_string(),
        });
    }
    Ok(commits)
}

fn parse_status(stdout: &str) -> WorktreeStatus {
    let mut status = WorktreeStatus::default();
    for line in stdout.lines() {
        if line.len() < 4 {
            continue;
        }
        let (code, rest) = line.split_at(2);
        let path = rest.trim_start();
        let path = path.rsplit(" -> ").next().unwrap_or(path).to_string();
        let mut chars = code.chars();
        let index = chars.next().unwrap_or(' ');
        let worktree = chars.next().unwrap_or(' ');
        if index == '?' {
            status.untracked.push(path);
            continue;
        }
        if index != ' ' {
            status.staged.push(path.clone());
        }
        if worktree != ' ' {
            status.modified.push(path);
        }
    }
    status
}

#[async_trait]
impl RepositoryEngine for GitCliEngine {
    async fn init(&self, repo: &Path, default_branch: &str) -> EngineResult<()> {
        tokio::fs::create_dir_all(repo).await?;
        self.run(repo, &["init", "--quiet"]).await?;
        let head_ref = format!("refs/heads/{default_branch}");
        self.run(repo, &["symbolic-ref", "HEAD", &head_ref]).await?;
        Ok(())
    }

    async fn configure_identity(&self, repo: &Path, identity: &Identity) -> EngineResult<()> {
        self.run(repo, &["config", "user.name", &identity.name]).await?;
        self.run(repo, &["config", "user.email", &identity.email])
            .await?;
        self.run(repo, &["config", "commit.gpgsign", "false"]).await?;
        Ok(())
    }

    async fn write_file(&self, repo: &Path, path: &str, content: &str) -> EngineResult<()> {
        let target = resolve_in_repo(repo, path)?;
        if let Some(parent) = target.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        tokio::fs::write(&target, content).await?;
        Ok(())
    }

    async fn read_file(&self, repo: &Path, path: &str) -> EngineResult<Option<String>> {
        let target = resolve_in_repo(repo, path)?;
        match tokio::fs::read(&target).await {
            Ok(bytes) => Ok(Some(String::from_utf8_lossy(&bytes).into_owned())),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            // Directories read as absent.
            Err(_) if target.is_dir() => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn list_files(&self, repo: &Path) -> EngineResult<Vec<String>> {
        let out = self
            .run(
                repo,
                &["ls-files", "--cached", "--others", "--exclude-standard"],
            )
            .await?;
        let mut files = lines(&out);
        files.sort();
        files.dedup();
        Ok(files)
    }

    async fn stage_all(&self, repo: &Path) -> EngineResult<()> {
        self.run(repo, &["add", "--all"]).await?;
        Ok(())
    }

    async fn commit(
        &self,
        repo: &Path,
        message: &str,
        stamp: Option<&CommitStamp>,
    ) -> EngineResult<String> {
        self.run_stamped(
            repo,
            &[
                "commit",
                "--quiet",
                "--allow-empty",
                "--no-verify",
                "-m",
                message,
            ],
            stamp,
        )
        .await?;
        let head = self.run(repo, &["rev-parse", "HEAD"]).await?;
        Ok(head.trim().to_string())
    }

    async fn create_branch(
        &self,
        repo: &Path,
        name: &str,
        start_point: Option<&str>,
    ) -> EngineResult<()> {
        match start_point {
            Some(start) => self.run(repo, &["branch", name, start]).await?,
            None => self.run(repo, &["branch", name]).await?,
        };
        Ok(())
    }

    async fn switch_branch(&self, repo: &Path, name: &str) -> EngineResult<()> {
        self.run(repo, &["checkout", "--quiet", name]).await?;
        Ok(())
    }

    async fn delete_branch(&self, repo: &Path, name: &str) -> EngineResult<()> {
        self.run(repo, &["branch", "-D", name]).await?;
        Ok(())
    }

    async fn current_branch(&self, repo: &Path) -> EngineResult<Option<String>> {
        let output = self
            .output(repo, &["symbolic-ref", "--quiet", "--short", "HEAD"], None)
            .await?;
        if !output.status.success() {
            return Ok(None);
        }
        let name = String::from_utf8_lossy(&output.stdout).trim().to_string();
        Ok((!name.is_empty()).then_some(name))
    }

    async fn branches(&self, repo: &Path) -> EngineResult<Vec<BranchInfo>> {
        let out = self
            .run(
                repo,
                &[
                    "for-each-ref",
                    "--format=%(refname:short)%09%(objectname)",
                    "refs/heads",
                ],
            )
            .await?;
        lines(&out)
            .into_iter()
            .map(|line| {
                let (name, head) = line
                    .split_once('\t')
                    .ok_or_else(|| EngineError::Parse(format!("branch line: {line:?}")))?;
                Ok(BranchInfo {
                    name: name.to_string(),
                    head: head.to_string(),
                })
            })
            .collect()
    }

    async fn log(&self, repo: &Path) -> EngineResult<Vec<CommitInfo>> {
        if !self.has_head(repo).await? {
            return Ok(Vec::new());
        }
        let out = self
            .run(repo, &["log", "--format=%H%x1f%P%x1f%B%x1e", "HEAD"])
            .await?;
        parse_log(&out)
    }

    async fn status(&self, repo: &Path) -> EngineResult<WorktreeStatus> {
        let out = self
            .run(repo, &["status", "--porcelain=v1", "--untracked-files=all"])
            .await?;
        Ok(parse_status(&out))
    }

    async fn stash_count(&self, repo: &Path) -> EngineResult<usize> {
        let out = self.run(repo, &["stash", "list", "--format=%H"]).await?;
        Ok(lines(&out).len())
    }

    async fn tags(&self, repo: &Path) -> EngineResult<Vec<String>> {
        let out = self.run(repo, &["tag", "--list"]).await?;
        Ok(lines(&out))
    }

    async fn invoke(&self, repo: &Path, args: &[String]) -> EngineResult<EngineOutput> {
        let refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let output = self.output(repo, &refs, None).await?;
        Ok(EngineOutput {
            success: output.status.success(),
            exit_code: output.status.code(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stamp(ts: i64) -> CommitStamp {
        CommitStamp {
            identity: Identity::default(),
            timestamp: ts,
        }
    }

    async fn seeded() -> (tempfile::TempDir, GitCliEngine) {
        let dir = tempfile::tempdir().unwrap();
        let engine = GitCliEngine::new();
        engine.init(dir.path(), "main").await.unwrap();
        engine
            .configure_identity(dir.path(), &Identity::default())
            .await
            .unwrap();
        (dir, engine)
    }

    #[test]
    fn parse_log_splits_records() {
        let raw = "aaa\u{1f}\u{1f}first\n\u{1e}\nbbb\u{1f}aaa ccc\u{1f}Merge it\n\nbody\n\u{1e}\n";
        let commits = parse_log(raw).unwrap();
        assert_eq!(commits.len(), 2);
        assert!(commits[0].parents.is_empty());
        assert_eq!(commits[0].message, "first");
        assert_eq!(commits[1].parents, vec!["aaa", "ccc"]);
        assert!(commits[1].is_merge());
        assert_eq!(commits[1].message, "Merge it\n\nbody");
    }

    #[test]
    fn parse_status_classifies_entries() {
        let raw = "M  staged.txt\n M edited.txt\nMM both.txt\n?? new.txt\nR  old.txt -> renamed.txt\n";
        let status = parse_status(raw);
        assert_eq!(status.staged, vec!["staged.txt", "both.txt", "renamed.txt"]);
        assert_eq!(status.modified, vec!["edited.txt", "both.txt"]);
        assert_eq!(status.untracked, vec!["new.txt"]);
    }

    #[tokio::test]
    async fn empty_repository_has_no_history() {
        let (dir, engine) = seeded().await;
        assert!(engine.log(dir.path()).await.unwrap().is_empty());
        assert!(engine.branches(dir.path()).await.unwrap().is_empty());
        assert_eq!(
            engine.current_branch(dir.path()).await.unwrap().as_deref(),
            Some("main")
        );
    }

    #[tokio::test]
    async fn stamped_commits_are_reproducible() {
        let (a, engine) = seeded().await;
        let (b, _) = seeded().await;
        for dir in [a.path(), b.path()] {
            engine.write_file(dir, "app.cfg", "mode=safe\n").await.unwrap();
            engine.stage_all(dir).await.unwrap();
        }
        let ha = engine.commit(a.path(), "init", Some(&stamp(1_704_067_201))).await.unwrap();
        let hb = engine.commit(b.path(), "init", Some(&stamp(1_704_067_201))).await.unwrap();
        assert_eq!(ha, hb);
        assert_eq!(ha.len(), 40);
    }

    #[tokio::test]
    async fn branches_and_status_reflect_repository() {
        let (dir, engine) = seeded().await;
        let repo = dir.path();
        engine.write_file(repo, "a.txt", "a").await.unwrap();
        engine.stage_all(repo).await.unwrap();
        engine.commit(repo, "first", Some(&stamp(1))).await.unwrap();

        engine.create_branch(repo, "feature", None).await.unwrap();
        engine.switch_branch(repo, "feature").await.unwrap();
        assert_eq!(
            engine.current_branch(repo).await.unwrap().as_deref(),
            Some("feature")
        );
        let names: Vec<String> = engine
            .branches(repo)
            .await
            .unwrap()
            .into_iter()
            .map(|b| b.name)
            .collect();
        assert_eq!(names, vec!["feature", "main"]);

        engine.write_file(repo, "a.txt", "changed").await.unwrap();
        engine.write_file(repo, "nested/b.txt", "b").await.unwrap();
        let status = engine.status(repo).await.unwrap();
        assert_eq!(status.modified, vec!["a.txt"]);
        assert_eq!(status.untracked, vec!["nested/b.txt"]);

        let files = engine.list_files(repo).await.unwrap();
        assert_eq!(files, vec!["a.txt", "nested/b.txt"]);

        engine.switch_branch(repo, "main").await.unwrap();
        engine.delete_branch(repo, "feature").await.unwrap();
        assert_eq!(engine.branches(repo).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn invoke_reports_failure_without_error() {
        let (dir, engine) = seeded().await;
        let out = engine
            .invoke(dir.path(), &["checkout".to_string(), "nope".to_string()])
            .await
            .unwrap();
        assert!(!out.success);
        assert!(out.stderr.contains("nope"));
    }

    #[tokio::test]
    async fn read_missing_file_is_none() {
        let (dir, engine) = seeded().await;
        assert!(engine.read_file(dir.path(), "ghost.txt").await.unwrap().is_none());
        assert!(engine.read_file(dir.path(), "../x").await.is_err());
    }

    #[tokio::test]
    async fn missing_binary_is_spawn_error() {
        let dir = tempfile::tempdir().unwrap();
        let engine = GitCliEngine::with_binary("definitely-not-git-binary");
        let err = engine.init(dir.path(), "main").await.unwrap_err();
        assert!(matches!(err, EngineError::Spawn { .. }));
    }
}
