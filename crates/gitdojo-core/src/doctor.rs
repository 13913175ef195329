//! Environment diagnostics behind `gitdojo doctor`.

use serde::Serialize;
use tracing::debug;

use crate::config::EngineConfig;
use crate::repo::{GitCliEngine, RepositoryEngine};

/// Oldest git release the built-in stages are written against.
pub const MIN_GIT_VERSION: (u32, u32) = (2, 30);

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CheckResult {
    pub name: &'static str,
    pub ok: bool,
    pub detail: String,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: true,
            detail: detail.into(),
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            ok: false,
            detail: detail.into(),
        }
    }
}

/// Parse `git version 2.39.3 (Apple Git-146)` into `(2, 39, 3)`.
/// A missing patch component reads as 0.
pub fn parse_git_version(line: &str) -> Option<(u32, u32, u32)> {
    let rest = line.trim().strip_prefix("git version")?.trim();
    let token = rest.split_whitespace().next()?;
    let mut parts = token.split('.');
    let major = parts.next()?.parse().ok()?;
    let minor = parts.next()?.parse().ok()?;
    let patch = parts
        .next()
        .map(|p| {
            p.chars()
                .take_while(char::is_ascii_digit)
                .collect::<String>()
        })
        .and_then(|p| p.parse().ok())
        .unwrap_or(0);
    Some((major, minor, patch))
}

/// Run every check; all of them run even when an earlier one fails.
pub async fn run_doctor(config: &EngineConfig) -> Vec<CheckResult> {
    let engine = GitCliEngine::with_binary(config.git_bin.clone());
    let mut checks = Vec::new();

    match engine.version().await {
        Ok(line) => {
            checks.push(CheckResult::pass("git binary", line.clone()));
            checks.push(check_version(&line));
        }
        Err(e) => {
            checks.push(CheckResult::fail("git binary", e.to_string()));
            checks.push(CheckResult::fail("git version", "git is not runnable"));
        }
    }

    checks.push(check_workspace(&engine, config).await);
    debug!(passed = checks.iter().filter(|c| c.ok).count(), total = checks.len(), "doctor finished");
    checks
}

fn check_version(line: &str) -> CheckResult {
    let (min_major, min_minor) = MIN_GIT_VERSION;
    match parse_git_version(line) {
        Some((major, minor, patch)) if (major, minor) >= (min_major, min_minor) => {
            CheckResult::pass("git version", format!("{major}.{minor}.{patch}"))
        }
        Some((major, minor, patch)) => CheckResult::fail(
            "git version",
            format!("{major}.{minor}.{patch} is older than {min_major}.{min_minor}"),
        ),
        None => CheckResult::fail("git version", format!("unrecognised version line: {line}")),
    }
}

async fn check_workspace(engine: &GitCliEngine, config: &EngineConfig) -> CheckResult {
    const NAME: &str = "workspace";
    if let Err(e) = std::fs::create_dir_all(&config.workspace_root) {
        return CheckResult::fail(NAME, format!("{}: {e}", config.workspace_root.display()));
    }
    let dir = match tempfile::Builder::new()
        .prefix("doctor-")
        .tempdir_in(&config.workspace_root)
    {
        Ok(dir) => dir,
        Err(e) => return CheckResult::fail(NAME, e.to_string()),
    };
    match engine.init(dir.path(), "main").await {
        Ok(()) => CheckResult::pass(NAME, config.workspace_root.display().to_string()),
        Err(e) => CheckResult::fail(NAME, e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_and_vendor_version_lines() {
        assert_eq!(parse_git_version("git version 2.43.0"), Some((2, 43, 0)));
        assert_eq!(
            parse_git_version("git version 2.39.3 (Apple Git-146)"),
            Some((2, 39, 3))
        );
        assert_eq!(
            parse_git_version("git version 2.45.1.windows.1"),
            Some((2, 45, 1))
        );
        assert_eq!(parse_git_version("git version 2.30"), Some((2, 30, 0)));
        assert_eq!(parse_git_version("git version 2.42.0-rc1\n"), Some((2, 42, 0)));
    }

    #[test]
    fn rejects_non_git_output() {
        assert_eq!(parse_git_version("hg version 6.1"), None);
        assert_eq!(parse_git_version(""), None);
        assert_eq!(parse_git_version("git version abc"), None);
    }

    #[test]
    fn version_floor() {
        assert!(check_version("git version 2.30.0").ok);
        assert!(check_version("git version 3.0.0").ok);
        let old = check_version("git version 2.29.9");
        assert!(!old.ok);
        assert!(old.detail.contains("older than 2.30"));
    }

    #[tokio::test]
    async fn missing_binary_fails_without_panicking() {
        let root = tempfile::tempdir().unwrap();
        let mut config = EngineConfig::default().with_workspace_root(root.path());
        config.git_bin = "definitely-not-git-xyz".to_string();

        let checks = run_doctor(&config).await;
        assert_eq!(checks.len(), 3);
        assert!(!checks[0].ok);
        assert!(!checks[1].ok);
        assert!(!checks[2].ok);
    }

    #[tokio::test]
    async fn healthy_environment_passes() {
        let root = tempfile::tempdir().unwrap();
        let config = EngineConfig::default().with_workspace_root(root.path());
        let checks = run_doctor(&config).await;
        assert_eq!(checks[0].name, "git binary");
        assert!(checks[0].ok, "{:?}", checks[0]);
        assert!(checks[2].ok, "{:?}", checks[2]);
    }
}
