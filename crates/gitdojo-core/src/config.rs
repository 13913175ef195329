//! Engine configuration.
//!
//! Defaults are usable as-is; `from_env` overlays `GITDOJO_*` variables.

use std::path::PathBuf;
use std::time::Duration;

/// Env var naming the directory that holds per-attempt repositories.
pub const ENV_WORKSPACE: &str = "GITDOJO_WORKSPACE";
/// Env var bounding a single engine call, in milliseconds.
pub const ENV_COMMAND_TIMEOUT_MS: &str = "GITDOJO_COMMAND_TIMEOUT_MS";
/// Env var for the number of bootstrap attempts before giving up.
pub const ENV_BOOTSTRAP_ATTEMPTS: &str = "GITDOJO_BOOTSTRAP_ATTEMPTS";
/// Env var overriding the git executable.
pub const ENV_GIT_BIN: &str = "GITDOJO_GIT_BIN";

/// Runtime settings for the repository engine and session runtime.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    pub workspace_root: PathBuf,
    pub command_timeout: Duration,
    pub bootstrap_attempts: u32,
    pub git_bin: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            workspace_root: std::env::temp_dir().join("gitdojo"),
            command_timeout: Duration::from_secs(30),
            bootstrap_attempts: 3,
            git_bin: "git".to_string(),
        }
    }
}

impl EngineConfig {
    /// Defaults overlaid with any `GITDOJO_*` environment variables.
    ///
    /// Unparseable numeric values are ignored with a warning.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut cfg = Self::default();

        if let Some(root) = lookup(ENV_WORKSPACE).filter(|v| !v.trim().is_empty()) {
            cfg.workspace_root = PathBuf::from(root);
        }
        if let Some(raw) = lookup(ENV_COMMAND_TIMEOUT_MS) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => cfg.command_timeout = Duration::from_millis(ms),
                _ => tracing::warn!(var = ENV_COMMAND_TIMEOUT_MS, value = %raw, "ignoring invalid value"),
            }
        }
        if let Some(raw) = lookup(ENV_BOOTSTRAP_ATTEMPTS) {
            match raw.trim().parse::<u32>() {
                Ok(n) if n > 0 => cfg.bootstrap_attempts = n,
                _ => tracing::warn!(var = ENV_BOOTSTRAP_ATTEMPTS, value = %raw, "ignoring invalid value"),
            }
        }
        if let Some(bin) = lookup(ENV_GIT_BIN).filter(|v| !v.trim().is_empty()) {
            cfg.git_bin = bin;
        }
        cfg
    }

    pub fn with_workspace_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.workspace_root = root.into();
        self
    }

    pub fn with_command_timeout(mut self, timeout: Duration) -> Self {
        self.command_timeout = timeout;
        self
    }

    pub fn with_bootstrap_attempts(mut self, attempts: u32) -> Self {
        self.bootstrap_attempts = attempts.max(1);
        self
    }
}
