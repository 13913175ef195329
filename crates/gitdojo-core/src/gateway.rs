//! Command Gateway: runs one player command against a stage repository.
//!
//! Commands are classified before anything touches the repository:
//!
//! - safe git verbs are passed to the engine, bounded by a timeout
//! - advanced verbs are recorded on the handle as simulated
//! - `ls`, `cat <path>` and `pwd` are answered natively
//! - everything else is rejected as unsupported
//!
//! No error escapes [`CommandGateway::execute`]; failures are reported in
//! the returned [`CommandOutcome`].

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::metrics::METRICS;
use crate::repo::{EngineResult, RepositoryEngine, RepositoryHandle};

/// Verbs delegated to the engine.
pub const SAFE_VERBS: &[&str] = &[
    "status",
    "log",
    "branch",
    "switch",
    "checkout",
    "add",
    "commit",
    "tag",
    "merge",
    "cherry-pick",
    "revert",
    "reset",
    "stash",
    "diff",
    "show",
    "reflog",
];

/// Verbs accepted but never executed.
pub const SIMULATED_VERBS: &[&str] = &[
    "rebase",
    "worktree",
    "bundle",
    "bisect",
    "notes",
    "replace",
    "filter-branch",
    "filter-repo",
];

const SHELL_OPERATORS: &[&str] = &["&&", "||", ";", "|", "$(", "`", ">", "<"];

const NO_OUTPUT: &str = "(no output)";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CommandErrorKind {
    EmptyCommand,
    UnsupportedCommand,
    ExecutionFailed,
}

/// How the gateway handled a command.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Disposition {
    /// Passed to the engine.
    Executed,
    /// Recorded on the handle, not run.
    Simulated,
    /// Answered by a built-in inspection command.
    Inspected,
    /// Refused before reaching the repository.
    Rejected,
}

impl Disposition {
    pub fn as_str(&self) -> &'static str {
        match self {
            Disposition::Executed => "executed",
            Disposition::Simulated => "simulated",
            Disposition::Inspected => "inspected",
            Disposition::Rejected => "rejected",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CommandOutcome {
    pub success: bool,
    pub output: String,
    pub error_kind: Option<CommandErrorKind>,
    pub disposition: Disposition,
    /// Normalised verb, when one could be identified.
    pub verb: Option<String>,
}

impl CommandOutcome {
    fn ok(disposition: Disposition, verb: &str, output: String) -> Self {
        Self {
            success: true,
            output: if output.trim().is_empty() {
                NO_OUTPUT.to_string()
            } else {
                output
            },
            error_kind: None,
            disposition,
            verb: Some(verb.to_string()),
        }
    }

    fn failed(disposition: Disposition, verb: &str, output: String) -> Self {
        Self {
            success: false,
            output,
            error_kind: Some(CommandErrorKind::ExecutionFailed),
            disposition,
            verb: Some(verb.to_string()),
        }
    }

    fn rejected(kind: CommandErrorKind, verb: Option<String>, output: impl Into<String>) -> Self {
        Self {
            success: false,
            output: output.into(),
            error_kind: Some(kind),
            disposition: Disposition::Rejected,
            verb,
        }
    }
}

/// A classified command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParsedCommand {
    Git { args: Vec<String> },
    Simulated { verb: String },
    List,
    Cat { path: Option<String> },
    Pwd,
}

/// Options that read or write files by path; none are needed in the dojo.
const FILE_OPTIONS: &[&str] = &[
    "--output",
    "--output-directory",
    "--no-index",
    "--file",
    "--template",
    "--pathspec-from-file",
];

/// Short forms of file options, per verb.
const SHORT_FILE_OPTIONS: &[(&str, &str)] = &[("commit", "-F"), ("commit", "-t"), ("tag", "-F")];

/// First shell operator outside quotes, if any. Quoted text and escaped
/// characters are blanked before matching.
fn unquoted_operator(raw: &str) -> Option<&'static str> {
    let mut bare = String::with_capacity(raw.len());
    let mut quote: Option<char> = None;
    let mut escaped = false;
    for c in raw.chars() {
        if escaped {
            escaped = false;
            bare.push(' ');
            continue;
        }
        match (quote, c) {
            (Some('\''), '\'') => quote = None,
            (Some('\''), _) => {}
            (_, '\\') => escaped = true,
            (Some(_), '"') => quote = None,
            (Some(_), _) => {}
            (None, '"' | '\'') => quote = Some(c),
            (None, _) => {
                bare.push(c);
                continue;
            }
        }
        bare.push(' ');
    }
    SHELL_OPERATORS.iter().copied().find(|op| bare.contains(op))
}

fn escapes_repository(value: &str) -> bool {
    std::path::Path::new(value).is_absolute()
        || value.starts_with('~')
        || value.split(&['/', '\\'][..]).any(|part| part == "..")
}

/// Refuse arguments that would make git read or write outside the stage
/// repository.
fn check_confined(args: &[String]) -> std::result::Result<(), String> {
    let verb = args.first().map(String::as_str).unwrap_or_default();
    let mut message_follows = false;
    for arg in args.iter().skip(1) {
        // Messages are free text, not paths.
        if std::mem::take(&mut message_follows) {
            continue;
        }
        if arg == "-m" || arg == "--message" {
            message_follows = true;
            continue;
        }
        if arg.starts_with("--message=") || (arg.starts_with("-m") && arg.len() > 2) {
            continue;
        }
        if arg.starts_with("--") {
            let name = arg.split_once('=').map_or(arg.as_str(), |(name, _)| name);
            if FILE_OPTIONS.contains(&name) {
                return Err(format!("option `{name}` is not allowed in the dojo"));
            }
        } else if let Some((_, short)) = SHORT_FILE_OPTIONS
            .iter()
            .find(|(v, short)| *v == verb && arg.starts_with(short))
        {
            return Err(format!("option `{short}` is not allowed in the dojo"));
        }

        let value = if arg.starts_with('-') {
            arg.split_once('=').map(|(_, value)| value)
        } else {
            Some(arg.as_str())
        };
        if value.is_some_and(escapes_repository) {
            return Err(format!("`{arg}` points outside the stage repository"));
        }
    }
    Ok(())
}

/// Classify a raw command line. Errors carry the kind and a player-facing
/// message.
pub fn parse_command(raw: &str) -> std::result::Result<ParsedCommand, (CommandErrorKind, String)> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err((CommandErrorKind::EmptyCommand, "enter a command".to_string()));
    }

    if let Some(op) = unquoted_operator(trimmed) {
        return Err((
            CommandErrorKind::UnsupportedCommand,
            format!("shell operator `{op}` is not allowed; run one command at a time"),
        ));
    }

    let Some(tokens) = shlex::split(trimmed) else {
        return Err((
            CommandErrorKind::UnsupportedCommand,
            "unbalanced quotes or trailing escape".to_string(),
        ));
    };
    let mut words = tokens.into_iter();
    let Some(first) = words.next() else {
        return Err((CommandErrorKind::EmptyCommand, "enter a command".to_string()));
    };

    match first.as_str() {
        "ls" => return Ok(ParsedCommand::List),
        "pwd" => return Ok(ParsedCommand::Pwd),
        "cat" => return Ok(ParsedCommand::Cat { path: words.next() }),
        _ => {}
    }

    let args: Vec<String> = if first == "git" {
        words.collect()
    } else {
        std::iter::once(first).chain(words).collect()
    };

    let Some(verb) = args.first().cloned() else {
        return Err((
            CommandErrorKind::UnsupportedCommand,
            "missing git subcommand".to_string(),
        ));
    };

    if verb.starts_with('-') {
        return Err((
            CommandErrorKind::UnsupportedCommand,
            format!("global git option `{verb}` is not allowed"),
        ));
    }
    if SIMULATED_VERBS.contains(&verb.as_str()) {
        return Ok(ParsedCommand::Simulated { verb });
    }
    if SAFE_VERBS.contains(&verb.as_str()) {
        check_confined(&args).map_err(|message| (CommandErrorKind::UnsupportedCommand, message))?;
        return Ok(ParsedCommand::Git { args });
    }

    Err((
        CommandErrorKind::UnsupportedCommand,
        format!("`{verb}` is not available in the dojo"),
    ))
}

/// Executes commands against repository handles.
pub struct CommandGateway {
    engine: Arc<dyn RepositoryEngine>,
    timeout: Duration,
}

impl CommandGateway {
    pub fn new(engine: Arc<dyn RepositoryEngine>, timeout: Duration) -> Self {
        Self { engine, timeout }
    }

    pub async fn execute(&self, handle: &mut RepositoryHandle, raw: &str) -> CommandOutcome {
        let parsed = match parse_command(raw) {
            Ok(parsed) => parsed,
            Err((kind, message)) => return CommandOutcome::rejected(kind, None, message),
        };

        let repo = handle.path().to_path_buf();
        match parsed {
            ParsedCommand::Git { args } => {
                let verb = args[0].clone();
                match self.bounded(self.engine.invoke(&repo, &args)).await {
                    Ok(out) if out.success => {
                        METRICS.inc_commands_executed();
                        CommandOutcome::ok(Disposition::Executed, &verb, out.combined())
                    }
                    Ok(out) => {
                        let text = out.combined();
                        let text = if text.is_empty() {
                            format!("git {verb} exited with {:?}", out.exit_code)
                        } else {
                            text
                        };
                        CommandOutcome::failed(Disposition::Executed, &verb, text)
                    }
                    Err(message) => CommandOutcome::failed(Disposition::Executed, &verb, message),
                }
            }
            ParsedCommand::Simulated { verb } => {
                handle.record_simulated(&verb, raw.trim());
                METRICS.inc_commands_simulated();
                CommandOutcome::ok(
                    Disposition::Simulated,
                    &verb,
                    format!(
                        "[simulated] `{}` recorded; advanced commands are not executed here",
                        raw.trim()
                    ),
                )
            }
            ParsedCommand::List => match self.bounded(self.engine.list_files(&repo)).await {
                Ok(files) => CommandOutcome::ok(Disposition::Inspected, "ls", files.join("\n")),
                Err(message) => CommandOutcome::failed(Disposition::Inspected, "ls", message),
            },
            ParsedCommand::Cat { path: None } => CommandOutcome::failed(
                Disposition::Inspected,
                "cat",
                "usage: cat <path>".to_string(),
            ),
            ParsedCommand::Cat { path: Some(path) } => {
                match self.bounded(self.engine.read_file(&repo, &path)).await {
                    Ok(Some(content)) => {
                        CommandOutcome::ok(Disposition::Inspected, "cat", content)
                    }
                    Ok(None) => CommandOutcome::failed(
                        Disposition::Inspected,
                        "cat",
                        format!("cat: {path}: No such file"),
                    ),
                    Err(message) => CommandOutcome::failed(Disposition::Inspected, "cat", message),
                }
            }
            ParsedCommand::Pwd => {
                CommandOutcome::ok(Disposition::Inspected, "pwd", repo.display().to_string())
            }
        }
    }

    async fn bounded<T>(
        &self,
        fut: impl Future<Output = EngineResult<T>>,
    ) -> std::result::Result<T, String> {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => Err(e.to_string()),
            Err(_) => Err(format!(
                "command timed out after {} ms",
                self.timeout.as_millis()
            )),
        }
    }
}
