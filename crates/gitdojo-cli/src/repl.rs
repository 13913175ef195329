//! Interactive play loop.
//!
//! Lines starting with `:` are dojo commands; everything else is handed to
//! the command gateway as a git command.

use std::io::Write;

use anyhow::Result;
use gitdojo_core::{
    DojoError, SessionId, SessionManager, SessionSummary, StageView, SubmitResponse,
};
use tokio::io::{AsyncBufRead, AsyncBufReadExt};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReplCommand {
    Git(String),
    Hint,
    Solution,
    Reset,
    Status,
    Restart,
    Help,
    Quit,
    Unknown(String),
    Blank,
}

pub fn parse_line(line: &str) -> ReplCommand {
    let line = line.trim();
    if line.is_empty() {
        return ReplCommand::Blank;
    }
    let Some(directive) = line.strip_prefix(':') else {
        return ReplCommand::Git(line.to_string());
    };
    match directive.trim().to_ascii_lowercase().as_str() {
        "hint" | "h" => ReplCommand::Hint,
        "solution" | "solve" => ReplCommand::Solution,
        "reset" => ReplCommand::Reset,
        "status" | "s" => ReplCommand::Status,
        "restart" => ReplCommand::Restart,
        "help" | "?" => ReplCommand::Help,
        "quit" | "q" | "exit" => ReplCommand::Quit,
        other => ReplCommand::Unknown(other.to_string()),
    }
}

const HELP: &str = "\
commands:
  <git command>   run it in the stage repository (the leading `git` is optional)
  ls | cat <path> | pwd
  :hint           show the hint (the first help resets the stage once)
  :solution       show the solution
  :reset          rebuild the stage repository
  :status         show the current stage and progress
  :restart        start over from stage 1
  :quit           leave the dojo";

pub fn render_stage(view: &StageView) -> String {
    let mut out = format!(
        "\n== Stage {}/{}: {} ==\n{}\n",
        view.position, view.total_stages, view.title, view.objective
    );
    for constraint in &view.constraints {
        out.push_str(&format!("  - {constraint}\n"));
    }
    if view.repeated {
        out.push_str("(repeat attempt)\n");
    }
    match &view.repo_path {
        Some(path) => out.push_str(&format!("repository: {}\n", path.display())),
        None => out.push_str("repository: rebuilding on next command\n"),
    }
    out
}

pub fn render_submit(response: &SubmitResponse) -> String {
    let mut out = String::new();
    out.push_str(response.command.output.trim_end());
    out.push('\n');
    if response.stage_advanced {
        if let Some(outcome) = &response.outcome {
            out.push_str(&format!(
                "stage {} passed in {} commands ({:.1}s)\n",
                outcome.stage_id,
                outcome.commands,
                outcome.elapsed_ms as f64 / 1000.0
            ));
        }
    } else if let Some(reason) = response.validation.reason() {
        out.push_str(&format!("not yet: {reason}\n"));
    }
    if let Some(next) = &response.next_stage {
        out.push_str(&render_stage(next));
    }
    out
}

pub fn render_summary(summary: &SessionSummary) -> String {
    format!(
        "{}: {}/{} stages, {} commands, score {:.0} ({})\n",
        summary.player,
        summary.completed_stage_ids.len(),
        summary.total_stage_count,
        summary.metrics.total_commands,
        summary.score,
        summary.state
    )
}

/// Run the loop until `:quit`, end of input or the last stage passes.
pub async fn run<R, W>(manager: &SessionManager, player: &str, input: R, out: &mut W) -> Result<()>
where
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let (mut id, view) = manager.start_session(player).await?;
    writeln!(out, "Welcome to the dojo, {player}. Type :help for commands.")?;
    write!(out, "{}", render_stage(&view))?;

    let mut lines = input.lines();
    loop {
        write!(out, "gitdojo> ")?;
        out.flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };

        match step(manager, &mut id, parse_line(&line)).await {
            Ok(Step::Continue(text)) => write!(out, "{text}")?,
            Ok(Step::Finished(text)) => {
                write!(out, "{text}")?;
                break;
            }
            Err(e) => {
                debug!(error = %e, "request failed");
                writeln!(out, "error: {e}")?;
            }
        }
    }

    let summary = manager.end_session(id).await?;
    write!(out, "{}", render_summary(&summary))?;
    Ok(())
}

enum Step {
    Continue(String),
    Finished(String),
}

async fn step(
    manager: &SessionManager,
    id: &mut SessionId,
    command: ReplCommand,
) -> std::result::Result<Step, DojoError> {
    let text = match command {
        ReplCommand::Blank => String::new(),
        ReplCommand::Help => format!("{HELP}\n"),
        ReplCommand::Quit => return Ok(Step::Finished(String::new())),
        ReplCommand::Unknown(other) => format!("unknown command `:{other}`; try :help\n"),
        ReplCommand::Git(raw) => {
            let response = manager.submit_command(*id, &raw).await?;
            let mut text = render_submit(&response);
            if response.completed {
                text.push_str("All stages completed!\n");
                if !response.ledger_recorded {
                    text.push_str("(the result could not be saved to the leaderboard)\n");
                }
                return Ok(Step::Finished(text));
            }
            text
        }
        ReplCommand::Hint => {
            let help = manager.request_hint(*id).await?;
            help_text("hint", &help.text, help.repeat_triggered)
        }
        ReplCommand::Solution => {
            let help = manager.request_solution(*id).await?;
            help_text("solution", &help.text, help.repeat_triggered)
        }
        ReplCommand::Reset => render_stage(&manager.reset_stage(*id).await?),
        ReplCommand::Status => {
            let summary = manager.summary(*id).await?;
            let mut text = render_summary(&summary);
            if let Ok(view) = manager.view(*id).await {
                text.push_str(&render_stage(&view));
            }
            text
        }
        ReplCommand::Restart => {
            *id = manager.restart(*id).await?;
            render_stage(&manager.start(*id).await?)
        }
    };
    Ok(Step::Continue(text))
}

fn help_text(label: &str, text: &str, reset: bool) -> String {
    let mut out = format!("{label}: {text}\n");
    if reset {
        out.push_str("The stage was reset and will count as a repeat.\n");
    }
    out
}
