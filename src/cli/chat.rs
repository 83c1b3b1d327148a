// src/cli/chat.rs — Interactive REPL

use std::future::Future;
use std::io::BufRead;

use tokio::sync::mpsc;

use crate::feedback::{FeedbackRecorder, FeedbackSubmission, Verdict};
use crate::infra::config::Config;
use crate::session::SessionMachine;

/// What the prompt produced.
#[derive(Debug, PartialEq)]
enum PromptInput {
    Line(String),
    Eof,
    Interrupted,
}

/// Run the interactive question loop.
pub async fn run_chat(config: &Config) -> anyhow::Result<()> {
    let (mut machine, recorder) = super::build_session(config)?;
    super::attach_terminal(&mut machine);

    eprintln!(
        "dualqa v{} | {} | /help for commands, Ctrl-C cancels a running answer or exits at the prompt\n",
        env!("CARGO_PKG_VERSION"),
        config.upstream.base_url,
    );

    let mut lines = spawn_stdin_reader();
    loop {
        print_prompt();
        let interrupt = async {
            let _ = tokio::signal::ctrl_c().await;
        };
        let input = match next_input(lines.recv(), interrupt).await {
            PromptInput::Line(line) => line,
            PromptInput::Interrupted => {
                eprintln!();
                break;
            }
            PromptInput::Eof => break,
        };
        let trimmed = input.trim();

        if trimmed.is_empty() {
            continue;
        }
        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }
        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, &mut machine, &recorder).await;
            continue;
        }

        match machine.submit(trimmed) {
            Ok(()) => super::drive(&mut machine).await,
            Err(e) => eprintln!("error: {e}"),
        }
    }

    Ok(())
}

fn print_prompt() {
    use std::io::Write;

    print!("> ");
    std::io::stdout().flush().ok();
}

/// Read stdin lines on a detached thread. Once `drive` has installed the
/// Ctrl-C handler the signal no longer ends the process, so the prompt
/// races each read against it.
fn spawn_stdin_reader() -> mpsc::UnboundedReceiver<String> {
    let (tx, rx) = mpsc::unbounded_channel();
    std::thread::spawn(move || {
        for line in std::io::stdin().lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Wait for the next line; an interrupt wins over a line arriving together.
async fn next_input(
    line: impl Future<Output = Option<String>>,
    interrupt: impl Future<Output = ()>,
) -> PromptInput {
    tokio::select! {
        biased;
        _ = interrupt => PromptInput::Interrupted,
        line = line => match line {
            Some(line) => PromptInput::Line(line),
            None => PromptInput::Eof,
        },
    }
}

async fn handle_slash_command(
    input: &str,
    machine: &mut SessionMachine,
    recorder: &FeedbackRecorder,
) {
    let (cmd, arg) = input.split_once(' ').unwrap_or((input, ""));
    let arg = arg.trim();

    match cmd {
        "/help" => {
            eprintln!("  /retry                      reopen an interrupted or failed stream");
            eprintln!("  /cancel                     stop the current answer (Ctrl-C while streaming)");
            eprintln!("  /feedback <verdict> [text]  fast | streamed | both | neither");
            eprintln!("  /status                     ask the upstream about this session");
            eprintln!("  /clear                      forget the current session");
            eprintln!("  /quit                       leave (Ctrl-C at the prompt also exits)");
        }
        "/retry" => match machine.retry() {
            Ok(()) => super::drive(machine).await,
            Err(e) => eprintln!("error: {e}"),
        },
        "/cancel" => {
            if let Err(e) = machine.cancel() {
                eprintln!("error: {e}");
            }
        }
        "/feedback" => {
            let (verdict, comment) = arg.split_once(' ').unwrap_or((arg, ""));
            let result = async {
                let verdict: Verdict = verdict.parse()?;
                let submission =
                    FeedbackSubmission::for_session(machine.session(), verdict, comment.trim())?;
                recorder.submit(submission).await
            }
            .await;
            match result {
                Ok(record) => eprintln!("[feedback] recorded '{}'", record.verdict),
                Err(e) => eprintln!("error: {e}"),
            }
        }
        "/status" => {
            let session = machine.session();
            eprintln!(
                "[session] {} | id {} | {} fragments",
                session.status,
                session.id.as_deref().unwrap_or("-"),
                session.fragment_count()
            );
            super::ask::report_upstream_status(machine).await;
        }
        "/clear" => machine.clear(),
        other => eprintln!("unknown command: {other} (try /help)"),
    }
}
