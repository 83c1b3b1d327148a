// src/cli/ask.rs — One-shot question

use std::io::IsTerminal;

use anyhow::anyhow;

use crate::feedback::{FeedbackRecorder, FeedbackSubmission, Verdict};
use crate::infra::config::Config;
use crate::session::{SessionMachine, SessionStatus};

pub async fn run_ask(config: &Config, question: &str, ask_feedback: bool) -> anyhow::Result<()> {
    let (mut machine, recorder) = super::build_session(config)?;
    super::attach_terminal(&mut machine);

    machine.submit(question)?;
    super::drive(&mut machine).await;

    let interactive = std::io::stdin().is_terminal();
    while interactive && can_resume(&machine) {
        report_upstream_status(&machine).await;
        let again = inquire::Confirm::new("The answer stream stopped early. Retry?")
            .with_default(true)
            .prompt()
            .unwrap_or(false);
        if !again {
            break;
        }
        if let Err(e) = machine.retry() {
            eprintln!("[retry] {e}");
            break;
        }
        super::drive(&mut machine).await;
    }

    if ask_feedback && machine.status().is_terminal() {
        prompt_feedback(&machine, &recorder).await?;
    }

    let session = machine.session();
    match session.status {
        SessionStatus::Completed => Ok(()),
        status => Err(anyhow!(
            "session {}: {}",
            status,
            session.error.as_deref().unwrap_or("cancelled")
        )),
    }
}

/// A remote failure on a session the upstream knows about.
fn can_resume(machine: &SessionMachine) -> bool {
    let session = machine.session();
    session.status.is_retryable() && session.id.is_some() && session.error.is_some()
}

/// Ask the polling endpoint whether the upstream finished anyway.
pub(crate) async fn report_upstream_status(machine: &SessionMachine) {
    let Some(id) = machine.session().id.as_deref() else {
        return;
    };
    match machine.transport().fetch_status(id).await {
        Ok(remote) if remote.is_finished() => {
            eprintln!("[status] upstream finished session {id}; a retry should replay it")
        }
        Ok(remote) => eprintln!("[status] upstream reports session {id} as '{}'", remote.status),
        Err(e) => tracing::debug!("Status poll for {} failed: {}", id, e),
    }
}

async fn prompt_feedback(
    machine: &SessionMachine,
    recorder: &FeedbackRecorder,
) -> anyhow::Result<()> {
    let verdict = inquire::Select::new("Which answer was better?", Verdict::ALL.to_vec())
        .prompt()
        .map_err(|e| anyhow!("Input cancelled: {e}"))?;
    let comment = inquire::Text::new("Comment (optional):")
        .prompt()
        .unwrap_or_default();

    let submission = FeedbackSubmission::for_session(machine.session(), verdict, comment)?;
    let record = recorder.submit(submission).await?;
    eprintln!("[feedback] recorded '{}'", record.verdict);
    Ok(())
}
