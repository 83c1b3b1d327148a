// src/cli/progress.rs — Terminal renderer for session snapshots

use std::io::Write;

use crate::session::{Session, SessionStatus};

/// Turns successive snapshots into incremental terminal output.
///
/// Answer text goes to `out` (stdout); status lines go to `err` (stderr).
/// Only the new suffix of the streamed answer is written on each update.
pub struct TerminalRenderer<O: Write, E: Write> {
    out: O,
    err: E,
    printed: usize,
    fast_shown: bool,
    last_status: SessionStatus,
}

impl TerminalRenderer<std::io::Stdout, std::io::Stderr> {
    pub fn stdio() -> Self {
        Self::new(std::io::stdout(), std::io::stderr())
    }
}

impl<O: Write, E: Write> TerminalRenderer<O, E> {
    pub fn new(out: O, err: E) -> Self {
        Self {
            out,
            err,
            printed: 0,
            fast_shown: false,
            last_status: SessionStatus::Idle,
        }
    }

    pub fn render(&mut self, session: &Session) {
        // Write errors on a terminal are not actionable; drop them.
        let _ = self.try_render(session);
    }

    fn try_render(&mut self, session: &Session) -> std::io::Result<()> {
        if session.status == SessionStatus::AwaitingFastAnswer
            && self.last_status != SessionStatus::AwaitingFastAnswer
        {
            // New question.
            self.printed = 0;
            self.fast_shown = false;
            writeln!(self.err, "[ask] {}", session.question)?;
        }

        if !self.fast_shown && session.status == SessionStatus::Streaming {
            self.fast_shown = true;
            match &session.fast_answer {
                Some(fast) => {
                    writeln!(
                        self.err,
                        "[fast] {} · confidence {:.2} · {}ms{}",
                        fast.source_tier,
                        fast.confidence_score,
                        fast.elapsed_ms,
                        if fast.direct_answer_eligible {
                            " · direct"
                        } else {
                            ""
                        }
                    )?;
                    writeln!(self.out, "{}\n", fast.text)?;
                }
                None => writeln!(self.err, "[fast] no fast answer available")?,
            }
            writeln!(self.err, "[stream] receiving...")?;
        }

        if self.last_status.is_retryable() && session.status == SessionStatus::Streaming {
            writeln!(self.err, "[retry] reopening stream")?;
        }

        let text = session.streamed_answer();
        if text.len() < self.printed {
            // Replayed from the start after a retry; the terminal line
            // already ended the previous attempt.
            self.printed = 0;
        }
        if text.len() > self.printed {
            write!(self.out, "{}", &text[self.printed..])?;
            self.printed = text.len();
        }

        if session.status != self.last_status && session.status.is_terminal() {
            if self.printed > 0 {
                writeln!(self.out)?;
            }
            let secs = session.stream_elapsed_ms() as f64 / 1000.0;
            match session.status {
                SessionStatus::Completed => writeln!(
                    self.err,
                    "[done] {} fragments in {:.1}s",
                    session.fragment_count(),
                    secs
                )?,
                SessionStatus::Failed => writeln!(
                    self.err,
                    "[failed] {}",
                    session.error.as_deref().unwrap_or("unknown error")
                )?,
                _ => writeln!(
                    self.err,
                    "[interrupted] {}",
                    session.error.as_deref().unwrap_or("cancelled")
                )?,
            }
        }

        self.last_status = session.status;
        self.out.flush()?;
        self.err.flush()
    }
}
