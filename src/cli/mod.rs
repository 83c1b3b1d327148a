// src/cli/mod.rs — CLI definition (clap derive)

pub mod ask;
pub mod chat;
pub mod progress;
pub mod serve;
pub mod status;

use std::sync::{Arc, Mutex};

use clap::{Parser, Subcommand};

use crate::feedback::FeedbackRecorder;
use crate::infra::config::Config;
use crate::session::SessionMachine;
use crate::transport::http::HttpTransport;
use crate::transport::Transport;
use progress::TerminalRenderer;

#[derive(Parser)]
#[command(
    name = "dualqa",
    about = "Ask once: get a fast answer now and a thorough one streamed",
    version
)]
pub struct Cli {
    /// Config file path
    #[arg(long, global = true)]
    pub config: Option<String>,

    /// Answer service base URL (overrides config)
    #[arg(long, global = true)]
    pub base_url: Option<String>,

    /// Caller identifier sent with each question (overrides config)
    #[arg(long, global = true)]
    pub caller: Option<String>,

    /// Log level used when RUST_LOG is unset
    #[arg(long, global = true, default_value = "warn")]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask a single question and stream the answer
    Ask {
        /// The question
        #[arg(required = true, trailing_var_arg = true)]
        question: Vec<String>,
        /// Prompt for a fast-vs-streamed verdict when done
        #[arg(long)]
        feedback: bool,
    },
    /// Interactive session: one question after another
    Chat,
    /// Query the upstream status of a session (polling fallback)
    Status {
        /// Session id returned by the answer service
        session_id: String,
    },
    /// Serve the local HTTP API for UI front-ends
    Serve {
        /// Port to listen on (overrides config)
        #[arg(long)]
        port: Option<u16>,
    },
}

impl Cli {
    /// Apply command-line overrides on top of the loaded config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(ref url) = self.base_url {
            config.upstream.base_url = url.clone();
        }
        if let Some(ref caller) = self.caller {
            config.session.caller_id = caller.clone();
        }
        if let Commands::Serve { port: Some(port) } = self.command {
            config.api.port = port;
        }
    }
}

/// Wire a machine and a feedback recorder over one HTTP transport.
///
/// The recorder observes the machine so it can reject stale feedback.
pub fn build_session(config: &Config) -> anyhow::Result<(SessionMachine, Arc<FeedbackRecorder>)> {
    let transport: Arc<dyn Transport> = Arc::new(HttpTransport::new(&config.upstream)?);
    let mut machine = SessionMachine::new(transport.clone(), config.session.clone());
    let recorder = Arc::new(FeedbackRecorder::new(transport));
    let tracker = recorder.clone();
    machine.subscribe(move |session| tracker.track(session));
    Ok((machine, recorder))
}

/// Render every snapshot of `machine` to the terminal.
pub fn attach_terminal(machine: &mut SessionMachine) {
    let renderer = Mutex::new(TerminalRenderer::stdio());
    machine.subscribe(move |session| {
        if let Ok(mut r) = renderer.lock() {
            r.render(session);
        }
    });
}

/// Drive the machine until it settles; Ctrl-C cancels the active session.
pub async fn drive(machine: &mut SessionMachine) {
    while machine.status().is_active() {
        tokio::select! {
            alive = machine.step() => {
                if !alive {
                    break;
                }
            }
            _ = tokio::signal::ctrl_c() => {
                if let Err(e) = machine.cancel() {
                    tracing::debug!("Ctrl-C ignored: {}", e);
                }
            }
        }
    }
}
