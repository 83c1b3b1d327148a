// src/session/handle.rs — Message-passing handle to a running SessionMachine
//
// The machine lives in a single task. Commands arrive over mpsc with oneshot
// replies; every published snapshot is fanned out over a broadcast channel so
// any number of remote observers see each update in order.

use tokio::sync::{broadcast, mpsc, oneshot};

use super::machine::SessionMachine;
use super::types::Session;
use crate::infra::errors::QaError;

const COMMAND_BUFFER: usize = 32;
const UPDATE_BUFFER: usize = 1024;

pub enum SessionCommand {
    Submit {
        question: String,
        resp: oneshot::Sender<Result<Session, QaError>>,
    },
    Retry {
        resp: oneshot::Sender<Result<Session, QaError>>,
    },
    Cancel {
        resp: oneshot::Sender<Result<Session, QaError>>,
    },
    Clear {
        resp: oneshot::Sender<Session>,
    },
    Snapshot {
        resp: oneshot::Sender<Session>,
    },
}

#[derive(Clone)]
pub struct SessionHandle {
    tx: mpsc::Sender<SessionCommand>,
    updates: broadcast::Sender<Session>,
}

impl SessionHandle {
    /// Move `machine` into its own task and return a handle to it.
    pub fn spawn(mut machine: SessionMachine) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
        let (updates, _) = broadcast::channel(UPDATE_BUFFER);

        let fanout = updates.clone();
        machine.subscribe(move |session| {
            // No receivers is fine; nobody is watching right now.
            let _ = fanout.send(session.clone());
        });

        tokio::spawn(run_session_actor(machine, rx));
        Self { tx, updates }
    }

    /// Receive every snapshot published from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<Session> {
        self.updates.subscribe()
    }

    pub async fn submit(&self, question: impl Into<String>) -> Result<Session, QaError> {
        let question = question.into();
        self.request(|resp| SessionCommand::Submit { question, resp })
            .await?
    }

    pub async fn retry(&self) -> Result<Session, QaError> {
        self.request(|resp| SessionCommand::Retry { resp }).await?
    }

    pub async fn cancel(&self) -> Result<Session, QaError> {
        self.request(|resp| SessionCommand::Cancel { resp }).await?
    }

    pub async fn clear(&self) -> Result<Session, QaError> {
        self.request(|resp| SessionCommand::Clear { resp }).await
    }

    pub async fn snapshot(&self) -> Result<Session, QaError> {
        self.request(|resp| SessionCommand::Snapshot { resp }).await
    }

    async fn request<T>(
        &self,
        build: impl FnOnce(oneshot::Sender<T>) -> SessionCommand,
    ) -> Result<T, QaError> {
        let (resp_tx, resp_rx) = oneshot::channel();
        self.tx
            .send(build(resp_tx))
            .await
            .map_err(|_| anyhow::anyhow!("session actor has stopped"))?;
        Ok(resp_rx
            .await
            .map_err(|_| anyhow::anyhow!("session actor dropped the request"))?)
    }
}

async fn run_session_actor(mut machine: SessionMachine, mut rx: mpsc::Receiver<SessionCommand>) {
    tracing::debug!("Session actor started");
    loop {
        tokio::select! {
            command = rx.recv() => match command {
                Some(command) => handle_command(&mut machine, command),
                None => break,
            },
            _ = machine.step() => {}
        }
    }
    tracing::debug!("Session actor stopped");
}

fn handle_command(machine: &mut SessionMachine, command: SessionCommand) {
    match command {
        SessionCommand::Submit { question, resp } => {
            let result = machine.submit(&question).map(|_| machine.session().clone());
            let _ = resp.send(result);
        }
        SessionCommand::Retry { resp } => {
            let result = machine.retry().map(|_| machine.session().clone());
            let _ = resp.send(result);
        }
        SessionCommand::Cancel { resp } => {
            let result = machine.cancel().map(|_| machine.session().clone());
            let _ = resp.send(result);
        }
        SessionCommand::Clear { resp } => {
            machine.clear();
            let _ = resp.send(machine.session().clone());
        }
        SessionCommand::Snapshot { resp } => {
            let _ = resp.send(machine.session().clone());
        }
    }
}
