//! The session actor: one task owning the [`Session`] and draining its command channel.

use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tracing::info;

use crate::{
    config::SessionConfig,
    dto::session::SessionSnapshot,
    error::ServiceError,
    services::scheduler::TokioScheduler,
    state::{
        ports::Outbox,
        session::{Session, SessionCommand},
    },
};

/// Handle held by the HTTP side to feed the session and read its snapshot.
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::UnboundedSender<SessionCommand>,
    snapshot: watch::Receiver<SessionSnapshot>,
}

impl SessionHandle {
    /// Queue a command for the session loop.
    pub fn dispatch(&self, command: SessionCommand) -> Result<(), ServiceError> {
        self.commands
            .send(command)
            .map_err(|_| ServiceError::SessionUnavailable)
    }

    /// Latest published snapshot.
    pub fn snapshot(&self) -> SessionSnapshot {
        self.snapshot.borrow().clone()
    }

    /// Subscribe to snapshot updates.
    pub fn watch(&self) -> watch::Receiver<SessionSnapshot> {
        self.snapshot.clone()
    }

    /// Whether the loop still accepts commands.
    pub fn is_running(&self) -> bool {
        !self.commands.is_closed()
    }
}

/// Build the session and spawn its loop on the current runtime.
pub fn spawn_session(config: SessionConfig, outbox: Arc<dyn Outbox>) -> SessionHandle {
    let (commands, receiver) = mpsc::unbounded_channel();
    let scheduler = TokioScheduler::new(commands.downgrade());
    let session = Session::new(config, outbox, scheduler);
    let (snapshot_tx, snapshot) = watch::channel(session.snapshot());

    tokio::spawn(run_session(session, receiver, snapshot_tx));

    SessionHandle { commands, snapshot }
}

async fn run_session(
    mut session: Session<TokioScheduler>,
    mut commands: mpsc::UnboundedReceiver<SessionCommand>,
    snapshot: watch::Sender<SessionSnapshot>,
) {
    info!(phase = ?session.phase(), "session loop started");
    while let Some(command) = commands.recv().await {
        session.handle(command);
        snapshot.send_if_modified(|current| {
            let next = session.snapshot();
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
    session.scheduler_mut().cancel_all();
    info!("session loop stopped");
}
