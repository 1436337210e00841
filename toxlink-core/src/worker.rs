//! Protocol worker: the single owner of the engine.
//!
//! The engine lives on one dedicated thread running a current-thread runtime. Callers hold a
//! cloneable [`WorkerHandle`] and submit [`Command`]s without blocking; the worker runs them one at a
//! time in submission order. Iteration is driven by a single resettable timer: every `Iterate`
//! re-arms it with the delay the engine reports, so exactly one iteration is pending at any time.

use std::io;
use std::path::PathBuf;
use std::pin::Pin;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::time::{sleep_until, Instant, Sleep};
use tracing::{debug, error, info, warn};

use crate::bootstrap::BootstrapNode;
use crate::config::Config;
use crate::engine::{Engine, EngineError, EngineOptions, SaveData};
use crate::identity::ToxId;
use crate::listener::EventListener;
use crate::protocol::{Command, OutboundAction};

/// Everything the worker needs besides the engine constructor.
#[derive(Debug, Clone)]
pub struct WorkerSettings {
    pub options: EngineOptions,
    pub bootstrap_nodes: Vec<BootstrapNode>,
    pub save_path: PathBuf,
}

impl WorkerSettings {
    /// Build settings from config, loading the existing save file if there is one.
    pub fn from_config(config: &Config) -> io::Result<Self> {
        let save_path = config.save_path();
        let save_data = SaveData::load(&save_path)?;
        Ok(Self {
            options: EngineOptions::from_config(config, save_data),
            bootstrap_nodes: config.bootstrap_nodes.clone(),
            save_path,
        })
    }
}

/// Submission side of the worker's queue.
#[derive(Debug, Clone)]
pub struct WorkerHandle {
    tx: mpsc::UnboundedSender<Command>,
}

impl WorkerHandle {
    /// A handle and the queue it feeds, for hosts driving [`ProtocolWorker::run`] themselves.
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Command>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Enqueue a command. Never blocks. Fails once the worker has shut down.
    pub fn send(&self, command: Command) -> Result<(), WorkerError> {
        self.tx.send(command).map_err(|_| WorkerError::Stopped)
    }

    pub fn save(&self) -> Result<(), WorkerError> {
        self.send(Command::Save)
    }

    /// Send at most once; nothing runs after it.
    pub fn shutdown(&self) -> Result<(), WorkerError> {
        self.send(Command::Shutdown)
    }

    pub fn is_stopped(&self) -> bool {
        self.tx.is_closed()
    }
}

/// A worker running on its own thread.
pub struct Worker {
    handle: WorkerHandle,
    thread: std::thread::JoinHandle<()>,
}

impl Worker {
    pub fn handle(&self) -> WorkerHandle {
        self.handle.clone()
    }

    /// Wait for the worker thread to exit. It only exits after `Shutdown` has run or every
    /// handle, including clones given out by [`Worker::handle`], has been dropped.
    pub fn join(self) -> Result<(), WorkerError> {
        drop(self.handle);
        self.thread.join().map_err(|_| WorkerError::Panicked)
    }

    /// Queue `Shutdown` behind any pending commands and wait for the thread to exit.
    /// Outstanding handles do not keep it alive.
    pub fn shutdown(self) -> Result<(), WorkerError> {
        // Already stopped is fine; the join below still reports a panic.
        let _ = self.handle.shutdown();
        self.join()
    }
}

/// Start a worker on a dedicated thread named `tox`.
///
/// `create` runs on that thread, so the engine itself does not have to be `Send`.
/// Returns once the engine is constructed and bootstrapped; construction errors are returned here.
pub fn spawn_worker<E, F>(
    settings: WorkerSettings,
    create: F,
    listeners: Vec<Box<dyn EventListener + Send>>,
) -> Result<Worker, WorkerError>
where
    E: Engine + 'static,
    F: FnOnce(EngineOptions) -> Result<E, EngineError> + Send + 'static,
{
    let (handle, rx) = WorkerHandle::channel();
    let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<(), WorkerError>>();

    let thread = std::thread::Builder::new()
        .name("tox".into())
        .spawn(move || {
            let runtime = match tokio::runtime::Builder::new_current_thread()
                .enable_time()
                .build()
            {
                Ok(rt) => rt,
                Err(e) => {
                    let _ = ready_tx.send(Err(WorkerError::Spawn(e)));
                    return;
                }
            };
            runtime.block_on(async move {
                match ProtocolWorker::start(settings, create, listeners, rx) {
                    Ok(worker) => {
                        let _ = ready_tx.send(Ok(()));
                        worker.run().await;
                    }
                    Err(e) => {
                        error!(error = %e, "Failed to create engine");
                        let _ = ready_tx.send(Err(e.into()));
                    }
                }
            });
        })
        .map_err(WorkerError::Spawn)?;

    match ready_rx.recv() {
        Ok(Ok(())) => Ok(Worker { handle, thread }),
        Ok(Err(e)) => {
            let _ = thread.join();
            Err(e)
        }
        Err(_) => {
            let _ = thread.join();
            Err(WorkerError::Panicked)
        }
    }
}

/// The serialized execution stream owning the engine.
pub struct ProtocolWorker<E: Engine> {
    engine: E,
    commands: mpsc::UnboundedReceiver<Command>,
    listeners: Vec<Box<dyn EventListener + Send>>,
    save_path: PathBuf,
    /// The one pending iteration.
    next_iterate: Pin<Box<Sleep>>,
}

impl<E: Engine> ProtocolWorker<E> {
    /// Construct the engine and register bootstrap nodes. The first iteration is due immediately.
    /// Must be called inside a runtime with time enabled.
    pub fn start<F>(
        settings: WorkerSettings,
        create: F,
        listeners: Vec<Box<dyn EventListener + Send>>,
        commands: mpsc::UnboundedReceiver<Command>,
    ) -> Result<Self, EngineError>
    where
        F: FnOnce(EngineOptions) -> Result<E, EngineError>,
    {
        info!(save_data = ?settings.options.save_data, "Starting engine");
        let mut engine = create(settings.options)?;

        for node in &settings.bootstrap_nodes {
            let key = match node.public_key() {
                Ok(k) => k,
                Err(e) => {
                    warn!(host = %node.host, error = %e, "Skipping bootstrap node with malformed key");
                    continue;
                }
            };
            if let Err(e) = engine.bootstrap(&node.host, node.port, &key) {
                warn!(host = %node.host, port = node.port, error = %e, "Bootstrap failed");
            }
        }

        Ok(Self {
            engine,
            commands,
            listeners,
            save_path: settings.save_path,
            next_iterate: Box::pin(sleep_until(Instant::now())),
        })
    }

    /// Run until `Shutdown`, or until every handle is dropped.
    pub async fn run(mut self) {
        info!("Protocol worker started");
        'run: loop {
            tokio::select! {
                biased;

                () = &mut self.next_iterate => {
                    self.iterate();
                    // Commands already queued run before the next iteration, even if it is due now.
                    for _ in 0..self.commands.len() {
                        let Ok(command) = self.commands.try_recv() else {
                            break;
                        };
                        if self.handle_command(command) {
                            break 'run;
                        }
                    }
                }

                command = self.commands.recv() => {
                    let command = command.unwrap_or_else(|| {
                        info!("All worker handles dropped");
                        Command::Shutdown
                    });
                    if self.handle_command(command) {
                        break;
                    }
                }
            }
        }
        info!("Protocol worker stopped");
    }

    /// Execute one command. Returns true only for shutdown.
    fn handle_command(&mut self, command: Command) -> bool {
        match command {
            Command::Iterate => self.iterate(),
            Command::Save => self.save(),
            Command::Shutdown => {
                info!("Shutting down engine");
                self.engine.release();
                return true;
            }
            Command::SetName(name) => {
                debug!(name = %name, "SetName");
                if let Err(e) = self.engine.set_name(&name) {
                    warn!(error = %e, "Failed to set name");
                }
            }
            Command::SetStatus(status) => {
                debug!(?status, "SetStatus");
                self.engine.set_status(status);
            }
            Command::SetUserState(message) => {
                debug!("SetUserState");
                if let Err(e) = self.engine.set_status_message(&message) {
                    warn!(error = %e, "Failed to set status message");
                }
            }
            Command::SetTyping {
                friend_number,
                typing,
            } => {
                if let Err(e) = self.engine.set_typing(friend_number, typing) {
                    warn!(friend_number, error = %e, "Failed to set typing");
                }
            }
            Command::AddContact { tox_id, message } => self.add_contact(&tox_id, &message),
            Command::DeleteContact(friend_number) => {
                info!(friend_number, "Delete contact");
                if let Err(e) = self.engine.delete_contact(friend_number) {
                    warn!(friend_number, error = %e, "Failed to delete contact");
                }
            }
            Command::SendMessage {
                friend_number,
                text,
            } => {
                debug!(friend_number, "Sending message");
                if let Err(e) = self.engine.send_message(friend_number, &text) {
                    warn!(friend_number, error = %e, "Failed to send message");
                }
            }
            Command::AcceptContactRequest(public_key) => {
                match self.engine.accept_contact_request(&public_key) {
                    Ok(friend_number) => {
                        info!(friend_number, contact = %public_key.short(), "Accepted contact request")
                    }
                    Err(e) => {
                        warn!(contact = %public_key.short(), error = %e, "Failed to accept contact request")
                    }
                }
            }
            Command::Group(group) => {
                debug!(command = ?group, "Group chats are not supported, ignoring");
            }
        }
        false
    }

    fn iterate(&mut self) {
        let events = self.engine.iterate();
        for event in &events {
            let actions: Vec<OutboundAction> = self
                .listeners
                .iter_mut()
                .flat_map(|l| l.on_event(event))
                .collect();
            for action in actions {
                self.apply(action);
            }
        }

        let interval = self.engine.iteration_interval();
        self.next_iterate
            .as_mut()
            .reset(Instant::now() + Duration::from_millis(interval.into()));
    }

    fn apply(&mut self, action: OutboundAction) {
        let result = match action {
            OutboundAction::StartFileTransfer(pk, file_number) => {
                self.engine.start_file_transfer(&pk, file_number)
            }
            OutboundAction::StopFileTransfer(pk, file_number) => {
                self.engine.stop_file_transfer(&pk, file_number)
            }
        };
        if let Err(e) = result {
            warn!(?action, error = %e, "File control rejected by engine");
        }
    }

    fn add_contact(&mut self, tox_id: &str, message: &str) {
        let id = match ToxId::from_hex(tox_id) {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "Refusing malformed contact id");
                return;
            }
        };
        match self.engine.add_contact(&id, message) {
            Ok(friend_number) => {
                info!(friend_number, contact = %id.public_key().short(), "Contact request sent")
            }
            Err(e) => warn!(contact = %id.public_key().short(), error = %e, "Failed to add contact"),
        }
    }

    fn save(&mut self) {
        let data = self.engine.save_data();
        match SaveData::store(&self.save_path, &data) {
            Ok(()) => debug!(path = %self.save_path.display(), bytes = data.len(), "Saved"),
            Err(e) => error!(path = %self.save_path.display(), error = %e, "Failed to save"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum WorkerError {
    #[error("worker has shut down")]
    Stopped,
    #[error("failed to start worker thread: {0}")]
    Spawn(#[source] io::Error),
    #[error("engine error: {0}")]
    Engine(#[from] EngineError),
    #[error("worker thread panicked")]
    Panicked,
}
