//! Tox messaging core.
//! One worker thread owns the engine and runs submitted commands in order;
//! the file transfer manager admits and assembles contact avatars.

pub mod bootstrap;
pub mod config;
pub mod engine;
pub mod file_transfer;
pub mod identity;
pub mod integrity;
pub mod listener;
pub mod protocol;
pub mod repository;
pub mod transfer;
pub mod worker;

pub use bootstrap::BootstrapNode;
pub use config::{Config, ConfigError, MAX_AVATAR_SIZE};
pub use engine::{Engine, EngineError, EngineOptions, ProxyOptions, SaveData};
pub use file_transfer::{ChunkOutcome, FileTransferManager, TransferError};
pub use identity::{IdentityError, PublicKey, ToxId};
pub use listener::{ChannelListener, EventListener};
pub use protocol::{Command, EngineEvent, FileKind, GroupCommand, OutboundAction, UserStatus};
pub use repository::{ContactRepository, FileTransferRepository};
pub use transfer::FileTransfer;
pub use worker::{spawn_worker, ProtocolWorker, Worker, WorkerError, WorkerHandle, WorkerSettings};
