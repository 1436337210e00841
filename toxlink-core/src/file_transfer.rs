//! Incoming file transfers: admission policy, pre-allocated storage, positioned chunk writes.
//!
//! Only avatars are accepted. Each accepted avatar gets a file in the avatar directory,
//! sized up front to the declared length so chunks can land in any order. The transfer
//! stays in the active map, owning its file handle, until the last byte is written.

use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Seek, SeekFrom, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::Config;
use crate::identity::PublicKey;
use crate::integrity;
use crate::listener::EventListener;
use crate::protocol::{EngineEvent, FileKind, OutboundAction};
use crate::repository::{ContactRepository, FileTransferRepository};
use crate::transfer::{FileTransfer, TransferKey};

/// Accepted transfer and the handle its chunks are written through.
struct ActiveTransfer {
    ft: FileTransfer,
    path: PathBuf,
    file: File,
}

/// Result of applying one chunk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChunkOutcome {
    /// No active transfer under that key.
    UnknownTransfer,
    /// Written; transfer not complete yet.
    InProgress { progress: u64 },
    /// Range falls outside the declared size. Nothing written.
    OutOfBounds,
    /// Last byte written; the contact's avatar now points at this file.
    Complete(PathBuf),
    /// All bytes arrived but the content does not match the announced id. File removed.
    Corrupt,
    /// Local I/O failed. Transfer dropped.
    Failed,
}

pub struct FileTransferManager {
    avatar_dir: PathBuf,
    max_avatar_size: u64,
    contacts: Arc<dyn ContactRepository>,
    transfers: Arc<dyn FileTransferRepository>,
    active: HashMap<TransferKey, ActiveTransfer>,
}

impl FileTransferManager {
    pub fn new(
        avatar_dir: PathBuf,
        max_avatar_size: u64,
        contacts: Arc<dyn ContactRepository>,
        transfers: Arc<dyn FileTransferRepository>,
    ) -> Self {
        Self {
            avatar_dir,
            max_avatar_size,
            contacts,
            transfers,
            active: HashMap::new(),
        }
    }

    pub fn from_config(
        config: &Config,
        contacts: Arc<dyn ContactRepository>,
        transfers: Arc<dyn FileTransferRepository>,
    ) -> Self {
        Self::new(config.avatar_dir(), config.max_avatar_size, contacts, transfers)
    }

    /// Classify an offered transfer and decide. Always yields exactly one engine action.
    pub fn add(&mut self, ft: FileTransfer) -> OutboundAction {
        info!(
            file_number = ft.file_number,
            contact = %ft.public_key.short(),
            kind = ?ft.kind,
            size = ft.file_size,
            "Add"
        );
        match ft.kind {
            FileKind::Data => {
                // Needs an accept/reject prompt in the conversation before we can take these.
                warn!(
                    file_number = ft.file_number,
                    file_name = %ft.file_name,
                    contact = %ft.public_key.short(),
                    "Ignoring non-avatar file transfer"
                );
                self.reject(&ft)
            }
            FileKind::Avatar => self.add_avatar(ft),
            FileKind::Unknown(raw) => {
                error!(kind = raw, contact = %ft.public_key.short(), "Got unknown file kind");
                self.reject(&ft)
            }
        }
    }

    fn add_avatar(&mut self, ft: FileTransfer) -> OutboundAction {
        if ft.file_size == 0 {
            debug!(contact = %ft.public_key.short(), "Contact cleared their avatar");
            self.contacts.set_avatar(&ft.public_key, None);
            return self.reject(&ft);
        }
        if ft.file_size > self.max_avatar_size {
            warn!(
                size = ft.file_size,
                max = self.max_avatar_size,
                contact = %ft.public_key.short(),
                "Got trash avatar"
            );
            self.contacts.set_avatar(&ft.public_key, None);
            return self.reject(&ft);
        }
        let path = match self.avatar_path(&ft.file_name) {
            Ok(p) => p,
            Err(e) => {
                warn!(contact = %ft.public_key.short(), error = %e, "Refusing avatar");
                return self.reject(&ft);
            }
        };
        if let Some(id) = ft.file_id {
            if already_stored(&path, ft.file_size, &id) {
                info!(contact = %ft.public_key.short(), "Avatar already stored");
                self.contacts.set_avatar(&ft.public_key, Some(&path));
                return self.reject(&ft);
            }
        }

        self.transfers.add(&ft);
        let (public_key, file_number) = ft.key();
        match self.accept(ft, path) {
            Ok(action) => action,
            Err(e) => {
                error!(contact = %public_key.short(), file_number, error = %e, "Failed to prepare avatar file");
                self.transfers.remove(&public_key, file_number);
                OutboundAction::StopFileTransfer(public_key, file_number)
            }
        }
    }

    fn accept(&mut self, ft: FileTransfer, path: PathBuf) -> Result<OutboundAction, TransferError> {
        info!(file_number = ft.file_number, contact = %ft.public_key.short(), "Accept");
        std::fs::create_dir_all(&self.avatar_dir)?;

        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)?;
        file.set_len(ft.file_size)?;

        let action = OutboundAction::StartFileTransfer(ft.public_key, ft.file_number);
        if self
            .active
            .insert(ft.key(), ActiveTransfer { ft, path, file })
            .is_some()
        {
            debug!("Replaced stale transfer with the same file number");
        }
        Ok(action)
    }

    fn reject(&self, ft: &FileTransfer) -> OutboundAction {
        info!(file_number = ft.file_number, contact = %ft.public_key.short(), "Reject");
        OutboundAction::StopFileTransfer(ft.public_key, ft.file_number)
    }

    /// Write one received byte range. Chunks may arrive in any order.
    pub fn add_data(
        &mut self,
        public_key: &PublicKey,
        file_number: u32,
        position: u64,
        data: &[u8],
    ) -> ChunkOutcome {
        let key = (*public_key, file_number);
        let Some(entry) = self.active.get_mut(&key) else {
            if !data.is_empty() {
                error!(
                    file_number,
                    contact = %public_key.short(),
                    "Got data for a transfer we don't know about"
                );
            }
            return ChunkOutcome::UnknownTransfer;
        };
        if data.is_empty() {
            return ChunkOutcome::InProgress {
                progress: entry.ft.progress,
            };
        }

        let len = data.len() as u64;
        let in_bounds = position
            .checked_add(len)
            .is_some_and(|end| end <= entry.ft.file_size)
            && len <= entry.ft.remaining();
        if !in_bounds {
            warn!(
                file_number,
                contact = %public_key.short(),
                position,
                len,
                size = entry.ft.file_size,
                "Chunk outside declared size"
            );
            return ChunkOutcome::OutOfBounds;
        }

        if let Err(e) = write_at(&mut entry.file, position, data) {
            error!(file_number, contact = %public_key.short(), error = %e, "Failed to write chunk");
            self.active.remove(&key);
            self.transfers.remove(public_key, file_number);
            return ChunkOutcome::Failed;
        }

        let progress = entry.ft.progress + len;
        self.transfers.update_progress(public_key, file_number, progress);
        entry.ft = FileTransfer {
            progress,
            ..entry.ft.clone()
        };
        if !entry.ft.is_complete() {
            return ChunkOutcome::InProgress { progress };
        }

        match self.active.remove(&key) {
            Some(done) => self.finish(done),
            None => ChunkOutcome::InProgress { progress },
        }
    }

    fn finish(&self, done: ActiveTransfer) -> ChunkOutcome {
        let ActiveTransfer { ft, path, file } = done;
        if let Err(e) = file.sync_data() {
            warn!(path = %path.display(), error = %e, "Failed to sync avatar file");
        }
        drop(file);

        if let Some(expected) = ft.file_id {
            match integrity::verify_file(&path, &expected) {
                Ok(true) => {}
                Ok(false) => {
                    warn!(contact = %ft.public_key.short(), "Avatar content does not match its id");
                    if let Err(e) = std::fs::remove_file(&path) {
                        warn!(path = %path.display(), error = %e, "Failed to remove corrupt avatar");
                    }
                    self.transfers.remove(&ft.public_key, ft.file_number);
                    return ChunkOutcome::Corrupt;
                }
                Err(e) => {
                    error!(path = %path.display(), error = %e, "Failed to hash avatar");
                    self.transfers.remove(&ft.public_key, ft.file_number);
                    return ChunkOutcome::Failed;
                }
            }
        }

        info!(file_number = ft.file_number, contact = %ft.public_key.short(), "Finished");
        self.contacts.set_avatar(&ft.public_key, Some(&path));
        ChunkOutcome::Complete(path)
    }

    /// Only a single plain file name is allowed; anything that could leave the avatar directory is refused.
    fn avatar_path(&self, file_name: &str) -> Result<PathBuf, TransferError> {
        let mut components = Path::new(file_name).components();
        match (components.next(), components.next()) {
            (Some(Component::Normal(name)), None) => Ok(self.avatar_dir.join(name)),
            _ => Err(TransferError::UnsafeFileName(file_name.to_string())),
        }
    }

    pub fn is_active(&self, public_key: &PublicKey, file_number: u32) -> bool {
        self.active.contains_key(&(*public_key, file_number))
    }

    /// Progress of an active transfer.
    pub fn progress(&self, public_key: &PublicKey, file_number: u32) -> Option<u64> {
        self.active
            .get(&(*public_key, file_number))
            .map(|a| a.ft.progress)
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }
}

impl EventListener for FileTransferManager {
    fn on_event(&mut self, event: &EngineEvent) -> Vec<OutboundAction> {
        match event {
            EngineEvent::FileRecv {
                public_key,
                file_number,
                kind,
                file_size,
                file_name,
                file_id,
            } => {
                let mut ft = FileTransfer::new(*public_key, *file_number, *kind, *file_size, file_name.as_str());
                ft.file_id = *file_id;
                vec![self.add(ft)]
            }
            EngineEvent::FileRecvChunk {
                public_key,
                file_number,
                position,
                data,
            } => match self.add_data(public_key, *file_number, *position, data) {
                ChunkOutcome::Failed => vec![OutboundAction::StopFileTransfer(*public_key, *file_number)],
                _ => Vec::new(),
            },
            _ => Vec::new(),
        }
    }
}

fn write_at(file: &mut File, position: u64, data: &[u8]) -> io::Result<()> {
    file.seek(SeekFrom::Start(position))?;
    file.write_all(data)
}

fn already_stored(path: &Path, size: u64, id: &[u8; 32]) -> bool {
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() == size => integrity::verify_file(path, id).unwrap_or(false),
        _ => false,
    }
}

#[derive(Debug, thiserror::Error)]
pub enum TransferError {
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("unsafe file name {0:?}")]
    UnsafeFileName(String),
}
