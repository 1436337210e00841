//! Persistence seams for contacts and transfers, plus in-memory implementations.
//!
//! Hosts back these with their database; the in-memory versions serve embedders
//! without one and the tests.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::identity::PublicKey;
use crate::transfer::{FileTransfer, TransferKey};

pub trait ContactRepository: Send + Sync {
    /// Point the contact's avatar at `path`, or clear it with `None`.
    fn set_avatar(&self, public_key: &PublicKey, path: Option<&Path>);
}

pub trait FileTransferRepository: Send + Sync {
    fn add(&self, ft: &FileTransfer);
    fn update_progress(&self, public_key: &PublicKey, file_number: u32, progress: u64);
    /// Forget a transfer that was abandoned. Unknown keys are ignored.
    fn remove(&self, public_key: &PublicKey, file_number: u32);
}

/// Avatar references kept in memory. Every update is also appended to a history.
#[derive(Default)]
pub struct MemoryContactRepository {
    inner: Mutex<ContactState>,
}

#[derive(Default)]
struct ContactState {
    avatars: HashMap<PublicKey, Option<PathBuf>>,
    history: Vec<(PublicKey, Option<PathBuf>)>,
}

impl MemoryContactRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Current avatar of a contact. `None` if never set or cleared.
    pub fn avatar(&self, public_key: &PublicKey) -> Option<PathBuf> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.avatars.get(public_key).cloned().flatten()
    }

    /// All updates in the order they were made.
    pub fn history(&self) -> Vec<(PublicKey, Option<PathBuf>)> {
        let state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        state.history.clone()
    }
}

impl ContactRepository for MemoryContactRepository {
    fn set_avatar(&self, public_key: &PublicKey, path: Option<&Path>) {
        let mut state = self.inner.lock().unwrap_or_else(|e| e.into_inner());
        let path = path.map(Path::to_path_buf);
        state.avatars.insert(*public_key, path.clone());
        state.history.push((*public_key, path));
    }
}

#[derive(Default)]
pub struct MemoryFileTransferRepository {
    transfers: Mutex<HashMap<TransferKey, FileTransfer>>,
}

impl MemoryFileTransferRepository {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, public_key: &PublicKey, file_number: u32) -> Option<FileTransfer> {
        let transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        transfers.get(&(*public_key, file_number)).cloned()
    }

    pub fn len(&self) -> usize {
        self.transfers.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FileTransferRepository for MemoryFileTransferRepository {
    fn add(&self, ft: &FileTransfer) {
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        transfers.insert(ft.key(), ft.clone());
    }

    fn update_progress(&self, public_key: &PublicKey, file_number: u32, progress: u64) {
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(ft) = transfers.get_mut(&(*public_key, file_number)) {
            ft.progress = progress;
        }
    }

    fn remove(&self, public_key: &PublicKey, file_number: u32) {
        let mut transfers = self.transfers.lock().unwrap_or_else(|e| e.into_inner());
        transfers.remove(&(*public_key, file_number));
    }
}
