//! File transfer record: identity, declared size, progress.

use serde::{Deserialize, Serialize};

use crate::identity::PublicKey;
use crate::protocol::FileKind;

/// Key of a transfer: file numbers are only unique per contact.
pub type TransferKey = (PublicKey, u32);

/// One incoming transfer. `progress` never exceeds `file_size`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FileTransfer {
    pub public_key: PublicKey,
    pub file_number: u32,
    pub kind: FileKind,
    pub file_name: String,
    /// Total size declared by the sender. 0 on an avatar means "cleared".
    pub file_size: u64,
    /// Bytes written so far.
    pub progress: u64,
    pub file_id: Option<[u8; 32]>,
}

impl FileTransfer {
    pub fn new(
        public_key: PublicKey,
        file_number: u32,
        kind: FileKind,
        file_size: u64,
        file_name: impl Into<String>,
    ) -> Self {
        Self {
            public_key,
            file_number,
            kind,
            file_name: file_name.into(),
            file_size,
            progress: 0,
            file_id: None,
        }
    }

    pub fn with_file_id(mut self, file_id: [u8; 32]) -> Self {
        self.file_id = Some(file_id);
        self
    }

    pub fn key(&self) -> TransferKey {
        (self.public_key, self.file_number)
    }

    pub fn is_complete(&self) -> bool {
        self.file_size > 0 && self.progress == self.file_size
    }

    /// Bytes still expected.
    pub fn remaining(&self) -> u64 {
        self.file_size.saturating_sub(self.progress)
    }
}
