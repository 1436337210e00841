//! Commands submitted to the worker, events emitted by the engine, and actions returned by listeners.

use serde::{Deserialize, Serialize};

use crate::identity::PublicKey;

/// Raw kind values as reported by the engine.
pub const FILE_KIND_DATA: u32 = 0;
pub const FILE_KIND_AVATAR: u32 = 1;

/// Presence shown to contacts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum UserStatus {
    #[default]
    Available,
    Away,
    Busy,
}

/// One requested operation against the engine. Executed in submission order.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Advance the engine by one tick. Self-scheduled by the worker.
    Iterate,
    /// Write the engine's serialized state to the save file.
    Save,
    /// Release the engine. Terminal.
    Shutdown,
    SetName(String),
    SetStatus(UserStatus),
    /// Free-form status line shown next to our name.
    SetUserState(String),
    SetTyping {
        friend_number: u32,
        typing: bool,
    },
    /// Send a contact request. `tox_id` is the 76-character hex address.
    AddContact {
        tox_id: String,
        message: String,
    },
    DeleteContact(u32),
    SendMessage {
        friend_number: u32,
        text: String,
    },
    AcceptContactRequest(PublicKey),
    Group(GroupCommand),
}

/// Group chat operations. Accepted by the worker but not forwarded to the engine.
#[derive(Debug, Clone, PartialEq)]
pub enum GroupCommand {
    Create { name: String },
    Leave { group_number: u32 },
    Message { group_number: u32, text: String },
    SetTopic { group_number: u32, topic: String },
    Invite { group_number: u32, friend_number: u32 },
    Join { friend_number: u32, cookie: Vec<u8> },
}

/// Kind of an incoming file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FileKind {
    Data,
    Avatar,
    /// Any kind this client does not understand.
    Unknown(u32),
}

impl From<u32> for FileKind {
    fn from(raw: u32) -> Self {
        match raw {
            FILE_KIND_DATA => FileKind::Data,
            FILE_KIND_AVATAR => FileKind::Avatar,
            other => FileKind::Unknown(other),
        }
    }
}

/// Event produced by one engine iteration.
#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    ContactRequest {
        public_key: PublicKey,
        message: String,
    },
    ConnectionStatus {
        friend_number: u32,
        connected: bool,
    },
    ContactMessage {
        friend_number: u32,
        text: String,
    },
    /// A peer offers a file.
    FileRecv {
        public_key: PublicKey,
        file_number: u32,
        kind: FileKind,
        file_size: u64,
        file_name: String,
        /// Content identifier; SHA-256 of the image for avatars.
        file_id: Option<[u8; 32]>,
    },
    /// A byte range of an offered file. An empty `data` marks end of stream.
    FileRecvChunk {
        public_key: PublicKey,
        file_number: u32,
        position: u64,
        data: Vec<u8>,
    },
}

/// Engine call requested by a listener. Applied by the worker in the same slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutboundAction {
    StartFileTransfer(PublicKey, u32),
    StopFileTransfer(PublicKey, u32),
}
