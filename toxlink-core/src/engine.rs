//! Capability surface of the communication engine. The engine itself is external;
//! hosts implement `Engine` over their binding and hand a constructor to the worker.

use std::io;
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::identity::{PublicKey, ToxId};
use crate::protocol::{EngineEvent, UserStatus};

/// Proxy the engine routes TCP through.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ProxyOptions {
    #[default]
    None,
    Socks5 {
        host: String,
        port: u16,
    },
    Http {
        host: String,
        port: u16,
    },
}

/// Engine state persisted between sessions.
#[derive(Clone, PartialEq, Eq, Default)]
pub enum SaveData {
    #[default]
    None,
    ToxSave(Vec<u8>),
}

impl SaveData {
    /// Read a save file. A missing file means a fresh profile.
    pub fn load(path: &Path) -> io::Result<Self> {
        match std::fs::read(path) {
            Ok(bytes) => Ok(SaveData::ToxSave(bytes)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(SaveData::None),
            Err(e) => Err(e),
        }
    }

    /// Replace the save file wholesale: write a sibling temp file, then rename over the target.
    pub fn store(path: &Path, bytes: &[u8]) -> io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut tmp = path.as_os_str().to_owned();
        tmp.push(".tmp");
        let tmp = PathBuf::from(tmp);
        std::fs::write(&tmp, bytes)?;
        std::fs::rename(&tmp, path).map_err(|e| {
            let _ = std::fs::remove_file(&tmp);
            e
        })
    }
}

impl std::fmt::Debug for SaveData {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SaveData::None => f.write_str("None"),
            SaveData::ToxSave(bytes) => write!(f, "ToxSave({} bytes)", bytes.len()),
        }
    }
}

/// Options the engine is constructed with. Ports of 0 let the engine pick defaults.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineOptions {
    pub ipv6_enabled: bool,
    pub udp_enabled: bool,
    pub local_discovery_enabled: bool,
    pub proxy: ProxyOptions,
    pub start_port: u16,
    pub end_port: u16,
    pub tcp_port: u16,
    pub save_data: SaveData,
    pub hole_punching_enabled: bool,
}

impl EngineOptions {
    pub fn from_config(config: &Config, save_data: SaveData) -> Self {
        Self {
            ipv6_enabled: config.ipv6_enabled,
            udp_enabled: config.udp_enabled,
            local_discovery_enabled: config.local_discovery_enabled,
            proxy: config.proxy.clone().map(Into::into).unwrap_or_default(),
            start_port: config.start_port,
            end_port: config.end_port,
            tcp_port: config.tcp_port,
            save_data,
            hole_punching_enabled: config.hole_punching_enabled,
        }
    }
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self::from_config(&Config::default(), SaveData::None)
    }
}

/// Operations the worker performs on the engine. Only the worker thread ever holds one.
pub trait Engine {
    /// Register a bootstrap node.
    fn bootstrap(&mut self, host: &str, port: u16, public_key: &PublicKey) -> Result<(), EngineError>;

    /// Advance protocol state by one tick and return what happened.
    fn iterate(&mut self) -> Vec<EngineEvent>;

    /// Recommended delay before the next `iterate`, in milliseconds.
    fn iteration_interval(&self) -> u32;

    /// Serialized engine state, suitable for `SaveData::ToxSave`.
    fn save_data(&self) -> Vec<u8>;

    /// Irreversible teardown. No other method is called afterwards.
    fn release(&mut self);

    fn set_name(&mut self, name: &str) -> Result<(), EngineError>;

    fn set_status(&mut self, status: UserStatus);

    fn set_status_message(&mut self, message: &str) -> Result<(), EngineError>;

    fn set_typing(&mut self, friend_number: u32, typing: bool) -> Result<(), EngineError>;

    /// Send a contact request. Returns the new friend number.
    fn add_contact(&mut self, tox_id: &ToxId, message: &str) -> Result<u32, EngineError>;

    /// Accept a request received earlier. Returns the new friend number.
    fn accept_contact_request(&mut self, public_key: &PublicKey) -> Result<u32, EngineError>;

    fn delete_contact(&mut self, friend_number: u32) -> Result<(), EngineError>;

    /// Returns the message id.
    fn send_message(&mut self, friend_number: u32, text: &str) -> Result<u32, EngineError>;

    fn start_file_transfer(&mut self, public_key: &PublicKey, file_number: u32) -> Result<(), EngineError>;

    fn stop_file_transfer(&mut self, public_key: &PublicKey, file_number: u32) -> Result<(), EngineError>;
}

#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("no contact with friend number {0}")]
    FriendNotFound(u32),
    #[error("invalid contact id")]
    InvalidId,
    #[error("bootstrap to {host}:{port} failed")]
    Bootstrap { host: String, port: u16 },
    #[error("io error: {0}")]
    Io(#[from] io::Error),
    #[error("rejected by engine: {0}")]
    Rejected(String),
}
