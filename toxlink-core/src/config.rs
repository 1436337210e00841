//! Load config from file and environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::{debug, warn};

use crate::bootstrap::{self, BootstrapNode};
use crate::engine::ProxyOptions;

/// Largest avatar accepted from a peer, in bytes.
pub const MAX_AVATAR_SIZE: u64 = 64 * 1024;

const SAVE_FILE_NAME: &str = "profile.tox";

/// Client configuration. File: $XDG_CONFIG_HOME/toxlink/config.toml, ~/.config/toxlink/config.toml
/// or /etc/toxlink/config.toml.
/// Env overrides: TOXLINK_SAVE_PATH, TOXLINK_DATA_DIR, TOXLINK_MAX_AVATAR_SIZE, TOXLINK_UDP, TOXLINK_IPV6.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    /// Engine save file. Defaults to `<data_dir>/profile.tox`.
    #[serde(default)]
    pub save_path: Option<PathBuf>,
    /// Root for local storage; avatars go to `<data_dir>/avatar`.
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,
    #[serde(default = "default_max_avatar_size")]
    pub max_avatar_size: u64,
    #[serde(default = "enabled")]
    pub ipv6_enabled: bool,
    #[serde(default = "enabled")]
    pub udp_enabled: bool,
    #[serde(default = "enabled")]
    pub local_discovery_enabled: bool,
    #[serde(default = "enabled")]
    pub hole_punching_enabled: bool,
    #[serde(default)]
    pub start_port: u16,
    #[serde(default)]
    pub end_port: u16,
    #[serde(default)]
    pub tcp_port: u16,
    #[serde(default)]
    pub proxy: Option<ProxyConfig>,
    #[serde(default = "bootstrap::default_nodes")]
    pub bootstrap_nodes: Vec<BootstrapNode>,
}

/// `[proxy]` table.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ProxyConfig {
    #[serde(default)]
    pub kind: ProxyKind,
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProxyKind {
    #[default]
    Socks5,
    Http,
}

impl From<ProxyConfig> for ProxyOptions {
    fn from(p: ProxyConfig) -> Self {
        match p.kind {
            ProxyKind::Socks5 => ProxyOptions::Socks5 {
                host: p.host,
                port: p.port,
            },
            ProxyKind::Http => ProxyOptions::Http {
                host: p.host,
                port: p.port,
            },
        }
    }
}

fn default_data_dir() -> PathBuf {
    if let Some(xdg) = std::env::var_os("XDG_DATA_HOME") {
        return PathBuf::from(xdg).join("toxlink");
    }
    match std::env::var_os("HOME") {
        Some(h) => PathBuf::from(h).join(".local/share/toxlink"),
        None => PathBuf::from("toxlink"),
    }
}
fn default_max_avatar_size() -> u64 {
    MAX_AVATAR_SIZE
}
fn enabled() -> bool {
    true
}

impl Default for Config {
    fn default() -> Self {
        Self {
            save_path: None,
            data_dir: default_data_dir(),
            max_avatar_size: default_max_avatar_size(),
            ipv6_enabled: true,
            udp_enabled: true,
            local_discovery_enabled: true,
            hole_punching_enabled: true,
            start_port: 0,
            end_port: 0,
            tcp_port: 0,
            proxy: None,
            bootstrap_nodes: bootstrap::default_nodes(),
        }
    }
}

impl Config {
    /// Parse a TOML document. Missing fields take their defaults.
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(s)?)
    }

    pub fn save_path(&self) -> PathBuf {
        self.save_path
            .clone()
            .unwrap_or_else(|| self.data_dir.join(SAVE_FILE_NAME))
    }

    pub fn avatar_dir(&self) -> PathBuf {
        self.data_dir.join("avatar")
    }

    /// Apply overrides from a variable lookup (the process environment in `load`).
    pub fn apply_env<F>(&mut self, var: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(s) = var("TOXLINK_SAVE_PATH") {
            self.save_path = Some(PathBuf::from(s));
        }
        if let Some(s) = var("TOXLINK_DATA_DIR") {
            self.data_dir = PathBuf::from(s);
        }
        if let Some(s) = var("TOXLINK_MAX_AVATAR_SIZE") {
            match s.parse::<u64>() {
                Ok(n) => self.max_avatar_size = n,
                Err(_) => warn!(value = %s, "Ignoring invalid TOXLINK_MAX_AVATAR_SIZE"),
            }
        }
        if let Some(b) = var("TOXLINK_UDP").and_then(|s| parse_flag(&s)) {
            self.udp_enabled = b;
        }
        if let Some(b) = var("TOXLINK_IPV6").and_then(|s| parse_flag(&s)) {
            self.ipv6_enabled = b;
        }
    }
}

fn parse_flag(s: &str) -> Option<bool> {
    match s.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

/// Load config: merge default, then config file (if present), then env vars.
pub fn load() -> Config {
    let mut c = load_file().unwrap_or_default();
    c.apply_env(|k| std::env::var(k).ok());
    c
}

fn config_paths() -> Vec<PathBuf> {
    let mut out = Vec::new();
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        out.push(PathBuf::from(xdg).join("toxlink/config.toml"));
    }
    if let Some(h) = std::env::var_os("HOME") {
        out.push(PathBuf::from(h).join(".config/toxlink/config.toml"));
    }
    out.push(PathBuf::from("/etc/toxlink/config.toml"));
    out
}

fn load_file() -> Option<Config> {
    let path = config_paths().into_iter().find(|p| p.exists())?;
    match read_file(&path) {
        Ok(c) => {
            debug!(path = %path.display(), "Loaded config");
            Some(c)
        }
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Ignoring unreadable config");
            None
        }
    }
}

fn read_file(path: &Path) -> Result<Config, ConfigError> {
    let s = std::fs::read_to_string(path)?;
    Config::parse(&s)
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("invalid config: {0}")]
    Parse(#[from] toml::de::Error),
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn empty_document_gives_defaults() {
        let c = Config::parse("").unwrap();
        assert_eq!(c.max_avatar_size, MAX_AVATAR_SIZE);
        assert!(c.udp_enabled && c.ipv6_enabled && c.local_discovery_enabled);
        assert!(c.hole_punching_enabled);
        assert!(c.proxy.is_none());
        assert_eq!(c.bootstrap_nodes, bootstrap::default_nodes());
        assert_eq!(c.save_path(), c.data_dir.join("profile.tox"));
    }

    #[test]
    fn file_values_override_defaults() {
        let c = Config::parse(
            r#"
            data_dir = "/var/lib/toxlink"
            max_avatar_size = 1000000
            udp_enabled = false

            [proxy]
            kind = "http"
            host = "127.0.0.1"
            port = 8080

            [[bootstrap_nodes]]
            host = "node.example"
            public_key = "82EF82BA33445A1F91A7DB27189ECFC0C013E06E3DA71F588ED692BED625EC23"
            "#,
        )
        .unwrap();
        assert_eq!(c.data_dir, PathBuf::from("/var/lib/toxlink"));
        assert_eq!(c.avatar_dir(), PathBuf::from("/var/lib/toxlink/avatar"));
        assert_eq!(c.max_avatar_size, 1_000_000);
        assert!(!c.udp_enabled);
        assert_eq!(c.bootstrap_nodes.len(), 1);
        assert_eq!(c.bootstrap_nodes[0].port, bootstrap::DEFAULT_BOOTSTRAP_PORT);
        let proxy: ProxyOptions = c.proxy.unwrap().into();
        assert_eq!(
            proxy,
            ProxyOptions::Http {
                host: "127.0.0.1".into(),
                port: 8080
            }
        );
    }

    #[test]
    fn unknown_field_is_rejected() {
        assert!(matches!(
            Config::parse("colour = \"blue\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn env_overrides_apply() {
        let vars: HashMap<&str, &str> = [
            ("TOXLINK_SAVE_PATH", "/tmp/p.tox"),
            ("TOXLINK_MAX_AVATAR_SIZE", "4096"),
            ("TOXLINK_UDP", "off"),
            ("TOXLINK_IPV6", "maybe"),
        ]
        .into_iter()
        .collect();
        let mut c = Config::default();
        c.apply_env(|k| vars.get(k).map(|v| v.to_string()));
        assert_eq!(c.save_path(), PathBuf::from("/tmp/p.tox"));
        assert_eq!(c.max_avatar_size, 4096);
        assert!(!c.udp_enabled);
        // Unparseable flag leaves the default.
        assert!(c.ipv6_enabled);
    }

    #[test]
    fn invalid_avatar_size_is_ignored() {
        let mut c = Config::default();
        c.apply_env(|k| (k == "TOXLINK_MAX_AVATAR_SIZE").then(|| "lots".to_string()));
        assert_eq!(c.max_avatar_size, MAX_AVATAR_SIZE);
    }
}
