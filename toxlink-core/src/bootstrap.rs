//! Bootstrap nodes registered with the engine at start.

use serde::Deserialize;

use crate::identity::{IdentityError, PublicKey};

pub const DEFAULT_BOOTSTRAP_PORT: u16 = 33445;

/// A well-known relay the engine joins the network through.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct BootstrapNode {
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// 64 hex characters.
    pub public_key: String,
}

fn default_port() -> u16 {
    DEFAULT_BOOTSTRAP_PORT
}

impl BootstrapNode {
    pub fn new(host: &str, port: u16, public_key: &str) -> Self {
        Self {
            host: host.to_string(),
            port,
            public_key: public_key.to_string(),
        }
    }

    pub fn public_key(&self) -> Result<PublicKey, IdentityError> {
        PublicKey::from_hex(&self.public_key)
    }
}

pub fn default_nodes() -> Vec<BootstrapNode> {
    vec![
        BootstrapNode::new(
            "tox.verdict.gg",
            DEFAULT_BOOTSTRAP_PORT,
            "1C5293AEF2114717547B39DA8EA6F1E331E5E358B35F9B6B5F19317911C5F976",
        ),
        BootstrapNode::new(
            "tox.kurnevsky.net",
            DEFAULT_BOOTSTRAP_PORT,
            "82EF82BA33445A1F91A7DB27189ECFC0C013E06E3DA71F588ED692BED625EC23",
        ),
        BootstrapNode::new(
            "tox.abilinski.com",
            DEFAULT_BOOTSTRAP_PORT,
            "10C00EB250C3233E343E2AEBA07115A5C28920E9C8D29492F6D00B29049EDC7E",
        ),
    ]
}
