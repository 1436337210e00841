//! Contact identity: public keys and Tox IDs (public key + nospam + checksum).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

pub const PUBLIC_KEY_SIZE: usize = 32;
pub const NOSPAM_SIZE: usize = 4;
pub const CHECKSUM_SIZE: usize = 2;
/// Size of a full Tox ID in bytes (76 hex characters).
pub const TOX_ID_SIZE: usize = PUBLIC_KEY_SIZE + NOSPAM_SIZE + CHECKSUM_SIZE;

/// Contact public key (32 bytes). Stable identity of a peer across sessions.
#[derive(Clone, Copy, Eq, PartialEq, Hash, Serialize, Deserialize)]
pub struct PublicKey(#[serde(with = "bytes_32")] [u8; PUBLIC_KEY_SIZE]);

mod bytes_32 {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    pub fn serialize<S: Serializer>(v: &[u8; 32], serializer: S) -> Result<S::Ok, S::Error> {
        v.as_slice().serialize(serializer)
    }
    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<[u8; 32], D::Error> {
        let buf: Vec<u8> = Deserialize::deserialize(d)?;
        buf.try_into()
            .map_err(|_| serde::de::Error::custom("expected 32 bytes"))
    }
}

impl PublicKey {
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_SIZE] {
        &self.0
    }

    /// Create a `PublicKey` from raw bytes.
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_SIZE]) -> Self {
        PublicKey(bytes)
    }

    /// Parse 64 hex characters (either case).
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let bytes = decode_exact::<PUBLIC_KEY_SIZE>(s)?;
        Ok(PublicKey(bytes))
    }

    /// First 8 hex characters, for log lines.
    pub fn short(&self) -> String {
        hex::encode_upper(&self.0[..4])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.0))
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.short())
    }
}

impl FromStr for PublicKey {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// Address handed out to other users to add us as a contact.
/// Layout: public key (32) | nospam (4) | checksum (2).
#[derive(Debug, Clone, Copy, Eq, PartialEq, Hash)]
pub struct ToxId {
    public_key: PublicKey,
    nospam: [u8; NOSPAM_SIZE],
    checksum: [u8; CHECKSUM_SIZE],
}

impl ToxId {
    /// Build an ID from its parts, computing the checksum.
    pub fn new(public_key: PublicKey, nospam: [u8; NOSPAM_SIZE]) -> Self {
        let checksum = checksum(public_key.as_bytes(), &nospam);
        Self {
            public_key,
            nospam,
            checksum,
        }
    }

    /// Parse 76 hex characters and verify the checksum.
    pub fn from_hex(s: &str) -> Result<Self, IdentityError> {
        let bytes = decode_exact::<TOX_ID_SIZE>(s.trim())?;
        let mut pk = [0u8; PUBLIC_KEY_SIZE];
        pk.copy_from_slice(&bytes[..PUBLIC_KEY_SIZE]);
        let mut nospam = [0u8; NOSPAM_SIZE];
        nospam.copy_from_slice(&bytes[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + NOSPAM_SIZE]);
        let id = Self::new(PublicKey(pk), nospam);
        if id.checksum[..] != bytes[PUBLIC_KEY_SIZE + NOSPAM_SIZE..] {
            return Err(IdentityError::Checksum);
        }
        Ok(id)
    }

    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }

    pub fn nospam(&self) -> [u8; NOSPAM_SIZE] {
        self.nospam
    }

    pub fn to_bytes(&self) -> [u8; TOX_ID_SIZE] {
        let mut out = [0u8; TOX_ID_SIZE];
        out[..PUBLIC_KEY_SIZE].copy_from_slice(self.public_key.as_bytes());
        out[PUBLIC_KEY_SIZE..PUBLIC_KEY_SIZE + NOSPAM_SIZE].copy_from_slice(&self.nospam);
        out[PUBLIC_KEY_SIZE + NOSPAM_SIZE..].copy_from_slice(&self.checksum);
        out
    }
}

impl fmt::Display for ToxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode_upper(self.to_bytes()))
    }
}

impl FromStr for ToxId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

/// XOR of the key and nospam taken two bytes at a time.
fn checksum(public_key: &[u8; PUBLIC_KEY_SIZE], nospam: &[u8; NOSPAM_SIZE]) -> [u8; CHECKSUM_SIZE] {
    let mut out = [0u8; CHECKSUM_SIZE];
    for (i, b) in public_key.iter().chain(nospam.iter()).enumerate() {
        out[i % CHECKSUM_SIZE] ^= b;
    }
    out
}

fn decode_exact<const N: usize>(s: &str) -> Result<[u8; N], IdentityError> {
    if s.len() != N * 2 {
        return Err(IdentityError::Length {
            expected: N * 2,
            actual: s.len(),
        });
    }
    let mut out = [0u8; N];
    hex::decode_to_slice(s, &mut out)?;
    Ok(out)
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("expected {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },
    #[error("invalid hex: {0}")]
    Hex(#[from] hex::FromHexError),
    #[error("checksum mismatch")]
    Checksum,
}

#[cfg(test)]
mod tests {
    use super::*;

    const VERDICT_KEY: &str = "1C5293AEF2114717547B39DA8EA6F1E331E5E358B35F9B6B5F19317911C5F976";

    #[test]
    fn public_key_hex_roundtrip() {
        let pk = PublicKey::from_hex(VERDICT_KEY).unwrap();
        assert_eq!(pk.to_string(), VERDICT_KEY);
        assert_eq!(pk.short(), "1C5293AE");
        let lower: PublicKey = VERDICT_KEY.to_ascii_lowercase().parse().unwrap();
        assert_eq!(lower, pk);
    }

    #[test]
    fn public_key_rejects_short_input() {
        let err = PublicKey::from_hex("1C5293").unwrap_err();
        assert!(matches!(
            err,
            IdentityError::Length {
                expected: 64,
                actual: 6
            }
        ));
    }

    #[test]
    fn public_key_rejects_non_hex() {
        let bad = "Z".repeat(64);
        assert!(matches!(
            PublicKey::from_hex(&bad),
            Err(IdentityError::Hex(_))
        ));
    }

    #[test]
    fn tox_id_checksum_accepts_own_output() {
        let pk = PublicKey::from_hex(VERDICT_KEY).unwrap();
        let id = ToxId::new(pk, [0xDE, 0xAD, 0xBE, 0xEF]);
        let text = id.to_string();
        assert_eq!(text.len(), TOX_ID_SIZE * 2);
        let parsed = ToxId::from_hex(&text).unwrap();
        assert_eq!(parsed, id);
        assert_eq!(parsed.public_key(), &pk);
        assert_eq!(parsed.nospam(), [0xDE, 0xAD, 0xBE, 0xEF]);
    }

    #[test]
    fn tox_id_detects_corruption() {
        let pk = PublicKey::from_bytes([7u8; 32]);
        let mut text = ToxId::new(pk, [1, 2, 3, 4]).to_string();
        // Flip one nibble of the nospam.
        text.replace_range(64..65, if &text[64..65] == "0" { "1" } else { "0" });
        assert!(matches!(ToxId::from_hex(&text), Err(IdentityError::Checksum)));
    }

    #[test]
    fn tox_id_rejects_bare_public_key() {
        assert!(matches!(
            ToxId::from_hex(VERDICT_KEY),
            Err(IdentityError::Length { .. })
        ));
    }
}
