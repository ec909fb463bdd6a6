use std::fmt;
use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use anyhow::{Context, Result};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use sha2::{Digest as _, Sha256};
use thiserror::Error;

/// SHA-256 digest identifying an artifact, patch, or mapping set.
///
/// Every stage of the pipeline speaks this one algorithm; the hex rendering
/// is always lowercase so digests compare as plain strings.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Digest([u8; 32]);

impl Digest {
    pub const LEN: usize = 32;

    #[must_use]
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    #[must_use]
    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }

    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(raw: &str) -> Result<Self> {
        let bytes = hex::decode(raw.trim())
            .with_context(|| format!("invalid hex digest {raw:?}"))?;
        let bytes: [u8; 32] = bytes
            .try_into()
            .map_err(|_| anyhow::anyhow!("digest must be 32 bytes, got {raw:?}"))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl fmt::Debug for Digest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Digest({})", self.to_hex())
    }
}

impl FromStr for Digest {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        Self::from_hex(raw)
    }
}

impl Serialize for Digest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for Digest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::from_hex(&raw).map_err(serde::de::Error::custom)
    }
}

/// Raised when a byte buffer does not hash to the digest it was promised to.
#[derive(Debug, Error)]
#[error("digest mismatch: expected {expected}, got {actual}")]
pub struct IntegrityMismatch {
    pub expected: Digest,
    pub actual: Digest,
}

#[must_use]
pub fn sha256(bytes: &[u8]) -> Digest {
    Digest(Sha256::digest(bytes).into())
}

/// Hash a file without loading it whole into memory.
pub fn sha256_file(path: &Path) -> Result<Digest> {
    let mut file =
        File::open(path).with_context(|| format!("failed to open {}", path.display()))?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 64 * 1024];
    loop {
        let read = file
            .read(&mut buf)
            .with_context(|| format!("failed to read {}", path.display()))?;
        if read == 0 {
            break;
        }
        hasher.update(&buf[..read]);
    }
    Ok(Digest(hasher.finalize().into()))
}

/// Check `bytes` against `expected`. Pure; never attempts correction.
pub fn verify(bytes: &[u8], expected: Digest) -> Result<(), IntegrityMismatch> {
    let actual = sha256(bytes);
    if actual == expected {
        Ok(())
    } else {
        Err(IntegrityMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let digest = sha256(b"patchboot");
        let parsed = Digest::from_hex(&digest.to_hex()).expect("parse hex");
        assert_eq!(digest, parsed);
    }

    #[test]
    fn rejects_short_hex() {
        assert!(Digest::from_hex("abcd").is_err());
        assert!(Digest::from_hex("not hex at all").is_err());
    }

    #[test]
    fn verify_reports_both_digests() {
        let expected = sha256(b"one");
        let err = verify(b"two", expected).expect_err("must mismatch");
        assert_eq!(err.expected, expected);
        assert_eq!(err.actual, sha256(b"two"));
    }

    #[test]
    fn file_hash_matches_buffer_hash() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("blob");
        std::fs::write(&path, b"streamed bytes").expect("write blob");
        let from_file = sha256_file(&path).expect("hash file");
        assert_eq!(from_file, sha256(b"streamed bytes"));
    }
}
