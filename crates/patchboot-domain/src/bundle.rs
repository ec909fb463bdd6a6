use anyhow::{bail, Context, Result};

use crate::digest::Digest;

pub const BUNDLE_MAGIC: &[u8; 4] = b"PBPB";
pub const BUNDLE_FORMAT_VERSION: u32 = 1;

const HEADER_LEN: usize = 4 + 4 + Digest::LEN + Digest::LEN;

/// A patch bundle: the digests it bridges plus the raw binary delta.
///
/// File layout: magic, format version (u32 BE), source digest, target
/// digest, then the delta payload verbatim. The header is validated here;
/// the payload is opaque until the patch engine consumes it.
#[derive(Debug, Clone)]
pub struct PatchBundle {
    pub source: Digest,
    pub target: Digest,
    pub delta: Vec<u8>,
}

impl PatchBundle {
    pub fn parse(bytes: &[u8]) -> Result<Self> {
        if bytes.len() < HEADER_LEN {
            bail!(
                "patch bundle truncated: {} bytes, header needs {HEADER_LEN}",
                bytes.len()
            );
        }
        if &bytes[..4] != BUNDLE_MAGIC {
            bail!("patch bundle has wrong magic (expected {BUNDLE_MAGIC:?})");
        }
        let version = u32::from_be_bytes(bytes[4..8].try_into().expect("4 bytes"));
        if version != BUNDLE_FORMAT_VERSION {
            bail!("unsupported patch bundle format version {version}");
        }
        let mut source = [0u8; Digest::LEN];
        source.copy_from_slice(&bytes[8..8 + Digest::LEN]);
        let mut target = [0u8; Digest::LEN];
        target.copy_from_slice(&bytes[8 + Digest::LEN..HEADER_LEN]);
        Ok(Self {
            source: Digest::from_bytes(source),
            target: Digest::from_bytes(target),
            delta: bytes[HEADER_LEN..].to_vec(),
        })
    }

    pub fn read_from(path: &std::path::Path) -> Result<Self> {
        let bytes = std::fs::read(path)
            .with_context(|| format!("failed to read patch bundle {}", path.display()))?;
        Self::parse(&bytes)
            .with_context(|| format!("invalid patch bundle {}", path.display()))
    }

    /// Serialize the bundle back to its on-disk form.
    #[must_use]
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + self.delta.len());
        out.extend_from_slice(BUNDLE_MAGIC);
        out.extend_from_slice(&BUNDLE_FORMAT_VERSION.to_be_bytes());
        out.extend_from_slice(self.source.as_bytes());
        out.extend_from_slice(self.target.as_bytes());
        out.extend_from_slice(&self.delta);
        out
    }
}
