//! Content-addressed cache for derived artifacts.
//!
//! An entry is a payload file plus a completion marker holding the payload's
//! content digest. Publish order is: temp payload, re-read + hash, marker,
//! atomic rename. A crash at any point leaves either nothing visible or a
//! payload without a marker, both of which `lookup` treats as absent.
//! Because derivation is deterministic, racing processes can only overwrite
//! each other with identical bytes, so no lock file is needed.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use patchboot_domain::{sha256, sha256_file, Digest};
use sha2::{Digest as _, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

/// Cache key: digest over the three input digests, in pipeline order.
#[must_use]
pub fn cache_key(base: Digest, patch: Digest, mappings: Digest) -> Digest {
    let mut hasher = Sha256::new();
    hasher.update(base.as_bytes());
    hasher.update(patch.as_bytes());
    hasher.update(mappings.as_bytes());
    Digest::from_bytes(hasher.finalize().into())
}

/// Digest identifying a mapping set by its input files, in application
/// order.
#[must_use]
pub fn mapping_set_digest(file_digests: &[Digest]) -> Digest {
    let mut hasher = Sha256::new();
    for digest in file_digests {
        hasher.update(digest.as_bytes());
    }
    Digest::from_bytes(hasher.finalize().into())
}

#[derive(Debug, Clone)]
pub struct DerivedCache {
    dir: PathBuf,
}

impl DerivedCache {
    pub fn new(dir: PathBuf) -> Result<Self> {
        fs::create_dir_all(&dir)
            .with_context(|| format!("failed to create derived cache {}", dir.display()))?;
        Ok(Self { dir })
    }

    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    #[must_use]
    pub fn entry_path(&self, key: &Digest) -> PathBuf {
        self.dir.join(format!("{key}.jar"))
    }

    fn marker_path(&self, key: &Digest) -> PathBuf {
        self.dir.join(format!("{key}.ok"))
    }

    /// Return the published payload for `key`, or `None`.
    ///
    /// Entries without a valid marker, or whose bytes no longer hash to the
    /// marker digest, are removed and reported absent; corruption heals
    /// itself by regeneration and is never surfaced to the user.
    #[must_use]
    pub fn lookup(&self, key: &Digest) -> Option<PathBuf> {
        let payload = self.entry_path(key);
        let marker = self.marker_path(key);
        if !payload.exists() {
            if marker.exists() {
                let _ = fs::remove_file(&marker);
            }
            return None;
        }
        let Ok(marker_text) = fs::read_to_string(&marker) else {
            warn!(key = %key, "derived cache entry lacks a completion marker; discarding");
            self.evict(key);
            return None;
        };
        let Ok(expected) = Digest::from_hex(marker_text.trim()) else {
            warn!(key = %key, "derived cache marker is unreadable; discarding");
            self.evict(key);
            return None;
        };
        match sha256_file(&payload) {
            Ok(actual) if actual == expected => {
                debug!(key = %key, "derived cache hit");
                Some(payload)
            }
            _ => {
                warn!(key = %key, "derived cache entry failed verification; discarding");
                self.evict(key);
                None
            }
        }
    }

    /// Publish `bytes` under `key`, returning the payload path.
    pub fn store(&self, key: &Digest, bytes: &[u8]) -> Result<PathBuf> {
        let payload = self.entry_path(key);
        let content_digest = sha256(bytes);

        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        tmp.write_all(bytes).context("failed to write derived artifact")?;
        tmp.flush()?;
        tmp.as_file()
            .sync_all()
            .context("failed to flush derived artifact")?;

        // Verify the write by re-reading before anything becomes visible.
        let written = sha256_file(tmp.path())?;
        if written != content_digest {
            anyhow::bail!(
                "derived cache write verification failed for {key}: wrote {written}, expected {content_digest}"
            );
        }

        self.write_marker(key, content_digest)?;
        tmp.persist(&payload)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to publish {}", payload.display()))?;
        if let Ok(dir) = File::open(&self.dir) {
            let _ = dir.sync_all();
        }
        debug!(key = %key, bytes = bytes.len(), "derived cache store");
        Ok(payload)
    }

    fn write_marker(&self, key: &Digest, content_digest: Digest) -> Result<()> {
        let marker = self.marker_path(key);
        let mut tmp = NamedTempFile::new_in(&self.dir)
            .with_context(|| format!("failed to create temp file in {}", self.dir.display()))?;
        writeln!(tmp, "{content_digest}")?;
        tmp.flush()?;
        tmp.persist(&marker)
            .map_err(|err| err.error)
            .with_context(|| format!("failed to publish marker {}", marker.display()))?;
        Ok(())
    }

    fn evict(&self, key: &Digest) {
        let _ = fs::remove_file(self.entry_path(key));
        let _ = fs::remove_file(self.marker_path(key));
    }
}
