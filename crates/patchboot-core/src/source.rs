use std::fs::{self, File};
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use patchboot_domain::{sha256_file, Digest, VersionManifest};
use sha2::{Digest as _, Sha256};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::errors::PipelineError;

/// One retry per URL on top of the first attempt, per the source contract.
const DOWNLOAD_ATTEMPTS: usize = 2;
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(120);

/// What to do when a locally cached base artifact no longer matches the
/// manifest digest.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum MismatchPolicy {
    /// Discard the stale copy and fetch again (the common distributor
    /// expectation).
    #[default]
    Redownload,
    /// Fail immediately; useful where the cache is meant to be immutable.
    Fail,
}

#[derive(Debug, Clone)]
pub struct SourceOptions {
    pub base_dir: PathBuf,
    pub mismatch_policy: MismatchPolicy,
    pub timeout: Duration,
}

impl SourceOptions {
    #[must_use]
    pub fn new(base_dir: PathBuf) -> Self {
        Self {
            base_dir,
            mismatch_policy: MismatchPolicy::default(),
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// Resolve the base artifact to a verified local file.
///
/// The local side cache is always consulted first so repeated launches work
/// offline; only a missing or stale copy touches the network. Bytes are
/// never handed downstream without passing verification.
pub fn resolve(manifest: &VersionManifest, options: &SourceOptions) -> Result<PathBuf> {
    let dest = options.base_dir.join(manifest.cache_file_name());
    if dest.exists() {
        let actual = sha256_file(&dest)?;
        if actual == manifest.sha256 {
            debug!(path = %dest.display(), "base artifact cache hit");
            return Ok(dest);
        }
        match options.mismatch_policy {
            MismatchPolicy::Fail => {
                return Err(PipelineError::SourceIntegrity {
                    expected: manifest.sha256,
                    actual,
                }
                .into());
            }
            MismatchPolicy::Redownload => {
                warn!(
                    path = %dest.display(),
                    expected = %manifest.sha256,
                    actual = %actual,
                    "cached base artifact is stale; refetching"
                );
                fs::remove_file(&dest).with_context(|| {
                    format!("failed to remove stale base artifact {}", dest.display())
                })?;
            }
        }
    }

    if manifest.urls.is_empty() {
        return Err(anyhow!(
            "no cached copy of base artifact {} and the manifest lists no URLs",
            manifest.version
        ));
    }

    fs::create_dir_all(&options.base_dir).with_context(|| {
        format!(
            "failed to create base cache directory {}",
            options.base_dir.display()
        )
    })?;

    let mut last_err: Option<anyhow::Error> = None;
    for url in &manifest.urls {
        for attempt in 1..=DOWNLOAD_ATTEMPTS {
            match fetch_once(url, options.timeout) {
                Ok((tmp, actual)) => {
                    if actual == manifest.sha256 {
                        persist_named_tempfile(tmp, &dest).with_context(|| {
                            format!("failed to publish base artifact {}", dest.display())
                        })?;
                        debug!(url, path = %dest.display(), "base artifact fetched and verified");
                        return Ok(dest);
                    }
                    // Discard unverified bytes; the tempfile drops here.
                    warn!(url, attempt, expected = %manifest.sha256, actual = %actual,
                          "downloaded base artifact failed verification");
                    last_err = Some(
                        PipelineError::SourceIntegrity {
                            expected: manifest.sha256,
                            actual,
                        }
                        .into(),
                    );
                }
                Err(err) => {
                    warn!(url, attempt, error = %err, "base artifact fetch failed");
                    last_err = Some(err);
                }
            }
        }
    }

    Err(last_err.unwrap_or_else(|| anyhow!("failed to fetch base artifact {}", manifest.version)))
}

/// Fetch one URL into a temp file, hashing while writing. `file://` URLs and
/// plain paths read straight from disk.
fn fetch_once(url: &str, timeout: Duration) -> Result<(NamedTempFile, Digest)> {
    if let Some(path) = local_path(url) {
        let mut src = File::open(&path)
            .with_context(|| format!("failed to open local base artifact {}", path.display()))?;
        return copy_hashing(&mut src);
    }

    let client = http_client(timeout)?;
    let mut response = client
        .get(url)
        .send()
        .with_context(|| format!("failed to fetch {url}"))?
        .error_for_status()
        .with_context(|| format!("unexpected response for {url}"))?;
    copy_hashing(&mut response)
}

fn local_path(url: &str) -> Option<PathBuf> {
    if let Some(stripped) = url.strip_prefix("file://") {
        return Some(PathBuf::from(stripped));
    }
    let path = Path::new(url);
    path.exists().then(|| path.to_path_buf())
}

fn copy_hashing(src: &mut impl Read) -> Result<(NamedTempFile, Digest)> {
    let mut tmp = NamedTempFile::new()?;
    let mut hasher = Sha256::new();
    let mut buffer = [0u8; 64 * 1024];
    loop {
        let read = src.read(&mut buffer).context("stream error during fetch")?;
        if read == 0 {
            break;
        }
        hasher.update(&buffer[..read]);
        tmp.write_all(&buffer[..read])?;
    }
    tmp.flush()?;
    Ok((tmp, Digest::from_bytes(hasher.finalize().into())))
}

fn http_client(timeout: Duration) -> Result<reqwest::blocking::Client> {
    reqwest::blocking::Client::builder()
        .timeout(timeout)
        .build()
        .context("failed to build HTTP client")
}

/// Atomic persist with a copy fallback when the temp dir sits on another
/// filesystem.
pub(crate) fn persist_named_tempfile(tmp: NamedTempFile, dest: &Path) -> io::Result<()> {
    match tmp.persist(dest) {
        Ok(_) => Ok(()),
        Err(err) => {
            let file = err.file;
            if is_cross_device(&err.error) {
                let mut reader = file.reopen()?;
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                let mut writer = File::create(dest)?;
                io::copy(&mut reader, &mut writer)?;
                file.close().ok();
                Ok(())
            } else {
                Err(err.error)
            }
        }
    }
}

fn is_cross_device(err: &io::Error) -> bool {
    matches!(err.raw_os_error(), Some(18))
}
