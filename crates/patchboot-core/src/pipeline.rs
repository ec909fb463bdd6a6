//! The derivation pipeline: verify, patch, remap, cache, launch.
//!
//! Every stage is deterministic, so the whole derivation is identified by
//! the triple of input digests and the derived cache can short-circuit all
//! of it. Nothing unverified ever crosses a stage boundary.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use patchboot_domain::mapping::{parse_proguard, parse_tiny};
use patchboot_domain::{
    compose, sha256, sha256_file, verify, ComposePolicy, Digest, MappingSet, PatchBundle,
    VersionManifest,
};
use tracing::{debug, info};

use crate::cache::{cache_key, mapping_set_digest, DerivedCache};
use crate::config;
use crate::errors::PipelineError;
use crate::launch::{self, LaunchOptions};
use crate::patch;
use crate::remap::{remap_jar, RemapOptions};
use crate::source::{self, MismatchPolicy, SourceOptions};

/// One mapping table on disk. Tiny files carry their spaces in the header;
/// proguard files need them supplied.
#[derive(Debug, Clone)]
pub struct MappingSource {
    pub path: PathBuf,
    pub spaces: Option<(String, String)>,
}

#[derive(Debug, Clone)]
pub struct PipelineRequest {
    pub patch_path: PathBuf,
    /// Version manifest describing the base artifact. Ignored when
    /// `base_path` is given.
    pub manifest_path: Option<PathBuf>,
    /// Explicit base artifact, bypassing the source stage.
    pub base_path: Option<PathBuf>,
    /// Mapping tables, applied in order after composition.
    pub mappings: Vec<MappingSource>,
    pub compose_policy: ComposePolicy,
    pub strict_remap: bool,
    pub mismatch_policy: MismatchPolicy,
    /// Re-derive even when a cached entry exists.
    pub force: bool,
    /// Derive to a throwaway location and publish nothing.
    pub no_cache: bool,
    pub timeout: Duration,
    /// Overrides for the env/default cache resolution.
    pub base_cache: Option<PathBuf>,
    pub derived_cache: Option<PathBuf>,
    /// `None` stops after derivation (patch-only mode).
    pub launch: Option<LaunchOptions>,
}

impl PipelineRequest {
    #[must_use]
    pub fn new(patch_path: PathBuf) -> Self {
        Self {
            patch_path,
            manifest_path: None,
            base_path: None,
            mappings: Vec::new(),
            compose_policy: ComposePolicy::default(),
            strict_remap: false,
            mismatch_policy: MismatchPolicy::default(),
            force: false,
            no_cache: false,
            timeout: Duration::from_secs(120),
            base_cache: None,
            derived_cache: None,
            launch: None,
        }
    }
}

#[derive(Debug)]
pub struct PipelineOutcome {
    pub derived: PathBuf,
    pub derived_digest: Digest,
    pub cache_hit: bool,
    /// Exit code of the launched program, when a launch was requested.
    pub exit_code: Option<i32>,
}

pub fn run(request: &PipelineRequest) -> Result<PipelineOutcome> {
    let patch_bytes = fs::read(&request.patch_path).with_context(|| {
        format!("failed to read patch bundle {}", request.patch_path.display())
    })?;
    let bundle = PatchBundle::parse(&patch_bytes)
        .map_err(|err| PipelineError::PatchCorrupt(format!("{err:#}")))?;
    let patch_digest = sha256(&patch_bytes);

    let (mapping, mapping_digests) = load_mappings(request)?;
    let key = cache_key(bundle.source, patch_digest, mapping_set_digest(&mapping_digests));
    debug!(key = %key, "derivation key computed");

    let derived_cache = DerivedCache::new(derived_cache_dir(request)?)?;
    if !request.force && !request.no_cache {
        if let Some(path) = derived_cache.lookup(&key) {
            info!(path = %path.display(), "using cached derived artifact");
            let derived_digest = sha256_file(&path)?;
            let exit_code = maybe_launch(request, &path)?;
            return Ok(PipelineOutcome {
                derived: path,
                derived_digest,
                cache_hit: true,
                exit_code,
            });
        }
    }

    let base_bytes = resolve_base(request, &bundle)?;
    let patched = patch::apply(&base_bytes, &bundle)?;
    let derived_bytes = match &mapping {
        Some(mapping) => remap_jar(
            &patched,
            mapping,
            RemapOptions {
                strict: request.strict_remap,
            },
        )?,
        None => patched,
    };
    let derived_digest = sha256(&derived_bytes);

    let derived = if request.no_cache {
        // Temp file in the same directory, so the rename is atomic and a
        // crash mid-write never leaves a partial jar at the final name.
        let dir = std::env::temp_dir();
        let path = dir.join(format!("patchboot-{key}.jar"));
        let mut tmp = tempfile::NamedTempFile::new_in(&dir)
            .context("failed to create temp file for derived artifact")?;
        tmp.write_all(&derived_bytes)
            .context("failed to write derived artifact")?;
        source::persist_named_tempfile(tmp, &path)
            .with_context(|| format!("failed to publish derived artifact {}", path.display()))?;
        path
    } else {
        derived_cache.store(&key, &derived_bytes)?
    };
    info!(
        path = %derived.display(),
        digest = %derived_digest,
        "derived artifact ready"
    );

    let exit_code = maybe_launch(request, &derived)?;
    Ok(PipelineOutcome {
        derived,
        derived_digest,
        cache_hit: false,
        exit_code,
    })
}

fn maybe_launch(request: &PipelineRequest, derived: &Path) -> Result<Option<i32>> {
    match &request.launch {
        Some(options) => Ok(Some(launch::launch(derived, options)?)),
        None => Ok(None),
    }
}

fn derived_cache_dir(request: &PipelineRequest) -> Result<PathBuf> {
    match &request.derived_cache {
        Some(dir) => Ok(dir.clone()),
        None => Ok(config::resolve_derived_cache()?.path),
    }
}

fn base_cache_dir(request: &PipelineRequest) -> Result<PathBuf> {
    match &request.base_cache {
        Some(dir) => Ok(dir.clone()),
        None => Ok(config::resolve_base_cache()?.path),
    }
}

/// Obtain verified base bytes, either from an explicit path or through the
/// manifest-driven source stage.
fn resolve_base(request: &PipelineRequest, bundle: &PatchBundle) -> Result<Vec<u8>> {
    if let Some(base_path) = &request.base_path {
        let bytes = fs::read(base_path)
            .with_context(|| format!("failed to read base artifact {}", base_path.display()))?;
        verify(&bytes, bundle.source).map_err(|err| PipelineError::SourceIntegrity {
            expected: err.expected,
            actual: err.actual,
        })?;
        return Ok(bytes);
    }

    let manifest_path = request.manifest_path.as_ref().ok_or_else(|| {
        anyhow::anyhow!("either a version manifest or an explicit base artifact is required")
    })?;
    let raw = fs::read_to_string(manifest_path)
        .with_context(|| format!("failed to read manifest {}", manifest_path.display()))?;
    let manifest = VersionManifest::parse(&raw)?;
    if manifest.sha256 != bundle.source {
        // The patch can never apply to the artifact this manifest describes.
        return Err(PipelineError::SourceIntegrity {
            expected: bundle.source,
            actual: manifest.sha256,
        }
        .into());
    }

    let options = SourceOptions {
        base_dir: base_cache_dir(request)?,
        mismatch_policy: request.mismatch_policy,
        timeout: request.timeout,
    };
    let path = source::resolve(&manifest, &options)?;
    let bytes = fs::read(&path)
        .with_context(|| format!("failed to read base artifact {}", path.display()))?;
    verify(&bytes, bundle.source).map_err(|err| PipelineError::SourceIntegrity {
        expected: err.expected,
        actual: err.actual,
    })?;
    Ok(bytes)
}

/// Load and compose the mapping tables, left to right. Returns `None` when
/// no tables were given, which skips the remap stage entirely.
fn load_mappings(
    request: &PipelineRequest,
) -> Result<(Option<MappingSet>, Vec<Digest>)> {
    let mut digests = Vec::with_capacity(request.mappings.len());
    let mut composed: Option<MappingSet> = None;
    for source in &request.mappings {
        let bytes = fs::read(&source.path).with_context(|| {
            format!("failed to read mapping table {}", source.path.display())
        })?;
        digests.push(sha256(&bytes));
        let text = String::from_utf8(bytes).map_err(|_| {
            PipelineError::MappingFormat(format!(
                "{} is not UTF-8",
                source.path.display()
            ))
        })?;
        let table = parse_one(&text, source)
            .map_err(|err| annotate_mapping(err, &source.path))?;
        composed = Some(match composed {
            None => table,
            Some(previous) => compose(&previous, &table, request.compose_policy)
                .map_err(|err| PipelineError::MappingFormat(err.to_string()))?,
        });
    }
    Ok((composed, digests))
}

fn parse_one(text: &str, source: &MappingSource) -> Result<MappingSet, PipelineError> {
    if text.lines().next().is_some_and(|line| line.starts_with("tiny\t")) {
        let table =
            parse_tiny(text).map_err(|err| PipelineError::MappingFormat(err.to_string()))?;
        if let Some((from, to)) = &source.spaces {
            if table.from_space != *from || table.to_space != *to {
                return Err(PipelineError::MappingFormat(format!(
                    "tiny header maps {} -> {} but {from} -> {to} was requested",
                    table.from_space, table.to_space
                )));
            }
        }
        return Ok(table);
    }
    let Some((from, to)) = &source.spaces else {
        return Err(PipelineError::MappingFormat(
            "proguard tables need explicit from/to spaces (path:from:to)".to_string(),
        ));
    };
    parse_proguard(text, from, to).map_err(|err| PipelineError::MappingFormat(err.to_string()))
}

fn annotate_mapping(err: PipelineError, path: &Path) -> PipelineError {
    match err {
        PipelineError::MappingFormat(message) => {
            PipelineError::MappingFormat(format!("{}: {message}", path.display()))
        }
        other => other,
    }
}
