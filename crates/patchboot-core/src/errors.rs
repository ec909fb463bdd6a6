use patchboot_domain::Digest;
use thiserror::Error;

/// Fatal pipeline failures, one variant per stage contract.
///
/// Everything here is unrecoverable locally: the pipeline is deterministic,
/// so nothing outside the artifact source is ever retried. Each variant has
/// a stable code and a distinct process exit code so distributors can script
/// failure handling.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("base artifact failed verification after retry (expected {expected}, got {actual})")]
    SourceIntegrity { expected: Digest, actual: Digest },
    #[error("patch did not produce the declared target (expected {expected}, got {actual})")]
    PatchIntegrity { expected: Digest, actual: Digest },
    #[error("corrupt patch payload: {0}")]
    PatchCorrupt(String),
    #[error("mapping error: {0}")]
    MappingFormat(String),
    #[error("artifact format error: {0}")]
    ArtifactFormat(String),
    #[error("launch entry point unresolved: {0}")]
    LaunchResolution(String),
}

impl PipelineError {
    #[must_use]
    pub fn code(&self) -> &'static str {
        match self {
            Self::SourceIntegrity { .. } => "source_integrity",
            Self::PatchIntegrity { .. } | Self::PatchCorrupt(_) => "patch_integrity",
            Self::MappingFormat(_) => "mapping_format",
            Self::ArtifactFormat(_) => "artifact_format",
            Self::LaunchResolution(_) => "launch_resolution",
        }
    }

    /// Process exit code for this failure; 0 and 1 are reserved for success
    /// and usage errors, 2 for failures outside the taxonomy.
    #[must_use]
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::SourceIntegrity { .. } => 10,
            Self::PatchIntegrity { .. } | Self::PatchCorrupt(_) => 11,
            Self::MappingFormat(_) => 12,
            Self::ArtifactFormat(_) => 13,
            Self::LaunchResolution(_) => 14,
        }
    }
}

/// Walk an `anyhow` chain for the pipeline failure that should decide the
/// process exit code.
#[must_use]
pub fn pipeline_error_of(err: &anyhow::Error) -> Option<&PipelineError> {
    err.chain()
        .find_map(|cause| cause.downcast_ref::<PipelineError>())
}
