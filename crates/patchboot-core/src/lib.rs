//! The patchboot derivation pipeline: resolve and verify a base artifact,
//! apply a binary patch, remap its symbols, cache the result, and hand off
//! to the launched program.

#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod cache;
pub mod config;
pub mod errors;
mod jar;
pub mod launch;
pub mod patch;
pub mod pipeline;
pub mod remap;
pub mod source;

pub use errors::{pipeline_error_of, PipelineError};
pub use patchboot_domain::{ComposePolicy, Digest};
pub use launch::LaunchOptions;
pub use pipeline::{run, MappingSource, PipelineOutcome, PipelineRequest};
pub use remap::{remap_jar, RemapOptions};
pub use source::MismatchPolicy;
