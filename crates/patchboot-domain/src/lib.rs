#![deny(clippy::all, warnings)]
#![allow(
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]

pub mod bundle;
pub mod digest;
pub mod manifest;
pub mod mapping;

pub use bundle::{PatchBundle, BUNDLE_FORMAT_VERSION, BUNDLE_MAGIC};
pub use digest::{sha256, sha256_file, verify, Digest, IntegrityMismatch};
pub use manifest::VersionManifest;
pub use mapping::{
    compose, ComposeError, ComposePolicy, MappingFormatError, MappingSet, MemberKey,
};
