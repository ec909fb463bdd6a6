use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::digest::Digest;

/// Distributor-supplied description of the expected base artifact: which
/// version it is, what it must hash to, and where it can be fetched from.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionManifest {
    pub version: String,
    pub sha256: Digest,
    #[serde(default)]
    pub urls: Vec<String>,
}

impl VersionManifest {
    pub fn parse(raw: &str) -> Result<Self> {
        let manifest: Self =
            serde_json::from_str(raw).context("failed to parse version manifest")?;
        if manifest.version.trim().is_empty() {
            anyhow::bail!("version manifest has an empty version label");
        }
        Ok(manifest)
    }

    /// Canonical file name for the cached base artifact.
    #[must_use]
    pub fn cache_file_name(&self) -> String {
        format!("{}-{}.jar", self.version, &self.sha256.to_hex()[..16])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::digest::sha256;

    #[test]
    fn parses_full_manifest() {
        let digest = sha256(b"base");
        let raw = format!(
            r#"{{"version":"1.19.2","sha256":"{digest}","urls":["https://example.invalid/server.jar"]}}"#
        );
        let manifest = VersionManifest::parse(&raw).expect("parse manifest");
        assert_eq!(manifest.version, "1.19.2");
        assert_eq!(manifest.sha256, digest);
        assert_eq!(manifest.urls.len(), 1);
    }

    #[test]
    fn urls_are_optional() {
        let digest = sha256(b"base");
        let raw = format!(r#"{{"version":"1.19.2","sha256":"{digest}"}}"#);
        let manifest = VersionManifest::parse(&raw).expect("parse manifest");
        assert!(manifest.urls.is_empty());
    }

    #[test]
    fn rejects_bad_digest_and_empty_version() {
        assert!(VersionManifest::parse(r#"{"version":"1.0","sha256":"zz"}"#).is_err());
        let digest = sha256(b"base");
        let raw = format!(r#"{{"version":"  ","sha256":"{digest}"}}"#);
        assert!(VersionManifest::parse(&raw).is_err());
    }

    #[test]
    fn cache_file_name_is_stable() {
        let digest = sha256(b"base");
        let manifest = VersionManifest {
            version: "1.19.2".into(),
            sha256: digest,
            urls: Vec::new(),
        };
        assert_eq!(
            manifest.cache_file_name(),
            format!("1.19.2-{}.jar", &digest.to_hex()[..16])
        );
    }
}
