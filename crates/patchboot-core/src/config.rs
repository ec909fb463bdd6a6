use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use dirs_next::home_dir;

/// A resolved cache directory plus a label saying where it came from, so
/// diagnostics can tell users which override won.
#[derive(Debug, Clone)]
pub struct CacheLocation {
    pub path: PathBuf,
    pub source: &'static str,
}

#[derive(Debug, Clone)]
pub struct CacheUsage {
    pub exists: bool,
    pub total_entries: u64,
    pub total_size_bytes: u64,
}

/// Root for all patchboot state. `PATCHBOOT_CACHE_PATH` overrides; the
/// default lives under the home directory.
pub fn resolve_cache_root() -> Result<CacheLocation> {
    if let Some(override_path) = env::var_os("PATCHBOOT_CACHE_PATH") {
        let path = absolutize(PathBuf::from(override_path))?;
        return Ok(CacheLocation {
            path,
            source: "PATCHBOOT_CACHE_PATH",
        });
    }
    if let Some(home) = home_dir() {
        return Ok(CacheLocation {
            path: home.join(".patchboot").join("cache"),
            source: "HOME/.patchboot",
        });
    }
    Ok(CacheLocation {
        path: PathBuf::from("/tmp/patchboot/cache"),
        source: "default (/tmp/patchboot)",
    })
}

/// Where verified base artifacts are kept. `PATCHBOOT_BASE_CACHE` overrides.
pub fn resolve_base_cache() -> Result<CacheLocation> {
    if let Some(override_path) = env::var_os("PATCHBOOT_BASE_CACHE") {
        return Ok(CacheLocation {
            path: absolutize(PathBuf::from(override_path))?,
            source: "PATCHBOOT_BASE_CACHE",
        });
    }
    let root = resolve_cache_root()?;
    Ok(CacheLocation {
        path: root.path.join("base"),
        source: root.source,
    })
}

/// Where derived artifacts are published. `PATCHBOOT_DERIVED_CACHE`
/// overrides.
pub fn resolve_derived_cache() -> Result<CacheLocation> {
    if let Some(override_path) = env::var_os("PATCHBOOT_DERIVED_CACHE") {
        return Ok(CacheLocation {
            path: absolutize(PathBuf::from(override_path))?,
            source: "PATCHBOOT_DERIVED_CACHE",
        });
    }
    let root = resolve_cache_root()?;
    Ok(CacheLocation {
        path: root.path.join("derived"),
        source: root.source,
    })
}

/// Aggregate file count and size under a cache path.
pub fn compute_cache_usage(path: &Path) -> Result<CacheUsage> {
    if !path.exists() {
        return Ok(CacheUsage {
            exists: false,
            total_entries: 0,
            total_size_bytes: 0,
        });
    }
    let mut total_entries = 0u64;
    let mut total_size_bytes = 0u64;
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let entry = entry?;
            let file_type = entry.file_type()?;
            if file_type.is_symlink() {
                continue;
            }
            if file_type.is_dir() {
                stack.push(entry.path());
            } else if file_type.is_file() {
                total_entries += 1;
                total_size_bytes += entry.metadata()?.len();
            }
        }
    }
    Ok(CacheUsage {
        exists: true,
        total_entries,
        total_size_bytes,
    })
}

/// Delete every file and empty directory under the cache path. Returns the
/// number of files removed.
pub fn prune_cache(path: &Path) -> Result<u64> {
    if !path.exists() {
        return Ok(0);
    }
    let mut files = Vec::new();
    let mut dirs = Vec::new();
    let mut stack = vec![path.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)
            .with_context(|| format!("failed to list {}", dir.display()))?
        {
            let entry = entry?;
            let file_type = entry.file_type()?;
            let entry_path = entry.path();
            if file_type.is_dir() {
                stack.push(entry_path.clone());
                dirs.push(entry_path);
            } else {
                files.push(entry_path);
            }
        }
    }
    let mut deleted = 0u64;
    for file in files {
        if fs::remove_file(&file).is_ok() {
            deleted += 1;
        }
    }
    dirs.sort();
    for dir in dirs.iter().rev() {
        let _ = fs::remove_dir(dir);
    }
    Ok(deleted)
}

fn absolutize(path: PathBuf) -> Result<PathBuf> {
    if path.is_absolute() {
        Ok(path)
    } else {
        Ok(env::current_dir()
            .context("failed to resolve cache path override")?
            .join(path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    struct EnvGuard {
        key: &'static str,
        previous: Option<std::ffi::OsString>,
    }

    impl EnvGuard {
        fn set(key: &'static str, value: Option<&str>) -> Self {
            let previous = env::var_os(key);
            match value {
                Some(value) => env::set_var(key, value),
                None => env::remove_var(key),
            }
            Self { key, previous }
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            match &self.previous {
                Some(value) => env::set_var(self.key, value),
                None => env::remove_var(self.key),
            }
        }
    }

    #[test]
    #[serial]
    fn cache_root_honors_env_override() {
        let temp = tempfile::tempdir().expect("tempdir");
        let value = temp.path().to_str().expect("utf8 path").to_string();
        let _guard = EnvGuard::set("PATCHBOOT_CACHE_PATH", Some(&value));
        let location = resolve_cache_root().expect("resolve");
        assert_eq!(location.path, temp.path());
        assert_eq!(location.source, "PATCHBOOT_CACHE_PATH");
    }

    #[test]
    #[serial]
    fn base_and_derived_live_under_the_root_by_default() {
        let temp = tempfile::tempdir().expect("tempdir");
        let value = temp.path().to_str().expect("utf8 path").to_string();
        let _root = EnvGuard::set("PATCHBOOT_CACHE_PATH", Some(&value));
        let _base = EnvGuard::set("PATCHBOOT_BASE_CACHE", None);
        let _derived = EnvGuard::set("PATCHBOOT_DERIVED_CACHE", None);
        assert_eq!(resolve_base_cache().unwrap().path, temp.path().join("base"));
        assert_eq!(
            resolve_derived_cache().unwrap().path,
            temp.path().join("derived")
        );
    }

    #[test]
    #[serial]
    fn dedicated_overrides_win_over_the_root() {
        let root = tempfile::tempdir().expect("tempdir");
        let base = tempfile::tempdir().expect("tempdir");
        let root_value = root.path().to_str().unwrap().to_string();
        let base_value = base.path().to_str().unwrap().to_string();
        let _root = EnvGuard::set("PATCHBOOT_CACHE_PATH", Some(&root_value));
        let _base = EnvGuard::set("PATCHBOOT_BASE_CACHE", Some(&base_value));
        let location = resolve_base_cache().expect("resolve");
        assert_eq!(location.path, base.path());
        assert_eq!(location.source, "PATCHBOOT_BASE_CACHE");
    }

    #[test]
    fn usage_counts_files_and_bytes() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("a"), b"12345").unwrap();
        fs::write(temp.path().join("sub/b"), b"123").unwrap();
        let usage = compute_cache_usage(temp.path()).expect("usage");
        assert!(usage.exists);
        assert_eq!(usage.total_entries, 2);
        assert_eq!(usage.total_size_bytes, 8);
    }

    #[test]
    fn prune_empties_the_tree() {
        let temp = tempfile::tempdir().expect("tempdir");
        fs::create_dir_all(temp.path().join("sub")).unwrap();
        fs::write(temp.path().join("a"), b"1").unwrap();
        fs::write(temp.path().join("sub/b"), b"2").unwrap();
        let deleted = prune_cache(temp.path()).expect("prune");
        assert_eq!(deleted, 2);
        assert!(!temp.path().join("sub").exists());
    }
}
