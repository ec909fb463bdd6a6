//! Hand-off to the launched program.
//!
//! The derived jar runs in a child JVM (`java -jar`), which keeps the
//! launcher portable across JVM vendors; the child's exit code becomes ours.
//! The entry point is validated before anything is spawned so a broken jar
//! fails with a launch resolution error instead of a JVM stack trace.

use std::env;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use tracing::{debug, info};
use zip::ZipArchive;

use crate::errors::PipelineError;
use crate::jar::{self, MANIFEST_PATH};

#[derive(Debug, Clone, Default)]
pub struct LaunchOptions {
    /// Explicit java executable; otherwise `$JAVA_HOME/bin/java`, then
    /// `java` from `PATH`.
    pub java: Option<PathBuf>,
    /// Overrides the manifest `Main-Class`.
    pub main_class: Option<String>,
    /// Arguments forwarded to the launched program.
    pub args: Vec<String>,
}

/// Determine the binary (dotted) name of the class the jar starts in, and
/// check that the jar actually contains it.
pub fn resolve_entry_point(jar_path: &Path, main_class: Option<&str>) -> Result<String> {
    let file = File::open(jar_path)
        .with_context(|| format!("failed to open {}", jar_path.display()))?;
    let mut archive = ZipArchive::new(file)
        .map_err(|err| PipelineError::ArtifactFormat(format!("unreadable jar: {err}")))?;

    let declared = match main_class {
        Some(name) => name.to_string(),
        None => {
            let mut entry = archive.by_name(MANIFEST_PATH).map_err(|_| {
                PipelineError::LaunchResolution("jar has no manifest".to_string())
            })?;
            let mut text = String::new();
            std::io::Read::read_to_string(&mut entry, &mut text)
                .context("failed to read jar manifest")?;
            drop(entry);
            jar::get_attribute(&text, "Main-Class").ok_or_else(|| {
                PipelineError::LaunchResolution(
                    "manifest declares no Main-Class and none was given".to_string(),
                )
            })?
        }
    };

    let class_entry = format!("{}.class", declared.replace('.', "/"));
    if archive.by_name(&class_entry).is_err() {
        return Err(PipelineError::LaunchResolution(format!(
            "entry point {declared} is not present in the jar"
        ))
        .into());
    }
    Ok(declared)
}

/// Run the derived jar and return the child's exit code.
pub fn launch(jar_path: &Path, options: &LaunchOptions) -> Result<i32> {
    let entry_point = resolve_entry_point(jar_path, options.main_class.as_deref())?;
    let java = java_executable(options);
    info!(
        java = %java.display(),
        jar = %jar_path.display(),
        entry_point,
        "handing off to launched program"
    );

    let mut command = Command::new(&java);
    if let Some(main_class) = &options.main_class {
        command.arg("-cp").arg(jar_path).arg(main_class);
    } else {
        command.arg("-jar").arg(jar_path);
    }
    let status = command
        .args(&options.args)
        .status()
        .with_context(|| format!("failed to run {}", java.display()))?;
    let code = exit_code_of(status);
    debug!(code, "launched program exited");
    Ok(code)
}

fn java_executable(options: &LaunchOptions) -> PathBuf {
    if let Some(java) = &options.java {
        return java.clone();
    }
    if let Ok(home) = env::var("JAVA_HOME") {
        let candidate = Path::new(&home).join("bin").join("java");
        if candidate.exists() {
            return candidate;
        }
    }
    PathBuf::from("java")
}

#[cfg(unix)]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    use std::os::unix::process::ExitStatusExt;
    status
        .code()
        .or_else(|| status.signal().map(|signal| 128 + signal))
        .unwrap_or(1)
}

#[cfg(not(unix))]
fn exit_code_of(status: std::process::ExitStatus) -> i32 {
    status.code().unwrap_or(1)
}
