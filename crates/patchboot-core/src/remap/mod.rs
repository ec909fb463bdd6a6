//! Jar-level remapping: walks the archive, rewrites every class file and
//! renames its entry, remaps the manifest's `Main-Class`, and stamps the
//! output with the naming space its symbols are in so a second pass against
//! the wrong mapping is refused instead of silently corrupting the jar.

pub(crate) mod classfile;

use std::io::{Cursor, Read, Write};

use anyhow::{Context, Result};
use patchboot_domain::MappingSet;
use rayon::prelude::*;
use tracing::debug;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::errors::PipelineError;
use crate::jar::{self, MANIFEST_PATH, NAMESPACE_ATTRIBUTE};

#[derive(Debug, Clone, Copy, Default)]
pub struct RemapOptions {
    /// Fail on references to unmapped members of mapped classes instead of
    /// passing them through.
    pub strict: bool,
}

const VERSIONED_PREFIX: &str = "META-INF/versions/";

/// Remap every symbol in a jar from `mapping.from_space` to
/// `mapping.to_space`, returning the rewritten archive bytes.
///
/// Output is deterministic: entries keep their input order, timestamps are
/// fixed, and compression is plain deflate, so identical inputs produce
/// byte-identical jars.
pub fn remap_jar(bytes: &[u8], mapping: &MappingSet, options: RemapOptions) -> Result<Vec<u8>> {
    let mut archive = ZipArchive::new(Cursor::new(bytes))
        .map_err(|err| PipelineError::ArtifactFormat(format!("unreadable jar: {err}")))?;

    let mut entries: Vec<(String, Vec<u8>)> = Vec::with_capacity(archive.len());
    let mut manifest: Option<String> = None;
    for index in 0..archive.len() {
        let mut entry = archive.by_index(index).map_err(|err| {
            PipelineError::ArtifactFormat(format!("unreadable jar entry {index}: {err}"))
        })?;
        if entry.is_dir() {
            continue;
        }
        let name = entry.name().to_string();
        let mut data = Vec::with_capacity(usize::try_from(entry.size()).unwrap_or(0));
        entry
            .read_to_end(&mut data)
            .with_context(|| format!("failed to read jar entry {name}"))?;
        if name == MANIFEST_PATH {
            let text = String::from_utf8(data).map_err(|_| {
                PipelineError::ArtifactFormat("jar manifest is not UTF-8".to_string())
            })?;
            manifest = Some(text);
        } else {
            entries.push((name, data));
        }
    }

    let manifest = remap_manifest(manifest, mapping)?;

    let rewritten: Vec<(String, Vec<u8>)> = entries
        .into_par_iter()
        .map(|(name, data)| remap_entry(name, data, mapping, options))
        .collect::<Result<_, PipelineError>>()?;

    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let file_options: FileOptions = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    writer
        .start_file(MANIFEST_PATH, file_options)
        .context("failed to start manifest entry")?;
    writer
        .write_all(manifest.as_bytes())
        .context("failed to write manifest entry")?;
    for (name, data) in &rewritten {
        writer
            .start_file(name, file_options)
            .with_context(|| format!("failed to start jar entry {name}"))?;
        writer
            .write_all(data)
            .with_context(|| format!("failed to write jar entry {name}"))?;
    }
    let cursor = writer.finish().context("failed to finish jar")?;
    debug!(
        entries = rewritten.len() + 1,
        from = %mapping.from_space,
        to = %mapping.to_space,
        "jar remapped"
    );
    Ok(cursor.into_inner())
}

fn remap_entry(
    name: String,
    data: Vec<u8>,
    mapping: &MappingSet,
    options: RemapOptions,
) -> Result<(String, Vec<u8>), PipelineError> {
    let Some(internal) = class_entry_name(&name) else {
        return Ok((name, data));
    };
    let rewritten = classfile::remap_class(&data, mapping, options.strict)
        .map_err(|err| annotate_entry(err, &name))?;
    let mapped = mapping.map_class(internal.name);
    let new_name = format!("{}{}.class", internal.prefix, mapped);
    Ok((new_name, rewritten))
}

struct ClassEntryName<'a> {
    /// Empty, or a multi-release prefix such as `META-INF/versions/17/`.
    prefix: &'a str,
    name: &'a str,
}

fn class_entry_name(entry: &str) -> Option<ClassEntryName<'_>> {
    let stem = entry.strip_suffix(".class")?;
    if let Some(rest) = stem.strip_prefix(VERSIONED_PREFIX) {
        if let Some(slash) = rest.find('/') {
            let (version, name) = rest.split_at(slash);
            if version.bytes().all(|b| b.is_ascii_digit()) {
                let prefix_len = VERSIONED_PREFIX.len() + slash + 1;
                return Some(ClassEntryName {
                    prefix: &entry[..prefix_len],
                    name: &name[1..],
                });
            }
        }
    }
    Some(ClassEntryName { prefix: "", name: stem })
}

fn annotate_entry(err: PipelineError, entry: &str) -> PipelineError {
    match err {
        PipelineError::ArtifactFormat(message) => {
            PipelineError::ArtifactFormat(format!("{entry}: {message}"))
        }
        PipelineError::MappingFormat(message) => {
            PipelineError::MappingFormat(format!("{entry}: {message}"))
        }
        other => other,
    }
}

/// Check the jar's recorded naming space, remap `Main-Class`, and stamp the
/// target space.
fn remap_manifest(
    manifest: Option<String>,
    mapping: &MappingSet,
) -> Result<String, PipelineError> {
    let text = manifest.unwrap_or_else(|| "Manifest-Version: 1.0\n".to_string());
    if let Some(space) = jar::get_attribute(&text, NAMESPACE_ATTRIBUTE) {
        if space != mapping.from_space {
            return Err(PipelineError::ArtifactFormat(format!(
                "jar symbols are in space '{space}' but the mapping expects '{}'",
                mapping.from_space
            )));
        }
    }
    let text = if let Some(main_class) = jar::get_attribute(&text, "Main-Class") {
        let internal = main_class.replace('.', "/");
        let mapped = mapping.map_class(&internal).replace('/', ".");
        jar::set_attribute(&text, "Main-Class", &mapped)
    } else {
        text
    };
    Ok(jar::set_attribute(&text, NAMESPACE_ATTRIBUTE, &mapping.to_space))
}

#[cfg(test)]
mod tests {
    use super::classfile::test_support::sample_obfuscated_class;
    use super::*;
    use patchboot_domain::MemberKey;

    fn obf_to_named() -> MappingSet {
        let mut mapping = MappingSet::new("obf", "named");
        mapping.add_class("a", "com/example/Foo");
        mapping.add_field(MemberKey::new("a", "c", "I"), "count");
        mapping.add_method(MemberKey::new("a", "d", "(La;)La;"), "combine");
        mapping
    }

    fn build_jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options: FileOptions =
            FileOptions::default().compression_method(CompressionMethod::Deflated);
        for (name, data) in entries {
            writer.start_file(*name, options).expect("start entry");
            writer.write_all(data).expect("write entry");
        }
        writer.finish().expect("finish jar").into_inner()
    }

    fn read_entry(jar: &[u8], name: &str) -> Option<Vec<u8>> {
        let mut archive = ZipArchive::new(Cursor::new(jar)).expect("open jar");
        let mut entry = archive.by_name(name).ok()?;
        let mut data = Vec::new();
        entry.read_to_end(&mut data).expect("read entry");
        Some(data)
    }

    fn entry_names(jar: &[u8]) -> Vec<String> {
        let mut archive = ZipArchive::new(Cursor::new(jar)).expect("open jar");
        (0..archive.len())
            .map(|i| archive.by_index(i).expect("entry").name().to_string())
            .collect()
    }

    const MANIFEST: &[u8] = b"Manifest-Version: 1.0\nMain-Class: a\n";

    fn sample_jar() -> Vec<u8> {
        build_jar(&[
            (MANIFEST_PATH, MANIFEST),
            ("a.class", &sample_obfuscated_class()),
            ("assets/logo.png", b"\x89PNG not really"),
        ])
    }

    #[test]
    fn renames_class_entries_and_remaps_main_class() {
        let jar = remap_jar(&sample_jar(), &obf_to_named(), RemapOptions::default())
            .expect("remap");
        let names = entry_names(&jar);
        assert!(names.contains(&"com/example/Foo.class".to_string()));
        assert!(!names.contains(&"a.class".to_string()));

        let manifest = String::from_utf8(read_entry(&jar, MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(
            jar::get_attribute(&manifest, "Main-Class").as_deref(),
            Some("com.example.Foo")
        );
        assert_eq!(
            jar::get_attribute(&manifest, NAMESPACE_ATTRIBUTE).as_deref(),
            Some("named")
        );
    }

    #[test]
    fn resources_are_copied_verbatim() {
        let jar = remap_jar(&sample_jar(), &obf_to_named(), RemapOptions::default())
            .expect("remap");
        assert_eq!(
            read_entry(&jar, "assets/logo.png").as_deref(),
            Some(b"\x89PNG not really".as_slice())
        );
    }

    #[test]
    fn remap_is_deterministic() {
        let input = sample_jar();
        let mapping = obf_to_named();
        let first = remap_jar(&input, &mapping, RemapOptions::default()).expect("first");
        let second = remap_jar(&input, &mapping, RemapOptions::default()).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn remap_is_idempotent_when_spaces_coincide() {
        // With from and to the same space, the first pass renames everything
        // and the second finds only already-renamed symbols to pass through.
        let mut mapping = MappingSet::new("obf", "obf");
        mapping.add_class("a", "com/example/Foo");
        mapping.add_field(MemberKey::new("a", "c", "I"), "count");
        mapping.add_method(MemberKey::new("a", "d", "(La;)La;"), "combine");
        let once = remap_jar(&sample_jar(), &mapping, RemapOptions::default()).expect("first");
        let twice = remap_jar(&once, &mapping, RemapOptions::default()).expect("second");
        assert_eq!(once, twice);
    }

    #[test]
    fn refuses_to_remap_from_the_wrong_space() {
        let once = remap_jar(&sample_jar(), &obf_to_named(), RemapOptions::default())
            .expect("first remap");
        // The output records space "named"; applying the obf mapping again
        // must be refused, not silently produce garbage.
        let err = remap_jar(&once, &obf_to_named(), RemapOptions::default())
            .expect_err("double remap");
        let pipeline = crate::errors::pipeline_error_of(&err).expect("taxonomy error");
        assert_eq!(pipeline.exit_code(), 13);
    }

    #[test]
    fn remapping_onward_from_the_recorded_space_is_allowed() {
        let once = remap_jar(&sample_jar(), &obf_to_named(), RemapOptions::default())
            .expect("first remap");
        let mut onward = MappingSet::new("named", "demo");
        onward.add_class("com/example/Foo", "net/demo/Foo");
        let twice = remap_jar(&once, &onward, RemapOptions::default()).expect("second remap");
        assert!(entry_names(&twice).contains(&"net/demo/Foo.class".to_string()));
    }

    #[test]
    fn multi_release_entries_keep_their_version_prefix() {
        let jar = build_jar(&[
            (MANIFEST_PATH, MANIFEST),
            ("META-INF/versions/17/a.class", &sample_obfuscated_class()),
        ]);
        let out = remap_jar(&jar, &obf_to_named(), RemapOptions::default()).expect("remap");
        assert!(entry_names(&out)
            .contains(&"META-INF/versions/17/com/example/Foo.class".to_string()));
    }

    #[test]
    fn corrupt_class_entry_names_the_entry() {
        let jar = build_jar(&[
            (MANIFEST_PATH, MANIFEST),
            ("broken.class", b"\xCA\xFE\xBA\xBEtruncated"),
        ]);
        let err = remap_jar(&jar, &obf_to_named(), RemapOptions::default())
            .expect_err("corrupt class");
        let pipeline = crate::errors::pipeline_error_of(&err).expect("taxonomy error");
        assert_eq!(pipeline.exit_code(), 13);
        assert!(pipeline.to_string().contains("broken.class"));
    }

    #[test]
    fn non_zip_input_is_artifact_format() {
        let err = remap_jar(b"not a jar at all", &obf_to_named(), RemapOptions::default())
            .expect_err("not a jar");
        let pipeline = crate::errors::pipeline_error_of(&err).expect("taxonomy error");
        assert_eq!(pipeline.exit_code(), 13);
    }

    #[test]
    fn jar_without_manifest_gains_one_with_the_namespace() {
        let jar = build_jar(&[("a.class", &sample_obfuscated_class())]);
        let out = remap_jar(&jar, &obf_to_named(), RemapOptions::default()).expect("remap");
        let manifest = String::from_utf8(read_entry(&out, MANIFEST_PATH).unwrap()).unwrap();
        assert_eq!(
            jar::get_attribute(&manifest, NAMESPACE_ATTRIBUTE).as_deref(),
            Some("named")
        );
    }
}
