#![allow(dead_code)]

use std::fs;
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use assert_cmd::assert::Assert;
use assert_cmd::cargo::cargo_bin_cmd;
use patchboot_core::patch::test_support::make_bundle;
use serde_json::Value;
use tempfile::TempDir;
use zip::write::FileOptions;
use zip::{CompressionMethod, ZipWriter};

pub fn build_jar(entries: &[(&str, &[u8])]) -> Vec<u8> {
    let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
    let options: FileOptions = FileOptions::default()
        .compression_method(CompressionMethod::Deflated)
        .last_modified_time(zip::DateTime::default());
    for (name, data) in entries {
        writer.start_file(*name, options).expect("start entry");
        writer.write_all(data).expect("write entry");
    }
    writer.finish().expect("finish jar").into_inner()
}

/// Smallest parseable class file: `this` extending `superclass`, no members.
pub fn minimal_class(this: &str, superclass: &str) -> Vec<u8> {
    fn utf8(out: &mut Vec<u8>, value: &str) {
        out.push(1);
        out.extend_from_slice(&(value.len() as u16).to_be_bytes());
        out.extend_from_slice(value.as_bytes());
    }
    fn class(out: &mut Vec<u8>, name_index: u16) {
        out.push(7);
        out.extend_from_slice(&name_index.to_be_bytes());
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes()); // minor
    out.extend_from_slice(&52u16.to_be_bytes()); // major
    out.extend_from_slice(&5u16.to_be_bytes()); // pool count (4 entries)
    utf8(&mut out, this); // 1
    class(&mut out, 1); // 2
    utf8(&mut out, superclass); // 3
    class(&mut out, 3); // 4
    out.extend_from_slice(&0x0021u16.to_be_bytes()); // public super
    out.extend_from_slice(&2u16.to_be_bytes()); // this_class
    out.extend_from_slice(&4u16.to_be_bytes()); // super_class
    out.extend_from_slice(&0u16.to_be_bytes()); // interfaces
    out.extend_from_slice(&0u16.to_be_bytes()); // fields
    out.extend_from_slice(&0u16.to_be_bytes()); // methods
    out.extend_from_slice(&0u16.to_be_bytes()); // attributes
    out
}

pub const TINY_MAPPING: &str = "tiny\tobf\tnamed\nc\ta\tcom/example/Foo\n";

pub struct Fixture {
    pub temp: TempDir,
    pub base: PathBuf,
    pub patch: PathBuf,
    pub mapping: PathBuf,
    pub cache: PathBuf,
}

/// An obfuscated base jar, a patch bundle producing a launchable target jar,
/// a tiny mapping, and a fresh cache root, all under one tempdir.
pub fn fixture() -> Fixture {
    fixture_with_target_manifest("Manifest-Version: 1.0\nMain-Class: a\n")
}

pub fn fixture_with_target_manifest(target_manifest: &str) -> Fixture {
    let temp = tempfile::Builder::new()
        .prefix("patchboot-test")
        .tempdir()
        .expect("tempdir");

    let base_jar = build_jar(&[
        ("META-INF/MANIFEST.MF", b"Manifest-Version: 1.0\n"),
        ("readme.txt", b"old readme"),
    ]);
    let target_jar = build_jar(&[
        ("META-INF/MANIFEST.MF", target_manifest.as_bytes()),
        ("a.class", &minimal_class("a", "java/lang/Object")),
        ("readme.txt", b"new readme"),
    ]);
    let bundle = make_bundle(&base_jar, &target_jar);

    let base = temp.path().join("base.jar");
    fs::write(&base, &base_jar).expect("write base jar");
    let patch = temp.path().join("update.pbpb");
    fs::write(&patch, bundle.to_bytes()).expect("write bundle");
    let mapping = temp.path().join("obf-to-named.tiny");
    fs::write(&mapping, TINY_MAPPING).expect("write mapping");
    let cache = temp.path().join("cache");

    Fixture {
        temp,
        base,
        patch,
        mapping,
        cache,
    }
}

impl Fixture {
    /// A `patchboot run --patch ... --base ... -m ...` command with the
    /// cache pointed into the fixture tempdir.
    pub fn run_cmd(&self) -> assert_cmd::Command {
        let mut cmd = cargo_bin_cmd!("patchboot");
        cmd.env("PATCHBOOT_CACHE_PATH", &self.cache)
            .arg("run")
            .arg("--patch")
            .arg(&self.patch)
            .arg("--base")
            .arg(&self.base)
            .arg("--mapping")
            .arg(&self.mapping);
        cmd
    }
}

pub fn parse_json(assert: &Assert) -> Value {
    serde_json::from_slice(&assert.get_output().stdout).expect("valid json")
}

#[cfg(unix)]
pub fn fake_java(dir: &Path, script_body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("java");
    fs::write(&path, format!("#!/bin/sh\n{script_body}\n")).expect("write fake java");
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).expect("chmod fake java");
    path
}
