//! Binary delta application (bsdiff40: control/diff/extra triad with bzip2
//! streams).

use std::io::Read;

use bzip2::read::BzDecoder;
use patchboot_domain::{verify, PatchBundle};
use tracing::debug;

use crate::errors::PipelineError;

const BSDIFF_MAGIC: &[u8; 8] = b"BSDIFF40";
const DELTA_HEADER_LEN: usize = 32;

/// Apply `bundle` to `base`, producing the derived bytes.
///
/// The caller must already have verified `base` against the bundle's source
/// digest. Application is deterministic, so the target-digest postcondition
/// failing means the bundle or base is wrong and retrying is pointless.
pub fn apply(base: &[u8], bundle: &PatchBundle) -> Result<Vec<u8>, PipelineError> {
    debug_assert!(
        verify(base, bundle.source).is_ok(),
        "patch engine invoked with an unverified base"
    );

    let new = apply_delta(base, &bundle.delta)?;

    verify(&new, bundle.target).map_err(|err| PipelineError::PatchIntegrity {
        expected: err.expected,
        actual: err.actual,
    })?;
    debug!(target = %bundle.target, bytes = new.len(), "patch applied");
    Ok(new)
}

fn apply_delta(base: &[u8], delta: &[u8]) -> Result<Vec<u8>, PipelineError> {
    if delta.len() < DELTA_HEADER_LEN {
        return Err(corrupt(format!(
            "delta truncated: {} bytes, header needs {DELTA_HEADER_LEN}",
            delta.len()
        )));
    }
    if &delta[..8] != BSDIFF_MAGIC {
        return Err(corrupt("delta has wrong magic".to_string()));
    }
    let ctrl_len = read_offset(&delta[8..16]);
    let diff_len = read_offset(&delta[16..24]);
    let new_size = read_offset(&delta[24..32]);
    if ctrl_len < 0 || diff_len < 0 || new_size < 0 {
        return Err(corrupt("negative block length in delta header".to_string()));
    }
    let (ctrl_len, diff_len, new_size) =
        (ctrl_len as usize, diff_len as usize, new_size as usize);
    let body = &delta[DELTA_HEADER_LEN..];
    if body.len() < ctrl_len + diff_len {
        return Err(corrupt("delta body shorter than declared blocks".to_string()));
    }

    let ctrl = decompress(&body[..ctrl_len], "control")?;
    let diff = decompress(&body[ctrl_len..ctrl_len + diff_len], "diff")?;
    let extra = decompress(&body[ctrl_len + diff_len..], "extra")?;

    // Every output byte comes from the diff or extra block, so a declared
    // size beyond their combined length cannot be produced. Checked before
    // the allocation so a corrupted size field cannot abort the process.
    if new_size > diff.len() + extra.len() {
        return Err(corrupt(format!(
            "declared output size {new_size} exceeds diff+extra capacity {}",
            diff.len() + extra.len()
        )));
    }

    let mut new = vec![0u8; new_size];
    let mut new_pos = 0usize;
    let mut old_pos = 0i64;
    let mut diff_pos = 0usize;
    let mut extra_pos = 0usize;
    let mut ctrl_pos = 0usize;

    while new_pos < new_size {
        if ctrl_pos + 24 > ctrl.len() {
            return Err(corrupt("control block exhausted".to_string()));
        }
        let add_len = read_offset(&ctrl[ctrl_pos..ctrl_pos + 8]);
        let copy_len = read_offset(&ctrl[ctrl_pos + 8..ctrl_pos + 16]);
        let seek = read_offset(&ctrl[ctrl_pos + 16..ctrl_pos + 24]);
        ctrl_pos += 24;
        if add_len < 0 || copy_len < 0 {
            return Err(corrupt("negative length in control triple".to_string()));
        }
        let (add_len, copy_len) = (add_len as usize, copy_len as usize);

        if new_pos + add_len > new_size || diff_pos + add_len > diff.len() {
            return Err(corrupt("diff block overruns output".to_string()));
        }
        for i in 0..add_len {
            // Old bytes past either end contribute zero, matching bspatch.
            let old_index = old_pos + i as i64;
            let old_byte = if old_index >= 0 && (old_index as usize) < base.len() {
                base[old_index as usize]
            } else {
                0
            };
            new[new_pos + i] = diff[diff_pos + i].wrapping_add(old_byte);
        }
        new_pos += add_len;
        diff_pos += add_len;
        old_pos += add_len as i64;

        if new_pos + copy_len > new_size || extra_pos + copy_len > extra.len() {
            return Err(corrupt("extra block overruns output".to_string()));
        }
        new[new_pos..new_pos + copy_len]
            .copy_from_slice(&extra[extra_pos..extra_pos + copy_len]);
        new_pos += copy_len;
        extra_pos += copy_len;
        old_pos += seek;
    }

    Ok(new)
}

fn decompress(bytes: &[u8], block: &str) -> Result<Vec<u8>, PipelineError> {
    let mut out = Vec::new();
    BzDecoder::new(bytes)
        .read_to_end(&mut out)
        .map_err(|err| corrupt(format!("failed to decompress {block} block: {err}")))?;
    Ok(out)
}

fn corrupt(message: String) -> PipelineError {
    PipelineError::PatchCorrupt(message)
}

/// Sign-magnitude little-endian offset, as written by bsdiff's `offtout`.
fn read_offset(buf: &[u8]) -> i64 {
    let mut value = i64::from(buf[7] & 0x7f);
    for i in (0..7).rev() {
        value = value * 256 + i64::from(buf[i]);
    }
    if buf[7] & 0x80 != 0 {
        -value
    } else {
        value
    }
}

/// Delta construction for tests and fixtures. Not a general-purpose diff
/// tool: it emits one control triple covering the whole output.
#[doc(hidden)]
pub mod test_support {
    use std::io::Write;

    use bzip2::write::BzEncoder;
    use bzip2::Compression;
    use patchboot_domain::{sha256, PatchBundle};

    use super::BSDIFF_MAGIC;

    #[must_use]
    pub fn write_offset(value: i64) -> [u8; 8] {
        let magnitude = value.unsigned_abs();
        let mut buf = magnitude.to_le_bytes();
        if value < 0 {
            buf[7] |= 0x80;
        }
        buf
    }

    fn compress(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = BzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).expect("bzip2 encode");
        encoder.finish().expect("bzip2 finish")
    }

    /// Single-triple bsdiff40 delta transforming `base` into `new`.
    #[must_use]
    pub fn make_delta(base: &[u8], new: &[u8]) -> Vec<u8> {
        let add_len = base.len().min(new.len());
        let diff: Vec<u8> = (0..add_len)
            .map(|i| new[i].wrapping_sub(base[i]))
            .collect();
        let extra = &new[add_len..];

        let mut ctrl = Vec::new();
        ctrl.extend_from_slice(&write_offset(add_len as i64));
        ctrl.extend_from_slice(&write_offset(extra.len() as i64));
        ctrl.extend_from_slice(&write_offset(0));

        let ctrl_z = compress(&ctrl);
        let diff_z = compress(&diff);
        let extra_z = compress(extra);

        let mut delta = Vec::new();
        delta.extend_from_slice(BSDIFF_MAGIC);
        delta.extend_from_slice(&write_offset(ctrl_z.len() as i64));
        delta.extend_from_slice(&write_offset(diff_z.len() as i64));
        delta.extend_from_slice(&write_offset(new.len() as i64));
        delta.extend_from_slice(&ctrl_z);
        delta.extend_from_slice(&diff_z);
        delta.extend_from_slice(&extra_z);
        delta
    }

    /// Full patch bundle (header + delta) for a base/new pair.
    #[must_use]
    pub fn make_bundle(base: &[u8], new: &[u8]) -> PatchBundle {
        PatchBundle {
            source: sha256(base),
            target: sha256(new),
            delta: make_delta(base, new),
        }
    }
}
