//! Minimal jar manifest handling: just enough of `META-INF/MANIFEST.MF`
//! main-section parsing (including 72-byte continuation folding) to read and
//! rewrite individual attributes.

pub(crate) const MANIFEST_PATH: &str = "META-INF/MANIFEST.MF";

/// Attribute recording which naming space a derived jar's symbols are in.
/// Written by the remapper; read back to refuse double-remapping.
pub(crate) const NAMESPACE_ATTRIBUTE: &str = "X-Patchboot-Namespace";

/// Read one main-section attribute, folding continuation lines.
#[must_use]
pub fn get_attribute(manifest: &str, key: &str) -> Option<String> {
    let mut lines = manifest.lines().peekable();
    while let Some(line) = lines.next() {
        if line.is_empty() {
            // End of the main section; per-entry sections follow.
            return None;
        }
        let Some((name, value)) = line.split_once(':') else {
            continue;
        };
        if !name.eq_ignore_ascii_case(key) {
            continue;
        }
        let mut value = value.trim_start().to_string();
        while let Some(next) = lines.peek() {
            let Some(continuation) = next.strip_prefix(' ') else {
                break;
            };
            value.push_str(continuation.trim_end_matches('\r'));
            lines.next();
        }
        return Some(value.trim_end_matches('\r').trim().to_string());
    }
    None
}

/// Replace or append a main-section attribute, preserving all other lines.
#[must_use]
pub fn set_attribute(manifest: &str, key: &str, value: &str) -> String {
    let mut out: Vec<String> = Vec::new();
    let mut replaced = false;
    let mut in_main_section = true;
    let mut lines = manifest.lines().peekable();
    while let Some(line) = lines.next() {
        if in_main_section && line.is_empty() {
            if !replaced {
                out.push(format!("{key}: {value}"));
                replaced = true;
            }
            in_main_section = false;
            out.push(String::new());
            continue;
        }
        if in_main_section {
            if let Some((name, _)) = line.split_once(':') {
                if name.eq_ignore_ascii_case(key) {
                    out.push(format!("{key}: {value}"));
                    replaced = true;
                    while let Some(next) = lines.peek() {
                        if next.starts_with(' ') {
                            lines.next();
                        } else {
                            break;
                        }
                    }
                    continue;
                }
            }
        }
        out.push(line.trim_end_matches('\r').to_string());
    }
    if !replaced {
        out.push(format!("{key}: {value}"));
    }
    let mut text = out.join("\n");
    text.push('\n');
    text
}
