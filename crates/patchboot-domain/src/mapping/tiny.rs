//! Compact tab-separated mapping format.
//!
//! ```text
//! tiny<TAB>obf<TAB>named
//! c<TAB>a<TAB>com/example/Foo
//! f<TAB>a<TAB>I<TAB>c<TAB>count
//! m<TAB>a<TAB>(La;)La;<TAB>d<TAB>combine
//! ```
//!
//! Class names are internal (slashed); member rows carry the owner and the
//! descriptor in the source space.

use super::{MappingFormatError, MappingSet, MemberKey};

pub fn parse_tiny(text: &str) -> Result<MappingSet, MappingFormatError> {
    let mut lines = text.lines().enumerate();

    let (_, header) = lines
        .next()
        .ok_or_else(|| MappingFormatError::new(1, "empty mapping file"))?;
    let mut parts = header.split('\t');
    if parts.next() != Some("tiny") {
        return Err(MappingFormatError::new(1, "missing `tiny` header"));
    }
    let from_space = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MappingFormatError::new(1, "header missing source space"))?;
    let to_space = parts
        .next()
        .filter(|s| !s.is_empty())
        .ok_or_else(|| MappingFormatError::new(1, "header missing target space"))?;
    if parts.next().is_some() {
        return Err(MappingFormatError::new(1, "trailing header fields"));
    }

    let mut set = MappingSet::new(from_space, to_space);
    for (index, line) in lines {
        let line_no = index + 1;
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let fields: Vec<&str> = line.split('\t').collect();
        match fields.as_slice() {
            ["c", from, to] => {
                require_name(line_no, from)?;
                require_name(line_no, to)?;
                set.add_class(*from, *to);
            }
            ["f", owner, desc, from, to] => {
                require_name(line_no, owner)?;
                require_name(line_no, from)?;
                require_name(line_no, to)?;
                set.add_field(MemberKey::new(*owner, *from, *desc), *to);
            }
            ["m", owner, desc, from, to] => {
                require_name(line_no, owner)?;
                require_name(line_no, from)?;
                require_name(line_no, to)?;
                set.add_method(MemberKey::new(*owner, *from, *desc), *to);
            }
            [kind, ..] => {
                return Err(MappingFormatError::new(
                    line_no,
                    format!("unknown or short row kind {kind:?}"),
                ));
            }
            [] => unreachable!("split always yields at least one field"),
        }
    }
    Ok(set)
}

fn require_name(line: usize, name: &str) -> Result<(), MappingFormatError> {
    if name.is_empty() {
        return Err(MappingFormatError::new(line, "empty symbol name"));
    }
    Ok(())
}
