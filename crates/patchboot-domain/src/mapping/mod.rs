//! Symbol mapping tables and the operations the remapper needs on them.
//!
//! A [`MappingSet`] is a plain bidirectional rename table between two named
//! spaces. Format-specific parsers (tiny, proguard) are adapters that all
//! normalize into this one structure before composition, so the remapper
//! never sees a file format.

mod proguard;
mod tiny;

use indexmap::IndexMap;
use thiserror::Error;

pub use proguard::parse_proguard;
pub use tiny::parse_tiny;

/// Identifies a field or method in the mapping's source space.
///
/// `owner` and class names inside `descriptor` are internal (slashed) names.
/// Fields carry their type descriptor so overload-by-type renames survive
/// composition; methods carry their full signature descriptor.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct MemberKey {
    pub owner: String,
    pub name: String,
    pub descriptor: String,
}

impl MemberKey {
    #[must_use]
    pub fn new(owner: impl Into<String>, name: impl Into<String>, descriptor: impl Into<String>) -> Self {
        Self {
            owner: owner.into(),
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }
}

/// Malformed or truncated mapping input. Fatal; the pipeline never guesses
/// around a bad table.
#[derive(Debug, Error)]
#[error("mapping format error at line {line}: {message}")]
pub struct MappingFormatError {
    pub line: usize,
    pub message: String,
}

impl MappingFormatError {
    fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// How [`compose`] treats symbols known to one side only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ComposePolicy {
    /// Pass one-sided entries through unchanged.
    #[default]
    IdentityPreserve,
    /// Fail on any symbol the other side does not know.
    Strict,
}

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("cannot compose {left_to} -> {right_from}: intermediate spaces differ")]
    SpaceMismatch { left_to: String, right_from: String },
    #[error("strict composition: {side} mapping has no entry for {symbol}")]
    UnknownSymbol { side: &'static str, symbol: String },
}

/// Immutable rename table between `from_space` and `to_space`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MappingSet {
    pub from_space: String,
    pub to_space: String,
    classes: IndexMap<String, String>,
    fields: IndexMap<MemberKey, String>,
    methods: IndexMap<MemberKey, String>,
}

impl MappingSet {
    #[must_use]
    pub fn new(from_space: impl Into<String>, to_space: impl Into<String>) -> Self {
        Self {
            from_space: from_space.into(),
            to_space: to_space.into(),
            ..Self::default()
        }
    }

    pub fn add_class(&mut self, from: impl Into<String>, to: impl Into<String>) {
        self.classes.insert(from.into(), to.into());
    }

    pub fn add_field(&mut self, key: MemberKey, to: impl Into<String>) {
        self.fields.insert(key, to.into());
    }

    pub fn add_method(&mut self, key: MemberKey, to: impl Into<String>) {
        self.methods.insert(key, to.into());
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.classes.is_empty() && self.fields.is_empty() && self.methods.is_empty()
    }

    #[must_use]
    pub fn class_count(&self) -> usize {
        self.classes.len()
    }

    /// Map an internal class name, passing unknown names through.
    #[must_use]
    pub fn map_class<'a>(&'a self, name: &'a str) -> &'a str {
        self.classes.get(name).map_or(name, String::as_str)
    }

    #[must_use]
    pub fn has_class(&self, name: &str) -> bool {
        self.classes.contains_key(name)
    }

    #[must_use]
    pub fn map_field(&self, key: &MemberKey) -> Option<&str> {
        self.fields.get(key).map(String::as_str)
    }

    #[must_use]
    pub fn map_method(&self, key: &MemberKey) -> Option<&str> {
        self.methods.get(key).map(String::as_str)
    }

    pub fn classes(&self) -> impl Iterator<Item = (&str, &str)> {
        self.classes.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Rewrite every class reference inside a field/method descriptor.
    ///
    /// Leaves anything that is not a well-formed `L<name>;` token untouched.
    #[must_use]
    pub fn map_descriptor(&self, descriptor: &str) -> String {
        map_descriptor_with(descriptor, |name| self.map_class(name).to_string())
    }

    /// Swap source and target spaces, re-keying members into the target
    /// space so the result is usable as a standalone mapping.
    #[must_use]
    pub fn invert(&self) -> Self {
        let mut out = Self::new(self.to_space.clone(), self.from_space.clone());
        for (from, to) in &self.classes {
            out.classes.insert(to.clone(), from.clone());
        }
        for (key, to) in &self.fields {
            let inverted = MemberKey::new(
                self.map_class(&key.owner),
                to.clone(),
                self.map_descriptor(&key.descriptor),
            );
            out.fields.insert(inverted, key.name.clone());
        }
        for (key, to) in &self.methods {
            let inverted = MemberKey::new(
                self.map_class(&key.owner),
                to.clone(),
                self.map_descriptor(&key.descriptor),
            );
            out.methods.insert(inverted, key.name.clone());
        }
        out
    }

    /// Translate a source-space member key into this mapping's target space.
    fn key_through(&self, key: &MemberKey, renamed: &str) -> MemberKey {
        MemberKey::new(
            self.map_class(&key.owner),
            renamed.to_string(),
            self.map_descriptor(&key.descriptor),
        )
    }
}

/// Join `a` (X -> Y) and `b` (Y -> Z) into X -> Z on the shared space Y.
pub fn compose(
    a: &MappingSet,
    b: &MappingSet,
    policy: ComposePolicy,
) -> Result<MappingSet, ComposeError> {
    if a.to_space != b.from_space {
        return Err(ComposeError::SpaceMismatch {
            left_to: a.to_space.clone(),
            right_from: b.from_space.clone(),
        });
    }
    let mut out = MappingSet::new(a.from_space.clone(), b.to_space.clone());

    for (from, mid) in &a.classes {
        match b.classes.get(mid) {
            Some(to) => out.classes.insert(from.clone(), to.clone()),
            None => {
                if policy == ComposePolicy::Strict {
                    return Err(ComposeError::UnknownSymbol {
                        side: "right",
                        symbol: mid.clone(),
                    });
                }
                out.classes.insert(from.clone(), mid.clone())
            }
        };
    }
    // Classes b knows that a never produces: identity on a's side.
    let a_inverse = a.invert();
    for (mid, to) in &b.classes {
        if a_inverse.has_class(mid) {
            continue;
        }
        if policy == ComposePolicy::Strict {
            return Err(ComposeError::UnknownSymbol {
                side: "left",
                symbol: mid.clone(),
            });
        }
        out.classes.entry(mid.clone()).or_insert_with(|| to.clone());
    }

    for (key, mid_name) in &a.fields {
        let mid_key = a.key_through(key, mid_name);
        match b.fields.get(&mid_key) {
            Some(to) => out.fields.insert(key.clone(), to.clone()),
            None => {
                if policy == ComposePolicy::Strict {
                    return Err(ComposeError::UnknownSymbol {
                        side: "right",
                        symbol: format!("{}.{}", mid_key.owner, mid_key.name),
                    });
                }
                out.fields.insert(key.clone(), mid_name.clone())
            }
        };
    }
    for (mid_key, to) in &b.fields {
        let back = a_inverse.key_through(mid_key, &mid_key.name);
        let back = MemberKey::new(
            back.owner,
            a_inverse
                .fields
                .get(mid_key)
                .cloned()
                .unwrap_or_else(|| mid_key.name.clone()),
            back.descriptor,
        );
        if a.fields.contains_key(&back) {
            continue;
        }
        if policy == ComposePolicy::Strict {
            return Err(ComposeError::UnknownSymbol {
                side: "left",
                symbol: format!("{}.{}", mid_key.owner, mid_key.name),
            });
        }
        out.fields.entry(back).or_insert_with(|| to.clone());
    }

    for (key, mid_name) in &a.methods {
        let mid_key = a.key_through(key, mid_name);
        match b.methods.get(&mid_key) {
            Some(to) => out.methods.insert(key.clone(), to.clone()),
            None => {
                if policy == ComposePolicy::Strict {
                    return Err(ComposeError::UnknownSymbol {
                        side: "right",
                        symbol: format!("{}.{}{}", mid_key.owner, mid_key.name, mid_key.descriptor),
                    });
                }
                out.methods.insert(key.clone(), mid_name.clone())
            }
        };
    }
    for (mid_key, to) in &b.methods {
        let back_owner = a_inverse.map_class(&mid_key.owner).to_string();
        let back_desc = a_inverse.map_descriptor(&mid_key.descriptor);
        let back_name = a_inverse
            .methods
            .get(mid_key)
            .cloned()
            .unwrap_or_else(|| mid_key.name.clone());
        let back = MemberKey::new(back_owner, back_name, back_desc);
        if a.methods.contains_key(&back) {
            continue;
        }
        if policy == ComposePolicy::Strict {
            return Err(ComposeError::UnknownSymbol {
                side: "left",
                symbol: format!("{}.{}{}", mid_key.owner, mid_key.name, mid_key.descriptor),
            });
        }
        out.methods.entry(back).or_insert_with(|| to.clone());
    }

    Ok(out)
}

/// Rewrite `L<class>;` tokens in a descriptor using `map`.
pub(crate) fn map_descriptor_with(descriptor: &str, map: impl Fn(&str) -> String) -> String {
    let mut out = String::with_capacity(descriptor.len());
    let mut rest = descriptor;
    while let Some(start) = rest.find('L') {
        match rest[start + 1..].find(';') {
            Some(end) => {
                out.push_str(&rest[..start]);
                out.push('L');
                out.push_str(&map(&rest[start + 1..start + 1 + end]));
                out.push(';');
                rest = &rest[start + 2 + end..];
            }
            None => break,
        }
    }
    out.push_str(rest);
    out
}
