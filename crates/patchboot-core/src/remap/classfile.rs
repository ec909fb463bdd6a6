//! Class-file symbol rewriting.
//!
//! Strategy: parse the constant pool and the class-body skeleton (declared
//! fields/methods; attributes stay opaque), then repoint symbol-bearing
//! indices at freshly appended UTF-8 entries instead of editing strings in
//! place. Existing pool entries are never mutated, so a UTF-8 value shared
//! between, say, a class name and a string constant can never be corrupted
//! by a rename. Code bodies reference the pool by index and are copied
//! verbatim.
//!
//! Strict mode rejects references to members of mapped classes that the
//! mapping does not cover; classes outside the mapping (JDK, third-party
//! libraries) pass through in either mode.

use std::collections::HashMap;

use patchboot_domain::{MappingSet, MemberKey};

use crate::errors::PipelineError;

const CLASS_MAGIC: u32 = 0xCAFE_BABE;

#[derive(Debug, Clone)]
enum Const {
    Utf8(String),
    Class { name: u16 },
    StringConst { utf8: u16 },
    Ref { tag: u8, class: u16, nat: u16 },
    NameAndType { name: u16, desc: u16 },
    MethodHandle { kind: u8, reference: u16 },
    MethodType { desc: u16 },
    Dynamic { tag: u8, bootstrap: u16, nat: u16 },
    ModuleLike { tag: u8, name: u16 },
    Small { tag: u8, bytes: [u8; 4] },
    Wide { tag: u8, bytes: [u8; 8] },
    /// Second slot of a Long/Double entry.
    Hole,
}

#[derive(Debug, Clone)]
struct MemberInfo {
    access: u16,
    name: u16,
    desc: u16,
    /// Attribute count and attribute bytes, verbatim.
    attrs: Vec<u8>,
}

#[derive(Debug)]
struct ClassFile {
    minor: u16,
    major: u16,
    constants: Vec<Const>,
    access: u16,
    this_class: u16,
    super_class: u16,
    interfaces: Vec<u16>,
    fields: Vec<MemberInfo>,
    methods: Vec<MemberInfo>,
    /// Class attributes (count included), verbatim.
    tail: Vec<u8>,
}

pub(crate) fn remap_class(
    bytes: &[u8],
    mapping: &MappingSet,
    strict: bool,
) -> Result<Vec<u8>, PipelineError> {
    let mut class = parse(bytes)?;
    let pool = snapshot_utf8(&class);
    let mut editor = PoolEditor::new(&pool);

    // Class constants, including array descriptors such as `[La;`.
    for index in 1..class.constants.len() {
        let Const::Class { name } = class.constants[index] else {
            continue;
        };
        let original = utf8_at(&pool, name)?;
        let mapped = if original.starts_with('[') {
            mapping.map_descriptor(&original)
        } else {
            mapping.map_class(&original).to_string()
        };
        if mapped != original {
            let new_name = editor.intern(mapped);
            let Const::Class { name } = &mut class.constants[index] else {
                unreachable!("checked above");
            };
            *name = new_name;
        }
    }

    // Descriptors hanging off NameAndType and MethodType entries.
    for index in 1..class.constants.len() {
        let desc_index = match class.constants[index] {
            Const::NameAndType { desc, .. } | Const::MethodType { desc } => desc,
            _ => continue,
        };
        let original = utf8_at(&pool, desc_index)?;
        let mapped = mapping.map_descriptor(&original);
        if mapped != original {
            let new_desc = editor.intern(mapped);
            match &mut class.constants[index] {
                Const::NameAndType { desc, .. } | Const::MethodType { desc } => *desc = new_desc,
                _ => unreachable!("checked above"),
            }
        }
    }

    // Member references: resolve owner context through the ref's class
    // entry, then repoint the ref at a fresh NameAndType when the member is
    // renamed. The original NameAndType may be shared with other owners, so
    // it is never edited for a name change.
    let mut ref_edits: Vec<(usize, u16)> = Vec::new();
    for index in 1..class.constants.len() {
        let Const::Ref { tag, class: class_index, nat } = class.constants[index] else {
            continue;
        };
        let owner = class_name_at(&pool, &class, class_index)?;
        if owner.starts_with('[') {
            // Array pseudo-members (clone and friends) are never mapped.
            continue;
        }
        let (name_index, desc_index) = nat_at(&class, nat)?;
        let name = utf8_at(&pool, name_index)?;
        let desc = utf8_at(&pool, desc_index)?;
        let key = MemberKey::new(owner.clone(), name.clone(), desc.clone());
        let renamed = if tag == 9 {
            mapping.map_field(&key)
        } else {
            mapping.map_method(&key)
        };
        match renamed {
            Some(new_name) => {
                let name_utf8 = editor.intern(new_name.to_string());
                let desc_utf8 = editor.intern(mapping.map_descriptor(&desc));
                ref_edits.push((index, editor.intern_nat(name_utf8, desc_utf8)));
            }
            None => {
                if strict && mapping.has_class(&owner) && !name.starts_with('<') {
                    return Err(PipelineError::MappingFormat(format!(
                        "strict remap: no mapping for member {owner}.{name}{desc}"
                    )));
                }
            }
        }
    }
    for (index, new_nat) in ref_edits {
        let Const::Ref { nat, .. } = &mut class.constants[index] else {
            unreachable!("collected from Ref entries");
        };
        *nat = new_nat;
    }

    // Declared members of this class.
    let owner = class_name_at(&pool, &class, class.this_class)?;
    let mut member_edits: Vec<(bool, usize, Option<u16>, Option<u16>)> = Vec::new();
    for (is_field, members) in [(true, &class.fields), (false, &class.methods)] {
        for (position, member) in members.iter().enumerate() {
            let name = utf8_at(&pool, member.name)?;
            let desc = utf8_at(&pool, member.desc)?;
            let key = MemberKey::new(owner.clone(), name.clone(), desc.clone());
            let renamed = if is_field {
                mapping.map_field(&key)
            } else {
                mapping.map_method(&key)
            };
            if renamed.is_none()
                && strict
                && mapping.has_class(&owner)
                && !name.starts_with('<')
            {
                return Err(PipelineError::MappingFormat(format!(
                    "strict remap: no mapping for declared member {owner}.{name}{desc}"
                )));
            }
            let new_name = renamed.map(|value| editor.intern(value.to_string()));
            let mapped_desc = mapping.map_descriptor(&desc);
            let new_desc = (mapped_desc != desc).then(|| editor.intern(mapped_desc));
            if new_name.is_some() || new_desc.is_some() {
                member_edits.push((is_field, position, new_name, new_desc));
            }
        }
    }
    for (is_field, position, new_name, new_desc) in member_edits {
        let member = if is_field {
            &mut class.fields[position]
        } else {
            &mut class.methods[position]
        };
        if let Some(name) = new_name {
            member.name = name;
        }
        if let Some(desc) = new_desc {
            member.desc = desc;
        }
    }

    editor.append_to(&mut class.constants)?;
    Ok(serialize(&class))
}

/// Cloned UTF-8 contents, so rewrites can keep reading original strings
/// after indices start moving.
fn snapshot_utf8(class: &ClassFile) -> Vec<Option<String>> {
    class
        .constants
        .iter()
        .map(|entry| match entry {
            Const::Utf8(value) => Some(value.clone()),
            _ => None,
        })
        .collect()
}

fn utf8_at(pool: &[Option<String>], index: u16) -> Result<String, PipelineError> {
    pool.get(index as usize)
        .and_then(Clone::clone)
        .ok_or_else(|| {
            PipelineError::ArtifactFormat(format!("constant {index} is not a UTF-8 entry"))
        })
}

fn class_name_at(
    pool: &[Option<String>],
    class: &ClassFile,
    index: u16,
) -> Result<String, PipelineError> {
    match class.constants.get(index as usize) {
        Some(Const::Class { name }) => utf8_at(pool, *name),
        _ => Err(PipelineError::ArtifactFormat(format!(
            "constant {index} is not a class entry"
        ))),
    }
}

fn nat_at(class: &ClassFile, index: u16) -> Result<(u16, u16), PipelineError> {
    match class.constants.get(index as usize) {
        Some(Const::NameAndType { name, desc }) => Ok((*name, *desc)),
        _ => Err(PipelineError::ArtifactFormat(format!(
            "constant {index} is not a NameAndType entry"
        ))),
    }
}

/// Collects appended UTF-8/NameAndType entries, deduplicating as it goes.
struct PoolEditor {
    base_len: usize,
    existing_utf8: HashMap<String, u16>,
    new_utf8: Vec<String>,
    new_utf8_index: HashMap<String, u16>,
    new_nats: Vec<(u16, u16)>,
    new_nat_index: HashMap<(u16, u16), u16>,
}

impl PoolEditor {
    fn new(pool: &[Option<String>]) -> Self {
        let mut existing_utf8 = HashMap::new();
        for (index, value) in pool.iter().enumerate() {
            if let Some(value) = value {
                existing_utf8
                    .entry(value.clone())
                    .or_insert(index as u16);
            }
        }
        Self {
            base_len: pool.len(),
            existing_utf8,
            new_utf8: Vec::new(),
            new_utf8_index: HashMap::new(),
            new_nats: Vec::new(),
            new_nat_index: HashMap::new(),
        }
    }

    fn intern(&mut self, value: String) -> u16 {
        if let Some(index) = self.existing_utf8.get(&value) {
            return *index;
        }
        if let Some(index) = self.new_utf8_index.get(&value) {
            return *index;
        }
        let index = (self.base_len + self.new_utf8.len()) as u16;
        self.new_utf8.push(value.clone());
        self.new_utf8_index.insert(value, index);
        index
    }

    fn intern_nat(&mut self, name: u16, desc: u16) -> u16 {
        if let Some(index) = self.new_nat_index.get(&(name, desc)) {
            return *index;
        }
        let index = (self.base_len + self.new_utf8.len() + self.new_nats.len()) as u16;
        self.new_nats.push((name, desc));
        self.new_nat_index.insert((name, desc), index);
        index
    }

    fn append_to(self, constants: &mut Vec<Const>) -> Result<(), PipelineError> {
        let total = self.base_len + self.new_utf8.len() + self.new_nats.len();
        if total > usize::from(u16::MAX) {
            return Err(PipelineError::ArtifactFormat(
                "constant pool overflow while remapping".to_string(),
            ));
        }
        // NameAndType entries may point at appended UTF-8s, so UTF-8s go
        // first; intern_nat accounted for that ordering when handing out
        // indices.
        constants.extend(self.new_utf8.into_iter().map(Const::Utf8));
        constants.extend(
            self.new_nats
                .into_iter()
                .map(|(name, desc)| Const::NameAndType { name, desc }),
        );
        Ok(())
    }
}

struct Reader<'a> {
    bytes: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, pos: 0 }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], PipelineError> {
        if self.pos + len > self.bytes.len() {
            return Err(PipelineError::ArtifactFormat(format!(
                "class file truncated at offset {}",
                self.pos
            )));
        }
        let slice = &self.bytes[self.pos..self.pos + len];
        self.pos += len;
        Ok(slice)
    }

    fn u8(&mut self) -> Result<u8, PipelineError> {
        Ok(self.take(1)?[0])
    }

    fn u16(&mut self) -> Result<u16, PipelineError> {
        let bytes = self.take(2)?;
        Ok(u16::from_be_bytes([bytes[0], bytes[1]]))
    }

    fn u32(&mut self) -> Result<u32, PipelineError> {
        let bytes = self.take(4)?;
        Ok(u32::from_be_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

fn parse(bytes: &[u8]) -> Result<ClassFile, PipelineError> {
    let mut reader = Reader::new(bytes);
    if reader.u32()? != CLASS_MAGIC {
        return Err(PipelineError::ArtifactFormat(
            "not a class file (bad magic)".to_string(),
        ));
    }
    let minor = reader.u16()?;
    let major = reader.u16()?;

    let count = reader.u16()? as usize;
    let mut constants = vec![Const::Hole];
    while constants.len() < count {
        let tag = reader.u8()?;
        let entry = match tag {
            1 => {
                let len = reader.u16()? as usize;
                let raw = reader.take(len)?;
                // Class files use modified UTF-8; symbol names are plain
                // ASCII in practice, and non-symbol strings round-trip as
                // long as the bytes survive. Lossy decode would not.
                let value = String::from_utf8(raw.to_vec()).map_err(|_| {
                    PipelineError::ArtifactFormat(
                        "constant pool UTF-8 entry is not valid UTF-8".to_string(),
                    )
                })?;
                Const::Utf8(value)
            }
            3 | 4 => {
                let raw = reader.take(4)?;
                Const::Small {
                    tag,
                    bytes: raw.try_into().expect("4 bytes"),
                }
            }
            5 | 6 => {
                let raw = reader.take(8)?;
                constants.push(Const::Wide {
                    tag,
                    bytes: raw.try_into().expect("8 bytes"),
                });
                Const::Hole
            }
            7 => Const::Class { name: reader.u16()? },
            8 => Const::StringConst { utf8: reader.u16()? },
            9 | 10 | 11 => Const::Ref {
                tag,
                class: reader.u16()?,
                nat: reader.u16()?,
            },
            12 => Const::NameAndType {
                name: reader.u16()?,
                desc: reader.u16()?,
            },
            15 => Const::MethodHandle {
                kind: reader.u8()?,
                reference: reader.u16()?,
            },
            16 => Const::MethodType { desc: reader.u16()? },
            17 | 18 => Const::Dynamic {
                tag,
                bootstrap: reader.u16()?,
                nat: reader.u16()?,
            },
            19 | 20 => Const::ModuleLike {
                tag,
                name: reader.u16()?,
            },
            other => {
                return Err(PipelineError::ArtifactFormat(format!(
                    "unknown constant pool tag {other}"
                )));
            }
        };
        constants.push(entry);
    }
    if constants.len() != count {
        return Err(PipelineError::ArtifactFormat(
            "constant pool count disagrees with entries".to_string(),
        ));
    }

    let access = reader.u16()?;
    let this_class = reader.u16()?;
    let super_class = reader.u16()?;
    let interface_count = reader.u16()? as usize;
    let mut interfaces = Vec::with_capacity(interface_count);
    for _ in 0..interface_count {
        interfaces.push(reader.u16()?);
    }

    let fields = parse_members(&mut reader)?;
    let methods = parse_members(&mut reader)?;
    let tail = reader.bytes[reader.pos..].to_vec();

    Ok(ClassFile {
        minor,
        major,
        constants,
        access,
        this_class,
        super_class,
        interfaces,
        fields,
        methods,
        tail,
    })
}

fn parse_members(reader: &mut Reader<'_>) -> Result<Vec<MemberInfo>, PipelineError> {
    let count = reader.u16()? as usize;
    let mut members = Vec::with_capacity(count);
    for _ in 0..count {
        let access = reader.u16()?;
        let name = reader.u16()?;
        let desc = reader.u16()?;
        let attrs_start = reader.pos;
        let attr_count = reader.u16()? as usize;
        for _ in 0..attr_count {
            let _name = reader.u16()?;
            let len = reader.u32()? as usize;
            reader.take(len)?;
        }
        let attrs = reader.bytes[attrs_start..reader.pos].to_vec();
        members.push(MemberInfo {
            access,
            name,
            desc,
            attrs,
        });
    }
    Ok(members)
}

fn serialize(class: &ClassFile) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&CLASS_MAGIC.to_be_bytes());
    out.extend_from_slice(&class.minor.to_be_bytes());
    out.extend_from_slice(&class.major.to_be_bytes());
    out.extend_from_slice(&(class.constants.len() as u16).to_be_bytes());
    let mut slots = class.constants.iter().enumerate();
    // Slot 0 is the implicit hole before constant 1.
    slots.next();
    for (_, entry) in slots {
        match entry {
            Const::Utf8(value) => {
                out.push(1);
                out.extend_from_slice(&(value.len() as u16).to_be_bytes());
                out.extend_from_slice(value.as_bytes());
            }
            Const::Small { tag, bytes } => {
                out.push(*tag);
                out.extend_from_slice(bytes);
            }
            Const::Wide { tag, bytes } => {
                out.push(*tag);
                out.extend_from_slice(bytes);
            }
            Const::Class { name } => {
                out.push(7);
                out.extend_from_slice(&name.to_be_bytes());
            }
            Const::StringConst { utf8 } => {
                out.push(8);
                out.extend_from_slice(&utf8.to_be_bytes());
            }
            Const::Ref { tag, class, nat } => {
                out.push(*tag);
                out.extend_from_slice(&class.to_be_bytes());
                out.extend_from_slice(&nat.to_be_bytes());
            }
            Const::NameAndType { name, desc } => {
                out.push(12);
                out.extend_from_slice(&name.to_be_bytes());
                out.extend_from_slice(&desc.to_be_bytes());
            }
            Const::MethodHandle { kind, reference } => {
                out.push(15);
                out.push(*kind);
                out.extend_from_slice(&reference.to_be_bytes());
            }
            Const::MethodType { desc } => {
                out.push(16);
                out.extend_from_slice(&desc.to_be_bytes());
            }
            Const::Dynamic { tag, bootstrap, nat } => {
                out.push(*tag);
                out.extend_from_slice(&bootstrap.to_be_bytes());
                out.extend_from_slice(&nat.to_be_bytes());
            }
            Const::ModuleLike { tag, name } => {
                out.push(*tag);
                out.extend_from_slice(&name.to_be_bytes());
            }
            Const::Hole => {}
        }
    }

    out.extend_from_slice(&class.access.to_be_bytes());
    out.extend_from_slice(&class.this_class.to_be_bytes());
    out.extend_from_slice(&class.super_class.to_be_bytes());
    out.extend_from_slice(&(class.interfaces.len() as u16).to_be_bytes());
    for interface in &class.interfaces {
        out.extend_from_slice(&interface.to_be_bytes());
    }
    for members in [&class.fields, &class.methods] {
        out.extend_from_slice(&(members.len() as u16).to_be_bytes());
        for member in members.iter() {
            out.extend_from_slice(&member.access.to_be_bytes());
            out.extend_from_slice(&member.name.to_be_bytes());
            out.extend_from_slice(&member.desc.to_be_bytes());
            out.extend_from_slice(&member.attrs);
        }
    }
    out.extend_from_slice(&class.tail);
    out
}

/// The internal name of the class a class file declares.
#[allow(dead_code)]
pub(crate) fn declared_class_name(bytes: &[u8]) -> Result<String, PipelineError> {
    let class = parse(bytes)?;
    let pool = snapshot_utf8(&class);
    class_name_at(&pool, &class, class.this_class)
}


#[cfg(test)]
mod tests {
    use super::test_support::{sample_obfuscated_class, ClassBuilder};
    use super::*;
    use patchboot_domain::MappingSet;

    fn obf_to_named() -> MappingSet {
        let mut mapping = MappingSet::new("obf", "named");
        mapping.add_class("a", "com/example/Foo");
        mapping.add_field(MemberKey::new("a", "c", "I"), "count");
        mapping.add_method(MemberKey::new("a", "d", "(La;)La;"), "combine");
        mapping
    }

    fn names_of(bytes: &[u8]) -> (String, Vec<(String, String)>, Vec<(String, String)>) {
        let class = parse(bytes).expect("parse remapped class");
        let pool = snapshot_utf8(&class);
        let this = class_name_at(&pool, &class, class.this_class).expect("this class");
        let members = |list: &[MemberInfo]| {
            list.iter()
                .map(|member| {
                    (
                        utf8_at(&pool, member.name).expect("member name"),
                        utf8_at(&pool, member.desc).expect("member desc"),
                    )
                })
                .collect::<Vec<_>>()
        };
        (this, members(&class.fields), members(&class.methods))
    }

    #[test]
    fn remaps_class_members_and_descriptors() {
        let bytes = sample_obfuscated_class();
        let remapped = remap_class(&bytes, &obf_to_named(), false).expect("remap");
        let (this, fields, methods) = names_of(&remapped);
        assert_eq!(this, "com/example/Foo");
        assert_eq!(fields, vec![("count".to_string(), "I".to_string())]);
        assert_eq!(
            methods,
            vec![(
                "combine".to_string(),
                "(Lcom/example/Foo;)Lcom/example/Foo;".to_string()
            )]
        );
    }

    #[test]
    fn member_refs_follow_their_owner() {
        let bytes = sample_obfuscated_class();
        let remapped = remap_class(&bytes, &obf_to_named(), false).expect("remap");
        let class = parse(&remapped).expect("parse");
        let pool = snapshot_utf8(&class);
        let (ref_class, ref_nat) = class
            .constants
            .iter()
            .find_map(|entry| match entry {
                Const::Ref { tag: 9, class, nat } => Some((*class, *nat)),
                _ => None,
            })
            .expect("field ref present");
        assert_eq!(
            class_name_at(&pool, &class, ref_class).unwrap(),
            "com/example/Foo"
        );
        let (name, desc) = nat_at(&class, ref_nat).unwrap();
        assert_eq!(utf8_at(&pool, name).unwrap(), "count");
        assert_eq!(utf8_at(&pool, desc).unwrap(), "I");
    }

    #[test]
    fn string_constants_sharing_a_class_name_survive() {
        let bytes = sample_obfuscated_class();
        let remapped = remap_class(&bytes, &obf_to_named(), false).expect("remap");
        let class = parse(&remapped).expect("parse");
        let pool = snapshot_utf8(&class);
        let string_value = class
            .constants
            .iter()
            .find_map(|entry| match entry {
                Const::StringConst { utf8 } => Some(utf8_at(&pool, *utf8).unwrap()),
                _ => None,
            })
            .expect("string constant present");
        // The literal "a" is a string the program may print; the rename must
        // not leak into it.
        assert_eq!(string_value, "a");
    }

    #[test]
    fn remap_is_deterministic() {
        let bytes = sample_obfuscated_class();
        let mapping = obf_to_named();
        let first = remap_class(&bytes, &mapping, false).expect("first");
        let second = remap_class(&bytes, &mapping, false).expect("second");
        assert_eq!(first, second);
    }

    #[test]
    fn unmapped_classes_pass_through_untouched() {
        let mut builder = ClassBuilder::default();
        let name = builder.utf8("org/other/Thing");
        let class = builder.class(name);
        let object_name = builder.utf8("java/lang/Object");
        let object = builder.class(object_name);
        let bytes = builder.finish(class, object, &[], &[]);
        let remapped = remap_class(&bytes, &obf_to_named(), false).expect("remap");
        assert_eq!(remapped, bytes);
    }

    #[test]
    fn strict_mode_rejects_unmapped_members_of_mapped_classes() {
        let mut builder = ClassBuilder::default();
        let name_a = builder.utf8("a");
        let class_a = builder.class(name_a);
        let object_name = builder.utf8("java/lang/Object");
        let object = builder.class(object_name);
        let stray_name = builder.utf8("mystery");
        let stray_desc = builder.utf8("()V");
        let bytes = builder.finish(class_a, object, &[], &[(stray_name, stray_desc)]);

        let err = remap_class(&bytes, &obf_to_named(), true).expect_err("strict failure");
        assert_eq!(err.exit_code(), 12);
        // The same class is fine in pass-through mode.
        remap_class(&bytes, &obf_to_named(), false).expect("lenient remap");
    }

    #[test]
    fn truncated_class_is_artifact_format_error() {
        let bytes = sample_obfuscated_class();
        let err = remap_class(&bytes[..20], &obf_to_named(), false).expect_err("truncated");
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn non_class_bytes_are_artifact_format_error() {
        let err = remap_class(b"PK\x03\x04not a class", &obf_to_named(), false)
            .expect_err("bad magic");
        assert_eq!(err.exit_code(), 13);
    }

    #[test]
    fn array_class_constants_are_remapped_as_descriptors() {
        let mut builder = ClassBuilder::default();
        let array_name = builder.utf8("[La;");
        builder.class(array_name);
        let this_name = builder.utf8("b");
        let this = builder.class(this_name);
        let object_name = builder.utf8("java/lang/Object");
        let object = builder.class(object_name);
        let bytes = builder.finish(this, object, &[], &[]);

        let remapped = remap_class(&bytes, &obf_to_named(), false).expect("remap");
        let class = parse(&remapped).expect("parse");
        let pool = snapshot_utf8(&class);
        let array = class
            .constants
            .iter()
            .find_map(|entry| match entry {
                Const::Class { name } => {
                    let value = utf8_at(&pool, *name).unwrap();
                    value.starts_with('[').then_some(value)
                }
                _ => None,
            })
            .expect("array class constant");
        assert_eq!(array, "[Lcom/example/Foo;");
    }

    #[test]
    fn declared_class_name_reads_this_class() {
        let bytes = sample_obfuscated_class();
        assert_eq!(declared_class_name(&bytes).unwrap(), "a");
    }
}
