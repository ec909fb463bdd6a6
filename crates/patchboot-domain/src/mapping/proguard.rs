//! Line-oriented proguard mapping format.
//!
//! ```text
//! com.example.Foo -> a:
//!     int count -> c
//!     12:13:com.example.Foo combine(com.example.Foo) -> d
//! ```
//!
//! The file carries no naming-space labels, so the caller supplies them.
//! Java type names are normalized to internal names and JVM descriptors so
//! the result is interchangeable with the tiny parser's output.

use super::{MappingFormatError, MappingSet, MemberKey};

pub fn parse_proguard(
    text: &str,
    from_space: &str,
    to_space: &str,
) -> Result<MappingSet, MappingFormatError> {
    let mut set = MappingSet::new(from_space, to_space);
    let mut current_owner: Option<String> = None;

    for (index, raw) in text.lines().enumerate() {
        let line_no = index + 1;
        let line = raw.trim_end();
        if line.is_empty() || line.trim_start().starts_with('#') {
            continue;
        }

        if !line.starts_with(' ') && !line.starts_with('\t') {
            // Class line: `com.example.Foo -> a:`
            let line = line.strip_suffix(':').ok_or_else(|| {
                MappingFormatError::new(line_no, "class line missing trailing colon")
            })?;
            let (from, to) = split_arrow(line, line_no)?;
            let from = internal_name(from);
            let to = internal_name(to);
            set.add_class(from.clone(), to);
            current_owner = Some(from);
            continue;
        }

        let owner = current_owner.clone().ok_or_else(|| {
            MappingFormatError::new(line_no, "member line before any class line")
        })?;
        let member = line.trim_start();
        // Method lines may be prefixed with `startLine:endLine:`.
        let member = strip_line_numbers(member);
        let (decl, to) = split_arrow(member, line_no)?;

        let (return_type, rest) = decl.split_once(' ').ok_or_else(|| {
            MappingFormatError::new(line_no, "member line missing type")
        })?;
        let rest = rest.trim();
        if let Some(open) = rest.find('(') {
            let close = rest.rfind(')').ok_or_else(|| {
                MappingFormatError::new(line_no, "method line missing closing paren")
            })?;
            let name = &rest[..open];
            let params = &rest[open + 1..close];
            let descriptor = method_descriptor(params, return_type, line_no)?;
            set.add_method(MemberKey::new(owner, name, descriptor), to);
        } else {
            let descriptor = type_descriptor(return_type, line_no)?;
            set.add_field(MemberKey::new(owner, rest, descriptor), to);
        }
    }
    Ok(set)
}

fn split_arrow(line: &str, line_no: usize) -> Result<(&str, &str), MappingFormatError> {
    let (left, right) = line
        .split_once(" -> ")
        .ok_or_else(|| MappingFormatError::new(line_no, "missing ` -> ` separator"))?;
    let left = left.trim();
    let right = right.trim();
    if left.is_empty() || right.is_empty() {
        return Err(MappingFormatError::new(line_no, "empty symbol name"));
    }
    Ok((left, right))
}

fn strip_line_numbers(member: &str) -> &str {
    let mut rest = member;
    for _ in 0..2 {
        match rest.split_once(':') {
            Some((prefix, tail)) if prefix.chars().all(|c| c.is_ascii_digit()) => rest = tail,
            _ => break,
        }
    }
    rest
}

fn internal_name(dotted: &str) -> String {
    dotted.replace('.', "/")
}

fn method_descriptor(
    params: &str,
    return_type: &str,
    line_no: usize,
) -> Result<String, MappingFormatError> {
    let mut descriptor = String::from("(");
    if !params.trim().is_empty() {
        for param in params.split(',') {
            descriptor.push_str(&type_descriptor(param.trim(), line_no)?);
        }
    }
    descriptor.push(')');
    descriptor.push_str(&type_descriptor(return_type, line_no)?);
    Ok(descriptor)
}

fn type_descriptor(java_type: &str, line_no: usize) -> Result<String, MappingFormatError> {
    let mut base = java_type;
    let mut dims = 0;
    while let Some(stripped) = base.strip_suffix("[]") {
        base = stripped;
        dims += 1;
    }
    if base.is_empty() {
        return Err(MappingFormatError::new(line_no, "empty type name"));
    }
    let element = match base {
        "void" => "V".to_string(),
        "boolean" => "Z".to_string(),
        "byte" => "B".to_string(),
        "char" => "C".to_string(),
        "short" => "S".to_string(),
        "int" => "I".to_string(),
        "long" => "J".to_string(),
        "float" => "F".to_string(),
        "double" => "D".to_string(),
        other => format!("L{};", internal_name(other)),
    };
    Ok(format!("{}{element}", "[".repeat(dims)))
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
com.example.Foo -> a:
    int count -> c
    12:13:com.example.Foo combine(com.example.Foo) -> d
    void reset() -> e
    java.lang.String[] names -> f
com.example.Bar -> b:
";

    #[test]
    fn parses_classes_fields_and_methods() {
        let set = parse_proguard(SAMPLE, "named", "obf").expect("parse proguard");
        assert_eq!(set.map_class("com/example/Foo"), "a");
        assert_eq!(set.map_class("com/example/Bar"), "b");
        assert_eq!(
            set.map_field(&MemberKey::new("com/example/Foo", "count", "I")),
            Some("c")
        );
        assert_eq!(
            set.map_method(&MemberKey::new(
                "com/example/Foo",
                "combine",
                "(Lcom/example/Foo;)Lcom/example/Foo;"
            )),
            Some("d")
        );
        assert_eq!(
            set.map_method(&MemberKey::new("com/example/Foo", "reset", "()V")),
            Some("e")
        );
        assert_eq!(
            set.map_field(&MemberKey::new(
                "com/example/Foo",
                "names",
                "[Ljava/lang/String;"
            )),
            Some("f")
        );
    }

    #[test]
    fn inverse_agrees_with_tiny_direction() {
        // proguard files run named -> obf; inverting yields the obf -> named
        // table the pipeline composes with.
        let set = parse_proguard(SAMPLE, "named", "obf").expect("parse");
        let inverted = set.invert();
        assert_eq!(inverted.from_space, "obf");
        assert_eq!(inverted.map_class("a"), "com/example/Foo");
        assert_eq!(
            inverted.map_field(&MemberKey::new("a", "c", "I")),
            Some("count")
        );
    }

    #[test]
    fn rejects_member_before_class() {
        let err = parse_proguard("    int count -> c\n", "named", "obf")
            .expect_err("orphan member");
        assert_eq!(err.line, 1);
    }

    #[test]
    fn rejects_missing_arrow() {
        assert!(parse_proguard("com.example.Foo a:\n", "named", "obf").is_err());
    }

    #[test]
    fn rejects_missing_colon_on_class_line() {
        assert!(parse_proguard("com.example.Foo -> a\n", "named", "obf").is_err());
    }
}
