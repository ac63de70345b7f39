//! Merge Engine - unify per-method test artifacts into one class-level unit
//!
//! Parses each validated per-method test class into a minimal generic
//! syntax unit (package, import set, field set, signature-keyed methods),
//! unions the sets, and concatenates the bodies of methods sharing a
//! signature in processing order. Deliberately not a full Java parse tree;
//! the unit covers exactly what the merge needs.

mod parse;
mod signature;

pub use parse::parse_unit;
pub use signature::normalize_signature;

use log::info;
use std::collections::BTreeSet;
use std::fs;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MergeError {
    #[error("no class declaration found in artifact")]
    NoClassDeclaration,
    #[error("failed to read artifact {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

pub type Result<T> = std::result::Result<T, MergeError>;

/// One method (or constructor) of a merged unit, keyed by its normalized
/// signature. Bodies of colliding signatures are appended, never replaced.
#[derive(Debug, Clone)]
pub struct MergedMethod {
    pub signature: String,
    /// Annotation lines plus the declaration line(s) up to the open brace.
    pub header: Vec<String>,
    /// Statement lines, in arrival order across all source units.
    pub body: Vec<String>,
}

/// Minimal structural view of one test class.
#[derive(Debug, Clone, Default)]
pub struct TestUnit {
    /// Full package declaration line; empty for the default package.
    pub package: String,
    pub imports: BTreeSet<String>,
    /// Annotations on the class declaration itself, e.g. a runner.
    pub class_annotations: BTreeSet<String>,
    /// Field declarations (annotation lines included), deduplicated by
    /// whitespace-normalized equality.
    pub fields: Vec<String>,
    /// First-occurrence order is preserved.
    pub methods: Vec<MergedMethod>,
}

impl TestUnit {
    fn push_field(&mut self, decl: String) {
        let normalized = normalize_ws(&decl);
        if !self.fields.iter().any(|f| normalize_ws(f) == normalized) {
            self.fields.push(decl);
        }
    }

    fn push_method(&mut self, method: MergedMethod) {
        if let Some(existing) = self
            .methods
            .iter_mut()
            .find(|m| m.signature == method.signature)
        {
            existing.body.extend(method.body);
        } else {
            self.methods.push(method);
        }
    }
}

fn normalize_ws(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Merge parsed units in processing order.
///
/// Imports and fields are set unions; methods are keyed by signature with
/// bodies concatenated in arrival order; the last unit carrying a package
/// declaration wins (artifacts are expected to share one, not verified).
pub fn merge_units(units: impl IntoIterator<Item = TestUnit>) -> TestUnit {
    let mut merged = TestUnit::default();
    for unit in units {
        if !unit.package.is_empty() {
            merged.package = unit.package;
        }
        merged.imports.extend(unit.imports);
        merged.class_annotations.extend(unit.class_annotations);
        for field in unit.fields {
            merged.push_field(field);
        }
        for method in unit.methods {
            merged.push_method(method);
        }
    }
    merged
}

/// Emit the merged unit as one synthetic test class.
pub fn render_unit(unit: &TestUnit, test_class_name: &str) -> String {
    let mut out = String::new();
    if !unit.package.is_empty() {
        out.push_str(&unit.package);
        out.push('\n');
    }
    if !unit.imports.is_empty() {
        out.push('\n');
        for import in &unit.imports {
            out.push_str(import);
            out.push('\n');
        }
    }
    out.push('\n');
    for annotation in &unit.class_annotations {
        out.push_str(annotation);
        out.push('\n');
    }
    out.push_str(&format!("public class {} {{\n", test_class_name));
    for field in &unit.fields {
        for line in field.split('\n') {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
    }
    for method in &unit.methods {
        out.push('\n');
        for line in &method.header {
            out.push_str("    ");
            out.push_str(line);
            out.push('\n');
        }
        for line in &method.body {
            out.push_str("        ");
            out.push_str(line.trim());
            out.push('\n');
        }
        out.push_str("    }\n");
    }
    out.push_str("}\n");
    out
}

/// Read, parse, and merge a set of artifact files into one class source
/// named by the `<TargetClass>_Test` convention.
pub fn merge_files(paths: &[PathBuf], test_class_name: &str) -> Result<String> {
    let mut units = Vec::with_capacity(paths.len());
    for path in paths {
        let content = fs::read_to_string(path).map_err(|source| MergeError::Io {
            path: path.clone(),
            source,
        })?;
        units.push(parse_unit(&content)?);
    }
    info!(
        "Merging {} artifacts into class < {} >",
        units.len(),
        test_class_name
    );
    let merged = merge_units(units);
    Ok(render_unit(&merged, test_class_name))
}

#[cfg(test)]
mod tests {
    use super::*;

    const UNIT_A: &str = r#"package com.example;

import org.junit.Test;
import java.util.List;

public class Calc_add_0_1_Test {
    private Calc calc = new Calc(1);

    @Test
    public void foo() {
        s1();
    }
}
"#;

    const UNIT_B: &str = r#"package com.example;

import org.junit.Test;
import org.junit.Assert;

public class Calc_add_0_2_Test {
    private Calc calc = new Calc(1);
    private int extra = 0;

    @Test
    public void foo() {
        s2();
    }

    @Test
    public void bar() {
        s3();
    }
}
"#;

    #[test]
    fn colliding_bodies_concatenate_in_processing_order() {
        let merged = merge_units([parse_unit(UNIT_A).unwrap(), parse_unit(UNIT_B).unwrap()]);
        let foo = merged
            .methods
            .iter()
            .find(|m| m.signature == "foo()")
            .unwrap();
        let body: Vec<String> = foo.body.iter().map(|l| l.trim().to_string()).collect();
        assert_eq!(body, vec!["s1();", "s2();"]);

        let reversed = merge_units([parse_unit(UNIT_B).unwrap(), parse_unit(UNIT_A).unwrap()]);
        let foo = reversed
            .methods
            .iter()
            .find(|m| m.signature == "foo()")
            .unwrap();
        let body: Vec<String> = foo.body.iter().map(|l| l.trim().to_string()).collect();
        assert_eq!(body, vec!["s2();", "s1();"]);
    }

    #[test]
    fn imports_and_fields_are_set_unions() {
        let merged = merge_units([parse_unit(UNIT_A).unwrap(), parse_unit(UNIT_B).unwrap()]);
        assert_eq!(merged.imports.len(), 3);
        // The shared field declaration appears once.
        assert_eq!(
            merged
                .fields
                .iter()
                .filter(|f| f.contains("private Calc calc"))
                .count(),
            1
        );
        assert_eq!(merged.fields.len(), 2);

        let reversed = merge_units([parse_unit(UNIT_B).unwrap(), parse_unit(UNIT_A).unwrap()]);
        assert_eq!(reversed.imports, merged.imports);
        assert_eq!(reversed.fields.len(), merged.fields.len());
    }

    #[test]
    fn last_processed_package_wins() {
        let other = UNIT_B.replace("package com.example;", "package com.other;");
        let merged = merge_units([parse_unit(UNIT_A).unwrap(), parse_unit(&other).unwrap()]);
        assert_eq!(merged.package, "package com.other;");
    }

    #[test]
    fn render_emits_one_class_with_convention_name() {
        let merged = merge_units([parse_unit(UNIT_A).unwrap(), parse_unit(UNIT_B).unwrap()]);
        let code = render_unit(&merged, "Calc_Test");
        assert!(code.starts_with("package com.example;"));
        assert_eq!(code.matches("class ").count(), 1);
        assert!(code.contains("public class Calc_Test {"));
        assert!(code.contains("s1();"));
        assert!(code.contains("s2();"));
        assert!(code.contains("s3();"));
        // Renders back into something the parser accepts.
        let reparsed = parse_unit(&code).unwrap();
        assert_eq!(reparsed.methods.len(), 2);
    }

    #[test]
    fn annotations_survive_merge_and_render() {
        let unit_src = r#"package com.example;

import org.junit.runner.RunWith;
import org.mockito.Mock;

@RunWith(MockitoJUnitRunner.class)
public class Calc_add_0_1_Test {
    @Mock
    private Helper helper;

    @Test
    public void foo() {
        s1();
    }
}
"#;
        let merged = merge_units([
            parse_unit(unit_src).unwrap(),
            parse_unit(unit_src).unwrap(),
        ]);
        let code = render_unit(&merged, "Calc_Test");

        // The runner annotation sits on the merged class, once.
        assert_eq!(code.matches("@RunWith(MockitoJUnitRunner.class)").count(), 1);
        let runner_at = code.find("@RunWith").unwrap();
        let class_at = code.find("public class Calc_Test").unwrap();
        assert!(runner_at < class_at);
        // The field keeps its annotation and still deduplicates.
        assert_eq!(code.matches("@Mock").count(), 1);
        let mock_at = code.find("@Mock").unwrap();
        let field_at = code.find("private Helper helper;").unwrap();
        assert!(mock_at < field_at);
        // Still reparses cleanly after the annotation-bearing render.
        let reparsed = parse_unit(&code).unwrap();
        assert_eq!(reparsed.fields.len(), 1);
        assert!(!reparsed.class_annotations.is_empty());
    }

    #[test]
    fn merge_files_reads_artifacts() {
        let tmp = tempfile::TempDir::new().unwrap();
        let a = tmp.path().join("a.java");
        let b = tmp.path().join("b.java");
        std::fs::write(&a, UNIT_A).unwrap();
        std::fs::write(&b, UNIT_B).unwrap();

        let code = merge_files(&[a, b], "Calc_Test").unwrap();
        assert!(code.contains("public class Calc_Test {"));

        let missing = tmp.path().join("absent.java");
        assert!(matches!(
            merge_files(&[missing], "Calc_Test"),
            Err(MergeError::Io { .. })
        ));
    }
}
