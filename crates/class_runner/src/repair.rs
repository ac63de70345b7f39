//! Deterministic post-extraction repair passes.
//!
//! Applied in a fixed order before validation: rename the generated class
//! to the canonical test name, force the target package, inject a timeout
//! into bare `@Test` annotations, and reconcile imports with the target
//! class's known imports.

use log::debug;
use regex::Regex;
use std::sync::OnceLock;

fn class_decl_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\bclass\s+([A-Za-z_$][\w$]*)").expect("static regex"))
}

fn bare_test_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^(\s*)@Test(\(\s*\))?\s*$").expect("static regex"))
}

/// Rename the generated test type (and its constructors/references) to the
/// canonical `<Class>_..._Test` name.
pub fn rename_test_class(code: &str, test_name: &str) -> String {
    let Some(captures) = class_decl_re().captures(code) else {
        return code.to_string();
    };
    let old_name = captures.get(1).expect("capture group").as_str().to_string();
    if old_name == test_name {
        return code.to_string();
    }
    debug!("Renaming test class {} -> {}", old_name, test_name);
    let word = Regex::new(&format!(r"\b{}\b", regex::escape(&old_name))).expect("escaped name");
    word.replace_all(code, test_name).into_owned()
}

/// Force the package declaration to match the target class's package.
pub fn repair_package(code: &str, package_declaration: &str) -> String {
    let body: Vec<&str> = code
        .lines()
        .filter(|line| !line.trim_start().starts_with("package "))
        .collect();
    if package_declaration.trim().is_empty() {
        return body.join("\n");
    }
    format!("{}\n{}", package_declaration.trim(), body.join("\n"))
}

/// Give every bare `@Test` annotation an execution timeout.
pub fn add_timeout(code: &str, timeout_millis: u64) -> String {
    bare_test_re()
        .replace_all(code, format!("${{1}}@Test(timeout = {})", timeout_millis))
        .into_owned()
}

/// Add any known import of the target class that the candidate lacks.
/// Runs after the raw candidate is recorded for diagnostics.
pub fn repair_imports(code: &str, known_imports: &[String]) -> String {
    let missing: Vec<&String> = known_imports
        .iter()
        .filter(|import| !code.contains(import.as_str()))
        .collect();
    if missing.is_empty() {
        return code.to_string();
    }

    let mut lines: Vec<String> = code.lines().map(|l| l.to_string()).collect();
    let insert_at = lines
        .iter()
        .position(|line| line.trim_start().starts_with("package "))
        .map(|idx| idx + 1)
        .unwrap_or(0);
    for (offset, import) in missing.iter().enumerate() {
        lines.insert(insert_at + offset, (*import).clone());
    }
    lines.join("\n")
}
