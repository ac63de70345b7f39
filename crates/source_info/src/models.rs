use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Parsed metadata for one class under test.
///
/// Loaded once per class and shared read-only across every concurrent
/// generation job for that class.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClassInfo {
    pub class_name: String,
    /// Full package declaration line, e.g. `package com.example;`.
    pub package_declaration: String,
    pub class_signature: String,
    pub imports: Vec<String>,
    pub fields: Vec<String>,
    pub constructors: Vec<String>,
    pub getter_setters: Vec<String>,
    /// One-line summaries of every method, cheap context for prompts.
    pub brief_methods: Vec<String>,
    pub has_constructor: bool,
    /// Method signature -> opaque id used as the per-method file stem.
    pub method_signatures: BTreeMap<String, String>,
    /// Dependency class name -> method signatures its constructors rely on.
    pub constructor_deps: BTreeMap<String, BTreeSet<String>>,
}

impl Default for ClassInfo {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            package_declaration: String::new(),
            class_signature: String::new(),
            imports: Vec::new(),
            fields: Vec::new(),
            constructors: Vec::new(),
            getter_setters: Vec::new(),
            brief_methods: Vec::new(),
            has_constructor: false,
            method_signatures: BTreeMap::new(),
            constructor_deps: BTreeMap::new(),
        }
    }
}

impl ClassInfo {
    /// Package name with the `package` keyword and terminator stripped.
    pub fn package_name(&self) -> String {
        self.package_declaration
            .replace("package ", "")
            .replace(';', "")
            .trim()
            .to_string()
    }

    /// Relative directory for this package, one component per segment.
    pub fn package_path(&self) -> std::path::PathBuf {
        let pkg = self.package_name();
        if pkg.is_empty() {
            return std::path::PathBuf::new();
        }
        pkg.split('.').collect()
    }
}

/// Parsed metadata for one method of a class under test.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MethodInfo {
    pub class_name: String,
    pub method_name: String,
    pub method_signature: String,
    pub source_code: String,
    /// One-line summary used as cheap prompt context.
    pub brief: String,
    /// Whether the method reads instance fields.
    pub use_field: bool,
    /// Dependency class name -> method signatures this method calls.
    pub dependent_methods: BTreeMap<String, BTreeSet<String>>,
}

impl Default for MethodInfo {
    fn default() -> Self {
        Self {
            class_name: String::new(),
            method_name: String::new(),
            method_signature: String::new(),
            source_code: String::new(),
            brief: String::new(),
            use_field: false,
            dependent_methods: BTreeMap::new(),
        }
    }
}

impl MethodInfo {
    pub fn has_dependencies(&self) -> bool {
        !self.dependent_methods.is_empty()
    }
}
