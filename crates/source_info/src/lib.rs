//! Source Info Store - parsed class and method metadata for test generation
//!
//! The upstream parser persists one directory per fully-qualified class name
//! (`com/example/Foo/`) containing a `class.json` record plus one JSON file
//! per method, named by the opaque id in `ClassInfo::method_signatures`.
//! This crate provides the record types and a store abstraction over that
//! layout; a missing record is "no info", never an error.

pub mod models;
pub mod store;

pub use models::{ClassInfo, MethodInfo};
pub use store::{FsInfoStore, InfoStore, StoreError};

use std::path::PathBuf;

/// Explicit key for a class under test, wrapping its fully-qualified name.
///
/// All store lookups go through this type so that logical identity stays
/// decoupled from the physical directory layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ClassId(String);

impl ClassId {
    pub fn new(full_class_name: impl Into<String>) -> Self {
        Self(full_class_name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Simple class name, the last dotted component.
    pub fn simple_name(&self) -> &str {
        self.0.rsplit('.').next().unwrap_or(&self.0)
    }

    /// Package portion, empty for a class in the default package.
    pub fn package(&self) -> &str {
        match self.0.rfind('.') {
            Some(idx) => &self.0[..idx],
            None => "",
        }
    }

    /// Directory path for this class inside a store root, one component
    /// per dotted segment.
    pub fn dir_path(&self) -> PathBuf {
        self.0.split('.').collect()
    }
}

impl std::fmt::Display for ClassId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}
