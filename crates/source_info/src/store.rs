use log::{debug, warn};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::models::{ClassInfo, MethodInfo};
use crate::ClassId;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("malformed record {path}: {source}")]
    Malformed {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

pub type Result<T> = std::result::Result<T, StoreError>;

/// Read access to pre-parsed class and method metadata.
///
/// Absent records are `Ok(None)`: a class or method the parser never saw
/// is skipped by callers, not treated as a failure.
pub trait InfoStore: Send + Sync {
    fn class_info(&self, id: &ClassId) -> Result<Option<ClassInfo>>;

    /// Look up one method record of `class_info` by its signature.
    fn method_info(&self, class_info: &ClassInfo, signature: &str) -> Result<Option<MethodInfo>>;
}

/// Filesystem store over the parser's JSON output directory.
#[derive(Debug, Clone)]
pub struct FsInfoStore {
    root: PathBuf,
}

impl FsInfoStore {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn read_record<T: serde::de::DeserializeOwned>(&self, path: &Path) -> Result<Option<T>> {
        if !path.exists() {
            debug!("No record at {:?}", path);
            return Ok(None);
        }
        let content = fs::read_to_string(path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let record = serde_json::from_str(&content).map_err(|source| StoreError::Malformed {
            path: path.to_path_buf(),
            source,
        })?;
        Ok(Some(record))
    }
}

impl InfoStore for FsInfoStore {
    fn class_info(&self, id: &ClassId) -> Result<Option<ClassInfo>> {
        let path = self.root.join(id.dir_path()).join("class.json");
        let record = self.read_record::<ClassInfo>(&path)?;
        if record.is_none() {
            warn!("No parsed info found for class {}", id);
        }
        Ok(record)
    }

    fn method_info(&self, class_info: &ClassInfo, signature: &str) -> Result<Option<MethodInfo>> {
        let Some(file_stem) = class_info.method_signatures.get(signature) else {
            debug!(
                "Signature < {} > not indexed for class {}",
                signature, class_info.class_name
            );
            return Ok(None);
        };
        let path = self
            .root
            .join(class_info.package_path())
            .join(&class_info.class_name)
            .join(format!("{}.json", file_stem));
        self.read_record::<MethodInfo>(&path)
    }
}
