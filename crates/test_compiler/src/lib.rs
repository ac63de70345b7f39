//! Persistence & Validation Gateway
//!
//! The one place that writes candidate test files and the one caller of the
//! build tool. A candidate is written, validated out of process, and kept
//! only when the build reports success; on failure the candidate is deleted
//! and the diagnostics are captured for the next repair round.

use log::{debug, error, info, warn};
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::sync::Mutex;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum CompileError {
    #[error("failed to write candidate {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to write error log {path}: {source}")]
    ErrorLog {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("build tool invocation failed: {0}")]
    Invocation(String),
}

pub type Result<T> = std::result::Result<T, CompileError>;

/// Target OS flavor; only affects how the build tool is invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum TargetOs {
    #[default]
    Linux,
    Macos,
    Windows,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompilerConfig {
    #[serde(default)]
    pub target_os: TargetOs,
    /// Serialize build-tool invocations sharing one working directory.
    #[serde(default)]
    pub serialize_build: bool,
    /// Override for the build-tool binary; defaults to the OS mvn flavor.
    #[serde(default)]
    pub build_command: Option<String>,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        Self {
            target_os: TargetOs::default(),
            serialize_build: false,
            build_command: None,
        }
    }
}

/// Outcome of one gateway validation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Validation {
    Passed,
    Failed { diagnostics: Vec<String> },
}

impl Validation {
    pub fn passed(&self) -> bool {
        matches!(self, Validation::Passed)
    }
}

pub struct TestCompiler {
    workdir: PathBuf,
    config: CompilerConfig,
    lock: Mutex<()>,
}

impl TestCompiler {
    pub fn new(workdir: impl AsRef<Path>, config: CompilerConfig) -> Self {
        Self {
            workdir: workdir.as_ref().to_path_buf(),
            config,
            lock: Mutex::new(()),
        }
    }

    /// Write `code` to `save_path` and validate it with the build tool.
    ///
    /// On success the candidate stays on disk. On failure the diagnostics
    /// are written to `error_log_path`, the candidate is deleted, and the
    /// captured diagnostics are returned for the next round's prompt.
    pub fn export_and_validate(
        &self,
        code: &str,
        save_path: &Path,
        error_log_path: &Path,
    ) -> Result<Validation> {
        export_test(code, save_path)?;

        let _guard = if self.config.serialize_build {
            Some(self.lock.lock().expect("build lock poisoned"))
        } else {
            None
        };

        let (passed, output) = self.run_build(save_path)?;
        if passed {
            info!("Build passed for {:?}", save_path);
            return Ok(Validation::Passed);
        }

        let diagnostics = extract_key_errors(&output);
        if let Some(parent) = error_log_path.parent() {
            fs::create_dir_all(parent).map_err(|source| CompileError::ErrorLog {
                path: error_log_path.to_path_buf(),
                source,
            })?;
        }
        fs::write(error_log_path, &output).map_err(|source| CompileError::ErrorLog {
            path: error_log_path.to_path_buf(),
            source,
        })?;
        remove_test_file(save_path);
        warn!(
            "Build failed for {:?}, {} diagnostic lines captured",
            save_path,
            diagnostics.len()
        );
        Ok(Validation::Failed { diagnostics })
    }

    fn run_build(&self, test_file: &Path) -> Result<(bool, String)> {
        let program = self.config.build_command.clone().unwrap_or_else(|| {
            match self.config.target_os {
                TargetOs::Windows => "mvn.cmd".to_string(),
                _ => "mvn".to_string(),
            }
        });
        let test_stem = test_file
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or_default();
        let qualified = format!("{}{}", read_package(test_file), test_stem);

        debug!("Running command: `{} test -Dtest={}`", program, qualified);
        let output = Command::new(&program)
            .arg("test")
            .arg(format!("-Dtest={}", qualified))
            .current_dir(&self.workdir)
            .output()
            .map_err(|e| {
                let msg = format!("failed to execute {}: {}", program, e);
                error!("{}", msg);
                CompileError::Invocation(msg)
            })?;

        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        let stderr = String::from_utf8_lossy(&output.stderr);
        if !stderr.is_empty() {
            if !text.is_empty() {
                text.push('\n');
            }
            text.push_str(&stderr);
        }

        let passed = output.status.success() || text.contains("BUILD SUCCESS");
        Ok((passed, text))
    }
}

/// Write the candidate text, creating parent directories as needed.
pub fn export_test(code: &str, save_path: &Path) -> Result<()> {
    if let Some(parent) = save_path.parent() {
        fs::create_dir_all(parent).map_err(|source| CompileError::Write {
            path: save_path.to_path_buf(),
            source,
        })?;
    }
    fs::write(save_path, code).map_err(|source| CompileError::Write {
        path: save_path.to_path_buf(),
        source,
    })
}

/// Remove a failed candidate; missing files are fine.
pub fn remove_test_file(test_file: &Path) {
    if test_file.exists() {
        if let Err(e) = fs::remove_file(test_file) {
            error!("Failed to remove candidate {:?}: {}", test_file, e);
        }
    }
}

/// First `package` line of the test file, as a `pkg.` prefix for -Dtest.
fn read_package(test_file: &Path) -> String {
    let Ok(content) = fs::read_to_string(test_file) else {
        return String::new();
    };
    for line in content.lines() {
        if let Some(rest) = line.trim().strip_prefix("package") {
            let pkg = rest.split(';').next().unwrap_or("").trim();
            if !pkg.is_empty() {
                return format!("{}.", pkg);
            }
        }
    }
    String::new()
}

/// Pull the error-bearing lines out of the raw build output; falls back to
/// the whole output when nothing matches.
pub fn extract_key_errors(output: &str) -> Vec<String> {
    let key_errors: Vec<String> = output
        .lines()
        .filter(|line| {
            line.contains("[ERROR]") || line.contains("error:") || line.contains("ERROR]")
        })
        .map(|line| line.to_string())
        .collect();

    if key_errors.is_empty() {
        output.lines().map(|line| line.to_string()).collect()
    } else {
        key_errors
    }
}
