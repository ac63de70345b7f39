//! One immutable configuration record for the whole run, loaded from
//! `config.toml` and passed down explicitly.

use class_runner::GenerationConfig;
use config::{Config, File};
use llm_requester::LlmConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use test_compiler::TargetOs;

/// Filesystem layout and build-tool knobs for the target project.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
    /// Source Info Store root (the parser's JSON output directory).
    pub parse_output: PathBuf,
    /// Where candidate and merged test files are written.
    pub test_output: PathBuf,
    /// Where per-round diagnostics logs are written.
    pub error_output: PathBuf,
    pub target_os: TargetOs,
    /// Serialize build-tool invocations sharing one working directory.
    pub serialize_build: bool,
}

impl Default for ProjectConfig {
    fn default() -> Self {
        Self {
            parse_output: PathBuf::from("parse-output"),
            test_output: PathBuf::from("generated-tests"),
            error_output: PathBuf::from("error-output"),
            target_os: TargetOs::default(),
            serialize_build: false,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub generation: GenerationConfig,
    pub llm: LlmConfig,
    #[serde(default)]
    pub project: ProjectConfig,
}

/// Load `config.toml`, either from an explicit path or from the usual
/// locations relative to the working directory.
pub fn get_config(explicit: Option<&Path>) -> Result<AppConfig, config::ConfigError> {
    let mut config_builder = Config::builder();

    if let Some(path) = explicit {
        config_builder = config_builder.add_source(File::from(path));
    } else {
        let possible_paths = [
            "config.toml",
            "config/config.toml",
            "../config/config.toml",
        ];
        let Some(found) = possible_paths
            .iter()
            .find(|path| Path::new(path).exists())
        else {
            return Err(config::ConfigError::NotFound(
                "config.toml not found in any expected location".to_string(),
            ));
        };
        config_builder = config_builder.add_source(File::with_name(found));
    }

    let config = config_builder.build()?;
    config.try_deserialize()
}
