use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use log::{error, info, warn};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

// Internal crates
use class_runner::{ClassOutcome, ClassRunner, RunnerEnv};
use llm_requester::ChatClient;
use source_info::FsInfoStore;
use test_compiler::{CompilerConfig, TestCompiler};

pub mod app_config;

pub use app_config::{AppConfig, get_config};

#[derive(Parser)]
#[command(name = "testgen-agent")]
#[command(version = "0.1")]
#[command(about = "LLM-driven JUnit test generation", long_about = None)]
pub struct Cli {
    #[arg(long, short = 'd', global = true, help = "show debug log")]
    pub debug: bool,

    /// Configuration file (default: config.toml next to the working dir)
    #[arg(long, short = 'c', global = true, value_name = "FILE")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate tests for one class
    Class {
        /// Fully qualified class name, e.g. com.example.Calc (required)
        #[arg(long, value_name = "NAME", required = true)]
        name: String,

        /// Target project root, where the build tool runs
        #[arg(long, value_name = "DIR", default_value = ".")]
        project_dir: PathBuf,
    },

    /// Generate tests for every class listed in a file (one per line)
    Batch {
        /// Class list file (required)
        #[arg(long, value_name = "FILE", required = true)]
        class_list: PathBuf,

        /// Target project root, where the build tool runs
        #[arg(long, value_name = "DIR", default_value = ".")]
        project_dir: PathBuf,
    },
}

pub fn parse_args() -> Cli {
    Cli::parse()
}

/// Wire the shared collaborators for one run out of the loaded config.
pub fn build_env(cfg: &AppConfig, project_dir: &Path) -> Result<Arc<RunnerEnv>> {
    if !project_dir.exists() {
        bail!("project directory does not exist: {}", project_dir.display());
    }
    let client = ChatClient::new(cfg.llm.clone())?;
    let compiler = TestCompiler::new(
        project_dir,
        CompilerConfig {
            target_os: cfg.project.target_os,
            serialize_build: cfg.project.serialize_build,
            build_command: None,
        },
    );
    Ok(Arc::new(RunnerEnv {
        store: Box::new(FsInfoStore::new(&cfg.project.parse_output)),
        provider: Box::new(client),
        compiler,
        config: cfg.generation.clone(),
        test_output: cfg.project.test_output.clone(),
        error_output: cfg.project.error_output.clone(),
    }))
}

/// Generate tests for one class.
pub async fn run_class(env: Arc<RunnerEnv>, name: &str, cancel: CancellationToken) -> Result<()> {
    let runner = ClassRunner::new(env, name, cancel);
    match runner.run().await? {
        ClassOutcome::Skipped => warn!("Class < {} > skipped: no parsed info", name),
        ClassOutcome::PerMethod {
            generated,
            failed,
            skipped,
        } => info!(
            "Class < {} > done: {} generated, {} failed, {} skipped",
            name, generated, failed, skipped
        ),
        ClassOutcome::Merged {
            artifact,
            fragments,
        } => match artifact {
            Some(path) => info!(
                "Class < {} > merged {} fragments into {}",
                name,
                fragments,
                path.display()
            ),
            None => warn!(
                "Class < {} > produced no validated merged test ({} fragments)",
                name, fragments
            ),
        },
    }
    Ok(())
}

/// Generate tests for every class named in `class_list`, one per line.
/// A failing class is logged and never aborts the rest of the batch.
pub async fn run_batch(
    env: Arc<RunnerEnv>,
    class_list: &Path,
    cancel: CancellationToken,
) -> Result<()> {
    let content = fs::read_to_string(class_list)
        .with_context(|| format!("failed to read class list {}", class_list.display()))?;
    let names: Vec<&str> = content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .collect();
    if names.is_empty() {
        warn!("Class list {} names no classes", class_list.display());
        return Ok(());
    }

    info!("Processing {} classes", names.len());
    for (i, name) in names.iter().enumerate() {
        if cancel.is_cancelled() {
            warn!("Cancelled after {} of {} classes", i, names.len());
            break;
        }
        info!("[{}/{}] {}", i + 1, names.len(), name);
        if let Err(e) = run_class(Arc::clone(&env), name, cancel.clone()).await {
            error!("Class < {} > failed: {}", name, e);
        }
    }
    Ok(())
}
