//! Class runner - the generate/validate/repair orchestration core
//!
//! Drives test generation for every method of a target class: the bounded
//! per-attempt repair loop, the best-of-N attempt wrapper, the class-level
//! concurrency coordinator, and the sequential-then-merge flow that unifies
//! surviving per-method artifacts into one class-level test.

pub mod class_runner;
pub mod extract;
pub mod method_runner;
pub mod repair;

pub use class_runner::{ClassOutcome, ClassRunner};
pub use method_runner::MethodRunner;

use llm_requester::ChatProvider;
use serde::Deserialize;
use source_info::InfoStore;
use std::path::PathBuf;
use test_compiler::TestCompiler;

/// Separator for derived artifact names: `Calc_add_0_1_Test`.
pub const SEPARATOR: &str = "_";

/// Immutable generation knobs, threaded explicitly into every component.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Run per-method workers concurrently (no merge) instead of the
    /// sequential-then-merge flow.
    pub enable_multithreading: bool,
    /// Stop a method's attempts at the first validated candidate.
    pub stop_when_success: bool,
    /// Attempts per method (N).
    pub test_number: usize,
    /// Repair rounds per attempt.
    pub max_rounds: usize,
    /// Worker bound for the per-method coordinator (W).
    pub method_threads: usize,
    /// Timeout injected into generated test annotations.
    pub test_timeout_secs: u64,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            enable_multithreading: true,
            stop_when_success: true,
            test_number: 5,
            max_rounds: 6,
            method_threads: 8,
            test_timeout_secs: 8,
        }
    }
}

/// Shared collaborators for one class-level job.
///
/// Owned once, shared read-only across every concurrent method worker.
pub struct RunnerEnv {
    pub store: Box<dyn InfoStore>,
    pub provider: Box<dyn ChatProvider>,
    pub compiler: TestCompiler,
    pub config: GenerationConfig,
    /// Canonical test-source root, mirroring the target package.
    pub test_output: PathBuf,
    /// Per-round diagnostics logs for failed validations.
    pub error_output: PathBuf,
}
