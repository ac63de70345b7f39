//! Per-method generation: the repair-round state machine and the
//! best-of-N attempt wrapper around it.

use anyhow::Result;
use log::{info, warn};
use prompt_builder::{PromptBuilder, PromptInfo, build_messages};
use source_info::{ClassInfo, MethodInfo};
use std::path::PathBuf;
use std::sync::Arc;
use test_compiler::Validation;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{RunnerEnv, SEPARATOR, extract, repair};

/// Runs generation for one target method.
pub struct MethodRunner {
    env: Arc<RunnerEnv>,
    class_info: Arc<ClassInfo>,
    method_info: MethodInfo,
    cancel: CancellationToken,
}

impl MethodRunner {
    pub fn new(
        env: Arc<RunnerEnv>,
        class_info: Arc<ClassInfo>,
        method_info: MethodInfo,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            env,
            class_info,
            method_info,
            cancel,
        }
    }

    /// Attempt wrapper: run the round loop up to `test_number` times.
    ///
    /// Sequential mode stops at the first validated candidate when
    /// `stop_when_success` is set; exhaustive-parallel mode runs every
    /// attempt concurrently and observes all outcomes. Returns the paths
    /// of every surviving candidate.
    pub async fn run(self: Arc<Self>) -> Result<Vec<PathBuf>> {
        let config = &self.env.config;
        let attempts = config.test_number.max(1);

        if !config.stop_when_success && config.enable_multithreading {
            let mut join_set = JoinSet::new();
            let semaphore = Arc::new(Semaphore::new(attempts));
            for num in 1..=attempts {
                let runner = Arc::clone(&self);
                let semaphore = Arc::clone(&semaphore);
                join_set.spawn(async move {
                    let _permit = semaphore.acquire_owned().await?;
                    runner.start_rounds(num).await
                });
            }

            let mut paths = Vec::new();
            while let Some(joined) = join_set.join_next().await {
                match joined {
                    Ok(Ok(Some(path))) => paths.push(path),
                    Ok(Ok(None)) => {}
                    Ok(Err(e)) => warn!(
                        "Attempt for method < {} > failed: {}",
                        self.method_info.method_name, e
                    ),
                    Err(e) => warn!(
                        "Attempt task for method < {} > aborted: {}",
                        self.method_info.method_name, e
                    ),
                }
            }
            return Ok(paths);
        }

        let mut paths = Vec::new();
        for num in 1..=attempts {
            if self.cancel.is_cancelled() {
                break;
            }
            match self.start_rounds(num).await {
                Ok(Some(path)) => {
                    paths.push(path);
                    if config.stop_when_success {
                        break;
                    }
                }
                Ok(None) => {}
                Err(e) => warn!(
                    "Attempt {} for method < {} > failed: {}",
                    num, self.method_info.method_name, e
                ),
            }
        }
        Ok(paths)
    }

    /// The round loop for one attempt: generate, extract, repair,
    /// validate; failed rounds feed their diagnostics into the next
    /// prompt. Terminal states are one validated candidate or round
    /// exhaustion with nothing left on disk.
    pub async fn start_rounds(&self, num: usize) -> Result<Option<PathBuf>> {
        let method_name = &self.method_info.method_name;
        let test_name = self.test_name(num);
        let mut prompt_info: Option<PromptInfo> = None;
        info!(
            "==========================\nGenerating test for method < {} > number {}...",
            method_name, num
        );

        for round in 1..=self.env.config.max_rounds.max(1) {
            if self.cancel.is_cancelled() {
                info!("Cancelled while processing method < {} >", method_name);
                return Ok(None);
            }

            let info = match prompt_info.take() {
                Some(existing) => {
                    info!("Fixing test for method < {} > round {} ...", method_name, round);
                    prompt_info.insert(existing)
                }
                None => {
                    info!(
                        "Generating test for method < {} > round {} ...",
                        method_name, round
                    );
                    let builder = PromptBuilder::new(self.env.store.as_ref());
                    prompt_info
                        .insert(builder.build_prompt(&self.class_info, &self.method_info)?)
                }
            };

            let messages = build_messages(info);
            let response = self.env.provider.chat(&messages).await?;

            let Some(code) = extract::extract_code_block(&response) else {
                info!("Test for method < {} > extract code failed", method_name);
                continue;
            };
            let code = repair::rename_test_class(&code, &test_name);
            let code = repair::repair_package(&code, &self.class_info.package_declaration);
            let code = repair::add_timeout(&code, self.env.config.test_timeout_secs * 1000);
            info.unit_test = code.clone();
            let code = repair::repair_imports(&code, &self.class_info.imports);

            let save_path = self.save_path(&test_name);
            let error_log = self.error_log_path(&test_name, round);
            // The build tool takes seconds; keep it off the runtime threads.
            let validation = {
                let env = Arc::clone(&self.env);
                let save_path = save_path.clone();
                tokio::task::spawn_blocking(move || {
                    env.compiler.export_and_validate(&code, &save_path, &error_log)
                })
                .await??
            };
            match validation {
                Validation::Passed => {
                    info!("Test for method < {} > generated successfully", method_name);
                    return Ok(Some(save_path));
                }
                Validation::Failed { diagnostics } => {
                    info.record_failure(diagnostics);
                    info!("Test for method < {} > generated failed", method_name);
                }
            }
        }
        Ok(None)
    }

    /// Globally unique candidate name: class, method, signature id, and
    /// attempt number keep concurrent candidates isolated on disk.
    fn test_name(&self, num: usize) -> String {
        let sig_id = self
            .class_info
            .method_signatures
            .get(&self.method_info.method_signature)
            .map(|s| s.as_str())
            .unwrap_or("0");
        format!(
            "{}{sep}{}{sep}{}{sep}{}{sep}Test",
            self.class_info.class_name,
            self.method_info.method_name,
            sig_id,
            num,
            sep = SEPARATOR
        )
    }

    fn save_path(&self, test_name: &str) -> PathBuf {
        self.env
            .test_output
            .join(self.class_info.package_path())
            .join(format!("{}.java", test_name))
    }

    fn error_log_path(&self, test_name: &str, round: usize) -> PathBuf {
        self.env
            .error_output
            .join(format!("{}CompilationError_{}.txt", test_name, round))
    }
}
