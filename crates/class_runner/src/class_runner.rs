//! Class-level coordination: fan methods out to workers, or run them
//! sequentially and merge the surviving artifacts.

use anyhow::{Result, anyhow};
use log::{error, info, warn};
use source_info::{ClassId, ClassInfo};
use std::path::PathBuf;
use std::sync::Arc;
use test_compiler::Validation;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{MethodRunner, RunnerEnv, SEPARATOR};

/// Result of one class-level job.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClassOutcome {
    /// The Source Info Store had no record for the class.
    Skipped,
    /// Per-method parallel policy: candidates stand alone, no merge.
    PerMethod {
        generated: usize,
        failed: usize,
        skipped: usize,
    },
    /// Sequential-then-merge policy.
    Merged {
        artifact: Option<PathBuf>,
        fragments: usize,
    },
}

/// Coordinates test generation for every method of one class.
pub struct ClassRunner {
    env: Arc<RunnerEnv>,
    class_id: ClassId,
    cancel: CancellationToken,
}

impl ClassRunner {
    pub fn new(env: Arc<RunnerEnv>, full_class_name: &str, cancel: CancellationToken) -> Self {
        Self {
            env,
            class_id: ClassId::new(full_class_name),
            cancel,
        }
    }

    pub async fn run(&self) -> Result<ClassOutcome> {
        let Some(class_info) = self.env.store.class_info(&self.class_id)? else {
            warn!("No parsed info found for class {}, skipping", self.class_id);
            return Ok(ClassOutcome::Skipped);
        };
        let class_info = Arc::new(class_info);

        if self.env.config.enable_multithreading {
            self.method_job(class_info).await
        } else {
            self.sequential_then_merge(class_info).await
        }
    }

    /// One worker per method signature, bounded by `method_threads`.
    /// Worker faults are logged and never abort siblings.
    async fn method_job(&self, class_info: Arc<ClassInfo>) -> Result<ClassOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.env.config.method_threads.max(1)));
        let mut join_set = JoinSet::new();

        for signature in class_info.method_signatures.keys().cloned() {
            let env = Arc::clone(&self.env);
            let class_info = Arc::clone(&class_info);
            let cancel = self.cancel.clone();
            let semaphore = Arc::clone(&semaphore);
            join_set.spawn(async move {
                let _permit = semaphore
                    .acquire_owned()
                    .await
                    .map_err(|e| anyhow!("worker pool closed: {}", e))?;
                if cancel.is_cancelled() {
                    return Ok::<_, anyhow::Error>((signature, None));
                }
                let Some(method_info) = env.store.method_info(&class_info, &signature)? else {
                    info!("No parsed info found for < {} >, skipping", signature);
                    return Ok((signature, None));
                };
                let runner =
                    Arc::new(MethodRunner::new(env, class_info, method_info, cancel));
                let paths = runner.run().await?;
                Ok((signature, Some(paths)))
            });
        }

        let mut generated = 0;
        let mut failed = 0;
        let mut skipped = 0;
        while let Some(joined) = join_set.join_next().await {
            match joined {
                Ok(Ok((signature, Some(paths)))) => {
                    if paths.is_empty() {
                        info!("Method < {} > produced no surviving test", signature);
                        failed += 1;
                    } else {
                        info!("Processed {}", signature);
                        generated += paths.len();
                    }
                }
                Ok(Ok((_, None))) => skipped += 1,
                Ok(Err(e)) => {
                    // Contained at the method: siblings keep running.
                    error!("Worker failed for class {}: {}", self.class_id, e);
                    failed += 1;
                }
                Err(e) => {
                    error!("Worker task aborted for class {}: {}", self.class_id, e);
                    failed += 1;
                }
            }
        }
        Ok(ClassOutcome::PerMethod {
            generated,
            failed,
            skipped,
        })
    }

    /// Methods one at a time; surviving candidates are merged into one
    /// class-level artifact which is itself validated through the gateway.
    async fn sequential_then_merge(&self, class_info: Arc<ClassInfo>) -> Result<ClassOutcome> {
        let mut surviving: Vec<PathBuf> = Vec::new();
        for signature in class_info.method_signatures.keys() {
            if self.cancel.is_cancelled() {
                break;
            }
            let Some(method_info) = self.env.store.method_info(&class_info, signature)? else {
                continue;
            };
            let runner = Arc::new(MethodRunner::new(
                Arc::clone(&self.env),
                Arc::clone(&class_info),
                method_info,
                self.cancel.clone(),
            ));
            match runner.run().await {
                Ok(paths) => surviving.extend(paths),
                Err(e) => warn!("Method < {} > failed: {}", signature, e),
            }
        }

        let fragments = surviving.len();
        if fragments == 0 {
            info!("No surviving fragments for class {}", self.class_id);
            return Ok(ClassOutcome::Merged {
                artifact: None,
                fragments,
            });
        }

        let test_class_name = format!("{}{}Test", class_info.class_name, SEPARATOR);
        let code = test_merger::merge_files(&surviving, &test_class_name)?;
        let save_path = self
            .env
            .test_output
            .join(class_info.package_path())
            .join(format!("{}.java", test_class_name));
        let error_log = self
            .env
            .error_output
            .join(format!("{}CompilationError_.txt", test_class_name));

        // Same as the per-method path: the build tool blocks for seconds.
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
                info!(
                    "Test for class < {} > generated successfully",
                    class_info.class_name
                );
                Ok(ClassOutcome::Merged {
                    artifact: Some(save_path),
                    fragments,
                })
            }
            Validation::Failed { .. } => {
                info!(
                    "Test for class < {} > generated failed",
                    class_info.class_name
                );
                Ok(ClassOutcome::Merged {
                    artifact: None,
                    fragments,
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::GenerationConfig;
    use async_trait::async_trait;
    use llm_requester::ChatProvider;
    use prompt_builder::Message;
    use source_info::{FsInfoStore, MethodInfo};
    use std::collections::BTreeMap;
    use std::fs;
    use std::path::Path;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tempfile::TempDir;
    use test_compiler::{CompilerConfig, TestCompiler};

    /// Provider that always answers with the same fenced block and counts
    /// how often it was called.
    struct ScriptedProvider {
        response: String,
        calls: AtomicUsize,
    }

    impl ScriptedProvider {
        fn new(code: &str) -> Self {
            Self {
                response: format!("Sure, here you go:\n```java\n{}\n```\n", code),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl ChatProvider for ScriptedProvider {
        async fn chat(&self, _messages: &[Message]) -> anyhow::Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.response.clone())
        }
    }

    const GENERATED: &str = "package com.example;\n\nimport org.junit.Test;\n\npublic class CalcTest {\n    @Test\n    public void addsPositives() {\n        check();\n    }\n}";

    fn seed_store(root: &Path) {
        let mut method_signatures = BTreeMap::new();
        method_signatures.insert("add(int, int)".to_string(), "0".to_string());
        method_signatures.insert("scale(int)".to_string(), "1".to_string());
        let class_info = ClassInfo {
            class_name: "Calc".to_string(),
            package_declaration: "package com.example;".to_string(),
            class_signature: "public class Calc".to_string(),
            imports: vec!["import org.junit.Test;".to_string()],
            brief_methods: vec![
                "public int add(int a, int b);".to_string(),
                "public int scale(int k);".to_string(),
            ],
            method_signatures,
            ..Default::default()
        };
        let dir = root.join("com/example/Calc");
        fs::create_dir_all(&dir).unwrap();
        fs::write(
            dir.join("class.json"),
            serde_json::to_string(&class_info).unwrap(),
        )
        .unwrap();

        for (name, sig, stem) in [
            ("add", "add(int, int)", "0"),
            ("scale", "scale(int)", "1"),
        ] {
            let method = MethodInfo {
                class_name: "Calc".to_string(),
                method_name: name.to_string(),
                method_signature: sig.to_string(),
                source_code: format!("public int {}(...) {{ }}", name),
                brief: format!("public int {}(...);", name),
                ..Default::default()
            };
            fs::write(
                dir.join(format!("{}.json", stem)),
                serde_json::to_string(&method).unwrap(),
            )
            .unwrap();
        }
    }

    fn env_with(
        tmp: &TempDir,
        provider: Arc<ScriptedProvider>,
        build_command: &str,
        config: GenerationConfig,
    ) -> Arc<RunnerEnv> {
        seed_store(&tmp.path().join("parse"));
        Arc::new(RunnerEnv {
            store: Box::new(FsInfoStore::new(tmp.path().join("parse"))),
            provider: Box::new(ArcProvider(provider)),
            compiler: TestCompiler::new(
                tmp.path(),
                CompilerConfig {
                    build_command: Some(build_command.to_string()),
                    ..Default::default()
                },
            ),
            config,
            test_output: tmp.path().join("tests"),
            error_output: tmp.path().join("errors"),
        })
    }

    /// Lets one counting provider be shared between the env and the test.
    struct ArcProvider(Arc<ScriptedProvider>);

    #[async_trait]
    impl ChatProvider for ArcProvider {
        async fn chat(&self, messages: &[Message]) -> anyhow::Result<String> {
            self.0.chat(messages).await
        }
    }

    #[tokio::test]
    async fn stop_at_first_success_short_circuits_attempts() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: false,
            stop_when_success: true,
            test_number: 3,
            max_rounds: 4,
            ..Default::default()
        };
        let env = env_with(&tmp, Arc::clone(&provider), "true", config);

        let class_info = Arc::new(
            env.store
                .class_info(&ClassId::new("com.example.Calc"))
                .unwrap()
                .unwrap(),
        );
        let method_info = env.store.method_info(&class_info, "add(int, int)").unwrap().unwrap();
        let runner = Arc::new(MethodRunner::new(
            Arc::clone(&env),
            class_info,
            method_info,
            CancellationToken::new(),
        ));
        let paths = runner.run().await.unwrap();

        assert_eq!(paths.len(), 1);
        assert!(paths[0].exists());
        // Round 1 of attempt 1 validated, attempts 2 and 3 never started.
        assert_eq!(provider.calls(), 1);
    }

    #[tokio::test]
    async fn exhaustive_parallel_runs_all_attempts() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: true,
            stop_when_success: false,
            test_number: 3,
            max_rounds: 2,
            ..Default::default()
        };
        let env = env_with(&tmp, Arc::clone(&provider), "true", config);

        let class_info = Arc::new(
            env.store
                .class_info(&ClassId::new("com.example.Calc"))
                .unwrap()
                .unwrap(),
        );
        let method_info = env.store.method_info(&class_info, "add(int, int)").unwrap().unwrap();
        let runner = Arc::new(MethodRunner::new(
            Arc::clone(&env),
            class_info,
            method_info,
            CancellationToken::new(),
        ));
        let paths = runner.run().await.unwrap();

        // Every attempt ran and every outcome was observed.
        assert_eq!(provider.calls(), 3);
        assert_eq!(paths.len(), 3);
    }

    #[tokio::test]
    async fn exhausted_rounds_leave_no_candidate_behind() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: false,
            stop_when_success: true,
            test_number: 1,
            max_rounds: 2,
            ..Default::default()
        };
        // `false` fails every validation.
        let env = env_with(&tmp, Arc::clone(&provider), "false", config);

        let class_info = Arc::new(
            env.store
                .class_info(&ClassId::new("com.example.Calc"))
                .unwrap()
                .unwrap(),
        );
        let method_info = env.store.method_info(&class_info, "add(int, int)").unwrap().unwrap();
        let runner = Arc::new(MethodRunner::new(
            Arc::clone(&env),
            class_info,
            method_info,
            CancellationToken::new(),
        ));
        let paths = runner.run().await.unwrap();

        assert!(paths.is_empty());
        // Both rounds consumed, diagnostics fed back between them.
        assert_eq!(provider.calls(), 2);
        let candidate_dir = tmp.path().join("tests/com/example");
        let leftover = fs::read_dir(&candidate_dir)
            .map(|entries| entries.count())
            .unwrap_or(0);
        assert_eq!(leftover, 0);
        // Failed rounds left their diagnostic logs.
        assert!(tmp.path().join("errors").read_dir().unwrap().count() >= 2);
    }

    #[tokio::test]
    async fn validation_does_not_block_the_runtime() {
        use std::os::unix::fs::PermissionsExt;
        use std::time::{Duration, Instant};

        let tmp = TempDir::new().unwrap();
        let script = tmp.path().join("slow-build.sh");
        fs::write(&script, "#!/bin/sh\nsleep 1\necho BUILD SUCCESS\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: false,
            stop_when_success: true,
            test_number: 1,
            max_rounds: 1,
            ..Default::default()
        };
        let env = env_with(
            &tmp,
            Arc::clone(&provider),
            script.to_str().unwrap(),
            config,
        );

        let class_info = Arc::new(
            env.store
                .class_info(&ClassId::new("com.example.Calc"))
                .unwrap()
                .unwrap(),
        );
        let method_info = env.store.method_info(&class_info, "add(int, int)").unwrap().unwrap();
        let runner = Arc::new(MethodRunner::new(
            env,
            class_info,
            method_info,
            CancellationToken::new(),
        ));

        let started = Instant::now();
        let task = tokio::spawn(runner.run());
        // This test runtime is single-threaded: the timer below can only
        // fire while the build is still sleeping if the build-tool call
        // runs off the runtime thread.
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(started.elapsed() < Duration::from_millis(900));

        let paths = task.await.unwrap().unwrap();
        assert_eq!(paths.len(), 1);
    }

    #[tokio::test]
    async fn sequential_merge_produces_class_artifact() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: false,
            stop_when_success: true,
            test_number: 1,
            max_rounds: 1,
            ..Default::default()
        };
        let env = env_with(&tmp, Arc::clone(&provider), "true", config);

        let runner = ClassRunner::new(env, "com.example.Calc", CancellationToken::new());
        let outcome = runner.run().await.unwrap();

        let ClassOutcome::Merged {
            artifact: Some(path),
            fragments,
        } = outcome
        else {
            panic!("expected merged artifact, got {:?}", outcome);
        };
        assert_eq!(fragments, 2);
        assert!(path.ends_with("com/example/Calc_Test.java"));
        let merged = fs::read_to_string(&path).unwrap();
        assert!(merged.contains("public class Calc_Test {"));
    }

    #[tokio::test]
    async fn missing_method_metadata_is_skipped_not_fatal() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: true,
            stop_when_success: true,
            test_number: 1,
            max_rounds: 1,
            method_threads: 2,
            ..Default::default()
        };
        let env = env_with(&tmp, Arc::clone(&provider), "true", config);
        // Remove one method record; its sibling must still generate.
        fs::remove_file(tmp.path().join("parse/com/example/Calc/1.json")).unwrap();

        let runner = ClassRunner::new(env, "com.example.Calc", CancellationToken::new());
        let outcome = runner.run().await.unwrap();

        assert_eq!(
            outcome,
            ClassOutcome::PerMethod {
                generated: 1,
                failed: 0,
                skipped: 1,
            }
        );
    }

    #[tokio::test]
    async fn unknown_class_is_skipped() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let env = env_with(&tmp, provider, "true", GenerationConfig::default());

        let runner = ClassRunner::new(env, "com.example.Ghost", CancellationToken::new());
        assert_eq!(runner.run().await.unwrap(), ClassOutcome::Skipped);
    }

    #[tokio::test]
    async fn cancelled_token_stops_new_work() {
        let tmp = TempDir::new().unwrap();
        let provider = Arc::new(ScriptedProvider::new(GENERATED));
        let config = GenerationConfig {
            enable_multithreading: false,
            stop_when_success: true,
            test_number: 2,
            max_rounds: 2,
            ..Default::default()
        };
        let env = env_with(&tmp, Arc::clone(&provider), "true", config);

        let cancel = CancellationToken::new();
        cancel.cancel();
        let runner = ClassRunner::new(env, "com.example.Calc", cancel);
        let outcome = runner.run().await.unwrap();

        assert_eq!(
            outcome,
            ClassOutcome::Merged {
                artifact: None,
                fragments: 0,
            }
        );
        assert_eq!(provider.calls(), 0);
    }
}
