use commandline_tool::{Commands, build_env, get_config, parse_args, run_batch, run_class};

use anyhow::Result;
use chrono::{Datelike, Local, Timelike};
use log::{info, warn};
use rand::SeedableRng;
use rand::{Rng, rngs::StdRng};
use std::fs;
use std::path::Path;
use tokio_util::sync::CancellationToken;
use tracing_appender::rolling;
use tracing_log::LogTracer;
use tracing_subscriber::filter::LevelFilter as SubLevel;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = parse_args();

    // Route log macros through tracing.
    let _ = LogTracer::init();

    let log_dir = Path::new("log");
    if let Err(e) = fs::create_dir_all(log_dir) {
        eprintln!("failed to create log directory: {}", e);
    }

    let stdout_layer = fmt::layer()
        .with_target(false)
        .with_level(true)
        .with_timer(fmt::time::uptime());

    // Archive the previous run's latest.log under a timestamped name;
    // the current run always writes latest.log.
    let latest_path = log_dir.join("latest.log");
    if latest_path.exists() {
        if let Ok(metadata) = fs::metadata(&latest_path) {
            if let Ok(modified) = metadata.modified() {
                let datetime: chrono::DateTime<Local> = modified.into();
                let mut rng = StdRng::from_entropy();
                let rnd: u8 = rng.gen_range(0..100);
                let code = format!(
                    "{:02}{:02}{:02}{:02}{:02}",
                    (datetime.year() % 100) as i32,
                    datetime.month(),
                    datetime.day(),
                    datetime.hour(),
                    rnd
                );
                let mut final_path = log_dir.join(format!("{}.log", code));
                let mut idx = 1;
                while final_path.exists() {
                    final_path = log_dir.join(format!("{}-{}.log", code, idx));
                    idx += 1;
                }
                let _ = fs::rename(&latest_path, &final_path);
            }
        }
    }

    let file_appender = rolling::never(log_dir, "latest.log");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
    // Keep the flush guard alive for the whole process.
    let _guard: &'static _ = Box::leak(Box::new(guard));

    let file_layer = fmt::layer()
        .with_target(true)
        .with_level(true)
        .with_ansi(false)
        .with_writer(non_blocking);

    let stdout_filter = if cli.debug {
        SubLevel::DEBUG
    } else {
        SubLevel::INFO
    };
    let file_filter = if cli.debug {
        SubLevel::DEBUG
    } else {
        SubLevel::INFO
    };

    let subscriber = tracing_subscriber::registry()
        .with(stdout_layer.with_filter(stdout_filter))
        .with(file_layer.with_filter(file_filter));
    let _ = subscriber.try_init();

    let cfg = get_config(cli.config.as_deref())?;

    // First Ctrl-C stops scheduling new work; in-flight rounds drain.
    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                warn!("Interrupt received, finishing in-flight work...");
                cancel.cancel();
            }
        });
    }

    match &cli.command {
        Commands::Class { name, project_dir } => {
            info!("Generating tests for class < {} >", name);
            let env = build_env(&cfg, project_dir)?;
            run_class(env, name, cancel).await
        }
        Commands::Batch {
            class_list,
            project_dir,
        } => {
            info!("Generating tests for classes in {}", class_list.display());
            let env = build_env(&cfg, project_dir)?;
            run_batch(env, class_list, cancel).await
        }
    }
}
