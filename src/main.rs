use std::sync::Arc;

use anyhow::{Context, Result};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::sync::{mpsc, Semaphore};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use cjudge::config::{get_config, init_config, JudgeConfig};
use cjudge::jobs::{process_job, WorkerJob, WorkerResult};

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr, stdout carries results only
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("cjudge=info".parse()?),
        )
        .init();

    dotenvy::dotenv().ok();

    init_config(JudgeConfig::from_env()?)?;
    let config = get_config();
    info!(
        "Judge config: scratch_dir={:?}, compiler={}, compile_timeout_ms={}, execution_timeout_ms={}, output_limit_bytes={}",
        config.scratch_dir,
        config.compiler,
        config.compile_timeout_ms,
        config.execution_timeout_ms,
        config.output_limit_bytes
    );

    let input: Box<dyn AsyncBufRead + Unpin + Send> = match std::env::args().nth(1) {
        Some(path) => {
            let file = tokio::fs::File::open(&path)
                .await
                .with_context(|| format!("Failed to open job file {}", path))?;
            info!("Reading jobs from {}", path);
            Box::new(BufReader::new(file))
        }
        None => {
            info!("Reading jobs from stdin");
            Box::new(BufReader::new(tokio::io::stdin()))
        }
    };

    let limiter = config.max_concurrent_jobs.map(|n| {
        info!("Limiting concurrent jobs to {}", n);
        Arc::new(Semaphore::new(n))
    });

    let (tx, rx) = mpsc::unbounded_channel::<WorkerResult>();
    let writer = tokio::spawn(write_results(rx));

    let mut tasks = JoinSet::new();
    let mut lines = input.lines();
    while let Some(line) = lines.next_line().await? {
        if line.trim().is_empty() {
            continue;
        }
        let job = match serde_json::from_str::<WorkerJob>(&line) {
            Ok(job) => job,
            Err(e) => {
                warn!("Failed to parse job data: {}", e);
                continue;
            }
        };

        debug!("Queued job {}", job.id());

        let permit = match &limiter {
            Some(semaphore) => Some(semaphore.clone().acquire_owned().await?),
            None => None,
        };
        let tx = tx.clone();
        tasks.spawn(async move {
            let _permit = permit;
            let result = process_job(config, job).await;
            if tx.send(result).is_err() {
                error!("Result writer has stopped, dropping result");
            }
        });
    }

    drop(tx);
    while let Some(joined) = tasks.join_next().await {
        if let Err(e) = joined {
            error!("Job task failed: {}", e);
        }
    }
    writer.await??;

    info!("All jobs processed");
    Ok(())
}

/// Write one JSON line per result, in completion order
async fn write_results(mut rx: mpsc::UnboundedReceiver<WorkerResult>) -> Result<()> {
    let mut stdout = tokio::io::stdout();
    while let Some(result) = rx.recv().await {
        let mut line = serde_json::to_string(&result)?;
        line.push('\n');
        stdout.write_all(line.as_bytes()).await?;
        stdout.flush().await?;
    }
    Ok(())
}
