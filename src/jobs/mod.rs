//! Worker job protocol
//!
//! Jobs arrive as JSON objects tagged by `job_type`; each produces exactly one
//! result object echoing the job's `id`.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::JudgeConfig;
use crate::judger::{judge, JudgeRequest, JudgeResult};
use crate::validator::{validate, ValidationResult};

/// Worker job enum - represents different types of jobs the worker can process
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerJob {
    /// Judge a submission against test cases
    #[serde(rename = "judge")]
    Judge(JudgeJob),
    /// Compile only
    #[serde(rename = "validate")]
    Validate(ValidateJob),
}

#[derive(Debug, Serialize, Deserialize)]
pub struct JudgeJob {
    #[serde(default)]
    pub id: String,
    #[serde(flatten)]
    pub request: JudgeRequest,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ValidateJob {
    #[serde(default)]
    pub id: String,
    pub code: String,
}

/// One result per job, tagged like the job it answers
#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "job_type")]
pub enum WorkerResult {
    #[serde(rename = "judge")]
    Judge { id: String, result: JudgeResult },
    #[serde(rename = "validate")]
    Validate { id: String, result: ValidationResult },
}

impl WorkerJob {
    pub fn id(&self) -> &str {
        match self {
            WorkerJob::Judge(job) => &job.id,
            WorkerJob::Validate(job) => &job.id,
        }
    }
}

/// Run a job to completion
pub async fn process_job(config: &JudgeConfig, job: WorkerJob) -> WorkerResult {
    match job {
        WorkerJob::Judge(job) => {
            info!(
                "Received judge job: id={}, test_cases={}, source_size={}",
                job.id,
                job.request.test_cases.len(),
                job.request.code.len()
            );
            let result = judge(config, &job.request).await;
            info!("Judge job completed: id={}, verdict={}", job.id, result.verdict);
            WorkerResult::Judge { id: job.id, result }
        }
        WorkerJob::Validate(job) => {
            info!(
                "Received validate job: id={}, source_size={}",
                job.id,
                job.code.len()
            );
            let result = validate(config, &job.code).await;
            info!("Validate job completed: id={}, valid={}", job.id, result.valid);
            WorkerResult::Validate { id: job.id, result }
        }
    }
}
