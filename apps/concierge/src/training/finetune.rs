//! Fine-tuning pipeline: upload, create, status, analyze.
//!
//! Supervised and DPO runs share every step; a `FineTunePlan` carries the
//! per-method defaults (training file, hyperparameters, IDs file, how many
//! rows to replay against the finished model).

use std::path::{Path, PathBuf};

use chrono::Local;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::errors::AppError;
use crate::llm_client::poll::{poll_until, PollPolicy};
use crate::llm_client::types::{
    ChatCompletionRequest, CreateFineTuningJob, DpoHyperparameters, FilePurpose,
    FineTuningJob, FineTuningMethod, JobStatus, MethodConfig, SupervisedHyperparameters,
};
use crate::llm_client::{CompletionService, LlmClient};
use crate::models::training::ChatMessage;
use crate::state::{resolve_id, IdStore};
use crate::training::jsonl::{load_training_samples, DatasetKind, TrainingSample};

pub const DEFAULT_BASE_MODEL: &str = "gpt-4o-mini-2024-07-18";
const SEED: u64 = 42;
const PROBE_MAX_TOKENS: u32 = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    Supervised,
    Dpo,
}

/// Everything that differs between a supervised and a DPO run.
#[derive(Debug, Clone)]
pub struct FineTunePlan {
    pub method: MethodKind,
    pub training_file: PathBuf,
    pub base_model: String,
    pub suffix: &'static str,
    pub ids_file: PathBuf,
    /// Rows of the training file replayed against the fine-tuned model.
    pub probe_count: usize,
    pub probe_temperature: Option<f32>,
    pub report_prefix: &'static str,
}

impl FineTunePlan {
    pub fn supervised() -> Self {
        Self {
            method: MethodKind::Supervised,
            training_file: PathBuf::from("tests10.jsonl"),
            base_model: DEFAULT_BASE_MODEL.to_string(),
            suffix: "sft",
            ids_file: PathBuf::from("openai_ft_ids.json"),
            probe_count: 3,
            probe_temperature: None,
            report_prefix: "ft_analysis",
        }
    }

    pub fn dpo() -> Self {
        Self {
            method: MethodKind::Dpo,
            training_file: PathBuf::from("dpo_tests.jsonl"),
            base_model: DEFAULT_BASE_MODEL.to_string(),
            suffix: "dpo",
            ids_file: PathBuf::from("openai_dpo_ids.json"),
            probe_count: 5,
            probe_temperature: Some(0.0),
            report_prefix: "dpo_analysis",
        }
    }

    pub fn for_method(method: MethodKind) -> Self {
        match method {
            MethodKind::Supervised => Self::supervised(),
            MethodKind::Dpo => Self::dpo(),
        }
    }

    pub fn label(&self) -> &'static str {
        match self.method {
            MethodKind::Supervised => "supervised",
            MethodKind::Dpo => "DPO",
        }
    }

    fn dataset_kind(&self) -> DatasetKind {
        match self.method {
            MethodKind::Supervised => DatasetKind::Supervised,
            MethodKind::Dpo => DatasetKind::Preference,
        }
    }

    pub fn fine_tuning_method(&self) -> FineTuningMethod {
        match self.method {
            MethodKind::Supervised => FineTuningMethod::Supervised {
                supervised: MethodConfig {
                    hyperparameters: SupervisedHyperparameters { n_epochs: 1 },
                },
            },
            MethodKind::Dpo => FineTuningMethod::Dpo {
                dpo: MethodConfig {
                    hyperparameters: DpoHyperparameters {
                        n_epochs: 1,
                        batch_size: 1,
                        learning_rate_multiplier: 0.3,
                        beta: 0.1,
                    },
                },
            },
        }
    }

    pub fn job_request(&self, training_file_id: &str) -> CreateFineTuningJob {
        CreateFineTuningJob {
            training_file: training_file_id.to_string(),
            model: self.base_model.clone(),
            method: self.fine_tuning_method(),
            seed: Some(SEED),
            suffix: Some(self.suffix.to_string()),
        }
    }

    pub fn id_store(&self) -> IdStore {
        IdStore::new(self.ids_file.clone())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Steps
// ────────────────────────────────────────────────────────────────────────────

pub async fn upload_training_file(client: &LlmClient, plan: &FineTunePlan) -> Result<String, AppError> {
    info!(
        "Uploading {} training file {}...",
        plan.label(),
        plan.training_file.display()
    );
    let file = client
        .upload_file(&plan.training_file, FilePurpose::FineTune)
        .await?;
    info!(
        "File uploaded: id={}, status={}",
        file.id,
        file.status.as_deref().unwrap_or("unknown")
    );
    plan.id_store()
        .update(|ids| ids.file_id = Some(file.id.clone()))?;
    Ok(file.id)
}

pub async fn create_job(
    client: &LlmClient,
    plan: &FineTunePlan,
    file_id: Option<&str>,
) -> Result<FineTuningJob, AppError> {
    let store = plan.id_store();
    let saved = store.load();
    let file_id = resolve_id(file_id, saved.file_id.as_deref(), "file ID", "finetune upload")?;

    info!("Creating {} fine-tuning job from {}...", plan.label(), file_id);
    let job = client.create_fine_tuning_job(&plan.job_request(&file_id)).await?;
    info!(
        "Fine-tuning job created: id={}, model={}, status={}",
        job.id, job.model, job.status
    );
    store.update(|ids| ids.job_id = Some(job.id.clone()))?;
    Ok(job)
}

/// Resolves the job ID from the argument or the IDs file.
pub fn resolve_job_id(plan: &FineTunePlan, job_id: Option<&str>) -> Result<String, AppError> {
    let saved = plan.id_store().load();
    resolve_id(job_id, saved.job_id.as_deref(), "job ID", "finetune create")
}

pub async fn check_status(client: &LlmClient, job_id: &str) -> Result<FineTuningJob, AppError> {
    let job = client.retrieve_fine_tuning_job(job_id).await?;
    log_job(&job);
    Ok(job)
}

fn log_job(job: &FineTuningJob) {
    info!("Job {} status: {}", job.id, job.status);
    if let Some(finished) = job.finished_at {
        info!("Finished at: {}", finished);
    }
    match job.status {
        JobStatus::Succeeded => info!(
            "Fine-tuned model: {}",
            job.fine_tuned_model.as_deref().unwrap_or("<none>")
        ),
        JobStatus::Failed | JobStatus::Cancelled => {
            warn!(
                "Job {}: {}",
                job.status,
                job.error_message().unwrap_or("no error details")
            )
        }
        _ => info!("Job is still in progress"),
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ProbeResult {
    pub input: String,
    pub expected: String,
    /// `None` when the call failed.
    pub prediction: Option<String>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct FineTuneAnalysis {
    pub job_id: String,
    pub method: &'static str,
    pub fine_tuned_model: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub finished_at: Option<i64>,
    pub result_files: Vec<String>,
    pub trained_tokens: Option<u64>,
    pub probes: Vec<ProbeResult>,
    pub correct: usize,
    pub total: usize,
    pub accuracy: f64,
    pub timestamp: String,
}

/// Replays `samples` against `model`; the trimmed reply must equal the
/// expected label exactly. A failed call is logged and counted as wrong.
pub async fn probe_model(
    service: &dyn CompletionService,
    model: &str,
    samples: &[TrainingSample],
    temperature: Option<f32>,
) -> Vec<ProbeResult> {
    let mut results = Vec::with_capacity(samples.len());

    for (idx, sample) in samples.iter().enumerate() {
        let mut request = ChatCompletionRequest::new(
            model,
            vec![
                ChatMessage::system(sample.prompt.as_str()),
                ChatMessage::user(sample.message.as_str()),
            ],
        )
        .max_tokens(PROBE_MAX_TOKENS);
        if let Some(t) = temperature {
            request = request.temperature(t);
        }

        let prediction = match service.complete(&request).await {
            Ok(text) => Some(text.trim().to_string()),
            Err(e) => {
                error!("Probe {} failed: {}", idx + 1, e);
                None
            }
        };
        let is_correct = prediction.as_deref() == Some(sample.expected.as_str());
        info!(
            "Probe {}: expected {}, got {}, correct={}",
            idx + 1,
            sample.expected,
            prediction.as_deref().unwrap_or("<error>"),
            is_correct
        );
        results.push(ProbeResult {
            input: sample.message.clone(),
            expected: sample.expected.clone(),
            prediction,
            is_correct,
        });
    }

    results
}

/// Probes a finished job and writes `<prefix>_<timestamp>.json` into `out_dir`.
///
/// Returns `Ok(None)` when the job has not succeeded or has no model yet.
pub async fn analyze_job(
    service: &dyn CompletionService,
    plan: &FineTunePlan,
    job: &FineTuningJob,
    out_dir: &Path,
) -> Result<Option<(FineTuneAnalysis, PathBuf)>, AppError> {
    if job.status != JobStatus::Succeeded {
        warn!(
            "Job status is '{}', not 'succeeded'; nothing to analyze yet",
            job.status
        );
        return Ok(None);
    }
    let Some(model) = job.fine_tuned_model.as_deref() else {
        warn!("Job {} succeeded but reports no fine-tuned model", job.id);
        return Ok(None);
    };

    for file in &job.result_files {
        info!("Result file: {}", file);
    }

    let samples = load_training_samples(&plan.training_file, plan.dataset_kind(), plan.probe_count)?;
    info!("Testing {} on {} examples...", model, samples.len());
    let probes = probe_model(service, model, &samples, plan.probe_temperature).await;

    let total = probes.len();
    let correct = probes.iter().filter(|p| p.is_correct).count();
    let accuracy = if total > 0 {
        correct as f64 / total as f64
    } else {
        0.0
    };
    println!(
        "Testing accuracy: {}/{} ({:.2}%)",
        correct,
        total,
        accuracy * 100.0
    );

    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let analysis = FineTuneAnalysis {
        job_id: job.id.clone(),
        method: plan.label(),
        fine_tuned_model: model.to_string(),
        status: job.status,
        created_at: job.created_at,
        finished_at: job.finished_at,
        result_files: job.result_files.clone(),
        trained_tokens: job.trained_tokens,
        probes,
        correct,
        total,
        accuracy,
        timestamp: timestamp.clone(),
    };

    let path = out_dir.join(format!("{}_{}.json", plan.report_prefix, timestamp));
    std::fs::write(&path, serde_json::to_string_pretty(&analysis)?)?;
    info!("Analysis results saved to {}", path.display());

    Ok(Some((analysis, path)))
}

pub async fn analyze(
    client: &LlmClient,
    plan: &FineTunePlan,
    job_id: &str,
    out_dir: &Path,
) -> Result<Option<(FineTuneAnalysis, PathBuf)>, AppError> {
    let job = client.retrieve_fine_tuning_job(job_id).await?;
    analyze_job(client, plan, &job, out_dir).await
}

/// upload → create → poll → analyze (only when the job succeeded).
pub async fn run_all(
    client: &LlmClient,
    plan: &FineTunePlan,
    policy: PollPolicy,
    out_dir: &Path,
) -> Result<JobStatus, AppError> {
    info!("Starting complete {} fine-tuning process...", plan.label());

    let file_id = upload_training_file(client, plan).await?;
    let job = create_job(client, plan, Some(&file_id)).await?;

    info!("Monitoring job status. This may take some time...");
    let outcome = poll_until(
        policy,
        || check_status(client, &job.id),
        |current: &FineTuningJob| current.status.is_terminal(),
    )
    .await?;
    let finished = outcome.into_inner();

    if finished.status == JobStatus::Succeeded {
        analyze_job(client, plan, &finished, out_dir).await?;
    } else {
        warn!(
            "Fine-tuning job did not succeed (status: {}); skipping analysis",
            finished.status
        );
    }

    info!("Fine-tuning process completed");
    Ok(finished.status)
}
