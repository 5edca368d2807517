//! Remote eval pipeline: upload data, define the eval, start a run, poll it,
//! and score the run's outputs locally.

use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::errors::AppError;
use crate::evaluation::extract::extract_intention;
use crate::evaluation::prompts::reasoning_prompt;
use crate::llm_client::poll::{poll_until, PollPolicy};
use crate::llm_client::types::{EvalOutputItem, EvalRun, FilePurpose};
use crate::llm_client::LlmClient;
use crate::state::{resolve_id, IdStore};

pub const IDS_FILE: &str = "openai_eval_ids.json";
pub const DEFAULT_DATA_FILE: &str = "evals.jsonl";
pub const DEFAULT_EVAL_MODEL: &str = "gpt-4o-mini";
const SEED: u64 = 42;

pub fn id_store() -> IdStore {
    IdStore::new(IDS_FILE)
}

/// Eval definition: custom item schema plus one exact-match criterion.
pub fn eval_definition() -> Value {
    json!({
        "name": "Hospitality Intent Classification",
        "metadata": {"usecase": "chatbot"},
        "data_source_config": {
            "type": "custom",
            "item_schema": {
                "type": "object",
                "properties": {
                    "input_text": {"type": "string"},
                    "correct_label": {"type": "string"}
                },
                "required": ["input_text", "correct_label"]
            },
            "include_sample_schema": true
        },
        "testing_criteria": [{
            "type": "string_check",
            "name": "Match output to human label",
            "input": "{{ sample.output_text }}",
            "operation": "eq",
            "reference": "{{ item.correct_label }}"
        }]
    })
}

/// Run definition: completions over the uploaded file with the reasoning prompt.
pub fn run_definition(model: &str, data_id: &str) -> Value {
    json!({
        "name": format!("{model} intent classification"),
        "data_source": {
            "type": "completions",
            "model": model,
            "input_messages": {
                "type": "template",
                "template": [
                    {"role": "developer", "content": reasoning_prompt()},
                    {"role": "user", "content": "{{item.input_text}}"}
                ]
            },
            "sampling_params": {"seed": SEED},
            "source": {"type": "file_id", "id": data_id}
        }
    })
}

// ────────────────────────────────────────────────────────────────────────────
// Steps
// ────────────────────────────────────────────────────────────────────────────

pub async fn upload_data(client: &LlmClient, path: &Path) -> Result<String, AppError> {
    info!("Uploading eval data {}...", path.display());
    let file = client.upload_file(path, FilePurpose::Evals).await?;
    info!(
        "Data uploaded: id={}, status={}",
        file.id,
        file.status.as_deref().unwrap_or("unknown")
    );
    id_store().update(|ids| ids.data_id = Some(file.id.clone()))?;
    Ok(file.id)
}

pub async fn create_eval(client: &LlmClient) -> Result<String, AppError> {
    info!("Creating eval task...");
    let eval = client.create_eval(&eval_definition()).await?;
    info!(
        "Eval created: id={}, name={}",
        eval.id,
        eval.name.as_deref().unwrap_or("")
    );
    id_store().update(|ids| ids.eval_id = Some(eval.id.clone()))?;
    Ok(eval.id)
}

pub async fn create_run(
    client: &LlmClient,
    model: &str,
    eval_id: Option<&str>,
    data_id: Option<&str>,
) -> Result<EvalRun, AppError> {
    let saved = id_store().load();
    let eval_id = resolve_id(eval_id, saved.eval_id.as_deref(), "eval ID", "eval create")?;
    let data_id = resolve_id(data_id, saved.data_id.as_deref(), "data ID", "eval upload")?;

    info!("Creating eval run for eval {} with data {}...", eval_id, data_id);
    let run = client
        .create_eval_run(&eval_id, &run_definition(model, &data_id))
        .await?;
    info!(
        "Eval run created: id={}, model={}, status={}",
        run.id,
        run.model.as_deref().unwrap_or(model),
        run.status
    );
    id_store().update(|ids| ids.run_id = Some(run.id.clone()))?;
    Ok(run)
}

/// Resolved `(eval_id, run_id)` from arguments or the IDs file.
pub fn resolve_run(eval_id: Option<&str>, run_id: Option<&str>) -> Result<(String, String), AppError> {
    let saved = id_store().load();
    Ok((
        resolve_id(eval_id, saved.eval_id.as_deref(), "eval ID", "eval create")?,
        resolve_id(run_id, saved.run_id.as_deref(), "run ID", "eval run")?,
    ))
}

/// Polls the run until it reaches a terminal status or the budget runs out.
pub async fn check_run(
    client: &LlmClient,
    eval_id: &str,
    run_id: &str,
    policy: PollPolicy,
) -> Result<EvalRun, AppError> {
    info!("Checking status for run {}...", run_id);
    let outcome = poll_until(
        policy,
        || async move {
            let run = client.retrieve_eval_run(eval_id, run_id).await?;
            info!("Run status: {}", run.status);
            Ok::<_, AppError>(run)
        },
        EvalRun::is_terminal,
    )
    .await?;

    let finished = outcome.is_finished();
    let run = outcome.into_inner();
    if finished {
        if let Some(counts) = &run.result_counts {
            info!(
                "Result counts: total={}, passed={}, failed={}, errored={}",
                counts.total, counts.passed, counts.failed, counts.errored
            );
        }
        if let Some(url) = &run.report_url {
            info!("Report: {}", url);
        }
        if let Some(message) = run.error_message() {
            warn!("Run error: {}", message);
        }
    } else {
        warn!("Run {} still '{}' after polling; giving up", run.id, run.status);
    }
    Ok(run)
}

// ────────────────────────────────────────────────────────────────────────────
// Analysis
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct EvalRecordResult {
    pub id: String,
    pub input_text: String,
    pub expected_intention: String,
    pub model_response: String,
    pub extracted_intention: Option<u32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct EvalAnalysis {
    pub run_id: String,
    pub total_records: usize,
    pub correct: usize,
    pub incorrect: usize,
    pub accuracy: f64,
    pub records: Vec<EvalRecordResult>,
}

/// Scores output items by the intention extracted from each sampled reply.
pub fn score_output_items(run_id: &str, items: &[EvalOutputItem]) -> EvalAnalysis {
    let records: Vec<EvalRecordResult> = items
        .iter()
        .map(|item| {
            let expected = item
                .datasource_field("correct_label")
                .unwrap_or_default()
                .trim()
                .to_string();
            let response = item.output_text();
            let extracted = extract_intention(&response);
            let is_correct = match (extracted, expected.parse::<u32>()) {
                (Some(got), Ok(want)) => got == want,
                _ => false,
            };
            EvalRecordResult {
                id: item.id.clone(),
                input_text: item
                    .datasource_field("input_text")
                    .unwrap_or_default()
                    .to_string(),
                expected_intention: expected,
                model_response: response,
                extracted_intention: extracted,
                is_correct,
            }
        })
        .collect();

    let total_records = records.len();
    let correct = records.iter().filter(|r| r.is_correct).count();
    EvalAnalysis {
        run_id: run_id.to_string(),
        total_records,
        correct,
        incorrect: total_records - correct,
        accuracy: if total_records > 0 {
            correct as f64 / total_records as f64
        } else {
            0.0
        },
        records,
    }
}

pub fn write_analysis(analysis: &EvalAnalysis, out_dir: &Path) -> Result<PathBuf, AppError> {
    let path = out_dir.join(format!("eval_results_{}.json", analysis.run_id));
    std::fs::write(&path, serde_json::to_string_pretty(analysis)?)?;
    Ok(path)
}

pub async fn analyze_run(
    client: &LlmClient,
    eval_id: &str,
    run_id: &str,
    out_dir: &Path,
) -> Result<EvalAnalysis, AppError> {
    info!("Analyzing results for run {}...", run_id);
    let items = client.list_eval_output_items(eval_id, run_id).await?;
    let analysis = score_output_items(run_id, &items);
    let path = write_analysis(&analysis, out_dir)?;

    println!("Total records: {}", analysis.total_records);
    println!("Correct: {}", analysis.correct);
    println!("Incorrect: {}", analysis.incorrect);
    println!("Accuracy: {:.2}%", analysis.accuracy * 100.0);
    info!("Detailed results saved to {}", path.display());
    Ok(analysis)
}

/// upload → create → run → check → analyze (only when the run completed).
pub async fn run_all(
    client: &LlmClient,
    data_file: &Path,
    model: &str,
    policy: PollPolicy,
    out_dir: &Path,
) -> Result<Option<EvalAnalysis>, AppError> {
    info!("Starting complete evaluation process...");

    let data_id = upload_data(client, data_file).await?;
    let eval_id = create_eval(client).await?;
    let run = create_run(client, model, Some(&eval_id), Some(&data_id)).await?;
    let run = check_run(client, &eval_id, &run.id, policy).await?;

    if run.status != "completed" {
        warn!("Run did not complete successfully (status: {})", run.status);
        return Ok(None);
    }
    analyze_run(client, &eval_id, &run.id, out_dir).await.map(Some)
}
