//! `concierge build` and `concierge finetune`.

use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::info;

use crate::config::Config;
use crate::corpus::loader::load_corpus_file;
use crate::errors::AppError;
use crate::llm_client::LlmClient;
use crate::training::finetune::{self, FineTunePlan, MethodKind};
use crate::training::jsonl::{build_dataset, DatasetKind};
use crate::training::prompts::number_only_prompt;

/// Writes the JSONL dataset for `kind` built from the corpus at `corpus_path`.
///
/// `seed` makes DPO distractor choice reproducible; without it the thread RNG
/// is used.
pub fn handle_build(
    kind: DatasetKind,
    corpus_path: &Path,
    output: &Path,
    seed: Option<u64>,
) -> Result<usize, AppError> {
    let corpus = load_corpus_file(corpus_path)?;
    let prompt = number_only_prompt();

    let written = match seed {
        Some(seed) => {
            let mut rng = StdRng::seed_from_u64(seed);
            build_dataset(kind, &corpus, &prompt, &mut rng, output)?
        }
        None => build_dataset(kind, &corpus, &prompt, &mut rand::thread_rng(), output)?,
    };

    println!("Created {} with {} samples", output.display(), written);
    Ok(written)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FineTuneStep {
    Upload,
    Create,
    Status,
    Analyze,
    All,
}

/// Per-invocation overrides of a plan's defaults.
#[derive(Debug, Clone, Default)]
pub struct FineTuneOptions {
    pub file: Option<PathBuf>,
    pub model: Option<String>,
    pub file_id: Option<String>,
    pub job_id: Option<String>,
}

pub async fn handle_finetune(
    config: &Config,
    method: MethodKind,
    step: FineTuneStep,
    options: FineTuneOptions,
) -> Result<(), AppError> {
    let client = LlmClient::from_config(config)?;

    let mut plan = FineTunePlan::for_method(method);
    if let Some(file) = options.file {
        plan.training_file = file;
    }
    if let Some(model) = options.model {
        plan.base_model = model;
    }
    let out_dir = Path::new(".");

    match step {
        FineTuneStep::Upload => {
            finetune::upload_training_file(&client, &plan).await?;
        }
        FineTuneStep::Create => {
            finetune::create_job(&client, &plan, options.file_id.as_deref()).await?;
        }
        FineTuneStep::Status => {
            let job_id = finetune::resolve_job_id(&plan, options.job_id.as_deref())?;
            finetune::check_status(&client, &job_id).await?;
        }
        FineTuneStep::Analyze => {
            let job_id = finetune::resolve_job_id(&plan, options.job_id.as_deref())?;
            if finetune::analyze(&client, &plan, &job_id, out_dir).await?.is_none() {
                info!("No analysis written for job {}", job_id);
            }
        }
        FineTuneStep::All => {
            finetune::run_all(&client, &plan, config.fine_tune_poll, out_dir).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const CORPUS: &str = "vague_messages = [\n    \"Towels please\",\n    \"Is the pool open?\",\n]\n\ncorrect_mappings = [\n    17, # towels\n    32\n]\n";

    #[test]
    fn test_handle_build_sft_uses_number_only_prompt() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.py");
        let out = dir.path().join("sft.jsonl");
        std::fs::write(&corpus, CORPUS).unwrap();

        let n = handle_build(DatasetKind::Supervised, &corpus, &out, None).unwrap();
        assert_eq!(n, 2);

        let first: serde_json::Value = serde_json::from_str(
            std::fs::read_to_string(&out).unwrap().lines().next().unwrap(),
        )
        .unwrap();
        let prompt = first["messages"][0]["content"].as_str().unwrap();
        assert!(prompt.contains("Respond with only intention number (e.g., 16)"));
        assert_eq!(first["messages"][2]["content"], "17");
    }

    #[test]
    fn test_handle_build_dpo_seed_is_reproducible() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.py");
        std::fs::write(&corpus, CORPUS).unwrap();
        let a = dir.path().join("a.jsonl");
        let b = dir.path().join("b.jsonl");

        handle_build(DatasetKind::Preference, &corpus, &a, Some(42)).unwrap();
        handle_build(DatasetKind::Preference, &corpus, &b, Some(42)).unwrap();
        assert_eq!(
            std::fs::read_to_string(&a).unwrap(),
            std::fs::read_to_string(&b).unwrap()
        );
    }

    #[test]
    fn test_handle_build_propagates_corpus_errors() {
        let dir = tempfile::tempdir().unwrap();
        let corpus = dir.path().join("corpus.py");
        std::fs::write(&corpus, "vague_messages = [\n    \"one\",\n]\n").unwrap();
        let result = handle_build(DatasetKind::Eval, &corpus, &dir.path().join("e.jsonl"), None);
        assert!(matches!(result, Err(AppError::Corpus(_))));
    }
}
