//! `concierge classify` and `concierge eval`.

use std::path::{Path, PathBuf};

use tracing::info;

use crate::config::Config;
use crate::corpus::loader::load_corpus_file;
use crate::errors::AppError;
use crate::evaluation::classifier::{classify_all, write_report, ClassificationCase};
use crate::evaluation::remote;
use crate::llm_client::LlmClient;

/// Classifies every example of a corpus file and writes the text report.
pub async fn handle_classify(
    config: &Config,
    corpus_path: &Path,
    model: &str,
    out_dir: &Path,
) -> Result<PathBuf, AppError> {
    let client = LlmClient::from_config(config)?;
    let corpus = load_corpus_file(corpus_path)?;
    let cases = ClassificationCase::from_corpus(&corpus);

    let run = classify_all(&client, model, &cases, config.request_delay).await;
    let path = write_report(&run, out_dir)?;

    println!(
        "Accuracy: {:.2}% ({}/{})",
        run.accuracy() * 100.0,
        run.correct(),
        run.total()
    );
    println!("Complete results saved to {}", path.display());
    Ok(path)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvalStep {
    Upload,
    Create,
    Run,
    Check,
    Analyze,
    All,
}

#[derive(Debug, Clone, Default)]
pub struct EvalOptions {
    pub file: Option<PathBuf>,
    pub model: Option<String>,
    pub eval_id: Option<String>,
    pub data_id: Option<String>,
    pub run_id: Option<String>,
}

pub async fn handle_eval(config: &Config, step: EvalStep, options: EvalOptions) -> Result<(), AppError> {
    let client = LlmClient::from_config(config)?;
    let data_file = options
        .file
        .unwrap_or_else(|| PathBuf::from(remote::DEFAULT_DATA_FILE));
    let model = options
        .model
        .unwrap_or_else(|| remote::DEFAULT_EVAL_MODEL.to_string());
    let out_dir = Path::new(".");

    match step {
        EvalStep::Upload => {
            remote::upload_data(&client, &data_file).await?;
        }
        EvalStep::Create => {
            remote::create_eval(&client).await?;
        }
        EvalStep::Run => {
            remote::create_run(
                &client,
                &model,
                options.eval_id.as_deref(),
                options.data_id.as_deref(),
            )
            .await?;
        }
        EvalStep::Check => {
            let (eval_id, run_id) =
                remote::resolve_run(options.eval_id.as_deref(), options.run_id.as_deref())?;
            let run = remote::check_run(&client, &eval_id, &run_id, config.eval_poll).await?;
            println!("Run {} status: {}", run.id, run.status);
        }
        EvalStep::Analyze => {
            let (eval_id, run_id) =
                remote::resolve_run(options.eval_id.as_deref(), options.run_id.as_deref())?;
            remote::analyze_run(&client, &eval_id, &run_id, out_dir).await?;
        }
        EvalStep::All => {
            if remote::run_all(&client, &data_file, &model, config.eval_poll, out_dir)
                .await?
                .is_none()
            {
                info!("Evaluation finished without analysis");
            }
        }
    }

    Ok(())
}
