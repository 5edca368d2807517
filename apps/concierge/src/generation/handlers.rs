//! `concierge generate`: generate, save, and optionally test a fresh corpus.

use std::path::PathBuf;

use chrono::Local;
use tracing::info;

use crate::config::Config;
use crate::errors::AppError;
use crate::evaluation::classifier::{classify_all, write_report};
use crate::generation::generator::{generate_cases, write_corpus_file};
use crate::llm_client::LlmClient;

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    pub count: usize,
    pub model: String,
    pub test_model: String,
    pub out_dir: PathBuf,
    pub skip_test: bool,
}

/// Paths written by one `generate` run.
#[derive(Debug, Clone)]
pub struct GenerateOutput {
    pub corpus: PathBuf,
    pub report: Option<PathBuf>,
}

pub async fn handle_generate(config: &Config, options: &GenerateOptions) -> Result<GenerateOutput, AppError> {
    if options.count == 0 {
        return Err(AppError::Validation("--count must be at least 1".to_string()));
    }
    let client = LlmClient::from_config(config)?;
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();

    let cases = generate_cases(&client, &options.model, options.count).await?;
    let corpus = write_corpus_file(&cases, &options.out_dir, &timestamp)?;
    println!("Messages and mappings saved to {}", corpus.display());

    if options.skip_test {
        info!("Skipping classification test");
        return Ok(GenerateOutput { corpus, report: None });
    }

    let run = classify_all(&client, &options.test_model, &cases, config.request_delay).await;
    let report = write_report(&run, &options.out_dir)?;
    println!("Accuracy: {:.2}%", run.accuracy() * 100.0);
    println!("Complete results saved to {}", report.display());

    Ok(GenerateOutput {
        corpus,
        report: Some(report),
    })
}

