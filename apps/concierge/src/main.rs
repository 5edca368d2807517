mod config;
mod corpus;
mod errors;
mod evaluation;
mod generation;
mod llm_client;
mod models;
mod state;
mod training;

use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;
use crate::errors::AppError;
use crate::evaluation::classifier::DEFAULT_TEST_MODEL;
use crate::evaluation::handlers::{EvalOptions, EvalStep};
use crate::generation::generator::{DEFAULT_COUNT, DEFAULT_GENERATION_MODEL};
use crate::generation::handlers::GenerateOptions;
use crate::training::finetune::MethodKind;
use crate::training::handlers::{FineTuneOptions, FineTuneStep};
use crate::training::jsonl::DatasetKind;

#[derive(Parser)]
#[command(
    name = "concierge",
    version,
    about = "Dataset, fine-tuning and evaluation toolkit for a hospitality intent classifier"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report candidate messages that already appear in a base corpus
    Duplicates {
        /// Corpus every candidate is compared against
        #[arg(long)]
        base: PathBuf,
        /// Candidate corpus files
        #[arg(required = true)]
        candidates: Vec<PathBuf>,
        /// Also write the report as JSON
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Build a JSONL dataset from a corpus file
    Build {
        #[arg(value_enum)]
        kind: BuildKind,
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long)]
        output: PathBuf,
        /// Seed for distractor selection (dpo only)
        #[arg(long)]
        seed: Option<u64>,
    },
    /// Classify every message of a corpus and write a text report
    Classify {
        #[arg(long)]
        corpus: PathBuf,
        #[arg(long, default_value = DEFAULT_TEST_MODEL)]
        model: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
    },
    /// Generate vague messages, save them as a corpus, and test them
    Generate {
        #[arg(long, default_value_t = DEFAULT_COUNT)]
        count: usize,
        #[arg(long, default_value = DEFAULT_GENERATION_MODEL)]
        model: String,
        /// Model the generated messages are tested against
        #[arg(long, default_value = DEFAULT_TEST_MODEL)]
        test_model: String,
        #[arg(long, default_value = ".")]
        out_dir: PathBuf,
        #[arg(long, default_value_t = false)]
        skip_test: bool,
    },
    /// Fine-tuning pipeline steps
    Finetune {
        #[arg(value_enum)]
        step: FineTuneStepArg,
        #[arg(long, value_enum, default_value_t = MethodArg::Supervised)]
        method: MethodArg,
        /// Training file (default depends on --method)
        #[arg(long)]
        file: Option<PathBuf>,
        /// Base model to fine-tune
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        file_id: Option<String>,
        #[arg(long)]
        job_id: Option<String>,
    },
    /// Remote eval pipeline steps
    Eval {
        #[arg(value_enum)]
        step: EvalStepArg,
        /// Eval data file to upload
        #[arg(long)]
        file: Option<PathBuf>,
        /// Model sampled by the eval run
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        eval_id: Option<String>,
        #[arg(long)]
        data_id: Option<String>,
        #[arg(long)]
        run_id: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum BuildKind {
    Sft,
    Dpo,
    Eval,
}

#[derive(Clone, Copy, PartialEq, Eq, Debug, ValueEnum)]
enum MethodArg {
    Supervised,
    Dpo,
}

#[derive(Clone, Copy, ValueEnum)]
enum FineTuneStepArg {
    Upload,
    Create,
    Status,
    Analyze,
    All,
}

#[derive(Clone, Copy, ValueEnum)]
enum EvalStepArg {
    Upload,
    Create,
    Run,
    Check,
    Analyze,
    All,
}

impl From<BuildKind> for DatasetKind {
    fn from(kind: BuildKind) -> Self {
        match kind {
            BuildKind::Sft => DatasetKind::Supervised,
            BuildKind::Dpo => DatasetKind::Preference,
            BuildKind::Eval => DatasetKind::Eval,
        }
    }
}

impl From<MethodArg> for MethodKind {
    fn from(method: MethodArg) -> Self {
        match method {
            MethodArg::Supervised => MethodKind::Supervised,
            MethodArg::Dpo => MethodKind::Dpo,
        }
    }
}

impl From<FineTuneStepArg> for FineTuneStep {
    fn from(step: FineTuneStepArg) -> Self {
        match step {
            FineTuneStepArg::Upload => FineTuneStep::Upload,
            FineTuneStepArg::Create => FineTuneStep::Create,
            FineTuneStepArg::Status => FineTuneStep::Status,
            FineTuneStepArg::Analyze => FineTuneStep::Analyze,
            FineTuneStepArg::All => FineTuneStep::All,
        }
    }
}

impl From<EvalStepArg> for EvalStep {
    fn from(step: EvalStepArg) -> Self {
        match step {
            EvalStepArg::Upload => EvalStep::Upload,
            EvalStepArg::Create => EvalStep::Create,
            EvalStepArg::Run => EvalStep::Run,
            EvalStepArg::Check => EvalStep::Check,
            EvalStepArg::Analyze => EvalStep::Analyze,
            EvalStepArg::All => EvalStep::All,
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let config = Config::from_env()?;

    // Logs go to stderr; reports go to stdout.
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| {
            EnvFilter::new(format!("{}={}", env!("CARGO_PKG_NAME"), &config.rust_log))
        }))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    info!("Starting concierge v{}", env!("CARGO_PKG_VERSION"));

    if let Err(e) = run(cli.command, &config).await {
        error!(code = e.code(), "{}", e);
        return Err(e.into());
    }
    Ok(())
}

async fn run(command: Commands, config: &Config) -> Result<(), AppError> {
    match command {
        Commands::Duplicates {
            base,
            candidates,
            json,
        } => {
            corpus::handlers::handle_find_duplicates(&base, &candidates, json.as_deref())?;
        }
        Commands::Build {
            kind,
            corpus,
            output,
            seed,
        } => {
            training::handlers::handle_build(kind.into(), &corpus, &output, seed)?;
        }
        Commands::Classify {
            corpus,
            model,
            out_dir,
        } => {
            evaluation::handlers::handle_classify(config, &corpus, &model, &out_dir).await?;
        }
        Commands::Generate {
            count,
            model,
            test_model,
            out_dir,
            skip_test,
        } => {
            let options = GenerateOptions {
                count,
                model,
                test_model,
                out_dir,
                skip_test,
            };
            generation::handlers::handle_generate(config, &options).await?;
        }
        Commands::Finetune {
            step,
            method,
            file,
            model,
            file_id,
            job_id,
        } => {
            let options = FineTuneOptions {
                file,
                model,
                file_id,
                job_id,
            };
            training::handlers::handle_finetune(config, method.into(), step.into(), options)
                .await?;
        }
        Commands::Eval {
            step,
            file,
            model,
            eval_id,
            data_id,
            run_id,
        } => {
            let options = EvalOptions {
                file,
                model,
                eval_id,
                data_id,
                run_id,
            };
            evaluation::handlers::handle_eval(config, step.into(), options).await?;
        }
    }
    Ok(())
}
