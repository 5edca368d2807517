//! Request and response shapes for the OpenAI endpoints this tool uses.
//!
//! Responses are deserialised leniently: only the fields the pipelines read
//! are modelled, and most of them are optional.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::models::training::ChatMessage;

// ────────────────────────────────────────────────────────────────────────────
// Chat completions
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
}

impl ChatCompletionRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            max_tokens: None,
            temperature: None,
            top_p: None,
            frequency_penalty: None,
            presence_penalty: None,
            seed: None,
        }
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn penalties(mut self, frequency: f32, presence: f32) -> Self {
        self.frequency_penalty = Some(frequency);
        self.presence_penalty = Some(presence);
        self
    }
}

#[derive(Debug, Deserialize)]
pub struct ChatCompletion {
    pub choices: Vec<Choice>,
    pub usage: Option<Usage>,
}

#[derive(Debug, Deserialize)]
pub struct Choice {
    pub message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
pub struct ChoiceMessage {
    pub content: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct Usage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
}

impl ChatCompletion {
    /// Text of the first choice.
    pub fn text(&self) -> Option<&str> {
        self.choices
            .first()
            .and_then(|c| c.message.content.as_deref())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Files
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilePurpose {
    FineTune,
    Evals,
}

impl FilePurpose {
    pub fn as_str(&self) -> &'static str {
        match self {
            FilePurpose::FineTune => "fine-tune",
            FilePurpose::Evals => "evals",
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FileObject {
    pub id: String,
    pub filename: Option<String>,
    pub bytes: Option<u64>,
    pub status: Option<String>,
    pub created_at: Option<i64>,
}

// ────────────────────────────────────────────────────────────────────────────
// Fine-tuning jobs
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SupervisedHyperparameters {
    pub n_epochs: u32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DpoHyperparameters {
    pub n_epochs: u32,
    pub batch_size: u32,
    pub learning_rate_multiplier: f64,
    pub beta: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MethodConfig<H> {
    pub hyperparameters: H,
}

/// Serialises as `{"type": "<kind>", "<kind>": {"hyperparameters": {..}}}`.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum FineTuningMethod {
    Supervised {
        supervised: MethodConfig<SupervisedHyperparameters>,
    },
    Dpo {
        dpo: MethodConfig<DpoHyperparameters>,
    },
}

#[derive(Debug, Clone, Serialize)]
pub struct CreateFineTuningJob {
    pub training_file: String,
    pub model: String,
    pub method: FineTuningMethod,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub seed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    ValidatingFiles,
    Queued,
    Running,
    Succeeded,
    Failed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl JobStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Succeeded | JobStatus::Failed | JobStatus::Cancelled
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::ValidatingFiles => "validating_files",
            JobStatus::Queued => "queued",
            JobStatus::Running => "running",
            JobStatus::Succeeded => "succeeded",
            JobStatus::Failed => "failed",
            JobStatus::Cancelled => "cancelled",
            JobStatus::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FineTuningJob {
    pub id: String,
    pub model: String,
    pub status: JobStatus,
    pub created_at: i64,
    pub finished_at: Option<i64>,
    pub fine_tuned_model: Option<String>,
    #[serde(default)]
    pub result_files: Vec<String>,
    pub trained_tokens: Option<u64>,
    pub error: Option<Value>,
}

impl FineTuningJob {
    /// The job's error message; the API sends an all-null error object on success.
    pub fn error_message(&self) -> Option<&str> {
        error_message(self.error.as_ref())
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Evals
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
pub struct EvalObject {
    pub id: String,
    pub name: Option<String>,
    pub created_at: Option<i64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultCounts {
    #[serde(default)]
    pub total: u32,
    #[serde(default)]
    pub passed: u32,
    #[serde(default)]
    pub failed: u32,
    #[serde(default)]
    pub errored: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalRun {
    pub id: String,
    pub eval_id: Option<String>,
    pub status: String,
    pub model: Option<String>,
    pub created_at: Option<i64>,
    pub report_url: Option<String>,
    pub result_counts: Option<ResultCounts>,
    pub error: Option<Value>,
}

impl EvalRun {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status.as_str(),
            "completed" | "failed" | "canceled" | "cancelled"
        )
    }

    pub fn error_message(&self) -> Option<&str> {
        error_message(self.error.as_ref())
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SampleMessage {
    pub role: Option<String>,
    pub content: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalSample {
    #[serde(default)]
    pub output: Vec<SampleMessage>,
    pub error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EvalOutputItem {
    pub id: String,
    #[serde(default)]
    pub datasource_item: Value,
    pub sample: Option<EvalSample>,
    pub status: Option<String>,
}

impl EvalOutputItem {
    pub fn datasource_field(&self, key: &str) -> Option<&str> {
        self.datasource_item.get(key).and_then(|v| v.as_str())
    }

    /// Concatenated text of the sampled model output.
    pub fn output_text(&self) -> String {
        self.sample
            .as_ref()
            .map(|s| {
                s.output
                    .iter()
                    .filter_map(|m| m.content.as_deref())
                    .collect::<Vec<_>>()
                    .join("\n")
            })
            .unwrap_or_default()
    }
}

/// One page of a cursor-paginated list endpoint.
#[derive(Debug, Deserialize)]
pub struct ListPage<T> {
    pub data: Vec<T>,
    #[serde(default)]
    pub has_more: bool,
    pub last_id: Option<String>,
}

fn error_message(error: Option<&Value>) -> Option<&str> {
    error?.get("message")?.as_str().filter(|m| !m.is_empty())
}
