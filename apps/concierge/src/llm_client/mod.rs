//! OpenAI client. Every remote call in the crate goes through `LlmClient`:
//! chat completions, file uploads, fine-tuning jobs and eval runs.
//! Batch and analysis code depends on `CompletionService` instead, so it can
//! run against a test double.

use std::path::Path;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{multipart, Client, RequestBuilder};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{debug, warn};

use crate::config::Config;
use crate::errors::AppError;

pub mod poll;
pub mod prompts;
pub mod types;

use types::{
    ChatCompletion, ChatCompletionRequest, CreateFineTuningJob, EvalObject, EvalOutputItem,
    EvalRun, FileObject, FilePurpose, FineTuningJob, ListPage,
};

const MAX_RETRIES: u32 = 3;
/// Fixed pause between retries of a failed call.
const RETRY_DELAY: Duration = Duration::from_secs(1);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);
const OUTPUT_ITEMS_PAGE_SIZE: u32 = 100;

#[derive(Debug, Error)]
pub enum LlmError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Rate limited after {retries} retries")]
    RateLimited { retries: u32 },

    #[error("LLM returned empty content")]
    EmptyContent,

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Deserialize)]
struct ApiError {
    error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    message: String,
}

/// Anything that can answer a chat completion.
///
/// The batch runners and analysis steps take this instead of `LlmClient`
/// so they can be driven without a network.
#[async_trait]
pub trait CompletionService: Send + Sync {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, LlmError>;
}

/// The single API client used by every subcommand.
/// Wraps the OpenAI REST API with bearer auth and bounded fixed-delay retries.
#[derive(Clone)]
pub struct LlmClient {
    client: Client,
    api_key: String,
    api_base: String,
}

impl LlmClient {
    pub fn new(api_key: String, api_base: impl Into<String>) -> Result<Self, LlmError> {
        let client = Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            client,
            api_key,
            api_base: api_base.into(),
        })
    }

    /// Builds the client from configuration. A missing API key is fatal.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let api_key = config
            .openai_api_key
            .clone()
            .ok_or(AppError::MissingCredential("OPENAI_API_KEY"))?;
        Ok(Self::new(api_key, config.openai_api_base.clone())?)
    }

    fn url(&self, path: &str) -> String {
        join_url(&self.api_base, path)
    }

    /// Sends a request built by `build`, retrying transport errors, 429 and
    /// 5xx responses up to `MAX_RETRIES` times with a fixed delay.
    ///
    /// `build` runs once per attempt because multipart bodies cannot be cloned.
    async fn send<T, F>(&self, build: F) -> Result<T, LlmError>
    where
        T: DeserializeOwned,
        F: Fn() -> Result<RequestBuilder, LlmError>,
    {
        let mut last_error: Option<LlmError> = None;

        for attempt in 0..MAX_RETRIES {
            if attempt > 0 {
                warn!(
                    "API call attempt {} failed, retrying after {}ms...",
                    attempt,
                    RETRY_DELAY.as_millis()
                );
                tokio::time::sleep(RETRY_DELAY).await;
            }

            let response = build()?.bearer_auth(&self.api_key).send().await;

            let response = match response {
                Ok(r) => r,
                Err(e) => {
                    last_error = Some(LlmError::Http(e));
                    continue;
                }
            };

            let status = response.status();

            if status.as_u16() == 429 || status.is_server_error() {
                let body = response.text().await.unwrap_or_default();
                warn!("API returned {}: {}", status, body);
                last_error = Some(LlmError::Api {
                    status: status.as_u16(),
                    message: body,
                });
                continue;
            }

            let body = response.text().await?;

            if !status.is_success() {
                return Err(LlmError::Api {
                    status: status.as_u16(),
                    message: api_error_message(body),
                });
            }

            return serde_json::from_str(&body).map_err(LlmError::Parse);
        }

        Err(last_error.unwrap_or(LlmError::RateLimited {
            retries: MAX_RETRIES,
        }))
    }

    async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, LlmError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = self.url(path);
        self.send(|| Ok(self.client.post(&url).json(body))).await
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, String)],
    ) -> Result<T, LlmError> {
        let url = self.url(path);
        self.send(|| Ok(self.client.get(&url).query(query))).await
    }

    pub async fn chat_completion(
        &self,
        request: &ChatCompletionRequest,
    ) -> Result<ChatCompletion, LlmError> {
        let completion: ChatCompletion = self.post_json("chat/completions", request).await?;
        if let Some(usage) = &completion.usage {
            debug!(
                "Completion succeeded: prompt_tokens={}, completion_tokens={}",
                usage.prompt_tokens, usage.completion_tokens
            );
        }
        Ok(completion)
    }

    /// Uploads a local file (multipart) for the given purpose.
    pub async fn upload_file(
        &self,
        path: &Path,
        purpose: FilePurpose,
    ) -> Result<FileObject, LlmError> {
        let bytes = tokio::fs::read(path).await?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload.jsonl".to_string());
        let url = self.url("files");

        self.send(|| {
            let part = multipart::Part::bytes(bytes.clone())
                .file_name(file_name.clone())
                .mime_str("application/jsonl")?;
            let form = multipart::Form::new()
                .text("purpose", purpose.as_str())
                .part("file", part);
            Ok(self.client.post(&url).multipart(form))
        })
        .await
    }

    pub async fn create_fine_tuning_job(
        &self,
        request: &CreateFineTuningJob,
    ) -> Result<FineTuningJob, LlmError> {
        self.post_json("fine_tuning/jobs", request).await
    }

    pub async fn retrieve_fine_tuning_job(&self, job_id: &str) -> Result<FineTuningJob, LlmError> {
        self.get_json(&format!("fine_tuning/jobs/{job_id}"), &[])
            .await
    }

    pub async fn create_eval(&self, definition: &Value) -> Result<EvalObject, LlmError> {
        self.post_json("evals", definition).await
    }

    pub async fn create_eval_run(&self, eval_id: &str, run: &Value) -> Result<EvalRun, LlmError> {
        self.post_json(&format!("evals/{eval_id}/runs"), run).await
    }

    pub async fn retrieve_eval_run(&self, eval_id: &str, run_id: &str) -> Result<EvalRun, LlmError> {
        self.get_json(&format!("evals/{eval_id}/runs/{run_id}"), &[])
            .await
    }

    /// Fetches every output item of a run, following the `after` cursor.
    pub async fn list_eval_output_items(
        &self,
        eval_id: &str,
        run_id: &str,
    ) -> Result<Vec<EvalOutputItem>, LlmError> {
        let path = format!("evals/{eval_id}/runs/{run_id}/output_items");
        let mut items = Vec::new();
        let mut after: Option<String> = None;

        loop {
            let mut query = vec![("limit", OUTPUT_ITEMS_PAGE_SIZE.to_string())];
            if let Some(cursor) = &after {
                query.push(("after", cursor.clone()));
            }

            let page: ListPage<EvalOutputItem> = self.get_json(&path, &query).await?;
            let next = page
                .last_id
                .clone()
                .or_else(|| page.data.last().map(|item| item.id.clone()));
            let has_more = page.has_more && !page.data.is_empty();
            items.extend(page.data);

            match next {
                Some(cursor) if has_more => after = Some(cursor),
                _ => break,
            }
        }

        debug!("Fetched {} output items for run {}", items.len(), run_id);
        Ok(items)
    }
}

#[async_trait]
impl CompletionService for LlmClient {
    async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, LlmError> {
        let completion = self.chat_completion(request).await?;
        completion
            .text()
            .map(str::to_string)
            .ok_or(LlmError::EmptyContent)
    }
}

fn join_url(base: &str, path: &str) -> String {
    format!(
        "{}/{}",
        base.trim_end_matches('/'),
        path.trim_start_matches('/')
    )
}

/// Pulls `error.message` out of an API error body, falling back to the raw body.
fn api_error_message(body: String) -> String {
    serde_json::from_str::<ApiError>(&body)
        .map(|e| e.error.message)
        .unwrap_or(body)
}

/// Strips ```json ... ``` or ``` ... ``` code fences from LLM output.
pub fn strip_json_fences(text: &str) -> &str {
    let text = text.trim();
    if let Some(stripped) = text.strip_prefix("```json") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else if let Some(stripped) = text.strip_prefix("```") {
        stripped
            .trim_start()
            .strip_suffix("```")
            .map(|s| s.trim())
            .unwrap_or(stripped.trim_start())
    } else {
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_json_fences_with_json_tag() {
        let input = "```json\n[{\"message\": \"hi\"}]\n```";
        assert_eq!(strip_json_fences(input), "[{\"message\": \"hi\"}]");
    }

    #[test]
    fn test_strip_json_fences_without_tag() {
        let input = "```\n[1, 2]\n```";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_strip_json_fences_no_fences() {
        let input = "[1, 2]";
        assert_eq!(strip_json_fences(input), "[1, 2]");
    }

    #[test]
    fn test_join_url_normalises_slashes() {
        assert_eq!(
            join_url("https://api.openai.com/v1/", "/files"),
            "https://api.openai.com/v1/files"
        );
        assert_eq!(
            join_url("http://localhost:8080/v1", "evals/e1/runs"),
            "http://localhost:8080/v1/evals/e1/runs"
        );
    }

    #[test]
    fn test_api_error_message_prefers_structured_body() {
        let body = r#"{"error": {"message": "Invalid file format", "type": "invalid_request_error"}}"#;
        assert_eq!(api_error_message(body.to_string()), "Invalid file format");
        assert_eq!(api_error_message("Bad Gateway".to_string()), "Bad Gateway");
    }

    #[test]
    fn test_from_config_requires_api_key() {
        let config = Config {
            openai_api_key: None,
            openai_api_base: crate::config::DEFAULT_API_BASE.to_string(),
            rust_log: "info".to_string(),
            request_delay: Duration::from_millis(0),
            fine_tune_poll: poll::PollPolicy {
                interval: Duration::from_secs(1),
                max_attempts: 1,
            },
            eval_poll: poll::PollPolicy {
                interval: Duration::from_secs(1),
                max_attempts: 1,
            },
        };
        assert!(matches!(
            LlmClient::from_config(&config),
            Err(AppError::MissingCredential("OPENAI_API_KEY"))
        ));
    }
}
