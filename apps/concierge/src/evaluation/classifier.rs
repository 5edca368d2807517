//! Batch classification of a labeled corpus against a chat model.

use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::Local;
use serde::Serialize;
use tracing::{error, info};

use crate::errors::AppError;
use crate::evaluation::extract::{extract_intention, is_correct};
use crate::evaluation::prompts::reasoning_prompt;
use crate::llm_client::types::ChatCompletionRequest;
use crate::llm_client::CompletionService;
use crate::models::corpus::LabeledCorpus;
use crate::models::intention::describe_intention;
use crate::models::training::ChatMessage;

pub const DEFAULT_TEST_MODEL: &str = "gpt-4o-mini";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClassificationCase {
    pub message: String,
    pub expected: u8,
    /// Why the label is right; only generated corpora carry one.
    pub explanation: Option<String>,
}

impl ClassificationCase {
    pub fn from_corpus(corpus: &LabeledCorpus) -> Vec<Self> {
        corpus
            .examples()
            .iter()
            .map(|e| ClassificationCase {
                message: e.message.clone(),
                expected: e.label,
                explanation: None,
            })
            .collect()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationResult {
    pub message: String,
    pub expected: u8,
    pub explanation: Option<String>,
    pub response: String,
    pub extracted: Option<u32>,
    pub is_correct: bool,
}

#[derive(Debug, Clone, Serialize)]
pub struct ClassificationRun {
    pub model: String,
    pub timestamp: String,
    pub results: Vec<ClassificationResult>,
}

impl ClassificationRun {
    pub fn total(&self) -> usize {
        self.results.len()
    }

    pub fn correct(&self) -> usize {
        self.results.iter().filter(|r| r.is_correct).count()
    }

    pub fn incorrect(&self) -> usize {
        self.total() - self.correct()
    }

    pub fn accuracy(&self) -> f64 {
        if self.results.is_empty() {
            0.0
        } else {
            self.correct() as f64 / self.total() as f64
        }
    }
}

fn classification_request(model: &str, prompt: &str, message: &str) -> ChatCompletionRequest {
    ChatCompletionRequest::new(model, vec![ChatMessage::system(prompt), ChatMessage::user(message)])
        .temperature(0.7)
        .max_tokens(1000)
        .top_p(1.0)
        .penalties(0.0, 0.0)
}

/// Classifies every case in order, one request at a time, pausing `delay`
/// between requests. A failed request is recorded as `Error: ...` and scored
/// wrong; the run always covers every case.
pub async fn classify_all(
    service: &dyn CompletionService,
    model: &str,
    cases: &[ClassificationCase],
    delay: Duration,
) -> ClassificationRun {
    let prompt = reasoning_prompt();
    let timestamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
    let mut results = Vec::with_capacity(cases.len());

    info!("Testing {} with {} messages...", model, cases.len());

    for (i, case) in cases.iter().enumerate() {
        if i > 0 && !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        info!("Processing message {}/{}", i + 1, cases.len());

        let request = classification_request(model, &prompt, &case.message);
        let (response, extracted) = match service.complete(&request).await {
            Ok(text) => {
                let extracted = extract_intention(&text);
                (text, extracted)
            }
            Err(e) => {
                error!("Error testing message {}: {}", i + 1, e);
                (format!("Error: {e}"), None)
            }
        };
        let correct = is_correct(extracted, u32::from(case.expected));
        info!(
            "Expected {}, extracted {:?}, correct={}",
            case.expected, extracted, correct
        );

        results.push(ClassificationResult {
            message: case.message.clone(),
            expected: case.expected,
            explanation: case.explanation.clone(),
            response,
            extracted,
            is_correct: correct,
        });
    }

    ClassificationRun {
        model: model.to_string(),
        timestamp,
        results,
    }
}

pub fn render_report(run: &ClassificationRun) -> String {
    let mut out = format!(
        "Hospitality Chatbot Test Results - {}\nModel: {}\nTotal messages: {}\nCorrect mappings: {}\nIncorrect mappings: {}\nAccuracy: {:.2}%\n\n",
        run.timestamp,
        run.model,
        run.total(),
        run.correct(),
        run.incorrect(),
        run.accuracy() * 100.0
    );

    for (i, r) in run.results.iter().enumerate() {
        out.push_str(&format!("=== Message {} ===\n", i + 1));
        out.push_str(&format!("Message: {}\n", r.message));
        out.push_str(&format!("Correct mapping: {}\n", describe_intention(r.expected)));
        if let Some(explanation) = &r.explanation {
            out.push_str(&format!("Explanation: {explanation}\n"));
        }
        let extracted = r
            .extracted
            .map(|n| n.to_string())
            .unwrap_or_else(|| "None".to_string());
        out.push_str(&format!("Extracted intention: {extracted}\n"));
        out.push_str(&format!("Is correct: {}\n", r.is_correct));
        out.push_str(&format!("Chatbot response:\n{}\n\n", r.response));
    }
    out
}

/// Writes `hospitality_chatbot_test_results_<timestamp>.txt` into `out_dir`.
pub fn write_report(run: &ClassificationRun, out_dir: &Path) -> Result<PathBuf, AppError> {
    let path = out_dir.join(format!(
        "hospitality_chatbot_test_results_{}.txt",
        run.timestamp
    ));
    std::fs::write(&path, render_report(run))?;
    info!("Complete results saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm_client::LlmError;
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// Replies from a script and records every request it receives.
    struct ScriptedModel {
        replies: Mutex<Vec<Result<String, u16>>>,
        seen: Mutex<Vec<ChatCompletionRequest>>,
    }

    impl ScriptedModel {
        fn new(replies: Vec<Result<String, u16>>) -> Self {
            Self {
                replies: Mutex::new(replies),
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl CompletionService for ScriptedModel {
        async fn complete(&self, request: &ChatCompletionRequest) -> Result<String, LlmError> {
            self.seen.lock().unwrap().push(request.clone());
            match self.replies.lock().unwrap().remove(0) {
                Ok(text) => Ok(text),
                Err(status) => Err(LlmError::Api {
                    status,
                    message: "boom".into(),
                }),
            }
        }
    }

    fn cases() -> Vec<ClassificationCase> {
        [(16, "The room is a mess"), (7, "Can we leave later?"), (27, "What is this charge?")]
            .into_iter()
            .map(|(label, msg)| ClassificationCase {
                message: msg.to_string(),
                expected: label,
                explanation: None,
            })
            .collect()
    }

    #[tokio::test(start_paused = true)]
    async fn test_classify_all_continues_after_error() {
        let model = ScriptedModel::new(vec![
            Ok("INTENTION: #16 - Request room cleaning\nThe guest wants cleaning.".into()),
            Err(500),
            Ok("INTENTION: #26 - Ask for invoice or receipt".into()),
        ]);
        let start = tokio::time::Instant::now();

        let run = classify_all(&model, "gpt-4o-mini", &cases(), Duration::from_secs(1)).await;

        assert_eq!(run.total(), 3);
        assert_eq!(run.correct(), 1);
        assert_eq!(run.incorrect(), 2);
        assert!(run.results[1].response.starts_with("Error: "));
        assert_eq!(run.results[1].extracted, None);
        assert_eq!(run.results[2].extracted, Some(26));
        assert_eq!(start.elapsed(), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_classify_request_shape() {
        let model = ScriptedModel::new(vec![Ok("#16".into())]);
        classify_all(&model, "gpt-4o-mini", &cases()[..1], Duration::ZERO).await;

        let seen = model.seen.lock().unwrap();
        let body = serde_json::to_value(&seen[0]).unwrap();
        assert_eq!(body["model"], "gpt-4o-mini");
        assert_eq!(body["max_tokens"], 1000);
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][1]["content"], "The room is a mess");
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("Then explain your reasoning"));
    }

    #[test]
    fn test_render_report_lists_totals_and_details() {
        let run = ClassificationRun {
            model: "m".into(),
            timestamp: "20250101_120000".into(),
            results: vec![ClassificationResult {
                message: "Towels?".into(),
                expected: 17,
                explanation: Some("asks for towels".into()),
                response: "no idea".into(),
                extracted: None,
                is_correct: false,
            }],
        };
        let report = render_report(&run);
        assert!(report.starts_with("Hospitality Chatbot Test Results - 20250101_120000\n"));
        assert!(report.contains("Accuracy: 0.00%"));
        assert!(report.contains("Correct mapping: 17 - Request extra towels, toiletries, or pillows"));
        assert!(report.contains("Explanation: asks for towels"));
        assert!(report.contains("Extracted intention: None"));

        let dir = tempfile::tempdir().unwrap();
        let path = write_report(&run, dir.path()).unwrap();
        assert!(path.ends_with("hospitality_chatbot_test_results_20250101_120000.txt"));
    }

    #[test]
    fn test_empty_run_accuracy_is_zero() {
        let run = ClassificationRun {
            model: "m".into(),
            timestamp: "t".into(),
            results: Vec::new(),
        };
        assert_eq!(run.accuracy(), 0.0);
    }
}
