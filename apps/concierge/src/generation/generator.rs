//! Synthetic example generation: request, tolerant parsing, corpus output.

use std::path::{Path, PathBuf};

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use tracing::{info, warn};

use crate::corpus::render::render_corpus_source;
use crate::errors::AppError;
use crate::evaluation::classifier::ClassificationCase;
use crate::evaluation::extract::leading_number;
use crate::generation::prompts::{generation_system_prompt, generation_user_prompt};
use crate::generation::GenerationError;
use crate::llm_client::types::ChatCompletionRequest;
use crate::llm_client::{strip_json_fences, CompletionService};
use crate::models::corpus::{Example, LabeledCorpus};
use crate::models::intention::is_valid_intention;
use crate::models::training::ChatMessage;

pub const DEFAULT_GENERATION_MODEL: &str = "gpt-4.1";
pub const DEFAULT_COUNT: usize = 20;

static JSON_OBJECT: Lazy<Regex> = Lazy::new(|| Regex::new(r"(?s)\{.*?\}").unwrap());

// ────────────────────────────────────────────────────────────────────────────
// Data models
// ────────────────────────────────────────────────────────────────────────────

/// The label as the model wrote it: `16` or `"16 - Request room cleaning"`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Mapping {
    Number(u64),
    Text(String),
}

impl Mapping {
    /// Intention id, if the mapping names one in `1..=40`.
    pub fn label(&self) -> Option<u8> {
        let n = match self {
            Mapping::Number(n) => *n,
            Mapping::Text(text) => u64::from(leading_number(text)?),
        };
        u8::try_from(n).ok().filter(|&id| is_valid_intention(id))
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct GeneratedExample {
    pub message: String,
    pub correct_mapping: Mapping,
    #[serde(default)]
    pub explanation: Option<String>,
}

// ────────────────────────────────────────────────────────────────────────────
// Parsing
// ────────────────────────────────────────────────────────────────────────────

/// Parses the model's reply into examples.
///
/// Tries, in order: the span from the first `[` to the last `]` as one JSON
/// list, then every `{...}` object found in the text.
pub fn parse_generated(text: &str) -> Result<Vec<GeneratedExample>, GenerationError> {
    let text = strip_json_fences(text);

    if let (Some(start), Some(end)) = (text.find('['), text.rfind(']')) {
        if start < end {
            match serde_json::from_str::<Vec<GeneratedExample>>(&text[start..=end]) {
                Ok(examples) => return Ok(examples),
                Err(e) => warn!("Bracketed span is not a valid example list: {}", e),
            }
        }
    }

    let objects: Vec<&str> = JSON_OBJECT.find_iter(text).map(|m| m.as_str()).collect();
    if objects.is_empty() {
        return Err(GenerationError::Unparseable);
    }
    serde_json::from_str(&format!("[{}]", objects.join(",")))
        .map_err(|_| GenerationError::Unparseable)
}

/// Keeps examples with a valid label; the rest are logged and dropped.
pub fn into_cases(examples: Vec<GeneratedExample>) -> Vec<ClassificationCase> {
    examples
        .into_iter()
        .enumerate()
        .filter_map(|(i, example)| match example.correct_mapping.label() {
            Some(expected) => Some(ClassificationCase {
                message: example.message,
                expected,
                explanation: example.explanation,
            }),
            None => {
                warn!(
                    "Skipping generated example {}: no valid intention in {:?}",
                    i + 1,
                    example.correct_mapping
                );
                None
            }
        })
        .collect()
}

pub fn cases_to_corpus(cases: &[ClassificationCase]) -> LabeledCorpus {
    LabeledCorpus::new(
        cases
            .iter()
            .map(|c| Example {
                message: c.message.clone(),
                label: c.expected,
            })
            .collect(),
    )
}

// ────────────────────────────────────────────────────────────────────────────
// Generation
// ────────────────────────────────────────────────────────────────────────────

pub fn generation_request(model: &str, count: usize) -> ChatCompletionRequest {
    ChatCompletionRequest::new(
        model,
        vec![
            ChatMessage::system(generation_system_prompt()),
            ChatMessage::user(generation_user_prompt(count)),
        ],
    )
    .temperature(0.9)
    .max_tokens(3000)
    .top_p(1.0)
    .penalties(0.2, 0.2)
}

/// Asks `model` for `count` examples and returns the usable ones.
pub async fn generate_cases(
    service: &dyn CompletionService,
    model: &str,
    count: usize,
) -> Result<Vec<ClassificationCase>, AppError> {
    info!("Generating {} vague messages with {}...", count, model);
    let reply = service.complete(&generation_request(model, count)).await?;

    let examples = parse_generated(&reply)?;
    let cases = into_cases(examples);
    if cases.is_empty() {
        return Err(GenerationError::NoUsableExamples.into());
    }
    if cases.len() != count {
        warn!("Asked for {} messages, got {} usable", count, cases.len());
    }
    info!("Generated {} messages", cases.len());
    Ok(cases)
}

/// Writes the cases as `vague_messages_<timestamp>.py` in the corpus format.
pub fn write_corpus_file(
    cases: &[ClassificationCase],
    out_dir: &Path,
    timestamp: &str,
) -> Result<PathBuf, AppError> {
    let path = out_dir.join(format!("vague_messages_{timestamp}.py"));
    let source = render_corpus_source(
        &cases_to_corpus(cases),
        Some("Generated vague messages and their correct mappings"),
    );
    std::fs::write(&path, source)?;
    info!("Messages and mappings saved to {}", path.display());
    Ok(path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::load_corpus_file;
    use crate::llm_client::LlmError;
    use async_trait::async_trait;

    struct FixedReply(&'static str);

    #[async_trait]
    impl CompletionService for FixedReply {
        async fn complete(&self, _request: &ChatCompletionRequest) -> Result<String, LlmError> {
            Ok(self.0.to_string())
        }
    }

    const LIST: &str = r#"Here you go:
[
  {"message": "The bed looks like nobody came by today", "correct_mapping": "16 - Request room cleaning", "explanation": "housekeeping"},
  {"message": "Our flight leaves in the evening", "correct_mapping": 7, "explanation": "late checkout"}
]
Hope this helps!"#;

    #[test]
    fn test_parse_bracketed_list() {
        let examples = parse_generated(LIST).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[0].correct_mapping.label(), Some(16));
        assert_eq!(examples[1].correct_mapping, Mapping::Number(7));
    }

    #[test]
    fn test_parse_fenced_list() {
        let fenced = "```json\n[{\"message\": \"m\", \"correct_mapping\": \"3 - Modify reservation\"}]\n```";
        let examples = parse_generated(fenced).unwrap();
        assert_eq!(examples[0].explanation, None);
        assert_eq!(examples[0].correct_mapping.label(), Some(3));
    }

    #[test]
    fn test_parse_falls_back_to_objects() {
        let loose = r#"1. {"message": "a", "correct_mapping": "12 - Book a table at a restaurant"}
2. {"message": "b", "correct_mapping": "27 - Query charges on the bill"}"#;
        let examples = parse_generated(loose).unwrap();
        assert_eq!(examples.len(), 2);
        assert_eq!(examples[1].message, "b");
    }

    #[test]
    fn test_parse_garbage_is_unparseable() {
        assert!(matches!(
            parse_generated("Sorry, I can't help with that."),
            Err(GenerationError::Unparseable)
        ));
    }

    #[test]
    fn test_into_cases_skips_invalid_labels() {
        let examples = vec![
            GeneratedExample {
                message: "ok".into(),
                correct_mapping: Mapping::Text("39 - Request human support".into()),
                explanation: None,
            },
            GeneratedExample {
                message: "bad".into(),
                correct_mapping: Mapping::Number(41),
                explanation: None,
            },
            GeneratedExample {
                message: "worse".into(),
                correct_mapping: Mapping::Text("Request room cleaning".into()),
                explanation: None,
            },
        ];
        let cases = into_cases(examples);
        assert_eq!(cases.len(), 1);
        assert_eq!(cases[0].expected, 39);
    }

    #[test]
    fn test_generation_request_parameters() {
        let body = serde_json::to_value(generation_request("gpt-4.1", 20)).unwrap();
        assert_eq!(body["max_tokens"], 3000);
        assert_eq!(body["top_p"], 1.0);
        assert!((body["temperature"].as_f64().unwrap() - 0.9).abs() < 1e-6);
        assert!(body["messages"][1]["content"]
            .as_str()
            .unwrap()
            .starts_with("Generate 20 challenging"));
        assert!(body["messages"][0]["content"]
            .as_str()
            .unwrap()
            .contains("40. Ask for help using the chatbot"));
    }

    #[tokio::test]
    async fn test_generated_corpus_loads_back() {
        let cases = generate_cases(&FixedReply(LIST), "gpt-4.1", 2).await.unwrap();
        let dir = tempfile::tempdir().unwrap();
        let path = write_corpus_file(&cases, dir.path(), "20250101_000000").unwrap();
        assert!(path.ends_with("vague_messages_20250101_000000.py"));

        let corpus = load_corpus_file(&path).unwrap();
        assert_eq!(corpus, cases_to_corpus(&cases));
        assert_eq!(corpus.labels().collect::<Vec<_>>(), vec![16, 7]);
    }

    #[tokio::test]
    async fn test_generate_cases_rejects_empty_output() {
        let reply = FixedReply(r#"[{"message": "x", "correct_mapping": "none"}]"#);
        let result = generate_cases(&reply, "gpt-4.1", 1).await;
        assert!(matches!(
            result,
            Err(AppError::Generation(GenerationError::NoUsableExamples))
        ));
    }
}
