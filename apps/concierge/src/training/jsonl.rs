//! JSONL row builders for fine-tuning and eval uploads.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rand::Rng;
use serde::Serialize;
use tracing::info;

use crate::errors::AppError;
use crate::models::corpus::{Example, LabeledCorpus};
use crate::models::training::{
    ChatMessage, EvalItem, EvalItemRecord, PreferenceInput, PreferenceRecord, SupervisedRecord,
};
use crate::training::distractor::select_distractor;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DatasetKind {
    Supervised,
    Preference,
    Eval,
}

pub fn supervised_record(prompt: &str, example: &Example) -> SupervisedRecord {
    SupervisedRecord {
        messages: vec![
            ChatMessage::developer(prompt),
            ChatMessage::user(example.message.as_str()),
            ChatMessage::assistant(example.label.to_string()),
        ],
    }
}

pub fn preference_record<R: Rng + ?Sized>(
    prompt: &str,
    example: &Example,
    rng: &mut R,
) -> PreferenceRecord {
    let distractor = select_distractor(example.label, rng);
    PreferenceRecord {
        input: PreferenceInput {
            messages: vec![
                ChatMessage::developer(prompt),
                ChatMessage::user(example.message.as_str()),
            ],
        },
        preferred_output: vec![ChatMessage::assistant(example.label.to_string())],
        non_preferred_output: vec![ChatMessage::assistant(distractor.to_string())],
    }
}

pub fn eval_item_record(example: &Example) -> EvalItemRecord {
    EvalItemRecord {
        item: EvalItem {
            input_text: example.message.clone(),
            correct_label: example.label.to_string(),
        },
    }
}

/// Writes one compact JSON object per line. Returns the row count.
pub fn write_jsonl<T: Serialize>(path: &Path, rows: &[T]) -> Result<usize, AppError> {
    let mut writer = BufWriter::new(File::create(path)?);
    for row in rows {
        serde_json::to_writer(&mut writer, row)?;
        writer.write_all(b"\n")?;
    }
    writer.flush()?;
    Ok(rows.len())
}

/// Builds the rows for `kind` from `corpus` and writes them to `path`.
pub fn build_dataset<R: Rng + ?Sized>(
    kind: DatasetKind,
    corpus: &LabeledCorpus,
    prompt: &str,
    rng: &mut R,
    path: &Path,
) -> Result<usize, AppError> {
    let examples = corpus.examples();
    let written = match kind {
        DatasetKind::Supervised => {
            let rows: Vec<_> = examples
                .iter()
                .map(|e| supervised_record(prompt, e))
                .collect();
            write_jsonl(path, &rows)?
        }
        DatasetKind::Preference => {
            let rows: Vec<_> = examples
                .iter()
                .map(|e| preference_record(prompt, e, rng))
                .collect();
            write_jsonl(path, &rows)?
        }
        DatasetKind::Eval => {
            let rows: Vec<_> = examples.iter().map(eval_item_record).collect();
            write_jsonl(path, &rows)?
        }
    };
    info!("Wrote {} {:?} rows to {}", written, kind, path.display());
    Ok(written)
}

/// One dataset row reduced to what post-training analysis needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrainingSample {
    pub prompt: String,
    pub message: String,
    pub expected: String,
}

/// Reads up to `limit` samples back from a supervised or preference file.
/// Blank lines are skipped; a row without the expected shape is an error.
pub fn load_training_samples(
    path: &Path,
    kind: DatasetKind,
    limit: usize,
) -> Result<Vec<TrainingSample>, AppError> {
    let reader = BufReader::new(File::open(path)?);
    let mut samples = Vec::new();

    for (line_no, line) in reader.lines().enumerate() {
        if samples.len() >= limit {
            break;
        }
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let sample = match kind {
            DatasetKind::Supervised => {
                let record: SupervisedRecord = serde_json::from_str(&line)?;
                match record.messages.as_slice() {
                    [prompt, message, expected, ..] => TrainingSample {
                        prompt: prompt.content.clone(),
                        message: message.content.clone(),
                        expected: expected.content.clone(),
                    },
                    _ => return Err(malformed(path, line_no)),
                }
            }
            DatasetKind::Preference => {
                let record: PreferenceRecord = serde_json::from_str(&line)?;
                match (
                    record.input.messages.as_slice(),
                    record.preferred_output.first(),
                ) {
                    ([prompt, message, ..], Some(expected)) => TrainingSample {
                        prompt: prompt.content.clone(),
                        message: message.content.clone(),
                        expected: expected.content.clone(),
                    },
                    _ => return Err(malformed(path, line_no)),
                }
            }
            DatasetKind::Eval => {
                return Err(AppError::Validation(
                    "eval item files carry no prompt to replay".to_string(),
                ))
            }
        };
        samples.push(sample);
    }

    Ok(samples)
}

fn malformed(path: &Path, line_no: usize) -> AppError {
    AppError::Validation(format!(
        "{} line {}: unexpected record shape",
        path.display(),
        line_no + 1
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::{json, Value};

    fn corpus() -> LabeledCorpus {
        LabeledCorpus::new(vec![
            Example {
                message: "The room hasn't been touched".into(),
                label: 16,
            },
            Example {
                message: "Can we stay past noon?".into(),
                label: 7,
            },
        ])
    }

    fn read_lines(path: &Path) -> Vec<Value> {
        std::fs::read_to_string(path)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect()
    }

    #[test]
    fn test_supervised_record_shape() {
        let record = supervised_record("P", &corpus().examples()[0]);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"messages": [
                {"role": "developer", "content": "P"},
                {"role": "user", "content": "The room hasn't been touched"},
                {"role": "assistant", "content": "16"}
            ]})
        );
    }

    #[test]
    fn test_preference_record_shape() {
        let mut rng = StdRng::seed_from_u64(42);
        let record = preference_record("P", &corpus().examples()[0], &mut rng);
        let value = serde_json::to_value(&record).unwrap();

        assert_eq!(value["input"]["messages"][0]["role"], "developer");
        assert_eq!(value["input"]["messages"][1]["content"], "The room hasn't been touched");
        assert_eq!(value["preferred_output"][0], json!({"role": "assistant", "content": "16"}));
        let rejected = value["non_preferred_output"][0]["content"].as_str().unwrap();
        assert!(rejected == "17" || rejected == "18");
    }

    #[test]
    fn test_eval_item_shape() {
        let record = eval_item_record(&corpus().examples()[1]);
        assert_eq!(
            serde_json::to_value(&record).unwrap(),
            json!({"item": {"input_text": "Can we stay past noon?", "correct_label": "7"}})
        );
    }

    #[test]
    fn test_build_dataset_writes_one_line_per_example() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dpo.jsonl");
        let mut rng = StdRng::seed_from_u64(1);

        let n = build_dataset(DatasetKind::Preference, &corpus(), "P", &mut rng, &path).unwrap();
        assert_eq!(n, 2);

        let raw = std::fs::read_to_string(&path).unwrap();
        assert_eq!(raw.lines().count(), 2);
        assert!(raw.ends_with('\n'));
        assert_eq!(read_lines(&path)[1]["preferred_output"][0]["content"], "7");
    }

    #[test]
    fn test_load_training_samples_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let sft = dir.path().join("sft.jsonl");
        let dpo = dir.path().join("dpo.jsonl");
        let mut rng = StdRng::seed_from_u64(3);
        build_dataset(DatasetKind::Supervised, &corpus(), "P", &mut rng, &sft).unwrap();
        build_dataset(DatasetKind::Preference, &corpus(), "P", &mut rng, &dpo).unwrap();

        let samples = load_training_samples(&sft, DatasetKind::Supervised, 1).unwrap();
        assert_eq!(
            samples,
            vec![TrainingSample {
                prompt: "P".into(),
                message: "The room hasn't been touched".into(),
                expected: "16".into(),
            }]
        );

        let samples = load_training_samples(&dpo, DatasetKind::Preference, 10).unwrap();
        assert_eq!(samples.len(), 2);
        assert_eq!(samples[1].expected, "7");
    }

    #[test]
    fn test_load_training_samples_rejects_short_rows() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.jsonl");
        std::fs::write(&path, "{\"messages\": [{\"role\": \"user\", \"content\": \"hi\"}]}\n").unwrap();
        assert!(matches!(
            load_training_samples(&path, DatasetKind::Supervised, 3),
            Err(AppError::Validation(_))
        ));
    }
}
