//! Corpus loader: recovers the message list and the label list from a
//! corpus source without evaluating it.
//!
//! Corpus sources are hand-written or model-generated and are often not
//! syntactically clean (stray quotes, missing commas, trailing comments).
//! Both scans are line-oriented and bounded by text markers: a line that
//! cannot be read is skipped and the scan carries on with the next one.

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info};

use crate::models::corpus::{Example, LabeledCorpus};
use crate::models::intention::is_valid_intention;

/// Introduces the message list.
pub const MESSAGES_MARKER: &str = "vague_messages = [";
/// Introduces the label list. Also the end boundary of the message scan.
pub const LABELS_MARKER: &str = "correct_mappings = [";

#[derive(Debug, Error)]
pub enum CorpusError {
    #[error("could not find expected structure: marker `{marker}` not found")]
    MissingMarker { marker: &'static str },

    #[error("corpus has {messages} messages but {labels} labels")]
    CountMismatch { messages: usize, labels: usize },

    #[error("label at index {index} is not a valid intention: '{value}'")]
    InvalidLabel { index: usize, value: String },

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Recovers the quoted message strings, in file order.
///
/// The body runs from the message marker to the first label marker after
/// it. Each line starting with `"` or `'` is one element; a bare `]` or
/// `],` ends the list early; anything else is skipped.
pub fn load_messages(source: &str) -> Result<Vec<String>, CorpusError> {
    let start = source
        .find(MESSAGES_MARKER)
        .ok_or(CorpusError::MissingMarker {
            marker: MESSAGES_MARKER,
        })?
        + MESSAGES_MARKER.len();
    let len = source[start..]
        .find(LABELS_MARKER)
        .ok_or(CorpusError::MissingMarker {
            marker: LABELS_MARKER,
        })?;
    let body = &source[start..start + len];

    let mut messages = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if is_closing_marker(line) {
            break;
        }
        if let Some(message) = parse_message_line(line) {
            messages.push(message);
        }
    }

    debug!("Recovered {} messages", messages.len());
    Ok(messages)
}

/// Recovers the label digit strings, in file order.
///
/// The body ends at the first `]` followed by a blank line, else the first
/// `]` followed by a newline, else the end of the text. Labels stay text
/// here; `load_corpus` does the integer conversion.
pub fn load_labels(source: &str) -> Result<Vec<String>, CorpusError> {
    let start = source.find(LABELS_MARKER).ok_or(CorpusError::MissingMarker {
        marker: LABELS_MARKER,
    })?;
    let section = &source[start..];
    let end = section
        .find("]\n\n")
        .map(|i| i + 3)
        .or_else(|| section.find("]\n").map(|i| i + 2))
        .unwrap_or(section.len());
    // The marker holds no `]`, so `end` is always past it.
    let body = &section[LABELS_MARKER.len()..end];

    let mut labels = Vec::new();
    for line in body.lines() {
        let line = line.trim();
        if is_closing_marker(line) {
            break;
        }
        let line = strip_comment(line).trim_end();
        if is_closing_marker(line) {
            break;
        }
        if !line.starts_with(|c: char| c.is_ascii_digit()) {
            continue;
        }
        let value = line.split_once(',').map_or(line, |(head, _)| head).trim();
        if !value.is_empty() && value.chars().all(|c| c.is_ascii_digit()) {
            labels.push(value.to_string());
        }
    }

    debug!("Recovered {} labels", labels.len());
    Ok(labels)
}

/// Loads both lists and pairs them up.
///
/// Rejects sources whose lists differ in length instead of truncating to
/// the shorter one, and labels outside `1..=40`.
pub fn load_corpus(source: &str) -> Result<LabeledCorpus, CorpusError> {
    let messages = load_messages(source)?;
    let labels = load_labels(source)?;

    if messages.len() != labels.len() {
        return Err(CorpusError::CountMismatch {
            messages: messages.len(),
            labels: labels.len(),
        });
    }

    let examples = messages
        .into_iter()
        .zip(labels)
        .enumerate()
        .map(|(index, (message, raw))| {
            let label = raw
                .parse::<u8>()
                .ok()
                .filter(|l| is_valid_intention(*l))
                .ok_or_else(|| CorpusError::InvalidLabel {
                    index,
                    value: raw.clone(),
                })?;
            Ok(Example { message, label })
        })
        .collect::<Result<Vec<_>, CorpusError>>()?;

    Ok(LabeledCorpus::new(examples))
}

/// Reads and loads a corpus file.
pub fn load_corpus_file(path: &Path) -> Result<LabeledCorpus, CorpusError> {
    let source = std::fs::read_to_string(path).map_err(|source| CorpusError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let corpus = load_corpus(&source)?;
    info!("Loaded {} examples from {}", corpus.len(), path.display());
    Ok(corpus)
}

fn is_closing_marker(line: &str) -> bool {
    line == "]" || line == "],"
}

fn strip_comment(line: &str) -> &str {
    line.split_once('#').map_or(line, |(head, _)| head)
}

/// Reads one message element from a trimmed line.
///
/// A properly closed string (optionally followed by `,` and/or a `#`
/// comment) yields the text between the quotes. Anything else that starts
/// with a quote is kept literally, minus one trailing `,` and the quote
/// characters at either end.
fn parse_message_line(line: &str) -> Option<String> {
    let quote = line.chars().next().filter(|c| *c == '"' || *c == '\'')?;
    let inner = &line[quote.len_utf8()..];

    if let Some(end) = inner.rfind(quote) {
        let rest = inner[end + quote.len_utf8()..].trim_start();
        let rest = rest.strip_prefix(',').unwrap_or(rest).trim_start();
        if rest.is_empty() || rest.starts_with('#') {
            return Some(inner[..end].to_string());
        }
    }

    let literal = line.strip_suffix(',').unwrap_or(line);
    Some(literal.trim_matches(|c: char| c == '"' || c == '\'').to_string())
}
