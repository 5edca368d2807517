// Synthetic example generation.
// One model call produces hard-to-classify guest messages with their labels;
// the result is saved as a corpus file and optionally tested straight away.

use thiserror::Error;

pub mod generator;
pub mod handlers;
pub mod prompts;

#[derive(Debug, Error)]
pub enum GenerationError {
    #[error("model output contains no parseable JSON list of examples")]
    Unparseable,

    #[error("model output contains no example with a valid intention label")]
    NoUsableExamples,
}
