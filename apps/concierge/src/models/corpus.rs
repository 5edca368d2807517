use serde::{Deserialize, Serialize};

/// One labeled guest message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Example {
    pub message: String,
    /// Intention id in `1..=40`.
    pub label: u8,
}

/// Messages and labels recovered from a single source, in file order.
///
/// Only constructed by the corpus loader (or from already-paired examples),
/// so `messages().len() == labels().len()` always holds.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabeledCorpus {
    examples: Vec<Example>,
}

impl LabeledCorpus {
    pub fn new(examples: Vec<Example>) -> Self {
        Self { examples }
    }

    pub fn examples(&self) -> &[Example] {
        &self.examples
    }

    pub fn len(&self) -> usize {
        self.examples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.examples.is_empty()
    }

    pub fn get(&self, index: usize) -> Option<&Example> {
        self.examples.get(index)
    }

    pub fn messages(&self) -> impl Iterator<Item = &str> {
        self.examples.iter().map(|e| e.message.as_str())
    }

    pub fn labels(&self) -> impl Iterator<Item = u8> + '_ {
        self.examples.iter().map(|e| e.label)
    }
}

/// A candidate message that is verbatim identical to a base message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DuplicateRecord {
    /// Index in the candidate corpus.
    pub source_index: usize,
    /// First index in the base corpus holding the same message.
    pub base_index: usize,
    pub message: String,
    pub source_label: u8,
    pub base_label: u8,
}

impl DuplicateRecord {
    pub fn labels_agree(&self) -> bool {
        self.source_label == self.base_label
    }
}
