use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::models::corpus::{DuplicateRecord, LabeledCorpus};

/// Duplicates found in one candidate corpus.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DuplicateReport {
    pub candidate: String,
    pub candidate_len: usize,
    pub duplicates: Vec<DuplicateRecord>,
}

impl DuplicateReport {
    /// Duplicates whose two labels disagree.
    pub fn label_conflicts(&self) -> usize {
        self.duplicates.iter().filter(|d| !d.labels_agree()).count()
    }
}

/// Reports every candidate message that also appears, verbatim, in `base`.
///
/// Each candidate message is matched to the lowest base index holding the
/// same text. Output follows candidate order. Neither corpus is modified,
/// and repeats inside the candidate itself are not reported.
pub fn find_duplicates(base: &LabeledCorpus, candidate: &LabeledCorpus) -> Vec<DuplicateRecord> {
    let mut first_index: HashMap<&str, usize> = HashMap::with_capacity(base.len());
    for (index, message) in base.messages().enumerate() {
        first_index.entry(message).or_insert(index);
    }

    candidate
        .examples()
        .iter()
        .enumerate()
        .filter_map(|(source_index, example)| {
            let base_index = *first_index.get(example.message.as_str())?;
            let base_example = base.get(base_index)?;
            Some(DuplicateRecord {
                source_index,
                base_index,
                message: example.message.clone(),
                source_label: example.label,
                base_label: base_example.label,
            })
        })
        .collect()
}

/// Runs `find_duplicates` for each named candidate against the same base.
pub fn find_duplicates_across<'a, I>(base: &LabeledCorpus, candidates: I) -> Vec<DuplicateReport>
where
    I: IntoIterator<Item = (&'a str, &'a LabeledCorpus)>,
{
    candidates
        .into_iter()
        .map(|(name, candidate)| DuplicateReport {
            candidate: name.to_string(),
            candidate_len: candidate.len(),
            duplicates: find_duplicates(base, candidate),
        })
        .collect()
}
