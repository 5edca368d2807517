//! `concierge duplicates`: cross-file duplicate report.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{error, info};

use crate::corpus::dedup::{find_duplicates_across, DuplicateReport};
use crate::corpus::loader::load_corpus_file;
use crate::errors::AppError;
use crate::models::corpus::LabeledCorpus;
use crate::models::intention::describe_intention;

// ────────────────────────────────────────────────────────────────────────────
// Report types
// ────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
pub struct DuplicateSummary {
    pub base: String,
    pub base_len: usize,
    pub total_duplicates: usize,
    pub label_conflicts: usize,
    pub reports: Vec<DuplicateReport>,
}

impl DuplicateSummary {
    fn new(base: String, base_len: usize, reports: Vec<DuplicateReport>) -> Self {
        Self {
            total_duplicates: reports.iter().map(|r| r.duplicates.len()).sum(),
            label_conflicts: reports.iter().map(DuplicateReport::label_conflicts).sum(),
            base,
            base_len,
            reports,
        }
    }
}

// ────────────────────────────────────────────────────────────────────────────
// Handler
// ────────────────────────────────────────────────────────────────────────────

/// Compares every candidate file against `base` and prints the listing.
///
/// All files are loaded before any comparison; one unreadable file aborts
/// the whole run.
pub fn handle_find_duplicates(
    base: &Path,
    candidates: &[PathBuf],
    json_out: Option<&Path>,
) -> Result<DuplicateSummary, AppError> {
    if candidates.is_empty() {
        return Err(AppError::Validation(
            "at least one candidate file is required".to_string(),
        ));
    }

    let base_corpus = load_logged(base)?;
    let mut loaded: Vec<(String, LabeledCorpus)> = Vec::with_capacity(candidates.len());
    for path in candidates {
        let corpus = load_logged(path)?;
        loaded.push((path.display().to_string(), corpus));
    }

    let reports = find_duplicates_across(
        &base_corpus,
        loaded.iter().map(|(name, corpus)| (name.as_str(), corpus)),
    );
    let summary = DuplicateSummary::new(base.display().to_string(), base_corpus.len(), reports);

    print!("{}", render_listing(&summary));

    if let Some(out) = json_out {
        std::fs::write(out, serde_json::to_string_pretty(&summary)?)?;
        info!("Duplicate report written to {}", out.display());
    }

    Ok(summary)
}

fn load_logged(path: &Path) -> Result<LabeledCorpus, AppError> {
    load_corpus_file(path).map_err(|e| {
        error!("Failed to load {}: {}", path.display(), e);
        AppError::from(e)
    })
}

/// Human-readable listing, grouped per candidate file.
pub fn render_listing(summary: &DuplicateSummary) -> String {
    let mut out = String::new();
    let rule = "=".repeat(80);

    out.push_str(&format!(
        "Base file: {} ({} messages)\n",
        summary.base, summary.base_len
    ));

    for report in &summary.reports {
        out.push_str(&format!(
            "\n{}\nDuplicates in {} ({} of {} messages)\n{}\n",
            rule,
            report.candidate,
            report.duplicates.len(),
            report.candidate_len,
            "-".repeat(50)
        ));
        for dup in &report.duplicates {
            out.push_str(&format!("  Index in {}: {}\n", report.candidate, dup.source_index));
            out.push_str(&format!("  Index in {}: {}\n", summary.base, dup.base_index));
            out.push_str(&format!("  Message: \"{}\"\n", dup.message));
            out.push_str(&format!(
                "  Label in {}: {}\n",
                report.candidate,
                describe_intention(dup.source_label)
            ));
            out.push_str(&format!(
                "  Label in {}: {}\n",
                summary.base,
                describe_intention(dup.base_label)
            ));
            out.push_str(&format!(
                "  Labels agree: {}\n\n",
                if dup.labels_agree() { "yes" } else { "NO" }
            ));
        }
    }

    out.push_str(&format!(
        "\n{}\nSummary: {} duplicate(s) across {} file(s), {} with conflicting labels\n",
        rule,
        summary.total_duplicates,
        summary.reports.len(),
        summary.label_conflicts
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn corpus_file(dir: &Path, name: &str, messages: &[&str], labels: &[u8]) -> PathBuf {
        let path = dir.join(name);
        let mut f = std::fs::File::create(&path).unwrap();
        writeln!(f, "vague_messages = [").unwrap();
        for m in messages {
            writeln!(f, "    \"{m}\",").unwrap();
        }
        writeln!(f, "]\n\ncorrect_mappings = [").unwrap();
        for l in labels {
            writeln!(f, "    {l},").unwrap();
        }
        writeln!(f, "]").unwrap();
        path
    }

    #[test]
    fn test_handle_find_duplicates_reports_and_writes_json() {
        let dir = tempfile::tempdir().unwrap();
        let base = corpus_file(dir.path(), "base.py", &["a", "b", "c"], &[1, 2, 3]);
        let cand = corpus_file(dir.path(), "cand.py", &["c", "x", "a"], &[3, 9, 4]);
        let out = dir.path().join("dups.json");

        let summary = handle_find_duplicates(&base, &[cand], Some(&out)).unwrap();
        assert_eq!(summary.total_duplicates, 2);
        assert_eq!(summary.label_conflicts, 1);

        let json: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&out).unwrap()).unwrap();
        assert_eq!(json["total_duplicates"], 2);
        assert_eq!(json["reports"][0]["duplicates"][1]["base_index"], 0);
    }

    #[test]
    fn test_handle_find_duplicates_aborts_on_bad_candidate() {
        let dir = tempfile::tempdir().unwrap();
        let base = corpus_file(dir.path(), "base.py", &["a"], &[1]);
        let good = corpus_file(dir.path(), "good.py", &["a"], &[1]);
        let bad = dir.path().join("bad.py");
        std::fs::write(&bad, "nothing to see here\n").unwrap();
        let out = dir.path().join("dups.json");

        let result = handle_find_duplicates(&base, &[good, bad], Some(&out));
        assert!(matches!(result, Err(AppError::Corpus(_))));
        assert!(!out.exists());
    }

    #[test]
    fn test_render_listing_flags_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let base = corpus_file(dir.path(), "base.py", &["same"], &[16]);
        let cand = corpus_file(dir.path(), "cand.py", &["same"], &[17]);

        let summary = handle_find_duplicates(&base, &[cand], None).unwrap();
        let listing = render_listing(&summary);
        assert!(listing.contains("16 - Request room cleaning"));
        assert!(listing.contains("Labels agree: NO"));
        assert!(listing.contains("1 with conflicting labels"));
    }

    #[test]
    fn test_requires_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let base = corpus_file(dir.path(), "base.py", &["a"], &[1]);
        assert!(matches!(
            handle_find_duplicates(&base, &[], None),
            Err(AppError::Validation(_))
        ));
    }
}
