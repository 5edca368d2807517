//! Writes a corpus back out in the literal-list format the loader reads.

use std::fmt::Write;

use crate::corpus::loader::{LABELS_MARKER, MESSAGES_MARKER};
use crate::models::corpus::LabeledCorpus;
use crate::models::intention::intention_name;

/// Renders `corpus` as a corpus source: one quoted message per line, then
/// one `N, # name` label per line.
///
/// Line breaks inside a message are folded to spaces so every element stays
/// on a single line.
pub fn render_corpus_source(corpus: &LabeledCorpus, header: Option<&str>) -> String {
    let mut out = String::new();

    if let Some(header) = header {
        for line in header.lines() {
            let _ = writeln!(out, "# {line}");
        }
        out.push('\n');
    }

    let _ = writeln!(out, "{MESSAGES_MARKER}");
    for message in corpus.messages() {
        let message = message.replace(['\r', '\n'], " ");
        let _ = writeln!(out, "    \"{message}\",");
    }
    out.push_str("]\n\n");

    let _ = writeln!(out, "{LABELS_MARKER}");
    for label in corpus.labels() {
        match intention_name(label) {
            Some(name) => {
                let _ = writeln!(out, "    {label}, # {name}");
            }
            None => {
                let _ = writeln!(out, "    {label},");
            }
        }
    }
    out.push_str("]\n");

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::corpus::loader::{load_corpus, load_labels, load_messages};
    use crate::models::corpus::Example;

    fn corpus(pairs: &[(&str, u8)]) -> LabeledCorpus {
        LabeledCorpus::new(
            pairs
                .iter()
                .map(|(message, label)| Example {
                    message: message.to_string(),
                    label: *label,
                })
                .collect(),
        )
    }

    #[test]
    fn test_render_then_load_round_trip() {
        let original = corpus(&[
            ("We land at dawn and the room won't be ready, will it?", 6),
            ("Room #12 still has last night's trays outside.", 16),
            ("She said \"tomorrow\" but nobody came.", 37),
            ("  leading and trailing spaces  ", 40),
            ("Is there a 'quiet' floor?", 24),
        ]);
        let rendered = render_corpus_source(&original, Some("Generated corpus"));
        let reloaded = load_corpus(&rendered).unwrap();
        assert_eq!(reloaded, original);
    }

    #[test]
    fn test_rendered_lists_have_equal_length() {
        let original = corpus(&[("a", 1), ("b", 2), ("c", 3)]);
        let rendered = render_corpus_source(&original, None);
        assert_eq!(load_messages(&rendered).unwrap().len(), 3);
        assert_eq!(load_labels(&rendered).unwrap(), vec!["1", "2", "3"]);
    }

    #[test]
    fn test_render_annotates_labels_with_names() {
        let rendered = render_corpus_source(&corpus(&[("a", 16)]), None);
        assert!(rendered.contains("    16, # Request room cleaning\n"));
        assert!(rendered.starts_with(MESSAGES_MARKER));
    }

    #[test]
    fn test_render_folds_line_breaks() {
        let rendered = render_corpus_source(&corpus(&[("one\ntwo", 1)]), None);
        let reloaded = load_corpus(&rendered).unwrap();
        assert_eq!(reloaded.get(0).unwrap().message, "one two");
    }

    #[test]
    fn test_empty_corpus_round_trips() {
        let rendered = render_corpus_source(&LabeledCorpus::default(), None);
        assert!(load_corpus(&rendered).unwrap().is_empty());
    }
}
