//! Recovering the predicted intention from free-text model output.

use once_cell::sync::Lazy;
use regex::Regex;

static MARKED_NUMBER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#\s*(\d+)").unwrap());
static BARE_MARKER: Lazy<Regex> = Lazy::new(|| Regex::new(r"#(\d+)").unwrap());

/// Extracts the intention number from a reply such as
/// `"INTENTION: #16 - Request room cleaning"`.
///
/// The first line mentioning `intention:` (any case) that carries a `#`
/// number wins; otherwise the first `#<digits>` anywhere in the text.
pub fn extract_intention(text: &str) -> Option<u32> {
    let from_marked_line = text
        .lines()
        .filter(|line| line.to_ascii_lowercase().contains("intention:"))
        .find_map(|line| capture_number(&MARKED_NUMBER, line));

    from_marked_line.or_else(|| capture_number(&BARE_MARKER, text))
}

fn capture_number(re: &Regex, haystack: &str) -> Option<u32> {
    re.captures(haystack)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

/// `None` never scores as correct.
pub fn is_correct(extracted: Option<u32>, expected: u32) -> bool {
    extracted == Some(expected)
}

/// Leading digits of a label string such as `"16 - Request room cleaning"`.
pub fn leading_number(label: &str) -> Option<u32> {
    let digits: String = label
        .trim()
        .chars()
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}
