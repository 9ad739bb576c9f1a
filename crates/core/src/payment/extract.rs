use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;

pub const MIN_IDENTIFIER_DIGITS: usize = 5;

/// ASCII digit runs bounded by Unicode word boundaries, so a run glued to letters in any
/// script or to `_` is not a token.
static IDENTIFIER_PATTERN: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[0-9]{5,}\b").expect("identifier pattern compiles"));

/// Returns every standalone run of at least [`MIN_IDENTIFIER_DIGITS`] ASCII digits,
/// deduplicated in first-occurrence order.
///
/// A run only counts when it is a whole token: the characters on either side must
/// not be letters, digits or `_`, so `abc123456` and `123456xyz` yield nothing.
pub fn extract_identifiers(text: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    IDENTIFIER_PATTERN
        .find_iter(text)
        .map(|found| found.as_str())
        .filter(|run| seen.insert(*run))
        .map(str::to_owned)
        .collect()
}

/// True when the whole input, once trimmed, is a single identifier token.
pub fn is_identifier_token(text: &str) -> bool {
    let candidate = text.trim();
    candidate.len() >= MIN_IDENTIFIER_DIGITS && candidate.bytes().all(|byte| byte.is_ascii_digit())
}

#[cfg(test)]
mod tests {
    use super::{extract_identifiers, is_identifier_token};

    #[test]
    fn extracts_ids_from_invite_log_lines() {
        let text = "6486714430 Got Invited By Your Url: +3 Rs\n7944746107 Got Invited By Your Url: +3 Rs";

        assert_eq!(extract_identifiers(text), vec!["6486714430", "7944746107"]);
    }

    #[test]
    fn short_and_embedded_runs_are_excluded() {
        assert_eq!(extract_identifiers("abc123 12345"), vec!["12345"]);
        assert!(extract_identifiers("abc123456 123456xyz id_987654").is_empty());
        assert!(extract_identifiers("1234 +3 Rs").is_empty());
    }

    #[test]
    fn duplicates_collapse_to_first_occurrence_order() {
        assert_eq!(extract_identifiers("222222\n111111\n222222\n333333\n111111"), vec![
            "222222", "111111", "333333"
        ]);
    }

    #[test]
    fn punctuation_bounds_count_as_token_edges() {
        assert_eq!(
            extract_identifiers("(12345), id:67890; user-55555."),
            vec!["12345", "67890", "55555"]
        );
    }

    #[test]
    fn non_ascii_neighbours_are_handled() {
        assert_eq!(extract_identifiers("👤 12345 → 67890"), vec!["12345", "67890"]);
        assert!(extract_identifiers("é12345").is_empty());
        assert!(extract_identifiers("१२३४५ 12345६").is_empty());
    }

    #[test]
    fn extraction_is_deterministic() {
        let text = "x 99999 y 88888 z 99999 12";
        assert_eq!(extract_identifiers(text), extract_identifiers(text));
    }

    #[test]
    fn empty_or_digitless_text_yields_nothing() {
        assert!(extract_identifiers("").is_empty());
        assert!(extract_identifiers("no numbers here").is_empty());
    }

    #[test]
    fn identifier_token_requires_only_digits_and_minimum_length() {
        assert!(is_identifier_token(" 1234567890 "));
        assert!(!is_identifier_token("1234"));
        assert!(!is_identifier_token("12345a"));
        assert!(!is_identifier_token("+12345"));
    }
}
