// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Compiled, language-partitioned view of one registry version.

use std::collections::HashMap;

use careline_core::types::EmergencyPhrase;
use regex::Regex;
use tracing::warn;

/// Wrap a phrase's pattern (or its escaped text) as a case-insensitive,
/// word-boundary-anchored regex.
///
/// Half boundaries only require a non-word character *outside* the match,
/// so phrases that begin or end in punctuation still anchor correctly.
pub fn compile_pattern(phrase: &EmergencyPhrase) -> Result<Regex, regex::Error> {
    let body = match phrase.pattern.as_deref().map(str::trim) {
        Some(pattern) if !pattern.is_empty() => pattern.to_string(),
        _ => regex::escape(phrase.phrase.trim()),
    };
    Regex::new(&format!(r"(?i)\b{{start-half}}(?:{body})\b{{end-half}}"))
}

/// Canonical language key: trimmed, ASCII-lowercased.
pub fn normalize_language(language: &str) -> String {
    language.trim().to_ascii_lowercase()
}

#[derive(Debug)]
pub struct CompiledPhrase {
    pub phrase: EmergencyPhrase,
    pub regex: Regex,
}

/// Active phrases of one registry version, grouped by language.
#[derive(Debug)]
pub struct CompiledSet {
    pub version: u64,
    by_language: HashMap<String, Vec<CompiledPhrase>>,
}

impl CompiledSet {
    /// Compile every active phrase. Entries whose pattern fails to compile
    /// are skipped with a warning.
    pub fn build(version: u64, phrases: &[EmergencyPhrase]) -> Self {
        let mut by_language: HashMap<String, Vec<CompiledPhrase>> = HashMap::new();
        for phrase in phrases.iter().filter(|p| p.active) {
            match compile_pattern(phrase) {
                Ok(regex) => by_language
                    .entry(normalize_language(&phrase.language))
                    .or_default()
                    .push(CompiledPhrase {
                        phrase: phrase.clone(),
                        regex,
                    }),
                Err(e) => {
                    warn!(phrase_id = %phrase.id, error = %e, "skipping emergency phrase with invalid pattern");
                }
            }
        }
        Self {
            version,
            by_language,
        }
    }

    /// Candidates for a language. Unknown languages yield an empty slice.
    pub fn for_language(&self, language: &str) -> &[CompiledPhrase] {
        self.by_language
            .get(&normalize_language(language))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn len(&self) -> usize {
        self.by_language.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::types::Severity;
    use proptest::prelude::*;

    fn phrase(id: &str, text: &str, language: &str, pattern: Option<&str>) -> EmergencyPhrase {
        EmergencyPhrase {
            id: id.into(),
            phrase: text.into(),
            language: language.into(),
            severity: Severity::High,
            category: "test".into(),
            pattern: pattern.map(Into::into),
            active: true,
        }
    }

    #[test]
    fn literal_phrase_is_escaped_and_anchored() {
        let re = compile_pattern(&phrase("p", "help (now)", "en", None)).unwrap();
        assert!(re.is_match("please HELP (NOW)"));
        assert!(!re.is_match("help now"));
    }

    #[test]
    fn word_boundaries_prevent_substring_hits() {
        let re = compile_pattern(&phrase("p", "fell", "en", None)).unwrap();
        assert!(re.is_match("I fell yesterday"));
        assert!(!re.is_match("he was feeling fellowship"));
    }

    #[test]
    fn alternation_is_grouped_inside_boundaries() {
        let re = compile_pattern(&phrase("p", "x", "es", Some("infarto|ataque"))).unwrap();
        assert!(re.is_match("un infarto"));
        assert!(!re.is_match("infartos"));
    }

    #[test]
    fn invalid_pattern_errors() {
        assert!(compile_pattern(&phrase("p", "x", "en", Some("(unclosed"))).is_err());
    }

    #[test]
    fn blank_pattern_falls_back_to_phrase_text() {
        let re = compile_pattern(&phrase("p", "stroke", "en", Some("  "))).unwrap();
        assert!(re.is_match("a stroke"));
    }

    #[test]
    fn build_partitions_and_skips_inactive_and_invalid() {
        let mut inactive = phrase("c", "chest", "en", None);
        inactive.active = false;
        let set = CompiledSet::build(
            3,
            &[
                phrase("a", "fell", "EN", None),
                phrase("b", "caí", "es", None),
                inactive,
                phrase("d", "bad", "en", Some("(")),
            ],
        );
        assert_eq!(set.version, 3);
        assert_eq!(set.len(), 2);
        assert_eq!(set.for_language(" en ").len(), 1);
        assert_eq!(set.for_language("es").len(), 1);
        assert!(set.for_language("fr").is_empty());
    }

    proptest! {
        #[test]
        fn literal_phrase_matches_between_words(
            before in "[a-z]{1,8}",
            word in "[a-z]{3,10}",
            after in "[a-z]{1,8}",
        ) {
            let re = compile_pattern(&phrase("p", &word, "en", None)).unwrap();
            let text = format!("{before} {} {after}", word.to_uppercase());
            prop_assert!(re.is_match(&text));
            let glued = format!("{before}{word}{after}");
            prop_assert!(!re.is_match(&glued));
        }

        #[test]
        fn language_lookup_ignores_case_and_padding(language in "[a-zA-Z]{2,3}") {
            let set = CompiledSet::build(1, &[phrase("p", "help", &language, None)]);
            let padded = format!("  {} ", language.to_ascii_uppercase());
            prop_assert_eq!(set.for_language(&padded).len(), 1);
            prop_assert_eq!(set.for_language(&language.to_ascii_lowercase()).len(), 1);
        }
    }
}
