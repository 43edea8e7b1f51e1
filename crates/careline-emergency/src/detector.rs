// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-utterance emergency detection.
//!
//! The detector performs no I/O. It keeps one [`CompiledSet`] per registry
//! version behind an [`ArcSwapOption`]; the first call after a registry
//! write recompiles, every other call is a lock-free load.

use std::cmp::Ordering;
use std::sync::Arc;

use arc_swap::ArcSwapOption;
use careline_core::types::Severity;
use serde::Serialize;
use tracing::debug;

use crate::compiled::{CompiledPhrase, CompiledSet, normalize_language};
use crate::registry::PhraseRegistry;

/// Outcome of [`EmergencyDetector::detect`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DetectionResult {
    pub is_emergency: bool,
    pub severity: Option<Severity>,
    pub category: Option<String>,
    pub phrase: Option<String>,
    pub phrase_id: Option<String>,
    pub language: String,
}

impl DetectionResult {
    fn none(language: &str) -> Self {
        Self {
            is_emergency: false,
            severity: None,
            category: None,
            phrase: None,
            phrase_id: None,
            language: normalize_language(language),
        }
    }
}

/// One matching phrase, as returned by [`EmergencyDetector::get_all_matches`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PhraseMatch {
    pub phrase_id: String,
    pub phrase: String,
    pub severity: Severity,
    pub category: String,
    pub language: String,
    /// The span of the utterance that matched.
    pub matched_text: String,
}

pub struct EmergencyDetector {
    registry: Arc<PhraseRegistry>,
    cache: ArcSwapOption<CompiledSet>,
}

impl EmergencyDetector {
    pub fn new(registry: Arc<PhraseRegistry>) -> Self {
        Self {
            registry,
            cache: ArcSwapOption::empty(),
        }
    }

    pub fn registry(&self) -> &Arc<PhraseRegistry> {
        &self.registry
    }

    /// Classify one utterance.
    ///
    /// Only phrases registered for exactly `language` are considered. The
    /// highest severity wins; ties go to the longer phrase, then to the
    /// lexicographically smaller one. Unknown languages are not an error.
    pub fn detect(&self, text: &str, language: &str) -> DetectionResult {
        let compiled = self.compiled();
        let best = compiled
            .for_language(language)
            .iter()
            .filter(|c| c.regex.is_match(text))
            .min_by(|a, b| rank(a, b));

        match best {
            Some(hit) => {
                let phrase = &hit.phrase;
                careline_prometheus::record_emergency(
                    &phrase.severity.to_string(),
                    &normalize_language(language),
                );
                DetectionResult {
                    is_emergency: true,
                    severity: Some(phrase.severity),
                    category: Some(phrase.category.clone()),
                    phrase: Some(phrase.phrase.clone()),
                    phrase_id: Some(phrase.id.clone()),
                    language: normalize_language(language),
                }
            }
            None => DetectionResult::none(language),
        }
    }

    /// Every matching phrase, most severe first, using the same ordering as
    /// [`detect`](Self::detect).
    pub fn get_all_matches(&self, text: &str, language: &str) -> Vec<PhraseMatch> {
        let compiled = self.compiled();
        let mut hits: Vec<(&CompiledPhrase, String)> = compiled
            .for_language(language)
            .iter()
            .filter_map(|c| c.regex.find(text).map(|m| (c, m.as_str().to_string())))
            .collect();
        hits.sort_by(|(a, _), (b, _)| rank(a, b));

        hits.into_iter()
            .map(|(c, matched_text)| PhraseMatch {
                phrase_id: c.phrase.id.clone(),
                phrase: c.phrase.phrase.clone(),
                severity: c.phrase.severity,
                category: c.phrase.category.clone(),
                language: normalize_language(&c.phrase.language),
                matched_text,
            })
            .collect()
    }

    /// Compiled phrases for the current registry version, rebuilding if stale.
    fn compiled(&self) -> Arc<CompiledSet> {
        let version = self.registry.version();
        if let Some(cached) = self.cache.load_full() {
            if cached.version == version {
                return cached;
            }
        }

        let snapshot = self.registry.snapshot();
        let compiled = Arc::new(CompiledSet::build(snapshot.version, &snapshot.phrases));
        debug!(
            version = snapshot.version,
            phrases = compiled.len(),
            "compiled emergency phrase cache"
        );
        self.cache.store(Some(Arc::clone(&compiled)));
        compiled
    }
}

/// Ascending order puts the preferred match first.
fn rank(a: &CompiledPhrase, b: &CompiledPhrase) -> Ordering {
    b.phrase
        .severity
        .cmp(&a.phrase.severity)
        .then_with(|| {
            b.phrase
                .phrase
                .chars()
                .count()
                .cmp(&a.phrase.phrase.chars().count())
        })
        .then_with(|| a.phrase.phrase.cmp(&b.phrase.phrase))
        .then_with(|| a.phrase.id.cmp(&b.phrase.id))
}
