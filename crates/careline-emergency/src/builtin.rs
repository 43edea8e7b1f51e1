// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Built-in English and Spanish emergency phrases.
//!
//! Loaded into an empty registry at startup so a fresh deployment detects
//! the common cases before an administrator curates the list.

use careline_core::types::{EmergencyPhrase, Severity};

/// (id, phrase, language, severity, category, pattern)
type Seed = (
    &'static str,
    &'static str,
    &'static str,
    Severity,
    &'static str,
    Option<&'static str>,
);

const SEEDS: &[Seed] = &[
    // English
    (
        "builtin-en-heart-attack",
        "heart attack",
        "en",
        Severity::Critical,
        "cardiac",
        Some(r"heart\s+attack|chest\s+pains?"),
    ),
    (
        "builtin-en-cant-breathe",
        "can't breathe",
        "en",
        Severity::Critical,
        "respiratory",
        Some(r"can'?t\s+breathe|cannot\s+breathe|trouble\s+breathing"),
    ),
    (
        "builtin-en-stroke",
        "stroke",
        "en",
        Severity::Critical,
        "neurological",
        None,
    ),
    (
        "builtin-en-fell",
        "i fell",
        "en",
        Severity::High,
        "fall",
        Some(r"i\s+(?:fell|have\s+fallen|fell\s+down)"),
    ),
    (
        "builtin-en-suicide",
        "kill myself",
        "en",
        Severity::Critical,
        "self-harm",
        Some(r"kill\s+myself|end\s+my\s+life|want\s+to\s+die"),
    ),
    (
        "builtin-en-bleeding",
        "bleeding",
        "en",
        Severity::High,
        "injury",
        None,
    ),
    (
        "builtin-en-dizzy",
        "dizzy",
        "en",
        Severity::Medium,
        "symptom",
        Some(r"dizzy|lightheaded"),
    ),
    (
        "builtin-en-help",
        "help me",
        "en",
        Severity::Medium,
        "distress",
        None,
    ),
    (
        "builtin-en-lonely",
        "lonely",
        "en",
        Severity::Low,
        "wellbeing",
        None,
    ),
    // Spanish
    (
        "builtin-es-heart-attack",
        "ataque al corazón",
        "es",
        Severity::Critical,
        "cardiac",
        Some(r"infarto|ataque\s+al\s+coraz[oó]n|dolor\s+de\s+pecho"),
    ),
    (
        "builtin-es-cant-breathe",
        "no puedo respirar",
        "es",
        Severity::Critical,
        "respiratory",
        None,
    ),
    (
        "builtin-es-stroke",
        "derrame cerebral",
        "es",
        Severity::Critical,
        "neurological",
        Some(r"derrame(?:\s+cerebral)?"),
    ),
    (
        "builtin-es-fell",
        "me caí",
        "es",
        Severity::High,
        "fall",
        Some(r"me\s+ca[ií]|me\s+he\s+ca[ií]do"),
    ),
    (
        "builtin-es-suicide",
        "quiero morir",
        "es",
        Severity::Critical,
        "self-harm",
        Some(r"quiero\s+morir(?:me)?|matarme"),
    ),
    (
        "builtin-es-help",
        "ayúdame",
        "es",
        Severity::Medium,
        "distress",
        Some(r"ay[uú]dame|auxilio|socorro"),
    ),
    (
        "builtin-es-dizzy",
        "mareado",
        "es",
        Severity::Medium,
        "symptom",
        Some(r"maread[oa]"),
    ),
];

/// The built-in phrase set, all active.
pub fn builtin_phrases() -> Vec<EmergencyPhrase> {
    SEEDS
        .iter()
        .map(
            |&(id, phrase, language, severity, category, pattern)| EmergencyPhrase {
                id: id.to_string(),
                phrase: phrase.to_string(),
                language: language.to_string(),
                severity,
                category: category.to_string(),
                pattern: pattern.map(str::to_string),
                active: true,
            },
        )
        .collect()
}
