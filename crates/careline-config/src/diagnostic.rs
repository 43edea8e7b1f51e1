// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration diagnostics.
//!
//! Figment errors are mapped onto [`ConfigError`] variants that know the
//! `careline.toml` layout: a misspelled section or key gets a suggestion
//! from the sections and fields the model actually accepts, together with
//! the `CARELINE_<SECTION>_<KEY>` variable that sets the same value.

#![allow(unused_assignments)] // miette's Diagnostic derive generates code triggering this lint

use figment::Source;
use figment::error::Kind;
use miette::{Diagnostic, NamedSource, SourceSpan};
use thiserror::Error;

use crate::loader::ENV_SECTIONS;

/// Source name used for configuration supplied as a string.
pub const INLINE_SOURCE: &str = "<inline>";

/// Jaro-Winkler score a candidate must beat to be suggested.
const SIMILARITY_FLOOR: f64 = 0.75;

#[derive(Debug, Error, Diagnostic)]
pub enum ConfigError {
    /// A top-level table that is not a careline section.
    #[error("unknown configuration section `[{name}]`")]
    #[diagnostic(
        code(careline::config::unknown_section),
        help("{}", unknown_section_help(suggestion.as_deref()))
    )]
    UnknownSection {
        name: String,
        suggestion: Option<String>,
        #[label("not a careline section")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A key its section does not accept.
    #[error("unknown key `{key}` in `[{section}]`")]
    #[diagnostic(
        code(careline::config::unknown_key),
        help("{}", unknown_key_help(section, suggestion.as_deref(), valid_keys))
    )]
    UnknownKey {
        section: String,
        key: String,
        suggestion: Option<String>,
        /// Comma-separated keys the section accepts.
        valid_keys: String,
        #[label("this key is not recognized")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// A value of the wrong type, from a file or from the environment.
    #[error("`{key}` has the wrong type: found {found}")]
    #[diagnostic(
        code(careline::config::invalid_type),
        help("{}", invalid_type_help(key, expected))
    )]
    InvalidType {
        /// Dotted path, e.g. `gateway.port`.
        key: String,
        found: String,
        expected: String,
        #[label("wrong type here")]
        span: Option<SourceSpan>,
        #[source_code]
        src: Option<NamedSource<String>>,
    },

    /// The media port range is empty.
    #[error(
        "listener.port_range_start ({start}) must not exceed listener.port_range_end ({end})"
    )]
    #[diagnostic(
        code(careline::config::port_range),
        help(
            "every connected call holds one UDP port from this range; \
             set port_range_start <= port_range_end and leave room for the expected call volume"
        )
    )]
    PortRange { start: u16, end: u16 },

    /// A semantic check on a deserialized value failed.
    #[error("validation error: {message}")]
    #[diagnostic(code(careline::config::validation))]
    Validation { message: String },

    #[error("configuration error: {0}")]
    #[diagnostic(code(careline::config::other))]
    Other(String),
}

/// Environment variable that overrides `section.key`.
pub fn env_var_for(section: &str, key: &str) -> String {
    format!(
        "CARELINE_{}_{}",
        section.to_ascii_uppercase(),
        key.to_ascii_uppercase()
    )
}

fn unknown_section_help(suggestion: Option<&str>) -> String {
    let sections = ENV_SECTIONS.join(", ");
    match suggestion {
        Some(s) => format!("did you mean `[{s}]`? careline sections: {sections}"),
        None => format!("careline sections: {sections}"),
    }
}

fn unknown_key_help(section: &str, suggestion: Option<&str>, valid_keys: &str) -> String {
    match suggestion {
        Some(s) => format!(
            "did you mean `{section}.{s}` (env `{}`)? [{section}] accepts: {valid_keys}",
            env_var_for(section, s)
        ),
        None => format!("[{section}] accepts: {valid_keys}"),
    }
}

fn invalid_type_help(key: &str, expected: &str) -> String {
    match key.split_once('.') {
        Some((section, field)) => format!(
            "`{key}` takes {expected}; check careline.toml and `{}`",
            env_var_for(section, field)
        ),
        None => format!("`{key}` takes {expected}"),
    }
}

/// Best fuzzy match for `unknown` among `candidates`, if any is close enough.
pub fn suggest_key(unknown: &str, candidates: &[&str]) -> Option<String> {
    candidates
        .iter()
        .map(|&candidate| (strsim::jaro_winkler(unknown, candidate), candidate))
        .filter(|(score, _)| *score > SIMILARITY_FLOOR)
        .max_by(|a, b| a.0.total_cmp(&b.0))
        .map(|(_, candidate)| candidate.to_string())
}

/// Convert a figment error (which may hold several) into diagnostics.
///
/// `sources` pairs a source name with its TOML text; files are matched by
/// path and string providers by [`INLINE_SOURCE`].
pub fn figment_to_config_errors(
    err: figment::Error,
    sources: &[(String, String)],
) -> Vec<ConfigError> {
    err.into_iter()
        .map(|error| {
            let source = source_of(&error, sources);
            match &error.kind {
                // The path ends with the offending field itself.
                Kind::UnknownField(field, expected) => match error.path.as_slice() {
                    [] | [_] => {
                        let (span, src) = locate(source, None, field, true);
                        ConfigError::UnknownSection {
                            name: field.clone(),
                            suggestion: suggest_key(field, expected),
                            span,
                            src,
                        }
                    }
                    [section, ..] => {
                        let (span, src) = locate(source, Some(section.as_str()), field, false);
                        ConfigError::UnknownKey {
                            section: section.clone(),
                            key: field.clone(),
                            suggestion: suggest_key(field, expected),
                            valid_keys: expected.join(", "),
                            span,
                            src,
                        }
                    }
                },
                Kind::InvalidType(found, expected) => {
                    let (span, src) = match error.path.as_slice() {
                        [section, field] => locate(source, Some(section.as_str()), field, false),
                        _ => (None, None),
                    };
                    ConfigError::InvalidType {
                        key: error.path.join("."),
                        found: found.to_string(),
                        expected: expected.clone(),
                        span,
                        src,
                    }
                }
                _ => ConfigError::Other(error.to_string()),
            }
        })
        .collect()
}

fn source_of<'a>(
    error: &figment::error::Error,
    sources: &'a [(String, String)],
) -> Option<(&'a str, &'a str)> {
    // String providers carry no source; only file errors name their path.
    let wanted = match error.metadata.as_ref().and_then(|m| m.source.as_ref()) {
        Some(Source::File(path)) => path.display().to_string(),
        _ => INLINE_SOURCE.to_string(),
    };
    sources
        .iter()
        .find(|(name, _)| *name == wanted)
        .map(|(name, content)| (name.as_str(), content.as_str()))
}

fn locate(
    source: Option<(&str, &str)>,
    section: Option<&str>,
    name: &str,
    is_section: bool,
) -> (Option<SourceSpan>, Option<NamedSource<String>>) {
    let Some((path, content)) = source else {
        return (None, None);
    };
    let offset = if is_section {
        section_offset(content, name)
    } else {
        key_offset(content, section, name)
    };
    match offset {
        Some(offset) => (
            Some(SourceSpan::new(offset.into(), name.len())),
            Some(NamedSource::new(path, content.to_string())),
        ),
        None => (None, None),
    }
}

/// Table name of a `[header]` line, if `line` is one.
fn header_name(line: &str) -> Option<&str> {
    let rest = line.trim_start().strip_prefix('[')?;
    rest.split(']').next().map(str::trim)
}

/// Byte offset of the name inside the `[section]` header.
pub fn section_offset(content: &str, section: &str) -> Option<usize> {
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if header_name(line) == Some(section) {
            return line.find(section).map(|at| offset + at);
        }
        offset += line.len();
    }
    None
}

/// Byte offset of `key` as assigned under `[section]`, or before the first
/// header when `section` is `None`.
pub fn key_offset(content: &str, section: Option<&str>, key: &str) -> Option<usize> {
    let mut current: Option<&str> = None;
    let mut offset = 0;
    for line in content.split_inclusive('\n') {
        if let Some(name) = header_name(line) {
            current = Some(name);
        } else if current == section {
            let trimmed = line.trim_start();
            let assigns = trimmed
                .strip_prefix(key)
                .is_some_and(|rest| rest.trim_start().starts_with('='));
            if assigns {
                return Some(offset + line.len() - trimmed.len());
            }
        }
        offset += line.len();
    }
    None
}

/// Print each error to stderr through miette's graphical handler.
pub fn render_errors(errors: &[ConfigError]) {
    let handler = miette::GraphicalReportHandler::new();
    for error in errors {
        let mut rendered = String::new();
        match handler.render_report(&mut rendered, error as &dyn Diagnostic) {
            Ok(()) => eprint!("{rendered}"),
            Err(_) => eprintln!("error: {error}"),
        }
    }
}
