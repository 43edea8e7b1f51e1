// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Log redaction for the Careline call session engine.
//!
//! Phone numbers, e-mail addresses and credentials must never reach log
//! output. The binary routes its tracing output through [`RedactingWriter`].

pub mod redact;

pub use redact::{RedactingWriter, SecretList, configured_secrets, redact};
