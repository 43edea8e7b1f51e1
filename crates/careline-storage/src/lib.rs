// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! SQLite persistence layer for the Careline call session engine.
//!
//! All writes are serialized through tokio-rusqlite's single background
//! thread: the [`Database`] handle is the single writer and every query
//! module calls through it.

pub mod adapter;
pub mod database;
pub mod migrations;
pub mod queries;

pub use adapter::SqliteStore;
pub use database::Database;
