// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Emergency phrase registry persistence.

use careline_core::types::EmergencyPhrase;
use careline_core::CarelineError;
use chrono::Utc;
use rusqlite::params;

use super::{decode_enum, encode_ts};
use crate::database::{map_tr_err, Database};

/// List every phrase, ordered by id.
pub async fn list_phrases(db: &Database) -> Result<Vec<EmergencyPhrase>, CarelineError> {
    db.connection()
        .call(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, phrase, language, severity, category, pattern, active
                 FROM emergency_phrases ORDER BY id ASC",
            )?;
            let rows = stmt.query_map([], |row| {
                Ok(EmergencyPhrase {
                    id: row.get(0)?,
                    phrase: row.get(1)?,
                    language: row.get(2)?,
                    severity: decode_enum(3, row.get(3)?)?,
                    category: row.get(4)?,
                    pattern: row.get(5)?,
                    active: row.get(6)?,
                })
            })?;
            let mut phrases = Vec::new();
            for row in rows {
                phrases.push(row?);
            }
            Ok(phrases)
        })
        .await
        .map_err(map_tr_err)
}

/// Insert or replace a phrase by id.
pub async fn upsert_phrase(db: &Database, phrase: &EmergencyPhrase) -> Result<(), CarelineError> {
    let phrase = phrase.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO emergency_phrases
                    (id, phrase, language, severity, category, pattern, active, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
                 ON CONFLICT(id) DO UPDATE SET
                    phrase = excluded.phrase,
                    language = excluded.language,
                    severity = excluded.severity,
                    category = excluded.category,
                    pattern = excluded.pattern,
                    active = excluded.active,
                    updated_at = excluded.updated_at",
                params![
                    phrase.id,
                    phrase.phrase,
                    phrase.language,
                    phrase.severity.to_string(),
                    phrase.category,
                    phrase.pattern,
                    phrase.active,
                    encode_ts(&Utc::now()),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Delete a phrase. Returns `false` if it did not exist.
pub async fn delete_phrase(db: &Database, id: &str) -> Result<bool, CarelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let removed = conn.execute("DELETE FROM emergency_phrases WHERE id = ?1", params![id])?;
            Ok(removed > 0)
        })
        .await
        .map_err(map_tr_err)
}
