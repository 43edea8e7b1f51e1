// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Conversation CRUD operations.
//!
//! Lifecycle writes and enrichment writes touch disjoint columns:
//! [`save_conversation`] never writes `analyzed_data` and
//! [`record_analysis`] never writes anything else.

use careline_core::types::{AnalysisRecord, AnalyzedData, Conversation};
use careline_core::CarelineError;
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Row};

use super::{decode_enum, decode_json, decode_opt_ts, decode_ts, encode_json, encode_ts};
use crate::database::{map_tr_err, Database};

const COLUMNS: &str = "id, patient_id, agent_id, call_sid, call_status, call_start_time,
     call_end_time, call_duration_secs, call_outcome, call_notes, analyzed_data, status,
     created_at, updated_at";

fn from_row(row: &Row<'_>) -> rusqlite::Result<Conversation> {
    let outcome: Option<String> = row.get(8)?;
    Ok(Conversation {
        id: row.get(0)?,
        patient_id: row.get(1)?,
        agent_id: row.get(2)?,
        call_sid: row.get(3)?,
        call_status: decode_enum(4, row.get(4)?)?,
        call_start_time: decode_ts(5, row.get(5)?)?,
        call_end_time: decode_opt_ts(6, row.get(6)?)?,
        call_duration_secs: row.get(7)?,
        call_outcome: outcome.map(|o| decode_enum(8, o)).transpose()?,
        call_notes: row.get(9)?,
        message_ids: Vec::new(),
        analyzed_data: decode_json(10, row.get(10)?)?,
        status: decode_enum(11, row.get(11)?)?,
        created_at: decode_ts(12, row.get(12)?)?,
        updated_at: decode_ts(13, row.get(13)?)?,
    })
}

fn load_message_ids(conn: &rusqlite::Connection, conversation: &mut Conversation) -> rusqlite::Result<()> {
    let mut stmt = conn.prepare_cached(
        "SELECT id FROM messages WHERE conversation_id = ?1 ORDER BY seq ASC",
    )?;
    let ids = stmt.query_map(params![conversation.id], |row| row.get::<_, String>(0))?;
    for id in ids {
        conversation.message_ids.push(id?);
    }
    Ok(())
}

/// Insert a new conversation.
pub async fn create_conversation(db: &Database, conv: &Conversation) -> Result<(), CarelineError> {
    let conv = conv.clone();
    db.connection()
        .call(move |conn| {
            conn.execute(
                &format!("INSERT INTO conversations ({COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)"),
                params![
                    conv.id,
                    conv.patient_id,
                    conv.agent_id,
                    conv.call_sid,
                    conv.call_status.to_string(),
                    encode_ts(&conv.call_start_time),
                    conv.call_end_time.as_ref().map(encode_ts),
                    conv.call_duration_secs,
                    conv.call_outcome.map(|o| o.to_string()),
                    conv.call_notes,
                    encode_json(&conv.analyzed_data)?,
                    conv.status.to_string(),
                    encode_ts(&conv.created_at),
                    encode_ts(&conv.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by ID, including its message ids.
pub async fn get_conversation(
    db: &Database,
    id: &str,
) -> Result<Option<Conversation>, CarelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            let found = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM conversations WHERE id = ?1"),
                    params![id],
                    from_row,
                )
                .optional()?;
            match found {
                Some(mut conv) => {
                    load_message_ids(conn, &mut conv)?;
                    Ok(Some(conv))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Get a conversation by the telephony gateway's call SID.
pub async fn find_by_call_sid(
    db: &Database,
    call_sid: &str,
) -> Result<Option<Conversation>, CarelineError> {
    let call_sid = call_sid.to_string();
    db.connection()
        .call(move |conn| {
            let found = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM conversations WHERE call_sid = ?1
                         ORDER BY created_at DESC LIMIT 1"
                    ),
                    params![call_sid],
                    from_row,
                )
                .optional()?;
            match found {
                Some(mut conv) => {
                    load_message_ids(conn, &mut conv)?;
                    Ok(Some(conv))
                }
                None => Ok(None),
            }
        })
        .await
        .map_err(map_tr_err)
}

/// Overwrite the lifecycle columns of an existing conversation.
pub async fn save_conversation(db: &Database, conv: &Conversation) -> Result<(), CarelineError> {
    let conv = conv.clone();
    let id = conv.id.clone();
    let updated = db
        .connection()
        .call(move |conn| {
            conn.execute(
                "UPDATE conversations SET
                    patient_id = ?2, agent_id = ?3, call_sid = ?4, call_status = ?5,
                    call_start_time = ?6, call_end_time = ?7, call_duration_secs = ?8,
                    call_outcome = ?9, call_notes = ?10, status = ?11, updated_at = ?12
                 WHERE id = ?1",
                params![
                    conv.id,
                    conv.patient_id,
                    conv.agent_id,
                    conv.call_sid,
                    conv.call_status.to_string(),
                    encode_ts(&conv.call_start_time),
                    conv.call_end_time.as_ref().map(encode_ts),
                    conv.call_duration_secs,
                    conv.call_outcome.map(|o| o.to_string()),
                    conv.call_notes,
                    conv.status.to_string(),
                    encode_ts(&conv.updated_at),
                ],
            )
        })
        .await
        .map_err(map_tr_err)?;
    if updated == 0 {
        return Err(CarelineError::not_found("conversation", &id));
    }
    Ok(())
}

/// Merge one analysis result into `analyzed_data`.
pub async fn record_analysis(
    db: &Database,
    conversation_id: &str,
    record: AnalysisRecord,
) -> Result<(), CarelineError> {
    let id = conversation_id.to_string();
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let raw: Option<String> = tx
                .query_row(
                    "SELECT analyzed_data FROM conversations WHERE id = ?1",
                    params![id],
                    |row| row.get(0),
                )
                .optional()?;
            let Some(raw) = raw else {
                return Ok(false);
            };
            let mut data: AnalyzedData = decode_json(0, raw)?;
            record.apply_to(&mut data);
            tx.execute(
                "UPDATE conversations SET analyzed_data = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, encode_json(&data)?, encode_ts(&Utc::now())],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;
    if !found {
        return Err(CarelineError::not_found("conversation", conversation_id));
    }
    Ok(())
}

/// List a patient's conversations, newest first.
pub async fn conversations_for_patient(
    db: &Database,
    patient_id: &str,
) -> Result<Vec<Conversation>, CarelineError> {
    let patient_id = patient_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut conversations = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {COLUMNS} FROM conversations WHERE patient_id = ?1
                     ORDER BY call_start_time DESC, created_at DESC"
                ))?;
                let rows = stmt.query_map(params![patient_id], from_row)?;
                rows.collect::<rusqlite::Result<Vec<_>>>()?
            };
            for conv in &mut conversations {
                load_message_ids(conn, conv)?;
            }
            Ok(conversations)
        })
        .await
        .map_err(map_tr_err)
}
