// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transcript operations. Messages are append-only.

use careline_core::types::Message;
use careline_core::CarelineError;
use rusqlite::params;

use super::{decode_enum, decode_ts, encode_ts};
use crate::database::{map_tr_err, Database};

/// Append a message and touch the owning conversation.
///
/// Fails with NotFound when the conversation does not exist.
pub async fn append_message(db: &Database, msg: &Message) -> Result<(), CarelineError> {
    let msg = msg.clone();
    let conversation_id = msg.conversation_id.clone();
    let found = db
        .connection()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let touched = tx.execute(
                "UPDATE conversations SET updated_at = ?2 WHERE id = ?1",
                params![msg.conversation_id, encode_ts(&msg.timestamp)],
            )?;
            if touched == 0 {
                return Ok(false);
            }
            tx.execute(
                "INSERT INTO messages (id, conversation_id, role, content, timestamp)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    msg.id,
                    msg.conversation_id,
                    msg.role.to_string(),
                    msg.content,
                    encode_ts(&msg.timestamp),
                ],
            )?;
            tx.commit()?;
            Ok(true)
        })
        .await
        .map_err(map_tr_err)?;
    if !found {
        return Err(CarelineError::not_found("conversation", &conversation_id));
    }
    Ok(())
}

/// Get a conversation's transcript in insertion order.
pub async fn messages_for_conversation(
    db: &Database,
    conversation_id: &str,
) -> Result<Vec<Message>, CarelineError> {
    let conversation_id = conversation_id.to_string();
    db.connection()
        .call(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, conversation_id, role, content, timestamp
                 FROM messages WHERE conversation_id = ?1
                 ORDER BY seq ASC",
            )?;
            let rows = stmt.query_map(params![conversation_id], |row| {
                Ok(Message {
                    id: row.get(0)?,
                    conversation_id: row.get(1)?,
                    role: decode_enum(2, row.get(2)?)?,
                    content: row.get(3)?,
                    timestamp: decode_ts(4, row.get(4)?)?,
                })
            })?;
            let mut messages = Vec::new();
            for row in rows {
                messages.push(row?);
            }
            Ok(messages)
        })
        .await
        .map_err(map_tr_err)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::conversations::create_conversation;
    use crate::queries::test_support::setup_db;
    use careline_core::types::{Conversation, MessageRole};

    #[tokio::test]
    async fn transcript_keeps_insertion_order() {
        let (db, _dir) = setup_db().await;
        let conv = Conversation::new("p1", "agent", None);
        create_conversation(&db, &conv).await.unwrap();

        // Same timestamp on every message: order must come from insertion.
        let mut sent = Vec::new();
        let stamp = chrono::Utc::now();
        for (role, text) in [
            (MessageRole::Assistant, "Good morning"),
            (MessageRole::Patient, "Morning"),
            (MessageRole::Assistant, "How are you feeling?"),
            (MessageRole::Patient, "A bit tired"),
        ] {
            let mut msg = Message::new(&conv.id, role, text);
            msg.timestamp = stamp;
            append_message(&db, &msg).await.unwrap();
            sent.push(msg.id);
        }

        let transcript = messages_for_conversation(&db, &conv.id).await.unwrap();
        assert_eq!(
            transcript.iter().map(|m| m.id.clone()).collect::<Vec<_>>(),
            sent
        );
        assert_eq!(transcript[3].role, MessageRole::Patient);
        assert_eq!(transcript[3].content, "A bit tired");
    }

    #[tokio::test]
    async fn transcripts_are_isolated_per_conversation() {
        let (db, _dir) = setup_db().await;
        let a = Conversation::new("p1", "agent", None);
        let b = Conversation::new("p2", "agent", None);
        create_conversation(&db, &a).await.unwrap();
        create_conversation(&db, &b).await.unwrap();
        append_message(&db, &Message::new(&a.id, MessageRole::Patient, "a"))
            .await
            .unwrap();

        assert_eq!(messages_for_conversation(&db, &a.id).await.unwrap().len(), 1);
        assert!(messages_for_conversation(&db, &b.id).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn append_to_unknown_conversation_fails() {
        let (db, _dir) = setup_db().await;
        let err = append_message(&db, &Message::new("missing", MessageRole::System, "x"))
            .await
            .unwrap_err();
        assert!(matches!(err, CarelineError::NotFound { .. }));
    }
}
