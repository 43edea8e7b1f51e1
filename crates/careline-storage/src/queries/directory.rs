// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Read-only patient and organization lookups.

use careline_core::types::{Patient, RetryPolicy};
use careline_core::CarelineError;
use rusqlite::{params, OptionalExtension};

use crate::database::{map_tr_err, Database};

/// Get a patient by ID.
pub async fn get_patient(db: &Database, id: &str) -> Result<Option<Patient>, CarelineError> {
    let id = id.to_string();
    db.connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT id, organization_id, name, phone, preferred_language
                 FROM patients WHERE id = ?1",
                params![id],
                |row| {
                    Ok(Patient {
                        id: row.get(0)?,
                        organization_id: row.get(1)?,
                        name: row.get(2)?,
                        phone: row.get(3)?,
                        preferred_language: row.get(4)?,
                    })
                },
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)
}

/// Get an organization's re-dial policy. Both columns must be set for an override.
pub async fn retry_policy(
    db: &Database,
    organization_id: &str,
) -> Result<Option<RetryPolicy>, CarelineError> {
    let organization_id = organization_id.to_string();
    let row = db
        .connection()
        .call(move |conn| {
            conn.query_row(
                "SELECT max_retries, retry_interval_mins FROM organizations WHERE id = ?1",
                params![organization_id],
                |row| Ok((row.get::<_, Option<u32>>(0)?, row.get::<_, Option<u32>>(1)?)),
            )
            .optional()
        })
        .await
        .map_err(map_tr_err)?;

    Ok(match row {
        Some((Some(max_retries), Some(retry_interval_mins))) => Some(RetryPolicy {
            max_retries,
            retry_interval_mins,
        }),
        _ => None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::queries::test_support::setup_db;

    async fn seed(db: &Database) {
        db.connection()
            .call(|conn| -> Result<(), rusqlite::Error> {
                conn.execute_batch(
                    "INSERT INTO organizations (id, name, max_retries, retry_interval_mins)
                        VALUES ('org-1', 'Sunrise Care', 5, 20);
                     INSERT INTO organizations (id, name) VALUES ('org-2', 'Default Care');
                     INSERT INTO patients (id, organization_id, name, phone, preferred_language)
                        VALUES ('p1', 'org-1', 'Ana', '+15550100200', 'es');
                     INSERT INTO patients (id, organization_id, name)
                        VALUES ('p2', 'org-2', 'Bo');",
                )
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn patient_lookup() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;

        let ana = get_patient(&db, "p1").await.unwrap().unwrap();
        assert_eq!(ana.preferred_language, "es");
        assert_eq!(ana.organization_id.as_deref(), Some("org-1"));

        let bo = get_patient(&db, "p2").await.unwrap().unwrap();
        assert!(bo.phone.is_none());
        assert_eq!(bo.preferred_language, "en");

        assert!(get_patient(&db, "p3").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn retry_policy_requires_both_columns() {
        let (db, _dir) = setup_db().await;
        seed(&db).await;

        assert_eq!(
            retry_policy(&db, "org-1").await.unwrap(),
            Some(RetryPolicy {
                max_retries: 5,
                retry_interval_mins: 20
            })
        );
        assert!(retry_policy(&db, "org-2").await.unwrap().is_none());
        assert!(retry_policy(&db, "org-9").await.unwrap().is_none());
    }
}
