// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Versioned in-memory emergency phrase registry backed by a [`PhraseStore`].
//!
//! Writes are validated (pattern must compile), persisted, then published
//! together with a bumped version. Detectors compare versions to decide
//! when their compiled cache is stale.

use std::sync::{Arc, PoisonError, RwLock};

use careline_core::types::EmergencyPhrase;
use careline_core::{CarelineError, PhraseStore};
use tokio::sync::Mutex;
use tracing::info;

use crate::builtin::builtin_phrases;
use crate::compiled::{compile_pattern, normalize_language};

/// Phrases of one version, shared with readers without copying.
#[derive(Debug, Clone)]
pub struct RegistrySnapshot {
    pub version: u64,
    pub phrases: Arc<Vec<EmergencyPhrase>>,
}

pub struct PhraseRegistry {
    store: Arc<dyn PhraseStore + Send + Sync>,
    current: RwLock<RegistrySnapshot>,
    /// Serializes persist-then-publish so store and memory agree on order.
    write_lock: Mutex<()>,
}

impl PhraseRegistry {
    /// Load the current phrase set from the store.
    pub async fn load(store: Arc<dyn PhraseStore + Send + Sync>) -> Result<Self, CarelineError> {
        let mut phrases = store.list_phrases().await?;
        sort_phrases(&mut phrases);
        Ok(Self {
            store,
            current: RwLock::new(RegistrySnapshot {
                version: 1,
                phrases: Arc::new(phrases),
            }),
            write_lock: Mutex::new(()),
        })
    }

    /// Persist the built-in phrases when the registry is empty.
    ///
    /// Returns the number of phrases seeded (0 when anything was already present).
    pub async fn seed_builtin_if_empty(&self) -> Result<usize, CarelineError> {
        let _guard = self.write_lock.lock().await;
        if !self.snapshot().phrases.is_empty() {
            return Ok(0);
        }

        let seeds = builtin_phrases();
        for phrase in &seeds {
            self.store.upsert_phrase(phrase).await?;
        }
        let count = seeds.len();
        self.publish(|phrases| phrases.extend(seeds));
        info!(count, "seeded built-in emergency phrases");
        Ok(count)
    }

    pub fn version(&self) -> u64 {
        self.read().version
    }

    pub fn snapshot(&self) -> RegistrySnapshot {
        self.read().clone()
    }

    /// All phrases (active and inactive), ordered by language then id.
    pub fn list(&self) -> Vec<EmergencyPhrase> {
        self.snapshot().phrases.as_ref().clone()
    }

    pub fn get(&self, id: &str) -> Option<EmergencyPhrase> {
        self.read().phrases.iter().find(|p| p.id == id).cloned()
    }

    /// Validate, persist and publish a phrase, replacing any entry with the same id.
    pub async fn upsert(&self, phrase: EmergencyPhrase) -> Result<EmergencyPhrase, CarelineError> {
        let phrase = validate_phrase(phrase)?;

        let _guard = self.write_lock.lock().await;
        self.store.upsert_phrase(&phrase).await?;
        let published = phrase.clone();
        let version = self.publish(move |phrases| {
            phrases.retain(|p| p.id != published.id);
            phrases.push(published);
        });
        info!(phrase_id = %phrase.id, language = %phrase.language, version, "emergency phrase saved");
        Ok(phrase)
    }

    /// Delete a phrase. Returns `false` when it did not exist.
    pub async fn delete(&self, id: &str) -> Result<bool, CarelineError> {
        let _guard = self.write_lock.lock().await;
        let existed = self.store.delete_phrase(id).await?;
        if existed {
            let version = self.publish(|phrases| phrases.retain(|p| p.id != id));
            info!(phrase_id = id, version, "emergency phrase deleted");
        }
        Ok(existed)
    }

    fn publish(&self, edit: impl FnOnce(&mut Vec<EmergencyPhrase>)) -> u64 {
        let mut current = self.current.write().unwrap_or_else(PoisonError::into_inner);
        let mut phrases = current.phrases.as_ref().clone();
        edit(&mut phrases);
        sort_phrases(&mut phrases);
        current.version += 1;
        current.phrases = Arc::new(phrases);
        current.version
    }

    fn read(&self) -> std::sync::RwLockReadGuard<'_, RegistrySnapshot> {
        self.current.read().unwrap_or_else(PoisonError::into_inner)
    }
}

fn sort_phrases(phrases: &mut [EmergencyPhrase]) {
    phrases.sort_by(|a, b| a.language.cmp(&b.language).then_with(|| a.id.cmp(&b.id)));
}

/// Normalize and check a phrase before it is written.
pub fn validate_phrase(mut phrase: EmergencyPhrase) -> Result<EmergencyPhrase, CarelineError> {
    phrase.id = phrase.id.trim().to_string();
    phrase.phrase = phrase.phrase.trim().to_string();
    phrase.category = phrase.category.trim().to_string();
    phrase.language = normalize_language(&phrase.language);
    phrase.pattern = phrase
        .pattern
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty());

    for (field, value) in [
        ("id", &phrase.id),
        ("phrase", &phrase.phrase),
        ("language", &phrase.language),
        ("category", &phrase.category),
    ] {
        if value.is_empty() {
            return Err(CarelineError::Validation(format!(
                "emergency phrase {field} must not be empty"
            )));
        }
    }

    compile_pattern(&phrase).map_err(|e| {
        CarelineError::Validation(format!(
            "emergency phrase `{}` has an invalid pattern: {e}",
            phrase.id
        ))
    })?;

    Ok(phrase)
}

#[cfg(test)]
mod tests {
    use super::*;
    use careline_core::types::Severity;
    use careline_test_utils::InMemoryStore;

    fn phrase(id: &str, pattern: Option<&str>) -> EmergencyPhrase {
        EmergencyPhrase {
            id: id.into(),
            phrase: "chest pain".into(),
            language: " EN ".into(),
            severity: Severity::High,
            category: "cardiac".into(),
            pattern: pattern.map(Into::into),
            active: true,
        }
    }

    #[tokio::test]
    async fn upsert_bumps_version_and_persists() {
        let store = Arc::new(InMemoryStore::new());
        let registry = PhraseRegistry::load(store.clone()).await.unwrap();
        let before = registry.version();

        let saved = registry.upsert(phrase("p1", None)).await.unwrap();
        assert_eq!(saved.language, "en");
        assert!(registry.version() > before);
        assert_eq!(store.list_phrases().await.unwrap().len(), 1);
        assert_eq!(registry.get("p1").unwrap().category, "cardiac");
    }

    #[tokio::test]
    async fn invalid_pattern_is_rejected_without_version_change() {
        let store = Arc::new(InMemoryStore::new());
        let registry = PhraseRegistry::load(store.clone()).await.unwrap();
        let before = registry.version();

        let err = registry.upsert(phrase("p1", Some("(oops"))).await.unwrap_err();
        assert!(matches!(err, CarelineError::Validation(_)));
        assert_eq!(registry.version(), before);
        assert!(store.list_phrases().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn upsert_replaces_same_id() {
        let registry = PhraseRegistry::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        registry.upsert(phrase("p1", None)).await.unwrap();
        let mut updated = phrase("p1", None);
        updated.severity = Severity::Critical;
        registry.upsert(updated).await.unwrap();

        let all = registry.list();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].severity, Severity::Critical);
    }

    #[tokio::test]
    async fn delete_reports_existence() {
        let registry = PhraseRegistry::load(Arc::new(InMemoryStore::new()))
            .await
            .unwrap();
        registry.upsert(phrase("p1", None)).await.unwrap();
        let version = registry.version();

        assert!(registry.delete("p1").await.unwrap());
        assert!(registry.version() > version);
        assert!(!registry.delete("p1").await.unwrap());
        assert!(registry.list().is_empty());
    }

    #[tokio::test]
    async fn seeding_only_happens_once() {
        let store = Arc::new(InMemoryStore::new());
        let registry = PhraseRegistry::load(store.clone()).await.unwrap();
        let seeded = registry.seed_builtin_if_empty().await.unwrap();
        assert!(seeded > 0);
        assert_eq!(registry.seed_builtin_if_empty().await.unwrap(), 0);

        let reloaded = PhraseRegistry::load(store).await.unwrap();
        assert_eq!(reloaded.list().len(), seeded);
    }

    #[test]
    fn empty_fields_fail_validation() {
        let mut blank = phrase("p1", None);
        blank.category = "  ".into();
        assert!(matches!(
            validate_phrase(blank),
            Err(CarelineError::Validation(msg)) if msg.contains("category")
        ));
    }
}
