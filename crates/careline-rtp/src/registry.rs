// SPDX-FileCopyrightText: 2026 Careline Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Listener arena with port and call-id indices.
//!
//! Every mutation goes through [`ListenerRegistry::insert`] or
//! [`ListenerRegistry::remove`], which update the arena and both indices
//! together. Callers hold the manager's lock for the duration.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU64, Ordering};

use chrono::{DateTime, TimeZone, Utc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Arena key. Never reused within one manager.
pub type ListenerId = u64;

/// Counters shared between the receive task and snapshot readers.
#[derive(Debug)]
pub struct ListenerStats {
    pub packets: AtomicU64,
    pub bytes: AtomicU64,
    pub malformed: AtomicU64,
    pub dropped: AtomicU64,
    /// Unix milliseconds of the last valid packet, 0 when none arrived yet.
    last_activity_ms: AtomicI64,
    open: AtomicBool,
}

impl ListenerStats {
    pub fn new() -> Self {
        Self {
            packets: AtomicU64::new(0),
            bytes: AtomicU64::new(0),
            malformed: AtomicU64::new(0),
            dropped: AtomicU64::new(0),
            last_activity_ms: AtomicI64::new(0),
            open: AtomicBool::new(true),
        }
    }

    pub fn touch(&self, at: DateTime<Utc>) {
        self.last_activity_ms
            .store(at.timestamp_millis(), Ordering::Relaxed);
    }

    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        match self.last_activity_ms.load(Ordering::Relaxed) {
            0 => None,
            ms => Utc.timestamp_millis_opt(ms).single(),
        }
    }

    pub fn close(&self) {
        self.open.store(false, Ordering::Relaxed);
    }

    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Relaxed)
    }
}

impl Default for ListenerStats {
    fn default() -> Self {
        Self::new()
    }
}

/// One bound listener as owned by the registry.
#[derive(Debug)]
pub struct ListenerEntry {
    pub id: ListenerId,
    pub port: u16,
    pub call_id: String,
    pub channel_id: String,
    pub started_at: DateTime<Utc>,
    pub stats: Arc<ListenerStats>,
    pub cancel: CancellationToken,
    pub task: Option<JoinHandle<()>>,
}

#[derive(Debug, Default)]
pub struct ListenerRegistry {
    entries: HashMap<ListenerId, ListenerEntry>,
    by_port: HashMap<u16, ListenerId>,
    by_call: HashMap<String, ListenerId>,
}

impl ListenerRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn by_port(&self, port: u16) -> Option<&ListenerEntry> {
        self.by_port.get(&port).and_then(|id| self.entries.get(id))
    }

    pub fn by_call(&self, call_id: &str) -> Option<&ListenerEntry> {
        self.by_call.get(call_id).and_then(|id| self.entries.get(id))
    }

    pub fn iter(&self) -> impl Iterator<Item = &ListenerEntry> {
        self.entries.values()
    }

    /// Insert an entry whose port and call id are both free.
    ///
    /// Returns the entry back if either key is already taken.
    pub fn insert(&mut self, entry: ListenerEntry) -> Result<(), ListenerEntry> {
        if self.by_port.contains_key(&entry.port) || self.by_call.contains_key(&entry.call_id) {
            return Err(entry);
        }
        self.by_port.insert(entry.port, entry.id);
        self.by_call.insert(entry.call_id.clone(), entry.id);
        self.entries.insert(entry.id, entry);
        Ok(())
    }

    /// Remove the listener owned by `call_id` from the arena and both indices.
    pub fn remove_by_call(&mut self, call_id: &str) -> Option<ListenerEntry> {
        let id = self.by_call.remove(call_id)?;
        let entry = self.entries.remove(&id)?;
        self.by_port.remove(&entry.port);
        Some(entry)
    }

    /// Remove every entry.
    pub fn drain(&mut self) -> Vec<ListenerEntry> {
        self.by_port.clear();
        self.by_call.clear();
        self.entries.drain().map(|(_, entry)| entry).collect()
    }

    #[cfg(test)]
    pub(crate) fn indices_consistent(&self) -> bool {
        self.by_port.len() == self.entries.len()
            && self.by_call.len() == self.entries.len()
            && self.entries.values().all(|e| {
                self.by_port.get(&e.port) == Some(&e.id)
                    && self.by_call.get(&e.call_id) == Some(&e.id)
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn entry(id: ListenerId, port: u16, call_id: &str) -> ListenerEntry {
        ListenerEntry {
            id,
            port,
            call_id: call_id.to_string(),
            channel_id: format!("chan-{id}"),
            started_at: Utc::now(),
            stats: Arc::new(ListenerStats::new()),
            cancel: CancellationToken::new(),
            task: None,
        }
    }

    #[test]
    fn insert_indexes_both_keys() {
        let mut registry = ListenerRegistry::new();
        registry.insert(entry(1, 15000, "call-a")).unwrap();
        assert_eq!(registry.by_port(15000).unwrap().call_id, "call-a");
        assert_eq!(registry.by_call("call-a").unwrap().port, 15000);
        assert!(registry.indices_consistent());
    }

    #[test]
    fn duplicate_port_or_call_is_rejected() {
        let mut registry = ListenerRegistry::new();
        registry.insert(entry(1, 15000, "call-a")).unwrap();
        assert!(registry.insert(entry(2, 15000, "call-b")).is_err());
        assert!(registry.insert(entry(3, 15001, "call-a")).is_err());
        assert_eq!(registry.len(), 1);
        assert!(registry.indices_consistent());
    }

    #[test]
    fn remove_clears_both_indices() {
        let mut registry = ListenerRegistry::new();
        registry.insert(entry(1, 15000, "call-a")).unwrap();
        let removed = registry.remove_by_call("call-a").unwrap();
        assert_eq!(removed.port, 15000);
        assert!(registry.by_port(15000).is_none());
        assert!(registry.by_call("call-a").is_none());
        assert!(registry.remove_by_call("call-a").is_none());
        assert!(registry.is_empty());
    }

    #[test]
    fn stats_activity_round_trips() {
        let stats = ListenerStats::new();
        assert!(stats.last_activity().is_none());
        let now = Utc.timestamp_millis_opt(1_700_000_000_123).single().unwrap();
        stats.touch(now);
        assert_eq!(stats.last_activity(), Some(now));
        assert!(stats.is_open());
        stats.close();
        assert!(!stats.is_open());
    }

    proptest! {
        #[test]
        fn indices_stay_in_lockstep(ops in proptest::collection::vec((any::<bool>(), 0u16..8, 0u8..8), 1..64)) {
            let mut registry = ListenerRegistry::new();
            let mut next_id = 0;
            for (insert, port, call) in ops {
                let call_id = format!("call-{call}");
                if insert {
                    next_id += 1;
                    let _ = registry.insert(entry(next_id, 15000 + port, &call_id));
                } else {
                    registry.remove_by_call(&call_id);
                }
                prop_assert!(registry.indices_consistent());
            }
        }
    }
}
