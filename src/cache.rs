//! Per-run memoization of resolved remote records.
//!
//! A miss is always safe: the caller re-resolves against the remote store and
//! inserts the result. Entries are never invalidated within a run.

use std::collections::{HashMap, HashSet};

use serde::Serialize;

use crate::record::{GraphRecord, Target};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub size: usize,
}

impl CacheStats {
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            (self.hits as f64 / total as f64) * 100.0
        }
    }
}

/// `lowercase(id[-version])`, the identity records are cached under.
pub fn cache_key(id: &str, version: Option<&str>) -> String {
    match version.filter(|v| !v.is_empty()) {
        Some(version) => format!("{id}-{version}").to_lowercase(),
        None => id.trim().to_lowercase(),
    }
}

/// Key of a stored record: sourceId (and version) when present, else its name.
pub fn record_key(record: &GraphRecord) -> Option<String> {
    match (record.source_id(), record.name()) {
        (Some(source_id), _) => Some(cache_key(source_id, record.source_id_version())),
        (None, Some(name)) => Some(cache_key(name, None)),
        (None, None) => None,
    }
}

#[derive(Debug, Default)]
pub struct ReferenceCache {
    entries: HashMap<(Target, String), GraphRecord>,
    hits: u64,
    misses: u64,
}

impl ReferenceCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&mut self, target: Target, key: &str) -> Option<GraphRecord> {
        match self.entries.get(&(target, key.to_string())) {
            Some(record) => {
                self.hits += 1;
                tracing::debug!(%target, key, "cache hit");
                Some(record.clone())
            }
            None => {
                self.misses += 1;
                None
            }
        }
    }

    pub fn insert(&mut self, target: Target, key: String, record: GraphRecord) {
        self.entries.insert((target, key), record);
    }

    pub fn contains(&self, target: Target, key: &str) -> bool {
        self.entries.contains_key(&(target, key.to_string()))
    }

    /// Seeds the cache with live, independent records. Keys shared by more than one
    /// record are left out so they are resolved (and disambiguated) remotely.
    pub fn preload<I>(&mut self, target: Target, records: I) -> usize
    where
        I: IntoIterator<Item = GraphRecord>,
    {
        let mut loaded: HashMap<String, GraphRecord> = HashMap::new();
        let mut duplicates = HashSet::new();
        for record in records {
            if record.is_deprecated() || record.has_dependency() {
                continue;
            }
            let Some(key) = record_key(&record) else {
                continue;
            };
            if loaded.insert(key.clone(), record).is_some() {
                duplicates.insert(key);
            }
        }
        for key in &duplicates {
            loaded.remove(key);
        }
        if !duplicates.is_empty() {
            tracing::warn!(%target, count = duplicates.len(), "dropped duplicate keys from preload");
        }
        let count = loaded.len();
        for (key, record) in loaded {
            self.insert(target, key, record);
        }
        count
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.hits,
            misses: self.misses,
            size: self.entries.len(),
        }
    }
}
