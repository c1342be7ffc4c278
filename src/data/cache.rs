use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::Result;

use super::model::Table;

/// Session-owned cache of loaded tables, keyed by source path or URL.
///
/// Entries live until they are invalidated or, when a TTL is set, until
/// they are older than the TTL.
#[derive(Debug, Default)]
pub struct TableCache {
    ttl: Option<Duration>,
    entries: HashMap<String, CachedTable>,
}

#[derive(Debug)]
struct CachedTable {
    table: Arc<Table>,
    loaded_at: Instant,
}

impl TableCache {
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            ttl,
            entries: HashMap::new(),
        }
    }

    /// Return the cached table for `key`, running `load` on a miss or an
    /// expired entry. A failed load leaves the cache unchanged.
    pub fn get_or_load<F>(&mut self, key: &str, load: F) -> Result<Arc<Table>>
    where
        F: FnOnce() -> Result<Table>,
    {
        if let Some(hit) = self.get(key) {
            log::debug!("Cache hit for {key}");
            return Ok(hit);
        }
        log::debug!("Cache miss for {key}");
        let table = Arc::new(load()?);
        self.entries.insert(
            key.to_string(),
            CachedTable {
                table: Arc::clone(&table),
                loaded_at: Instant::now(),
            },
        );
        Ok(table)
    }

    /// Fresh entry for `key`, if any.
    pub fn get(&self, key: &str) -> Option<Arc<Table>> {
        self.entries
            .get(key)
            .filter(|e| !self.is_expired(e))
            .map(|e| Arc::clone(&e.table))
    }

    pub fn invalidate(&mut self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn is_expired(&self, entry: &CachedTable) -> bool {
        self.ttl
            .is_some_and(|ttl| entry.loaded_at.elapsed() >= ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::cell::Cell;

    #[test]
    fn second_lookup_does_not_reload() {
        let loads = Cell::new(0);
        let mut cache = TableCache::new(None);
        for _ in 0..3 {
            cache
                .get_or_load("clinical.xlsx", || {
                    loads.set(loads.get() + 1);
                    Ok(Table::default())
                })
                .unwrap();
        }
        assert_eq!(loads.get(), 1);
    }

    #[test]
    fn invalidate_forces_reload() {
        let loads = Cell::new(0);
        let mut cache = TableCache::new(None);
        let load = || {
            loads.set(loads.get() + 1);
            Ok(Table::default())
        };
        cache.get_or_load("k", load).unwrap();
        assert!(cache.invalidate("k"));
        cache.get_or_load("k", load).unwrap();
        assert_eq!(loads.get(), 2);
    }

    #[test]
    fn zero_ttl_always_expires() {
        let mut cache = TableCache::new(Some(Duration::ZERO));
        cache.get_or_load("k", || Ok(Table::default())).unwrap();
        assert!(cache.get("k").is_none());
    }

    #[test]
    fn failed_load_is_not_cached() {
        let mut cache = TableCache::new(None);
        assert!(cache
            .get_or_load("k", || Err(anyhow::anyhow!("offline")))
            .is_err());
        assert!(cache.is_empty());
    }
}
