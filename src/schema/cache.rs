//! Constraint cache
//!
//! Per-table constraint schemas with a time-to-live. Entries are evicted
//! lazily on the lookup that finds them expired; nothing sweeps in the
//! background. Time comes from an injected [`Clock`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::{Duration, Instant};

use super::types::TableConstraints;

/// Default time-to-live for cached constraints
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(300);

/// Source of monotonic time
pub trait Clock: Send + Sync {
    fn now(&self) -> Instant;
}

/// Wall clock
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// A clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Mutex<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Mutex::new(Duration::ZERO),
        }
    }

    /// Move time forward
    pub fn advance(&self, by: Duration) {
        let mut offset = self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        *offset += by;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        let offset = *self.offset.lock().unwrap_or_else(PoisonError::into_inner);
        self.origin + offset
    }
}

/// Outcome of a cache lookup
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    Hit(Arc<TableConstraints>),
    /// An entry existed but outlived the TTL and was evicted
    Expired,
    Miss,
}

#[derive(Debug)]
struct CacheEntry {
    fetched_at: Instant,
    constraints: Arc<TableConstraints>,
}

/// TTL cache of table constraints
pub struct ConstraintCache {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl ConstraintCache {
    /// Create a cache on the system clock
    pub fn new(ttl: Duration) -> Self {
        Self::with_clock(ttl, Arc::new(SystemClock))
    }

    pub fn with_clock(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: RwLock::new(HashMap::new()),
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_fresh(&self, entry: &CacheEntry, now: Instant) -> bool {
        now.saturating_duration_since(entry.fetched_at) < self.ttl
    }

    /// Look up a table, evicting the entry if it has expired
    pub fn lookup(&self, table: &str) -> CacheLookup {
        let now = self.clock.now();
        {
            let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
            match entries.get(table) {
                None => return CacheLookup::Miss,
                Some(entry) if self.is_fresh(entry, now) => {
                    return CacheLookup::Hit(Arc::clone(&entry.constraints))
                }
                Some(_) => {}
            }
        }

        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        // Another caller may have refreshed it in between
        match entries.get(table) {
            Some(entry) if self.is_fresh(entry, now) => {
                CacheLookup::Hit(Arc::clone(&entry.constraints))
            }
            Some(_) => {
                entries.remove(table);
                CacheLookup::Expired
            }
            None => CacheLookup::Miss,
        }
    }

    /// Fresh constraints for `table`, if cached
    pub fn get(&self, table: &str) -> Option<Arc<TableConstraints>> {
        match self.lookup(table) {
            CacheLookup::Hit(constraints) => Some(constraints),
            CacheLookup::Expired | CacheLookup::Miss => None,
        }
    }

    /// Store constraints fetched now
    pub fn insert(&self, table: &str, constraints: TableConstraints) -> Arc<TableConstraints> {
        let constraints = Arc::new(constraints);
        let entry = CacheEntry {
            fetched_at: self.clock.now(),
            constraints: Arc::clone(&constraints),
        };
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(table.to_string(), entry);
        constraints
    }

    /// Drop one table's entry
    pub fn invalidate(&self, table: &str) -> bool {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(table)
            .is_some()
    }

    pub fn clear(&self) {
        self.entries
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }

    /// Number of entries, expired ones included
    pub fn len(&self) -> usize {
        self.entries
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Default for ConstraintCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cache_with_clock(ttl: Duration) -> (ConstraintCache, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new());
        (ConstraintCache::with_clock(ttl, clock.clone()), clock)
    }

    #[test]
    fn test_hit_within_ttl() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(300));
        cache.insert("todos", TableConstraints::default());

        clock.advance(Duration::from_secs(299));
        assert!(matches!(cache.lookup("todos"), CacheLookup::Hit(_)));
    }

    #[test]
    fn test_expiry_is_lazy() {
        let (cache, clock) = cache_with_clock(Duration::from_secs(300));
        cache.insert("todos", TableConstraints::default());

        clock.advance(Duration::from_secs(300));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.lookup("todos"), CacheLookup::Expired);
        assert_eq!(cache.len(), 0);
        assert_eq!(cache.lookup("todos"), CacheLookup::Miss);
    }

    #[test]
    fn test_tables_are_independent() {
        let (cache, _clock) = cache_with_clock(Duration::from_secs(60));
        cache.insert("todos", TableConstraints::default());
        assert!(cache.get("todos").is_some());
        assert!(cache.get("users").is_none());
    }

    #[test]
    fn test_invalidate_and_clear() {
        let cache = ConstraintCache::default();
        cache.insert("a", TableConstraints::default());
        cache.insert("b", TableConstraints::default());

        assert!(cache.invalidate("a"));
        assert!(!cache.invalidate("a"));
        assert_eq!(cache.len(), 1);

        cache.clear();
        assert!(cache.is_empty());
    }
}
