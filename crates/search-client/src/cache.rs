//! TTL cache for search results, keyed by normalized query.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tracing::info;

/// Default time-to-live for cached search results.
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

#[derive(Debug, Clone)]
pub(crate) struct CacheEntry {
    pub content: String,
    pub sources: Vec<String>,
    pub tokens_used: u32,
    pub inserted_at: Instant,
}

/// Cache diagnostics.
#[derive(Debug, Clone)]
pub struct CacheStats {
    /// Number of live entries.
    pub size: usize,
    /// Normalized keys currently held.
    pub keys: Vec<String>,
}

/// In-process search cache with lazy expiry on lookup.
#[derive(Debug)]
pub struct SearchCache {
    entries: HashMap<String, CacheEntry>,
    ttl: Duration,
}

impl SearchCache {
    /// Create a cache with the given TTL.
    pub fn new(ttl: Duration) -> Self {
        Self {
            entries: HashMap::new(),
            ttl,
        }
    }

    /// Build the normalized key for a query and optional focus-site list:
    /// lower-cased trimmed query plus a sorted, comma-joined site list
    /// (or "default" when none given).
    pub fn cache_key(query: &str, focus_sites: Option<&[String]>) -> String {
        let sites_key = match focus_sites {
            Some(sites) if !sites.is_empty() => {
                let mut sorted: Vec<&str> = sites.iter().map(String::as_str).collect();
                sorted.sort_unstable();
                sorted.join(",")
            }
            _ => "default".to_string(),
        };
        format!("{}-{}", query.trim().to_lowercase(), sites_key)
    }

    /// Look up an entry, removing it if past the TTL.
    pub(crate) fn get(&mut self, key: &str) -> Option<CacheEntry> {
        match self.entries.get(key) {
            Some(entry) if entry.inserted_at.elapsed() <= self.ttl => Some(entry.clone()),
            Some(_) => {
                self.entries.remove(key);
                None
            }
            None => None,
        }
    }

    /// Insert an entry.
    pub(crate) fn insert(&mut self, key: String, entry: CacheEntry) {
        self.entries.insert(key, entry);
    }

    /// Purge all expired entries, returning how many were removed.
    pub fn clean(&mut self) -> usize {
        let before = self.entries.len();
        let ttl = self.ttl;
        self.entries.retain(|_, entry| entry.inserted_at.elapsed() <= ttl);
        let removed = before - self.entries.len();

        if removed > 0 {
            info!(removed, "cleaned expired search cache entries");
        }
        removed
    }

    /// Current size and keys, for diagnostics.
    pub fn stats(&self) -> CacheStats {
        CacheStats {
            size: self.entries.len(),
            keys: self.entries.keys().cloned().collect(),
        }
    }
}

impl Default for SearchCache {
    fn default() -> Self {
        Self::new(DEFAULT_CACHE_TTL)
    }
}
