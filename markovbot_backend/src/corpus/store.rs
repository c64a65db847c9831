use std::sync::Mutex;

use anyhow::Result;
use rand::seq::SliceRandom;

use crate::rng::SharedRng;

/// Durable line store behind the corpus.
///
/// Implementations only promise per-call atomicity; a fetch racing an insert
/// may or may not see the new line.
pub trait CorpusStore: Send + Sync {
    /// Create tables/indexes. Called once at startup; failure is fatal.
    fn ensure_schema(&self) -> Result<()>;

    fn insert(&self, line: &str) -> Result<()>;

    /// Every stored line, in an order the store randomizes per call.
    fn fetch_all_random_order(&self) -> Result<Vec<String>>;
}

/// Volatile store for tests and throwaway sessions.
pub struct MemoryCorpusStore {
    lines: Mutex<Vec<String>>,
    rng: SharedRng,
}

impl MemoryCorpusStore {
    pub fn new(rng: SharedRng) -> Self {
        Self {
            lines: Mutex::new(Vec::new()),
            rng,
        }
    }

    fn lock_lines(&self) -> Result<std::sync::MutexGuard<'_, Vec<String>>> {
        self.lines
            .lock()
            .map_err(|e| anyhow::anyhow!("Corpus lock poisoned: {}", e))
    }

    pub fn len(&self) -> usize {
        self.lock_lines().map(|lines| lines.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl CorpusStore for MemoryCorpusStore {
    fn ensure_schema(&self) -> Result<()> {
        Ok(())
    }

    fn insert(&self, line: &str) -> Result<()> {
        self.lock_lines()?.push(line.to_string());
        Ok(())
    }

    fn fetch_all_random_order(&self) -> Result<Vec<String>> {
        let mut snapshot = self.lock_lines()?.clone();
        self.rng.with(|rng| snapshot.shuffle(rng));
        Ok(snapshot)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fetch_returns_every_inserted_line() {
        let store = MemoryCorpusStore::new(SharedRng::seeded(3));
        assert!(store.is_empty());
        for line in ["one two", "three four", "five six"] {
            store.insert(line).expect("insert");
        }

        let mut fetched = store.fetch_all_random_order().expect("fetch");
        fetched.sort();
        assert_eq!(fetched, vec!["five six", "one two", "three four"]);
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn fetch_order_varies_between_calls() {
        let store = MemoryCorpusStore::new(SharedRng::seeded(11));
        for idx in 0..20 {
            store.insert(&format!("line {}", idx)).expect("insert");
        }

        let first = store.fetch_all_random_order().expect("first fetch");
        let reordered = (0..10).any(|_| {
            store.fetch_all_random_order().expect("later fetch") != first
        });
        assert!(reordered, "twenty lines should not keep one order across fetches");
    }
}
