use std::collections::HashMap;

use crate::models::ScanStats;

/// Per-address failure counts for one session
///
/// Entries are never removed and counts only grow. Insertion order is kept
/// so that equal counts always come out in first-seen order.
#[derive(Debug, Clone, Default)]
pub struct CounterStore {
    index: HashMap<String, usize>,
    entries: Vec<(String, u64)>,
}

impl CounterStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Count one more failure for `addr` and return the new total
    pub fn increment(&mut self, addr: &str) -> u64 {
        match self.index.get(addr) {
            Some(&slot) => {
                let count = &mut self.entries[slot].1;
                *count += 1;
                *count
            }
            None => {
                self.index.insert(addr.to_string(), self.entries.len());
                self.entries.push((addr.to_string(), 1));
                1
            }
        }
    }

    pub fn get(&self, addr: &str) -> Option<u64> {
        self.index.get(addr).map(|&slot| self.entries[slot].1)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Sum of all counts
    pub fn total(&self) -> u64 {
        self.entries.iter().map(|(_, count)| count).sum()
    }

    /// All entries, highest count first, ties in first-seen order
    pub fn snapshot(&self) -> Vec<(String, u64)> {
        let mut snapshot = self.entries.clone();
        // sort_by is stable, so insertion order survives for equal counts
        snapshot.sort_by(|a, b| b.1.cmp(&a.1));
        snapshot
    }

    /// Snapshot restricted to addresses at or above `threshold`
    pub fn over_threshold(&self, threshold: u64) -> Vec<(String, u64)> {
        self.snapshot()
            .into_iter()
            .filter(|(_, count)| *count >= threshold)
            .collect()
    }

    pub fn stats(&self) -> ScanStats {
        ScanStats {
            total_failed_attempts: self.total(),
            unique_ips: self.len(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_increment_same_address() {
        let mut store = CounterStore::new();
        for expected in 1..=7 {
            assert_eq!(store.increment("1.2.3.4"), expected);
        }
        assert_eq!(store.get("1.2.3.4"), Some(7));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_distinct_addresses_independent() {
        let mut store = CounterStore::new();
        store.increment("1.1.1.1");
        store.increment("2.2.2.2");
        store.increment("1.1.1.1");

        assert_eq!(store.get("1.1.1.1"), Some(2));
        assert_eq!(store.get("2.2.2.2"), Some(1));
        assert_eq!(store.get("3.3.3.3"), None);
        assert_eq!(store.total(), 3);
    }

    #[test]
    fn test_snapshot_order() {
        let mut store = CounterStore::new();
        for addr in ["a", "b", "c", "b", "d", "c", "e", "e", "e"] {
            store.increment(addr);
        }

        let snapshot = store.snapshot();
        let order: Vec<&str> = snapshot.iter().map(|(addr, _)| addr.as_str()).collect();
        assert_eq!(order, vec!["e", "b", "c", "a", "d"]);
        assert_eq!(snapshot[0].1, 3);
    }

    #[test]
    fn test_snapshot_deterministic() {
        let build = || {
            let mut store = CounterStore::new();
            for addr in ["9.9.9.9", "8.8.8.8", "7.7.7.7", "8.8.8.8", "9.9.9.9"] {
                store.increment(addr);
            }
            store.snapshot()
        };
        assert_eq!(build(), build());
    }

    #[test]
    fn test_over_threshold_and_stats() {
        let mut store = CounterStore::new();
        for _ in 0..5 {
            store.increment("5.5.5.5");
        }
        store.increment("6.6.6.6");

        assert_eq!(store.over_threshold(5), vec![("5.5.5.5".to_string(), 5)]);
        assert!(store.over_threshold(6).is_empty());
        assert_eq!(
            store.stats(),
            ScanStats {
                total_failed_attempts: 6,
                unique_ips: 2
            }
        );
    }
}
