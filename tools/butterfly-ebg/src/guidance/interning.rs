//! Content-addressed id tables shared by the analysis workers

use parking_lot::RwLock;
use rustc_hash::FxHashMap;
use std::hash::Hash;

#[derive(Debug)]
struct Table<K> {
    ids: FxHashMap<K, u32>,
    values: Vec<K>,
}

/// Thread-safe find-or-insert map issuing dense ids from 0.
///
/// Lookups take the read lock. Inserts re-check under the write lock, so two
/// workers racing on the same value observe the same id. Ids are never
/// reassigned.
#[derive(Debug)]
pub struct ConcurrentIdMap<K> {
    table: RwLock<Table<K>>,
}

impl<K: Eq + Hash + Clone> ConcurrentIdMap<K> {
    pub fn new() -> Self {
        Self {
            table: RwLock::new(Table {
                ids: FxHashMap::default(),
                values: Vec::new(),
            }),
        }
    }

    pub fn find_or_add(&self, key: &K) -> u32 {
        if let Some(&id) = self.table.read().ids.get(key) {
            return id;
        }

        let mut table = self.table.write();
        if let Some(&id) = table.ids.get(key) {
            return id;
        }
        let id = table.values.len() as u32;
        table.values.push(key.clone());
        table.ids.insert(key.clone(), id);
        id
    }

    pub fn get(&self, key: &K) -> Option<u32> {
        self.table.read().ids.get(key).copied()
    }

    pub fn len(&self) -> usize {
        self.table.read().values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Values ordered by id.
    pub fn into_values(self) -> Vec<K> {
        self.table.into_inner().values
    }
}

impl<K: Eq + Hash + Clone> Default for ConcurrentIdMap<K> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rayon::prelude::*;

    #[test]
    fn test_same_value_same_id() {
        let map = ConcurrentIdMap::new();
        let a = map.find_or_add(&"a".to_string());
        let b = map.find_or_add(&"b".to_string());
        assert_eq!(a, 0);
        assert_eq!(b, 1);
        assert_eq!(map.find_or_add(&"a".to_string()), a);
        assert_eq!(map.get(&"b".to_string()), Some(1));
        assert_eq!(map.get(&"c".to_string()), None);
        assert_eq!(map.into_values(), vec!["a".to_string(), "b".to_string()]);
    }

    #[test]
    fn test_concurrent_inserts_agree() {
        let map = ConcurrentIdMap::new();
        let ids: Vec<(u32, u32)> = (0..10_000u32)
            .into_par_iter()
            .map(|i| (i % 37, map.find_or_add(&(i % 37))))
            .collect();

        assert_eq!(map.len(), 37);
        for (key, id) in &ids {
            assert_eq!(map.get(key), Some(*id));
        }

        let values = map.into_values();
        for (key, id) in ids {
            assert_eq!(values[id as usize], key);
        }
    }
}
