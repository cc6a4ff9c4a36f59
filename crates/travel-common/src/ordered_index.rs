//! Id-ordered index for the per-virus vaccination lists.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;

use crate::types::CitizenId;

/// Citizen ids kept in ascending order, each with a payload.
///
/// The vaccinated list stores the vaccination date; the unvaccinated list
/// stores `()`.
#[derive(Debug, Clone)]
pub struct OrderedIndex<V> {
    entries: BTreeMap<CitizenId, V>,
}

impl<V> OrderedIndex<V> {
    pub fn new() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }

    /// Insert a new id. Returns false and keeps the old payload if the id
    /// is already present.
    pub fn insert(&mut self, id: CitizenId, value: V) -> bool {
        match self.entries.entry(id) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                slot.insert(value);
                true
            }
        }
    }

    pub fn get(&self, id: &CitizenId) -> Option<&V> {
        self.entries.get(id)
    }

    pub fn contains(&self, id: &CitizenId) -> bool {
        self.entries.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in ascending id order
    pub fn iter(&self) -> impl Iterator<Item = (&CitizenId, &V)> {
        self.entries.iter()
    }
}

impl<V> Default for OrderedIndex<V> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> CitizenId {
        CitizenId::parse(raw).unwrap()
    }

    #[test]
    fn test_insert_is_first_writer_wins() {
        let mut index = OrderedIndex::new();
        assert!(index.insert(id("00010"), "2021-01-01"));
        assert!(!index.insert(id("00010"), "2022-02-02"));

        assert_eq!(index.get(&id("00010")), Some(&"2021-01-01"));
        assert_eq!(index.len(), 1);
    }

    #[test]
    fn test_iteration_is_ordered() {
        let mut index = OrderedIndex::new();
        for raw in ["00300", "00001", "00020"] {
            index.insert(id(raw), ());
        }

        let order: Vec<&str> = index.iter().map(|(k, _)| k.as_str()).collect();
        assert_eq!(order, vec!["00001", "00020", "00300"]);
    }
}
