//! One immutable keyed collection type for every item/property list.
//!
//! Insertion order is preserved and is part of equality. A duplicate key is
//! dropped on insertion: the first occurrence wins, so by-index and by-key
//! access always see the same logical element set.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Anything that can live in a [`KeyedCollection`].
pub trait Keyed {
    fn key(&self) -> &str;
}

/// Ordered, first-wins, immutable collection addressed by key or by index.
#[derive(Clone)]
pub struct KeyedCollection<T> {
    items: Vec<T>,
    index: HashMap<String, usize>,
}

impl<T: Keyed> KeyedCollection<T> {
    pub fn new() -> Self {
        Self {
            items: Vec::new(),
            index: HashMap::new(),
        }
    }

    pub fn get(&self, key: &str) -> Option<&T> {
        self.index.get(key).map(|&i| &self.items[i])
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.index.contains_key(key)
    }

    pub fn get_index(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.items.iter().map(Keyed::key)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    fn insert_first_wins(&mut self, item: T) -> bool {
        if self.index.contains_key(item.key()) {
            return false;
        }
        self.index.insert(item.key().to_string(), self.items.len());
        self.items.push(item);
        true
    }
}

impl<T: Keyed> Default for KeyedCollection<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Keyed> FromIterator<T> for KeyedCollection<T> {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        let mut collection = Self::new();
        for item in iter {
            collection.insert_first_wins(item);
        }
        collection
    }
}

impl<'a, T: Keyed> IntoIterator for &'a KeyedCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

impl<T: PartialEq> PartialEq for KeyedCollection<T> {
    fn eq(&self, other: &Self) -> bool {
        self.items == other.items
    }
}

impl<T: Eq> Eq for KeyedCollection<T> {}

impl<T: fmt::Debug> fmt::Debug for KeyedCollection<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.items).finish()
    }
}

impl<T: Serialize> Serialize for KeyedCollection<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(&self.items)
    }
}

impl<'de, T: Keyed + Deserialize<'de>> Deserialize<'de> for KeyedCollection<T> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Vec::<T>::deserialize(deserializer).map(Self::from_iter)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
    struct Named(String, u32);

    impl Keyed for Named {
        fn key(&self) -> &str {
            &self.0
        }
    }

    fn named(key: &str, n: u32) -> Named {
        Named(key.to_string(), n)
    }

    #[test]
    fn first_occurrence_wins() {
        let c: KeyedCollection<Named> =
            [named("a", 1), named("b", 2), named("a", 3)].into_iter().collect();
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("a"), Some(&named("a", 1)));
        assert_eq!(c.get_index(1), Some(&named("b", 2)));
        assert_eq!(c.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[test]
    fn equality_is_order_sensitive() {
        let ab: KeyedCollection<Named> = [named("a", 1), named("b", 2)].into_iter().collect();
        let ba: KeyedCollection<Named> = [named("b", 2), named("a", 1)].into_iter().collect();
        assert_ne!(ab, ba);
        assert_eq!(ab, ab.clone());
    }

    #[test]
    fn deserialize_applies_first_wins() {
        let c: KeyedCollection<Named> =
            serde_yaml::from_str("- [x, 1]\n- [x, 2]\n- [y, 3]\n").expect("yaml");
        assert_eq!(c.len(), 2);
        assert_eq!(c.get("x").map(|n| n.1), Some(1));
    }
}
