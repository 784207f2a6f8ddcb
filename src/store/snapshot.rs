//! Full key-space of a store at one instant.

use std::collections::BTreeMap;

use crate::store::value::{PreferenceValue, PrimitiveValue, ValueKind};

/// Every stored entry, keyed by `(kind, key)`.
///
/// A key string may hold one value per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Snapshot {
    entries: BTreeMap<(ValueKind, String), PrimitiveValue>,
}

impl Snapshot {
    /// Creates an empty snapshot.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Gets the value stored under `key` in the `kind` slot.
    #[must_use]
    pub fn get(&self, key: &str, kind: ValueKind) -> Option<&PrimitiveValue> {
        self.entries.get(&(kind, key.to_string()))
    }

    /// Gets the value stored under `key` in the slot of `T`.
    #[must_use]
    pub fn get_as<T: PreferenceValue>(&self, key: &str) -> Option<T> {
        self.get(key, T::KIND).and_then(T::from_value)
    }

    /// Stores `value` under `key` in the slot of its kind.
    ///
    /// # Returns
    ///
    /// The value previously held by that slot, if any.
    pub fn set(&mut self, key: impl Into<String>, value: PrimitiveValue) -> Option<PrimitiveValue> {
        self.entries.insert((value.kind(), key.into()), value)
    }

    /// Removes every entry.
    pub fn clear(&mut self) {
        self.entries.clear();
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterates entries ordered by kind, then key.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &PrimitiveValue)> {
        self.entries
            .iter()
            .map(|((_, key), value)| (key.as_str(), value))
    }

    /// Compares two snapshots slot by slot.
    ///
    /// # Returns
    ///
    /// Entries present in `self` whose value differs from `previous`, and
    /// slots present in `previous` but gone from `self`.
    #[must_use]
    pub fn diff<'a>(
        &'a self,
        previous: &'a Snapshot,
    ) -> (Vec<(&'a str, &'a PrimitiveValue)>, Vec<(ValueKind, &'a str)>) {
        let changed = self
            .entries
            .iter()
            .filter(|(slot, value)| previous.entries.get(*slot) != Some(*value))
            .map(|((_, key), value)| (key.as_str(), value))
            .collect();

        let removed = previous
            .entries
            .keys()
            .filter(|slot| !self.entries.contains_key(*slot))
            .map(|(kind, key)| (*kind, key.as_str()))
            .collect();

        (changed, removed)
    }
}

impl FromIterator<(String, PrimitiveValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, PrimitiveValue)>>(iter: I) -> Self {
        let mut snapshot = Snapshot::new();
        for (key, value) in iter {
            snapshot.set(key, value);
        }
        snapshot
    }
}
