//! Height-versioned tables.
//!
//! Every row is a sequence of versions keyed by the height that wrote them.
//! A version is either a value or a tombstone. Reading at height `h` returns
//! the newest version at or below `h`; rolling back to `h` drops every
//! version above it. Writes always land at the table's current height, so a
//! second write in the same block replaces the first.
//!
//! While a unit is open (`begin` .. `commit`/`abort`) every slot the table
//! touches is journaled with its prior contents, and `abort` replays the
//! journal backwards.

use std::collections::BTreeMap;
use std::ops::RangeBounds;

use xel_store::{DerivedTable, StoreError};

type Versions<V> = BTreeMap<u32, Option<V>>;

struct Undo<K, V> {
    key: K,
    height: u32,
    /// Slot contents before the write; `None` when the slot did not exist.
    prior: Option<Option<V>>,
}

pub struct VersionedTable<K, V> {
    name: &'static str,
    rows: BTreeMap<K, Versions<V>>,
    height: u32,
    journal: Option<Vec<Undo<K, V>>>,
}

impl<K: Ord + Clone, V: Clone> VersionedTable<K, V> {
    pub fn new(name: &'static str) -> Self {
        Self {
            name,
            rows: BTreeMap::new(),
            height: 0,
            journal: None,
        }
    }

    /// Height at which subsequent writes are stamped.
    pub fn set_height(&mut self, height: u32) {
        self.height = height;
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.rows
            .get(key)
            .and_then(|versions| versions.values().next_back())
            .and_then(Option::as_ref)
    }

    pub fn get_at(&self, key: &K, height: u32) -> Option<&V> {
        self.rows
            .get(key)
            .and_then(|versions| versions.range(..=height).next_back())
            .and_then(|(_, slot)| slot.as_ref())
    }

    pub fn contains(&self, key: &K) -> bool {
        self.get(key).is_some()
    }

    pub fn insert(&mut self, key: K, value: V) {
        let height = self.height;
        self.write_slot(key, height, Some(Some(value)));
    }

    /// Tombstone `key` at the current height. No-op for unknown keys.
    pub fn delete(&mut self, key: &K) {
        if self.get(key).is_none() {
            return;
        }
        let height = self.height;
        self.write_slot(key.clone(), height, Some(None));
    }

    /// Latest live rows in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.rows.iter().filter_map(|(key, versions)| {
            versions
                .values()
                .next_back()
                .and_then(Option::as_ref)
                .map(|value| (key, value))
        })
    }

    /// Rows live at `height`, in key order.
    pub fn iter_at(&self, height: u32) -> impl Iterator<Item = (&K, &V)> {
        self.rows.iter().filter_map(move |(key, versions)| {
            versions
                .range(..=height)
                .next_back()
                .and_then(|(_, slot)| slot.as_ref())
                .map(|value| (key, value))
        })
    }

    /// Latest live rows whose key falls in `range`.
    pub fn range<R: RangeBounds<K>>(&self, range: R) -> impl Iterator<Item = (&K, &V)> {
        self.rows.range(range).filter_map(|(key, versions)| {
            versions
                .values()
                .next_back()
                .and_then(Option::as_ref)
                .map(|value| (key, value))
        })
    }

    pub fn len(&self) -> usize {
        self.iter().count()
    }

    pub fn is_empty(&self) -> bool {
        self.iter().next().is_none()
    }

    /// Drop whole rows matching `pred`, journaled like any other write.
    pub fn purge(&mut self, mut pred: impl FnMut(&K) -> bool) {
        let doomed: Vec<K> = self.rows.keys().filter(|k| pred(k)).cloned().collect();
        for key in doomed {
            let heights: Vec<u32> = self
                .rows
                .get(&key)
                .map(|versions| versions.keys().copied().collect())
                .unwrap_or_default();
            for height in heights {
                self.write_slot(key.clone(), height, None);
            }
        }
    }

    pub fn in_unit(&self) -> bool {
        self.journal.is_some()
    }

    /// Set (`Some`) or remove (`None`) one version slot, journaling the
    /// previous contents when a unit is open.
    fn write_slot(&mut self, key: K, height: u32, slot: Option<Option<V>>) {
        let versions = self.rows.entry(key.clone()).or_default();
        let prior = match slot {
            Some(value) => versions.insert(height, value),
            None => versions.remove(&height),
        };
        if versions.is_empty() {
            self.rows.remove(&key);
        }
        if let Some(journal) = self.journal.as_mut() {
            journal.push(Undo { key, height, prior });
        }
    }

    fn restore_slot(&mut self, key: K, height: u32, prior: Option<Option<V>>) {
        let versions = self.rows.entry(key.clone()).or_default();
        match prior {
            Some(value) => {
                versions.insert(height, value);
            }
            None => {
                versions.remove(&height);
            }
        }
        if versions.is_empty() {
            self.rows.remove(&key);
        }
    }
}

impl<K: Ord + Clone, V: Clone> DerivedTable for VersionedTable<K, V> {
    fn name(&self) -> &'static str {
        self.name
    }

    fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    fn commit(&mut self) {
        self.journal = None;
    }

    fn abort(&mut self) {
        if let Some(journal) = self.journal.take() {
            for undo in journal.into_iter().rev() {
                self.restore_slot(undo.key, undo.height, undo.prior);
            }
        }
    }

    fn rollback(&mut self, height: u32) -> Result<(), StoreError> {
        let newer: Vec<(K, u32)> = self
            .rows
            .iter()
            .flat_map(|(key, versions)| {
                versions
                    .range(height.saturating_add(1)..)
                    .map(move |(h, _)| (key.clone(), *h))
            })
            .collect();
        for (key, h) in newer {
            self.write_slot(key, h, None);
        }
        Ok(())
    }

    fn truncate(&mut self) -> Result<(), StoreError> {
        let all: Vec<(K, u32)> = self
            .rows
            .iter()
            .flat_map(|(key, versions)| versions.keys().map(move |h| (key.clone(), *h)))
            .collect();
        for (key, h) in all {
            self.write_slot(key, h, None);
        }
        Ok(())
    }

    /// Collapse history at or below `height` into the single version that is
    /// visible at `height`; a row whose only remaining version is a
    /// tombstone disappears.
    fn trim(&mut self, height: u32) -> Result<(), StoreError> {
        let mut stale: Vec<(K, u32)> = Vec::new();
        for (key, versions) in &self.rows {
            let mut below = versions.range(..=height).rev();
            let Some((&kept, slot)) = below.next() else {
                continue;
            };
            stale.extend(below.map(|(h, _)| (key.clone(), *h)));
            let only_tombstone = slot.is_none() && versions.range(kept + 1..).next().is_none();
            if only_tombstone {
                stale.push((key.clone(), kept));
            }
        }
        for (key, h) in stale {
            self.write_slot(key, h, None);
        }
        Ok(())
    }
}
