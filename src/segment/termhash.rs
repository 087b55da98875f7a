//! Term Hash (term directory)
//!
//! Open-addressed, linear-probing table from `(field_id, word_id)` to the
//! postings-list header for that term. Headers are stored inline and small,
//! so lookups copy them out and mutations write them back with `set`.
//!
//! Occupancy is a tag on the slot (`Option`), not a reserved key value. That
//! matters because the dead-list key `(0,0)` is a legitimate, materialized
//! entry; with a tagged slot it can never be mistaken for an empty one.
//!
//! Terms are never deleted, so there is no tombstone scheme. Growth happens
//! only through `grow`, driven by `Segment::ensure_fit`.

use crate::types::{PostingsListHeader, TermKey};
use crate::{Result, SegmentError};

/// Fixed seeds for deterministic probe order within a process. The snapshot
/// persists entries, not slots, so hashes never reach disk.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x7465_726d_6861_7368,
    0x6669_656c_6427_776f,
    0x94d0_49bb_1331_11eb,
    0xbf58_476d_1ce4_e5b9,
);

const MIN_CAPACITY: usize = 8;

/// Directory of every term in the segment
#[derive(Debug)]
pub struct TermHash {
    slots: Vec<Option<(TermKey, PostingsListHeader)>>,
    len: usize,
    hasher: ahash::RandomState,
}

impl TermHash {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            slots: vec![None; capacity],
            len: 0,
            hasher: ahash::RandomState::with_seeds(
                HASH_SEEDS.0,
                HASH_SEEDS.1,
                HASH_SEEDS.2,
                HASH_SEEDS.3,
            ),
        }
    }

    /// Number of resident terms
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Slot count
    pub fn capacity(&self) -> usize {
        self.slots.len()
    }

    /// Would inserting `headroom` more terms exceed half load?
    pub fn needs_grow(&self, headroom: usize) -> bool {
        (self.len + headroom) * 2 > self.slots.len()
    }

    /// Copy out the header stored for `key`, if any.
    pub fn get(&self, key: TermKey) -> Option<PostingsListHeader> {
        let mask = self.slots.len() - 1;
        let mut idx = self.hash(key) as usize & mask;
        loop {
            match self.slots[idx] {
                None => return None,
                Some((k, plh)) if k == key => return Some(plh),
                Some(_) => idx = (idx + 1) & mask,
            }
        }
    }

    /// Insert or update the header for `key`. Inserting a new term past half
    /// load fails with `OutOfSpace` rather than resizing in place.
    pub fn set(&mut self, key: TermKey, plh: PostingsListHeader) -> Result<()> {
        let mask = self.slots.len() - 1;
        let mut idx = self.hash(key) as usize & mask;
        loop {
            match self.slots[idx] {
                Some((k, _)) if k == key => {
                    self.slots[idx] = Some((key, plh));
                    return Ok(());
                }
                Some(_) => idx = (idx + 1) & mask,
                None => {
                    if self.needs_grow(1) {
                        return Err(SegmentError::OutOfSpace(
                            "term hash over half load; ensure_fit was not called".into(),
                        ));
                    }
                    self.slots[idx] = Some((key, plh));
                    self.len += 1;
                    return Ok(());
                }
            }
        }
    }

    /// Double the table and rehash every resident entry.
    pub fn grow(&mut self) {
        let doubled = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, vec![None; doubled]);
        let mask = doubled - 1;
        for entry in old.into_iter().flatten() {
            let mut idx = self.hash(entry.0) as usize & mask;
            while self.slots[idx].is_some() {
                idx = (idx + 1) & mask;
            }
            self.slots[idx] = Some(entry);
        }
    }

    /// Iterate resident `(key, header)` entries in unspecified order.
    pub fn iter(&self) -> impl Iterator<Item = (TermKey, PostingsListHeader)> + '_ {
        self.slots.iter().filter_map(|slot| *slot)
    }

    fn hash(&self, key: TermKey) -> u64 {
        use std::hash::{BuildHasher, Hash, Hasher};
        let mut h = self.hasher.build_hasher();
        key.hash(&mut h);
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::DEAD_LIST_KEY;

    #[test]
    fn test_set_and_get() {
        let mut th = TermHash::with_capacity(16);
        let key = TermKey::new(3, 9);

        assert_eq!(th.get(key), None);
        th.set(key, PostingsListHeader { count: 1, head_offset: 0 }).unwrap();
        assert_eq!(th.get(key).unwrap().count, 1);

        // Update in place.
        th.set(key, PostingsListHeader { count: 2, head_offset: 24 }).unwrap();
        assert_eq!(th.get(key).unwrap().head_offset, 24);
        assert_eq!(th.len(), 1);
    }

    #[test]
    fn test_dead_list_key_is_distinguishable_from_empty() {
        let mut th = TermHash::with_capacity(16);

        assert_eq!(th.get(DEAD_LIST_KEY), None);
        th.set(DEAD_LIST_KEY, PostingsListHeader::empty()).unwrap();

        let stored = th.get(DEAD_LIST_KEY).unwrap();
        assert!(stored.is_empty());
        assert_eq!(th.len(), 1);
    }

    #[test]
    fn test_full_table_refuses_insert() {
        let mut th = TermHash::with_capacity(8);
        for i in 0..4 {
            th.set(TermKey::new(1, i), PostingsListHeader::empty()).unwrap();
        }
        let err = th
            .set(TermKey::new(1, 99), PostingsListHeader::empty())
            .unwrap_err();
        assert!(matches!(err, SegmentError::OutOfSpace(_)));

        // Updates of resident keys still succeed at full load.
        th.set(TermKey::new(1, 0), PostingsListHeader { count: 7, head_offset: 8 })
            .unwrap();
        assert_eq!(th.get(TermKey::new(1, 0)).unwrap().count, 7);
    }

    #[test]
    fn test_grow_preserves_entries() {
        let mut th = TermHash::with_capacity(8);
        for i in 0..4 {
            th.set(
                TermKey::new(2, i),
                PostingsListHeader { count: i, head_offset: i * 8 },
            )
            .unwrap();
        }
        th.grow();
        assert_eq!(th.capacity(), 16);
        for i in 0..4 {
            let plh = th.get(TermKey::new(2, i)).unwrap();
            assert_eq!(plh.count, i);
            assert_eq!(plh.head_offset, i * 8);
        }
    }

    #[test]
    fn test_iter_covers_all_entries() {
        let mut th = TermHash::with_capacity(16);
        th.set(TermKey::new(1, 10), PostingsListHeader::empty()).unwrap();
        th.set(TermKey::new(1, 20), PostingsListHeader::empty()).unwrap();
        th.set(DEAD_LIST_KEY, PostingsListHeader::empty()).unwrap();

        let mut keys: Vec<_> = th.iter().map(|(k, _)| k).collect();
        keys.sort_by_key(|k| (k.field, k.word));
        assert_eq!(
            keys,
            vec![DEAD_LIST_KEY, TermKey::new(1, 10), TermKey::new(1, 20)]
        );
    }
}
