//! String Map (intern table)
//!
//! Open-addressed, linear-probing table from string bytes to pool ids. The
//! table stores only ids; string bytes live in the pool. Empty slots hold
//! `STRING_NONE`, which is safe because no real record sits at pool offset 0.
//!
//! Two calls to `intern` with equal inputs return the same id, and ids never
//! change. The table itself is not persisted: `Segment::open` rebuilds it by
//! replaying the pool arena.
//!
//! Growth happens only through `grow`, driven by `Segment::ensure_fit`;
//! an insert past half load fails with `OutOfSpace` instead of resizing.

use crate::segment::stringpool::StringPool;
use crate::types::{StringId, STRING_NONE};
use crate::{Result, SegmentError};
use std::hash::{BuildHasher, Hasher};

/// Fixed seeds: probe order must be deterministic within a process. Nothing
/// hashed is persisted, so cross-version stability is not required.
const HASH_SEEDS: (u64, u64, u64, u64) = (
    0x6b77_6f72_6421_7465,
    0x7465_726e_6462_2e73,
    0x9e37_79b9_7f4a_7c15,
    0x2545_f491_4f6c_dd1d,
);

const MIN_CAPACITY: usize = 8;

/// Intern table over a [`StringPool`]
#[derive(Debug)]
pub struct StringMap {
    slots: Vec<StringId>,
    len: usize,
    hasher: ahash::RandomState,
}

impl StringMap {
    pub fn with_capacity(capacity: usize) -> Self {
        let capacity = capacity.max(MIN_CAPACITY).next_power_of_two();
        Self {
            slots: vec![STRING_NONE; capacity],
            len: 0,
            hasher: ahash::RandomState::with_seeds(
                HASH_SEEDS.0,
                HASH_SEEDS.1,
                HASH_SEEDS.2,
                HASH_SEEDS.3,
            ),
        }
    }

    /// Number of interned strings
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

    /// Would inserting `headroom` more strings exceed half load?
    pub fn needs_grow(&self, headroom: usize) -> bool {
        (self.len + headroom) * 2 > self.slots.len()
    }

    /// Find an interned string without allocating.
    pub fn lookup(&self, pool: &StringPool, s: &str) -> Result<Option<StringId>> {
        let mask = self.slots.len() - 1;
        let mut idx = self.hash(s) as usize & mask;
        loop {
            let id = self.slots[idx];
            if id == STRING_NONE {
                return Ok(None);
            }
            if pool.get(id)? == s {
                return Ok(Some(id));
            }
            idx = (idx + 1) & mask;
        }
    }

    /// Return the existing id for `s`, or allocate one in the pool.
    pub fn intern(&mut self, pool: &mut StringPool, s: &str) -> Result<StringId> {
        if let Some(id) = self.lookup(pool, s)? {
            return Ok(id);
        }
        if self.needs_grow(1) {
            return Err(SegmentError::OutOfSpace(
                "string map over half load; ensure_fit was not called".into(),
            ));
        }
        let id = pool.add(s)?;
        self.place(pool, id)?;
        self.len += 1;
        Ok(id)
    }

    /// Re-register an id already present in the pool (rebuild on open).
    pub fn insert_id(&mut self, pool: &StringPool, id: StringId) -> Result<()> {
        if self.needs_grow(1) {
            self.grow(pool)?;
        }
        self.place(pool, id)?;
        self.len += 1;
        Ok(())
    }

    /// Double the table and rehash every resident id.
    pub fn grow(&mut self, pool: &StringPool) -> Result<()> {
        let doubled = self.slots.len() * 2;
        let old = std::mem::replace(&mut self.slots, vec![STRING_NONE; doubled]);
        for id in old {
            if id != STRING_NONE {
                self.place(pool, id)?;
            }
        }
        Ok(())
    }

    fn place(&mut self, pool: &StringPool, id: StringId) -> Result<()> {
        let s = pool.get(id)?;
        let mask = self.slots.len() - 1;
        let mut idx = self.hash(s) as usize & mask;
        while self.slots[idx] != STRING_NONE {
            idx = (idx + 1) & mask;
        }
        self.slots[idx] = id;
        Ok(())
    }

    fn hash(&self, s: &str) -> u64 {
        let mut h = self.hasher.build_hasher();
        h.write(s.as_bytes());
        h.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intern_is_stable() {
        let mut pool = StringPool::new();
        let mut map = StringMap::with_capacity(16);

        let a = map.intern(&mut pool, "body").unwrap();
        let b = map.intern(&mut pool, "subject").unwrap();
        let a2 = map.intern(&mut pool, "body").unwrap();

        assert_eq!(a, a2);
        assert_ne!(a, b);
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_lookup_absent() {
        let mut pool = StringPool::new();
        let mut map = StringMap::with_capacity(16);
        map.intern(&mut pool, "present").unwrap();

        assert_eq!(map.lookup(&pool, "absent").unwrap(), None);
        assert!(map.lookup(&pool, "present").unwrap().is_some());
    }

    #[test]
    fn test_full_table_refuses_insert() {
        let mut pool = StringPool::new();
        let mut map = StringMap::with_capacity(8);

        for i in 0..4 {
            map.intern(&mut pool, &format!("w{}", i)).unwrap();
        }
        // Half load reached; the next new string must not resize in place.
        let err = map.intern(&mut pool, "overflow").unwrap_err();
        assert!(matches!(err, SegmentError::OutOfSpace(_)));

        // Existing strings still resolve.
        assert!(map.lookup(&pool, "w3").unwrap().is_some());
    }

    #[test]
    fn test_grow_preserves_ids() {
        let mut pool = StringPool::new();
        let mut map = StringMap::with_capacity(8);

        let mut ids = Vec::new();
        for i in 0..4 {
            ids.push((format!("w{}", i), map.intern(&mut pool, &format!("w{}", i)).unwrap()));
        }
        map.grow(&pool).unwrap();
        for (s, id) in &ids {
            assert_eq!(map.lookup(&pool, s).unwrap(), Some(*id));
            assert_eq!(map.intern(&mut pool, s).unwrap(), *id);
        }
    }

    #[test]
    fn test_rebuild_from_pool() {
        let mut pool = StringPool::new();
        let mut map = StringMap::with_capacity(16);
        let id = map.intern(&mut pool, "starred").unwrap();

        // Fresh map over the same pool, as Segment::open does.
        let mut rebuilt = StringMap::with_capacity(16);
        for entry in pool.iter() {
            let (pool_id, _) = entry.unwrap();
            rebuilt.insert_id(&pool, pool_id).unwrap();
        }
        assert_eq!(rebuilt.lookup(&pool, "starred").unwrap(), Some(id));
        assert_eq!(rebuilt.len(), map.len());
    }
}
