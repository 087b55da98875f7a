//! Segment base types and sentinels
//!
//! The on-disk format reserves a handful of raw sentinel values (doc 0,
//! string 0, offset 0xFFFFFFFF). In-memory code prefers `Option`; the raw
//! sentinels appear only at the byte-region boundary.

use serde::{Deserialize, Serialize};

/// Document ID (32-bit, allocated monotonically, never reused)
pub type DocId = u32;

/// String ID: byte offset of the interned string in the pool (non-zero)
pub type StringId = u32;

/// Reserved "no document" doc id
pub const DOCID_NONE: DocId = 0;

/// Reserved "not a string" string id
pub const STRING_NONE: StringId = 0;

/// Sentinel field id marking a label term
pub const FIELD_LABEL: StringId = 0;

/// Reserved "no posting" region offset
pub const OFFSET_NONE: u32 = u32::MAX;

/// Term directory key: `(field_id, word_id)`
///
/// `field == FIELD_LABEL` marks a label term; `DEAD_LIST_KEY` is the free
/// list of reclaimed label postings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TermKey {
    pub field: StringId,
    pub word: StringId,
}

impl TermKey {
    pub fn new(field: StringId, word: StringId) -> Self {
        Self { field, word }
    }

    pub fn label(word: StringId) -> Self {
        Self { field: FIELD_LABEL, word }
    }
}

/// The dead list lives under the all-zero key. It is a real termhash entry,
/// never an empty slot.
pub const DEAD_LIST_KEY: TermKey = TermKey { field: 0, word: 0 };

/// Postings-list header, stored inline in the termhash
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostingsListHeader {
    /// Number of postings in the list
    pub count: u32,

    /// Region-relative offset of the head posting, `OFFSET_NONE` when empty
    pub head_offset: u32,
}

impl PostingsListHeader {
    pub fn empty() -> Self {
        Self { count: 0, head_offset: OFFSET_NONE }
    }

    pub fn head(&self) -> Option<u32> {
        offset_to_opt(self.head_offset)
    }

    pub fn is_empty(&self) -> bool {
        self.head_offset == OFFSET_NONE
    }
}

/// Raw offset -> tagged offset
pub(crate) fn offset_to_opt(raw: u32) -> Option<u32> {
    if raw == OFFSET_NONE {
        None
    } else {
        Some(raw)
    }
}

/// Tagged offset -> raw offset
pub(crate) fn offset_to_raw(offset: Option<u32>) -> u32 {
    offset.unwrap_or(OFFSET_NONE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_header() {
        let plh = PostingsListHeader::empty();
        assert!(plh.is_empty());
        assert_eq!(plh.count, 0);
        assert_eq!(plh.head(), None);
    }

    #[test]
    fn test_offset_tagging() {
        assert_eq!(offset_to_opt(OFFSET_NONE), None);
        assert_eq!(offset_to_opt(0), Some(0));
        assert_eq!(offset_to_raw(None), OFFSET_NONE);
        assert_eq!(offset_to_raw(Some(16)), 16);
    }

    #[test]
    fn test_dead_list_key_is_all_zero() {
        assert_eq!(DEAD_LIST_KEY, TermKey::new(FIELD_LABEL, STRING_NONE));
    }
}
