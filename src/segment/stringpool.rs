//! String Pool
//!
//! Append-only arena of `(len: u16, bytes)` records. A string's id is its
//! record offset in the arena; offset 0 is reserved so ids are always
//! non-zero. Records are never moved or freed, which is what makes the ids
//! stable for the segment's lifetime.

use crate::types::{StringId, STRING_NONE};
use crate::{Result, SegmentError};

/// Byte arena of length-prefixed strings
#[derive(Debug)]
pub struct StringPool {
    bytes: Vec<u8>,
}

impl StringPool {
    pub fn new() -> Self {
        // Reserve offset 0 as the STRING_NONE sentinel.
        Self { bytes: vec![0] }
    }

    /// Rebuild a pool from persisted arena bytes, validating the record
    /// structure end to end.
    pub fn from_bytes(bytes: Vec<u8>) -> Result<Self> {
        if bytes.is_empty() || bytes[0] != 0 {
            return Err(SegmentError::Corruption(
                "string pool missing reserved sentinel byte".into(),
            ));
        }
        let pool = Self { bytes };
        // Walk every record once; iter() surfaces malformed spans.
        for entry in pool.iter() {
            entry?;
        }
        Ok(pool)
    }

    /// Append a string and return its id (the record offset).
    pub fn add(&mut self, s: &str) -> Result<StringId> {
        if s.is_empty() {
            return Err(SegmentError::InvalidArgument("empty string".into()));
        }
        if s.len() > u16::MAX as usize {
            return Err(SegmentError::InvalidArgument(format!(
                "string of {} bytes exceeds the {}-byte pool record limit",
                s.len(),
                u16::MAX
            )));
        }
        let offset = self.bytes.len();
        if offset as u64 + 2 + s.len() as u64 >= u32::MAX as u64 {
            return Err(SegmentError::OutOfSpace("string pool full".into()));
        }
        self.bytes.extend_from_slice(&(s.len() as u16).to_le_bytes());
        self.bytes.extend_from_slice(s.as_bytes());
        Ok(offset as StringId)
    }

    /// Resolve an id back to its string.
    pub fn get(&self, id: StringId) -> Result<&str> {
        let (s, _) = self.record_at(id)?;
        Ok(s)
    }

    /// Iterate `(id, string)` records in insertion order.
    pub fn iter(&self) -> StringPoolIter<'_> {
        StringPoolIter { pool: self, offset: 1 }
    }

    /// Raw arena bytes for persistence
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn record_at(&self, id: StringId) -> Result<(&str, usize)> {
        if id == STRING_NONE {
            return Err(SegmentError::Corruption(
                "string id 0 referenced as a real string".into(),
            ));
        }
        let at = id as usize;
        if at + 2 > self.bytes.len() {
            return Err(SegmentError::Corruption(format!(
                "string id {} beyond pool end {}",
                id,
                self.bytes.len()
            )));
        }
        let len = u16::from_le_bytes([self.bytes[at], self.bytes[at + 1]]) as usize;
        let start = at + 2;
        if len == 0 || start + len > self.bytes.len() {
            return Err(SegmentError::Corruption(format!(
                "string record at {} has bad length {}",
                id, len
            )));
        }
        let s = std::str::from_utf8(&self.bytes[start..start + len]).map_err(|_| {
            SegmentError::Corruption(format!("string record at {} is not UTF-8", id))
        })?;
        Ok((s, 2 + len))
    }
}

impl Default for StringPool {
    fn default() -> Self {
        Self::new()
    }
}

pub struct StringPoolIter<'a> {
    pool: &'a StringPool,
    offset: usize,
}

impl<'a> Iterator for StringPoolIter<'a> {
    type Item = Result<(StringId, &'a str)>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.offset >= self.pool.bytes.len() {
            return None;
        }
        let id = self.offset as StringId;
        match self.pool.record_at(id) {
            Ok((s, span)) => {
                self.offset += span;
                Some(Ok((id, s)))
            }
            Err(e) => {
                // Stop after surfacing the malformed record.
                self.offset = self.pool.bytes.len();
                Some(Err(e))
            }
        }
    }
}
