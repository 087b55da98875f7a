//! Text Postings (append-only)
//!
//! One record per `(term, document)` pair, holding every position of the
//! word in that document. Records are written once at the region head and
//! never updated or freed; list membership is the `next_offset` chain, which
//! always points at strictly smaller doc ids.
//!
//! Record layout (little-endian), zero-padded to the next 8-byte boundary:
//! `doc_id: u32 | next_offset: u32 | num_positions: u16 | positions: [u16]`
//!
//! Positions are absolute token offsets (no delta encoding), strictly
//! ascending within the record.

use crate::segment::region::PostingsRegion;
use crate::types::{DocId, DOCID_NONE};
use crate::{Result, SegmentError};

/// Fixed prefix: doc_id (4) + next_offset (4) + num_positions (2)
const FIXED_BYTES: usize = 10;

/// One decoded text posting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TextPosting {
    pub doc_id: DocId,
    /// Raw offset of the next posting (`OFFSET_NONE` at the tail)
    pub next_offset: u32,
    pub positions: Vec<u16>,
}

/// Encoded size of a posting with `num_positions` positions.
pub fn encoded_len(num_positions: usize) -> u32 {
    let raw = FIXED_BYTES + 2 * num_positions;
    ((raw + 7) & !7) as u32
}

/// Append a posting at the region head and return its offset.
///
/// The caller links the returned offset into a postings list and must have
/// reserved room via `ensure_fit`; running out of room here is an error, not
/// a trigger for growth.
pub fn append(
    region: &mut PostingsRegion,
    doc_id: DocId,
    positions: &[u16],
    next_offset: u32,
) -> Result<u32> {
    if doc_id == DOCID_NONE {
        return Err(SegmentError::InvalidArgument(
            "can't add a posting for doc 0".into(),
        ));
    }
    if positions.is_empty() {
        return Err(SegmentError::InvalidArgument(
            "a text posting needs at least one position".into(),
        ));
    }
    if positions.len() > u16::MAX as usize {
        return Err(SegmentError::InvalidArgument(format!(
            "{} positions exceed the per-posting limit",
            positions.len()
        )));
    }
    if !positions.windows(2).all(|w| w[0] < w[1]) {
        return Err(SegmentError::InvalidArgument(
            "positions must be strictly ascending".into(),
        ));
    }

    let len = encoded_len(positions.len());
    let offset = region.head();
    let buf = region.record_mut(offset, len as usize)?;

    buf[0..4].copy_from_slice(&doc_id.to_le_bytes());
    buf[4..8].copy_from_slice(&next_offset.to_le_bytes());
    buf[8..10].copy_from_slice(&(positions.len() as u16).to_le_bytes());
    let mut at = FIXED_BYTES;
    for &pos in positions {
        buf[at..at + 2].copy_from_slice(&pos.to_le_bytes());
        at += 2;
    }
    // Zero the alignment padding so region bytes stay deterministic.
    for b in buf[at..len as usize].iter_mut() {
        *b = 0;
    }

    region.set_head(offset + len);
    Ok(offset)
}

/// Decode the posting at `offset`.
pub fn read(region: &PostingsRegion, offset: u32) -> Result<TextPosting> {
    let fixed = region.record(offset, FIXED_BYTES)?;
    let doc_id = u32::from_le_bytes([fixed[0], fixed[1], fixed[2], fixed[3]]);
    let next_offset = u32::from_le_bytes([fixed[4], fixed[5], fixed[6], fixed[7]]);
    let num_positions = u16::from_le_bytes([fixed[8], fixed[9]]) as usize;

    if doc_id == DOCID_NONE {
        return Err(SegmentError::Corruption(format!(
            "text posting at {} has doc id 0",
            offset
        )));
    }
    if num_positions == 0 {
        return Err(SegmentError::Corruption(format!(
            "text posting at {} has no positions",
            offset
        )));
    }

    let body = region.record(offset, encoded_len(num_positions) as usize)?;
    let mut positions = Vec::with_capacity(num_positions);
    let mut at = FIXED_BYTES;
    for _ in 0..num_positions {
        positions.push(u16::from_le_bytes([body[at], body[at + 1]]));
        at += 2;
    }

    Ok(TextPosting { doc_id, next_offset, positions })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::segment::region::{PostingsRegion, RegionKind};
    use crate::types::OFFSET_NONE;
    use tempfile::TempDir;

    fn text_region(capacity: u32) -> (TempDir, PostingsRegion) {
        let dir = TempDir::new().unwrap();
        let region =
            PostingsRegion::create(&dir.path().join("text.postings"), RegionKind::Text, capacity)
                .unwrap();
        (dir, region)
    }

    #[test]
    fn test_encoded_len_is_aligned() {
        for n in 1..32 {
            let len = encoded_len(n);
            assert_eq!(len % 8, 0);
            assert!(len as usize >= FIXED_BYTES + 2 * n);
        }
    }

    #[test]
    fn test_append_and_read() {
        let (_dir, mut region) = text_region(1024);

        let off = append(&mut region, 1, &[0, 5, 9], OFFSET_NONE).unwrap();
        assert_eq!(off, 0);
        assert_eq!(region.head(), encoded_len(3));

        let posting = read(&region, off).unwrap();
        assert_eq!(posting.doc_id, 1);
        assert_eq!(posting.next_offset, OFFSET_NONE);
        assert_eq!(posting.positions, vec![0, 5, 9]);
    }

    #[test]
    fn test_chained_appends() {
        let (_dir, mut region) = text_region(1024);

        let first = append(&mut region, 1, &[0], OFFSET_NONE).unwrap();
        let second = append(&mut region, 2, &[1], first).unwrap();

        let head = read(&region, second).unwrap();
        assert_eq!(head.doc_id, 2);
        let tail = read(&region, head.next_offset).unwrap();
        assert_eq!(tail.doc_id, 1);
        assert_eq!(tail.next_offset, OFFSET_NONE);
    }

    #[test]
    fn test_append_rejects_bad_input() {
        let (_dir, mut region) = text_region(1024);

        assert!(matches!(
            append(&mut region, 0, &[0], OFFSET_NONE).unwrap_err(),
            SegmentError::InvalidArgument(_)
        ));
        assert!(matches!(
            append(&mut region, 1, &[], OFFSET_NONE).unwrap_err(),
            SegmentError::InvalidArgument(_)
        ));
        assert!(matches!(
            append(&mut region, 1, &[4, 4], OFFSET_NONE).unwrap_err(),
            SegmentError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_append_without_room_is_out_of_space() {
        let (_dir, mut region) = text_region(8);
        let err = append(&mut region, 1, &[0], OFFSET_NONE).unwrap_err();
        assert!(matches!(err, SegmentError::OutOfSpace(_)));
        // A failed append must not move the head.
        assert_eq!(region.head(), 0);
    }

    #[test]
    fn test_read_beyond_head_is_corruption() {
        let (_dir, mut region) = text_region(1024);
        append(&mut region, 1, &[0], OFFSET_NONE).unwrap();

        let err = read(&region, region.head()).unwrap_err();
        assert!(matches!(err, SegmentError::Corruption(_)));
    }
}
