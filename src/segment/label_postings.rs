//! Label Postings (mutable, free-listed)
//!
//! Labels are boolean tags on documents. Their postings are fixed-size
//! records, which is what makes reclamation possible: a removed posting is
//! unlinked from its term list and pushed onto the dead list, and the next
//! insertion pops it before carving fresh bytes at the region head.
//!
//! Record layout (little-endian): `doc_id: u32 | next_offset: u32`
//!
//! Lists stay strictly descending by doc id; every walk verifies this and
//! treats a violation as corruption. The functions here mutate copies of the
//! postings-list headers; the segment facade writes them back to the
//! termhash after a successful call.

use crate::segment::region::PostingsRegion;
use crate::types::{offset_to_opt, offset_to_raw, DocId, PostingsListHeader, DOCID_NONE};
use crate::{Result, SegmentError};

/// Fixed size of one label posting
pub const LABEL_POSTING_BYTES: u32 = 8;

/// One decoded label posting
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LabelPosting {
    pub doc_id: DocId,
    /// Raw offset of the next posting (`OFFSET_NONE` at the tail)
    pub next_offset: u32,
}

/// Decode the label posting at `offset`.
pub fn read(region: &PostingsRegion, offset: u32) -> Result<LabelPosting> {
    let buf = region.record(offset, LABEL_POSTING_BYTES as usize)?;
    Ok(LabelPosting {
        doc_id: u32::from_le_bytes([buf[0], buf[1], buf[2], buf[3]]),
        next_offset: u32::from_le_bytes([buf[4], buf[5], buf[6], buf[7]]),
    })
}

fn write(region: &mut PostingsRegion, offset: u32, doc_id: DocId, next_offset: u32) -> Result<()> {
    let buf = region.record_mut(offset, LABEL_POSTING_BYTES as usize)?;
    buf[0..4].copy_from_slice(&doc_id.to_le_bytes());
    buf[4..8].copy_from_slice(&next_offset.to_le_bytes());
    Ok(())
}

fn set_next(region: &mut PostingsRegion, offset: u32, next_offset: u32) -> Result<()> {
    let buf = region.record_mut(offset, LABEL_POSTING_BYTES as usize)?;
    buf[4..8].copy_from_slice(&next_offset.to_le_bytes());
    Ok(())
}

/// Add `doc_id` to the label list behind `plh`.
///
/// The list is kept descending, so the walk stops at the first posting with
/// a doc id at or below the new one. An exact match is a silent no-op.
/// Storage comes from the dead list when it has entries; only a miss there
/// carves fresh bytes and advances the region head.
pub fn add_label(
    region: &mut PostingsRegion,
    doc_id: DocId,
    plh: &mut PostingsListHeader,
    dead_plh: &mut PostingsListHeader,
) -> Result<()> {
    if doc_id == DOCID_NONE {
        return Err(SegmentError::InvalidArgument(
            "can't add a label to doc 0".into(),
        ));
    }

    // Find the insertion point between prev and next.
    let mut next = plh.head();
    let mut prev: Option<u32> = None;
    let mut last_docid: Option<DocId> = None;

    while let Some(offset) = next {
        let lp = read(region, offset)?;
        check_descending(offset, lp.doc_id, prev, &mut last_docid)?;

        if lp.doc_id == doc_id {
            // Already labeled.
            return Ok(());
        }
        if lp.doc_id < doc_id {
            break;
        }
        prev = Some(offset);
        next = offset_to_opt(lp.next_offset);
    }

    // Reuse a dead posting if one is available, else carve at the head.
    let (entry_offset, fresh) = match dead_plh.head() {
        Some(dead_offset) => {
            let dead = read(region, dead_offset)?;
            if dead_plh.count == 0 {
                return Err(SegmentError::Corruption(
                    "dead list has entries but count 0".into(),
                ));
            }
            dead_plh.head_offset = dead.next_offset;
            dead_plh.count -= 1;
            (dead_offset, false)
        }
        None => (region.head(), true),
    };

    write(region, entry_offset, doc_id, offset_to_raw(next))?;
    if fresh {
        region.set_head(entry_offset + LABEL_POSTING_BYTES);
    }

    match prev {
        None => plh.head_offset = entry_offset,
        Some(prev_offset) => set_next(region, prev_offset, entry_offset)?,
    }
    plh.count += 1;
    Ok(())
}

/// Remove `doc_id` from the label list behind `plh`.
///
/// Absence is a silent no-op: the walk simply terminates once it passes the
/// target doc id. A removed posting goes to the head of the dead list.
pub fn remove_label(
    region: &mut PostingsRegion,
    doc_id: DocId,
    plh: &mut PostingsListHeader,
    dead_plh: &mut PostingsListHeader,
) -> Result<()> {
    let mut next = plh.head();
    let mut prev: Option<u32> = None;
    let mut last_docid: Option<DocId> = None;
    let mut found: Option<(u32, LabelPosting)> = None;

    while let Some(offset) = next {
        let lp = read(region, offset)?;
        check_descending(offset, lp.doc_id, prev, &mut last_docid)?;

        if lp.doc_id == doc_id {
            found = Some((offset, lp));
            break;
        }
        if lp.doc_id < doc_id {
            break;
        }
        prev = Some(offset);
        next = offset_to_opt(lp.next_offset);
    }

    let Some((offset, lp)) = found else {
        return Ok(());
    };

    // Unlink from the label list.
    match prev {
        None => plh.head_offset = lp.next_offset,
        Some(prev_offset) => set_next(region, prev_offset, lp.next_offset)?,
    }
    if plh.count == 0 {
        return Err(SegmentError::Corruption(
            "label list has postings but count 0".into(),
        ));
    }
    plh.count -= 1;

    // Push onto the dead list for reuse.
    set_next(region, offset, dead_plh.head_offset)?;
    dead_plh.head_offset = offset;
    dead_plh.count += 1;
    Ok(())
}

/// Collect the doc ids in a label list, verifying the ordering invariant.
pub fn collect_docs(region: &PostingsRegion, plh: &PostingsListHeader) -> Result<Vec<DocId>> {
    let mut docs = Vec::with_capacity(plh.count as usize);
    let mut next = plh.head();
    let mut prev: Option<u32> = None;
    let mut last_docid: Option<DocId> = None;

    while let Some(offset) = next {
        let lp = read(region, offset)?;
        check_descending(offset, lp.doc_id, prev, &mut last_docid)?;
        docs.push(lp.doc_id);
        prev = Some(offset);
        next = offset_to_opt(lp.next_offset);
    }
    Ok(docs)
}

fn check_descending(
    offset: u32,
    doc_id: DocId,
    prev: Option<u32>,
    last_docid: &mut Option<DocId>,
) -> Result<()> {
    if let Some(last) = *last_docid {
        if doc_id >= last {
            return Err(SegmentError::Corruption(format!(
                "label posting at {} has doc {} but the posting at {:?} had doc {}",
                offset, doc_id, prev, last
            )));
        }
    }
    *last_docid = Some(doc_id);
    Ok(())
}
