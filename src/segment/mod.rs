//! Segment
//!
//! A segment is a self-contained index shard: two postings regions, the
//! string pool/map, and the term directory, living together in one
//! directory on disk.
//!
//! Write path: callers (the tokenizer side) push `(field, word, doc_id,
//! positions)` into `add_posting` and label changes into `add_label` /
//! `remove_label`. Doc ids come from `grab_docid` and are monotonic, which
//! keeps every postings list strictly descending and every insert O(1) at
//! the list head.
//!
//! Space: callers invoke `ensure_fit` before mutating. Regions and tables
//! never grow inside a mutation, so offsets held in locals cannot dangle;
//! a mutation that outruns its reservation fails with `OutOfSpace`.
//!
//! Corruption is fatal: once any walk reports a broken invariant the
//! segment poisons itself and every later call fails fast.

pub mod label_postings;
pub mod region;
pub mod stringmap;
pub mod stringpool;
pub mod termhash;
pub mod text_postings;

use crate::config::SegmentConfig;
use crate::query::{search, Query};
use crate::types::{
    DocId, PostingsListHeader, StringId, TermKey, DEAD_LIST_KEY, DOCID_NONE, STRING_NONE,
};
use crate::{Result, SegmentError};
use region::{PostingsRegion, RegionKind};
use serde::{Deserialize, Serialize};
use std::cell::Cell;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};
use stringmap::StringMap;
use stringpool::StringPool;
use termhash::TermHash;

/// Segment directory file names
const TEXT_FILE: &str = "text.postings";
const LABEL_FILE: &str = "label.postings";
const POOL_FILE: &str = "strings.pool";
const TERMS_FILE: &str = "terms.bin";
const META_FILE: &str = "meta.json";

/// Current segment format version
const SEGMENT_FORMAT_VERSION: u32 = 1;

/// Manifest persisted as `meta.json`; counters are cross-checked against the
/// region headers and table sizes on open.
#[derive(Debug, Serialize, Deserialize)]
struct SegmentManifest {
    version: u32,
    num_docs: u32,
    num_postings: u32,
    num_terms: usize,
    num_strings: usize,
}

/// Segment statistics snapshot
#[derive(Debug, Clone, Default)]
pub struct SegmentStats {
    /// Documents allocated so far (== max doc id)
    pub num_docs: u32,
    /// Text postings written
    pub num_postings: u32,
    /// Resident terms, the dead-list entry excluded
    pub num_terms: usize,
    /// Interned strings
    pub num_strings: usize,
    pub postings_capacity: u32,
    pub postings_used: u32,
    pub label_capacity: u32,
    pub label_used: u32,
    /// Reclaimed label postings waiting for reuse
    pub dead_labels: u32,
}

/// An open index segment
#[derive(Debug)]
pub struct Segment {
    path: PathBuf,
    text: PostingsRegion,
    labels: PostingsRegion,
    pool: StringPool,
    strings: StringMap,
    terms: TermHash,
    poisoned: Cell<bool>,
}

impl Segment {
    /// Create a fresh segment directory.
    pub fn create<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::create_with_config(path, SegmentConfig::default())
    }

    /// Create with explicit sizing.
    pub fn create_with_config<P: AsRef<Path>>(path: P, config: SegmentConfig) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        std::fs::create_dir_all(&path)?;
        if path.join(META_FILE).exists() {
            return Err(SegmentError::InvalidArgument(format!(
                "segment already exists at {}",
                path.display()
            )));
        }

        let text = PostingsRegion::create(
            &path.join(TEXT_FILE),
            RegionKind::Text,
            config.initial_postings_bytes,
        )?;
        let labels = PostingsRegion::create(
            &path.join(LABEL_FILE),
            RegionKind::Label,
            config.initial_label_bytes,
        )?;

        let pool = StringPool::new();
        let strings = StringMap::with_capacity(config.stringmap_capacity);
        let mut terms = TermHash::with_capacity(config.termhash_capacity);
        // The dead list is a real entry from day one, never an empty slot.
        terms.set(DEAD_LIST_KEY, PostingsListHeader::empty())?;

        let mut segment = Self {
            path,
            text,
            labels,
            pool,
            strings,
            terms,
            poisoned: Cell::new(false),
        };
        segment.flush()?;
        Ok(segment)
    }

    /// Open an existing segment directory, validating the manifest against
    /// the region headers and rebuilding the in-memory tables.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let meta_path = path.join(META_FILE);
        if !meta_path.exists() {
            return Err(SegmentError::SegmentNotFound(path));
        }

        let manifest: SegmentManifest = serde_json::from_slice(&std::fs::read(&meta_path)?)?;
        if manifest.version != SEGMENT_FORMAT_VERSION {
            return Err(SegmentError::Corruption(format!(
                "unsupported segment version {} at {}",
                manifest.version,
                path.display()
            )));
        }

        let text = PostingsRegion::open(&path.join(TEXT_FILE), RegionKind::Text)?;
        let labels = PostingsRegion::open(&path.join(LABEL_FILE), RegionKind::Label)?;

        let pool = StringPool::from_bytes(std::fs::read(path.join(POOL_FILE))?)?;
        let mut strings = StringMap::with_capacity((manifest.num_strings + 1) * 2);
        for entry in pool.iter() {
            let (id, _) = entry?;
            strings.insert_id(&pool, id)?;
        }

        let entries: Vec<(TermKey, PostingsListHeader)> =
            bincode::deserialize(&std::fs::read(path.join(TERMS_FILE))?)?;
        let mut terms = TermHash::with_capacity((entries.len() + 1) * 2);
        for (key, plh) in &entries {
            terms.set(*key, *plh)?;
        }

        if manifest.num_docs != text.num_docs()
            || manifest.num_postings != text.num_postings()
            || manifest.num_terms != entries.len().saturating_sub(1)
            || manifest.num_strings != strings.len()
        {
            return Err(SegmentError::Corruption(format!(
                "manifest counters disagree with segment state at {}",
                path.display()
            )));
        }
        if terms.get(DEAD_LIST_KEY).is_none() {
            return Err(SegmentError::Corruption(format!(
                "dead-list entry missing from term directory at {}",
                path.display()
            )));
        }

        Ok(Self {
            path,
            text,
            labels,
            pool,
            strings,
            terms,
            poisoned: Cell::new(false),
        })
    }

    /// Flush regions and rewrite the pool/term/manifest snapshots.
    pub fn flush(&mut self) -> Result<()> {
        self.guard()?;
        self.text.flush()?;
        self.labels.flush()?;

        write_file(&self.path.join(POOL_FILE), self.pool.as_bytes())?;

        let entries: Vec<(TermKey, PostingsListHeader)> = self.terms.iter().collect();
        write_file(&self.path.join(TERMS_FILE), &bincode::serialize(&entries)?)?;

        let manifest = SegmentManifest {
            version: SEGMENT_FORMAT_VERSION,
            num_docs: self.text.num_docs(),
            num_postings: self.text.num_postings(),
            num_terms: entries.len().saturating_sub(1),
            num_strings: self.strings.len(),
        };
        write_file(&self.path.join(META_FILE), &serde_json::to_vec_pretty(&manifest)?)?;
        Ok(())
    }

    /// Flush and drop the segment.
    pub fn unload(mut self) -> Result<()> {
        self.flush()
    }

    /// Remove a segment directory. Missing segments are fine.
    pub fn delete<P: AsRef<Path>>(path: P) -> Result<()> {
        let path = path.as_ref();
        if path.exists() {
            std::fs::remove_dir_all(path)?;
        }
        Ok(())
    }

    /// Allocate the next document id. Doc ids start at 1 and are never
    /// reused.
    pub fn grab_docid(&mut self) -> Result<DocId> {
        self.guard()?;
        let doc_id = self
            .text
            .num_docs()
            .checked_add(1)
            .ok_or_else(|| SegmentError::OutOfSpace("doc id space exhausted".into()))?;
        self.text.set_num_docs(doc_id);
        Ok(doc_id)
    }

    /// Documents allocated so far (== max doc id)
    pub fn num_docs(&self) -> u32 {
        self.text.num_docs()
    }

    /// Text postings written so far
    pub fn num_postings(&self) -> u32 {
        self.text.num_postings()
    }

    /// Encoded size of one text posting with `num_positions` positions, for
    /// computing `ensure_fit` reservations.
    pub fn posting_bytes(num_positions: usize) -> u32 {
        text_postings::encoded_len(num_positions)
    }

    /// Encoded size of one label posting, for `ensure_fit` reservations.
    pub fn label_bytes() -> u32 {
        label_postings::LABEL_POSTING_BYTES
    }

    /// Reserve room for upcoming mutations: `postings_bytes` in the text
    /// region and `label_bytes` in the label region, plus table headroom.
    ///
    /// Returns false when a region cannot grow that far; mutations within a
    /// successful reservation never fail for lack of space.
    pub fn ensure_fit(&mut self, postings_bytes: u32, label_bytes: u32) -> Result<bool> {
        self.guard()?;
        let text_needed = self.text.head() as u64 + postings_bytes as u64;
        if !self.text.ensure_capacity(text_needed)? {
            return Ok(false);
        }
        let label_needed = self.labels.head() as u64 + label_bytes as u64;
        if !self.labels.ensure_capacity(label_needed)? {
            return Ok(false);
        }

        // One mutation interns at most two strings (field + word) and
        // touches at most two term entries (term + dead list).
        while self.strings.needs_grow(2) {
            self.strings.grow(&self.pool)?;
        }
        while self.terms.needs_grow(2) {
            self.terms.grow();
        }
        Ok(true)
    }

    /// Add one text posting: every position of `word` in `field` of the
    /// given document. Documents must arrive in ascending doc-id order.
    pub fn add_posting(
        &mut self,
        field: &str,
        word: &str,
        doc_id: DocId,
        positions: &[u16],
    ) -> Result<()> {
        self.guard()?;
        if doc_id == DOCID_NONE {
            return Err(SegmentError::InvalidArgument(
                "can't add a posting for doc 0".into(),
            ));
        }
        let result = self.add_posting_inner(field, word, doc_id, positions);
        self.seal_on_corruption(result)
    }

    fn add_posting_inner(
        &mut self,
        field: &str,
        word: &str,
        doc_id: DocId,
        positions: &[u16],
    ) -> Result<()> {
        let field_id = self.strings.intern(&mut self.pool, field)?;
        let word_id = self.strings.intern(&mut self.pool, word)?;
        let key = TermKey::new(field_id, word_id);

        let mut plh = match self.terms.get(key) {
            Some(plh) => plh,
            None => {
                // Materialize before touching the region, so the write-back
                // below is an in-place update that cannot run out of slots.
                self.terms.set(key, PostingsListHeader::empty())?;
                PostingsListHeader::empty()
            }
        };

        if let Some(head_offset) = plh.head() {
            let head = text_postings::read(&self.text, head_offset)?;
            if head.doc_id >= doc_id {
                return Err(SegmentError::Corruption(format!(
                    "postings for {}:{} already at doc {} while adding doc {}",
                    field, word, head.doc_id, doc_id
                )));
            }
        }

        let offset = text_postings::append(&mut self.text, doc_id, positions, plh.head_offset)?;
        plh.head_offset = offset;
        plh.count += 1;
        self.terms.set(key, plh)?;

        let total = self.text.num_postings() + 1;
        self.text.set_num_postings(total);
        Ok(())
    }

    /// Attach a label to a document. Adding a label twice is a no-op.
    pub fn add_label(&mut self, label: &str, doc_id: DocId) -> Result<()> {
        self.guard()?;
        if doc_id == DOCID_NONE {
            return Err(SegmentError::InvalidArgument(
                "can't add a label to doc 0".into(),
            ));
        }
        let result = self.add_label_inner(label, doc_id);
        self.seal_on_corruption(result)
    }

    fn add_label_inner(&mut self, label: &str, doc_id: DocId) -> Result<()> {
        let word_id = self.strings.intern(&mut self.pool, label)?;
        let key = TermKey::label(word_id);
        if self.terms.get(key).is_none() {
            self.terms.set(key, PostingsListHeader::empty())?;
        }

        let mut plh = self.terms.get(key).unwrap_or_else(PostingsListHeader::empty);
        let mut dead = self.dead_list()?;

        label_postings::add_label(&mut self.labels, doc_id, &mut plh, &mut dead)?;

        self.terms.set(key, plh)?;
        self.terms.set(DEAD_LIST_KEY, dead)?;
        Ok(())
    }

    /// Detach a label from a document. Removing an absent label is a no-op.
    pub fn remove_label(&mut self, label: &str, doc_id: DocId) -> Result<()> {
        self.guard()?;
        let result = self.remove_label_inner(label, doc_id);
        self.seal_on_corruption(result)
    }

    fn remove_label_inner(&mut self, label: &str, doc_id: DocId) -> Result<()> {
        // Lookup only: removing an unknown label must not intern it.
        let Some(word_id) = self.strings.lookup(&self.pool, label)? else {
            return Ok(());
        };
        let key = TermKey::label(word_id);
        let Some(mut plh) = self.terms.get(key) else {
            return Ok(());
        };
        let mut dead = self.dead_list()?;

        label_postings::remove_label(&mut self.labels, doc_id, &mut plh, &mut dead)?;

        self.terms.set(key, plh)?;
        self.terms.set(DEAD_LIST_KEY, dead)?;
        Ok(())
    }

    /// Evaluate a query, returning up to `limit` doc ids in strictly
    /// descending order.
    pub fn run_query(&self, query: &Query, limit: usize) -> Result<Vec<DocId>> {
        self.guard()?;
        let result = search::run_query(self, query, limit);
        self.seal_on_corruption(result)
    }

    pub fn stats(&self) -> SegmentStats {
        let dead_labels = self
            .terms
            .get(DEAD_LIST_KEY)
            .map(|plh| plh.count)
            .unwrap_or(0);
        SegmentStats {
            num_docs: self.text.num_docs(),
            num_postings: self.text.num_postings(),
            num_terms: self.terms.len().saturating_sub(1),
            num_strings: self.strings.len(),
            postings_capacity: self.text.capacity(),
            postings_used: self.text.head(),
            label_capacity: self.labels.capacity(),
            label_used: self.labels.head(),
            dead_labels,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    // === internals shared with the query evaluator ===

    pub(crate) fn text_region(&self) -> &PostingsRegion {
        &self.text
    }

    pub(crate) fn label_region(&self) -> &PostingsRegion {
        &self.labels
    }

    /// Resolve a term to its postings-list header. `field == None` means a
    /// label term. Unknown strings and unknown terms both resolve to `None`.
    pub(crate) fn term_header(
        &self,
        field: Option<&str>,
        word: &str,
    ) -> Result<Option<PostingsListHeader>> {
        let field_id: StringId = match field {
            Some(f) => match self.strings.lookup(&self.pool, f)? {
                Some(id) => id,
                None => return Ok(None),
            },
            None => STRING_NONE,
        };
        let word_id = match self.strings.lookup(&self.pool, word)? {
            Some(id) => id,
            None => return Ok(None),
        };
        Ok(self.terms.get(TermKey::new(field_id, word_id)))
    }

    fn dead_list(&mut self) -> Result<PostingsListHeader> {
        match self.terms.get(DEAD_LIST_KEY) {
            Some(plh) => Ok(plh),
            None => {
                self.terms.set(DEAD_LIST_KEY, PostingsListHeader::empty())?;
                Ok(PostingsListHeader::empty())
            }
        }
    }

    fn guard(&self) -> Result<()> {
        if self.poisoned.get() {
            return Err(SegmentError::Corruption(
                "segment disabled by an earlier corruption error".into(),
            ));
        }
        Ok(())
    }

    fn seal_on_corruption<T>(&self, result: Result<T>) -> Result<T> {
        if let Err(SegmentError::Corruption(_)) = &result {
            self.poisoned.set(true);
        }
        result
    }
}

fn write_file(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = File::create(path)?;
    file.write_all(bytes)?;
    file.sync_all()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fresh_segment(dir: &TempDir) -> Segment {
        Segment::create(dir.path().join("seg")).unwrap()
    }

    /// Reserve generous room, then add one posting.
    fn add(segment: &mut Segment, word: &str, doc_id: DocId, position: u16) {
        let bytes = Segment::posting_bytes(1);
        assert!(segment.ensure_fit(bytes, 0).unwrap());
        segment.add_posting("body", word, doc_id, &[position]).unwrap();
    }

    #[test]
    fn test_initial_state() {
        let dir = TempDir::new().unwrap();
        let segment = fresh_segment(&dir);
        let stats = segment.stats();
        assert_eq!(stats.num_docs, 0);
        assert_eq!(stats.num_postings, 0);
        assert_eq!(stats.num_terms, 0);
        assert_eq!(stats.dead_labels, 0);
    }

    #[test]
    fn test_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        let _segment = fresh_segment(&dir);
        assert!(matches!(
            Segment::create(dir.path().join("seg")).unwrap_err(),
            SegmentError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_grab_docid_is_monotonic() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);
        assert_eq!(segment.grab_docid().unwrap(), 1);
        assert_eq!(segment.grab_docid().unwrap(), 2);
        assert_eq!(segment.grab_docid().unwrap(), 3);
        assert_eq!(segment.num_docs(), 3);
    }

    #[test]
    fn test_adding_a_doc_increments_counts() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);

        let doc_id = segment.grab_docid().unwrap();
        add(&mut segment, "hello", doc_id, 0);
        add(&mut segment, "there", doc_id, 1);

        let stats = segment.stats();
        assert_eq!(stats.num_docs, 1);
        assert_eq!(stats.num_postings, 2);
        assert_eq!(stats.num_terms, 2);
    }

    #[test]
    fn test_posting_lands_at_list_head() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);

        for position in 0..3u16 {
            let doc_id = segment.grab_docid().unwrap();
            add(&mut segment, "shared", doc_id, position);
        }

        let plh = segment.term_header(Some("body"), "shared").unwrap().unwrap();
        assert_eq!(plh.count, 3);
        let head = text_postings::read(segment.text_region(), plh.head().unwrap()).unwrap();
        assert_eq!(head.doc_id, 3);
    }

    #[test]
    fn test_out_of_order_docs_are_corruption_and_poison() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);

        segment.grab_docid().unwrap();
        let d2 = segment.grab_docid().unwrap();
        add(&mut segment, "w", d2, 0);

        let bytes = Segment::posting_bytes(1);
        segment.ensure_fit(bytes, 0).unwrap();
        let err = segment.add_posting("body", "w", 1, &[0]).unwrap_err();
        assert!(matches!(err, SegmentError::Corruption(_)));

        // Poisoned: everything else refuses now.
        assert!(matches!(
            segment.grab_docid().unwrap_err(),
            SegmentError::Corruption(_)
        ));
        assert!(matches!(
            segment.run_query(&Query::every(), 10).unwrap_err(),
            SegmentError::Corruption(_)
        ));
    }

    #[test]
    fn test_add_posting_doc_zero_rejected() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);
        assert!(matches!(
            segment.add_posting("body", "w", 0, &[0]).unwrap_err(),
            SegmentError::InvalidArgument(_)
        ));
    }

    #[test]
    fn test_mutation_without_ensure_fit_is_out_of_space() {
        let dir = TempDir::new().unwrap();
        let mut segment =
            Segment::create_with_config(dir.path().join("seg"), SegmentConfig::small()).unwrap();

        // Exhaust the tiny initial sizing without ever reserving more room.
        let (doc_id, err) = loop {
            let doc_id = segment.grab_docid().unwrap();
            if let Err(e) = segment.add_posting("body", &format!("w{}", doc_id), doc_id, &[0]) {
                break (doc_id, e);
            }
        };
        assert!(matches!(err, SegmentError::OutOfSpace(_)));

        // ensure_fit unblocks the same mutation.
        assert!(segment.ensure_fit(Segment::posting_bytes(1), 0).unwrap());
        segment
            .add_posting("body", &format!("w{}", doc_id), doc_id, &[0])
            .unwrap();
    }

    #[test]
    fn test_flush_and_reopen_preserves_everything() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg");

        {
            let mut segment = Segment::create(&path).unwrap();
            for word in ["one", "two"] {
                let doc_id = segment.grab_docid().unwrap();
                add(&mut segment, word, doc_id, 0);
            }
            segment.ensure_fit(0, Segment::label_bytes()).unwrap();
            segment.add_label("starred", 1).unwrap();
            segment.unload().unwrap();
        }

        let segment = Segment::open(&path).unwrap();
        assert_eq!(segment.num_docs(), 2);
        assert_eq!(segment.num_postings(), 2);
        assert_eq!(
            segment.run_query(&Query::term("body", "two"), 10).unwrap(),
            vec![2]
        );
        assert_eq!(
            segment.run_query(&Query::label("starred"), 10).unwrap(),
            vec![1]
        );
    }

    #[test]
    fn test_open_missing_segment() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            Segment::open(dir.path().join("nope")).unwrap_err(),
            SegmentError::SegmentNotFound(_)
        ));
    }

    #[test]
    fn test_open_rejects_tampered_manifest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg");
        {
            let mut segment = Segment::create(&path).unwrap();
            let doc_id = segment.grab_docid().unwrap();
            add(&mut segment, "w", doc_id, 0);
            segment.unload().unwrap();
        }

        let meta_path = path.join(META_FILE);
        let mut manifest: SegmentManifest =
            serde_json::from_slice(&std::fs::read(&meta_path).unwrap()).unwrap();
        manifest.num_docs += 5;
        std::fs::write(&meta_path, serde_json::to_vec_pretty(&manifest).unwrap()).unwrap();

        assert!(matches!(
            Segment::open(&path).unwrap_err(),
            SegmentError::Corruption(_)
        ));
    }

    #[test]
    fn test_delete_segment() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("seg");
        {
            let segment = Segment::create(&path).unwrap();
            segment.unload().unwrap();
        }
        assert!(path.exists());
        Segment::delete(&path).unwrap();
        assert!(!path.exists());
        // Deleting again is fine.
        Segment::delete(&path).unwrap();
    }

    #[test]
    fn test_region_growth_through_ensure_fit() {
        let dir = TempDir::new().unwrap();
        let mut segment =
            Segment::create_with_config(dir.path().join("seg"), SegmentConfig::small()).unwrap();

        // Far more postings than the initial 256-byte region can hold.
        for i in 0..200u16 {
            let doc_id = segment.grab_docid().unwrap();
            let bytes = Segment::posting_bytes(1);
            assert!(segment.ensure_fit(bytes, 0).unwrap());
            segment.add_posting("body", "steady", doc_id, &[i]).unwrap();
        }

        let plh = segment.term_header(Some("body"), "steady").unwrap().unwrap();
        assert_eq!(plh.count, 200);
        let results = segment.run_query(&Query::term("body", "steady"), 5).unwrap();
        assert_eq!(results, vec![200, 199, 198, 197, 196]);
    }

    #[test]
    fn test_randomized_label_churn_matches_model() {
        use rand::rngs::StdRng;
        use rand::{Rng, SeedableRng};
        use std::collections::BTreeSet;

        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);
        for _ in 0..50 {
            segment.grab_docid().unwrap();
        }

        let mut model: BTreeSet<DocId> = BTreeSet::new();
        let mut rng = StdRng::seed_from_u64(1);

        for _ in 0..500 {
            let doc_id = rng.gen_range(1..=50);
            segment.ensure_fit(0, Segment::label_bytes()).unwrap();
            if rng.gen_bool(0.5) {
                segment.add_label("starred", doc_id).unwrap();
                model.insert(doc_id);
            } else {
                segment.remove_label("starred", doc_id).unwrap();
                model.remove(&doc_id);
            }
        }

        let expected: Vec<DocId> = model.iter().rev().copied().collect();
        assert_eq!(
            segment.run_query(&Query::label("starred"), 100).unwrap(),
            expected
        );
        // Reclaimed slots bound the region: never more bytes than the peak
        // number of simultaneously live labels requires.
        let stats = segment.stats();
        assert!(stats.label_used <= 50 * Segment::label_bytes());
    }

    #[test]
    fn test_label_dead_slot_reused_across_public_api() {
        let dir = TempDir::new().unwrap();
        let mut segment = fresh_segment(&dir);
        for _ in 0..3 {
            segment.grab_docid().unwrap();
        }

        for doc_id in [1, 2, 3] {
            segment.ensure_fit(0, Segment::label_bytes()).unwrap();
            segment.add_label("starred", doc_id).unwrap();
        }
        let used_before = segment.stats().label_used;

        segment.remove_label("starred", 2).unwrap();
        assert_eq!(segment.stats().dead_labels, 1);

        segment.grab_docid().unwrap();
        segment.ensure_fit(0, Segment::label_bytes()).unwrap();
        segment.add_label("flagged", 4).unwrap();

        // The new label posting reused the reclaimed slot.
        assert_eq!(segment.stats().label_used, used_before);
        assert_eq!(segment.stats().dead_labels, 0);
    }
}
