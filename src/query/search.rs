//! Query evaluation
//!
//! Every query node compiles to a cursor with the same protocol:
//!
//! - `advance() -> Option<DocId>`: next matching doc, strictly descending
//! - `seek(target) -> Option<DocId>`: largest matching doc at or below
//!   `target`; never moves a cursor already at or below it
//!
//! Postings lists are doc-id descending, so a fresh append lands at the
//! list head and intersection walks each list at most once. Conjunction
//! repeatedly seeks every child to the minimum current doc; phrase adds a
//! consecutive-position check on top; negation and the match-all cursor
//! count the universe `[1, num_docs]` downward.
//!
//! Every list walk re-verifies the descending invariant and reports
//! `Corruption` on violation.

use crate::query::Query;
use crate::segment::{label_postings, text_postings, Segment};
use crate::types::{offset_to_opt, DocId, DOCID_NONE};
use crate::{Result, SegmentError};

/// Evaluate `query`, collecting up to `limit` doc ids in descending order.
pub(crate) fn run_query(segment: &Segment, query: &Query, limit: usize) -> Result<Vec<DocId>> {
    let mut cursor = build(segment, query)?;
    let mut results = Vec::new();
    while results.len() < limit {
        match cursor.advance()? {
            Some(doc_id) => results.push(doc_id),
            None => break,
        }
    }
    Ok(results)
}

fn build<'a>(segment: &'a Segment, query: &Query) -> Result<Cursor<'a>> {
    Ok(match query {
        Query::Term { field, word } => {
            Cursor::Term(TermCursor::new(segment, Some(field.as_str()), word)?)
        }
        Query::Label { word } => Cursor::Term(TermCursor::new(segment, None, word)?),
        Query::Conjunction { children } => {
            let children = children
                .iter()
                .map(|child| build(segment, child))
                .collect::<Result<Vec<_>>>()?;
            Cursor::Conj(ConjCursor::new(children))
        }
        Query::Disjunction { children } => {
            let children = children
                .iter()
                .map(|child| build(segment, child))
                .collect::<Result<Vec<_>>>()?;
            Cursor::Disj(DisjCursor::new(children))
        }
        Query::Phrase { terms } => {
            let mut children = Vec::with_capacity(terms.len());
            for term in terms {
                match term {
                    Query::Term { field, word } => {
                        children
                            .push(Cursor::Term(TermCursor::new(segment, Some(field.as_str()), word)?));
                    }
                    _ => {
                        return Err(SegmentError::InvalidArgument(
                            "phrase children must be field terms".into(),
                        ))
                    }
                }
            }
            Cursor::Phrase(PhraseCursor { inner: ConjCursor::new(children) })
        }
        Query::Negation { child: Some(child) } => Cursor::Neg(NegCursor {
            child: Box::new(build(segment, child)?),
            next_candidate: segment.num_docs(),
            current: None,
            done: false,
        }),
        Query::Negation { child: None } => {
            return Err(SegmentError::InvalidArgument(
                "negation requires exactly one child".into(),
            ))
        }
        Query::Every => Cursor::Every(EveryCursor { next: segment.num_docs(), current: None }),
    })
}

enum Cursor<'a> {
    Term(TermCursor<'a>),
    Conj(ConjCursor<'a>),
    Disj(DisjCursor<'a>),
    Phrase(PhraseCursor<'a>),
    Neg(NegCursor<'a>),
    Every(EveryCursor),
}

impl<'a> Cursor<'a> {
    fn advance(&mut self) -> Result<Option<DocId>> {
        match self {
            Cursor::Term(c) => c.advance(),
            Cursor::Conj(c) => c.advance(),
            Cursor::Disj(c) => c.advance(),
            Cursor::Phrase(c) => c.advance(),
            Cursor::Neg(c) => c.advance(),
            Cursor::Every(c) => Ok(c.advance()),
        }
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        match self {
            Cursor::Term(c) => c.seek(target),
            Cursor::Conj(c) => c.seek(target),
            Cursor::Disj(c) => c.seek(target),
            Cursor::Phrase(c) => c.seek(target),
            Cursor::Neg(c) => c.seek(target),
            Cursor::Every(c) => Ok(c.seek(target)),
        }
    }

    /// Positions of the current posting; phrase verification only ever asks
    /// term cursors.
    fn positions(&self) -> Result<Vec<u16>> {
        match self {
            Cursor::Term(c) => c.positions(),
            _ => Err(SegmentError::InvalidArgument(
                "only term cursors carry positions".into(),
            )),
        }
    }
}

// === Term ===

enum TermState {
    /// Not yet positioned; holds the list head offset
    Start(Option<u32>),
    /// Positioned on the posting at `offset`
    At { offset: u32, doc: DocId, next: Option<u32> },
    Done,
}

struct TermCursor<'a> {
    segment: &'a Segment,
    /// Label lists live in the label region and have no positions
    label: bool,
    state: TermState,
}

impl<'a> TermCursor<'a> {
    fn new(segment: &'a Segment, field: Option<&str>, word: &str) -> Result<Self> {
        let head = segment.term_header(field, word)?.and_then(|plh| plh.head());
        Ok(Self { segment, label: field.is_none(), state: TermState::Start(head) })
    }

    fn read(&self, offset: u32) -> Result<(DocId, Option<u32>)> {
        let (doc, next) = if self.label {
            let lp = label_postings::read(self.segment.label_region(), offset)?;
            (lp.doc_id, offset_to_opt(lp.next_offset))
        } else {
            let tp = text_postings::read(self.segment.text_region(), offset)?;
            (tp.doc_id, offset_to_opt(tp.next_offset))
        };
        if doc == DOCID_NONE {
            return Err(SegmentError::Corruption(format!(
                "posting at {} has doc id 0",
                offset
            )));
        }
        Ok((doc, next))
    }

    fn advance(&mut self) -> Result<Option<DocId>> {
        match self.state {
            TermState::Start(None) | TermState::Done => {
                self.state = TermState::Done;
                Ok(None)
            }
            TermState::Start(Some(offset)) => {
                let (doc, next) = self.read(offset)?;
                self.state = TermState::At { offset, doc, next };
                Ok(Some(doc))
            }
            TermState::At { next: None, .. } => {
                self.state = TermState::Done;
                Ok(None)
            }
            TermState::At { doc, next: Some(offset), .. } => {
                let (next_doc, next) = self.read(offset)?;
                if next_doc >= doc {
                    return Err(SegmentError::Corruption(format!(
                        "posting at {} has doc {} but its predecessor had doc {}",
                        offset, next_doc, doc
                    )));
                }
                self.state = TermState::At { offset, doc: next_doc, next };
                Ok(Some(next_doc))
            }
        }
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        loop {
            match self.state {
                TermState::At { doc, .. } if doc <= target => return Ok(Some(doc)),
                TermState::Done => return Ok(None),
                _ => {
                    if self.advance()?.is_none() {
                        return Ok(None);
                    }
                }
            }
        }
    }

    fn positions(&self) -> Result<Vec<u16>> {
        match self.state {
            TermState::At { offset, .. } if !self.label => {
                Ok(text_postings::read(self.segment.text_region(), offset)?.positions)
            }
            _ => Err(SegmentError::InvalidArgument(
                "term cursor has no current text posting".into(),
            )),
        }
    }
}

// === Conjunction ===

struct ConjCursor<'a> {
    children: Vec<Cursor<'a>>,
    currents: Vec<Option<DocId>>,
    current: Option<DocId>,
    started: bool,
    done: bool,
}

impl<'a> ConjCursor<'a> {
    fn new(children: Vec<Cursor<'a>>) -> Self {
        let currents = vec![None; children.len()];
        Self { children, currents, current: None, started: false, done: false }
    }

    fn advance(&mut self) -> Result<Option<DocId>> {
        if self.done || self.children.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                *current = child.advance()?;
            }
        } else {
            // All children sit on the doc just emitted; moving one past it
            // is enough, align() drags the rest down.
            self.currents[0] = self.children[0].advance()?;
        }
        self.align()
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.done || self.children.is_empty() {
            self.done = true;
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                *current = child.seek(target)?;
            }
        } else {
            if let Some(doc) = self.current {
                if doc <= target {
                    return Ok(Some(doc));
                }
            }
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                if current.is_some_and(|doc| doc > target) {
                    *current = child.seek(target)?;
                }
            }
        }
        self.align()
    }

    /// Drag every child down to the minimum current doc until all agree.
    fn align(&mut self) -> Result<Option<DocId>> {
        loop {
            let mut lo: Option<DocId> = None;
            for current in &self.currents {
                match current {
                    None => {
                        self.done = true;
                        self.current = None;
                        return Ok(None);
                    }
                    Some(doc) => lo = Some(lo.map_or(*doc, |l: DocId| l.min(*doc))),
                }
            }
            let lo = lo.expect("conjunction align on zero children");
            if self.currents.iter().all(|c| *c == Some(lo)) {
                self.current = Some(lo);
                return Ok(Some(lo));
            }
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                if current.is_some_and(|doc| doc > lo) {
                    *current = child.seek(lo)?;
                }
            }
        }
    }
}

// === Disjunction ===

struct DisjCursor<'a> {
    children: Vec<Cursor<'a>>,
    currents: Vec<Option<DocId>>,
    current: Option<DocId>,
    started: bool,
    done: bool,
}

impl<'a> DisjCursor<'a> {
    fn new(children: Vec<Cursor<'a>>) -> Self {
        let currents = vec![None; children.len()];
        Self { children, currents, current: None, started: false, done: false }
    }

    fn advance(&mut self) -> Result<Option<DocId>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                *current = child.advance()?;
            }
        } else if let Some(doc) = self.current {
            // Step every child that contributed the emitted doc, so
            // duplicates collapse.
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                if *current == Some(doc) {
                    *current = child.advance()?;
                }
            }
        }
        self.emit_max()
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.done {
            return Ok(None);
        }
        if !self.started {
            self.started = true;
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                *current = child.seek(target)?;
            }
        } else {
            if let Some(doc) = self.current {
                if doc <= target {
                    return Ok(Some(doc));
                }
            }
            for (child, current) in self.children.iter_mut().zip(self.currents.iter_mut()) {
                if current.is_some_and(|doc| doc > target) {
                    *current = child.seek(target)?;
                }
            }
        }
        self.emit_max()
    }

    fn emit_max(&mut self) -> Result<Option<DocId>> {
        let max = self.currents.iter().filter_map(|c| *c).max();
        match max {
            Some(doc) => {
                self.current = Some(doc);
                Ok(Some(doc))
            }
            None => {
                self.done = true;
                self.current = None;
                Ok(None)
            }
        }
    }
}

// === Phrase ===

struct PhraseCursor<'a> {
    inner: ConjCursor<'a>,
}

impl<'a> PhraseCursor<'a> {
    fn advance(&mut self) -> Result<Option<DocId>> {
        loop {
            match self.inner.advance()? {
                Some(doc) => {
                    if self.positions_match()? {
                        return Ok(Some(doc));
                    }
                }
                None => return Ok(None),
            }
        }
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        match self.inner.seek(target)? {
            Some(_) => {
                if self.positions_match()? {
                    Ok(self.inner.current)
                } else {
                    self.advance()
                }
            }
            None => Ok(None),
        }
    }

    /// All children sit on the same doc; check for positions
    /// `p, p+1, …, p+k-1` across the children in order.
    fn positions_match(&self) -> Result<bool> {
        let first = self.inner.children[0].positions()?;
        if self.inner.children.len() == 1 {
            return Ok(true);
        }

        let rest: Vec<Vec<u16>> = self.inner.children[1..]
            .iter()
            .map(|child| child.positions())
            .collect::<Result<Vec<_>>>()?;

        // Position lists are ascending, so one forward pointer per child
        // makes the whole verification a linear merge.
        let mut pointers = vec![0usize; rest.len()];
        'starts: for &start in &first {
            for (i, positions) in rest.iter().enumerate() {
                let want = start as u32 + i as u32 + 1;
                while pointers[i] < positions.len() && (positions[pointers[i]] as u32) < want {
                    pointers[i] += 1;
                }
                match positions.get(pointers[i]) {
                    Some(&pos) if pos as u32 == want => {}
                    Some(_) => continue 'starts,
                    None => return Ok(false),
                }
            }
            return Ok(true);
        }
        Ok(false)
    }
}

// === Negation ===

struct NegCursor<'a> {
    child: Box<Cursor<'a>>,
    /// Largest universe doc not yet considered
    next_candidate: DocId,
    current: Option<DocId>,
    done: bool,
}

impl<'a> NegCursor<'a> {
    fn advance(&mut self) -> Result<Option<DocId>> {
        if self.done {
            return Ok(None);
        }
        loop {
            if self.next_candidate == DOCID_NONE {
                self.done = true;
                self.current = None;
                return Ok(None);
            }
            let candidate = self.next_candidate;
            self.next_candidate -= 1;
            if self.child.seek(candidate)? == Some(candidate) {
                continue;
            }
            self.current = Some(candidate);
            return Ok(Some(candidate));
        }
    }

    fn seek(&mut self, target: DocId) -> Result<Option<DocId>> {
        if self.done {
            return Ok(None);
        }
        if let Some(doc) = self.current {
            if doc <= target {
                return Ok(Some(doc));
            }
        }
        if self.next_candidate > target {
            self.next_candidate = target;
        }
        self.advance()
    }
}

// === Every ===

struct EveryCursor {
    next: DocId,
    current: Option<DocId>,
}

impl EveryCursor {
    fn advance(&mut self) -> Option<DocId> {
        if self.next == DOCID_NONE {
            self.current = None;
            return None;
        }
        self.current = Some(self.next);
        self.next -= 1;
        self.current
    }

    fn seek(&mut self, target: DocId) -> Option<DocId> {
        if let Some(doc) = self.current {
            if doc <= target {
                return Some(doc);
            }
        }
        if self.next > target {
            self.next = target;
        }
        self.advance()
    }
}
