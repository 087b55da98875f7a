//! terndb Segment Engine
//!
//! Embedded, incremental, append-mostly full-text search segment.
//!
//! ## Core pieces
//! - Postings regions: mmap-backed byte arenas (append-only text postings
//!   with positions, mutable label postings with free-list reclamation)
//! - Term directory: string pool + intern table + open-addressed termhash
//! - Query layer: term/conjunction/disjunction/phrase/negation evaluation in
//!   strictly descending doc-id order
//!
//! ## Model
//! - Single writer, caller-serialized; mutations take `&mut self`
//! - Regions grow only inside `ensure_fit`, never mid-mutation
//! - Corruption is fatal to the segment instance

pub mod config;
pub mod query;
pub mod segment;
pub mod types;

mod error;

pub use config::SegmentConfig;
pub use error::{Result, SegmentError};
pub use query::Query;
pub use segment::{Segment, SegmentStats};
pub use types::{DocId, StringId, DOCID_NONE, FIELD_LABEL, OFFSET_NONE, STRING_NONE};
