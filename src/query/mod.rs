//! Query AST
//!
//! Queries are built programmatically: create a node, then chain `add` to
//! attach children (child order is preserved; phrases care about it).
//! Evaluation happens in `search` via `Segment::run_query`, which yields
//! doc ids in strictly descending order.
//!
//! ```ignore
//! // body:"one" AND NOT body:"two"
//! let query = Query::conjunction()
//!     .add(Query::term("body", "one"))?
//!     .add(Query::negation().add(Query::term("body", "two"))?)?;
//! let results = segment.run_query(&query, 10)?;
//! ```

pub(crate) mod search;

use crate::{Result, SegmentError};
use std::fmt;

/// One node of a query tree
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Query {
    /// Matches documents where `word` occurs in `field`
    Term { field: String, word: String },

    /// Matches documents carrying the label `word`
    Label { word: String },

    /// Matches documents present in every child stream. Empty matches
    /// nothing.
    Conjunction { children: Vec<Query> },

    /// Matches documents present in any child stream. Empty matches
    /// nothing.
    Disjunction { children: Vec<Query> },

    /// Matches documents where the child terms occur at consecutive
    /// positions, in order. Children must be `Term` nodes.
    Phrase { terms: Vec<Query> },

    /// Matches documents absent from the child stream. Exactly one child.
    Negation { child: Option<Box<Query>> },

    /// Matches every allocated document
    Every,
}

impl Query {
    pub fn term(field: impl Into<String>, word: impl Into<String>) -> Self {
        Query::Term { field: field.into(), word: word.into() }
    }

    pub fn label(word: impl Into<String>) -> Self {
        Query::Label { word: word.into() }
    }

    pub fn conjunction() -> Self {
        Query::Conjunction { children: Vec::new() }
    }

    pub fn disjunction() -> Self {
        Query::Disjunction { children: Vec::new() }
    }

    pub fn phrase() -> Self {
        Query::Phrase { terms: Vec::new() }
    }

    pub fn negation() -> Self {
        Query::Negation { child: None }
    }

    pub fn every() -> Self {
        Query::Every
    }

    /// Attach a child and return the parent, so construction chains.
    pub fn add(mut self, child: Query) -> Result<Self> {
        match &mut self {
            Query::Conjunction { children } | Query::Disjunction { children } => {
                children.push(child);
            }
            Query::Phrase { terms } => {
                if !matches!(child, Query::Term { .. }) {
                    return Err(SegmentError::InvalidArgument(
                        "phrase children must be field terms".into(),
                    ));
                }
                terms.push(child);
            }
            Query::Negation { child: slot } => {
                if slot.is_some() {
                    return Err(SegmentError::InvalidArgument(
                        "negation takes exactly one child".into(),
                    ));
                }
                *slot = Some(Box::new(child));
            }
            Query::Term { .. } | Query::Label { .. } | Query::Every => {
                return Err(SegmentError::InvalidArgument(
                    "this query node takes no children".into(),
                ));
            }
        }
        Ok(self)
    }
}

impl fmt::Display for Query {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fn write_children(f: &mut fmt::Formatter<'_>, tag: &str, children: &[Query]) -> fmt::Result {
            write!(f, "({}", tag)?;
            for child in children {
                write!(f, " {}", child)?;
            }
            write!(f, ")")
        }
        match self {
            Query::Term { field, word } => write!(f, "{}:\"{}\"", field, word),
            Query::Label { word } => write!(f, "~{}", word),
            Query::Conjunction { children } => write_children(f, "AND", children),
            Query::Disjunction { children } => write_children(f, "OR", children),
            Query::Phrase { terms } => write_children(f, "PHRASE", terms),
            Query::Negation { child: Some(child) } => write!(f, "(NOT {})", child),
            Query::Negation { child: None } => write!(f, "(NOT)"),
            Query::Every => write!(f, "*"),
        }
    }
}
