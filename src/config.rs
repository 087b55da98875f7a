//! Segment configuration
//!
//! Initial sizing for the postings regions and the two open-addressed
//! tables. Regions and tables never grow mid-mutation; all growth happens in
//! `Segment::ensure_fit`, so the initial sizes only determine how soon the
//! first resize happens.

/// Default initial capacity of the text postings region, in bytes.
pub const DEFAULT_POSTINGS_BYTES: u32 = 64 * 1024;

/// Default initial capacity of the label postings region, in bytes.
pub const DEFAULT_LABEL_BYTES: u32 = 8 * 1024;

/// Default initial slot count for the term directory (power of two).
pub const DEFAULT_TERMHASH_CAPACITY: usize = 1024;

/// Default initial slot count for the string intern table (power of two).
pub const DEFAULT_STRINGMAP_CAPACITY: usize = 1024;

/// Segment sizing configuration
#[derive(Debug, Clone, Copy)]
pub struct SegmentConfig {
    /// Initial byte capacity of the text postings region
    pub initial_postings_bytes: u32,

    /// Initial byte capacity of the label postings region
    pub initial_label_bytes: u32,

    /// Initial termhash slot count (rounded up to a power of two)
    pub termhash_capacity: usize,

    /// Initial stringmap slot count (rounded up to a power of two)
    pub stringmap_capacity: usize,
}

impl Default for SegmentConfig {
    fn default() -> Self {
        Self {
            initial_postings_bytes: DEFAULT_POSTINGS_BYTES,
            initial_label_bytes: DEFAULT_LABEL_BYTES,
            termhash_capacity: DEFAULT_TERMHASH_CAPACITY,
            stringmap_capacity: DEFAULT_STRINGMAP_CAPACITY,
        }
    }
}

impl SegmentConfig {
    /// Tiny configuration for tests that want to exercise region growth and
    /// the `OutOfSpace` path quickly.
    pub fn small() -> Self {
        Self {
            initial_postings_bytes: 256,
            initial_label_bytes: 64,
            termhash_capacity: 8,
            stringmap_capacity: 8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = SegmentConfig::default();
        assert_eq!(config.initial_postings_bytes, DEFAULT_POSTINGS_BYTES);
        assert_eq!(config.initial_label_bytes, DEFAULT_LABEL_BYTES);
        assert!(config.termhash_capacity.is_power_of_two());
        assert!(config.stringmap_capacity.is_power_of_two());
    }
}
