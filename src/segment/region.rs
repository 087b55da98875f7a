//! Postings Region (mmap-backed byte arena)
//!
//! Each region is one file: a fixed 32-byte header followed by record
//! contents. All offsets handed out by a region are relative to the start of
//! the contents area, so a remap after growth never invalidates them.
//!
//! Header layout (little-endian u32 fields):
//! `[magic][version][kind][capacity][head][num_docs][num_postings][crc32]`
//!
//! The crc covers the seven fields before it and is recomputed on every
//! header write; `open` validates magic, version, kind, capacity and crc
//! before touching any record.
//!
//! Growth is cooperative: only `Segment::ensure_fit` calls `ensure_capacity`.
//! Mutations between `ensure_fit` calls must never remap, because offsets
//! held in caller locals would dangle.

use crate::{Result, SegmentError};
use memmap2::MmapMut;
use std::fs::OpenOptions;
use std::path::{Path, PathBuf};

/// Magic number for region files (ASCII "TERN")
const REGION_MAGIC: u32 = 0x5445_524E;

/// Current region format version
const REGION_VERSION: u32 = 1;

/// Region header size in bytes
pub const REGION_HEADER_BYTES: usize = 32;

/// Hard ceiling on region contents: offsets are u32 and `u32::MAX` is the
/// reserved none sentinel.
pub const MAX_REGION_BYTES: u64 = (u32::MAX - 1) as u64;

// Header field byte offsets
const H_MAGIC: usize = 0;
const H_VERSION: usize = 4;
const H_KIND: usize = 8;
const H_CAPACITY: usize = 12;
const H_HEAD: usize = 16;
const H_NUM_DOCS: usize = 20;
const H_NUM_POSTINGS: usize = 24;
const H_CRC: usize = 28;

/// Which family of postings a region holds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegionKind {
    /// Append-only text postings with positions
    Text = 1,
    /// Fixed-size mutable label postings
    Label = 2,
}

/// A file-backed byte arena for postings records
#[derive(Debug)]
pub struct PostingsRegion {
    path: PathBuf,
    mmap: MmapMut,
    kind: RegionKind,
}

impl PostingsRegion {
    /// Create a fresh region file with the given contents capacity.
    pub fn create(path: &Path, kind: RegionKind, capacity: u32) -> Result<Self> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(true)
            .open(path)?;
        file.set_len(REGION_HEADER_BYTES as u64 + capacity as u64)?;

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let mut region = Self { path: path.to_path_buf(), mmap, kind };
        region.write_u32(H_MAGIC, REGION_MAGIC);
        region.write_u32(H_VERSION, REGION_VERSION);
        region.write_u32(H_KIND, kind as u32);
        region.write_u32(H_CAPACITY, capacity);
        region.write_u32(H_HEAD, 0);
        region.write_u32(H_NUM_DOCS, 0);
        region.write_u32(H_NUM_POSTINGS, 0);
        region.reseal();
        Ok(region)
    }

    /// Open and validate an existing region file.
    pub fn open(path: &Path, kind: RegionKind) -> Result<Self> {
        if !path.exists() {
            return Err(SegmentError::SegmentNotFound(path.to_path_buf()));
        }
        let file = OpenOptions::new().read(true).write(true).open(path)?;
        let len = file.metadata()?.len();
        if len < REGION_HEADER_BYTES as u64 {
            return Err(SegmentError::Corruption(format!(
                "region file {} too short: {} bytes",
                path.display(),
                len
            )));
        }

        let mmap = unsafe { MmapMut::map_mut(&file)? };
        let region = Self { path: path.to_path_buf(), mmap, kind };

        if region.read_u32(H_MAGIC) != REGION_MAGIC {
            return Err(SegmentError::Corruption(format!(
                "bad region magic in {}",
                path.display()
            )));
        }
        if region.read_u32(H_VERSION) != REGION_VERSION {
            return Err(SegmentError::Corruption(format!(
                "unsupported region version {} in {}",
                region.read_u32(H_VERSION),
                path.display()
            )));
        }
        if region.read_u32(H_KIND) != kind as u32 {
            return Err(SegmentError::Corruption(format!(
                "region kind mismatch in {}: expected {}, found {}",
                path.display(),
                kind as u32,
                region.read_u32(H_KIND)
            )));
        }
        let expected_crc = region.header_crc();
        if region.read_u32(H_CRC) != expected_crc {
            return Err(SegmentError::Corruption(format!(
                "region header checksum mismatch in {}",
                path.display()
            )));
        }
        let capacity = region.read_u32(H_CAPACITY);
        if REGION_HEADER_BYTES as u64 + capacity as u64 != len {
            return Err(SegmentError::Corruption(format!(
                "region capacity {} does not match file size {} in {}",
                capacity,
                len,
                path.display()
            )));
        }
        if region.head() > capacity {
            return Err(SegmentError::Corruption(format!(
                "region head {} beyond capacity {} in {}",
                region.head(),
                capacity,
                path.display()
            )));
        }
        Ok(region)
    }

    pub fn kind(&self) -> RegionKind {
        self.kind
    }

    /// Contents capacity in bytes
    pub fn capacity(&self) -> u32 {
        self.read_u32(H_CAPACITY)
    }

    /// Next free contents offset. Never decreases.
    pub fn head(&self) -> u32 {
        self.read_u32(H_HEAD)
    }

    pub fn set_head(&mut self, head: u32) {
        self.write_u32(H_HEAD, head);
        self.reseal();
    }

    pub fn num_docs(&self) -> u32 {
        self.read_u32(H_NUM_DOCS)
    }

    pub fn set_num_docs(&mut self, num_docs: u32) {
        self.write_u32(H_NUM_DOCS, num_docs);
        self.reseal();
    }

    pub fn num_postings(&self) -> u32 {
        self.read_u32(H_NUM_POSTINGS)
    }

    pub fn set_num_postings(&mut self, num_postings: u32) {
        self.write_u32(H_NUM_POSTINGS, num_postings);
        self.reseal();
    }

    /// Bytes still available past `head`
    pub fn free_bytes(&self) -> u32 {
        self.capacity() - self.head()
    }

    /// Read-only view of a record span. Records live strictly below `head`.
    pub fn record(&self, offset: u32, len: usize) -> Result<&[u8]> {
        let end = offset as u64 + len as u64;
        if end > self.head() as u64 {
            return Err(SegmentError::Corruption(format!(
                "record span {}..{} beyond region head {}",
                offset,
                end,
                self.head()
            )));
        }
        let start = REGION_HEADER_BYTES + offset as usize;
        Ok(&self.mmap[start..start + len])
    }

    /// Writable view of a record span. Writes may land anywhere below
    /// capacity; the caller bumps `head` after carving a fresh record.
    pub fn record_mut(&mut self, offset: u32, len: usize) -> Result<&mut [u8]> {
        let end = offset as u64 + len as u64;
        if end > self.capacity() as u64 {
            return Err(SegmentError::OutOfSpace(format!(
                "record span {}..{} beyond region capacity {}",
                offset,
                end,
                self.capacity()
            )));
        }
        let start = REGION_HEADER_BYTES + offset as usize;
        Ok(&mut self.mmap[start..start + len])
    }

    /// Grow the backing file so at least `needed` contents bytes exist.
    /// Returns false when the request cannot fit below the offset ceiling.
    ///
    /// Only `Segment::ensure_fit` may call this.
    pub fn ensure_capacity(&mut self, needed: u64) -> Result<bool> {
        if needed > MAX_REGION_BYTES {
            return Ok(false);
        }
        if needed <= self.capacity() as u64 {
            return Ok(true);
        }

        let mut new_capacity = (self.capacity() as u64).max(1);
        while new_capacity < needed {
            new_capacity = (new_capacity * 2).min(MAX_REGION_BYTES);
        }

        self.mmap.flush()?;
        let file = OpenOptions::new().read(true).write(true).open(&self.path)?;
        file.set_len(REGION_HEADER_BYTES as u64 + new_capacity)?;
        self.mmap = unsafe { MmapMut::map_mut(&file)? };
        self.write_u32(H_CAPACITY, new_capacity as u32);
        self.reseal();
        Ok(true)
    }

    /// Flush region contents to the backing file.
    pub fn flush(&self) -> Result<()> {
        self.mmap.flush()?;
        Ok(())
    }

    fn read_u32(&self, at: usize) -> u32 {
        u32::from_le_bytes([
            self.mmap[at],
            self.mmap[at + 1],
            self.mmap[at + 2],
            self.mmap[at + 3],
        ])
    }

    fn write_u32(&mut self, at: usize, value: u32) {
        self.mmap[at..at + 4].copy_from_slice(&value.to_le_bytes());
    }

    fn header_crc(&self) -> u32 {
        crc32fast::hash(&self.mmap[..H_CRC])
    }

    /// Recompute the header checksum after a header field write.
    fn reseal(&mut self) {
        let crc = self.header_crc();
        self.write_u32(H_CRC, crc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_create_and_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("text.postings");

        {
            let mut region = PostingsRegion::create(&path, RegionKind::Text, 128).unwrap();
            assert_eq!(region.capacity(), 128);
            assert_eq!(region.head(), 0);

            region.record_mut(0, 8).unwrap().copy_from_slice(&[1, 2, 3, 4, 5, 6, 7, 8]);
            region.set_head(8);
            region.set_num_docs(1);
            region.flush().unwrap();
        }

        let region = PostingsRegion::open(&path, RegionKind::Text).unwrap();
        assert_eq!(region.head(), 8);
        assert_eq!(region.num_docs(), 1);
        assert_eq!(region.record(0, 8).unwrap(), &[1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn test_open_rejects_kind_mismatch() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        PostingsRegion::create(&path, RegionKind::Text, 64).unwrap();

        let err = PostingsRegion::open(&path, RegionKind::Label).unwrap_err();
        assert!(matches!(err, SegmentError::Corruption(_)));
    }

    #[test]
    fn test_open_rejects_bad_magic() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        PostingsRegion::create(&path, RegionKind::Label, 64).unwrap();

        // Stomp the magic field.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[0] ^= 0xFF;
        std::fs::write(&path, bytes).unwrap();

        let err = PostingsRegion::open(&path, RegionKind::Label).unwrap_err();
        assert!(matches!(err, SegmentError::Corruption(_)));
    }

    #[test]
    fn test_open_rejects_bad_crc() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        PostingsRegion::create(&path, RegionKind::Label, 64).unwrap();

        // Corrupt the stored head without resealing.
        let mut bytes = std::fs::read(&path).unwrap();
        bytes[16] = 7;
        std::fs::write(&path, bytes).unwrap();

        let err = PostingsRegion::open(&path, RegionKind::Label).unwrap_err();
        assert!(matches!(err, SegmentError::Corruption(_)));
    }

    #[test]
    fn test_growth_preserves_contents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        let mut region = PostingsRegion::create(&path, RegionKind::Text, 16).unwrap();

        region.record_mut(0, 16).unwrap().copy_from_slice(&[9u8; 16]);
        region.set_head(16);

        assert!(region.ensure_capacity(1024).unwrap());
        assert!(region.capacity() >= 1024);
        assert_eq!(region.record(0, 16).unwrap(), &[9u8; 16]);
    }

    #[test]
    fn test_record_bounds() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        let mut region = PostingsRegion::create(&path, RegionKind::Text, 32).unwrap();
        region.set_head(8);

        // Reads past head are corruption, writes past capacity are space.
        assert!(matches!(
            region.record(8, 8).unwrap_err(),
            SegmentError::Corruption(_)
        ));
        assert!(matches!(
            region.record_mut(32, 8).unwrap_err(),
            SegmentError::OutOfSpace(_)
        ));
    }

    #[test]
    fn test_ensure_capacity_ceiling() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("r.postings");
        let mut region = PostingsRegion::create(&path, RegionKind::Text, 16).unwrap();

        assert!(!region.ensure_capacity(MAX_REGION_BYTES + 1).unwrap());
        assert_eq!(region.capacity(), 16);
    }
}
