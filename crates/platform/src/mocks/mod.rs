//! Mock implementations for testing
//!
//! [`MemoryFile`] is an in-memory [`File`] with optional fault injection,
//! used by the playback crate to drive the read pipeline without a card.

#![cfg(any(test, feature = "std"))]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::vec::Vec;

use crate::storage::File;

/// Error produced by [`MemoryFile`] fault injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFileError {
    /// A read was attempted at or beyond the configured failure offset.
    InjectedReadFault,
    /// Seek target lies beyond the end of the file.
    SeekOutOfRange,
}

impl core::fmt::Display for MemoryFileError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::InjectedReadFault => f.write_str("injected read fault"),
            Self::SeekOutOfRange => f.write_str("seek beyond end of file"),
        }
    }
}

/// In-memory file handle.
///
/// Cloning shares the read counter but not the position, so a test can keep
/// a clone for counting reads while the original is moved into the pipeline.
#[derive(Debug, Clone)]
pub struct MemoryFile {
    data: Arc<Vec<u8>>,
    pos: u64,
    reported_size: Option<u64>,
    fail_reads_from: Option<u64>,
    max_read: Option<usize>,
    reads: Arc<AtomicUsize>,
}

impl MemoryFile {
    /// Wrap `data` as a file positioned at offset 0.
    pub fn new(data: Vec<u8>) -> Self {
        Self {
            data: Arc::new(data),
            pos: 0,
            reported_size: None,
            fail_reads_from: None,
            max_read: None,
            reads: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// File of `len` bytes where byte `i` is `i % 251`.
    ///
    /// 251 is prime, so any misplaced chunk shows up as a content mismatch.
    #[allow(clippy::cast_possible_truncation)] // Safety: i % 251 < 256
    pub fn patterned(len: usize) -> Self {
        Self::new((0..len).map(|i| (i % 251) as u8).collect())
    }

    /// Fail every read issued at an offset `>= offset`.
    #[must_use]
    pub fn fail_reads_from(mut self, offset: u64) -> Self {
        self.fail_reads_from = Some(offset);
        self
    }

    /// Report `size` from [`File::size`] regardless of the real length.
    ///
    /// A size larger than the data makes reads at the real end return
    /// `Ok(0)` while `is_eof()` is still false.
    #[must_use]
    pub fn with_reported_size(mut self, size: u64) -> Self {
        self.reported_size = Some(size);
        self
    }

    /// Cap every read at `max` bytes to simulate short reads.
    #[must_use]
    pub fn with_max_read(mut self, max: usize) -> Self {
        self.max_read = Some(max);
        self
    }

    /// The full file content.
    pub fn contents(&self) -> &[u8] {
        &self.data
    }

    /// Number of `read` calls issued so far, across all clones.
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl File for MemoryFile {
    type Error = MemoryFileError;

    #[allow(clippy::indexing_slicing)] // Safety: start <= end <= data.len() by construction below
    #[allow(clippy::arithmetic_side_effects)] // Safety: start + n <= data.len()
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reads_from.is_some_and(|at| self.pos >= at) {
            return Err(MemoryFileError::InjectedReadFault);
        }
        let start = usize::try_from(self.pos).unwrap_or(usize::MAX).min(self.data.len());
        let mut n = buf.len().min(self.data.len() - start);
        if let Some(max) = self.max_read {
            n = n.min(max);
        }
        buf[..n].copy_from_slice(&self.data[start..start + n]);
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        if pos > self.size() {
            return Err(MemoryFileError::SeekOutOfRange);
        }
        self.pos = pos;
        Ok(pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.reported_size.unwrap_or(self.data.len() as u64)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn memory_file_reads_sequentially() {
        let mut file = MemoryFile::patterned(600);
        let mut buf = [0u8; 512];
        assert_eq!(file.read(&mut buf).await.unwrap(), 512);
        assert_eq!(buf[300], 49); // 300 % 251
        assert_eq!(file.read(&mut buf).await.unwrap(), 88);
        assert!(file.is_eof());
        assert_eq!(file.read(&mut buf).await.unwrap(), 0);
        assert_eq!(file.read_count(), 3);
    }

    #[tokio::test]
    async fn memory_file_injected_fault() {
        let mut file = MemoryFile::patterned(4096).fail_reads_from(1024);
        let mut buf = [0u8; 1024];
        assert_eq!(file.read(&mut buf).await.unwrap(), 1024);
        assert_eq!(file.read(&mut buf).await, Err(MemoryFileError::InjectedReadFault));
    }

    #[tokio::test]
    async fn memory_file_short_reads() {
        let mut file = MemoryFile::patterned(100).with_max_read(7);
        let mut buf = [0u8; 64];
        assert_eq!(file.read(&mut buf).await.unwrap(), 7);
        assert_eq!(file.position(), 7);
    }

    #[tokio::test]
    async fn memory_file_seek_past_end_rejected() {
        let mut file = MemoryFile::patterned(10);
        assert_eq!(file.seek(10).await.unwrap(), 10);
        assert!(file.is_eof());
        assert_eq!(file.seek(11).await, Err(MemoryFileError::SeekOutOfRange));
    }

    #[test]
    fn clones_share_read_counter() {
        let file = MemoryFile::patterned(10);
        let counter = file.clone();
        let mut moved = file;
        let mut buf = [0u8; 4];
        block_on(moved.read(&mut buf)).unwrap();
        assert_eq!(counter.read_count(), 1);
    }

    fn block_on<T>(fut: impl core::future::Future<Output = T>) -> T {
        tokio::runtime::Builder::new_current_thread().build().unwrap().block_on(fut)
    }
}
