//! Byte stream surface that decoders parse from.
//!
//! Decoders see a window of contiguous bytes, consume from its front and
//! occasionally jump (ID3 skip, FLAC seek table). They do not know whether
//! the window is refilled by another core, a thread or a test fixture.

use platform::storage::File;

use crate::read_buffer::{ReadBuffer, ReadBufferError};

/// Contiguous look-ahead window over a seekable byte stream.
pub trait ByteSource {
    /// Error type
    type Error: core::fmt::Debug;

    /// Unread bytes at the cursor.
    fn buf(&self) -> &[u8];

    /// Number of unread bytes in the window.
    fn left(&self) -> usize {
        self.buf().len()
    }

    /// Stream offset of the first byte of [`buf`](ByteSource::buf).
    fn tell(&self) -> u64;

    /// Consume `n` bytes, refilling the window as the source sees fit.
    fn shift(&mut self, n: usize) -> impl core::future::Future<Output = Result<(), Self::Error>>;

    /// Jump to absolute stream offset `pos`.
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<(), Self::Error>>;
}

impl<F: File, const SIZE: usize, const CHUNK: usize, const N: usize> ByteSource
    for ReadBuffer<'_, F, SIZE, CHUNK, N>
{
    type Error = ReadBufferError;

    fn buf(&self) -> &[u8] {
        ReadBuffer::buf(self)
    }

    fn left(&self) -> usize {
        ReadBuffer::left(self)
    }

    fn tell(&self) -> u64 {
        ReadBuffer::tell(self)
    }

    async fn shift(&mut self, n: usize) -> Result<(), Self::Error> {
        ReadBuffer::shift(self, n).await
    }

    async fn seek(&mut self, pos: u64) -> Result<(), Self::Error> {
        ReadBuffer::seek(self, pos).await
    }
}

/// Copy up to `out.len()` bytes from `source` and consume them.
///
/// Stops early only when the window runs dry, which for a [`ReadBuffer`]
/// means end of file. Returns the number of bytes copied.
pub async fn read_into<S: ByteSource>(source: &mut S, out: &mut [u8]) -> Result<usize, S::Error> {
    let mut copied = 0;
    while let Some(dst) = out.get_mut(copied..).filter(|d| !d.is_empty()) {
        let n = dst.len().min(source.left());
        if n == 0 {
            break;
        }
        if let (Some(dst), Some(src)) = (dst.get_mut(..n), source.buf().get(..n)) {
            dst.copy_from_slice(src);
        }
        source.shift(n).await?;
        copied = copied.saturating_add(n);
    }
    Ok(copied)
}

/// Consume `n` bytes without looking at them, across as many refills as it
/// takes. Returns the number actually skipped.
pub async fn skip<S: ByteSource>(source: &mut S, n: u64) -> Result<u64, S::Error> {
    let mut remaining = n;
    while remaining > 0 {
        let step = usize::try_from(remaining).unwrap_or(usize::MAX).min(source.left());
        if step == 0 {
            break;
        }
        source.shift(step).await?;
        remaining = remaining.saturating_sub(step as u64);
    }
    Ok(n.saturating_sub(remaining))
}
