//! Where the read pipeline gets its bytes from.
//!
//! [`File`] is the only thing the fill loop touches; [`Storage`] is how a
//! caller obtains one (SD card on the target, a directory on the host).

/// A volume that hands out readable files by path.
pub trait Storage {
    /// Error type
    type Error: core::fmt::Debug;
    /// Handle type returned by [`open_file`](Storage::open_file).
    type File: File;

    /// Open `path` for reading, positioned at offset 0.
    fn open_file(
        &mut self,
        path: &str,
    ) -> impl core::future::Future<Output = Result<Self::File, Self::Error>>;
}

/// An open, readable file handle.
///
/// Reads and seeks block the calling task until the medium answers. The
/// handle tracks its own read position so that [`position`](File::position)
/// and [`is_eof`](File::is_eof) never touch the medium.
pub trait File {
    /// Error type
    type Error: core::fmt::Debug;

    /// Read from the current position into `buf`.
    ///
    /// Returns the number of bytes read. `Ok(0)` means no bytes were
    /// available; a short read is not an error.
    fn read(
        &mut self,
        buf: &mut [u8],
    ) -> impl core::future::Future<Output = Result<usize, Self::Error>>;

    /// Seek to an absolute position, returning the new position.
    fn seek(&mut self, pos: u64) -> impl core::future::Future<Output = Result<u64, Self::Error>>;

    /// Current read position (bytes from the start of the file).
    fn position(&self) -> u64;

    /// Get file size
    fn size(&self) -> u64;

    /// `true` once the read position has reached the end of the file.
    fn is_eof(&self) -> bool {
        self.position() >= self.size()
    }
}
