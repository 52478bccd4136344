//! `std::fs` backed [`Storage`] for the emulator and host tests.
//!
//! Reads are synchronous under the hood; the fill loop runs on its own
//! thread on the host, so blocking there is harmless.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::{Path, PathBuf};

use crate::storage::{File, Storage};

/// I/O failure from the host file system.
#[derive(Debug)]
pub struct LocalStorageError(pub std::io::Error);

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "local storage error: {}", self.0)
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

impl From<std::io::Error> for LocalStorageError {
    fn from(e: std::io::Error) -> Self {
        Self(e)
    }
}

/// Open file on the host. Size is sampled once at open.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
    pos: u64,
}

impl LocalFile {
    /// Open `path` directly, without a [`LocalFileStorage`] root.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, LocalStorageError> {
        let inner = fs::File::open(path)?;
        let size = inner.metadata()?.len();
        Ok(Self { inner, size, pos: 0 })
    }
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        let n = self.inner.read(buf)?;
        self.pos = self.pos.saturating_add(n as u64);
        Ok(n)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        self.pos = self.inner.seek(SeekFrom::Start(pos))?;
        Ok(self.pos)
    }

    fn position(&self) -> u64 {
        self.pos
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// Directory standing in for the SD card volume.
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Resolve every path relative to `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        LocalFile::open(self.root.join(path))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::cast_possible_truncation)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn volume(name: &str, len: usize) -> (TempDir, LocalFileStorage) {
        let dir = TempDir::new().unwrap();
        let data: Vec<u8> = (0..len).map(|i| (i % 251) as u8).collect();
        fs::write(dir.path().join(name), data).unwrap();
        let storage = LocalFileStorage::new(dir.path());
        (dir, storage)
    }

    #[tokio::test]
    async fn chunked_reads_end_with_a_short_chunk() {
        let (_dir, mut storage) = volume("track.wav", 2500);
        let mut file = storage.open_file("track.wav").await.unwrap();
        assert_eq!(file.size(), 2500);
        let mut chunk = [0u8; 1024];
        assert_eq!(file.read(&mut chunk).await.unwrap(), 1024);
        assert_eq!(file.read(&mut chunk).await.unwrap(), 1024);
        assert!(!file.is_eof());
        assert_eq!(file.read(&mut chunk).await.unwrap(), 452);
        assert_eq!(file.position(), 2500);
        assert!(file.is_eof());
        assert_eq!(file.read(&mut chunk).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn seek_moves_the_read_position() {
        let (_dir, mut storage) = volume("track.wav", 600);
        let mut file = storage.open_file("track.wav").await.unwrap();
        assert_eq!(file.seek(300).await.unwrap(), 300);
        let mut byte = [0u8; 1];
        file.read(&mut byte).await.unwrap();
        assert_eq!(byte[0], 49); // 300 % 251
        assert_eq!(file.position(), 301);
    }

    #[tokio::test]
    async fn empty_file_starts_at_eof() {
        let (_dir, mut storage) = volume("silence.wav", 0);
        let file = storage.open_file("silence.wav").await.unwrap();
        assert!(file.is_eof());
    }

    #[tokio::test]
    async fn missing_file_is_an_io_error() {
        let (_dir, mut storage) = volume("track.wav", 1);
        let err = storage.open_file("nope.wav").await.err().expect("open must fail");
        assert_eq!(err.0.kind(), std::io::ErrorKind::NotFound);
    }
}
