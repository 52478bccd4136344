//! Shared harness: a 4096/1024/4 pipeline with the fill loop on its own
//! thread, the way the second core runs it on hardware.
#![allow(dead_code, clippy::unwrap_used, clippy::expect_used)]

use platform::config::{NUM_SECONDARY_BUFFERS, READ_BUFFER_SIZE, SECONDARY_BUFFER_SIZE};
use platform::mocks::MemoryFile;
use platform::storage::File;
use playback::read_buffer::{ReadBufferConfig, ReadBufferThread};

pub type Pipeline<F = MemoryFile> =
    ReadBufferThread<F, READ_BUFFER_SIZE, SECONDARY_BUFFER_SIZE, NUM_SECONDARY_BUFFERS>;

pub fn spawn(config: ReadBufferConfig) -> Pipeline {
    spawn_for(config)
}

/// [`spawn`] for any file handle that can move to the fill loop thread.
pub fn spawn_for<F: File + Send + 'static>(config: ReadBufferConfig) -> Pipeline<F> {
    Pipeline::spawn(config).expect("default geometry is valid")
}

/// Drain the window to end of file, returning every byte seen.
pub async fn drain<F: File + Send + 'static>(p: &mut Pipeline<F>) -> Vec<u8> {
    let mut seen = Vec::new();
    while p.left() > 0 {
        seen.extend_from_slice(p.buf());
        p.shift_all().await.unwrap();
    }
    seen
}
