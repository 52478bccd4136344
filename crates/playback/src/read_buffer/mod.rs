//! Double-buffered file reader split across two execution contexts.
//!
//! A [`FillLoop`] owns the file handle and keeps a pool of secondary chunks
//! full; a [`ReadBuffer`] owns a contiguous primary window that decoders read
//! from and refills it one chunk at a time. On the target the two halves run
//! on separate cores; on the host the fill loop gets its own thread (see
//! `ReadBufferThread` with the `std` feature).
//!
//! ```text
//!   File ──read──▶ FillLoop ──▶ SlotPool ──fill()──▶ ReadBuffer ──buf()──▶ decoder
//!                     ▲                                   │
//!                     └────── Control (bind handshake) ───┘
//! ```
//!
//! # Wiring
//!
//! ```ignore
//! static CONTROL: Control<SdFile> = Control::new();
//! static POOL: SlotPool<1024, 4> = SlotPool::new();
//!
//! let (mut reader, fill) = split::<_, 4096, 1024, 4>(&CONTROL, &POOL, ReadBufferConfig::DEFAULT)?;
//! core1_spawner.spawn(fill_task(fill));
//! reader.open(file).await?;
//! ```

mod control;
mod error;
mod fill_loop;
mod primary;
mod slot;
#[cfg(any(test, feature = "std"))]
mod thread;

pub use control::{BindRequest, BindResponse, Control};
pub use error::{ConfigError, FillFailure, FillState, ReadBufferError};
pub use fill_loop::FillLoop;
pub use primary::ReadBuffer;
pub use slot::{Chunk, SlotPool};
#[cfg(any(test, feature = "std"))]
pub use thread::{ReadBufferThread, SpawnError};

use platform::config::READ_BUFFER_FILL_THRESHOLD;
use platform::storage::File;

/// Runtime tuning of a [`ReadBuffer`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ReadBufferConfig {
    fill_threshold: usize,
}

impl ReadBufferConfig {
    /// Auto-fill below [`READ_BUFFER_FILL_THRESHOLD`] bytes.
    pub const DEFAULT: Self = Self { fill_threshold: READ_BUFFER_FILL_THRESHOLD };

    /// No auto-fill; the caller drives [`ReadBuffer::fill`] itself.
    pub const MANUAL: Self = Self { fill_threshold: 0 };

    /// `shift` refills once fewer than `fill_threshold` bytes remain.
    /// Zero disables auto-fill.
    pub const fn with_fill_threshold(fill_threshold: usize) -> Self {
        Self { fill_threshold }
    }

    /// Configured auto-fill threshold in bytes.
    pub const fn fill_threshold(&self) -> usize {
        self.fill_threshold
    }

    /// Check this configuration against a primary buffer of `size` bytes fed
    /// by `slots` secondary buffers of `chunk` bytes.
    pub const fn validate(&self, size: usize, chunk: usize, slots: usize) -> Result<(), ConfigError> {
        if slots == 0 {
            return Err(ConfigError::EmptyPool);
        }
        if chunk == 0 {
            return Err(ConfigError::EmptyChunk);
        }
        if chunk > size {
            return Err(ConfigError::ChunkLargerThanBuffer { chunk, size });
        }
        if self.fill_threshold > size {
            return Err(ConfigError::ThresholdTooLarge { threshold: self.fill_threshold, size });
        }
        Ok(())
    }
}

impl Default for ReadBufferConfig {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Build both halves of a read pipeline over `pool`.
///
/// Both halves borrow `control` and `pool` for `'a`; on the target that is
/// `'static` storage shared between cores. Any chunks left in `pool` by an
/// earlier pipeline are dropped.
///
/// # Errors
///
/// [`ConfigError`] if `config` does not fit `SIZE`, `CHUNK` and `N`.
#[allow(clippy::type_complexity)]
pub fn split<'a, F: File, const SIZE: usize, const CHUNK: usize, const N: usize>(
    control: &'a Control<F>,
    pool: &'a SlotPool<CHUNK, N>,
    config: ReadBufferConfig,
) -> Result<(ReadBuffer<'a, F, SIZE, CHUNK, N>, FillLoop<'a, F, CHUNK, N>), ConfigError> {
    config.validate(SIZE, CHUNK, N)?;
    pool.reset();
    Ok((ReadBuffer::new(control, pool, config), FillLoop::new(control, pool)))
}
