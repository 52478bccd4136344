//! Application configuration and constants
//!
//! Central sizing for the streaming read pipeline. Buffers are sized at
//! compile time; these constants are the defaults the firmware builds with.

/// Size in bytes of the primary read window handed to the decoder.
pub const READ_BUFFER_SIZE: usize = 4096;

/// The primary window is refilled automatically once fewer than this many
/// unread bytes remain. `0` selects manual filling.
pub const READ_BUFFER_FILL_THRESHOLD: usize = 1024;

/// Size in bytes of one secondary (prefetch) chunk.
pub const SECONDARY_BUFFER_SIZE: usize = 1024;

/// Number of secondary chunks the fill loop may keep in flight.
pub const NUM_SECONDARY_BUFFERS: usize = 4;

// A refill triggered just below the threshold must still fit one chunk.
#[allow(clippy::arithmetic_side_effects)]
const _: () = assert!(READ_BUFFER_FILL_THRESHOLD <= READ_BUFFER_SIZE - SECONDARY_BUFFER_SIZE + 1);
const _: () = assert!(SECONDARY_BUFFER_SIZE <= READ_BUFFER_SIZE);
