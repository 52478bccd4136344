//! Error and state types shared by both sides of the read pipeline.

/// Why the fill loop failed.
///
/// The loop has no supervisor; once it fails the binding is gone and every
/// later consumer call reports [`ReadBufferError::FillLoopFailed`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FillFailure {
    /// The file handle returned an error from `read`.
    Read,
    /// `read` returned zero bytes before the handle reported end of file.
    ZeroLengthRead,
}

impl core::fmt::Display for FillFailure {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Read => f.write_str("file read error"),
            Self::ZeroLengthRead => f.write_str("zero-length read before end of file"),
        }
    }
}

/// Observable state of the fill loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FillState {
    /// No file bound; waiting for a connect request.
    Idle,
    /// Bound and prefetching chunks.
    Streaming,
    /// Bound, every byte up to end of file has been published. No further
    /// reads happen until the next rebind, but requests are still served.
    EndOfFile,
    /// Terminal: the loop exited on a read failure.
    Failed(FillFailure),
    /// Terminal: the loop served a shutdown request and exited.
    Stopped,
}

impl core::fmt::Display for FillState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Idle => f.write_str("idle"),
            Self::Streaming => f.write_str("streaming"),
            Self::EndOfFile => f.write_str("end of file"),
            Self::Failed(reason) => write!(f, "failed ({reason})"),
            Self::Stopped => f.write_str("stopped"),
        }
    }
}

/// Errors returned by [`ReadBuffer`](super::ReadBuffer) operations.
///
/// None of these leave the primary window half-updated: an operation that
/// fails has not moved the cursor or changed `left`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ReadBufferError {
    /// The current binding has delivered its last chunk.
    EndOfFile,
    /// No chunk was queued and the fill loop is not producing any
    /// (protocol violation, e.g. `fill()` before `connect()`).
    Underrun,
    /// The window has less than one chunk of free space.
    NoSpace,
    /// `shift` asked for more bytes than the window holds.
    OutOfRange {
        /// Bytes requested.
        requested: usize,
        /// Bytes available.
        left: usize,
    },
    /// No file handle is parked on the consumer side.
    NotBound,
    /// The fill loop already holds a file handle.
    AlreadyConnected,
    /// A bind request is still outstanding.
    ControlBusy,
    /// The file handle rejected the seek.
    Seek,
    /// The fill loop has stopped; see [`FillFailure`].
    FillLoopFailed(FillFailure),
    /// The fill loop was shut down and no longer serves requests.
    ShutDown,
}

impl core::fmt::Display for ReadBufferError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::EndOfFile => f.write_str("end of file"),
            Self::Underrun => f.write_str("secondary buffer queue is empty"),
            Self::NoSpace => f.write_str("no room for another chunk"),
            Self::OutOfRange { requested, left } => {
                write!(f, "shift of {requested} bytes exceeds {left} buffered")
            }
            Self::NotBound => f.write_str("no file bound"),
            Self::AlreadyConnected => f.write_str("fill loop already holds a file"),
            Self::ControlBusy => f.write_str("bind request already pending"),
            Self::Seek => f.write_str("seek failed"),
            Self::FillLoopFailed(reason) => write!(f, "fill loop stopped: {reason}"),
            Self::ShutDown => f.write_str("fill loop shut down"),
        }
    }
}

/// Rejected [`ReadBufferConfig`](super::ReadBufferConfig) / buffer geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConfigError {
    /// Fill threshold exceeds the primary buffer size.
    ThresholdTooLarge {
        /// Requested threshold.
        threshold: usize,
        /// Primary buffer size.
        size: usize,
    },
    /// A secondary chunk would not fit in the primary buffer.
    ChunkLargerThanBuffer {
        /// Chunk size.
        chunk: usize,
        /// Primary buffer size.
        size: usize,
    },
    /// Secondary chunks must hold at least one byte.
    EmptyChunk,
    /// The slot pool must hold at least one chunk.
    EmptyPool,
}

impl core::fmt::Display for ConfigError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::ThresholdTooLarge { threshold, size } => {
                write!(f, "fill threshold {threshold} exceeds buffer size {size}")
            }
            Self::ChunkLargerThanBuffer { chunk, size } => {
                write!(f, "chunk size {chunk} exceeds buffer size {size}")
            }
            Self::EmptyChunk => f.write_str("chunk size must be non-zero"),
            Self::EmptyPool => f.write_str("slot pool must hold at least one chunk"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn failed_state_display_names_reason() {
        let s = FillState::Failed(FillFailure::ZeroLengthRead).to_string();
        assert_eq!(s, "failed (zero-length read before end of file)");
    }

    #[test]
    fn stopped_is_distinct_from_failure() {
        assert_eq!(FillState::Stopped.to_string(), "stopped");
        assert_eq!(ReadBufferError::ShutDown.to_string(), "fill loop shut down");
        assert_ne!(
            ReadBufferError::ShutDown,
            ReadBufferError::FillLoopFailed(FillFailure::Read)
        );
    }

    #[test]
    fn out_of_range_display_has_both_counts() {
        let e = ReadBufferError::OutOfRange { requested: 5000, left: 1248 };
        assert_eq!(e.to_string(), "shift of 5000 bytes exceeds 1248 buffered");
    }
}
