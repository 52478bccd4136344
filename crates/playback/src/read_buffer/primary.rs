//! Consumer side of the read pipeline: the primary look-ahead window.
//!
//! ```text
//!  data: [ consumed ... | ptr ──── left valid bytes ────| zero padding ]
//!        0              ptr                          ptr+left          SIZE
//! ```
//!
//! `fill` slides the unread tail down to offset 0, appends one secondary
//! chunk and zeroes whatever is left of the array. Decoders read through
//! [`ReadBuffer::buf`] and consume with [`ReadBuffer::shift`].

use embassy_futures::select::{select, Either};
use platform::storage::File;

use super::control::{BindRequest, BindResponse, Control};
use super::error::{FillState, ReadBufferError};
use super::slot::{Chunk, SlotPool};
use super::ReadBufferConfig;

/// Primary read window of `SIZE` bytes fed by `N` secondary slots of
/// `CHUNK` bytes.
pub struct ReadBuffer<'a, F, const SIZE: usize, const CHUNK: usize, const N: usize> {
    control: &'a Control<F>,
    pool: &'a SlotPool<CHUNK, N>,
    data: [u8; SIZE],
    /// Offset of the first unread byte.
    ptr: usize,
    /// Valid unread bytes starting at `ptr`.
    left: usize,
    /// Absolute file position after the last byte loaded into `data`.
    pos: u64,
    eof: bool,
    fill_threshold: usize,
    /// Handle parked here while the fill loop does not hold it.
    file: Option<F>,
    connected: bool,
}

impl<'a, F: File, const SIZE: usize, const CHUNK: usize, const N: usize>
    ReadBuffer<'a, F, SIZE, CHUNK, N>
{
    #[allow(clippy::large_stack_arrays)] // moved into a static or a Box by the caller
    pub(crate) fn new(
        control: &'a Control<F>,
        pool: &'a SlotPool<CHUNK, N>,
        config: ReadBufferConfig,
    ) -> Self {
        Self {
            control,
            pool,
            data: [0u8; SIZE],
            ptr: 0,
            left: 0,
            pos: 0,
            eof: false,
            fill_threshold: config.fill_threshold(),
            file: None,
            connected: false,
        }
    }

    // ── Binding ────────────────────────────────────────────────────────────

    /// Associate `file` and reset the window to empty at its current position.
    ///
    /// Does not start prefetching; call [`connect`](Self::connect) (or use
    /// [`open`](Self::open)). A handle parked by an earlier `bind` is dropped.
    ///
    /// # Errors
    ///
    /// [`ReadBufferError::AlreadyConnected`] if the fill loop still holds a
    /// handle; disconnect first.
    pub fn bind(&mut self, file: F) -> Result<(), ReadBufferError> {
        if self.connected {
            return Err(ReadBufferError::AlreadyConnected);
        }
        let pos = file.position();
        self.file = Some(file);
        self.reset(pos);
        Ok(())
    }

    /// [`bind`](Self::bind) then [`connect`](Self::connect).
    pub async fn open(&mut self, file: F) -> Result<(), ReadBufferError> {
        self.bind(file)?;
        self.connect().await
    }

    /// Lend the parked handle to the fill loop and wait until its pool is
    /// primed, then seed the window with one chunk.
    ///
    /// Prefetching resumes right after the last byte in the window, so a
    /// `disconnect`/`connect` pair leaves the stream contiguous.
    pub async fn connect(&mut self) -> Result<(), ReadBufferError> {
        self.control.set_rebinding(true);
        let result = self.request_bind(true).await;
        self.control.set_rebinding(false);
        result
    }

    /// Stop prefetching and take the handle back. Chunks already queued are
    /// discarded; bytes already in the window stay readable.
    ///
    /// Disconnecting an idle fill loop is a no-op that succeeds.
    pub async fn disconnect(&mut self) -> Result<(), ReadBufferError> {
        self.control.set_rebinding(true);
        let result = self.request_bind(false).await;
        self.control.set_rebinding(false);
        result
    }

    /// Disconnect if needed and hand the file back to the caller.
    pub async fn close(&mut self) -> Result<Option<F>, ReadBufferError> {
        if self.connected {
            self.disconnect().await?;
        }
        self.reset(0);
        Ok(self.file.take())
    }

    /// Reposition the stream at absolute offset `pos`.
    ///
    /// Disconnects (dropping every prefetched chunk), seeks the handle,
    /// empties the window and reconnects. On return the window holds the
    /// first chunk at `pos` and `tell() == pos`.
    pub async fn seek(&mut self, pos: u64) -> Result<(), ReadBufferError> {
        self.control.set_rebinding(true);
        let result = self.seek_inner(pos).await;
        self.control.set_rebinding(false);
        result
    }

    async fn seek_inner(&mut self, pos: u64) -> Result<(), ReadBufferError> {
        if self.connected {
            self.request_bind(false).await?;
        }
        let file = self.file.as_mut().ok_or(ReadBufferError::NotBound)?;
        if file.seek(pos).await.is_err() {
            error!("seek to {} rejected by file handle", pos);
            return Err(ReadBufferError::Seek);
        }
        trace!("seek to {}", pos);
        self.reset(pos);
        self.request_bind(true).await
    }

    /// Ask the fill loop to leave its service loop, returning the handle.
    ///
    /// Nothing answers bind requests afterwards; later handshakes fail with
    /// [`ReadBufferError::ShutDown`].
    pub async fn shutdown(&mut self) -> Result<Option<F>, ReadBufferError> {
        self.fail_if_stopped()?;
        self.send_request(BindRequest::Shutdown)?;
        match self.await_response().await? {
            BindResponse::Released(file) => {
                self.connected = false;
                Ok(file.or_else(|| self.file.take()))
            }
            BindResponse::AlreadyStreaming(file) => {
                self.connected = false;
                Ok(Some(file))
            }
            BindResponse::Connected => Err(ReadBufferError::ControlBusy),
        }
    }

    /// One bind handshake. `connect = false` is a disconnect.
    async fn request_bind(&mut self, connect: bool) -> Result<(), ReadBufferError> {
        self.fail_if_stopped()?;
        let request = if connect {
            if self.connected {
                return Err(ReadBufferError::AlreadyConnected);
            }
            BindRequest::Connect(self.take_file_at_window_end().await?)
        } else {
            BindRequest::Disconnect
        };
        self.control.primed.reset();
        self.send_request(request)?;

        match self.await_response().await? {
            BindResponse::Connected => self.connected = true,
            BindResponse::Released(file) => {
                self.connected = false;
                if file.is_some() {
                    self.file = file;
                }
            }
            BindResponse::AlreadyStreaming(file) => {
                self.file = Some(file);
                return Err(ReadBufferError::AlreadyConnected);
            }
        }

        if connect {
            // A failure while priming still leaves the chunks read before it;
            // the seeding fill below takes one or reports the failure.
            if let Either::Second(failure) =
                select(self.control.primed.wait(), self.control.stopped()).await
            {
                debug!("fill loop stopped while priming: {}", failure);
            }
            match self.fill().await {
                Ok(_) | Err(ReadBufferError::EndOfFile) => {}
                Err(e) => return Err(e),
            }
        }
        Ok(())
    }

    /// Take the parked handle, positioned just past the last loaded byte.
    async fn take_file_at_window_end(&mut self) -> Result<F, ReadBufferError> {
        let file = self.file.as_mut().ok_or(ReadBufferError::NotBound)?;
        if file.position() != self.pos {
            trace!("resuming handle at {} (was at {})", self.pos, file.position());
            if file.seek(self.pos).await.is_err() {
                error!("seek to {} rejected by file handle", self.pos);
                return Err(ReadBufferError::Seek);
            }
        }
        self.file.take().ok_or(ReadBufferError::NotBound)
    }

    fn send_request(&mut self, request: BindRequest<F>) -> Result<(), ReadBufferError> {
        match self.control.requests.try_send(request) {
            Ok(()) => Ok(()),
            Err(embassy_sync::channel::TrySendError::Full(request)) => {
                error!("bind request queue full");
                if let BindRequest::Connect(file) = request {
                    self.file = Some(file);
                }
                Err(ReadBufferError::ControlBusy)
            }
        }
    }

    async fn await_response(&self) -> Result<BindResponse<F>, ReadBufferError> {
        match select(self.control.responses.receive(), self.control.stopped()).await {
            Either::First(response) => Ok(response),
            Either::Second(failure) => Err(ReadBufferError::FillLoopFailed(failure)),
        }
    }

    fn fail_if_stopped(&self) -> Result<(), ReadBufferError> {
        match self.control.fill_state() {
            FillState::Failed(failure) => Err(ReadBufferError::FillLoopFailed(failure)),
            FillState::Stopped => Err(ReadBufferError::ShutDown),
            FillState::Idle | FillState::Streaming | FillState::EndOfFile => Ok(()),
        }
    }

    fn reset(&mut self, pos: u64) {
        self.ptr = 0;
        self.left = 0;
        self.pos = pos;
        self.eof = false;
    }

    // ── Window ─────────────────────────────────────────────────────────────

    /// The unread bytes, starting at the cursor.
    pub fn buf(&self) -> &[u8] {
        self.data
            .get(self.ptr..)
            .and_then(|tail| tail.get(..self.left))
            .unwrap_or(&[])
    }

    /// Number of unread bytes in the window.
    pub fn left(&self) -> usize {
        self.left
    }

    /// Logical stream position: the file offset of the byte at the cursor.
    #[allow(clippy::arithmetic_side_effects)] // Safety: left <= bytes loaded since the last reset at pos
    pub fn tell(&self) -> u64 {
        self.pos - self.left as u64
    }

    /// `true` once the chunk carrying end of file has been loaded.
    ///
    /// The stream is exhausted when this holds and [`left`](Self::left) is 0.
    pub fn is_eof(&self) -> bool {
        self.eof
    }

    /// `true` while the fill loop holds the file handle.
    pub fn is_connected(&self) -> bool {
        self.connected
    }

    /// Chunks prefetched and waiting to be filled in.
    pub fn queued(&self) -> usize {
        self.pool.queued()
    }

    /// State of the fill loop feeding this buffer.
    pub fn fill_state(&self) -> FillState {
        self.control.fill_state()
    }

    /// Consume `n` bytes from the front of the window.
    ///
    /// Refills automatically once fewer than the configured threshold remain.
    /// A failed refill does not fail the shift; the caller sees it as a
    /// window that stops growing, and [`fill`](Self::fill) reports why.
    ///
    /// # Errors
    ///
    /// [`ReadBufferError::OutOfRange`] if `n > left()`; nothing is consumed.
    #[allow(clippy::arithmetic_side_effects)] // Safety: n <= left and ptr + left <= SIZE
    pub async fn shift(&mut self, n: usize) -> Result<(), ReadBufferError> {
        if n > self.left {
            return Err(ReadBufferError::OutOfRange { requested: n, left: self.left });
        }
        self.ptr += n;
        self.left -= n;
        if self.connected && self.left < self.fill_threshold {
            match self.fill().await {
                Ok(_) | Err(ReadBufferError::EndOfFile | ReadBufferError::NoSpace) => {}
                Err(e) => warn!("auto fill failed: {}", e),
            }
        }
        Ok(())
    }

    /// Consume every unread byte.
    pub async fn shift_all(&mut self) -> Result<(), ReadBufferError> {
        self.shift(self.left).await
    }

    /// Move one secondary chunk into the window.
    ///
    /// Waits for the chunk if the fill loop is still producing. Returns the
    /// number of bytes appended.
    ///
    /// # Errors
    ///
    /// - [`ReadBufferError::EndOfFile`]: the binding is exhausted.
    /// - [`ReadBufferError::NoSpace`]: fewer than `CHUNK` bytes are free.
    /// - [`ReadBufferError::Underrun`]: nothing queued and nothing coming.
    /// - [`ReadBufferError::FillLoopFailed`]: the producer has failed.
    /// - [`ReadBufferError::ShutDown`]: the producer was shut down.
    ///
    /// The window is unchanged on every error.
    #[allow(clippy::indexing_slicing)] // Safety: ptr + left <= SIZE, and left + len <= SIZE is checked up front
    #[allow(clippy::arithmetic_side_effects)] // Safety: same bounds
    pub async fn fill(&mut self) -> Result<usize, ReadBufferError> {
        if self.eof {
            return Err(ReadBufferError::EndOfFile);
        }
        if SIZE.saturating_sub(self.left) < CHUNK {
            return Err(ReadBufferError::NoSpace);
        }
        let chunk = match self.pool.try_take() {
            Some(chunk) => chunk,
            None => self.wait_for_chunk().await?,
        };

        let pool = self.pool;
        let len = chunk.len().min(CHUNK);
        {
            let slot = pool.slot(chunk.index()).await;
            self.data.copy_within(self.ptr..self.ptr + self.left, 0);
            let end = self.left + len;
            self.data[self.left..end].copy_from_slice(&slot[..len]);
            self.data[end..].fill(0);
            self.left = end;
        }
        pool.recycle(chunk.index());

        self.ptr = 0;
        self.pos = chunk.pos();
        self.eof = chunk.eof();
        trace!("filled {} bytes, left={}, pos={}", len, self.left, self.pos);
        Ok(len)
    }

    /// Block until a chunk is queued, or report why none will come.
    async fn wait_for_chunk(&mut self) -> Result<Chunk, ReadBufferError> {
        match self.control.fill_state() {
            FillState::Streaming => {
                debug!("read buffer underrun, waiting for fill loop");
                match select(self.pool.take(), self.control.stopped()).await {
                    Either::First(chunk) => Ok(chunk),
                    Either::Second(failure) => self
                        .pool
                        .try_take()
                        .ok_or(ReadBufferError::FillLoopFailed(failure)),
                }
            }
            // The final chunk may have been published just before the state
            // changed; only an empty queue means the binding is exhausted.
            FillState::EndOfFile => match self.pool.try_take() {
                Some(chunk) => Ok(chunk),
                None => {
                    self.eof = true;
                    Err(ReadBufferError::EndOfFile)
                }
            },
            FillState::Failed(failure) => self
                .pool
                .try_take()
                .ok_or(ReadBufferError::FillLoopFailed(failure)),
            FillState::Stopped => Err(ReadBufferError::ShutDown),
            FillState::Idle => {
                error!("secondary buffer queue is empty");
                Err(ReadBufferError::Underrun)
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::read_buffer::{split, FillFailure, FillLoop};
    use platform::mocks::MemoryFile;

    type Reader<const N: usize> = ReadBuffer<'static, MemoryFile, 64, 16, N>;

    fn pipeline<const N: usize>(
        config: ReadBufferConfig,
    ) -> (Reader<N>, FillLoop<'static, MemoryFile, 16, N>) {
        let control: &'static Control<MemoryFile> = Box::leak(Box::new(Control::new()));
        let pool: &'static SlotPool<16, N> = Box::leak(Box::new(SlotPool::new()));
        split(control, pool, config).unwrap()
    }

    /// Drive `body` with the fill loop polled alongside it on one executor.
    async fn run<const N: usize, Fut>(config: ReadBufferConfig, body: impl FnOnce(Reader<N>) -> Fut)
    where
        Fut: core::future::Future<Output = ()>,
    {
        let (reader, fill) = pipeline::<N>(config);
        if let Either::First(result) = select(fill.run(), body(reader)).await {
            panic!("fill loop exited early: {result:?}");
        }
    }

    fn expected(range: core::ops::Range<usize>) -> Vec<u8> {
        let file = MemoryFile::patterned(range.end);
        file.contents()[range].to_vec()
    }

    #[tokio::test]
    async fn open_seeds_one_chunk() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            assert_eq!(rb.left(), 16);
            assert_eq!(rb.tell(), 0);
            assert_eq!(rb.buf(), expected(0..16).as_slice());
            assert!(rb.is_connected());
            assert_ne!(rb.fill_state(), FillState::Idle);
        })
        .await;
    }

    #[tokio::test]
    async fn fill_compacts_unread_tail_to_base() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            rb.shift(10).await.unwrap();
            assert_eq!(rb.fill().await, Ok(16));
            assert_eq!(rb.left(), 22);
            assert_eq!(rb.tell(), 10);
            assert_eq!(rb.buf(), expected(10..32).as_slice());
        })
        .await;
    }

    #[tokio::test]
    async fn fill_without_room_is_rejected_unchanged() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            for _ in 0..3 {
                rb.fill().await.unwrap();
            }
            assert_eq!(rb.left(), 64);
            assert_eq!(rb.fill().await, Err(ReadBufferError::NoSpace));
            assert_eq!(rb.left(), 64);
            assert_eq!(rb.buf(), expected(0..64).as_slice());
        })
        .await;
    }

    #[tokio::test]
    async fn shift_past_window_is_out_of_range() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            let err = rb.shift(17).await.unwrap_err();
            assert_eq!(err, ReadBufferError::OutOfRange { requested: 17, left: 16 });
            assert_eq!(rb.left(), 16);
            assert_eq!(rb.tell(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn shift_below_threshold_refills() {
        run::<4, _>(ReadBufferConfig::with_fill_threshold(20), |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            rb.shift(4).await.unwrap();
            // 12 left < 20, one chunk appended.
            assert_eq!(rb.left(), 28);
            assert_eq!(rb.tell(), 4);
        })
        .await;
    }

    #[tokio::test]
    async fn drains_to_end_of_file() {
        run::<4, _>(ReadBufferConfig::with_fill_threshold(16), |mut rb| async move {
            rb.open(MemoryFile::patterned(50)).await.unwrap();
            let mut seen = Vec::new();
            while rb.left() > 0 {
                seen.extend_from_slice(rb.buf());
                rb.shift_all().await.unwrap();
            }
            assert_eq!(seen, expected(0..50));
            assert!(rb.is_eof());
            assert_eq!(rb.tell(), 50);
            assert_eq!(rb.fill().await, Err(ReadBufferError::EndOfFile));
        })
        .await;
    }

    #[tokio::test]
    async fn empty_file_opens_at_end_of_file() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::new(Vec::new())).await.unwrap();
            assert_eq!(rb.left(), 0);
            assert!(rb.is_eof());
            assert_eq!(rb.fill_state(), FillState::EndOfFile);
        })
        .await;
    }

    #[tokio::test]
    async fn seek_reloads_window_at_position() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            rb.seek(150).await.unwrap();
            assert_eq!(rb.tell(), 150);
            assert_eq!(rb.buf(), expected(150..166).as_slice());
            rb.seek(5).await.unwrap();
            assert_eq!(rb.tell(), 5);
            assert_eq!(rb.buf()[0], expected(5..6)[0]);
            assert!(!rb.control.is_rebinding());
        })
        .await;
    }

    #[tokio::test]
    async fn bind_while_connected_is_rejected() {
        run::<2, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(100)).await.unwrap();
            assert_eq!(rb.bind(MemoryFile::patterned(5)), Err(ReadBufferError::AlreadyConnected));
            rb.disconnect().await.unwrap();
            assert!(!rb.is_connected());
            // Bytes already in the window stay readable.
            assert_eq!(rb.left(), 16);
            rb.bind(MemoryFile::patterned(5)).unwrap();
            assert_eq!(rb.left(), 0);
        })
        .await;
    }

    #[tokio::test]
    async fn reconnect_after_disconnect_keeps_window_contiguous() {
        run::<4, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(200)).await.unwrap();
            rb.shift(10).await.unwrap();
            rb.disconnect().await.unwrap();
            // The handle went back ahead of the window by the discarded prefetch.
            rb.connect().await.unwrap();
            assert_eq!(rb.tell(), 10);
            assert_eq!(rb.left(), 22);
            assert_eq!(rb.buf(), expected(10..32).as_slice());
            rb.shift_all().await.unwrap();
            assert_eq!(rb.fill().await, Ok(16));
            assert_eq!(rb.buf(), expected(32..48).as_slice());
        })
        .await;
    }

    #[tokio::test]
    async fn connect_without_file_is_not_bound() {
        run::<2, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            assert_eq!(rb.connect().await, Err(ReadBufferError::NotBound));
            assert_eq!(rb.seek(0).await, Err(ReadBufferError::NotBound));
            assert_eq!(rb.disconnect().await, Ok(()));
        })
        .await;
    }

    #[tokio::test]
    async fn fill_before_connect_is_underrun() {
        run::<2, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.bind(MemoryFile::patterned(100)).unwrap();
            assert_eq!(rb.fill().await, Err(ReadBufferError::Underrun));
        })
        .await;
    }

    #[tokio::test]
    async fn close_returns_the_handle() {
        run::<2, _>(ReadBufferConfig::MANUAL, |mut rb| async move {
            rb.open(MemoryFile::patterned(100)).await.unwrap();
            let file = rb.close().await.unwrap().expect("handle comes back");
            assert_eq!(file.size(), 100);
            assert_eq!(rb.left(), 0);
            assert!(matches!(rb.close().await, Ok(None)));
        })
        .await;
    }

    #[tokio::test]
    async fn read_failure_surfaces_instead_of_hanging() {
        let (mut rb, fill) = pipeline::<2>(ReadBufferConfig::MANUAL);
        let body = async move {
            rb.open(MemoryFile::patterned(100).fail_reads_from(32)).await.unwrap();
            rb.shift_all().await.unwrap();
            assert_eq!(rb.fill().await, Ok(16));
            rb.shift_all().await.unwrap();
            assert_eq!(
                rb.fill().await,
                Err(ReadBufferError::FillLoopFailed(FillFailure::Read))
            );
            assert_eq!(rb.fill_state(), FillState::Failed(FillFailure::Read));
            assert_eq!(rb.seek(0).await, Err(ReadBufferError::FillLoopFailed(FillFailure::Read)));
        };
        let (result, ()) = embassy_futures::join::join(fill.run(), body).await;
        assert_eq!(result, Err(FillFailure::Read));
    }

    #[tokio::test]
    async fn shutdown_hands_back_the_file() {
        let (mut rb, fill) = pipeline::<2>(ReadBufferConfig::MANUAL);
        let body = async move {
            rb.open(MemoryFile::patterned(40)).await.unwrap();
            let file = rb.shutdown().await.unwrap();
            assert_eq!(file.map(|f| f.size()), Some(40));
        };
        let (result, ()) = embassy_futures::join::join(fill.run(), body).await;
        assert_eq!(result, Ok(()));
    }

    #[tokio::test]
    async fn requests_after_shutdown_fail_fast() {
        let (mut rb, fill) = pipeline::<2>(ReadBufferConfig::MANUAL);
        let body = async move {
            rb.open(MemoryFile::patterned(40)).await.unwrap();
            rb.shutdown().await.unwrap();
            assert_eq!(rb.fill_state(), FillState::Stopped);
            assert!(matches!(rb.shutdown().await, Err(ReadBufferError::ShutDown)));
            rb.bind(MemoryFile::patterned(8)).unwrap();
            assert_eq!(rb.fill().await, Err(ReadBufferError::ShutDown));
            assert_eq!(rb.connect().await, Err(ReadBufferError::ShutDown));
            assert_eq!(rb.seek(0).await, Err(ReadBufferError::ShutDown));
            assert_eq!(rb.disconnect().await, Err(ReadBufferError::ShutDown));
        };
        let (result, ()) = embassy_futures::join::join(fill.run(), body).await;
        assert_eq!(result, Ok(()));
    }
}
