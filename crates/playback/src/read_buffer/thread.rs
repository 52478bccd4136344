//! Host-side pipeline: the fill loop on its own OS thread.
//!
//! Stands in for the second core when running under the emulator and in
//! tests. The fill loop thread drives a current-thread tokio runtime; the
//! consumer half stays with the caller and is reached through `Deref`.

use std::thread::JoinHandle;

use platform::storage::File;

use super::control::{BindRequest, Control};
use super::error::{ConfigError, FillFailure, FillState, ReadBufferError};
use super::primary::ReadBuffer;
use super::slot::SlotPool;
use super::{split, ReadBufferConfig};

/// Failure to bring up a [`ReadBufferThread`].
#[derive(Debug)]
pub enum SpawnError {
    /// Buffer geometry or threshold rejected.
    Config(ConfigError),
    /// The fill loop runtime could not be built.
    Runtime(std::io::Error),
    /// The OS refused to spawn the fill loop thread.
    Thread(std::io::Error),
}

impl core::fmt::Display for SpawnError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Config(e) => write!(f, "invalid read buffer config: {e}"),
            Self::Runtime(e) => write!(f, "failed to build fill loop runtime: {e}"),
            Self::Thread(e) => write!(f, "failed to spawn fill loop thread: {e}"),
        }
    }
}

impl std::error::Error for SpawnError {}

impl From<ConfigError> for SpawnError {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

/// A [`ReadBuffer`] whose fill loop runs on a dedicated thread.
///
/// The control block and slot pool are leaked so both threads can hold
/// `'static` references; each spawn costs one pipeline's worth of memory
/// for the rest of the process.
pub struct ReadBufferThread<F: File + Send + 'static, const SIZE: usize, const CHUNK: usize, const N: usize> {
    reader: ReadBuffer<'static, F, SIZE, CHUNK, N>,
    control: &'static Control<F>,
    handle: Option<JoinHandle<Result<(), FillFailure>>>,
}

impl<F: File + Send + 'static, const SIZE: usize, const CHUNK: usize, const N: usize>
    ReadBufferThread<F, SIZE, CHUNK, N>
{
    /// Build a pipeline with `N` secondary slots and start its fill loop.
    pub fn spawn(config: ReadBufferConfig) -> Result<Self, SpawnError> {
        config.validate(SIZE, CHUNK, N)?;
        let runtime = tokio::runtime::Builder::new_current_thread()
            .build()
            .map_err(SpawnError::Runtime)?;

        let control: &'static Control<F> = Box::leak(Box::new(Control::new()));
        let pool: &'static SlotPool<CHUNK, N> = Box::leak(Box::new(SlotPool::new()));
        let (reader, fill) = split::<F, SIZE, CHUNK, N>(control, pool, config)?;

        let handle = std::thread::Builder::new()
            .name("fill-loop".into())
            .spawn(move || runtime.block_on(fill.run()))
            .map_err(SpawnError::Thread)?;
        debug!("fill loop thread started with {} slots of {} bytes", N, CHUNK);

        Ok(Self { reader, control, handle: Some(handle) })
    }

    /// Shared control block, for observers such as
    /// [`Control::is_rebinding`].
    pub fn control(&self) -> &'static Control<F> {
        self.control
    }

    /// Stop the fill loop, join its thread and return the file handle.
    ///
    /// # Errors
    ///
    /// [`ReadBufferError::FillLoopFailed`] if the loop had already stopped
    /// on a read failure. The thread is joined either way.
    pub async fn shutdown(mut self) -> Result<Option<F>, ReadBufferError> {
        let released = self.reader.shutdown().await;
        let exit = self.join_thread();
        match (released, exit) {
            (Ok(file), _) => Ok(file),
            (Err(_), Some(Err(failure))) => Err(ReadBufferError::FillLoopFailed(failure)),
            (Err(e), _) => Err(e),
        }
    }

    /// Wait for the fill loop thread and return how the loop exited.
    ///
    /// Meant for a loop that has already stopped, typically on a read
    /// failure. A loop that is still serving requests is asked to shut down
    /// first; its file handle is dropped with it. If that request cannot be
    /// queued the thread is detached like on drop.
    ///
    /// # Errors
    ///
    /// The [`FillFailure`] the loop exited with.
    pub fn join(mut self) -> Result<(), FillFailure> {
        if !self.loop_exited() && self.control.requests.try_send(BindRequest::Shutdown).is_err() {
            warn!("fill loop busy on join, detaching thread");
            self.handle = None;
        }
        self.join_thread().unwrap_or(Ok(()))
    }

    fn loop_exited(&self) -> bool {
        matches!(self.control.fill_state(), FillState::Failed(_) | FillState::Stopped)
    }

    fn join_thread(&mut self) -> Option<Result<(), FillFailure>> {
        let handle = self.handle.take()?;
        match handle.join() {
            Ok(exit) => Some(exit),
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

impl<F: File + Send + 'static, const SIZE: usize, const CHUNK: usize, const N: usize> core::ops::Deref
    for ReadBufferThread<F, SIZE, CHUNK, N>
{
    type Target = ReadBuffer<'static, F, SIZE, CHUNK, N>;

    fn deref(&self) -> &Self::Target {
        &self.reader
    }
}

impl<F: File + Send + 'static, const SIZE: usize, const CHUNK: usize, const N: usize> core::ops::DerefMut
    for ReadBufferThread<F, SIZE, CHUNK, N>
{
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.reader
    }
}

impl<F: File + Send + 'static, const SIZE: usize, const CHUNK: usize, const N: usize> Drop
    for ReadBufferThread<F, SIZE, CHUNK, N>
{
    fn drop(&mut self) {
        let exited = self.loop_exited();
        let Some(handle) = self.handle.take() else {
            return;
        };
        if exited
            || handle.is_finished()
            || self.control.requests.try_send(BindRequest::Shutdown).is_ok()
        {
            let _ = handle.join();
        } else {
            warn!("fill loop busy on drop, detaching thread");
        }
    }
}
