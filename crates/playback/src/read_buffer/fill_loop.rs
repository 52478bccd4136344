//! Producer side of the read pipeline.
//!
//! [`FillLoop::run`] is meant to own a whole execution context: the second
//! core's executor on hardware, a dedicated thread on the host. It owns the
//! bound file handle and the free end of the slot pool.
//!
//! ```text
//!            Connect                    pool full / EOF
//!   Idle ────────────▶ Streaming ─────────────────────▶ (primed)
//!    ▲                   │    │ read hits EOF
//!    │ Disconnect        │    ▼
//!    └───────────────────┴─ EndOfFile      read error ──▶ Failed (exit)
//!
//!   any state ── Shutdown ──▶ Stopped (exit)
//! ```

use embassy_futures::select::{select, Either};
use platform::storage::File;

use super::control::{BindRequest, BindResponse, Control};
use super::error::{FillFailure, FillState};
use super::slot::{Chunk, SlotPool};

/// A file handle while it is lent to the fill loop.
struct Bound<F> {
    file: F,
    /// Absolute position after the last byte read.
    pos: u64,
    eof: bool,
    /// The consumer has been told the pool is primed for this binding.
    primed: bool,
}

/// The prefetching state machine. Build with [`split`](super::split).
///
/// `Send` whenever `F` is, so it can be moved to the core or thread that
/// runs it.
pub struct FillLoop<'a, F, const CHUNK: usize, const N: usize> {
    control: &'a Control<F>,
    pool: &'a SlotPool<CHUNK, N>,
}

impl<'a, F: File, const CHUNK: usize, const N: usize> FillLoop<'a, F, CHUNK, N> {
    pub(crate) fn new(control: &'a Control<F>, pool: &'a SlotPool<CHUNK, N>) -> Self {
        Self { control, pool }
    }

    /// Serve bind requests and prefetch until shut down or a read fails.
    ///
    /// # Errors
    ///
    /// Returns the [`FillFailure`] that stopped the loop. The same value is
    /// published through [`Control::fill_state`] and wakes any consumer that
    /// is waiting on this loop.
    pub async fn run(self) -> Result<(), FillFailure> {
        let mut bound: Option<Bound<F>> = None;
        loop {
            let request = match bound.as_mut() {
                None => self.control.requests.receive().await,
                Some(binding) => match self.stream(binding).await {
                    Ok(request) => request,
                    Err(failure) => {
                        // Chunks already published stay queued for the consumer.
                        error!("fill loop stopped: {}", failure);
                        self.control.set_state(FillState::Failed(failure));
                        self.control.failed.signal(failure);
                        return Err(failure);
                    }
                },
            };

            match request {
                BindRequest::Connect(file) => {
                    if bound.is_some() {
                        // Reconnect without a disconnect is not a transition.
                        warn!("connect while streaming ignored");
                        self.control.respond(BindResponse::AlreadyStreaming(file));
                    } else {
                        bound = Some(self.attach(file));
                        self.control.respond(BindResponse::Connected);
                    }
                }
                BindRequest::Disconnect => {
                    let file = self.release(bound.take());
                    self.control.respond(BindResponse::Released(file));
                }
                BindRequest::Shutdown => {
                    let file = self.release(bound.take());
                    debug!("fill loop shutting down");
                    self.control.set_state(FillState::Stopped);
                    self.control.respond(BindResponse::Released(file));
                    return Ok(());
                }
            }
        }
    }

    fn attach(&self, file: F) -> Bound<F> {
        let pos = file.position();
        let eof = file.is_eof();
        debug!("fill loop bound at {}, eof={}", pos, eof);
        self.control.set_state(if eof { FillState::EndOfFile } else { FillState::Streaming });
        Bound { file, pos, eof, primed: false }
    }

    /// Drop chunks of the old binding and go idle.
    fn release(&self, bound: Option<Bound<F>>) -> Option<F> {
        let discarded = self.pool.discard();
        self.control.set_state(FillState::Idle);
        if discarded > 0 {
            trace!("discarded {} queued chunks", discarded);
        }
        bound.map(|b| b.file)
    }

    /// Prefetch for `bound` until a control request arrives.
    ///
    /// Requests win over free slots, so a disconnect is served as soon as the
    /// current read completes even if the consumer keeps draining.
    async fn stream(&self, bound: &mut Bound<F>) -> Result<BindRequest<F>, FillFailure> {
        loop {
            if !bound.primed && (bound.eof || self.pool.is_full()) {
                bound.primed = true;
                self.control.primed.signal(());
            }
            if bound.eof {
                return Ok(self.control.requests.receive().await);
            }

            let index = match select(self.control.requests.receive(), self.pool.acquire()).await {
                Either::First(request) => return Ok(request),
                Either::Second(index) => index,
            };
            let read = {
                let mut slot = self.pool.slot(index).await;
                match bound.file.read(slot.as_mut_slice()).await {
                    Ok(0) => return Err(FillFailure::ZeroLengthRead),
                    Ok(n) => n.min(CHUNK),
                    Err(_) => return Err(FillFailure::Read),
                }
            };
            bound.pos = bound.pos.saturating_add(read as u64);
            bound.eof = bound.file.is_eof();
            self.pool.publish(Chunk::new(index, read, bound.pos, bound.eof));

            if bound.eof {
                debug!("fill loop reached end of file at {}", bound.pos);
                self.control.set_state(FillState::EndOfFile);
            }
        }
    }
}
