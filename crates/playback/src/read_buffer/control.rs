//! Bind / rebind handshake between the consumer and the fill loop.
//!
//! The file handle itself travels through these channels: a connect request
//! moves it to the fill loop, the disconnect acknowledgment moves it back.
//! Whichever side holds the handle is the only side that touches it.
//!
//! ```text
//! consumer                         fill loop
//!    │ ── Connect(file) ───────────▶ │  take handle, reset pos/eof
//!    │ ◀──────────────── Connected ─ │
//!    │        (waits for primed)     │  read until pool full or EOF
//!    │ ◀───────────────── primed ─── │
//!    │ ── Disconnect ──────────────▶ │  drop queued slots
//!    │ ◀─────── Released(Some(file)) │
//! ```

use core::cell::Cell;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;

use super::error::{FillFailure, FillState};

/// Request sent from the consumer to the fill loop.
pub enum BindRequest<F> {
    /// Take ownership of `F` and start prefetching from its current position.
    Connect(F),
    /// Stop prefetching, discard queued chunks and hand the file back.
    Disconnect,
    /// Like `Disconnect`, then leave the service loop.
    Shutdown,
}

/// Acknowledgment sent from the fill loop to the consumer.
pub enum BindResponse<F> {
    /// The handle was accepted and prefetching has started.
    Connected,
    /// Prefetching stopped; carries the handle if one was bound.
    Released(Option<F>),
    /// A connect arrived while already streaming. The running stream is left
    /// untouched and the offered handle is returned unused.
    AlreadyStreaming(F),
}

/// State shared by both execution contexts.
///
/// Everything in here is guarded by [`CriticalSectionRawMutex`], which is
/// sound across cores and across host threads. Build one with
/// [`Control::new`], keep it in a `static` (firmware) or leak it (host), and
/// hand a shared reference to [`split`](super::split).
pub struct Control<F> {
    pub(crate) requests: Channel<CriticalSectionRawMutex, BindRequest<F>, 1>,
    pub(crate) responses: Channel<CriticalSectionRawMutex, BindResponse<F>, 1>,
    /// Raised once per connect when the pool is full, or earlier at EOF.
    pub(crate) primed: Signal<CriticalSectionRawMutex, ()>,
    /// Raised once when the fill loop enters its terminal state.
    pub(crate) failed: Signal<CriticalSectionRawMutex, FillFailure>,
    state: Mutex<CriticalSectionRawMutex, Cell<FillState>>,
    rebinding: Mutex<CriticalSectionRawMutex, Cell<bool>>,
}

impl<F> Control<F> {
    /// Create the shared control block. `const` so it can live in a `static`.
    pub const fn new() -> Self {
        Self {
            requests: Channel::new(),
            responses: Channel::new(),
            primed: Signal::new(),
            failed: Signal::new(),
            state: Mutex::new(Cell::new(FillState::Idle)),
            rebinding: Mutex::new(Cell::new(false)),
        }
    }

    /// Current fill loop state.
    pub fn fill_state(&self) -> FillState {
        self.state.lock(Cell::get)
    }

    /// `true` while a bind, seek or disconnect handshake is in progress.
    ///
    /// Collaborators that must not run concurrently with a rebind (power
    /// management reclocking, for one) poll this.
    pub fn is_rebinding(&self) -> bool {
        self.rebinding.lock(Cell::get)
    }

    pub(crate) fn set_state(&self, state: FillState) {
        self.state.lock(|s| s.set(state));
    }

    pub(crate) fn set_rebinding(&self, active: bool) {
        self.rebinding.lock(|r| r.set(active));
    }

    /// Resolves once the fill loop has failed. The failure stays raised for
    /// every later waiter.
    pub(crate) async fn stopped(&self) -> FillFailure {
        let failure = self.failed.wait().await;
        self.failed.signal(failure);
        failure
    }

    /// Non-blocking acknowledgment; the consumer always waits for it, so the
    /// capacity-1 channel is empty unless the protocol is broken.
    pub(crate) fn respond(&self, response: BindResponse<F>) {
        if self.responses.try_send(response).is_err() {
            error!("bind response dropped: response queue full");
        }
    }
}

impl<F> Default for Control<F> {
    fn default() -> Self {
        Self::new()
    }
}
