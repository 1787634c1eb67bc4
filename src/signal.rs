/*
 * One-shot synchronization primitives shared between a dialog's worker and its
 * callers.
 *
 * `TerminalCause` is a single-assignment cell holding the reason a dialog ended.
 * `DoneSignal` is the completion broadcast: the worker holds the only sender of a
 * zero-capacity channel and drops it after latching the cause, so every receiver
 * observes disconnection exactly once and forever after. Because the latch
 * happens before the drop, a fired signal always implies a readable cause.
 */

use crate::error::{DialogError, Result};

use crossbeam_channel::{Receiver, RecvTimeoutError, Sender, TryRecvError, bounded};
use std::sync::OnceLock;
use std::time::Duration;

#[derive(Debug, Default)]
pub(crate) struct TerminalCause {
    cell: OnceLock<Result<()>>,
}

impl TerminalCause {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /*
     * Records `cause` unless another cause was recorded first. Returns whether
     * this call won. Later causes are discarded, never merged.
     */
    pub(crate) fn latch(&self, cause: Result<()>) -> bool {
        let won = self.cell.set(cause.clone()).is_ok();
        if won {
            log::debug!("TerminalCause: latched {cause:?}.");
        } else {
            log::debug!(
                "TerminalCause: discarded {cause:?}, already latched {:?}.",
                self.cell.get()
            );
        }
        won
    }

    pub(crate) fn get(&self) -> Option<&Result<()>> {
        self.cell.get()
    }

    pub(crate) fn is_latched(&self) -> bool {
        self.cell.get().is_some()
    }
}

/// Held by the worker; dropping it fires the paired `DoneSignal`.
#[derive(Debug)]
pub(crate) struct DoneTrigger {
    _sender: Sender<()>,
}

/// Fires exactly once, when the dialog has closed and its result is final.
#[derive(Debug, Clone)]
pub struct DoneSignal {
    receiver: Receiver<()>,
}

pub(crate) fn done_pair() -> (DoneTrigger, DoneSignal) {
    let (sender, receiver) = bounded::<()>(0);
    (DoneTrigger { _sender: sender }, DoneSignal { receiver })
}

impl DoneSignal {
    /// Non-blocking check.
    pub fn is_fired(&self) -> bool {
        matches!(self.receiver.try_recv(), Err(TryRecvError::Disconnected))
    }

    pub fn wait(&self) {
        // Nothing is ever sent; recv only returns once the trigger is dropped.
        let _ = self.receiver.recv();
    }

    /// Returns `true` if the signal fired within `timeout`.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        matches!(
            self.receiver.recv_timeout(timeout),
            Err(RecvTimeoutError::Disconnected)
        )
    }

    /// The underlying receiver, for use in `crossbeam_channel::select!`.
    /// It never yields a value; a `recv` arm completes with an error once fired.
    pub fn receiver(&self) -> &Receiver<()> {
        &self.receiver
    }
}

/// Maps a latched cause to what `close()` reports: cancellation requested by the
/// closer is not an error to that closer.
pub(crate) fn close_result(cause: Result<()>) -> Result<()> {
    match cause {
        Err(DialogError::Canceled) => Ok(()),
        other => other,
    }
}
