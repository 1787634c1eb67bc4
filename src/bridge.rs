/*
 * The cancellation bridge: a watcher thread that turns an external
 * `CancelToken` into the same close request the window's close box produces.
 * It races the token against a private "finished" channel the worker disconnects
 * when its message loop exits, so the watcher never outlives the dialog.
 */

use crate::cancel::CancelToken;
use crate::controller::{DialogState, Mailbox};
use crate::error::{DialogError, Result};

use crossbeam_channel::{Receiver, select};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

pub(crate) fn spawn(
    token: CancelToken,
    finished: Receiver<()>,
    state: Arc<DialogState>,
    mailbox: Arc<dyn Mailbox>,
) -> Result<JoinHandle<()>> {
    thread::Builder::new()
        .name("progress-dialog-cancel".to_string())
        .spawn(move || watch(&token, &finished, &state, mailbox.as_ref()))
        .map_err(|e| {
            DialogError::InitializationFailed(format!("failed to spawn cancellation bridge: {e}"))
        })
}

fn watch(token: &CancelToken, finished: &Receiver<()>, state: &DialogState, mailbox: &dyn Mailbox) {
    let deadline = token.deadline_channel();
    let fired = select! {
        recv(token.fired()) -> _ => Some(DialogError::Canceled),
        recv(deadline) -> _ => Some(DialogError::DeadlineExceeded),
        recv(finished) -> _ => None,
    };

    match fired {
        Some(err) => {
            log::debug!("CancellationBridge: token fired ({err}), requesting close.");
            // Latch before closing so the external cause wins over the Canceled
            // the close request itself would record.
            state.cause.latch(Err(err));
            mailbox.request_close();
        }
        None => log::debug!("CancellationBridge: dialog finished, watcher exiting."),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::Request;
    use crossbeam_channel::bounded;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    #[derive(Default)]
    struct CountingMailbox {
        closes: AtomicUsize,
    }

    impl Mailbox for CountingMailbox {
        fn post(&self, _request: Request) {}
        fn request_close(&self) {
            self.closes.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[test]
    fn token_latches_cause_then_requests_close() {
        let token = CancelToken::new();
        let (_finished_tx, finished_rx) = bounded::<()>(0);
        let state = Arc::new(DialogState::new(100));
        let mailbox = Arc::new(CountingMailbox::default());

        let watcher = spawn(
            token.clone(),
            finished_rx,
            Arc::clone(&state),
            Arc::clone(&mailbox) as Arc<dyn Mailbox>,
        )
        .unwrap();
        token.cancel();
        watcher.join().unwrap();

        assert_eq!(state.cause.get(), Some(&Err(DialogError::Canceled)));
        assert_eq!(mailbox.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn deadline_latches_deadline_exceeded() {
        let token = CancelToken::with_timeout(Duration::from_millis(10));
        let (_finished_tx, finished_rx) = bounded::<()>(0);
        let state = Arc::new(DialogState::new(100));
        let mailbox = Arc::new(CountingMailbox::default());

        spawn(token, finished_rx, Arc::clone(&state), mailbox.clone())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(state.cause.get(), Some(&Err(DialogError::DeadlineExceeded)));
        assert_eq!(mailbox.closes.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn finished_dialog_stops_watcher_without_closing() {
        let token = CancelToken::new();
        let (finished_tx, finished_rx) = bounded::<()>(0);
        let state = Arc::new(DialogState::new(100));
        let mailbox = Arc::new(CountingMailbox::default());

        let watcher = spawn(token.clone(), finished_rx, Arc::clone(&state), mailbox.clone()).unwrap();
        drop(finished_tx);
        watcher.join().unwrap();
        token.cancel();

        assert!(!state.cause.is_latched());
        assert_eq!(mailbox.closes.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn earlier_cause_is_not_overridden() {
        let token = CancelToken::new();
        token.cancel();
        let (_finished_tx, finished_rx) = bounded::<()>(0);
        let state = Arc::new(DialogState::new(100));
        state.cause.latch(Ok(()));
        let mailbox = Arc::new(CountingMailbox::default());

        spawn(token, finished_rx, Arc::clone(&state), mailbox.clone())
            .unwrap()
            .join()
            .unwrap();

        assert_eq!(state.cause.get(), Some(&Ok(())));
    }
}
