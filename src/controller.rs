/*
 * The progress dialog controller. A `ProgressDialog` is the caller's handle to a
 * live dialog whose native window is owned by a dedicated worker thread. The
 * caller never touches native handles: mutations travel through a `Mailbox` and
 * are applied by the worker, and the dialog's end is observed through a one-shot
 * `DoneSignal` paired with a write-once `TerminalCause`.
 *
 * Lifecycle: `spawn` validates the configuration, starts the worker, and blocks
 * only until the toolkit reports the window is created and shown. The worker then
 * starts the cancellation bridge (if a token was given), pumps messages until the
 * window is destroyed, latches the outcome, and fires the done signal.
 *
 * Toolkit-specific code lives behind `Toolkit` (window creation and the message
 * loop) and `ProgressControls` (widget mutation); request handling and the
 * lifecycle above are shared.
 */

use crate::bridge;
use crate::cancel::CancelToken;
use crate::error::{DialogError, Result};
use crate::signal::{self, DoneSignal, TerminalCause};
use crate::types::{Button, ProgressConfig, Request, Settings};

use crossbeam_channel::{Receiver, Sender, bounded};
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread;

/// State shared between the worker, the bridge, and the caller.
#[derive(Debug)]
pub(crate) struct DialogState {
    pub(crate) cause: TerminalCause,
    max_value: i32,
}

impl DialogState {
    pub(crate) fn new(max_value: i32) -> Self {
        Self {
            cause: TerminalCause::new(),
            max_value,
        }
    }

    pub(crate) fn max_value(&self) -> i32 {
        self.max_value
    }

    /// The latched outcome. Only meaningful once the done signal has fired.
    pub(crate) fn outcome(&self) -> Result<()> {
        self.cause.get().cloned().unwrap_or_else(|| {
            Err(DialogError::OperationFailed(
                "dialog ended without a terminal cause".to_string(),
            ))
        })
    }
}

/// Cross-thread entry point into a live dialog's message queue.
pub(crate) trait Mailbox: Send + Sync {
    /// Queues a mutation for the worker. Requests to a destroyed window are dropped.
    fn post(&self, request: Request);
    /// Queues the same close request the window's close box produces.
    fn request_close(&self);
}

/// Widget mutations a toolkit performs on the worker thread.
pub(crate) trait ProgressControls {
    fn set_label(&mut self, text: &str) -> Result<()>;
    fn set_position(&mut self, value: i32) -> Result<()>;
    /// Absent buttons are ignored.
    fn enable_button(&mut self, button: Button, enabled: bool) -> Result<()>;
    /// Switches to a determinate bar showing 100%.
    fn show_full(&mut self) -> Result<()>;
}

/*
 * The toolkit half of a dialog. `open` runs on the worker: it must create the
 * window and all controls, apply the initial layout, and show the window before
 * returning. `run` pumps messages until the window is destroyed.
 */
pub(crate) trait Toolkit: Send + 'static {
    type Window;

    fn open(
        self,
        settings: &Settings,
        state: &Arc<DialogState>,
    ) -> Result<(Self::Window, Arc<dyn Mailbox>)>;

    fn run(window: Self::Window) -> Result<()>;
}

/// A determinate bar reaching its maximum lets the user dismiss with OK.
pub(crate) fn reaches_max(value: i32, max_value: i32) -> bool {
    max_value >= 0 && value >= max_value
}

pub(crate) fn apply_request(
    controls: &mut impl ProgressControls,
    request: Request,
    max_value: i32,
) -> Result<()> {
    match request {
        Request::Text(text) => controls.set_label(&text),
        Request::Value(value) => {
            controls.set_position(value)?;
            if reaches_max(value, max_value) {
                controls.enable_button(Button::Ok, true)?;
            }
            Ok(())
        }
        Request::Complete => {
            controls.show_full()?;
            controls.enable_button(Button::Ok, true)?;
            controls.enable_button(Button::Cancel, false)
        }
    }
}

/// Applies every queued request, in order. Failures are logged; the caller was
/// already told the request was accepted.
pub(crate) fn drain_requests(
    requests: &Receiver<Request>,
    controls: &mut impl ProgressControls,
    max_value: i32,
) {
    for request in requests.try_iter() {
        if let Err(e) = apply_request(controls, request, max_value) {
            log::warn!("ProgressDialog: failed to apply request: {e}");
        }
    }
}

/// Handle to a live (or finished) progress dialog. All methods are thread-safe.
pub struct ProgressDialog {
    state: Arc<DialogState>,
    done: DoneSignal,
    mailbox: Arc<dyn Mailbox>,
}

impl std::fmt::Debug for ProgressDialog {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ProgressDialog")
            .field("max_value", &self.state.max_value())
            .field("closed", &self.done.is_fired())
            .field("cause_latched", &self.state.cause.is_latched())
            .finish()
    }
}

impl ProgressDialog {
    /// `Some(outcome)` once the dialog has closed. Never blocks.
    pub fn result(&self) -> Option<Result<()>> {
        if self.done.is_fired() {
            Some(self.state.outcome())
        } else {
            None
        }
    }

    pub fn is_closed(&self) -> bool {
        self.done.is_fired()
    }

    fn submit(&self, request: Request) -> Result<()> {
        if let Some(outcome) = self.result() {
            log::debug!("ProgressDialog: {request:?} after close, returning {outcome:?}.");
            return outcome;
        }
        self.mailbox.post(request);
        Ok(())
    }

    /// Updates the label text.
    pub fn text(&self, text: &str) -> Result<()> {
        self.submit(Request::Text(text.to_string()))
    }

    /// Updates the bar position. Reaching the maximum of a determinate bar enables OK.
    pub fn value(&self, value: i32) -> Result<()> {
        self.submit(Request::Value(value))
    }

    pub fn max_value(&self) -> i32 {
        self.state.max_value()
    }

    /// Marks the work finished: full determinate bar, OK enabled, Cancel disabled.
    pub fn complete(&self) -> Result<()> {
        self.submit(Request::Complete)
    }

    /// The completion signal. Once it has fired, `result()` is final.
    pub fn done(&self) -> DoneSignal {
        self.done.clone()
    }

    /// Blocks until the dialog closes by any means and returns its outcome.
    pub fn wait(&self) -> Result<()> {
        self.done.wait();
        self.state.outcome()
    }

    /*
     * Requests the dialog to close and blocks until the worker confirms. A
     * cancellation (including the one this call causes) is reported as success;
     * any other latched cause is returned.
     */
    pub fn close(&self) -> Result<()> {
        if !self.done.is_fired() {
            log::debug!("ProgressDialog: close requested by caller.");
            self.mailbox.request_close();
        }
        self.done.wait();
        signal::close_result(self.state.outcome())
    }
}

type ReadySender = Sender<Result<Arc<dyn Mailbox>>>;

/*
 * Starts a dialog on a new worker thread and waits for the window to be ready.
 * Setup failures abort the handshake and are returned here.
 */
pub(crate) fn spawn<T: Toolkit>(config: ProgressConfig, toolkit: T) -> Result<ProgressDialog> {
    let (settings, token) = config.validate()?;
    let state = Arc::new(DialogState::new(settings.max_value));
    let (trigger, done) = signal::done_pair();
    let (ready_tx, ready_rx) = bounded::<Result<Arc<dyn Mailbox>>>(1);

    let worker_state = Arc::clone(&state);
    thread::Builder::new()
        .name("progress-dialog".to_string())
        .spawn(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
                run_worker(toolkit, &settings, token, &worker_state, ready_tx)
            }))
            .unwrap_or_else(|_| {
                log::error!("ProgressDialog: worker panicked.");
                Err(DialogError::OperationFailed(
                    "progress dialog worker panicked".to_string(),
                ))
            });
            // No-op when a button, close request, or the bridge got there first.
            worker_state.cause.latch(outcome);
            drop(trigger);
            log::debug!("ProgressDialog: worker finished.");
        })
        .map_err(|e| {
            DialogError::InitializationFailed(format!("failed to spawn dialog worker: {e}"))
        })?;

    match ready_rx.recv() {
        Ok(Ok(mailbox)) => {
            log::debug!("ProgressDialog: ready.");
            Ok(ProgressDialog {
                state,
                done,
                mailbox,
            })
        }
        Ok(Err(err)) => Err(err),
        Err(_) => Err(DialogError::InitializationFailed(
            "progress dialog worker exited before the window was ready".to_string(),
        )),
    }
}

fn run_worker<T: Toolkit>(
    toolkit: T,
    settings: &Settings,
    token: Option<CancelToken>,
    state: &Arc<DialogState>,
    ready: ReadySender,
) -> Result<()> {
    let abort = |err: DialogError| {
        log::error!("ProgressDialog: setup failed: {err}");
        let _ = ready.send(Err(err.clone()));
        Err(err)
    };

    // The token may have fired while the worker was starting.
    if let Some(err) = token.as_ref().and_then(CancelToken::error) {
        return abort(err);
    }

    let (window, mailbox) = match toolkit.open(settings, state) {
        Ok(opened) => opened,
        Err(err) => return abort(err),
    };

    let (finished_tx, finished_rx) = bounded::<()>(0);
    let watcher = match token
        .map(|token| bridge::spawn(token, finished_rx, Arc::clone(state), Arc::clone(&mailbox)))
        .transpose()
    {
        Ok(watcher) => watcher,
        Err(err) => return abort(err),
    };

    let _ = ready.send(Ok(mailbox));
    let result = T::run(window);

    drop(finished_tx);
    if let Some(watcher) = watcher
        && watcher.join().is_err()
    {
        log::error!("ProgressDialog: cancellation bridge panicked.");
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancelToken;
    use crate::headless::{self, HeadlessHandle};
    use std::time::Duration;

    const TIMEOUT: Duration = Duration::from_secs(5);

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    fn open(config: ProgressConfig) -> (ProgressDialog, HeadlessHandle) {
        init_logging();
        headless::spawn(config).expect("headless dialog should open")
    }

    #[derive(Default)]
    struct Recorder {
        label: String,
        position: i32,
        ok: bool,
        cancel: bool,
        full: bool,
    }

    impl ProgressControls for Recorder {
        fn set_label(&mut self, text: &str) -> Result<()> {
            self.label = text.to_string();
            Ok(())
        }
        fn set_position(&mut self, value: i32) -> Result<()> {
            self.position = value;
            Ok(())
        }
        fn enable_button(&mut self, button: Button, enabled: bool) -> Result<()> {
            match button {
                Button::Ok => self.ok = enabled,
                Button::Cancel => self.cancel = enabled,
                Button::Extra => {}
            }
            Ok(())
        }
        fn show_full(&mut self) -> Result<()> {
            self.full = true;
            Ok(())
        }
    }

    struct SilentMailbox;

    impl Mailbox for SilentMailbox {
        fn post(&self, _request: Request) {}
        fn request_close(&self) {}
    }

    struct FailingOpen(DialogError);

    impl Toolkit for FailingOpen {
        type Window = ();

        fn open(self, _: &Settings, _: &Arc<DialogState>) -> Result<((), Arc<dyn Mailbox>)> {
            Err(self.0)
        }

        fn run(_: ()) -> Result<()> {
            Ok(())
        }
    }

    struct PanickingOpen;

    impl Toolkit for PanickingOpen {
        type Window = ();

        fn open(self, _: &Settings, _: &Arc<DialogState>) -> Result<((), Arc<dyn Mailbox>)> {
            panic!("control creation exploded");
        }

        fn run(_: ()) -> Result<()> {
            Ok(())
        }
    }

    struct PanickingRun;

    impl Toolkit for PanickingRun {
        type Window = ();

        fn open(self, _: &Settings, _: &Arc<DialogState>) -> Result<((), Arc<dyn Mailbox>)> {
            let mailbox: Arc<dyn Mailbox> = Arc::new(SilentMailbox);
            Ok(((), mailbox))
        }

        fn run(_: ()) -> Result<()> {
            panic!("message loop exploded");
        }
    }

    #[test]
    fn setup_failure_is_returned_from_create() {
        init_logging();
        let err = DialogError::InitializationFailed("RegisterClassExW failed".into());
        let result = spawn(ProgressConfig::new(), FailingOpen(err.clone()));
        assert_eq!(result.err(), Some(err));
    }

    #[test]
    fn panic_during_setup_is_reported_as_initialization_failure() {
        init_logging();
        let result = spawn(ProgressConfig::new(), PanickingOpen);
        assert!(matches!(
            result.err(),
            Some(DialogError::InitializationFailed(_))
        ));
    }

    #[test]
    fn panic_in_message_loop_is_latched_as_operation_failure() {
        init_logging();
        let dialog = spawn(ProgressConfig::new(), PanickingRun).unwrap();
        assert!(dialog.done().wait_timeout(TIMEOUT));

        let expected = Err(DialogError::OperationFailed(
            "progress dialog worker panicked".to_string(),
        ));
        assert_eq!(dialog.result(), Some(expected.clone()));
        assert_eq!(dialog.text("late"), expected);
        assert_eq!(dialog.close(), expected);
    }

    #[test]
    fn reaching_max_enables_ok_only_for_determinate_bars() {
        assert!(reaches_max(100, 100));
        assert!(reaches_max(150, 100));
        assert!(!reaches_max(99, 100));
        assert!(!reaches_max(5, -1));
    }

    #[test]
    fn apply_request_complete_swaps_button_states() {
        let mut controls = Recorder {
            cancel: true,
            ..Recorder::default()
        };
        apply_request(&mut controls, Request::Complete, -1).unwrap();
        assert!(controls.full);
        assert!(controls.ok);
        assert!(!controls.cancel);
    }

    #[test]
    fn drain_applies_requests_in_order() {
        let (tx, rx) = bounded(8);
        tx.send(Request::Text("first".into())).unwrap();
        tx.send(Request::Value(3)).unwrap();
        tx.send(Request::Text("second".into())).unwrap();
        tx.send(Request::Value(10)).unwrap();
        let mut controls = Recorder::default();
        drain_requests(&rx, &mut controls, 10);
        assert_eq!(controls.label, "second");
        assert_eq!(controls.position, 10);
        assert!(controls.ok);
    }

    #[test]
    fn create_returns_once_window_is_visible() {
        let (dialog, handle) = open(ProgressConfig::new().title("Copying"));
        let snapshot = handle.snapshot();
        assert!(snapshot.visible);
        assert_eq!(snapshot.title, "Copying");
        assert!(!dialog.is_closed());
        assert_eq!(dialog.max_value(), 100);
        assert_eq!(dialog.close(), Ok(()));
    }

    #[test]
    fn create_rejects_already_canceled_token() {
        let token = CancelToken::new();
        token.cancel();
        let result = headless::spawn(ProgressConfig::new().cancel_token(token));
        assert_eq!(result.err(), Some(DialogError::Canceled));
    }

    #[test]
    fn updates_before_close_succeed_and_last_value_wins() {
        let (dialog, handle) = open(ProgressConfig::new().max_value(50));
        for i in 0..20 {
            assert_eq!(dialog.text(&format!("step {i}")), Ok(()));
            assert_eq!(dialog.value(i), Ok(()));
        }
        handle.sync();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.label, "step 19");
        assert_eq!(snapshot.position, 19);
        assert!(!snapshot.ok_enabled);
        dialog.close().unwrap();
    }

    #[test]
    fn concurrent_updates_never_fail() {
        let (dialog, handle) = open(ProgressConfig::new());
        let dialog = Arc::new(dialog);
        let workers: Vec<_> = (0..4)
            .map(|n| {
                let dialog = Arc::clone(&dialog);
                thread::spawn(move || {
                    for i in 0..25 {
                        assert_eq!(dialog.text(&format!("worker {n} step {i}")), Ok(()));
                        assert_eq!(dialog.value(i), Ok(()));
                    }
                })
            })
            .collect();
        for worker in workers {
            worker.join().unwrap();
        }
        dialog.text("final").unwrap();
        dialog.value(42).unwrap();
        handle.sync();
        let snapshot = handle.snapshot();
        assert_eq!(snapshot.label, "final");
        assert_eq!(snapshot.position, 42);
        dialog.close().unwrap();
    }

    #[test]
    fn value_at_max_enables_ok_and_ok_click_succeeds() {
        let (dialog, handle) = open(ProgressConfig::new().max_value(10));
        assert_eq!(dialog.value(10), Ok(()));
        handle.sync();
        assert!(handle.snapshot().ok_enabled);

        handle.click(Button::Ok);
        assert!(dialog.done().wait_timeout(TIMEOUT));
        assert_eq!(dialog.result(), Some(Ok(())));
        assert_eq!(dialog.close(), Ok(()));
    }

    #[test]
    fn ok_click_is_ignored_while_disabled() {
        let (dialog, handle) = open(ProgressConfig::new().max_value(10));
        dialog.value(3).unwrap();
        handle.click(Button::Ok);
        handle.sync();
        assert!(!dialog.is_closed());
        dialog.close().unwrap();
    }

    #[test]
    fn indeterminate_dialog_closed_by_external_cancellation() {
        let token = CancelToken::new();
        let (dialog, handle) = open(ProgressConfig::new().pulsate().cancel_token(token.clone()));
        assert_eq!(dialog.max_value(), -1);
        assert_eq!(dialog.value(5), Ok(()));
        handle.sync();
        let snapshot = handle.snapshot();
        assert!(snapshot.marquee);
        assert!(!snapshot.ok_enabled);

        token.cancel();
        assert!(dialog.done().wait_timeout(TIMEOUT));
        assert_eq!(dialog.result(), Some(Err(DialogError::Canceled)));
        assert_eq!(dialog.close(), Ok(()));
    }

    #[test]
    fn deadline_is_reported_by_close() {
        init_logging();
        let token = CancelToken::with_timeout(Duration::from_millis(50));
        // The deadline may already have passed by the time the worker checks the token.
        match headless::spawn(ProgressConfig::new().cancel_token(token)) {
            Ok((dialog, _handle)) => {
                assert!(dialog.done().wait_timeout(TIMEOUT));
                assert_eq!(dialog.close(), Err(DialogError::DeadlineExceeded));
            }
            Err(err) => assert_eq!(err, DialogError::DeadlineExceeded),
        }
    }

    #[test]
    fn post_close_calls_return_the_terminal_error() {
        let (dialog, handle) = open(ProgressConfig::new().extra_button("Details"));
        handle.click(Button::Extra);
        assert!(dialog.done().wait_timeout(TIMEOUT));

        let expected = Err(DialogError::ExtraButton);
        assert_eq!(dialog.text("late"), expected);
        assert_eq!(dialog.value(1), expected);
        assert_eq!(dialog.complete(), expected);
        assert_eq!(dialog.close(), expected);
        assert_eq!(dialog.wait(), expected);
    }

    #[test]
    fn close_after_user_cancel_is_success() {
        let (dialog, handle) = open(ProgressConfig::new());
        handle.click(Button::Cancel);
        assert!(dialog.done().wait_timeout(TIMEOUT));
        assert_eq!(dialog.result(), Some(Err(DialogError::Canceled)));
        assert_eq!(dialog.text("late"), Err(DialogError::Canceled));
        assert_eq!(dialog.close(), Ok(()));
    }

    #[test]
    fn complete_disables_cancel_and_later_cancellation_cannot_override() {
        let token = CancelToken::new();
        let (dialog, handle) = open(ProgressConfig::new().pulsate().cancel_token(token.clone()));
        dialog.complete().unwrap();
        handle.sync();
        let snapshot = handle.snapshot();
        assert!(!snapshot.marquee);
        assert!(snapshot.ok_enabled);
        assert_eq!(snapshot.cancel_enabled, Some(false));

        handle.click(Button::Cancel);
        handle.sync();
        assert!(!dialog.is_closed());

        handle.click(Button::Ok);
        assert!(dialog.done().wait_timeout(TIMEOUT));
        token.cancel();
        assert_eq!(dialog.result(), Some(Ok(())));
        assert_eq!(dialog.close(), Ok(()));
    }

    #[test]
    fn close_box_cancels() {
        let (dialog, handle) = open(ProgressConfig::new().no_cancel());
        assert_eq!(handle.snapshot().cancel_enabled, None);
        handle.close_box();
        assert_eq!(dialog.wait(), Err(DialogError::Canceled));
    }

    #[test]
    fn done_signal_is_shared_and_stays_fired() {
        let (dialog, _handle) = open(ProgressConfig::new());
        let done = dialog.done();
        assert!(!done.is_fired());
        dialog.close().unwrap();
        assert!(done.is_fired());
        assert!(dialog.done().is_fired());
        assert_eq!(dialog.close(), Ok(()));
    }
}
