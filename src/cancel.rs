/*
 * External cancellation for progress dialogs. A `CancelToken` is a cloneable,
 * thread-safe signal that fires once, either because some holder called
 * `cancel()` or because its deadline passed. Once fired it stays fired.
 *
 * Firing is modeled as disconnection of a zero-capacity crossbeam channel: the
 * only sender lives behind a mutex and is dropped by `cancel()`, after which
 * every receiver observes `Disconnected` forever. This makes the token usable
 * directly inside `crossbeam_channel::select!`.
 */

use crate::error::DialogError;

use crossbeam_channel::{Receiver, Sender, TryRecvError, at, bounded, never, select};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

#[derive(Debug)]
struct TokenInner {
    trigger: Mutex<Option<Sender<()>>>,
    fired: Receiver<()>,
    deadline: Option<Instant>,
}

#[derive(Debug, Clone)]
pub struct CancelToken {
    inner: Arc<TokenInner>,
}

impl Default for CancelToken {
    fn default() -> Self {
        Self::new()
    }
}

impl CancelToken {
    pub fn new() -> Self {
        Self::build(None)
    }

    /// A token that fires on its own once `deadline` is reached.
    pub fn with_deadline(deadline: Instant) -> Self {
        Self::build(Some(deadline))
    }

    pub fn with_timeout(timeout: Duration) -> Self {
        Self::build(Some(Instant::now() + timeout))
    }

    fn build(deadline: Option<Instant>) -> Self {
        let (trigger, fired) = bounded::<()>(0);
        Self {
            inner: Arc::new(TokenInner {
                trigger: Mutex::new(Some(trigger)),
                fired,
                deadline,
            }),
        }
    }

    /// Fires the token. Later calls are no-ops.
    pub fn cancel(&self) {
        let mut trigger = self
            .inner
            .trigger
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        if trigger.take().is_some() {
            log::debug!("CancelToken: canceled explicitly.");
        }
    }

    /// When the token fires on its own, if it was built with a deadline or timeout.
    pub fn deadline(&self) -> Option<Instant> {
        self.inner.deadline
    }

    fn canceled_explicitly(&self) -> bool {
        matches!(self.inner.fired.try_recv(), Err(TryRecvError::Disconnected))
    }

    /// The error a canceled token reports, or `None` while it is still live.
    pub fn error(&self) -> Option<DialogError> {
        if self.canceled_explicitly() {
            return Some(DialogError::Canceled);
        }
        match self.inner.deadline {
            Some(deadline) if Instant::now() >= deadline => Some(DialogError::DeadlineExceeded),
            _ => None,
        }
    }

    pub fn is_canceled(&self) -> bool {
        self.error().is_some()
    }

    /// Blocks until the token fires and returns its error.
    pub fn wait(&self) -> DialogError {
        let deadline = self.deadline_channel();
        select! {
            recv(self.inner.fired) -> _ => DialogError::Canceled,
            recv(deadline) -> _ => DialogError::DeadlineExceeded,
        }
    }

    /// Receiver that disconnects when `cancel()` is called.
    pub(crate) fn fired(&self) -> &Receiver<()> {
        &self.inner.fired
    }

    /// Receiver that yields once the deadline passes, or never.
    pub(crate) fn deadline_channel(&self) -> Receiver<Instant> {
        match self.inner.deadline {
            Some(deadline) => at(deadline),
            None => never(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fresh_token_is_not_canceled() {
        let token = CancelToken::new();
        assert!(!token.is_canceled());
        assert_eq!(token.error(), None);
    }

    #[test]
    fn cancel_is_visible_through_every_clone() {
        let token = CancelToken::new();
        let observer = token.clone();
        token.cancel();
        token.cancel();
        assert_eq!(observer.error(), Some(DialogError::Canceled));
    }

    #[test]
    fn expired_deadline_reports_deadline_exceeded() {
        let token = CancelToken::with_deadline(Instant::now());
        assert_eq!(token.error(), Some(DialogError::DeadlineExceeded));
        assert_eq!(token.wait(), DialogError::DeadlineExceeded);
    }

    #[test]
    fn deadline_is_exposed_only_for_timed_tokens() {
        let deadline = Instant::now() + Duration::from_secs(60);
        assert_eq!(CancelToken::with_deadline(deadline).deadline(), Some(deadline));
        assert_eq!(CancelToken::new().deadline(), None);
    }

    #[test]
    fn explicit_cancel_takes_precedence_over_later_deadline() {
        let token = CancelToken::with_timeout(Duration::from_secs(3600));
        token.cancel();
        assert_eq!(token.error(), Some(DialogError::Canceled));
    }

    #[test]
    fn wait_returns_when_another_thread_cancels() {
        let token = CancelToken::new();
        let remote = token.clone();
        let handle = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            remote.cancel();
        });
        assert_eq!(token.wait(), DialogError::Canceled);
        handle.join().unwrap();
    }
}
