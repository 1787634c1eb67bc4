/*
 * The message dispatch state machine shared by every toolkit. Toolkits translate
 * their native events into `DialogMessage`s, feed them through `Dispatcher`, and
 * perform the returned `Action`. The dispatcher itself never touches native
 * handles; its only side effect is latching the terminal cause.
 *
 * Every termination path ends in native destruction (`Action::Destroy`), so
 * cleanup runs once regardless of whether the user, the caller, or an external
 * cancellation ended the dialog.
 */

use crate::dpi::Dpi;
use crate::error::DialogError;
use crate::signal::TerminalCause;
use crate::types::Button;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Phase {
    /// Before the window-create message.
    Uninitialized,
    Live,
    /// After the destroy notification; nothing further is meaningful.
    Destroyed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DialogMessage {
    /// The window is being created (`WM_NCCREATE`).
    Create,
    /// Close request from the system menu, the close box, `close()`, or the bridge.
    Close,
    Command(Button),
    /// A command from an unknown control id.
    UnknownCommand(u16),
    DpiChanged(Dpi),
    /// Cross-thread requests are waiting in the dialog's queue.
    RequestsPending,
    /// The window is being destroyed (`WM_DESTROY`).
    Destroy,
    /// Final message for the handle (`WM_NCDESTROY`).
    DestroyNotification,
    Other,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Action {
    /// Associate the native handle with this dialog instance.
    RegisterBackRef,
    /// Drop the association; the handle is about to become invalid.
    ReleaseBackRef,
    DestroyWindow,
    /// Leave the message loop.
    Quit,
    Relayout(Dpi),
    ApplyRequests,
    /// Hand the message to the toolkit's default handling.
    Default,
}

#[derive(Debug)]
pub(crate) struct Dispatcher {
    phase: Phase,
}

impl Default for Dispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl Dispatcher {
    pub(crate) fn new() -> Self {
        Self {
            phase: Phase::Uninitialized,
        }
    }

    pub(crate) fn phase(&self) -> Phase {
        self.phase
    }

    pub(crate) fn dispatch(&mut self, message: DialogMessage, cause: &TerminalCause) -> Action {
        match self.phase {
            Phase::Uninitialized => {
                if message == DialogMessage::Create {
                    log::debug!("Dispatcher: create message, registering back-reference.");
                    self.phase = Phase::Live;
                    Action::RegisterBackRef
                } else {
                    Action::Default
                }
            }
            Phase::Destroyed => {
                log::debug!("Dispatcher: {message:?} after destroy notification ignored.");
                Action::Default
            }
            Phase::Live => self.dispatch_live(message, cause),
        }
    }

    fn dispatch_live(&mut self, message: DialogMessage, cause: &TerminalCause) -> Action {
        match message {
            DialogMessage::Close => {
                cause.latch(Err(DialogError::Canceled));
                Action::DestroyWindow
            }
            DialogMessage::Command(Button::Ok) => {
                cause.latch(Ok(()));
                Action::DestroyWindow
            }
            DialogMessage::Command(Button::Cancel) => {
                cause.latch(Err(DialogError::Canceled));
                Action::DestroyWindow
            }
            DialogMessage::Command(Button::Extra) => {
                cause.latch(Err(DialogError::ExtraButton));
                Action::DestroyWindow
            }
            DialogMessage::UnknownCommand(id) => {
                log::debug!("Dispatcher: ignoring command from unknown control id {id}.");
                Action::Default
            }
            DialogMessage::DpiChanged(dpi) => Action::Relayout(dpi),
            DialogMessage::RequestsPending => Action::ApplyRequests,
            DialogMessage::Destroy => Action::Quit,
            DialogMessage::DestroyNotification => {
                log::debug!("Dispatcher: destroy notification, releasing back-reference.");
                self.phase = Phase::Destroyed;
                Action::ReleaseBackRef
            }
            DialogMessage::Create | DialogMessage::Other => Action::Default,
        }
    }
}
