/*
 * A windowless toolkit for progress dialogs. The "window" is a widget model owned
 * by the dialog's worker thread and driven by its own message queue, through the
 * same dispatch state machine and request handling as the Win32 toolkit.
 *
 * A `HeadlessHandle` plays the user: it can press buttons, hit the close box, and
 * move the dialog to another DPI. It also exposes what a user would see as a
 * `WidgetSnapshot`, republished by the worker after every message. This is the
 * toolkit used on non-Windows targets and for automation.
 */

use crate::controller::{self, DialogState, Mailbox, ProgressControls, ProgressDialog, Toolkit};
use crate::backref::HandleTable;
use crate::dispatch::{Action, DialogMessage, Dispatcher, Phase};
use crate::dpi::Dpi;
use crate::error::Result;
use crate::layout::{self, ControlSet, DialogLayout};
use crate::types::{Button, ProgressConfig, Request, Settings};

use crossbeam_channel::{Receiver, Sender, bounded, unbounded};
use std::sync::{Arc, Mutex};

/// What the dialog currently shows.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WidgetSnapshot {
    pub title: String,
    pub visible: bool,
    pub destroyed: bool,
    pub label: String,
    pub ok_label: String,
    pub position: i32,
    /// Upper bound of the bar; meaningless while `marquee` is set.
    pub range_max: i32,
    pub marquee: bool,
    pub ok_enabled: bool,
    /// `None` when the dialog has no Cancel button.
    pub cancel_enabled: Option<bool>,
    pub extra_label: Option<String>,
    pub dpi: Dpi,
    pub layout: DialogLayout,
}

impl WidgetSnapshot {
    fn initial(settings: &Settings, dpi: Dpi) -> Self {
        Self {
            title: settings.title.clone(),
            visible: false,
            destroyed: false,
            label: String::new(),
            ok_label: settings.ok_label.clone(),
            position: 0,
            range_max: settings.max_value.max(0),
            marquee: settings.is_indeterminate(),
            ok_enabled: false,
            cancel_enabled: settings.cancel_label.as_ref().map(|_| true),
            extra_label: settings.extra_label.clone(),
            dpi,
            layout: layout::compute(settings.control_set(), dpi),
        }
    }

    fn button_enabled(&self, button: Button) -> bool {
        match button {
            Button::Ok => self.ok_enabled,
            Button::Cancel => self.cancel_enabled == Some(true),
            Button::Extra => self.extra_label.is_some(),
        }
    }
}

#[derive(Debug)]
enum Event {
    Message(DialogMessage),
    Click(Button),
    Sync(Sender<()>),
}

/// Simulated user and observer for a headless dialog. Cheap to clone.
#[derive(Debug, Clone)]
pub struct HeadlessHandle {
    events: Sender<Event>,
    screen: Arc<Mutex<WidgetSnapshot>>,
}

impl HeadlessHandle {
    fn send(&self, event: Event) {
        if self.events.send(event).is_err() {
            log::debug!("HeadlessHandle: dialog already gone, event dropped.");
        }
    }

    /// Presses `button`. Disabled or absent buttons ignore the press.
    pub fn click(&self, button: Button) {
        self.send(Event::Click(button));
    }

    /// Clicks the title-bar close box.
    pub fn close_box(&self) {
        self.send(Event::Message(DialogMessage::Close));
    }

    /// Moves the dialog to a monitor with a different DPI.
    pub fn change_dpi(&self, dpi: u32) {
        self.send(Event::Message(DialogMessage::DpiChanged(Dpi::new(dpi))));
    }

    /// Blocks until every event and request queued before this call has been
    /// processed, or the dialog has been destroyed.
    pub fn sync(&self) {
        let (reply_tx, reply_rx) = bounded(1);
        self.send(Event::Sync(reply_tx));
        let _ = reply_rx.recv();
    }

    pub fn snapshot(&self) -> WidgetSnapshot {
        self.screen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
            .clone()
    }
}

// Each headless dialog has its own table, so one synthetic handle suffices.
const HEADLESS_HANDLE: isize = 1;

struct HeadlessMailbox {
    requests: Sender<Request>,
    events: Sender<Event>,
}

impl Mailbox for HeadlessMailbox {
    fn post(&self, request: Request) {
        if self.requests.send(request).is_ok() {
            let _ = self
                .events
                .send(Event::Message(DialogMessage::RequestsPending));
        }
    }

    fn request_close(&self) {
        let _ = self.events.send(Event::Message(DialogMessage::Close));
    }
}

struct HeadlessToolkit {
    events_tx: Sender<Event>,
    events_rx: Receiver<Event>,
    screen: Arc<Mutex<WidgetSnapshot>>,
    dpi: Dpi,
}

pub(crate) struct HeadlessWindow {
    widgets: WidgetSnapshot,
    controls: ControlSet,
    screen: Arc<Mutex<WidgetSnapshot>>,
    dispatcher: Dispatcher,
    state: Arc<DialogState>,
    events: Receiver<Event>,
    requests: Receiver<Request>,
    back_refs: HandleTable<()>,
    quit: bool,
}

impl Toolkit for HeadlessToolkit {
    type Window = HeadlessWindow;

    fn open(
        self,
        settings: &Settings,
        state: &Arc<DialogState>,
    ) -> Result<(HeadlessWindow, Arc<dyn Mailbox>)> {
        let (requests_tx, requests_rx) = unbounded();
        let mut window = HeadlessWindow {
            widgets: WidgetSnapshot::initial(settings, self.dpi),
            controls: settings.control_set(),
            screen: self.screen,
            dispatcher: Dispatcher::new(),
            state: Arc::clone(state),
            events: self.events_rx,
            requests: requests_rx,
            back_refs: HandleTable::new(),
            quit: false,
        };

        window.deliver(DialogMessage::Create);
        window.relayout(self.dpi);
        window.widgets.visible = true;
        window.publish();
        log::debug!("HeadlessToolkit: dialog '{}' shown.", settings.title);

        let mailbox: Arc<dyn Mailbox> = Arc::new(HeadlessMailbox {
            requests: requests_tx,
            events: self.events_tx,
        });
        Ok((window, mailbox))
    }

    fn run(mut window: HeadlessWindow) -> Result<()> {
        while !window.quit {
            let Ok(event) = window.events.recv() else {
                // Every sender is gone, so nothing else can end the dialog.
                log::debug!("HeadlessToolkit: all senders gone, closing.");
                window.deliver(DialogMessage::Close);
                window.publish();
                break;
            };
            match event {
                Event::Message(message) => window.deliver(message),
                Event::Click(button) => {
                    if window.widgets.button_enabled(button) {
                        window.deliver(DialogMessage::Command(button));
                    } else {
                        log::debug!("HeadlessToolkit: click on inactive {button:?} ignored.");
                    }
                }
                Event::Sync(reply) => {
                    let _ = reply.send(());
                }
            }
            window.publish();
        }
        log::debug!(
            "HeadlessToolkit: message loop exited ({} back-references held).",
            window.back_refs.len()
        );
        Ok(())
    }
}

impl HeadlessWindow {
    fn deliver(&mut self, message: DialogMessage) {
        match self.dispatcher.dispatch(message, &self.state.cause) {
            Action::RegisterBackRef => {
                self.back_refs.register(HEADLESS_HANDLE, ());
            }
            Action::ReleaseBackRef => {
                self.back_refs.release(HEADLESS_HANDLE);
            }
            Action::DestroyWindow => {
                // Destruction delivers its notifications synchronously, as Win32 does.
                self.widgets.visible = false;
                self.deliver(DialogMessage::Destroy);
                self.deliver(DialogMessage::DestroyNotification);
                self.widgets.destroyed = self.dispatcher.phase() == Phase::Destroyed;
            }
            Action::Quit => self.quit = true,
            Action::Relayout(dpi) => self.relayout(dpi),
            Action::ApplyRequests => {
                let requests = self.requests.clone();
                let max_value = self.state.max_value();
                controller::drain_requests(&requests, self, max_value);
            }
            Action::Default => {}
        }
    }

    fn relayout(&mut self, dpi: Dpi) {
        self.widgets.dpi = dpi;
        self.widgets.layout = layout::compute(self.controls, dpi);
    }

    fn publish(&self) {
        let mut screen = self
            .screen
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner());
        *screen = self.widgets.clone();
    }
}

impl ProgressControls for HeadlessWindow {
    fn set_label(&mut self, text: &str) -> Result<()> {
        self.widgets.label = text.to_string();
        Ok(())
    }

    fn set_position(&mut self, value: i32) -> Result<()> {
        self.widgets.position = value;
        Ok(())
    }

    fn enable_button(&mut self, button: Button, enabled: bool) -> Result<()> {
        match button {
            Button::Ok => self.widgets.ok_enabled = enabled,
            Button::Cancel => {
                if let Some(state) = self.widgets.cancel_enabled.as_mut() {
                    *state = enabled;
                }
            }
            Button::Extra => {}
        }
        Ok(())
    }

    fn show_full(&mut self) -> Result<()> {
        self.widgets.marquee = false;
        self.widgets.range_max = 1;
        self.widgets.position = 1;
        Ok(())
    }
}

/// Opens a headless progress dialog at 96 DPI.
pub fn spawn(config: ProgressConfig) -> Result<(ProgressDialog, HeadlessHandle)> {
    spawn_with_dpi(config, Dpi::default())
}

pub fn spawn_with_dpi(config: ProgressConfig, dpi: Dpi) -> Result<(ProgressDialog, HeadlessHandle)> {
    let (events_tx, events_rx) = unbounded();
    let screen = Arc::new(Mutex::new(WidgetSnapshot {
        title: String::new(),
        visible: false,
        destroyed: false,
        label: String::new(),
        ok_label: String::new(),
        position: 0,
        range_max: 0,
        marquee: false,
        ok_enabled: false,
        cancel_enabled: None,
        extra_label: None,
        dpi,
        layout: layout::compute(ControlSet::default(), dpi),
    }));

    let toolkit = HeadlessToolkit {
        events_tx: events_tx.clone(),
        events_rx,
        screen: Arc::clone(&screen),
        dpi,
    };
    let dialog = controller::spawn(config, toolkit)?;
    Ok((
        dialog,
        HeadlessHandle {
            events: events_tx,
            screen,
        },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::DialogError;
    use std::time::Duration;

    fn init_logging() {
        let _ = env_logger::builder().is_test(true).try_init();
    }

    #[test]
    fn initial_snapshot_reflects_settings() {
        init_logging();
        let (dialog, handle) = spawn(
            ProgressConfig::new()
                .title("Export")
                .ok_label("Finish")
                .extra_button("Skip")
                .max_value(20),
        )
        .unwrap();
        let snapshot = handle.snapshot();
        assert!(snapshot.visible);
        assert!(!snapshot.destroyed);
        assert_eq!(snapshot.title, "Export");
        assert_eq!(snapshot.ok_label, "Finish");
        assert_eq!(snapshot.range_max, 20);
        assert!(!snapshot.marquee);
        assert!(!snapshot.ok_enabled);
        assert_eq!(snapshot.cancel_enabled, Some(true));
        assert_eq!(snapshot.extra_label.as_deref(), Some("Skip"));
        assert_eq!(snapshot.layout.extra.map(|r| r.x), Some(12));
        dialog.close().unwrap();
    }

    #[test]
    fn dpi_change_relayouts_without_changing_state() {
        init_logging();
        let (dialog, handle) = spawn(ProgressConfig::new()).unwrap();
        dialog.text("halfway").unwrap();
        dialog.value(50).unwrap();
        handle.change_dpi(144);
        handle.sync();

        let snapshot = handle.snapshot();
        assert_eq!(snapshot.dpi, Dpi(144));
        assert_eq!(
            snapshot.layout,
            layout::compute(
                ControlSet {
                    cancel: true,
                    extra: false
                },
                Dpi(144)
            )
        );
        assert_eq!(snapshot.label, "halfway");
        assert_eq!(snapshot.position, 50);
        assert!(!dialog.is_closed());
        dialog.close().unwrap();
    }

    #[test]
    fn spawn_with_dpi_applies_initial_scale() {
        init_logging();
        let (dialog, handle) = spawn_with_dpi(ProgressConfig::new(), Dpi(192)).unwrap();
        assert_eq!(handle.snapshot().layout.window_width, 562);
        dialog.close().unwrap();
    }

    #[test]
    fn destroyed_dialog_is_reported_and_sync_does_not_hang() {
        init_logging();
        let (dialog, handle) = spawn(ProgressConfig::new()).unwrap();
        handle.click(Button::Cancel);
        assert!(dialog.done().wait_timeout(Duration::from_secs(5)));

        let snapshot = handle.snapshot();
        assert!(snapshot.destroyed);
        assert!(!snapshot.visible);

        handle.sync();
        handle.click(Button::Ok);
        assert_eq!(dialog.result(), Some(Err(DialogError::Canceled)));
    }

    #[test]
    fn unreachable_dialog_closes_as_canceled_through_destroy_sequence() {
        init_logging();
        let (settings, _) = ProgressConfig::new().validate().unwrap();
        let state = Arc::new(DialogState::new(settings.max_value));
        let (events_tx, events_rx) = unbounded();
        let screen = Arc::new(Mutex::new(WidgetSnapshot::initial(&settings, Dpi::default())));
        let toolkit = HeadlessToolkit {
            events_tx,
            events_rx,
            screen: Arc::clone(&screen),
            dpi: Dpi::default(),
        };

        let (window, mailbox) = toolkit.open(&settings, &state).unwrap();
        drop(mailbox);
        HeadlessToolkit::run(window).unwrap();

        assert_eq!(state.cause.get(), Some(&Err(DialogError::Canceled)));
        let snapshot = screen.lock().unwrap().clone();
        assert!(snapshot.destroyed);
        assert!(!snapshot.visible);
    }

    #[test]
    fn dropping_dialog_and_handle_ends_with_cancel() {
        init_logging();
        let (dialog, handle) = spawn(ProgressConfig::new()).unwrap();
        let done = dialog.done();
        drop(dialog);
        drop(handle);
        assert!(done.wait_timeout(Duration::from_secs(5)));
    }

    #[test]
    fn absent_extra_button_ignores_clicks() {
        init_logging();
        let (dialog, handle) = spawn(ProgressConfig::new()).unwrap();
        handle.click(Button::Extra);
        handle.sync();
        assert!(!dialog.is_closed());
        dialog.close().unwrap();
    }
}
