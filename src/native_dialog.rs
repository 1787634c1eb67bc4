/*
 * The Win32 toolkit. `Win32Toolkit::open` runs on the dialog's worker thread:
 * it registers a window class, creates the top-level window and its controls,
 * lays them out for the window's DPI, centers and shows it. `run` then pumps the
 * thread's message queue until the window is destroyed.
 *
 * `NativeDialog` is the per-window instance the window procedure finds through
 * the back-reference table. Its mutable parts sit behind `RefCell`s whose borrows
 * never span a call that can re-enter the window procedure with a message that
 * needs the same cell.
 */

use crate::controller::{
    self, DialogState, Mailbox, ProgressControls, ProgressDialog, Toolkit,
};
use crate::controls::{self, button_handler, label_handler, progress_handler};
use crate::dispatch::{Action, DialogMessage, Dispatcher, Phase};
use crate::dpi::Dpi;
use crate::error::{DialogError, Result};
use crate::font::DpiFont;
use crate::layout::{self, ControlSet, Rect};
use crate::types::{Button, ProgressConfig, Request, Settings};
use crate::window_common::{
    self, ThreadDpiAwareness, WM_APP_DIALOG_REQUESTS, WindowClass, hwnd_from_key, hwnd_key,
};

use crossbeam_channel::{Receiver, Sender, unbounded};
use std::cell::RefCell;
use std::ffi::c_void;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use windows::Win32::{
    Foundation::{HINSTANCE, HWND, LPARAM, RECT, WPARAM},
    Graphics::Gdi::{GetMonitorInfoW, MONITOR_DEFAULTTONEAREST, MONITORINFO, MonitorFromWindow},
    System::LibraryLoader::GetModuleHandleW,
    System::Threading::GetCurrentThreadId,
    UI::Controls::{
        ICC_PROGRESS_CLASS, ICC_STANDARD_CLASSES, INITCOMMONCONTROLSEX, InitCommonControlsEx,
    },
    UI::HiDpi::GetDpiForWindow,
    UI::WindowsAndMessaging::{
        CW_USEDEFAULT, CreateWindowExW, DestroyWindow, GetWindowRect, GetWindowThreadProcessId,
        PostMessageW, SW_SHOWNORMAL, SWP_NOACTIVATE, SWP_NOMOVE, SWP_NOSIZE, SWP_NOZORDER, SetWindowPos,
        ShowWindow, WM_CLOSE, WS_CLIPSIBLINGS, WS_DLGFRAME, WS_EX_CONTROLPARENT,
        WS_EX_DLGMODALFRAME, WS_EX_WINDOWEDGE, WS_POPUPWINDOW,
    },
};
use windows::core::HSTRING;

/// Opens a native progress dialog and returns once it is visible.
pub fn progress(config: ProgressConfig) -> Result<ProgressDialog> {
    controller::spawn(config, Win32Toolkit)
}

pub(crate) struct Win32Toolkit;

pub(crate) struct NativeDialog {
    state: Arc<DialogState>,
    dispatcher: RefCell<Dispatcher>,
    requests: Receiver<Request>,
    controls: RefCell<Option<DialogControls>>,
    live: Arc<AtomicBool>,
}

impl NativeDialog {
    pub(crate) fn dispatch(&self, message: DialogMessage) -> Action {
        if let DialogMessage::Command(button) = message
            && !self.is_button_active(button)
        {
            log::debug!("NativeDialog: command from inactive {button:?} ignored.");
            return Action::Default;
        }
        match self.dispatcher.try_borrow_mut() {
            Ok(mut dispatcher) => dispatcher.dispatch(message, &self.state.cause),
            Err(_) => {
                log::warn!("NativeDialog: re-entrant {message:?} passed to default handling.");
                Action::Default
            }
        }
    }

    fn phase(&self) -> Phase {
        self.dispatcher
            .try_borrow()
            .map(|dispatcher| dispatcher.phase())
            .unwrap_or(Phase::Live)
    }

    /// Stops the mailbox from posting to a handle that may be reused.
    pub(crate) fn mark_destroyed(&self) {
        self.live.store(false, Ordering::SeqCst);
    }

    fn is_button_active(&self, button: Button) -> bool {
        match self.controls.try_borrow() {
            Ok(controls) => controls
                .as_ref()
                .is_some_and(|controls| controls.is_active(button)),
            Err(_) => false,
        }
    }

    pub(crate) fn relayout(&self, dpi: Dpi) {
        let Ok(mut controls) = self.controls.try_borrow_mut() else {
            log::warn!("NativeDialog: relayout to {dpi:?} skipped, controls busy.");
            return;
        };
        if let Some(controls) = controls.as_mut()
            && let Err(e) = controls.apply_layout(dpi)
        {
            log::warn!("NativeDialog: relayout to {dpi:?} failed: {e}");
        }
    }

    pub(crate) fn apply_requests(&self) {
        let Ok(mut controls) = self.controls.try_borrow_mut() else {
            // The requests stay queued; the next notification drains them.
            log::warn!("NativeDialog: requests deferred, controls busy.");
            return;
        };
        if let Some(controls) = controls.as_mut() {
            controller::drain_requests(&self.requests, controls, self.state.max_value());
        }
    }
}

struct DialogControls {
    window: HWND,
    label: HWND,
    progress: HWND,
    ok: HWND,
    cancel: Option<HWND>,
    extra: Option<HWND>,
    set: ControlSet,
    font: DpiFont,
}

impl DialogControls {
    fn create(window: HWND, instance: HINSTANCE, settings: &Settings) -> Result<Self> {
        let label = label_handler::create_label(window, instance)?;
        let progress = progress_handler::create_progress_bar(window, instance, settings.max_value)?;
        let ok = button_handler::create_button(window, instance, Button::Ok, &settings.ok_label)?;
        let cancel = settings
            .cancel_label
            .as_deref()
            .map(|text| button_handler::create_button(window, instance, Button::Cancel, text))
            .transpose()?;
        let extra = settings
            .extra_label
            .as_deref()
            .map(|text| button_handler::create_button(window, instance, Button::Extra, text))
            .transpose()?;

        Ok(Self {
            window,
            label,
            progress,
            ok,
            cancel,
            extra,
            set: settings.control_set(),
            font: DpiFont::message_font(),
        })
    }

    fn button(&self, button: Button) -> Option<HWND> {
        match button {
            Button::Ok => Some(self.ok),
            Button::Cancel => self.cancel,
            Button::Extra => self.extra,
        }
    }

    fn is_active(&self, button: Button) -> bool {
        self.button(button).is_some_and(button_handler::is_enabled)
    }

    fn apply_layout(&mut self, dpi: Dpi) -> Result<()> {
        let layout = layout::compute(self.set, dpi);

        if let Some(font) = self.font.for_dpi(dpi) {
            let texts = [Some(self.label), Some(self.ok), self.cancel, self.extra];
            for hwnd in texts.into_iter().flatten() {
                controls::set_font(hwnd, font);
            }
        }

        unsafe {
            SetWindowPos(
                self.window,
                None,
                0,
                0,
                layout.window_width,
                layout.window_height,
                SWP_NOZORDER | SWP_NOMOVE | SWP_NOACTIVATE,
            )?;
        }
        controls::place(self.label, layout.label)?;
        controls::place(self.progress, layout.progress)?;
        controls::place(self.ok, layout.ok)?;
        if let (Some(hwnd), Some(rect)) = (self.cancel, layout.cancel) {
            controls::place(hwnd, rect)?;
        }
        if let (Some(hwnd), Some(rect)) = (self.extra, layout.extra) {
            controls::place(hwnd, rect)?;
        }
        log::debug!("NativeDialog: laid out at {dpi:?}.");
        Ok(())
    }
}

impl ProgressControls for DialogControls {
    fn set_label(&mut self, text: &str) -> Result<()> {
        label_handler::set_label_text(self.label, text)
    }

    fn set_position(&mut self, value: i32) -> Result<()> {
        progress_handler::set_position(self.progress, value);
        Ok(())
    }

    fn enable_button(&mut self, button: Button, enabled: bool) -> Result<()> {
        if let Some(hwnd) = self.button(button) {
            button_handler::set_enabled(hwnd, enabled);
        }
        Ok(())
    }

    fn show_full(&mut self) -> Result<()> {
        progress_handler::show_full(self.progress);
        Ok(())
    }
}

struct Win32Mailbox {
    requests: Sender<Request>,
    hwnd: isize,
    /// The worker thread that owns `hwnd`.
    thread_id: u32,
    live: Arc<AtomicBool>,
}

impl Win32Mailbox {
    /*
     * Posts `msg` only while the handle still names a window of the worker
     * thread. A destroy that lands between this check and `PostMessageW` can
     * still let one message reach a handle reused in that window.
     */
    fn post_message(&self, msg: u32) -> bool {
        if !self.live.load(Ordering::SeqCst) {
            return false;
        }
        let hwnd = hwnd_from_key(self.hwnd);
        let owner = unsafe { GetWindowThreadProcessId(hwnd, None) };
        if owner != self.thread_id {
            log::debug!("Win32Mailbox: {hwnd:?} no longer belongs to the dialog worker.");
            return false;
        }
        match unsafe { PostMessageW(Some(hwnd), msg, WPARAM(0), LPARAM(0)) } {
            Ok(()) => true,
            Err(e) => {
                log::debug!("Win32Mailbox: PostMessageW({msg:#x}) failed: {e:?}");
                false
            }
        }
    }
}

impl Mailbox for Win32Mailbox {
    fn post(&self, request: Request) {
        if self.requests.send(request).is_ok() {
            self.post_message(WM_APP_DIALOG_REQUESTS);
        }
    }

    fn request_close(&self) {
        self.post_message(WM_CLOSE);
    }
}

/*
 * The worker's ownership of a native dialog. Dropping it before the message loop
 * has run (a setup failure) destroys the window; the class and the thread's DPI
 * awareness are released after the window is gone.
 */
pub(crate) struct NativeWindow {
    dialog: Rc<NativeDialog>,
    hwnd: HWND,
    _class: WindowClass,
    _dpi_awareness: ThreadDpiAwareness,
}

impl Drop for NativeWindow {
    fn drop(&mut self) {
        if self.dialog.phase() == Phase::Live {
            log::debug!("NativeWindow: destroying {:?} on drop.", self.hwnd);
            if let Err(e) = unsafe { DestroyWindow(self.hwnd) } {
                log::warn!("NativeWindow: DestroyWindow failed: {e:?}");
            }
        }
    }
}

impl Toolkit for Win32Toolkit {
    type Window = NativeWindow;

    fn open(
        self,
        settings: &Settings,
        state: &Arc<DialogState>,
    ) -> Result<(NativeWindow, Arc<dyn Mailbox>)> {
        let dpi_awareness = ThreadDpiAwareness::per_monitor();
        init_common_controls();

        let module = unsafe { GetModuleHandleW(None) }.map_err(|e| {
            DialogError::InitializationFailed(format!("GetModuleHandleW failed: {e:?}"))
        })?;
        let instance = HINSTANCE(module.0);
        let class = window_common::register_dialog_class(instance)?;

        let (requests_tx, requests_rx) = unbounded();
        let live = Arc::new(AtomicBool::new(true));
        let dialog = Rc::new(NativeDialog {
            state: Arc::clone(state),
            dispatcher: RefCell::new(Dispatcher::new()),
            requests: requests_rx,
            controls: RefCell::new(None),
            live: Arc::clone(&live),
        });

        let owner = settings.owner.map(|owner| hwnd_from_key(owner.0));
        let base = layout::compute(settings.control_set(), Dpi::default());
        let hwnd = unsafe {
            CreateWindowExW(
                WS_EX_CONTROLPARENT | WS_EX_WINDOWEDGE | WS_EX_DLGMODALFRAME,
                class.name(),
                &HSTRING::from(settings.title.as_str()),
                WS_POPUPWINDOW | WS_CLIPSIBLINGS | WS_DLGFRAME,
                CW_USEDEFAULT,
                CW_USEDEFAULT,
                base.window_width,
                base.window_height,
                owner,
                None,
                Some(instance),
                Some(Rc::as_ptr(&dialog) as *const c_void),
            )
        }
        .map_err(|e| {
            log::error!("NativeDialog: CreateWindowExW failed: {e:?}");
            DialogError::InitializationFailed(format!("CreateWindowExW failed: {}", e.message()))
        })?;

        let window = NativeWindow {
            dialog: Rc::clone(&dialog),
            hwnd,
            _class: class,
            _dpi_awareness: dpi_awareness,
        };

        let mut controls = DialogControls::create(hwnd, instance, settings)?;
        controls
            .apply_layout(Dpi::new(unsafe { GetDpiForWindow(hwnd) }))
            .map_err(|e| DialogError::InitializationFailed(format!("initial layout: {e}")))?;
        *dialog.controls.borrow_mut() = Some(controls);

        center_window(hwnd, owner);
        let _ = unsafe { ShowWindow(hwnd, SW_SHOWNORMAL) };
        log::debug!("NativeDialog: '{}' shown as {hwnd:?}.", settings.title);

        let mailbox: Arc<dyn Mailbox> = Arc::new(Win32Mailbox {
            requests: requests_tx,
            hwnd: hwnd_key(hwnd),
            thread_id: unsafe { GetCurrentThreadId() },
            live,
        });
        Ok((window, mailbox))
    }

    fn run(window: NativeWindow) -> Result<()> {
        window_common::run_message_loop(window.hwnd)
    }
}

fn init_common_controls() {
    let icc = INITCOMMONCONTROLSEX {
        dwSize: std::mem::size_of::<INITCOMMONCONTROLSEX>() as u32,
        dwICC: ICC_PROGRESS_CLASS | ICC_STANDARD_CLASSES,
    };
    if !unsafe { InitCommonControlsEx(&icc) }.as_bool() {
        log::warn!("NativeDialog: InitCommonControlsEx failed.");
    }
}

fn window_rect(hwnd: HWND) -> Option<Rect> {
    let mut rect = RECT::default();
    unsafe { GetWindowRect(hwnd, &mut rect) }.ok()?;
    Some(to_rect(rect))
}

fn to_rect(rect: RECT) -> Rect {
    Rect::new(
        rect.left,
        rect.top,
        rect.right - rect.left,
        rect.bottom - rect.top,
    )
}

/// Centers over the owner when there is one, otherwise on the nearest monitor's work area.
fn center_window(hwnd: HWND, owner: Option<HWND>) {
    let Some(window) = window_rect(hwnd) else {
        return;
    };
    let area = owner.and_then(window_rect).or_else(|| {
        let monitor = unsafe { MonitorFromWindow(hwnd, MONITOR_DEFAULTTONEAREST) };
        let mut info = MONITORINFO {
            cbSize: std::mem::size_of::<MONITORINFO>() as u32,
            ..Default::default()
        };
        unsafe { GetMonitorInfoW(monitor, &mut info) }
            .as_bool()
            .then(|| to_rect(info.rcWork))
    });
    let Some(area) = area else {
        return;
    };

    let (x, y) = layout::center_in(area, window.width, window.height);
    if let Err(e) = unsafe {
        SetWindowPos(
            hwnd,
            None,
            x,
            y,
            0,
            0,
            SWP_NOZORDER | SWP_NOSIZE | SWP_NOACTIVATE,
        )
    } {
        log::warn!("NativeDialog: centering failed: {e:?}");
    }
}
