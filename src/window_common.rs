/*
 * Common Win32 plumbing for the progress dialog: window class registration, the
 * window procedure router, translation of raw window messages into
 * `DialogMessage`s, and the per-thread message loop.
 *
 * Each dialog owns its worker thread, so the back-reference table that maps a
 * window handle to its `NativeDialog` is thread-local. Entries are inserted on
 * `WM_NCCREATE` and removed on `WM_NCDESTROY`; messages for handles not in the
 * table fall through to `DefWindowProcW`.
 */
use crate::backref::HandleTable;
use crate::dispatch::{Action, DialogMessage};
use crate::dpi::Dpi;
use crate::error::{DialogError, Result};
use crate::native_dialog::NativeDialog;
use crate::types::Button;

use windows::Win32::{
    Foundation::{GetLastError, HINSTANCE, HWND, LPARAM, LRESULT, WPARAM},
    Graphics::Gdi::{COLOR_BTNFACE, HBRUSH},
    UI::HiDpi::{
        DPI_AWARENESS_CONTEXT, DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2,
        SetThreadDpiAwarenessContext,
    },
    UI::WindowsAndMessaging::*,
};
use windows::core::{HSTRING, PCWSTR};

use std::cell::RefCell;
use std::ffi::c_void;
use std::rc::Rc;
use std::sync::atomic::{AtomicU64, Ordering};

// Posted by the mailbox whenever requests are queued for the worker.
pub(crate) const WM_APP_DIALOG_REQUESTS: u32 = WM_APP + 0x110;

const BN_CLICKED: u16 = 0;
const SUCCESS_CODE: LRESULT = LRESULT(0);

static CLASS_COUNTER: AtomicU64 = AtomicU64::new(0);

thread_local! {
    static BACK_REFS: RefCell<HandleTable<Rc<NativeDialog>>> = RefCell::new(HandleTable::new());
}

pub(crate) fn hwnd_key(hwnd: HWND) -> isize {
    hwnd.0 as isize
}

pub(crate) fn hwnd_from_key(key: isize) -> HWND {
    HWND(key as *mut c_void)
}

/*
 * A registered window class. Every dialog registers its own class name so that
 * concurrent dialogs on different threads never share or unregister each other's
 * class. Unregistered on drop, which must happen after the window is destroyed.
 */
pub(crate) struct WindowClass {
    name: HSTRING,
    instance: HINSTANCE,
}

impl WindowClass {
    pub(crate) fn name(&self) -> &HSTRING {
        &self.name
    }
}

impl Drop for WindowClass {
    fn drop(&mut self) {
        if let Err(e) = unsafe { UnregisterClassW(PCWSTR(self.name.as_ptr()), Some(self.instance)) }
        {
            log::warn!("WindowCommon: UnregisterClassW('{}') failed: {e:?}", self.name);
        }
    }
}

pub(crate) fn register_dialog_class(instance: HINSTANCE) -> Result<WindowClass> {
    let name = HSTRING::from(format!(
        "LiveProgressDialog_{}_{}",
        std::process::id(),
        CLASS_COUNTER.fetch_add(1, Ordering::Relaxed)
    ));

    unsafe {
        let wc = WNDCLASSEXW {
            cbSize: std::mem::size_of::<WNDCLASSEXW>() as u32,
            style: CS_HREDRAW | CS_VREDRAW,
            lpfnWndProc: Some(progress_wnd_proc),
            cbClsExtra: 0,
            cbWndExtra: 0,
            hInstance: instance,
            hIcon: Default::default(),
            hCursor: LoadCursorW(None, IDC_ARROW).map_err(|e| {
                DialogError::InitializationFailed(format!("LoadCursorW failed: {e:?}"))
            })?,
            hbrBackground: HBRUSH((COLOR_BTNFACE.0 + 1) as *mut c_void),
            lpszMenuName: PCWSTR::null(),
            lpszClassName: PCWSTR(name.as_ptr()),
            hIconSm: Default::default(),
        };

        if RegisterClassExW(&wc) == 0 {
            let error = GetLastError();
            log::error!("WindowCommon: RegisterClassExW failed: {error:?}");
            return Err(DialogError::InitializationFailed(format!(
                "RegisterClassExW failed: {error:?}"
            )));
        }
    }

    log::debug!("WindowCommon: window class '{name}' registered.");
    Ok(WindowClass { name, instance })
}

/// Per-monitor DPI awareness for the calling thread, restored on drop.
pub(crate) struct ThreadDpiAwareness {
    previous: DPI_AWARENESS_CONTEXT,
}

impl ThreadDpiAwareness {
    pub(crate) fn per_monitor() -> Self {
        let previous =
            unsafe { SetThreadDpiAwarenessContext(DPI_AWARENESS_CONTEXT_PER_MONITOR_AWARE_V2) };
        if previous.0.is_null() {
            log::debug!("WindowCommon: per-monitor DPI awareness unavailable on this system.");
        }
        Self { previous }
    }
}

impl Drop for ThreadDpiAwareness {
    fn drop(&mut self) {
        if !self.previous.0.is_null() {
            unsafe { SetThreadDpiAwarenessContext(self.previous) };
        }
    }
}

/*
 * Maps a raw window message onto the dispatcher's vocabulary. Button clicks and
 * the dialog-manager keys (Enter, Escape) both arrive as `WM_COMMAND` with a
 * `BN_CLICKED` notification code.
 */
pub(crate) fn translate_message(msg: u32, wparam: WPARAM) -> DialogMessage {
    match msg {
        WM_NCCREATE => DialogMessage::Create,
        WM_CLOSE => DialogMessage::Close,
        WM_COMMAND => {
            if highord_from_wparam(wparam) != BN_CLICKED {
                return DialogMessage::Other;
            }
            let id = loword_from_wparam(wparam);
            match i32::from(id) {
                x if x == IDOK.0 || x == IDYES.0 => DialogMessage::Command(Button::Ok),
                x if x == IDCANCEL.0 => DialogMessage::Command(Button::Cancel),
                x if x == IDNO.0 => DialogMessage::Command(Button::Extra),
                _ => DialogMessage::UnknownCommand(id),
            }
        }
        WM_DPICHANGED => DialogMessage::DpiChanged(Dpi::from_dpichanged_wparam(wparam.0)),
        WM_APP_DIALOG_REQUESTS => DialogMessage::RequestsPending,
        WM_DESTROY => DialogMessage::Destroy,
        WM_NCDESTROY => DialogMessage::DestroyNotification,
        _ => DialogMessage::Other,
    }
}

/*
 * Window procedure router. On `WM_NCCREATE` the dialog instance arrives through
 * `lpCreateParams` as a borrowed `Rc` pointer; the strong count is bumped so the
 * back-reference table can own its own reference.
 */
unsafe extern "system" fn progress_wnd_proc(
    hwnd: HWND,
    msg: u32,
    wparam: WPARAM,
    lparam: LPARAM,
) -> LRESULT {
    let dialog = if msg == WM_NCCREATE {
        let create_struct = unsafe { &*(lparam.0 as *const CREATESTRUCTW) };
        let raw = create_struct.lpCreateParams as *const NativeDialog;
        if raw.is_null() {
            None
        } else {
            unsafe {
                Rc::increment_strong_count(raw);
                Some(Rc::from_raw(raw))
            }
        }
    } else {
        BACK_REFS.with(|table| table.borrow().lookup(hwnd_key(hwnd)))
    };

    let Some(dialog) = dialog else {
        return unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) };
    };

    match dialog.dispatch(translate_message(msg, wparam)) {
        Action::RegisterBackRef => {
            BACK_REFS.with(|table| {
                table
                    .borrow_mut()
                    .register(hwnd_key(hwnd), Rc::clone(&dialog))
            });
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
        Action::ReleaseBackRef => {
            dialog.mark_destroyed();
            let _ = BACK_REFS.with(|table| table.borrow_mut().release(hwnd_key(hwnd)));
            unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) }
        }
        Action::DestroyWindow => {
            if let Err(e) = unsafe { DestroyWindow(hwnd) } {
                log::error!("WindowCommon: DestroyWindow failed for {hwnd:?}: {e:?}");
            }
            SUCCESS_CODE
        }
        Action::Quit => {
            unsafe { PostQuitMessage(0) };
            SUCCESS_CODE
        }
        Action::Relayout(dpi) => {
            dialog.relayout(dpi);
            SUCCESS_CODE
        }
        Action::ApplyRequests => {
            dialog.apply_requests();
            SUCCESS_CODE
        }
        Action::Default => unsafe { DefWindowProcW(hwnd, msg, wparam, lparam) },
    }
}

/*
 * Pumps messages for the calling thread until `WM_QUIT`. Keyboard navigation
 * (Tab, Enter, Escape) is routed through the dialog manager.
 */
pub(crate) fn run_message_loop(dialog_hwnd: HWND) -> Result<()> {
    let mut msg = MSG::default();
    loop {
        let ret = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        match ret.0 {
            -1 => {
                let error = unsafe { GetLastError() };
                log::error!("WindowCommon: GetMessageW failed: {error:?}");
                return Err(DialogError::OperationFailed(format!(
                    "GetMessageW failed: {error:?}"
                )));
            }
            0 => {
                log::debug!("WindowCommon: WM_QUIT received, leaving message loop.");
                return Ok(());
            }
            _ => unsafe {
                if !IsDialogMessageW(dialog_hwnd, &msg).as_bool() {
                    let _ = TranslateMessage(&msg);
                    DispatchMessageW(&msg);
                }
            },
        }
    }
}

#[inline]
pub(crate) fn loword_from_wparam(wparam: WPARAM) -> u16 {
    (wparam.0 & 0xFFFF) as u16
}
#[inline]
pub(crate) fn highord_from_wparam(wparam: WPARAM) -> u16 {
    ((wparam.0 >> 16) & 0xFFFF) as u16
}
