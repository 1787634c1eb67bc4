/*
 * Push buttons of the progress dialog. Button ids are the standard dialog ids so
 * the dialog manager's Enter and Escape handling reaches them: OK is `IDOK`,
 * Cancel is `IDCANCEL`, and the extra button is `IDNO`.
 */

use crate::controls::create_child;
use crate::error::Result;
use crate::types::Button;

use windows::Win32::{
    Foundation::{HINSTANCE, HWND},
    UI::Input::KeyboardAndMouse::{EnableWindow, IsWindowEnabled},
    UI::WindowsAndMessaging::{
        BS_DEFPUSHBUTTON, BS_PUSHBUTTON, IDCANCEL, IDNO, IDOK, WINDOW_STYLE, WS_CHILD,
        WS_DISABLED, WS_GROUP, WS_TABSTOP, WS_VISIBLE,
    },
};
use windows::core::w;

pub(crate) fn control_id(button: Button) -> i32 {
    match button {
        Button::Ok => IDOK.0,
        Button::Cancel => IDCANCEL.0,
        Button::Extra => IDNO.0,
    }
}

/*
 * OK starts disabled and is the default button; it is enabled once the bar
 * reaches its maximum or the caller completes the dialog.
 */
pub(crate) fn create_button(
    parent: HWND,
    instance: HINSTANCE,
    button: Button,
    text: &str,
) -> Result<HWND> {
    let mut style = WS_CHILD | WS_VISIBLE | WS_TABSTOP;
    match button {
        Button::Ok => style |= WS_GROUP | WS_DISABLED | WINDOW_STYLE(BS_DEFPUSHBUTTON as u32),
        Button::Cancel | Button::Extra => style |= WINDOW_STYLE(BS_PUSHBUTTON as u32),
    }
    log::debug!("ButtonHandler: creating {button:?} button '{text}'.");
    create_child(parent, instance, w!("BUTTON"), text, style, control_id(button))
}

pub(crate) fn set_enabled(hwnd: HWND, enabled: bool) {
    // Returns the previous state, not success.
    let _ = unsafe { EnableWindow(hwnd, enabled) };
}

pub(crate) fn is_enabled(hwnd: HWND) -> bool {
    unsafe { IsWindowEnabled(hwnd) }.as_bool()
}
