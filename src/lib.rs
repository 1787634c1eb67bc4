/*
 * liveprogress: an asynchronous, cancelable progress dialog whose label and bar
 * can be updated from any thread while the dialog runs on its own worker thread.
 *
 * The controller, the dispatch state machine, layout, and cancellation are
 * portable and compiled everywhere. The native Win32 toolkit is compiled only on
 * Windows; every platform gets the headless toolkit, which drives the same
 * controller without a window and is what the test suite runs against.
 */
pub(crate) mod backref;
pub(crate) mod bridge;
pub mod cancel;
pub mod controller;
#[cfg(target_os = "windows")]
pub(crate) mod controls;
pub(crate) mod dispatch;
pub mod dpi;
pub mod error;
#[cfg(target_os = "windows")]
pub(crate) mod font;
pub mod headless;
pub mod layout;
#[cfg(target_os = "windows")]
pub(crate) mod native_dialog;
pub(crate) mod signal;
pub mod types;
#[cfg(target_os = "windows")]
pub(crate) mod window_common;

pub use cancel::CancelToken;
pub use controller::ProgressDialog;
pub use dpi::Dpi;
pub use error::{DialogError, Result};
pub use headless::{HeadlessHandle, WidgetSnapshot};
pub use layout::{ControlSet, DialogLayout, Rect};
#[cfg(target_os = "windows")]
pub use native_dialog::progress;
pub use signal::DoneSignal;
pub use types::{Button, OwnerWindow, ProgressConfig};
