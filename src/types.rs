/*
 * Platform-agnostic configuration and request types for progress dialogs.
 * `ProgressConfig` is what callers build; `validate` turns it into the
 * defaulted `Settings` the worker consumes.
 */

use crate::cancel::CancelToken;
use crate::error::Result;
use crate::layout::ControlSet;

pub(crate) const DEFAULT_OK_LABEL: &str = "OK";
pub(crate) const DEFAULT_CANCEL_LABEL: &str = "Cancel";
pub(crate) const DEFAULT_MAX_VALUE: i32 = 100;

/// The three push buttons a progress dialog can show.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Button {
    Ok,
    Cancel,
    Extra,
}

/// Raw native handle of a window that should own the dialog (an `HWND` on Windows).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OwnerWindow(pub isize);

/*
 * Caller-facing dialog configuration. Every field is optional; unset values are
 * defaulted by `validate`. A negative maximum selects the indeterminate
 * ("marquee") bar, zero selects the default of 100.
 */
#[derive(Debug, Clone, Default)]
pub struct ProgressConfig {
    title: Option<String>,
    ok_label: Option<String>,
    cancel_label: Option<String>,
    extra_button: Option<String>,
    max_value: i32,
    no_cancel: bool,
    owner: Option<OwnerWindow>,
    cancel_token: Option<CancelToken>,
}

impl ProgressConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn ok_label(mut self, label: impl Into<String>) -> Self {
        self.ok_label = Some(label.into());
        self
    }

    pub fn cancel_label(mut self, label: impl Into<String>) -> Self {
        self.cancel_label = Some(label.into());
        self
    }

    /// Adds a third button; pressing it ends the dialog with `DialogError::ExtraButton`.
    pub fn extra_button(mut self, label: impl Into<String>) -> Self {
        self.extra_button = Some(label.into());
        self
    }

    pub fn max_value(mut self, max: i32) -> Self {
        self.max_value = max;
        self
    }

    /// Indeterminate bar; equivalent to `max_value(-1)`.
    pub fn pulsate(self) -> Self {
        self.max_value(-1)
    }

    /// Hides the Cancel button.
    pub fn no_cancel(mut self) -> Self {
        self.no_cancel = true;
        self
    }

    pub fn owner(mut self, owner: OwnerWindow) -> Self {
        self.owner = Some(owner);
        self
    }

    /// Closes the dialog as canceled when `token` fires.
    pub fn cancel_token(mut self, token: CancelToken) -> Self {
        self.cancel_token = Some(token);
        self
    }

    /*
     * Applies defaults and rejects a token that has already fired, so a dialog
     * is never opened for work that is already abandoned.
     */
    pub(crate) fn validate(self) -> Result<(Settings, Option<CancelToken>)> {
        if let Some(err) = self.cancel_token.as_ref().and_then(CancelToken::error) {
            log::debug!("ProgressConfig: cancellation token already fired ({err}).");
            return Err(err);
        }

        let max_value = if self.max_value == 0 {
            DEFAULT_MAX_VALUE
        } else {
            self.max_value
        };
        let cancel_label = if self.no_cancel {
            None
        } else {
            Some(
                self.cancel_label
                    .unwrap_or_else(|| DEFAULT_CANCEL_LABEL.to_string()),
            )
        };

        let settings = Settings {
            title: self.title.unwrap_or_default(),
            ok_label: self.ok_label.unwrap_or_else(|| DEFAULT_OK_LABEL.to_string()),
            cancel_label,
            extra_label: self.extra_button,
            max_value,
            owner: self.owner,
        };
        Ok((settings, self.cancel_token))
    }
}

/// Validated, defaulted configuration handed to a toolkit on the worker thread.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct Settings {
    pub title: String,
    pub ok_label: String,
    /// `None` when the Cancel button is suppressed.
    pub cancel_label: Option<String>,
    pub extra_label: Option<String>,
    pub max_value: i32,
    pub owner: Option<OwnerWindow>,
}

impl Settings {
    pub(crate) fn is_indeterminate(&self) -> bool {
        self.max_value < 0
    }

    pub(crate) fn control_set(&self) -> ControlSet {
        ControlSet {
            cancel: self.cancel_label.is_some(),
            extra: self.extra_label.is_some(),
        }
    }
}

/// Cross-thread mutations, applied by the worker in the order they were posted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Request {
    Text(String),
    Value(i32),
    Complete,
}
