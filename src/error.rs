/*
 * Error values surfaced by progress dialogs. Terminal causes (`Canceled`,
 * `ExtraButton`, `DeadlineExceeded`) are latched once per dialog and handed back
 * unchanged by every later call, so callers can branch on a single stable value.
 * The remaining variants describe setup or native failures.
 */

use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogError {
    /// The user canceled the dialog, or an external cancellation token fired.
    Canceled,
    /// The user pressed the extra button.
    ExtraButton,
    /// The external cancellation token's deadline expired.
    DeadlineExceeded,
    InitializationFailed(String),
    InvalidHandle(String),
    OperationFailed(String),
}

impl DialogError {
    /// True for the causes that end a dialog without a native failure.
    pub fn is_terminal_cause(&self) -> bool {
        matches!(
            self,
            Self::Canceled | Self::ExtraButton | Self::DeadlineExceeded
        )
    }
}

impl fmt::Display for DialogError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Canceled => write!(f, "dialog canceled"),
            Self::ExtraButton => write!(f, "extra button pressed"),
            Self::DeadlineExceeded => write!(f, "dialog deadline exceeded"),
            Self::InitializationFailed(msg) => write!(f, "initialization failed: {msg}"),
            Self::InvalidHandle(msg) => write!(f, "invalid handle: {msg}"),
            Self::OperationFailed(msg) => write!(f, "operation failed: {msg}"),
        }
    }
}

impl std::error::Error for DialogError {}

#[cfg(target_os = "windows")]
impl From<windows::core::Error> for DialogError {
    fn from(e: windows::core::Error) -> Self {
        Self::OperationFailed(format!("{} (HRESULT {:#010x})", e.message(), e.code().0))
    }
}

pub type Result<T> = std::result::Result<T, DialogError>;
