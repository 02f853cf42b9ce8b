//! Error types and native return-code mapping.

use crate::codec;
use crate::session::SessionState;
use std::io;
use thiserror::Error;
use zkeydb_native::{GskBackend, ReturnCode, TextMode, GSK_OK};

/// Result type for session operations.
pub type KdbResult<T> = Result<T, KdbError>;

/// Errors that can occur in session operations.
#[derive(Debug, Error)]
pub enum KdbError {
    /// The native library reported a non-zero return code.
    #[error("native error {code}: {message}")]
    Native {
        /// The native return code.
        code: ReturnCode,
        /// The library's message text, recoded for the caller.
        message: String,
    },

    /// An operation was invoked outside its required lifecycle state.
    #[error("invalid session state: operation requires {required}, session is {actual}")]
    InvalidState {
        /// The state the operation requires.
        required: SessionState,
        /// The state the session is actually in.
        actual: SessionState,
    },

    /// A local file read or write failed, unrelated to the native library.
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// An argument failed validation before reaching the native layer.
    #[error("invalid argument: {message}")]
    InvalidArgument {
        /// Description of the rejected argument.
        message: String,
    },
}

impl KdbError {
    /// Creates an invalid-state error.
    pub(crate) fn invalid_state(required: SessionState, actual: SessionState) -> Self {
        Self::InvalidState { required, actual }
    }

    /// Creates an invalid-argument error.
    pub(crate) fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// The native return code, if this is a native failure.
    #[must_use]
    pub fn native_code(&self) -> Option<ReturnCode> {
        match self {
            Self::Native { code, .. } => Some(*code),
            _ => None,
        }
    }
}

/// Restores the thread text mode when dropped.
///
/// Message lookup must run with the thread in EBCDIC mode; the swap is a
/// paired operation (set, use, restore) and the guard makes the restore
/// unconditional, including on early-error paths.
struct TextModeGuard<'a> {
    backend: &'a dyn GskBackend,
    prior: TextMode,
}

impl<'a> TextModeGuard<'a> {
    fn enter(backend: &'a dyn GskBackend, mode: TextMode) -> Self {
        let prior = backend.swap_text_mode(mode);
        Self { backend, prior }
    }
}

impl Drop for TextModeGuard<'_> {
    fn drop(&mut self) {
        self.backend.swap_text_mode(self.prior);
    }
}

/// Resolves a return code's message text, recoded for the caller.
///
/// Works for any code, including zero and unknown values; the result is
/// never empty.
pub(crate) fn native_message(backend: &dyn GskBackend, code: ReturnCode) -> String {
    let raw = {
        let _mode = TextModeGuard::enter(backend, TextMode::Ebcdic);
        backend.strerror(code)
    };
    codec::to_caller(&raw)
}

/// Maps a non-zero native return code to a structured error.
pub(crate) fn map_native(backend: &dyn GskBackend, code: ReturnCode) -> KdbError {
    debug_assert_ne!(code, GSK_OK, "zero return code is success, not an error");
    KdbError::Native {
        code,
        message: native_message(backend, code),
    }
}
