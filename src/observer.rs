//! Attachment handles and the callbacks a consumer supplies on attach.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use crate::Error;

static NEXT_HANDLE: AtomicU64 = AtomicU64::new(0);

/// Opaque token identifying one consumer's attachment.
///
/// Handles are unique for the lifetime of the process and are allocated in
/// strictly increasing order.
#[derive(Clone, Copy, Debug, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Handle(u64);

impl Handle {
    pub(crate) fn next() -> Self {
        Handle(NEXT_HANDLE.fetch_add(1, Ordering::Relaxed))
    }

    pub fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Handle({})", self.0)
    }
}

/// Receives the lines of one circular read.
///
/// For a given handle, `on_open` happens-before every `on_next`, and either a
/// single `on_close` or a single `on_error` ends the read. Callbacks run on the
/// service's worker threads while the file's job is locked, so a callback that
/// blocks stalls every consumer of that file.
pub trait Observer: Send + 'static {
    fn on_open(&self, _handle: Handle) {}

    fn on_next(&self, handle: Handle, line: &str);

    fn on_close(&self, _handle: Handle) {}

    /// Only called under [`FailurePolicy::Notify`](crate::FailurePolicy::Notify).
    /// No `on_close` follows.
    fn on_error(&self, _handle: Handle, _error: &Error) {}
}

impl<T: Observer + Sync> Observer for Arc<T> {
    fn on_open(&self, handle: Handle) {
        (**self).on_open(handle)
    }

    fn on_next(&self, handle: Handle, line: &str) {
        (**self).on_next(handle, line)
    }

    fn on_close(&self, handle: Handle) {
        (**self).on_close(handle)
    }

    fn on_error(&self, handle: Handle, error: &Error) {
        (**self).on_error(handle, error)
    }
}
