//! Error Types
//!
//! Every fallible operation in the crate returns [`Result`]. Errors raised
//! while a structural primitive is being mounted surface to the caller of
//! `mount`. Errors raised later, inside a watcher callback or when a lazy
//! loader settles, have no synchronous caller; they are routed to the
//! per-thread error handler instead (see [`set_error_handler`]).

use std::cell::RefCell;
use std::fmt::Display;
use std::rc::Rc;
use std::time::Duration;

use thiserror::Error;

/// Errors produced by the composition core.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    /// A reactive operation was invoked before a runtime was configured.
    #[error("no reactive runtime is configured on this thread")]
    RuntimeNotConfigured,

    /// A switch discriminant matched no case and no default was supplied.
    #[error("no branch matches discriminant `{discriminant}` and no default branch was given")]
    UnknownBranch {
        /// Debug rendering of the discriminant.
        discriminant: String,
    },

    /// Two items of the same keyed list produced the same key.
    #[error("duplicate key `{key}` in keyed list")]
    DuplicateKey {
        /// Debug rendering of the key.
        key: String,
    },

    /// A lazy loader resolved with an error.
    #[error("lazy loader failed: {message}")]
    Load {
        /// The loader's error message.
        message: String,
    },

    /// A lazy loader did not settle before its timeout.
    #[error("lazy loader timed out after {after:?}")]
    Timeout {
        /// The configured timeout.
        after: Duration,
    },

    /// The host does not provide a capability the primitive needs.
    #[error("host does not support {capability}")]
    Unsupported {
        /// Name of the missing capability.
        capability: &'static str,
    },
}

impl Error {
    /// Wrap a loader failure.
    pub fn load(err: impl Display) -> Self {
        Self::Load {
            message: err.to_string(),
        }
    }

    /// Whether this error is a lazy loader timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, Error>;

type Handler = Rc<dyn Fn(&Error)>;

thread_local! {
    static ERROR_HANDLER: RefCell<Option<Handler>> = const { RefCell::new(None) };
}

/// Install the handler that receives errors with no synchronous caller.
///
/// Returns the previously installed handler, if any.
pub fn set_error_handler<F>(handler: F) -> Option<Rc<dyn Fn(&Error)>>
where
    F: Fn(&Error) + 'static,
{
    ERROR_HANDLER.with(|slot| slot.borrow_mut().replace(Rc::new(handler)))
}

/// Remove the installed handler, restoring the default (log at error level).
pub fn take_error_handler() -> Option<Rc<dyn Fn(&Error)>> {
    ERROR_HANDLER.with(|slot| slot.borrow_mut().take())
}

/// Deliver an error to the current handler.
pub fn report(error: Error) {
    // Clone the handler out so it may reinstall itself while running.
    let handler = ERROR_HANDLER.with(|slot| slot.borrow().clone());
    match handler {
        Some(handler) => handler(&error),
        None => tracing::error!(%error, "unhandled error in reactive update"),
    }
}
