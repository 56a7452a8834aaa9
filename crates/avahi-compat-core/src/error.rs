//! Error taxonomy shared by every component.
//!
//! Failures are reported exactly once, either as the `Err` of the call that
//! caused them or inside a component's failure event. [`Error`] is `Clone`
//! so it can travel inside event payloads; transport errors are mapped onto
//! it at each component boundary.

use std::path::PathBuf;

/// Errors surfaced by clients, browsers, resolvers, and entry groups.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Error {
    #[error("resolver daemon is not reachable at {path}: {reason}")]
    NoDaemon { path: PathBuf, reason: String },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("not supported: {0}")]
    NotSupported(String),

    #[error("disconnected from resolver daemon: {0}")]
    Disconnected(String),

    #[error("operation failed: {0}")]
    Failure(String),

    #[error("local name collision")]
    Collision,

    #[error("bad state: {0}")]
    BadState(String),

    #[error("invalid argument: {0}")]
    InvalidArgument(String),
}

impl Error {
    /// The discriminant of this error without its payload.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::NoDaemon { .. } => ErrorKind::NoDaemon,
            Error::NotFound(_) => ErrorKind::NotFound,
            Error::NotSupported(_) => ErrorKind::NotSupported,
            Error::Disconnected(_) => ErrorKind::Disconnected,
            Error::Failure(_) => ErrorKind::Failure,
            Error::Collision => ErrorKind::Collision,
            Error::BadState(_) => ErrorKind::BadState,
            Error::InvalidArgument(_) => ErrorKind::InvalidArgument,
        }
    }
}

/// Payload-free error discriminant with the legacy numeric codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Ok,
    NoDaemon,
    NotFound,
    NotSupported,
    Disconnected,
    Failure,
    Collision,
    BadState,
    InvalidArgument,
}

impl ErrorKind {
    /// Legacy numeric error code (`0` for success, negative otherwise).
    pub fn code(self) -> i32 {
        match self {
            ErrorKind::Ok => 0,
            ErrorKind::NoDaemon => -1,
            ErrorKind::NotFound => -2,
            ErrorKind::NotSupported => -3,
            ErrorKind::Disconnected => -4,
            ErrorKind::Failure => -5,
            ErrorKind::Collision => -6,
            ErrorKind::BadState => -7,
            ErrorKind::InvalidArgument => -8,
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            ErrorKind::Ok => "ok",
            ErrorKind::NoDaemon => "no-daemon",
            ErrorKind::NotFound => "not-found",
            ErrorKind::NotSupported => "not-supported",
            ErrorKind::Disconnected => "disconnected",
            ErrorKind::Failure => "failure",
            ErrorKind::Collision => "collision",
            ErrorKind::BadState => "bad-state",
            ErrorKind::InvalidArgument => "invalid-argument",
        };
        f.write_str(s)
    }
}
