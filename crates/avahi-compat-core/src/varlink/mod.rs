//! Varlink transport to `systemd-resolved`.
//!
//! Only what the components need: connect, a single call with a single
//! reply, and a subscription (`"more": true`) whose replies are read one by
//! one. Messages are JSON objects terminated by a NUL byte.
//!
//! ```text
//!  client                                       systemd-resolved
//!    │  {"method":..,"parameters":..,"more":true}\0     │
//!    │─────────────────────────────────────────────────▶│
//!    │  {"parameters":..,"continues":true}\0            │
//!    │◀─────────────────────────────────────────────────│
//!    │  {"error":"io.systemd.TimedOut",..}\0            │
//!    │◀─────────────────────────────────────────────────│
//! ```

pub mod connection;
pub mod types;

pub use connection::{Reply, VarlinkConnection, VarlinkError};
pub use types::*;

pub const METHOD_BROWSE_SERVICES: &str = "io.systemd.Resolve.BrowseServices";
pub const METHOD_RESOLVE_SERVICE: &str = "io.systemd.Resolve.ResolveService";
pub const METHOD_RESOLVE_RECORD: &str = "io.systemd.Resolve.ResolveRecord";

/// The daemon ended a subscription because it went idle.
pub const ERROR_TIMED_OUT: &str = "io.systemd.TimedOut";
/// The daemon ended a subscription in an orderly way.
pub const ERROR_DISCONNECTED: &str = "io.systemd.Disconnected";

/// Error ids after which a browse subscription is re-opened transparently.
pub fn is_recoverable_error(error_id: &str) -> bool {
    matches!(error_id, ERROR_TIMED_OUT | ERROR_DISCONNECTED)
}
