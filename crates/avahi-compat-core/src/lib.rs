#![deny(unsafe_code)]

//! Avahi-style service discovery and publishing backed by systemd-resolved.
//!
//! Applications written against the Avahi client model (client, service
//! browser, service resolver, record browser, entry group) use the types in
//! this crate unchanged in shape, while the discovery work is done by
//! `systemd-resolved` over its Varlink socket and publishing is done by
//! writing `.dnssd` files and asking the daemon to reload them.
//!
//! ```text
//!                    ┌──────────┐
//!                    │  Client  │  reachability gate only
//!                    └────┬─────┘
//!        attach(&client)  │
//!   ┌──────────────┬──────┴───────┬───────────────┐
//!   ▼              ▼              ▼               ▼
//! ServiceBrowser ServiceResolver RecordBrowser  EntryGroup
//!   │ subscribe     │ one call      │ one call      │ .dnssd files
//!   └──────────────┴───────┬──────┘               │ + reload
//!                          ▼                        ▼
//!                 io.systemd.Resolve        /run/systemd/dnssd
//! ```
//!
//! Every component owns its own transport and emits typed events through
//! per-instance queues obtained with `subscribe()`.

use std::future::Future;
use std::pin::Pin;

/// A type-erased, `Send`-safe, boxed future for object-safe async traits.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// Address types and their textual form.
pub mod address;
/// Persistent service-browse subscription.
pub mod browser;
/// Compile-time build metadata (version, git hash, profile).
pub mod build_info;
/// Connection probe (the client handle).
pub mod client;
/// Error taxonomy shared by all components.
pub mod error;
/// Per-instance event queues.
pub mod events;
/// Entry groups: publishing through declarative `.dnssd` files.
pub mod publish;
/// One-shot raw resource record query.
pub mod record;
/// One-shot asynchronous service resolution.
pub mod resolver;
/// TXT data: immutable string lists and the mutable publishing map.
pub mod txt;
/// Enumerations, flag sets, and result payloads.
pub mod types;
/// Minimal Varlink transport to systemd-resolved.
pub mod varlink;

pub use address::ServiceAddress;
pub use browser::{BrowserEvent, BrowserState, ServiceBrowser};
pub use client::{Client, ClientEvent, ClientState};
pub use error::{Error, ErrorKind};
pub use publish::{
    BusctlReload, EntryGroup, EntryGroupEvent, EntryGroupState, NoReload, ReloadSignal,
    ServiceDefinition, ServiceHandle, ServiceId,
};
pub use record::{RawRecord, RecordBrowser, RecordEvent};
pub use resolver::{ResolverEvent, ServiceResolver};
pub use txt::{TextList, TxtRecord};
pub use types::{
    Interface, LookupFlags, LookupResultFlags, Protocol, PublishFlags, ResolvedService,
    ServiceInstance,
};
