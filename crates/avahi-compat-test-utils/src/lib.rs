#![deny(unsafe_code)]

//! Shared test utilities for the avahi-compat workspace.
//!
//! Provides a scripted stand-in for the resolver daemon, config builders,
//! and tracing helpers so that individual crate tests stay concise and
//! consistent.
//!
//! Add this crate as a `[dev-dependency]` in any workspace member:
//!
//! ```toml
//! [dev-dependencies]
//! avahi-compat-test-utils = { workspace = true }
//! ```

pub mod config;
pub mod fake_resolved;
pub mod tracing_setup;

pub use config::TestConfigBuilder;
pub use fake_resolved::{FakeFrame, FakeResolved};
pub use tracing_setup::init_test_tracing;
