//! Configuration builders for tests.
//!
//! Use [`TestConfigBuilder`] to create customised [`AppConfig`] values without
//! repeating boilerplate across crate boundaries.

use std::path::Path;

use avahi_compat_config::{AppConfig, ReloadMode};

/// Fluent builder for [`AppConfig`] in tests.
///
/// Starts from the defaults with reloading disabled, so tests never shell
/// out to `busctl`.
///
/// # Example
///
/// ```ignore
/// let server = FakeResolved::start().await;
/// let config = TestConfigBuilder::new()
///     .socket_path(server.socket_path())
///     .fast_browse()
///     .build();
/// ```
pub struct TestConfigBuilder {
    config: AppConfig,
}

impl TestConfigBuilder {
    pub fn new() -> Self {
        let mut config = AppConfig::default();
        config.publish.reload = ReloadMode::None;
        Self { config }
    }

    pub fn socket_path(mut self, path: &Path) -> Self {
        self.config.resolved.socket_path = path.to_path_buf();
        self
    }

    pub fn dnssd_dir(mut self, dir: &Path) -> Self {
        self.config.publish.dnssd_dir = dir.to_path_buf();
        self
    }

    pub fn reload(mut self, mode: ReloadMode) -> Self {
        self.config.publish.reload = mode;
        self
    }

    pub fn busctl_path(mut self, path: &Path) -> Self {
        self.config.publish.busctl_path = path.to_path_buf();
        self
    }

    pub fn call_timeout_ms(mut self, ms: u64) -> Self {
        self.config.resolved.call_timeout_ms = ms;
        self
    }

    pub fn initial_wait_ms(mut self, ms: u64) -> Self {
        self.config.browse.initial_wait_ms = ms;
        self
    }

    pub fn poll_slice_ms(mut self, ms: u64) -> Self {
        self.config.browse.poll_slice_ms = ms;
        self
    }

    pub fn resubscribe_delay_ms(mut self, ms: u64) -> Self {
        self.config.browse.resubscribe_delay_ms = ms;
        self
    }

    /// Short browse timings so bounded waits do not slow the suite down.
    pub fn fast_browse(self) -> Self {
        self.initial_wait_ms(300)
            .poll_slice_ms(20)
            .resubscribe_delay_ms(10)
    }

    pub fn log_level(mut self, level: &str) -> Self {
        self.config.logging.level = level.to_string();
        self
    }

    pub fn build(self) -> AppConfig {
        self.config
    }
}

impl Default for TestConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}
