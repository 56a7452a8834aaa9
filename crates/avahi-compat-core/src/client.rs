//! The client handle: probes whether the resolver daemon is reachable.
//!
//! A [`Client`] owns no subscriptions. Browsers, resolvers, record queries,
//! and entry groups borrow it at `attach` time to check reachability and to
//! read the configuration, then open their own connections.

use std::path::Path;

use avahi_compat_config::AppConfig;
use tracing::{debug, info, warn};

use crate::build_info;
use crate::error::{Error, ErrorKind};
use crate::events::{EventReceiver, EventSink};
use crate::varlink::VarlinkConnection;

/// Domain every browse, resolve, and publish defaults to.
pub const DEFAULT_DOMAIN: &str = "local";

/// Reachability state of a [`Client`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ClientState {
    NotStarted,
    Registering,
    Running,
    Collision,
    Failure,
    Connecting,
}

impl ClientState {
    /// Legacy numeric code.
    pub fn code(self) -> i32 {
        match self {
            ClientState::NotStarted => -1,
            ClientState::Registering => 0,
            ClientState::Running => 1,
            ClientState::Collision => 2,
            ClientState::Failure => 100,
            ClientState::Connecting => 101,
        }
    }
}

impl std::fmt::Display for ClientState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            ClientState::NotStarted => "not-started",
            ClientState::Registering => "registering",
            ClientState::Running => "running",
            ClientState::Collision => "collision",
            ClientState::Failure => "failure",
            ClientState::Connecting => "connecting",
        })
    }
}

/// Events emitted by a [`Client`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    StateChanged(ClientState),
}

/// Connection probe for the resolver daemon.
pub struct Client {
    config: AppConfig,
    state: ClientState,
    events: EventSink<ClientEvent>,
}

impl Client {
    pub fn new(config: AppConfig) -> Self {
        Self {
            config,
            state: ClientState::NotStarted,
            events: EventSink::new(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver<ClientEvent> {
        self.events.subscribe()
    }

    /// Check that the resolver socket accepts connections.
    ///
    /// Emits `Connecting` and then `Running` or `Failure` before returning.
    /// Allowed from `NotStarted` and `Failure`.
    pub async fn start(&mut self) -> Result<(), Error> {
        match self.state {
            ClientState::NotStarted | ClientState::Failure => {}
            other => {
                return Err(Error::BadState(format!(
                    "client cannot be started while {other}"
                )));
            }
        }

        self.set_state(ClientState::Connecting);

        let path = self.config.resolved.socket_path.clone();
        let timeout = self.config.resolved.connect_timeout();
        match VarlinkConnection::connect(&path, timeout).await {
            Ok(_probe) => {
                info!(path = %path.display(), "Resolver daemon reachable");
                self.set_state(ClientState::Running);
                Ok(())
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "Resolver daemon not reachable");
                self.set_state(ClientState::Failure);
                Err(Error::NoDaemon {
                    path,
                    reason: e.to_string(),
                })
            }
        }
    }

    fn set_state(&mut self, state: ClientState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Client state change");
        self.state = state;
        self.events.emit(ClientEvent::StateChanged(state));
    }

    pub fn state(&self) -> ClientState {
        self.state
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn socket_path(&self) -> &Path {
        &self.config.resolved.socket_path
    }

    /// Gate used by every component's `attach`.
    pub(crate) fn ensure_running(&self) -> Result<(), Error> {
        match self.state {
            ClientState::Running | ClientState::Registering => Ok(()),
            ClientState::Failure => Err(Error::NoDaemon {
                path: self.config.resolved.socket_path.clone(),
                reason: "client start failed".to_string(),
            }),
            other => Err(Error::BadState(format!("client is {other}, not running"))),
        }
    }

    /// Error kind implied by the current state.
    pub fn error_kind(&self) -> ErrorKind {
        match self.state {
            ClientState::Running | ClientState::Registering => ErrorKind::Ok,
            ClientState::Failure => ErrorKind::Failure,
            ClientState::Collision => ErrorKind::Collision,
            ClientState::NotStarted | ClientState::Connecting => ErrorKind::BadState,
        }
    }

    /// Local host name, `localhost` when it cannot be read.
    pub fn host_name(&self) -> String {
        hostname::get()
            .ok()
            .map(|h| h.to_string_lossy().into_owned())
            .filter(|h| !h.is_empty())
            .unwrap_or_else(|| "localhost".to_string())
    }

    /// `<host>.local`
    pub fn host_name_fqdn(&self) -> String {
        format!("{}.{DEFAULT_DOMAIN}", self.host_name())
    }

    pub fn domain_name(&self) -> &'static str {
        DEFAULT_DOMAIN
    }

    pub fn version_string(&self) -> String {
        build_info::version_string()
    }
}

impl Drop for Client {
    fn drop(&mut self) {
        self.events.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use avahi_compat_test_utils::{FakeResolved, TestConfigBuilder};
    use pretty_assertions::assert_eq;

    fn drain(rx: &mut EventReceiver<ClientEvent>) -> Vec<ClientEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[tokio::test]
    async fn test_start_against_running_daemon() {
        let server = FakeResolved::start().await;
        let config = TestConfigBuilder::new()
            .socket_path(server.socket_path())
            .build();
        let mut client = Client::new(config);
        let mut rx = client.subscribe();

        assert_eq!(client.state(), ClientState::NotStarted);
        client.start().await.unwrap();
        assert_eq!(client.state(), ClientState::Running);
        assert_eq!(client.error_kind(), ErrorKind::Ok);
        assert_eq!(
            drain(&mut rx),
            vec![
                ClientEvent::StateChanged(ClientState::Connecting),
                ClientEvent::StateChanged(ClientState::Running),
            ]
        );
    }

    #[tokio::test]
    async fn test_start_without_daemon_never_reports_running() {
        let tmp = tempfile::TempDir::new().unwrap();
        let config = TestConfigBuilder::new()
            .socket_path(&tmp.path().join("missing.sock"))
            .build();
        let mut client = Client::new(config);
        let mut rx = client.subscribe();

        let err = client.start().await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDaemon);
        assert_eq!(client.state(), ClientState::Failure);

        let events = drain(&mut rx);
        assert_eq!(
            events,
            vec![
                ClientEvent::StateChanged(ClientState::Connecting),
                ClientEvent::StateChanged(ClientState::Failure),
            ]
        );
        assert!(!events.contains(&ClientEvent::StateChanged(ClientState::Running)));
    }

    #[tokio::test]
    async fn test_restart_after_failure() {
        let server = FakeResolved::start().await;
        let config = TestConfigBuilder::new()
            .socket_path(server.socket_path())
            .build();
        let mut client = Client::new(config);

        server.shutdown();
        assert!(client.start().await.is_err());

        let revived = FakeResolved::start().await;
        client.config.resolved.socket_path = revived.socket_path().to_path_buf();
        client.start().await.unwrap();
        assert_eq!(client.state(), ClientState::Running);

        let again = client.start().await.unwrap_err();
        assert_eq!(again.kind(), ErrorKind::BadState);
    }

    #[tokio::test]
    async fn test_attach_gate() {
        let client = Client::new(TestConfigBuilder::new().build());
        assert_eq!(
            client.ensure_running().unwrap_err().kind(),
            ErrorKind::BadState
        );
    }

    #[test]
    fn test_host_name_accessors() {
        let client = Client::new(AppConfig::default());
        let host = client.host_name();
        assert!(!host.is_empty());
        assert_eq!(client.host_name_fqdn(), format!("{host}.local"));
        assert_eq!(client.domain_name(), "local");
        assert!(client.version_string().starts_with("avahi-compat "));
    }

    #[test]
    fn test_state_codes() {
        assert_eq!(ClientState::NotStarted.code(), -1);
        assert_eq!(ClientState::Running.code(), 1);
        assert_eq!(ClientState::Connecting.code(), 101);
    }
}
