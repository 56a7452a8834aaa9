//! Persistent service-browse subscription.
//!
//! A [`ServiceBrowser`] keeps a `BrowseServices` subscription open against
//! the resolver daemon and turns each notification batch into `New` and
//! `Remove` events for entries of its service type.
//!
//! ## Lifecycle
//!
//! ```text
//! Idle ──attach──▶ Subscribing ──▶ Active ◀──▶ Reconnecting
//!                                     │              │
//!                                     └──▶ Closed ◀──┘
//! ```
//!
//! `attach` waits for the first batch for at most `browse.initial_wait_ms`,
//! polling in `browse.poll_slice_ms` slices, and then always emits
//! `AllForNow`. After that a background task owns the connection. When the
//! daemon ends the subscription because it went idle (`io.systemd.TimedOut`),
//! because it disconnected in an orderly way (`io.systemd.Disconnected`), or
//! with a final non-continuing reply, the task re-opens it with the same
//! filter without telling the caller. Every other error is terminal and is
//! reported once as `Failure`.
//!
//! Entries redelivered by the daemon after a re-subscription are reported
//! again; no de-duplication is done here.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, trace, warn};

use crate::client::{Client, DEFAULT_DOMAIN};
use crate::error::Error;
use crate::events::{EventReceiver, EventSink};
use crate::types::{Interface, LookupFlags, LookupResultFlags, Protocol, ServiceInstance};
use crate::varlink::connection::decode_parameters;
use crate::varlink::{
    BrowseServicesParams, BrowseServicesReply, METHOD_BROWSE_SERVICES, Reply, UpdateFlag,
    VarlinkConnection, VarlinkError, is_recoverable_error,
};

/// Subscription state of a [`ServiceBrowser`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BrowserState {
    Idle,
    Subscribing,
    Active,
    Reconnecting,
    Closed,
}

/// Events emitted by a [`ServiceBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BrowserEvent {
    New(ServiceInstance),
    Remove(ServiceInstance),
    /// The initial snapshot arrived during the bounded wait.
    CacheExhausted,
    /// The bounded initial wait ended. Not a completeness guarantee.
    AllForNow,
    Failure(Error),
}

#[derive(Debug, Clone)]
struct BrowseQuery {
    interface: Interface,
    protocol: Protocol,
    service_type: String,
    domain: String,
    flags: LookupFlags,
}

impl BrowseQuery {
    fn params(&self) -> BrowseServicesParams {
        BrowseServicesParams {
            domain: self.domain.clone(),
            service_type: self.service_type.clone(),
            ifindex: self.interface.wire_ifindex(),
            flags: self.flags.resolved_bits(),
        }
    }

    /// Entries without a type are taken to belong to the subscription.
    fn matches(&self, entry_type: Option<&str>) -> bool {
        entry_type.is_none_or(|t| normalize_type(t) == normalize_type(&self.service_type))
    }
}

fn normalize_type(service_type: &str) -> String {
    service_type
        .trim()
        .trim_end_matches('.')
        .to_ascii_lowercase()
}

/// Browses for service instances of one type.
pub struct ServiceBrowser {
    query: BrowseQuery,
    events: EventSink<BrowserEvent>,
    state: Arc<watch::Sender<BrowserState>>,
    task: Option<JoinHandle<()>>,
}

impl ServiceBrowser {
    /// Browse `service_type` (e.g. `_http._tcp`) in the `local` domain on
    /// every interface and protocol.
    pub fn new(service_type: impl Into<String>) -> Self {
        let (state, _) = watch::channel(BrowserState::Idle);
        Self {
            query: BrowseQuery {
                interface: Interface::Unspecified,
                protocol: Protocol::Unspec,
                service_type: service_type.into(),
                domain: DEFAULT_DOMAIN.to_string(),
                flags: LookupFlags::empty(),
            },
            events: EventSink::new(),
            state: Arc::new(state),
            task: None,
        }
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        self.query.interface = interface;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.query.protocol = protocol;
        self
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.query.domain = domain.into();
        self
    }

    pub fn flags(mut self, flags: LookupFlags) -> Self {
        self.query.flags = flags;
        self
    }

    pub fn service_type(&self) -> &str {
        &self.query.service_type
    }

    pub fn subscribe(&self) -> EventReceiver<BrowserEvent> {
        self.events.subscribe()
    }

    pub fn state(&self) -> BrowserState {
        *self.state.borrow()
    }

    /// Receiver that observes every state change.
    pub fn watch_state(&self) -> watch::Receiver<BrowserState> {
        self.state.subscribe()
    }

    /// Open the subscription and wait (bounded) for the initial snapshot.
    ///
    /// Fails with `NoDaemon` when the subscription cannot be opened. Later
    /// failures arrive as [`BrowserEvent::Failure`].
    pub async fn attach(&mut self, client: &Client) -> Result<(), Error> {
        if self.state() != BrowserState::Idle {
            return Err(Error::BadState("service browser already attached".into()));
        }
        if self.query.service_type.trim().is_empty() {
            return Err(Error::InvalidArgument("service type must not be empty".into()));
        }
        client.ensure_running()?;

        let config = client.config();
        let subscription = Subscription {
            query: self.query.clone(),
            socket_path: config.resolved.socket_path.clone(),
            connect_timeout: config.resolved.connect_timeout(),
            resubscribe_delay: config.browse.resubscribe_delay(),
            events: self.events.clone(),
            state: Arc::clone(&self.state),
        };

        subscription.set_state(BrowserState::Subscribing);
        let mut conn = match subscription.open().await {
            Ok(conn) => conn,
            Err(e) => {
                subscription.set_state(BrowserState::Closed);
                return Err(open_error(&subscription.socket_path, e));
            }
        };
        info!(
            service_type = %self.query.service_type,
            domain = %self.query.domain,
            "Browse subscription opened"
        );

        let deadline = Instant::now() + config.browse.initial_wait();
        let slice = config.browse.poll_slice();
        let mut snapshot = false;
        let mut pending = None;

        while !snapshot {
            let now = Instant::now();
            if now >= deadline {
                break;
            }
            let Ok(result) = tokio::time::timeout(slice.min(deadline - now), conn.next_reply()).await
            else {
                continue;
            };
            match classify(result) {
                Notification::Batch { batch, last } => {
                    subscription.dispatch(batch);
                    snapshot = true;
                    if last {
                        pending = Some(Notification::Expired("final reply".into()));
                    }
                }
                other => pending = Some(other),
            }
            if pending.is_some() {
                break;
            }
        }

        if let Some(Notification::Fatal(err)) = pending {
            subscription.fail(err);
            return Ok(());
        }

        if snapshot {
            self.events.emit(BrowserEvent::CacheExhausted);
        } else {
            debug!(service_type = %self.query.service_type, "No browse batch within initial wait");
        }
        self.events.emit(BrowserEvent::AllForNow);

        subscription.set_state(BrowserState::Active);
        self.task = Some(tokio::spawn(subscription.run(conn, pending)));
        Ok(())
    }
}

impl Drop for ServiceBrowser {
    fn drop(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.state.send_replace(BrowserState::Closed);
    }
}

fn open_error(path: &std::path::Path, err: VarlinkError) -> Error {
    if err.is_connect() {
        Error::NoDaemon {
            path: path.to_path_buf(),
            reason: err.to_string(),
        }
    } else {
        Error::Failure(format!("failed to subscribe: {err}"))
    }
}

// ── Subscription worker ───────────────────────────────────────────────

enum Notification {
    Batch {
        batch: BrowseServicesReply,
        last: bool,
    },
    Expired(String),
    Fatal(Error),
}

fn classify(result: Result<Option<Reply>, VarlinkError>) -> Notification {
    match result {
        Ok(None) => Notification::Fatal(Error::Disconnected(
            "resolver daemon closed the browse connection".into(),
        )),
        Ok(Some(Reply {
            error: Some(id), ..
        })) => {
            if is_recoverable_error(&id) {
                Notification::Expired(id)
            } else {
                Notification::Fatal(Error::Failure(format!("browse failed: {id}")))
            }
        }
        Ok(Some(reply)) => {
            let last = !reply.continues;
            match decode_parameters::<BrowseServicesReply>(reply.parameters) {
                Ok(batch) => Notification::Batch { batch, last },
                Err(e) => Notification::Fatal(Error::Failure(e.to_string())),
            }
        }
        Err(VarlinkError::Io(e)) => Notification::Fatal(Error::Disconnected(e.to_string())),
        Err(e) => Notification::Fatal(Error::Failure(e.to_string())),
    }
}

struct Subscription {
    query: BrowseQuery,
    socket_path: PathBuf,
    connect_timeout: Duration,
    resubscribe_delay: Duration,
    events: EventSink<BrowserEvent>,
    state: Arc<watch::Sender<BrowserState>>,
}

impl Subscription {
    async fn open(&self) -> Result<VarlinkConnection, VarlinkError> {
        let mut conn = VarlinkConnection::connect(&self.socket_path, self.connect_timeout).await?;
        conn.subscribe(METHOD_BROWSE_SERVICES, &self.query.params())
            .await?;
        Ok(conn)
    }

    fn set_state(&self, state: BrowserState) {
        let previous = self.state.send_replace(state);
        if previous != state {
            debug!(from = ?previous, to = ?state, "Browser state change");
        }
    }

    fn dispatch(&self, batch: BrowseServicesReply) {
        for entry in batch.entries {
            let wrap = match entry.update_flag {
                UpdateFlag::Added => BrowserEvent::New,
                UpdateFlag::Removed => BrowserEvent::Remove,
                UpdateFlag::Unknown => {
                    debug!(name = ?entry.name, "Ignoring browse entry with unknown update flag");
                    continue;
                }
            };
            if !self.query.matches(entry.service_type.as_deref()) {
                trace!(entry_type = ?entry.service_type, "Dropping entry of another type");
                continue;
            }

            let protocol = entry
                .family
                .and_then(Protocol::from_address_family)
                .filter(|p| *p != Protocol::Unspec)
                .unwrap_or(self.query.protocol);
            let instance = ServiceInstance {
                interface: entry
                    .ifindex
                    .map(Interface::from_ifindex)
                    .unwrap_or(self.query.interface),
                protocol,
                name: entry.name.unwrap_or_default(),
                service_type: entry
                    .service_type
                    .unwrap_or_else(|| self.query.service_type.clone()),
                domain: entry.domain.unwrap_or_else(|| self.query.domain.clone()),
                flags: LookupResultFlags::MULTICAST,
            };
            self.events.emit(wrap(instance));
        }
    }

    fn fail(&self, err: Error) {
        warn!(service_type = %self.query.service_type, error = %err, "Browse subscription failed");
        self.events.emit(BrowserEvent::Failure(err));
        self.set_state(BrowserState::Closed);
    }

    async fn run(self, mut conn: VarlinkConnection, mut pending: Option<Notification>) {
        loop {
            let notification = match pending.take() {
                Some(n) => n,
                None => classify(conn.next_reply().await),
            };
            match notification {
                Notification::Batch { batch, last } => {
                    self.dispatch(batch);
                    if last {
                        match self.resubscribe(conn, "final reply").await {
                            Some(next) => conn = next,
                            None => return,
                        }
                    }
                }
                Notification::Expired(reason) => match self.resubscribe(conn, &reason).await {
                    Some(next) => conn = next,
                    None => return,
                },
                Notification::Fatal(err) => {
                    self.fail(err);
                    return;
                }
            }
        }
    }

    /// Tear down `old` and open a new subscription with the same filter.
    async fn resubscribe(
        &self,
        old: VarlinkConnection,
        reason: &str,
    ) -> Option<VarlinkConnection> {
        drop(old);
        info!(
            service_type = %self.query.service_type,
            reason,
            "Browse subscription ended, re-subscribing"
        );
        self.set_state(BrowserState::Reconnecting);
        tokio::time::sleep(self.resubscribe_delay).await;

        match self.open().await {
            Ok(conn) => {
                self.set_state(BrowserState::Active);
                Some(conn)
            }
            Err(e) => {
                self.fail(open_error(&self.socket_path, e));
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use avahi_compat_test_utils::{FakeFrame, FakeResolved, TestConfigBuilder};
    use pretty_assertions::assert_eq;
    use serde_json::{Value, json};

    async fn running_client(server: &FakeResolved) -> Client {
        let config = TestConfigBuilder::new()
            .socket_path(server.socket_path())
            .fast_browse()
            .build();
        let mut client = Client::new(config);
        client.start().await.unwrap();
        client
    }

    fn batch(entries: &[(&str, &str, &str)]) -> Value {
        let data: Vec<Value> = entries
            .iter()
            .map(|(flag, name, ty)| {
                json!({"updateFlag": flag, "name": name, "type": ty, "domain": "local", "ifindex": 2})
            })
            .collect();
        json!({ "browserServiceData": data })
    }

    fn instance(name: &str) -> ServiceInstance {
        ServiceInstance {
            interface: Interface::Index(2),
            protocol: Protocol::Unspec,
            name: name.to_string(),
            service_type: "_http._tcp".to_string(),
            domain: "local".to_string(),
            flags: LookupResultFlags::MULTICAST,
        }
    }

    async fn next_event(rx: &mut EventReceiver<BrowserEvent>) -> Option<BrowserEvent> {
        tokio::time::timeout(Duration::from_secs(3), rx.recv())
            .await
            .ok()
            .flatten()
    }

    fn drain(rx: &mut EventReceiver<BrowserEvent>) -> Vec<BrowserEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    #[test_log::test(tokio::test)]
    async fn test_initial_batch_then_all_for_now() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![FakeFrame::Reply(batch(&[
                ("added", "Web A", "_http._tcp"),
                ("removed", "Web B", "_http._tcp"),
            ]))],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                BrowserEvent::New(instance("Web A")),
                BrowserEvent::Remove(instance("Web B")),
                BrowserEvent::CacheExhausted,
                BrowserEvent::AllForNow,
            ]
        );
        assert_eq!(browser.state(), BrowserState::Active);
        assert_eq!(
            server.requests(METHOD_BROWSE_SERVICES),
            vec![json!({"domain": "local", "type": "_http._tcp", "ifindex": 0, "flags": 0})]
        );
    }

    #[tokio::test]
    async fn test_entries_of_other_types_are_dropped() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![FakeFrame::Reply(batch(&[
                ("added", "Printer", "_ipp._tcp"),
                ("added", "Web A", "_HTTP._tcp."),
                ("removed", "Scanner", "_scanner._tcp"),
            ]))],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();

        let events = drain(&mut rx);
        let news: Vec<&BrowserEvent> = events
            .iter()
            .filter(|e| matches!(e, BrowserEvent::New(_) | BrowserEvent::Remove(_)))
            .collect();
        assert_eq!(news.len(), 1);
        match news[0] {
            BrowserEvent::New(svc) => assert_eq!(svc.name, "Web A"),
            other => panic!("unexpected event {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_bounded_wait_without_batch() {
        let server = FakeResolved::start().await;
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        let started = std::time::Instant::now();
        browser.attach(&client).await.unwrap();

        assert!(started.elapsed() >= Duration::from_millis(250));
        assert_eq!(drain(&mut rx), vec![BrowserEvent::AllForNow]);
        assert_eq!(browser.state(), BrowserState::Active);
    }

    #[test_log::test(tokio::test)]
    async fn test_expired_subscription_is_reopened_silently() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Reply(batch(&[("added", "Web A", "_http._tcp")])),
                FakeFrame::Error("io.systemd.TimedOut".into()),
            ],
        );
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![FakeFrame::Reply(batch(&[("added", "Web B", "_http._tcp")]))],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();

        let mut events = Vec::new();
        for _ in 0..4 {
            events.push(next_event(&mut rx).await.expect("event"));
        }
        assert_eq!(
            events,
            vec![
                BrowserEvent::New(instance("Web A")),
                BrowserEvent::CacheExhausted,
                BrowserEvent::AllForNow,
                BrowserEvent::New(instance("Web B")),
            ]
        );
        assert!(drain(&mut rx).is_empty());
        assert_eq!(browser.state(), BrowserState::Active);

        let requests = server.requests(METHOD_BROWSE_SERVICES);
        assert_eq!(requests.len(), 2);
        assert_eq!(requests[0], requests[1]);
    }

    #[tokio::test]
    async fn test_final_reply_triggers_resubscribe() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![FakeFrame::Last(batch(&[("added", "Web A", "_http._tcp")]))],
        );
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Error("io.systemd.Disconnected".into()),
            ],
        );
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![FakeFrame::Reply(batch(&[("removed", "Web A", "_http._tcp")]))],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();

        let mut last = None;
        for _ in 0..4 {
            last = next_event(&mut rx).await;
        }
        assert_eq!(last, Some(BrowserEvent::Remove(instance("Web A"))));
        assert_eq!(server.requests(METHOD_BROWSE_SERVICES).len(), 3);
    }

    #[tokio::test]
    async fn test_hangup_is_terminal() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Reply(batch(&[("added", "Web A", "_http._tcp")])),
                FakeFrame::Pause(Duration::from_millis(50)),
                FakeFrame::Hangup,
            ],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        let mut state = browser.watch_state();
        browser.attach(&client).await.unwrap();

        let mut failure = None;
        while let Some(ev) = next_event(&mut rx).await {
            if let BrowserEvent::Failure(err) = ev {
                failure = Some(err);
                break;
            }
        }
        assert_eq!(failure.map(|e| e.kind()), Some(ErrorKind::Disconnected));

        state
            .wait_for(|s| *s == BrowserState::Closed)
            .await
            .unwrap();
        assert_eq!(server.requests(METHOD_BROWSE_SERVICES).len(), 1);
    }

    #[tokio::test]
    async fn test_unrecoverable_error_is_terminal() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Reply(batch(&[])),
                FakeFrame::Error("io.systemd.System".into()),
            ],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();

        assert_eq!(next_event(&mut rx).await, Some(BrowserEvent::CacheExhausted));
        assert_eq!(next_event(&mut rx).await, Some(BrowserEvent::AllForNow));
        match next_event(&mut rx).await {
            Some(BrowserEvent::Failure(err)) => assert_eq!(err.kind(), ErrorKind::Failure),
            other => panic!("expected failure, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_failed_resubscribe_is_reported() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Reply(batch(&[("added", "Web A", "_http._tcp")])),
                FakeFrame::Pause(Duration::from_millis(100)),
                FakeFrame::Error("io.systemd.TimedOut".into()),
            ],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();
        server.shutdown();

        let mut failure = None;
        while let Some(ev) = next_event(&mut rx).await {
            if let BrowserEvent::Failure(err) = ev {
                failure = Some(err);
                break;
            }
        }
        assert_eq!(failure.map(|e| e.kind()), Some(ErrorKind::NoDaemon));
    }

    #[tokio::test]
    async fn test_drop_stops_event_delivery() {
        let server = FakeResolved::start().await;
        server.script(
            METHOD_BROWSE_SERVICES,
            vec![
                FakeFrame::Reply(batch(&[("added", "Web A", "_http._tcp")])),
                FakeFrame::Pause(Duration::from_millis(100)),
                FakeFrame::Reply(batch(&[("added", "Web B", "_http._tcp")])),
            ],
        );
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        let mut rx = browser.subscribe();
        browser.attach(&client).await.unwrap();
        drop(browser);

        let mut seen = Vec::new();
        while let Some(ev) = next_event(&mut rx).await {
            seen.push(ev);
        }
        assert_eq!(seen.len(), 3);
        assert!(!seen.contains(&BrowserEvent::New(instance("Web B"))));
    }

    #[tokio::test]
    async fn test_attach_requires_running_client() {
        let server = FakeResolved::start().await;
        let client = Client::new(
            TestConfigBuilder::new()
                .socket_path(server.socket_path())
                .build(),
        );
        let mut browser = ServiceBrowser::new("_http._tcp");
        let err = browser.attach(&client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadState);
        assert_eq!(browser.state(), BrowserState::Idle);
    }

    #[tokio::test]
    async fn test_attach_twice_is_rejected() {
        let server = FakeResolved::start().await;
        server.script(METHOD_BROWSE_SERVICES, vec![FakeFrame::Reply(batch(&[]))]);
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_http._tcp");
        browser.attach(&client).await.unwrap();
        let err = browser.attach(&client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::BadState);
    }

    #[tokio::test]
    async fn test_attach_without_daemon_fails_no_daemon() {
        let server = FakeResolved::start().await;
        let client = running_client(&server).await;
        server.shutdown();

        let mut browser = ServiceBrowser::new("_http._tcp");
        let err = browser.attach(&client).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoDaemon);
        assert_eq!(browser.state(), BrowserState::Closed);
    }

    #[tokio::test]
    async fn test_filter_parameters_on_the_wire() {
        let server = FakeResolved::start().await;
        server.script(METHOD_BROWSE_SERVICES, vec![FakeFrame::Reply(batch(&[]))]);
        let client = running_client(&server).await;

        let mut browser = ServiceBrowser::new("_ssh._tcp")
            .interface(Interface::Index(3))
            .protocol(Protocol::Inet6)
            .domain("example.org")
            .flags(LookupFlags::USE_MULTICAST);
        browser.attach(&client).await.unwrap();

        assert_eq!(
            server.requests(METHOD_BROWSE_SERVICES),
            vec![json!({
                "domain": "example.org",
                "type": "_ssh._tcp",
                "ifindex": 3,
                "flags": (1 << 3) | (1 << 4),
            })]
        );
    }

    #[test]
    fn test_type_normalization() {
        assert_eq!(normalize_type(" _HTTP._tcp. "), "_http._tcp");
        let browser = ServiceBrowser::new("_http._tcp");
        let query = &browser.query;
        assert!(query.matches(None));
        assert!(query.matches(Some("_http._tcp")));
        assert!(!query.matches(Some("_https._tcp")));
    }
}
