//! One-shot service resolution.
//!
//! [`ServiceResolver::attach`] returns at once and runs the
//! `ResolveService` call on a spawned task. The task delivers exactly one
//! `Found` or `Failure` event. Dropping the resolver aborts the task and
//! closes its event queue, so a late result is never delivered.

use std::net::{SocketAddr, SocketAddrV4, SocketAddrV6};
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::address::ServiceAddress;
use crate::client::{Client, DEFAULT_DOMAIN};
use crate::error::Error;
use crate::events::{EventReceiver, EventSink};
use crate::txt::TextList;
use crate::types::{
    Interface, LookupFlags, LookupResultFlags, Protocol, ResolvedService, ServiceInstance,
};
use crate::varlink::connection::decode_parameters;
use crate::varlink::{
    METHOD_RESOLVE_SERVICE, ResolveServiceParams, ResolveServiceReply, VarlinkConnection,
    VarlinkError,
};

/// Events emitted by a [`ServiceResolver`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResolverEvent {
    Found(ResolvedService),
    Failure(Error),
}

#[derive(Debug, Clone)]
struct ResolveQuery {
    interface: Interface,
    protocol: Protocol,
    /// Address family wanted in the result; sent to the daemon.
    address_protocol: Protocol,
    name: String,
    service_type: String,
    domain: String,
    flags: LookupFlags,
}

impl ResolveQuery {
    fn params(&self) -> ResolveServiceParams {
        ResolveServiceParams {
            name: self.name.clone(),
            service_type: self.service_type.clone(),
            domain: self.domain.clone(),
            ifindex: self.interface.wire_ifindex(),
            family: self.address_protocol.address_family(),
            flags: self.flags.resolved_bits(),
        }
    }

    fn build(&self, reply: ResolveServiceReply) -> Result<ResolvedService, Error> {
        let candidates: Vec<Candidate<'_>> = reply
            .services
            .iter()
            .flat_map(|record| {
                record.addresses.iter().filter_map(move |a| {
                    Some(Candidate {
                        address: ServiceAddress::from_family_bytes(a.family, &a.address)?,
                        port: record.port,
                        host_name: record.hostname.as_deref(),
                        ifindex: a.ifindex,
                    })
                })
            })
            .collect();

        let (address, port, host_name, interface) =
            match select_address(&candidates, self.address_protocol) {
                Some(c) => (
                    Some(c.address),
                    c.port,
                    c.host_name.unwrap_or_default().to_string(),
                    c.ifindex
                        .map(Interface::from_ifindex)
                        .unwrap_or(self.interface),
                ),
                None if self.flags.contains(LookupFlags::NO_ADDRESS) => {
                    let first = reply.services.first();
                    (
                        None,
                        first.map_or(0, |r| r.port),
                        first
                            .and_then(|r| r.hostname.clone())
                            .unwrap_or_default(),
                        self.interface,
                    )
                }
                None => {
                    return Err(Error::NotFound(format!(
                        "no usable address for '{}'",
                        self.name
                    )));
                }
            };

        let txt = if self.flags.contains(LookupFlags::NO_TXT) {
            TextList::default()
        } else {
            reply.txt.unwrap_or_default().into_iter().collect()
        };

        Ok(ResolvedService {
            interface,
            protocol: address.map_or(self.protocol, |a| a.protocol()),
            name: self.name.clone(),
            service_type: self.service_type.clone(),
            domain: self.domain.clone(),
            host_name,
            address,
            port,
            txt,
            flags: LookupResultFlags::MULTICAST,
        })
    }
}

/// An address offered by the daemon together with its service entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Candidate<'a> {
    address: ServiceAddress,
    port: u16,
    host_name: Option<&'a str>,
    ifindex: Option<i32>,
}

/// The requested family wins when present; otherwise IPv4, then IPv6.
fn select_address<'a, 'b>(
    candidates: &'b [Candidate<'a>],
    requested: Protocol,
) -> Option<&'b Candidate<'a>> {
    let of_family = |p: Protocol| candidates.iter().find(|c| c.address.protocol() == p);
    if requested != Protocol::Unspec
        && let Some(c) = of_family(requested)
    {
        return Some(c);
    }
    of_family(Protocol::Inet).or_else(|| of_family(Protocol::Inet6))
}

/// Resolves one service instance to host, address, port, and TXT data.
pub struct ServiceResolver {
    query: ResolveQuery,
    events: EventSink<ResolverEvent>,
    result: Arc<Mutex<Option<ResolvedService>>>,
    task: Option<JoinHandle<()>>,
}

impl ServiceResolver {
    /// Resolve `name` of `service_type` in the `local` domain.
    pub fn new(name: impl Into<String>, service_type: impl Into<String>) -> Self {
        Self {
            query: ResolveQuery {
                interface: Interface::Unspecified,
                protocol: Protocol::Unspec,
                address_protocol: Protocol::Unspec,
                name: name.into(),
                service_type: service_type.into(),
                domain: DEFAULT_DOMAIN.to_string(),
                flags: LookupFlags::empty(),
            },
            events: EventSink::new(),
            result: Arc::new(Mutex::new(None)),
            task: None,
        }
    }

    /// Resolver for an instance reported by a browser.
    pub fn for_instance(instance: &ServiceInstance) -> Self {
        Self::new(instance.name.clone(), instance.service_type.clone())
            .domain(instance.domain.clone())
            .interface(instance.interface)
            .protocol(instance.protocol)
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.query.domain = domain.into();
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        self.query.interface = interface;
        self
    }

    /// Protocol the service was seen on.
    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.query.protocol = protocol;
        self
    }

    /// Preferred address family of the result.
    pub fn address_protocol(mut self, protocol: Protocol) -> Self {
        self.query.address_protocol = protocol;
        self
    }

    pub fn flags(mut self, flags: LookupFlags) -> Self {
        self.query.flags = flags;
        self
    }

    pub fn subscribe(&self) -> EventReceiver<ResolverEvent> {
        self.events.subscribe()
    }

    /// Start the resolve. The outcome arrives as a [`ResolverEvent`].
    pub fn attach(&mut self, client: &Client) -> Result<(), Error> {
        if self.task.is_some() {
            return Err(Error::BadState("service resolver already attached".into()));
        }
        if self.query.name.is_empty() || self.query.service_type.is_empty() {
            return Err(Error::InvalidArgument(
                "service name and type must not be empty".into(),
            ));
        }
        client.ensure_running()?;

        let config = client.config();
        let job = ResolveJob {
            query: self.query.clone(),
            socket_path: config.resolved.socket_path.clone(),
            connect_timeout: config.resolved.connect_timeout(),
            call_timeout: config.resolved.call_timeout(),
        };
        let events = self.events.clone();
        let result = Arc::clone(&self.result);

        self.task = Some(tokio::spawn(async move {
            match job.run().await {
                Ok(service) => {
                    info!(name = %service.name, port = service.port, "Service resolved");
                    if let Ok(mut slot) = result.lock() {
                        *slot = Some(service.clone());
                    }
                    events.emit(ResolverEvent::Found(service));
                }
                Err(err) => {
                    warn!(name = %job.query.name, error = %err, "Service resolve failed");
                    events.emit(ResolverEvent::Failure(err));
                }
            }
        }));
        Ok(())
    }

    /// The result of a successful resolve, if one arrived.
    pub fn resolved(&self) -> Option<ResolvedService> {
        self.result.lock().ok().and_then(|slot| slot.clone())
    }

    /// Socket address of the resolved service; `None` before a result or
    /// when the result has no address or port.
    pub fn socket_addr(&self) -> Option<SocketAddr> {
        let service = self.resolved()?;
        if service.port == 0 {
            return None;
        }
        Some(match service.address? {
            ServiceAddress::V4(octets) => SocketAddr::V4(SocketAddrV4::new(octets.into(), service.port)),
            ServiceAddress::V6(octets) => SocketAddr::V6(SocketAddrV6::new(
                octets.into(),
                service.port,
                0,
                service.interface.index().unwrap_or(0),
            )),
        })
    }
}

impl Drop for ServiceResolver {
    fn drop(&mut self) {
        self.events.close();
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

struct ResolveJob {
    query: ResolveQuery,
    socket_path: PathBuf,
    connect_timeout: Duration,
    call_timeout: Duration,
}

impl ResolveJob {
    async fn run(&self) -> Result<ResolvedService, Error> {
        let mut conn = VarlinkConnection::connect(&self.socket_path, self.connect_timeout)
            .await
            .map_err(|e| Error::NoDaemon {
                path: self.socket_path.clone(),
                reason: e.to_string(),
            })?;

        debug!(name = %self.query.name, service_type = %self.query.service_type, "Resolving service");
        let params = self.query.params();
        let call = conn.call(METHOD_RESOLVE_SERVICE, &params);
        let parameters = match tokio::time::timeout(self.call_timeout, call).await {
            Ok(Ok(parameters)) => parameters,
            Ok(Err(VarlinkError::Remote { error, .. })) => {
                return Err(Error::NotFound(format!("'{}': {error}", self.query.name)));
            }
            Ok(Err(e)) => return Err(Error::Failure(e.to_string())),
            Err(_) => {
                return Err(Error::Failure(
                    VarlinkError::CallTimeout(self.call_timeout).to_string(),
                ));
            }
        };

        let reply: ResolveServiceReply =
            decode_parameters(parameters).map_err(|e| Error::Failure(e.to_string()))?;
        self.query.build(reply)
    }
}
