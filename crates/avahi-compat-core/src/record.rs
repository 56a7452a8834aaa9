//! Raw DNS record queries.

use tracing::{debug, warn};

use crate::client::Client;
use crate::error::Error;
use crate::events::{EventReceiver, EventSink};
use crate::types::{Interface, LookupFlags, Protocol, dns};
use crate::varlink::{
    METHOD_RESOLVE_RECORD, ResolveRecordParams, ResolveRecordReply, VarlinkConnection,
    VarlinkError,
};

/// One record payload returned by a [`RecordBrowser`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawRecord {
    pub interface: Interface,
    pub protocol: Protocol,
    pub name: String,
    pub class: u16,
    pub rr_type: u16,
    pub rdata: Vec<u8>,
}

impl RawRecord {
    pub fn size(&self) -> usize {
        self.rdata.len()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordEvent {
    New(RawRecord),
    AllForNow,
}

/// Looks up all records of one name, class, and type.
///
/// Unlike the service browser this is a single query: `attach` returns once
/// every record has been emitted, followed by `AllForNow`.
pub struct RecordBrowser {
    interface: Interface,
    protocol: Protocol,
    name: String,
    class: u16,
    rr_type: u16,
    flags: LookupFlags,
    events: EventSink<RecordEvent>,
    attached: bool,
}

impl RecordBrowser {
    pub fn new(name: impl Into<String>, rr_type: u16) -> Self {
        Self {
            interface: Interface::Unspecified,
            protocol: Protocol::Unspec,
            name: name.into(),
            class: dns::CLASS_IN,
            rr_type,
            flags: LookupFlags::empty(),
            events: EventSink::new(),
            attached: false,
        }
    }

    pub fn class(mut self, class: u16) -> Self {
        self.class = class;
        self
    }

    pub fn interface(mut self, interface: Interface) -> Self {
        self.interface = interface;
        self
    }

    pub fn protocol(mut self, protocol: Protocol) -> Self {
        self.protocol = protocol;
        self
    }

    pub fn flags(mut self, flags: LookupFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn subscribe(&self) -> EventReceiver<RecordEvent> {
        self.events.subscribe()
    }

    /// Run the query and emit its records.
    ///
    /// Returns the number of records emitted.
    pub async fn attach(&mut self, client: &Client) -> Result<usize, Error> {
        if self.attached {
            return Err(Error::BadState("record browser already attached".into()));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidArgument("record name must not be empty".into()));
        }
        client.ensure_running()?;
        self.attached = true;

        let resolved = &client.config().resolved;
        let mut conn = VarlinkConnection::connect(&resolved.socket_path, resolved.connect_timeout())
            .await
            .map_err(|e| Error::NoDaemon {
                path: resolved.socket_path.clone(),
                reason: e.to_string(),
            })?;

        let params = ResolveRecordParams {
            ifindex: self.interface.wire_ifindex(),
            name: self.name.clone(),
            class: self.class,
            record_type: self.rr_type,
            flags: self.flags.resolved_bits(),
        };
        debug!(name = %self.name, rr_type = self.rr_type, "Querying records");

        let reply = tokio::time::timeout(
            resolved.call_timeout(),
            conn.call(METHOD_RESOLVE_RECORD, &params),
        )
        .await
        .map_err(|_| Error::Failure(VarlinkError::CallTimeout(resolved.call_timeout()).to_string()))?
        .and_then(crate::varlink::connection::decode_parameters::<ResolveRecordReply>)
        .map_err(|e| match e {
            VarlinkError::Remote { error, .. } => {
                Error::NotFound(format!("'{}': {error}", self.name))
            }
            other => {
                warn!(name = %self.name, error = %other, "Record query failed");
                Error::Failure(other.to_string())
            }
        })?;

        let count = reply.rrs.len();
        for rr in reply.rrs {
            self.events.emit(RecordEvent::New(RawRecord {
                interface: rr
                    .ifindex
                    .map(Interface::from_ifindex)
                    .unwrap_or(self.interface),
                protocol: self.protocol,
                name: self.name.clone(),
                class: self.class,
                rr_type: self.rr_type,
                rdata: rr.rdata,
            }));
        }
        self.events.emit(RecordEvent::AllForNow);
        Ok(count)
    }
}

impl Drop for RecordBrowser {
    fn drop(&mut self) {
        self.events.close();
    }
}
