//! Publishing services as `.dnssd` files.
//!
//! An [`EntryGroup`] collects service definitions and, on `commit`, writes
//! one file per service into the daemon's DNS-SD directory and signals a
//! reload. The group tracks exactly the files it created. `reset` and
//! `Drop` remove those files and nothing else.
//!
//! ```text
//!  Uncommitted ──commit──▶ Registering ──▶ Established
//!       ▲                       │
//!       │                       ▼
//!       └────────reset───── Failure ──commit──▶ Registering
//! ```

pub mod artifact;
pub mod reload;

use std::path::{Path, PathBuf};
use std::sync::Arc;

use avahi_compat_config::PublishConfig;
use tracing::{debug, info, warn};

use crate::client::Client;
use crate::error::Error;
use crate::events::{EventReceiver, EventSink};
use crate::txt::{TextList, TxtRecord};
use crate::types::{Interface, Protocol, PublishFlags};

pub use reload::{BusctlReload, NoReload, ReloadError, ReloadSignal};

/// Lifecycle state of an [`EntryGroup`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryGroupState {
    Uncommitted,
    Registering,
    Established,
    Collision,
    Failure,
}

impl EntryGroupState {
    /// Legacy numeric code.
    pub fn code(self) -> i32 {
        match self {
            EntryGroupState::Uncommitted => 0,
            EntryGroupState::Registering => 1,
            EntryGroupState::Established => 2,
            EntryGroupState::Collision => 3,
            EntryGroupState::Failure => 4,
        }
    }
}

impl std::fmt::Display for EntryGroupState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            EntryGroupState::Uncommitted => "uncommitted",
            EntryGroupState::Registering => "registering",
            EntryGroupState::Established => "established",
            EntryGroupState::Collision => "collision",
            EntryGroupState::Failure => "failure",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryGroupEvent {
    StateChanged(EntryGroupState),
}

/// A service to publish.
///
/// Domain, host, interface, protocol, and flags are kept for callers but
/// have no counterpart in a `.dnssd` file; the daemon publishes on every
/// link under its own host name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceDefinition {
    pub(crate) name: String,
    pub(crate) service_type: String,
    pub(crate) port: u16,
    pub(crate) domain: Option<String>,
    pub(crate) host: Option<String>,
    pub(crate) interface: Interface,
    pub(crate) protocol: Protocol,
    pub(crate) flags: PublishFlags,
    pub(crate) txt: TxtRecord,
}

impl ServiceDefinition {
    pub fn new(name: impl Into<String>, service_type: impl Into<String>, port: u16) -> Self {
        Self {
            name: name.into(),
            service_type: service_type.into(),
            port,
            domain: None,
            host: None,
            interface: Interface::Unspecified,
            protocol: Protocol::Unspec,
            flags: PublishFlags::empty(),
            txt: TxtRecord::new(),
        }
    }

    pub fn domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = Some(domain.into());
        self
    }

    pub fn host(mut self, host: impl Into<String>) -> Self {
        self.host = Some(host.into());
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

    pub fn flags(mut self, flags: PublishFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn txt(mut self, key: &str, value: &str) -> Self {
        self.txt.set(key, value);
        self
    }

    /// Merge `key=value` entries; the first occurrence of a key wins.
    pub fn txt_list(mut self, list: &TextList) -> Self {
        for (key, value) in TxtRecord::from_text_list(list).iter() {
            if self.txt.get(key).is_some() {
                continue;
            }
            match value {
                Some(value) => self.txt.set_arbitrary(key, value),
                None => self.txt.set_flag(key),
            }
        }
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn service_type(&self) -> &str {
        &self.service_type
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn domain_name(&self) -> Option<&str> {
        self.domain.as_deref()
    }

    pub fn host_name(&self) -> Option<&str> {
        self.host.as_deref()
    }

    pub fn txt_record(&self) -> &TxtRecord {
        &self.txt
    }
}

/// Handle to a service added to an [`EntryGroup`].
///
/// Ids from before a `reset` are rejected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ServiceId {
    generation: u64,
    index: usize,
}

struct PublishedService {
    definition: ServiceDefinition,
    /// TXT mutations collected while frozen.
    staged: Option<TxtRecord>,
    artifact: Option<PathBuf>,
}

/// A set of services published and withdrawn together.
pub struct EntryGroup {
    dir: PathBuf,
    reload: Arc<dyn ReloadSignal>,
    state: EntryGroupState,
    attached: bool,
    generation: u64,
    services: Vec<PublishedService>,
    created: Vec<PathBuf>,
    events: EventSink<EntryGroupEvent>,
}

impl EntryGroup {
    /// Group writing into `config.dnssd_dir` with the configured reload.
    pub fn new(config: &PublishConfig) -> Self {
        Self::with_reload_signal(config.dnssd_dir.clone(), reload::from_config(config))
    }

    pub fn with_reload_signal(dir: impl Into<PathBuf>, reload: Arc<dyn ReloadSignal>) -> Self {
        Self {
            dir: dir.into(),
            reload,
            state: EntryGroupState::Uncommitted,
            attached: false,
            generation: 0,
            services: Vec::new(),
            created: Vec::new(),
            events: EventSink::new(),
        }
    }

    pub fn subscribe(&self) -> EventReceiver<EntryGroupEvent> {
        self.events.subscribe()
    }

    pub fn attach(&mut self, client: &Client) -> Result<(), Error> {
        if self.attached {
            return Err(Error::BadState("entry group already attached".into()));
        }
        client.ensure_running()?;
        self.attached = true;
        Ok(())
    }

    pub fn state(&self) -> EntryGroupState {
        self.state
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    /// Files written by this group that still exist on its behalf.
    pub fn artifacts(&self) -> &[PathBuf] {
        &self.created
    }

    fn set_state(&mut self, state: EntryGroupState) {
        if self.state == state {
            return;
        }
        debug!(from = %self.state, to = %state, "Entry group state change");
        self.state = state;
        self.events.emit(EntryGroupEvent::StateChanged(state));
    }

    pub fn add_service(&mut self, definition: ServiceDefinition) -> Result<ServiceId, Error> {
        if definition.name.is_empty() || definition.service_type.is_empty() {
            return Err(Error::InvalidArgument(
                "service name and type must not be empty".into(),
            ));
        }
        if definition
            .name
            .chars()
            .chain(definition.service_type.chars())
            .any(char::is_control)
        {
            return Err(Error::InvalidArgument(
                "service name and type must not contain control characters".into(),
            ));
        }
        match self.state {
            EntryGroupState::Uncommitted | EntryGroupState::Failure => {}
            other => {
                return Err(Error::BadState(format!(
                    "cannot add services while {other}"
                )));
            }
        }
        let file_name = artifact::file_name(&definition.name, &definition.service_type);
        if self.services.iter().any(|s| {
            artifact::file_name(&s.definition.name, &s.definition.service_type) == file_name
        }) {
            return Err(Error::InvalidArgument(format!(
                "'{}' would share {file_name} with another service in this group",
                definition.name
            )));
        }
        self.services.push(PublishedService {
            definition,
            staged: None,
            artifact: None,
        });
        Ok(ServiceId {
            generation: self.generation,
            index: self.services.len() - 1,
        })
    }

    /// Raw records cannot be expressed as `.dnssd` files.
    pub fn add_record(
        &mut self,
        _name: &str,
        _class: u16,
        _rr_type: u16,
        _ttl: u32,
        _rdata: &[u8],
    ) -> Result<(), Error> {
        Err(Error::NotSupported(
            "publishing raw records is not supported".into(),
        ))
    }

    pub fn service(&mut self, id: ServiceId) -> Result<ServiceHandle<'_>, Error> {
        if id.generation != self.generation || id.index >= self.services.len() {
            return Err(Error::InvalidArgument("stale service id".into()));
        }
        Ok(ServiceHandle {
            group: self,
            index: id.index,
        })
    }

    /// Write every service's file and signal a reload.
    ///
    /// On a write error the files of this attempt are removed, the group
    /// enters `Failure`, and `commit` may be retried. Files are owned from
    /// the moment they are written, including by a dropped commit.
    pub async fn commit(&mut self) -> Result<(), Error> {
        if !self.attached {
            return Err(Error::BadState("entry group is not attached".into()));
        }
        match self.state {
            // `&mut self` rules out a concurrent commit, so `Registering`
            // here means the previous attempt was dropped.
            EntryGroupState::Uncommitted
            | EntryGroupState::Failure
            | EntryGroupState::Registering => {}
            other => return Err(Error::BadState(format!("cannot commit while {other}"))),
        }

        self.set_state(EntryGroupState::Registering);

        if let Err(e) = tokio::fs::create_dir_all(&self.dir).await {
            warn!(dir = %self.dir.display(), error = %e, "Cannot create DNS-SD directory");
            self.set_state(EntryGroupState::Failure);
            return Err(Error::Failure(format!(
                "cannot create {}: {e}",
                self.dir.display()
            )));
        }

        for index in 0..self.services.len() {
            let definition = &self.services[index].definition;
            let file_name = artifact::file_name(&definition.name, &definition.service_type);
            let content = artifact::render(definition);

            match artifact::write(&self.dir, &file_name, &content).await {
                Ok(path) => {
                    debug!(path = %path.display(), "Wrote service file");
                    self.services[index].artifact = Some(path.clone());
                    if !self.created.contains(&path) {
                        self.created.push(path);
                    }
                }
                Err(e) => {
                    warn!(file = %file_name, error = %e, "Failed to write service file, rolling back");
                    for service in &mut self.services {
                        service.artifact = None;
                    }
                    if self.remove_created().await {
                        self.signal_reload().await;
                    }
                    self.set_state(EntryGroupState::Failure);
                    return Err(Error::Failure(format!("cannot write {file_name}: {e}")));
                }
            }
        }

        let count = self.created.len();
        self.signal_reload().await;
        info!(services = count, dir = %self.dir.display(), "Entry group established");
        self.set_state(EntryGroupState::Established);
        Ok(())
    }

    /// Remove this group's files and forget its services.
    pub async fn reset(&mut self) -> Result<(), Error> {
        let removed = self.remove_created().await;
        self.services.clear();
        self.generation += 1;
        if removed {
            self.signal_reload().await;
        }
        self.set_state(EntryGroupState::Uncommitted);
        Ok(())
    }

    /// Remove every created file. A path leaves `created` only once its
    /// removal has finished.
    async fn remove_created(&mut self) -> bool {
        if self.created.is_empty() {
            return false;
        }
        while let Some(path) = self.created.last() {
            artifact::remove(path).await;
            self.created.pop();
        }
        true
    }

    /// Rewrite one service's file after a TXT change, if it is published.
    async fn rewrite(&mut self, index: usize) -> Result<(), Error> {
        if self.state != EntryGroupState::Established {
            return Ok(());
        }
        let service = &self.services[index];
        let Some(path) = service.artifact.as_ref() else {
            return Ok(());
        };
        let file_name = artifact::file_name(
            &service.definition.name,
            &service.definition.service_type,
        );
        let content = artifact::render(&service.definition);

        artifact::write(&self.dir, &file_name, &content)
            .await
            .map_err(|e| Error::Failure(format!("cannot rewrite {}: {e}", path.display())))?;
        debug!(file = %file_name, "Rewrote service file");
        self.signal_reload().await;
        Ok(())
    }

    async fn signal_reload(&self) {
        if let Err(e) = self.reload.reload().await {
            warn!(signal = self.reload.name(), error = %e, "Resolver daemon reload failed");
        }
    }
}

impl Drop for EntryGroup {
    fn drop(&mut self) {
        self.events.close();
        if self.created.is_empty() {
            return;
        }
        for path in self.created.drain(..) {
            artifact::remove_blocking(&path);
        }
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                let reload = Arc::clone(&self.reload);
                handle.spawn(async move {
                    if let Err(e) = reload.reload().await {
                        warn!(error = %e, "Resolver daemon reload after drop failed");
                    }
                });
            }
            Err(_) => debug!("No runtime available, skipping reload after drop"),
        }
    }
}

/// Mutable view of one service in an [`EntryGroup`].
pub struct ServiceHandle<'a> {
    group: &'a mut EntryGroup,
    index: usize,
}

impl ServiceHandle<'_> {
    fn service(&self) -> &PublishedService {
        &self.group.services[self.index]
    }

    fn service_mut(&mut self) -> &mut PublishedService {
        &mut self.group.services[self.index]
    }

    pub fn definition(&self) -> &ServiceDefinition {
        &self.service().definition
    }

    /// The TXT record as currently published (excluding frozen edits).
    pub fn txt(&self) -> &TxtRecord {
        &self.service().definition.txt
    }

    pub fn is_frozen(&self) -> bool {
        self.service().staged.is_some()
    }

    pub fn artifact_path(&self) -> Option<&Path> {
        self.service().artifact.as_deref()
    }

    pub async fn set(&mut self, key: &str, value: &str) -> Result<(), Error> {
        self.set_arbitrary(key, value.as_bytes()).await
    }

    pub async fn set_arbitrary(&mut self, key: &str, value: &[u8]) -> Result<(), Error> {
        validate_key(key)?;
        self.target().set_arbitrary(key, value);
        self.apply().await
    }

    /// Set a key without a value.
    pub async fn set_flag(&mut self, key: &str) -> Result<(), Error> {
        validate_key(key)?;
        self.target().set_flag(key);
        self.apply().await
    }

    /// Returns whether the key was present.
    pub async fn remove_key(&mut self, key: &str) -> Result<bool, Error> {
        validate_key(key)?;
        if !self.target().remove(key) {
            return Ok(false);
        }
        self.apply().await?;
        Ok(true)
    }

    /// Collect further TXT changes until [`thaw`](Self::thaw).
    pub fn freeze(&mut self) {
        let service = self.service_mut();
        if service.staged.is_none() {
            service.staged = Some(service.definition.txt.clone());
        }
    }

    /// Apply collected changes and rewrite this service's file once.
    pub async fn thaw(&mut self) -> Result<(), Error> {
        let service = self.service_mut();
        let Some(staged) = service.staged.take() else {
            return Ok(());
        };
        service.definition.txt = staged;
        self.group.rewrite(self.index).await
    }

    fn target(&mut self) -> &mut TxtRecord {
        let service = self.service_mut();
        match service.staged {
            Some(ref mut staged) => staged,
            None => &mut service.definition.txt,
        }
    }

    async fn apply(&mut self) -> Result<(), Error> {
        if self.is_frozen() {
            return Ok(());
        }
        self.group.rewrite(self.index).await
    }
}

fn validate_key(key: &str) -> Result<(), Error> {
    if key.is_empty() || key.contains('=') {
        return Err(Error::InvalidArgument(format!("invalid TXT key '{key}'")));
    }
    Ok(())
}
