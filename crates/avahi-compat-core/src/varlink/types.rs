//! Parameter and reply shapes of the `io.systemd.Resolve` methods used here.

use serde::{Deserialize, Serialize};

// ── BrowseServices ────────────────────────────────────────────────────

/// Parameters of `io.systemd.Resolve.BrowseServices`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BrowseServicesParams {
    pub domain: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub ifindex: i32,
    pub flags: u64,
}

/// One notification batch of a browse subscription.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct BrowseServicesReply {
    #[serde(rename = "browserServiceData", default)]
    pub entries: Vec<BrowseEntry>,
}

/// Whether a browse entry appeared or went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UpdateFlag {
    Added,
    Removed,
    #[serde(other)]
    Unknown,
}

#[derive(Debug, Clone, Deserialize)]
pub struct BrowseEntry {
    #[serde(rename = "updateFlag")]
    pub update_flag: UpdateFlag,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type", default)]
    pub service_type: Option<String>,
    #[serde(default)]
    pub domain: Option<String>,
    #[serde(default)]
    pub ifindex: Option<i32>,
    #[serde(default)]
    pub family: Option<i32>,
}

// ── ResolveService ────────────────────────────────────────────────────

/// Parameters of `io.systemd.Resolve.ResolveService`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveServiceParams {
    pub name: String,
    #[serde(rename = "type")]
    pub service_type: String,
    pub domain: String,
    pub ifindex: i32,
    pub family: i32,
    pub flags: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveServiceReply {
    #[serde(default)]
    pub services: Vec<ServiceRecord>,
    #[serde(default)]
    pub txt: Option<Vec<String>>,
}

/// One SRV target with the addresses resolved for it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceRecord {
    #[serde(default)]
    pub port: u16,
    #[serde(default)]
    pub hostname: Option<String>,
    #[serde(default)]
    pub addresses: Vec<ResolvedAddress>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResolvedAddress {
    #[serde(default)]
    pub ifindex: Option<i32>,
    pub family: i32,
    pub address: Vec<u8>,
}

// ── ResolveRecord ─────────────────────────────────────────────────────

/// Parameters of `io.systemd.Resolve.ResolveRecord`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolveRecordParams {
    pub ifindex: i32,
    pub name: String,
    pub class: u16,
    #[serde(rename = "type")]
    pub record_type: u16,
    pub flags: u64,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResolveRecordReply {
    #[serde(default)]
    pub rrs: Vec<ResourceRecord>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ResourceRecord {
    #[serde(default)]
    pub ifindex: Option<i32>,
    #[serde(default)]
    pub rdata: Vec<u8>,
}
