//! Protocol and interface scoping, flag sets, DNS constants, and the
//! payloads carried by browse and resolve events.

use crate::address::ServiceAddress;
use crate::txt::TextList;

// ── Protocol / interface ──────────────────────────────────────────────

/// Address family scoping of a lookup or a published service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Protocol {
    Inet,
    Inet6,
    #[default]
    Unspec,
}

/// `AF_UNSPEC`, `AF_INET`, `AF_INET6` as used on the resolver wire.
pub const AF_UNSPEC: i32 = 0;
pub const AF_INET: i32 = 2;
pub const AF_INET6: i32 = 10;

impl Protocol {
    /// Legacy numeric code: `0` inet, `1` inet6, `-1` unspecified.
    pub fn code(self) -> i32 {
        match self {
            Protocol::Inet => 0,
            Protocol::Inet6 => 1,
            Protocol::Unspec => -1,
        }
    }

    pub fn from_code(code: i32) -> Option<Self> {
        match code {
            0 => Some(Protocol::Inet),
            1 => Some(Protocol::Inet6),
            -1 => Some(Protocol::Unspec),
            _ => None,
        }
    }

    /// The socket address family sent to the resolver daemon.
    pub fn address_family(self) -> i32 {
        match self {
            Protocol::Inet => AF_INET,
            Protocol::Inet6 => AF_INET6,
            Protocol::Unspec => AF_UNSPEC,
        }
    }

    pub fn from_address_family(family: i32) -> Option<Self> {
        match family {
            AF_INET => Some(Protocol::Inet),
            AF_INET6 => Some(Protocol::Inet6),
            AF_UNSPEC => Some(Protocol::Unspec),
            _ => None,
        }
    }
}

impl std::fmt::Display for Protocol {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Protocol::Inet => "IPv4",
            Protocol::Inet6 => "IPv6",
            Protocol::Unspec => "any",
        })
    }
}

/// Network interface scoping.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum Interface {
    #[default]
    Unspecified,
    Index(u32),
}

impl Interface {
    /// Legacy numeric code, `-1` when unspecified.
    pub fn code(self) -> i32 {
        match self {
            Interface::Unspecified => -1,
            Interface::Index(i) => i32::try_from(i).unwrap_or(i32::MAX),
        }
    }

    /// Interface index as sent to the resolver daemon, where `0` means any.
    pub fn wire_ifindex(self) -> i32 {
        match self {
            Interface::Unspecified => 0,
            Interface::Index(i) => i32::try_from(i).unwrap_or(0),
        }
    }

    /// Interpret an index reported by the daemon; non-positive means unspecified.
    pub fn from_ifindex(ifindex: i32) -> Self {
        match u32::try_from(ifindex) {
            Ok(0) | Err(_) => Interface::Unspecified,
            Ok(i) => Interface::Index(i),
        }
    }

    pub fn index(self) -> Option<u32> {
        match self {
            Interface::Unspecified => None,
            Interface::Index(i) => Some(i),
        }
    }
}

impl std::fmt::Display for Interface {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Interface::Unspecified => f.write_str("any"),
            Interface::Index(i) => write!(f, "{i}"),
        }
    }
}

// ── Flag sets ─────────────────────────────────────────────────────────

macro_rules! flag_set {
    (
        $(#[$meta:meta])*
        $name:ident : $repr:ty {
            $( $(#[$fmeta:meta])* $flag:ident = $value:expr; )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
        pub struct $name($repr);

        impl $name {
            $( $(#[$fmeta])* pub const $flag: $name = $name($value); )*

            pub const fn empty() -> Self {
                Self(0)
            }

            pub const fn bits(self) -> $repr {
                self.0
            }

            pub const fn contains(self, other: Self) -> bool {
                self.0 & other.0 == other.0
            }

            pub const fn is_empty(self) -> bool {
                self.0 == 0
            }
        }

        impl std::ops::BitOr for $name {
            type Output = Self;

            fn bitor(self, rhs: Self) -> Self {
                Self(self.0 | rhs.0)
            }
        }

        impl std::ops::BitOrAssign for $name {
            fn bitor_assign(&mut self, rhs: Self) {
                self.0 |= rhs.0;
            }
        }
    };
}

flag_set! {
    /// Flags passed when creating a browser, resolver, or record query.
    LookupFlags: u32 {
        /// Force lookup via wide-area DNS.
        USE_WIDE_AREA = 1;
        /// Force lookup via multicast DNS.
        USE_MULTICAST = 2;
        /// Do not look up TXT data while resolving.
        NO_TXT = 4;
        /// Do not look up addresses while resolving.
        NO_ADDRESS = 8;
    }
}

flag_set! {
    /// Origin of a browse or resolve result.
    LookupResultFlags: u32 {
        CACHED = 1;
        WIDE_AREA = 2;
        MULTICAST = 4;
        LOCAL = 8;
        OUR_OWN = 16;
        STATIC = 32;
    }
}

flag_set! {
    /// Flags accepted when publishing a service.
    ///
    /// They are recorded on the service but have no `.dnssd` equivalent.
    PublishFlags: u32 {
        UNIQUE = 1;
        NO_PROBE = 2;
        NO_ANNOUNCE = 4;
        ALLOW_MULTIPLE = 8;
        NO_REVERSE = 16;
        NO_COOKIE = 32;
        UPDATE = 64;
        USE_WIDE_AREA = 128;
        USE_MULTICAST = 256;
    }
}

// systemd-resolved query flag bits (SD_RESOLVED_*).
const SD_RESOLVED_DNS: u64 = 1 << 0;
const SD_RESOLVED_MDNS_IPV4: u64 = 1 << 3;
const SD_RESOLVED_MDNS_IPV6: u64 = 1 << 4;
const SD_RESOLVED_NO_TXT: u64 = 1 << 6;
const SD_RESOLVED_NO_ADDRESS: u64 = 1 << 7;

impl LookupFlags {
    /// Translate into the `flags` field of a resolver daemon request.
    pub fn resolved_bits(self) -> u64 {
        let mut bits = 0;
        if self.contains(LookupFlags::USE_WIDE_AREA) {
            bits |= SD_RESOLVED_DNS;
        }
        if self.contains(LookupFlags::USE_MULTICAST) {
            bits |= SD_RESOLVED_MDNS_IPV4 | SD_RESOLVED_MDNS_IPV6;
        }
        if self.contains(LookupFlags::NO_TXT) {
            bits |= SD_RESOLVED_NO_TXT;
        }
        if self.contains(LookupFlags::NO_ADDRESS) {
            bits |= SD_RESOLVED_NO_ADDRESS;
        }
        bits
    }
}

// ── DNS constants ─────────────────────────────────────────────────────

/// DNS record types, classes, and default TTLs.
pub mod dns {
    pub const TYPE_A: u16 = 0x01;
    pub const TYPE_NS: u16 = 0x02;
    pub const TYPE_CNAME: u16 = 0x05;
    pub const TYPE_SOA: u16 = 0x06;
    pub const TYPE_PTR: u16 = 0x0C;
    pub const TYPE_HINFO: u16 = 0x0D;
    pub const TYPE_MX: u16 = 0x0F;
    pub const TYPE_TXT: u16 = 0x10;
    pub const TYPE_AAAA: u16 = 0x1C;
    pub const TYPE_SRV: u16 = 0x21;

    pub const CLASS_IN: u16 = 0x01;

    /// TTL for host name records.
    pub const DEFAULT_TTL_HOST_NAME: u32 = 120;
    /// TTL for every other record.
    pub const DEFAULT_TTL: u32 = 75 * 60;

    /// Parse a record type mnemonic (`"AAAA"`) or a decimal number.
    pub fn type_from_str(s: &str) -> Option<u16> {
        let t = match s.to_ascii_uppercase().as_str() {
            "A" => TYPE_A,
            "NS" => TYPE_NS,
            "CNAME" => TYPE_CNAME,
            "SOA" => TYPE_SOA,
            "PTR" => TYPE_PTR,
            "HINFO" => TYPE_HINFO,
            "MX" => TYPE_MX,
            "TXT" => TYPE_TXT,
            "AAAA" => TYPE_AAAA,
            "SRV" => TYPE_SRV,
            other => return other.parse().ok(),
        };
        Some(t)
    }
}

// ── Event payloads ────────────────────────────────────────────────────

/// A service instance reported by a [`ServiceBrowser`](crate::ServiceBrowser).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServiceInstance {
    pub interface: Interface,
    pub protocol: Protocol,
    pub name: String,
    pub service_type: String,
    pub domain: String,
    pub flags: LookupResultFlags,
}

/// A fully resolved service delivered by a [`ServiceResolver`](crate::ServiceResolver).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedService {
    pub interface: Interface,
    pub protocol: Protocol,
    pub name: String,
    pub service_type: String,
    pub domain: String,
    /// Target host name, empty when the daemon did not report one.
    pub host_name: String,
    /// `None` only when resolution ran with [`LookupFlags::NO_ADDRESS`].
    pub address: Option<ServiceAddress>,
    pub port: u16,
    pub txt: TextList,
    pub flags: LookupResultFlags,
}
