//! Resolved service addresses.

use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use crate::types::{AF_INET, AF_INET6, Protocol};

/// An IPv4 or IPv6 address as reported by the resolver daemon.
///
/// The octets are only ever interpreted according to the variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ServiceAddress {
    V4([u8; 4]),
    V6([u8; 16]),
}

impl ServiceAddress {
    /// Build from a wire address family and raw octets.
    ///
    /// Returns `None` for an unknown family or when the length does not
    /// match the family.
    pub fn from_family_bytes(family: i32, bytes: &[u8]) -> Option<Self> {
        match family {
            AF_INET => <[u8; 4]>::try_from(bytes).ok().map(ServiceAddress::V4),
            AF_INET6 => <[u8; 16]>::try_from(bytes).ok().map(ServiceAddress::V6),
            _ => None,
        }
    }

    pub fn protocol(&self) -> Protocol {
        match self {
            ServiceAddress::V4(_) => Protocol::Inet,
            ServiceAddress::V6(_) => Protocol::Inet6,
        }
    }

    pub fn octets(&self) -> &[u8] {
        match self {
            ServiceAddress::V4(b) => b,
            ServiceAddress::V6(b) => b,
        }
    }

    pub fn to_ip(&self) -> IpAddr {
        match *self {
            ServiceAddress::V4(b) => IpAddr::V4(Ipv4Addr::from(b)),
            ServiceAddress::V6(b) => IpAddr::V6(Ipv6Addr::from(b)),
        }
    }
}

impl From<IpAddr> for ServiceAddress {
    fn from(ip: IpAddr) -> Self {
        match ip {
            IpAddr::V4(v4) => ServiceAddress::V4(v4.octets()),
            IpAddr::V6(v6) => ServiceAddress::V6(v6.octets()),
        }
    }
}

impl From<ServiceAddress> for IpAddr {
    fn from(addr: ServiceAddress) -> Self {
        addr.to_ip()
    }
}

impl std::fmt::Display for ServiceAddress {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.to_ip().fmt(f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_from_family_bytes_checks_length() {
        assert_eq!(
            ServiceAddress::from_family_bytes(AF_INET, &[192, 168, 1, 10]),
            Some(ServiceAddress::V4([192, 168, 1, 10]))
        );
        assert_eq!(ServiceAddress::from_family_bytes(AF_INET, &[0; 16]), None);
        assert_eq!(ServiceAddress::from_family_bytes(AF_INET6, &[0; 4]), None);
        assert_eq!(ServiceAddress::from_family_bytes(99, &[0; 4]), None);
    }

    #[test]
    fn test_display() {
        let v4 = ServiceAddress::V4([10, 0, 0, 1]);
        assert_eq!(v4.to_string(), "10.0.0.1");

        let mut v6 = [0u8; 16];
        v6[0] = 0xfe;
        v6[1] = 0x80;
        v6[15] = 0x01;
        assert_eq!(ServiceAddress::V6(v6).to_string(), "fe80::1");
    }

    #[test]
    fn test_protocol_follows_variant() {
        assert_eq!(ServiceAddress::V4([0; 4]).protocol(), Protocol::Inet);
        assert_eq!(ServiceAddress::V6([0; 16]).protocol(), Protocol::Inet6);
    }

    #[test]
    fn test_ip_conversion() {
        let ip: IpAddr = "2001:db8::5".parse().unwrap();
        let addr = ServiceAddress::from(ip);
        assert_eq!(addr.protocol(), Protocol::Inet6);
        assert_eq!(IpAddr::from(addr), ip);
    }
}
