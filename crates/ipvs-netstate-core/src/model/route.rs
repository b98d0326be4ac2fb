// # Route model
//
// Only the handful of rtmsg fields the local-address listing needs are
// modelled. Raw values the model has no name for are preserved so a
// filter never silently matches the wrong row.

use std::net::IpAddr;

use serde::{Deserialize, Serialize};

/// Address family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AddressFamily {
    /// IPv4 and IPv6
    #[default]
    All,
    /// IPv4 only
    V4,
    /// IPv6 only
    V6,
}

impl AddressFamily {
    /// Family of a concrete address
    pub fn of(addr: &IpAddr) -> Self {
        match addr {
            IpAddr::V4(_) => AddressFamily::V4,
            IpAddr::V6(_) => AddressFamily::V6,
        }
    }

    /// Whether `other` is included in this selector
    pub fn includes(self, other: AddressFamily) -> bool {
        self == AddressFamily::All || self == other
    }
}

/// Routing table identifier
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RouteTable(pub u32);

impl RouteTable {
    /// Addresses owned by this host
    pub const LOCAL: RouteTable = RouteTable(255);
    pub const MAIN: RouteTable = RouteTable(254);
}

/// Route type (`RTN_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteKind {
    Unicast,
    /// Destination is an address of this host
    Local,
    Broadcast,
    Other(u8),
}

impl From<u8> for RouteKind {
    fn from(raw: u8) -> Self {
        match raw {
            1 => RouteKind::Unicast,
            2 => RouteKind::Local,
            3 => RouteKind::Broadcast,
            other => RouteKind::Other(other),
        }
    }
}

impl From<RouteKind> for u8 {
    fn from(kind: RouteKind) -> Self {
        match kind {
            RouteKind::Unicast => 1,
            RouteKind::Local => 2,
            RouteKind::Broadcast => 3,
            RouteKind::Other(raw) => raw,
        }
    }
}

/// Origin of a route (`RTPROT_*`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RouteProtocol {
    /// Installed by the kernel itself, e.g. when an address is added
    Kernel,
    Boot,
    Static,
    Other(u8),
}

impl From<u8> for RouteProtocol {
    fn from(raw: u8) -> Self {
        match raw {
            2 => RouteProtocol::Kernel,
            3 => RouteProtocol::Boot,
            4 => RouteProtocol::Static,
            other => RouteProtocol::Other(other),
        }
    }
}

impl From<RouteProtocol> for u8 {
    fn from(protocol: RouteProtocol) -> Self {
        match protocol {
            RouteProtocol::Kernel => 2,
            RouteProtocol::Boot => 3,
            RouteProtocol::Static => 4,
            RouteProtocol::Other(raw) => raw,
        }
    }
}

/// One routing-table row
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Route {
    pub family: AddressFamily,
    pub table: RouteTable,
    pub kind: RouteKind,
    pub protocol: RouteProtocol,
    /// Outgoing interface index (`RTA_OIF`)
    pub output_interface: Option<u32>,
    /// Destination (`RTA_DST`)
    pub destination: Option<IpAddr>,
    /// Preferred source address (`RTA_PREFSRC`)
    pub preferred_source: Option<IpAddr>,
}

impl Route {
    /// The row the kernel installs in the local table when `addr` is
    /// bound to interface `index`
    ///
    /// Linux sets `RTA_PREFSRC` on IPv4 local routes only; IPv6 rows carry
    /// the address as destination alone.
    pub fn local_for(addr: IpAddr, index: u32) -> Self {
        let preferred_source = match addr {
            IpAddr::V4(_) => Some(addr),
            IpAddr::V6(_) => None,
        };
        Self {
            family: AddressFamily::of(&addr),
            table: RouteTable::LOCAL,
            kind: RouteKind::Local,
            protocol: RouteProtocol::Kernel,
            output_interface: Some(index),
            destination: Some(addr),
            preferred_source,
        }
    }
}

/// Route listing criteria. `None` means "any".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteFilter {
    pub family: AddressFamily,
    pub table: Option<RouteTable>,
    pub kind: Option<RouteKind>,
    pub protocol: Option<RouteProtocol>,
    pub output_interface: Option<u32>,
}

impl RouteFilter {
    /// table = local, type = local, protocol = kernel
    pub fn local_addresses() -> Self {
        Self {
            family: AddressFamily::All,
            table: Some(RouteTable::LOCAL),
            kind: Some(RouteKind::Local),
            protocol: Some(RouteProtocol::Kernel),
            output_interface: None,
        }
    }

    pub fn with_family(mut self, family: AddressFamily) -> Self {
        self.family = family;
        self
    }

    pub fn with_output_interface(mut self, index: u32) -> Self {
        self.output_interface = Some(index);
        self
    }

    /// Whether `route` satisfies every criterion that is set
    pub fn matches(&self, route: &Route) -> bool {
        if !self.family.includes(route.family) {
            return false;
        }
        if self.table.is_some_and(|table| table != route.table) {
            return false;
        }
        if self.kind.is_some_and(|kind| kind != route.kind) {
            return false;
        }
        if self.protocol.is_some_and(|protocol| protocol != route.protocol) {
            return false;
        }
        if let Some(index) = self.output_interface
            && route.output_interface != Some(index)
        {
            return false;
        }
        true
    }
}
