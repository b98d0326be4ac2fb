//! rtnetlink message construction and decoding
//!
//! Pure functions: nothing here touches a socket, so every request shape
//! and reply decoding rule is unit-testable.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};

use ipvs_netstate_core::model::{
    AddressFamily, Link, LinkKind, Route, RouteKind, RouteProtocol, RouteTable,
};
use netlink_packet_route::nlas::address::Nla as AddressNla;
use netlink_packet_route::nlas::link::{Info, InfoKind, Nla as LinkNla};
use netlink_packet_route::nlas::route::Nla as RouteNla;
use netlink_packet_route::{AddressMessage, LinkMessage, RouteMessage, RtnlMessage};

const AF_UNSPEC: u8 = libc::AF_UNSPEC as u8;
const AF_INET: u8 = libc::AF_INET as u8;
const AF_INET6: u8 = libc::AF_INET6 as u8;

/// `RTM_GETLINK` for a single link, matched by `IFLA_IFNAME`
pub(crate) fn get_link_by_name(name: &str) -> RtnlMessage {
    let mut message = LinkMessage::default();
    message.nlas.push(LinkNla::IfName(name.to_string()));
    RtnlMessage::GetLink(message)
}

/// `RTM_NEWLINK` creating a virtual link of `kind`
pub(crate) fn new_link(name: &str, kind: &LinkKind) -> io::Result<RtnlMessage> {
    let info_kind = match kind {
        LinkKind::Dummy => InfoKind::Dummy,
        LinkKind::Other(other) => InfoKind::Other(other.clone()),
        LinkKind::Device => {
            return Err(io::Error::new(
                io::ErrorKind::Unsupported,
                "cannot create a link without a kind",
            ));
        }
    };
    let mut message = LinkMessage::default();
    message.nlas.push(LinkNla::IfName(name.to_string()));
    message.nlas.push(LinkNla::Info(vec![Info::Kind(info_kind)]));
    Ok(RtnlMessage::NewLink(message))
}

/// `RTM_DELLINK` by interface index
pub(crate) fn del_link(link: &Link) -> RtnlMessage {
    let mut message = LinkMessage::default();
    message.header.index = link.index;
    RtnlMessage::DelLink(message)
}

/// Address body shared by `RTM_NEWADDR` and `RTM_DELADDR`
///
/// IPv4 carries both `IFA_LOCAL` and `IFA_ADDRESS`, as iproute2 sends them;
/// IPv6 only needs `IFA_ADDRESS`.
pub(crate) fn address_message(link: &Link, addr: IpAddr, prefix_len: u8) -> AddressMessage {
    let mut message = AddressMessage::default();
    message.header.index = link.index;
    message.header.prefix_len = prefix_len;
    match addr {
        IpAddr::V4(v4) => {
            message.header.family = AF_INET;
            message.nlas.push(AddressNla::Local(v4.octets().to_vec()));
            message.nlas.push(AddressNla::Address(v4.octets().to_vec()));
        }
        IpAddr::V6(v6) => {
            message.header.family = AF_INET6;
            message.nlas.push(AddressNla::Address(v6.octets().to_vec()));
        }
    }
    message
}

/// `RTM_GETROUTE` dump restricted to one family (or `AF_UNSPEC`)
pub(crate) fn dump_routes(family: AddressFamily) -> RtnlMessage {
    let mut message = RouteMessage::default();
    message.header.address_family = match family {
        AddressFamily::All => AF_UNSPEC,
        AddressFamily::V4 => AF_INET,
        AddressFamily::V6 => AF_INET6,
    };
    RtnlMessage::GetRoute(message)
}

/// Decode a link reply; `None` when it carries no name
pub(crate) fn parse_link(message: &LinkMessage) -> Option<Link> {
    let mut name = None;
    let mut kind = LinkKind::Device;
    for nla in &message.nlas {
        match nla {
            LinkNla::IfName(ifname) => name = Some(ifname.clone()),
            LinkNla::Info(infos) => {
                for info in infos {
                    if let Info::Kind(info_kind) = info {
                        kind = link_kind(info_kind);
                    }
                }
            }
            _ => {}
        }
    }
    name.map(|name| Link::new(message.header.index, name, kind))
}

fn link_kind(kind: &InfoKind) -> LinkKind {
    match kind {
        InfoKind::Dummy => LinkKind::Dummy,
        InfoKind::Bridge => LinkKind::Other("bridge".to_string()),
        InfoKind::Veth => LinkKind::Other("veth".to_string()),
        InfoKind::Vlan => LinkKind::Other("vlan".to_string()),
        InfoKind::Other(other) => LinkKind::Other(other.clone()),
        other => LinkKind::Other(format!("{other:?}").to_lowercase()),
    }
}

/// Decode a route reply; `None` for families other than IPv4/IPv6
pub(crate) fn parse_route(message: &RouteMessage) -> Option<Route> {
    let family = match message.header.address_family {
        AF_INET => AddressFamily::V4,
        AF_INET6 => AddressFamily::V6,
        _ => return None,
    };

    // RTA_TABLE holds the full 32-bit id; the header byte saturates at 252+
    let mut table = RouteTable(u32::from(message.header.table));
    let mut output_interface = None;
    let mut destination = None;
    let mut preferred_source = None;
    for nla in &message.nlas {
        match nla {
            RouteNla::Table(id) => table = RouteTable(*id),
            RouteNla::Oif(index) => output_interface = Some(*index),
            RouteNla::Destination(bytes) => destination = parse_ip(bytes),
            RouteNla::PrefSource(bytes) => preferred_source = parse_ip(bytes),
            _ => {}
        }
    }

    Some(Route {
        family,
        table,
        kind: RouteKind::from(message.header.kind),
        protocol: RouteProtocol::from(message.header.protocol),
        output_interface,
        destination,
        preferred_source,
    })
}

fn parse_ip(bytes: &[u8]) -> Option<IpAddr> {
    match bytes.len() {
        4 => {
            let octets: [u8; 4] = bytes.try_into().ok()?;
            Some(IpAddr::V4(Ipv4Addr::from(octets)))
        }
        16 => {
            let octets: [u8; 16] = bytes.try_into().ok()?;
            Some(IpAddr::V6(Ipv6Addr::from(octets)))
        }
        _ => None,
    }
}
