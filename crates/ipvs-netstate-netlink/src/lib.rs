// # Netlink Kernel Access
//
// This crate provides the rtnetlink-backed `NetworkKernel` for Linux.
//
// ## Implementation
//
// 1. `netlink-sys` owns the `NETLINK_ROUTE` socket, opened once in
//    `NetlinkKernel::open` and closed on drop
// 2. `netlink-packet-route` builds `RTM_*` requests and decodes replies
// 3. Kernel `NLMSG_ERROR` codes become `io::Error::from_raw_os_error`, and
//    only this crate interprets the errno values
// 4. Route listing dumps the tables and narrows them with `RouteFilter`
//    in user space
//
// ## Platform Support
//
// On other platforms `NetlinkKernel::open` fails with `Unsupported`; use
// `MemoryKernel` from `ipvs-netstate-core` there.

use std::io;
use std::net::IpAddr;

use ipvs_netstate_core::model::{Link, LinkKind, Route, RouteFilter};
use ipvs_netstate_core::{NetStateConfig, NetStateHandle, NetworkKernel};

#[cfg(target_os = "linux")]
mod messages;
#[cfg(target_os = "linux")]
mod socket;

#[cfg(target_os = "linux")]
use netlink_packet_core::{NLM_F_CREATE, NLM_F_EXCL};
#[cfg(target_os = "linux")]
use netlink_packet_route::RtnlMessage;
#[cfg(target_os = "linux")]
use tracing::debug;

/// rtnetlink-backed kernel access
///
/// Holds one socket for its whole lifetime. Requests from concurrent
/// callers are serialised on that socket.
pub struct NetlinkKernel {
    #[cfg(target_os = "linux")]
    socket: socket::RouteSocket,
}

impl std::fmt::Debug for NetlinkKernel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetlinkKernel").finish_non_exhaustive()
    }
}

#[cfg(target_os = "linux")]
impl NetlinkKernel {
    /// Open a kernel connection
    pub fn open() -> io::Result<Self> {
        let socket = socket::RouteSocket::open()?;
        debug!("Connected to rtnetlink");
        Ok(Self { socket })
    }
}

#[cfg(not(target_os = "linux"))]
impl NetlinkKernel {
    /// Open a kernel connection (Linux only)
    pub fn open() -> io::Result<Self> {
        Err(unsupported())
    }
}

/// Open a kernel connection and wrap it in a handle configured by `config`
pub fn open_handle(config: &NetStateConfig) -> io::Result<NetStateHandle> {
    let kernel = NetlinkKernel::open()?;
    Ok(NetStateHandle::with_config(Box::new(kernel), config))
}

#[cfg(target_os = "linux")]
impl NetworkKernel for NetlinkKernel {
    fn link_by_name(&self, name: &str) -> io::Result<Option<Link>> {
        match self.socket.query(messages::get_link_by_name(name)) {
            Ok(Some(RtnlMessage::NewLink(message))) => Ok(messages::parse_link(&message)),
            Ok(_) => Ok(None),
            Err(e) if is_errno(&e, libc::ENODEV) => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn add_link(&self, name: &str, kind: &LinkKind) -> io::Result<()> {
        self.socket
            .execute(messages::new_link(name, kind)?, NLM_F_CREATE | NLM_F_EXCL)
    }

    fn delete_link(&self, link: &Link) -> io::Result<()> {
        self.socket.execute(messages::del_link(link), 0)
    }

    fn add_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        let message = messages::address_message(link, addr, prefix_len);
        self.socket
            .execute(RtnlMessage::NewAddress(message), NLM_F_CREATE | NLM_F_EXCL)
    }

    fn delete_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        let message = messages::address_message(link, addr, prefix_len);
        self.socket.execute(RtnlMessage::DelAddress(message), 0)
    }

    fn list_routes(&self, filter: &RouteFilter) -> io::Result<Vec<Route>> {
        let replies = self.socket.dump(messages::dump_routes(filter.family))?;
        Ok(replies
            .iter()
            .filter_map(|reply| match reply {
                RtnlMessage::NewRoute(message) => messages::parse_route(message),
                _ => None,
            })
            .filter(|route| filter.matches(route))
            .collect())
    }

    fn is_duplicate_resource_error(&self, err: &io::Error) -> bool {
        is_errno(err, libc::EEXIST)
    }

    fn is_missing_resource_error(&self, err: &io::Error) -> bool {
        is_errno(err, libc::EADDRNOTAVAIL)
    }
}

#[cfg(target_os = "linux")]
fn is_errno(err: &io::Error, errno: i32) -> bool {
    err.raw_os_error() == Some(errno)
}

#[cfg(not(target_os = "linux"))]
fn unsupported() -> io::Error {
    io::Error::new(
        io::ErrorKind::Unsupported,
        "rtnetlink is only available on Linux",
    )
}

#[cfg(not(target_os = "linux"))]
impl NetworkKernel for NetlinkKernel {
    fn link_by_name(&self, _name: &str) -> io::Result<Option<Link>> {
        Err(unsupported())
    }

    fn add_link(&self, _name: &str, _kind: &LinkKind) -> io::Result<()> {
        Err(unsupported())
    }

    fn delete_link(&self, _link: &Link) -> io::Result<()> {
        Err(unsupported())
    }

    fn add_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        Err(unsupported())
    }

    fn delete_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        Err(unsupported())
    }

    fn list_routes(&self, _filter: &RouteFilter) -> io::Result<Vec<Route>> {
        Err(unsupported())
    }

    fn is_duplicate_resource_error(&self, _err: &io::Error) -> bool {
        false
    }

    fn is_missing_resource_error(&self, _err: &io::Error) -> bool {
        false
    }
}
