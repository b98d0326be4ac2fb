// # Memory Kernel
//
// In-process implementation of NetworkKernel.
//
// ## Purpose
//
// Models just enough of the kernel's link, address, and route tables to
// exercise the handle without privileges or a Linux host: tests, embedding
// on other platforms, and dry runs of a reconciliation loop.
//
// ## Behaviour
//
// - Interface indices increase monotonically and are never reused
// - Binding an address installs the table=local/type=local/protocol=kernel
//   route for it; unbinding removes that route
// - Deleting a link drops its addresses and every route through it
// - As on Linux, IPv6 local routes carry no preferred source, so local
//   address discovery reports IPv4 addresses only
//
// Failures use `io::ErrorKind` rather than raw errno values, and the two
// predicates recognise exactly those kinds.

use std::io;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use crate::model::{Link, LinkKind, Route, RouteFilter, RouteKind, RouteTable};
use crate::traits::NetworkKernel;

#[derive(Debug, Clone, PartialEq, Eq)]
struct Binding {
    index: u32,
    addr: IpAddr,
    prefix_len: u8,
}

#[derive(Debug)]
struct MemoryState {
    next_index: u32,
    links: Vec<Link>,
    bindings: Vec<Binding>,
    routes: Vec<Route>,
}

/// In-memory kernel implementation
///
/// Clones share state, so a test can keep one clone for inspection while
/// the handle owns another.
///
/// # Example
///
/// ```rust
/// use ipvs_netstate_core::{MemoryKernel, NetStateHandle};
///
/// let kernel = MemoryKernel::with_loopback();
/// let handle = NetStateHandle::new(Box::new(kernel.clone()));
///
/// assert!(!handle.ensure_dummy_device("kube-ipvs0").unwrap());
/// assert!(!handle.ensure_address_bind("10.96.0.1", "kube-ipvs0").unwrap());
/// assert_eq!(kernel.addresses("kube-ipvs0"), vec!["10.96.0.1".parse::<std::net::IpAddr>().unwrap()]);
/// ```
#[derive(Debug, Clone)]
pub struct MemoryKernel {
    inner: Arc<Mutex<MemoryState>>,
}

impl MemoryKernel {
    /// Create a kernel with no links at all
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(MemoryState {
                next_index: 1,
                links: Vec::new(),
                bindings: Vec::new(),
                routes: Vec::new(),
            })),
        }
    }

    /// Create a kernel with a loopback device holding 127.0.0.1/8 and ::1/128
    pub fn with_loopback() -> Self {
        let kernel = Self::new();
        let index = kernel.add_device("lo");
        let lo = Link::new(index, "lo", LinkKind::Device);

        let v4 = IpAddr::V4(Ipv4Addr::LOCALHOST);
        let v6 = IpAddr::V6(Ipv6Addr::LOCALHOST);
        let mut state = kernel.state();
        bind(&mut state, &lo, v4, 8);
        bind(&mut state, &lo, v6, 128);

        // Subnet-wide local route and broadcast row, as the kernel installs for lo
        let mut subnet = Route::local_for(v4, index);
        subnet.destination = Some(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 0)));
        state.routes.push(subnet);
        let mut broadcast = Route::local_for(v4, index);
        broadcast.kind = RouteKind::Broadcast;
        broadcast.destination = Some(IpAddr::V4(Ipv4Addr::new(127, 255, 255, 255)));
        state.routes.push(broadcast);
        drop(state);

        kernel
    }

    /// Add a link with no kind attribute (a physical NIC stand-in) and
    /// return its index
    pub fn add_device(&self, name: &str) -> u32 {
        let mut state = self.state();
        let index = state.next_index;
        state.next_index += 1;
        state.links.push(Link::new(index, name, LinkKind::Device));
        index
    }

    /// Inject an arbitrary route row
    pub fn insert_route(&self, route: Route) {
        self.state().routes.push(route);
    }

    /// Snapshot of the link table
    pub fn links(&self) -> Vec<Link> {
        self.state().links.clone()
    }

    /// Addresses bound to the named link, in binding order
    pub fn addresses(&self, name: &str) -> Vec<IpAddr> {
        let state = self.state();
        let Some(index) = state.links.iter().find(|l| l.name == name).map(|l| l.index) else {
            return Vec::new();
        };
        state
            .bindings
            .iter()
            .filter(|b| b.index == index)
            .map(|b| b.addr)
            .collect()
    }

    fn state(&self) -> MutexGuard<'_, MemoryState> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for MemoryKernel {
    fn default() -> Self {
        Self::new()
    }
}

fn bind(state: &mut MemoryState, link: &Link, addr: IpAddr, prefix_len: u8) {
    state.bindings.push(Binding {
        index: link.index,
        addr,
        prefix_len,
    });
    state.routes.push(Route::local_for(addr, link.index));
}

fn no_such_device(index: u32) -> io::Error {
    io::Error::new(io::ErrorKind::NotFound, format!("no such device: index {index}"))
}

impl NetworkKernel for MemoryKernel {
    fn link_by_name(&self, name: &str) -> io::Result<Option<Link>> {
        Ok(self.state().links.iter().find(|l| l.name == name).cloned())
    }

    fn add_link(&self, name: &str, kind: &LinkKind) -> io::Result<()> {
        if name.is_empty() {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "link name cannot be empty",
            ));
        }
        let mut state = self.state();
        if state.links.iter().any(|l| l.name == name) {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("link {name} already exists"),
            ));
        }
        let index = state.next_index;
        state.next_index += 1;
        state.links.push(Link::new(index, name, kind.clone()));
        Ok(())
    }

    fn delete_link(&self, link: &Link) -> io::Result<()> {
        let mut state = self.state();
        let before = state.links.len();
        state.links.retain(|l| l.index != link.index);
        if state.links.len() == before {
            return Err(no_such_device(link.index));
        }
        state.bindings.retain(|b| b.index != link.index);
        state
            .routes
            .retain(|r| r.output_interface != Some(link.index));
        Ok(())
    }

    fn add_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        let mut state = self.state();
        if !state.links.iter().any(|l| l.index == link.index) {
            return Err(no_such_device(link.index));
        }
        if state
            .bindings
            .iter()
            .any(|b| b.index == link.index && b.addr == addr)
        {
            return Err(io::Error::new(
                io::ErrorKind::AlreadyExists,
                format!("address {addr} already assigned to {}", link.name),
            ));
        }
        bind(&mut state, link, addr, prefix_len);
        Ok(())
    }

    fn delete_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        let mut state = self.state();
        let target = Binding {
            index: link.index,
            addr,
            prefix_len,
        };
        let Some(position) = state.bindings.iter().position(|b| *b == target) else {
            return Err(io::Error::new(
                io::ErrorKind::AddrNotAvailable,
                format!("address {addr}/{prefix_len} not assigned to {}", link.name),
            ));
        };
        state.bindings.remove(position);
        if let Some(route) = state.routes.iter().position(|r| {
            r.table == RouteTable::LOCAL
                && r.kind == RouteKind::Local
                && r.output_interface == Some(link.index)
                && r.destination == Some(addr)
        }) {
            state.routes.remove(route);
        }
        Ok(())
    }

    fn list_routes(&self, filter: &RouteFilter) -> io::Result<Vec<Route>> {
        Ok(self
            .state()
            .routes
            .iter()
            .filter(|r| filter.matches(r))
            .cloned()
            .collect())
    }

    fn is_duplicate_resource_error(&self, err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::AlreadyExists
    }

    fn is_missing_resource_error(&self, err: &io::Error) -> bool {
        err.kind() == io::ErrorKind::AddrNotAvailable
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::AddressFamily;

    fn ip(s: &str) -> IpAddr {
        s.parse().unwrap()
    }

    #[test]
    fn indices_are_never_reused() {
        let kernel = MemoryKernel::new();
        kernel.add_link("a", &LinkKind::Dummy).unwrap();
        let a = kernel.link_by_name("a").unwrap().unwrap();
        kernel.delete_link(&a).unwrap();
        kernel.add_link("b", &LinkKind::Dummy).unwrap();
        let b = kernel.link_by_name("b").unwrap().unwrap();
        assert!(b.index > a.index);
    }

    #[test]
    fn duplicate_link_reports_already_exists() {
        let kernel = MemoryKernel::new();
        kernel.add_link("a", &LinkKind::Dummy).unwrap();
        let err = kernel.add_link("a", &LinkKind::Dummy).unwrap_err();
        assert!(kernel.is_duplicate_resource_error(&err));
    }

    #[test]
    fn binding_installs_and_removes_local_route() {
        let kernel = MemoryKernel::new();
        kernel.add_link("d0", &LinkKind::Dummy).unwrap();
        let link = kernel.link_by_name("d0").unwrap().unwrap();

        kernel.add_address(&link, ip("10.1.1.1"), 32).unwrap();
        let routes = kernel.list_routes(&RouteFilter::local_addresses()).unwrap();
        assert_eq!(routes, vec![Route::local_for(ip("10.1.1.1"), link.index)]);

        kernel.delete_address(&link, ip("10.1.1.1"), 32).unwrap();
        assert!(
            kernel
                .list_routes(&RouteFilter::local_addresses())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn missing_binding_is_recognised() {
        let kernel = MemoryKernel::new();
        kernel.add_link("d0", &LinkKind::Dummy).unwrap();
        let link = kernel.link_by_name("d0").unwrap().unwrap();
        let err = kernel.delete_address(&link, ip("10.1.1.1"), 32).unwrap_err();
        assert!(kernel.is_missing_resource_error(&err));
        assert!(!kernel.is_duplicate_resource_error(&err));
    }

    #[test]
    fn deleting_link_drops_its_state() {
        let kernel = MemoryKernel::new();
        kernel.add_link("d0", &LinkKind::Dummy).unwrap();
        let link = kernel.link_by_name("d0").unwrap().unwrap();
        kernel.add_address(&link, ip("10.1.1.1"), 32).unwrap();

        kernel.delete_link(&link).unwrap();
        assert!(kernel.addresses("d0").is_empty());
        assert!(
            kernel
                .list_routes(&RouteFilter::default())
                .unwrap()
                .is_empty()
        );
    }

    #[test]
    fn loopback_has_both_families() {
        let kernel = MemoryKernel::with_loopback();
        assert_eq!(kernel.addresses("lo"), vec![ip("127.0.0.1"), ip("::1")]);
        let v6 = RouteFilter::local_addresses().with_family(AddressFamily::V6);
        let routes = kernel.list_routes(&v6).unwrap();
        assert_eq!(routes.len(), 1);
        assert_eq!(routes[0].destination, Some(ip("::1")));
        assert_eq!(routes[0].preferred_source, None);
    }
}
