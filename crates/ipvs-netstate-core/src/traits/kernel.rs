// # Kernel Access Trait
//
// Defines the interface through which the handle reads and mutates the
// kernel's link, address, and route tables.
//
// ## Implementations
//
// - rtnetlink (Linux): `ipvs-netstate-netlink` crate
// - In-memory: [`MemoryKernel`](crate::kernel::MemoryKernel)
//
// ## Usage
//
// ```rust,ignore
// use ipvs_netstate_core::{NetStateHandle, NetworkKernel};
//
// fn build(kernel: impl NetworkKernel + 'static) -> NetStateHandle {
//     NetStateHandle::new(Box::new(kernel))
// }
// ```

use std::io;
use std::net::IpAddr;

use crate::model::{Link, LinkKind, Route, RouteFilter};

/// Trait for kernel-access implementations
///
/// Every method is a single synchronous kernel interaction. Implementations
/// must not retry, cache, or reorder calls; the handle relies on each call
/// observing current kernel state.
///
/// Raw platform error codes stay behind this trait: the handle only asks
/// the two `is_*_error` predicates what a failure means.
pub trait NetworkKernel: Send + Sync {
    /// Look up a link by name
    ///
    /// # Returns
    ///
    /// - `Ok(Some(link))`: the link exists
    /// - `Ok(None)`: no link has that name
    /// - `Err(_)`: the lookup itself failed
    fn link_by_name(&self, name: &str) -> io::Result<Option<Link>>;

    /// Create a link named `name` of the given kind
    fn add_link(&self, name: &str, kind: &LinkKind) -> io::Result<()>;

    /// Remove a link
    fn delete_link(&self, link: &Link) -> io::Result<()>;

    /// Bind `addr/prefix_len` to a link
    fn add_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()>;

    /// Remove the `addr/prefix_len` binding from a link
    fn delete_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()>;

    /// List every route satisfying `filter`
    fn list_routes(&self, filter: &RouteFilter) -> io::Result<Vec<Route>>;

    /// Whether `err` means the resource being created already exists
    fn is_duplicate_resource_error(&self, err: &io::Error) -> bool;

    /// Whether `err` means the address binding being removed does not exist
    fn is_missing_resource_error(&self, err: &io::Error) -> bool;
}
