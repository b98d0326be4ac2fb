//! Kernel-resident entities as seen through the kernel-access seam
//!
//! - [`Link`]: a network interface (name, index, kind)
//! - [`Route`]: one routing-table row
//! - [`RouteFilter`]: the criteria a route listing is narrowed by

pub mod link;
pub mod route;

pub use link::{Link, LinkKind};
pub use route::{AddressFamily, Route, RouteFilter, RouteKind, RouteProtocol, RouteTable};
