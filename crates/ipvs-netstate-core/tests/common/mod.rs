//! Test doubles and common utilities for contract tests
//!
//! These wrap or replace the kernel seam so tests can count kernel calls
//! and inject failures without touching real interfaces.

#![allow(dead_code)]

use ipvs_netstate_core::model::{Link, LinkKind, Route, RouteFilter};
use ipvs_netstate_core::{MemoryKernel, NetStateHandle, NetworkKernel};
use std::collections::HashSet;
use std::io;
use std::net::IpAddr;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A MemoryKernel wrapper that counts every kernel call
#[derive(Clone)]
pub struct CountingKernel {
    inner: MemoryKernel,
    calls: Arc<AtomicUsize>,
}

impl CountingKernel {
    pub fn new(inner: MemoryKernel) -> Self {
        Self {
            inner,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Number of kernel calls made so far
    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    fn tick(&self) {
        self.calls.fetch_add(1, Ordering::SeqCst);
    }
}

impl NetworkKernel for CountingKernel {
    fn link_by_name(&self, name: &str) -> io::Result<Option<Link>> {
        self.tick();
        self.inner.link_by_name(name)
    }

    fn add_link(&self, name: &str, kind: &LinkKind) -> io::Result<()> {
        self.tick();
        self.inner.add_link(name, kind)
    }

    fn delete_link(&self, link: &Link) -> io::Result<()> {
        self.tick();
        self.inner.delete_link(link)
    }

    fn add_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        self.tick();
        self.inner.add_address(link, addr, prefix_len)
    }

    fn delete_address(&self, link: &Link, addr: IpAddr, prefix_len: u8) -> io::Result<()> {
        self.tick();
        self.inner.delete_address(link, addr, prefix_len)
    }

    fn list_routes(&self, filter: &RouteFilter) -> io::Result<Vec<Route>> {
        self.tick();
        self.inner.list_routes(filter)
    }

    fn is_duplicate_resource_error(&self, err: &io::Error) -> bool {
        self.inner.is_duplicate_resource_error(err)
    }

    fn is_missing_resource_error(&self, err: &io::Error) -> bool {
        self.inner.is_missing_resource_error(err)
    }
}

/// A kernel where lookups succeed but every mutation and listing fails
pub struct FailingKernel {
    link: Link,
    kind: io::ErrorKind,
}

impl FailingKernel {
    /// Every mutating call fails with `kind`; `name` resolves to a dummy link
    pub fn new(name: &str, kind: io::ErrorKind) -> Self {
        Self {
            link: Link::new(7, name, LinkKind::Dummy),
            kind,
        }
    }

    fn fail<T>(&self) -> io::Result<T> {
        Err(io::Error::from(self.kind))
    }
}

impl NetworkKernel for FailingKernel {
    fn link_by_name(&self, name: &str) -> io::Result<Option<Link>> {
        Ok((name == self.link.name).then(|| self.link.clone()))
    }

    fn add_link(&self, _name: &str, _kind: &LinkKind) -> io::Result<()> {
        self.fail()
    }

    fn delete_link(&self, _link: &Link) -> io::Result<()> {
        self.fail()
    }

    fn add_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        self.fail()
    }

    fn delete_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        self.fail()
    }

    fn list_routes(&self, _filter: &RouteFilter) -> io::Result<Vec<Route>> {
        self.fail()
    }

    fn is_duplicate_resource_error(&self, _err: &io::Error) -> bool {
        false
    }

    fn is_missing_resource_error(&self, _err: &io::Error) -> bool {
        false
    }
}

/// A kernel whose link lookup itself fails
pub struct BrokenLookupKernel;

impl NetworkKernel for BrokenLookupKernel {
    fn link_by_name(&self, _name: &str) -> io::Result<Option<Link>> {
        Err(io::Error::from(io::ErrorKind::PermissionDenied))
    }

    fn add_link(&self, _name: &str, _kind: &LinkKind) -> io::Result<()> {
        panic!("add_link must not be reached when lookup fails")
    }

    fn delete_link(&self, _link: &Link) -> io::Result<()> {
        panic!("delete_link must not be reached when lookup fails")
    }

    fn add_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        panic!("add_address must not be reached when lookup fails")
    }

    fn delete_address(&self, _link: &Link, _addr: IpAddr, _prefix_len: u8) -> io::Result<()> {
        panic!("delete_address must not be reached when lookup fails")
    }

    fn list_routes(&self, _filter: &RouteFilter) -> io::Result<Vec<Route>> {
        panic!("list_routes must not be reached when lookup fails")
    }

    fn is_duplicate_resource_error(&self, _err: &io::Error) -> bool {
        false
    }

    fn is_missing_resource_error(&self, _err: &io::Error) -> bool {
        false
    }
}

/// A handle over a fresh loopback-only MemoryKernel, plus the kernel for inspection
pub fn memory_handle() -> (NetStateHandle, MemoryKernel) {
    let kernel = MemoryKernel::with_loopback();
    (NetStateHandle::new(Box::new(kernel.clone())), kernel)
}

pub fn ip(s: &str) -> IpAddr {
    s.parse().expect("valid IP literal in test")
}

pub fn set_of(items: &[&str]) -> HashSet<String> {
    items.iter().map(|s| s.to_string()).collect()
}
