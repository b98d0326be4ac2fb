//! Network state handle
//!
//! The façade a reconciliation loop calls. It holds no state between
//! calls: every operation re-reads the kernel through the injected
//! [`NetworkKernel`] before acting.
//!
//! ## Idempotency
//!
//! - `ensure_*` operations succeed with `true` when the target already
//!   exists
//! - `unbind_address` and `delete_dummy_device` fail when the target is
//!   missing, so callers learn that their view of kernel state was wrong

use std::collections::HashSet;
use std::net::IpAddr;

use tracing::{debug, info, warn};

use crate::config::NetStateConfig;
use crate::error::{Error, Operation, Result};
use crate::model::{AddressFamily, Link, LinkKind, RouteFilter};
use crate::traits::NetworkKernel;

/// Stateless façade over the kernel's link, address, and route tables
pub struct NetStateHandle {
    kernel: Box<dyn NetworkKernel>,
    address_family: AddressFamily,
}

impl NetStateHandle {
    /// Create a handle that reports local addresses of every family
    pub fn new(kernel: Box<dyn NetworkKernel>) -> Self {
        Self {
            kernel,
            address_family: AddressFamily::All,
        }
    }

    /// Create a handle honouring the settings in `config`
    pub fn with_config(kernel: Box<dyn NetworkKernel>, config: &NetStateConfig) -> Self {
        Self {
            kernel,
            address_family: config.address_family,
        }
    }

    /// Bind `address` to `device` unless it is already bound
    ///
    /// The address is added with a full-length host prefix (/32 or /128).
    ///
    /// # Returns
    ///
    /// - `Ok(false)`: the address was bound by this call
    /// - `Ok(true)`: the kernel already had the binding
    pub fn ensure_address_bind(&self, address: &str, device: &str) -> Result<bool> {
        let addr = parse_address(address)?;
        let link = self.require_link(device)?;

        debug!("Binding address {} to interface {}", addr, device);
        match self.kernel.add_address(&link, addr, host_prefix_len(&addr)) {
            Ok(()) => {
                info!("Bound address {} to interface {}", addr, device);
                Ok(false)
            }
            Err(e) if self.kernel.is_duplicate_resource_error(&e) => {
                debug!("Address {} already bound to interface {}", addr, device);
                Ok(true)
            }
            Err(e) => Err(Error::operation_failed(
                Operation::BindAddress,
                format!("address {address} on interface {device}"),
                e,
            )),
        }
    }

    /// Remove the binding of `address` from `device`
    ///
    /// A binding that does not exist is an [`Error::AddressNotBound`].
    pub fn unbind_address(&self, address: &str, device: &str) -> Result<()> {
        let addr = parse_address(address)?;
        let link = self.require_link(device)?;

        debug!("Unbinding address {} from interface {}", addr, device);
        match self
            .kernel
            .delete_address(&link, addr, host_prefix_len(&addr))
        {
            Ok(()) => {
                info!("Unbound address {} from interface {}", addr, device);
                Ok(())
            }
            Err(e) if self.kernel.is_missing_resource_error(&e) => Err(Error::AddressNotBound {
                address: address.to_string(),
                device: device.to_string(),
            }),
            Err(e) => Err(Error::operation_failed(
                Operation::UnbindAddress,
                format!("address {address} on interface {device}"),
                e,
            )),
        }
    }

    /// Create a dummy device named `device` unless a link with that name exists
    ///
    /// Any existing link satisfies the check, whatever its kind. The new
    /// device is left administratively down.
    ///
    /// # Returns
    ///
    /// - `Ok(false)`: the device was created by this call
    /// - `Ok(true)`: a link with that name already existed
    pub fn ensure_dummy_device(&self, device: &str) -> Result<bool> {
        if let Some(link) = self.lookup_link(device)? {
            debug!(
                "Interface {} already exists (index {}, type {})",
                device, link.index, link.kind
            );
            return Ok(true);
        }

        match self.kernel.add_link(device, &LinkKind::Dummy) {
            Ok(()) => {
                info!("Created dummy device {}", device);
                Ok(false)
            }
            // Lost a race with another creator between lookup and create
            Err(e) if self.kernel.is_duplicate_resource_error(&e) => {
                debug!("Dummy device {} appeared concurrently", device);
                Ok(true)
            }
            Err(e) => Err(Error::operation_failed(
                Operation::CreateLink,
                format!("interface {device}"),
                e,
            )),
        }
    }

    /// Delete the dummy device named `device`
    ///
    /// Refuses with [`Error::TypeMismatch`] when the link is not a dummy,
    /// leaving it untouched.
    pub fn delete_dummy_device(&self, device: &str) -> Result<()> {
        let link = self.require_link(device)?;

        if !link.kind.is_dummy() {
            warn!(
                "Refusing to delete interface {}: expected dummy, got {}",
                device, link.kind
            );
            return Err(Error::TypeMismatch {
                device: device.to_string(),
                actual: link.kind,
            });
        }

        self.kernel.delete_link(&link).map_err(|e| {
            Error::operation_failed(Operation::DeleteLink, format!("interface {device}"), e)
        })?;
        info!("Deleted dummy device {}", device);
        Ok(())
    }

    /// Addresses this host currently owns, according to the local route table
    ///
    /// An empty `filter_device` means every interface; otherwise only
    /// routes leaving through that interface count.
    pub fn get_local_addresses(&self, filter_device: &str) -> Result<HashSet<String>> {
        let mut filter = RouteFilter::local_addresses().with_family(self.address_family);
        if !filter_device.is_empty() {
            let link = self.require_link(filter_device)?;
            filter = filter.with_output_interface(link.index);
        }

        let routes = self.kernel.list_routes(&filter).map_err(|e| {
            let target = if filter_device.is_empty() {
                "all interfaces".to_string()
            } else {
                format!("interface {filter_device}")
            };
            Error::operation_failed(Operation::ListRoutes, target, e)
        })?;

        let addresses: HashSet<String> = routes
            .iter()
            .filter_map(|route| route.preferred_source)
            .map(|addr| addr.to_string())
            .collect();
        debug!(
            "Found {} local address(es) on {}",
            addresses.len(),
            if filter_device.is_empty() { "all interfaces" } else { filter_device }
        );
        Ok(addresses)
    }

    fn lookup_link(&self, device: &str) -> Result<Option<Link>> {
        self.kernel.link_by_name(device).map_err(|e| {
            Error::operation_failed(Operation::LookupLink, format!("interface {device}"), e)
        })
    }

    fn require_link(&self, device: &str) -> Result<Link> {
        self.lookup_link(device)?
            .ok_or_else(|| Error::not_found(device))
    }
}

impl std::fmt::Debug for NetStateHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NetStateHandle")
            .field("address_family", &self.address_family)
            .finish_non_exhaustive()
    }
}

fn parse_address(address: &str) -> Result<IpAddr> {
    address
        .parse::<IpAddr>()
        .map_err(|_| Error::invalid_input(address))
}

fn host_prefix_len(addr: &IpAddr) -> u8 {
    match addr {
        IpAddr::V4(_) => 32,
        IpAddr::V6(_) => 128,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::MemoryKernel;

    fn handle() -> (NetStateHandle, MemoryKernel) {
        let kernel = MemoryKernel::with_loopback();
        (NetStateHandle::new(Box::new(kernel.clone())), kernel)
    }

    #[test]
    fn host_prefix_is_full_length() {
        assert_eq!(host_prefix_len(&"10.0.0.1".parse().unwrap()), 32);
        assert_eq!(host_prefix_len(&"fd00::1".parse().unwrap()), 128);
    }

    #[test]
    fn parse_rejects_hostnames_and_cidrs() {
        for bad in ["not-an-ip", "10.0.0.1/32", "", " 10.0.0.1", "localhost"] {
            assert!(matches!(
                parse_address(bad),
                Err(Error::InvalidAddress { .. })
            ));
        }
    }

    #[test]
    fn bind_twice_reports_existing() {
        let (handle, kernel) = handle();
        handle.ensure_dummy_device("kube-ipvs0").unwrap();
        assert!(!handle.ensure_address_bind("10.96.0.10", "kube-ipvs0").unwrap());
        assert!(handle.ensure_address_bind("10.96.0.10", "kube-ipvs0").unwrap());
        assert_eq!(kernel.addresses("kube-ipvs0").len(), 1);
    }

    #[test]
    fn bind_to_missing_device_is_not_found() {
        let (handle, _) = handle();
        let err = handle.ensure_address_bind("10.0.0.1", "nope0").unwrap_err();
        assert!(matches!(err, Error::DeviceNotFound { ref device } if device == "nope0"));
    }

    #[test]
    fn unbind_unknown_address_is_not_found() {
        let (handle, _) = handle();
        handle.ensure_dummy_device("kube-ipvs0").unwrap();
        let err = handle.unbind_address("10.0.0.1", "kube-ipvs0").unwrap_err();
        assert!(matches!(err, Error::AddressNotBound { .. }));
        assert!(err.is_not_found());
    }

    #[test]
    fn ensure_dummy_accepts_any_existing_link() {
        let (handle, kernel) = handle();
        // lo is not a dummy device, yet ensure reports it as existing
        assert!(handle.ensure_dummy_device("lo").unwrap());
        assert_eq!(kernel.links().len(), 1);
    }

    #[test]
    fn delete_dummy_refuses_physical_link() {
        let (handle, kernel) = handle();
        let err = handle.delete_dummy_device("lo").unwrap_err();
        assert!(matches!(
            err,
            Error::TypeMismatch { actual: LinkKind::Device, .. }
        ));
        assert!(kernel.links().iter().any(|l| l.name == "lo"));
    }

    #[test]
    fn local_addresses_filtered_by_device() {
        let (handle, _) = handle();
        handle.ensure_dummy_device("kube-ipvs0").unwrap();
        handle.ensure_address_bind("10.96.0.1", "kube-ipvs0").unwrap();

        let all = handle.get_local_addresses("").unwrap();
        // ::1 has no preferred source in the local table, so it never shows
        let expected: HashSet<String> = ["127.0.0.1", "10.96.0.1"]
            .into_iter()
            .map(String::from)
            .collect();
        assert_eq!(all, expected);

        let dummy = handle.get_local_addresses("kube-ipvs0").unwrap();
        assert_eq!(dummy, HashSet::from(["10.96.0.1".to_string()]));
    }

    #[test]
    fn configured_family_narrows_listing() {
        // IPv6 local routes have no preferred source, so v6 discovery is empty
        let kernel = MemoryKernel::with_loopback();
        let config = NetStateConfig::new().with_address_family(AddressFamily::V6);
        let handle = NetStateHandle::with_config(Box::new(kernel), &config);
        assert!(handle.get_local_addresses("").unwrap().is_empty());

        let config = NetStateConfig::new().with_address_family(AddressFamily::V4);
        let handle = NetStateHandle::with_config(Box::new(MemoryKernel::with_loopback()), &config);
        assert_eq!(
            handle.get_local_addresses("").unwrap(),
            HashSet::from(["127.0.0.1".to_string()])
        );
    }
}
