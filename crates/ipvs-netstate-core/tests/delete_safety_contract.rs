//! Contract Test: Strict Deletes
//!
//! Constraints verified:
//! - Deleting or unbinding something that does not exist is an error
//! - delete_dummy_device never removes a non-dummy link
//!
//! If this test fails, a caller could destroy a physical interface or
//! miss drift between its model and the kernel.

mod common;

use common::*;
use ipvs_netstate_core::{Error, ErrorKind, LinkKind, NetworkKernel};

#[test]
fn delete_dummy_device_refuses_non_dummy() {
    let (handle, kernel) = memory_handle();
    kernel.add_device("eth0");

    for name in ["lo", "eth0"] {
        let err = handle.delete_dummy_device(name).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::TypeMismatch);
        assert!(kernel.links().iter().any(|l| l.name == name));
    }
}

#[test]
fn delete_dummy_device_refuses_other_virtual_kinds() {
    let (handle, kernel) = memory_handle();
    kernel
        .add_link("br0", &LinkKind::Other("bridge".into()))
        .unwrap();

    let err = handle.delete_dummy_device("br0").unwrap_err();
    assert!(matches!(
        err,
        Error::TypeMismatch { ref actual, .. } if *actual == LinkKind::Other("bridge".into())
    ));
    assert!(err.to_string().contains("bridge"));
}

#[test]
fn delete_dummy_device_missing_is_not_found() {
    let (handle, _) = memory_handle();
    let err = handle.delete_dummy_device("kube-ipvs0").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
}

#[test]
fn delete_dummy_device_removes_device_and_its_addresses() {
    let (handle, kernel) = memory_handle();
    handle.ensure_dummy_device("kube-ipvs0").unwrap();
    handle.ensure_address_bind("10.96.0.1", "kube-ipvs0").unwrap();

    handle.delete_dummy_device("kube-ipvs0").unwrap();

    assert!(kernel.links().iter().all(|l| l.name != "kube-ipvs0"));
    assert!(!handle.get_local_addresses("").unwrap().contains("10.96.0.1"));
    // Second delete: the device is gone
    assert!(handle.delete_dummy_device("kube-ipvs0").unwrap_err().is_not_found());
}

#[test]
fn unbind_never_bound_address_is_error() {
    let (handle, _) = memory_handle();
    handle.ensure_dummy_device("kube-ipvs0").unwrap();

    for address in ["10.96.0.1", "fd00::1"] {
        let err = handle.unbind_address(address, "kube-ipvs0").unwrap_err();
        assert!(matches!(
            err,
            Error::AddressNotBound { address: ref a, ref device } if a == address && device == "kube-ipvs0"
        ));
    }
}

#[test]
fn unbind_address_bound_elsewhere_is_error() {
    let (handle, _) = memory_handle();
    handle.ensure_dummy_device("ipvs-a").unwrap();
    handle.ensure_dummy_device("ipvs-b").unwrap();
    handle.ensure_address_bind("10.96.0.1", "ipvs-a").unwrap();

    let err = handle.unbind_address("10.96.0.1", "ipvs-b").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert!(handle.get_local_addresses("ipvs-a").unwrap().contains("10.96.0.1"));
}

#[test]
fn unbind_from_missing_device_is_not_found() {
    let (handle, _) = memory_handle();
    let err = handle.unbind_address("10.96.0.1", "kube-ipvs0").unwrap_err();
    assert!(matches!(err, Error::DeviceNotFound { .. }));
}
