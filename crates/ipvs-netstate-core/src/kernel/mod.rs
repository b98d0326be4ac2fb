//! Kernel-access implementations that live in the core crate
//!
//! The rtnetlink implementation lives in `ipvs-netstate-netlink`.

pub mod memory;

pub use memory::MemoryKernel;
