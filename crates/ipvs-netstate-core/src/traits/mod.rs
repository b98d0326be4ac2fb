//! Core traits for network-state access
//!
//! - [`NetworkKernel`]: the kernel-access capability injected into
//!   [`NetStateHandle`](crate::NetStateHandle)

pub mod kernel;

pub use kernel::NetworkKernel;
