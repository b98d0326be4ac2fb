// # ipvs-netstate-core
//
// Kernel network-state accessor for an IPVS service-routing controller.
//
// ## Architecture Overview
//
// - **NetStateHandle**: the five operations a reconciliation loop calls
//   (ensure/unbind address, ensure/delete dummy device, list local addresses)
// - **NetworkKernel**: trait for the injected kernel-access capability
// - **MemoryKernel**: in-process NetworkKernel for tests and embedding
// - **NetStateConfig**: serde configuration (dummy device name, families)
//
// ## Design Principles
//
// 1. **Stateless**: nothing is cached between calls; kernel state is re-read
// 2. **Idempotent ensures**: "already exists" is success, flagged
// 3. **Strict deletes**: deleting something missing is an error
// 4. **No retries**: recovery belongs to the caller
// 5. **Injected kernel**: the real netlink socket is opened in exactly one place

pub mod config;
pub mod error;
pub mod handle;
pub mod kernel;
pub mod model;
pub mod traits;

// Re-export core types for convenience
pub use config::NetStateConfig;
pub use error::{Error, ErrorKind, Operation, Result};
pub use handle::NetStateHandle;
pub use kernel::MemoryKernel;
pub use model::{AddressFamily, Link, LinkKind, Route, RouteFilter};
pub use traits::NetworkKernel;
