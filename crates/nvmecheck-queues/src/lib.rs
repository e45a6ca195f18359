//! Queue-level NVMe command machinery for conformance testing.
//!
//! This crate owns the device-facing half of the `nvmecheck` harness: host
//! memory and page-aligned payload buffers, 64-byte command images, the
//! submission/completion ring pair with phase-tag reaping, and the opaque
//! device boundary over which commands travel.
//!
//! The only external inputs are a [`MemoryBus`] (the DMA seam) and a
//! [`QueueDevice`] (the driver-call seam). Anything that satisfies those two
//! traits can sit on the far side of the doorbell: real hardware behind an
//! ioctl shim, or the in-process [`sim::SimController`] used by the harness's
//! own tests.
//!
//! Nothing here retries or masks device behavior. A command either completes
//! and is handed back verbatim, or the caller times out waiting; status
//! interpretation belongs to the test framework.

mod buffer;
mod command;
mod completion;
mod device;
mod error;
mod memory;
mod queue;
pub mod sim;

pub use buffer::DataBuffer;
pub use command::{prp, Command, Opcode};
pub use completion::{CompletionEntry, Status};
pub use device::{NamespaceDesc, QueueDevice, QueuePairConfig};
pub use error::{QueueError, Result};
pub use memory::{HostMemory, MemoryBus, MemoryError};
pub use queue::QueuePair;

/// Host/device page size assumed by PRP math and buffer alignment.
pub const PAGE_SIZE: usize = 4096;

/// Size of one encoded command on the wire.
pub const COMMAND_BYTES: usize = 64;

/// Size of one completion entry on the wire.
pub const COMPLETION_BYTES: usize = 16;
