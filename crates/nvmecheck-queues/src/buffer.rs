use crate::error::{QueueError, Result};
use crate::memory::{HostMemory, MemoryBus};

/// A page-aligned, zero-initialized payload region.
///
/// The buffer is reserved from [`HostMemory`] at construction and is not
/// resizable. Ownership moves into the [`crate::Command`] that carries it as
/// a data pointer; the queue pair holds the command (and with it the buffer)
/// until the matching completion is reaped, so the region cannot be reused
/// while a transfer may still touch it.
#[derive(Debug)]
pub struct DataBuffer {
    addr: u64,
    len: usize,
}

impl DataBuffer {
    /// Reserves `len` bytes of zeroed, page-aligned memory.
    ///
    /// A zero-length request is an error: a command with a data pointer
    /// always transfers at least one byte.
    pub fn zeroed(mem: &mut HostMemory, len: usize) -> Result<Self> {
        if len == 0 {
            return Err(QueueError::Allocation { requested: 0 });
        }
        let addr = mem
            .alloc_pages(len)
            .ok_or(QueueError::Allocation { requested: len })?;
        Ok(Self { addr, len })
    }

    pub fn addr(&self) -> u64 {
        self.addr
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Fills the start of the buffer with `data`.
    pub fn write(&self, mem: &mut HostMemory, data: &[u8]) -> Result<()> {
        let len = data.len().min(self.len);
        mem.write_physical(self.addr, &data[..len])?;
        Ok(())
    }

    /// Reads the whole buffer back out.
    pub fn read(&self, mem: &HostMemory) -> Result<Vec<u8>> {
        let mut out = vec![0u8; self.len];
        mem.read_physical(self.addr, &mut out)?;
        Ok(out)
    }
}
