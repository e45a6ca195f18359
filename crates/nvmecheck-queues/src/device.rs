use crate::memory::{MemoryBus, MemoryError};

/// Ring geometry handed to the device when a queue pair is created.
#[derive(Debug, Clone, Copy)]
pub struct QueuePairConfig {
    pub qid: u16,
    pub sq_addr: u64,
    pub cq_addr: u64,
    /// Ring slots per queue. One slot is slack (head == tail means empty), so
    /// the pair sustains `ring_entries - 1` outstanding commands.
    pub ring_entries: u16,
}

/// Geometry of one namespace as reported by device identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceDesc {
    pub nsid: u32,
    pub total_blocks: u64,
    /// Bytes of addressable data per logical block, excluding metadata.
    pub lba_data_size: u32,
    /// Bytes of metadata per logical block (zero when the format carries none).
    pub metadata_size: u32,
    /// True when metadata is interleaved with data (extended LBA); the
    /// metadata pointer field is only meaningful when this is false.
    pub extended_lba: bool,
}

/// The opaque driver-call boundary to the device under test.
///
/// Everything crosses as bytes through the shared [`MemoryBus`]: the harness
/// writes command images into submission rings and reads completion entries
/// out of completion rings; the device is only ever told "the tail moved",
/// "the head moved", or "you may make progress now".
///
/// Implementations must post completions in submission order per queue and
/// must set the phase tag correctly on every entry; the reap path relies on
/// the phase convention, not on zeroed memory.
pub trait QueueDevice {
    /// Records ring geometry for a new queue pair.
    fn configure_queue_pair(&mut self, config: QueuePairConfig);

    /// Submission doorbell: the SQ tail for `qid` is now `tail`.
    fn sq_doorbell(
        &mut self,
        qid: u16,
        tail: u16,
        mem: &mut dyn MemoryBus,
    ) -> Result<(), MemoryError>;

    /// Completion doorbell: the harness has consumed entries up to `head`.
    fn cq_doorbell(&mut self, qid: u16, head: u16);

    /// Gives a deferred device a chance to post pending completions. Called
    /// from the reap wait loop; a device with nothing pending does nothing.
    fn poll(&mut self, mem: &mut dyn MemoryBus) -> Result<(), MemoryError>;

    /// Namespace inventory from device identification, ordered by nsid.
    fn namespaces(&self) -> Vec<NamespaceDesc>;
}
