use nvmecheck_queues::{NamespaceDesc, QueueDevice};

use crate::error::{Result, TestError};

/// How a namespace format places metadata relative to data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamespaceFormat {
    /// Metadata, if any, travels separately from the data buffer; the
    /// metadata pointer field is how it would be addressed.
    Bare,
    /// Metadata is interleaved with data in the addressed buffer; the
    /// metadata pointer field must be disregarded by the device.
    ExtendedLba,
}

/// Per-namespace geometry, immutable after device identification.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NamespaceInfo {
    pub nsid: u32,
    pub total_blocks: u64,
    pub lba_data_size: u32,
    pub metadata_size: u32,
    pub format: NamespaceFormat,
}

impl NamespaceInfo {
    pub fn from_desc(desc: &NamespaceDesc) -> Self {
        Self {
            nsid: desc.nsid,
            total_blocks: desc.total_blocks,
            lba_data_size: desc.lba_data_size,
            metadata_size: desc.metadata_size,
            format: if desc.extended_lba {
                NamespaceFormat::ExtendedLba
            } else {
                NamespaceFormat::Bare
            },
        }
    }

    pub fn is_bare(&self) -> bool {
        self.format == NamespaceFormat::Bare
    }
}

/// Read-only catalog of the device's namespaces, ordered by nsid.
///
/// Built once per run. An nsid the catalog itself enumerated but cannot
/// identify is an internal inconsistency and fails hard; a conformance run
/// must never quietly skip a namespace it promised to cover.
pub struct NamespaceCatalog {
    entries: Vec<NamespaceInfo>,
}

impl NamespaceCatalog {
    pub fn from_device(device: &dyn QueueDevice) -> Self {
        let mut entries: Vec<NamespaceInfo> = device
            .namespaces()
            .iter()
            .map(NamespaceInfo::from_desc)
            .collect();
        entries.sort_by_key(|info| info.nsid);
        Self { entries }
    }

    pub fn iter(&self) -> impl Iterator<Item = &NamespaceInfo> {
        self.entries.iter()
    }

    /// Ordered nsids of every namespace whose format does not interleave
    /// metadata with data.
    pub fn bare_namespaces(&self) -> Vec<u32> {
        self.entries
            .iter()
            .filter(|info| info.is_bare())
            .map(|info| info.nsid)
            .collect()
    }

    /// Identify data for `nsid`; absence is fatal, not a soft miss.
    pub fn identify(&self, nsid: u32) -> Result<&NamespaceInfo> {
        self.entries
            .iter()
            .find(|info| info.nsid == nsid)
            .ok_or(TestError::InconsistentNamespaceState { nsid })
    }
}
