use nvmecheck_queues::{HostMemory, QueueDevice};

use crate::config::HarnessConfig;
use crate::error::Result;
use crate::namespace::NamespaceCatalog;
use crate::registry::ResourceRegistry;

/// Host memory backing rings, PRP lists and payload buffers for one group.
const HOST_MEM_BYTES: usize = 8 * 1024 * 1024;

/// Descriptive metadata carried by every case and echoed into the report.
#[derive(Debug, Clone, Copy)]
pub struct TestInfo {
    pub group: &'static str,
    pub name: &'static str,
    /// Specification clause the case checks compliance against.
    pub compliance: &'static str,
    pub short_desc: &'static str,
    pub long_desc: &'static str,
}

/// One conformance scenario.
///
/// Cases are construct-once: the trait deliberately has no `Clone` bound and
/// implementations must not derive one, so a case instance can own resources
/// without any risk of a copy outliving them.
pub trait TestCase {
    fn info(&self) -> &TestInfo;
    fn run(&mut self, ctx: &mut TestContext) -> Result<()>;
}

/// Everything a case may touch, scoped to one group execution.
///
/// This is the explicit replacement for process-wide globals: the device
/// under test, the host memory arena, the write-once resource registry and
/// the read-only namespace catalog all live here and are handed to each
/// case in turn.
pub struct TestContext {
    pub device: Box<dyn QueueDevice>,
    pub mem: HostMemory,
    pub registry: ResourceRegistry,
    pub catalog: NamespaceCatalog,
    pub config: HarnessConfig,
}

impl TestContext {
    pub fn new(device: Box<dyn QueueDevice>, config: HarnessConfig) -> Self {
        let catalog = NamespaceCatalog::from_device(device.as_ref());
        Self {
            device,
            mem: HostMemory::new(HOST_MEM_BYTES),
            registry: ResourceRegistry::new(),
            catalog,
            config,
        }
    }
}
