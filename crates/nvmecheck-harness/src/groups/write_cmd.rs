//! NVM write command group: queue setup plus the metadata-pointer case.

use nvmecheck_queues::{prp, Command, DataBuffer, QueuePair};

use crate::case::{TestCase, TestContext, TestInfo};
use crate::error::Result;
use crate::io::{self, DumpSite};
use crate::runner::GroupRunner;

pub const GROUP: &str = "nvm-write-cmd";

/// Registry id of the IO queue pair the setup case creates for this group.
pub const IO_QUEUE_PAIR_OBJ: &str = "nvm-write-cmd/io-queue-pair";

/// The full group in declaration order.
pub fn runner() -> GroupRunner {
    let mut runner = GroupRunner::new(GROUP);
    runner.add(Box::new(CreateResources::new()));
    runner.add(Box::new(IgnoreMetaPtrBare::new()));
    runner
}

/// Setup case: creates the group's IO queue pair and registers it for the
/// cases that follow.
pub struct CreateResources {
    info: TestInfo,
}

impl CreateResources {
    pub fn new() -> Self {
        Self {
            info: TestInfo {
                group: GROUP,
                name: "create_resources",
                compliance: "revision 1.0b, section 7",
                short_desc: "Create the group's IO queue pair",
                long_desc: "Creates one submission/completion queue pair at the \
                            configured queue id and capacity and registers it so \
                            subsequent cases in the group can issue IO through it.",
            },
        }
    }
}

impl Default for CreateResources {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCase for CreateResources {
    fn info(&self) -> &TestInfo {
        &self.info
    }

    fn run(&mut self, ctx: &mut TestContext) -> Result<()> {
        let pair = QueuePair::create(
            ctx.device.as_mut(),
            &mut ctx.mem,
            ctx.config.io_qid,
            ctx.config.io_queue_capacity,
        )?;
        ctx.registry.register(IO_QUEUE_PAIR_OBJ, pair)?;
        Ok(())
    }
}

/// For every bare namespace, a write must succeed no matter what the
/// metadata pointer field contains.
pub struct IgnoreMetaPtrBare {
    info: TestInfo,
}

impl IgnoreMetaPtrBare {
    pub fn new() -> Self {
        Self {
            info: TestInfo {
                group: GROUP,
                name: "ignore_meta_ptr_bare",
                compliance: "revision 1.0b, section 4,6",
                short_desc: "Metadata pointer ignored on bare namespaces",
                long_desc: "The metadata pointer is only meaningful when metadata \
                            travels separately from data. For every bare namespace, \
                            issue a one-block write at LBA 0 with the metadata \
                            pointer words forced to all ones; a compliant device \
                            completes it successfully.",
            },
        }
    }
}

impl Default for IgnoreMetaPtrBare {
    fn default() -> Self {
        Self::new()
    }
}

impl TestCase for IgnoreMetaPtrBare {
    fn info(&self) -> &TestInfo {
        &self.info
    }

    fn run(&mut self, ctx: &mut TestContext) -> Result<()> {
        let pair = ctx.registry.get(IO_QUEUE_PAIR_OBJ)?;
        let mut pair = pair.borrow_mut();

        let site = DumpSite {
            dir: &ctx.config.dump_dir,
            group: self.info.group,
            test: self.info.name,
        };
        io::require_empty_cq(&pair, &ctx.mem, &site)?;

        for nsid in ctx.catalog.bare_namespaces() {
            let lba_data_size = ctx.catalog.identify(nsid)?.lba_data_size;

            let buffer = DataBuffer::zeroed(&mut ctx.mem, lba_data_size as usize)?;
            let mut cmd = Command::write();
            cmd.set_prp_buffer(prp::PRP1_PAGE | prp::PRP2_PAGE | prp::PRP2_LIST, buffer);
            cmd.set_block_count(1)?;
            cmd.set_start_lba(0);
            // Poison the metadata pointer words; a compliant device must not
            // look at them for a bare-format namespace.
            cmd.set_dword(4, 0xffff_ffff)?;
            cmd.set_dword(5, 0xffff_ffff)?;
            cmd.set_nsid(nsid);

            let label = format!("namspc{nsid}");
            io::send_and_reap(
                ctx.device.as_mut(),
                &mut ctx.mem,
                &mut pair,
                cmd,
                ctx.config.cmd_timeout,
                &label,
                true,
            )?;
        }
        Ok(())
    }
}
