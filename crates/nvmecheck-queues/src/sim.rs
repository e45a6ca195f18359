//! In-process device model used by the harness's own tests.
//!
//! `SimController` speaks the same byte-level protocol a real controller
//! would: it reads 64-byte command images out of the submission ring when the
//! doorbell moves, executes them against per-namespace sector stores, and
//! posts 16-byte completion entries with the correct phase tag. Knobs select
//! when completions appear (immediately, after N poll calls, or never) and
//! whether a fixed status overrides the real outcome, which is what the
//! timeout and failure-status properties of the harness are tested against.

use std::collections::{BTreeMap, HashMap, VecDeque};

use crate::completion::{CompletionEntry, Status};
use crate::device::{NamespaceDesc, QueueDevice, QueuePairConfig};
use crate::memory::{MemoryBus, MemoryError};
use crate::{COMMAND_BYTES, COMPLETION_BYTES, PAGE_SIZE};

/// When the simulated device posts completions for accepted commands.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompletionPolicy {
    /// Post while the submission doorbell write is still in progress.
    Immediate,
    /// Post after the harness has called `poll` this many times.
    AfterPolls(u32),
    /// Never post; commands are consumed and silently swallowed.
    Withhold,
}

#[derive(Debug, Clone, Copy)]
struct SimQueue {
    config: QueuePairConfig,
    sq_head: u16,
    sq_tail: u16,
    cq_head: u16,
    cq_tail: u16,
    phase: bool,
}

struct SimNamespace {
    desc: NamespaceDesc,
    data: Vec<u8>,
}

#[derive(Debug, Clone, Copy)]
struct PendingCompletion {
    qid: u16,
    cid: u16,
    sq_head: u16,
    status: Status,
}

struct Deferred {
    record: PendingCompletion,
    polls_left: u32,
}

/// Fields of a command image the simulator consumes.
#[derive(Debug, Clone, Copy)]
struct SimCommand {
    opcode: u8,
    cid: u16,
    nsid: u32,
    prp1: u64,
    prp2: u64,
    cdw10: u32,
    cdw11: u32,
    cdw12: u32,
}

impl SimCommand {
    fn parse(bytes: [u8; COMMAND_BYTES]) -> Self {
        Self {
            opcode: bytes[0],
            cid: u16::from_le_bytes(bytes[2..4].try_into().unwrap()),
            nsid: u32::from_le_bytes(bytes[4..8].try_into().unwrap()),
            prp1: u64::from_le_bytes(bytes[24..32].try_into().unwrap()),
            prp2: u64::from_le_bytes(bytes[32..40].try_into().unwrap()),
            cdw10: u32::from_le_bytes(bytes[40..44].try_into().unwrap()),
            cdw11: u32::from_le_bytes(bytes[44..48].try_into().unwrap()),
            cdw12: u32::from_le_bytes(bytes[48..52].try_into().unwrap()),
        }
    }
}

/// A well-behaved simulated controller.
///
/// "Well-behaved" includes the property the flagship conformance case
/// verifies: the write and read paths never look at the metadata pointer
/// words, so commands against bare-format namespaces succeed no matter what
/// the test injected there.
pub struct SimController {
    queues: HashMap<u16, SimQueue>,
    namespaces: BTreeMap<u32, SimNamespace>,
    policy: CompletionPolicy,
    forced_status: Option<Status>,
    deferred: VecDeque<Deferred>,
}

impl SimController {
    pub fn new() -> Self {
        Self {
            queues: HashMap::new(),
            namespaces: BTreeMap::new(),
            policy: CompletionPolicy::Immediate,
            forced_status: None,
            deferred: VecDeque::new(),
        }
    }

    /// Adds a namespace backed by a zeroed sector store.
    pub fn add_namespace(&mut self, desc: NamespaceDesc) {
        let bytes = desc.total_blocks as usize * desc.lba_data_size as usize;
        self.namespaces.insert(
            desc.nsid,
            SimNamespace {
                desc,
                data: vec![0u8; bytes],
            },
        );
    }

    pub fn set_completion_policy(&mut self, policy: CompletionPolicy) {
        self.policy = policy;
    }

    /// Forces every subsequent completion to carry `status` regardless of
    /// what the command would actually have produced.
    pub fn set_forced_status(&mut self, status: Option<Status>) {
        self.forced_status = status;
    }

    /// Raw view of one stored block, for asserting that a transfer landed.
    pub fn block(&self, nsid: u32, lba: u64) -> Option<&[u8]> {
        let ns = self.namespaces.get(&nsid)?;
        let bs = ns.desc.lba_data_size as usize;
        let start = usize::try_from(lba).ok()?.checked_mul(bs)?;
        ns.data.get(start..start + bs)
    }

    fn execute(&mut self, cmd: &SimCommand, mem: &mut dyn MemoryBus) -> Status {
        match cmd.opcode {
            0x00 => Status::SUCCESS, // flush: the store is always durable
            0x01 => self.execute_write(cmd, mem),
            0x02 => self.execute_read(cmd, mem),
            _ => Status::INVALID_OPCODE,
        }
    }

    fn execute_write(&mut self, cmd: &SimCommand, mem: &mut dyn MemoryBus) -> Status {
        let Some(ns) = self.namespaces.get_mut(&cmd.nsid) else {
            return Status::INVALID_NAMESPACE;
        };
        let (offset, len) = match transfer_span(&ns.desc, cmd) {
            Ok(span) => span,
            Err(status) => return status,
        };
        let segments = match prp_segments(mem, cmd.prp1, cmd.prp2, len) {
            Ok(segments) => segments,
            Err(status) => return status,
        };

        let mut cursor = offset;
        for (addr, seg_len) in segments {
            if mem
                .read_physical(addr, &mut ns.data[cursor..cursor + seg_len])
                .is_err()
            {
                return Status::INVALID_FIELD;
            }
            cursor += seg_len;
        }
        tracing::debug!(nsid = cmd.nsid, cdw10 = cmd.cdw10, len, "sim write");
        Status::SUCCESS
    }

    fn execute_read(&mut self, cmd: &SimCommand, mem: &mut dyn MemoryBus) -> Status {
        let Some(ns) = self.namespaces.get(&cmd.nsid) else {
            return Status::INVALID_NAMESPACE;
        };
        let (offset, len) = match transfer_span(&ns.desc, cmd) {
            Ok(span) => span,
            Err(status) => return status,
        };
        let segments = match prp_segments(mem, cmd.prp1, cmd.prp2, len) {
            Ok(segments) => segments,
            Err(status) => return status,
        };

        let mut cursor = offset;
        for (addr, seg_len) in segments {
            if mem
                .write_physical(addr, &ns.data[cursor..cursor + seg_len])
                .is_err()
            {
                return Status::INVALID_FIELD;
            }
            cursor += seg_len;
        }
        Status::SUCCESS
    }

    fn post_completion(
        &mut self,
        record: PendingCompletion,
        mem: &mut dyn MemoryBus,
    ) -> Result<(), MemoryError> {
        let Some(q) = self.queues.get_mut(&record.qid) else {
            return Ok(());
        };
        let next_tail = (q.cq_tail + 1) % q.config.ring_entries;
        if next_tail == q.cq_head {
            // CQ full; the host is expected to keep outstanding <= capacity,
            // so a full ring means a harness bug. Drop rather than corrupt.
            return Ok(());
        }

        let entry = CompletionEntry {
            dw0: 0,
            sq_head: record.sq_head,
            sq_id: record.qid,
            cid: record.cid,
            status: record.status,
            phase: q.phase,
        };
        mem.write_physical(
            q.config.cq_addr + q.cq_tail as u64 * COMPLETION_BYTES as u64,
            &entry.to_bytes(),
        )?;
        q.cq_tail = next_tail;
        if q.cq_tail == 0 {
            q.phase = !q.phase;
        }
        Ok(())
    }
}

impl Default for SimController {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueDevice for SimController {
    fn configure_queue_pair(&mut self, config: QueuePairConfig) {
        self.queues.insert(
            config.qid,
            SimQueue {
                config,
                sq_head: 0,
                sq_tail: 0,
                cq_head: 0,
                cq_tail: 0,
                phase: true,
            },
        );
    }

    fn sq_doorbell(
        &mut self,
        qid: u16,
        tail: u16,
        mem: &mut dyn MemoryBus,
    ) -> Result<(), MemoryError> {
        let Some(q) = self.queues.get_mut(&qid) else {
            return Ok(());
        };
        q.sq_tail = tail;
        let config = q.config;

        loop {
            let (head, tail) = {
                let q = &self.queues[&qid];
                (q.sq_head, q.sq_tail)
            };
            if head == tail {
                break;
            }

            let mut bytes = [0u8; COMMAND_BYTES];
            mem.read_physical(config.sq_addr + head as u64 * COMMAND_BYTES as u64, &mut bytes)?;
            let cmd = SimCommand::parse(bytes);

            let status = match self.forced_status {
                Some(status) => status,
                None => self.execute(&cmd, mem),
            };

            let new_head = (head + 1) % config.ring_entries;
            self.queues.get_mut(&qid).unwrap().sq_head = new_head;

            let record = PendingCompletion {
                qid,
                cid: cmd.cid,
                sq_head: new_head,
                status,
            };
            match self.policy {
                CompletionPolicy::Immediate => self.post_completion(record, mem)?,
                CompletionPolicy::AfterPolls(polls) => self.deferred.push_back(Deferred {
                    record,
                    polls_left: polls,
                }),
                CompletionPolicy::Withhold => {}
            }
        }
        Ok(())
    }

    fn cq_doorbell(&mut self, qid: u16, head: u16) {
        if let Some(q) = self.queues.get_mut(&qid) {
            q.cq_head = head;
        }
    }

    fn poll(&mut self, mem: &mut dyn MemoryBus) -> Result<(), MemoryError> {
        for deferred in &mut self.deferred {
            deferred.polls_left = deferred.polls_left.saturating_sub(1);
        }
        // Only release from the front so completions stay in submission order.
        while self
            .deferred
            .front()
            .is_some_and(|d| d.polls_left == 0)
        {
            let deferred = self.deferred.pop_front().unwrap();
            self.post_completion(deferred.record, mem)?;
        }
        Ok(())
    }

    fn namespaces(&self) -> Vec<NamespaceDesc> {
        self.namespaces.values().map(|ns| ns.desc).collect()
    }
}

fn transfer_span(desc: &NamespaceDesc, cmd: &SimCommand) -> Result<(usize, usize), Status> {
    let slba = ((cmd.cdw11 as u64) << 32) | cmd.cdw10 as u64;
    let blocks = (cmd.cdw12 & 0xffff) as u64 + 1;
    match slba.checked_add(blocks) {
        Some(end) if end <= desc.total_blocks => {}
        _ => return Err(Status::LBA_OUT_OF_RANGE),
    }
    let bs = desc.lba_data_size as u64;
    let offset = usize::try_from(slba * bs).map_err(|_| Status::LBA_OUT_OF_RANGE)?;
    let len = usize::try_from(blocks * bs).map_err(|_| Status::LBA_OUT_OF_RANGE)?;
    Ok((offset, len))
}

/// Walks PRP1/PRP2 into (address, length) segments for a `len`-byte transfer.
/// PRP2 is interpreted as a direct page for two-page transfers and as a
/// single (unchained) list page beyond that, matching what the harness's
/// submit path emits.
fn prp_segments(
    mem: &dyn MemoryBus,
    prp1: u64,
    prp2: u64,
    len: usize,
) -> Result<Vec<(u64, usize)>, Status> {
    if len == 0 {
        return Ok(Vec::new());
    }
    if prp1 == 0 {
        return Err(Status::INVALID_FIELD);
    }

    let page_mask = PAGE_SIZE as u64 - 1;
    let first_len = (PAGE_SIZE - (prp1 & page_mask) as usize).min(len);
    let mut segments = vec![(prp1, first_len)];
    let mut remaining = len - first_len;
    if remaining == 0 {
        return Ok(segments);
    }

    if prp2 == 0 || prp2 & page_mask != 0 {
        return Err(Status::INVALID_FIELD);
    }
    if remaining <= PAGE_SIZE {
        segments.push((prp2, remaining));
        return Ok(segments);
    }

    let mut entry_addr = prp2;
    while remaining > 0 {
        let page = mem.read_u64(entry_addr).map_err(|_| Status::INVALID_FIELD)?;
        if page == 0 || page & page_mask != 0 {
            return Err(Status::INVALID_FIELD);
        }
        let chunk = remaining.min(PAGE_SIZE);
        segments.push((page, chunk));
        remaining -= chunk;
        entry_addr += 8;
    }
    Ok(segments)
}
