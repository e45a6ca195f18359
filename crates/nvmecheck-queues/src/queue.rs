use std::collections::BTreeMap;

use crate::command::{prp, Command};
use crate::completion::CompletionEntry;
use crate::device::{QueueDevice, QueuePairConfig};
use crate::error::{QueueError, Result};
use crate::memory::{HostMemory, MemoryBus};
use crate::{COMMAND_BYTES, COMPLETION_BYTES, PAGE_SIZE};

#[derive(Debug)]
struct SubmissionRing {
    base: u64,
    ring_entries: u16,
    tail: u16,
}

#[derive(Debug)]
struct CompletionRing {
    base: u64,
    ring_entries: u16,
    head: u16,
    /// Phase tag value that marks an entry as new on the current pass.
    /// Starts as `true` and flips every time the head wraps.
    phase: bool,
}

impl CompletionRing {
    fn entry_at(&self, mem: &HostMemory, index: u16) -> Result<CompletionEntry> {
        let mut bytes = [0u8; COMPLETION_BYTES];
        mem.read_physical(self.base + index as u64 * COMPLETION_BYTES as u64, &mut bytes)?;
        Ok(CompletionEntry::parse(bytes))
    }
}

/// A 1:1 submission/completion queue pair plus its in-flight command table.
///
/// The pair owns the host-side view of both rings (the device keeps its own
/// head/tail mirrors) and every command that has been submitted but not yet
/// reaped. Commands, and the payload buffers they carry, are dropped exactly
/// when their completion is consumed, which is what makes "no use after
/// completion" hold without reference counting.
///
/// Capacity is the number of commands that may be outstanding at once; the
/// rings carry one extra slack slot so `head == tail` stays unambiguous.
pub struct QueuePair {
    qid: u16,
    capacity: u16,
    sq: SubmissionRing,
    cq: CompletionRing,
    pending: BTreeMap<u16, Command>,
    next_cid: u16,
}

impl QueuePair {
    /// Allocates both rings from `mem` and registers the geometry with the
    /// device. `capacity` is the outstanding-command limit, not the raw ring
    /// slot count.
    pub fn create(
        device: &mut dyn QueueDevice,
        mem: &mut HostMemory,
        qid: u16,
        capacity: u16,
    ) -> Result<Self> {
        let ring_entries = capacity
            .checked_add(1)
            .filter(|_| capacity > 0)
            .ok_or(QueueError::Allocation {
                requested: capacity as usize,
            })?;

        let sq_len = ring_entries as usize * COMMAND_BYTES;
        let cq_len = ring_entries as usize * COMPLETION_BYTES;
        let sq_addr = mem
            .alloc_pages(sq_len)
            .ok_or(QueueError::Allocation { requested: sq_len })?;
        let cq_addr = mem
            .alloc_pages(cq_len)
            .ok_or(QueueError::Allocation { requested: cq_len })?;

        device.configure_queue_pair(QueuePairConfig {
            qid,
            sq_addr,
            cq_addr,
            ring_entries,
        });

        Ok(Self {
            qid,
            capacity,
            sq: SubmissionRing {
                base: sq_addr,
                ring_entries,
                tail: 0,
            },
            cq: CompletionRing {
                base: cq_addr,
                ring_entries,
                head: 0,
                phase: true,
            },
            pending: BTreeMap::new(),
            next_cid: 0,
        })
    }

    pub fn qid(&self) -> u16 {
        self.qid
    }

    pub fn capacity(&self) -> u16 {
        self.capacity
    }

    pub fn sq_tail(&self) -> u16 {
        self.sq.tail
    }

    pub fn cq_head(&self) -> u16 {
        self.cq.head
    }

    pub fn cq_phase(&self) -> bool {
        self.cq.phase
    }

    /// Commands submitted and not yet reaped.
    pub fn outstanding(&self) -> usize {
        self.pending.len()
    }

    /// Encodes and submits one command, ringing the submission doorbell.
    ///
    /// Fails with [`QueueError::QueueFull`] when `capacity` commands are
    /// already outstanding; nothing is ever dropped or overwritten. On
    /// success the command (and its buffer) is retained until reaped, and
    /// the assigned command identifier is returned.
    pub fn submit(
        &mut self,
        device: &mut dyn QueueDevice,
        mem: &mut HostMemory,
        mut command: Command,
    ) -> Result<u16> {
        if self.pending.len() >= self.capacity as usize {
            return Err(QueueError::QueueFull {
                qid: self.qid,
                capacity: self.capacity,
            });
        }

        self.stage_data_pointer(mem, &mut command)?;

        let mut cid = self.next_cid;
        while self.pending.contains_key(&cid) {
            cid = cid.wrapping_add(1);
        }
        self.next_cid = cid.wrapping_add(1);

        let image = command.encode(cid);
        let slot = self.sq.tail;
        mem.write_physical(self.sq.base + slot as u64 * COMMAND_BYTES as u64, &image)?;
        self.sq.tail = (slot + 1) % self.sq.ring_entries;
        self.pending.insert(cid, command);

        tracing::debug!(qid = self.qid, cid, slot, tail = self.sq.tail, "submit");
        device.sq_doorbell(self.qid, self.sq.tail, mem)?;
        Ok(cid)
    }

    /// Counts completion entries currently waiting to be reaped.
    ///
    /// Purely a read: no ring state changes, no doorbells, no device
    /// progress. Two inquiries with no intervening submission always agree.
    pub fn pending_completions(&self, mem: &HostMemory) -> Result<u32> {
        let mut count = 0u32;
        let mut index = self.cq.head;
        let mut phase = self.cq.phase;
        for _ in 0..self.cq.ring_entries {
            let entry = self.cq.entry_at(mem, index)?;
            if entry.phase != phase {
                break;
            }
            count += 1;
            index = (index + 1) % self.cq.ring_entries;
            if index == 0 {
                phase = !phase;
            }
        }
        Ok(count)
    }

    /// Snapshot of the waiting entries in reap order, without consuming.
    pub fn peek_completions(&self, mem: &HostMemory) -> Result<Vec<CompletionEntry>> {
        let count = self.pending_completions(mem)?;
        let mut out = Vec::with_capacity(count as usize);
        let mut index = self.cq.head;
        for _ in 0..count {
            out.push(self.cq.entry_at(mem, index)?);
            index = (index + 1) % self.cq.ring_entries;
        }
        Ok(out)
    }

    /// Consumes the oldest waiting completion entry.
    ///
    /// Entries drain strictly in ring order. The matching in-flight command
    /// is dropped here, releasing its payload buffer; a completion whose cid
    /// is not in the pending table means the device fabricated or duplicated
    /// an entry and is reported as such.
    pub fn reap(
        &mut self,
        device: &mut dyn QueueDevice,
        mem: &HostMemory,
    ) -> Result<CompletionEntry> {
        if self.pending_completions(mem)? == 0 {
            return Err(QueueError::NoCompletion { qid: self.qid });
        }

        let entry = self.cq.entry_at(mem, self.cq.head)?;
        self.cq.head = (self.cq.head + 1) % self.cq.ring_entries;
        if self.cq.head == 0 {
            self.cq.phase = !self.cq.phase;
        }

        if self.pending.remove(&entry.cid).is_none() {
            return Err(QueueError::UnknownCompletion {
                qid: self.qid,
                cid: entry.cid,
            });
        }

        tracing::debug!(
            qid = self.qid,
            cid = entry.cid,
            status = entry.status.raw(),
            head = self.cq.head,
            "reap"
        );
        device.cq_doorbell(self.qid, self.cq.head);
        Ok(entry)
    }

    /// Fills PRP1/PRP2 from the attached buffer, honoring the command's
    /// permitted layouts. Payloads spanning more than two pages get a single
    /// (unchained) PRP list page allocated from `mem`.
    fn stage_data_pointer(&self, mem: &mut HostMemory, command: &mut Command) -> Result<()> {
        let Some(buffer) = command.buffer() else {
            return Ok(());
        };
        let mask = command.prp_mask();
        let addr = buffer.addr();
        let len = buffer.len();

        if mask & prp::PRP1_PAGE == 0 {
            return Err(QueueError::UnsupportedPrpLayout { len });
        }

        let prp2 = if len <= PAGE_SIZE {
            0
        } else if len <= 2 * PAGE_SIZE {
            if mask & prp::PRP2_PAGE == 0 {
                return Err(QueueError::UnsupportedPrpLayout { len });
            }
            addr + PAGE_SIZE as u64
        } else {
            if mask & prp::PRP2_LIST == 0 {
                return Err(QueueError::UnsupportedPrpLayout { len });
            }
            let tail_pages = len.div_ceil(PAGE_SIZE) - 1;
            if tail_pages > PAGE_SIZE / 8 {
                // One list page only; a chained list has no user in a
                // ring-sized harness transfer.
                return Err(QueueError::UnsupportedPrpLayout { len });
            }
            let list_addr = mem.alloc_pages(tail_pages * 8).ok_or(QueueError::Allocation {
                requested: tail_pages * 8,
            })?;
            for i in 0..tail_pages {
                mem.write_u64(
                    list_addr + i as u64 * 8,
                    addr + (i as u64 + 1) * PAGE_SIZE as u64,
                )?;
            }
            list_addr
        };

        command.set_data_pointer(addr, prp2);
        Ok(())
    }
}
