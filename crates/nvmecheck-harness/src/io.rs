//! The single chokepoint every test command flows through.

use std::path::Path;
use std::time::{Duration, Instant};

use nvmecheck_queues::{Command, CompletionEntry, HostMemory, QueueDevice, QueuePair};

use crate::dump;
use crate::error::{Result, TestError};

/// Pause between completion-queue polls while waiting for the device.
const POLL_INTERVAL: Duration = Duration::from_micros(100);

/// Where a precondition dump lands and how its artifact is named.
#[derive(Debug, Clone, Copy)]
pub struct DumpSite<'a> {
    pub dir: &'a Path,
    pub group: &'a str,
    pub test: &'a str,
}

/// Number of completions currently reapable, without consuming any.
///
/// Strictly read-only: asking twice with no intervening submission yields
/// the same answer.
pub fn reap_inquiry(pair: &QueuePair, mem: &HostMemory) -> Result<u32> {
    Ok(pair.pending_completions(mem)?)
}

/// Asserts the broken-test-precondition guard: the completion queue must be
/// empty before the case starts issuing commands.
///
/// On violation the queue state is dumped to `site` (best effort: a dump
/// failure is logged and the original error still propagates) and the case
/// fails with [`TestError::PreconditionViolation`].
pub fn require_empty_cq(pair: &QueuePair, mem: &HostMemory, site: &DumpSite<'_>) -> Result<()> {
    let found = pair.pending_completions(mem)?;
    if found == 0 {
        return Ok(());
    }

    tracing::warn!(
        qid = pair.qid(),
        found,
        "completion queue not empty; test precondition broken"
    );
    match dump::write_queue_dump(
        site.dir,
        site.group,
        site.test,
        "not-empty",
        pair,
        mem,
        "completion queue expected empty before the case ran",
    ) {
        Ok(path) => tracing::warn!(path = %path.display(), "queue state dumped"),
        Err(err) => tracing::warn!(%err, "queue state dump failed"),
    }

    Err(TestError::PreconditionViolation {
        qid: pair.qid(),
        found,
    })
}

/// Submits `command` and blocks until exactly one new completion appears on
/// the paired completion queue or `timeout` elapses.
///
/// The wait is a cooperative poll: each iteration gives the device a
/// [`QueueDevice::poll`] call, so a deferred device makes progress only
/// here, never behind the caller's back. On timeout the completion queue is
/// left untouched (no entry is fabricated or consumed).
///
/// The reaped entry's status is checked against `expect_success`; a mismatch
/// in either direction fails with [`TestError::UnexpectedStatus`] carrying
/// the raw status field and `label` for diagnostics. A device-reported
/// failure is never masked as success.
pub fn send_and_reap(
    device: &mut dyn QueueDevice,
    mem: &mut HostMemory,
    pair: &mut QueuePair,
    command: Command,
    timeout: Duration,
    label: &str,
    expect_success: bool,
) -> Result<CompletionEntry> {
    let started = Instant::now();
    let cid = pair.submit(device, mem, command)?;
    tracing::debug!(qid = pair.qid(), cid, label, "command submitted");

    loop {
        if pair.pending_completions(mem)? > 0 {
            break;
        }
        if started.elapsed() >= timeout {
            return Err(TestError::DeviceTimeout {
                qid: pair.qid(),
                elapsed_ms: started.elapsed().as_millis() as u64,
            });
        }
        device.poll(mem).map_err(nvmecheck_queues::QueueError::from)?;
        std::thread::sleep(POLL_INTERVAL);
    }

    let entry = pair.reap(device, mem)?;
    if entry.status.is_success() != expect_success {
        return Err(TestError::UnexpectedStatus {
            label: label.to_string(),
            status: entry.status.raw(),
            expected_success: expect_success,
        });
    }
    Ok(entry)
}
