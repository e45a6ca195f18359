//! Queue-state dump artifacts for broken-precondition diagnostics.

use std::io;
use std::path::{Path, PathBuf};

use serde::Serialize;

use nvmecheck_queues::{HostMemory, QueuePair};

#[derive(Serialize)]
struct QueueDumpRecord<'a> {
    reason: &'a str,
    qid: u16,
    capacity: u16,
    outstanding: usize,
    sq_tail: u16,
    cq_head: u16,
    cq_phase: bool,
    pending: Vec<PendingEntryRecord>,
}

#[derive(Serialize)]
struct PendingEntryRecord {
    cid: u16,
    status: u16,
    success: bool,
    phase: bool,
    sq_head: u16,
}

/// Writes a JSON snapshot of `pair`'s state to
/// `<dir>/<group>_<test>_<tag>.json` and returns the artifact path.
///
/// Callers treat this as best effort: a dump failure is logged, never
/// allowed to mask the error that prompted the dump.
pub fn write_queue_dump(
    dir: &Path,
    group: &str,
    test: &str,
    tag: &str,
    pair: &QueuePair,
    mem: &HostMemory,
    reason: &str,
) -> io::Result<PathBuf> {
    let pending = pair
        .peek_completions(mem)
        .map_err(io::Error::other)?
        .into_iter()
        .map(|entry| PendingEntryRecord {
            cid: entry.cid,
            status: entry.status.raw(),
            success: entry.status.is_success(),
            phase: entry.phase,
            sq_head: entry.sq_head,
        })
        .collect();

    let record = QueueDumpRecord {
        reason,
        qid: pair.qid(),
        capacity: pair.capacity(),
        outstanding: pair.outstanding(),
        sq_tail: pair.sq_tail(),
        cq_head: pair.cq_head(),
        cq_phase: pair.cq_phase(),
        pending,
    };

    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{group}_{test}_{tag}.json"));
    let contents = serde_json::to_string_pretty(&record).map_err(io::Error::other)?;
    std::fs::write(&path, contents)?;
    Ok(path)
}
