use thiserror::Error;

use crate::memory::MemoryError;

pub type Result<T> = std::result::Result<T, QueueError>;

/// Errors produced by the queue/command machinery.
///
/// Every variant is fatal to the operation that raised it; nothing in this
/// crate retries. Variants carry the identifiers a failure report needs
/// (queue id, capacity, offending index) so callers can surface them without
/// re-deriving state.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("failed to allocate {requested} byte data buffer")]
    Allocation { requested: usize },

    #[error("submission queue {qid} is full ({capacity} commands outstanding)")]
    QueueFull { qid: u16, capacity: u16 },

    #[error("command dword index {index} out of range (0..16)")]
    InvalidDwordIndex { index: usize },

    #[error("block count {count} cannot be encoded (expected 1..=65536)")]
    BadBlockCount { count: u32 },

    #[error("payload of {len} bytes does not fit the allowed data pointer layout")]
    UnsupportedPrpLayout { len: usize },

    #[error("completion on queue {qid} references unknown command id {cid}")]
    UnknownCompletion { qid: u16, cid: u16 },

    #[error("completion queue {qid} has no new entries")]
    NoCompletion { qid: u16 },

    #[error(transparent)]
    Memory(#[from] MemoryError),
}
