use thiserror::Error;

use nvmecheck_queues::QueueError;

pub type Result<T> = std::result::Result<T, TestError>;

/// Failure kinds a conformance case can surface.
///
/// Each one is fatal to the case that raised it. The group runner is the
/// only place an error becomes a recorded scenario failure; library code
/// never retries and never converts a device-reported failure status into
/// success.
#[derive(Debug, Error)]
pub enum TestError {
    #[error("no object registered for group id {id:?} (did the setup case run?)")]
    UnknownGroup { id: String },

    #[error("group id {id:?} is already registered")]
    DuplicateRegistration { id: String },

    #[error("namespace {nsid} is enumerated but has no identify data")]
    InconsistentNamespaceState { nsid: u32 },

    #[error("timed out waiting for a completion on queue {qid} after {elapsed_ms} ms")]
    DeviceTimeout { qid: u16, elapsed_ms: u64 },

    #[error(
        "{label}: completion status {status:#06x} (expected_success={expected_success})"
    )]
    UnexpectedStatus {
        label: String,
        status: u16,
        expected_success: bool,
    },

    #[error("completion queue {qid} holds {found} entries where none were expected")]
    PreconditionViolation { qid: u16, found: u32 },

    #[error(transparent)]
    Queue(#[from] QueueError),
}
