//! Conformance test framework over the `nvmecheck-queues` machinery.
//!
//! A test run is a sequence of cases inside a group. Cases share state
//! through an explicit [`TestContext`] (device, host memory, resource
//! registry, namespace catalog, configuration) rather than process globals;
//! a setup case creates and registers the group's queue pair and later cases
//! look it up, which makes the cross-case ordering dependency an explicit,
//! checkable error instead of a crash.
//!
//! Every command a case issues flows through [`io::send_and_reap`]: submit,
//! poll the paired completion queue until one new entry appears or the
//! timeout fires, then verify the status against the case's expectation.
//! Any deviation is fatal to that case (nothing is retried), and only the
//! [`runner::GroupRunner`] converts the error into a recorded failure before
//! moving on to the next case.
//!
//! ## Environment variables
//!
//! [`HarnessConfig::from_env`] recognises:
//!
//! - `NVMECHECK_CMD_TIMEOUT_MS`: default per-command completion timeout.
//! - `NVMECHECK_DUMP_DIR`: directory receiving queue-state dump artifacts.
//! - `NVMECHECK_FILTER` (optional): only run cases whose name contains this
//!   substring (case-insensitive).

mod case;
mod config;
pub mod dump;
mod error;
pub mod groups;
pub mod io;
mod namespace;
mod registry;
mod runner;

pub use case::{TestCase, TestContext, TestInfo};
pub use config::HarnessConfig;
pub use error::{Result, TestError};
pub use namespace::{NamespaceCatalog, NamespaceFormat, NamespaceInfo};
pub use registry::{ResourceRegistry, SharedQueuePair};
pub use runner::{CaseOutcome, CaseStatus, GroupRunner, RunReport};
