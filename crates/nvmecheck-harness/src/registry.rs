use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;

use nvmecheck_queues::QueuePair;

use crate::error::{Result, TestError};

/// Handle to a queue pair shared between cases of one group.
pub type SharedQueuePair = Rc<RefCell<QueuePair>>;

/// Write-once map from a group object id to the queue pair a setup case
/// created.
///
/// Later cases in the group fetch the pair by id; asking for an id nobody
/// registered fails with [`TestError::UnknownGroup`], which turns the "a
/// setup test must have run first" assumption into an explicit error rather
/// than an implicit crash. Registration is write-once per id per run, so two
/// setup cases racing for the same id is impossible by construction.
#[derive(Default)]
pub struct ResourceRegistry {
    objects: BTreeMap<String, SharedQueuePair>,
}

impl ResourceRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `pair` under `id` and returns the shared handle.
    pub fn register(&mut self, id: &str, pair: QueuePair) -> Result<SharedQueuePair> {
        if self.objects.contains_key(id) {
            return Err(TestError::DuplicateRegistration { id: id.to_string() });
        }
        let handle = Rc::new(RefCell::new(pair));
        self.objects.insert(id.to_string(), handle.clone());
        Ok(handle)
    }

    /// Fetches the object a prior case registered under `id`.
    pub fn get(&self, id: &str) -> Result<SharedQueuePair> {
        self.objects
            .get(id)
            .cloned()
            .ok_or_else(|| TestError::UnknownGroup { id: id.to_string() })
    }
}
