//! Storage names for recorder instances
//!
//! Every recorder gets its own sequence name from a counter that only goes
//! up, so two live recorders never write to the same table.

use parking_lot::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::OnceLock;

pub const DEFAULT_PREFIX: &str = "action_record_data";

#[derive(Debug)]
pub struct SequenceRegistry {
    prefix: String,
    next: AtomicU64,
    created: Mutex<Vec<String>>,
}

impl Default for SequenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

static GLOBAL: OnceLock<SequenceRegistry> = OnceLock::new();

impl SequenceRegistry {
    pub fn new() -> Self {
        Self::with_prefix(DEFAULT_PREFIX)
    }

    pub fn with_prefix(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            next: AtomicU64::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Process-wide registry for hosts that don't manage their own
    pub fn global() -> &'static SequenceRegistry {
        GLOBAL.get_or_init(SequenceRegistry::new)
    }

    /// Hand out the next unique sequence name
    pub fn next_sequence_id(&self) -> String {
        let n = self.next.fetch_add(1, Ordering::SeqCst);
        let name = format!("{}_{}", self.prefix, n);
        self.created.lock().push(name.clone());
        name
    }

    /// Number of names handed out so far
    pub fn count(&self) -> u64 {
        self.next.load(Ordering::SeqCst)
    }

    /// Every name handed out, oldest first
    pub fn created(&self) -> Vec<String> {
        self.created.lock().clone()
    }

    pub fn prefix(&self) -> &str {
        &self.prefix
    }
}
