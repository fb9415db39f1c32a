#![allow(dead_code)]

use actionrec_core::{
    Error, Event, Notification, PersistenceGateway, Result, RowId, SequenceRegistry,
    TriggerListener, COLUMNS,
};
use actionrec_recorder::storage::MemoryGateway;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Bridge that keeps every notification
pub fn collecting_bridge() -> (Arc<Mutex<Vec<Notification>>>, impl Fn(Notification) + Send + Sync) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let sink = seen.clone();
    (seen, move |n: Notification| sink.lock().push(n))
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(2));
    }
    cond()
}

/// Registry whose first name is `{prefix}_0`, with that sequence already holding `delays`
pub fn seeded(
    gateway: &dyn PersistenceGateway,
    prefix: &str,
    delays: &[i64],
) -> SequenceRegistry {
    let name = format!("{}_0", prefix);
    gateway.create_sequence(&name, &COLUMNS).unwrap();
    for ms in delays {
        gateway.append_record(&name, &Event::triggered(*ms)).unwrap();
    }
    SequenceRegistry::with_prefix(prefix)
}

/// Listener that timestamps every trigger and counts errors
#[derive(Clone, Default)]
pub struct Probe {
    pub fired: Arc<Mutex<Vec<Instant>>>,
    pub errors: Arc<Mutex<Vec<Error>>>,
    pub fail: Arc<AtomicBool>,
    pub panic: Arc<AtomicBool>,
}

impl Probe {
    pub fn count(&self) -> usize {
        self.fired.lock().len()
    }

    pub fn error_count(&self) -> usize {
        self.errors.lock().len()
    }
}

impl TriggerListener for Probe {
    fn on_trigger(&mut self) -> anyhow::Result<()> {
        self.fired.lock().push(Instant::now());
        if self.panic.load(Ordering::SeqCst) {
            panic!("listener blew up");
        }
        if self.fail.load(Ordering::SeqCst) {
            anyhow::bail!("listener refused");
        }
        Ok(())
    }

    fn on_error(&mut self, cause: Error) {
        self.errors.lock().push(cause);
    }
}

/// Memory storage with switchable failures
pub struct FlakyGateway {
    pub inner: MemoryGateway,
    /// Appends allowed before failing, `usize::MAX` = never fail
    pub appends_left: AtomicUsize,
    pub fail_reads: AtomicBool,
    pub fail_len: AtomicBool,
}

impl FlakyGateway {
    pub fn new() -> Self {
        Self {
            inner: MemoryGateway::new(),
            appends_left: AtomicUsize::new(usize::MAX),
            fail_reads: AtomicBool::new(false),
            fail_len: AtomicBool::new(false),
        }
    }

    pub fn fail_after(&self, appends: usize) {
        self.appends_left.store(appends, Ordering::SeqCst);
    }
}

impl PersistenceGateway for FlakyGateway {
    fn create_sequence(&self, name: &str, columns: &[&str]) -> Result<()> {
        self.inner.create_sequence(name, columns)
    }

    fn append_record(&self, name: &str, record: &Event) -> Result<RowId> {
        let left = self.appends_left.load(Ordering::SeqCst);
        if left == 0 {
            return Err(Error::persistence("disk full"));
        }
        if left != usize::MAX {
            self.appends_left.store(left - 1, Ordering::SeqCst);
        }
        self.inner.append_record(name, record)
    }

    fn read_all(&self, name: &str) -> Result<Vec<Event>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(Error::persistence("table is locked"));
        }
        self.inner.read_all(name)
    }

    fn clear_sequence(&self, name: &str) -> Result<()> {
        self.inner.clear_sequence(name)
    }

    fn len(&self, name: &str) -> Result<usize> {
        if self.fail_len.load(Ordering::SeqCst) {
            return Err(Error::persistence("table is locked"));
        }
        self.inner.len(name)
    }

    fn list_sequences(&self) -> Result<Vec<String>> {
        self.inner.list_sequences()
    }

    fn drop_sequence(&self, name: &str) -> Result<()> {
        self.inner.drop_sequence(name)
    }
}
