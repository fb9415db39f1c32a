//! Action recorder - captures action timings and replays them in a loop
//!
//! Capture is in-memory only. Persistence happens on a flush thread started by
//! `stop_recording`, playback on a thread started by `start_playback`. Neither
//! blocks the caller.

use crate::replay::{PlaybackConfig, PlaybackEngine, PlaybackStatus};
use crate::session::SessionCell;
use actionrec_core::{
    Error, ErrorCode, Event, EventLog, Notification, NotificationBridge, PersistenceGateway,
    Result, SequenceRegistry, SessionState, Stopwatch, TriggerListener, COLUMNS,
};
use crossbeam_channel::{bounded, Receiver, Sender};
use log::{debug, error, info};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;

/// Recorder configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecorderConfig {
    pub playback: PlaybackConfig,
    /// Prefix for flush/playback thread names
    pub thread_prefix: String,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            playback: PlaybackConfig::default(),
            thread_prefix: "actionrec".to_string(),
        }
    }
}

impl RecorderConfig {
    pub fn playback(mut self, playback: PlaybackConfig) -> Self {
        self.playback = playback;
        self
    }

    pub fn speed(mut self, speed: f64) -> Self {
        self.playback.speed = speed;
        self
    }

    pub fn thread_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.thread_prefix = prefix.into();
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.thread_prefix.is_empty() {
            return Err(Error::invalid_config("thread_prefix must not be empty"));
        }
        self.playback.validate()
    }
}

struct Capture {
    log: EventLog,
    stopwatch: Stopwatch,
}

/// Signals completion of the newest flush by disconnecting
#[derive(Default)]
struct FlushTracker {
    latest: Option<Receiver<()>>,
}

/// The recorder
pub struct Recorder {
    name: String,
    gateway: Arc<dyn PersistenceGateway>,
    bridge: Arc<dyn NotificationBridge>,
    state: Arc<SessionCell>,
    capture: Mutex<Capture>,
    flushes: Mutex<FlushTracker>,
    /// Rows persisted, or about to be once the pending flush lands
    persisted: Arc<AtomicUsize>,
    generation: Arc<AtomicU64>,
    playback: PlaybackEngine,
    config: RecorderConfig,
}

impl Recorder {
    pub fn new(
        registry: &SequenceRegistry,
        gateway: Arc<dyn PersistenceGateway>,
        bridge: Arc<dyn NotificationBridge>,
    ) -> Result<Self> {
        Self::with_config(registry, gateway, bridge, RecorderConfig::default())
    }

    pub fn with_config(
        registry: &SequenceRegistry,
        gateway: Arc<dyn PersistenceGateway>,
        bridge: Arc<dyn NotificationBridge>,
        config: RecorderConfig,
    ) -> Result<Self> {
        config.validate()?;

        let name = registry.next_sequence_id();
        gateway.create_sequence(&name, &COLUMNS)?;
        let persisted = gateway.len(&name)?;
        debug!("recorder {} ready, {} rows persisted", name, persisted);

        let state = Arc::new(SessionCell::new());
        let playback = PlaybackEngine::new(
            name.clone(),
            gateway.clone(),
            bridge.clone(),
            state.clone(),
            config.playback.clone(),
            &config.thread_prefix,
        );

        Ok(Self {
            name,
            gateway,
            bridge,
            state,
            capture: Mutex::new(Capture {
                log: EventLog::new(),
                stopwatch: Stopwatch::new(),
            }),
            flushes: Mutex::new(FlushTracker::default()),
            persisted: Arc::new(AtomicUsize::new(persisted)),
            generation: Arc::new(AtomicU64::new(0)),
            playback,
            config,
        })
    }

    // ========================================================================
    // Recording
    // ========================================================================

    /// Begin a new session. Stops playback first if it is running.
    pub fn start_recording(&self, report_start: bool) -> Result<()> {
        if self.state.get() == SessionState::Playing {
            self.playback.stop();
        }

        let mut capture = self.capture.lock();
        if !self
            .state
            .transition(SessionState::Idle, SessionState::Recording)
        {
            return Err(Error::invalid_state("start recording", self.state.get()));
        }
        capture.log.clear();
        capture.stopwatch.reset();
        drop(capture);

        debug!("recording into {}", self.name);
        if report_start {
            self.bridge.deliver(Notification::RecordingStarted);
        }
        Ok(())
    }

    /// Mark one action. Returns `false` when not recording.
    pub fn action_performed(&self) -> bool {
        let mut capture = self.capture.lock();
        if self.state.get() != SessionState::Recording {
            return false;
        }
        let elapsed = capture.stopwatch.lap();
        capture.log.push(Event::triggered(elapsed));
        true
    }

    /// End the session and persist it in the background
    pub fn stop_recording(&self, report_stop: bool) -> Result<()> {
        let mut capture = self.capture.lock();
        if !self
            .state
            .transition(SessionState::Recording, SessionState::Idle)
        {
            return Err(Error::invalid_state("stop recording", self.state.get()));
        }
        let snapshot = capture.log.take();
        drop(capture);

        debug!("recording stopped, {} events captured", snapshot.len());
        self.flush(snapshot, report_stop)
    }

    fn flush(&self, events: Vec<Event>, report: bool) -> Result<()> {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.persisted.store(events.len(), Ordering::SeqCst);

        let (done_tx, done_rx) = bounded::<()>(0);
        let previous = self.flushes.lock().latest.replace(done_rx);

        let job = FlushJob {
            name: self.name.clone(),
            gateway: self.gateway.clone(),
            bridge: self.bridge.clone(),
            persisted: self.persisted.clone(),
            latest_generation: self.generation.clone(),
            generation,
            events,
            report,
            previous,
            _done: done_tx,
        };

        thread::Builder::new()
            .name(format!("{}-flush-{}", self.config.thread_prefix, self.name))
            .spawn(move || job.run())
            .map_err(|e| {
                Error::new(
                    ErrorCode::Unknown,
                    format!("failed to spawn flush thread: {}", e),
                )
            })?;
        Ok(())
    }

    /// Block until every flush started so far has finished
    pub fn wait_for_flush(&self) {
        let latest = self.flushes.lock().latest.clone();
        if let Some(done) = latest {
            // Never sent on, returns once the flush drops its sender
            let _ = done.recv();
        }
    }

    // ========================================================================
    // Playback
    // ========================================================================

    /// Loop the persisted sequence, calling `listener` at the recorded offsets.
    ///
    /// A running recording is stopped (and flushed) first.
    pub fn start_playback(
        &self,
        listener: impl TriggerListener,
        report_stop: bool,
        report_start: bool,
    ) -> Result<()> {
        match self.state.get() {
            SessionState::Playing => {
                return Err(Error::invalid_state("start playback", SessionState::Playing))
            }
            SessionState::Recording => self.stop_recording(report_stop)?,
            SessionState::Idle => {}
        }

        if self.persisted.load(Ordering::SeqCst) == 0 {
            return Err(Error::empty_sequence(&self.name));
        }

        let after_flush = self.flushes.lock().latest.clone();
        self.playback
            .start(Box::new(listener), after_flush, report_start)
    }

    /// `start_playback(listener, false, true)`
    pub fn start_playback_default(&self, listener: impl TriggerListener) -> Result<()> {
        self.start_playback(listener, false, true)
    }

    /// Stop looping. Returns `false` if nothing was playing.
    pub fn stop_playback(&self) -> bool {
        self.playback.stop()
    }

    // ========================================================================
    // Introspection
    // ========================================================================

    pub fn state(&self) -> SessionState {
        self.state.get()
    }

    pub fn is_recording(&self) -> bool {
        self.state() == SessionState::Recording
    }

    pub fn is_playing(&self) -> bool {
        self.state() == SessionState::Playing
    }

    pub fn sequence_name(&self) -> &str {
        &self.name
    }

    pub fn captured_len(&self) -> usize {
        self.capture.lock().log.len()
    }

    pub fn persisted_len(&self) -> usize {
        self.persisted.load(Ordering::SeqCst)
    }

    pub fn playback_status(&self) -> Option<PlaybackStatus> {
        self.playback.status()
    }

    pub fn config(&self) -> &RecorderConfig {
        &self.config
    }
}

// ============================================================================
// Flush Thread
// ============================================================================

struct FlushJob {
    name: String,
    gateway: Arc<dyn PersistenceGateway>,
    bridge: Arc<dyn NotificationBridge>,
    persisted: Arc<AtomicUsize>,
    latest_generation: Arc<AtomicU64>,
    generation: u64,
    events: Vec<Event>,
    report: bool,
    previous: Option<Receiver<()>>,
    /// Dropped when the job ends, waking anyone waiting on this flush
    _done: Sender<()>,
}

impl FlushJob {
    fn run(self) {
        if let Some(previous) = &self.previous {
            let _ = previous.recv();
        }

        match self.write() {
            Ok(()) => {
                info!("saved {} events to {}", self.events.len(), self.name);
                if self.report {
                    self.bridge.deliver(Notification::RecordingSaved);
                }
            }
            Err(e) => {
                error!("failed to save {}: {}", self.name, e);
                self.bridge.deliver(Notification::Error(e));
                if self.latest_generation.load(Ordering::SeqCst) == self.generation {
                    self.recount();
                }
            }
        }
    }

    /// Sync `persisted` with what actually landed. Unknown counts as empty.
    fn recount(&self) {
        let actual = match self.gateway.len(&self.name) {
            Ok(n) => n,
            Err(e) => {
                error!("failed to count rows of {}: {}", self.name, e);
                self.bridge.deliver(Notification::Error(e));
                0
            }
        };
        self.persisted.store(actual, Ordering::SeqCst);
    }

    /// Replace the stored sequence with this snapshot, in capture order
    fn write(&self) -> Result<()> {
        self.gateway.clear_sequence(&self.name)?;
        let total = self.events.len();
        for (i, event) in self.events.iter().enumerate() {
            self.gateway.append_record(&self.name, event)?;
            if self.report {
                let pct = i as f64 / total as f64 * 100.0;
                self.bridge.deliver(Notification::SaveProgress(pct));
            }
        }
        Ok(())
    }
}
