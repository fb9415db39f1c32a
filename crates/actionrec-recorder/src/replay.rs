//! Looping playback of a recorded sequence
//!
//! The timing loop runs on its own thread and schedules every trigger against
//! an absolute deadline (`previous deadline + recorded delay`), so time spent
//! in the trigger callback or in waking up does not add up across events or
//! across cycles. Waits are `recv_deadline` on a cancel channel: stopping
//! drops the sender, which wakes the loop immediately.

use crate::session::SessionCell;
use actionrec_core::{
    Error, ErrorCode, Event, Notification, NotificationBridge, PersistenceGateway, Result,
    SessionState, TriggerListener,
};
use crossbeam_channel::{bounded, Receiver, RecvTimeoutError, Sender};
use log::{debug, error, info, warn};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

/// Longest single wait the loop will schedule. Anything above is treated as a
/// corrupt record rather than slept on.
pub const MAX_STEP: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Playback configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PlaybackConfig {
    /// Playback speed (1.0 = real-time, 2.0 = 2x speed)
    pub speed: f64,
    /// How far the loop may fall behind its schedule before re-anchoring to now
    pub max_lag_ms: u64,
}

impl Default for PlaybackConfig {
    fn default() -> Self {
        Self {
            speed: 1.0,
            max_lag_ms: 250,
        }
    }
}

impl PlaybackConfig {
    pub fn speed(mut self, speed: f64) -> Self {
        self.speed = speed;
        self
    }

    pub fn max_lag_ms(mut self, max_lag_ms: u64) -> Self {
        self.max_lag_ms = max_lag_ms;
        self
    }

    pub fn validate(&self) -> Result<()> {
        if !self.speed.is_finite() || self.speed <= 0.0 {
            return Err(Error::invalid_config(format!(
                "playback speed must be > 0, got {}",
                self.speed
            )));
        }
        Ok(())
    }

    /// `delay / speed`, `None` when that no longer fits in a `Duration`
    fn scale(&self, delay: Duration) -> Option<Duration> {
        if self.speed == 1.0 {
            Some(delay)
        } else {
            Duration::try_from_secs_f64(delay.as_secs_f64() / self.speed).ok()
        }
    }
}

/// Position in the loaded sequence. Wraps to the start after the last event.
#[derive(Debug, Clone)]
pub struct PlaybackCursor {
    sequence: Vec<Event>,
    index: usize,
}

impl PlaybackCursor {
    /// `None` for an empty sequence, there is nothing to loop over
    pub fn new(sequence: Vec<Event>) -> Option<Self> {
        if sequence.is_empty() {
            None
        } else {
            Some(Self { sequence, index: 0 })
        }
    }

    pub fn current(&self) -> &Event {
        &self.sequence[self.index]
    }

    pub fn index(&self) -> usize {
        self.index
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    /// Step forward, returns `true` when this wrapped back to index 0
    pub fn advance(&mut self) -> bool {
        if self.index == self.sequence.len() - 1 {
            self.index = 0;
            true
        } else {
            self.index += 1;
            false
        }
    }
}

/// Snapshot of a running playback
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PlaybackStatus {
    /// Full passes over the sequence completed
    pub cycles: u64,
    /// Triggers fired so far
    pub triggers: u64,
    /// Index of the event being waited on
    pub index: usize,
}

/// One `start_playback` .. `stop_playback` span
struct PlaybackRun {
    active: AtomicBool,
    cancel: Mutex<Option<Sender<()>>>,
    cycles: AtomicU64,
    triggers: AtomicU64,
    index: AtomicUsize,
}

impl PlaybackRun {
    fn new(cancel: Sender<()>) -> Self {
        Self {
            active: AtomicBool::new(true),
            cancel: Mutex::new(Some(cancel)),
            cycles: AtomicU64::new(0),
            triggers: AtomicU64::new(0),
            index: AtomicUsize::new(0),
        }
    }

    fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn cancel(&self) {
        self.active.store(false, Ordering::SeqCst);
        // Dropping the sender wakes a wait in progress
        self.cancel.lock().take();
    }

    fn status(&self) -> PlaybackStatus {
        PlaybackStatus {
            cycles: self.cycles.load(Ordering::Relaxed),
            triggers: self.triggers.load(Ordering::Relaxed),
            index: self.index.load(Ordering::Relaxed),
        }
    }
}

type CurrentRun = Arc<Mutex<Option<Arc<PlaybackRun>>>>;

/// Runs the timing loop for one recorder's sequence
pub struct PlaybackEngine {
    sequence: String,
    gateway: Arc<dyn PersistenceGateway>,
    bridge: Arc<dyn NotificationBridge>,
    state: Arc<SessionCell>,
    current: CurrentRun,
    config: PlaybackConfig,
    thread_name: String,
}

impl PlaybackEngine {
    pub(crate) fn new(
        sequence: String,
        gateway: Arc<dyn PersistenceGateway>,
        bridge: Arc<dyn NotificationBridge>,
        state: Arc<SessionCell>,
        config: PlaybackConfig,
        thread_prefix: &str,
    ) -> Self {
        let thread_name = format!("{}-playback-{}", thread_prefix, sequence);
        Self {
            sequence,
            gateway,
            bridge,
            state,
            current: Arc::new(Mutex::new(None)),
            config,
            thread_name,
        }
    }

    pub fn config(&self) -> &PlaybackConfig {
        &self.config
    }

    /// Claim the Playing state and spawn the timing loop.
    ///
    /// `after_flush` disconnects once a pending flush is done; the loop waits
    /// on it before loading so it sees the freshly recorded data.
    pub(crate) fn start(
        &self,
        listener: Box<dyn TriggerListener>,
        after_flush: Option<Receiver<()>>,
        report_start: bool,
    ) -> Result<()> {
        if !self
            .state
            .transition(SessionState::Idle, SessionState::Playing)
        {
            return Err(Error::invalid_state("start playback", self.state.get()));
        }

        if report_start {
            self.bridge.deliver(Notification::PrePlayback);
        }

        let (cancel_tx, cancel_rx) = bounded::<()>(1);
        let run = Arc::new(PlaybackRun::new(cancel_tx));
        *self.current.lock() = Some(run.clone());

        let worker = PlaybackLoop {
            sequence: self.sequence.clone(),
            gateway: self.gateway.clone(),
            bridge: self.bridge.clone(),
            state: self.state.clone(),
            current: self.current.clone(),
            config: self.config.clone(),
            run,
            cancel_rx,
            after_flush,
            report_start,
        };

        let spawned = thread::Builder::new()
            .name(self.thread_name.clone())
            .spawn(move || worker.run(listener));

        if let Err(e) = spawned {
            if let Some(run) = self.current.lock().take() {
                run.cancel();
            }
            self.state
                .transition(SessionState::Playing, SessionState::Idle);
            return Err(Error::new(
                ErrorCode::Unknown,
                format!("failed to spawn playback thread: {}", e),
            ));
        }

        debug!("playback of {} started", self.sequence);
        Ok(())
    }

    /// Clear Playing and wake the loop. No-op when not playing.
    pub fn stop(&self) -> bool {
        let run = self.current.lock().take();
        match run {
            Some(run) => {
                run.cancel();
                self.state
                    .transition(SessionState::Playing, SessionState::Idle);
                debug!("playback of {} stopped", self.sequence);
                true
            }
            None => false,
        }
    }

    pub fn is_playing(&self) -> bool {
        self.current
            .lock()
            .as_ref()
            .map(|run| run.is_active())
            .unwrap_or(false)
    }

    pub fn status(&self) -> Option<PlaybackStatus> {
        self.current.lock().as_ref().map(|run| run.status())
    }
}

impl Drop for PlaybackEngine {
    fn drop(&mut self) {
        self.stop();
    }
}

// ============================================================================
// Playback Thread
// ============================================================================

struct PlaybackLoop {
    sequence: String,
    gateway: Arc<dyn PersistenceGateway>,
    bridge: Arc<dyn NotificationBridge>,
    state: Arc<SessionCell>,
    current: CurrentRun,
    config: PlaybackConfig,
    run: Arc<PlaybackRun>,
    cancel_rx: Receiver<()>,
    after_flush: Option<Receiver<()>>,
    report_start: bool,
}

impl PlaybackLoop {
    fn run(self, mut listener: Box<dyn TriggerListener>) {
        let _guard = FinishGuard(&self);

        if let Some(flush) = &self.after_flush {
            crossbeam_channel::select! {
                recv(flush) -> _ => {},
                recv(self.cancel_rx) -> _ => {},
            }
        }

        if let Some(mut cursor) = self.load(listener.as_mut()) {
            if self.report_start {
                self.bridge.deliver(Notification::PlaybackStarted);
            }
            self.cycle(&mut cursor, listener.as_mut());
        }
    }

    /// Read the whole sequence once, in storage order
    fn load(&self, listener: &mut dyn TriggerListener) -> Option<PlaybackCursor> {
        if !self.run.is_active() {
            return None;
        }
        let sequence = match self.gateway.read_all(&self.sequence) {
            Ok(events) => events,
            Err(e) => {
                error!("failed to load {}: {}", self.sequence, e);
                listener.on_error(e);
                return None;
            }
        };
        let Some(cursor) = PlaybackCursor::new(sequence) else {
            listener.on_error(Error::empty_sequence(&self.sequence));
            return None;
        };
        info!(
            "loaded {} events from {} for playback",
            cursor.len(),
            self.sequence
        );
        Some(cursor)
    }

    fn cycle(&self, cursor: &mut PlaybackCursor, listener: &mut dyn TriggerListener) {
        let max_lag = Duration::from_millis(self.config.max_lag_ms);
        let mut deadline = Instant::now();

        while self.run.is_active() {
            self.run.index.store(cursor.index(), Ordering::Relaxed);
            deadline = match self.next_deadline(deadline, cursor.current()) {
                Ok(next) => next,
                Err(e) => {
                    error!("playback of {} aborted: {}", self.sequence, e);
                    listener.on_error(e);
                    return;
                }
            };

            let now = Instant::now();
            let behind = deadline
                .checked_add(max_lag)
                .map(|limit| now > limit)
                .unwrap_or(false);
            if behind {
                debug!(
                    "playback of {} is {}ms behind, re-anchoring",
                    self.sequence,
                    (now - deadline).as_millis()
                );
                deadline = now;
            }

            match self.cancel_rx.recv_deadline(deadline) {
                Err(RecvTimeoutError::Timeout) => {}
                // Sender dropped: stop requested mid-wait
                Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
            }

            // A stop that landed while waiting suppresses this trigger
            if !self.run.is_active() {
                break;
            }
            self.fire(listener);

            if cursor.advance() {
                self.run.cycles.fetch_add(1, Ordering::Relaxed);
            }
        }
    }

    fn next_deadline(&self, deadline: Instant, event: &Event) -> Result<Instant> {
        self.config
            .scale(event.delay())
            .filter(|step| *step <= MAX_STEP)
            .and_then(|step| deadline.checked_add(step))
            .ok_or_else(|| {
                Error::new(
                    ErrorCode::Unknown,
                    format!(
                        "delay of {}ms cannot be scheduled at {}x speed",
                        event.elapsed_millis, self.config.speed
                    ),
                )
            })
    }

    fn fire(&self, listener: &mut dyn TriggerListener) {
        self.run.triggers.fetch_add(1, Ordering::Relaxed);
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| listener.on_trigger()));
        let cause = match outcome {
            Ok(Ok(())) => return,
            Ok(Err(e)) => Error::trigger_failed(format!("{:#}", e)),
            Err(payload) => Error::trigger_failed(panic_message(payload.as_ref())),
        };
        warn!("{}", cause);
        listener.on_error(cause);
    }

    /// Release the Playing state if this run still owns it
    fn finish(&self) {
        let mut current = self.current.lock();
        let owned = current
            .as_ref()
            .map(|run| Arc::ptr_eq(run, &self.run))
            .unwrap_or(false);
        if owned {
            current.take();
            self.state
                .transition(SessionState::Playing, SessionState::Idle);
        }
        drop(current);
        self.run.cancel();
        info!(
            "playback of {} finished after {} triggers",
            self.sequence,
            self.run.triggers.load(Ordering::Relaxed)
        );
    }
}

/// Releases the run however the thread exits, unwinding included
struct FinishGuard<'a>(&'a PlaybackLoop);

impl Drop for FinishGuard<'_> {
    fn drop(&mut self) {
        let lp = self.0;
        if thread::panicking() {
            let cause = Error::new(
                ErrorCode::Unknown,
                format!("playback of {} aborted by a panic", lp.sequence),
            );
            error!("{}", cause);
            lp.bridge.deliver(Notification::Error(cause));
        }
        lp.finish();
        lp.bridge.deliver(Notification::PlaybackStopped);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "panic".to_string()
    }
}
