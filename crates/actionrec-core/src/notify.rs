//! Callbacks from background work back to the host
//!
//! Flush and playback threads never call into host code directly except
//! through these two seams:
//!
//! - [`NotificationBridge`] for lifecycle/progress notifications. The host
//!   decides which thread they land on; [`ChannelBridge`] hands them to
//!   whoever owns the receiving end (typically a UI loop).
//! - [`TriggerListener`] for the playback trigger itself.

use crate::error::Error;
pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::unbounded;
use serde::Serialize;

/// Lifecycle and progress notifications
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum Notification {
    RecordingStarted,
    /// Percentage of the flush completed, `index / total * 100`
    SaveProgress(f64),
    RecordingSaved,
    /// Sent synchronously by `start_playback`, before any background work
    PrePlayback,
    /// Sent once the sequence is loaded and the timing loop is about to run
    PlaybackStarted,
    PlaybackStopped,
    Error(Error),
}

/// Delivers notifications to the host's preferred execution context.
///
/// Fire-and-forget: implementations must not block the caller for long.
pub trait NotificationBridge: Send + Sync {
    fn deliver(&self, notification: Notification);
}

impl<F> NotificationBridge for F
where
    F: Fn(Notification) + Send + Sync,
{
    fn deliver(&self, notification: Notification) {
        self(notification)
    }
}

/// Discards everything
#[derive(Debug, Clone, Copy, Default)]
pub struct NullBridge;

impl NotificationBridge for NullBridge {
    fn deliver(&self, _notification: Notification) {}
}

/// Marshals notifications onto whichever thread drains the receiver
#[derive(Debug, Clone)]
pub struct ChannelBridge {
    tx: Sender<Notification>,
}

impl ChannelBridge {
    pub fn new() -> (Self, Receiver<Notification>) {
        let (tx, rx) = unbounded();
        (Self { tx }, rx)
    }
}

impl NotificationBridge for ChannelBridge {
    fn deliver(&self, notification: Notification) {
        // Receiver gone means the host stopped listening
        if self.tx.send(notification).is_err() {
            log::trace!("notification dropped, receiver closed");
        }
    }
}

/// Supplied by the playback caller
pub trait TriggerListener: Send + 'static {
    /// Called on the playback thread each time a recorded action fires
    fn on_trigger(&mut self) -> anyhow::Result<()>;

    /// Called on the playback thread when a trigger or the sequence load fails
    fn on_error(&mut self, cause: Error) {
        log::warn!("playback error: {}", cause);
    }
}

impl<F> TriggerListener for F
where
    F: FnMut() -> anyhow::Result<()> + Send + 'static,
{
    fn on_trigger(&mut self) -> anyhow::Result<()> {
        self()
    }
}
