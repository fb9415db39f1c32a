//! actionrec-recorder - Record action timings, replay them on a loop
//!
//! Capture never blocks: `action_performed()` only touches memory. Stopping a
//! recording flushes it on a background thread with progress notifications,
//! and playback runs a cancellable, drift-free timing loop on its own thread.
//!
//! ## Storage
//!
//! - **memory**: process-local
//! - **jsonl**: one file per sequence under `~/.actionrec`
//! - **sqlite**: one table per sequence

pub mod recorder;
pub mod replay;
pub mod session;
pub mod storage;

pub use recorder::{Recorder, RecorderConfig};
pub use replay::{PlaybackConfig, PlaybackCursor, PlaybackEngine, PlaybackStatus};
pub use storage::{JsonlGateway, MemoryGateway, SqliteGateway};

pub mod prelude {
    pub use crate::recorder::{Recorder, RecorderConfig};
    pub use crate::replay::{PlaybackConfig, PlaybackStatus};
    pub use crate::storage::{JsonlGateway, MemoryGateway, SqliteGateway};
    pub use actionrec_core::prelude::*;
}
