//! # actionrec
//!
//! Record when actions happen, then replay them at the same pace, forever.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use actionrec::prelude::*;
//! use std::sync::Arc;
//!
//! let gateway = Arc::new(MemoryGateway::new());
//! let recorder = Recorder::new(SequenceRegistry::global(), gateway, Arc::new(NullBridge))?;
//!
//! recorder.start_recording(true)?;
//! recorder.action_performed();
//! recorder.action_performed();
//! recorder.stop_recording(true)?;
//!
//! recorder.start_playback_default(|| -> anyhow::Result<()> {
//!     println!("action!");
//!     Ok(())
//! })?;
//! # Ok::<(), actionrec::Error>(())
//! ```

// Re-export core types
pub use actionrec_core::*;

// Re-export recorder module
pub use actionrec_recorder as recorder;

pub use actionrec_recorder::{
    JsonlGateway, MemoryGateway, PlaybackConfig, PlaybackStatus, Recorder, RecorderConfig,
    SqliteGateway,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use actionrec_recorder::prelude::*;
}
