//! actionrec-core - Event model and collaborator traits for action recording
//!
//! Everything the recorder needs from the outside world lives here as a
//! plain type or a trait:
//!
//! - **events**: captured actions and the per-session log
//! - **gateway**: durable storage of a sequence
//! - **notify**: progress/lifecycle notifications and the playback trigger
//! - **registry**: unique storage names per recorder
//! - **stopwatch**: elapsed time between actions

pub mod error;
pub mod events;
pub mod gateway;
pub mod notify;
pub mod registry;
pub mod stopwatch;

pub use error::{Error, ErrorCode, Result};
pub use events::{Event, EventLog, SessionState, COLUMNS};
pub use gateway::{PersistenceGateway, RowId};
pub use notify::{ChannelBridge, Notification, NotificationBridge, NullBridge, TriggerListener};
pub use registry::SequenceRegistry;
pub use stopwatch::Stopwatch;

pub mod prelude {
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::events::{Event, EventLog, SessionState};
    pub use crate::gateway::{PersistenceGateway, RowId};
    pub use crate::notify::{
        ChannelBridge, Notification, NotificationBridge, NullBridge, TriggerListener,
    };
    pub use crate::registry::SequenceRegistry;
    pub use crate::stopwatch::Stopwatch;
}
