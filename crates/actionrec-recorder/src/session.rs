//! Session state shared between the caller and the background threads

use actionrec_core::SessionState;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug)]
pub struct SessionCell(AtomicU8);

impl SessionCell {
    pub fn new() -> Self {
        Self(AtomicU8::new(SessionState::Idle as u8))
    }

    pub fn get(&self) -> SessionState {
        SessionState::from_u8(self.0.load(Ordering::SeqCst))
    }

    /// Move `from -> to` only if the current state is `from`
    pub fn transition(&self, from: SessionState, to: SessionState) -> bool {
        self.0
            .compare_exchange(from as u8, to as u8, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
    }
}

impl Default for SessionCell {
    fn default() -> Self {
        Self::new()
    }
}
