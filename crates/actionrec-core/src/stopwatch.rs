//! Elapsed-time tracking for captured actions

use std::time::Instant;

/// Measures wall-clock time since the last `reset()`.
///
/// Reading does not reset; the recorder resets explicitly after each capture.
#[derive(Debug, Clone, Copy)]
pub struct Stopwatch {
    reference: Instant,
}

impl Stopwatch {
    pub fn new() -> Self {
        Self {
            reference: Instant::now(),
        }
    }

    pub fn reset(&mut self) {
        self.reference = Instant::now();
    }

    /// Milliseconds since the reference point
    pub fn elapsed(&self) -> i64 {
        self.reference.elapsed().as_millis() as i64
    }

    /// Read the elapsed time and start a new interval in one step
    pub fn lap(&mut self) -> i64 {
        let now = Instant::now();
        let ms = now.duration_since(self.reference).as_millis() as i64;
        self.reference = now;
        ms
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new()
    }
}
