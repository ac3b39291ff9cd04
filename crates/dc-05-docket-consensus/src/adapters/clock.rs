//! Wall clock driven by the tokio timer.
//!
//! Follows `tokio::time::pause`/`advance`, so timestamps written into
//! dockets agree with the engine's timeouts in paused-time tests.

use shared_types::{TimeSource, Timestamp};
use tokio::time::Instant;

#[derive(Debug, Clone, Copy)]
pub struct TokioClock {
    origin: Instant,
    origin_millis: Timestamp,
}

impl TokioClock {
    /// Clock reading `start` milliseconds now.
    pub fn starting_at(start: Timestamp) -> Self {
        Self {
            origin: Instant::now(),
            origin_millis: start,
        }
    }
}

impl TimeSource for TokioClock {
    fn now(&self) -> Timestamp {
        self.origin_millis + self.origin.elapsed().as_millis() as Timestamp
    }
}
