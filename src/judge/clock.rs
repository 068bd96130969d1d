//! Pausable playback time.

use gametime::{TimeSpan, TimeStamp};

/// Elapsed playback time that does not advance while paused.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct PlaybackClock {
    started_at: Option<TimeStamp>,
    paused_at: Option<TimeStamp>,
    paused_nanos: i64,
}

impl PlaybackClock {
    /// A clock that has not started yet.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            started_at: None,
            paused_at: None,
            paused_nanos: 0,
        }
    }

    /// Starts (or restarts) playback at `now`.
    pub const fn start(&mut self, now: TimeStamp) {
        self.started_at = Some(now);
        self.paused_at = None;
        self.paused_nanos = 0;
    }

    /// When playback started, if it did.
    #[must_use]
    pub const fn started_at(&self) -> Option<TimeStamp> {
        self.started_at
    }

    /// Whether the clock is paused.
    #[must_use]
    pub const fn is_paused(&self) -> bool {
        self.paused_at.is_some()
    }

    /// Freezes the clock at `now`. Does nothing if already paused or not started.
    pub fn pause(&mut self, now: TimeStamp) {
        if self.started_at.is_some() && self.paused_at.is_none() {
            self.paused_at = Some(now);
        }
    }

    /// Continues from where [`PlaybackClock::pause`] left off.
    pub fn resume(&mut self, now: TimeStamp) {
        if let Some(paused_at) = self.paused_at.take() {
            self.paused_nanos += span_nanos(now - paused_at);
        }
    }

    /// Time played so far.
    #[must_use]
    pub fn elapsed(&self, now: TimeStamp) -> TimeSpan {
        let Some(started_at) = self.started_at else {
            return TimeSpan::ZERO;
        };
        let until = self.paused_at.unwrap_or(now);
        let nanos = (span_nanos(until - started_at) - self.paused_nanos).max(0);
        TimeSpan::from_duration(std::time::Duration::from_nanos(nanos as u64))
    }

    /// Time played so far in milliseconds.
    #[must_use]
    pub fn elapsed_ms(&self, now: TimeStamp) -> f64 {
        span_nanos(self.elapsed(now)) as f64 / 1_000_000.0
    }
}

fn span_nanos(span: TimeSpan) -> i64 {
    i64::try_from(span.as_nanos().max(0)).unwrap_or(i64::MAX)
}
