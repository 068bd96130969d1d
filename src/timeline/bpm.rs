//! Beat to real time conversion over the tempo map.

use crate::{
    error::{ChartError, Result},
    model::BpmEvent,
};

#[derive(Debug, Clone, Copy, PartialEq)]
struct TempoSegment {
    begin_beats: f64,
    bpm: f64,
    begin_ms: f64,
}

/// Piecewise constant tempo, integrated ahead of time.
#[derive(Debug, Clone, PartialEq)]
pub struct BpmTrack {
    segments: Vec<TempoSegment>,
}

impl BpmTrack {
    /// Integrates sorted BPM events.
    ///
    /// # Errors
    ///
    /// Fails without any event, when the first event starts after beat 0, when
    /// the events are not in strictly increasing beat order, or when a BPM is
    /// not finite and positive. [`Chart::normalize_bpm_events`] sorts and
    /// deduplicates them.
    ///
    /// [`Chart::normalize_bpm_events`]: crate::model::Chart::normalize_bpm_events
    pub fn new(events: &[BpmEvent]) -> Result<Self> {
        let first = events
            .first()
            .ok_or(ChartError::MissingRequiredSection { section: "BPM list" })?;
        if first.begin_beats > 0.0 {
            return Err(ChartError::invalid_timing(format!(
                "first BPM event starts at beat {}",
                first.begin_beats
            )));
        }
        let mut segments: Vec<TempoSegment> = Vec::with_capacity(events.len());
        let mut previous_beats = None;
        for event in events {
            if !(event.bpm.is_finite() && event.bpm > 0.0) {
                return Err(ChartError::invalid_timing(format!(
                    "BPM {} at beat {} is not positive",
                    event.bpm, event.begin_beats
                )));
            }
            if let Some(previous) = previous_beats
                && event.begin_beats <= previous
            {
                return Err(ChartError::invalid_timing(format!(
                    "BPM event at beat {} does not follow the event at beat {previous}",
                    event.begin_beats
                )));
            }
            previous_beats = Some(event.begin_beats);
            let begin_beats = f64::from(event.begin_beats.max(0.0));
            let begin_ms = segments
                .last()
                .map_or(0.0, |previous| previous.ms_at(begin_beats));
            segments.push(TempoSegment {
                begin_beats,
                bpm: f64::from(event.bpm),
                begin_ms,
            });
        }
        Ok(Self { segments })
    }

    fn segment_at_beats(&self, beats: f64) -> &TempoSegment {
        let index = self
            .segments
            .partition_point(|segment| segment.begin_beats <= beats)
            .saturating_sub(1);
        &self.segments[index]
    }

    /// Milliseconds from beat 0 to `beats`. Negative beats extrapolate with the first tempo.
    #[must_use]
    pub fn ms_at(&self, beats: f32) -> f64 {
        self.segment_at_beats(f64::from(beats)).ms_at(f64::from(beats))
    }

    /// The beat reached after `ms` milliseconds.
    #[must_use]
    pub fn beats_at(&self, ms: f64) -> f32 {
        let index = self
            .segments
            .partition_point(|segment| segment.begin_ms <= ms)
            .saturating_sub(1);
        let segment = &self.segments[index];
        (segment.begin_beats + (ms - segment.begin_ms) * segment.bpm / 60_000.0) as f32
    }

    /// Tempo in effect at `beats`.
    #[must_use]
    pub fn bpm_at(&self, beats: f32) -> f32 {
        self.segment_at_beats(f64::from(beats)).bpm as f32
    }
}

impl TempoSegment {
    fn ms_at(&self, beats: f64) -> f64 {
        self.begin_ms + (beats - self.begin_beats) * 60_000.0 / self.bpm
    }
}
