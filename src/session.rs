//! One play of one chart.
//!
//! [`PlaySession`] ties the prepared [`Timeline`], the [`BeatRing`] and the
//! [`Judge`] together. Each frame the caller passes the playback time and the
//! touches of that frame; the session pulls every beat chunk that can be
//! reached by then, judges, and returns what was resolved.

use gametime::TimeStamp;

use crate::{
    dispatch::{BeatRing, BucketSource, RingConfig},
    error::{ChartError, Result},
    judge::{Judge, JudgeConfig, JudgeOutcome, LanePose, PlaybackClock, Tally, TouchSample},
    model::Chart,
    timeline::{Timeline, TimelineConfig, UnitState},
};

/// Configuration of every part of a session.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct SessionConfig {
    /// Timeline build.
    pub timeline: TimelineConfig,
    /// Judgment.
    pub judge: JudgeConfig,
    /// Dispatch ring.
    pub ring: RingConfig,
}

impl SessionConfig {
    /// Reads a JSON configuration. Missing fields keep their defaults.
    ///
    /// # Errors
    ///
    /// Returns the `serde_json` error for malformed JSON or mistyped fields.
    #[cfg(feature = "serde")]
    pub fn from_json_str(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }
}

/// What happened in one frame.
#[derive(Debug, Default)]
pub struct FrameOutput {
    /// Notes resolved this frame.
    pub outcomes: Vec<JudgeOutcome>,
    /// Current beat.
    pub beats: f32,
    /// Unit events of the beats that became active this frame.
    pub events: Vec<usize>,
    /// Failures of the dispatch worker observed this frame.
    pub worker_errors: Vec<ChartError>,
}

/// A chart being played.
#[derive(Debug)]
pub struct PlaySession {
    timeline: Timeline,
    judge: Judge,
    ring: BeatRing,
    clock: PlaybackClock,
    resolved: Vec<bool>,
    tally: Tally,
    beats: f32,
}

impl PlaySession {
    /// Prepares `chart` and starts the dispatch worker.
    ///
    /// # Errors
    ///
    /// Fails if the timeline cannot be built or the worker cannot be started.
    pub fn new(chart: Chart, config: &SessionConfig) -> Result<Self> {
        let timeline = Timeline::build(chart, &config.timeline)?;
        let ring = BeatRing::spawn(BucketSource::from_chart(timeline.chart()), &config.ring)?;
        let resolved = vec![false; timeline.chart().notes.len()];
        Ok(Self {
            timeline,
            judge: Judge::new(config.judge),
            ring,
            clock: PlaybackClock::new(),
            resolved,
            tally: Tally::default(),
            beats: 0.0,
        })
    }

    /// The prepared timeline.
    #[must_use]
    pub const fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Counts of the grades so far.
    #[must_use]
    pub const fn tally(&self) -> &Tally {
        &self.tally
    }

    /// The beat of the last frame.
    #[must_use]
    pub const fn beats(&self) -> f32 {
        self.beats
    }

    /// Whether every beat was delivered and every note resolved.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.ring.is_drained() && self.judge.active_len() == 0
    }

    /// Starts the playback clock.
    pub const fn start(&mut self, now: TimeStamp) {
        self.clock.start(now);
    }

    /// Pauses the playback clock.
    pub fn pause(&mut self, now: TimeStamp) {
        self.clock.pause(now);
    }

    /// Resumes the playback clock without counting the pause.
    pub fn resume(&mut self, now: TimeStamp) {
        self.clock.resume(now);
    }

    /// Runs a frame at the playback clock's time.
    pub fn update_at(&mut self, now: TimeStamp, touches: &[TouchSample]) -> FrameOutput {
        let time_ms = self.clock.elapsed_ms(now);
        self.update(time_ms, touches)
    }

    /// Runs a frame `time_ms` milliseconds into playback.
    ///
    /// The chart's offset is subtracted before judging.
    pub fn update(&mut self, time_ms: f64, touches: &[TouchSample]) -> FrameOutput {
        let chart_ms = time_ms - f64::from(self.timeline.chart().metadata.offset_ms);
        self.beats = self.timeline.beats_at_ms(chart_ms);
        let mut output = FrameOutput {
            beats: self.beats,
            ..FrameOutput::default()
        };

        let reach_beat = self
            .timeline
            .beats_at_ms(chart_ms + self.judge.config().reach_ms())
            .floor() as i64;
        while !self.ring.is_drained() && self.ring.next_beat() <= reach_beat {
            match self.ring.take_next() {
                Ok(Some(chunk)) => {
                    self.judge.activate(chunk.notes, &self.timeline.chart().notes);
                    output.events.extend(chunk.events);
                }
                Ok(None) => break,
                Err(err) => {
                    output.worker_errors.push(err);
                    break;
                }
            }
        }
        output.worker_errors.extend(self.ring.drain_errors());

        let lanes = self.lane_poses();
        output.outcomes =
            self.judge
                .judge_frame(chart_ms, touches, &self.timeline.chart().notes, &lanes);
        for outcome in &output.outcomes {
            self.tally.record(outcome.result);
            if let Some(resolved) = self.resolved.get_mut(outcome.note) {
                *resolved = true;
            }
        }
        output
    }

    fn lane_poses(&self) -> Vec<LanePose> {
        self.timeline
            .chart()
            .units
            .iter()
            .map(|unit| {
                self.timeline
                    .unit_state(unit.id, self.beats)
                    .map(|state| LanePose::new(state.position(), state.rotation))
                    .unwrap_or_default()
            })
            .collect()
    }

    /// Properties of every unit at the current beat, indexed by unit id.
    ///
    /// # Errors
    ///
    /// Propagates [`Timeline::unit_state`] failures.
    pub fn unit_states(&self) -> Result<Vec<UnitState>> {
        self.timeline
            .chart()
            .units
            .iter()
            .map(|unit| self.timeline.unit_state(unit.id, self.beats))
            .collect()
    }

    /// Offsets of the displayed, unresolved notes from their units at the current beat.
    ///
    /// # Errors
    ///
    /// Propagates [`Timeline::note_offset`] failures.
    pub fn note_offsets(&self) -> Result<Vec<(usize, f32)>> {
        self.timeline
            .chart()
            .notes
            .iter()
            .enumerate()
            .filter(|(index, note)| note.will_display && !self.resolved[*index])
            .map(|(index, note)| Ok((index, self.timeline.note_offset(note, self.beats)?)))
            .collect()
    }
}
