//! Matches player input against notes.
//!
//! The [`Judge`] keeps the set of notes that may still be hit. The session
//! adds notes as their beat buckets come in and calls
//! [`Judge::judge_frame`] once per frame with the current time and the touch
//! points of that frame. Every note leaves the set with exactly one
//! [`JudgeOutcome`].

pub mod clock;
pub mod input;

use parking_lot::Mutex;

pub use self::{
    clock::PlaybackClock,
    input::{LanePose, TouchPhase, TouchSample, touches_note},
};
use crate::model::{Note, NoteKind};

/// Timing windows and hit area.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct JudgeConfig {
    /// Full width of the perfect window, in milliseconds.
    pub perfect_window_ms: f64,
    /// Full width of the good window, in milliseconds.
    pub good_window_ms: f64,
    /// Full width of the bad window, in milliseconds.
    pub bad_window_ms: f64,
    /// Half the width of a note of size 1, in chart units.
    pub note_half_width: f32,
    /// Hit every note perfectly at its judge time, ignoring input.
    pub autoplay: bool,
}

impl Default for JudgeConfig {
    fn default() -> Self {
        Self {
            perfect_window_ms: 80.0,
            good_window_ms: 150.0,
            bad_window_ms: 350.0,
            note_half_width: 110.0,
            autoplay: false,
        }
    }
}

impl JudgeConfig {
    /// Sets the three windows.
    #[must_use]
    pub const fn with_windows(mut self, perfect: f64, good: f64, bad: f64) -> Self {
        self.perfect_window_ms = perfect;
        self.good_window_ms = good;
        self.bad_window_ms = bad;
        self
    }

    /// Sets [`JudgeConfig::note_half_width`].
    #[must_use]
    pub const fn with_note_half_width(mut self, note_half_width: f32) -> Self {
        self.note_half_width = note_half_width;
        self
    }

    /// Enables or disables autoplay.
    #[must_use]
    pub const fn with_autoplay(mut self, autoplay: bool) -> Self {
        self.autoplay = autoplay;
        self
    }

    /// How far from its judge time a note can still be hit, in milliseconds.
    #[must_use]
    pub fn reach_ms(&self) -> f64 {
        self.bad_window_ms / 2.0
    }

    /// Grade of a hit `delta_ms` away from the judge time, if inside any window.
    #[must_use]
    pub fn classify(&self, delta_ms: f64) -> Option<JudgeResult> {
        let delta = delta_ms.abs();
        if delta < self.perfect_window_ms / 2.0 {
            Some(JudgeResult::Perfect)
        } else if delta < self.good_window_ms / 2.0 {
            Some(JudgeResult::Good)
        } else if delta < self.bad_window_ms / 2.0 {
            Some(JudgeResult::Bad)
        } else {
            None
        }
    }
}

/// Grade of a resolved note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum JudgeResult {
    /// Inside the perfect window.
    Perfect,
    /// Inside the good window.
    Good,
    /// Inside the bad window.
    Bad,
    /// Not hit, or a hold released early.
    Miss,
}

impl JudgeResult {
    /// Whether the note counts as hit.
    #[must_use]
    pub const fn is_hit(self) -> bool {
        !matches!(self, Self::Miss)
    }
}

/// Judgment progress of an active note.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NoteState {
    /// Not touched yet.
    Pending,
    /// A hold being held, with the grade of its first contact.
    Sustaining(JudgeResult),
    /// Resolved.
    Judged(JudgeResult),
}

/// A resolved note.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JudgeOutcome {
    /// Index of the note in the chart.
    pub note: usize,
    /// Grade.
    pub result: JudgeResult,
    /// Playback time of the resolution, in milliseconds.
    pub time_ms: f64,
}

/// Counts of every grade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
#[allow(missing_docs)]
pub struct Tally {
    pub perfect: usize,
    pub good: usize,
    pub bad: usize,
    pub miss: usize,
}

impl Tally {
    /// Counts `result`.
    pub const fn record(&mut self, result: JudgeResult) {
        match result {
            JudgeResult::Perfect => self.perfect += 1,
            JudgeResult::Good => self.good += 1,
            JudgeResult::Bad => self.bad += 1,
            JudgeResult::Miss => self.miss += 1,
        }
    }

    /// Number of resolved notes.
    #[must_use]
    pub const fn total(&self) -> usize {
        self.perfect + self.good + self.bad + self.miss
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveNote {
    note: usize,
    judge_time_ms: f64,
    state: NoteState,
}

/// The active note set and the rules applied to it.
#[derive(Debug, Default)]
pub struct Judge {
    config: JudgeConfig,
    active: Mutex<Vec<ActiveNote>>,
}

impl Judge {
    /// A judge with nothing active.
    #[must_use]
    pub fn new(config: JudgeConfig) -> Self {
        Self {
            config,
            active: Mutex::new(Vec::new()),
        }
    }

    /// The configuration in use.
    #[must_use]
    pub const fn config(&self) -> &JudgeConfig {
        &self.config
    }

    /// Adds notes to the active set. Fake and unknown notes are ignored.
    pub fn activate(&self, indices: impl IntoIterator<Item = usize>, notes: &[Note]) {
        let mut active = self.active.lock();
        for index in indices {
            let Some(note) = notes.get(index).filter(|note| !note.is_fake) else {
                continue;
            };
            active.push(ActiveNote {
                note: index,
                judge_time_ms: note.judge_time_ms,
                state: NoteState::Pending,
            });
        }
        active.sort_by(|a, b| a.judge_time_ms.total_cmp(&b.judge_time_ms));
    }

    /// Number of notes not resolved yet.
    #[must_use]
    pub fn active_len(&self) -> usize {
        self.active.lock().len()
    }

    /// State of an active note, or `None` if it is not active.
    #[must_use]
    pub fn state(&self, note: usize) -> Option<NoteState> {
        self.active
            .lock()
            .iter()
            .find(|active| active.note == note)
            .map(|active| active.state)
    }

    /// Judges one frame at `time_ms`.
    ///
    /// `lanes` holds the pose of every unit, indexed by unit id. A touch that
    /// began this frame hits at most one note, the earliest one it reaches.
    pub fn judge_frame(
        &self,
        time_ms: f64,
        touches: &[TouchSample],
        notes: &[Note],
        lanes: &[LanePose],
    ) -> Vec<JudgeOutcome> {
        let mut active = self.active.lock();
        let mut consumed = vec![false; touches.len()];
        let mut outcomes = Vec::new();
        for entry in active.iter_mut() {
            let Some(note) = notes.get(entry.note) else {
                entry.state = NoteState::Judged(JudgeResult::Miss);
                outcomes.push(JudgeOutcome {
                    note: entry.note,
                    result: JudgeResult::Miss,
                    time_ms,
                });
                continue;
            };
            let frame = Frame {
                time_ms,
                touches,
                lane: lanes.get(note.unit_id as usize),
                half_width: self.config.note_half_width * note.size,
            };
            let next = if self.config.autoplay {
                autoplay(entry.state, note, time_ms)
            } else {
                self.step(entry.state, note, &frame, &mut consumed)
            };
            entry.state = next;
            if let NoteState::Judged(result) = next {
                let time_ms = if self.config.autoplay {
                    if note.kind == NoteKind::Hold {
                        note.end_time_ms
                    } else {
                        note.judge_time_ms
                    }
                } else {
                    time_ms
                };
                outcomes.push(JudgeOutcome {
                    note: entry.note,
                    result,
                    time_ms,
                });
            }
        }
        active.retain(|entry| !matches!(entry.state, NoteState::Judged(_)));
        outcomes
    }

    fn step(
        &self,
        state: NoteState,
        note: &Note,
        frame: &Frame<'_>,
        consumed: &mut [bool],
    ) -> NoteState {
        let delta = frame.time_ms - note.judge_time_ms;
        match state {
            NoteState::Judged(_) => state,
            NoteState::Sustaining(quality) => {
                if frame.time_ms >= note.end_time_ms {
                    NoteState::Judged(quality)
                } else if frame.any_touch(note, TouchPhase::is_live) {
                    state
                } else {
                    NoteState::Judged(JudgeResult::Miss)
                }
            }
            NoteState::Pending if delta > self.config.reach_ms() => {
                NoteState::Judged(JudgeResult::Miss)
            }
            NoteState::Pending if -delta > self.config.reach_ms() => state,
            NoteState::Pending => match note.kind {
                NoteKind::Tap => self
                    .config
                    .classify(delta)
                    .filter(|_| frame.take_began(note, consumed))
                    .map_or(state, NoteState::Judged),
                NoteKind::Flick => {
                    if frame.any_touch(note, |phase| phase == TouchPhase::Moved) {
                        NoteState::Judged(JudgeResult::Perfect)
                    } else {
                        state
                    }
                }
                NoteKind::Drag => {
                    if delta >= 0.0 && frame.any_touch(note, TouchPhase::is_live) {
                        NoteState::Judged(JudgeResult::Perfect)
                    } else {
                        state
                    }
                }
                NoteKind::Hold => match self.config.classify(delta) {
                    Some(quality) if frame.take_began(note, consumed) => match quality {
                        JudgeResult::Perfect | JudgeResult::Good => NoteState::Sustaining(quality),
                        _ => NoteState::Judged(quality),
                    },
                    _ => state,
                },
            },
        }
    }
}

fn autoplay(state: NoteState, note: &Note, time_ms: f64) -> NoteState {
    match state {
        NoteState::Pending if time_ms >= note.judge_time_ms => {
            if note.kind == NoteKind::Hold && time_ms < note.end_time_ms {
                NoteState::Sustaining(JudgeResult::Perfect)
            } else {
                NoteState::Judged(JudgeResult::Perfect)
            }
        }
        NoteState::Sustaining(quality) if time_ms >= note.end_time_ms => NoteState::Judged(quality),
        _ => state,
    }
}

struct Frame<'a> {
    time_ms: f64,
    touches: &'a [TouchSample],
    lane: Option<&'a LanePose>,
    half_width: f32,
}

impl Frame<'_> {
    fn hits(&self, note: &Note, touch: &TouchSample) -> bool {
        self.lane
            .is_some_and(|lane| touches_note(lane, touch.position, note.x_position, self.half_width))
    }

    fn any_touch(&self, note: &Note, phase: impl Fn(TouchPhase) -> bool) -> bool {
        self.touches
            .iter()
            .any(|touch| phase(touch.phase) && self.hits(note, touch))
    }

    /// Consumes the first unconsumed touch that began this frame over `note`.
    fn take_began(&self, note: &Note, consumed: &mut [bool]) -> bool {
        let found = self.touches.iter().zip(consumed.iter()).position(|(touch, used)| {
            !used && touch.phase == TouchPhase::Began && self.hits(note, touch)
        });
        if let Some(index) = found {
            consumed[index] = true;
        }
        found.is_some()
    }
}
