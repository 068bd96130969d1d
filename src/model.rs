//! The canonical, format independent chart model.
//!
//! Every adapter produces a [`Chart`]. The arrays it owns are flat and
//! relationships between them are plain ids (`unit_id`), so the timeline
//! engine can derive fields for notes in parallel without shared ownership.
//!
//! Fields marked as *derived* are left at their defaults by the adapters and
//! filled in by [`crate::timeline::Timeline::build`].

pub mod beat;
pub mod easing;

use std::collections::BTreeMap;

use crate::error::{ChartError, Result};

pub use self::{beat::BeatTriplet, easing::EasingFunction};

/// Display strings of a chart. Not interpreted by the engine.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartMetadata {
    /// Title of the song.
    pub title: String,
    /// Difficulty label, e.g. `IN Lv.15`.
    pub level: String,
    /// Author of the chart.
    pub charter: String,
    /// Composer of the song.
    pub composer: String,
    /// Audio file name.
    pub song: String,
    /// Background picture file name.
    pub picture: String,
    /// Global offset in milliseconds, forwarded from the source format.
    pub offset_ms: f32,
}

/// A BPM change.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct BpmEvent {
    /// Beat the tempo starts at.
    pub begin_beats: f32,
    /// Beats per minute, always positive.
    pub bpm: f32,
}

/// What a unit is used for.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitKind {
    /// A judge line notes fall onto.
    #[default]
    Line,
    /// A line that carries a UI element instead of notes.
    AttachUI,
    /// A line that displays text.
    Text,
}

/// One piece of a unit's scroll speed function.
///
/// A static segment holds `begin_value` over its whole range, a ramp moves
/// linearly from `begin_value` to `end_value`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpeedSegment {
    /// First beat covered.
    pub begin_beats: f32,
    /// Beat the segment ends at. May be infinite for the trailing hold.
    pub end_beats: f32,
    /// Speed at `begin_beats`.
    pub begin_value: f32,
    /// Speed at `end_beats`.
    pub end_value: f32,
    /// Whether the speed is constant over the segment.
    pub is_static: bool,
}

impl SpeedSegment {
    /// A constant speed segment.
    #[must_use]
    pub const fn hold(begin_beats: f32, end_beats: f32, value: f32) -> Self {
        Self {
            begin_beats,
            end_beats,
            begin_value: value,
            end_value: value,
            is_static: true,
        }
    }

    /// Whether `beats` lies inside this segment. The end is exclusive.
    #[must_use]
    pub fn covers(&self, beats: f32) -> bool {
        self.begin_beats <= beats && beats < self.end_beats
    }

    /// Speed at `beats`, extrapolating the ramp linearly outside the segment.
    #[must_use]
    pub fn value_at(&self, beats: f32) -> f32 {
        let span = self.end_beats - self.begin_beats;
        if self.is_static || !span.is_finite() || span <= 0.0 {
            return self.begin_value;
        }
        self.begin_value + (self.end_value - self.begin_value) * ((beats - self.begin_beats) / span)
    }

    /// Signed area under the speed function from `begin_beats` to `beats`.
    #[must_use]
    pub fn area_until(&self, beats: f32) -> f32 {
        let delta = beats - self.begin_beats;
        if self.is_static || !self.end_beats.is_finite() {
            return self.begin_value * delta;
        }
        if self.end_beats <= self.begin_beats {
            return 0.0;
        }
        (self.begin_value + self.value_at(beats)) * 0.5 * delta
    }
}

/// A judge line, or another moving reference frame.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Unit {
    /// Id of this unit, equal to its index in [`Chart::units`].
    pub id: u32,
    /// Unit whose position this one is relative to.
    pub parent_id: Option<u32>,
    /// What the unit is used for.
    pub kind: UnitKind,
    /// Derived: the contiguous speed function of this unit, see [`crate::timeline`].
    #[cfg_attr(feature = "serde", serde(skip))]
    pub speed_segments: Vec<SpeedSegment>,
}

impl Unit {
    /// A plain judge line without parent.
    #[must_use]
    pub fn line(id: u32) -> Self {
        Self {
            id,
            ..Default::default()
        }
    }
}

/// The property a [`UnitEvent`] animates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum UnitEventKind {
    /// Opacity, 0 to 255.
    Alpha,
    /// Horizontal position.
    MoveX,
    /// Vertical position.
    MoveY,
    /// Rotation in degrees.
    Rotate,
    /// Scroll speed.
    Speed,
    /// Perspective incline.
    Incline,
    /// Horizontal scale.
    ScaleX,
    /// Vertical scale.
    ScaleY,
    /// Tint, packed with [`pack_rgb`].
    Color,
}

impl UnitEventKind {
    /// All kinds, in declaration order.
    pub const ALL: [Self; 9] = [
        Self::Alpha,
        Self::MoveX,
        Self::MoveY,
        Self::Rotate,
        Self::Speed,
        Self::Incline,
        Self::ScaleX,
        Self::ScaleY,
        Self::Color,
    ];
}

/// A timed transition of one unit property.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct UnitEvent {
    /// Animated property.
    pub kind: UnitEventKind,
    /// First beat of the transition.
    pub begin_beats: f32,
    /// Last beat of the transition. Equal to `begin_beats` for an instantaneous step.
    pub end_beats: f32,
    /// Value at `begin_beats`.
    pub begin_value: f32,
    /// Value at `end_beats`.
    pub end_value: f32,
    /// Curve between the two values.
    pub easing: EasingFunction,
    /// Part of the curve in use, `(0.0, 1.0)` for the whole curve.
    pub easing_range: (f32, f32),
    /// Unit this event belongs to.
    pub unit_id: u32,
    /// Event layer. Values of concurrent layers are summed.
    pub layer: u32,
}

impl UnitEvent {
    /// A step to `value` at `beats` on layer 0.
    #[must_use]
    pub const fn step(kind: UnitEventKind, unit_id: u32, beats: f32, value: f32) -> Self {
        Self::ramp(kind, unit_id, (beats, beats), (value, value), EasingFunction::Linear)
    }

    /// A transition over `beats` between `values` on layer 0.
    #[must_use]
    pub const fn ramp(
        kind: UnitEventKind,
        unit_id: u32,
        beats: (f32, f32),
        values: (f32, f32),
        easing: EasingFunction,
    ) -> Self {
        Self {
            kind,
            begin_beats: beats.0,
            end_beats: beats.1,
            begin_value: values.0,
            end_value: values.1,
            easing,
            easing_range: (0.0, 1.0),
            unit_id,
            layer: 0,
        }
    }

    /// Whether this event is an instantaneous step.
    #[must_use]
    pub fn is_step(&self) -> bool {
        self.begin_beats >= self.end_beats
    }

    /// Value of the transition at `beats`.
    ///
    /// Before the event the begin value is returned, after it the end value.
    #[must_use]
    pub fn value_at(&self, beats: f32) -> f32 {
        if self.is_step() {
            return if beats < self.begin_beats {
                self.begin_value
            } else {
                self.end_value
            };
        }
        let t = ((beats - self.begin_beats) / (self.end_beats - self.begin_beats)).clamp(0.0, 1.0);
        let (low, high) = self.easing_range;
        let eased = self.easing.ease_range(t, low, high);
        if self.kind == UnitEventKind::Color {
            return lerp_rgb(self.begin_value, self.end_value, eased);
        }
        self.begin_value + (self.end_value - self.begin_value) * eased
    }
}

/// Packs an RGB color into an `f32` that represents it exactly.
#[must_use]
pub fn pack_rgb([r, g, b]: [u8; 3]) -> f32 {
    ((u32::from(r) << 16) | (u32::from(g) << 8) | u32::from(b)) as f32
}

/// Inverse of [`pack_rgb`].
#[must_use]
pub fn unpack_rgb(packed: f32) -> [u8; 3] {
    let bits = packed.clamp(0.0, 16_777_215.0) as u32;
    [(bits >> 16) as u8, (bits >> 8) as u8, bits as u8]
}

fn lerp_rgb(from: f32, to: f32, t: f32) -> f32 {
    let from = unpack_rgb(from);
    let to = unpack_rgb(to);
    let mut out = [0; 3];
    for ((out, a), b) in out.iter_mut().zip(from).zip(to) {
        *out = (f32::from(a) + (f32::from(b) - f32::from(a)) * t)
            .round()
            .clamp(0.0, 255.0) as u8;
    }
    pack_rgb(out)
}

/// How a note is played.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum NoteKind {
    /// Touch at the right time.
    Tap,
    /// Swipe while the note passes.
    Flick,
    /// Touch and keep touching until the end.
    Hold,
    /// Have a finger on the line when the note passes.
    Drag,
}

impl NoteKind {
    /// Maps the numeric note type shared by the supported formats: 1 Tap, 2 Hold, 3 Flick, 4 Drag.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::UnsupportedFeature`] for any other number.
    pub fn from_type_id(id: i64) -> Result<Self> {
        match id {
            1 => Ok(Self::Tap),
            2 => Ok(Self::Hold),
            3 => Ok(Self::Flick),
            4 => Ok(Self::Drag),
            other => Err(ChartError::UnsupportedFeature {
                feature: format!("note type {other}"),
                offset: 0,
            }),
        }
    }
}

/// A playable (or decorative, if fake) note.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Note {
    /// How the note is played.
    pub kind: NoteKind,
    /// Beat the note is judged at.
    pub begin_beats: f32,
    /// Beat a hold ends at. Equal to `begin_beats` for other kinds.
    pub end_beats: f32,
    /// Position along the unit.
    pub x_position: f32,
    /// Offset perpendicular to the unit.
    pub y_position: f32,
    /// Unit the note scrolls on.
    pub unit_id: u32,
    /// Whether the note approaches from below the unit.
    pub reverse_direction: bool,
    /// Fake notes are only drawn, never judged.
    pub is_fake: bool,
    /// Per-note scroll multiplier.
    pub speed: f32,
    /// Width multiplier, also applied to the touch tolerance.
    pub size: f32,
    /// Derived: scroll displacement of the unit at `begin_beats`.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub note_height: f32,
    /// Derived: displacement covered by a hold, zero for other kinds.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub note_length: f32,
    /// Derived: absolute time of `begin_beats` in milliseconds.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub judge_time_ms: f64,
    /// Derived: absolute time of `end_beats` in milliseconds.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub end_time_ms: f64,
    /// Derived: `false` when the note was culled as a dense duplicate.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub will_display: bool,
}

impl Note {
    /// A real note with default modifiers and no derived fields.
    #[must_use]
    pub const fn new(kind: NoteKind, unit_id: u32, begin_beats: f32, end_beats: f32) -> Self {
        Self {
            kind,
            begin_beats,
            end_beats,
            x_position: 0.0,
            y_position: 0.0,
            unit_id,
            reverse_direction: false,
            is_fake: false,
            speed: 1.0,
            size: 1.0,
            note_height: 0.0,
            note_length: 0.0,
            judge_time_ms: 0.0,
            end_time_ms: 0.0,
            will_display: true,
        }
    }

    /// Sets the horizontal position.
    #[must_use]
    pub const fn with_x(mut self, x_position: f32) -> Self {
        self.x_position = x_position;
        self
    }

    /// Marks the note as fake.
    #[must_use]
    pub const fn with_fake(mut self, is_fake: bool) -> Self {
        self.is_fake = is_fake;
        self
    }
}

/// Index of the beat bucket a beat belongs to.
#[must_use]
pub fn bucket_index(beats: f32) -> i64 {
    beats.floor() as i64
}

/// A loaded chart.
#[derive(Debug, Default, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Chart {
    /// Display strings.
    pub metadata: ChartMetadata,
    /// Tempo changes, sorted by beat, the first one at beat 0.
    pub bpm_events: Vec<BpmEvent>,
    /// Units, indexed by id.
    pub units: Vec<Unit>,
    /// Property transitions of all units.
    pub unit_events: Vec<UnitEvent>,
    /// Notes of all units.
    pub notes: Vec<Note>,
    /// Derived: indices of non-fake notes by [`bucket_index`] of their begin beat.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub note_buckets: BTreeMap<i64, Vec<usize>>,
    /// Derived: indices of unit events by [`bucket_index`] of their begin beat.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub event_buckets: BTreeMap<i64, Vec<usize>>,
}

impl Chart {
    /// Finds a unit by id.
    #[must_use]
    pub fn unit(&self, id: u32) -> Option<&Unit> {
        self.units.get(id as usize).filter(|unit| unit.id == id)
    }

    /// Makes sure a unit exists for every id up to `id`.
    pub fn ensure_unit(&mut self, id: u32) {
        while self.units.len() <= id as usize {
            let next = self.units.len() as u32;
            self.units.push(Unit::line(next));
        }
    }

    /// Events of `unit` with `kind`, in array order.
    pub fn events_of(&self, unit: u32, kind: UnitEventKind) -> impl Iterator<Item = &UnitEvent> {
        self.unit_events
            .iter()
            .filter(move |event| event.unit_id == unit && event.kind == kind)
    }

    /// Rejects data the timeline cannot integrate.
    ///
    /// # Errors
    ///
    /// - [`ChartError::MissingRequiredSection`] without any BPM event.
    /// - [`ChartError::InvalidTimingData`] for a non-positive or non-finite BPM, a
    ///   first BPM event after beat 0, a hold or event that ends before it begins,
    ///   a unit whose id is not its index, a note or event on a unit that
    ///   does not exist, or a non-finite beat, position, modifier or event value.
    pub fn validate(&self) -> Result<()> {
        if let Some((index, unit)) = self
            .units
            .iter()
            .enumerate()
            .find(|(index, unit)| unit.id as usize != *index)
        {
            return Err(ChartError::invalid_timing(format!(
                "unit {} is stored at index {index}",
                unit.id
            )));
        }
        let first = self
            .bpm_events
            .first()
            .ok_or(ChartError::MissingRequiredSection { section: "BPM list" })?;
        if first.begin_beats > 0.0 {
            return Err(ChartError::invalid_timing(format!(
                "first BPM event starts at beat {} instead of 0",
                first.begin_beats
            )));
        }
        if let Some(bad) = self
            .bpm_events
            .iter()
            .find(|event| {
                !(event.begin_beats.is_finite() && event.bpm.is_finite() && event.bpm > 0.0)
            })
        {
            return Err(ChartError::invalid_timing(format!(
                "BPM {} at beat {} is not a positive finite tempo",
                bad.bpm, bad.begin_beats
            )));
        }
        for note in &self.notes {
            let fields = [
                note.begin_beats,
                note.end_beats,
                note.x_position,
                note.y_position,
                note.speed,
                note.size,
            ];
            if !fields.iter().all(|value| value.is_finite()) {
                return Err(ChartError::invalid_timing(format!(
                    "{:?} note of unit {} has a non-finite beat, position or modifier: {fields:?}",
                    note.kind, note.unit_id
                )));
            }
            if note.end_beats < note.begin_beats {
                return Err(ChartError::invalid_timing(format!(
                    "{:?} note at beat {} ends at beat {}",
                    note.kind, note.begin_beats, note.end_beats
                )));
            }
            if self.unit(note.unit_id).is_none() {
                return Err(ChartError::invalid_timing(format!(
                    "note at beat {} refers to missing unit {}",
                    note.begin_beats, note.unit_id
                )));
            }
        }
        for event in &self.unit_events {
            let fields = [
                event.begin_beats,
                event.end_beats,
                event.begin_value,
                event.end_value,
                event.easing_range.0,
                event.easing_range.1,
            ];
            if !fields.iter().all(|value| value.is_finite()) {
                return Err(ChartError::invalid_timing(format!(
                    "{:?} event of unit {} has a non-finite beat or value: {fields:?}",
                    event.kind, event.unit_id
                )));
            }
            if event.end_beats < event.begin_beats {
                return Err(ChartError::invalid_timing(format!(
                    "{:?} event of unit {} at beat {} ends at beat {}",
                    event.kind, event.unit_id, event.begin_beats, event.end_beats
                )));
            }
            if self.unit(event.unit_id).is_none() {
                return Err(ChartError::invalid_timing(format!(
                    "event at beat {} refers to missing unit {}",
                    event.begin_beats, event.unit_id
                )));
            }
        }
        Ok(())
    }

    /// Sorts the BPM events by beat, keeping the later of coincident events.
    pub fn normalize_bpm_events(&mut self) {
        self.bpm_events
            .sort_by(|a, b| a.begin_beats.total_cmp(&b.begin_beats));
        self.bpm_events.reverse();
        self.bpm_events
            .dedup_by(|later, earlier| later.begin_beats == earlier.begin_beats);
        self.bpm_events.reverse();
    }

    /// Rebuilds [`Chart::note_buckets`] and [`Chart::event_buckets`].
    pub fn rebuild_buckets(&mut self) {
        let mut note_buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (index, note) in self.notes.iter().enumerate() {
            if !note.is_fake {
                note_buckets
                    .entry(bucket_index(note.begin_beats))
                    .or_default()
                    .push(index);
            }
        }
        let mut event_buckets: BTreeMap<i64, Vec<usize>> = BTreeMap::new();
        for (index, event) in self.unit_events.iter().enumerate() {
            event_buckets
                .entry(bucket_index(event.begin_beats))
                .or_default()
                .push(index);
        }
        self.note_buckets = note_buckets;
        self.event_buckets = event_buckets;
    }

    /// The last beat any note reaches.
    #[must_use]
    pub fn last_note_beat(&self) -> f32 {
        self.notes
            .iter()
            .map(|note| note.begin_beats.max(note.end_beats))
            .fold(0.0, f32::max)
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn chart_with_bpm(bpm: &[(f32, f32)]) -> Chart {
        let mut chart = Chart::default();
        chart.ensure_unit(0);
        chart.bpm_events = bpm
            .iter()
            .map(|&(begin_beats, bpm)| BpmEvent { begin_beats, bpm })
            .collect();
        chart
    }

    #[test]
    fn validate_requires_bpm_list() {
        let chart = chart_with_bpm(&[]);
        assert!(matches!(
            chart.validate(),
            Err(ChartError::MissingRequiredSection { .. })
        ));
    }

    #[test]
    fn validate_rejects_bad_timing() {
        assert!(matches!(
            chart_with_bpm(&[(0.0, 0.0)]).validate(),
            Err(ChartError::InvalidTimingData { .. })
        ));
        assert!(matches!(
            chart_with_bpm(&[(1.0, 120.0)]).validate(),
            Err(ChartError::InvalidTimingData { .. })
        ));
        let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
        chart.notes.push(Note::new(NoteKind::Hold, 0, 8.0, 4.0));
        assert!(matches!(
            chart.validate(),
            Err(ChartError::InvalidTimingData { .. })
        ));
    }

    #[test]
    fn validate_rejects_non_finite_values() {
        assert!(matches!(
            chart_with_bpm(&[(f32::NAN, 120.0)]).validate(),
            Err(ChartError::InvalidTimingData { .. })
        ));

        for beats in [f32::NAN, f32::INFINITY] {
            let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
            chart.notes.push(Note::new(NoteKind::Tap, 0, beats, beats));
            assert!(matches!(
                chart.validate(),
                Err(ChartError::InvalidTimingData { .. })
            ));
        }

        let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
        chart.notes.push(Note::new(NoteKind::Tap, 0, 1.0, 1.0).with_x(f32::INFINITY));
        assert!(chart.validate().is_err());

        let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
        chart.unit_events.push(UnitEvent::ramp(
            UnitEventKind::MoveX,
            0,
            (0.0, f32::NAN),
            (0.0, 1.0),
            EasingFunction::Linear,
        ));
        assert!(chart.validate().is_err());

        let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
        chart
            .unit_events
            .push(UnitEvent::step(UnitEventKind::Alpha, 0, 1.0, f32::NEG_INFINITY));
        assert!(chart.validate().is_err());
    }

    #[test]
    fn buckets_skip_fake_notes() {
        let mut chart = chart_with_bpm(&[(0.0, 120.0)]);
        chart.notes = vec![
            Note::new(NoteKind::Tap, 0, 0.5, 0.5),
            Note::new(NoteKind::Tap, 0, 1.0, 1.0).with_fake(true),
            Note::new(NoteKind::Drag, 0, 1.75, 1.75),
        ];
        chart
            .unit_events
            .push(UnitEvent::step(UnitEventKind::Alpha, 0, 2.5, 255.0));
        chart.rebuild_buckets();
        assert_eq!(chart.note_buckets.get(&0), Some(&vec![0]));
        assert_eq!(chart.note_buckets.get(&1), Some(&vec![2]));
        assert_eq!(chart.event_buckets.get(&2), Some(&vec![0]));
    }

    #[test]
    fn coincident_bpm_events_keep_the_later_one() {
        let mut chart = chart_with_bpm(&[(4.0, 90.0), (0.0, 120.0), (4.0, 150.0)]);
        chart.normalize_bpm_events();
        assert_eq!(
            chart.bpm_events,
            vec![
                BpmEvent {
                    begin_beats: 0.0,
                    bpm: 120.0
                },
                BpmEvent {
                    begin_beats: 4.0,
                    bpm: 150.0
                },
            ]
        );
    }

    #[test]
    fn color_events_interpolate_channels() {
        let event = UnitEvent::ramp(
            UnitEventKind::Color,
            0,
            (0.0, 2.0),
            (pack_rgb([0, 0, 0]), pack_rgb([200, 100, 50])),
            EasingFunction::Linear,
        );
        assert_eq!(unpack_rgb(event.value_at(1.0)), [100, 50, 25]);
    }

    #[test]
    fn step_event_switches_at_its_beat() {
        let event = UnitEvent {
            begin_value: 1.0,
            ..UnitEvent::step(UnitEventKind::MoveX, 0, 3.0, 5.0)
        };
        assert_eq!(event.value_at(2.9), 1.0);
        assert_eq!(event.value_at(3.0), 5.0);
    }

    #[test]
    fn ramp_segment_area_is_a_trapezoid() {
        let segment = SpeedSegment {
            begin_beats: 0.0,
            end_beats: 2.0,
            begin_value: 1.0,
            end_value: 3.0,
            is_static: false,
        };
        assert_eq!(segment.area_until(2.0), 4.0);
        assert_eq!(segment.area_until(1.0), 1.5);
    }
}
