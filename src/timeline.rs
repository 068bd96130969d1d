//! Derives the absolute time and position of everything in a chart.
//!
//! [`Timeline::build`] runs once per loaded chart. It integrates every unit's
//! speed events into [`SpeedSegment`](crate::model::SpeedSegment)s, integrates
//! the tempo map, indexes property events, fills the derived fields of every
//! note and rebuilds the beat buckets. Independent passes run on the `rayon`
//! pool and are joined before the timeline is returned.
//!
//! ```
//! use judgeline::model::{BpmEvent, Chart, Note, NoteKind};
//! use judgeline::timeline::{Timeline, TimelineConfig};
//!
//! let mut chart = Chart::default();
//! chart.ensure_unit(0);
//! chart.bpm_events.push(BpmEvent { begin_beats: 0.0, bpm: 120.0 });
//! chart.notes.push(Note::new(NoteKind::Hold, 0, 4.0, 8.0));
//!
//! let timeline = Timeline::build(chart, &TimelineConfig::default()).unwrap();
//! let hold = &timeline.chart().notes[0];
//! assert_eq!(hold.note_length, 2.0);
//! assert_eq!(hold.judge_time_ms, 2000.0);
//! ```

pub mod bpm;
pub mod cull;
pub mod property;
pub mod speed;

use std::collections::HashMap;

use glam::Vec2;
use log::{debug, warn};
use rayon::prelude::*;

pub use self::{bpm::BpmTrack, property::PropertyTracks};
use crate::{
    error::{ChartError, Result},
    model::{Chart, Note, NoteKind, Unit, UnitEvent, UnitEventKind, pack_rgb, unpack_rgb},
};

/// Tuning of [`Timeline::build`].
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct TimelineConfig {
    /// Factor applied to integrated displacement.
    pub output_scale: f32,
    /// Scroll speed of units without speed events.
    pub default_speed: f32,
    /// Whether to run the dense note pass.
    pub cull_dense_notes: bool,
    /// Height bucket width of the dense note pass, in output units.
    pub cull_height_bucket: f32,
    /// Horizontal distance under which notes count as overlapping, in chart units.
    pub cull_distance: f32,
    /// Number of chunks the note pass is split into.
    pub workers: usize,
}

impl Default for TimelineConfig {
    fn default() -> Self {
        Self {
            output_scale: 0.5,
            default_speed: 1.0,
            cull_dense_notes: true,
            cull_height_bucket: 0.10,
            cull_distance: 25.0,
            workers: 2,
        }
    }
}

impl TimelineConfig {
    /// Sets [`TimelineConfig::output_scale`].
    #[must_use]
    pub const fn with_output_scale(mut self, output_scale: f32) -> Self {
        self.output_scale = output_scale;
        self
    }

    /// Sets [`TimelineConfig::default_speed`].
    #[must_use]
    pub const fn with_default_speed(mut self, default_speed: f32) -> Self {
        self.default_speed = default_speed;
        self
    }

    /// Enables or disables the dense note pass.
    #[must_use]
    pub const fn with_culling(mut self, enabled: bool) -> Self {
        self.cull_dense_notes = enabled;
        self
    }

    /// Sets [`TimelineConfig::workers`].
    #[must_use]
    pub const fn with_workers(mut self, workers: usize) -> Self {
        self.workers = workers;
        self
    }
}

/// Evaluated properties of a unit at one beat.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct UnitState {
    /// Scroll displacement, scaled.
    pub displacement: f32,
    /// Horizontal position, including parents.
    pub x: f32,
    /// Vertical position, including parents.
    pub y: f32,
    /// Rotation in degrees.
    pub rotation: f32,
    /// Opacity, 0 to 255.
    pub alpha: f32,
    /// Horizontal scale.
    pub scale_x: f32,
    /// Vertical scale.
    pub scale_y: f32,
    /// Perspective incline.
    pub incline: f32,
    /// Tint.
    pub color: [u8; 3],
}

impl UnitState {
    /// Position as a vector.
    #[must_use]
    pub const fn position(&self) -> Vec2 {
        Vec2::new(self.x, self.y)
    }
}

/// A chart with every derived quantity computed.
#[derive(Debug, Clone)]
pub struct Timeline {
    chart: Chart,
    config: TimelineConfig,
    prefix: Vec<Vec<f64>>,
    bpm: BpmTrack,
    properties: PropertyTracks,
}

impl Timeline {
    /// Prepares `chart` for play.
    ///
    /// # Errors
    ///
    /// Fails if the chart does not validate or a derived quantity cannot be computed.
    pub fn build(mut chart: Chart, config: &TimelineConfig) -> Result<Self> {
        chart.normalize_bpm_events();
        chart.validate()?;

        let mut speed_events: HashMap<u32, Vec<&UnitEvent>> = HashMap::new();
        for event in &chart.unit_events {
            if event.kind == UnitEventKind::Speed {
                speed_events.entry(event.unit_id).or_default().push(event);
            }
        }
        let units = &mut chart.units;
        let (segments, (bpm, properties)) = rayon::join(
            || {
                units.par_iter_mut().try_for_each(|unit| {
                    let events = speed_events.get(&unit.id).into_iter().flatten().copied();
                    unit.speed_segments = speed::build_segments(events, config.default_speed)?;
                    Ok::<_, ChartError>(())
                })
            },
            || {
                rayon::join(
                    || BpmTrack::new(&chart.bpm_events),
                    || PropertyTracks::new(&chart.unit_events),
                )
            },
        );
        segments?;
        let bpm = bpm?;

        let prefix: Vec<Vec<f64>> = chart
            .units
            .iter()
            .map(|unit| speed::prefix_areas(&unit.speed_segments))
            .collect();

        let chunk = chart.notes.len().div_ceil(config.workers.max(1)).max(1);
        let units = &chart.units;
        chart.notes.par_chunks_mut(chunk).try_for_each(|notes| {
            for note in notes {
                derive_note(note, units, &prefix, &bpm, config.output_scale)?;
            }
            Ok::<_, ChartError>(())
        })?;

        if config.cull_dense_notes {
            let hidden = cull::cull_dense_notes(
                &mut chart.notes,
                config.cull_height_bucket,
                config.cull_distance,
            );
            if hidden > 0 {
                warn!("{hidden} of {} notes hidden as dense duplicates", chart.notes.len());
            }
        }
        chart.rebuild_buckets();
        debug!(
            "timeline built: {} units, {} notes, {} events, {} note buckets",
            chart.units.len(),
            chart.notes.len(),
            chart.unit_events.len(),
            chart.note_buckets.len()
        );

        Ok(Self {
            chart,
            config: *config,
            prefix,
            bpm,
            properties,
        })
    }

    /// The prepared chart.
    #[must_use]
    pub const fn chart(&self) -> &Chart {
        &self.chart
    }

    /// Gives the prepared chart back.
    #[must_use]
    pub fn into_chart(self) -> Chart {
        self.chart
    }

    /// The configuration the timeline was built with.
    #[must_use]
    pub const fn config(&self) -> &TimelineConfig {
        &self.config
    }

    /// The integrated tempo map.
    #[must_use]
    pub const fn bpm(&self) -> &BpmTrack {
        &self.bpm
    }

    /// Scaled scroll displacement of `unit` at `beats`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::SegmentNotFound`] for a missing unit or a beat before 0.
    pub fn find_y_pos(&self, unit: u32, beats: f32) -> Result<f32> {
        y_pos(
            &self.chart.units,
            &self.prefix,
            unit,
            beats,
            self.config.output_scale,
        )
    }

    /// Absolute judge time of `note` in milliseconds.
    #[must_use]
    pub fn find_judge_time(&self, note: &Note) -> f64 {
        self.bpm.ms_at(note.begin_beats)
    }

    /// Milliseconds from beat 0 to `beats`.
    #[must_use]
    pub fn ms_at_beats(&self, beats: f32) -> f64 {
        self.bpm.ms_at(beats)
    }

    /// The beat reached at `ms`.
    #[must_use]
    pub fn beats_at_ms(&self, ms: f64) -> f32 {
        self.bpm.beats_at(ms)
    }

    /// Evaluates every property of `unit` at `beats`.
    ///
    /// Positions of parent units are added to the unit's own.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::SegmentNotFound`] if the unit does not exist.
    pub fn unit_state(&self, unit: u32, beats: f32) -> Result<UnitState> {
        let value = |unit, kind, default| {
            self.properties
                .value(&self.chart.unit_events, unit, kind, beats)
                .unwrap_or(default)
        };
        let mut state = UnitState {
            displacement: self.find_y_pos(unit, beats.max(0.0))?,
            x: value(unit, UnitEventKind::MoveX, 0.0),
            y: value(unit, UnitEventKind::MoveY, 0.0),
            rotation: value(unit, UnitEventKind::Rotate, 0.0),
            alpha: value(unit, UnitEventKind::Alpha, 255.0),
            scale_x: value(unit, UnitEventKind::ScaleX, 1.0),
            scale_y: value(unit, UnitEventKind::ScaleY, 1.0),
            incline: value(unit, UnitEventKind::Incline, 0.0),
            color: unpack_rgb(value(unit, UnitEventKind::Color, pack_rgb([255; 3]))),
        };
        let mut parent = self.chart.unit(unit).and_then(|unit| unit.parent_id);
        for _ in 0..self.chart.units.len() {
            let Some(id) = parent else {
                break;
            };
            state.x += value(id, UnitEventKind::MoveX, 0.0);
            state.y += value(id, UnitEventKind::MoveY, 0.0);
            parent = self.chart.unit(id).and_then(|unit| unit.parent_id);
        }
        Ok(state)
    }

    /// Distance of `note` from its unit at `beats`, scaled by the note's own speed.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::SegmentNotFound`] if the note's unit does not exist.
    pub fn note_offset(&self, note: &Note, beats: f32) -> Result<f32> {
        let current = self.find_y_pos(note.unit_id, beats.max(0.0))?;
        Ok((note.note_height - current) * note.speed)
    }
}

fn y_pos(units: &[Unit], prefix: &[Vec<f64>], unit: u32, beats: f32, scale: f32) -> Result<f32> {
    units
        .get(unit as usize)
        .zip(prefix.get(unit as usize))
        .and_then(|(found, prefix)| speed::displacement(&found.speed_segments, prefix, beats))
        .map(|displacement| (displacement * f64::from(scale)) as f32)
        .ok_or(ChartError::SegmentNotFound { unit, beats })
}

fn derive_note(
    note: &mut Note,
    units: &[Unit],
    prefix: &[Vec<f64>],
    bpm: &BpmTrack,
    scale: f32,
) -> Result<()> {
    note.note_height = y_pos(units, prefix, note.unit_id, note.begin_beats.max(0.0), scale)?;
    note.note_length = if note.kind == NoteKind::Hold {
        y_pos(units, prefix, note.unit_id, note.end_beats.max(0.0), scale)? - note.note_height
    } else {
        0.0
    };
    note.judge_time_ms = bpm.ms_at(note.begin_beats);
    note.end_time_ms = bpm.ms_at(note.end_beats);
    note.will_display = true;
    Ok(())
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{BpmEvent, EasingFunction};

    fn chart(bpm: &[(f32, f32)]) -> Chart {
        let mut chart = Chart::default();
        chart.ensure_unit(0);
        chart.bpm_events = bpm
            .iter()
            .map(|&(begin_beats, bpm)| BpmEvent { begin_beats, bpm })
            .collect();
        chart
    }

    #[test]
    fn hold_length_is_scaled_displacement() {
        let mut chart = chart(&[(0.0, 120.0)]);
        chart
            .unit_events
            .push(UnitEvent::step(UnitEventKind::Speed, 0, 0.0, 1.0));
        chart.notes.push(Note::new(NoteKind::Hold, 0, 4.0, 8.0));
        let timeline = Timeline::build(chart, &TimelineConfig::default()).expect("build");
        let hold = &timeline.chart().notes[0];
        assert_eq!(hold.note_height, 2.0);
        assert_eq!(hold.note_length, 2.0);
        assert_eq!(hold.end_time_ms, 4000.0);
    }

    #[test]
    fn judge_time_follows_tempo_changes() {
        let mut chart = chart(&[(0.0, 120.0), (4.0, 240.0)]);
        chart.notes.push(Note::new(NoteKind::Tap, 0, 0.0, 0.0));
        chart.notes.push(Note::new(NoteKind::Tap, 0, 6.0, 6.0));
        let timeline = Timeline::build(chart, &TimelineConfig::default()).expect("build");
        let notes = &timeline.chart().notes;
        assert_eq!(timeline.find_judge_time(&notes[0]), 0.0);
        assert_eq!(notes[1].judge_time_ms, 2500.0);
        assert_eq!(timeline.beats_at_ms(2500.0), 6.0);
    }

    #[test]
    fn dense_notes_are_hidden_but_bucketed() {
        let mut chart = chart(&[(0.0, 120.0)]);
        chart.notes.push(Note::new(NoteKind::Tap, 0, 1.0, 1.0));
        chart
            .notes
            .push(Note::new(NoteKind::Tap, 0, 1.0, 1.0).with_x(1.0));
        let timeline = Timeline::build(chart, &TimelineConfig::default()).expect("build");
        let notes = &timeline.chart().notes;
        assert!(notes[0].will_display);
        assert!(!notes[1].will_display);
        assert_eq!(timeline.chart().note_buckets[&1], vec![0, 1]);
    }

    #[test]
    fn culling_can_be_disabled() {
        let mut chart = chart(&[(0.0, 120.0)]);
        chart.notes.push(Note::new(NoteKind::Tap, 0, 1.0, 1.0));
        chart.notes.push(Note::new(NoteKind::Tap, 0, 1.0, 1.0));
        let config = TimelineConfig::default().with_culling(false).with_workers(1);
        let timeline = Timeline::build(chart, &config).expect("build");
        assert!(timeline.chart().notes.iter().all(|note| note.will_display));
    }

    #[test]
    fn unit_state_adds_parent_position() {
        let mut chart = chart(&[(0.0, 120.0)]);
        chart.ensure_unit(1);
        chart.units[1].parent_id = Some(0);
        chart
            .unit_events
            .push(UnitEvent::step(UnitEventKind::MoveX, 0, 0.0, 100.0));
        chart.unit_events.push(UnitEvent::ramp(
            UnitEventKind::MoveX,
            1,
            (0.0, 2.0),
            (0.0, 10.0),
            EasingFunction::Linear,
        ));
        let timeline = Timeline::build(chart, &TimelineConfig::default()).expect("build");
        let state = timeline.unit_state(1, 1.0).expect("unit exists");
        assert_eq!(state.x, 105.0);
        assert_eq!(state.alpha, 255.0);
        assert_eq!(state.color, [255, 255, 255]);
        assert_eq!(state.displacement, 0.5);
        assert!(matches!(
            timeline.unit_state(7, 0.0),
            Err(ChartError::SegmentNotFound { unit: 7, .. })
        ));
    }

    #[test]
    fn note_offset_counts_down_to_zero() {
        let mut chart = chart(&[(0.0, 120.0)]);
        chart.notes.push(Note::new(NoteKind::Tap, 0, 4.0, 4.0));
        let timeline = Timeline::build(chart, &TimelineConfig::default()).expect("build");
        let note = &timeline.chart().notes[0];
        assert_eq!(timeline.note_offset(note, 0.0).expect("offset"), 2.0);
        assert_eq!(timeline.note_offset(note, 4.0).expect("offset"), 0.0);
    }
}
