//! Scroll speed functions and their integral.
//!
//! A unit's speed events are turned into a gap-free list of
//! [`SpeedSegment`]s starting at beat 0 and ending with an infinite hold. The
//! displacement at a beat is the signed area under that function, computed
//! from a prefix sum of whole segments plus the partial area of the segment
//! containing the beat.

use std::collections::BTreeMap;

use itertools::Itertools;

use crate::{
    error::{ChartError, Result},
    model::{SpeedSegment, UnitEvent},
};

/// Builds the speed function of one unit from its speed events.
///
/// Without events the unit scrolls at `default_speed`. Values of concurrent
/// event layers are summed.
///
/// # Errors
///
/// Returns [`ChartError::InvalidTimingData`] for an event that ends before it begins.
pub fn build_segments<'a>(
    events: impl IntoIterator<Item = &'a UnitEvent>,
    default_speed: f32,
) -> Result<Vec<SpeedSegment>> {
    let mut layers: BTreeMap<u32, Vec<&UnitEvent>> = BTreeMap::new();
    for event in events {
        if event.end_beats < event.begin_beats {
            return Err(ChartError::invalid_timing(format!(
                "speed event of unit {} at beat {} ends at beat {}",
                event.unit_id, event.begin_beats, event.end_beats
            )));
        }
        layers.entry(event.layer).or_default().push(event);
    }
    let mut built: Vec<_> = layers.into_values().map(build_layer).collect();
    Ok(match built.len() {
        0 => vec![SpeedSegment::hold(0.0, f32::INFINITY, default_speed)],
        1 => built.pop().unwrap_or_default(),
        _ => merge_layers(&built),
    })
}

fn build_layer(mut events: Vec<&UnitEvent>) -> Vec<SpeedSegment> {
    events.sort_by(|a, b| a.begin_beats.total_cmp(&b.begin_beats));
    let mut segments = Vec::with_capacity(events.len() * 2 + 1);
    let mut cursor = 0.0_f32;
    let mut value = events.first().map_or(0.0, |event| event.begin_value);
    for event in events {
        let begin = event.begin_beats.max(cursor);
        if begin > cursor {
            segments.push(SpeedSegment::hold(cursor, begin, value));
            cursor = begin;
        }
        if event.end_beats > begin {
            let ramp = SpeedSegment {
                begin_beats: event.begin_beats,
                end_beats: event.end_beats,
                begin_value: event.begin_value,
                end_value: event.end_value,
                is_static: false,
            };
            segments.push(SpeedSegment {
                begin_beats: begin,
                begin_value: ramp.value_at(begin),
                ..ramp
            });
            cursor = event.end_beats;
        } else {
            segments.push(SpeedSegment {
                begin_beats: begin,
                end_beats: begin,
                begin_value: value,
                end_value: event.end_value,
                is_static: true,
            });
        }
        value = event.end_value;
    }
    segments.push(SpeedSegment::hold(cursor, f32::INFINITY, value));
    segments
}

/// Sums several layer functions into one.
///
/// Between two consecutive breakpoints of any layer every layer is linear,
/// so the sum is linear there too.
fn merge_layers(layers: &[Vec<SpeedSegment>]) -> Vec<SpeedSegment> {
    let breakpoints: Vec<f32> = layers
        .iter()
        .flatten()
        .flat_map(|segment| [segment.begin_beats, segment.end_beats])
        .filter(|beats| beats.is_finite())
        .sorted_by(f32::total_cmp)
        .dedup()
        .collect();

    let mut merged = Vec::with_capacity(breakpoints.len());
    for (index, &begin) in breakpoints.iter().enumerate() {
        let end = breakpoints.get(index + 1).copied().unwrap_or(f32::INFINITY);
        let mut segment = SpeedSegment::hold(begin, end, 0.0);
        for layer in layers {
            let Some((_, current)) = covering(layer, begin) else {
                continue;
            };
            segment.begin_value += current.value_at(begin);
            segment.end_value += current.value_at(end);
            segment.is_static &= current.is_static || !current.end_beats.is_finite();
        }
        if segment.is_static {
            segment.end_value = segment.begin_value;
        }
        merged.push(segment);
    }
    merged
}

fn covering(segments: &[SpeedSegment], beats: f32) -> Option<(usize, &SpeedSegment)> {
    let index = segments
        .partition_point(|segment| segment.begin_beats <= beats)
        .checked_sub(1)?;
    segments
        .get(index)
        .filter(|segment| segment.covers(beats))
        .map(|segment| (index, segment))
}

/// Area of every segment before each index.
#[must_use]
pub fn prefix_areas(segments: &[SpeedSegment]) -> Vec<f64> {
    let mut prefix = Vec::with_capacity(segments.len());
    let mut sum = 0.0_f64;
    for segment in segments {
        prefix.push(sum);
        if segment.end_beats.is_finite() {
            sum += f64::from(segment.area_until(segment.end_beats));
        }
    }
    prefix
}

/// Integrated speed from beat 0 to `beats`, or `None` if no segment covers `beats`.
#[must_use]
pub fn displacement(segments: &[SpeedSegment], prefix: &[f64], beats: f32) -> Option<f64> {
    let (index, segment) = covering(segments, beats)?;
    Some(prefix.get(index)? + f64::from(segment.area_until(beats)))
}
