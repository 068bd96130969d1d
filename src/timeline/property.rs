//! Per-unit property evaluation.

use std::collections::HashMap;

use crate::model::{UnitEvent, UnitEventKind};

#[derive(Debug, Clone, PartialEq)]
struct LayerTrack {
    layer: u32,
    /// Indices into the chart's events, sorted by begin beat.
    events: Vec<usize>,
}

/// Events of every (unit, kind) pair, split by layer.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PropertyTracks {
    tracks: HashMap<(u32, UnitEventKind), Vec<LayerTrack>>,
}

/// Whether concurrent layers of `kind` add up. Other kinds take the lowest layer.
const fn is_additive(kind: UnitEventKind) -> bool {
    !matches!(
        kind,
        UnitEventKind::ScaleX | UnitEventKind::ScaleY | UnitEventKind::Color
    )
}

impl PropertyTracks {
    /// Indexes `events`.
    #[must_use]
    pub fn new(events: &[UnitEvent]) -> Self {
        let mut tracks: HashMap<(u32, UnitEventKind), Vec<LayerTrack>> = HashMap::new();
        for (index, event) in events.iter().enumerate() {
            let layers = tracks.entry((event.unit_id, event.kind)).or_default();
            match layers.iter_mut().find(|track| track.layer == event.layer) {
                Some(track) => track.events.push(index),
                None => layers.push(LayerTrack {
                    layer: event.layer,
                    events: vec![index],
                }),
            }
        }
        for layers in tracks.values_mut() {
            layers.sort_by_key(|track| track.layer);
            for track in layers.iter_mut() {
                track
                    .events
                    .sort_by(|&a, &b| events[a].begin_beats.total_cmp(&events[b].begin_beats));
            }
        }
        Self { tracks }
    }

    /// Value of `kind` on `unit` at `beats`, or `None` if the unit has no such events.
    ///
    /// `events` must be the slice the tracks were built from.
    #[must_use]
    pub fn value(
        &self,
        events: &[UnitEvent],
        unit: u32,
        kind: UnitEventKind,
        beats: f32,
    ) -> Option<f32> {
        let layers = self.tracks.get(&(unit, kind))?;
        let mut values = layers
            .iter()
            .filter_map(|track| layer_value(events, &track.events, beats));
        if is_additive(kind) {
            values.reduce(|sum, value| sum + value)
        } else {
            values.next()
        }
    }
}

fn layer_value(events: &[UnitEvent], track: &[usize], beats: f32) -> Option<f32> {
    let started = track.partition_point(|&index| events[index].begin_beats <= beats);
    match started.checked_sub(1) {
        Some(current) => events.get(track[current]).map(|event| event.value_at(beats)),
        None => track
            .first()
            .and_then(|&index| events.get(index))
            .map(|event| event.begin_value),
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;
    use crate::model::{EasingFunction, pack_rgb};

    fn ramp(kind: UnitEventKind, layer: u32, beats: (f32, f32), values: (f32, f32)) -> UnitEvent {
        UnitEvent {
            layer,
            ..UnitEvent::ramp(kind, 0, beats, values, EasingFunction::Linear)
        }
    }

    #[test]
    fn holds_around_events() {
        let events = [
            ramp(UnitEventKind::MoveX, 0, (2.0, 4.0), (10.0, 20.0)),
            UnitEvent::step(UnitEventKind::MoveX, 0, 6.0, 50.0),
        ];
        let tracks = PropertyTracks::new(&events);
        let at = |beats| tracks.value(&events, 0, UnitEventKind::MoveX, beats);
        assert_eq!(at(0.0), Some(10.0));
        assert_eq!(at(3.0), Some(15.0));
        assert_eq!(at(5.0), Some(20.0));
        assert_eq!(at(6.0), Some(50.0));
        assert_eq!(tracks.value(&events, 1, UnitEventKind::MoveX, 0.0), None);
    }

    #[test]
    fn layers_add_except_scale_and_color() {
        let white = pack_rgb([255, 255, 255]);
        let red = pack_rgb([255, 0, 0]);
        let events = [
            ramp(UnitEventKind::Alpha, 1, (0.0, 1.0), (100.0, 100.0)),
            ramp(UnitEventKind::Alpha, 0, (0.0, 1.0), (50.0, 50.0)),
            ramp(UnitEventKind::ScaleX, 1, (0.0, 1.0), (3.0, 3.0)),
            ramp(UnitEventKind::ScaleX, 0, (0.0, 1.0), (2.0, 2.0)),
            UnitEvent::step(UnitEventKind::Color, 0, 0.0, red),
            UnitEvent::step(UnitEventKind::Color, 2, 0.0, white),
        ];
        let tracks = PropertyTracks::new(&events);
        assert_eq!(tracks.value(&events, 0, UnitEventKind::Alpha, 0.5), Some(150.0));
        assert_eq!(tracks.value(&events, 0, UnitEventKind::ScaleX, 0.5), Some(2.0));
        assert_eq!(tracks.value(&events, 0, UnitEventKind::Color, 0.5), Some(red));
    }
}
