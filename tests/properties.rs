use judgeline::{
    Timeline, TimelineConfig,
    model::{BeatTriplet, BpmEvent, Chart, EasingFunction, UnitEvent, UnitEventKind},
    timeline::BpmTrack,
};
use proptest::prelude::*;

fn speed_chart(events: &[(u8, u8, u8, u8, u32)]) -> Chart {
    let mut chart = Chart::default();
    chart.ensure_unit(0);
    chart.bpm_events.push(BpmEvent {
        begin_beats: 0.0,
        bpm: 120.0,
    });
    chart.unit_events = events
        .iter()
        .map(|&(begin, len, from, to, layer)| UnitEvent {
            layer,
            ..UnitEvent::ramp(
                UnitEventKind::Speed,
                0,
                (f32::from(begin) / 2.0, f32::from(begin) / 2.0 + f32::from(len) / 4.0),
                (f32::from(from), f32::from(to)),
                EasingFunction::Linear,
            )
        })
        .collect();
    chart
}

fn bpm_track(changes: &[(u16, u16)]) -> BpmTrack {
    let mut events = vec![BpmEvent {
        begin_beats: 0.0,
        bpm: 120.0,
    }];
    let mut beat = 0.0;
    for &(gap, bpm) in changes {
        beat += f32::from(gap) / 4.0 + 0.25;
        events.push(BpmEvent {
            begin_beats: beat,
            bpm: f32::from(bpm) + 1.0,
        });
    }
    BpmTrack::new(&events).expect("positive tempo map")
}

#[test]
fn every_easing_starts_at_zero_and_ends_at_one() {
    for id in 1..=29 {
        let easing = EasingFunction::from_id(id).expect("table id");
        assert_eq!(easing.id(), id);
        assert!(easing.apply(0.0).abs() < 1e-4, "{easing:?} at 0");
        assert!((easing.apply(1.0) - 1.0).abs() < 1e-4, "{easing:?} at 1");
    }
    assert!(EasingFunction::from_id(0).is_err());
    assert!(EasingFunction::from_id(30).is_err());
}

proptest! {
    #[test]
    fn triplets_increase_with_every_part(whole in 0i64..1000, numerator in 0i64..256, denominator in 1i64..64) {
        let beats = BeatTriplet::new(whole, numerator, denominator).to_beats();
        prop_assert!(beats < BeatTriplet::new(whole, numerator + 1, denominator).to_beats());
        prop_assert!(beats < BeatTriplet::new(whole + 1, numerator, denominator).to_beats());
        prop_assert!(beats >= whole as f32);
    }

    #[test]
    fn non_negative_speed_never_scrolls_back(
        events in prop::collection::vec((0u8..32, 0u8..16, 0u8..10, 0u8..10, 0u32..3), 0..12),
        probes in prop::collection::vec(0u16..4000, 1..40),
    ) {
        let timeline = Timeline::build(speed_chart(&events), &TimelineConfig::default())
            .expect("valid speed events");
        let mut probes: Vec<f32> = probes.into_iter().map(|p| f32::from(p) / 50.0).collect();
        probes.sort_by(f32::total_cmp);

        let mut last = 0.0_f32;
        for beats in probes {
            let y = timeline.find_y_pos(0, beats).expect("every beat from 0 is covered");
            prop_assert!(y >= last - 1e-3 * last.abs().max(1.0), "{y} after {last} at beat {beats}");
            last = y;
        }
    }

    #[test]
    fn tempo_map_starts_at_zero_and_inverts(
        changes in prop::collection::vec((0u16..64, 0u16..400), 0..8),
        beats in 0.0f32..100.0,
    ) {
        let track = bpm_track(&changes);
        prop_assert_eq!(track.ms_at(0.0), 0.0);
        let ms = track.ms_at(beats);
        prop_assert!(ms >= 0.0);
        prop_assert!((track.beats_at(ms) - beats).abs() < 1e-3);
    }

    #[test]
    fn easing_clamps_its_input(id in 1i64..=29, t in -4.0f32..4.0) {
        let easing = EasingFunction::from_id(id).expect("table id");
        let clamped = easing.apply(t.clamp(0.0, 1.0));
        prop_assert!((easing.apply(t) - clamped).abs() < 1e-6);
    }
}
