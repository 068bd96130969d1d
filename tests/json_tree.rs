use std::{fs::File, path::Path};

use judgeline::{
    ChartError, ChartFormat,
    format::{ChartManifest, load_chart, load_chart_from_reader},
    model::{NoteKind, UnitEventKind, UnitKind},
};

const DEMO: &str = include_str!("files/demo.json");

#[test]
fn demo_chart() {
    let chart = load_chart(DEMO.as_bytes(), ChartFormat::JsonTree).expect("demo must load");

    assert_eq!(chart.metadata.title, "Judgeline Demo");
    assert_eq!(chart.metadata.level, "HD Lv.9");
    assert_eq!(chart.metadata.offset_ms, 0.0);
    assert_eq!(chart.bpm_events.len(), 2);
    assert_eq!(chart.bpm_events[1].begin_beats, 4.0);

    assert_eq!(chart.units.len(), 2);
    assert_eq!(chart.units[0].parent_id, None);
    assert_eq!(chart.units[1].parent_id, Some(0));
    assert!(chart.units.iter().all(|unit| unit.kind == UnitKind::Line));

    let kinds: Vec<_> = chart.notes.iter().map(|note| note.kind).collect();
    assert_eq!(
        kinds,
        vec![
            NoteKind::Tap,
            NoteKind::Hold,
            NoteKind::Flick,
            NoteKind::Drag,
            NoteKind::Tap
        ]
    );
    assert_eq!((chart.notes[1].begin_beats, chart.notes[1].end_beats), (4.0, 8.0));
    assert_eq!(chart.notes[2].begin_beats, 5.5);
    assert_eq!(chart.notes[2].end_beats, 5.5);
    assert!(chart.notes[3].reverse_direction);
    assert!(chart.notes[4].is_fake);

    assert_eq!(chart.events_of(0, UnitEventKind::Speed).count(), 1);
    assert_eq!(chart.events_of(1, UnitEventKind::MoveX).count(), 1);
    assert_eq!(chart.unit_events.len(), 6);
}

#[test]
fn streaming_from_a_file_matches_loading_from_memory() {
    let path = Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/files/demo.json");
    assert_eq!(ChartFormat::from_path(&path), Some(ChartFormat::JsonTree));
    let file = File::open(&path).expect("demo file exists");
    let streamed = load_chart_from_reader(file).expect("demo must stream");
    let loaded = load_chart(DEMO.as_bytes(), ChartFormat::JsonTree).expect("demo must load");
    assert_eq!(streamed, loaded);
}

#[test]
fn manifest_points_at_the_chart() {
    let manifest = ChartManifest::parse(include_str!("files/info.txt")).expect("manifest");
    assert_eq!(manifest.chart_path(), Path::new("100001").join("demo.json"));
    assert_eq!(manifest.charter.as_deref(), Some("tester"));

    let mut chart = load_chart(DEMO.as_bytes(), ChartFormat::JsonTree).expect("demo must load");
    chart.metadata.composer.clear();
    manifest.apply_to(&mut chart.metadata);
    assert_eq!(chart.metadata.composer, "nobody");
    assert_eq!(chart.metadata.title, "Judgeline Demo");
}

#[test]
fn unsupported_line_kinds_are_kept_as_units() {
    const SRC: &str = r#"{
        "META": {"name": "ui"},
        "BPMList": [{"bpm": 100, "startTime": [0, 0, 1]}],
        "judgeLineList": [
            {"father": -1, "attachUI": "combo", "eventLayers": [null]},
            {"father": null, "eventLayers": [], "extended": {"textEvents": [{"start": "hi", "end": "hi"}]}}
        ]
    }"#;
    let chart = load_chart(SRC.as_bytes(), ChartFormat::JsonTree).expect("load");
    assert_eq!(chart.units[0].kind, UnitKind::AttachUI);
    assert_eq!(chart.units[1].kind, UnitKind::Text);
    assert_eq!(chart.units[1].parent_id, None);
}

#[test]
fn errors_name_the_format_and_offset() {
    let err = load_chart(br#"{"META": {}, @}"#, ChartFormat::JsonTree).expect_err("syntax");
    assert_eq!(err.format, ChartFormat::JsonTree);
    assert!(matches!(err.source, ChartError::Syntax { byte: b'@', offset: 13 }));
    assert!(err.to_string().starts_with("failed to load JSON-tree chart"));

    let err = load_chart(
        br#"{"META": {}, "BPMList": [{"bpm": 120, "startTime": [1, 0, 1]}]}"#,
        ChartFormat::JsonTree,
    )
    .expect_err("late first bpm");
    assert!(matches!(err.source, ChartError::InvalidTimingData { .. }));
}

#[test]
fn overflowing_beat_triplets_are_rejected() {
    let source = DEMO.replacen("[2, 0, 1]", "[9223372036854775807, 5, 4]", 1);
    let at = source.find("[9223372036854775807").expect("patched note") as u64;
    let err = load_chart(source.as_bytes(), ChartFormat::JsonTree).expect_err("overflow");
    assert!(matches!(err.source, ChartError::InvalidNumber { offset, .. } if offset == at));
}

#[test]
fn non_finite_values_are_rejected() {
    let fade = DEMO.replacen(r#""start": 0, "end": 255"#, r#""start": 0, "end": 1e99"#, 1);
    let err = load_chart(fade.as_bytes(), ChartFormat::JsonTree).expect_err("infinite alpha");
    assert!(matches!(err.source, ChartError::InvalidTimingData { .. }));

    let wide = DEMO.replacen(r#""positionX": 300.0"#, r#""positionX": -1e40"#, 1);
    let err = load_chart(wide.as_bytes(), ChartFormat::JsonTree).expect_err("infinite x");
    assert!(matches!(err.source, ChartError::InvalidTimingData { .. }));
}

#[test]
fn unknown_easing_points_at_its_event() {
    let source = DEMO.replacen(r#""easingType": 2"#, r#""easingType": 44"#, 1);
    let at = source.find(r#"{"start": 0, "end": 255"#).expect("fade event") as u64;
    let err = load_chart(source.as_bytes(), ChartFormat::JsonTree).expect_err("easing");
    assert!(matches!(err.source, ChartError::UnknownEasingId { id: 44, .. }));
    assert_eq!(err.offset(), Some(at));
}
