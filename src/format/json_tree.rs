//! Importer for the JSON-tree chart format.
//!
//! The document is an object with a `META` block, a `BPMList` and a
//! `judgeLineList`. Every line carries `eventLayers` (each layer a set of
//! `*Events` arrays, or `null`), optional `extended` events and its `notes`.
//! Times are written as `[whole, numerator, denominator]` beat triplets.
//!
//! The walker reads the document into per-format records first. A single
//! projection step then flattens them into the canonical [`Chart`].

use std::io::{Read, Seek};

use crate::{
    error::{ChartError, Result},
    extract_fields,
    json::{Token, TokenKind, TokenStream, Walker, extract::parse_integer},
    model::{
        BeatTriplet, BpmEvent, Chart, ChartMetadata, EasingFunction, Note, NoteKind, Unit,
        UnitEvent, UnitEventKind, UnitKind, pack_rgb,
    },
};

#[derive(Debug, Default)]
struct RawMeta {
    name: String,
    level: String,
    charter: String,
    composer: String,
    song: String,
    background: String,
    offset: f32,
}

extract_fields!(RawMeta {
    "name" => name: Str,
    "level" => level: Str,
    "charter" => charter: Str,
    "composer" => composer: Str,
    "song" => song: Str,
    "background" => background: Str,
    "offset" => offset: F32,
});

#[derive(Debug, Default)]
struct RawBpm {
    bpm: f32,
    start_time: BeatTriplet,
}

extract_fields!(RawBpm {
    "bpm" => bpm: F32,
});

#[derive(Debug)]
struct RawEvent {
    start: f32,
    end: f32,
    start_time: BeatTriplet,
    end_time: BeatTriplet,
    easing_type: i64,
    easing_left: f32,
    easing_right: f32,
    offset: u64,
}

impl RawEvent {
    fn at(offset: u64) -> Self {
        Self {
            start: 0.0,
            end: 0.0,
            start_time: BeatTriplet::default(),
            end_time: BeatTriplet::default(),
            easing_type: 1,
            easing_left: 0.0,
            easing_right: 1.0,
            offset,
        }
    }
}

extract_fields!(RawEvent {
    "easingType" => easing_type: I64,
    "easingLeft" => easing_left: F32,
    "easingRight" => easing_right: F32,
});

#[derive(Debug)]
struct RawNote {
    note_type: i64,
    above: i64,
    is_fake: i64,
    position_x: f32,
    y_offset: f32,
    size: f32,
    speed: f32,
    start_time: BeatTriplet,
    end_time: BeatTriplet,
    offset: u64,
}

impl RawNote {
    fn at(offset: u64) -> Self {
        Self {
            note_type: 1,
            above: 1,
            is_fake: 0,
            position_x: 0.0,
            y_offset: 0.0,
            size: 1.0,
            speed: 1.0,
            start_time: BeatTriplet::default(),
            end_time: BeatTriplet::default(),
            offset,
        }
    }
}

extract_fields!(RawNote {
    "type" => note_type: I64,
    "above" => above: I64,
    "isFake" => is_fake: I64,
    "positionX" => position_x: F32,
    "yOffset" => y_offset: F32,
    "size" => size: F32,
    "speed" => speed: F32,
});

#[derive(Debug)]
struct RawLine {
    father: i64,
    attach_ui: bool,
    text: bool,
    events: Vec<(UnitEventKind, u32, RawEvent)>,
    notes: Vec<RawNote>,
}

impl Default for RawLine {
    fn default() -> Self {
        Self {
            father: -1,
            attach_ui: false,
            text: false,
            events: Vec::new(),
            notes: Vec::new(),
        }
    }
}

#[derive(Debug, Default)]
struct RawChart {
    meta: Option<RawMeta>,
    bpm: Option<Vec<RawBpm>>,
    lines: Vec<RawLine>,
}

/// Parses a JSON-tree chart held in memory.
///
/// # Errors
///
/// Returns the first lexing, structural or projection error.
pub fn parse_bytes(bytes: &[u8]) -> Result<Chart> {
    parse_walker(Walker::from_bytes(bytes)?)
}

/// Parses a JSON-tree chart from a seekable reader without loading it whole.
///
/// # Errors
///
/// See [`parse_bytes`].
pub fn parse_reader<R: Read + Seek>(reader: R) -> Result<Chart> {
    parse_walker(Walker::new(TokenStream::new(reader))?)
}

fn parse_walker<R: Read + Seek>(mut walker: Walker<R>) -> Result<Chart> {
    let raw = read_chart(&mut walker)?;
    log::debug!(
        "read JSON-tree document: {} lines, {} BPM events",
        raw.lines.len(),
        raw.bpm.as_ref().map_or(0, Vec::len)
    );
    project(raw)
}

fn require_open(value: &Token, bracket: &TokenKind, expected: &'static str) -> Result<()> {
    if &value.kind == bracket {
        Ok(())
    } else {
        Err(ChartError::Structural {
            expected,
            found: value.kind.describe(),
            offset: value.offset,
        })
    }
}

fn read_chart<R: Read + Seek>(walker: &mut Walker<R>) -> Result<RawChart> {
    let mut raw = RawChart::default();
    let mut props = walker.read_properties()?;
    while let Some((key, value)) = props.next_property()? {
        let walker = props.walker();
        match key.as_str() {
            Some("META") => {
                require_open(&value, &TokenKind::LeftBrace, "`META` object")?;
                let mut meta = RawMeta::default();
                walker.extract_object(&mut meta)?;
                raw.meta = Some(meta);
            }
            Some("BPMList") => raw.bpm = Some(read_bpm_list(walker, &value)?),
            Some("judgeLineList") => raw.lines = read_lines(walker, &value)?,
            _ => {}
        }
    }
    Ok(raw)
}

fn read_triplet<R: Read + Seek>(walker: &mut Walker<R>, value: &Token) -> Result<BeatTriplet> {
    const EXPECTED: &str = "beat triplet `[whole, numerator, denominator]`";
    require_open(value, &TokenKind::LeftBracket, EXPECTED)?;
    let mut parts = Vec::with_capacity(3);
    for token in walker.read_elements()? {
        let token = token?;
        if token.kind.is_open() {
            return Err(ChartError::Structural {
                expected: EXPECTED,
                found: token.kind.describe(),
                offset: token.offset,
            });
        }
        parts.push(parse_integer::<i64>(&token)?);
    }
    let [whole, numerator, denominator] = parts[..] else {
        return Err(ChartError::Structural {
            expected: EXPECTED,
            found: format!("{} elements", parts.len()),
            offset: value.offset,
        });
    };
    BeatTriplet::new(whole, numerator, denominator)
        .normalized()
        .ok_or_else(|| ChartError::InvalidNumber {
            text: format!("[{whole}, {numerator}, {denominator}]"),
            offset: value.offset,
        })
}

/// Reads an event value, which is a number or an `[r, g, b]` color.
fn read_event_value<R: Read + Seek>(walker: &mut Walker<R>, value: &Token) -> Result<f32> {
    match &value.kind {
        TokenKind::Number(_) => value.parse_number(),
        TokenKind::LeftBracket => {
            let mut rgb = [0u8; 3];
            for (index, token) in walker.read_elements()?.enumerate() {
                let channel = parse_integer::<i64>(&token?)?;
                if let Some(slot) = rgb.get_mut(index) {
                    *slot = channel.clamp(0, 255) as u8;
                }
            }
            Ok(pack_rgb(rgb))
        }
        _ => Ok(0.0),
    }
}

fn read_bpm_list<R: Read + Seek>(walker: &mut Walker<R>, value: &Token) -> Result<Vec<RawBpm>> {
    require_open(value, &TokenKind::LeftBracket, "`BPMList` array")?;
    let mut list = Vec::new();
    let mut elements = walker.read_elements()?;
    while let Some(element) = elements.next_element()? {
        require_open(&element, &TokenKind::LeftBrace, "BPM event object")?;
        let mut bpm = RawBpm::default();
        elements
            .walker()
            .extract_object_with(&mut bpm, &["startTime"], |bpm, _, value, walker| {
                bpm.start_time = read_triplet(walker, value)?;
                Ok(())
            })?;
        list.push(bpm);
    }
    Ok(list)
}

fn read_lines<R: Read + Seek>(walker: &mut Walker<R>, value: &Token) -> Result<Vec<RawLine>> {
    require_open(value, &TokenKind::LeftBracket, "`judgeLineList` array")?;
    let mut lines = Vec::new();
    let mut elements = walker.read_elements()?;
    while let Some(element) = elements.next_element()? {
        require_open(&element, &TokenKind::LeftBrace, "judge line object")?;
        lines.push(read_line(elements.walker())?);
    }
    Ok(lines)
}

fn read_line<R: Read + Seek>(walker: &mut Walker<R>) -> Result<RawLine> {
    let mut line = RawLine::default();
    let mut props = walker.read_properties()?;
    while let Some((key, value)) = props.next_property()? {
        let walker = props.walker();
        match key.as_str() {
            Some("father") if value.kind != TokenKind::Null => {
                line.father = parse_integer(&value)?;
            }
            Some("attachUI") => line.attach_ui |= value.kind != TokenKind::Null,
            Some("textEvents") => line.text |= value.kind != TokenKind::Null,
            Some("eventLayers") => {
                require_open(&value, &TokenKind::LeftBracket, "`eventLayers` array")?;
                let mut layers = walker.read_elements()?;
                let mut layer = 0;
                while let Some(element) = layers.next_element()? {
                    match element.kind {
                        TokenKind::Null => {}
                        TokenKind::LeftBrace => read_event_lists(layers.walker(), layer, &mut line)?,
                        _ => {
                            return Err(ChartError::Structural {
                                expected: "event layer object or `null`",
                                found: element.kind.describe(),
                                offset: element.offset,
                            });
                        }
                    }
                    layer += 1;
                }
            }
            Some("extended") if value.kind == TokenKind::LeftBrace => {
                read_event_lists(walker, 0, &mut line)?;
            }
            Some("notes") => read_notes(walker, &value, &mut line.notes)?,
            _ => {}
        }
    }
    Ok(line)
}

fn event_kind(key: &str) -> Option<UnitEventKind> {
    Some(match key {
        "moveXEvents" => UnitEventKind::MoveX,
        "moveYEvents" => UnitEventKind::MoveY,
        "rotateEvents" => UnitEventKind::Rotate,
        "alphaEvents" => UnitEventKind::Alpha,
        "speedEvents" => UnitEventKind::Speed,
        "inclineEvents" => UnitEventKind::Incline,
        "scaleXEvents" => UnitEventKind::ScaleX,
        "scaleYEvents" => UnitEventKind::ScaleY,
        "colorEvents" => UnitEventKind::Color,
        _ => return None,
    })
}

fn read_event_lists<R: Read + Seek>(
    walker: &mut Walker<R>,
    layer: u32,
    line: &mut RawLine,
) -> Result<()> {
    let mut props = walker.read_properties()?;
    while let Some((key, value)) = props.next_property()? {
        let Some(key) = key.as_str() else {
            continue;
        };
        if key == "textEvents" {
            line.text |= value.kind != TokenKind::Null;
            continue;
        }
        let Some(kind) = event_kind(key) else {
            continue;
        };
        if value.kind == TokenKind::Null {
            continue;
        }
        require_open(&value, &TokenKind::LeftBracket, "event array")?;
        let mut events = props.walker().read_elements()?;
        while let Some(element) = events.next_element()? {
            require_open(&element, &TokenKind::LeftBrace, "event object")?;
            let mut event = RawEvent::at(element.offset);
            events.walker().extract_object_with(
                &mut event,
                &["start", "end", "startTime", "endTime"],
                |event, key, value, walker| {
                    match key {
                        "start" => event.start = read_event_value(walker, value)?,
                        "end" => event.end = read_event_value(walker, value)?,
                        "startTime" => event.start_time = read_triplet(walker, value)?,
                        _ => event.end_time = read_triplet(walker, value)?,
                    }
                    Ok(())
                },
            )?;
            line.events.push((kind, layer, event));
        }
    }
    Ok(())
}

fn read_notes<R: Read + Seek>(
    walker: &mut Walker<R>,
    value: &Token,
    notes: &mut Vec<RawNote>,
) -> Result<()> {
    if value.kind == TokenKind::Null {
        return Ok(());
    }
    require_open(value, &TokenKind::LeftBracket, "`notes` array")?;
    let mut elements = walker.read_elements()?;
    while let Some(element) = elements.next_element()? {
        require_open(&element, &TokenKind::LeftBrace, "note object")?;
        let mut note = RawNote::at(element.offset);
        elements.walker().extract_object_with(
            &mut note,
            &["startTime", "endTime"],
            |note, key, value, walker| {
                let triplet = read_triplet(walker, value)?;
                if key == "startTime" {
                    note.start_time = triplet;
                } else {
                    note.end_time = triplet;
                }
                Ok(())
            },
        )?;
        notes.push(note);
    }
    Ok(())
}

fn project(raw: RawChart) -> Result<Chart> {
    let meta = raw
        .meta
        .ok_or(ChartError::MissingRequiredSection { section: "META" })?;
    let bpm = raw
        .bpm
        .ok_or(ChartError::MissingRequiredSection { section: "BPMList" })?;

    let mut chart = Chart {
        metadata: ChartMetadata {
            title: meta.name,
            level: meta.level,
            charter: meta.charter,
            composer: meta.composer,
            song: meta.song,
            picture: meta.background,
            offset_ms: meta.offset,
        },
        bpm_events: bpm
            .into_iter()
            .map(|raw| BpmEvent {
                begin_beats: raw.start_time.to_beats(),
                bpm: raw.bpm,
            })
            .collect(),
        ..Default::default()
    };

    for (id, line) in (0u32..).zip(raw.lines) {
        let kind = if line.attach_ui {
            UnitKind::AttachUI
        } else if line.text {
            UnitKind::Text
        } else {
            UnitKind::Line
        };
        chart.units.push(Unit {
            parent_id: u32::try_from(line.father).ok(),
            kind,
            ..Unit::line(id)
        });
        for (kind, layer, event) in line.events {
            chart.unit_events.push(UnitEvent {
                kind,
                begin_beats: event.start_time.to_beats(),
                end_beats: event.end_time.to_beats(),
                begin_value: event.start,
                end_value: event.end,
                easing: EasingFunction::from_id(event.easing_type)
                    .map_err(|err| err.with_offset(event.offset))?,
                easing_range: (event.easing_left, event.easing_right),
                unit_id: id,
                layer,
            });
        }
        for raw in line.notes {
            let kind =
                NoteKind::from_type_id(raw.note_type).map_err(|err| err.with_offset(raw.offset))?;
            let begin_beats = raw.start_time.to_beats();
            let end_beats = if kind == NoteKind::Hold {
                raw.end_time.to_beats()
            } else {
                begin_beats
            };
            chart.notes.push(Note {
                x_position: raw.position_x,
                y_position: raw.y_offset,
                reverse_direction: raw.above != 1,
                is_fake: raw.is_fake != 0,
                speed: raw.speed,
                size: raw.size,
                ..Note::new(kind, id, begin_beats, end_beats)
            });
        }
    }
    Ok(chart)
}
