//! Importer for the line-instruction chart format.
//!
//! The first line holds the global offset in milliseconds. Every other
//! instruction is a command word followed by a fixed number of numeric
//! arguments, which may continue over the following lines:
//!
//! | Command                                           | Meaning                          |
//! |---------------------------------------------------|----------------------------------|
//! | `bp <beat> <bpm>`                                 | BPM change                       |
//! | `n<d> <lane> <beat> [<end>] <x> <side> <fake>`    | note, `d` is the note type       |
//! | `# <speed>` / `& <size>`                          | modifiers of the previous note   |
//! | `cv <lane> <beat> <speed>`                        | speed change                     |
//! | `cp <lane> <beat> <x> <y>`                        | jump to a position               |
//! | `cm <lane> <begin> <end> <x> <y> <easing>`        | move to a position               |
//! | `cd <lane> <beat> <deg>`                          | jump to a rotation               |
//! | `cr <lane> <begin> <end> <deg> <easing>`          | rotate                           |
//! | `ca <lane> <beat> <alpha>`                        | jump to an opacity               |
//! | `cf <lane> <begin> <end> <alpha> [<easing>]`      | fade, linear without easing id   |
//!
//! Only hold notes (`n2`) carry an end beat. Lane coordinates are given in a
//! fixed virtual resolution and rescaled with [`PecConfig`].

use std::str::FromStr;

use crate::{
    error::{ChartError, Result},
    model::{BpmEvent, Chart, EasingFunction, Note, NoteKind, UnitEvent, UnitEventKind},
};

/// Virtual resolutions of the line-instruction format and of the canonical model.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct PecConfig {
    /// Width of the source coordinate space.
    pub source_width: f32,
    /// Height of the source coordinate space.
    pub source_height: f32,
    /// Width of the canonical coordinate space.
    pub target_width: f32,
    /// Height of the canonical coordinate space.
    pub target_height: f32,
    /// Number of lanes a chart may address. Lane ids must be below it.
    pub max_lanes: u32,
}

impl Default for PecConfig {
    fn default() -> Self {
        Self {
            source_width: 2048.0,
            source_height: 1400.0,
            target_width: 1350.0,
            target_height: 900.0,
            max_lanes: 1024,
        }
    }
}

impl PecConfig {
    /// Sets the source resolution.
    #[must_use]
    pub const fn with_source(mut self, width: f32, height: f32) -> Self {
        self.source_width = width;
        self.source_height = height;
        self
    }

    /// Sets the target resolution.
    #[must_use]
    pub const fn with_target(mut self, width: f32, height: f32) -> Self {
        self.target_width = width;
        self.target_height = height;
        self
    }

    /// Sets [`PecConfig::max_lanes`].
    #[must_use]
    pub const fn with_max_lanes(mut self, max_lanes: u32) -> Self {
        self.max_lanes = max_lanes;
        self
    }

    /// Horizontal scale factor.
    #[must_use]
    pub fn scale_x(&self) -> f32 {
        self.target_width / self.source_width
    }

    /// Vertical scale factor.
    #[must_use]
    pub fn scale_y(&self) -> f32 {
        self.target_height / self.source_height
    }

    /// Maps a lane position, whose origin is the top left corner, onto centered target coordinates.
    #[must_use]
    pub fn map_position(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.source_width / 2.0) * self.scale_x(),
            (y - self.source_height / 2.0) * self.scale_y(),
        )
    }
}

#[derive(Debug, Clone, Copy)]
struct Word<'a> {
    text: &'a str,
    line: usize,
    offset: u64,
}

impl Word<'_> {
    fn parse<T: FromStr>(&self) -> Result<T> {
        self.text.parse().map_err(|_| self.invalid())
    }

    fn integer(&self) -> Result<i64> {
        if let Ok(value) = self.text.parse() {
            return Ok(value);
        }
        let value: f64 = self.parse()?;
        if value.fract() == 0.0 && value.is_finite() {
            Ok(value as i64)
        } else {
            Err(self.invalid())
        }
    }

    fn invalid(&self) -> ChartError {
        ChartError::InvalidNumber {
            text: self.text.to_owned(),
            offset: self.offset,
        }
        .at_line(self.line)
    }
}

fn split_words(text: &str) -> Vec<Word<'_>> {
    let mut words = Vec::new();
    let mut line = 1;
    let mut start = None;
    for (index, ch) in text.char_indices() {
        if ch.is_whitespace() {
            if let Some(begin) = start.take() {
                words.push(Word {
                    text: &text[begin..index],
                    line,
                    offset: begin as u64,
                });
            }
            if ch == '\n' {
                line += 1;
            }
        } else if start.is_none() {
            start = Some(index);
        }
    }
    if let Some(begin) = start {
        words.push(Word {
            text: &text[begin..],
            line,
            offset: begin as u64,
        });
    }
    words
}

/// Last emitted values of a lane, which relative commands start from.
#[derive(Debug, Default, Clone, Copy)]
struct LaneState {
    x: f32,
    y: f32,
    rotation: f32,
    alpha: f32,
}

struct Parser<'a> {
    words: std::vec::IntoIter<Word<'a>>,
    last: Word<'a>,
    config: PecConfig,
    chart: Chart,
    lanes: Vec<LaneState>,
    last_note: Option<usize>,
}

impl<'a> Parser<'a> {
    fn arg(&mut self) -> Result<Word<'a>> {
        let word = self.words.next().ok_or_else(|| {
            ChartError::UnexpectedEndOfInput {
                offset: self.last.offset + self.last.text.len() as u64,
            }
            .at_line(self.last.line)
        })?;
        self.last = word;
        Ok(word)
    }

    fn number(&mut self) -> Result<f32> {
        self.arg()?.parse()
    }

    fn integer(&mut self) -> Result<i64> {
        self.arg()?.integer()
    }

    fn easing(&mut self) -> Result<EasingFunction> {
        let word = self.arg()?;
        EasingFunction::from_id(word.integer()?)
            .map_err(|err| err.with_offset(word.offset).at_line(word.line))
    }

    /// Consumes an easing id if the next word is one.
    fn optional_easing(&mut self) -> Result<EasingFunction> {
        match self.words.as_slice().first() {
            Some(word) if word.integer().is_ok() => self.easing(),
            _ => Ok(EasingFunction::Linear),
        }
    }

    /// Reads a lane id, registering the lane on first use.
    fn lane(&mut self) -> Result<u32> {
        let word = self.arg()?;
        let id = u32::try_from(word.integer()?).map_err(|_| word.invalid())?;
        if id >= self.config.max_lanes {
            return Err(ChartError::UnsupportedFeature {
                feature: format!("lane {id}, lanes are limited to {}", self.config.max_lanes),
                offset: word.offset,
            }
            .at_line(word.line));
        }
        if self.lanes.len() <= id as usize {
            self.lanes.resize_with(id as usize + 1, LaneState::default);
        }
        self.chart.ensure_unit(id);
        Ok(id)
    }

    fn push_event(&mut self, event: UnitEvent) {
        self.chart.unit_events.push(event);
    }

    fn instruction(&mut self, word: Word<'a>) -> Result<()> {
        let mut chars = word.text.chars();
        match (chars.next(), chars.as_str()) {
            (Some('b'), _) => {
                let begin_beats = self.number()?;
                let bpm = self.number()?;
                self.chart.bpm_events.push(BpmEvent { begin_beats, bpm });
            }
            (Some('n'), digit) => {
                let kind = NoteKind::from_type_id(word.integer_suffix(digit)?)
                    .map_err(|err| with_offset(err, word.offset))?;
                let unit_id = self.lane()?;
                let begin_beats = self.number()?;
                let end_beats = if kind == NoteKind::Hold {
                    self.number()?
                } else {
                    begin_beats
                };
                let x = self.number()?;
                let side = self.integer()?;
                let fake = self.integer()?;
                self.chart.notes.push(Note {
                    x_position: x * self.config.scale_x(),
                    reverse_direction: side == 2,
                    is_fake: fake == 1,
                    ..Note::new(kind, unit_id, begin_beats, end_beats)
                });
                self.last_note = Some(self.chart.notes.len() - 1);
            }
            (Some(modifier @ ('#' | '&')), _) => {
                let value = self.number()?;
                let note = self
                    .last_note
                    .and_then(|index| self.chart.notes.get_mut(index))
                    .ok_or_else(|| ChartError::Structural {
                        expected: "note before modifier",
                        found: format!("`{modifier}`"),
                        offset: word.offset,
                    })?;
                if modifier == '#' {
                    note.speed = value;
                } else {
                    note.size = value;
                }
            }
            (Some('c'), sub) => self.lane_event(word, sub)?,
            _ => {
                return Err(ChartError::UnsupportedFeature {
                    feature: format!("instruction `{}`", word.text),
                    offset: word.offset,
                });
            }
        }
        Ok(())
    }

    fn lane_event(&mut self, word: Word<'a>, sub: &str) -> Result<()> {
        let unit = self.lane()?;
        match sub {
            "v" => {
                let beats = self.number()?;
                let speed = self.number()?;
                self.push_event(UnitEvent::step(UnitEventKind::Speed, unit, beats, speed));
            }
            "p" | "m" => {
                let ramp = sub == "m";
                let begin = self.number()?;
                let end = if ramp { self.number()? } else { begin };
                let raw_x = self.number()?;
                let raw_y = self.number()?;
                let easing = if ramp {
                    self.easing()?
                } else {
                    EasingFunction::Linear
                };
                let (x, y) = self.config.map_position(raw_x, raw_y);
                let state = self.lanes[unit as usize];
                self.push_event(UnitEvent::ramp(
                    UnitEventKind::MoveX,
                    unit,
                    (begin, end),
                    (state.x, x),
                    easing,
                ));
                self.push_event(UnitEvent::ramp(
                    UnitEventKind::MoveY,
                    unit,
                    (begin, end),
                    (state.y, y),
                    easing,
                ));
                let state = &mut self.lanes[unit as usize];
                state.x = x;
                state.y = y;
            }
            "d" | "r" => {
                let ramp = sub == "r";
                let begin = self.number()?;
                let end = if ramp { self.number()? } else { begin };
                let rotation = self.number()?;
                let easing = if ramp {
                    self.easing()?
                } else {
                    EasingFunction::Linear
                };
                let from = self.lanes[unit as usize].rotation;
                self.push_event(UnitEvent::ramp(
                    UnitEventKind::Rotate,
                    unit,
                    (begin, end),
                    (from, rotation),
                    easing,
                ));
                self.lanes[unit as usize].rotation = rotation;
            }
            "a" | "f" => {
                let ramp = sub == "f";
                let begin = self.number()?;
                let end = if ramp { self.number()? } else { begin };
                let alpha = self.number()?;
                let easing = if ramp {
                    self.optional_easing()?
                } else {
                    EasingFunction::Linear
                };
                let from = self.lanes[unit as usize].alpha;
                self.push_event(UnitEvent::ramp(
                    UnitEventKind::Alpha,
                    unit,
                    (begin, end),
                    (from, alpha),
                    easing,
                ));
                self.lanes[unit as usize].alpha = alpha;
            }
            _ => {
                return Err(ChartError::UnsupportedFeature {
                    feature: format!("lane event `{}`", word.text),
                    offset: word.offset,
                });
            }
        }
        Ok(())
    }
}

impl Word<'_> {
    fn integer_suffix(&self, suffix: &str) -> Result<i64> {
        suffix.parse().map_err(|_| {
            ChartError::UnsupportedFeature {
                feature: format!("note instruction `{}`", self.text),
                offset: self.offset,
            }
        })
    }
}

fn with_offset(err: ChartError, offset: u64) -> ChartError {
    match err {
        ChartError::UnsupportedFeature { feature, .. } => {
            ChartError::UnsupportedFeature { feature, offset }
        }
        other => other,
    }
}

/// Parses a line-instruction chart.
///
/// # Errors
///
/// Errors carry the line number of the failing word:
///
/// - [`ChartError::MissingRequiredSection`] for an empty document.
/// - [`ChartError::InvalidNumber`] for an argument that is not a number.
/// - [`ChartError::UnexpectedEndOfInput`] when the last instruction is cut short.
/// - [`ChartError::UnknownEasingId`] for an easing id outside the table.
/// - [`ChartError::UnsupportedFeature`] for an unknown instruction or note type,
///   or a lane id beyond [`PecConfig::max_lanes`].
pub fn parse(text: &str, config: &PecConfig) -> Result<Chart> {
    let mut words = split_words(text).into_iter();
    let offset = words.next().ok_or(ChartError::MissingRequiredSection {
        section: "offset line",
    })?;
    let mut parser = Parser {
        words,
        last: offset,
        config: *config,
        chart: Chart::default(),
        lanes: Vec::new(),
        last_note: None,
    };
    parser.chart.metadata.offset_ms = offset.parse()?;
    while let Some(word) = parser.words.next() {
        parser.last = word;
        parser
            .instruction(word)
            .map_err(|err| err.at_line(word.line))?;
    }
    log::debug!(
        "read line-instruction document: {} lanes, {} events, {} notes",
        parser.lanes.len(),
        parser.chart.unit_events.len(),
        parser.chart.notes.len()
    );
    Ok(parser.chart)
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn parse_default(text: &str) -> Result<Chart> {
        parse(text, &PecConfig::default())
    }

    #[test]
    fn single_tap_note() {
        let chart = parse_default("0.0\nbp 0 120\nn1 0 0.5 0.0 0 1\n").expect("parse");
        assert_eq!(chart.notes.len(), 1);
        let note = &chart.notes[0];
        assert_eq!(note.kind, NoteKind::Tap);
        assert_eq!(note.unit_id, 0);
        assert_eq!(note.begin_beats, 0.5);
        assert_eq!(note.end_beats, note.begin_beats);
        assert!(note.is_fake);
        assert!(!note.reverse_direction);
        assert_eq!(chart.units.len(), 1);
        assert_eq!(chart.bpm_events, vec![BpmEvent { begin_beats: 0.0, bpm: 120.0 }]);
    }

    #[test]
    fn hold_with_modifiers_over_several_lines() {
        let chart = parse_default("150\nbp 0 200\nn2 1 4 8 1024 2 0\n# 1.5\n& 2\n").expect("parse");
        let note = &chart.notes[0];
        assert_eq!(chart.metadata.offset_ms, 150.0);
        assert_eq!(note.kind, NoteKind::Hold);
        assert_eq!((note.begin_beats, note.end_beats), (4.0, 8.0));
        assert_eq!(note.x_position, 675.0);
        assert!(note.reverse_direction && !note.is_fake);
        assert_eq!((note.speed, note.size), (1.5, 2.0));
        assert_eq!(chart.units.len(), 2);
    }

    #[test]
    fn relative_commands_start_from_the_last_value() {
        let chart = parse_default(
            "0\nbp 0 120\ncp 0 0 1024 700\ncm 0 1 2 2048 700 4\ncf 0 1 3 255\ncr 0 2 4 90 1\n",
        )
        .expect("parse");
        let move_x: Vec<_> = chart
            .events_of(0, UnitEventKind::MoveX)
            .map(|e| (e.begin_value, e.end_value, e.is_step()))
            .collect();
        assert_eq!(move_x, vec![(0.0, 0.0, true), (0.0, 675.0, false)]);
        let fade = chart.events_of(0, UnitEventKind::Alpha).next().expect("fade");
        assert_eq!((fade.begin_value, fade.end_value), (0.0, 255.0));
        assert_eq!(fade.easing, EasingFunction::Linear);
        let rotate = chart.events_of(0, UnitEventKind::Rotate).next().expect("rotate");
        assert_eq!((rotate.begin_beats, rotate.end_beats), (2.0, 4.0));
    }

    #[test]
    fn lanes_grow_lazily() {
        let chart = parse_default("0\nbp 0 120\ncd 3 0 90\n").expect("parse");
        assert_eq!(chart.units.len(), 4);
        assert!(chart.units.iter().enumerate().all(|(i, u)| u.id as usize == i));
    }

    #[test]
    fn lane_ids_are_limited() {
        let err = parse_default("0\nbp 0 120\ncd 4000000000 0 90\n").expect_err("huge lane");
        let ChartError::Line { line, source } = err else {
            panic!("expected line context, got {err:?}");
        };
        assert_eq!(line, 3);
        assert!(matches!(
            *source,
            ChartError::UnsupportedFeature { offset: 14, .. }
        ));

        let config = PecConfig::default().with_max_lanes(4);
        assert_eq!(
            parse("0\nbp 0 120\ncd 3 0 90\n", &config)
                .expect("last lane")
                .units
                .len(),
            4
        );
        assert!(parse("0\nbp 0 120\nn1 4 1 0 1 0\n", &config).is_err());
    }

    #[test]
    fn unknown_easing_reports_line() {
        let err = parse_default("0\nbp 0 120\n\ncm 0 1 2 10 10 30\n").expect_err("easing");
        let ChartError::Line { line, source } = err else {
            panic!("expected line context, got {err:?}");
        };
        assert_eq!(line, 4);
        assert!(matches!(
            *source,
            ChartError::UnknownEasingId { id: 30, offset: 27 }
        ));
    }

    #[test]
    fn unknown_instruction_and_truncation() {
        assert!(matches!(
            parse_default("0\nzz 1 2\n"),
            Err(ChartError::Line { line: 2, .. })
        ));
        let err = parse_default("0\nbp 0").expect_err("short");
        assert!(matches!(
            err.offset(),
            Some(6)
        ));
        assert!(matches!(
            parse_default("  \n"),
            Err(ChartError::MissingRequiredSection { .. })
        ));
    }
}
