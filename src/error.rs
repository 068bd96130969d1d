//! Error definitions shared by every stage of a chart load.
//!
//! A chart is either loaded completely or rejected: any [`ChartError`] raised
//! while tokenizing, walking, adapting or integrating aborts the load and is
//! handed back to the caller wrapped in a [`LoadError`] that remembers which
//! [`ChartFormat`] was being read.

use thiserror::Error;

use crate::format::ChartFormat;

/// An error occurred while importing or preparing a chart.
#[non_exhaustive]
#[derive(Debug, Error)]
pub enum ChartError {
    /// A byte that cannot start any token was found.
    #[error("unexpected byte {byte:#04x} ({}) at offset {offset}", printable(.byte))]
    Syntax {
        /// The offending byte.
        byte: u8,
        /// Byte offset of the offending byte.
        offset: u64,
    },
    /// The input ended inside a string or number literal, or where a value was required.
    #[error("unexpected end of input at offset {offset}")]
    UnexpectedEndOfInput {
        /// Byte offset where the input ended.
        offset: u64,
    },
    /// A block was entered or left on a token that does not open or close one.
    #[error("expected {expected}, but found {found} at offset {offset}")]
    Structural {
        /// What the walker required.
        expected: &'static str,
        /// Description of the token actually found.
        found: String,
        /// Byte offset of the found token.
        offset: u64,
    },
    /// A block opened with one bracket kind was closed with the other one.
    #[error("block opened with `{open}` was closed with `{close}` at offset {offset}")]
    MismatchedBrackets {
        /// The opening bracket.
        open: char,
        /// The closing bracket that does not match.
        close: char,
        /// Byte offset of the closing bracket.
        offset: u64,
    },
    /// The chart uses a construct this importer deliberately does not handle.
    #[error("unsupported feature: {feature} at offset {offset}")]
    UnsupportedFeature {
        /// Description of the construct.
        feature: String,
        /// Byte offset where it was found, or zero if unknown.
        offset: u64,
    },
    /// An easing id outside the fixed lookup table.
    #[error("unknown easing id {id} at offset {offset}")]
    UnknownEasingId {
        /// The rejected id.
        id: i64,
        /// Byte offset of the event that uses it, or zero if unknown.
        offset: u64,
    },
    /// A section every chart must have is absent.
    #[error("missing required section: {section}")]
    MissingRequiredSection {
        /// Name of the section.
        section: &'static str,
    },
    /// No speed segment covers the queried beat. This is a defect of the timeline build.
    #[error("no speed segment of unit {unit} covers beat {beats}")]
    SegmentNotFound {
        /// Unit whose segments were searched.
        unit: u32,
        /// The queried beat.
        beats: f32,
    },
    /// Timing data that cannot be integrated.
    #[error("invalid timing data: {reason}")]
    InvalidTimingData {
        /// Why the data was rejected.
        reason: String,
    },
    /// A numeric token that does not fit its destination type.
    #[error("invalid number `{text}` at offset {offset}")]
    InvalidNumber {
        /// Raw text of the number.
        text: String,
        /// Byte offset of the number token.
        offset: u64,
    },
    /// An error inside a line of a line-oriented chart.
    #[error("line {line}: {source}")]
    Line {
        /// 1-based line number.
        line: usize,
        /// The underlying error.
        #[source]
        source: Box<ChartError>,
    },
    /// Reading the underlying source failed.
    #[error("failed to read chart source: {0}")]
    Io(#[from] std::io::Error),
    /// Decoding the canonical binary form failed.
    #[error("failed to decode binary chart: {0}")]
    Binary(String),
    /// The dispatch worker exited before delivering a beat.
    #[error("dispatch worker stopped before beat {beat}")]
    WorkerStopped {
        /// The beat that was never delivered.
        beat: i64,
    },
}

impl ChartError {
    /// Byte offset carried by this error, if any.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        match self {
            Self::Syntax { offset, .. }
            | Self::UnexpectedEndOfInput { offset }
            | Self::Structural { offset, .. }
            | Self::MismatchedBrackets { offset, .. }
            | Self::UnsupportedFeature { offset, .. }
            | Self::UnknownEasingId { offset, .. }
            | Self::InvalidNumber { offset, .. } => Some(*offset),
            Self::Line { source, .. } => source.offset(),
            _ => None,
        }
    }

    /// Attaches a 1-based line number to this error.
    #[must_use]
    pub fn at_line(self, line: usize) -> Self {
        match self {
            already @ Self::Line { .. } => already,
            other => Self::Line {
                line,
                source: Box::new(other),
            },
        }
    }

    /// Points an error raised without source context at `offset`.
    pub(crate) fn with_offset(self, offset: u64) -> Self {
        match self {
            Self::UnsupportedFeature { feature, .. } => Self::UnsupportedFeature { feature, offset },
            Self::UnknownEasingId { id, .. } => Self::UnknownEasingId { id, offset },
            other => other,
        }
    }

    pub(crate) fn invalid_timing(reason: impl Into<String>) -> Self {
        Self::InvalidTimingData {
            reason: reason.into(),
        }
    }
}

fn printable(byte: &u8) -> String {
    char::from(*byte).escape_default().to_string()
}

/// Result of a chart import stage.
pub type Result<T> = std::result::Result<T, ChartError>;

/// Terminal failure of a whole chart load.
#[derive(Debug, Error)]
#[error("failed to load {format} chart: {source}")]
pub struct LoadError {
    /// The format that was being read.
    pub format: ChartFormat,
    /// What went wrong.
    #[source]
    pub source: ChartError,
}

impl LoadError {
    /// Creates a new load error for `format`.
    #[must_use]
    pub const fn new(format: ChartFormat, source: ChartError) -> Self {
        Self { format, source }
    }

    /// Byte offset of the failure, where the failing stage knew one.
    #[must_use]
    pub fn offset(&self) -> Option<u64> {
        self.source.offset()
    }
}
