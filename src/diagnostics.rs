//! Fancy diagnostics support using `ariadne`.
//!
//! Chart errors carry a byte offset where the failing stage knew one. This
//! module turns them into `ariadne::Report`s pointing at that byte, leaving
//! the row and column computation to ariadne.
//!
//! ```rust
//! use judgeline::{
//!     diagnostics::{SimpleSource, ToAriadne},
//!     format::{ChartFormat, load_chart},
//! };
//!
//! let source = r#"{"META": {"offset": 0}, "BPMList": [}"#;
//! let err = load_chart(source.as_bytes(), ChartFormat::JsonTree).unwrap_err();
//! let report = err.to_report(&SimpleSource::new("chart.json", source));
//! let _ = report.eprint(("chart.json".to_string(), ariadne::Source::from(source)));
//! ```

use std::ops::Range;

use ariadne::{Color, Label, Report, ReportKind, Source};

use crate::error::{ChartError, LoadError};

/// Source text together with the name it is displayed under.
#[derive(Debug, Clone, Copy)]
pub struct SimpleSource<'a> {
    name: &'a str,
    text: &'a str,
}

impl<'a> SimpleSource<'a> {
    /// Create a new source container instance.
    #[must_use]
    pub const fn new(name: &'a str, text: &'a str) -> Self {
        Self { name, text }
    }

    /// Source text.
    #[must_use]
    pub const fn text(&self) -> &'a str {
        self.text
    }

    /// Display name.
    #[must_use]
    pub const fn name(&self) -> &'a str {
        self.name
    }

    /// One-byte span at `offset`, clamped to the text.
    fn span_at(&self, offset: Option<u64>) -> Range<usize> {
        let len = self.text.len();
        let start = offset.map_or(0, |offset| (offset as usize).min(len));
        start..(start + 1).min(len)
    }
}

/// Conversion of an error into an `ariadne::Report`.
pub trait ToAriadne {
    /// Convert error to ariadne Report.
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)>;
}

/// Helper to build a styled ariadne `Report` consistently.
#[must_use]
pub fn build_report<'a>(
    src: &SimpleSource<'a>,
    kind: ReportKind<'a>,
    range: Range<usize>,
    title: &str,
    label_message: impl ToString,
    color: Color,
) -> Report<'a, (String, Range<usize>)> {
    let filename = src.name().to_string();
    Report::build(kind, (filename.clone(), range.clone()))
        .with_message(title)
        .with_label(
            Label::new((filename, range))
                .with_message(label_message.to_string())
                .with_color(color),
        )
        .finish()
}

impl ToAriadne for ChartError {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        let title = match self {
            Self::Syntax { .. } | Self::UnexpectedEndOfInput { .. } => "malformed chart",
            Self::Structural { .. } | Self::MismatchedBrackets { .. } => "unexpected structure",
            Self::UnsupportedFeature { .. } | Self::UnknownEasingId { .. } => "unsupported chart",
            Self::Line { line, source } => {
                return build_report(
                    src,
                    ReportKind::Error,
                    src.span_at(source.offset()),
                    &format!("error on line {line}"),
                    source,
                    Color::Red,
                );
            }
            _ => "invalid chart",
        };
        build_report(
            src,
            ReportKind::Error,
            src.span_at(self.offset()),
            title,
            self,
            Color::Red,
        )
    }
}

impl ToAriadne for LoadError {
    fn to_report<'a>(&self, src: &SimpleSource<'a>) -> Report<'a, (String, Range<usize>)> {
        build_report(
            src,
            ReportKind::Error,
            src.span_at(self.offset()),
            &format!("failed to load {} chart", self.format),
            &self.source,
            Color::Red,
        )
    }
}

/// Prints a load error to standard error.
pub fn emit_load_error(name: &str, source: &str, error: &LoadError) {
    let simple = SimpleSource::new(name, source);
    let _ = error
        .to_report(&simple)
        .eprint((name.to_string(), Source::from(source)));
}
