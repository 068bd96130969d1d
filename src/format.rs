//! Chart formats and the entry points that load them into a [`Chart`].
//!
//! The format is chosen by the caller, usually from the file extension through
//! [`ChartFormat::from_path`]. Every load either yields a complete chart or a
//! single [`LoadError`] naming the format.

pub mod binary;
pub mod json_tree;
pub mod line_instruction;
pub mod manifest;

use std::{
    fmt,
    io::{Read, Seek},
    path::Path,
};

use crate::{
    error::{ChartError, LoadError},
    model::Chart,
};

pub use self::{line_instruction::PecConfig, manifest::ChartManifest};

/// Supported chart encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum ChartFormat {
    /// Nested JSON object graph with lines, event layers and notes (`.json`).
    JsonTree,
    /// Plain text, one instruction per line (`.pec`).
    LineInstruction,
    /// The canonical model serialized by this crate (`.jlc`).
    Binary,
}

impl ChartFormat {
    /// Maps a file extension, ignoring ASCII case.
    #[must_use]
    pub fn from_extension(extension: &str) -> Option<Self> {
        match extension.to_ascii_lowercase().as_str() {
            "json" => Some(Self::JsonTree),
            "pec" => Some(Self::LineInstruction),
            "jlc" => Some(Self::Binary),
            _ => None,
        }
    }

    /// Maps the extension of `path`.
    #[must_use]
    pub fn from_path(path: impl AsRef<Path>) -> Option<Self> {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .and_then(Self::from_extension)
    }

    /// The extension charts of this format are saved with.
    #[must_use]
    pub const fn extension(self) -> &'static str {
        match self {
            Self::JsonTree => "json",
            Self::LineInstruction => "pec",
            Self::Binary => "jlc",
        }
    }
}

impl fmt::Display for ChartFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::JsonTree => "JSON-tree",
            Self::LineInstruction => "line-instruction",
            Self::Binary => "binary",
        })
    }
}

/// Loads a chart of `format` from memory.
///
/// # Errors
///
/// Returns a [`LoadError`] wrapping the first failure of the adapter or of
/// [`Chart::validate`].
pub fn load_chart(bytes: &[u8], format: ChartFormat) -> Result<Chart, LoadError> {
    log::debug!("loading {format} chart from {} bytes", bytes.len());
    let chart = match format {
        ChartFormat::JsonTree => json_tree::parse_bytes(bytes),
        ChartFormat::LineInstruction => std::str::from_utf8(bytes)
            .map_err(|err| ChartError::Syntax {
                byte: bytes.get(err.valid_up_to()).copied().unwrap_or_default(),
                offset: err.valid_up_to() as u64,
            })
            .and_then(|text| line_instruction::parse(text, &PecConfig::default())),
        ChartFormat::Binary => binary::decode(bytes),
    };
    finish(chart, format)
}

/// Streams a JSON-tree chart from any seekable reader.
///
/// # Errors
///
/// See [`load_chart`].
pub fn load_chart_from_reader<R: Read + Seek>(reader: R) -> Result<Chart, LoadError> {
    finish(json_tree::parse_reader(reader), ChartFormat::JsonTree)
}

fn finish(chart: crate::error::Result<Chart>, format: ChartFormat) -> Result<Chart, LoadError> {
    let chart = chart
        .and_then(|mut chart| {
            chart.normalize_bpm_events();
            chart.validate()?;
            Ok(chart)
        })
        .map_err(|source| LoadError::new(format, source))?;
    log::info!(
        "loaded {format} chart {:?}: {} units, {} events, {} notes",
        chart.metadata.title,
        chart.units.len(),
        chart.unit_events.len(),
        chart.notes.len()
    );
    Ok(chart)
}
