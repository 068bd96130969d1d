//! The companion text file shipped next to JSON-tree charts in archives.
//!
//! It is a loose list of `Key: value` lines. Only `Path` (the directory of
//! the chart inside the archive) and `Chart` (the chart file name) are
//! required; the display fields are optional.

use std::{
    path::{Path, PathBuf},
    sync::LazyLock,
};

use regex::Regex;

use crate::{
    error::{ChartError, Result},
    model::ChartMetadata,
};

static FIELD: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?m)^[ \t]*(Path|Chart|Name|Level|Composer|Charter|Song|Picture)[ \t]*:[ \t]*(.*?)[ \t\r]*$")
        .expect("manifest field pattern is valid")
});

/// Fields of a companion manifest.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct ChartManifest {
    /// Directory of the chart inside its archive.
    pub path: String,
    /// File name of the chart.
    pub chart: String,
    /// Song title.
    pub name: Option<String>,
    /// Difficulty label.
    pub level: Option<String>,
    /// Composer of the song.
    pub composer: Option<String>,
    /// Author of the chart.
    pub charter: Option<String>,
    /// Audio file name.
    pub song: Option<String>,
    /// Background picture file name.
    pub picture: Option<String>,
}

impl ChartManifest {
    /// Parses a manifest. Later occurrences of a key win.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::MissingRequiredSection`] if `Path` or `Chart` is absent.
    pub fn parse(text: &str) -> Result<Self> {
        let mut path = None;
        let mut chart = None;
        let mut manifest = Self::default();
        for captures in FIELD.captures_iter(text) {
            let (_, [key, value]) = captures.extract();
            let value = value.to_owned();
            match key {
                "Path" => path = Some(value),
                "Chart" => chart = Some(value),
                "Name" => manifest.name = Some(value),
                "Level" => manifest.level = Some(value),
                "Composer" => manifest.composer = Some(value),
                "Charter" => manifest.charter = Some(value),
                "Song" => manifest.song = Some(value),
                _ => manifest.picture = Some(value),
            }
        }
        manifest.path = path.ok_or(ChartError::MissingRequiredSection { section: "Path" })?;
        manifest.chart = chart.ok_or(ChartError::MissingRequiredSection { section: "Chart" })?;
        Ok(manifest)
    }

    /// Location of the chart file inside the archive.
    #[must_use]
    pub fn chart_path(&self) -> PathBuf {
        Path::new(&self.path).join(&self.chart)
    }

    /// Copies the display fields into `metadata` where it has none of its own.
    pub fn apply_to(&self, metadata: &mut ChartMetadata) {
        let pairs = [
            (&mut metadata.title, &self.name),
            (&mut metadata.level, &self.level),
            (&mut metadata.composer, &self.composer),
            (&mut metadata.charter, &self.charter),
            (&mut metadata.song, &self.song),
            (&mut metadata.picture, &self.picture),
        ];
        for (field, value) in pairs {
            if let Some(value) = value
                && field.is_empty()
            {
                field.clone_from(value);
            }
        }
    }
}
