//! The chart engine of judge-line rhythm games.
//!
//! Charts come in as raw bytes in one of several formats and leave as a
//! canonical, beat-indexed [`Chart`](model::Chart). A
//! [`Timeline`](timeline::Timeline) derives the absolute time and scroll
//! position of everything in it, and a [`PlaySession`](session::PlaySession)
//! judges player input against the notes frame by frame while a background
//! worker prepares upcoming beats.
//!
//! - [`json`] is a pull parser for the JSON-like chart grammar: a resumable
//!   [`TokenStream`](json::TokenStream) and a [`Walker`](json::Walker) that
//!   enters, skips and extracts blocks without building a document tree.
//! - [`format`] holds the importers: the JSON-tree format, the
//!   line-instruction format, the canonical binary form and the companion
//!   manifest of chart archives.
//! - [`model`] is the canonical chart model.
//! - [`timeline`] integrates tempo and scroll speed.
//! - [`judge`] classifies touches against notes.
//! - [`dispatch`] is the ring of prepared beat buckets.
//! - [`session`] runs them together.
//!
//! Rendering, audio and UI are left to the caller: they supply chart bytes,
//! touches and playback time, and consume unit states, note offsets and
//! judgment outcomes.
//!
//! ```
//! use judgeline::{
//!     format::{ChartFormat, load_chart},
//!     judge::{JudgeResult, TouchPhase, TouchSample},
//!     session::{PlaySession, SessionConfig},
//! };
//!
//! let source = "0\nbp 0 120\nn1 0 2 0 1 0\n";
//! let chart = load_chart(source.as_bytes(), ChartFormat::LineInstruction).unwrap();
//! let mut session = PlaySession::new(chart, &SessionConfig::default()).unwrap();
//!
//! let touch = TouchSample::new(0, glam::Vec2::ZERO, TouchPhase::Began);
//! let frame = session.update(1000.0, &[touch]);
//! assert_eq!(frame.outcomes[0].result, JudgeResult::Perfect);
//! ```
#![cfg_attr(docsrs, feature(doc_cfg))]

#[cfg(feature = "diagnostics")]
pub mod diagnostics;
pub mod dispatch;
pub mod error;
pub mod format;
pub mod json;
pub mod judge;
pub mod model;
pub mod session;
pub mod timeline;

pub use self::{
    error::{ChartError, LoadError},
    format::{ChartFormat, load_chart},
    model::Chart,
    session::{PlaySession, SessionConfig},
    timeline::{Timeline, TimelineConfig},
};
