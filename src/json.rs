//! Streaming access to JSON-like chart documents.
//!
//! - [`token`] turns bytes into [`Token`]s through a sliding window.
//! - [`walker`] navigates the block structure with one token of lookahead.
//! - [`extract`] fills typed records from an object level without reflection.

pub mod extract;
pub mod token;
pub mod walker;

pub use self::{
    extract::{Extract, Slot},
    token::{Token, TokenKind, TokenStream},
    walker::{Elements, Properties, SkipMode, Walker},
};
