//! Pull-based cursor over a [`TokenStream`].
//!
//! The walker keeps exactly one token of lookahead (the *current* token) and
//! the nesting depth of the blocks it has entered. Values the caller is not
//! interested in are skipped on the byte level by [`Walker::skip_block`], so
//! large unused subtrees are never tokenized.

use std::io::{Cursor, Read, Seek};

use crate::error::{ChartError, Result};

use super::token::{Token, TokenKind, TokenStream};

/// How [`Walker::skip_block`] treats the skipped bytes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SkipMode {
    /// Trust the input and only count nesting depth.
    #[default]
    Fast,
    /// Also verify every closing bracket matches its opening bracket.
    Checked,
}

/// A cursor over the document structure of a chart file.
pub struct Walker<R> {
    stream: TokenStream<R>,
    current: Option<Token>,
    depth: usize,
}

impl<'a> Walker<Cursor<&'a [u8]>> {
    /// Creates a walker over an in-memory buffer.
    ///
    /// # Errors
    ///
    /// Returns an error if the first token cannot be lexed.
    pub fn from_bytes(bytes: &'a [u8]) -> Result<Self> {
        Self::new(TokenStream::from_bytes(bytes))
    }
}

impl<R: Read + Seek> Walker<R> {
    /// Creates a walker and loads the first token.
    ///
    /// # Errors
    ///
    /// Returns an error if the first token cannot be lexed.
    pub fn new(mut stream: TokenStream<R>) -> Result<Self> {
        let current = stream.next_token()?;
        Ok(Self {
            stream,
            current,
            depth: 0,
        })
    }

    /// The lookahead token, `None` at the end of input.
    #[must_use]
    pub const fn current(&self) -> Option<&Token> {
        self.current.as_ref()
    }

    /// Number of blocks entered and not yet left.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Byte offset of the lookahead token, or of the end of input.
    #[must_use]
    pub fn offset(&self) -> u64 {
        self.current
            .as_ref()
            .map_or_else(|| self.stream.position(), |token| token.offset)
    }

    pub(crate) fn require(&self) -> Result<&Token> {
        self.current
            .as_ref()
            .ok_or(ChartError::UnexpectedEndOfInput {
                offset: self.stream.position(),
            })
    }

    pub(crate) fn structural(&self, expected: &'static str) -> ChartError {
        ChartError::Structural {
            expected,
            found: self
                .current
                .as_ref()
                .map_or_else(|| "end of input".into(), |token| token.kind.describe()),
            offset: self.offset(),
        }
    }

    /// Consumes the lookahead token and loads the next one.
    ///
    /// # Errors
    ///
    /// Returns an error at the end of input or if the next token cannot be lexed.
    pub fn advance(&mut self) -> Result<Token> {
        let consumed = self.require()?.clone();
        if consumed.kind.is_open() {
            self.depth += 1;
        } else if consumed.kind.is_close() {
            self.depth = self.depth.saturating_sub(1);
        }
        self.current = self.stream.next_token()?;
        Ok(consumed)
    }

    /// Enters the block opened by the lookahead token and returns its opening kind.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Structural`] unless the lookahead is `{` or `[`.
    pub fn enter_block(&mut self) -> Result<TokenKind> {
        if !self.require()?.kind.is_open() {
            return Err(self.structural("`{` or `[`"));
        }
        Ok(self.advance()?.kind)
    }

    /// Leaves the current block by consuming its closing token.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Structural`] unless the lookahead is `}` or `]`.
    pub fn leave_block(&mut self) -> Result<()> {
        if !self.require()?.kind.is_close() {
            return Err(self.structural("`}` or `]`"));
        }
        self.advance()?;
        Ok(())
    }

    /// Skips the whole block opened by the lookahead token, leaving the cursor on the token after its close.
    ///
    /// Bracket counting is suspended between double quotes. Escaped quotes are not recognized.
    ///
    /// # Errors
    ///
    /// - [`ChartError::Structural`] unless the lookahead is `{` or `[`.
    /// - [`ChartError::UnexpectedEndOfInput`] if the block never closes.
    /// - [`ChartError::MismatchedBrackets`] in [`SkipMode::Checked`] when the brackets do not pair up.
    pub fn skip_block(&mut self, mode: SkipMode) -> Result<()> {
        let open = match self.require()?.kind {
            TokenKind::LeftBrace => b'{',
            TokenKind::LeftBracket => b'[',
            _ => return Err(self.structural("`{` or `[`")),
        };
        let mut stack = vec![open];
        let mut in_string = false;
        while !stack.is_empty() {
            let offset = self.stream.position();
            let Some(byte) = self.stream.next_char()? else {
                return Err(ChartError::UnexpectedEndOfInput { offset });
            };
            match byte {
                b'"' => in_string = !in_string,
                _ if in_string => {}
                b'{' | b'[' => stack.push(byte),
                b'}' | b']' => {
                    let opened = stack.pop().unwrap_or(open);
                    if mode == SkipMode::Checked && (opened == b'{') != (byte == b'}') {
                        return Err(ChartError::MismatchedBrackets {
                            open: char::from(opened),
                            close: char::from(byte),
                            offset,
                        });
                    }
                }
                _ => {}
            }
        }
        self.current = self.stream.next_token()?;
        Ok(())
    }

    /// Skips one value: a whole block if the lookahead opens one, otherwise the single scalar token.
    ///
    /// # Errors
    ///
    /// See [`Walker::skip_block`].
    pub fn skip_value(&mut self, mode: SkipMode) -> Result<()> {
        if self.require()?.kind.is_open() {
            self.skip_block(mode)
        } else {
            self.advance().map(drop)
        }
    }

    /// Consumes tokens until the walker is back at `depth`, skipping anything left in between.
    pub(crate) fn close_to_depth(&mut self, depth: usize) -> Result<()> {
        while self.depth > depth {
            if self.require()?.kind.is_open() {
                self.skip_block(SkipMode::Fast)?;
            } else {
                self.advance()?;
            }
        }
        Ok(())
    }

    /// Scans the current object for `key`, skipping sibling values without tokenizing them.
    ///
    /// Returns `false`, leaving the cursor on the `}`, when the object ends first.
    /// On success the cursor rests on the key's value, or on its `:` when
    /// `advance_to_value` is `false`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Structural`] if the object is malformed.
    pub fn locate_key(&mut self, key: &str, advance_to_value: bool) -> Result<bool> {
        loop {
            match &self.require()?.kind {
                TokenKind::RightBrace => return Ok(false),
                TokenKind::Comma => {
                    self.advance()?;
                }
                TokenKind::String(found) => {
                    let matched = found == key;
                    self.advance()?;
                    if !matches!(self.require()?.kind, TokenKind::Colon) {
                        return Err(self.structural("`:`"));
                    }
                    if matched {
                        if advance_to_value {
                            self.advance()?;
                        }
                        return Ok(true);
                    }
                    self.advance()?;
                    self.skip_value(SkipMode::Fast)?;
                }
                _ => return Err(self.structural("object key")),
            }
        }
    }

    /// Reads the key/value pairs of the object the cursor is on or inside.
    ///
    /// If the cursor is on `{`, the object is entered and its closing `}` is
    /// consumed once the pairs run out. Otherwise the cursor must already be
    /// inside an object and the `}` is left for the caller.
    ///
    /// # Errors
    ///
    /// Returns an error if the object cannot be entered.
    pub fn read_properties(&mut self) -> Result<Properties<'_, R>> {
        let entered = matches!(self.require()?.kind, TokenKind::LeftBrace);
        if entered {
            self.enter_block()?;
        }
        let level = self.depth;
        Ok(Properties {
            walker: self,
            level,
            entered,
            pending: false,
            finished: false,
        })
    }

    /// Reads the elements of the array the cursor is on, entering it and consuming its `]` at the end.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Structural`] unless the cursor is on `[`.
    pub fn read_elements(&mut self) -> Result<Elements<'_, R>> {
        if !matches!(self.require()?.kind, TokenKind::LeftBracket) {
            return Err(self.structural("`[`"));
        }
        self.enter_block()?;
        let level = self.depth;
        Ok(Elements {
            walker: self,
            level,
            pending: false,
            finished: false,
        })
    }

    fn settle(&mut self, level: usize, pending: bool) -> Result<()> {
        if pending && self.depth == level && self.require()?.kind.is_open() {
            self.skip_block(SkipMode::Fast)?;
        }
        self.close_to_depth(level)
    }
}

/// Lazy sequence of `(key, value)` pairs of one object, see [`Walker::read_properties`].
///
/// Scalar values are consumed before being yielded. A structural value is
/// yielded while the cursor still rests on its opening bracket: the caller may
/// descend into it through [`Properties::walker`], and whatever it leaves
/// unread is skipped before the next pair.
pub struct Properties<'w, R> {
    walker: &'w mut Walker<R>,
    level: usize,
    entered: bool,
    pending: bool,
    finished: bool,
}

impl<R: Read + Seek> Properties<'_, R> {
    /// The underlying walker, positioned on the last yielded value.
    pub const fn walker(&mut self) -> &mut Walker<R> {
        self.walker
    }

    /// Yields the next pair, or `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the object is malformed.
    pub fn next_property(&mut self) -> Result<Option<(Token, Token)>> {
        if self.finished {
            return Ok(None);
        }
        self.walker.settle(self.level, std::mem::take(&mut self.pending))?;
        loop {
            match self.walker.require()?.kind {
                TokenKind::Comma => {
                    self.walker.advance()?;
                }
                TokenKind::RightBrace => {
                    self.finished = true;
                    if self.entered {
                        self.walker.leave_block()?;
                    }
                    return Ok(None);
                }
                TokenKind::String(_) => break,
                _ => return Err(self.walker.structural("object key")),
            }
        }
        let key = self.walker.advance()?;
        if !matches!(self.walker.require()?.kind, TokenKind::Colon) {
            return Err(self.walker.structural("`:`"));
        }
        self.walker.advance()?;
        let value = self.walker.require()?.clone();
        if value.kind.is_open() {
            self.pending = true;
        } else if value.kind.is_close() || matches!(value.kind, TokenKind::Comma | TokenKind::Colon) {
            return Err(self.walker.structural("value"));
        } else {
            self.walker.advance()?;
        }
        Ok(Some((key, value)))
    }
}

impl<R: Read + Seek> Iterator for Properties<'_, R> {
    type Item = Result<(Token, Token)>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next_property();
        if next.is_err() {
            self.finished = true;
        }
        next.transpose()
    }
}

/// Lazy sequence of the elements of one array, see [`Walker::read_elements`].
///
/// Follows the same consumption rules as [`Properties`].
pub struct Elements<'w, R> {
    walker: &'w mut Walker<R>,
    level: usize,
    pending: bool,
    finished: bool,
}

impl<R: Read + Seek> Elements<'_, R> {
    /// The underlying walker, positioned on the last yielded element.
    pub const fn walker(&mut self) -> &mut Walker<R> {
        self.walker
    }

    /// Yields the next element, or `None` after the last one.
    ///
    /// # Errors
    ///
    /// Returns an error if the array is malformed.
    pub fn next_element(&mut self) -> Result<Option<Token>> {
        if self.finished {
            return Ok(None);
        }
        self.walker.settle(self.level, std::mem::take(&mut self.pending))?;
        if matches!(self.walker.require()?.kind, TokenKind::Comma) {
            self.walker.advance()?;
        }
        let value = self.walker.require()?.clone();
        match value.kind {
            TokenKind::RightBracket => {
                self.finished = true;
                self.walker.leave_block()?;
                Ok(None)
            }
            TokenKind::RightBrace | TokenKind::Comma | TokenKind::Colon => {
                Err(self.walker.structural("array element"))
            }
            _ if value.kind.is_open() => {
                self.pending = true;
                Ok(Some(value))
            }
            _ => {
                self.walker.advance()?;
                Ok(Some(value))
            }
        }
    }
}

impl<R: Read + Seek> Iterator for Elements<'_, R> {
    type Item = Result<Token>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.next_element();
        if next.is_err() {
            self.finished = true;
        }
        next.transpose()
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    #[test]
    fn skip_block_lands_after_matching_close() {
        let mut walker = Walker::from_bytes(br#"{"a":{"b":1},"c":2}"#).expect("lex");
        walker.enter_block().expect("enter");
        assert!(walker.locate_key("a", true).expect("locate"));
        walker.skip_block(SkipMode::Fast).expect("skip");
        assert_eq!(walker.current().map(|t| &t.kind), Some(&TokenKind::Comma));
        assert_eq!(walker.depth(), 1);
    }

    #[test]
    fn skip_block_ignores_brackets_inside_strings() {
        let mut walker = Walker::from_bytes(br#"[{"x":"}]"}, 3]"#).expect("lex");
        walker.enter_block().expect("enter");
        walker.skip_block(SkipMode::Checked).expect("skip");
        walker.advance().expect("comma");
        assert_eq!(
            walker.current().map(|t| &t.kind),
            Some(&TokenKind::Number("3".into()))
        );
    }

    #[test]
    fn checked_skip_detects_mismatch() {
        let mut walker = Walker::from_bytes(br#"{"a":[1}}"#).expect("lex");
        let err = walker.skip_block(SkipMode::Checked).expect_err("mismatch");
        assert!(matches!(
            err,
            ChartError::MismatchedBrackets {
                open: '[',
                close: '}',
                offset: 7
            }
        ));
        let mut walker = Walker::from_bytes(br#"{"a":[1}}"#).expect("lex");
        walker.skip_block(SkipMode::Fast).expect("fast mode trusts input");
    }

    #[test]
    fn locate_key_stops_at_object_end() {
        let mut walker = Walker::from_bytes(br#"{"a":[1,{"k":0}],"b":"x"} "#).expect("lex");
        walker.enter_block().expect("enter");
        assert!(!walker.locate_key("k", true).expect("scan"));
        assert_eq!(walker.current().map(|t| &t.kind), Some(&TokenKind::RightBrace));
    }

    #[test]
    fn locate_key_without_advancing_rests_on_colon() {
        let mut walker = Walker::from_bytes(br#"{"a":1,"b":2}"#).expect("lex");
        walker.enter_block().expect("enter");
        assert!(walker.locate_key("b", false).expect("scan"));
        assert_eq!(walker.current().map(|t| &t.kind), Some(&TokenKind::Colon));
    }

    #[test]
    fn properties_skip_unread_structural_values() {
        let src = br#"{"skip":{"deep":[1,2,{"x":3}]},"take":[4,5],"n":6} "#;
        let mut walker = Walker::from_bytes(src).expect("lex");
        let mut props = walker.read_properties().expect("props");
        let mut seen = vec![];
        while let Some((key, value)) = props.next_property().expect("pair") {
            let key = key.as_str().expect("string key").to_owned();
            if key == "take" {
                let numbers: Vec<i32> = props
                    .walker()
                    .read_elements()
                    .expect("array")
                    .map(|t| t.and_then(|t| t.parse_number()))
                    .collect::<Result<_>>()
                    .expect("numbers");
                assert_eq!(numbers, vec![4, 5]);
            }
            seen.push((key, value.kind));
        }
        drop(props);
        assert_eq!(seen.len(), 3);
        assert_eq!(seen[2], ("n".into(), TokenKind::Number("6".into())));
        assert_eq!(walker.depth(), 0);
        assert!(walker.current().is_none());
    }

    #[test]
    fn leave_block_requires_close() {
        let mut walker = Walker::from_bytes(b"[1] ").expect("lex");
        assert!(matches!(
            walker.leave_block(),
            Err(ChartError::Structural { .. })
        ));
    }
}
