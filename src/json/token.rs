//! Byte-level lexer for the JSON-like chart grammar.
//!
//! The [`TokenStream`] reads from any [`Read`] + [`Seek`] source through a fixed
//! sliding window, so arbitrarily large charts are tokenized without holding
//! the whole file in memory. Every token remembers the byte offset it started
//! at, and the cursor can be moved to any byte offset with [`TokenStream::seek`].

use std::io::{Cursor, Read, Seek, SeekFrom};

use crate::error::{ChartError, Result};

/// Default size of the sliding window in bytes.
pub const DEFAULT_WINDOW: usize = 64 * 1024;

/// Kind and payload of a lexed token.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenKind {
    /// `{`
    LeftBrace,
    /// `}`
    RightBrace,
    /// `[`
    LeftBracket,
    /// `]`
    RightBracket,
    /// `,`
    Comma,
    /// `:`
    Colon,
    /// A double-quoted string. The bytes between the quotes are kept verbatim, escapes are not processed.
    String(String),
    /// A numeric literal, kept as its source text so the destination type decides how to parse it.
    Number(String),
    /// `null`
    Null,
    /// `true` or `false`.
    Bool(bool),
}

impl TokenKind {
    /// Whether this token opens a block.
    #[must_use]
    pub const fn is_open(&self) -> bool {
        matches!(self, Self::LeftBrace | Self::LeftBracket)
    }

    /// Whether this token closes a block.
    #[must_use]
    pub const fn is_close(&self) -> bool {
        matches!(self, Self::RightBrace | Self::RightBracket)
    }

    /// Short human readable description, used in error messages.
    #[must_use]
    pub fn describe(&self) -> String {
        match self {
            Self::LeftBrace => "`{`".into(),
            Self::RightBrace => "`}`".into(),
            Self::LeftBracket => "`[`".into(),
            Self::RightBracket => "`]`".into(),
            Self::Comma => "`,`".into(),
            Self::Colon => "`:`".into(),
            Self::String(s) => format!("string \"{s}\""),
            Self::Number(n) => format!("number {n}"),
            Self::Null => "`null`".into(),
            Self::Bool(b) => format!("`{b}`"),
        }
    }
}

/// A token together with the byte offset it started at.
#[derive(Debug, Clone, PartialEq)]
pub struct Token {
    /// What was lexed.
    pub kind: TokenKind,
    /// Byte offset of the first byte of the token.
    pub offset: u64,
}

impl Token {
    /// The string payload, if this is a string token.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match &self.kind {
            TokenKind::String(s) => Some(s),
            _ => None,
        }
    }

    /// Parses a numeric token into `T`.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::InvalidNumber`] when the token is not a number or does not fit `T`.
    pub fn parse_number<T: std::str::FromStr>(&self) -> Result<T> {
        match &self.kind {
            TokenKind::Number(text) => text.parse().map_err(|_| ChartError::InvalidNumber {
                text: text.clone(),
                offset: self.offset,
            }),
            other => Err(ChartError::InvalidNumber {
                text: other.describe(),
                offset: self.offset,
            }),
        }
    }
}

const fn is_whitespace(byte: u8) -> bool {
    matches!(byte, b' ' | b'\t' | b'\n' | b'\r' | 0)
}

const fn is_delimiter(byte: u8) -> bool {
    is_whitespace(byte) || matches!(byte, b'{' | b'}' | b'[' | b']' | b',' | b':' | b'"')
}

/// A resumable lexer over a seekable byte source.
pub struct TokenStream<R> {
    source: R,
    window: Vec<u8>,
    /// Absolute offset of `window[0]`.
    window_start: u64,
    /// Number of valid bytes in `window`.
    window_len: usize,
    /// Absolute cursor offset.
    pos: u64,
    /// Total length of the source, discovered lazily when a refill reads nothing.
    source_end: Option<u64>,
}

impl<'a> TokenStream<Cursor<&'a [u8]>> {
    /// Creates a stream over an in-memory buffer.
    #[must_use]
    pub fn from_bytes(bytes: &'a [u8]) -> Self {
        Self::with_window(Cursor::new(bytes), DEFAULT_WINDOW)
    }
}

impl<R: Read + Seek> TokenStream<R> {
    /// Creates a stream over `source` using the default window size.
    pub fn new(source: R) -> Self {
        Self::with_window(source, DEFAULT_WINDOW)
    }

    /// Creates a stream over `source` buffering at most `window` bytes at a time.
    pub fn with_window(source: R, window: usize) -> Self {
        Self {
            source,
            window: vec![0; window.max(16)],
            window_start: 0,
            window_len: 0,
            pos: 0,
            source_end: None,
        }
    }

    /// Current absolute byte offset of the cursor.
    #[must_use]
    pub const fn position(&self) -> u64 {
        self.pos
    }

    /// Moves the cursor to the absolute byte offset `pos`.
    ///
    /// Jumps inside the buffered window are free. Jumps outside it are served
    /// lazily by re-reading the source at the target on the next access.
    pub const fn seek(&mut self, pos: u64) {
        self.pos = pos;
    }

    fn in_window(&self, pos: u64) -> bool {
        pos >= self.window_start && pos < self.window_start + self.window_len as u64
    }

    fn refill(&mut self, at: u64) -> Result<()> {
        if self.source_end.is_some_and(|end| at >= end) {
            self.window_start = at;
            self.window_len = 0;
            return Ok(());
        }
        self.source.seek(SeekFrom::Start(at))?;
        let mut filled = 0;
        while filled < self.window.len() {
            let read = self.source.read(&mut self.window[filled..])?;
            if read == 0 {
                self.source_end = Some(at + filled as u64);
                break;
            }
            filled += read;
        }
        self.window_start = at;
        self.window_len = filled;
        Ok(())
    }

    /// Returns the byte under the cursor without consuming it, or `None` at the end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Io`] if the source cannot be read.
    pub fn peek_char(&mut self) -> Result<Option<u8>> {
        if !self.in_window(self.pos) {
            self.refill(self.pos)?;
            if !self.in_window(self.pos) {
                return Ok(None);
            }
        }
        Ok(Some(self.window[(self.pos - self.window_start) as usize]))
    }

    /// Consumes and returns the byte under the cursor, or `None` at the end of input.
    ///
    /// # Errors
    ///
    /// Returns [`ChartError::Io`] if the source cannot be read.
    pub fn next_char(&mut self) -> Result<Option<u8>> {
        let byte = self.peek_char()?;
        if byte.is_some() {
            self.pos += 1;
        }
        Ok(byte)
    }

    fn skip_whitespace(&mut self) -> Result<()> {
        while let Some(byte) = self.peek_char()? {
            if !is_whitespace(byte) {
                break;
            }
            self.pos += 1;
        }
        Ok(())
    }

    /// Lexes the next token, or returns `None` at the end of input.
    ///
    /// # Errors
    ///
    /// - [`ChartError::Syntax`] on a byte that cannot start a token.
    /// - [`ChartError::UnexpectedEndOfInput`] when a string or number is cut off by the end of input.
    pub fn next_token(&mut self) -> Result<Option<Token>> {
        self.skip_whitespace()?;
        let offset = self.pos;
        let Some(byte) = self.next_char()? else {
            return Ok(None);
        };
        let kind = match byte {
            b'{' => TokenKind::LeftBrace,
            b'}' => TokenKind::RightBrace,
            b'[' => TokenKind::LeftBracket,
            b']' => TokenKind::RightBracket,
            b',' => TokenKind::Comma,
            b':' => TokenKind::Colon,
            b'"' => TokenKind::String(self.lex_string()?),
            b'-' | b'0'..=b'9' => TokenKind::Number(self.lex_number(byte)?),
            b'n' => {
                self.expect_keyword(b"ull", offset)?;
                TokenKind::Null
            }
            b't' => {
                self.expect_keyword(b"rue", offset)?;
                TokenKind::Bool(true)
            }
            b'f' => {
                self.expect_keyword(b"alse", offset)?;
                TokenKind::Bool(false)
            }
            other => return Err(ChartError::Syntax { byte: other, offset }),
        };
        Ok(Some(Token { kind, offset }))
    }

    fn lex_string(&mut self) -> Result<String> {
        let mut bytes = Vec::new();
        loop {
            match self.next_char()? {
                Some(b'"') => break,
                Some(byte) => bytes.push(byte),
                None => return Err(ChartError::UnexpectedEndOfInput { offset: self.pos }),
            }
        }
        Ok(String::from_utf8(bytes).unwrap_or_else(|err| String::from_utf8_lossy(err.as_bytes()).into_owned()))
    }

    fn lex_number(&mut self, first: u8) -> Result<String> {
        let mut text = String::new();
        text.push(char::from(first));
        let mut seen_dot = false;
        let mut seen_exp = false;
        loop {
            let offset = self.pos;
            let Some(byte) = self.peek_char()? else {
                return Err(ChartError::UnexpectedEndOfInput { offset });
            };
            match byte {
                b'0'..=b'9' => {}
                b'.' if !seen_dot && !seen_exp => seen_dot = true,
                b'e' | b'E' if !seen_exp => seen_exp = true,
                b'+' | b'-' if text.ends_with(['e', 'E']) => {}
                byte if is_delimiter(byte) => break,
                byte => return Err(ChartError::Syntax { byte, offset }),
            }
            text.push(char::from(byte));
            self.pos += 1;
        }
        if text == "-" {
            return Err(ChartError::InvalidNumber {
                text,
                offset: self.pos - 1,
            });
        }
        Ok(text)
    }

    fn expect_keyword(&mut self, rest: &[u8], start: u64) -> Result<()> {
        for &expected in rest {
            let offset = self.pos;
            match self.next_char()? {
                Some(byte) if byte == expected => {}
                Some(byte) => return Err(ChartError::Syntax { byte, offset }),
                None => return Err(ChartError::UnexpectedEndOfInput { offset: start }),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use pretty_assertions::assert_eq;

    use super::*;

    fn kinds(src: &str) -> Vec<TokenKind> {
        let mut stream = TokenStream::from_bytes(src.as_bytes());
        let mut out = vec![];
        while let Some(token) = stream.next_token().expect("must lex") {
            out.push(token.kind);
        }
        out
    }

    #[test]
    fn lexes_punctuation_strings_and_numbers() {
        assert_eq!(
            kinds("{\"bpm\": [120.5, -3, null]}\0"),
            vec![
                TokenKind::LeftBrace,
                TokenKind::String("bpm".into()),
                TokenKind::Colon,
                TokenKind::LeftBracket,
                TokenKind::Number("120.5".into()),
                TokenKind::Comma,
                TokenKind::Number("-3".into()),
                TokenKind::Comma,
                TokenKind::Null,
                TokenKind::RightBracket,
                TokenKind::RightBrace,
            ]
        );
    }

    #[test]
    fn strings_are_kept_verbatim() {
        assert_eq!(
            kinds(r#"["a\nb"]"#),
            vec![
                TokenKind::LeftBracket,
                TokenKind::String(r"a\nb".into()),
                TokenKind::RightBracket,
            ]
        );
    }

    #[test]
    fn second_dot_is_a_syntax_error() {
        let mut stream = TokenStream::from_bytes(b"[1.2.3]");
        stream.next_token().expect("bracket");
        let err = stream.next_token().expect_err("must fail");
        assert!(matches!(err, ChartError::Syntax { byte: b'.', offset: 4 }));
    }

    #[test]
    fn unknown_byte_reports_offset() {
        let mut stream = TokenStream::from_bytes(b"  @");
        let err = stream.next_token().expect_err("must fail");
        assert!(matches!(err, ChartError::Syntax { byte: b'@', offset: 2 }));
    }

    #[test]
    fn unterminated_literals_hit_end_of_input() {
        let mut stream = TokenStream::from_bytes(b"\"abc");
        assert!(matches!(
            stream.next_token(),
            Err(ChartError::UnexpectedEndOfInput { .. })
        ));
        let mut stream = TokenStream::from_bytes(b"12");
        assert!(matches!(
            stream.next_token(),
            Err(ChartError::UnexpectedEndOfInput { .. })
        ));
    }

    #[test]
    fn seek_outside_small_window_rereads_source() {
        let src = format!("[{}\"tail\"]", " ".repeat(100));
        let mut stream = TokenStream::with_window(Cursor::new(src.as_bytes()), 16);
        assert_eq!(stream.next_token().expect("lex").map(|t| t.kind), Some(TokenKind::LeftBracket));
        let token = stream.next_token().expect("lex").expect("string");
        assert_eq!(token.kind, TokenKind::String("tail".into()));
        assert_eq!(token.offset, 101);

        stream.seek(0);
        assert_eq!(stream.peek_char().expect("peek"), Some(b'['));
        stream.seek(token.offset);
        assert_eq!(stream.next_char().expect("next"), Some(b'"'));
    }
}
