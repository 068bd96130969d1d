use std::io::Cursor;

use judgeline::{
    ChartError,
    json::{SkipMode, TokenKind, TokenStream, Walker},
};

fn string(text: &str) -> TokenKind {
    TokenKind::String(text.into())
}

#[test]
fn skip_block_lands_after_the_matching_close() {
    let mut walker = Walker::from_bytes(br#"{"a":{"b":1},"c":2}"#).expect("first token");
    walker.enter_block().expect("outer object");
    assert_eq!(walker.advance().expect("key").kind, string("a"));
    assert_eq!(walker.advance().expect("colon").kind, TokenKind::Colon);

    walker.skip_block(SkipMode::Fast).expect("skip inner object");
    assert_eq!(walker.current().map(|t| &t.kind), Some(&TokenKind::Comma));
    assert_eq!(walker.depth(), 1);

    assert!(walker.locate_key("c", true).expect("scan"));
    let value = walker.advance().expect("value");
    assert_eq!(value.kind, TokenKind::Number("2".into()));
    assert_eq!(value.offset, 17);
}

#[test]
fn locate_key_never_sees_nested_keys() {
    let mut walker = Walker::from_bytes(br#"{"a":{"c":1},"b":2}"#).expect("first token");
    walker.enter_block().expect("outer object");
    assert!(!walker.locate_key("c", true).expect("scan"));
    assert_eq!(walker.current().map(|t| &t.kind), Some(&TokenKind::RightBrace));
}

#[test]
fn small_windows_read_the_same_tokens() {
    let source = br#"{"title": "a rather long string crossing several windows", "list": [1, 2.5, -3e2, null, true]}"#;
    let tokens = |window| {
        let mut stream = TokenStream::with_window(Cursor::new(&source[..]), window);
        let mut kinds = Vec::new();
        while let Some(token) = stream.next_token().expect("lex") {
            kinds.push((token.kind, token.offset));
        }
        kinds
    };
    let small = tokens(16);
    assert_eq!(small, tokens(1 << 16));
    assert!(small.contains(&(TokenKind::Number("-3e2".into()), 76)));
}

#[test]
fn skipping_across_window_boundaries() {
    let source = br#"{"skip": {"x": [[1, 2], [3, {"y": "]]"}]], "z": {}}, "keep": 7}"#;
    let stream = TokenStream::with_window(Cursor::new(&source[..]), 16);
    let mut walker = Walker::new(stream).expect("first token");
    walker.enter_block().expect("outer object");
    assert!(walker.locate_key("keep", true).expect("scan"));
    assert_eq!(walker.advance().expect("value").kind, TokenKind::Number("7".into()));
}

#[test]
fn checked_skip_reports_mismatched_brackets() {
    let mut walker = Walker::from_bytes(br#"{"a": [1, 2}}"#).expect("first token");
    walker.skip_block(SkipMode::Fast).expect("fast mode only counts depth");
    assert!(walker.current().is_none());

    let mut walker = Walker::from_bytes(br#"{"a": [1, 2}}"#).expect("first token");
    let err = walker.skip_block(SkipMode::Checked).expect_err("mismatch");
    assert!(matches!(
        err,
        ChartError::MismatchedBrackets {
            open: '[',
            close: '}',
            offset: 11
        }
    ));
}

#[test]
fn unterminated_block_is_end_of_input() {
    let mut walker = Walker::from_bytes(br#"{"a": [1, 2"#).expect("first token");
    assert!(matches!(
        walker.skip_block(SkipMode::Fast),
        Err(ChartError::UnexpectedEndOfInput { offset: 11 })
    ));
}
