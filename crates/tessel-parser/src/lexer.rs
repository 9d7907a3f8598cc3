//! Lexical analyzer for Tessel source text.
//!
//! The lexer converts source text into a materialized sequence of [`Token`]s,
//! each stamped with its [`SourceLocation`]. Lexing stops at the first
//! malformed token; the returned sequence always ends with
//! [`TokenKind::EndOfStream`].

use std::{num::IntErrorKind, sync::Arc};

use log::trace;
use winnow::{
    Parser as _,
    combinator::{alt, cut_err, delimited, preceded, repeat, terminated},
    error::{AddContext, ContextError, ErrMode, ModalResult},
    stream::{LocatingSlice, Location, Stream},
    token::{literal, none_of, one_of, take_until, take_while},
};

use crate::{
    error::{Diagnostic, ErrorKind, Result},
    span::{Position, SourceLocation, Span},
    tokens::{NumericSuffix, Token, TokenKind, TokenValue},
};

/// Error context attached to winnow failures.
///
/// The reported location covers `start` up to the position the error was
/// detected at.
#[derive(Debug, Clone, PartialEq, Eq)]
struct LexerDiagnostic {
    kind: ErrorKind,
    start: usize,
}

type Input<'a> = LocatingSlice<&'a str>;
type IResult<O> = ModalResult<O, ContextError<LexerDiagnostic>>;
type Lexeme<'a> = (TokenKind, TokenValue<'a>);

fn cut<O>(input: &Input<'_>, kind: ErrorKind, start: usize) -> IResult<O> {
    Err(ErrMode::Cut(ContextError::new().add_context(
        input,
        &input.checkpoint(),
        LexerDiagnostic { kind, start },
    )))
}

fn is_word_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || c == '_'
}

fn whitespace(input: &mut Input<'_>) -> IResult<()> {
    take_while(1.., char::is_whitespace)
        .void()
        .parse_next(input)
}

fn line_comment(input: &mut Input<'_>) -> IResult<()> {
    preceded("//", take_while(0.., |c| c != '\n'))
        .void()
        .parse_next(input)
}

/// Block comments do not nest; the first `*/` closes the comment.
fn block_comment(input: &mut Input<'_>) -> IResult<()> {
    let start = input.current_token_start();
    preceded(
        "/*",
        cut_err(terminated(take_until(0.., "*/"), "*/")).context(LexerDiagnostic {
            kind: ErrorKind::UnfinishedComment,
            start,
        }),
    )
    .void()
    .parse_next(input)
}

fn trivia(input: &mut Input<'_>) -> IResult<()> {
    repeat(0.., alt((whitespace, line_comment, block_comment))).parse_next(input)
}

fn string_escape_unicode(input: &mut Input<'_>) -> IResult<char> {
    preceded(
        'u',
        delimited('{', take_while(1..=6, |c: char| c.is_ascii_hexdigit()), '}'),
    )
    .verify_map(|hex: &str| u32::from_str_radix(hex, 16).ok().and_then(char::from_u32))
    .parse_next(input)
}

fn string_escape_char(input: &mut Input<'_>) -> IResult<char> {
    one_of(['n', 'r', 't', '\\', '"', '\'', '0'])
        .map(|c| match c {
            'n' => '\n',
            'r' => '\r',
            't' => '\t',
            '0' => '\0',
            other => other,
        })
        .parse_next(input)
}

/// Parses an escape sequence starting with a backslash.
fn string_escape(input: &mut Input<'_>) -> IResult<char> {
    let start = input.current_token_start();
    preceded(
        '\\',
        cut_err(alt((string_escape_char, string_escape_unicode))).context(LexerDiagnostic {
            kind: ErrorKind::UnrecognizedToken,
            start,
        }),
    )
    .parse_next(input)
}

/// Parses a double-quoted string literal, resolving escapes.
///
/// A newline or end of input before the closing quote is an unfinished
/// string.
fn string_literal<'a>(input: &mut Input<'a>) -> IResult<Lexeme<'a>> {
    let string_char = none_of(['"', '\\', '\n', '\r']);
    let string_content =
        repeat(0.., alt((string_escape, string_char))).fold(String::new, |mut acc, c| {
            acc.push(c);
            acc
        });

    let start = input.current_token_start();
    preceded(
        '"',
        cut_err(terminated(string_content, '"')).context(LexerDiagnostic {
            kind: ErrorKind::UnfinishedString,
            start,
        }),
    )
    .map(|s| (TokenKind::StringValue, TokenValue::String(s)))
    .parse_next(input)
}

/// Identifiers and keywords.
fn word<'a>(input: &mut Input<'a>) -> IResult<Lexeme<'a>> {
    (
        one_of(|c: char| c.is_ascii_alphabetic() || c == '_'),
        take_while(0.., is_word_char),
    )
        .take()
        .map(|word: &'a str| match TokenKind::keyword(word) {
            Some(keyword) => (keyword, TokenValue::None),
            None => (TokenKind::Identifier, TokenValue::Identifier(word)),
        })
        .parse_next(input)
}

/// Two-character operators. Tried before [`single_char_operator`].
fn multi_char_operator(input: &mut Input<'_>) -> IResult<TokenKind> {
    alt((
        literal("->").value(TokenKind::Arrow),
        literal("==").value(TokenKind::Equal),
        literal("!=").value(TokenKind::NotEqual),
        literal("<=").value(TokenKind::LessThanEqual),
        literal(">=").value(TokenKind::GreaterThanEqual),
        literal("&&").value(TokenKind::LogicalAnd),
        literal("||").value(TokenKind::LogicalOr),
        literal("<<").value(TokenKind::ShiftLeft),
        literal(">>").value(TokenKind::ShiftRight),
    ))
    .parse_next(input)
}

fn compound_assign(input: &mut Input<'_>) -> IResult<TokenKind> {
    alt((
        literal("+=").value(TokenKind::PlusAssign),
        literal("-=").value(TokenKind::MinusAssign),
        literal("*=").value(TokenKind::MultiplyAssign),
        literal("/=").value(TokenKind::DivideAssign),
        literal("%=").value(TokenKind::ModuloAssign),
    ))
    .parse_next(input)
}

fn single_char_operator(input: &mut Input<'_>) -> IResult<TokenKind> {
    alt((
        alt((
            '+'.value(TokenKind::Plus),
            '-'.value(TokenKind::Minus),
            '*'.value(TokenKind::Multiply),
            '/'.value(TokenKind::Divide),
            '%'.value(TokenKind::Modulo),
            '='.value(TokenKind::Assign),
        )),
        alt((
            '<'.value(TokenKind::LessThan),
            '>'.value(TokenKind::GreaterThan),
            '!'.value(TokenKind::Not),
            '&'.value(TokenKind::BitwiseAnd),
            '|'.value(TokenKind::BitwiseOr),
            '^'.value(TokenKind::BitwiseXor),
            '~'.value(TokenKind::BitwiseNot),
        )),
    ))
    .parse_next(input)
}

fn punctuation(input: &mut Input<'_>) -> IResult<TokenKind> {
    alt((
        alt((
            '.'.value(TokenKind::Dot),
            ','.value(TokenKind::Comma),
            ':'.value(TokenKind::Colon),
            ';'.value(TokenKind::Semicolon),
        )),
        alt((
            '('.value(TokenKind::OpenParenthesis),
            ')'.value(TokenKind::ClosingParenthesis),
            '['.value(TokenKind::OpenSquareBracket),
            ']'.value(TokenKind::ClosingSquareBracket),
            '{'.value(TokenKind::OpenCurlyBracket),
            '}'.value(TokenKind::ClosingCurlyBracket),
        )),
    ))
    .parse_next(input)
}

/// Operators and punctuation, longest match first.
fn operator<'a>(input: &mut Input<'a>) -> IResult<Lexeme<'a>> {
    alt((
        multi_char_operator,
        compound_assign,
        single_char_operator,
        punctuation,
    ))
    .map(|kind| (kind, TokenValue::None))
    .parse_next(input)
}

/// Length in bytes of the numeric literal at the start of `text`.
///
/// The scan is permissive: everything that could belong to the literal
/// (digits, a fraction, an exponent, a suffix, stray letters) is taken so
/// that [`parse_number`] can reject malformed literals as a whole.
fn scan_number(text: &str) -> usize {
    let bytes = text.as_bytes();
    let is_word = |b: &u8| b.is_ascii_alphanumeric() || *b == b'_';
    let digit_at = |i: usize| bytes.get(i).is_some_and(u8::is_ascii_digit);

    if bytes.len() > 1 && bytes[0] == b'0' && matches!(bytes[1], b'x' | b'X' | b'b' | b'B' | b'o' | b'O')
    {
        let mut i = 2;
        while let Some(b) = bytes.get(i) {
            let fraction = *b == b'.' && bytes.get(i + 1).is_some_and(u8::is_ascii_alphanumeric);
            if !is_word(b) && !fraction {
                break;
            }
            i += 1;
        }
        return i;
    }

    let mut i = 0;
    while digit_at(i) {
        i += 1;
    }
    if bytes.get(i) == Some(&b'.') && digit_at(i + 1) {
        i += 1;
        while digit_at(i) {
            i += 1;
        }
    }
    if matches!(bytes.get(i), Some(b'e' | b'E')) {
        let mut j = i + 1;
        if matches!(bytes.get(j), Some(b'+' | b'-')) {
            j += 1;
        }
        if digit_at(j) {
            i = j;
            while digit_at(i) {
                i += 1;
            }
        }
    }
    while bytes.get(i).is_some_and(is_word) {
        i += 1;
    }
    i
}

fn integer_error(kind: &IntErrorKind) -> ErrorKind {
    match kind {
        IntErrorKind::PosOverflow | IntErrorKind::NegOverflow => ErrorKind::NumberOutOfRange,
        _ => ErrorKind::BadNumber,
    }
}

fn integer_token(value: i64, suffix: Option<NumericSuffix>) -> std::result::Result<Lexeme<'static>, ErrorKind> {
    let in_range = match suffix {
        Some(NumericSuffix::I32) => value <= i64::from(i32::MAX),
        Some(NumericSuffix::U32) => value <= i64::from(u32::MAX),
        _ => true,
    };
    if !in_range {
        return Err(ErrorKind::NumberOutOfRange);
    }
    Ok((TokenKind::IntegerValue, TokenValue::Integer { value, suffix }))
}

fn float_token(value: f64, suffix: Option<NumericSuffix>) -> std::result::Result<Lexeme<'static>, ErrorKind> {
    if !value.is_finite() {
        return Err(ErrorKind::NumberOutOfRange);
    }
    if suffix == Some(NumericSuffix::F32) && value.abs() > f64::from(f32::MAX) {
        return Err(ErrorKind::NumberOutOfRange);
    }
    Ok((TokenKind::FloatingPointValue, TokenValue::Float { value, suffix }))
}

/// Converts the text of a numeric literal into a token.
///
/// Literals are never negative: a leading `-` is a separate token.
pub(crate) fn parse_number(text: &str) -> std::result::Result<Lexeme<'static>, ErrorKind> {
    let (body, suffix) = match text.rfind('_') {
        Some(pos) => match NumericSuffix::from_text(&text[pos + 1..]) {
            Some(suffix) => (&text[..pos], Some(suffix)),
            None => return Err(ErrorKind::BadNumber),
        },
        None => (text, None),
    };
    if body.is_empty() || body.contains('_') {
        return Err(ErrorKind::BadNumber);
    }

    let (radix, digits) = match body.get(..2) {
        Some("0x" | "0X") => (16, &body[2..]),
        Some("0b" | "0B") => (2, &body[2..]),
        Some("0o" | "0O") => (8, &body[2..]),
        _ => (10, body),
    };

    if radix != 10 {
        let has_exponent = radix != 16 && digits.contains(|c| matches!(c, 'e' | 'E'));
        if digits.contains('.') || has_exponent || suffix.is_some_and(|s| s.is_floating_point()) {
            return Err(ErrorKind::UnexpectedFloatingPointBase(radix));
        }
        let value = i64::from_str_radix(digits, radix).map_err(|e| integer_error(e.kind()))?;
        return integer_token(value, suffix);
    }

    if body.contains(|c| matches!(c, '.' | 'e' | 'E')) {
        if suffix.is_some_and(|s| !s.is_floating_point()) {
            return Err(ErrorKind::BadNumber);
        }
        let value: f64 = body.parse().map_err(|_| ErrorKind::BadNumber)?;
        return float_token(value, suffix);
    }

    if !body.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ErrorKind::BadNumber);
    }
    let value: i64 = body.parse().map_err(|e: std::num::ParseIntError| integer_error(e.kind()))?;
    match suffix {
        Some(NumericSuffix::F32 | NumericSuffix::F64) => float_token(value as f64, suffix),
        _ => integer_token(value, suffix),
    }
}

fn number<'a>(input: &mut Input<'a>) -> IResult<Lexeme<'a>> {
    let start = input.current_token_start();
    if !input.peek_finish().starts_with(|c: char| c.is_ascii_digit()) {
        return Err(ErrMode::Backtrack(ContextError::new()));
    }

    let len = scan_number(input.peek_finish());
    let text = input.next_slice(len);
    match parse_number(text) {
        Ok(lexeme) => Ok(lexeme),
        Err(kind) => cut(input, kind, start),
    }
}

fn token<'a>(input: &mut Input<'a>) -> IResult<Lexeme<'a>> {
    alt((string_literal, number, word, operator)).parse_next(input)
}

/// Maps byte offsets to 1-based line and column numbers.
struct LineIndex<'a> {
    source: &'a str,
    line_starts: Vec<usize>,
}

impl<'a> LineIndex<'a> {
    fn new(source: &'a str) -> Self {
        let line_starts = std::iter::once(0)
            .chain(source.match_indices('\n').map(|(i, _)| i + 1))
            .collect();
        Self {
            source,
            line_starts,
        }
    }

    fn position(&self, offset: usize) -> Position {
        let line = self.line_starts.partition_point(|&start| start <= offset);
        let line_start = self.line_starts[line.saturating_sub(1)];
        let column = self
            .source
            .get(line_start..offset)
            .map_or(0, |text| text.chars().count());
        Position::new(line as u32, column as u32 + 1)
    }

    fn location(&self, file: &Option<Arc<str>>, range: std::ops::Range<usize>) -> SourceLocation {
        SourceLocation::new(
            file.clone(),
            self.position(range.start),
            self.position(range.end),
            Span::new(range),
        )
    }
}

/// Converts a winnow error raised at `error_pos` into a diagnostic.
///
/// The first context wins; it is the innermost failure.
fn convert_err_mode(
    err: ErrMode<ContextError<LexerDiagnostic>>,
    token_start: usize,
    error_pos: usize,
    source: &str,
    lines: &LineIndex<'_>,
    file: &Option<Arc<str>>,
) -> Diagnostic {
    let context_error = match err {
        ErrMode::Backtrack(ctx) | ErrMode::Cut(ctx) => ctx,
        ErrMode::Incomplete(_) => ContextError::new(),
    };

    if let Some(LexerDiagnostic { kind, start }) = context_error.context().next() {
        let end = error_pos.max(*start + 1).min(source.len().max(*start));
        return Diagnostic::new(kind.clone(), lines.location(file, *start..end));
    }

    let c = source[token_start..].chars().next().unwrap_or(' ');
    let kind = if c.is_ascii_graphic() {
        ErrorKind::UnrecognizedToken
    } else {
        ErrorKind::UnrecognizedChar
    };
    Diagnostic::new(
        kind,
        lines.location(file, token_start..token_start + c.len_utf8()),
    )
}

/// Tokenizes `source` in one forward pass.
///
/// `file_path` is only used to stamp token locations.
///
/// # Errors
///
/// Returns the first lexer-category diagnostic encountered.
///
/// # Example
///
/// ```
/// use tessel_parser::{lexer::tokenize, tokens::TokenKind};
///
/// let tokens = tokenize("let x = 0x10;", None).unwrap();
/// let kinds: Vec<_> = tokens.iter().map(|t| t.kind).collect();
/// assert_eq!(
///     kinds,
///     vec![
///         TokenKind::Let,
///         TokenKind::Identifier,
///         TokenKind::Assign,
///         TokenKind::IntegerValue,
///         TokenKind::Semicolon,
///         TokenKind::EndOfStream,
///     ]
/// );
/// ```
pub fn tokenize<'src>(source: &'src str, file_path: Option<&str>) -> Result<Vec<Token<'src>>> {
    let file: Option<Arc<str>> = file_path.map(Arc::from);
    let lines = LineIndex::new(source);
    let mut input = LocatingSlice::new(source);
    let mut tokens = Vec::new();

    loop {
        let start = input.current_token_start();
        if let Err(e) = trivia(&mut input) {
            let error_pos = input.current_token_start();
            return Err(convert_err_mode(e, start, error_pos, source, &lines, &file));
        }
        if input.is_empty() {
            break;
        }

        let start = input.current_token_start();
        match token(&mut input) {
            Ok((kind, value)) => {
                let end = input.current_token_start();
                tokens.push(Token::new(kind, value, lines.location(&file, start..end)));
            }
            Err(e) => {
                let error_pos = input.current_token_start();
                return Err(convert_err_mode(e, start, error_pos, source, &lines, &file));
            }
        }
    }

    let end = source.len();
    tokens.push(Token::new(
        TokenKind::EndOfStream,
        TokenValue::None,
        lines.location(&file, end..end),
    ));

    trace!(count = tokens.len(); "Tokenized source");
    Ok(tokens)
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn kinds(source: &str) -> Vec<TokenKind> {
        tokenize(source, None)
            .unwrap()
            .into_iter()
            .map(|t| t.kind)
            .collect()
    }

    fn single_value(source: &str) -> TokenValue<'_> {
        let tokens = tokenize(source, None).unwrap();
        assert_eq!(tokens.len(), 2, "expected one token for {source}");
        tokens[0].value.clone()
    }

    fn error_kind(source: &str) -> ErrorKind {
        tokenize(source, None).unwrap_err().kind().clone()
    }

    #[test]
    fn test_keywords_and_identifiers() {
        assert_eq!(
            kinds("fn main external externals _x"),
            vec![
                TokenKind::Fn,
                TokenKind::Identifier,
                TokenKind::External,
                TokenKind::Identifier,
                TokenKind::Identifier,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_operators_longest_match() {
        assert_eq!(
            kinds("a->b <= c << d <<= e"),
            vec![
                TokenKind::Identifier,
                TokenKind::Arrow,
                TokenKind::Identifier,
                TokenKind::LessThanEqual,
                TokenKind::Identifier,
                TokenKind::ShiftLeft,
                TokenKind::Identifier,
                TokenKind::ShiftLeft,
                TokenKind::Assign,
                TokenKind::Identifier,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_every_operator_group() {
        use TokenKind::*;
        assert_eq!(
            kinds("== != >= && || >> += -= *= /= %="),
            vec![
                Equal, NotEqual, GreaterThanEqual, LogicalAnd, LogicalOr, ShiftRight, PlusAssign,
                MinusAssign, MultiplyAssign, DivideAssign, ModuloAssign, EndOfStream,
            ]
        );
        assert_eq!(
            kinds("+ - * / % = < > ! & | ^ ~"),
            vec![
                Plus, Minus, Multiply, Divide, Modulo, Assign, LessThan, GreaterThan, Not,
                BitwiseAnd, BitwiseOr, BitwiseXor, BitwiseNot, EndOfStream,
            ]
        );
        assert_eq!(
            kinds(".,:;()[]{}"),
            vec![
                Dot, Comma, Colon, Semicolon, OpenParenthesis, ClosingParenthesis,
                OpenSquareBracket, ClosingSquareBracket, OpenCurlyBracket, ClosingCurlyBracket,
                EndOfStream,
            ]
        );
    }

    #[test]
    fn test_comments_are_skipped() {
        assert_eq!(
            kinds("a // line\n/* block\n comment */ b"),
            vec![TokenKind::Identifier, TokenKind::Identifier, TokenKind::EndOfStream]
        );
        assert_eq!(kinds(""), vec![TokenKind::EndOfStream]);
    }

    #[test]
    fn test_unfinished_comment() {
        assert_eq!(error_kind("a /* never closed"), ErrorKind::UnfinishedComment);
    }

    #[test]
    fn test_integer_literals() {
        assert_eq!(
            single_value("42"),
            TokenValue::Integer {
                value: 42,
                suffix: None
            }
        );
        assert_eq!(
            single_value("0xFF"),
            TokenValue::Integer {
                value: 255,
                suffix: None
            }
        );
        assert_eq!(
            single_value("0b101"),
            TokenValue::Integer {
                value: 5,
                suffix: None
            }
        );
        assert_eq!(
            single_value("0o17_u32"),
            TokenValue::Integer {
                value: 15,
                suffix: Some(NumericSuffix::U32)
            }
        );
    }

    #[test]
    fn test_float_literals() {
        assert_eq!(
            single_value("1.5"),
            TokenValue::Float {
                value: 1.5,
                suffix: None
            }
        );
        assert_eq!(
            single_value("2e3"),
            TokenValue::Float {
                value: 2000.0,
                suffix: None
            }
        );
        assert_eq!(
            single_value("1.0e-2_f64"),
            TokenValue::Float {
                value: 0.01,
                suffix: Some(NumericSuffix::F64)
            }
        );
        assert_eq!(
            single_value("3_f32"),
            TokenValue::Float {
                value: 3.0,
                suffix: Some(NumericSuffix::F32)
            }
        );
    }

    #[test]
    fn test_member_access_on_integer_is_not_a_float() {
        assert_eq!(
            kinds("1.x"),
            vec![
                TokenKind::IntegerValue,
                TokenKind::Dot,
                TokenKind::Identifier,
                TokenKind::EndOfStream,
            ]
        );
    }

    #[test]
    fn test_bad_numbers() {
        assert_eq!(error_kind("2e"), ErrorKind::BadNumber);
        assert_eq!(error_kind("1.5_i32"), ErrorKind::BadNumber);
        assert_eq!(error_kind("12abc"), ErrorKind::BadNumber);
        assert_eq!(error_kind("0b102"), ErrorKind::BadNumber);
        assert_eq!(error_kind("0x"), ErrorKind::BadNumber);
        assert_eq!(error_kind("1_u64"), ErrorKind::BadNumber);
    }

    #[test]
    fn test_number_out_of_range() {
        assert_eq!(error_kind("99999999999999999999"), ErrorKind::NumberOutOfRange);
        assert_eq!(error_kind("3000000000_i32"), ErrorKind::NumberOutOfRange);
        assert_eq!(error_kind("5000000000_u32"), ErrorKind::NumberOutOfRange);
        assert_eq!(error_kind("1e400"), ErrorKind::NumberOutOfRange);
        assert_eq!(error_kind("1e39_f32"), ErrorKind::NumberOutOfRange);
    }

    #[test]
    fn test_floating_point_requires_base_10() {
        assert_eq!(error_kind("0x1.5"), ErrorKind::UnexpectedFloatingPointBase(16));
        assert_eq!(error_kind("0b1.0"), ErrorKind::UnexpectedFloatingPointBase(2));
        assert_eq!(error_kind("0o7e2"), ErrorKind::UnexpectedFloatingPointBase(8));
        assert_eq!(error_kind("0x10_f32"), ErrorKind::UnexpectedFloatingPointBase(16));
    }

    #[test]
    fn test_string_literals() {
        assert_eq!(
            single_value(r#""hello \"world\"\n""#),
            TokenValue::String("hello \"world\"\n".to_string())
        );
        assert_eq!(
            single_value(r#""\u{1F602}""#),
            TokenValue::String("\u{1F602}".to_string())
        );
        assert_eq!(single_value(r#""""#), TokenValue::String(String::new()));
    }

    #[test]
    fn test_string_errors() {
        assert_eq!(error_kind("\"unterminated"), ErrorKind::UnfinishedString);
        assert_eq!(error_kind("\"line\nbreak\""), ErrorKind::UnfinishedString);
        assert_eq!(error_kind(r#""bad \q escape""#), ErrorKind::UnrecognizedToken);
    }

    #[test]
    fn test_unrecognized_characters() {
        assert_eq!(error_kind("a @ b"), ErrorKind::UnrecognizedToken);
        assert_eq!(error_kind("a § b"), ErrorKind::UnrecognizedChar);
    }

    #[test]
    fn test_locations() {
        let tokens = tokenize("let\n  value = 1;", Some("shader.tsl")).unwrap();
        let value = &tokens[1];
        assert_eq!(value.location.file(), Some("shader.tsl"));
        assert_eq!(value.location.start(), Position::new(2, 3));
        assert_eq!(value.location.end(), Position::new(2, 8));
        assert_eq!(value.location.span(), Span::new(6..11));

        let err = tokenize("let x = 1;\nlet y = @;", Some("shader.tsl")).unwrap_err();
        assert_eq!(err.location().start(), Position::new(2, 9));
    }

    #[test]
    fn test_positions_strictly_increase() {
        let tokens = tokenize("fn main() { let x: vec3[f32] = vec3[f32](1.0, 2.0, 3.0); }", None).unwrap();
        for pair in tokens.windows(2) {
            assert!(pair[0].location.span().start() < pair[1].location.span().start());
        }
    }

    // ===================
    // Property Test Functions
    // ===================

    fn check_integer_recovered(value: u32, radix: u32) -> std::result::Result<(), TestCaseError> {
        let text = match radix {
            2 => format!("0b{value:b}"),
            8 => format!("0o{value:o}"),
            16 => format!("0x{value:X}"),
            _ => value.to_string(),
        };
        let tokens = tokenize(&text, None).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(
            &tokens[0].value,
            &TokenValue::Integer {
                value: i64::from(value),
                suffix: None
            }
        );
        Ok(())
    }

    fn check_float_recovered(value: f64) -> std::result::Result<(), TestCaseError> {
        let text = format!("{value:?}");
        let tokens = tokenize(&text, None).map_err(|e| TestCaseError::fail(e.to_string()))?;
        prop_assert_eq!(
            &tokens[0].value,
            &TokenValue::Float {
                value,
                suffix: None
            }
        );
        Ok(())
    }

    // ===================
    // Proptest Wrappers
    // ===================

    proptest! {
        #[test]
        fn integer_literals_are_recovered(value in any::<u32>(), radix in prop::sample::select(vec![2u32, 8, 10, 16])) {
            check_integer_recovered(value, radix)?;
        }

        #[test]
        fn float_literals_are_recovered(value in 0.0f64..1.0e30) {
            check_float_recovered(value)?;
        }

        #[test]
        fn non_decimal_floats_are_rejected(int in 0u32..1000, frac in 0u32..1000, radix in prop::sample::select(vec![2u32, 8, 16])) {
            let prefix = match radix { 2 => "0b", 8 => "0o", _ => "0x" };
            let text = format!("{prefix}{int:b}.{frac:b}");
            prop_assert_eq!(
                tokenize(&text, None).unwrap_err().kind().clone(),
                ErrorKind::UnexpectedFloatingPointBase(radix)
            );
        }
    }
}
