use std::fmt;

use winnow::stream::Location;

use crate::span::SourceLocation;

macro_rules! token_kinds {
    ( $( $kind:ident => $text:literal ),+ $(,)? ) => {
        /// The kind of a lexed token.
        ///
        /// Kinds display as their name (`Semicolon`, `Identifier`, ...), which
        /// is what `ExpectedToken` and `UnexpectedToken` diagnostics print.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
        pub enum TokenKind {
            $( $kind ),+
        }

        impl TokenKind {
            pub fn name(&self) -> &'static str {
                match self {
                    $( TokenKind::$kind => stringify!($kind) ),+
                }
            }

            /// Fixed source text of the kind; empty for kinds carrying data.
            pub fn text(&self) -> &'static str {
                match self {
                    $( TokenKind::$kind => $text ),+
                }
            }
        }
    };
}

token_kinds! {
    Alias => "alias",
    Arrow => "->",
    As => "as",
    Assign => "=",
    BitwiseAnd => "&",
    BitwiseNot => "~",
    BitwiseOr => "|",
    BitwiseXor => "^",
    BoolFalse => "false",
    BoolTrue => "true",
    Break => "break",
    ClosingCurlyBracket => "}",
    ClosingParenthesis => ")",
    ClosingSquareBracket => "]",
    Colon => ":",
    Comma => ",",
    Const => "const",
    Continue => "continue",
    Discard => "discard",
    Divide => "/",
    DivideAssign => "/=",
    Dot => ".",
    Else => "else",
    EndOfStream => "",
    Equal => "==",
    External => "external",
    FloatingPointValue => "",
    Fn => "fn",
    For => "for",
    From => "from",
    GreaterThan => ">",
    GreaterThanEqual => ">=",
    Identifier => "",
    If => "if",
    Import => "import",
    In => "in",
    IntegerValue => "",
    LessThan => "<",
    LessThanEqual => "<=",
    Let => "let",
    LogicalAnd => "&&",
    LogicalOr => "||",
    Minus => "-",
    MinusAssign => "-=",
    Module => "module",
    Modulo => "%",
    ModuloAssign => "%=",
    Multiply => "*",
    MultiplyAssign => "*=",
    Not => "!",
    NotEqual => "!=",
    OpenCurlyBracket => "{",
    OpenParenthesis => "(",
    OpenSquareBracket => "[",
    Option => "option",
    Plus => "+",
    PlusAssign => "+=",
    Return => "return",
    Semicolon => ";",
    ShiftLeft => "<<",
    ShiftRight => ">>",
    StringValue => "",
    Struct => "struct",
    While => "while",
}

impl TokenKind {
    pub const KEYWORDS: &'static [TokenKind] = &[
        TokenKind::Alias,
        TokenKind::As,
        TokenKind::BoolFalse,
        TokenKind::BoolTrue,
        TokenKind::Break,
        TokenKind::Const,
        TokenKind::Continue,
        TokenKind::Discard,
        TokenKind::Else,
        TokenKind::External,
        TokenKind::Fn,
        TokenKind::For,
        TokenKind::From,
        TokenKind::If,
        TokenKind::Import,
        TokenKind::In,
        TokenKind::Let,
        TokenKind::Module,
        TokenKind::Option,
        TokenKind::Return,
        TokenKind::Struct,
        TokenKind::While,
    ];

    /// Looks up the keyword spelled `text`.
    pub fn keyword(text: &str) -> Option<TokenKind> {
        Self::KEYWORDS.iter().copied().find(|k| k.text() == text)
    }
}

impl fmt::Display for TokenKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Type suffix of a numeric literal (`1_u32`, `0.5_f64`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NumericSuffix {
    F32,
    F64,
    I32,
    U32,
}

impl NumericSuffix {
    pub fn from_text(text: &str) -> Option<Self> {
        match text {
            "f32" => Some(NumericSuffix::F32),
            "f64" => Some(NumericSuffix::F64),
            "i32" => Some(NumericSuffix::I32),
            "u32" => Some(NumericSuffix::U32),
            _ => None,
        }
    }

    pub fn is_floating_point(&self) -> bool {
        matches!(self, NumericSuffix::F32 | NumericSuffix::F64)
    }
}

impl fmt::Display for NumericSuffix {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            NumericSuffix::F32 => "_f32",
            NumericSuffix::F64 => "_f64",
            NumericSuffix::I32 => "_i32",
            NumericSuffix::U32 => "_u32",
        })
    }
}

/// Data carried by literal and identifier tokens.
#[derive(Debug, Clone, PartialEq)]
pub enum TokenValue<'src> {
    None,
    Identifier(&'src str),
    Integer {
        value: i64,
        suffix: Option<NumericSuffix>,
    },
    Float {
        value: f64,
        suffix: Option<NumericSuffix>,
    },
    String(String),
}

/// A token with its kind, data and source location.
#[derive(Debug, Clone, PartialEq)]
pub struct Token<'src> {
    pub kind: TokenKind,
    pub value: TokenValue<'src>,
    pub location: SourceLocation,
}

impl<'src> Token<'src> {
    pub fn new(kind: TokenKind, value: TokenValue<'src>, location: SourceLocation) -> Self {
        Self {
            kind,
            value,
            location,
        }
    }

    /// The identifier text, for identifier tokens.
    pub fn identifier(&self) -> Option<&'src str> {
        match self.value {
            TokenValue::Identifier(name) => Some(name),
            _ => None,
        }
    }
}

impl fmt::Display for Token<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.value {
            TokenValue::None => f.write_str(self.kind.text()),
            TokenValue::Identifier(name) => f.write_str(name),
            TokenValue::Integer { value, suffix } => {
                write!(f, "{value}")?;
                suffix.map_or(Ok(()), |s| write!(f, "{s}"))
            }
            TokenValue::Float { value, suffix } => {
                write!(f, "{value:?}")?;
                suffix.map_or(Ok(()), |s| write!(f, "{s}"))
            }
            TokenValue::String(s) => f.write_str(&tessel_core::constant::escape_string(s, true)),
        }
    }
}

impl Location for Token<'_> {
    fn previous_token_end(&self) -> usize {
        self.location.span().start()
    }

    fn current_token_start(&self) -> usize {
        self.location.span().start()
    }
}

/// Renders a token stream back to source text.
///
/// With `pretty` set, statements are broken onto separate lines and blocks
/// are indented; otherwise tokens are joined by single spaces.
pub fn tokens_to_string(tokens: &[Token<'_>], pretty: bool) -> String {
    let tokens = tokens.iter().filter(|t| t.kind != TokenKind::EndOfStream);
    if !pretty {
        return tokens.map(ToString::to_string).collect::<Vec<_>>().join(" ");
    }

    let mut out = String::new();
    let mut indent = 0usize;
    let mut line_start = true;
    let mut previous: Option<TokenKind> = None;

    for token in tokens {
        if token.kind == TokenKind::ClosingCurlyBracket {
            indent = indent.saturating_sub(1);
            if !line_start {
                out.push('\n');
                line_start = true;
            }
        }

        if line_start {
            out.push_str(&"\t".repeat(indent));
        } else if needs_space(previous, token.kind) {
            out.push(' ');
        }
        out.push_str(&token.to_string());
        line_start = false;

        match token.kind {
            TokenKind::Semicolon | TokenKind::ClosingCurlyBracket => {
                out.push('\n');
                line_start = true;
            }
            TokenKind::OpenCurlyBracket => {
                indent += 1;
                out.push('\n');
                line_start = true;
            }
            _ => {}
        }
        previous = Some(token.kind);
    }

    out
}

fn needs_space(previous: Option<TokenKind>, next: TokenKind) -> bool {
    let glued_after = matches!(
        previous,
        Some(TokenKind::OpenParenthesis | TokenKind::OpenSquareBracket | TokenKind::Dot)
    );
    let glued_before = matches!(
        next,
        TokenKind::ClosingParenthesis
            | TokenKind::ClosingSquareBracket
            | TokenKind::Comma
            | TokenKind::Semicolon
            | TokenKind::Dot
            | TokenKind::Colon
    );
    let call_or_index = matches!(
        next,
        TokenKind::OpenParenthesis | TokenKind::OpenSquareBracket
    ) && matches!(
        previous,
        Some(TokenKind::Identifier | TokenKind::ClosingSquareBracket | TokenKind::ClosingParenthesis)
    );
    !(glued_after || glued_before || call_or_index)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_lookup() {
        assert_eq!(TokenKind::keyword("fn"), Some(TokenKind::Fn));
        assert_eq!(TokenKind::keyword("true"), Some(TokenKind::BoolTrue));
        assert_eq!(TokenKind::keyword("->"), None);
        assert_eq!(TokenKind::keyword("main"), None);
    }

    #[test]
    fn test_kind_display_uses_name() {
        assert_eq!(TokenKind::Semicolon.to_string(), "Semicolon");
        assert_eq!(TokenKind::ClosingParenthesis.to_string(), "ClosingParenthesis");
    }

    #[test]
    fn test_token_display() {
        let int = Token::new(
            TokenKind::IntegerValue,
            TokenValue::Integer {
                value: 42,
                suffix: Some(NumericSuffix::U32),
            },
            SourceLocation::unknown(),
        );
        assert_eq!(int.to_string(), "42_u32");

        let float = Token::new(
            TokenKind::FloatingPointValue,
            TokenValue::Float {
                value: 1.0,
                suffix: None,
            },
            SourceLocation::unknown(),
        );
        assert_eq!(float.to_string(), "1.0");
    }
}
