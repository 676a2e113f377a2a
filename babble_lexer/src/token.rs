//! Token definitions for the Babble lexer.
//!
//! The raw `logos` automaton below recognises token *shapes*; the wrapper in
//! [`crate::lexer`] turns them into [`crate::Lexeme`]s, handling string
//! contents, comments and escape sequences.

use logos::Logos;

/// Raw tokens produced by the logos automaton.
///
/// String literals and block comments are only *opened* here; their bodies
/// are scanned by the wrapper so that escape handling and error reporting
/// stay in one place.
#[derive(Logos, Debug, Clone, Copy, PartialEq, Eq)]
#[logos(skip r"[ \t\r\n\f]+")]
pub enum RawToken {
    /// Reserved words of the language.
    #[regex(
        "for|while|do|foreach|of|if|elif|else|return|break|continue|struct|const|true|false|as|new|delete",
        priority = 20
    )]
    Reserved,

    /// Built-in type names.
    #[regex(
        "int8|int16|int32|int64|uint8|uint16|uint32|uint64|f32|f64|void|bool|char",
        priority = 20
    )]
    TypeName,

    #[regex("[A-Za-z_][A-Za-z0-9_]*")]
    Identifier,

    /// Integer literal: decimal or `0x` hex, optional width suffix
    /// (`t`/`s`/`i`/`l`, upper or lower) with optional trailing `u`.
    #[regex("[0-9]+([tTsSiIlL][uU]?|[uU])?|0x[0-9a-fA-F]+([tTsSiIlL][uU]?|[uU])?")]
    Integer,

    /// Decimal literal, optionally `f`-suffixed.
    #[regex(r"[0-9]+\.[0-9]+f?")]
    Float,

    /// A digit run followed by a dot with no fractional digits.
    #[regex(r"[0-9]+\.")]
    BadNumber,

    #[regex(r"\*\*=|\*\*|<<=|>>=|\+\+|--|&&|\|\||==|!=|<=|>=|<<|>>|\+=|-=|\*=|/=|%=|&=|\^=|\|=|[-+*/%&|^<>=.~!]")]
    Operator,

    #[regex("=>|[,;{}]")]
    Punctuation,

    #[regex(r"[()]")]
    Parenthesis,

    #[regex(r"[\[\]]")]
    Bracket,

    #[token("\"")]
    DoubleQuote,

    #[token("'")]
    SingleQuote,

    #[regex("//[^\n]*")]
    LineComment,

    #[token("/*")]
    BlockCommentStart,
}

/// Lexeme kind, the contract consumed by the semantic analyser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LexemeKind {
    Reserved,
    Identifier,
    NumericLiteral,
    Operator,
    Punctuation,
    Parenthesis,
    Bracket,
    StringLiteral,
    VariableType,
    Unknown,
    /// End-of-input sentinel; never produced by the lexer itself, used by
    /// the parser when it runs off the lexeme vector.
    Eof,
}

impl std::fmt::Display for LexemeKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            LexemeKind::Reserved => "reserved word",
            LexemeKind::Identifier => "identifier",
            LexemeKind::NumericLiteral => "numeric literal",
            LexemeKind::Operator => "operator",
            LexemeKind::Punctuation => "punctuation",
            LexemeKind::Parenthesis => "parenthesis",
            LexemeKind::Bracket => "bracket",
            LexemeKind::StringLiteral => "string literal",
            LexemeKind::VariableType => "type name",
            LexemeKind::Unknown => "unknown lexeme",
            LexemeKind::Eof => "end of input",
        };
        f.write_str(name)
    }
}

/// A lexical token with its processed value and source byte offset.
///
/// For string literals `value` holds the *unescaped* contents; for every
/// other kind it is the source slice verbatim.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Lexeme {
    pub kind: LexemeKind,
    pub value: String,
    pub index: usize,
}

impl Lexeme {
    pub fn new(kind: LexemeKind, value: impl Into<String>, index: usize) -> Self {
        Self {
            kind,
            value: value.into(),
            index,
        }
    }

    /// The EOF sentinel at the given offset.
    pub fn eof(index: usize) -> Self {
        Self::new(LexemeKind::Eof, "", index)
    }
}

impl std::fmt::Display for Lexeme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.kind, self.value)
    }
}
