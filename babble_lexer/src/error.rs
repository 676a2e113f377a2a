//! Lexical error types.

use thiserror::Error;

/// Errors produced while scanning source text.
///
/// Every variant carries the byte offset of the offending character so the
/// driver can render the source line.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LexError {
    /// A character sequence that matches no lexeme class.
    #[error("unknown lexeme '{value}'")]
    UnknownLexeme { value: String, index: usize },

    /// A digit run followed by `.` with no fractional digits.
    #[error("numeric literal is not finished")]
    NumberNotFinished { index: usize },

    /// A string literal hit a newline or the end of input before its
    /// closing quote.
    #[error("string literal is not ended")]
    StringNotEnded { index: usize },

    /// A backslash escape the language does not define.
    #[error("unknown escape sequence '\\{escape}'")]
    UnknownEscapeSequence { escape: char, index: usize },
}

impl LexError {
    /// Byte offset of the error in the source text.
    pub fn index(&self) -> usize {
        match self {
            LexError::UnknownLexeme { index, .. } => *index,
            LexError::NumberNotFinished { index } => *index,
            LexError::StringNotEnded { index } => *index,
            LexError::UnknownEscapeSequence { index, .. } => *index,
        }
    }
}

/// Result type for lexing operations.
pub type LexResult<T> = Result<T, LexError>;
