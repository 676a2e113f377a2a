//! The scanner proper.
//!
//! Wraps the logos-generated automaton with the pieces a table-driven lexer
//! cannot express directly: string bodies with escape processing, block
//! comments, and the numeric-literal error case.

use logos::Logos;

use crate::error::{LexError, LexResult};
use crate::token::{Lexeme, LexemeKind, RawToken};

/// Babble lexer.
pub struct Lexer<'a> {
    source: &'a str,
    inner: logos::Lexer<'a, RawToken>,
    /// Offset of the inner lexer's input within `source` (used after
    /// restarting the automaton past a string or block comment).
    offset: usize,
}

impl std::fmt::Debug for Lexer<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Lexer")
            .field("offset", &self.offset)
            .field("position", &(self.offset + self.inner.span().end))
            .finish_non_exhaustive()
    }
}

impl<'a> Lexer<'a> {
    pub fn new(source: &'a str) -> Self {
        Self {
            source,
            inner: RawToken::lexer(source),
            offset: 0,
        }
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    /// Restart the automaton at an absolute byte position.
    fn restart_from(&mut self, pos: usize) {
        let pos = pos.min(self.source.len());
        self.inner = RawToken::lexer(&self.source[pos..]);
        self.offset = pos;
    }

    /// Produce the next lexeme, skipping comments.
    pub fn next_lexeme(&mut self) -> Option<LexResult<Lexeme>> {
        loop {
            let result = self.inner.next()?;
            let span = self.inner.span();
            let start = self.offset + span.start;
            let end = self.offset + span.end;
            let text = &self.source[start..end];

            let kind = match result {
                Ok(RawToken::LineComment) => continue,
                Ok(RawToken::BlockCommentStart) => {
                    let after = self.scan_block_comment(end);
                    self.restart_from(after);
                    continue;
                }
                Ok(RawToken::DoubleQuote) | Ok(RawToken::SingleQuote) => {
                    let quote = text.as_bytes()[0];
                    match self.scan_string(end, quote) {
                        Ok((value, after)) => {
                            self.restart_from(after);
                            return Some(Ok(Lexeme::new(LexemeKind::StringLiteral, value, start)));
                        }
                        Err(e) => return Some(Err(e)),
                    }
                }
                Ok(RawToken::BadNumber) => {
                    return Some(Err(LexError::NumberNotFinished { index: end }));
                }
                Ok(RawToken::Reserved) => LexemeKind::Reserved,
                Ok(RawToken::TypeName) => LexemeKind::VariableType,
                Ok(RawToken::Identifier) => LexemeKind::Identifier,
                Ok(RawToken::Integer) | Ok(RawToken::Float) => LexemeKind::NumericLiteral,
                Ok(RawToken::Operator) => LexemeKind::Operator,
                Ok(RawToken::Punctuation) => LexemeKind::Punctuation,
                Ok(RawToken::Parenthesis) => LexemeKind::Parenthesis,
                Ok(RawToken::Bracket) => LexemeKind::Bracket,
                Err(()) => {
                    return Some(Err(LexError::UnknownLexeme {
                        value: text.to_string(),
                        index: start,
                    }));
                }
            };

            return Some(Ok(Lexeme::new(kind, text, start)));
        }
    }

    /// Scan past a `/* ... */` comment body. The original scanner consumes
    /// an unterminated block comment to the end of input without raising,
    /// and we keep that behaviour.
    fn scan_block_comment(&self, start: usize) -> usize {
        let bytes = self.source.as_bytes();
        let mut pos = start;
        while pos < bytes.len() {
            match memchr::memchr(b'*', &bytes[pos..]) {
                None => return bytes.len(),
                Some(found) => {
                    pos += found;
                    if pos + 1 < bytes.len() && bytes[pos + 1] == b'/' {
                        return pos + 2;
                    }
                    pos += 1;
                }
            }
        }
        bytes.len()
    }

    /// Scan a string body starting right after the opening quote, resolving
    /// escapes. Returns the processed value and the position after the
    /// closing quote.
    fn scan_string(&self, start: usize, quote: u8) -> LexResult<(String, usize)> {
        let bytes = self.source.as_bytes();
        let mut value = Vec::new();
        let mut pos = start;

        loop {
            match memchr::memchr3(quote, b'\\', b'\n', &bytes[pos..]) {
                None => {
                    return Err(LexError::StringNotEnded {
                        index: self.source.len(),
                    });
                }
                Some(found) => {
                    value.extend_from_slice(&bytes[pos..pos + found]);
                    pos += found;
                    match bytes[pos] {
                        b'\n' => return Err(LexError::StringNotEnded { index: pos }),
                        b'\\' => {
                            let escape = bytes.get(pos + 1).copied();
                            match escape {
                                Some(b'n') => value.push(b'\n'),
                                Some(b'r') => value.push(b'\r'),
                                Some(b't') => value.push(b'\t'),
                                Some(b'\\') => value.push(b'\\'),
                                Some(b'"') => value.push(b'"'),
                                Some(b'\'') => value.push(b'\''),
                                // Escaped newline is a line continuation.
                                Some(b'\n') => {}
                                other => {
                                    return Err(LexError::UnknownEscapeSequence {
                                        escape: other.map(char::from).unwrap_or('\0'),
                                        index: pos,
                                    });
                                }
                            }
                            pos += 2;
                        }
                        b if b == quote => {
                            // Source is valid UTF-8 and we only split at
                            // ASCII delimiters, so the copied bytes are too.
                            let value = String::from_utf8(value).map_err(|_| {
                                LexError::UnknownLexeme {
                                    value: String::new(),
                                    index: start,
                                }
                            })?;
                            return Ok((value, pos + 1));
                        }
                        _ => unreachable!("memchr3 returned a non-delimiter"),
                    }
                }
            }
        }
    }
}

impl<'a> Iterator for Lexer<'a> {
    type Item = LexResult<Lexeme>;

    fn next(&mut self) -> Option<Self::Item> {
        self.next_lexeme()
    }
}

/// Scan a whole source text into a lexeme vector.
///
/// The first lexical error aborts the scan; the translation pipeline has no
/// error recovery.
pub fn tokenize(source: &str) -> LexResult<Vec<Lexeme>> {
    Lexer::new(source).collect()
}
