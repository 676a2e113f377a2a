//! Lexical scanner for the Babble language.
//!
//! Turns source text into a flat vector of [`Lexeme`]s, the contract the
//! semantic analyser in the `babble` crate consumes. The scanner resolves
//! string escapes, strips comments, and classifies every token; it never
//! allocates beyond the lexeme values themselves.
//!
//! ```
//! use babble_lexer::{tokenize, LexemeKind};
//!
//! let lexemes = tokenize("int32 x = 10;").unwrap();
//! assert_eq!(lexemes[0].kind, LexemeKind::VariableType);
//! assert_eq!(lexemes[1].value, "x");
//! ```

mod error;
mod lexer;
mod span;
mod token;

pub use error::{LexError, LexResult};
pub use lexer::{tokenize, Lexer};
pub use span::{SourceMap, Span};
pub use token::{Lexeme, LexemeKind};
