//! Translation-era error and warning types.
//!
//! One error aborts the whole compilation; there is no recovery. Every
//! variant that originates from a source construct carries the byte index
//! of the offending lexeme so the driver can render the line.

use babble_lexer::LexError;
use thiserror::Error;

/// Errors raised while translating source text to bytecode.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CompileError {
    #[error(transparent)]
    Lex(#[from] LexError),

    #[error("expected {expected}, found {found}")]
    UnexpectedLexeme {
        index: usize,
        expected: String,
        found: String,
    },

    #[error("undeclared identifier '{name}'")]
    UndeclaredIdentifier { index: usize, name: String },

    #[error("'{name}' is already declared in this scope")]
    Redeclaration { index: usize, name: String },

    #[error("void is not allowed here")]
    VoidNotExpected { index: usize },

    #[error("type mismatch: expected {expected}, got {got}")]
    TypeMismatch {
        index: usize,
        expected: String,
        got: String,
    },

    #[error("operator '{op}' is not defined for {operands}")]
    UnknownOperator {
        index: usize,
        op: String,
        operands: String,
    },

    #[error("arguments ({provided}) do not match the parameter list of {func}")]
    FunctionParameterListDoesNotMatch {
        index: usize,
        func: String,
        provided: String,
    },

    #[error("expected a function, got {got}")]
    ExpectedFunction { index: usize, got: String },

    #[error("type cannot be iterated")]
    TypeNotIterable { index: usize },

    #[error("type cannot be indexed")]
    TypeNotIndexed { index: usize },

    #[error("type cannot be called")]
    TypeNotCallable { index: usize },

    #[error("type has no members")]
    TypeNoMembers { index: usize },

    #[error("type has no member named '{name}'")]
    TypeUnknownMember { index: usize, name: String },

    #[error("'break' and 'continue' are only allowed inside a loop")]
    LoopInstructionsOutsideOfLoop { index: usize },

    #[error("internal error: {message}")]
    Internal { message: String },
}

impl CompileError {
    /// Byte offset of the error in the source text, when one applies.
    pub fn index(&self) -> Option<usize> {
        match self {
            CompileError::Lex(e) => Some(e.index()),
            CompileError::UnexpectedLexeme { index, .. }
            | CompileError::UndeclaredIdentifier { index, .. }
            | CompileError::Redeclaration { index, .. }
            | CompileError::VoidNotExpected { index }
            | CompileError::TypeMismatch { index, .. }
            | CompileError::UnknownOperator { index, .. }
            | CompileError::FunctionParameterListDoesNotMatch { index, .. }
            | CompileError::ExpectedFunction { index, .. }
            | CompileError::TypeNotIterable { index }
            | CompileError::TypeNotIndexed { index }
            | CompileError::TypeNotCallable { index }
            | CompileError::TypeNoMembers { index }
            | CompileError::TypeUnknownMember { index, .. }
            | CompileError::LoopInstructionsOutsideOfLoop { index } => Some(*index),
            CompileError::Internal { .. } => None,
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        CompileError::Internal {
            message: message.into(),
        }
    }
}

/// Non-fatal diagnostics; emitted but never abort compilation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Warning {
    /// A cast that may lose information (`can_cast` returned lossy).
    Downcast {
        index: usize,
        from: String,
        to: String,
    },
}

impl Warning {
    pub fn index(&self) -> usize {
        match self {
            Warning::Downcast { index, .. } => *index,
        }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Warning::Downcast { from, to, .. } => {
                write!(f, "possible loss of data casting {} to {}", from, to)
            }
        }
    }
}

/// Result type for translation operations.
pub type CompileResult<T> = Result<T, CompileError>;
