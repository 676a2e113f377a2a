//! The translation pipeline: source text → lexemes → analysed and linked
//! bytecode.

use babble_lexer::tokenize;

use crate::error::{CompileResult, Warning};
use crate::ir::Program;
use crate::sema::Analyzer;

/// A compiled program plus the warnings analysis produced.
#[derive(Debug)]
pub struct CompileOutcome {
    pub program: Program,
    pub warnings: Vec<Warning>,
}

/// Compile source text to an executable instruction stream.
pub fn compile(source: &str) -> CompileResult<CompileOutcome> {
    let lexemes = tokenize(source)?;
    let (program, warnings) = Analyzer::new(lexemes).analyze()?;
    Ok(CompileOutcome { program, warnings })
}
