//! Rust API for compiling and running Babble programs in-process.
//!
//! Used by the CLI and by integration tests; errors are flattened to
//! strings for ergonomic matching.

use crate::pipeline::compile;
use crate::vm::Vm;

/// Compile and execute a program with no stdin. Returns the exit code and
/// everything it printed.
pub fn compile_and_run(source: &str) -> Result<(i32, String), String> {
    compile_and_run_with_input(source, "")
}

/// Compile and execute a program, feeding `input` to its `read` calls.
pub fn compile_and_run_with_input(source: &str, input: &str) -> Result<(i32, String), String> {
    let outcome = compile(source).map_err(|e| format!("compile error: {e}"))?;
    let mut vm = Vm::new(outcome.program).with_input(Box::new(std::io::Cursor::new(
        input.as_bytes().to_vec(),
    )));
    let code = vm.run().map_err(|e| format!("runtime fault: {e}"))?;
    Ok((code, vm.take_output()))
}

/// Compile only, returning the rendered warnings.
pub fn compile_to_warnings(source: &str) -> Result<Vec<String>, String> {
    let outcome = compile(source).map_err(|e| format!("compile error: {e}"))?;
    Ok(outcome.warnings.iter().map(|w| w.to_string()).collect())
}
