//! Translation-era error taxonomy: each class of source mistake maps to
//! its own error variant, and one error aborts the compilation.

use babble::{compile, CompileError};
use babble_lexer::LexError;

fn compile_err(src: &str) -> CompileError {
    match compile(src) {
        Err(e) => e,
        Ok(_) => panic!("expected a compile error for:\n{src}"),
    }
}

#[test]
fn undeclared_identifier() {
    assert!(matches!(
        compile_err("int32 main() { return y; }"),
        CompileError::UndeclaredIdentifier { name, .. } if name == "y"
    ));
}

#[test]
fn redeclaration_in_the_same_scope() {
    assert!(matches!(
        compile_err("int32 main() { int32 x = 1; int32 x = 2; return x; }"),
        CompileError::Redeclaration { name, .. } if name == "x"
    ));
    // shadowing in a nested scope is fine
    assert!(compile("int32 main() { int32 x = 1; { int32 x = 2; x += 1; } return x; }").is_ok());
}

#[test]
fn void_variable() {
    assert!(matches!(
        compile_err("int32 main() { void x; return 0; }"),
        CompileError::VoidNotExpected { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { const void f; return 0; }"),
        CompileError::VoidNotExpected { .. }
    ));
}

#[test]
fn type_mismatch_on_return() {
    assert!(matches!(
        compile_err("int32 main() { int32 *p = new int32; return p; }"),
        CompileError::TypeMismatch { .. }
    ));
    assert!(matches!(
        compile_err("void f() { return 3; } int32 main() { f(); return 0; }"),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn type_mismatch_on_condition() {
    assert!(matches!(
        compile_err("struct S { int32 x; } int32 main() { S s; if (s) return 1; return 0; }"),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn unknown_operator() {
    assert!(matches!(
        compile_err("int32 main() { int32 *p = new int32; int32 x = p * 2; return x; }"),
        CompileError::UnknownOperator { .. }
    ));
    // assignment to a const place
    assert!(matches!(
        compile_err("int32 main() { const int32 x = 1; x = 2; return x; }"),
        CompileError::UnknownOperator { .. }
    ));
    // ++ on a temporary
    assert!(matches!(
        compile_err("int32 main() { return ++5; }"),
        CompileError::UnknownOperator { .. }
    ));
    // ** is lexed but deliberately not an operator
    assert!(compile("int32 main() { return 2 ** 3; }").is_err());
}

#[test]
fn loop_instructions_outside_of_loop() {
    assert!(matches!(
        compile_err("int32 main() { break; return 0; }"),
        CompileError::LoopInstructionsOutsideOfLoop { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { continue; return 0; }"),
        CompileError::LoopInstructionsOutsideOfLoop { .. }
    ));
    // loop depth does not leak into function bodies
    assert!(matches!(
        compile_err(
            "int32 f() { break; return 0; }
             int32 main() { while (true) { return f(); } return 0; }"
        ),
        CompileError::LoopInstructionsOutsideOfLoop { .. }
    ));
}

#[test]
fn callability_errors() {
    assert!(matches!(
        compile_err("int32 main() { int32 x = 1; return x(); }"),
        CompileError::TypeNotCallable { .. }
    ));
    // a function used indirectly cannot be activated
    assert!(matches!(
        compile_err("int32 g() { return 1; } int32 main() { return (g)(); }"),
        CompileError::ExpectedFunction { .. }
    ));
}

#[test]
fn subscript_and_member_errors() {
    assert!(matches!(
        compile_err("int32 main() { int32 x = 1; return x[0]; }"),
        CompileError::TypeNotIndexed { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { int32 x = 1; return x.field; }"),
        CompileError::TypeNoMembers { .. }
    ));
    assert!(matches!(
        compile_err(
            "struct S { int32 x; } int32 main() { S s; return s.nope; }"
        ),
        CompileError::TypeUnknownMember { name, .. } if name == "nope"
    ));
}

#[test]
fn foreach_requires_an_array() {
    assert!(matches!(
        compile_err("int32 main() { foreach (int32 x of 5) { x += 1; } return 0; }"),
        CompileError::TypeNotIterable { .. }
    ));
    assert!(matches!(
        compile_err(
            "int32 main() { int32 a[2]; foreach (int64 x of a) { x += 1; } return 0; }"
        ),
        CompileError::TypeMismatch { .. }
    ));
}

#[test]
fn call_argument_errors() {
    let src = "int32 add(int32 a, int32 b) { return a + b; }";
    assert!(matches!(
        compile_err(&format!("{src} int32 main() {{ return add(1); }}")),
        CompileError::FunctionParameterListDoesNotMatch { .. }
    ));
    assert!(matches!(
        compile_err(&format!("{src} int32 main() {{ return add(1, 2, 3); }}")),
        CompileError::FunctionParameterListDoesNotMatch { .. }
    ));
    assert!(matches!(
        compile_err(
            "struct S { int32 x; }
             int32 f(S s) { return s.x; }
             int32 main() { return f(3); }"
        ),
        CompileError::FunctionParameterListDoesNotMatch { .. }
    ));
    // a temporary cannot bind to a by-reference parameter
    assert!(matches!(
        compile_err(
            "void bump(int32 & x) { x += 1; }
             int32 main() { bump(5); return 0; }"
        ),
        CompileError::FunctionParameterListDoesNotMatch { .. }
    ));
}

#[test]
fn default_parameters_must_be_contiguous() {
    assert!(compile(
        "int32 f(int32 a, int32 b = 2, int32 c = 3) { return a + b + c; }
         int32 main() { return f(1); }"
    )
    .is_ok());
    assert!(matches!(
        compile_err(
            "int32 f(int32 a = 1, int32 b) { return a + b; }
             int32 main() { return f(1, 2); }"
        ),
        CompileError::UnexpectedLexeme { .. }
    ));
}

#[test]
fn unexpected_lexeme() {
    assert!(matches!(
        compile_err("int32 main() { return 1 }"),
        CompileError::UnexpectedLexeme { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { if return 1; }"),
        CompileError::UnexpectedLexeme { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { elif (true) return 1; }"),
        CompileError::UnexpectedLexeme { .. }
    ));
}

#[test]
fn lexical_errors_surface_through_the_pipeline() {
    assert!(matches!(
        compile_err("int32 main() { return @; }"),
        CompileError::Lex(LexError::UnknownLexeme { .. })
    ));
    assert!(matches!(
        compile_err("int32 main() { f64 x = 12.; return 0; }"),
        CompileError::Lex(LexError::NumberNotFinished { .. })
    ));
    assert!(matches!(
        compile_err("int32 main() { const char s[] = \"oops; return 0; }"),
        CompileError::Lex(LexError::StringNotEnded { .. })
    ));
}

#[test]
fn struct_errors() {
    assert!(matches!(
        compile_err("struct S { int32 x; int32 x; } int32 main() { return 0; }"),
        CompileError::Redeclaration { .. }
    ));
    assert!(matches!(
        compile_err("int32 main() { Unknown u; return 0; }"),
        CompileError::UndeclaredIdentifier { .. }
    ));
    // struct fields take no initialisers
    assert!(compile("struct S { int32 x = 5; } int32 main() { return 0; }").is_err());
}

#[test]
fn errors_carry_source_indices() {
    let err = compile_err("int32 main() { return nope; }");
    let index = err.index().expect("translation errors carry an index");
    assert_eq!(index, "int32 main() { return ".len());
}

#[test]
fn downcast_warnings_do_not_abort() {
    let warnings =
        babble::api::compile_to_warnings("int32 main() { int8 x = 1000; return x; }").unwrap();
    assert_eq!(warnings.len(), 1);
    assert!(warnings[0].contains("loss of data"), "{}", warnings[0]);

    let warnings =
        babble::api::compile_to_warnings("int32 main() { int32 x = 5; return x; }").unwrap();
    assert!(warnings.is_empty());
}

#[test]
fn lossy_initialiser_still_runs_with_masked_value() {
    let (code, _) =
        babble::api::compile_and_run("int32 main() { int8 x = 1000; return x; }").unwrap();
    // 1000 & 0xff = 232, sign-extended back to -24
    assert_eq!(code, -24);
}
