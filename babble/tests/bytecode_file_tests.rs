//! Compiled programs survive the `.bbl` file format: serialize, reload,
//! and re-run with identical results.

use babble::ir::bytecode::{self, BytecodeError};
use babble::vm::Vm;

fn compile(src: &str) -> babble::ir::Program {
    babble::compile(src).expect("compiles").program
}

#[test]
fn round_trip_preserves_every_node() {
    let program = compile(
        "int32 fact(int32 n) { if (n <= 1) return 1; return n * fact(n - 1); }
         int32 main() { return fact(6); }",
    );
    let mut bytes = Vec::new();
    bytecode::save(&program, &mut bytes).unwrap();
    let reloaded = bytecode::load(bytes.as_slice()).unwrap();
    assert_eq!(reloaded.nodes(), program.nodes());
}

#[test]
fn reloaded_programs_run_identically() {
    let sources = [
        "int32 main() { return 2 + 3 * 4; }",
        "int32 main() { int32 x = 10; for (int32 i = 0; i < 4; ++i) x += i; return x; }",
        "int32 fact(int32 n) { if (n <= 1) return 1; return n * fact(n - 1); }
         int32 main() { return fact(5); }",
    ];
    for src in sources {
        let program = compile(src);
        let direct = Vm::new(program.clone()).run().unwrap();

        let mut bytes = Vec::new();
        bytecode::save(&program, &mut bytes).unwrap();
        let reloaded = bytecode::load(bytes.as_slice()).unwrap();
        let indirect = Vm::new(reloaded).run().unwrap();
        assert_eq!(direct, indirect, "{src}");
    }
}

#[test]
fn file_round_trip_through_disk() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("out.bbl");

    let program = compile("int32 main() { return 41 + 1; }");
    bytecode::save_to_path(&program, &path).unwrap();
    let reloaded = bytecode::load_from_path(&path).unwrap();
    assert_eq!(reloaded.nodes(), program.nodes());
    assert_eq!(Vm::new(reloaded).run().unwrap(), 42);
}

#[test]
fn unknown_version_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.bbl");

    let program = compile("int32 main() { return 1; }");
    bytecode::save_to_path(&program, &path).unwrap();
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[0] = 42;
    std::fs::write(&path, bytes).unwrap();

    assert!(matches!(
        bytecode::load_from_path(&path),
        Err(BytecodeError::UnsupportedVersion(42))
    ));
}

#[test]
fn missing_file_reports_io() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nope.bbl");
    assert!(matches!(
        bytecode::load_from_path(&path),
        Err(BytecodeError::Io(_))
    ));
}
