//! Grid checks over the primitive lattice: the analyser's result types
//! must match the signature tables, and the VM's arithmetic must match a
//! host-language model under the same masking rules.

use babble::api::compile_and_run;
use babble::sema::operators::BinaryOp;
use babble::sema::signatures::binary_operation;
use babble::types::casts::least_common_type;
use babble::types::{PrimitiveType, Type, TypeStore, Value, NUMERIC_PRIMITIVES};

#[test]
fn analyser_result_types_match_the_tables() {
    let store = TypeStore::new();
    let arithmetic = [
        BinaryOp::Addition,
        BinaryOp::Subtraction,
        BinaryOp::Multiplication,
        BinaryOp::Division,
        BinaryOp::Modulus,
    ];
    let comparisons = [
        BinaryOp::Less,
        BinaryOp::LessOrEqual,
        BinaryOp::More,
        BinaryOp::MoreOrEqual,
        BinaryOp::Equal,
        BinaryOp::NotEqual,
        BinaryOp::LogicalAnd,
        BinaryOp::LogicalOr,
    ];
    let const_bool = Type::primitive(PrimitiveType::Bool).with_const(true);

    for a in NUMERIC_PRIMITIVES {
        for b in NUMERIC_PRIMITIVES {
            let lhs = Value::Variable(Type::primitive(a));
            let rhs = Value::Temporary(Type::primitive(b).with_const(true));
            let lct = least_common_type(a, b);

            for op in arithmetic {
                let result = binary_operation(&store, lhs, op, rhs, 0)
                    .unwrap_or_else(|e| panic!("{a} {op} {b}: {e}"));
                assert_eq!(
                    result,
                    Value::Temporary(Type::primitive(lct)),
                    "{a} {op} {b}"
                );
            }
            for op in comparisons {
                let result = binary_operation(&store, lhs, op, rhs, 0)
                    .unwrap_or_else(|e| panic!("{a} {op} {b}: {e}"));
                assert_eq!(result, Value::Temporary(const_bool), "{a} {op} {b}");
            }
        }
    }
}

#[test]
fn bitwise_is_rejected_whenever_a_float_is_involved() {
    let store = TypeStore::new();
    for a in NUMERIC_PRIMITIVES {
        for b in NUMERIC_PRIMITIVES {
            let lhs = Value::Variable(Type::primitive(a));
            let rhs = Value::Variable(Type::primitive(b));
            let result = binary_operation(&store, lhs, BinaryOp::BitwiseXor, rhs, 0);
            if least_common_type(a, b).is_float() {
                assert!(result.is_err(), "{a} ^ {b}");
            } else {
                assert!(result.is_ok(), "{a} ^ {b}");
            }
        }
    }
}

// ===== VM arithmetic vs a host model under the same masking rules =====

#[derive(Clone, Copy)]
struct IntKind {
    name: &'static str,
    size: u32,
    signed: bool,
}

const INT_KINDS: [IntKind; 8] = [
    IntKind { name: "int8", size: 1, signed: true },
    IntKind { name: "uint8", size: 1, signed: false },
    IntKind { name: "int16", size: 2, signed: true },
    IntKind { name: "uint16", size: 2, signed: false },
    IntKind { name: "int32", size: 4, signed: true },
    IntKind { name: "uint32", size: 4, signed: false },
    IntKind { name: "int64", size: 8, signed: true },
    IntKind { name: "uint64", size: 8, signed: false },
];

fn mask(value: u64, size: u32) -> u64 {
    if size == 8 {
        value
    } else {
        value & ((1u64 << (8 * size)) - 1)
    }
}

/// Reinterpret a masked payload at the kind's width.
fn widen(value: u64, kind: IntKind) -> i64 {
    let masked = mask(value, kind.size);
    if !kind.signed {
        return masked as i64;
    }
    match kind.size {
        1 => masked as u8 as i8 as i64,
        2 => masked as u16 as i16 as i64,
        4 => masked as u32 as i32 as i64,
        _ => masked as i64,
    }
}

/// Two's-complement result of `a op b` at the kind's width.
fn host_arith(op: char, a: u64, b: u64, kind: IntKind) -> Option<u64> {
    let (am, bm) = (mask(a, kind.size), mask(b, kind.size));
    let raw = match op {
        '+' => am.wrapping_add(bm),
        '-' => am.wrapping_sub(bm),
        '*' => am.wrapping_mul(bm),
        '/' | '%' => {
            if bm == 0 {
                return None;
            }
            if kind.signed {
                let (aw, bw) = (widen(a, kind), widen(b, kind));
                let r = if op == '/' {
                    aw.wrapping_div(bw)
                } else {
                    aw.wrapping_rem(bw)
                };
                r as u64
            } else if op == '/' {
                am / bm
            } else {
                am % bm
            }
        }
        _ => unreachable!(),
    };
    Some(mask(raw, kind.size))
}

/// The exit code of returning a value of `kind` from `main`.
fn host_exit(value: u64, kind: IntKind) -> i32 {
    widen(value, kind) as u32 as i32
}

#[test]
fn vm_integer_arithmetic_matches_the_host_model() {
    let values: [u64; 4] = [0, 3, 250, 4000];
    for kind in INT_KINDS {
        for op in ['+', '-', '*', '/', '%'] {
            for a in values {
                for b in values {
                    let Some(expected) = host_arith(op, a, b, kind) else {
                        continue;
                    };
                    let src = format!(
                        "int32 main() {{ {t} x = {a}; {t} y = {b}; {t} r = x {op} y; return r; }}",
                        t = kind.name
                    );
                    let (code, _) = compile_and_run(&src)
                        .unwrap_or_else(|e| panic!("{src}: {e}"));
                    assert_eq!(code, host_exit(expected, kind), "{src}");
                }
            }
        }
    }
}

#[test]
fn vm_division_by_zero_faults_for_every_integer_kind() {
    for kind in INT_KINDS {
        let src = format!(
            "int32 main() {{ {t} x = 7; {t} y = 0; return x / y; }}",
            t = kind.name
        );
        let err = compile_and_run(&src).unwrap_err();
        assert!(err.contains("division by zero"), "{src}: {err}");
    }
}

#[test]
fn vm_comparisons_match_the_host_model() {
    let values: [u64; 4] = [0, 3, 250, 4000];
    for kind in INT_KINDS {
        for a in values {
            for b in values {
                let expected = i32::from(widen(a, kind) < widen(b, kind));
                let src = format!(
                    "int32 main() {{ {t} x = {a}; {t} y = {b}; if (x < y) return 1; return 0; }}",
                    t = kind.name
                );
                let (code, _) = compile_and_run(&src)
                    .unwrap_or_else(|e| panic!("{src}: {e}"));
                assert_eq!(code, expected, "{src}");
            }
        }
    }
}

#[test]
fn vm_float_arithmetic_matches_the_host() {
    let values = [0.5f64, 2.0, 3.75, 10.0];
    for a in values {
        for b in values {
            for (op, expected) in [
                ('+', a + b),
                ('-', a - b),
                ('*', a * b),
                ('/', a / b),
            ] {
                // compare against a scaled integer to stay within exit-code range
                let src = format!(
                    "int32 main() {{ f64 x = {a:?}; f64 y = {b:?}; f64 r = (x {op} y) * 16.0; return r; }}"
                );
                let (code, _) = compile_and_run(&src)
                    .unwrap_or_else(|e| panic!("{src}: {e}"));
                assert_eq!(code, ((expected * 16.0) as i64) as u32 as i32, "{src}");
            }
        }
    }
}
