//! End-to-end tests: source in, exit code and output out.

use babble::api::{compile_and_run, compile_and_run_with_input};

fn run(src: &str) -> i32 {
    match compile_and_run(src) {
        Ok((code, _)) => code,
        Err(e) => panic!("program failed: {e}\nsource:\n{src}"),
    }
}

fn run_output(src: &str) -> String {
    compile_and_run(src).expect("program failed").1
}

#[test]
fn constant_arithmetic() {
    assert_eq!(run("int32 main() { return 2 + 3 * 4; }"), 14);
}

#[test]
fn for_loop_accumulates() {
    assert_eq!(
        run("int32 main() { int32 x = 10; for (int32 i = 0; i < 4; ++i) x += i; return x; }"),
        16
    );
}

#[test]
fn heap_pointer_round_trip() {
    assert_eq!(
        run("int32 main() { int32 *p = new int32; *p = 42; int32 v = *p; delete p; return v; }"),
        42
    );
}

#[test]
fn division_by_zero_is_fatal() {
    let err = compile_and_run("int32 main() { int32 a = 1; int32 b = 0; return a / b; }")
        .unwrap_err();
    assert!(err.contains("division by zero"), "{err}");
}

#[test]
fn struct_fields() {
    assert_eq!(
        run("struct S { int32 x; int32 y; } int32 main() { S s; s.x = 7; s.y = 3; return s.x - s.y; }"),
        4
    );
}

#[test]
fn recursive_factorial() {
    assert_eq!(
        run("int32 fact(int32 n) { if (n <= 1) return 1; return n * fact(n - 1); } int32 main() { return fact(5); }"),
        120
    );
}

#[test]
fn while_with_break_and_continue() {
    assert_eq!(
        run("int32 main() {
            int32 i = 0;
            int32 sum = 0;
            while (true) {
                ++i;
                if (i > 5) break;
                if (i % 2 == 0) continue;
                sum += i;
            }
            return sum;
        }"),
        9
    );
}

#[test]
fn do_while_runs_at_least_once() {
    assert_eq!(
        run("int32 main() { int32 i = 0; do { ++i; } while (i < 3); return i; }"),
        3
    );
    assert_eq!(
        run("int32 main() { int32 i = 10; do { ++i; } while (false); return i; }"),
        11
    );
}

#[test]
fn elif_chains() {
    let src = "
        int32 classify(int32 x) {
            if (x < 0) return 0;
            elif (x == 0) return 1;
            else return 2;
        }
        int32 main() { return classify(5) * 100 + classify(0) * 10 + classify(0 - 1); }
    ";
    assert_eq!(run(src), 211);
}

#[test]
fn arrays_and_subscripts() {
    assert_eq!(
        run("int32 main() {
            int32 a[4];
            a[0] = 10; a[1] = 20; a[2] = 30; a[3] = 40;
            int32 sum = 0;
            for (int32 i = 0; i < 4; ++i) sum += a[i];
            return sum;
        }"),
        100
    );
}

#[test]
fn foreach_iterates_by_value() {
    // writes to the loop variable must not reach the array
    assert_eq!(
        run("int32 main() {
            int32 a[3];
            a[0] = 1; a[1] = 2; a[2] = 3;
            int32 sum = 0;
            foreach (int32 x of a) { sum += x; x = 99; }
            foreach (int32 y of a) sum += y;
            return sum;
        }"),
        12
    );
}

#[test]
fn pointer_arithmetic_scales_by_element() {
    assert_eq!(
        run("int32 main() {
            int32 a[4];
            a[0] = 10; a[1] = 20; a[2] = 30; a[3] = 40;
            int32 *p = &a[1];
            p = p + 2;
            return *p;
        }"),
        40
    );
}

#[test]
fn pointer_difference_counts_elements() {
    assert_eq!(
        run("int32 main() {
            int32 a[4];
            int32 *p = &a[0];
            int32 *q = &a[3];
            return q - p;
        }"),
        3
    );
}

#[test]
fn pointer_compound_assignment() {
    assert_eq!(
        run("int32 main() {
            int32 a[3];
            a[0] = 5; a[1] = 6; a[2] = 7;
            int32 *p = &a[0];
            p += 2;
            return *p;
        }"),
        7
    );
}

#[test]
fn pointer_type_punning_reads_bytes() {
    // 513 = 0x0201 little-endian: first byte is 1
    assert_eq!(
        run("int32 main() { int32 x = 513; int8 *p = &x; return *p; }"),
        1
    );
}

#[test]
fn globals_are_visible_inside_functions() {
    assert_eq!(
        run("
            int32 g = 5;
            int32 bump() { g += 3; return g; }
            int32 main() { return bump() + g; }
        "),
        16
    );
}

#[test]
fn default_parameters_fill_in_order() {
    assert_eq!(
        run("
            int32 add3(int32 a, int32 b = 10, int32 c = 100) { return a + b + c; }
            int32 main() { return add3(1) + add3(1, 2) + add3(1, 2, 3); }
        "),
        111 + 103 + 6
    );
}

#[test]
fn by_reference_parameters_mutate_the_argument() {
    assert_eq!(
        run("
            void bump(int32 & x) { x += 5; }
            int32 main() { int32 v = 1; bump(v); bump(v); return v; }
        "),
        11
    );
}

#[test]
fn structs_pass_and_return_by_value() {
    assert_eq!(
        run("
            struct Point { int32 x; int32 y; }
            int32 taxi(Point p) { p.x += 100; return p.x + p.y; }
            Point make(int32 x, int32 y) { Point p; p.x = x; p.y = y; return p; }
            int32 main() {
                Point a = make(3, 4);
                int32 t = taxi(a);
                return t * 10 + a.x;
            }
        "),
        1073
    );
}

#[test]
fn struct_assignment_copies() {
    assert_eq!(
        run("
            struct S { int32 a; int32 b; }
            int32 main() {
                S x; x.a = 1; x.b = 2;
                S y; y = x;
                y.a = 50;
                return x.a * 100 + y.a;
            }
        "),
        150
    );
}

#[test]
fn shadowing_restores_outer_variable() {
    assert_eq!(
        run("int32 main() { int32 x = 1; { int32 x = 2; x += 1; } return x; }"),
        1
    );
}

#[test]
fn unsigned_arithmetic_wraps_at_width() {
    assert_eq!(run("int32 main() { uint8 x = 250; x += 10; return x; }"), 4);
}

#[test]
fn signed_narrow_division() {
    assert_eq!(
        run("int32 main() { int8 a = 0 - 7; int8 b = 2; return a / b; }"),
        -3
    );
    assert_eq!(
        run("int32 main() { int32 a = 0 - 7; return a % 2; }"),
        -1
    );
}

#[test]
fn unary_minus_and_negative_exit_codes() {
    assert_eq!(run("int32 main() { return -24; }"), -24);
}

#[test]
fn bitwise_operators() {
    assert_eq!(run("int32 main() { return (12 & 10) | (1 << 4); }"), 24);
    assert_eq!(run("int32 main() { return 12 ^ 10; }"), 6);
    // ~ masks at the operand width; uint8 widens without sign extension
    assert_eq!(run("int32 main() { uint8 x = 1; return ~x; }"), 254);
}

#[test]
fn shift_right_respects_signedness() {
    assert_eq!(
        run("int32 main() { int32 x = 0 - 64; return x >> 2; }"),
        -16
    );
    assert_eq!(
        run("int32 main() { uint8 x = 192; return x >> 2; }"),
        48
    );
}

#[test]
fn logical_operators_on_integers() {
    assert_eq!(run("int32 main() { if (2 && 4) return 1; return 0; }"), 1);
    assert_eq!(run("int32 main() { if (0 || 3) return 1; return 0; }"), 1);
    assert_eq!(run("int32 main() { if (0 && 4) return 1; return 0; }"), 0);
}

#[test]
fn float_arithmetic_and_narrowing() {
    assert_eq!(
        run("int32 main() { f64 x = 2.5; x = x * 4.0; return x; }"),
        10
    );
    assert_eq!(
        run("int32 main() { f32 x = 1.5f; f32 y = 2.5f; f64 z = x + y; return z; }"),
        4
    );
}

#[test]
fn float_comparisons() {
    assert_eq!(
        run("int32 main() { f64 a = 0.1; f64 b = 0.3; if (a < b) return 1; return 0; }"),
        1
    );
}

#[test]
fn increments_prefix_and_postfix_both_evaluate_to_the_place() {
    assert_eq!(
        run("int32 main() { int32 x = 5; int32 y = ++x; return x * 10 + y; }"),
        66
    );
    // postfix shares the reference semantics of prefix
    assert_eq!(
        run("int32 main() { int32 x = 5; int32 y = x++; return x * 10 + y; }"),
        66
    );
}

#[test]
fn chained_assignment_is_right_associative() {
    assert_eq!(
        run("int32 main() { int32 a = 1; int32 b = 2; a = b = 7; return a * 10 + b; }"),
        77
    );
}

#[test]
fn compound_assignments() {
    assert_eq!(
        run("int32 main() {
            int32 x = 8;
            x += 2; x -= 1; x *= 3; x /= 2; x %= 8; x <<= 2; x ^= 5; x |= 8; x &= 29;
            return x;
        }"),
        // 8+2=10, -1=9, *3=27, /2=13, %8=5, <<2=20, ^5=17, |8=25, &29=25
        25
    );
}

#[test]
fn new_array_and_delete() {
    assert_eq!(
        run("int32 main() {
            int32 a[] = new int32[5];
            for (int32 i = 0; i < 5; ++i) a[i] = i * i;
            int32 sum = 0;
            foreach (int32 v of a) sum += v;
            delete a;
            return sum;
        }"),
        30
    );
}

#[test]
fn use_after_delete_faults() {
    let err = compile_and_run(
        "int32 main() { int32 *p = new int32; *p = 1; delete p; return *p; }",
    )
    .unwrap_err();
    assert!(err.contains("memory is not allocated"), "{err}");
}

#[test]
fn double_free_faults() {
    let err = compile_and_run(
        "int32 main() { int32 *p = new int32; delete p; delete p; return 0; }",
    )
    .unwrap_err();
    assert!(err.contains("memory is not allocated"), "{err}");
}

#[test]
fn print_writes_char_arrays() {
    assert_eq!(run_output("int32 main() { print(\"hello\\n\"); return 0; }"), "hello\n");
    assert_eq!(
        run_output("int32 main() { const char s[] = \"ab\"; print(s); print(s); return 0; }"),
        "abab"
    );
}

#[test]
fn read_reads_a_line() {
    let (code, out) = compile_and_run_with_input(
        "int32 main() { char line[1]; read(line); print(line); print(\"!\\n\"); return 0; }",
        "hello\n",
    )
    .unwrap();
    assert_eq!(code, 0);
    assert_eq!(out, "hello!\n");
}

#[test]
fn string_subscript_yields_char() {
    assert_eq!(
        run("int32 main() { const char s[] = \"AB\"; return s[1]; }"),
        66
    );
}

#[test]
fn top_level_code_runs_before_main() {
    assert_eq!(
        run("
            int32 g = 0;
            g = 41;
            int32 main() { return g + 1; }
        "),
        42
    );
}

#[test]
fn program_without_return_exits_zero() {
    assert_eq!(run("int32 main() { int32 x = 5; x += 1; }"), 0);
}

#[test]
fn program_without_main_exits_zero() {
    assert_eq!(run("int32 g = 7; g += 1;"), 0);
}

#[test]
fn top_level_return_sets_the_exit_code() {
    assert_eq!(run("return 33;"), 33);
}

#[test]
fn void_functions() {
    assert_eq!(
        run("
            int32 g = 0;
            void twice() { g *= 2; }
            int32 main() { g = 3; twice(); twice(); return g; }
        "),
        12
    );
}

#[test]
fn mutual_calls_through_globals() {
    assert_eq!(
        run("
            int32 depth = 0;
            int32 ping(int32 n) {
                depth += 1;
                if (n == 0) return depth;
                return ping(n - 1);
            }
            int32 main() { return ping(4); }
        "),
        5
    );
}

#[test]
fn nested_calls_as_arguments() {
    assert_eq!(
        run("
            int32 add(int32 a, int32 b) { return a + b; }
            int32 main() { return add(add(1, 2), add(3, add(4, 5))); }
        "),
        15
    );
}

#[test]
fn fibonacci() {
    assert_eq!(
        run("
            int32 fib(int32 n) {
                if (n < 2) return n;
                return fib(n - 1) + fib(n - 2);
            }
            int32 main() { return fib(10); }
        "),
        55
    );
}

#[test]
fn narrow_types_promote_in_mixed_arithmetic() {
    assert_eq!(
        run("int32 main() { int8 a = 100; int32 b = 1000; return a + b; }"),
        1100
    );
    assert_eq!(
        run("int32 main() { uint16 a = 60000; uint16 b = 40000; return (a + b) - 34464; }"),
        // uint16 addition wraps: 100000 & 0xffff = 34464
        0
    );
}

#[test]
fn bool_values_and_not() {
    assert_eq!(
        run("int32 main() { bool b = true; b = !b; if (b) return 1; return 0; }"),
        0
    );
    assert_eq!(
        run("int32 main() { int32 x = 7; bool b = x; if (b) return 1; return 0; }"),
        1
    );
}

#[test]
fn comparisons_mix_widths() {
    assert_eq!(
        run("int32 main() { int8 a = 0 - 1; int64 b = 1L; if (a < b) return 1; return 0; }"),
        1
    );
}

#[test]
fn every_function_body_ends_with_exactly_one_return() {
    use babble::ir::{Node, Op};
    let cases = [
        // explicit return: no extra one appended
        ("int32 main() { return 1; }", 1),
        // implicit return appended to a body that falls off the end
        ("int32 main() { int32 x = 1; x += 1; }", 1),
        ("void f() { } int32 main() { f(); return 2; }", 2),
        // the top-level `return` is a frame return, not a body terminator
        ("return 5;", 1),
    ];
    for (src, expected) in cases {
        let program = babble::compile(src).expect(src).program;
        let returns = program
            .nodes()
            .iter()
            .filter(|n| matches!(n, Node::Operator(Op::Return, _)))
            .count();
        assert_eq!(returns, expected, "{src}");
    }
}

#[test]
fn hex_and_suffixed_literals() {
    assert_eq!(run("int32 main() { return 0xff; }"), 255);
    assert_eq!(run("int32 main() { int64 x = 0x10L; return x; }"), 16);
    assert_eq!(run("int32 main() { int8 t = 5t; return t; }"), 5);
    assert_eq!(run("int32 main() { uint32 u = 7u; return u; }"), 7);
}
