//! Operator signature tables and dispatch.
//!
//! Three global tables (unary prefix and postfix share one map, keyed by
//! operator) are built lazily, once, over the primitive lattice. Dispatch
//! enumerates the qualifier-derived forms of each operand (the Cartesian
//! product for binary operators) and the first hit wins. Pointer
//! arithmetic, member access, simple assignment of equal structural types
//! and the address-of/dereference pair are resolved procedurally; they
//! cannot be enumerated per-type.

use std::collections::HashMap;

use once_cell::sync::Lazy;

use crate::error::{CompileError, CompileResult};
use crate::sema::operators::{BinaryOp, UnaryPostfixOp, UnaryPrefixOp};
use crate::types::casts::{can_cast, cast_value, least_common_type};
use crate::types::{Category, PrimitiveType, Type, TypeKind, TypeStore, Value, NUMERIC_PRIMITIVES};

/// Key for the shared unary table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryKey {
    Prefix(UnaryPrefixOp),
    Postfix(UnaryPostfixOp),
}

impl std::fmt::Display for UnaryKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UnaryKey::Prefix(op) => write!(f, "{}", op),
            UnaryKey::Postfix(op) => write!(f, "{}", op),
        }
    }
}

type UnaryTable = HashMap<(UnaryKey, Category, Type), Type>;
type BinaryTable = HashMap<(BinaryOp, Category, Type, Category, Type), Type>;

const CATEGORIES: [Category; 2] = [Category::Temporary, Category::Variable];

static UNARY: Lazy<UnaryTable> = Lazy::new(build_unary_table);
static BINARY: Lazy<BinaryTable> = Lazy::new(build_binary_table);

fn build_unary_table() -> UnaryTable {
    let mut table = UnaryTable::new();
    let bool_t = Type::primitive(PrimitiveType::Bool);
    let const_bool = bool_t.with_const(true);

    for p in NUMERIC_PRIMITIVES {
        let t = Type::primitive(p);
        let const_t = t.with_const(true);
        let ref_t = t.with_ref(true);

        for cat in CATEGORIES {
            table.insert((UnaryKey::Prefix(UnaryPrefixOp::Plus), cat, const_t), const_t);
            table.insert(
                (UnaryKey::Prefix(UnaryPrefixOp::Minus), cat, const_t),
                const_t,
            );
            if p.is_integer() {
                table.insert(
                    (UnaryKey::Prefix(UnaryPrefixOp::Tilda), cat, const_t),
                    const_t,
                );
            }
            // Logical negation accepts const and non-const alike; its
            // result is always a const bool.
            table.insert((UnaryKey::Prefix(UnaryPrefixOp::Invert), cat, t), const_bool);
            table.insert(
                (UnaryKey::Prefix(UnaryPrefixOp::Invert), cat, const_t),
                const_bool,
            );
        }

        // ++/-- demand a mutable place: a plain variable or a reference
        // temporary. Both fixities return a reference to the operand.
        for key in [
            UnaryKey::Prefix(UnaryPrefixOp::Increment),
            UnaryKey::Prefix(UnaryPrefixOp::Decrement),
            UnaryKey::Postfix(UnaryPostfixOp::Increment),
            UnaryKey::Postfix(UnaryPostfixOp::Decrement),
        ] {
            table.insert((key, Category::Variable, t), ref_t);
            table.insert((key, Category::Temporary, ref_t), ref_t);
        }
    }

    // bool joins negation and complement but has no ++/-- or arithmetic.
    for cat in CATEGORIES {
        for key in [
            UnaryKey::Prefix(UnaryPrefixOp::Invert),
            UnaryKey::Prefix(UnaryPrefixOp::Tilda),
        ] {
            table.insert((key, cat, bool_t), const_bool);
            table.insert((key, cat, const_bool), const_bool);
        }
    }

    table
}

const ARITHMETIC_OPS: [BinaryOp; 5] = [
    BinaryOp::Multiplication,
    BinaryOp::Division,
    BinaryOp::Modulus,
    BinaryOp::Addition,
    BinaryOp::Subtraction,
];

const BITWISE_OPS: [BinaryOp; 5] = [
    BinaryOp::ShiftLeft,
    BinaryOp::ShiftRight,
    BinaryOp::BitwiseAnd,
    BinaryOp::BitwiseOr,
    BinaryOp::BitwiseXor,
];

const ASSIGNMENT_ARITHMETIC_OPS: [BinaryOp; 6] = [
    BinaryOp::Assignment,
    BinaryOp::AdditionAssignment,
    BinaryOp::SubtractionAssignment,
    BinaryOp::MultiplicationAssignment,
    BinaryOp::DivisionAssignment,
    BinaryOp::ModulusAssignment,
];

const ASSIGNMENT_BITWISE_OPS: [BinaryOp; 5] = [
    BinaryOp::ShiftLeftAssignment,
    BinaryOp::ShiftRightAssignment,
    BinaryOp::AndAssignment,
    BinaryOp::OrAssignment,
    BinaryOp::XorAssignment,
];

const LOGICAL_OPS: [BinaryOp; 8] = [
    BinaryOp::Equal,
    BinaryOp::NotEqual,
    BinaryOp::Less,
    BinaryOp::LessOrEqual,
    BinaryOp::More,
    BinaryOp::MoreOrEqual,
    BinaryOp::LogicalAnd,
    BinaryOp::LogicalOr,
];

fn build_binary_table() -> BinaryTable {
    let mut table = BinaryTable::new();
    let bool_t = Type::primitive(PrimitiveType::Bool);
    let const_bool = bool_t.with_const(true);
    let ref_bool = bool_t.with_ref(true);

    for p in NUMERIC_PRIMITIVES {
        let t = Type::primitive(p);
        let const_t = t.with_const(true);
        let ref_t = t.with_ref(true);

        for c1 in CATEGORIES {
            for c2 in CATEGORIES {
                for op in ARITHMETIC_OPS {
                    table.insert((op, c1, const_t, c2, const_t), t);
                }
                for op in LOGICAL_OPS {
                    table.insert((op, c1, const_t, c2, const_t), const_bool);
                }
                if p.is_integer() {
                    for op in BITWISE_OPS {
                        table.insert((op, c1, const_t, c2, const_t), t);
                    }
                }
            }
        }

        for c2 in CATEGORIES {
            for op in ASSIGNMENT_ARITHMETIC_OPS {
                table.insert((op, Category::Variable, t, c2, const_t), ref_t);
                table.insert((op, Category::Temporary, ref_t, c2, const_t), ref_t);
            }
            if p.is_integer() {
                for op in ASSIGNMENT_BITWISE_OPS {
                    table.insert((op, Category::Variable, t, c2, const_t), ref_t);
                    table.insert((op, Category::Temporary, ref_t, c2, const_t), ref_t);
                }
            }
        }
    }

    for c1 in CATEGORIES {
        for c2 in CATEGORIES {
            for op in LOGICAL_OPS {
                table.insert((op, c1, const_bool, c2, const_bool), const_bool);
            }
        }
    }
    for c2 in CATEGORIES {
        for op in ASSIGNMENT_BITWISE_OPS
            .into_iter()
            .chain([BinaryOp::Assignment])
        {
            table.insert((op, Category::Variable, bool_t, c2, const_bool), ref_bool);
            table.insert((op, Category::Temporary, ref_bool, c2, const_bool), ref_bool);
        }
    }

    table
}

fn describe(store: &TypeStore, val: Value) -> String {
    store.display(val.ty())
}

fn unknown_unary(store: &TypeStore, op: UnaryKey, val: Value, index: usize) -> CompileError {
    CompileError::UnknownOperator {
        index,
        op: op.to_string(),
        operands: describe(store, val),
    }
}

fn unknown_binary(
    store: &TypeStore,
    op: BinaryOp,
    lhs: Value,
    rhs: Value,
    index: usize,
) -> CompileError {
    CompileError::UnknownOperator {
        index,
        op: op.lexeme().to_string(),
        operands: format!("{} and {}", describe(store, lhs), describe(store, rhs)),
    }
}

/// Table lookup over the derived forms of `val`. On a hit, returns the
/// result value and the key type that matched (the form the operand must
/// be cast to before the opcode runs).
fn unary_lookup(op: UnaryKey, val: Value) -> Option<(Value, Type)> {
    for d in val.derived() {
        if let Some(result) = UNARY.get(&(op, d.category(), d.ty())) {
            return Some((Value::Temporary(*result), d.ty()));
        }
    }
    None
}

/// Resolve a unary prefix operator. Returns the result value and the
/// operand form it matched as.
pub fn unary_prefix_operation(
    store: &TypeStore,
    op: UnaryPrefixOp,
    val: Value,
    index: usize,
) -> CompileResult<(Value, Type)> {
    let ty = val.ty();
    match op {
        UnaryPrefixOp::Dereference => match store.kind(ty) {
            TypeKind::Pointer(pointee) => {
                let result = pointee.with_quals(ty.is_const(), true);
                Ok((Value::Temporary(result), ty))
            }
            _ => Err(unknown_unary(store, UnaryKey::Prefix(op), val, index)),
        },
        UnaryPrefixOp::AddressOf => {
            if !val.is_addressable() {
                return Err(unknown_unary(store, UnaryKey::Prefix(op), val, index));
            }
            let pointer = store.pointer_to(ty.with_ref(false));
            Ok((Value::Temporary(pointer), ty))
        }
        _ => unary_lookup(UnaryKey::Prefix(op), val)
            .ok_or_else(|| unknown_unary(store, UnaryKey::Prefix(op), val, index)),
    }
}

/// Resolve a unary postfix operator.
pub fn unary_postfix_operation(
    store: &TypeStore,
    val: Value,
    op: UnaryPostfixOp,
    index: usize,
) -> CompileResult<(Value, Type)> {
    unary_lookup(UnaryKey::Postfix(op), val)
        .ok_or_else(|| unknown_unary(store, UnaryKey::Postfix(op), val, index))
}

fn binary_lookup(op: BinaryOp, lhs: Value, rhs: Value) -> Option<Value> {
    for dl in lhs.derived() {
        for dr in rhs.derived() {
            if let Some(result) =
                BINARY.get(&(op, dl.category(), dl.ty(), dr.category(), dr.ty()))
            {
                return Some(Value::Temporary(*result));
            }
        }
    }
    None
}

/// Resolve a binary operator to its result value.
///
/// Primitive operands go through the table: assignment coerces the right
/// side to the left slot type first, everything else promotes both sides
/// to their least common type. Non-primitive operands take the procedural
/// rules (structural assignment, pointer difference, pointer ± integer).
pub fn binary_operation(
    store: &TypeStore,
    lhs: Value,
    op: BinaryOp,
    rhs: Value,
    index: usize,
) -> CompileResult<Value> {
    let lt = lhs.ty();
    let rt = rhs.ty();
    let (lp, rp) = (store.primitive_of(lt), store.primitive_of(rt));

    if lp.is_none() || rp.is_none() {
        if op == BinaryOp::Assignment
            && lt.same_erased(rt)
            && !lt.is_const()
            && lhs.is_addressable()
        {
            return Ok(Value::Temporary(lt.with_quals(false, true)));
        }
        let const_i64 = Type::primitive(PrimitiveType::Int64).with_const(true);
        let l_kind = store.kind(lt);
        let r_kind = store.kind(rt);
        if op == BinaryOp::Subtraction {
            if let (TypeKind::Pointer(a), TypeKind::Pointer(b)) = (&l_kind, &r_kind) {
                if a.erased() == b.erased() {
                    return Ok(Value::Temporary(const_i64));
                }
            }
        }
        if op == BinaryOp::Addition {
            if matches!(l_kind, TypeKind::Pointer(_)) && can_cast(store, rhs, const_i64) {
                return Ok(Value::Temporary(lt.with_quals(true, false)));
            }
            if matches!(r_kind, TypeKind::Pointer(_)) && can_cast(store, lhs, const_i64) {
                return Ok(Value::Temporary(rt.with_quals(true, false)));
            }
        }
        if op == BinaryOp::AdditionAssignment
            && matches!(l_kind, TypeKind::Pointer(_))
            && can_cast(store, rhs, const_i64)
            && !lt.is_const()
            && lhs.is_addressable()
        {
            return Ok(Value::Temporary(lt.with_quals(false, true)));
        }
        return Err(unknown_binary(store, op, lhs, rhs, index));
    }
    let (Some(lp), Some(rp)) = (lp, rp) else {
        return Err(unknown_binary(store, op, lhs, rhs, index));
    };

    if op.is_assignment() {
        let coerced = cast_value(store, rhs, lt)
            .ok_or_else(|| unknown_binary(store, op, lhs, rhs, index))?;
        binary_lookup(op, lhs, coerced)
            .ok_or_else(|| unknown_binary(store, op, lhs, rhs, index))
    } else {
        let lct = Type::primitive(least_common_type(lp, rp));
        let lhs_cast = cast_value(store, lhs, lct)
            .ok_or_else(|| unknown_binary(store, op, lhs, rhs, index))?;
        let rhs_cast = cast_value(store, rhs, lct)
            .ok_or_else(|| unknown_binary(store, op, lhs, rhs, index))?;
        binary_lookup(op, lhs_cast, rhs_cast)
            .ok_or_else(|| unknown_binary(store, op, lhs, rhs, index))
    }
}
