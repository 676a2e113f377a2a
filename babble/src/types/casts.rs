//! Assignability, promotion, and cast code emission.
//!
//! `cast_kind` answers whether a value can become a type (and at what
//! cost), `least_common_type` picks the promotion target for binary
//! operators, and `emit_cast` appends the minimum opcode sequence that
//! materialises the target representation on the evaluation stack.

use once_cell::sync::Lazy;

use crate::ir::{Node, Op};
use crate::types::{PrimitiveType, Type, TypeKind, TypeStore, Value};

/// Outcome of an assignability query. The integer coding (−1/0/1) of the
/// original table survives only in the ordering used by tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum CastKind {
    Impossible,
    Lossy,
    Exact,
}

/// Promotion ranks: bool/char sit below the integer ladder, floats on top.
static RANK: Lazy<[u8; 12]> = Lazy::new(|| {
    let mut rank = [0u8; 12];
    rank[PrimitiveType::Bool as usize] = 0;
    rank[PrimitiveType::Char as usize] = 0;
    rank[PrimitiveType::Int8 as usize] = 1;
    rank[PrimitiveType::Uint8 as usize] = 2;
    rank[PrimitiveType::Int16 as usize] = 3;
    rank[PrimitiveType::Uint16 as usize] = 4;
    rank[PrimitiveType::Int32 as usize] = 5;
    rank[PrimitiveType::Uint32 as usize] = 6;
    rank[PrimitiveType::Int64 as usize] = 7;
    rank[PrimitiveType::Uint64 as usize] = 8;
    rank[PrimitiveType::F32 as usize] = 9;
    rank[PrimitiveType::F64 as usize] = 10;
    rank
});

/// The smallest primitive both operands promote to: the higher-ranked of
/// the two, except that the rank-0 pair {bool, char} promotes to int8.
pub fn least_common_type(lhs: PrimitiveType, rhs: PrimitiveType) -> PrimitiveType {
    if lhs == rhs {
        return lhs;
    }
    let (lr, rr) = (RANK[lhs as usize], RANK[rhs as usize]);
    if lr == 0 && rr == 0 {
        return PrimitiveType::Int8;
    }
    if lr < rr {
        rhs
    } else {
        lhs
    }
}

/// Can `from` become `to`, and does it lose information?
///
/// Qualifier rules: const may not be dropped, and a value without an
/// address (a plain temporary) cannot bind to a reference. Variants must
/// match; within a variant, pointers pun freely, arrays need erased
/// element equality, complex and function types need erased equality, and
/// primitives compare sizes.
pub fn cast_kind(store: &TypeStore, from: Value, to: Type) -> CastKind {
    let from_ty = from.ty();
    if (from_ty.is_const() && !to.is_const()) || (!from.is_addressable() && to.is_ref()) {
        return CastKind::Impossible;
    }
    match (store.kind(from_ty), store.kind(to)) {
        (TypeKind::Primitive(f), TypeKind::Primitive(t)) => {
            if f.size() <= t.size() {
                CastKind::Exact
            } else {
                CastKind::Lossy
            }
        }
        (TypeKind::Pointer(_), TypeKind::Pointer(_)) => CastKind::Exact,
        (TypeKind::Array(f), TypeKind::Array(t)) => {
            if f.erased() == t.erased() {
                CastKind::Exact
            } else {
                CastKind::Impossible
            }
        }
        (TypeKind::Complex { .. }, TypeKind::Complex { .. })
        | (TypeKind::Function { .. }, TypeKind::Function { .. }) => {
            if from_ty.same_erased(to) {
                CastKind::Exact
            } else {
                CastKind::Impossible
            }
        }
        _ => CastKind::Impossible,
    }
}

pub fn can_cast(store: &TypeStore, from: Value, to: Type) -> bool {
    cast_kind(store, from, to) != CastKind::Impossible
}

pub fn can_cast_lossless(store: &TypeStore, from: Value, to: Type) -> bool {
    cast_kind(store, from, to) == CastKind::Exact
}

/// Analysis-level cast: the target first inherits the source qualifiers
/// (so const-ness never blocks a pure value conversion), then the result
/// is a const non-reference temporary unless nothing changed at all.
pub fn cast_value(store: &TypeStore, val: Value, to: Type) -> Option<Value> {
    let to = to.with_quals(val.ty().is_const(), val.ty().is_ref());
    if !can_cast(store, val, to) {
        return None;
    }
    if val.ty() == to {
        Some(val)
    } else {
        Some(Value::Temporary(to.with_quals(true, false)))
    }
}

/// The primitive width tag describing how a type's stack payload is
/// interpreted: primitives by their kind, address-sized types as uint64.
/// Complex types have no single payload and tag as unknown.
pub fn value_tag(store: &TypeStore, ty: Type) -> PrimitiveType {
    match store.kind(ty) {
        TypeKind::Primitive(p) => p,
        TypeKind::Pointer(_) | TypeKind::Array(_) | TypeKind::Function { .. } => {
            PrimitiveType::Uint64
        }
        TypeKind::Complex { .. } => PrimitiveType::Unknown,
    }
}

/// Append the opcodes that turn `from`'s stack payload into `to`'s.
///
/// 1. A reference source for a non-reference target is loaded.
/// 2. Matching widths stop there.
/// 3. From/to f64 is a single conversion; to bool a zero test; to a
///    64-bit integer a sign-aware widening.
/// 4. f32 on either side round-trips through f64; anything else widens to
///    int64 and masks down to the target width.
pub fn emit_cast(store: &TypeStore, from: Value, to: Type, out: &mut Vec<Node>) {
    let from_ref = from.is_addressable();
    if from_ref && to.is_ref() {
        return;
    }
    let from_tag = value_tag(store, from.ty());
    let to_tag = value_tag(store, to);
    if from_ref {
        out.push(Node::Operator(Op::Load, from_tag));
    }
    if from_tag == to_tag {
        return;
    }
    if from_tag == PrimitiveType::F64 {
        out.push(Node::Operator(Op::FromF64, to_tag));
    } else if to_tag == PrimitiveType::F64 {
        out.push(Node::Operator(Op::ToF64, from_tag));
    } else if to_tag == PrimitiveType::Bool {
        out.push(Node::Operator(Op::ToBool, from_tag));
    } else if to_tag == PrimitiveType::Int64 || to_tag == PrimitiveType::Uint64 {
        out.push(Node::Operator(Op::ToInt64, from_tag));
    } else if to_tag == PrimitiveType::F32 || from_tag == PrimitiveType::F32 {
        out.push(Node::Operator(Op::ToF64, from_tag));
        out.push(Node::Operator(Op::FromF64, to_tag));
    } else {
        out.push(Node::Operator(Op::ToInt64, from_tag));
        out.push(Node::Operand((1u64 << (8 * to_tag.size())) - 1));
        out.push(Node::Operator(Op::BitwiseAnd, PrimitiveType::Uint64));
    }
}

/// The primitive kind of a numeric literal, decided by its textual form:
/// decimals are f64 (`f` suffix: f32), integers default to int32, a bare
/// `u` suffix gives uint32, and `t`/`s`/`i`/`l` pick the width with an
/// optional trailing `u` for unsigned.
pub fn numeric_literal_type(text: &str) -> PrimitiveType {
    if text.contains('.') {
        return if text.ends_with('f') {
            PrimitiveType::F32
        } else {
            PrimitiveType::F64
        };
    }
    let digits = text.strip_prefix("0x").unwrap_or(text);
    let mut suffix = digits
        .trim_start_matches(|c: char| c.is_ascii_hexdigit())
        .chars()
        .rev();
    let mut unsigned = false;
    let mut width = None;
    if let Some(c) = suffix.next() {
        if c == 'u' || c == 'U' {
            unsigned = true;
            width = suffix.next();
        } else {
            width = Some(c);
        }
    }
    match width.map(|c| c.to_ascii_lowercase()) {
        Some('t') => {
            if unsigned {
                PrimitiveType::Uint8
            } else {
                PrimitiveType::Int8
            }
        }
        Some('s') => {
            if unsigned {
                PrimitiveType::Uint16
            } else {
                PrimitiveType::Int16
            }
        }
        Some('i') => {
            if unsigned {
                PrimitiveType::Uint32
            } else {
                PrimitiveType::Int32
            }
        }
        Some('l') => {
            if unsigned {
                PrimitiveType::Uint64
            } else {
                PrimitiveType::Int64
            }
        }
        _ => {
            if unsigned {
                PrimitiveType::Uint32
            } else {
                PrimitiveType::Int32
            }
        }
    }
}

/// Parse an integer literal into its masked bit pattern.
pub fn integer_literal_value(text: &str, ty: PrimitiveType) -> u64 {
    let (digits, base) = match text.strip_prefix("0x") {
        Some(rest) => (rest, 16),
        None => (text, 10),
    };
    let mut value: u64 = 0;
    for c in digits.chars() {
        let Some(d) = c.to_digit(base) else { break };
        value = value.wrapping_mul(u64::from(base)).wrapping_add(u64::from(d));
    }
    prune_literal(value, ty)
}

/// Parse a decimal literal into its IEEE bit pattern.
pub fn decimal_literal_value(text: &str, ty: PrimitiveType) -> u64 {
    let digits = text.strip_suffix('f').unwrap_or(text);
    let value: f64 = digits.parse().unwrap_or(0.0);
    match ty {
        PrimitiveType::F32 => u64::from((value as f32).to_bits()),
        _ => value.to_bits(),
    }
}

fn prune_literal(value: u64, ty: PrimitiveType) -> u64 {
    let size = ty.size();
    if size == 8 {
        value
    } else {
        value & ((1u64 << (8 * size)) - 1)
    }
}
