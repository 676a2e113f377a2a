//! Expression parsing and emission: the fourteen priority layers.
//!
//! Layer 1 collects assignment chains and reduces them right-to-left;
//! layers 2–11 are left-associative binary layers; 12 applies prefix
//! operators (including `new`/`delete`); 13 handles postfix, subscript,
//! call and member access; 14 parses atoms.
//!
//! Emission discipline: every sub-expression leaves exactly one evaluation
//! stack slot (an address for addressable values, the payload otherwise),
//! except void calls which leave none. Casts that apply to an
//! already-emitted left operand are spliced in at the recorded split point.

use babble_lexer::LexemeKind;

use crate::error::{CompileError, CompileResult};
use crate::ir::{FuncId, Node, Op};
use crate::sema::operators::{BinaryOp, UnaryPostfixOp, UnaryPrefixOp};
use crate::sema::signatures::{binary_operation, unary_postfix_operation, unary_prefix_operation};
use crate::sema::symbols::{Builtin, Storage};
use crate::sema::{Analyzer, ParamInfo};
use crate::types::casts::{
    can_cast, decimal_literal_value, emit_cast, integer_literal_value, least_common_type,
    numeric_literal_type, value_tag,
};
use crate::types::{PrimitiveType, Type, TypeKind, Value};

#[derive(Debug, Clone, Copy)]
enum CalleeKind {
    Func(FuncId),
    Builtin(Builtin),
}

/// Result of the atom layer: the value, plus callability information when
/// the atom was a bare function or builtin name (nothing is emitted for
/// those until we know whether a call follows).
#[derive(Debug)]
struct Atom {
    value: Option<Value>,
    callee: Option<(CalleeKind, usize)>,
}

impl Atom {
    fn value(value: Value) -> Self {
        Atom {
            value: Some(value),
            callee: None,
        }
    }
}

const ASSIGNMENT_LEXEMES: [(&str, BinaryOp); 11] = [
    ("=", BinaryOp::Assignment),
    ("<<=", BinaryOp::ShiftLeftAssignment),
    (">>=", BinaryOp::ShiftRightAssignment),
    ("+=", BinaryOp::AdditionAssignment),
    ("-=", BinaryOp::SubtractionAssignment),
    ("*=", BinaryOp::MultiplicationAssignment),
    ("/=", BinaryOp::DivisionAssignment),
    ("^=", BinaryOp::XorAssignment),
    ("|=", BinaryOp::OrAssignment),
    ("&=", BinaryOp::AndAssignment),
    ("%=", BinaryOp::ModulusAssignment),
];

/// The opcode computing a value-level binary operator.
fn arith_opcode(op: BinaryOp) -> Op {
    match op {
        BinaryOp::Multiplication => Op::Multiply,
        BinaryOp::Division => Op::Divide,
        BinaryOp::Modulus => Op::Modulus,
        BinaryOp::Addition => Op::Add,
        BinaryOp::Subtraction => Op::Subtract,
        BinaryOp::ShiftLeft => Op::BitwiseShiftLeft,
        BinaryOp::ShiftRight => Op::BitwiseShiftRight,
        BinaryOp::BitwiseAnd => Op::BitwiseAnd,
        BinaryOp::BitwiseOr => Op::BitwiseOr,
        BinaryOp::BitwiseXor => Op::BitwiseXor,
        BinaryOp::Less => Op::Less,
        BinaryOp::More => Op::More,
        BinaryOp::LessOrEqual => Op::LessOrEqual,
        BinaryOp::MoreOrEqual => Op::MoreOrEqual,
        BinaryOp::Equal => Op::Equal,
        BinaryOp::NotEqual => Op::NotEqual,
        _ => unreachable!("not a value-level operator: {op:?}"),
    }
}

impl Analyzer {
    pub(crate) fn expression(&mut self) -> CompileResult<Option<Value>> {
        self.priority1()
    }

    /// Assignments, right-to-left.
    fn priority1(&mut self) -> CompileResult<Option<Value>> {
        let first = self.priority2()?;
        let mut chain: Vec<(BinaryOp, Option<Value>, usize, usize)> =
            vec![(BinaryOp::Assignment, first, self.emit_len(), 0)];
        loop {
            let Some(op) = self.match_operator(&ASSIGNMENT_LEXEMES) else {
                break;
            };
            let op_idx = self.idx();
            self.advance();
            let value = self.priority2()?;
            chain.push((op, value, self.emit_len(), op_idx));
        }
        while chain.len() >= 2 {
            let (op, rhs, _, op_idx) = chain.pop().expect("chain len checked");
            let (prev_op, lhs, lsplit, prev_idx) = chain.pop().expect("chain len checked");
            let result = self.emit_binary(lhs, op, rhs, lsplit, op_idx)?;
            chain.push((prev_op, result, lsplit, prev_idx));
        }
        Ok(chain.pop().expect("chain never empty").1)
    }

    fn match_operator(&self, ops: &[(&str, BinaryOp)]) -> Option<BinaryOp> {
        if !self.is(LexemeKind::Operator) {
            return None;
        }
        ops.iter()
            .find(|(lexeme, _)| self.current().value == *lexeme)
            .map(|(_, op)| *op)
    }

    fn binary_layer(
        &mut self,
        ops: &[(&str, BinaryOp)],
        next: fn(&mut Analyzer) -> CompileResult<Option<Value>>,
    ) -> CompileResult<Option<Value>> {
        let mut lhs = next(self)?;
        let mut lsplit = self.emit_len();
        loop {
            let Some(op) = self.match_operator(ops) else {
                break;
            };
            let op_idx = self.idx();
            self.advance();
            let rhs = next(self)?;
            lhs = self.emit_binary(lhs, op, rhs, lsplit, op_idx)?;
            lsplit = self.emit_len();
        }
        Ok(lhs)
    }

    fn priority2(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(&[("&&", BinaryOp::LogicalAnd)], Self::priority3)
    }

    fn priority3(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(&[("||", BinaryOp::LogicalOr)], Self::priority4)
    }

    fn priority4(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(&[("&", BinaryOp::BitwiseAnd)], Self::priority5)
    }

    fn priority5(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(&[("|", BinaryOp::BitwiseOr)], Self::priority6)
    }

    fn priority6(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(&[("^", BinaryOp::BitwiseXor)], Self::priority7)
    }

    fn priority7(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(
            &[("==", BinaryOp::Equal), ("!=", BinaryOp::NotEqual)],
            Self::priority8,
        )
    }

    fn priority8(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(
            &[
                ("<", BinaryOp::Less),
                ("<=", BinaryOp::LessOrEqual),
                (">", BinaryOp::More),
                (">=", BinaryOp::MoreOrEqual),
            ],
            Self::priority9,
        )
    }

    fn priority9(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(
            &[("<<", BinaryOp::ShiftLeft), (">>", BinaryOp::ShiftRight)],
            Self::priority10,
        )
    }

    fn priority10(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(
            &[("+", BinaryOp::Addition), ("-", BinaryOp::Subtraction)],
            Self::priority11,
        )
    }

    fn priority11(&mut self) -> CompileResult<Option<Value>> {
        self.binary_layer(
            &[
                ("*", BinaryOp::Multiplication),
                ("/", BinaryOp::Division),
                ("%", BinaryOp::Modulus),
            ],
            Self::priority12,
        )
    }

    /// Prefix operators, collected then applied innermost-first.
    fn priority12(&mut self) -> CompileResult<Option<Value>> {
        let mut prefix_ops: Vec<(UnaryPrefixOp, usize)> = Vec::new();
        loop {
            if self.is(LexemeKind::Operator) {
                let op = match self.current().value.as_str() {
                    "+" => UnaryPrefixOp::Plus,
                    "-" => UnaryPrefixOp::Minus,
                    "++" => UnaryPrefixOp::Increment,
                    "--" => UnaryPrefixOp::Decrement,
                    "!" => UnaryPrefixOp::Invert,
                    "~" => UnaryPrefixOp::Tilda,
                    "&" => UnaryPrefixOp::AddressOf,
                    "*" => UnaryPrefixOp::Dereference,
                    _ => break,
                };
                prefix_ops.push((op, self.idx()));
                self.advance();
                continue;
            }
            if self.is_val(LexemeKind::Reserved, "new") {
                let value = self.parse_new()?;
                return self.apply_prefix(prefix_ops, Some(value));
            }
            if self.is_val(LexemeKind::Reserved, "delete") {
                let op_idx = self.idx();
                self.advance();
                let operand = self.priority12()?;
                let value = self.emit_delete(operand, op_idx)?;
                return self.apply_prefix(prefix_ops, value);
            }
            break;
        }
        let value = self.priority13()?;
        self.apply_prefix(prefix_ops, value)
    }

    fn apply_prefix(
        &mut self,
        ops: Vec<(UnaryPrefixOp, usize)>,
        mut value: Option<Value>,
    ) -> CompileResult<Option<Value>> {
        for (op, op_idx) in ops.into_iter().rev() {
            let val = value.ok_or_else(|| CompileError::UnknownOperator {
                index: op_idx,
                op: op.lexeme().to_string(),
                operands: "void".to_string(),
            })?;
            value = Some(self.emit_prefix(op, val, op_idx)?);
        }
        Ok(value)
    }

    fn emit_prefix(
        &mut self,
        op: UnaryPrefixOp,
        val: Value,
        op_idx: usize,
    ) -> CompileResult<Value> {
        match op {
            UnaryPrefixOp::AddressOf => {
                let (result, _) = unary_prefix_operation(self.types(), op, val, op_idx)?;
                // The operand's address is already the pointer value.
                Ok(result)
            }
            UnaryPrefixOp::Dereference => {
                let (result, _) = unary_prefix_operation(self.types(), op, val, op_idx)?;
                self.load_if_addressable(val);
                Ok(result)
            }
            UnaryPrefixOp::Increment | UnaryPrefixOp::Decrement => {
                let (result, _) = unary_prefix_operation(self.types(), op, val, op_idx)?;
                self.emit_inplace_step(val, op == UnaryPrefixOp::Increment);
                Ok(result)
            }
            UnaryPrefixOp::Plus
            | UnaryPrefixOp::Minus
            | UnaryPrefixOp::Invert
            | UnaryPrefixOp::Tilda => {
                let (result, matched) = unary_prefix_operation(self.types(), op, val, op_idx)?;
                self.emit_cast_to(val, matched);
                let tag = value_tag(self.types(), matched);
                match op {
                    UnaryPrefixOp::Minus => self.program.push_op(Op::Minus, tag),
                    UnaryPrefixOp::Invert => self.program.push_op(Op::Invert, tag),
                    UnaryPrefixOp::Tilda => self.program.push_op(Op::Tilda, tag),
                    _ => {}
                }
                Ok(result)
            }
            UnaryPrefixOp::New | UnaryPrefixOp::Delete => {
                Err(CompileError::internal("new/delete reach emit_prefix"))
            }
        }
    }

    /// `[addr]` → `[addr]` with the referent stepped by one (1.0 for
    /// floats). Both fixities of ++/-- share this and evaluate to the
    /// stepped reference.
    fn emit_inplace_step(&mut self, val: Value, increment: bool) {
        let tag = value_tag(self.types(), val.ty());
        let one = match tag {
            PrimitiveType::F32 => u64::from(1.0f32.to_bits()),
            PrimitiveType::F64 => 1.0f64.to_bits(),
            _ => 1,
        };
        self.program.push_op_untyped(Op::Duplicate);
        self.program.push_op(Op::Load, tag);
        self.program.push_operand(one);
        let op = if increment { Op::Add } else { Op::Subtract };
        self.program.push_op(op, tag);
        self.emit_store_keeping_address(tag);
    }

    /// `[addr, value]` → store value, keep the address as the result.
    fn emit_store_keeping_address(&mut self, tag: PrimitiveType) {
        self.program.push_op_untyped(Op::Save);
        self.program.push_op_untyped(Op::Duplicate);
        self.program.push_op_untyped(Op::Restore);
        self.program.push_op(Op::StoreAD, tag);
    }

    fn parse_new(&mut self) -> CompileResult<Value> {
        self.eat_val(LexemeKind::Reserved, "new")?;
        let base = self
            .type_no_const()?
            .ok_or(CompileError::VoidNotExpected { index: self.idx() })?;
        let elem_size = u64::from(self.types().size_of(base));
        if self.is_val(LexemeKind::Bracket, "[") {
            self.advance();
            let index = self.idx();
            let len = self.expression()?;
            let len = self.require_value(len, index, "uint32")?;
            let uint32 = Type::primitive(PrimitiveType::Uint32);
            self.expect_castable(len, uint32, index)?;
            self.emit_cast_to(len, uint32);
            self.eat_val(LexemeKind::Bracket, "]")?;
            // [n] -> descriptor address with the length written
            self.program.push_op_untyped(Op::Save);
            self.program.push_op_untyped(Op::Restore);
            self.program.push_operand(elem_size);
            self.program.push_op(Op::Multiply, PrimitiveType::Uint64);
            self.program.push_operand(4);
            self.program.push_op(Op::Add, PrimitiveType::Uint64);
            self.program.push_op_untyped(Op::New);
            self.program.push_op_untyped(Op::Duplicate);
            self.program.push_op_untyped(Op::Restore);
            self.program.push_op(Op::StoreAD, PrimitiveType::Uint32);
            Ok(Value::Temporary(
                self.types().array_of(base).with_const(true),
            ))
        } else {
            self.program.push_operand(elem_size);
            self.program.push_op_untyped(Op::New);
            Ok(Value::Temporary(
                self.types().pointer_to(base).with_const(true),
            ))
        }
    }

    fn emit_delete(&mut self, operand: Option<Value>, op_idx: usize) -> CompileResult<Option<Value>> {
        let val = self.require_value(operand, op_idx, "a pointer or an array")?;
        match self.types().kind(val.ty()) {
            TypeKind::Pointer(pointee) => {
                self.load_if_addressable(val);
                self.program
                    .push_operand(u64::from(self.types().size_of(pointee)));
                self.program.push_op_untyped(Op::Delete);
                Ok(None)
            }
            TypeKind::Array(element) => {
                self.load_if_addressable(val);
                self.program.push_op_untyped(Op::Duplicate);
                self.program.push_op(Op::Load, PrimitiveType::Uint32);
                self.program
                    .push_operand(u64::from(self.types().size_of(element)));
                self.program.push_op(Op::Multiply, PrimitiveType::Uint64);
                self.program.push_operand(4);
                self.program.push_op(Op::Add, PrimitiveType::Uint64);
                self.program.push_op_untyped(Op::Delete);
                Ok(None)
            }
            _ => Err(CompileError::UnknownOperator {
                index: op_idx,
                op: "delete".to_string(),
                operands: self.types().display(val.ty()),
            }),
        }
    }

    /// Postfix layer: subscript, call, member access, ++/--.
    fn priority13(&mut self) -> CompileResult<Option<Value>> {
        let atom = self.priority14()?;
        let mut value: Option<Value> = match atom.callee {
            Some((CalleeKind::Func(fid), callee_idx)) => {
                if self.is_val(LexemeKind::Parenthesis, "(") {
                    self.call_function(fid, true, callee_idx)?
                } else {
                    // Used as a value: materialise the entry address.
                    let name = self.funcs[fid.0].name.clone();
                    self.program.push_symbolic(name, fid);
                    atom.value
                }
            }
            Some((CalleeKind::Builtin(builtin), callee_idx)) => {
                if self.is_val(LexemeKind::Parenthesis, "(") {
                    self.call_builtin(builtin, callee_idx)?
                } else {
                    return Err(CompileError::ExpectedFunction {
                        index: callee_idx,
                        got: "a builtin that must be called directly".to_string(),
                    });
                }
            }
            None => atom.value,
        };

        loop {
            if self.is_val(LexemeKind::Bracket, "[") {
                value = Some(self.emit_subscript(value)?);
            } else if self.is_val(LexemeKind::Parenthesis, "(") {
                let index = self.idx();
                let val = self.require_value(value, index, "a function")?;
                return Err(match self.types().kind(val.ty()) {
                    TypeKind::Function { .. } => CompileError::ExpectedFunction {
                        index,
                        got: self.types().display(val.ty()),
                    },
                    _ => CompileError::TypeNotCallable { index },
                });
            } else if self.is_val(LexemeKind::Operator, ".") {
                value = Some(self.emit_member(value)?);
            } else if self.is_val(LexemeKind::Operator, "++")
                || self.is_val(LexemeKind::Operator, "--")
            {
                let op = if self.is_val(LexemeKind::Operator, "++") {
                    UnaryPostfixOp::Increment
                } else {
                    UnaryPostfixOp::Decrement
                };
                let op_idx = self.idx();
                let val = self.require_value(value, op_idx, "a value")?;
                let (result, _) = unary_postfix_operation(self.types(), val, op, op_idx)?;
                self.advance();
                self.emit_inplace_step(val, op == UnaryPostfixOp::Increment);
                value = Some(result);
            } else {
                break;
            }
        }
        Ok(value)
    }

    fn emit_subscript(&mut self, value: Option<Value>) -> CompileResult<Value> {
        let index = self.idx();
        let val = self.require_value(value, index, "an array")?;
        let TypeKind::Array(element) = self.types().kind(val.ty()) else {
            return Err(CompileError::TypeNotIndexed { index });
        };
        self.load_if_addressable(val);
        self.advance();
        let sub_idx = self.idx();
        let sub = self.expression()?;
        let sub = self.require_value(sub, sub_idx, "uint32")?;
        let uint32 = Type::primitive(PrimitiveType::Uint32);
        self.expect_castable(sub, uint32, sub_idx)?;
        self.emit_cast_to(sub, uint32);
        self.eat_val(LexemeKind::Bracket, "]")?;

        self.program
            .push_operand(u64::from(self.types().size_of(element)));
        self.program.push_op(Op::Multiply, PrimitiveType::Uint64);
        self.program.push_op(Op::Add, PrimitiveType::Uint64);
        self.program.push_operand(4);
        self.program.push_op(Op::Add, PrimitiveType::Uint64);

        let is_const = val.ty().is_const() || element.is_const();
        Ok(Value::Temporary(element.with_quals(is_const, true)))
    }

    fn emit_member(&mut self, value: Option<Value>) -> CompileResult<Value> {
        let index = self.idx();
        let val = self.require_value(value, index, "a struct")?;
        if !matches!(self.types().kind(val.ty()), TypeKind::Complex { .. }) {
            return Err(CompileError::TypeNoMembers { index });
        }
        self.advance();
        self.expect(LexemeKind::Identifier)?;
        let name = self.current().value.clone();
        let name_index = self.idx();
        let Some((offset, field_ty)) = self.types().field_of(val.ty(), &name) else {
            return Err(CompileError::TypeUnknownMember {
                index: name_index,
                name,
            });
        };
        self.advance();
        if offset > 0 {
            self.program.push_operand(offset);
            self.program.push_op(Op::Add, PrimitiveType::Uint64);
        }
        Ok(Value::Temporary(
            field_ty.with_quals(val.ty().is_const(), true),
        ))
    }

    /// Atoms: literals, identifiers, parenthesised expressions.
    fn priority14(&mut self) -> CompileResult<Atom> {
        if self.is(LexemeKind::NumericLiteral) {
            let text = self.current().value.clone();
            let kind = numeric_literal_type(&text);
            let bits = if kind.is_float() {
                decimal_literal_value(&text, kind)
            } else {
                integer_literal_value(&text, kind)
            };
            self.program.push_operand(bits);
            self.advance();
            return Ok(Atom::value(Value::Temporary(
                Type::primitive(kind).with_const(true),
            )));
        }
        if self.is(LexemeKind::Identifier) {
            let name = self.current().value.clone();
            let index = self.idx();
            let Some(symbol) = self.symbols.lookup_variable(&name) else {
                return Err(CompileError::UndeclaredIdentifier { index, name });
            };
            self.advance();
            return Ok(match symbol.storage {
                Storage::Frame { .. } => Atom::value(self.emit_variable_use(symbol)?),
                Storage::Func(fid) => Atom {
                    value: Some(Value::Temporary(symbol.ty.with_const(true))),
                    callee: Some((CalleeKind::Func(fid), index)),
                },
                Storage::Builtin(builtin) => Atom {
                    value: None,
                    callee: Some((CalleeKind::Builtin(builtin), index)),
                },
            });
        }
        if self.is(LexemeKind::StringLiteral) {
            let text = self.current().value.clone();
            self.advance();
            return Ok(Atom::value(self.emit_string_literal(&text)));
        }
        if self.is_val(LexemeKind::Reserved, "true") || self.is_val(LexemeKind::Reserved, "false") {
            let truth = self.current().value == "true";
            self.program.push_operand(u64::from(truth));
            self.advance();
            return Ok(Atom::value(Value::Temporary(
                Type::primitive(PrimitiveType::Bool).with_const(true),
            )));
        }
        self.expect_val(LexemeKind::Parenthesis, "(")?;
        self.advance();
        let value = self.expression()?;
        self.eat_val(LexemeKind::Parenthesis, ")")?;
        Ok(Atom {
            value,
            callee: None,
        })
    }

    /// A char-array descriptor built on the heap at runtime.
    fn emit_string_literal(&mut self, text: &str) -> Value {
        let bytes = text.as_bytes();
        let len = bytes.len() as u64;
        self.program.push_operand(len + 4);
        self.program.push_op_untyped(Op::New);
        self.program.push_op_untyped(Op::Duplicate);
        self.program.push_operand(len);
        self.program.push_op(Op::StoreAD, PrimitiveType::Uint32);
        for (i, byte) in bytes.iter().enumerate() {
            self.program.push_op_untyped(Op::Duplicate);
            self.program.push_operand(4 + i as u64);
            self.program.push_op(Op::Add, PrimitiveType::Uint64);
            self.program.push_operand(u64::from(*byte));
            self.program.push_op(Op::StoreAD, PrimitiveType::Char);
        }
        Value::Temporary(
            self.types()
                .array_of(Type::primitive(PrimitiveType::Char))
                .with_const(true),
        )
    }

    // ===== binary emission =====

    /// Validate via the signature tables, then emit. `lsplit` is the
    /// stream index right after the left operand's code; casts the left
    /// side needs are spliced in there.
    fn emit_binary(
        &mut self,
        lhs: Option<Value>,
        op: BinaryOp,
        rhs: Option<Value>,
        lsplit: usize,
        op_idx: usize,
    ) -> CompileResult<Option<Value>> {
        let (Some(lhs), Some(rhs)) = (lhs, rhs) else {
            return Err(CompileError::UnknownOperator {
                index: op_idx,
                op: op.lexeme().to_string(),
                operands: "void".to_string(),
            });
        };
        let result = binary_operation(self.types(), lhs, op, rhs, op_idx)?;
        let lt = lhs.ty();
        let lp = self.types().primitive_of(lt);
        let rp = self.types().primitive_of(rhs.ty());

        if let (Some(lp), Some(rp)) = (lp, rp) {
            if op == BinaryOp::Assignment {
                let tag = value_tag(self.types(), lt);
                self.warn_if_lossy(rhs, lt.erased(), op_idx);
                self.emit_cast_to(rhs, lt.erased());
                self.emit_store_keeping_address(tag);
            } else if let Some(base) = op.compound_base() {
                let tag = value_tag(self.types(), lt);
                self.insert_nodes(
                    lsplit,
                    vec![
                        Node::Operator(Op::Duplicate, PrimitiveType::Unknown),
                        Node::Operator(Op::Load, tag),
                    ],
                );
                self.warn_if_lossy(rhs, lt.erased(), op_idx);
                self.emit_cast_to(rhs, lt.erased());
                self.program.push_op(arith_opcode(base), tag);
                self.emit_store_keeping_address(tag);
            } else {
                let lct = least_common_type(lp, rp);
                let lct_ty = Type::primitive(lct);
                let logical = matches!(op, BinaryOp::LogicalAnd | BinaryOp::LogicalOr);
                let mut pre = Vec::new();
                emit_cast(self.types(), lhs, lct_ty, &mut pre);
                if logical {
                    pre.push(Node::Operator(Op::ToBool, lct));
                }
                self.insert_nodes(lsplit, pre);
                self.emit_cast_to(rhs, lct_ty);
                if logical {
                    self.program.push_op(Op::ToBool, lct);
                }
                let (opcode, tag) = match op {
                    BinaryOp::LogicalAnd => (Op::BitwiseAnd, PrimitiveType::Bool),
                    BinaryOp::LogicalOr => (Op::BitwiseOr, PrimitiveType::Bool),
                    _ => (arith_opcode(op), lct),
                };
                self.program.push_op(opcode, tag);
            }
            return Ok(Some(result));
        }

        let l_kind = self.types().kind(lt);
        let r_kind = self.types().kind(rhs.ty());
        let i64_ty = Type::primitive(PrimitiveType::Int64);
        match op {
            BinaryOp::Assignment => {
                if matches!(l_kind, TypeKind::Complex { .. }) {
                    // [dst, src] -> byte copy, keep dst
                    self.insert_nodes(
                        lsplit,
                        vec![Node::Operator(Op::Duplicate, PrimitiveType::Unknown)],
                    );
                    self.program.push_operand(u64::from(self.types().size_of(lt)));
                    self.program.push_op_untyped(Op::CopyTF);
                } else {
                    // address-sized scalar (pointer, array, function)
                    self.load_if_addressable(rhs);
                    self.emit_store_keeping_address(PrimitiveType::Uint64);
                }
            }
            BinaryOp::Subtraction => {
                let TypeKind::Pointer(pointee) = l_kind else {
                    return Err(CompileError::internal("pointer difference without pointers"));
                };
                let mut pre = Vec::new();
                if lhs.is_addressable() {
                    pre.push(Node::Operator(Op::Load, PrimitiveType::Uint64));
                }
                self.insert_nodes(lsplit, pre);
                self.load_if_addressable(rhs);
                self.program.push_op(Op::Subtract, PrimitiveType::Uint64);
                self.program
                    .push_operand(u64::from(self.types().size_of(pointee)));
                self.program.push_op(Op::Divide, PrimitiveType::Int64);
            }
            BinaryOp::Addition => {
                if let TypeKind::Pointer(pointee) = l_kind {
                    let mut pre = Vec::new();
                    if lhs.is_addressable() {
                        pre.push(Node::Operator(Op::Load, PrimitiveType::Uint64));
                    }
                    self.insert_nodes(lsplit, pre);
                    self.emit_cast_to(rhs, i64_ty);
                    self.program
                        .push_operand(u64::from(self.types().size_of(pointee)));
                    self.program.push_op(Op::Multiply, PrimitiveType::Int64);
                    self.program.push_op(Op::Add, PrimitiveType::Uint64);
                } else {
                    let TypeKind::Pointer(pointee) = r_kind else {
                        return Err(CompileError::internal("pointer addition without a pointer"));
                    };
                    let mut pre = Vec::new();
                    emit_cast(self.types(), lhs, i64_ty, &mut pre);
                    pre.push(Node::Operand(u64::from(self.types().size_of(pointee))));
                    pre.push(Node::Operator(Op::Multiply, PrimitiveType::Int64));
                    self.insert_nodes(lsplit, pre);
                    self.load_if_addressable(rhs);
                    self.program.push_op(Op::Add, PrimitiveType::Uint64);
                }
            }
            BinaryOp::AdditionAssignment => {
                let TypeKind::Pointer(pointee) = l_kind else {
                    return Err(CompileError::internal("pointer bump without a pointer"));
                };
                self.insert_nodes(
                    lsplit,
                    vec![
                        Node::Operator(Op::Duplicate, PrimitiveType::Unknown),
                        Node::Operator(Op::Load, PrimitiveType::Uint64),
                    ],
                );
                self.emit_cast_to(rhs, i64_ty);
                self.program
                    .push_operand(u64::from(self.types().size_of(pointee)));
                self.program.push_op(Op::Multiply, PrimitiveType::Int64);
                self.program.push_op(Op::Add, PrimitiveType::Uint64);
                self.emit_store_keeping_address(PrimitiveType::Uint64);
            }
            _ => {
                return Err(CompileError::internal(
                    "non-primitive operator emission out of sync with dispatch",
                ))
            }
        }
        Ok(Some(result))
    }

    // ===== calls =====

    fn coerce_call_arg(
        &mut self,
        val: Value,
        param: &ParamInfo,
        arg_idx: usize,
        fname: &str,
    ) -> CompileResult<()> {
        let mismatch = |s: &Analyzer| CompileError::FunctionParameterListDoesNotMatch {
            index: arg_idx,
            func: fname.to_string(),
            provided: s.types().display(val.ty()),
        };
        if param.ty.is_ref() {
            // by reference: the argument address itself is stored
            if !can_cast(self.types(), val, param.ty) {
                return Err(mismatch(self));
            }
            return Ok(());
        }
        let stripped = Value::Temporary(val.ty().erased());
        if !can_cast(self.types(), stripped, param.ty.erased()) {
            return Err(mismatch(self));
        }
        if matches!(self.types().kind(param.ty), TypeKind::Complex { .. }) {
            // copied into the frame by the call sequence
            return Ok(());
        }
        self.warn_if_lossy(val, param.ty.erased(), arg_idx);
        self.emit_cast_to(val, param.ty.erased());
        Ok(())
    }

    /// Emit a full call to `fid`. With `parse_args` the cursor sits on the
    /// opening parenthesis; without it (the implicit `main` call) nothing
    /// is parsed and only defaults are evaluated.
    pub(crate) fn call_function(
        &mut self,
        fid: FuncId,
        parse_args: bool,
        index: usize,
    ) -> CompileResult<Option<Value>> {
        let (name, ret, required, params, defaults, done, frame_size) = {
            let def = &self.funcs[fid.0];
            (
                def.name.clone(),
                def.ret,
                def.required,
                def.params.clone(),
                def.defaults.clone(),
                def.done,
                def.frame_size,
            )
        };

        let mut provided = 0usize;
        if parse_args {
            self.eat_val(LexemeKind::Parenthesis, "(")?;
            if !self.is_val(LexemeKind::Parenthesis, ")") {
                loop {
                    let arg_idx = self.idx();
                    let value = self.expression()?;
                    let value = self.require_value(value, arg_idx, "an argument")?;
                    if provided >= params.len() {
                        return Err(CompileError::FunctionParameterListDoesNotMatch {
                            index: arg_idx,
                            func: name,
                            provided: self.types().display(value.ty()),
                        });
                    }
                    let param = params[provided].clone();
                    self.coerce_call_arg(value, &param, arg_idx, &name)?;
                    provided += 1;
                    if self.is_val(LexemeKind::Punctuation, ",") {
                        self.advance();
                        continue;
                    }
                    break;
                }
            }
            self.eat_val(LexemeKind::Parenthesis, ")")?;
        }
        if provided < required {
            return Err(CompileError::FunctionParameterListDoesNotMatch {
                index,
                func: name,
                provided: format!("{provided} argument(s)"),
            });
        }

        // Missing defaults are evaluated at the call site, in order.
        for j in provided..params.len() {
            let range = defaults[j - required].clone();
            let resume = self.position();
            self.set_position(range.start);
            let arg_idx = self.idx();
            let value = self.expression()?;
            let value = self.require_value(value, arg_idx, "a default value")?;
            if self.position() != range.end {
                return Err(CompileError::internal("default parameter replay drifted"));
            }
            self.set_position(resume);
            let param = params[j].clone();
            self.coerce_call_arg(value, &param, arg_idx, &name)?;
        }

        // Activate the callee frame; its size may still be growing when
        // the callee is the function currently being compiled.
        let size_idx = self.emit_len();
        if done {
            self.program.push_operand(frame_size);
        } else {
            self.program.push_operand(0);
            self.funcs[fid.0].size_patches.push(size_idx);
        }
        self.program.push_symbolic(name.clone(), fid);
        self.program.push_op_untyped(Op::Push);

        // Store the evaluated arguments into the frame, last first.
        for param in params.iter().rev() {
            if matches!(self.types().kind(param.ty), TypeKind::Complex { .. })
                && !param.ty.is_ref()
            {
                self.program.push_relative(param.offset);
                self.program.push_op_untyped(Op::FromSp);
                self.program
                    .push_operand(u64::from(self.types().size_of(param.ty)));
                self.program.push_op_untyped(Op::CopyFT);
            } else {
                let tag = if param.ty.is_ref() {
                    PrimitiveType::Uint64
                } else {
                    value_tag(self.types(), param.ty)
                };
                self.program.push_relative(param.offset);
                self.program.push_op_untyped(Op::FromSp);
                self.program.push_op(Op::StoreDA, tag);
            }
        }

        // Return pc into the frame header, then transfer control.
        let ret_operand = self.emit_len();
        self.program.push_operand(0);
        self.program.push_relative(0);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::StoreDA, PrimitiveType::Uint64);
        self.program.push_symbolic(name, fid);
        self.program.push_op_untyped(Op::Call);
        let call_idx = self.emit_len() - 1;
        self.patch_return_pc(ret_operand, call_idx);

        // Read the return slot while the callee frame is still active.
        match ret {
            None => {
                self.program.push_op_untyped(Op::Pop);
                Ok(None)
            }
            Some(r) if matches!(self.types().kind(r), TypeKind::Complex { .. }) => {
                self.program.push_relative(9);
                self.program.push_op_untyped(Op::FromSp);
                self.program.push_op_untyped(Op::Pop);
                Ok(Some(Value::Temporary(r.with_ref(true))))
            }
            Some(r) => {
                self.program.push_relative(9);
                self.program.push_op_untyped(Op::FromSp);
                let tag = if r.is_ref() {
                    PrimitiveType::Uint64
                } else {
                    value_tag(self.types(), r)
                };
                self.program.push_op(Op::Load, tag);
                self.program.push_op_untyped(Op::Pop);
                Ok(Some(Value::Temporary(r)))
            }
        }
    }

    fn call_builtin(&mut self, builtin: Builtin, _index: usize) -> CompileResult<Option<Value>> {
        self.eat_val(LexemeKind::Parenthesis, "(")?;
        let arg_idx = self.idx();
        let value = self.expression()?;
        let value = self.require_value(value, arg_idx, "a char array")?;
        let char_array = self
            .types()
            .array_of(Type::primitive(PrimitiveType::Char));
        let stripped = Value::Temporary(value.ty().erased());
        let fname = match builtin {
            Builtin::Print => "print",
            Builtin::Read => "read",
        };
        if !can_cast(self.types(), stripped, char_array) {
            return Err(CompileError::FunctionParameterListDoesNotMatch {
                index: arg_idx,
                func: fname.to_string(),
                provided: self.types().display(value.ty()),
            });
        }
        match builtin {
            Builtin::Print => {
                self.load_if_addressable(value);
                self.program.push_op_untyped(Op::Write);
            }
            Builtin::Read => {
                // `read` stores a fresh descriptor into the variable slot.
                if !value.is_addressable() || value.ty().is_const() {
                    return Err(CompileError::FunctionParameterListDoesNotMatch {
                        index: arg_idx,
                        func: fname.to_string(),
                        provided: self.types().display(value.ty()),
                    });
                }
                self.program.push_op_untyped(Op::Read);
            }
        }
        self.eat_val(LexemeKind::Parenthesis, ")")?;
        Ok(None)
    }
}
