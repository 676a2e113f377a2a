//! Declarations: types, declarators, variable and function definitions,
//! struct declarations.

use babble_lexer::LexemeKind;

use crate::error::{CompileError, CompileResult};
use crate::ir::{FuncId, Node, Op};
use crate::sema::symbols::{Storage, VarSymbol};
use crate::sema::{Analyzer, FunctionDef, ParamInfo};
use crate::types::casts::{can_cast, value_tag};
use crate::types::{PrimitiveType, Type, TypeKind};

/// What a declarator's bracket size expressions should do with their
/// emitted code.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum DeclMode {
    /// Leave the evaluated lengths on the stack for array allocation.
    Alloc,
    /// Type-check only; roll the emitted code back (parameters, fields).
    Discard,
}

impl Analyzer {
    /// `[const] base [&]`; returns `None` for plain `void`.
    pub(crate) fn type_(&mut self) -> CompileResult<Option<Type>> {
        let mut is_const = false;
        if self.is_val(LexemeKind::Reserved, "const") {
            self.advance();
            is_const = true;
        }
        let base = self.type_no_const()?;
        let mut is_ref = false;
        if self.is_val(LexemeKind::Operator, "&") {
            self.advance();
            is_ref = true;
        }
        match base {
            Some(t) => Ok(Some(t.with_quals(is_const, is_ref))),
            None if is_const || is_ref => Err(CompileError::VoidNotExpected { index: self.idx() }),
            None => Ok(None),
        }
    }

    /// A type keyword or a declared struct name.
    pub(crate) fn type_no_const(&mut self) -> CompileResult<Option<Type>> {
        if self.is(LexemeKind::VariableType) {
            let name = self.current().value.clone();
            self.advance();
            if name == "void" {
                return Ok(None);
            }
            let kind = PrimitiveType::from_name(&name)
                .ok_or_else(|| CompileError::internal(format!("unmapped type name '{name}'")))?;
            return Ok(Some(Type::primitive(kind)));
        }
        if self.is(LexemeKind::Identifier) {
            let name = self.current().value.clone();
            let index = self.idx();
            return match self.symbols.lookup_struct(&name) {
                Some(ty) => {
                    self.advance();
                    Ok(Some(ty))
                }
                None => Err(CompileError::UndeclaredIdentifier { index, name }),
            };
        }
        Err(self.unexpected("a type name"))
    }

    /// A declarator: `*`s, an (optionally parenthesised) name, then array
    /// brackets. Returns the name, the derived type, the number of bracket
    /// lengths left on the stack (Alloc mode), and the name's byte index.
    pub(crate) fn variable_identifier(
        &mut self,
        base: Type,
        mode: DeclMode,
    ) -> CompileResult<(String, Type, u32, usize)> {
        let mut stars = 0u32;
        while self.is_val(LexemeKind::Operator, "*") {
            stars += 1;
            self.advance();
        }
        let (name, mut ty, mut brackets, name_index) =
            if self.is_val(LexemeKind::Parenthesis, "(") {
                self.advance();
                let inner = self.variable_identifier(base, mode)?;
                self.eat_val(LexemeKind::Parenthesis, ")")?;
                inner
            } else {
                self.expect(LexemeKind::Identifier)?;
                let name = self.current().value.clone();
                let name_index = self.idx();
                self.advance();
                (name, base, 0, name_index)
            };
        for _ in 0..stars {
            ty = self.types().pointer_to(ty);
        }
        while self.is_val(LexemeKind::Bracket, "[") {
            self.advance();
            // `[]` derives the array type without allocating a descriptor
            // (the variable will be bound to one later, e.g. from `new`).
            if self.is_val(LexemeKind::Bracket, "]") {
                self.advance();
                ty = self.types().array_of(ty);
                continue;
            }
            let index = self.idx();
            let before = self.emit_len();
            let len = self.expression()?;
            let len = self.require_value(len, index, "uint32")?;
            let uint32 = Type::primitive(PrimitiveType::Uint32);
            self.expect_castable(len, uint32, index)?;
            match mode {
                DeclMode::Alloc => {
                    self.emit_cast_to(len, uint32);
                    brackets += 1;
                }
                DeclMode::Discard => self.truncate_program(before),
            }
            self.eat_val(LexemeKind::Bracket, "]")?;
            ty = self.types().array_of(ty);
        }
        Ok((name, ty, brackets, name_index))
    }

    /// A parameter-style declarator: type + declarator, no allocation.
    pub(crate) fn variable_parameter(&mut self) -> CompileResult<(String, Type, usize)> {
        let ty = self
            .type_()?
            .ok_or(CompileError::VoidNotExpected { index: self.idx() })?;
        let (name, ty, _, name_index) = self.variable_identifier(ty, DeclMode::Discard)?;
        Ok((name, ty, name_index))
    }

    /// A full definition statement: either a function definition or a
    /// comma-separated run of variable declarators with initialisers.
    pub(crate) fn definition_add_to_scope(&mut self) -> CompileResult<()> {
        let base = self.type_()?;

        if self.is(LexemeKind::Identifier) && self.peek_is(LexemeKind::Parenthesis, "(") {
            let name = self.current().value.clone();
            let name_index = self.idx();
            self.advance();
            return self.function_def(name, name_index, base);
        }

        let base = base.ok_or(CompileError::VoidNotExpected { index: self.idx() })?;
        loop {
            self.variable_clause(base)?;
            if self.is_val(LexemeKind::Punctuation, ",") {
                self.advance();
                continue;
            }
            break;
        }
        self.eat_val(LexemeKind::Punctuation, ";")
    }

    /// One declarator with optional `= initialiser`, slot allocation, and
    /// array descriptor setup.
    fn variable_clause(&mut self, base: Type) -> CompileResult<()> {
        let (name, ty, brackets, name_index) = self.variable_identifier(base, DeclMode::Alloc)?;

        // Only the outermost dimension allocates; inner lengths are
        // evaluated for effect and dropped.
        for _ in 1..brackets.max(1) {
            self.program.push_op_untyped(Op::Dump);
        }

        let slot = self.alloc_slot(self.types().slot_size(ty));
        let owner = self.current_fn();

        if brackets > 0 {
            // [n] -> descriptor on the heap, address into the slot
            let TypeKind::Array(element) = self.types().kind(ty) else {
                return Err(CompileError::internal("bracketed declarator is not an array"));
            };
            let elem_size = u64::from(self.types().size_of(element));
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
            self.program.push_relative(slot);
            self.program.push_op_untyped(Op::FromSp);
            self.program.push_op(Op::StoreDA, PrimitiveType::Uint64);
        }

        let is_complex = matches!(self.types().kind(ty), TypeKind::Complex { .. });
        if self.is_val(LexemeKind::Operator, "=") {
            self.advance();
            let init_index = self.idx();
            // destination address first, initialiser on top
            self.program.push_relative(slot);
            self.program.push_op_untyped(Op::FromSp);
            let value = self.expression()?;
            let value = self.require_value(value, init_index, &self.types().display(ty))?;
            if ty.is_ref() {
                // The slot aliases the initialiser; it must be a place.
                if !can_cast(self.types(), value, ty) {
                    return Err(CompileError::TypeMismatch {
                        index: init_index,
                        expected: self.types().display(ty),
                        got: self.types().display(value.ty()),
                    });
                }
                self.program.push_op(Op::StoreAD, PrimitiveType::Uint64);
            } else if is_complex {
                self.expect_castable(value, ty, init_index)?;
                let size = u64::from(self.types().size_of(ty));
                self.program.push_operand(size);
                self.program.push_op_untyped(Op::CopyTF);
            } else {
                self.expect_castable(value, ty, init_index)?;
                self.emit_cast_to(value, ty.erased());
                let tag = value_tag(self.types(), ty);
                self.program.push_op(Op::StoreAD, tag);
            }
        } else if is_complex {
            // zero the aggregate so field reads before writes are defined
            self.program.push_relative(slot);
            self.program.push_op_untyped(Op::FromSp);
            self.program
                .push_operand(u64::from(self.types().size_of(ty)));
            self.program.push_op_untyped(Op::Fill);
        }

        self.symbols.declare_variable(
            &name,
            VarSymbol {
                ty,
                storage: Storage::Frame {
                    owner,
                    offset: slot,
                },
            },
            name_index,
        )?;
        Ok(())
    }

    /// `struct Name { fields }`. Field declarations are bare declarators;
    /// no initialisers.
    pub(crate) fn struct_decl(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "struct")?;
        self.expect(LexemeKind::Identifier)?;
        let name = self.current().value.clone();
        let name_index = self.idx();
        self.advance();
        self.eat_val(LexemeKind::Punctuation, "{")?;

        let mut fields: Vec<(String, Type)> = Vec::new();
        while !self.is_val(LexemeKind::Punctuation, "}") {
            if self.eof {
                return Err(self.unexpected("'}'"));
            }
            let base = self
                .type_()?
                .ok_or(CompileError::VoidNotExpected { index: self.idx() })?;
            loop {
                let (field_name, field_ty, _, field_index) =
                    self.variable_identifier(base, DeclMode::Discard)?;
                if fields.iter().any(|(existing, _)| *existing == field_name) {
                    return Err(CompileError::Redeclaration {
                        index: field_index,
                        name: field_name,
                    });
                }
                fields.push((field_name, field_ty.erased()));
                if self.is_val(LexemeKind::Punctuation, ",") {
                    self.advance();
                    continue;
                }
                break;
            }
            self.eat_val(LexemeKind::Punctuation, ";")?;
        }
        self.advance();

        let ty = self.types().complex(&name, fields);
        self.symbols.declare_struct(&name, ty, name_index)
    }

    /// A function definition (or bodyless prototype). The name is bound
    /// before the body is analysed so direct recursion resolves.
    fn function_def(
        &mut self,
        name: String,
        name_index: usize,
        ret: Option<Type>,
    ) -> CompileResult<()> {
        self.eat_val(LexemeKind::Parenthesis, "(")?;

        let mut params: Vec<(String, Type)> = Vec::new();
        let mut required = 0usize;
        let mut defaults = Vec::new();
        let mut started_default = false;
        if !self.is_val(LexemeKind::Parenthesis, ")") {
            loop {
                let (pname, pty, pindex) = self.variable_parameter()?;
                if self.is_val(LexemeKind::Operator, "=") {
                    started_default = true;
                }
                if started_default {
                    self.eat_val(LexemeKind::Operator, "=")?;
                    let range_start = self.position();
                    let before = self.emit_len();
                    let value = self.expression()?;
                    let value = self.require_value(value, pindex, "a default value")?;
                    self.expect_castable(value, pty, pindex)?;
                    defaults.push(range_start..self.position());
                    self.truncate_program(before);
                } else {
                    required += 1;
                }
                params.push((pname, pty));
                if self.is_val(LexemeKind::Punctuation, ",") {
                    self.advance();
                    continue;
                }
                break;
            }
        }
        self.eat_val(LexemeKind::Parenthesis, ")")?;

        let param_tys: Vec<Type> = params[..required].iter().map(|(_, t)| *t).collect();
        let default_tys: Vec<Type> = params[required..].iter().map(|(_, t)| *t).collect();
        let fn_ty = self.types().function(ret, param_tys, default_tys);

        let fid = FuncId(self.funcs.len());
        self.symbols.declare_variable(
            &name,
            VarSymbol {
                ty: fn_ty,
                storage: Storage::Func(fid),
            },
            name_index,
        )?;

        let ret_slot = ret.map(|r| self.types().slot_size(r)).unwrap_or(0);
        let mut frame_size = 8 + 1 + u64::from(ret_slot);
        let mut infos = Vec::with_capacity(params.len());
        for (pname, pty) in &params {
            infos.push(ParamInfo {
                name: pname.clone(),
                ty: *pty,
                offset: frame_size,
            });
            frame_size += u64::from(self.types().slot_size(*pty));
        }

        self.funcs.push(FunctionDef {
            name: name.clone(),
            ret,
            entry: None,
            frame_size,
            done: false,
            size_patches: Vec::new(),
            params: infos,
            required,
            defaults,
        });

        if self.is_val(LexemeKind::Punctuation, ";") {
            // prototype only
            self.advance();
            return Ok(());
        }

        // Skip over the body in the linear stream.
        let over_body = self.emit_len();
        self.program.push_operand(0);
        self.program.push_op_untyped(Op::Jmp);
        let entry = self.emit_len() as u64;
        self.funcs[fid.0].entry = Some(entry);

        self.fn_stack.push(fid);
        self.return_types.push(ret);
        let saved_depth = self.loop_depth;
        self.loop_depth = 0;
        self.symbols.push_scope();
        let params_snapshot = self.funcs[fid.0].params.clone();
        for p in &params_snapshot {
            self.symbols.declare_variable(
                &p.name,
                VarSymbol {
                    ty: p.ty,
                    storage: Storage::Frame {
                        owner: fid,
                        offset: p.offset,
                    },
                },
                name_index,
            )?;
        }

        let body = self.block();
        self.symbols.pop_scope();
        self.loop_depth = saved_depth;
        self.return_types.pop();
        self.fn_stack.pop();
        body?;

        self.add_return();
        let def = &mut self.funcs[fid.0];
        def.done = true;
        let size = def.frame_size;
        for idx in std::mem::take(&mut def.size_patches) {
            self.program.set(idx, Node::Operand(size));
        }
        let after = self.emit_len() as u64;
        self.program.set(over_body, Node::Operand(after));
        Ok(())
    }
}
