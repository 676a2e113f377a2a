//! The recursive-descent semantic analyser.
//!
//! A single top-down pass over the lexeme vector that type-checks and emits
//! postfix bytecode at the same time. Statements live here; the fourteen
//! expression priority layers are in [`expr`], declarations and function
//! definitions in [`decl`].
//!
//! # Frames
//!
//! Every function (the top level counts as function 0) owns a frame:
//! 8 bytes return pc, 1 byte did-return flag, the return slot, then
//! parameters and locals in declaration order. The compiled program opens
//! with a prologue that activates the top-level frame at base 1 and writes
//! a −1 return pc, matching the sentinel activation the VM seeds.
//!
//! Forward references are kept as patches: jump placeholders are rewritten
//! when their target is known, call-site frame sizes of still-open
//! functions when the function body completes, and function entry
//! addresses stay symbolic until the link pass.

mod decl;
mod expr;
pub mod operators;
pub mod signatures;
pub mod symbols;

use std::ops::Range;

use babble_lexer::{Lexeme, LexemeKind};

use crate::error::{CompileError, CompileResult, Warning};
use crate::ir::{FuncId, Node, Op, Program};
use crate::types::casts::{can_cast, cast_kind, emit_cast, value_tag, CastKind};
use crate::types::{PrimitiveType, Type, TypeKind, TypeStore, Value};
use symbols::{Builtin, Storage, SymbolTable, VarSymbol};

/// One function being (or already) compiled.
#[derive(Debug, Clone)]
pub(crate) struct FunctionDef {
    pub name: String,
    pub ret: Option<Type>,
    /// Bytecode index of the first body instruction; `None` for a
    /// prototype without a body.
    pub entry: Option<u64>,
    /// Frame watermark; final once `done`.
    pub frame_size: u64,
    pub done: bool,
    /// Call-site operand indices waiting for the final frame size.
    pub size_patches: Vec<usize>,
    /// All parameters, required first.
    pub params: Vec<ParamInfo>,
    pub required: usize,
    /// Lexeme ranges of the default expressions, aligned with
    /// `params[required..]`; replayed at call sites.
    pub defaults: Vec<Range<usize>>,
}

#[derive(Debug, Clone)]
pub(crate) struct ParamInfo {
    pub name: String,
    pub ty: Type,
    pub offset: u64,
}

#[derive(Debug, Default)]
struct LoopCtx {
    breaks: Vec<usize>,
    continues: Vec<usize>,
}

/// The analyser. Construct with the full lexeme vector, call
/// [`Analyzer::analyze`] once.
#[derive(Debug)]
pub struct Analyzer {
    lexemes: Vec<Lexeme>,
    pos: usize,
    eof: bool,
    current: Lexeme,
    types: TypeStore,
    symbols: SymbolTable,
    program: Program,
    funcs: Vec<FunctionDef>,
    fn_stack: Vec<FuncId>,
    return_types: Vec<Option<Type>>,
    loop_depth: u32,
    loops: Vec<LoopCtx>,
    /// (operand index, absolute target) pairs resolved at the end; kept as
    /// patches because later cast insertions may shift both sides.
    abs_patches: Vec<(usize, usize)>,
    warnings: Vec<Warning>,
}

impl Analyzer {
    pub fn new(lexemes: Vec<Lexeme>) -> Self {
        let eof = lexemes.is_empty();
        let current = lexemes.first().cloned().unwrap_or_else(|| Lexeme::eof(0));
        let types = TypeStore::new();
        let mut symbols = SymbolTable::new();

        let char_array = types.array_of(Type::primitive(PrimitiveType::Char));
        symbols
            .declare_variable(
                "print",
                VarSymbol {
                    ty: types.function(None, vec![char_array.with_const(true)], vec![]),
                    storage: Storage::Builtin(Builtin::Print),
                },
                0,
            )
            .expect("fresh scope");
        symbols
            .declare_variable(
                "read",
                VarSymbol {
                    ty: types.function(None, vec![char_array.with_ref(true)], vec![]),
                    storage: Storage::Builtin(Builtin::Read),
                },
                0,
            )
            .expect("fresh scope");

        let int32 = Type::primitive(PrimitiveType::Int32);
        let top = FunctionDef {
            name: "<top-level>".to_string(),
            ret: Some(int32),
            entry: Some(0),
            frame_size: 8 + 1 + 4,
            done: false,
            size_patches: vec![0],
            params: Vec::new(),
            required: 0,
            defaults: Vec::new(),
        };

        let mut analyzer = Analyzer {
            lexemes,
            pos: 0,
            eof,
            current,
            types,
            symbols,
            program: Program::new(),
            funcs: vec![top],
            fn_stack: vec![FuncId(0)],
            return_types: vec![Some(int32)],
            loop_depth: 0,
            loops: Vec::new(),
            abs_patches: Vec::new(),
            warnings: Vec::new(),
        };
        analyzer.emit_prologue();
        analyzer
    }

    /// Activate the top-level frame at base 1 and store a −1 return pc, so
    /// top-level code runs as if inside a function.
    fn emit_prologue(&mut self) {
        self.program.push_operand(0); // index 0: patched with the final top frame size
        self.program.push_operand(0);
        self.program.push_op_untyped(Op::Push);
        self.program.push_operand(u64::MAX);
        self.program.push_relative(0);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::StoreDA, PrimitiveType::Uint64);
    }

    /// Run the analysis to completion and link the stream.
    pub fn analyze(mut self) -> CompileResult<(Program, Vec<Warning>)> {
        while !self.eof {
            self.action()?;
        }
        self.emit_main_call()?;

        for (operand, target) in std::mem::take(&mut self.abs_patches) {
            self.program.set(operand, Node::Operand(target as u64));
        }
        let top = &mut self.funcs[0];
        top.done = true;
        let size = top.frame_size;
        for idx in std::mem::take(&mut top.size_patches) {
            self.program.set(idx, Node::Operand(size));
        }

        let entries: Vec<Option<u64>> = self.funcs.iter().map(|f| f.entry).collect();
        let program = self
            .program
            .link(&|fid: FuncId| entries.get(fid.0).copied().flatten())?;
        Ok((program, self.warnings))
    }

    // ===== lexeme cursor =====

    pub(crate) fn idx(&self) -> usize {
        self.current.index
    }

    pub(crate) fn advance(&mut self) {
        self.pos += 1;
        if self.pos >= self.lexemes.len() {
            let end = self
                .lexemes
                .last()
                .map(|l| l.index + l.value.len())
                .unwrap_or(0);
            self.eof = true;
            self.current = Lexeme::eof(end);
        } else {
            self.current = self.lexemes[self.pos].clone();
        }
    }

    pub(crate) fn set_position(&mut self, pos: usize) {
        self.pos = pos;
        if pos >= self.lexemes.len() {
            let end = self
                .lexemes
                .last()
                .map(|l| l.index + l.value.len())
                .unwrap_or(0);
            self.eof = true;
            self.current = Lexeme::eof(end);
        } else {
            self.eof = false;
            self.current = self.lexemes[pos].clone();
        }
    }

    pub(crate) fn position(&self) -> usize {
        self.pos
    }

    pub(crate) fn current(&self) -> &Lexeme {
        &self.current
    }

    pub(crate) fn peek_is(&self, kind: LexemeKind, value: &str) -> bool {
        self.lexemes
            .get(self.pos + 1)
            .map(|l| l.kind == kind && l.value == value)
            .unwrap_or(false)
    }

    pub(crate) fn is(&self, kind: LexemeKind) -> bool {
        !self.eof && self.current.kind == kind
    }

    pub(crate) fn is_val(&self, kind: LexemeKind, value: &str) -> bool {
        !self.eof && self.current.kind == kind && self.current.value == value
    }

    fn found_desc(&self) -> String {
        if self.eof {
            "end of input".to_string()
        } else {
            format!("{} '{}'", self.current.kind, self.current.value)
        }
    }

    pub(crate) fn unexpected(&self, expected: impl Into<String>) -> CompileError {
        CompileError::UnexpectedLexeme {
            index: self.idx(),
            expected: expected.into(),
            found: self.found_desc(),
        }
    }

    pub(crate) fn expect(&self, kind: LexemeKind) -> CompileResult<()> {
        if self.is(kind) {
            Ok(())
        } else {
            Err(self.unexpected(kind.to_string()))
        }
    }

    pub(crate) fn expect_val(&self, kind: LexemeKind, value: &str) -> CompileResult<()> {
        if self.is_val(kind, value) {
            Ok(())
        } else {
            Err(self.unexpected(format!("'{}'", value)))
        }
    }

    pub(crate) fn eat_val(&mut self, kind: LexemeKind, value: &str) -> CompileResult<()> {
        self.expect_val(kind, value)?;
        self.advance();
        Ok(())
    }

    // ===== frames and symbols =====

    pub(crate) fn types(&self) -> &TypeStore {
        &self.types
    }

    pub(crate) fn current_fn(&self) -> FuncId {
        *self.fn_stack.last().expect("function stack is never empty")
    }

    /// Reserve `size` bytes in the current frame.
    pub(crate) fn alloc_slot(&mut self, size: u32) -> u64 {
        let current_fn = self.current_fn();
        let def = &mut self.funcs[current_fn.0];
        let offset = def.frame_size;
        def.frame_size += u64::from(size);
        offset
    }

    /// Reserve a slot for and register a local variable. The caller emits
    /// any initialisation; the symbol becomes visible immediately.
    pub(crate) fn declare_local(
        &mut self,
        name: &str,
        ty: Type,
        index: usize,
    ) -> CompileResult<VarSymbol> {
        let offset = self.alloc_slot(self.types.slot_size(ty));
        let symbol = VarSymbol {
            ty,
            storage: Storage::Frame {
                owner: self.current_fn(),
                offset,
            },
        };
        self.symbols.declare_variable(name, symbol, index)?;
        Ok(symbol)
    }

    // ===== emission =====

    pub(crate) fn emit_len(&self) -> usize {
        self.program.len()
    }

    /// Splice nodes in mid-stream, shifting every pending patch that sits
    /// at or past the insertion point.
    pub(crate) fn insert_nodes(&mut self, at: usize, nodes: Vec<Node>) {
        let shift = nodes.len();
        if shift == 0 {
            return;
        }
        self.program.insert_at(at, nodes);
        for f in &mut self.funcs {
            for p in &mut f.size_patches {
                if *p >= at {
                    *p += shift;
                }
            }
        }
        for (operand, target) in &mut self.abs_patches {
            if *operand >= at {
                *operand += shift;
            }
            // A target exactly at the insertion point keeps pointing at the
            // spliced nodes: they belong to the continuation.
            if *target > at {
                *target += shift;
            }
        }
    }

    /// Roll the stream back (used to type-check and discard, e.g. default
    /// parameter expressions at their definition).
    pub(crate) fn truncate_program(&mut self, len: usize) {
        self.program.truncate(len);
        for f in &mut self.funcs {
            f.size_patches.retain(|&i| i < len);
        }
        self.abs_patches.retain(|&(i, _)| i < len);
    }

    /// Record a call-return patch: `operand` will become the index right
    /// after the `Call` at `call_idx`.
    pub(crate) fn patch_return_pc(&mut self, operand: usize, call_idx: usize) {
        self.abs_patches.push((operand, call_idx + 1));
    }

    pub(crate) fn emit_cast_to(&mut self, from: Value, to: Type) {
        let mut nodes = Vec::new();
        emit_cast(&self.types, from, to, &mut nodes);
        self.program.extend(nodes);
    }

    /// Emit the address (or slot load for reference-declared variables) of
    /// a frame-stored symbol and return its value.
    pub(crate) fn emit_variable_use(&mut self, symbol: VarSymbol) -> CompileResult<Value> {
        let Storage::Frame { owner, offset } = symbol.storage else {
            return Err(CompileError::internal("not a frame symbol"));
        };
        if owner == self.current_fn() {
            self.program.push_relative(offset);
            self.program.push_op_untyped(Op::FromSp);
        } else {
            // A frame of an enclosing function (the top level included):
            // its latest activation is found through FuncSp.
            let entry = self.funcs[owner.0]
                .entry
                .ok_or_else(|| CompileError::internal("owner frame has no entry"))?;
            self.program.push_operand(entry);
            self.program.push_op_untyped(Op::FuncSp);
            self.program.push_operand(offset);
            self.program.push_op(Op::Add, PrimitiveType::Uint64);
        }
        if symbol.ty.is_ref() {
            // The slot holds the referent's address.
            self.program.push_op(Op::Load, PrimitiveType::Uint64);
        }
        Ok(Value::Variable(symbol.ty))
    }

    /// Load the payload when the value on the stack is an address.
    pub(crate) fn load_if_addressable(&mut self, val: Value) {
        if val.is_addressable() {
            let tag = value_tag(&self.types, val.ty());
            self.program.push_op(Op::Load, tag);
        }
    }

    pub(crate) fn add_return(&mut self) {
        if !matches!(self.program.last(), Some(Node::Operator(Op::Return, _))) {
            self.program.push_op_untyped(Op::Return);
        }
    }

    // ===== casts and conditions =====

    pub(crate) fn warn_if_lossy(&mut self, from: Value, to: Type, index: usize) {
        if cast_kind(&self.types, from, to) == CastKind::Lossy {
            self.warnings.push(Warning::Downcast {
                index,
                from: self.types.display(from.ty()),
                to: self.types.display(to),
            });
        }
    }

    /// The qualifier-stripped assignability check used by declarations,
    /// conditions, returns and arguments. A lossy cast is a warning.
    pub(crate) fn expect_castable(
        &mut self,
        from: Value,
        to: Type,
        index: usize,
    ) -> CompileResult<()> {
        let stripped = Value::Temporary(from.ty().erased());
        if !can_cast(&self.types, stripped, to.erased()) {
            return Err(CompileError::TypeMismatch {
                index,
                expected: self.types.display(to),
                got: self.types.display(from.ty()),
            });
        }
        self.warn_if_lossy(from, to.erased(), index);
        Ok(())
    }

    pub(crate) fn require_value(
        &self,
        val: Option<Value>,
        index: usize,
        expected: &str,
    ) -> CompileResult<Value> {
        val.ok_or_else(|| CompileError::TypeMismatch {
            index,
            expected: expected.to_string(),
            got: "void".to_string(),
        })
    }

    /// Check and emit the conversion of a condition result to a bool value.
    fn coerce_condition(&mut self, val: Option<Value>, index: usize) -> CompileResult<()> {
        let bool_t = Type::primitive(PrimitiveType::Bool);
        let val = self.require_value(val, index, "bool")?;
        self.expect_castable(val, bool_t, index)?;
        self.emit_cast_to(val, bool_t);
        Ok(())
    }

    // ===== statements =====

    fn action(&mut self) -> CompileResult<()> {
        let expression_keyword = self.is(LexemeKind::Reserved)
            && matches!(self.current.value.as_str(), "true" | "false" | "new" | "delete");
        if !expression_keyword
            && (self.is(LexemeKind::Reserved)
                || self.is(LexemeKind::VariableType)
                || (self.is(LexemeKind::Identifier)
                    && self.symbols.lookup_struct(&self.current.value).is_some()))
        {
            self.keyword()
        } else if self.is_val(LexemeKind::Punctuation, "{") {
            self.block()
        } else {
            let value = self.expression()?;
            self.eat_val(LexemeKind::Punctuation, ";")?;
            if value.is_some() {
                self.program.push_op_untyped(Op::Dump);
            }
            Ok(())
        }
    }

    /// `{ … }` opens a scope; a bare action is its own one-statement block.
    pub(crate) fn block(&mut self) -> CompileResult<()> {
        self.symbols.push_scope();
        let result = self.block_inner();
        self.symbols.pop_scope();
        result
    }

    fn block_inner(&mut self) -> CompileResult<()> {
        if !self.is_val(LexemeKind::Punctuation, "{") {
            return self.action();
        }
        self.advance();
        while !self.is_val(LexemeKind::Punctuation, "}") {
            if self.eof {
                return Err(self.unexpected("'}'"));
            }
            self.action()?;
        }
        self.advance();
        Ok(())
    }

    fn keyword(&mut self) -> CompileResult<()> {
        if self.is(LexemeKind::Reserved) {
            let word = self.current.value.clone();
            match word.as_str() {
                "for" => {
                    self.symbols.push_scope();
                    let result = self.for_stmt();
                    self.symbols.pop_scope();
                    return result;
                }
                "foreach" => {
                    self.symbols.push_scope();
                    let result = self.foreach_stmt();
                    self.symbols.pop_scope();
                    return result;
                }
                "while" => return self.while_stmt(),
                "do" => return self.do_while_stmt(),
                "if" => return self.if_stmt(),
                "elif" | "else" => return Err(self.unexpected("'if'")),
                "return" => return self.return_stmt(),
                "break" | "continue" => return self.loop_ctrl(),
                "struct" => return self.struct_decl(),
                "const" => return self.definition_add_to_scope(),
                _ => return Err(self.unexpected("a statement")),
            }
        }
        // A type keyword or a struct-type identifier starts a definition.
        self.definition_add_to_scope()
    }

    fn parse_condition(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Parenthesis, "(")?;
        let index = self.idx();
        let value = self.expression()?;
        self.eat_val(LexemeKind::Parenthesis, ")")?;
        self.coerce_condition(value, index)
    }

    fn if_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "if")?;
        self.parse_condition()?;
        let mut jz_operand = self.emit_jump_placeholder(Op::Jz);
        let mut end_jumps = Vec::new();

        self.block()?;
        while self.is_val(LexemeKind::Reserved, "elif") {
            end_jumps.push(self.emit_jump_placeholder(Op::Jmp));
            self.patch_jump(jz_operand);
            self.advance();
            self.parse_condition()?;
            jz_operand = self.emit_jump_placeholder(Op::Jz);
            self.block()?;
        }
        if self.is_val(LexemeKind::Reserved, "else") {
            end_jumps.push(self.emit_jump_placeholder(Op::Jmp));
            self.patch_jump(jz_operand);
            self.advance();
            self.block()?;
        } else {
            end_jumps.push(jz_operand);
        }
        for operand in end_jumps {
            self.patch_jump(operand);
        }
        Ok(())
    }

    /// Emit `Operand(0) <op>` and return the operand index for patching.
    fn emit_jump_placeholder(&mut self, op: Op) -> usize {
        let operand = self.program.len();
        self.program.push_operand(0);
        self.program.push_op_untyped(op);
        operand
    }

    fn patch_jump(&mut self, operand: usize) {
        let target = self.program.len() as u64;
        self.program.set(operand, Node::Operand(target));
    }

    fn while_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "while")?;
        let cond_pc = self.program.len();
        self.parse_condition()?;
        let jz_operand = self.emit_jump_placeholder(Op::Jz);

        self.loops.push(LoopCtx::default());
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body?;

        self.program.push_operand(cond_pc as u64);
        self.program.push_op_untyped(Op::Jmp);
        self.patch_jump(jz_operand);
        self.finish_loop(cond_pc as u64);
        Ok(())
    }

    fn do_while_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "do")?;
        let start = self.program.len();

        self.loops.push(LoopCtx::default());
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body?;

        let cond_pc = self.program.len();
        self.eat_val(LexemeKind::Reserved, "while")?;
        self.parse_condition()?;
        self.program.push_op(Op::Invert, PrimitiveType::Bool);
        self.program.push_operand(start as u64);
        self.program.push_op_untyped(Op::Jz);
        self.eat_val(LexemeKind::Punctuation, ";")?;
        self.finish_loop(cond_pc as u64);
        Ok(())
    }

    fn for_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "for")?;
        self.eat_val(LexemeKind::Parenthesis, "(")?;

        // init: a definition, an expression, or nothing
        if self.is_val(LexemeKind::Punctuation, ";") {
            self.advance();
        } else if self.is(LexemeKind::VariableType)
            || self.is_val(LexemeKind::Reserved, "const")
            || (self.is(LexemeKind::Identifier)
                && self.symbols.lookup_struct(&self.current.value).is_some())
        {
            self.definition_add_to_scope()?;
        } else {
            let value = self.expression()?;
            if value.is_some() {
                self.program.push_op_untyped(Op::Dump);
            }
            self.eat_val(LexemeKind::Punctuation, ";")?;
        }

        let cond_pc = self.program.len();
        let jz_operand = if self.is_val(LexemeKind::Punctuation, ";") {
            self.advance();
            None
        } else {
            let index = self.idx();
            let value = self.expression()?;
            self.coerce_condition(value, index)?;
            self.eat_val(LexemeKind::Punctuation, ";")?;
            Some(self.emit_jump_placeholder(Op::Jz))
        };

        // The step is emitted after the body; skip its lexemes for now.
        let step = self.skip_to_closing_paren()?;
        self.advance();

        self.loops.push(LoopCtx::default());
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body?;

        let continue_pc = self.program.len();
        if !step.is_empty() {
            let resume = self.position();
            self.set_position(step.start);
            let value = self.expression()?;
            if self.position() != step.end {
                return Err(self.unexpected("')'"));
            }
            if value.is_some() {
                self.program.push_op_untyped(Op::Dump);
            }
            self.set_position(resume);
        }
        self.program.push_operand(cond_pc as u64);
        self.program.push_op_untyped(Op::Jmp);
        if let Some(operand) = jz_operand {
            self.patch_jump(operand);
        }
        self.finish_loop(continue_pc as u64);
        Ok(())
    }

    /// Record the lexeme range up to the parenthesis closing the current
    /// construct, leaving the cursor on the `)`.
    fn skip_to_closing_paren(&mut self) -> CompileResult<Range<usize>> {
        let start = self.position();
        let mut depth = 0u32;
        loop {
            if self.eof {
                return Err(self.unexpected("')'"));
            }
            if self.is_val(LexemeKind::Parenthesis, "(") {
                depth += 1;
            } else if self.is_val(LexemeKind::Parenthesis, ")") {
                if depth == 0 {
                    break;
                }
                depth -= 1;
            }
            self.advance();
        }
        Ok(start..self.position())
    }

    fn foreach_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "foreach")?;
        self.eat_val(LexemeKind::Parenthesis, "(")?;
        let (iter_name, iter_ty, name_index) = self.variable_parameter()?;
        self.eat_val(LexemeKind::Reserved, "of")?;

        let arr_index = self.idx();
        let arr = self.expression()?;
        let arr = self.require_value(arr, arr_index, "an array")?;
        self.eat_val(LexemeKind::Parenthesis, ")")?;

        let TypeKind::Array(element) = self.types.kind(arr.ty()) else {
            return Err(CompileError::TypeNotIterable { index: arr_index });
        };
        // Iteration is by value; a reference loop variable has no element
        // to alias.
        if iter_ty.is_ref() || !element.same_erased(iter_ty) {
            return Err(CompileError::TypeMismatch {
                index: name_index,
                expected: self.types.display(element),
                got: self.types.display(iter_ty),
            });
        }

        let elem_size = self.types.size_of(element);
        let elem_tag = value_tag(&self.types, element);
        let is_complex = matches!(self.types.kind(element), TypeKind::Complex { .. });

        // Hidden slots: the evaluated descriptor and the index.
        self.load_if_addressable(arr);
        let desc_slot = self.alloc_slot(8);
        self.program.push_relative(desc_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::StoreDA, PrimitiveType::Uint64);

        let index_slot = self.alloc_slot(8);
        self.program.push_operand(0);
        self.program.push_relative(index_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::StoreDA, PrimitiveType::Uint64);

        let iter_sym = self.declare_local(&iter_name, iter_ty, name_index)?;
        let Storage::Frame {
            offset: iter_slot, ..
        } = iter_sym.storage
        else {
            return Err(CompileError::internal("loop variable without a frame slot"));
        };

        // while index < length
        let cond_pc = self.program.len();
        self.program.push_relative(index_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::Load, PrimitiveType::Uint64);
        self.program.push_relative(desc_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::Load, PrimitiveType::Uint64);
        self.program.push_op(Op::Load, PrimitiveType::Uint32);
        self.program.push_op(Op::Less, PrimitiveType::Uint64);
        let jz_operand = self.emit_jump_placeholder(Op::Jz);

        // copy the element in by value
        self.program.push_relative(iter_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_relative(desc_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::Load, PrimitiveType::Uint64);
        self.program.push_relative(index_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::Load, PrimitiveType::Uint64);
        self.program.push_operand(u64::from(elem_size));
        self.program.push_op(Op::Multiply, PrimitiveType::Uint64);
        self.program.push_op(Op::Add, PrimitiveType::Uint64);
        self.program.push_operand(4);
        self.program.push_op(Op::Add, PrimitiveType::Uint64);
        if is_complex {
            self.program.push_operand(u64::from(elem_size));
            self.program.push_op_untyped(Op::CopyTF);
        } else {
            self.program.push_op(Op::Load, elem_tag);
            self.program.push_op(Op::StoreAD, elem_tag);
        }

        self.loops.push(LoopCtx::default());
        self.loop_depth += 1;
        let body = self.block();
        self.loop_depth -= 1;
        body?;

        let continue_pc = self.program.len();
        self.program.push_relative(index_slot);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op_untyped(Op::Duplicate);
        self.program.push_op(Op::Load, PrimitiveType::Uint64);
        self.program.push_operand(1);
        self.program.push_op(Op::Add, PrimitiveType::Uint64);
        self.program.push_op(Op::StoreAD, PrimitiveType::Uint64);
        self.program.push_operand(cond_pc as u64);
        self.program.push_op_untyped(Op::Jmp);
        self.patch_jump(jz_operand);
        self.finish_loop(continue_pc as u64);
        Ok(())
    }

    /// Patch the finished loop's break and continue jumps.
    fn finish_loop(&mut self, continue_target: u64) {
        let end = self.program.len() as u64;
        let ctx = self.loops.pop().expect("loop context underflow");
        for operand in ctx.breaks {
            self.program.set(operand, Node::Operand(end));
        }
        for operand in ctx.continues {
            self.program.set(operand, Node::Operand(continue_target));
        }
    }

    fn loop_ctrl(&mut self) -> CompileResult<()> {
        let is_break = self.is_val(LexemeKind::Reserved, "break");
        if self.loop_depth == 0 {
            return Err(CompileError::LoopInstructionsOutsideOfLoop { index: self.idx() });
        }
        self.advance();
        self.eat_val(LexemeKind::Punctuation, ";")?;
        let operand = self.emit_jump_placeholder(Op::Jmp);
        let ctx = self.loops.last_mut().expect("loop context underflow");
        if is_break {
            ctx.breaks.push(operand);
        } else {
            ctx.continues.push(operand);
        }
        Ok(())
    }

    fn return_stmt(&mut self) -> CompileResult<()> {
        self.eat_val(LexemeKind::Reserved, "return")?;
        let index = self.idx();
        let value = if self.is_val(LexemeKind::Punctuation, ";") {
            None
        } else {
            self.expression()?
        };
        self.expect_val(LexemeKind::Punctuation, ";")?;

        let ret = *self.return_types.last().expect("return type stack");
        match (value, ret) {
            (None, None) => {}
            (Some(v), Some(r)) => {
                if r.is_ref() {
                    // Returning a reference binds the operand itself.
                    if !can_cast(&self.types, v, r) {
                        return Err(CompileError::TypeMismatch {
                            index,
                            expected: self.types.display(r),
                            got: self.types.display(v.ty()),
                        });
                    }
                } else {
                    self.expect_castable(v, r, index)?;
                }
                if matches!(self.types.kind(r), TypeKind::Complex { .. }) {
                    // value slot copy: [src] dst size CopyFT
                    self.program.push_relative(9);
                    self.program.push_op_untyped(Op::FromSp);
                    self.program
                        .push_operand(u64::from(self.types.size_of(r)));
                    self.program.push_op_untyped(Op::CopyFT);
                } else {
                    self.emit_cast_to(v, r);
                    let tag = if r.is_ref() {
                        PrimitiveType::Uint64
                    } else {
                        value_tag(&self.types, r)
                    };
                    self.program.push_relative(9);
                    self.program.push_op_untyped(Op::FromSp);
                    self.program.push_op(Op::StoreDA, tag);
                }
            }
            (None, Some(r)) => {
                return Err(CompileError::TypeMismatch {
                    index,
                    expected: self.types.display(r),
                    got: "void".to_string(),
                });
            }
            (Some(v), None) => {
                return Err(CompileError::TypeMismatch {
                    index,
                    expected: "void".to_string(),
                    got: self.types.display(v.ty()),
                });
            }
        }

        // did-return flag
        self.program.push_operand(1);
        self.program.push_relative(8);
        self.program.push_op_untyped(Op::FromSp);
        self.program.push_op(Op::StoreDA, PrimitiveType::Uint8);
        self.program.push_op_untyped(Op::Return);
        self.advance();
        Ok(())
    }

    /// If a parameterless `main` exists, call it and store its result into
    /// the top frame's return slot so the VM reports it as the exit code.
    fn emit_main_call(&mut self) -> CompileResult<()> {
        let Some(symbol) = self.symbols.lookup_variable("main") else {
            return Ok(());
        };
        let Storage::Func(fid) = symbol.storage else {
            return Ok(());
        };
        let def = &self.funcs[fid.0];
        if def.entry.is_none() || def.required != 0 {
            return Ok(());
        }
        let ret = def.ret;
        let value = self.call_function(fid, false, 0)?;
        let int32 = Type::primitive(PrimitiveType::Int32);
        match (value, ret) {
            (Some(v), Some(_)) => {
                let stripped = Value::Temporary(v.ty().erased());
                if can_cast(&self.types, stripped, int32) {
                    self.emit_cast_to(v, int32);
                    self.program.push_relative(9);
                    self.program.push_op_untyped(Op::FromSp);
                    self.program.push_op(Op::StoreDA, PrimitiveType::Int32);
                    self.program.push_operand(1);
                    self.program.push_relative(8);
                    self.program.push_op_untyped(Op::FromSp);
                    self.program.push_op(Op::StoreDA, PrimitiveType::Uint8);
                } else {
                    self.program.push_op_untyped(Op::Dump);
                }
            }
            (Some(_), None) | (None, _) => {}
        }
        Ok(())
    }
}
