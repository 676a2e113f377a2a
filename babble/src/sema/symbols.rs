//! The scoped symbol table.
//!
//! A stack of scopes, each holding two ordered maps: one for variables and
//! one for named complex types. Lookup walks innermost-out; declarations go
//! into the innermost scope and a duplicate name there is an error.

use std::collections::BTreeMap;

use crate::error::{CompileError, CompileResult};
use crate::ir::FuncId;
use crate::types::Type;

/// Where a symbol's storage lives.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Storage {
    /// A stack-frame slot: which function owns the frame and the byte
    /// offset inside it.
    Frame { owner: FuncId, offset: u64 },
    /// A function definition.
    Func(FuncId),
    /// A predeclared I/O builtin.
    Builtin(Builtin),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Builtin {
    Print,
    Read,
}

/// A declared variable (or function) symbol.
#[derive(Debug, Clone, Copy)]
pub struct VarSymbol {
    pub ty: Type,
    pub storage: Storage,
}

#[derive(Debug, Default)]
struct Scope {
    variables: BTreeMap<String, VarSymbol>,
    structs: BTreeMap<String, Type>,
}

/// The scope stack.
#[derive(Debug)]
pub struct SymbolTable {
    scopes: Vec<Scope>,
}

impl Default for SymbolTable {
    fn default() -> Self {
        Self::new()
    }
}

impl SymbolTable {
    /// A table with the global scope already open.
    pub fn new() -> Self {
        SymbolTable {
            scopes: vec![Scope::default()],
        }
    }

    pub fn push_scope(&mut self) {
        self.scopes.push(Scope::default());
    }

    pub fn pop_scope(&mut self) {
        debug_assert!(self.scopes.len() > 1, "popping the global scope");
        self.scopes.pop();
    }

    pub fn depth(&self) -> usize {
        self.scopes.len()
    }

    /// Innermost declaration of `name`, if any.
    pub fn lookup_variable(&self, name: &str) -> Option<VarSymbol> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.variables.get(name).copied())
    }

    /// Innermost struct declaration of `name`, if any.
    pub fn lookup_struct(&self, name: &str) -> Option<Type> {
        self.scopes
            .iter()
            .rev()
            .find_map(|scope| scope.structs.get(name).copied())
    }

    pub fn declare_variable(
        &mut self,
        name: &str,
        symbol: VarSymbol,
        index: usize,
    ) -> CompileResult<()> {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.variables.contains_key(name) {
            return Err(CompileError::Redeclaration {
                index,
                name: name.to_string(),
            });
        }
        scope.variables.insert(name.to_string(), symbol);
        Ok(())
    }

    pub fn declare_struct(&mut self, name: &str, ty: Type, index: usize) -> CompileResult<()> {
        let scope = self.scopes.last_mut().expect("scope stack is never empty");
        if scope.structs.contains_key(name) {
            return Err(CompileError::Redeclaration {
                index,
                name: name.to_string(),
            });
        }
        scope.structs.insert(name.to_string(), ty);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::PrimitiveType;

    fn sym(ty: Type) -> VarSymbol {
        VarSymbol {
            ty,
            storage: Storage::Frame {
                owner: FuncId(0),
                offset: 0,
            },
        }
    }

    #[test]
    fn names_die_with_their_scope() {
        let mut table = SymbolTable::new();
        let int32 = Type::primitive(PrimitiveType::Int32);
        table.push_scope();
        table.declare_variable("x", sym(int32), 0).unwrap();
        assert!(table.lookup_variable("x").is_some());
        table.pop_scope();
        assert!(table.lookup_variable("x").is_none());
    }

    #[test]
    fn shadowing_restores_the_outer_binding() {
        let mut table = SymbolTable::new();
        let int32 = Type::primitive(PrimitiveType::Int32);
        let f64_t = Type::primitive(PrimitiveType::F64);
        table.declare_variable("x", sym(int32), 0).unwrap();
        table.push_scope();
        table.declare_variable("x", sym(f64_t), 0).unwrap();
        assert_eq!(table.lookup_variable("x").unwrap().ty, f64_t);
        table.pop_scope();
        assert_eq!(table.lookup_variable("x").unwrap().ty, int32);
    }

    #[test]
    fn duplicate_in_same_scope_is_an_error() {
        let mut table = SymbolTable::new();
        let int32 = Type::primitive(PrimitiveType::Int32);
        table.declare_variable("x", sym(int32), 0).unwrap();
        assert!(matches!(
            table.declare_variable("x", sym(int32), 5),
            Err(CompileError::Redeclaration { index: 5, .. })
        ));
    }

    #[test]
    fn structs_and_variables_are_separate_namespaces() {
        let mut table = SymbolTable::new();
        let int32 = Type::primitive(PrimitiveType::Int32);
        table.declare_struct("S", int32, 0).unwrap();
        table.declare_variable("S", sym(int32), 0).unwrap();
        assert!(table.lookup_struct("S").is_some());
        assert!(table.lookup_variable("S").is_some());
    }
}
