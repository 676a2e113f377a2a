//! Expression value categories.
//!
//! Every expression result is a `Variable` (an lvalue whose address is on
//! the evaluation stack) or a `Temporary` (an rvalue). A reference-qualified
//! temporary behaves as an lvalue: its payload on the stack is an address.

use super::Type;

/// Value category tag used as a key in the operator signature tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    Variable,
    Temporary,
}

/// A typed expression result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Value {
    Variable(Type),
    Temporary(Type),
}

impl Value {
    pub fn ty(self) -> Type {
        match self {
            Value::Variable(t) | Value::Temporary(t) => t,
        }
    }

    pub fn category(self) -> Category {
        match self {
            Value::Variable(_) => Category::Variable,
            Value::Temporary(_) => Category::Temporary,
        }
    }

    fn with_ty(self, ty: Type) -> Value {
        match self {
            Value::Variable(_) => Value::Variable(ty),
            Value::Temporary(_) => Value::Temporary(ty),
        }
    }

    /// Whether the value's stack payload is an address: variables always,
    /// temporaries only when reference-qualified.
    pub fn is_addressable(self) -> bool {
        matches!(self, Value::Variable(_)) || self.ty().is_ref()
    }

    /// The qualifier variants tried during operator dispatch, most specific
    /// first: the value itself, its const-added form, its dereferenced form,
    /// and both. Adding const lets plain operands match the `(const T,
    /// const T)` arithmetic signatures; a const operand never gains a
    /// non-const form, which is what keeps mutation off const values.
    pub fn derived(self) -> Vec<Value> {
        let ty = self.ty();
        let mut out = Vec::with_capacity(4);
        let mut push = |v: Value, out: &mut Vec<Value>| {
            if !out.contains(&v) {
                out.push(v);
            }
        };
        push(self, &mut out);
        push(self.with_ty(ty.with_const(true)), &mut out);
        push(self.with_ty(ty.with_ref(false)), &mut out);
        push(self.with_ty(ty.with_quals(true, false)), &mut out);
        out
    }
}
