//! The type lattice: primitive kinds, structural types, qualifiers, and the
//! interning store.
//!
//! Types are small Copy values: an id into the interning arena plus the two
//! orthogonal qualifiers. Equality is structural *including* qualifiers
//! (identical structures intern to identical ids); `erased` strips the
//! qualifiers for the erased-equality predicate used by assignability.

pub mod casts;
mod value;

pub use value::{Category, Value};

use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// The twelve primitive kinds. The discriminants are the wire encoding of
/// the operator tag byte in `.bbl` files and must not be reordered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum PrimitiveType {
    Int8 = 0,
    Int16 = 1,
    Int32 = 2,
    Int64 = 3,
    Uint8 = 4,
    Uint16 = 5,
    Uint32 = 6,
    Uint64 = 7,
    F32 = 8,
    F64 = 9,
    Bool = 10,
    Char = 11,
    /// Tag for operators that ignore their primitive parameter.
    Unknown = 12,
}

/// All value-bearing primitive kinds, in id order.
pub const PRIMITIVES: [PrimitiveType; 12] = [
    PrimitiveType::Int8,
    PrimitiveType::Int16,
    PrimitiveType::Int32,
    PrimitiveType::Int64,
    PrimitiveType::Uint8,
    PrimitiveType::Uint16,
    PrimitiveType::Uint32,
    PrimitiveType::Uint64,
    PrimitiveType::F32,
    PrimitiveType::F64,
    PrimitiveType::Bool,
    PrimitiveType::Char,
];

/// The primitives arithmetic is defined on (everything except bool).
pub const NUMERIC_PRIMITIVES: [PrimitiveType; 11] = [
    PrimitiveType::Int8,
    PrimitiveType::Uint8,
    PrimitiveType::Int16,
    PrimitiveType::Uint16,
    PrimitiveType::Int32,
    PrimitiveType::Uint32,
    PrimitiveType::Int64,
    PrimitiveType::Uint64,
    PrimitiveType::F32,
    PrimitiveType::F64,
    PrimitiveType::Char,
];

impl PrimitiveType {
    /// Size of a value of this kind in bytes.
    pub fn size(self) -> u32 {
        match self {
            PrimitiveType::Int8
            | PrimitiveType::Uint8
            | PrimitiveType::Bool
            | PrimitiveType::Char => 1,
            PrimitiveType::Int16 | PrimitiveType::Uint16 => 2,
            PrimitiveType::Int32 | PrimitiveType::Uint32 | PrimitiveType::F32 => 4,
            PrimitiveType::Int64
            | PrimitiveType::Uint64
            | PrimitiveType::F64
            | PrimitiveType::Unknown => 8,
        }
    }

    /// True for every kind `~`, shifts and the bitwise operators accept
    /// (bool is excluded from arithmetic but not from bitwise compound
    /// assignment, which is handled separately).
    pub fn is_integer(self) -> bool {
        !matches!(
            self,
            PrimitiveType::F32 | PrimitiveType::F64 | PrimitiveType::Bool
        )
    }

    pub fn is_float(self) -> bool {
        matches!(self, PrimitiveType::F32 | PrimitiveType::F64)
    }

    pub fn is_signed(self) -> bool {
        matches!(
            self,
            PrimitiveType::Int8
                | PrimitiveType::Int16
                | PrimitiveType::Int32
                | PrimitiveType::Int64
        )
    }

    pub fn from_u8(value: u8) -> Option<Self> {
        PRIMITIVES
            .get(value as usize)
            .copied()
            .or((value == 12).then_some(PrimitiveType::Unknown))
    }

    /// Map a type keyword to its primitive kind. `void` is not a primitive.
    pub fn from_name(name: &str) -> Option<Self> {
        Some(match name {
            "int8" => PrimitiveType::Int8,
            "int16" => PrimitiveType::Int16,
            "int32" => PrimitiveType::Int32,
            "int64" => PrimitiveType::Int64,
            "uint8" => PrimitiveType::Uint8,
            "uint16" => PrimitiveType::Uint16,
            "uint32" => PrimitiveType::Uint32,
            "uint64" => PrimitiveType::Uint64,
            "f32" => PrimitiveType::F32,
            "f64" => PrimitiveType::F64,
            "bool" => PrimitiveType::Bool,
            "char" => PrimitiveType::Char,
            _ => return None,
        })
    }

    pub fn name(self) -> &'static str {
        match self {
            PrimitiveType::Int8 => "int8",
            PrimitiveType::Int16 => "int16",
            PrimitiveType::Int32 => "int32",
            PrimitiveType::Int64 => "int64",
            PrimitiveType::Uint8 => "uint8",
            PrimitiveType::Uint16 => "uint16",
            PrimitiveType::Uint32 => "uint32",
            PrimitiveType::Uint64 => "uint64",
            PrimitiveType::F32 => "f32",
            PrimitiveType::F64 => "f64",
            PrimitiveType::Bool => "bool",
            PrimitiveType::Char => "char",
            PrimitiveType::Unknown => "unknown",
        }
    }
}

impl std::fmt::Display for PrimitiveType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Index into the interning arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TypeId(u32);

/// Structure of an interned type. Nested types carry their own qualifiers;
/// array elements and function parameters are stored as declared.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeKind {
    Primitive(PrimitiveType),
    Complex {
        name: String,
        fields: Vec<(String, Type)>,
    },
    Function {
        /// `None` is void.
        ret: Option<Type>,
        params: Vec<Type>,
        defaults: Vec<Type>,
    },
    Pointer(Type),
    Array(Type),
}

/// A qualified reference to an interned type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Type {
    id: TypeId,
    const_: bool,
    ref_: bool,
}

impl Type {
    /// The primitive types live at fixed arena slots, so this needs no
    /// store access and the result is valid in every store.
    pub fn primitive(kind: PrimitiveType) -> Self {
        debug_assert!(kind != PrimitiveType::Unknown);
        Type {
            id: TypeId(kind as u32),
            const_: false,
            ref_: false,
        }
    }

    pub fn id(self) -> TypeId {
        self.id
    }

    pub fn is_const(self) -> bool {
        self.const_
    }

    pub fn is_ref(self) -> bool {
        self.ref_
    }

    pub fn with_const(self, const_: bool) -> Self {
        Type { const_, ..self }
    }

    pub fn with_ref(self, ref_: bool) -> Self {
        Type { ref_, ..self }
    }

    pub fn with_quals(self, const_: bool, ref_: bool) -> Self {
        Type {
            const_,
            ref_,
            ..self
        }
    }

    /// Both qualifiers stripped.
    pub fn erased(self) -> Self {
        self.with_quals(false, false)
    }

    /// Qualifier-erased equality.
    pub fn same_erased(self, other: Type) -> bool {
        self.id == other.id
    }
}

#[derive(Debug, Default)]
struct StoreInner {
    kinds: Vec<TypeKind>,
    index: HashMap<TypeKind, TypeId>,
}

/// Interning arena for types. Cheap to clone; all clones share one arena.
#[derive(Debug, Clone)]
pub struct TypeStore {
    inner: Rc<RefCell<StoreInner>>,
}

impl Default for TypeStore {
    fn default() -> Self {
        Self::new()
    }
}

impl TypeStore {
    pub fn new() -> Self {
        let mut inner = StoreInner::default();
        for kind in PRIMITIVES {
            let id = TypeId(inner.kinds.len() as u32);
            inner.kinds.push(TypeKind::Primitive(kind));
            inner.index.insert(TypeKind::Primitive(kind), id);
        }
        TypeStore {
            inner: Rc::new(RefCell::new(inner)),
        }
    }

    fn intern(&self, kind: TypeKind) -> Type {
        let mut inner = self.inner.borrow_mut();
        let id = match inner.index.get(&kind) {
            Some(id) => *id,
            None => {
                let id = TypeId(inner.kinds.len() as u32);
                inner.kinds.push(kind.clone());
                inner.index.insert(kind, id);
                id
            }
        };
        Type {
            id,
            const_: false,
            ref_: false,
        }
    }

    /// Pointer to `pointee` (whose own qualifiers are preserved).
    pub fn pointer_to(&self, pointee: Type) -> Type {
        self.intern(TypeKind::Pointer(pointee))
    }

    /// Array with elements of `element`.
    pub fn array_of(&self, element: Type) -> Type {
        self.intern(TypeKind::Array(element))
    }

    pub fn function(&self, ret: Option<Type>, params: Vec<Type>, defaults: Vec<Type>) -> Type {
        self.intern(TypeKind::Function {
            ret,
            params,
            defaults,
        })
    }

    pub fn complex(&self, name: impl Into<String>, fields: Vec<(String, Type)>) -> Type {
        self.intern(TypeKind::Complex {
            name: name.into(),
            fields,
        })
    }

    pub fn kind(&self, ty: Type) -> TypeKind {
        self.inner.borrow().kinds[ty.id.0 as usize].clone()
    }

    pub fn primitive_of(&self, ty: Type) -> Option<PrimitiveType> {
        match self.inner.borrow().kinds[ty.id.0 as usize] {
            TypeKind::Primitive(p) => Some(p),
            _ => None,
        }
    }

    pub fn is_primitive(&self, ty: Type) -> bool {
        self.primitive_of(ty).is_some()
    }

    /// Size in bytes of a value of this type. Qualifiers do not contribute;
    /// a reference-qualified *slot* is sized by [`TypeStore::slot_size`].
    pub fn size_of(&self, ty: Type) -> u32 {
        match self.kind(ty) {
            TypeKind::Primitive(p) => p.size(),
            TypeKind::Pointer(_) | TypeKind::Function { .. } | TypeKind::Array(_) => 8,
            TypeKind::Complex { fields, .. } => {
                fields.iter().map(|(_, t)| self.size_of(*t)).sum()
            }
        }
    }

    /// Size of a stack-frame slot holding this type: references store an
    /// 8-byte address, everything else stores the value itself.
    pub fn slot_size(&self, ty: Type) -> u32 {
        if ty.is_ref() {
            8
        } else {
            self.size_of(ty)
        }
    }

    /// Offset and type of a named field of a complex type.
    pub fn field_of(&self, ty: Type, name: &str) -> Option<(u64, Type)> {
        match self.kind(ty) {
            TypeKind::Complex { fields, .. } => {
                let mut offset = 0u64;
                for (field_name, field_ty) in fields {
                    if field_name == name {
                        return Some((offset, field_ty));
                    }
                    offset += u64::from(self.size_of(field_ty));
                }
                None
            }
            _ => None,
        }
    }

    /// Language-flavoured rendering, used by diagnostics.
    pub fn display(&self, ty: Type) -> String {
        let mut out = String::new();
        if ty.is_const() {
            out.push_str("const ");
        }
        match self.kind(ty) {
            TypeKind::Primitive(p) => out.push_str(p.name()),
            TypeKind::Complex { name, .. } => {
                out.push_str("struct ");
                out.push_str(&name);
            }
            TypeKind::Pointer(inner) => {
                out.push_str(&self.display(inner));
                out.push('*');
            }
            TypeKind::Array(inner) => {
                out.push_str(&self.display(inner));
                out.push_str("[]");
            }
            TypeKind::Function {
                ret,
                params,
                defaults,
            } => {
                match ret {
                    Some(r) => out.push_str(&self.display(r)),
                    None => out.push_str("void"),
                }
                out.push('(');
                let mut first = true;
                for p in params.iter().chain(defaults.iter()) {
                    if !first {
                        out.push_str(", ");
                    }
                    first = false;
                    out.push_str(&self.display(*p));
                }
                out.push(')');
            }
        }
        if ty.is_ref() {
            out.push_str(" &");
        }
        out
    }

    /// Rendering of an optional (possibly void) type.
    pub fn display_opt(&self, ty: Option<Type>) -> String {
        match ty {
            Some(t) => self.display(t),
            None => "void".to_string(),
        }
    }
}
