//! The 44-entry operator catalogue: ten unary prefixes, two unary
//! postfixes, thirty-two binaries (call and subscript are dispatched by the
//! analyser itself, not the signature tables).

/// Unary prefix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryPrefixOp {
    Increment,
    Decrement,
    Plus,
    Minus,
    Invert,
    Tilda,
    Dereference,
    AddressOf,
    New,
    Delete,
}

impl UnaryPrefixOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            UnaryPrefixOp::Increment => "++",
            UnaryPrefixOp::Decrement => "--",
            UnaryPrefixOp::Plus => "+",
            UnaryPrefixOp::Minus => "-",
            UnaryPrefixOp::Invert => "!",
            UnaryPrefixOp::Tilda => "~",
            UnaryPrefixOp::Dereference => "*",
            UnaryPrefixOp::AddressOf => "&",
            UnaryPrefixOp::New => "new",
            UnaryPrefixOp::Delete => "delete",
        }
    }
}

/// Unary postfix operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum UnaryPostfixOp {
    Increment,
    Decrement,
}

impl UnaryPostfixOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            UnaryPostfixOp::Increment => "++",
            UnaryPostfixOp::Decrement => "--",
        }
    }
}

/// Binary operators. `FunctionCall` and `Subscript` are listed for catalogue
/// completeness; the analyser resolves them structurally.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BinaryOp {
    FunctionCall,
    Subscript,
    MemberAccess,
    Multiplication,
    Division,
    Modulus,
    Addition,
    Subtraction,
    ShiftLeft,
    ShiftRight,
    Less,
    More,
    LessOrEqual,
    MoreOrEqual,
    Equal,
    NotEqual,
    BitwiseAnd,
    BitwiseXor,
    BitwiseOr,
    LogicalAnd,
    LogicalOr,
    Assignment,
    AdditionAssignment,
    SubtractionAssignment,
    MultiplicationAssignment,
    DivisionAssignment,
    ModulusAssignment,
    ShiftLeftAssignment,
    ShiftRightAssignment,
    AndAssignment,
    OrAssignment,
    XorAssignment,
}

/// The assignment family, in the order priority-1 scans for them.
pub const ASSIGNMENT_OPS: [BinaryOp; 11] = [
    BinaryOp::Assignment,
    BinaryOp::ShiftLeftAssignment,
    BinaryOp::ShiftRightAssignment,
    BinaryOp::AdditionAssignment,
    BinaryOp::SubtractionAssignment,
    BinaryOp::MultiplicationAssignment,
    BinaryOp::DivisionAssignment,
    BinaryOp::XorAssignment,
    BinaryOp::OrAssignment,
    BinaryOp::AndAssignment,
    BinaryOp::ModulusAssignment,
];

impl BinaryOp {
    pub fn lexeme(self) -> &'static str {
        match self {
            BinaryOp::FunctionCall => "()",
            BinaryOp::Subscript => "[]",
            BinaryOp::MemberAccess => ".",
            BinaryOp::Multiplication => "*",
            BinaryOp::Division => "/",
            BinaryOp::Modulus => "%",
            BinaryOp::Addition => "+",
            BinaryOp::Subtraction => "-",
            BinaryOp::ShiftLeft => "<<",
            BinaryOp::ShiftRight => ">>",
            BinaryOp::Less => "<",
            BinaryOp::More => ">",
            BinaryOp::LessOrEqual => "<=",
            BinaryOp::MoreOrEqual => ">=",
            BinaryOp::Equal => "==",
            BinaryOp::NotEqual => "!=",
            BinaryOp::BitwiseAnd => "&",
            BinaryOp::BitwiseXor => "^",
            BinaryOp::BitwiseOr => "|",
            BinaryOp::LogicalAnd => "&&",
            BinaryOp::LogicalOr => "||",
            BinaryOp::Assignment => "=",
            BinaryOp::AdditionAssignment => "+=",
            BinaryOp::SubtractionAssignment => "-=",
            BinaryOp::MultiplicationAssignment => "*=",
            BinaryOp::DivisionAssignment => "/=",
            BinaryOp::ModulusAssignment => "%=",
            BinaryOp::ShiftLeftAssignment => "<<=",
            BinaryOp::ShiftRightAssignment => ">>=",
            BinaryOp::AndAssignment => "&=",
            BinaryOp::OrAssignment => "|=",
            BinaryOp::XorAssignment => "^=",
        }
    }

    /// Whether the operator writes through its left operand (plain
    /// assignment included).
    pub fn is_assignment(self) -> bool {
        ASSIGNMENT_OPS.contains(&self)
    }

    /// The value-computing operator a compound assignment applies before
    /// storing; `None` for everything that is not a compound assignment.
    pub fn compound_base(self) -> Option<BinaryOp> {
        Some(match self {
            BinaryOp::AdditionAssignment => BinaryOp::Addition,
            BinaryOp::SubtractionAssignment => BinaryOp::Subtraction,
            BinaryOp::MultiplicationAssignment => BinaryOp::Multiplication,
            BinaryOp::DivisionAssignment => BinaryOp::Division,
            BinaryOp::ModulusAssignment => BinaryOp::Modulus,
            BinaryOp::ShiftLeftAssignment => BinaryOp::ShiftLeft,
            BinaryOp::ShiftRightAssignment => BinaryOp::ShiftRight,
            BinaryOp::AndAssignment => BinaryOp::BitwiseAnd,
            BinaryOp::OrAssignment => BinaryOp::BitwiseOr,
            BinaryOp::XorAssignment => BinaryOp::BitwiseXor,
            _ => return None,
        })
    }
}

impl std::fmt::Display for UnaryPrefixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lexeme())
    }
}

impl std::fmt::Display for UnaryPostfixOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lexeme())
    }
}

impl std::fmt::Display for BinaryOp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.lexeme())
    }
}
