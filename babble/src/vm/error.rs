//! Runtime faults. All of them are fatal: the VM stops at the failing
//! instruction and reports the pc.

use thiserror::Error;

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuntimeFault {
    #[error("null pointer accessed")]
    NullptrAccessed,
    #[error("memory is not allocated")]
    MemoryNotAllocated,
    #[error("memory access out of bounds")]
    MemoryOutOfBounds,
    #[error("division by zero")]
    DivisionByZero,
    #[error("jump outside of program")]
    JumpOutsideOfProgram,
    #[error("queried the frame of a function that was never called")]
    FunctionNotCalled,
    #[error("unresolved reference operand in executable stream")]
    ReferenceOperandMet,
    #[error("operand stack underflow")]
    OperandStackUnderflow,
}

/// A fault together with the program counter it occurred at.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("{fault} (pc = {pc})")]
pub struct Fault {
    pub fault: RuntimeFault,
    pub pc: u64,
}
