//! The `.bbl` binary bytecode format.
//!
//! # File format
//!
//! ```text
//! +-------------------+
//! | Version (1 byte)  |  currently 0
//! +-------------------+
//! | Node, node, ...   |  until end of file
//! +-------------------+
//! ```
//!
//! Each node starts with one kind byte. An operand is followed by its
//! 8-byte big-endian payload; an operator by one opcode byte and one
//! primitive tag byte. Symbolic references and relative operands never
//! reach a file: serialising a stream that still contains them is an
//! error, and a loader finding their kind bytes rejects the file.

use std::fs::File;
use std::io::{self, Read, Write};
use std::path::Path;

use thiserror::Error;

use crate::ir::{Node, Op, Program};
use crate::types::PrimitiveType;

/// Current bytecode format version.
pub const VERSION: u8 = 0;

const KIND_OPERAND: u8 = 0;
const KIND_OPERATOR: u8 = 1;

/// Bytecode (de)serialisation errors.
#[derive(Error, Debug)]
pub enum BytecodeError {
    #[error("i/o error: {0}")]
    Io(#[from] io::Error),
    #[error("unsupported bytecode version {0} (current: {VERSION})")]
    UnsupportedVersion(u8),
    #[error("unknown node kind byte {0}")]
    UnknownNodeKind(u8),
    #[error("unknown opcode byte {0}")]
    UnknownOpcode(u8),
    #[error("unknown primitive tag byte {0}")]
    UnknownTag(u8),
    #[error("file ends in the middle of a node")]
    Truncated,
    #[error("stream contains an unresolved {0} node")]
    Unserializable(&'static str),
}

/// Serialise a linked program.
pub fn save<W: Write>(program: &Program, mut writer: W) -> Result<(), BytecodeError> {
    writer.write_all(&[VERSION])?;
    for node in program.nodes() {
        match node {
            Node::Operand(value) => {
                writer.write_all(&[KIND_OPERAND])?;
                writer.write_all(&value.to_be_bytes())?;
            }
            Node::Operator(op, tag) => {
                writer.write_all(&[KIND_OPERATOR, *op as u8, *tag as u8])?;
            }
            Node::SymbolicReference(_) => {
                return Err(BytecodeError::Unserializable("symbolic reference"));
            }
            Node::RelativeOperand(_) => {
                return Err(BytecodeError::Unserializable("relative operand"));
            }
        }
    }
    Ok(())
}

/// Deserialise a program, validating every byte.
pub fn load<R: Read>(mut reader: R) -> Result<Program, BytecodeError> {
    let version = match read_byte(&mut reader)? {
        Some(b) => b,
        None => return Err(BytecodeError::Truncated),
    };
    if version != VERSION {
        return Err(BytecodeError::UnsupportedVersion(version));
    }

    let mut program = Program::new();
    while let Some(kind) = read_byte(&mut reader)? {
        match kind {
            KIND_OPERAND => {
                let mut payload = [0u8; 8];
                reader
                    .read_exact(&mut payload)
                    .map_err(map_eof_to_truncated)?;
                program.push_operand(u64::from_be_bytes(payload));
            }
            KIND_OPERATOR => {
                let mut payload = [0u8; 2];
                reader
                    .read_exact(&mut payload)
                    .map_err(map_eof_to_truncated)?;
                let op = Op::from_u8(payload[0]).ok_or(BytecodeError::UnknownOpcode(payload[0]))?;
                let tag = PrimitiveType::from_u8(payload[1])
                    .ok_or(BytecodeError::UnknownTag(payload[1]))?;
                program.push_op(op, tag);
            }
            other => return Err(BytecodeError::UnknownNodeKind(other)),
        }
    }
    Ok(program)
}

pub fn save_to_path(program: &Program, path: impl AsRef<Path>) -> Result<(), BytecodeError> {
    let file = File::create(path)?;
    save(program, io::BufWriter::new(file))
}

pub fn load_from_path(path: impl AsRef<Path>) -> Result<Program, BytecodeError> {
    let file = File::open(path)?;
    load(io::BufReader::new(file))
}

fn read_byte<R: Read>(reader: &mut R) -> Result<Option<u8>, BytecodeError> {
    let mut byte = [0u8; 1];
    match reader.read_exact(&mut byte) {
        Ok(()) => Ok(Some(byte[0])),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(None),
        Err(e) => Err(e.into()),
    }
}

fn map_eof_to_truncated(e: io::Error) -> BytecodeError {
    if e.kind() == io::ErrorKind::UnexpectedEof {
        BytecodeError::Truncated
    } else {
        BytecodeError::Io(e)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::FuncId;
    use pretty_assertions::assert_eq;

    fn sample() -> Program {
        let mut program = Program::new();
        program.push_operand(2);
        program.push_operand(u64::MAX);
        program.push_op(Op::Add, PrimitiveType::Int32);
        program.push_op(Op::Load, PrimitiveType::F64);
        program.push_op_untyped(Op::Return);
        program
    }

    #[test]
    fn round_trip_is_identity() {
        let program = sample();
        let mut bytes = Vec::new();
        save(&program, &mut bytes).unwrap();
        let loaded = load(bytes.as_slice()).unwrap();
        assert_eq!(loaded.nodes(), program.nodes());
    }

    #[test]
    fn version_byte_is_checked() {
        let mut bytes = Vec::new();
        save(&sample(), &mut bytes).unwrap();
        assert_eq!(bytes[0], VERSION);
        bytes[0] = 9;
        assert!(matches!(
            load(bytes.as_slice()),
            Err(BytecodeError::UnsupportedVersion(9))
        ));
    }

    #[test]
    fn operands_are_big_endian() {
        let mut program = Program::new();
        program.push_operand(0x0102_0304_0506_0708);
        let mut bytes = Vec::new();
        save(&program, &mut bytes).unwrap();
        assert_eq!(&bytes[1..], &[0, 1, 2, 3, 4, 5, 6, 7, 8]);
    }

    #[test]
    fn unresolved_nodes_do_not_serialise() {
        let mut program = Program::new();
        program.push_symbolic("f", FuncId(1));
        assert!(matches!(
            save(&program, &mut Vec::new()),
            Err(BytecodeError::Unserializable(_))
        ));

        let mut program = Program::new();
        program.push_relative(4);
        assert!(matches!(
            save(&program, &mut Vec::new()),
            Err(BytecodeError::Unserializable(_))
        ));
    }

    #[test]
    fn corrupt_streams_are_rejected() {
        // truncated operand payload
        let bytes = [VERSION, KIND_OPERAND, 0, 1, 2];
        assert!(matches!(
            load(bytes.as_slice()),
            Err(BytecodeError::Truncated)
        ));

        // bad node kind
        let bytes = [VERSION, 7];
        assert!(matches!(
            load(bytes.as_slice()),
            Err(BytecodeError::UnknownNodeKind(7))
        ));

        // bad opcode
        let bytes = [VERSION, KIND_OPERATOR, 200, 0];
        assert!(matches!(
            load(bytes.as_slice()),
            Err(BytecodeError::UnknownOpcode(200))
        ));

        // bad tag
        let bytes = [VERSION, KIND_OPERATOR, 0, 99];
        assert!(matches!(
            load(bytes.as_slice()),
            Err(BytecodeError::UnknownTag(99))
        ));

        // empty file has no version byte
        assert!(matches!(load([].as_slice()), Err(BytecodeError::Truncated)));
    }
}
