//! Reweave Bytecode Definitions
//!
//! This crate provides the instruction set, symbolic references, module
//! format, and stack-balance verification used by the Reweave property
//! weaver.

#![warn(missing_docs)]
#![warn(rust_2018_idioms)]

pub mod encoder;
pub mod fmt;
pub mod instr;
pub mod module;
pub mod opcode;
pub mod verify;

pub use encoder::{BytecodeReader, BytecodeWriter, DecodeError};
pub use fmt::disassemble;
pub use instr::{AccessorKind, FieldRef, Instruction, MethodRef, Operand, TypeRef};
pub use module::{Field, Metadata, Method, Module, ModuleError, Property, TypeDef};
pub use opcode::Opcode;
pub use verify::{verify_module, VerifyError};
