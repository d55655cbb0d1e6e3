//! Opcodes for the Reweave instruction model
//!
//! The weaver operates on method bodies expressed as flat sequences of
//! stack-machine instructions. Only the single-basic-block subset the
//! weaver understands is modeled; there are no branch opcodes.

/// Opcode enumeration
///
/// All opcodes are single-byte tags. Operands are carried symbolically by
/// [`crate::instr::Instruction`]; their binary layout is defined by the
/// encoder.
///
/// Opcodes are organized into categories:
/// - 0x00-0x0F: Stack manipulation & constants
/// - 0x10-0x1F: Arguments & locals
/// - 0x20-0x2F: Field access
/// - 0x30-0x3F: Calls & allocation
/// - 0x40-0x4F: Returns
#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    // ===== Stack Manipulation & Constants (0x00-0x0F) =====
    /// No operation
    Nop = 0x00,
    /// Pop top value from stack
    Pop = 0x01,
    /// Duplicate top stack value
    Dup = 0x02,
    /// Push null constant
    ConstNull = 0x04,
    /// Push 32-bit integer constant (operand: i32)
    ConstI32 = 0x07,
    /// Push 64-bit float constant (operand: f64)
    ConstF64 = 0x08,
    /// Push string constant (operand: string)
    ConstStr = 0x09,

    // ===== Arguments & Locals (0x10-0x1F) =====
    /// Load the receiver (`this`) of an instance method
    LoadThis = 0x10,
    /// Load an argument by slot (operand: u16 slot)
    LoadArg = 0x11,
    /// Load a local variable (operand: u16 slot)
    LoadLocal = 0x12,
    /// Store top of stack to a local variable (operand: u16 slot)
    StoreLocal = 0x13,

    // ===== Field Access (0x20-0x2F) =====
    /// Pop object, push the value of one of its fields (operand: field ref)
    LoadField = 0x20,
    /// Pop value and object, store value into the field (operand: field ref)
    StoreField = 0x21,
    /// Push the value of a static field (operand: field ref)
    LoadStaticField = 0x22,

    // ===== Calls & Allocation (0x30-0x3F) =====
    /// Call a method (operand: method ref); pops arguments and the
    /// receiver for instance targets, pushes the result if any
    Call = 0x30,
    /// Call a method with virtual dispatch (operand: method ref)
    CallVirt = 0x31,
    /// Allocate an object and run its constructor (operand: method ref);
    /// pops the constructor arguments, pushes the new object
    NewObject = 0x32,

    // ===== Returns (0x40-0x4F) =====
    /// Pop the return value and leave the method
    Return = 0x40,
    /// Leave a void method
    ReturnVoid = 0x41,
}

impl Opcode {
    /// Convert opcode to its byte representation
    pub fn to_u8(self) -> u8 {
        self as u8
    }

    /// Convert a byte to an opcode, if valid
    pub fn from_u8(byte: u8) -> Option<Self> {
        Some(match byte {
            0x00 => Opcode::Nop,
            0x01 => Opcode::Pop,
            0x02 => Opcode::Dup,
            0x04 => Opcode::ConstNull,
            0x07 => Opcode::ConstI32,
            0x08 => Opcode::ConstF64,
            0x09 => Opcode::ConstStr,
            0x10 => Opcode::LoadThis,
            0x11 => Opcode::LoadArg,
            0x12 => Opcode::LoadLocal,
            0x13 => Opcode::StoreLocal,
            0x20 => Opcode::LoadField,
            0x21 => Opcode::StoreField,
            0x22 => Opcode::LoadStaticField,
            0x30 => Opcode::Call,
            0x31 => Opcode::CallVirt,
            0x32 => Opcode::NewObject,
            0x40 => Opcode::Return,
            0x41 => Opcode::ReturnVoid,
            _ => return None,
        })
    }

    /// Human-readable mnemonic for listings
    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Nop => "nop",
            Opcode::Pop => "pop",
            Opcode::Dup => "dup",
            Opcode::ConstNull => "const.null",
            Opcode::ConstI32 => "const.i32",
            Opcode::ConstF64 => "const.f64",
            Opcode::ConstStr => "const.str",
            Opcode::LoadThis => "load.this",
            Opcode::LoadArg => "load.arg",
            Opcode::LoadLocal => "load.local",
            Opcode::StoreLocal => "store.local",
            Opcode::LoadField => "load.field",
            Opcode::StoreField => "store.field",
            Opcode::LoadStaticField => "load.sfield",
            Opcode::Call => "call",
            Opcode::CallVirt => "callvirt",
            Opcode::NewObject => "newobj",
            Opcode::Return => "ret",
            Opcode::ReturnVoid => "ret.void",
        }
    }

    /// True for opcodes that invoke a method target
    pub fn is_call(self) -> bool {
        matches!(self, Opcode::Call | Opcode::CallVirt | Opcode::NewObject)
    }

    /// True for opcodes that end a method body
    pub fn is_terminator(self) -> bool {
        matches!(self, Opcode::Return | Opcode::ReturnVoid)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_all_opcodes() {
        let opcodes = [
            Opcode::Nop,
            Opcode::Pop,
            Opcode::Dup,
            Opcode::ConstNull,
            Opcode::ConstI32,
            Opcode::ConstF64,
            Opcode::ConstStr,
            Opcode::LoadThis,
            Opcode::LoadArg,
            Opcode::LoadLocal,
            Opcode::StoreLocal,
            Opcode::LoadField,
            Opcode::StoreField,
            Opcode::LoadStaticField,
            Opcode::Call,
            Opcode::CallVirt,
            Opcode::NewObject,
            Opcode::Return,
            Opcode::ReturnVoid,
        ];
        for op in opcodes {
            assert_eq!(Opcode::from_u8(op.to_u8()), Some(op));
        }
    }

    #[test]
    fn test_invalid_byte() {
        assert_eq!(Opcode::from_u8(0xFF), None);
        assert_eq!(Opcode::from_u8(0x05), None);
    }

    #[test]
    fn test_classification() {
        assert!(Opcode::Call.is_call());
        assert!(Opcode::CallVirt.is_call());
        assert!(Opcode::NewObject.is_call());
        assert!(!Opcode::LoadField.is_call());
        assert!(Opcode::Return.is_terminator());
        assert!(Opcode::ReturnVoid.is_terminator());
        assert!(!Opcode::Pop.is_terminator());
    }
}
