//! Binary encoding and decoding utilities
//!
//! Provides the low-level writer/reader pair plus the wire layout of
//! instructions and symbolic references. Operand layout is determined by
//! the opcode, so instructions need no operand tag on the wire.

use crate::instr::{AccessorKind, FieldRef, Instruction, MethodRef, Operand, TypeRef};
use crate::opcode::Opcode;
use thiserror::Error;

/// Errors that can occur during decoding
#[derive(Debug, Error)]
pub enum DecodeError {
    /// Unexpected end of data
    #[error("Unexpected end of data at offset {0}")]
    UnexpectedEnd(usize),

    /// Invalid UTF-8 string
    #[error("Invalid UTF-8 string at offset {0}")]
    InvalidUtf8(usize),

    /// Invalid opcode
    #[error("Invalid opcode {0:#x} at offset {1}")]
    InvalidOpcode(u8, usize),

    /// Invalid tag byte
    #[error("Invalid tag {0:#x} at offset {1}")]
    InvalidTag(u8, usize),
}

/// An instruction's operand does not match its opcode
#[derive(Debug, Error)]
#[error("Operand does not match opcode")]
pub struct EncodeError;

/// Binary writer for module encoding
pub struct BytecodeWriter {
    buffer: Vec<u8>,
}

impl Default for BytecodeWriter {
    fn default() -> Self {
        Self::new()
    }
}

impl BytecodeWriter {
    /// Create a new writer
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    /// The bytes written so far
    pub fn buffer(&self) -> &[u8] {
        &self.buffer
    }

    /// Consume the writer and return the buffer
    pub fn into_bytes(self) -> Vec<u8> {
        self.buffer
    }

    /// Current offset (length of output)
    pub fn offset(&self) -> usize {
        self.buffer.len()
    }

    // ===== Primitive emission =====

    /// Emit a raw byte
    pub fn emit_u8(&mut self, value: u8) {
        self.buffer.push(value);
    }

    /// Emit raw bytes
    pub fn emit_bytes(&mut self, bytes: &[u8]) {
        self.buffer.extend_from_slice(bytes);
    }

    /// Emit a 16-bit unsigned integer (little-endian)
    pub fn emit_u16(&mut self, value: u16) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit unsigned integer (little-endian)
    pub fn emit_u32(&mut self, value: u32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 32-bit signed integer (little-endian)
    pub fn emit_i32(&mut self, value: i32) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a 64-bit float (little-endian)
    pub fn emit_f64(&mut self, value: f64) {
        self.buffer.extend_from_slice(&value.to_le_bytes());
    }

    /// Emit a length-prefixed UTF-8 string
    pub fn emit_str(&mut self, value: &str) {
        self.emit_u32(value.len() as u32);
        self.buffer.extend_from_slice(value.as_bytes());
    }

    /// Overwrite a previously emitted u32 at the given offset
    pub fn patch_u32(&mut self, offset: usize, value: u32) {
        self.buffer[offset..offset + 4].copy_from_slice(&value.to_le_bytes());
    }

    // ===== Composite emission =====

    /// Emit an optional list index (presence tag + u32)
    pub fn emit_opt_index(&mut self, index: Option<usize>) {
        match index {
            Some(i) => {
                self.emit_u8(1);
                self.emit_u32(i as u32);
            }
            None => self.emit_u8(0),
        }
    }

    /// Emit an accessor-kind tag
    pub fn emit_accessor(&mut self, accessor: Option<AccessorKind>) {
        self.emit_u8(match accessor {
            None => 0,
            Some(AccessorKind::Get) => 1,
            Some(AccessorKind::Set) => 2,
        });
    }

    /// Emit a type reference (name + generic arguments, recursively)
    pub fn emit_type_ref(&mut self, type_ref: &TypeRef) {
        self.emit_str(&type_ref.full_name);
        self.emit_u16(type_ref.type_args.len() as u16);
        for arg in &type_ref.type_args {
            self.emit_type_ref(arg);
        }
    }

    /// Emit a method reference
    pub fn emit_method_ref(&mut self, method: &MethodRef) {
        self.emit_type_ref(&method.declaring);
        self.emit_str(&method.name);
        self.emit_u16(method.param_count as u16);
        let mut flags = 0u8;
        if method.has_this {
            flags |= 1;
        }
        if method.returns_value {
            flags |= 2;
        }
        self.emit_u8(flags);
        self.emit_accessor(method.accessor);
        self.emit_u16(method.type_args.len() as u16);
        for arg in &method.type_args {
            self.emit_type_ref(arg);
        }
    }

    /// Emit a field reference
    pub fn emit_field_ref(&mut self, field: &FieldRef) {
        self.emit_type_ref(&field.declaring);
        self.emit_str(&field.name);
        self.emit_type_ref(&field.field_type);
    }
}

/// Binary reader for module decoding
pub struct BytecodeReader<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> BytecodeReader<'a> {
    /// Create a reader over a byte slice
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Current read offset
    pub fn position(&self) -> usize {
        self.position
    }

    /// True while data remains
    pub fn has_more(&self) -> bool {
        self.position < self.data.len()
    }

    // ===== Primitive reads =====

    /// Read a raw byte
    pub fn read_u8(&mut self) -> Result<u8, DecodeError> {
        let bytes = self.read_bytes(1)?;
        Ok(bytes[0])
    }

    /// Read raw bytes
    pub fn read_bytes(&mut self, count: usize) -> Result<Vec<u8>, DecodeError> {
        if self.position + count > self.data.len() {
            return Err(DecodeError::UnexpectedEnd(self.position));
        }
        let bytes = self.data[self.position..self.position + count].to_vec();
        self.position += count;
        Ok(bytes)
    }

    /// Read a 16-bit unsigned integer (little-endian)
    pub fn read_u16(&mut self) -> Result<u16, DecodeError> {
        let bytes = self.read_bytes(2)?;
        Ok(u16::from_le_bytes([bytes[0], bytes[1]]))
    }

    /// Read a 32-bit unsigned integer (little-endian)
    pub fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 32-bit signed integer (little-endian)
    pub fn read_i32(&mut self) -> Result<i32, DecodeError> {
        let bytes = self.read_bytes(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    /// Read a 64-bit float (little-endian)
    pub fn read_f64(&mut self) -> Result<f64, DecodeError> {
        let bytes = self.read_bytes(8)?;
        let mut raw = [0u8; 8];
        raw.copy_from_slice(&bytes);
        Ok(f64::from_le_bytes(raw))
    }

    /// Read a length-prefixed UTF-8 string
    pub fn read_string(&mut self) -> Result<String, DecodeError> {
        let offset = self.position;
        let length = self.read_u32()? as usize;
        let bytes = self.read_bytes(length)?;
        String::from_utf8(bytes).map_err(|_| DecodeError::InvalidUtf8(offset))
    }

    // ===== Composite reads =====

    /// Read an optional list index
    pub fn read_opt_index(&mut self) -> Result<Option<usize>, DecodeError> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(self.read_u32()? as usize)),
            tag => Err(DecodeError::InvalidTag(tag, offset)),
        }
    }

    /// Read an accessor-kind tag
    pub fn read_accessor(&mut self) -> Result<Option<AccessorKind>, DecodeError> {
        let offset = self.position;
        match self.read_u8()? {
            0 => Ok(None),
            1 => Ok(Some(AccessorKind::Get)),
            2 => Ok(Some(AccessorKind::Set)),
            tag => Err(DecodeError::InvalidTag(tag, offset)),
        }
    }

    /// Read a type reference
    pub fn read_type_ref(&mut self) -> Result<TypeRef, DecodeError> {
        let full_name = self.read_string()?;
        let arg_count = self.read_u16()? as usize;
        let mut type_args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            type_args.push(self.read_type_ref()?);
        }
        Ok(TypeRef {
            full_name,
            type_args,
        })
    }

    /// Read a method reference
    pub fn read_method_ref(&mut self) -> Result<MethodRef, DecodeError> {
        let declaring = self.read_type_ref()?;
        let name = self.read_string()?;
        let param_count = self.read_u16()? as usize;
        let flags = self.read_u8()?;
        let accessor = self.read_accessor()?;
        let arg_count = self.read_u16()? as usize;
        let mut type_args = Vec::with_capacity(arg_count);
        for _ in 0..arg_count {
            type_args.push(self.read_type_ref()?);
        }
        Ok(MethodRef {
            declaring,
            name,
            param_count,
            has_this: flags & 1 != 0,
            returns_value: flags & 2 != 0,
            type_args,
            accessor,
        })
    }

    /// Read a field reference
    pub fn read_field_ref(&mut self) -> Result<FieldRef, DecodeError> {
        let declaring = self.read_type_ref()?;
        let name = self.read_string()?;
        let field_type = self.read_type_ref()?;
        Ok(FieldRef {
            declaring,
            name,
            field_type,
        })
    }
}

/// Encode a single instruction (opcode byte + opcode-determined operand)
pub fn encode_instruction(
    writer: &mut BytecodeWriter,
    instruction: &Instruction,
) -> Result<(), EncodeError> {
    writer.emit_u8(instruction.opcode.to_u8());
    match (instruction.opcode, &instruction.operand) {
        (Opcode::ConstI32, Operand::I32(value)) => writer.emit_i32(*value),
        (Opcode::ConstF64, Operand::F64(value)) => writer.emit_f64(*value),
        (Opcode::ConstStr, Operand::Str(value)) => writer.emit_str(value),
        (Opcode::LoadArg | Opcode::LoadLocal | Opcode::StoreLocal, Operand::Slot(slot)) => {
            writer.emit_u16(*slot)
        }
        (
            Opcode::LoadField | Opcode::StoreField | Opcode::LoadStaticField,
            Operand::Field(field),
        ) => writer.emit_field_ref(field),
        (Opcode::Call | Opcode::CallVirt | Opcode::NewObject, Operand::Method(method)) => {
            writer.emit_method_ref(method)
        }
        (
            Opcode::Nop
            | Opcode::Pop
            | Opcode::Dup
            | Opcode::ConstNull
            | Opcode::LoadThis
            | Opcode::Return
            | Opcode::ReturnVoid,
            Operand::None,
        ) => {}
        _ => return Err(EncodeError),
    }
    Ok(())
}

/// Decode a single instruction
pub fn decode_instruction(reader: &mut BytecodeReader<'_>) -> Result<Instruction, DecodeError> {
    let offset = reader.position();
    let byte = reader.read_u8()?;
    let opcode = Opcode::from_u8(byte).ok_or(DecodeError::InvalidOpcode(byte, offset))?;
    let operand = match opcode {
        Opcode::ConstI32 => Operand::I32(reader.read_i32()?),
        Opcode::ConstF64 => Operand::F64(reader.read_f64()?),
        Opcode::ConstStr => Operand::Str(reader.read_string()?),
        Opcode::LoadArg | Opcode::LoadLocal | Opcode::StoreLocal => {
            Operand::Slot(reader.read_u16()?)
        }
        Opcode::LoadField | Opcode::StoreField | Opcode::LoadStaticField => {
            Operand::Field(reader.read_field_ref()?)
        }
        Opcode::Call | Opcode::CallVirt | Opcode::NewObject => {
            Operand::Method(reader.read_method_ref()?)
        }
        Opcode::Nop
        | Opcode::Pop
        | Opcode::Dup
        | Opcode::ConstNull
        | Opcode::LoadThis
        | Opcode::Return
        | Opcode::ReturnVoid => Operand::None,
    };
    Ok(Instruction { opcode, operand })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roundtrip(instruction: Instruction) -> Instruction {
        let mut writer = BytecodeWriter::new();
        encode_instruction(&mut writer, &instruction).unwrap();
        let bytes = writer.into_bytes();
        let mut reader = BytecodeReader::new(&bytes);
        let decoded = decode_instruction(&mut reader).unwrap();
        assert!(!reader.has_more());
        decoded
    }

    #[test]
    fn test_primitive_roundtrip() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u16(0xBEEF);
        writer.emit_i32(-7);
        writer.emit_f64(0.25);
        writer.emit_str("hello");
        let bytes = writer.into_bytes();

        let mut reader = BytecodeReader::new(&bytes);
        assert_eq!(reader.read_u16().unwrap(), 0xBEEF);
        assert_eq!(reader.read_i32().unwrap(), -7);
        assert_eq!(reader.read_f64().unwrap(), 0.25);
        assert_eq!(reader.read_string().unwrap(), "hello");
        assert!(!reader.has_more());
    }

    #[test]
    fn test_truncated_read() {
        let mut reader = BytecodeReader::new(&[0x01]);
        assert!(matches!(
            reader.read_u32(),
            Err(DecodeError::UnexpectedEnd(0))
        ));
    }

    #[test]
    fn test_instruction_roundtrip_with_method_ref() {
        let method = MethodRef {
            declaring: TypeRef {
                full_name: "Reactive.PropertyHelperMixin".to_string(),
                type_args: Vec::new(),
            },
            name: "ToProperty".to_string(),
            param_count: 4,
            has_this: false,
            returns_value: true,
            type_args: vec![TypeRef::named("App.ViewModel"), TypeRef::named("Double")],
            accessor: None,
        };
        let instruction = Instruction::call(method);
        assert_eq!(roundtrip(instruction.clone()), instruction);
    }

    #[test]
    fn test_instruction_roundtrip_with_field_ref() {
        let helper = TypeRef::named("Reactive.PropertyHelper")
            .instantiate(vec![TypeRef::named("Double")]);
        let field = FieldRef {
            declaring: TypeRef::named("App.ViewModel"),
            name: "$Total".to_string(),
            field_type: helper,
        };
        let instruction = Instruction::store_field(field);
        assert_eq!(roundtrip(instruction.clone()), instruction);
    }

    #[test]
    fn test_operand_mismatch_rejected() {
        let mut writer = BytecodeWriter::new();
        let malformed = Instruction::new(Opcode::ConstStr, Operand::I32(1));
        assert!(encode_instruction(&mut writer, &malformed).is_err());
    }

    #[test]
    fn test_invalid_opcode_byte() {
        let mut reader = BytecodeReader::new(&[0xFF]);
        assert!(matches!(
            decode_instruction(&mut reader),
            Err(DecodeError::InvalidOpcode(0xFF, 0))
        ));
    }

    #[test]
    fn test_patch_u32() {
        let mut writer = BytecodeWriter::new();
        writer.emit_u32(0);
        writer.emit_u8(0xAA);
        writer.patch_u32(0, 0xDEADBEEF);
        let bytes = writer.into_bytes();
        assert_eq!(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]), 0xDEADBEEF);
        assert_eq!(bytes[4], 0xAA);
    }
}
