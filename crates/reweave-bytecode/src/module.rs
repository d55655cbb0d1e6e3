//! Module format for woven binaries
//!
//! A module owns all type definitions; types own their fields, methods,
//! and properties. The weaver mutates modules in place (adding fields,
//! rewriting method bodies) between one decode and one encode.

use crate::encoder::{
    decode_instruction, encode_instruction, BytecodeReader, BytecodeWriter, DecodeError,
};
use crate::instr::{AccessorKind, Instruction, MethodRef, TypeRef};
use thiserror::Error;

/// Magic number for Reweave module files: "RWVE"
pub const MAGIC: [u8; 4] = *b"RWVE";

/// Current module format version
pub const VERSION: u32 = 1;

/// Module encoding/decoding errors
#[derive(Debug, Error)]
pub enum ModuleError {
    /// Decode error
    #[error("Decode error: {0}")]
    DecodeError(#[from] DecodeError),

    /// Invalid magic number
    #[error("Invalid magic number: expected RWVE, got {0:?}")]
    InvalidMagic([u8; 4]),

    /// Unsupported version
    #[error("Unsupported version: {0} (current: {VERSION})")]
    UnsupportedVersion(u32),

    /// Checksum mismatch
    #[error("Checksum mismatch: expected {expected:#x}, got {actual:#x}")]
    ChecksumMismatch {
        /// Checksum stored in the module header
        expected: u32,
        /// Checksum computed over the decoded payload
        actual: u32,
    },

    /// An instruction's operand does not match its opcode
    #[error("Operand mismatch in {method} at instruction {index}")]
    OperandMismatch {
        /// Fully qualified method name
        method: String,
        /// Instruction index within the method body
        index: usize,
    },
}

/// A module under transformation
#[derive(Debug, Clone)]
pub struct Module {
    /// Magic number (must be "RWVE")
    pub magic: [u8; 4],
    /// Module format version
    pub version: u32,
    /// Module flags (reserved)
    pub flags: u32,
    /// Type definitions
    pub types: Vec<TypeDef>,
    /// Module metadata
    pub metadata: Metadata,
}

/// Module metadata
#[derive(Debug, Clone, Default)]
pub struct Metadata {
    /// Module name
    pub name: String,
    /// Source file path, when known
    pub source_file: Option<String>,
}

/// A type definition owning fields, methods, and properties
#[derive(Debug, Clone)]
pub struct TypeDef {
    /// Fully qualified type name
    pub name: String,
    /// Fields declared on the type
    pub fields: Vec<Field>,
    /// Methods declared on the type
    pub methods: Vec<Method>,
    /// Properties declared on the type
    pub properties: Vec<Property>,
}

/// A field definition
#[derive(Debug, Clone, PartialEq)]
pub struct Field {
    /// Field name
    pub name: String,
    /// Declared value type
    pub field_type: TypeRef,
    /// Private visibility flag
    pub is_private: bool,
}

/// A method definition owning an ordered instruction sequence
#[derive(Debug, Clone)]
pub struct Method {
    /// Method name
    pub name: String,
    /// Static flag (no receiver)
    pub is_static: bool,
    /// Number of declared parameters
    pub param_count: usize,
    /// True when the method returns a value
    pub returns_value: bool,
    /// Set when this method is a property accessor
    pub accessor: Option<AccessorKind>,
    /// Method body as a flat instruction sequence
    pub body: Vec<Instruction>,
}

impl Method {
    /// Fully qualified name for diagnostics
    pub fn full_name(&self, declaring: &TypeDef) -> String {
        format!("{}::{}", declaring.name, self.name)
    }

    /// Build a call-site reference to this method
    pub fn make_ref(&self, declaring: &TypeDef) -> MethodRef {
        MethodRef {
            declaring: TypeRef::named(declaring.name.clone()),
            name: self.name.clone(),
            param_count: self.param_count,
            has_this: !self.is_static,
            returns_value: self.returns_value,
            type_args: Vec::new(),
            accessor: self.accessor,
        }
    }
}

/// A property pairing accessor methods with a compiler-synthesized
/// backing field
///
/// All three slots are indices into the owning [`TypeDef`]'s method and
/// field lists.
#[derive(Debug, Clone, PartialEq)]
pub struct Property {
    /// Property name
    pub name: String,
    /// Getter method index
    pub getter: Option<usize>,
    /// Setter method index
    pub setter: Option<usize>,
    /// Backing field index for auto-properties
    pub backing_field: Option<usize>,
}

impl TypeDef {
    /// Create an empty type definition
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
        }
    }

    /// Reference to this type
    pub fn type_ref(&self) -> TypeRef {
        TypeRef::named(self.name.clone())
    }

    /// Index of the property with the given name
    pub fn find_property(&self, name: &str) -> Option<usize> {
        self.properties.iter().position(|p| p.name == name)
    }

    /// Index of the field with the given name
    pub fn find_field(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    /// Append a field, returning its index
    pub fn add_field(&mut self, field: Field) -> usize {
        self.fields.push(field);
        self.fields.len() - 1
    }

    /// Remove a method and remap the method indices held by properties
    pub fn remove_method(&mut self, index: usize) {
        self.methods.remove(index);
        for property in &mut self.properties {
            property.getter = remap_after_removal(property.getter, index);
            property.setter = remap_after_removal(property.setter, index);
        }
    }
}

/// Shift an optional method index down past a removed slot
fn remap_after_removal(slot: Option<usize>, removed: usize) -> Option<usize> {
    match slot {
        Some(i) if i == removed => None,
        Some(i) if i > removed => Some(i - 1),
        other => other,
    }
}

impl Module {
    /// Create a new empty module
    pub fn new(name: String) -> Self {
        Self {
            magic: MAGIC,
            version: VERSION,
            flags: 0,
            types: Vec::new(),
            metadata: Metadata {
                name,
                source_file: None,
            },
        }
    }

    /// Validate module structure
    pub fn validate(&self) -> Result<(), ModuleError> {
        if self.magic != MAGIC {
            return Err(ModuleError::InvalidMagic(self.magic));
        }
        if self.version != VERSION {
            return Err(ModuleError::UnsupportedVersion(self.version));
        }
        Ok(())
    }

    /// Encode the module to binary format (.rwm)
    ///
    /// Format:
    /// - Header: magic (4 bytes) + version (u32) + flags (u32) + checksum (u32)
    /// - Type table (fields, methods with encoded bodies, properties)
    /// - Metadata
    ///
    /// The checksum is a CRC32 over everything after the header.
    pub fn encode(&self) -> Result<Vec<u8>, ModuleError> {
        let mut writer = BytecodeWriter::new();

        let header_start = writer.offset();
        writer.emit_bytes(&self.magic);
        writer.emit_u32(self.version);
        writer.emit_u32(self.flags);
        let checksum_offset = writer.offset();
        writer.emit_u32(0); // Placeholder for checksum

        writer.emit_u32(self.types.len() as u32);
        for ty in &self.types {
            ty.encode(&mut writer)?;
        }

        self.metadata.encode(&mut writer);

        let payload = &writer.buffer()[header_start + 16..];
        let checksum = crc32fast::hash(payload);
        writer.patch_u32(checksum_offset, checksum);

        Ok(writer.into_bytes())
    }

    /// Decode a module from binary format
    pub fn decode(data: &[u8]) -> Result<Self, ModuleError> {
        let mut reader = BytecodeReader::new(data);

        let magic_bytes = reader.read_bytes(4)?;
        let mut magic = [0u8; 4];
        magic.copy_from_slice(&magic_bytes);
        if magic != MAGIC {
            return Err(ModuleError::InvalidMagic(magic));
        }

        let version = reader.read_u32()?;
        if version != VERSION {
            return Err(ModuleError::UnsupportedVersion(version));
        }

        let flags = reader.read_u32()?;
        let stored_checksum = reader.read_u32()?;

        let payload = &data[16..];
        let calculated_checksum = crc32fast::hash(payload);
        if stored_checksum != calculated_checksum {
            return Err(ModuleError::ChecksumMismatch {
                expected: stored_checksum,
                actual: calculated_checksum,
            });
        }

        let type_count = reader.read_u32()? as usize;
        let mut types = Vec::with_capacity(type_count);
        for _ in 0..type_count {
            types.push(TypeDef::decode(&mut reader)?);
        }

        let metadata = Metadata::decode(&mut reader)?;

        Ok(Self {
            magic,
            version,
            flags,
            types,
            metadata,
        })
    }
}

impl TypeDef {
    fn encode(&self, writer: &mut BytecodeWriter) -> Result<(), ModuleError> {
        writer.emit_str(&self.name);

        writer.emit_u32(self.fields.len() as u32);
        for field in &self.fields {
            field.encode(writer);
        }

        writer.emit_u32(self.methods.len() as u32);
        for method in &self.methods {
            method.encode(self, writer)?;
        }

        writer.emit_u32(self.properties.len() as u32);
        for property in &self.properties {
            property.encode(writer);
        }

        Ok(())
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;

        let field_count = reader.read_u32()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(Field::decode(reader)?);
        }

        let method_count = reader.read_u32()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(Method::decode(reader)?);
        }

        let property_count = reader.read_u32()? as usize;
        let mut properties = Vec::with_capacity(property_count);
        for _ in 0..property_count {
            properties.push(Property::decode(reader)?);
        }

        Ok(Self {
            name,
            fields,
            methods,
            properties,
        })
    }
}

impl Field {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_str(&self.name);
        writer.emit_type_ref(&self.field_type);
        writer.emit_u8(u8::from(self.is_private));
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let field_type = reader.read_type_ref()?;
        let is_private = reader.read_u8()? != 0;
        Ok(Self {
            name,
            field_type,
            is_private,
        })
    }
}

impl Method {
    fn encode(&self, declaring: &TypeDef, writer: &mut BytecodeWriter) -> Result<(), ModuleError> {
        writer.emit_str(&self.name);
        let mut method_flags = 0u8;
        if self.is_static {
            method_flags |= 1;
        }
        if self.returns_value {
            method_flags |= 2;
        }
        writer.emit_u8(method_flags);
        writer.emit_u16(self.param_count as u16);
        writer.emit_accessor(self.accessor);

        writer.emit_u32(self.body.len() as u32);
        for (index, instruction) in self.body.iter().enumerate() {
            encode_instruction(writer, instruction).map_err(|_| ModuleError::OperandMismatch {
                method: self.full_name(declaring),
                index,
            })?;
        }
        Ok(())
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let method_flags = reader.read_u8()?;
        let param_count = reader.read_u16()? as usize;
        let accessor = reader.read_accessor()?;

        let instruction_count = reader.read_u32()? as usize;
        let mut body = Vec::with_capacity(instruction_count);
        for _ in 0..instruction_count {
            body.push(decode_instruction(reader)?);
        }

        Ok(Self {
            name,
            is_static: method_flags & 1 != 0,
            param_count,
            returns_value: method_flags & 2 != 0,
            accessor,
            body,
        })
    }
}

impl Property {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_str(&self.name);
        writer.emit_opt_index(self.getter);
        writer.emit_opt_index(self.setter);
        writer.emit_opt_index(self.backing_field);
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let getter = reader.read_opt_index()?;
        let setter = reader.read_opt_index()?;
        let backing_field = reader.read_opt_index()?;
        Ok(Self {
            name,
            getter,
            setter,
            backing_field,
        })
    }
}

impl Metadata {
    fn encode(&self, writer: &mut BytecodeWriter) {
        writer.emit_str(&self.name);
        match &self.source_file {
            Some(path) => {
                writer.emit_u8(1);
                writer.emit_str(path);
            }
            None => {
                writer.emit_u8(0);
            }
        }
    }

    fn decode(reader: &mut BytecodeReader<'_>) -> Result<Self, DecodeError> {
        let name = reader.read_string()?;
        let has_source = reader.read_u8()? != 0;
        let source_file = if has_source {
            Some(reader.read_string()?)
        } else {
            None
        };
        Ok(Self { name, source_file })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{FieldRef, Instruction, Operand};
    use crate::opcode::Opcode;

    fn sample_type() -> TypeDef {
        let mut ty = TypeDef::new("App.ViewModel");
        ty.fields.push(Field {
            name: "m_total".to_string(),
            field_type: TypeRef::named("Double"),
            is_private: true,
        });
        ty.methods.push(Method {
            name: "get_Total".to_string(),
            is_static: false,
            param_count: 0,
            returns_value: true,
            accessor: Some(AccessorKind::Get),
            body: vec![
                Instruction::load_this(),
                Instruction::load_field(FieldRef {
                    declaring: TypeRef::named("App.ViewModel"),
                    name: "m_total".to_string(),
                    field_type: TypeRef::named("Double"),
                }),
                Instruction::ret(),
            ],
        });
        ty.methods.push(Method {
            name: "set_Total".to_string(),
            is_static: false,
            param_count: 1,
            returns_value: false,
            accessor: Some(AccessorKind::Set),
            body: vec![
                Instruction::load_this(),
                Instruction::load_arg(1),
                Instruction::store_field(FieldRef {
                    declaring: TypeRef::named("App.ViewModel"),
                    name: "m_total".to_string(),
                    field_type: TypeRef::named("Double"),
                }),
                Instruction::ret_void(),
            ],
        });
        ty.properties.push(Property {
            name: "Total".to_string(),
            getter: Some(0),
            setter: Some(1),
            backing_field: Some(0),
        });
        ty
    }

    #[test]
    fn test_module_creation() {
        let module = Module::new("test".to_string());
        assert_eq!(module.magic, MAGIC);
        assert_eq!(module.version, VERSION);
        assert!(module.validate().is_ok());
    }

    #[test]
    fn test_roundtrip_with_type() {
        let mut module = Module::new("vm".to_string());
        module.metadata.source_file = Some("src/view_model.cs".to_string());
        module.types.push(sample_type());

        let bytes = module.encode().unwrap();
        let decoded = Module::decode(&bytes).unwrap();

        assert_eq!(decoded.metadata.name, "vm");
        assert_eq!(
            decoded.metadata.source_file,
            Some("src/view_model.cs".to_string())
        );
        assert_eq!(decoded.types.len(), 1);
        let ty = &decoded.types[0];
        assert_eq!(ty.name, "App.ViewModel");
        assert_eq!(ty.fields, module.types[0].fields);
        assert_eq!(ty.properties, module.types[0].properties);
        assert_eq!(ty.methods[0].body, module.types[0].methods[0].body);
        assert_eq!(ty.methods[1].accessor, Some(AccessorKind::Set));
    }

    #[test]
    fn test_checksum_validation() {
        let mut module = Module::new("test".to_string());
        module.types.push(sample_type());
        let mut bytes = module.encode().unwrap();

        // Corrupt a payload byte
        bytes[20] ^= 0xFF;
        let result = Module::decode(&bytes);
        assert!(matches!(result, Err(ModuleError::ChecksumMismatch { .. })));
    }

    #[test]
    fn test_invalid_magic() {
        let mut bytes = vec![b'X', b'X', b'X', b'X'];
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let result = Module::decode(&bytes);
        assert!(matches!(result, Err(ModuleError::InvalidMagic(_))));
    }

    #[test]
    fn test_unsupported_version() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(b"RWVE");
        bytes.extend_from_slice(&999u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());
        bytes.extend_from_slice(&0u32.to_le_bytes());

        let result = Module::decode(&bytes);
        assert!(matches!(result, Err(ModuleError::UnsupportedVersion(999))));
    }

    #[test]
    fn test_encode_rejects_operand_mismatch() {
        let mut module = Module::new("bad".to_string());
        let mut ty = TypeDef::new("T");
        ty.methods.push(Method {
            name: "broken".to_string(),
            is_static: true,
            param_count: 0,
            returns_value: false,
            accessor: None,
            body: vec![Instruction::new(Opcode::Call, Operand::None)],
        });
        module.types.push(ty);

        let result = module.encode();
        assert!(matches!(
            result,
            Err(ModuleError::OperandMismatch { index: 0, .. })
        ));
    }

    #[test]
    fn test_remove_method_remaps_properties() {
        let mut ty = sample_type();
        ty.remove_method(1); // drop the setter

        assert_eq!(ty.methods.len(), 1);
        assert_eq!(ty.properties[0].getter, Some(0));
        assert_eq!(ty.properties[0].setter, None);

        let mut ty = sample_type();
        ty.remove_method(0); // drop the getter; setter index shifts down
        assert_eq!(ty.properties[0].getter, None);
        assert_eq!(ty.properties[0].setter, Some(0));
    }

    #[test]
    fn test_find_helpers() {
        let mut ty = sample_type();
        assert_eq!(ty.find_property("Total"), Some(0));
        assert_eq!(ty.find_property("Missing"), None);
        assert_eq!(ty.find_field("m_total"), Some(0));

        let index = ty.add_field(Field {
            name: "$Total".to_string(),
            field_type: TypeRef::named("Reactive.PropertyHelper"),
            is_private: true,
        });
        assert_eq!(index, 1);
        assert_eq!(ty.find_field("$Total"), Some(1));
    }
}
