//! Symbolic instructions and member references
//!
//! Instructions carry their operands symbolically (field, method, and type
//! references, or inline constants) so that method bodies can be inspected
//! and rewritten without re-resolving raw operand bytes. The binary layout
//! is the encoder's concern.

use crate::opcode::Opcode;

/// Generic-capable reference to a type
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeRef {
    /// Fully qualified type name, e.g. `Reactive.PropertyHelper`
    pub full_name: String,
    /// Generic arguments, empty for non-generic types
    pub type_args: Vec<TypeRef>,
}

impl TypeRef {
    /// Create a non-generic type reference
    pub fn named(full_name: impl Into<String>) -> Self {
        Self {
            full_name: full_name.into(),
            type_args: Vec::new(),
        }
    }

    /// Bind generic arguments, producing an instantiated reference
    pub fn instantiate(&self, type_args: Vec<TypeRef>) -> Self {
        Self {
            full_name: self.full_name.clone(),
            type_args,
        }
    }
}

/// Accessor kind for property accessor methods
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessorKind {
    /// Property getter (`get_Name`)
    Get,
    /// Property setter (`set_Name`)
    Set,
}

/// Reference to a method, carrying enough of the signature to derive
/// stack arity at its call sites
#[derive(Debug, Clone, PartialEq)]
pub struct MethodRef {
    /// Declaring type
    pub declaring: TypeRef,
    /// Method name
    pub name: String,
    /// Number of declared parameters (excluding the receiver)
    pub param_count: usize,
    /// True for instance methods (a receiver is popped at call sites)
    pub has_this: bool,
    /// True when a call pushes a result
    pub returns_value: bool,
    /// Generic arguments bound at the call site
    pub type_args: Vec<TypeRef>,
    /// Set when the method is a property accessor
    pub accessor: Option<AccessorKind>,
}

impl MethodRef {
    /// Fully qualified `Type::method` name for matching and diagnostics
    pub fn full_name(&self) -> String {
        format!("{}::{}", self.declaring.full_name, self.name)
    }

    /// The property name behind an accessor reference
    ///
    /// Strips the `get_`/`set_` prefix; `None` for non-accessor methods.
    pub fn property_name(&self) -> Option<&str> {
        match self.accessor {
            Some(AccessorKind::Get) => self.name.strip_prefix("get_"),
            Some(AccessorKind::Set) => self.name.strip_prefix("set_"),
            None => None,
        }
    }
}

/// Reference to a field
#[derive(Debug, Clone, PartialEq)]
pub struct FieldRef {
    /// Declaring type
    pub declaring: TypeRef,
    /// Field name
    pub name: String,
    /// Declared type of the field's value
    pub field_type: TypeRef,
}

/// Instruction operand
#[derive(Debug, Clone, PartialEq)]
pub enum Operand {
    /// No operand
    None,
    /// Inline 32-bit integer
    I32(i32),
    /// Inline 64-bit float
    F64(f64),
    /// Inline string constant
    Str(String),
    /// Argument or local slot
    Slot(u16),
    /// Field reference
    Field(FieldRef),
    /// Method reference
    Method(MethodRef),
}

/// A single stack-machine instruction
///
/// Immutable once built; an instruction's identity is its position within
/// the owning method body.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    /// Opcode tag
    pub opcode: Opcode,
    /// Symbolic operand
    pub operand: Operand,
}

impl Instruction {
    /// Build an instruction from raw parts
    pub fn new(opcode: Opcode, operand: Operand) -> Self {
        Self { opcode, operand }
    }

    // ===== Constructors =====

    /// `nop`
    pub fn nop() -> Self {
        Self::new(Opcode::Nop, Operand::None)
    }

    /// `pop`
    pub fn pop() -> Self {
        Self::new(Opcode::Pop, Operand::None)
    }

    /// `dup`
    pub fn dup() -> Self {
        Self::new(Opcode::Dup, Operand::None)
    }

    /// `const.null`
    pub fn const_null() -> Self {
        Self::new(Opcode::ConstNull, Operand::None)
    }

    /// `const.i32 <value>`
    pub fn const_i32(value: i32) -> Self {
        Self::new(Opcode::ConstI32, Operand::I32(value))
    }

    /// `const.f64 <value>`
    pub fn const_f64(value: f64) -> Self {
        Self::new(Opcode::ConstF64, Operand::F64(value))
    }

    /// `const.str "<value>"`
    pub fn const_str(value: impl Into<String>) -> Self {
        Self::new(Opcode::ConstStr, Operand::Str(value.into()))
    }

    /// `load.this`
    pub fn load_this() -> Self {
        Self::new(Opcode::LoadThis, Operand::None)
    }

    /// `load.arg <slot>`
    pub fn load_arg(slot: u16) -> Self {
        Self::new(Opcode::LoadArg, Operand::Slot(slot))
    }

    /// `load.local <slot>`
    pub fn load_local(slot: u16) -> Self {
        Self::new(Opcode::LoadLocal, Operand::Slot(slot))
    }

    /// `store.local <slot>`
    pub fn store_local(slot: u16) -> Self {
        Self::new(Opcode::StoreLocal, Operand::Slot(slot))
    }

    /// `load.field <field>`
    pub fn load_field(field: FieldRef) -> Self {
        Self::new(Opcode::LoadField, Operand::Field(field))
    }

    /// `store.field <field>`
    pub fn store_field(field: FieldRef) -> Self {
        Self::new(Opcode::StoreField, Operand::Field(field))
    }

    /// `load.sfield <field>`
    pub fn load_static_field(field: FieldRef) -> Self {
        Self::new(Opcode::LoadStaticField, Operand::Field(field))
    }

    /// `call <method>`
    pub fn call(method: MethodRef) -> Self {
        Self::new(Opcode::Call, Operand::Method(method))
    }

    /// `callvirt <method>`
    pub fn call_virt(method: MethodRef) -> Self {
        Self::new(Opcode::CallVirt, Operand::Method(method))
    }

    /// `newobj <constructor>`
    pub fn new_object(constructor: MethodRef) -> Self {
        Self::new(Opcode::NewObject, Operand::Method(constructor))
    }

    /// `ret`
    pub fn ret() -> Self {
        Self::new(Opcode::Return, Operand::None)
    }

    /// `ret.void`
    pub fn ret_void() -> Self {
        Self::new(Opcode::ReturnVoid, Operand::None)
    }

    // ===== Stack arity =====

    /// Number of values this instruction pops from the evaluation stack
    ///
    /// A pure function of the opcode; for call-like opcodes it derives from
    /// the referenced method's signature. A call-like instruction whose
    /// operand is not a method reference is malformed and reported by the
    /// verifier; here it contributes zero.
    pub fn pops(&self) -> usize {
        match self.opcode {
            Opcode::Nop
            | Opcode::ConstNull
            | Opcode::ConstI32
            | Opcode::ConstF64
            | Opcode::ConstStr
            | Opcode::LoadThis
            | Opcode::LoadArg
            | Opcode::LoadLocal
            | Opcode::LoadStaticField
            | Opcode::ReturnVoid => 0,
            Opcode::Pop
            | Opcode::Dup
            | Opcode::StoreLocal
            | Opcode::LoadField
            | Opcode::Return => 1,
            Opcode::StoreField => 2,
            Opcode::Call | Opcode::CallVirt => match self.called_method() {
                Some(m) => m.param_count + usize::from(m.has_this),
                None => 0,
            },
            Opcode::NewObject => match self.called_method() {
                Some(m) => m.param_count,
                None => 0,
            },
        }
    }

    /// Number of values this instruction pushes onto the evaluation stack
    pub fn pushes(&self) -> usize {
        match self.opcode {
            Opcode::Nop
            | Opcode::Pop
            | Opcode::StoreLocal
            | Opcode::StoreField
            | Opcode::Return
            | Opcode::ReturnVoid => 0,
            Opcode::Dup => 2,
            Opcode::ConstNull
            | Opcode::ConstI32
            | Opcode::ConstF64
            | Opcode::ConstStr
            | Opcode::LoadThis
            | Opcode::LoadArg
            | Opcode::LoadLocal
            | Opcode::LoadField
            | Opcode::LoadStaticField => 1,
            Opcode::Call | Opcode::CallVirt => match self.called_method() {
                Some(m) => usize::from(m.returns_value),
                None => 0,
            },
            Opcode::NewObject => 1,
        }
    }

    /// Net stack effect (`pushes - pops`)
    pub fn stack_effect(&self) -> i32 {
        self.pushes() as i32 - self.pops() as i32
    }

    /// The method reference of a call-like instruction, if well-formed
    pub fn called_method(&self) -> Option<&MethodRef> {
        if !self.opcode.is_call() {
            return None;
        }
        match &self.operand {
            Operand::Method(m) => Some(m),
            _ => None,
        }
    }

    /// The field reference of a field-access instruction, if well-formed
    pub fn accessed_field(&self) -> Option<&FieldRef> {
        match (self.opcode, &self.operand) {
            (
                Opcode::LoadField | Opcode::StoreField | Opcode::LoadStaticField,
                Operand::Field(f),
            ) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn static_fn(name: &str, param_count: usize, returns_value: bool) -> MethodRef {
        MethodRef {
            declaring: TypeRef::named("Test.Fns"),
            name: name.to_string(),
            param_count,
            has_this: false,
            returns_value,
            type_args: Vec::new(),
            accessor: None,
        }
    }

    #[test]
    fn test_constant_arity() {
        assert_eq!(Instruction::const_i32(1).pops(), 0);
        assert_eq!(Instruction::const_i32(1).pushes(), 1);
        assert_eq!(Instruction::const_f64(0.5).stack_effect(), 1);
        assert_eq!(Instruction::const_str("x").stack_effect(), 1);
    }

    #[test]
    fn test_field_arity() {
        let field = FieldRef {
            declaring: TypeRef::named("T"),
            name: "f".to_string(),
            field_type: TypeRef::named("Int32"),
        };
        assert_eq!(Instruction::load_field(field.clone()).pops(), 1);
        assert_eq!(Instruction::load_field(field.clone()).pushes(), 1);
        assert_eq!(Instruction::store_field(field.clone()).pops(), 2);
        assert_eq!(Instruction::store_field(field.clone()).pushes(), 0);
        assert_eq!(Instruction::load_static_field(field).stack_effect(), 1);
    }

    #[test]
    fn test_call_arity_follows_signature() {
        let f2 = static_fn("binary", 2, true);
        let call = Instruction::call(f2);
        assert_eq!(call.pops(), 2);
        assert_eq!(call.pushes(), 1);

        let void_fn = static_fn("log", 1, false);
        assert_eq!(Instruction::call(void_fn).stack_effect(), -1);
    }

    #[test]
    fn test_instance_call_pops_receiver() {
        let m = MethodRef {
            declaring: TypeRef::named("T"),
            name: "set_Value".to_string(),
            param_count: 1,
            has_this: true,
            returns_value: false,
            type_args: Vec::new(),
            accessor: Some(AccessorKind::Set),
        };
        let call = Instruction::call_virt(m);
        assert_eq!(call.pops(), 2);
        assert_eq!(call.pushes(), 0);
    }

    #[test]
    fn test_newobj_pushes_instance() {
        let ctor = MethodRef {
            declaring: TypeRef::named("T"),
            name: ".ctor".to_string(),
            param_count: 1,
            has_this: true,
            returns_value: false,
            type_args: Vec::new(),
            accessor: None,
        };
        let instr = Instruction::new_object(ctor);
        assert_eq!(instr.pops(), 1);
        assert_eq!(instr.pushes(), 1);
    }

    #[test]
    fn test_malformed_call_has_zero_arity() {
        let instr = Instruction::new(Opcode::Call, Operand::None);
        assert_eq!(instr.pops(), 0);
        assert_eq!(instr.pushes(), 0);
        assert!(instr.called_method().is_none());
    }

    #[test]
    fn test_property_name() {
        let mut m = static_fn("set_Total", 1, false);
        m.has_this = true;
        m.accessor = Some(AccessorKind::Set);
        assert_eq!(m.property_name(), Some("Total"));

        m.accessor = None;
        assert_eq!(m.property_name(), None);
    }

    #[test]
    fn test_type_instantiation() {
        let helper = TypeRef::named("Reactive.PropertyHelper");
        let bound = helper.instantiate(vec![TypeRef::named("Double")]);
        assert_eq!(bound.full_name, "Reactive.PropertyHelper");
        assert_eq!(bound.type_args, vec![TypeRef::named("Double")]);
    }
}
