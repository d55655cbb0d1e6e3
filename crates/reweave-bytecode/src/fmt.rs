//! Human-readable listings
//!
//! Display impls for instructions and a whole-module disassembly used by
//! the CLI `dump` command.

use crate::instr::{Instruction, Operand, TypeRef};
use crate::module::Module;
use std::fmt;

impl fmt::Display for TypeRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name)?;
        if !self.type_args.is_empty() {
            write!(f, "<")?;
            for (i, arg) in self.type_args.iter().enumerate() {
                if i > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{}", arg)?;
            }
            write!(f, ">")?;
        }
        Ok(())
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operand::None => Ok(()),
            Operand::I32(value) => write!(f, "{}", value),
            Operand::F64(value) => write!(f, "{}", value),
            Operand::Str(value) => write!(f, "{:?}", value),
            Operand::Slot(slot) => write!(f, "{}", slot),
            Operand::Field(field) => {
                write!(f, "{}::{} : {}", field.declaring, field.name, field.field_type)
            }
            Operand::Method(method) => {
                write!(f, "{}::{}", method.declaring, method.name)?;
                if !method.type_args.is_empty() {
                    write!(f, "<")?;
                    for (i, arg) in method.type_args.iter().enumerate() {
                        if i > 0 {
                            write!(f, ", ")?;
                        }
                        write!(f, "{}", arg)?;
                    }
                    write!(f, ">")?;
                }
                write!(f, "({})", method.param_count)
            }
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.operand {
            Operand::None => write!(f, "{}", self.opcode.mnemonic()),
            _ => write!(f, "{} {}", self.opcode.mnemonic(), self.operand),
        }
    }
}

/// Produce a textual listing of a module
pub fn disassemble(module: &Module) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "module {} (version {})\n",
        module.metadata.name, module.version
    ));

    for ty in &module.types {
        out.push_str(&format!("\ntype {}\n", ty.name));

        for field in &ty.fields {
            let visibility = if field.is_private { "private" } else { "public" };
            out.push_str(&format!(
                "  field {} {} : {}\n",
                visibility, field.name, field.field_type
            ));
        }

        for property in &ty.properties {
            out.push_str(&format!(
                "  property {} (getter: {:?}, setter: {:?}, backing: {:?})\n",
                property.name, property.getter, property.setter, property.backing_field
            ));
        }

        for method in &ty.methods {
            let qualifier = if method.is_static { "static " } else { "" };
            out.push_str(&format!(
                "  method {}{} ({} params)\n",
                qualifier, method.name, method.param_count
            ));
            for (index, instruction) in method.body.iter().enumerate() {
                out.push_str(&format!("    {:4}: {}\n", index, instruction));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::instr::{FieldRef, MethodRef};
    use crate::module::{Field, Method, TypeDef};

    #[test]
    fn test_instruction_display() {
        assert_eq!(Instruction::load_this().to_string(), "load.this");
        assert_eq!(Instruction::const_i32(3).to_string(), "const.i32 3");
        assert_eq!(
            Instruction::const_str("Total").to_string(),
            "const.str \"Total\""
        );

        let call = Instruction::call(MethodRef {
            declaring: TypeRef::named("Reactive.Observe"),
            name: "AsProperty".to_string(),
            param_count: 1,
            has_this: false,
            returns_value: true,
            type_args: Vec::new(),
            accessor: None,
        });
        assert_eq!(call.to_string(), "call Reactive.Observe::AsProperty(1)");
    }

    #[test]
    fn test_generic_type_display() {
        let helper =
            TypeRef::named("Reactive.PropertyHelper").instantiate(vec![TypeRef::named("Double")]);
        assert_eq!(helper.to_string(), "Reactive.PropertyHelper<Double>");
    }

    #[test]
    fn test_disassemble_listing() {
        let mut module = Module::new("demo".to_string());
        let mut ty = TypeDef::new("App.ViewModel");
        ty.fields.push(Field {
            name: "m_x".to_string(),
            field_type: TypeRef::named("Int32"),
            is_private: true,
        });
        ty.methods.push(Method {
            name: "get_X".to_string(),
            is_static: false,
            param_count: 0,
            returns_value: true,
            accessor: None,
            body: vec![
                Instruction::load_this(),
                Instruction::load_field(FieldRef {
                    declaring: TypeRef::named("App.ViewModel"),
                    name: "m_x".to_string(),
                    field_type: TypeRef::named("Int32"),
                }),
                Instruction::ret(),
            ],
        });
        module.types.push(ty);

        let listing = disassemble(&module);
        assert!(listing.contains("module demo"));
        assert!(listing.contains("type App.ViewModel"));
        assert!(listing.contains("field private m_x : Int32"));
        assert!(listing.contains("0: load.this"));
        assert!(listing.contains("2: ret"));
    }
}
