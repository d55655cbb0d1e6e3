//! Stack-balance verification
//!
//! Abstract interpretation of method bodies using pop/push arities. A
//! module that fails verification is unloadable by consumers; the weaver
//! runs this after a pass to prove the rewrite preserved balance.

use crate::instr::Operand;
use crate::module::{Method, Module, TypeDef};
use crate::opcode::Opcode;

/// Verification errors
#[derive(Debug, thiserror::Error)]
pub enum VerifyError {
    /// Stack underflow
    #[error("Stack underflow in {method} at instruction {index}")]
    StackUnderflow {
        /// Fully qualified method name
        method: String,
        /// Instruction index
        index: usize,
    },

    /// Unbalanced stack at the end of a method body
    #[error("Unbalanced stack in {method}: depth {depth} after the final instruction")]
    UnbalancedStack {
        /// Fully qualified method name
        method: String,
        /// Residual stack depth
        depth: usize,
    },

    /// Method body does not end with a terminator
    #[error("Method {method} does not end with a return")]
    MissingTerminator {
        /// Fully qualified method name
        method: String,
    },

    /// Terminator kind does not match the method's return arity
    #[error("Method {method} ends with the wrong return kind")]
    WrongTerminator {
        /// Fully qualified method name
        method: String,
    },

    /// An instruction's operand does not match its opcode
    #[error("Malformed operand in {method} at instruction {index}")]
    MalformedOperand {
        /// Fully qualified method name
        method: String,
        /// Instruction index
        index: usize,
    },
}

/// Verify every method body in a module
pub fn verify_module(module: &Module) -> Result<(), VerifyError> {
    for ty in &module.types {
        for method in &ty.methods {
            verify_method(ty, method)?;
        }
    }
    Ok(())
}

/// Verify a single method body
pub fn verify_method(ty: &TypeDef, method: &Method) -> Result<(), VerifyError> {
    // Empty bodies (external or abstract methods) are allowed
    if method.body.is_empty() {
        return Ok(());
    }

    let name = || method.full_name(ty);
    let mut depth = 0usize;

    for (index, instruction) in method.body.iter().enumerate() {
        if !operand_matches(instruction.opcode, &instruction.operand) {
            return Err(VerifyError::MalformedOperand {
                method: name(),
                index,
            });
        }

        let pops = instruction.pops();
        if depth < pops {
            return Err(VerifyError::StackUnderflow {
                method: name(),
                index,
            });
        }
        depth -= pops;
        depth += instruction.pushes();
    }

    if depth != 0 {
        return Err(VerifyError::UnbalancedStack {
            method: name(),
            depth,
        });
    }

    let last = &method.body[method.body.len() - 1];
    if !last.opcode.is_terminator() {
        return Err(VerifyError::MissingTerminator { method: name() });
    }
    let expected = if method.returns_value {
        Opcode::Return
    } else {
        Opcode::ReturnVoid
    };
    if last.opcode != expected {
        return Err(VerifyError::WrongTerminator { method: name() });
    }

    Ok(())
}

/// Check that an operand has the shape its opcode requires
fn operand_matches(opcode: Opcode, operand: &Operand) -> bool {
    match opcode {
        Opcode::ConstI32 => matches!(operand, Operand::I32(_)),
        Opcode::ConstF64 => matches!(operand, Operand::F64(_)),
        Opcode::ConstStr => matches!(operand, Operand::Str(_)),
        Opcode::LoadArg | Opcode::LoadLocal | Opcode::StoreLocal => {
            matches!(operand, Operand::Slot(_))
        }
        Opcode::LoadField | Opcode::StoreField | Opcode::LoadStaticField => {
            matches!(operand, Operand::Field(_))
        }
        Opcode::Call | Opcode::CallVirt | Opcode::NewObject => {
            matches!(operand, Operand::Method(_))
        }
        Opcode::Nop
        | Opcode::Pop
        | Opcode::Dup
        | Opcode::ConstNull
        | Opcode::LoadThis
        | Opcode::Return
        | Opcode::ReturnVoid => matches!(operand, Operand::None),
    }
}
