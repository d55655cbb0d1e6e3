//! Operand dependency resolution
//!
//! Method bodies are flat instruction sequences with no explicit tree
//! structure. To rewrite an assignment the weaver must recover the subtree
//! of instructions whose combined effect produces the operands of a target
//! instruction. This module reconstructs that subtree by simulating the
//! evaluation stack from the start of the body: every operand-producing
//! instruction lexically precedes its consumer within a basic block, and a
//! consumer's inputs cannot be known without the full preceding stack
//! shape, so the scan runs forward and stops at the target.
//!
//! The result tree holds body indices, never instructions, so the body can
//! be freely mutated once the tree has been consumed.

use reweave_bytecode::Instruction;
use thiserror::Error;

/// A node of the recovered dependency tree
///
/// `children` are the producers of the node's popped values, ordered as
/// the stack machine expects them to be pushed (first popped = first
/// needed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstructionBlock {
    /// Index of the wrapped instruction within the method body
    pub index: usize,
    /// Producers of this instruction's popped values, in push order
    pub children: Vec<InstructionBlock>,
}

impl InstructionBlock {
    fn leaf(index: usize) -> Self {
        Self {
            index,
            children: Vec::new(),
        }
    }

    /// All body indices covered by this tree (self and descendants),
    /// ascending and deduplicated (`dup` can share one producer between
    /// two consumed slots)
    pub fn indices(&self) -> Vec<usize> {
        let mut out = Vec::new();
        self.collect_indices(&mut out);
        out.sort_unstable();
        out.dedup();
        out
    }

    fn collect_indices(&self, out: &mut Vec<usize>) {
        out.push(self.index);
        for child in &self.children {
            child.collect_indices(out);
        }
    }

    /// Number of direct children (equals the target's pop arity)
    pub fn child_count(&self) -> usize {
        self.children.len()
    }
}

/// Resolution failures
///
/// These indicate a structurally unexpected method body and must be
/// surfaced as diagnostics, never ignored.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ResolveError {
    /// The target index does not lie within the body
    #[error("target instruction {0} is out of bounds")]
    TargetOutOfBounds(usize),

    /// The simulated evaluation stack underflowed
    #[error("evaluation stack underflow at instruction {0}")]
    StackUnderflow(usize),

    /// The scan ended without visiting the target
    #[error("target instruction {0} was never reached")]
    TargetNotReached(usize),
}

/// Recover the dependency tree of the instruction at `target`
///
/// Single pass, O(n) in body length; nesting depth shows up only in the
/// depth of the returned tree. A target with pop arity zero yields a
/// trivial single-node tree without simulating anything.
pub fn resolve(body: &[Instruction], target: usize) -> Result<InstructionBlock, ResolveError> {
    if target >= body.len() {
        return Err(ResolveError::TargetOutOfBounds(target));
    }
    if body[target].pops() == 0 {
        return Ok(InstructionBlock::leaf(target));
    }

    let mut stack: Vec<InstructionBlock> = Vec::new();
    for (index, instruction) in body.iter().enumerate().take(target + 1) {
        let mut node = InstructionBlock::leaf(index);

        let pops = instruction.pops();
        if pops > 0 {
            if stack.len() < pops {
                return Err(ResolveError::StackUnderflow(index));
            }
            // Draining the top `pops` entries preserves push order, which
            // is exactly the argument order the target consumes.
            node.children = stack.drain(stack.len() - pops..).collect();
        }

        if index == target {
            return Ok(node);
        }
        // One slot per push; dup occupies two slots with one producer,
        // keeping the simulated depth in step with the verifier's.
        let pushes = instruction.pushes();
        if pushes > 0 {
            for _ in 1..pushes {
                stack.push(node.clone());
            }
            stack.push(node);
        }
    }

    // take(target + 1) visits the target unless an earlier error fired
    Err(ResolveError::TargetNotReached(target))
}
