//! The neutral bytecode model every pass produces and the emitter consumes.
//!
//! - [`OpCode`]: the CIL opcode set, with macro expansion to general forms
//! - [`InstructionList`], [`Instruction`], [`Operand`], [`Label`]: symbolic
//!   instruction streams with identity-based branch targets
//! - [`MethodBody`]: instructions plus locals and exception handlers

mod body;
mod instruction;
mod opcodes;

pub use body::{BodyKind, ExceptionHandler, ExceptionHandlerFlags, LocalVariable, MethodBody};
pub use instruction::{Constant, InstrId, Instruction, InstructionList, Label, Operand};
pub use opcodes::{ImpliedOperand, OpCode};
