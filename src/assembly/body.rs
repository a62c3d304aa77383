//! Method body records.

use bitflags::bitflags;

use crate::{
    assembly::{InstructionList, Label},
    typesystem::TypeExpr,
};

bitflags! {
    /// Kind of an exception-handling clause (ECMA-335 II.25.4.6).
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ExceptionHandlerFlags: u16 {
        /// A typed catch clause.
        const EXCEPTION = 0x0000;
        /// A filter clause.
        const FILTER = 0x0001;
        /// A finally clause.
        const FINALLY = 0x0002;
        /// A fault clause.
        const FAULT = 0x0004;
    }
}

/// Where a body came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BodyKind {
    /// Recovered from a companion assembly, operands resolved.
    Original,
    /// Rewritten from an original body by the translation compiler.
    Translated,
    /// Synthesized from scratch.
    Native,
}

/// A local variable slot.
#[derive(Debug, Clone, PartialEq)]
pub struct LocalVariable {
    /// Declared type.
    pub ty: TypeExpr,
}

/// One exception-handling clause; all ranges are half-open label pairs.
#[derive(Debug, Clone, PartialEq)]
pub struct ExceptionHandler {
    /// Clause kind.
    pub kind: ExceptionHandlerFlags,
    /// First instruction of the protected range.
    pub try_start: Label,
    /// First instruction after the protected range.
    pub try_end: Label,
    /// First instruction of the handler.
    pub handler_start: Label,
    /// First instruction after the handler.
    pub handler_end: Label,
    /// First instruction of the filter block, for filter clauses.
    pub filter_start: Option<Label>,
    /// Caught type, for typed catch clauses.
    pub exception_type: Option<TypeExpr>,
}

/// A complete method body.
#[derive(Debug, Clone, PartialEq)]
pub struct MethodBody {
    /// Provenance of the body.
    pub kind: BodyKind,
    /// The instruction stream.
    pub instructions: InstructionList,
    /// Local variable slots.
    pub locals: Vec<LocalVariable>,
    /// Exception-handling clauses.
    pub handlers: Vec<ExceptionHandler>,
}

impl MethodBody {
    /// Creates an empty body of the given kind.
    #[must_use]
    pub fn new(kind: BodyKind) -> Self {
        Self {
            kind,
            instructions: InstructionList::new(),
            locals: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Wraps a synthesized instruction stream.
    #[must_use]
    pub fn native(instructions: InstructionList) -> Self {
        Self {
            kind: BodyKind::Native,
            instructions,
            locals: Vec::new(),
            handlers: Vec::new(),
        }
    }

    /// Adds a local and returns its index.
    pub fn add_local(&mut self, ty: TypeExpr) -> u32 {
        #[allow(clippy::cast_possible_truncation)]
        let index = self.locals.len() as u32;
        self.locals.push(LocalVariable { ty });
        index
    }
}
