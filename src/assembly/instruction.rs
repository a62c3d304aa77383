//! Architecture-neutral instruction and operand model.
//!
//! Bodies are built symbolically: branch targets are [`Label`]s naming an
//! instruction by identity, never by offset. Identity comes from an
//! [`InstrId`] handed out by the owning [`InstructionList`], so two
//! syntactically identical instructions are still distinct targets. Byte
//! offsets and short-form selection are left to the emitter.

use std::fmt;

use crate::{
    assembly::OpCode,
    model::{ArrayMethod, FieldRef, MethodRef},
    typesystem::TypeExpr,
};

/// Identity of an instruction inside one [`InstructionList`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstrId(u32);

impl fmt::Display for InstrId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "IL_{:04}", self.0)
    }
}

/// A branch or handler-boundary target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Label {
    /// A concrete instruction.
    Instr(InstrId),
    /// The fictitious position right after the last instruction.
    End,
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Label::Instr(id) => write!(f, "{id}"),
            Label::End => f.write_str("IL_END"),
        }
    }
}

/// A primitive constant operand.
#[derive(Debug, Clone, PartialEq)]
pub enum Constant {
    /// `ldc.i4`
    Int32(i32),
    /// `ldc.i8`
    Int64(i64),
    /// `ldc.r4`
    Float32(f32),
    /// `ldc.r8`
    Float64(f64),
    /// A boolean literal (field defaults only).
    Boolean(bool),
    /// A UTF-16 code unit (field defaults only).
    Char(u16),
    /// `ldstr`
    String(String),
}

/// The polymorphic operand of an [`Instruction`].
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Operand {
    /// No operand.
    #[default]
    None,
    /// A primitive or string constant.
    Constant(Constant),
    /// Index into the body's local variables.
    Local(u32),
    /// Index into the method's declared parameters, excluding `this`.
    Parameter(u16),
    /// The implicit `this` parameter.
    This,
    /// A type.
    Type(TypeExpr),
    /// A method, possibly instantiated.
    Method(MethodRef),
    /// A field, possibly on an instantiated declaring type.
    Field(FieldRef),
    /// A multi-dimensional array pseudo-method.
    ArrayMethod(ArrayMethod),
    /// A single branch target.
    Label(Label),
    /// A switch table.
    Labels(Vec<Label>),
}

impl From<Constant> for Operand {
    fn from(value: Constant) -> Self {
        Operand::Constant(value)
    }
}

impl From<TypeExpr> for Operand {
    fn from(value: TypeExpr) -> Self {
        Operand::Type(value)
    }
}

impl From<MethodRef> for Operand {
    fn from(value: MethodRef) -> Self {
        Operand::Method(value)
    }
}

impl From<FieldRef> for Operand {
    fn from(value: FieldRef) -> Self {
        Operand::Field(value)
    }
}

impl From<Label> for Operand {
    fn from(value: Label) -> Self {
        Operand::Label(value)
    }
}

impl From<ArrayMethod> for Operand {
    fn from(value: ArrayMethod) -> Self {
        Operand::ArrayMethod(value)
    }
}

/// One instruction of a body under construction.
#[derive(Debug, Clone, PartialEq)]
pub struct Instruction {
    id: InstrId,
    /// The opcode.
    pub opcode: OpCode,
    /// The operand.
    pub operand: Operand,
}

impl Instruction {
    /// The identity of this instruction.
    #[must_use]
    pub fn id(&self) -> InstrId {
        self.id
    }

    /// A label targeting this instruction.
    #[must_use]
    pub fn label(&self) -> Label {
        Label::Instr(self.id)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.id, self.opcode)?;
        match &self.operand {
            Operand::None => Ok(()),
            Operand::Constant(Constant::String(s)) => write!(f, " {s:?}"),
            Operand::Constant(c) => write!(f, " {c:?}"),
            Operand::Local(i) => write!(f, " V_{i}"),
            Operand::Parameter(i) => write!(f, " A_{i}"),
            Operand::This => f.write_str(" this"),
            Operand::Type(t) => write!(f, " {t}"),
            Operand::Method(m) => write!(f, " {m}"),
            Operand::Field(fr) => write!(f, " {fr}"),
            Operand::ArrayMethod(a) => write!(f, " {a}"),
            Operand::Label(l) => write!(f, " {l}"),
            Operand::Labels(ls) => {
                f.write_str(" (")?;
                for (i, l) in ls.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{l}")?;
                }
                f.write_str(")")
            }
        }
    }
}

/// An ordered, growable instruction sequence that owns its label namespace.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct InstructionList {
    items: Vec<Instruction>,
    next_id: u32,
}

impl InstructionList {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reserves an identity for an instruction that will be pushed later.
    ///
    /// Used for forward branches: the label exists before its target.
    pub fn reserve(&mut self) -> InstrId {
        let id = InstrId(self.next_id);
        self.next_id += 1;
        id
    }

    /// Appends an instruction and returns its label.
    pub fn push(&mut self, opcode: OpCode, operand: impl Into<Operand>) -> Label {
        let id = self.reserve();
        self.push_reserved(id, opcode, operand)
    }

    /// Appends an instruction with no operand.
    pub fn emit(&mut self, opcode: OpCode) -> Label {
        self.push(opcode, Operand::None)
    }

    /// Appends an instruction under an identity obtained from [`Self::reserve`].
    pub fn push_reserved(&mut self, id: InstrId, opcode: OpCode, operand: impl Into<Operand>) -> Label {
        self.items.push(Instruction {
            id,
            opcode,
            operand: operand.into(),
        });
        Label::Instr(id)
    }

    /// Inserts an instruction before position `index`.
    pub fn insert(&mut self, index: usize, opcode: OpCode, operand: impl Into<Operand>) -> Label {
        let id = self.reserve();
        self.items.insert(
            index,
            Instruction {
                id,
                opcode,
                operand: operand.into(),
            },
        );
        Label::Instr(id)
    }

    /// Appends every instruction of `other`, renumbering identities.
    ///
    /// Only valid for label-free sequences.
    pub fn extend_from(&mut self, other: &InstructionList) {
        for instr in other.iter() {
            self.push(instr.opcode, instr.operand.clone());
        }
    }

    /// Position of the instruction with identity `id`.
    #[must_use]
    pub fn position(&self, id: InstrId) -> Option<usize> {
        self.items.iter().position(|i| i.id == id)
    }

    /// Position a label points at; [`Label::End`] maps to `len()`.
    #[must_use]
    pub fn resolve(&self, label: Label) -> Option<usize> {
        match label {
            Label::Instr(id) => self.position(id),
            Label::End => Some(self.items.len()),
        }
    }

    /// The instruction at `index`.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&Instruction> {
        self.items.get(index)
    }

    /// The instruction at `index`, mutably.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut Instruction> {
        self.items.get_mut(index)
    }

    /// Label of the instruction at `index`, or [`Label::End`] past the end.
    #[must_use]
    pub fn label_at(&self, index: usize) -> Label {
        self.items.get(index).map_or(Label::End, Instruction::label)
    }

    /// The last instruction.
    #[must_use]
    pub fn last(&self) -> Option<&Instruction> {
        self.items.last()
    }

    /// Number of instructions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.items.len()
    }

    /// Returns `true` if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Iterates over the instructions in order.
    pub fn iter(&self) -> std::slice::Iter<'_, Instruction> {
        self.items.iter()
    }

    /// Opcodes in order; handy for assertions.
    #[must_use]
    pub fn opcodes(&self) -> Vec<OpCode> {
        self.items.iter().map(|i| i.opcode).collect()
    }
}

impl<'a> IntoIterator for &'a InstructionList {
    type Item = &'a Instruction;
    type IntoIter = std::slice::Iter<'a, Instruction>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identical_instructions_are_distinct_targets() {
        let mut list = InstructionList::new();
        let a = list.emit(OpCode::Nop);
        let b = list.emit(OpCode::Nop);
        assert_ne!(a, b);
        assert_eq!(list.resolve(a), Some(0));
        assert_eq!(list.resolve(b), Some(1));
        assert_eq!(list.resolve(Label::End), Some(2));
    }

    #[test]
    fn insertion_keeps_labels_stable() {
        let mut list = InstructionList::new();
        let first = list.emit(OpCode::Ldarg_0);
        let ret = list.emit(OpCode::Ret);
        let inserted = list.insert(1, OpCode::Nop, Operand::None);
        assert_eq!(list.resolve(first), Some(0));
        assert_eq!(list.resolve(inserted), Some(1));
        assert_eq!(list.resolve(ret), Some(2));
    }

    #[test]
    fn reserved_forward_target() {
        let mut list = InstructionList::new();
        let target = list.reserve();
        list.push(OpCode::Brtrue, Label::Instr(target));
        list.emit(OpCode::Ldnull);
        list.push_reserved(target, OpCode::Nop, Operand::None);
        assert_eq!(list.position(target), Some(2));
        assert_eq!(list.get(0).map(|i| &i.operand), Some(&Operand::Label(Label::Instr(target))));
    }

    #[test]
    fn label_at_past_end() {
        let mut list = InstructionList::new();
        list.emit(OpCode::Ret);
        assert_eq!(list.label_at(1), Label::End);
        assert_eq!(list.opcodes(), vec![OpCode::Ret]);
    }
}
