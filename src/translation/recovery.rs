//! Original-body recovery.
//!
//! Copies a disassembled companion body into the instruction model with
//! every operand resolved in the scope of the method it belongs to. Recovery
//! is all-or-nothing: one operand, local, handler type or branch target that
//! cannot be mapped discards the attempt.

use crate::{
    assembly::{
        BodyKind, Constant, ExceptionHandler, ImpliedOperand, InstrId, InstructionList, Label,
        LocalVariable, MethodBody, Operand,
    },
    model::{AppContext, MethodId},
    resolver::{ContextResolver, ResolvedMethod},
    signature::{SigMethodBody, SigOperand},
};

struct Recovery<'a> {
    resolver: ContextResolver<'a>,
    has_this: bool,
    param_count: usize,
    ids: Vec<InstrId>,
}

impl Recovery<'_> {
    fn label(&self, index: usize) -> Option<Label> {
        match index.cmp(&self.ids.len()) {
            std::cmp::Ordering::Less => Some(Label::Instr(self.ids[index])),
            std::cmp::Ordering::Equal => Some(Label::End),
            std::cmp::Ordering::Greater => None,
        }
    }

    /// Raw argument slots count `this` for instance methods.
    fn argument(&self, slot: u16) -> Option<Operand> {
        let index = if self.has_this {
            if slot == 0 {
                return Some(Operand::This);
            }
            slot - 1
        } else {
            slot
        };
        (usize::from(index) < self.param_count).then_some(Operand::Parameter(index))
    }

    fn operand(&self, operand: &SigOperand) -> Option<Operand> {
        Some(match operand {
            SigOperand::None => Operand::None,
            SigOperand::Int32(v) => Constant::Int32(*v).into(),
            SigOperand::Int64(v) => Constant::Int64(*v).into(),
            SigOperand::Float32(v) => Constant::Float32(*v).into(),
            SigOperand::Float64(v) => Constant::Float64(*v).into(),
            SigOperand::String(s) => Constant::String(s.clone()).into(),
            SigOperand::Local(l) => Operand::Local(u32::from(*l)),
            SigOperand::Argument(a) => self.argument(*a)?,
            SigOperand::Type(t) => self.resolver.resolve_type(t)?.into(),
            SigOperand::Field(f) => self.resolver.resolve_field(f)?.into(),
            SigOperand::Method(m) => match self.resolver.resolve_method(m)? {
                ResolvedMethod::Method(r) => r.into(),
                ResolvedMethod::Array(a) => a.into(),
            },
            SigOperand::MethodSpec(spec) => self.resolver.resolve_method_spec(spec)?.into(),
            SigOperand::Label(target) => self.label(*target)?.into(),
            SigOperand::Labels(targets) => Operand::Labels(
                targets
                    .iter()
                    .map(|t| self.label(*t))
                    .collect::<Option<Vec<_>>>()?,
            ),
            // Standalone signatures (calli) have no counterpart in the model.
            SigOperand::Signature => return None,
        })
    }
}

/// Recovers `body` as the original body of `method`.
///
/// Macro opcodes are expanded to their general form, so `ldarg.1` becomes
/// `ldarg` with an explicit operand. Returns `None` if anything fails to
/// resolve.
#[must_use]
pub fn recover(ctx: &AppContext, method: MethodId, body: &SigMethodBody) -> Option<MethodBody> {
    let def = ctx.method(method);
    let mut instructions = InstructionList::new();
    let ids = body.instructions.iter().map(|_| instructions.reserve()).collect();
    let recovery = Recovery {
        resolver: ContextResolver::for_method(ctx, method),
        has_this: def.has_this(),
        param_count: def.params.len(),
        ids,
    };

    for (index, raw) in body.instructions.iter().enumerate() {
        let (opcode, implied) = raw.opcode.expand();
        let operand = match implied {
            Some(ImpliedOperand::Argument(slot)) => recovery.argument(slot)?,
            Some(ImpliedOperand::Local(slot)) => Operand::Local(u32::from(slot)),
            Some(ImpliedOperand::Int32(v)) => Constant::Int32(v).into(),
            None => recovery.operand(&raw.operand)?,
        };
        instructions.push_reserved(recovery.ids[index], opcode, operand);
    }

    let locals = body
        .locals
        .iter()
        .map(|l| recovery.resolver.resolve_type(l).map(|ty| LocalVariable { ty }))
        .collect::<Option<Vec<_>>>()?;

    let mut handlers = Vec::with_capacity(body.handlers.len());
    for h in &body.handlers {
        let exception_type = match &h.exception_type {
            Some(t) => Some(recovery.resolver.resolve_type(t)?),
            None => None,
        };
        let filter_start = match h.filter_start {
            Some(f) => Some(recovery.label(f)?),
            None => None,
        };
        handlers.push(ExceptionHandler {
            kind: h.kind,
            try_start: recovery.label(h.try_start)?,
            try_end: recovery.label(h.try_end)?,
            handler_start: recovery.label(h.handler_start)?,
            handler_end: recovery.label(h.handler_end)?,
            filter_start,
            exception_type,
        });
    }

    Some(MethodBody {
        kind: BodyKind::Original,
        instructions,
        locals,
        handlers,
    })
}
