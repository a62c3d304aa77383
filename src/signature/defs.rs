//! Definitions and raw bodies of companion assemblies.

use crate::{
    assembly::{Constant, ExceptionHandlerFlags, OpCode},
    model::{
        FieldAttributes, GenericParameterAttributes, MethodAttributes, MethodImplAttributes,
        PropertyAttributes, TypeAttributes,
    },
    signature::{SigFieldRef, SigMethodRef, SigMethodSpec, SigType},
};

/// A companion assembly carrying the members and bodies the native image stripped.
#[derive(Debug, Clone, Default)]
pub struct SigAssembly {
    /// Simple name; matches the rewritten assembly of the same name.
    pub name: String,
    /// Top-level types, each owning its nested types.
    pub types: Vec<SigTypeDef>,
}

impl SigAssembly {
    /// Creates an empty assembly.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            types: Vec::new(),
        }
    }

    /// Returns `true` if the assembly declares nothing but `<Module>`.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.types
            .iter()
            .all(|t| t.namespace.is_empty() && t.name == "<Module>")
    }
}

/// A generic parameter declaration.
#[derive(Debug, Clone)]
pub struct SigGenericParam {
    /// Declared name.
    pub name: String,
    /// Variance and special constraints.
    pub attributes: GenericParameterAttributes,
    /// Type constraints, resolved in the owner's context.
    pub constraints: Vec<SigType>,
}

impl SigGenericParam {
    /// An unconstrained parameter.
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            attributes: GenericParameterAttributes::empty(),
            constraints: Vec::new(),
        }
    }
}

/// A type definition.
#[derive(Debug, Clone)]
pub struct SigTypeDef {
    /// Namespace; empty for nested types.
    pub namespace: String,
    /// Simple name.
    pub name: String,
    /// Flags.
    pub attributes: TypeAttributes,
    /// Base type.
    pub base: Option<SigType>,
    /// Implemented interfaces.
    pub interfaces: Vec<SigType>,
    /// Generic parameters.
    pub generic_params: Vec<SigGenericParam>,
    /// Fields.
    pub fields: Vec<SigFieldDef>,
    /// Methods.
    pub methods: Vec<SigMethodDef>,
    /// Properties; accessors index into `methods`.
    pub properties: Vec<SigPropertyDef>,
    /// Nested types.
    pub nested: Vec<SigTypeDef>,
}

impl SigTypeDef {
    /// An empty type.
    #[must_use]
    pub fn new(namespace: &str, name: &str, attributes: TypeAttributes, base: Option<SigType>) -> Self {
        Self {
            namespace: namespace.to_string(),
            name: name.to_string(),
            attributes,
            base,
            interfaces: Vec::new(),
            generic_params: Vec::new(),
            fields: Vec::new(),
            methods: Vec::new(),
            properties: Vec::new(),
            nested: Vec::new(),
        }
    }
}

/// A field definition.
#[derive(Debug, Clone)]
pub struct SigFieldDef {
    /// Name.
    pub name: String,
    /// Flags.
    pub attributes: FieldAttributes,
    /// Field type.
    pub field_type: SigType,
    /// Default value of literal fields.
    pub constant: Option<Constant>,
}

/// A method parameter.
#[derive(Debug, Clone)]
pub struct SigParam {
    /// Declared name.
    pub name: String,
    /// Declared type.
    pub ty: SigType,
}

impl SigParam {
    /// Creates a parameter.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: SigType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// A method definition.
#[derive(Debug, Clone)]
pub struct SigMethodDef {
    /// Name.
    pub name: String,
    /// Flags.
    pub attributes: MethodAttributes,
    /// Implementation flags.
    pub impl_attributes: MethodImplAttributes,
    /// Return type.
    pub return_type: SigType,
    /// Parameters, excluding `this`.
    pub params: Vec<SigParam>,
    /// Generic parameters.
    pub generic_params: Vec<SigGenericParam>,
    /// Explicitly implemented methods.
    pub overrides: Vec<SigMethodRef>,
    /// The IL body, when the companion kept one.
    pub body: Option<SigMethodBody>,
}

impl SigMethodDef {
    /// A bodiless method.
    #[must_use]
    pub fn new(name: &str, attributes: MethodAttributes, return_type: SigType, params: Vec<SigParam>) -> Self {
        Self {
            name: name.to_string(),
            attributes,
            impl_attributes: MethodImplAttributes::empty(),
            return_type,
            params,
            generic_params: Vec::new(),
            overrides: Vec::new(),
            body: None,
        }
    }

    /// Returns `true` for instance methods.
    #[must_use]
    pub fn has_this(&self) -> bool {
        !self.attributes.is_static()
    }

    /// The call-site reference to this definition on `declaring`.
    #[must_use]
    pub fn as_reference(&self, declaring: SigType) -> SigMethodRef {
        #[allow(clippy::cast_possible_truncation)]
        SigMethodRef {
            declaring,
            name: self.name.clone(),
            has_this: self.has_this(),
            generic_arity: self.generic_params.len() as u32,
            return_type: self.return_type.clone(),
            params: self.params.iter().map(|p| p.ty.clone()).collect(),
            sentinel: Vec::new(),
        }
    }
}

/// A property definition.
#[derive(Debug, Clone)]
pub struct SigPropertyDef {
    /// Name.
    pub name: String,
    /// Flags.
    pub attributes: PropertyAttributes,
    /// Property type.
    pub property_type: SigType,
    /// Index of the getter in the declaring type's methods.
    pub getter: Option<usize>,
    /// Index of the setter in the declaring type's methods.
    pub setter: Option<usize>,
}

/// The raw operand of a disassembled instruction.
#[derive(Debug, Clone, PartialEq)]
pub enum SigOperand {
    /// No operand.
    None,
    /// `ldc.i4` family.
    Int32(i32),
    /// `ldc.i8`
    Int64(i64),
    /// `ldc.r4`
    Float32(f32),
    /// `ldc.r8`
    Float64(f64),
    /// `ldstr`
    String(String),
    /// A local slot.
    Local(u16),
    /// A raw argument slot; slot 0 is `this` for instance methods.
    Argument(u16),
    /// A type token.
    Type(SigType),
    /// A field token.
    Field(SigFieldRef),
    /// A method token.
    Method(SigMethodRef),
    /// A method instantiation token.
    MethodSpec(SigMethodSpec),
    /// A branch target as an instruction index.
    Label(usize),
    /// A switch table of instruction indices.
    Labels(Vec<usize>),
    /// A standalone signature (`calli`).
    Signature,
}

/// One raw instruction.
#[derive(Debug, Clone, PartialEq)]
pub struct SigInstruction {
    /// Opcode as encoded, macros included.
    pub opcode: OpCode,
    /// Raw operand.
    pub operand: SigOperand,
}

impl SigInstruction {
    /// Creates an instruction.
    #[must_use]
    pub fn new(opcode: OpCode, operand: SigOperand) -> Self {
        Self { opcode, operand }
    }
}

/// An exception clause; boundaries are instruction indices, `len` meaning the end.
#[derive(Debug, Clone, PartialEq)]
pub struct SigExceptionHandler {
    /// Clause kind.
    pub kind: ExceptionHandlerFlags,
    /// First protected instruction.
    pub try_start: usize,
    /// First instruction after the protected range.
    pub try_end: usize,
    /// First handler instruction.
    pub handler_start: usize,
    /// First instruction after the handler.
    pub handler_end: usize,
    /// First filter instruction.
    pub filter_start: Option<usize>,
    /// Caught type.
    pub exception_type: Option<SigType>,
}

/// A fully disassembled body.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SigMethodBody {
    /// Instructions in order.
    pub instructions: Vec<SigInstruction>,
    /// Local variable types.
    pub locals: Vec<SigType>,
    /// Exception clauses.
    pub handlers: Vec<SigExceptionHandler>,
}

impl SigMethodBody {
    /// Appends an instruction.
    pub fn push(&mut self, opcode: OpCode, operand: SigOperand) {
        self.instructions.push(SigInstruction::new(opcode, operand));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::CorLibType;

    #[test]
    fn module_only_assembly_is_empty() {
        let mut asm = SigAssembly::new("Assembly-CSharp");
        assert!(asm.is_empty());
        asm.types
            .push(SigTypeDef::new("", "<Module>", TypeAttributes::NOT_PUBLIC, None));
        assert!(asm.is_empty());
        asm.types
            .push(SigTypeDef::new("Game", "Player", TypeAttributes::PUBLIC, None));
        assert!(!asm.is_empty());
    }

    #[test]
    fn reference_carries_shape() {
        let mut def = SigMethodDef::new(
            "Get",
            MethodAttributes::PUBLIC,
            SigType::CorLib(CorLibType::Int32),
            vec![SigParam::new("x", SigType::CorLib(CorLibType::Int32))],
        );
        def.generic_params.push(SigGenericParam::new("T"));
        let r = def.as_reference(SigType::named("Assembly-CSharp", "Game", "Player"));
        assert!(r.has_this);
        assert!(r.returns_value());
        assert_eq!(r.generic_arity, 1);
        assert_eq!(r.params.len(), 1);
    }
}
