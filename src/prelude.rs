//! # il2cpp-bridge Prelude
//!
//! This module provides a convenient prelude for the most commonly used types and traits
//! from the il2cpp-bridge library. Import this module to drive a generator run or to
//! write a pass of your own.

// ================================================================================================
// Core Types and Error Handling
// ================================================================================================

/// The main error type for all il2cpp-bridge operations
pub use crate::Error;

/// The result type used throughout il2cpp-bridge
pub use crate::Result;

/// Configuration of a generator run
pub use crate::config::GeneratorConfig;

// ================================================================================================
// Pipeline
// ================================================================================================

/// Pass trait, scheduler, and the run's event log
pub use crate::compiler::{DerivedStats, Event, EventKind, EventLog, GeneratorPass, PassScheduler};

/// Every standard pass
pub use crate::passes::{
    ConstantInitializationPass, EnumPass, ExceptionHierarchyPass, FieldAccessorPass,
    InitializationClassPass, MarshallingPass, MethodBodyTranslationPass, NativeMethodBodyPass,
    ObjectInterfacePass, PointerConstructorPass, PrimitiveImplicitConversionPass,
    ReferenceAssemblyInjectionPass, StaticConstructorPass, TypeInfoPass, UnstripPass,
};

// ================================================================================================
// Application Model
// ================================================================================================

/// The arena and its handles
pub use crate::model::{AppContext, AssemblyId, FieldId, MethodId, PropertyId, TypeId};

/// Definition records
pub use crate::model::{FieldDef, GenericParamDef, MethodDef, ParamDef, PropertyDef, TypeDef};

/// Operand-level references
pub use crate::model::{FieldRef, MethodRef};

/// Attribute flags
pub use crate::model::{FieldAttributes, MethodAttributes, MethodImplAttributes, TypeAttributes};

/// Metadata token type for native method handles
pub use crate::metadata::token::Token;

// ================================================================================================
// Type System
// ================================================================================================

/// Type expressions and substitution
pub use crate::typesystem::{TypeExpr, TypeReplacer};

// ================================================================================================
// Instruction Model
// ================================================================================================

/// Bodies and instruction lists
pub use crate::assembly::{
    BodyKind, Constant, Instruction, InstructionList, Label, MethodBody, OpCode, Operand,
};

// ================================================================================================
// Companion Input and Compilers
// ================================================================================================

/// Companion assembly signatures handed to the unstrip pass
pub use crate::signature::{SigAssembly, SigMethodBody, SigMethodDef, SigType, SigTypeDef};

/// Cross-universe resolution
pub use crate::resolver::ContextResolver;

/// Body recovery and translation
pub use crate::translation::{recover, translate, Translation};

/// Runtime-support surface
pub use crate::runtime::RuntimeSurface;
