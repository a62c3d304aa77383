//! A small native corlib plus one game assembly, shared by the pass tests.

use crate::{
    compiler::GeneratorPass,
    config::{IL2CPP_CORLIB, MONO_CORLIB},
    model::{
        AppContext, AssemblyId, FieldAttributes, MethodAttributes, MethodId, ParamDef,
        TypeAttributes, TypeId,
    },
    passes::ReferenceAssemblyInjectionPass,
    translation::conversion::PRIMITIVE_NAMES,
    typesystem::TypeExpr,
};

pub(crate) struct World {
    pub ctx: AppContext,
    pub corlib: AssemblyId,
    pub game: AssemblyId,
    pub object: TypeId,
    pub value_type: TypeId,
    pub enum_type: TypeId,
    pub void: TypeId,
    pub string: TypeId,
    pub exception: TypeId,
}

impl World {
    pub fn new() -> Self {
        let mut ctx = AppContext::new();
        let corlib = ctx.add_assembly(IL2CPP_CORLIB, false).unwrap();
        let public = TypeAttributes::PUBLIC;
        let object = ctx.add_type(corlib, "Il2CppSystem", "Object", public, None);
        let value_type = ctx.add_type(corlib, "Il2CppSystem", "ValueType", public | TypeAttributes::ABSTRACT, Some(object.into()));
        let enum_type = ctx.add_type(corlib, "Il2CppSystem", "Enum", public | TypeAttributes::ABSTRACT, Some(value_type.into()));
        let void = ctx.add_type(corlib, "Il2CppSystem", "Void", public, Some(value_type.into()));
        for name in PRIMITIVE_NAMES {
            let ty = ctx.add_type(corlib, "Il2CppSystem", name, public | TypeAttributes::SEALED, Some(value_type.into()));
            ctx.add_field(ty, "m_value", ty.into(), FieldAttributes::ASSEMBLY);
        }
        let int32 = ctx.il2cpp_corlib_type("Int32").unwrap();
        let char = ctx.il2cpp_corlib_type("Char").unwrap();
        let string = ctx.add_type(corlib, "Il2CppSystem", "String", public | TypeAttributes::SEALED, Some(object.into()));
        ctx.add_field(string, "_stringLength", int32.into(), FieldAttributes::PRIVATE);
        ctx.add_field(string, "_firstChar", char.into(), FieldAttributes::PRIVATE);
        ctx.add_field(string, "Empty", string.into(), FieldAttributes::PUBLIC | FieldAttributes::STATIC | FieldAttributes::INIT_ONLY);
        let exception = ctx.add_type(corlib, "Il2CppSystem", "Exception", public, Some(object.into()));
        ctx.add_type(corlib, "Il2CppSystem", "Type", public | TypeAttributes::ABSTRACT, Some(object.into()));
        ctx.add_assembly(MONO_CORLIB, true).unwrap();
        let game = ctx.add_assembly("Assembly-CSharp", false).unwrap();
        Self {
            ctx,
            corlib,
            game,
            object,
            value_type,
            enum_type,
            void,
            string,
            exception,
        }
    }

    /// The world after the runtime surface was injected.
    pub fn with_runtime() -> Self {
        let mut world = Self::new();
        world.run(&ReferenceAssemblyInjectionPass);
        world
    }

    pub fn run(&mut self, pass: &dyn GeneratorPass) {
        pass.process(&mut self.ctx).unwrap();
    }

    pub fn primitive(&self, name: &str) -> TypeId {
        self.ctx.il2cpp_corlib_type(name).unwrap()
    }

    pub fn void_type(&self) -> TypeExpr {
        TypeExpr::Simple(self.void)
    }

    /// A public class in `Game`.
    pub fn class(&mut self, name: &str, base: Option<TypeId>) -> TypeId {
        let base = base.unwrap_or(self.object);
        self.ctx.add_type(self.game, "Game", name, TypeAttributes::PUBLIC, Some(base.into()))
    }

    /// A public struct in `Game`.
    pub fn structure(&mut self, name: &str) -> TypeId {
        self.ctx.add_type(
            self.game,
            "Game",
            name,
            TypeAttributes::PUBLIC | TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT,
            Some(self.value_type.into()),
        )
    }

    pub fn method(&mut self, ty: TypeId, name: &str, attributes: MethodAttributes, ret: TypeExpr, params: Vec<TypeExpr>) -> MethodId {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, t)| ParamDef::new(format!("arg{i}"), t))
            .collect();
        self.ctx.add_method(ty, name, attributes, ret, params)
    }
}
