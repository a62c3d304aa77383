//! Shared world builder for the integration tests.
//!
//! Builds the smallest application a generator run accepts: the native
//! corlib with its primitives, the reference corlib, and an empty game
//! assembly to populate per test.

#![allow(dead_code)]

use il2cpp_bridge::{
    config::{IL2CPP_CORLIB, MONO_CORLIB},
    prelude::*,
    translation::conversion::PRIMITIVE_NAMES,
};

pub struct Game {
    pub ctx: AppContext,
    pub game: AssemblyId,
    pub object: TypeId,
    pub value_type: TypeId,
    pub void: TypeId,
}

impl Game {
    pub fn new() -> Self {
        let mut ctx = AppContext::new();
        let corlib = ctx.add_assembly(IL2CPP_CORLIB, false).unwrap();
        let public = TypeAttributes::PUBLIC;
        let object = ctx.add_type(corlib, "Il2CppSystem", "Object", public, None);
        let value_type = ctx.add_type(
            corlib,
            "Il2CppSystem",
            "ValueType",
            public | TypeAttributes::ABSTRACT,
            Some(object.into()),
        );
        ctx.add_type(
            corlib,
            "Il2CppSystem",
            "Enum",
            public | TypeAttributes::ABSTRACT,
            Some(value_type.into()),
        );
        let void = ctx.add_type(corlib, "Il2CppSystem", "Void", public, Some(value_type.into()));
        for name in PRIMITIVE_NAMES {
            let ty = ctx.add_type(
                corlib,
                "Il2CppSystem",
                name,
                public | TypeAttributes::SEALED,
                Some(value_type.into()),
            );
            ctx.add_field(ty, "m_value", ty.into(), FieldAttributes::ASSEMBLY);
        }
        let int32 = ctx.il2cpp_corlib_type("Int32").unwrap();
        let char = ctx.il2cpp_corlib_type("Char").unwrap();
        let string = ctx.add_type(
            corlib,
            "Il2CppSystem",
            "String",
            public | TypeAttributes::SEALED,
            Some(object.into()),
        );
        ctx.add_field(string, "_stringLength", int32.into(), FieldAttributes::PRIVATE);
        ctx.add_field(string, "_firstChar", char.into(), FieldAttributes::PRIVATE);
        ctx.add_type(corlib, "Il2CppSystem", "Exception", public, Some(object.into()));
        ctx.add_type(
            corlib,
            "Il2CppSystem",
            "Type",
            public | TypeAttributes::ABSTRACT,
            Some(object.into()),
        );
        ctx.add_assembly(MONO_CORLIB, true).unwrap();
        let game = ctx.add_assembly("Assembly-CSharp", false).unwrap();
        Self {
            ctx,
            game,
            object,
            value_type,
            void,
        }
    }

    pub fn primitive(&self, name: &str) -> TypeExpr {
        TypeExpr::Simple(self.ctx.il2cpp_corlib_type(name).unwrap())
    }

    pub fn void_type(&self) -> TypeExpr {
        TypeExpr::Simple(self.void)
    }

    pub fn class(&mut self, name: &str) -> TypeId {
        self.ctx.add_type(
            self.game,
            "Game",
            name,
            TypeAttributes::PUBLIC,
            Some(self.object.into()),
        )
    }

    pub fn structure(&mut self, name: &str) -> TypeId {
        self.ctx.add_type(
            self.game,
            "Game",
            name,
            TypeAttributes::PUBLIC | TypeAttributes::SEALED | TypeAttributes::SEQUENTIAL_LAYOUT,
            Some(self.value_type.into()),
        )
    }

    pub fn method(
        &mut self,
        ty: TypeId,
        name: &str,
        attributes: MethodAttributes,
        ret: TypeExpr,
        params: Vec<TypeExpr>,
    ) -> MethodId {
        let params = params
            .into_iter()
            .enumerate()
            .map(|(i, t)| ParamDef::new(format!("arg{i}"), t))
            .collect();
        self.ctx.add_method(ty, name, attributes, ret, params)
    }

    /// Runs the standard pipeline for `config`.
    pub fn generate(&mut self, config: &GeneratorConfig) -> Result<()> {
        PassScheduler::from_config(config)?.run(&mut self.ctx)
    }

    /// Opcodes of the emitted body of `method`.
    pub fn opcodes(&self, method: MethodId) -> Vec<OpCode> {
        self.ctx
            .extras
            .bodies
            .get(method)
            .map(|b| b.instructions.opcodes())
            .unwrap_or_default()
    }

    /// Methods called by the emitted body of `method`, in order.
    pub fn callees(&self, method: MethodId) -> Vec<MethodId> {
        self.ctx
            .extras
            .bodies
            .get(method)
            .map(|b| {
                b.instructions
                    .iter()
                    .filter_map(|i| match &i.operand {
                        Operand::Method(m) => Some(m.method),
                        _ => None,
                    })
                    .collect()
            })
            .unwrap_or_default()
    }
}
