//! ABI bridge bodies produced by a complete generator run.

mod common;

use common::Game;
use il2cpp_bridge::prelude::*;

fn helper_type(game: &Game) -> TypeId {
    game.ctx
        .find_type("Assembly-CSharp", "Il2CppInterop.Generated.Helpers.InvokeHelper")
        .expect("invoke helpers were synthesized")
}

#[test]
fn methods_with_the_same_shape_share_a_helper() {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let player = game.class("Player");
    let get_value = game.method(player, "GetValue", MethodAttributes::PUBLIC, int32.clone(), vec![int32.clone()]);
    let get_other = game.method(player, "GetOther", MethodAttributes::PUBLIC, int32.clone(), vec![int32.clone()]);
    game.generate(&GeneratorConfig::default()).unwrap();

    let helpers = game.ctx.ty(helper_type(&game)).methods.clone();
    assert_eq!(helpers.len(), 1);
    assert_eq!(game.ctx.method(helpers[0]).name, "InvokeFunction");

    let expected = MethodRef::generic(helpers[0], vec![int32.clone(), int32]);
    for method in [get_value, get_other] {
        let body = game.ctx.extras.bodies.get(method).unwrap();
        assert_eq!(body.kind, BodyKind::Native);
        let call = body
            .instructions
            .iter()
            .find(|i| i.opcode == OpCode::Call)
            .map(|i| i.operand.clone());
        assert_eq!(call, Some(Operand::Method(expected.clone())));
    }

    let stats = DerivedStats::from_log(&game.ctx.events);
    assert_eq!(stats.bridge_bodies, 2);
    assert_eq!(stats.helpers_created, 1);
}

#[test]
fn struct_receivers_are_copied_out_and_back() {
    let mut game = Game::new();
    let single = game.primitive("Single");
    let vector = game.structure("Vector2");
    game.ctx.add_field(vector, "x", single.clone(), FieldAttributes::PUBLIC);
    game.ctx.add_field(vector, "y", single.clone(), FieldAttributes::PUBLIC);
    let void = game.void_type();
    let set = game.method(vector, "Set", MethodAttributes::PUBLIC, void, vec![single.clone(), single.clone()]);
    game.generate(&GeneratorConfig::default()).unwrap();

    let rt = game.ctx.runtime().unwrap().clone();
    let this = TypeExpr::Simple(vector);
    let callees = game.callees(set);
    let helper = game.ctx.method_by_name(helper_type(&game), "InvokeAction").unwrap();
    assert_eq!(
        callees,
        vec![rt.type_helper.size_of, rt.type_helper.write_to_pointer, helper, rt.type_helper.read_from_pointer]
    );
    let opcodes = game.opcodes(set);
    assert_eq!(opcodes.first(), Some(&OpCode::Call));
    assert_eq!(&opcodes[opcodes.len() - 2..], &[OpCode::Stobj, OpCode::Ret]);

    let body = game.ctx.extras.bodies.get(set).unwrap();
    assert_eq!(body.locals[0].ty, rt.mono.byte_pointer());
    let stobj = body.instructions.iter().find(|i| i.opcode == OpCode::Stobj).unwrap();
    assert_eq!(stobj.operand, Operand::Type(this));

    // The struct keeps its fields; only reference types trade them for properties.
    assert!(game.ctx.field_by_name(vector, "x").is_some());
}

#[test]
fn constructors_wrap_a_fresh_native_object() {
    let mut game = Game::new();
    let player = game.class("Player");
    let void = game.void_type();
    let ctor = game.method(
        player,
        ".ctor",
        MethodAttributes::PUBLIC | MethodAttributes::SPECIAL_NAME | MethodAttributes::RT_SPECIAL_NAME,
        void,
        Vec::new(),
    );
    game.generate(&GeneratorConfig::default()).unwrap();

    let rt = game.ctx.runtime().unwrap().clone();
    let pointer_ctor = *game.ctx.extras.pointer_constructor.get(player).unwrap();
    let callees = game.callees(ctor);
    assert_eq!(&callees[..2], &[rt.il2cpp.new_object_pointer, pointer_ctor]);
    assert_eq!(game.opcodes(ctor).last(), Some(&OpCode::Ret));
}

#[test]
fn stripped_statics_without_a_companion_are_bridged() {
    let mut game = Game::new();
    let string = game.primitive("String");
    let log = game.class("Log");
    let void = game.void_type();
    let write = game.method(
        log,
        "Write",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        void,
        vec![string],
    );
    game.generate(&GeneratorConfig::minimal()).unwrap();

    let opcodes = game.opcodes(write);
    assert_eq!(&opcodes[..3], &[OpCode::Ldsfld, OpCode::Ldc_I4_0, OpCode::Conv_I]);
    assert_eq!(game.ctx.events.count_kind(EventKind::BodyTranslated), 0);
    assert!(game.ctx.method_by_name(log, ".cctor").is_some());
}

#[test]
fn parameterless_void_methods_share_one_invoke_action() {
    let mut game = Game::new();
    let void = game.void_type();
    let player = game.class("Player");
    let jump = game.method(player, "Jump", MethodAttributes::PUBLIC, void.clone(), Vec::new());
    let crouch = game.method(player, "Crouch", MethodAttributes::PUBLIC, void, Vec::new());
    game.generate(&GeneratorConfig::default()).unwrap();

    let helpers = game.ctx.ty(helper_type(&game)).methods.clone();
    assert_eq!(helpers.len(), 1);
    assert_eq!(game.ctx.method(helpers[0]).name, "InvokeAction");
    assert!(game.ctx.method(helpers[0]).generic_params.is_empty());
    for method in [jump, crouch] {
        assert!(game.callees(method).contains(&helpers[0]));
        let call = game
            .ctx
            .extras
            .bodies
            .get(method)
            .unwrap()
            .instructions
            .iter()
            .find(|i| i.operand == Operand::Method(MethodRef::from(helpers[0])))
            .map(|i| i.opcode);
        assert_eq!(call, Some(OpCode::Call));
    }
    assert_eq!(DerivedStats::from_log(&game.ctx.events).helpers_created, 1);
}

#[test]
fn helper_arguments_satisfy_the_marshalling_constraint() {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let player = game.class("Player");
    let position = game.structure("Position");
    game.ctx.add_field(position, "x", int32.clone(), FieldAttributes::PUBLIC);
    game.method(player, "Move", MethodAttributes::PUBLIC, int32.clone(), vec![TypeExpr::Simple(position)]);
    game.generate(&GeneratorConfig::default()).unwrap();

    let rt = game.ctx.runtime().unwrap().clone();
    let constrained = |ty: &TypeExpr| TypeExpr::generic_instance(rt.interop.iil2cpp_type_generic, vec![ty.clone()]);
    let native_int32 = game.ctx.il2cpp_corlib_type("Int32").unwrap();
    for id in [native_int32, player, position] {
        let ty = TypeExpr::Simple(id);
        let interfaces = &game.ctx.ty(id).interfaces;
        assert!(interfaces.contains(&TypeExpr::Simple(rt.interop.iil2cpp_type)));
        assert!(interfaces.contains(&constrained(&ty)), "{}", game.ctx.full_name(id));
    }

    // Every helper type argument names its own IIl2CppType<T> implementation.
    let helper = game.ctx.method_by_name(helper_type(&game), "InvokeFunction").unwrap();
    let param = &game.ctx.method(helper).generic_params[0];
    assert_eq!(
        param.constraints,
        vec![TypeExpr::generic_instance(rt.interop.iil2cpp_type_generic, vec![TypeExpr::method_param(helper, 0)])]
    );
    let position_read = game
        .ctx
        .ty(position)
        .methods
        .iter()
        .copied()
        .find(|m| game.ctx.method(*m).name.ends_with("ReadFromSpan"))
        .unwrap();
    assert_eq!(game.ctx.method(position_read).return_type, TypeExpr::Simple(position));
    assert!(game.ctx.extras.bodies.get(position_read).is_some());
}
