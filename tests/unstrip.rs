//! Companion assemblies flowing through recovery, translation and the bridge.

mod common;

use common::Game;
use il2cpp_bridge::{
    assembly::ExceptionHandlerFlags,
    config::IL2CPP_CORLIB,
    prelude::*,
    signature::{CorLibType, SigExceptionHandler, SigFieldRef, SigGenericParam, SigOperand, SigParam},
};

fn int() -> SigType {
    SigType::CorLib(CorLibType::Int32)
}

fn void() -> SigType {
    SigType::CorLib(CorLibType::Void)
}

fn player_ref() -> SigType {
    SigType::named("Assembly-CSharp", "Game", "Player")
}

fn body(ops: &[(OpCode, SigOperand)]) -> SigMethodBody {
    let mut body = SigMethodBody::default();
    for (opcode, operand) in ops {
        body.push(*opcode, operand.clone());
    }
    body
}

fn method(name: &str, attributes: MethodAttributes, ret: SigType, params: Vec<SigParam>, ops: &[(OpCode, SigOperand)]) -> SigMethodDef {
    let mut def = SigMethodDef::new(name, attributes, ret, params);
    def.body = Some(body(ops));
    def
}

/// `Game.Player` as the companion describes it.
fn companion() -> SigAssembly {
    let object = SigType::named(IL2CPP_CORLIB, "Il2CppSystem", "Object");
    let mut player = SigTypeDef::new("Game", "Player", TypeAttributes::PUBLIC, Some(object));

    player.methods.push(method(
        "Twice",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        int(),
        vec![SigParam::new("x", int())],
        &[
            (OpCode::Ldarg_0, SigOperand::None),
            (OpCode::Ldc_I4_2, SigOperand::None),
            (OpCode::Mul, SigOperand::None),
            (OpCode::Ret, SigOperand::None),
        ],
    ));

    let hp = SigFieldRef {
        declaring: player_ref(),
        name: "hp".to_string(),
        field_type: int(),
    };
    player.methods.push(method(
        "GetHp",
        MethodAttributes::PUBLIC,
        int(),
        Vec::new(),
        &[
            (OpCode::Ldarg_0, SigOperand::None),
            (OpCode::Ldfld, SigOperand::Field(hp)),
            (OpCode::Ret, SigOperand::None),
        ],
    ));

    player.methods.push(method(
        "Varargs",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        void(),
        Vec::new(),
        &[
            (OpCode::Arglist, SigOperand::None),
            (OpCode::Pop, SigOperand::None),
            (OpCode::Ret, SigOperand::None),
        ],
    ));

    let mut guarded = method(
        "Guarded",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        void(),
        Vec::new(),
        &[
            (OpCode::Nop, SigOperand::None),
            (OpCode::Leave, SigOperand::Label(4)),
            (OpCode::Pop, SigOperand::None),
            (OpCode::Leave, SigOperand::Label(4)),
            (OpCode::Ret, SigOperand::None),
        ],
    );
    if let Some(body) = guarded.body.as_mut() {
        body.handlers.push(SigExceptionHandler {
            kind: ExceptionHandlerFlags::EXCEPTION,
            try_start: 0,
            try_end: 2,
            handler_start: 2,
            handler_end: 4,
            filter_start: None,
            exception_type: Some(SigType::named(IL2CPP_CORLIB, "Il2CppSystem", "Exception")),
        });
    }
    player.methods.push(guarded);

    player.methods.push(SigMethodDef::new(
        "Broken",
        MethodAttributes::PUBLIC,
        SigType::named("Nowhere", "Missing", "Type"),
        Vec::new(),
    ));

    let mut asm = SigAssembly::new("Assembly-CSharp");
    asm.types.push(player);
    asm
}

fn generated() -> (Game, TypeId) {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let player = game.class("Player");
    game.ctx.add_field(player, "hp", int32, FieldAttributes::PRIVATE);
    let config = GeneratorConfig::default().with_companions(vec![companion()]);
    game.generate(&config).unwrap();
    (game, player)
}

#[test]
fn recovered_arithmetic_is_translated() {
    let (game, player) = generated();
    let twice = game.ctx.method_by_name(player, "Twice").unwrap();
    assert!(game.ctx.is_unstripped_method(twice));
    assert!(game.ctx.extras.has_translated_body(twice));

    let int32 = game.ctx.il2cpp_corlib_type("Int32").unwrap();
    let mono_int = TypeExpr::Simple(game.ctx.mono_corlib_type("Int32").unwrap());
    let to_mono = game.ctx.implicit_conversion_to(int32, &mono_int).unwrap();
    let from_mono = game.ctx.implicit_conversion_from(int32, &mono_int).unwrap();
    assert_eq!(game.callees(twice), vec![to_mono, from_mono]);
    assert!(game.opcodes(twice).contains(&OpCode::Mul));
}

#[test]
fn members_that_do_not_resolve_are_dropped() {
    let (game, player) = generated();
    assert!(game.ctx.method_by_name(player, "Broken").is_none());
    assert!(game.ctx.events.count_kind(EventKind::BodyRecovered) >= 4);
}

#[test]
fn field_loads_go_through_the_generated_getter() {
    let (game, player) = generated();
    let get_hp = game.ctx.method_by_name(player, "GetHp").unwrap();
    let getter = game.ctx.method_by_name(player, "get_hp").unwrap();
    assert!(game.ctx.extras.has_translated_body(get_hp));
    assert_eq!(game.callees(get_hp)[0], getter);
    assert!(game.opcodes(get_hp).contains(&OpCode::Callvirt));
}

#[test]
fn untranslatable_bodies_fall_back_without_a_bridge() {
    let (game, player) = generated();
    let varargs = game.ctx.method_by_name(player, "Varargs").unwrap();
    assert!(game.ctx.extras.bodies.get(varargs).is_none());
    let fallback: Vec<_> = game.ctx.events.filter_kind(EventKind::TranslationFallback).collect();
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].method, Some(varargs));
    assert_eq!(fallback[0].message, "arglist");
}

#[test]
fn typed_catches_are_redirected_to_the_managed_wrapper() {
    let (game, player) = generated();
    let guarded = game.ctx.method_by_name(player, "Guarded").unwrap();
    let exception = game.ctx.il2cpp_corlib_type("Exception").unwrap();
    let wrapper = *game.ctx.extras.system_exception_type.get(exception).unwrap();

    let body = game.ctx.extras.bodies.get(guarded).unwrap();
    assert_eq!(body.kind, BodyKind::Translated);
    let handler = &body.handlers[0];
    assert_eq!(handler.exception_type, Some(TypeExpr::Simple(wrapper)));
    let start = body.instructions.resolve(handler.handler_start).unwrap();
    assert_eq!(body.instructions.get(start).unwrap().opcode, OpCode::Ldfld);
    assert_eq!(body.instructions.get(start + 1).unwrap().opcode, OpCode::Castclass);
}

#[test]
fn stripped_methods_keep_their_bridge_next_to_recovered_ones() {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let player = game.class("Player");
    game.ctx.add_field(player, "hp", int32.clone(), FieldAttributes::PRIVATE);
    let native = game.method(player, "Heal", MethodAttributes::PUBLIC, int32, Vec::new());
    let config = GeneratorConfig::default().with_companions(vec![companion()]);
    game.generate(&config).unwrap();

    let body = game.ctx.extras.bodies.get(native).unwrap();
    assert_eq!(body.kind, BodyKind::Native);
    assert!(game.ctx.extras.method_info_field.get(native).is_some());
    let twice = game.ctx.method_by_name(player, "Twice").unwrap();
    assert!(game.ctx.extras.method_info_field.get(twice).is_none());
}

#[test]
fn native_generic_methods_with_untranslatable_bodies_are_bridged() {
    let mut game = Game::new();
    let nothing = game.void_type();
    let player = game.class("Player");
    let pick = game.method(
        player,
        "Pick",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        nothing,
        Vec::new(),
    );
    game.ctx.method_mut(pick).generic_params.push(GenericParamDef::new("T"));

    let object = SigType::named(IL2CPP_CORLIB, "Il2CppSystem", "Object");
    let mut sig_player = SigTypeDef::new("Game", "Player", TypeAttributes::PUBLIC, Some(object));
    let mut sig_pick = method(
        "Pick",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        void(),
        Vec::new(),
        &[
            (OpCode::Arglist, SigOperand::None),
            (OpCode::Pop, SigOperand::None),
            (OpCode::Ret, SigOperand::None),
        ],
    );
    sig_pick.generic_params.push(SigGenericParam::new("T"));
    sig_player.methods.push(sig_pick);
    let mut companion = SigAssembly::new("Assembly-CSharp");
    companion.types.push(sig_player);

    let config = GeneratorConfig::default().with_companions(vec![companion]);
    game.generate(&config).unwrap();

    // The recovered body was attached to the native method, not a copy of it.
    assert!(!game.ctx.is_unstripped_method(pick));
    assert!(game.ctx.extras.original_bodies.get(pick).is_some());
    let fallback: Vec<_> = game.ctx.events.filter_kind(EventKind::TranslationFallback).collect();
    assert_eq!(fallback.len(), 1);
    assert_eq!(fallback[0].method, Some(pick));

    let body = game.ctx.extras.bodies.get(pick).unwrap();
    assert_eq!(body.kind, BodyKind::Native);
    let helper = game
        .ctx
        .find_type("Assembly-CSharp", "Il2CppInterop.Generated.Helpers.InvokeHelper")
        .and_then(|helpers| game.ctx.method_by_name(helpers, "InvokeAction"))
        .unwrap();
    assert_eq!(
        game.opcodes(pick),
        vec![OpCode::Ldsfld, OpCode::Ldc_I4_0, OpCode::Conv_I, OpCode::Call, OpCode::Ret]
    );
    assert_eq!(game.callees(pick), vec![helper]);
    assert!(!game.ctx.extras.has_translated_body(pick));
}
