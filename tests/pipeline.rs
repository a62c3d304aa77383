//! End-to-end runs of the standard pipeline.

mod common;

use common::Game;
use il2cpp_bridge::{prelude::*, translation::conversion::PRIMITIVE_NAMES};

fn populate(game: &mut Game) -> (TypeId, TypeId) {
    let int32 = game.primitive("Int32");
    let string = game.primitive("String");
    let void = game.void_type();

    let player = game.class("Player");
    game.ctx.add_field(player, "hp", int32.clone(), FieldAttributes::PRIVATE);
    game.ctx.add_field(
        player,
        "Count",
        int32.clone(),
        FieldAttributes::PUBLIC | FieldAttributes::STATIC,
    );
    game.method(player, "GetHp", MethodAttributes::PUBLIC, int32.clone(), Vec::new());
    game.method(player, "Rename", MethodAttributes::PUBLIC, void.clone(), vec![string.clone()]);
    game.method(
        player,
        "Spawn",
        MethodAttributes::PUBLIC | MethodAttributes::STATIC,
        TypeExpr::Simple(player),
        vec![int32.clone(), int32.clone().by_ref()],
    );
    let abstract_attrs = MethodAttributes::PUBLIC | MethodAttributes::ABSTRACT | MethodAttributes::VIRTUAL;
    game.method(player, "Tick", abstract_attrs, void.clone(), Vec::new());

    let position = game.structure("Position");
    game.ctx.add_field(position, "x", int32.clone(), FieldAttributes::PUBLIC);
    game.method(position, "Length", MethodAttributes::PUBLIC, int32, Vec::new());
    (player, position)
}

#[test]
fn default_run_gives_every_stripped_method_a_body() {
    let mut game = Game::new();
    let (player, position) = populate(&mut game);
    game.generate(&GeneratorConfig::default()).unwrap();

    for ty in [player, position] {
        for &method in &game.ctx.ty(ty).methods {
            let def = game.ctx.method(method);
            if def.attributes.contains(MethodAttributes::ABSTRACT) {
                assert!(game.ctx.extras.bodies.get(method).is_none(), "{} got a body", def.name);
                continue;
            }
            assert!(game.ctx.extras.bodies.get(method).is_some(), "{} has no body", def.name);
        }
        let cctor = game.ctx.method_by_name(ty, ".cctor").expect("static constructor");
        assert_eq!(game.opcodes(cctor), vec![OpCode::Ldtoken, OpCode::Call, OpCode::Ret]);
        assert!(game.ctx.extras.initialization_type.get(ty).is_some());
    }

    // Reference type fields became properties, struct fields did not.
    assert!(game.ctx.field_by_name(player, "hp").is_none());
    assert!(game.ctx.method_by_name(player, "get_hp").is_some());
    assert!(game.ctx.method_by_name(player, "set_Count").is_some());
    assert!(game.ctx.field_by_name(position, "x").is_some());

    assert!(game
        .ctx
        .find_type("Il2CppInterop.Generated.Initializer", "Il2CppInterop.Initialization.Il2CppInitialization")
        .is_some());
    assert_eq!(game.ctx.events.count_kind(EventKind::PassCompleted), 15);
    assert_eq!(game.ctx.events.errors().count(), 0);
}

#[test]
fn constant_fields_are_stored_by_the_static_constructor() {
    let mut game = Game::new();
    let (player, _) = populate(&mut game);
    let max_hp = game.ctx.add_field(
        player,
        "MaxHp",
        game.primitive("Int32"),
        FieldAttributes::PUBLIC | FieldAttributes::STATIC | FieldAttributes::LITERAL,
    );
    game.ctx.field_mut(max_hp).constant = Some(Constant::Int32(100));
    game.generate(&GeneratorConfig::default()).unwrap();

    // Constants stay fields.
    assert!(game.ctx.field_by_name(player, "MaxHp").is_some());
    let cctor = game.ctx.method_by_name(player, ".cctor").unwrap();
    assert_eq!(
        game.opcodes(cctor),
        vec![
            OpCode::Ldtoken,
            OpCode::Call,
            OpCode::Ldc_I4,
            OpCode::Call,
            OpCode::Stsfld,
            OpCode::Ret
        ]
    );
    let body = &game.ctx.extras.bodies.get(cctor).unwrap().instructions;
    assert!(body
        .iter()
        .any(|i| i.opcode == OpCode::Stsfld && i.operand == Operand::Field(FieldRef::from(max_hp))));
}

#[test]
fn primitives_convert_to_and_from_their_managed_twins() {
    let mut game = Game::new();
    game.generate(&GeneratorConfig::minimal()).unwrap();

    for name in PRIMITIVE_NAMES {
        let native = game.ctx.il2cpp_corlib_type(name).unwrap();
        let managed = TypeExpr::Simple(game.ctx.mono_corlib_type(name).unwrap());
        assert!(game.ctx.implicit_conversion_from(native, &managed).is_some(), "{name}");
        assert!(game.ctx.implicit_conversion_to(native, &managed).is_some(), "{name}");
    }
}

#[test]
fn minimal_run_skips_translation_and_the_global_initializer() {
    let mut game = Game::new();
    populate(&mut game);
    let scheduler = PassScheduler::from_config(&GeneratorConfig::minimal()).unwrap();
    assert!(!scheduler.pass_names().contains(&"MethodBodyTranslation"));
    scheduler.run(&mut game.ctx).unwrap();

    assert!(game.ctx.assembly_by_name("Il2CppInterop.Generated.Initializer").is_none());
    assert!(!game.ctx.events.has(EventKind::BodyTranslated));
    // No companion assemblies were supplied.
    assert_eq!(game.ctx.events.warnings().count(), 1);
}

#[test]
fn tokenless_overloads_that_cannot_be_told_apart_abort_the_run() {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let void = game.void_type();
    let enemy = game.class("Enemy");
    game.method(enemy, "Hit", MethodAttributes::PUBLIC, void.clone(), vec![int32.clone()]);
    game.method(enemy, "Hit", MethodAttributes::PUBLIC, void, vec![int32]);

    let outcome = game.generate(&GeneratorConfig::default());
    let Err(Error::AmbiguousMethod(name)) = outcome else {
        panic!("expected an ambiguity, got {outcome:?}");
    };
    assert!(name.contains("Game.Enemy::Hit"));
}

#[test]
fn tokens_disambiguate_overloads() {
    let mut game = Game::new();
    let int32 = game.primitive("Int32");
    let void = game.void_type();
    let enemy = game.class("Enemy");
    let first = game.method(enemy, "Hit", MethodAttributes::PUBLIC, void.clone(), vec![int32.clone()]);
    let second = game.method(enemy, "Hit", MethodAttributes::PUBLIC, void, vec![int32]);
    game.ctx.method_mut(first).token = Token::new(0x0600_0001);
    game.ctx.method_mut(second).token = Token::new(0x0600_0002);

    game.generate(&GeneratorConfig::default()).unwrap();
    let stats = DerivedStats::from_log(&game.ctx.events);
    assert_eq!(stats.tokenless_lookups, 0);
    assert!(game.ctx.extras.bodies.get(first).is_some());
    assert!(game.ctx.extras.bodies.get(second).is_some());
}

#[test]
fn duplicate_companions_are_rejected_before_any_pass_runs() {
    let companions = vec![SigAssembly::new("Assembly-CSharp"), SigAssembly::new("Assembly-CSharp")];
    let config = GeneratorConfig::default().with_companions(companions);
    assert!(matches!(PassScheduler::from_config(&config), Err(Error::Config(_))));
}
