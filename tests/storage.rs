use stratum_ecs::prelude::*;

#[derive(Default, Clone, Debug, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Default, Clone, Debug, PartialEq)]
struct Velocity(f32, f32);

#[test]
fn components_survive_a_transfer_and_entity_destruction() {
    let mut world = World::new("game");
    world.allow_pool::<Position>();
    world.allow_pool::<Velocity>();

    let a = world.new_entity();
    let b = world.new_entity();
    world.add_component::<Position>(a).x = 3.0;
    world.add_component::<Velocity>(b);

    world.transfer_component::<Position>(a, b);

    assert!(!world.has_component::<Position>(a));
    assert!(world.has_component::<Position>(b));
    assert_eq!(world.get_component_readonly::<Position>(b).x, 3.0);
    assert!(!world.is_alive(a), "a had no remaining components");
}

#[test]
fn entity_ids_are_recycled_with_a_fresh_generation() {
    let mut world = World::new("game");
    world.allow_pool::<Position>();

    let e1 = world.new_entity();
    world.add_component::<Position>(e1);
    world.del_entity(e1);

    let e2 = world.new_entity();
    assert_eq!(e1.id(), e2.id());
    assert_ne!(e1.generation(), e2.generation());
    assert!(!world.is_alive(e1));
    assert!(world.is_alive(e2));
}

#[test]
fn clone_component_does_not_affect_the_source() {
    let mut world = World::new("game");
    world.allow_pool::<Position>();

    let src = world.new_entity();
    let dst = world.new_entity();
    world.add_component::<Position>(src).x = 5.0;
    world.clone_component::<Position>(src, dst);
    world.get_component::<Position>(dst).x = 9.0;

    assert_eq!(world.get_component_readonly::<Position>(src).x, 5.0);
    assert_eq!(world.get_component_readonly::<Position>(dst).x, 9.0);
}

#[test]
fn packed_entity_round_trips_across_world_mutation() {
    let mut world = World::new("game");
    let e = world.new_entity();
    let packed = world.pack_entity(e);

    assert_eq!(world.unpack_entity(packed), Some(e));

    let other = world.new_entity();
    world.del_entity(other);
    assert_eq!(world.unpack_entity(packed), Some(e));

    world.del_entity(e);
    assert_eq!(world.unpack_entity(packed), None);
}
