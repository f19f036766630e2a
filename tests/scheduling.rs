use stratum_ecs::access::{Access, AccessSet};
use stratum_ecs::bucket;

fn writes(world: &str, types: &[u32]) -> AccessSet {
    AccessSet::new().write(Access::types(world, types.iter().copied()))
}

fn reads(world: &str, types: &[u32]) -> AccessSet {
    AccessSet::new().read(Access::types(world, types.iter().copied()))
}

#[test]
fn independent_writers_share_a_bucket_a_reader_and_a_conflicting_writer_dont() {
    let systems = vec![
        writes("default", &[1]), // S1: write Position
        writes("default", &[2]), // S2: write Velocity
        reads("default", &[1]),  // S3: read Position
        writes("default", &[1]), // S4: write Position
    ];
    let buckets = bucket::plan(&systems);

    assert_eq!(buckets.len(), 3);
    assert_eq!(buckets[0].systems(), &[0, 1]);
    assert_eq!(buckets[1].systems(), &[2]);
    assert_eq!(buckets[2].systems(), &[3]);
}

#[test]
fn whole_world_access_conflicts_with_everything_in_that_world() {
    let systems = vec![
        AccessSet::new().write(Access::whole_world("log")),
        reads("log", &[1]),
    ];
    let buckets = bucket::plan(&systems);

    assert_eq!(buckets.len(), 2);
    assert_eq!(buckets[0].systems(), &[0]);
    assert_eq!(buckets[1].systems(), &[1]);
}

#[test]
fn systems_touching_different_worlds_never_conflict() {
    let systems = vec![writes("physics", &[1]), writes("render", &[1])];
    let buckets = bucket::plan(&systems);

    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].systems(), &[0, 1]);
}
