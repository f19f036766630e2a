//! Bucket Planner: partitions a sequence of systems into ordered buckets of
//! pairwise non-conflicting access.

use std::collections::{BTreeSet, HashMap};

use crate::access::AccessSet;
use crate::mask::TypeId;

/// The type set a system or bucket exposes for one (world, attribute) pair:
/// either a concrete, non-empty set of type ids, or the whole-world
/// wildcard.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeSet {
    /// Whole-world access: conflicts with anything non-trivial in the same
    /// world.
    Wildcard,
    /// A concrete, non-empty set of component type ids.
    Types(BTreeSet<TypeId>),
}

impl TypeSet {
    fn empty() -> Self {
        TypeSet::Types(BTreeSet::new())
    }

    fn is_empty(&self) -> bool {
        matches!(self, TypeSet::Types(s) if s.is_empty())
    }

    fn merge(&mut self, other: &TypeSet) {
        match (self.clone(), other) {
            (_, TypeSet::Wildcard) => *self = TypeSet::Wildcard,
            (TypeSet::Wildcard, _) => {}
            (TypeSet::Types(mut a), TypeSet::Types(b)) => {
                a.extend(b.iter().copied());
                *self = TypeSet::Types(a);
            }
        }
    }

    /// `true` iff the two sets share any type id. Wildcard is treated as
    /// the universal set: it overlaps with any non-empty set, including
    /// another wildcard.
    fn overlaps(&self, other: &TypeSet) -> bool {
        match (self, other) {
            (TypeSet::Wildcard, TypeSet::Wildcard) => true,
            (TypeSet::Wildcard, TypeSet::Types(s)) | (TypeSet::Types(s), TypeSet::Wildcard) => {
                !s.is_empty()
            }
            (TypeSet::Types(a), TypeSet::Types(b)) => !a.is_disjoint(b),
        }
    }

    fn shared_count(&self, other: &TypeSet) -> usize {
        match (self, other) {
            (TypeSet::Types(a), TypeSet::Types(b)) => a.intersection(b).count(),
            _ if self.overlaps(other) => 1,
            _ => 0,
        }
    }
}

type WorldMap = HashMap<String, TypeSet>;

fn merge_per_world(accesses: &[crate::access::Access]) -> WorldMap {
    let mut map: WorldMap = HashMap::new();
    for a in accesses {
        let entry = map.entry(a.world().to_string()).or_insert_with(TypeSet::empty);
        if a.is_wildcard() {
            *entry = TypeSet::Wildcard;
        } else {
            entry.merge(&TypeSet::Types(a.declared_types().iter().copied().collect()));
        }
    }
    map
}

/// A system's access set flattened to one (read, write) `TypeSet` per world.
#[derive(Clone, Debug)]
struct SystemAccess {
    reads: WorldMap,
    writes: WorldMap,
}

impl SystemAccess {
    fn from(access_set: &AccessSet) -> Self {
        SystemAccess {
            reads: merge_per_world(access_set.reads()),
            writes: merge_per_world(access_set.writes()),
        }
    }

    fn read(&self, world: &str) -> TypeSet {
        self.reads.get(world).cloned().unwrap_or_else(TypeSet::empty)
    }

    fn write(&self, world: &str) -> TypeSet {
        self.writes.get(world).cloned().unwrap_or_else(TypeSet::empty)
    }

    fn worlds(&self) -> impl Iterator<Item = &str> {
        self.reads
            .keys()
            .chain(self.writes.keys())
            .map(|s| s.as_str())
    }
}

/// A set of systems scheduled to run concurrently in a single phase.
#[derive(Clone, Debug, Default)]
pub struct Bucket {
    systems: Vec<usize>,
    reads: WorldMap,
    writes: WorldMap,
}

impl Bucket {
    /// The indices (into the original submission order) of the systems
    /// placed in this bucket.
    pub fn systems(&self) -> &[usize] {
        &self.systems
    }

    fn read(&self, world: &str) -> Option<&TypeSet> {
        self.reads.get(world)
    }

    fn write(&self, world: &str) -> Option<&TypeSet> {
        self.writes.get(world)
    }

    fn merge_system(&mut self, index: usize, access: &SystemAccess) {
        self.systems.push(index);
        for (world, ty) in &access.reads {
            self.reads
                .entry(world.clone())
                .or_insert_with(TypeSet::empty)
                .merge(ty);
        }
        for (world, ty) in &access.writes {
            self.writes
                .entry(world.clone())
                .or_insert_with(TypeSet::empty)
                .merge(ty);
        }
    }
}

enum Fitness {
    Invalid,
    Allowed { shared_reads: usize },
}

fn fitness_check(candidate: &SystemAccess, bucket: &Bucket) -> Fitness {
    let mut shared_reads = 0usize;
    for world in candidate.worlds() {
        let c_read = candidate.read(world);
        let c_write = candidate.write(world);

        if let Some(b_write) = bucket.write(world) {
            if c_write.overlaps(b_write) || c_read.overlaps(b_write) {
                return Fitness::Invalid;
            }
        }
        if let Some(b_read) = bucket.read(world) {
            if c_write.overlaps(b_read) {
                return Fitness::Invalid;
            }
            if !c_read.is_empty() {
                shared_reads += c_read.shared_count(b_read);
            }
        }
    }
    Fitness::Allowed { shared_reads }
}

/// Assigns each system (by submission order) to a bucket, producing the
/// ordered bucket list. `O(S*K)` in the number of systems `S` and
/// resulting buckets `K`.
pub fn plan(access_sets: &[AccessSet]) -> Vec<Bucket> {
    let mut buckets: Vec<Bucket> = Vec::new();

    for (index, access_set) in access_sets.iter().enumerate() {
        let candidate = SystemAccess::from(access_set);

        let mut last_invalid: Option<usize> = None;
        let mut fitness = Vec::with_capacity(buckets.len());
        for (i, bucket) in buckets.iter().enumerate() {
            match fitness_check(&candidate, bucket) {
                Fitness::Invalid => {
                    fitness.push(None);
                    last_invalid = Some(i);
                }
                Fitness::Allowed { shared_reads } => fitness.push(Some(shared_reads)),
            }
        }
        let lo = last_invalid.map(|i| i + 1).unwrap_or(0);

        let mut best: Option<(usize, usize)> = None;
        for (i, slot) in fitness.iter().enumerate().skip(lo) {
            if let Some(shared_reads) = slot {
                match best {
                    Some((_, best_shared)) if *shared_reads <= best_shared => {}
                    _ => best = Some((i, *shared_reads)),
                }
            }
        }

        let target = match best {
            Some((i, _)) => i,
            None => {
                buckets.push(Bucket::default());
                buckets.len() - 1
            }
        };
        buckets[target].merge_system(index, &candidate);

        log::debug!("system {index} assigned to bucket {target}");
    }

    buckets
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::access::Access;

    fn writes(world: &str, types: &[TypeId]) -> AccessSet {
        AccessSet::new().write(Access::types(world, types.iter().copied()))
    }

    fn reads(world: &str, types: &[TypeId]) -> AccessSet {
        AccessSet::new().read(Access::types(world, types.iter().copied()))
    }

    #[test]
    fn a_conflicting_writer_and_reader_each_land_in_their_own_bucket() {
        let systems = vec![
            writes("default", &[1]), // S1: write X
            writes("default", &[2]), // S2: write Y
            reads("default", &[1]),  // S3: read X
            writes("default", &[1]), // S4: write X
        ];
        let buckets = plan(&systems);
        assert_eq!(buckets.len(), 3);
        assert_eq!(buckets[0].systems(), &[0, 1]);
        assert_eq!(buckets[1].systems(), &[2]);
        assert_eq!(buckets[2].systems(), &[3]);
    }

    #[test]
    fn whole_world_write_conflicts_with_any_read_in_that_world() {
        let systems = vec![
            AccessSet::new().write(Access::whole_world("log")),
            reads("log", &[1]),
        ];
        let buckets = plan(&systems);
        assert_eq!(buckets.len(), 2);
        assert_eq!(buckets[0].systems(), &[0]);
        assert_eq!(buckets[1].systems(), &[1]);
    }

    #[test]
    fn independent_systems_share_a_bucket() {
        let systems = vec![writes("default", &[1]), writes("default", &[2])];
        let buckets = plan(&systems);
        assert_eq!(buckets.len(), 1);
        assert_eq!(buckets[0].systems(), &[0, 1]);
    }

    #[test]
    fn stable_assignment_across_repeated_planning() {
        let systems = vec![
            writes("default", &[1]),
            writes("default", &[2]),
            reads("default", &[1]),
            writes("default", &[1]),
        ];
        let a = plan(&systems);
        let b = plan(&systems);
        assert_eq!(a.len(), b.len());
        for (ba, bb) in a.iter().zip(b.iter()) {
            assert_eq!(ba.systems(), bb.systems());
        }
    }
}
