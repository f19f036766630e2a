//! Mask: an immutable, sorted include/exclude constraint over component
//! type ids.

use crate::error::{self, Error};

const HASH_MULTIPLIER: u64 = 314159;

/// A pool-local type id, dense and assigned in registration order.
pub type TypeId = u32;

/// Sorted, deduplicated, intersection-free include/exclude pair plus a
/// content hash. Built once via [`MaskBuilder`] and then immutable.
#[derive(Clone, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Mask {
    include: Vec<TypeId>,
    exclude: Vec<TypeId>,
    hash: u64,
}

impl Mask {
    /// The sorted list of included type ids.
    pub fn include(&self) -> &[TypeId] {
        &self.include
    }

    /// The sorted list of excluded type ids.
    pub fn exclude(&self) -> &[TypeId] {
        &self.exclude
    }

    /// The content hash computed at build time (fold with multiplier
    /// 314159, include adds, exclude subtracts).
    pub fn hash(&self) -> u64 {
        self.hash
    }

    /// `true` iff every included type is present and no excluded type is
    /// present, per the predicate function `has`.
    pub fn is_compatible(&self, mut has: impl FnMut(TypeId) -> bool) -> bool {
        self.include.iter().all(|&t| has(t)) && self.exclude.iter().all(|&t| !has(t))
    }

    /// As `is_compatible`, but pretends `without` is absent regardless of
    /// what `has` reports for it — used to evaluate "as if this change had
    /// already/not-yet applied" during add/remove transitions.
    pub fn is_compatible_without(
        &self,
        without: TypeId,
        mut has: impl FnMut(TypeId) -> bool,
    ) -> bool {
        let mut has_excluding = |t: TypeId| if t == without { false } else { has(t) };
        self.include.iter().all(|&t| has_excluding(t))
            && self.exclude.iter().all(|&t| !has_excluding(t))
    }
}

/// Builder for [`Mask`]. Start from a world, add include/exclude type ids,
/// then call [`MaskBuilder::end`].
#[derive(Default)]
pub struct MaskBuilder {
    include: Vec<TypeId>,
    exclude: Vec<TypeId>,
}

impl MaskBuilder {
    /// Creates an empty mask builder.
    pub fn new() -> Self {
        MaskBuilder::default()
    }

    /// Adds a type id to the include list.
    pub fn include(mut self, type_id: TypeId) -> Self {
        self.include.push(type_id);
        self
    }

    /// Adds a type id to the exclude list.
    pub fn exclude(mut self, type_id: TypeId) -> Self {
        self.exclude.push(type_id);
        self
    }

    /// Sorts both lists and computes the content hash. Fails with
    /// `InvalidMask` if either list has a duplicate, or the two lists
    /// overlap.
    pub fn end(mut self) -> error::Result<Mask> {
        self.include.sort_unstable();
        self.exclude.sort_unstable();

        if has_adjacent_duplicate(&self.include) || has_adjacent_duplicate(&self.exclude) {
            return Err(Error::InvalidMask {
                reason: "duplicate type id within include or exclude list",
            });
        }
        if lists_overlap(&self.include, &self.exclude) {
            return Err(Error::InvalidMask {
                reason: "type id present in both include and exclude lists",
            });
        }

        let mut hash: u64 = 0;
        for &t in &self.include {
            hash = hash.wrapping_mul(HASH_MULTIPLIER).wrapping_add(t as u64);
        }
        for &t in &self.exclude {
            hash = hash
                .wrapping_mul(HASH_MULTIPLIER)
                .wrapping_sub(t as u64);
        }

        Ok(Mask {
            include: self.include,
            exclude: self.exclude,
            hash,
        })
    }
}

fn has_adjacent_duplicate(sorted: &[TypeId]) -> bool {
    sorted.windows(2).any(|w| w[0] == w[1])
}

/// Both slices are sorted; checks for any common element in linear time.
fn lists_overlap(a: &[TypeId], b: &[TypeId]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(&b[j]) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => return true,
        }
    }
    false
}
