//! Entity Table: fixed-identity slot array with generation counters and
//! recycling.

/// An entity handle: a dense integer id plus the generation it was created
/// with. Two entities with the same `id` but different `generation` never
/// compare equal and never alias the same component data.
#[derive(Clone, Copy, Debug, Hash, Eq, PartialEq, Ord, PartialOrd)]
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
pub struct Entity {
    id: u32,
    generation: i16,
}

impl Entity {
    #[inline]
    pub(crate) fn new(id: u32, generation: i16) -> Self {
        Entity { id, generation }
    }

    /// The dense integer id of this entity, stable across its lifetime.
    #[inline]
    pub fn id(&self) -> u32 {
        self.id
    }

    /// The generation this handle was created with. Positive while alive,
    /// negative once dead.
    #[inline]
    pub fn generation(&self) -> i16 {
        self.generation
    }
}

/// Per-id bookkeeping: generation (sign encodes liveness) and the number of
/// components currently attached.
#[derive(Clone, Copy, Debug)]
struct Slot {
    generation: i16,
    components_count: u16,
}

/// Fixed-identity slot array with generation counters and id recycling.
///
/// Mutations are single-threaded only; there is no internal
/// synchronization.
#[derive(Debug)]
pub struct EntityTable {
    slots: Vec<Slot>,
    recycled: Vec<u32>,
}

impl Default for EntityTable {
    fn default() -> Self {
        Self::new()
    }
}

impl EntityTable {
    /// Creates an empty entity table.
    pub fn new() -> Self {
        EntityTable {
            slots: Vec::new(),
            recycled: Vec::new(),
        }
    }

    /// Creates an entity table pre-sized to `capacity` slots.
    pub fn with_capacity(capacity: usize) -> Self {
        EntityTable {
            slots: Vec::with_capacity(capacity),
            recycled: Vec::with_capacity(capacity / 8),
        }
    }

    /// Total number of slots ever allocated (alive + dead, not counting
    /// recycled reuse).
    pub fn capacity_len(&self) -> usize {
        self.slots.len()
    }

    /// Allocates a new entity: pops from the recycled stack if non-empty,
    /// otherwise appends a fresh slot.
    pub fn new_entity(&mut self) -> Entity {
        if let Some(id) = self.recycled.pop() {
            let slot = &mut self.slots[id as usize];
            debug_assert!(slot.generation <= 0, "recycled slot should be dead");
            slot.generation = slot.generation.checked_neg().unwrap_or(i16::MAX);
            if slot.generation == 0 {
                slot.generation = 1;
            }
            slot.components_count = 0;
            log::debug!("recycled entity id={id} generation={}", slot.generation);
            Entity::new(id, slot.generation)
        } else {
            let id = self.slots.len() as u32;
            self.slots.push(Slot {
                generation: 1,
                components_count: 0,
            });
            log::debug!("allocated new entity id={id} generation=1");
            Entity::new(id, 1)
        }
    }

    /// True iff `0 <= e.id() < len` and the slot's generation matches and is
    /// alive.
    #[inline]
    pub fn is_alive(&self, e: Entity) -> bool {
        match self.slots.get(e.id() as usize) {
            Some(slot) => slot.generation > 0 && slot.generation == e.generation(),
            None => false,
        }
    }

    /// Number of components currently attached to `e`. Zero for a dead or
    /// out-of-range entity.
    #[inline]
    pub fn components_count(&self, e: Entity) -> u16 {
        match self.slots.get(e.id() as usize) {
            Some(slot) if slot.generation == e.generation() => slot.components_count,
            _ => 0,
        }
    }

    pub(crate) fn inc_components(&mut self, id: u32) {
        self.slots[id as usize].components_count += 1;
    }

    pub(crate) fn dec_components(&mut self, id: u32) -> u16 {
        let slot = &mut self.slots[id as usize];
        debug_assert!(slot.components_count > 0);
        slot.components_count -= 1;
        slot.components_count
    }

    /// Marks the slot dead, bumping its generation magnitude with wraparound
    /// (`i16::MAX` wraps to `-1`) and pushing the id onto the recycled
    /// stack. No-op if the entity is already dead or out of range.
    pub(crate) fn kill(&mut self, id: u32) {
        if let Some(slot) = self.slots.get_mut(id as usize) {
            if slot.generation <= 0 {
                return;
            }
            let next = if slot.generation == i16::MAX {
                -1
            } else {
                -(slot.generation + 1)
            };
            slot.generation = next;
            slot.components_count = 0;
            self.recycled.push(id);
            log::debug!("killed entity id={id} next_generation={next}");
        }
    }

    /// Iterates every currently alive entity, in id order.
    pub fn iter_alive(&self) -> impl Iterator<Item = Entity> + '_ {
        self.slots.iter().enumerate().filter_map(|(id, slot)| {
            if slot.generation > 0 {
                Some(Entity::new(id as u32, slot.generation))
            } else {
                None
            }
        })
    }

    /// Reserves backing storage for at least `capacity` total slots without
    /// allocating any entities, so the next `capacity` calls to
    /// `new_entity` (beyond what's already allocated) don't reallocate
    /// `slots`. Does not change `capacity_len` or which id the next
    /// `new_entity` call returns.
    pub(crate) fn reserve_ids(&mut self, capacity: usize) {
        self.slots.reserve(capacity.saturating_sub(self.slots.len()));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_starts_at_generation_one() {
        let mut table = EntityTable::new();
        let e = table.new_entity();
        assert_eq!(e.id(), 0);
        assert_eq!(e.generation(), 1);
        assert!(table.is_alive(e));
    }

    #[test]
    fn kill_then_recreate_yields_different_generation() {
        let mut table = EntityTable::new();
        let e0 = table.new_entity();
        table.kill(e0.id());
        assert!(!table.is_alive(e0));

        let e1 = table.new_entity();
        assert_eq!(e1.id(), e0.id());
        assert_ne!(e1.generation(), e0.generation());
        assert!(table.is_alive(e1));
        assert!(!table.is_alive(e0));
    }

    #[test]
    fn generation_wraps_from_short_max_to_one() {
        let mut table = EntityTable::new();
        let mut e = table.new_entity();
        // Drive the generation up to i16::MAX by repeatedly killing and
        // recreating the same slot.
        while e.generation() < i16::MAX {
            table.kill(e.id());
            e = table.new_entity();
        }
        assert_eq!(e.generation(), i16::MAX);
        table.kill(e.id());
        let wrapped = table.new_entity();
        assert_eq!(wrapped.id(), e.id());
        assert_eq!(wrapped.generation(), 1);
    }

    #[test]
    fn dead_out_of_range_is_not_alive() {
        let table = EntityTable::new();
        assert!(!table.is_alive(Entity::new(0, 1)));
    }

    #[test]
    fn components_count_tracks_inc_dec() {
        let mut table = EntityTable::new();
        let e = table.new_entity();
        table.inc_components(e.id());
        table.inc_components(e.id());
        assert_eq!(table.components_count(e), 2);
        table.dec_components(e.id());
        assert_eq!(table.components_count(e), 1);
    }
}
