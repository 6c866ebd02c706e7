//! Full virtual-register allocator (§4.5): an LRU mapping from IR
//! register index to physical register, used when a function body keeps
//! IR registers resident across instructions instead of reloading them
//! from the register file on every access (see [`super::RegisterSource`]).

use super::scratch::RegClass;

const UNMAPPED: i32 = -1;
const PINNED: i32 = 0;

/// LRU allocator over a fixed physical register file of `P` registers,
/// mapping up to `P` virtual registers at a time. `tick` increases on
/// every touch; eviction picks the mapped, unpinned slot with the
/// smallest positive `use[p]`.
pub struct Lru<T: RegClass> {
    /// `r_map[v]` = physical slot assigned to virtual register `v`, or
    /// `UNMAPPED`.
    r_map: Vec<i32>,
    /// `phys_map[p]` = virtual register assigned to physical slot `p`, or
    /// `UNMAPPED`.
    phys_map: Vec<i32>,
    /// `use[p]`: `UNMAPPED` if `p` holds nothing, `PINNED` if it must
    /// never be evicted, otherwise the tick it was last touched.
    use_tick: Vec<i32>,
    tick: i32,
    physical: Vec<T>,
}

/// What [`Lru::ensure_loaded`] asks the caller to do to actually move
/// data in and out of physical registers; the allocator itself only
/// tracks the mapping.
pub enum LoadAction<T> {
    /// Already resident; nothing to do.
    Hit,
    /// Nothing was evicted; `phys` is uninitialized from the register
    /// file's point of view and must be loaded.
    LoadOnly { phys: T },
    /// `evicted` (virtual register, physical slot) must be stored back
    /// to the register file before `phys` is loaded with the incoming
    /// virtual register's value.
    EvictThenLoad { evicted_vreg: u8, phys: T },
}

impl<T: RegClass> Lru<T> {
    /// `physical` lists the physical registers available for mapping, in
    /// allocation-preference order (the *last* entry is tried first, so
    /// passing them low-to-high index prefers high-numbered registers,
    /// matching the scratch pool's highest-bit-first convention).
    pub fn new(physical: Vec<T>) -> Lru<T> {
        let p = physical.len();
        Lru {
            r_map: vec![UNMAPPED; 16],
            phys_map: vec![UNMAPPED; p],
            use_tick: vec![UNMAPPED; p],
            tick: 1,
            physical,
        }
    }

    /// Pins virtual register `v` to physical slot `p` immediately,
    /// un-assignable by eviction. Used for the x86 convention pins: r0
    /// &harr; rax, r1 &harr; rcx.
    pub fn pin(&mut self, v: u8, slot: usize) {
        self.r_map[v as usize] = slot as i32;
        self.phys_map[slot] = v as i32;
        self.use_tick[slot] = PINNED;
    }

    pub fn physical_reg(&self, slot: usize) -> T {
        self.physical[slot]
    }

    pub fn slot_of(&self, v: u8) -> Option<usize> {
        let slot = self.r_map[v as usize];
        if slot == UNMAPPED {
            None
        } else {
            Some(slot as usize)
        }
    }

    fn touch(&mut self, slot: usize) {
        self.tick += 1;
        if self.use_tick[slot] != PINNED {
            self.use_tick[slot] = self.tick;
        }
    }

    fn victim_slot(&self) -> usize {
        if let Some(free) = (0..self.physical.len()).rev().find(|&p| self.phys_map[p] == UNMAPPED) {
            return free;
        }
        (0..self.physical.len())
            .filter(|&p| self.use_tick[p] != PINNED)
            .min_by_key(|&p| self.use_tick[p])
            .unwrap_or_else(|| crate::crash!("no unpinned physical register left to evict"))
    }

    /// Ensures `v` is mapped to a physical slot without necessarily
    /// loading a value into it (for pure destinations that will be
    /// overwritten immediately).
    pub fn ensure_mapped(&mut self, v: u8) -> (T, Option<u8>) {
        if let Some(slot) = self.slot_of(v) {
            self.touch(slot);
            return (self.physical[slot], None);
        }
        let slot = self.victim_slot();
        let evicted = self.phys_map[slot];
        if evicted != UNMAPPED {
            self.r_map[evicted as usize] = UNMAPPED;
        }
        self.phys_map[slot] = v as i32;
        self.r_map[v as usize] = slot as i32;
        self.touch(slot);
        let evicted_vreg = if evicted == UNMAPPED { None } else { Some(evicted as u8) };
        (self.physical[slot], evicted_vreg)
    }

    /// Ensures `v` is mapped and its value is resident, reporting what
    /// the caller must do to make that true.
    pub fn ensure_loaded(&mut self, v: u8) -> LoadAction<T> {
        if let Some(slot) = self.slot_of(v) {
            self.touch(slot);
            return LoadAction::Hit;
        }
        let slot = self.victim_slot();
        let evicted = self.phys_map[slot];
        self.phys_map[slot] = v as i32;
        self.r_map[v as usize] = slot as i32;
        self.touch(slot);
        if evicted == UNMAPPED {
            LoadAction::LoadOnly { phys: self.physical[slot] }
        } else {
            self.r_map[evicted as usize] = UNMAPPED;
            LoadAction::EvictThenLoad { evicted_vreg: evicted as u8, phys: self.physical[slot] }
        }
    }

    /// Every physical slot's store-back, for function exit: `(vreg, phys)`
    /// pairs currently resident.
    pub fn resident(&self) -> Vec<(u8, T)> {
        (0..self.physical.len())
            .filter_map(|p| {
                let v = self.phys_map[p];
                if v == UNMAPPED {
                    None
                } else {
                    Some((v as u8, self.physical[p]))
                }
            })
            .collect()
    }
}

/// Pins a physical slot on construction and un-pins it on drop,
/// guaranteeing release on every control-flow path including early
/// returns (§4.5).
pub struct TmpAlloc<'a, T: RegClass> {
    lru: &'a mut Lru<T>,
    slot: usize,
    prior_tick: i32,
}

impl<'a, T: RegClass> TmpAlloc<'a, T> {
    pub fn pin(lru: &'a mut Lru<T>, v: u8) -> TmpAlloc<'a, T> {
        let (_, _) = lru.ensure_mapped(v);
        let slot = lru.slot_of(v).expect("just mapped");
        let prior_tick = lru.use_tick[slot];
        lru.use_tick[slot] = PINNED;
        TmpAlloc { lru, slot, prior_tick }
    }

    pub fn reg(&self) -> T {
        self.lru.physical[self.slot]
    }
}

impl<'a, T: RegClass> Drop for TmpAlloc<'a, T> {
    fn drop(&mut self) {
        if self.lru.use_tick[self.slot] == PINNED {
            self.lru.use_tick[self.slot] = self.prior_tick;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use x86enc::Gpr;

    fn lru3() -> Lru<Gpr> {
        Lru::new(vec![Gpr::R10, Gpr::R11, Gpr::R13])
    }

    #[test]
    fn first_three_mappings_use_free_slots_highest_first() {
        let mut lru = lru3();
        match lru.ensure_loaded(0) {
            LoadAction::LoadOnly { phys } => assert_eq!(phys, Gpr::R13),
            _ => panic!("expected a fresh load"),
        }
    }

    #[test]
    fn fourth_mapping_evicts_least_recently_used() {
        let mut lru = lru3();
        lru.ensure_loaded(0);
        lru.ensure_loaded(1);
        lru.ensure_loaded(2);
        lru.ensure_loaded(0); // touch 0 again, so 1 becomes the LRU victim.
        match lru.ensure_loaded(3) {
            LoadAction::EvictThenLoad { evicted_vreg, .. } => assert_eq!(evicted_vreg, 1),
            _ => panic!("expected an eviction"),
        }
    }

    #[test]
    fn pinned_slots_are_never_evicted() {
        let mut lru = lru3();
        lru.pin(0, 0);
        lru.ensure_loaded(1);
        lru.ensure_loaded(2);
        match lru.ensure_loaded(3) {
            LoadAction::EvictThenLoad { evicted_vreg, .. } => assert_ne!(evicted_vreg, 0),
            LoadAction::LoadOnly { .. } => {}
            LoadAction::Hit => panic!("vreg 3 was never mapped"),
        }
    }

    #[test]
    fn tmp_alloc_restores_eviction_eligibility_on_drop() {
        let mut lru = lru3();
        lru.ensure_loaded(0);
        {
            let _tmp = TmpAlloc::pin(&mut lru, 0);
            // while pinned, vreg 0 cannot be the victim even if it is oldest.
        }
        // after drop, 0 is evictable again once it becomes the LRU entry.
        lru.ensure_loaded(1);
        lru.ensure_loaded(2);
        match lru.ensure_loaded(3) {
            LoadAction::EvictThenLoad { evicted_vreg, .. } => assert_eq!(evicted_vreg, 0),
            other => panic!("expected vreg 0 to be evicted, got a different action: {}", matches_label(&other)),
        }
    }

    fn matches_label<T: RegClass>(action: &LoadAction<T>) -> &'static str {
        match action {
            LoadAction::Hit => "hit",
            LoadAction::LoadOnly { .. } => "load_only",
            LoadAction::EvictThenLoad { .. } => "evict_then_load",
        }
    }
}
