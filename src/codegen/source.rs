//! Abstracts "where does the physical register for IR register N live
//! right now" behind one trait, so the lowering tables in [`super::scalar`]
//! and [`super::vector`] don't need to know whether the framer chose the
//! direct (§4.7) or LRU (§4.5) resident-register strategy.

use x86enc::{Assembler, Gpr, Width, Xmm};

use crate::regalloc::{LoadAction, Lru};

/// Byte offset of scalar slot `v` within the register file.
pub(crate) fn r_offset(v: u8) -> i32 {
    v as i32 * 8
}

/// Byte offset of vector slot `v` within the register file, past the 16
/// scalar slots (§6 register-file layout).
pub fn v_offset(v: u8) -> i32 {
    128 + v as i32 * 16
}

/// Where a lowering reads/writes the physical register currently holding
/// IR register `v`. Both implementations guarantee the returned register
/// holds `v`'s up-to-date value and that writes to it are visible at
/// function exit (via the framer's store phase, or via eviction).
pub trait RegisterSource {
    fn gp(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Gpr;
    fn xmm(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Xmm;

    /// Like `gp`/`xmm`, but for a pure destination about to be
    /// overwritten in full: skips the load where the strategy can avoid
    /// it (the LRU source still needs to evict someone else out of the
    /// slot; the fixed source has nothing to do either way).
    fn gp_dest(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Gpr {
        self.gp(asm, rfp, v)
    }
    fn xmm_dest(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Xmm {
        self.xmm(asm, rfp, v)
    }
}

/// The direct strategy (§4.7): every virtual register the program
/// touches was loaded into one fixed physical register at function
/// entry and is stored back at exit. Lowering just indexes a table; no
/// code is emitted here at all.
pub struct FixedSource {
    gp: [Option<Gpr>; 16],
    xmm: [Option<Xmm>; 16],
}

impl FixedSource {
    pub fn new(gp: [Option<Gpr>; 16], xmm: [Option<Xmm>; 16]) -> FixedSource {
        FixedSource { gp, xmm }
    }
}

impl RegisterSource for FixedSource {
    fn gp(&mut self, _asm: &mut Assembler, _rfp: Gpr, v: u8) -> Gpr {
        self.gp[v as usize].unwrap_or_else(|| crate::crash!("virtual register r{} was not bound to a physical register", v))
    }

    fn xmm(&mut self, _asm: &mut Assembler, _rfp: Gpr, v: u8) -> Xmm {
        self.xmm[v as usize].unwrap_or_else(|| crate::crash!("virtual register v{} was not bound to a physical register", v))
    }
}

/// The LRU strategy (§4.5): virtual registers are paged in and out of a
/// smaller physical pool as the body runs, spilling through the register
/// file in memory on eviction.
pub struct LruSource {
    gp: Lru<Gpr>,
    xmm: Lru<Xmm>,
}

impl LruSource {
    pub fn new(gp: Lru<Gpr>, xmm: Lru<Xmm>) -> LruSource {
        LruSource { gp, xmm }
    }

    /// Stores every still-resident virtual register back to the register
    /// file; called once at function exit.
    pub fn flush(&mut self, asm: &mut Assembler, rfp: Gpr) {
        for (v, phys) in self.gp.resident() {
            asm.store(Width::B64, rfp, r_offset(v), phys);
        }
        for (v, phys) in self.xmm.resident() {
            asm.movdqa_store(rfp, v_offset(v), phys);
        }
    }
}

impl RegisterSource for LruSource {
    fn gp(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Gpr {
        match self.gp.ensure_loaded(v) {
            LoadAction::Hit => self.gp.physical_reg(self.gp.slot_of(v).unwrap()),
            LoadAction::LoadOnly { phys } => {
                asm.load(Width::B64, phys, rfp, r_offset(v));
                phys
            }
            LoadAction::EvictThenLoad { evicted_vreg, phys } => {
                asm.store(Width::B64, rfp, r_offset(evicted_vreg), phys);
                asm.load(Width::B64, phys, rfp, r_offset(v));
                phys
            }
        }
    }

    fn xmm(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Xmm {
        match self.xmm.ensure_loaded(v) {
            LoadAction::Hit => self.xmm.physical_reg(self.xmm.slot_of(v).unwrap()),
            LoadAction::LoadOnly { phys } => {
                asm.movdqa_load(phys, rfp, v_offset(v));
                phys
            }
            LoadAction::EvictThenLoad { evicted_vreg, phys } => {
                asm.movdqa_store(rfp, v_offset(evicted_vreg), phys);
                asm.movdqa_load(phys, rfp, v_offset(v));
                phys
            }
        }
    }

    fn gp_dest(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Gpr {
        let (phys, evicted) = self.gp.ensure_mapped(v);
        if let Some(evicted_vreg) = evicted {
            asm.store(Width::B64, rfp, r_offset(evicted_vreg), phys);
        }
        phys
    }

    fn xmm_dest(&mut self, asm: &mut Assembler, rfp: Gpr, v: u8) -> Xmm {
        let (phys, evicted) = self.xmm.ensure_mapped(v);
        if let Some(evicted_vreg) = evicted {
            asm.movdqa_store(rfp, v_offset(evicted_vreg), phys);
        }
        phys
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn offsets_match_the_documented_register_file_layout() {
        assert_eq!(r_offset(0), 0);
        assert_eq!(r_offset(15), 120);
        assert_eq!(v_offset(0), 128);
        assert_eq!(v_offset(15), 128 + 15 * 16);
    }
}
