//! Bitmask scratch-register pools (§4.4): a small set of physical
//! registers lowering may borrow for the duration of a single IR
//! instruction, reset to fully-free before every instruction begins.

use std::cell::Cell;
use std::marker::PhantomData;

use x86enc::{Gpr, Xmm};

/// Default GP scratch pool: registers the calling convention doesn't
/// assign an argument/return role to and the framer doesn't reserve for
/// virtual-register pinning — r10, r11, r13, r14.
pub const R_FREE_MASK: u16 = (1 << 10) | (1 << 11) | (1 << 13) | (1 << 14);

/// Default XMM scratch pool: xmm11, xmm12, xmm13.
pub const X_FREE_MASK: u16 = (1 << 11) | (1 << 12) | (1 << 13);

/// A register class whose physical registers can be named by a 0..=15
/// index, the common surface [`ScratchPool`] needs from [`Gpr`]/[`Xmm`].
pub trait RegClass: Copy {
    fn from_index(index: u8) -> Self;
    fn index(self) -> u8;
}

impl RegClass for Gpr {
    fn from_index(index: u8) -> Gpr {
        Gpr::from_index(index)
    }
    fn index(self) -> u8 {
        Gpr::index(self)
    }
}

impl RegClass for Xmm {
    fn from_index(index: u8) -> Xmm {
        Xmm::from_index(index)
    }
    fn index(self) -> u8 {
        Xmm::index(self)
    }
}

/// A 16-bit free-register bitmask pool. `alloc`/`release` are the manual
/// form; [`ScratchPool::acquire`] returns a scoped guard that releases on
/// drop, which is what lowering should actually use (§9 design note).
///
/// The free mask lives in a `Cell` rather than a plain field so several
/// guards can be outstanding at once: a lowering sequence routinely needs
/// two or three scratch registers live simultaneously (e.g. a zero
/// register held across a subtract), which an exclusive `&mut self`
/// borrow per guard would rule out.
pub struct ScratchPool<T: RegClass> {
    original: u16,
    free: Cell<u16>,
    _marker: PhantomData<T>,
}

impl<T: RegClass> ScratchPool<T> {
    pub fn new(mask: u16) -> ScratchPool<T> {
        ScratchPool { original: mask, free: Cell::new(mask), _marker: PhantomData }
    }

    /// Resets the pool to fully free. Called at the start of every IR
    /// instruction lowering so scratch never leaks across instructions.
    pub fn reset(&mut self) {
        self.free.set(self.original);
    }

    /// Returns the highest-indexed free register and removes it from the
    /// free set. Fatal (aborts) if the pool is exhausted: lowering is
    /// sized so at most three scratch registers are ever live at once,
    /// so exhaustion means a generator bug.
    pub fn alloc(&self) -> T {
        let free = self.free.get();
        if free == 0 {
            crate::crash!("scratch pool exhausted");
        }
        let index = 15 - free.leading_zeros() as u8;
        self.free.set(free & !(1 << index));
        T::from_index(index)
    }

    /// Re-adds `reg` to the free set, but only if it belongs to this
    /// pool's original mask — releasing a non-scratch register (an IR
    /// operand) is a silent no-op rather than an error, matching how
    /// callers pass through registers they didn't necessarily allocate
    /// from here.
    pub fn release(&self, reg: T) {
        let bit = 1u16 << reg.index();
        if self.original & bit != 0 {
            self.free.set(self.free.get() | bit);
        }
    }

    pub fn is_free(&self, reg: T) -> bool {
        self.free.get() & (1 << reg.index()) != 0
    }

    /// A scoped acquisition: releases automatically when the guard is
    /// dropped, on every exit path including early returns and panics.
    /// Takes `&self` (not `&mut self`) so multiple guards from the same
    /// pool can be alive at once.
    pub fn acquire(&self) -> ScratchGuard<'_, T> {
        let reg = self.alloc();
        ScratchGuard { pool: self, reg }
    }
}

/// RAII guard releasing its register back to the pool on drop.
pub struct ScratchGuard<'a, T: RegClass> {
    pool: &'a ScratchPool<T>,
    reg: T,
}

impl<'a, T: RegClass> ScratchGuard<'a, T> {
    pub fn reg(&self) -> T {
        self.reg
    }
}

impl<'a, T: RegClass> Drop for ScratchGuard<'a, T> {
    fn drop(&mut self) {
        self.pool.release(self.reg);
    }
}

impl<'a, T: RegClass> std::ops::Deref for ScratchGuard<'a, T> {
    type Target = T;
    fn deref(&self) -> &T {
        &self.reg
    }
}

/// The two scratch pools a single lowering call has access to.
pub struct Scratch {
    pub gp: ScratchPool<Gpr>,
    pub xmm: ScratchPool<Xmm>,
}

impl Scratch {
    pub fn new() -> Scratch {
        Scratch {
            gp: ScratchPool::new(R_FREE_MASK),
            xmm: ScratchPool::new(X_FREE_MASK),
        }
    }

    /// Called at the start of every IR instruction (§4.4's "full reset"
    /// contract).
    pub fn reset(&mut self) {
        self.gp.reset();
        self.xmm.reset();
    }
}

impl Default for Scratch {
    fn default() -> Self {
        Scratch::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_returns_the_highest_free_register_first() {
        let pool: ScratchPool<Gpr> = ScratchPool::new(R_FREE_MASK);
        let first = pool.alloc();
        assert_eq!(first, Gpr::R14);
    }

    #[test]
    fn guard_release_on_drop_makes_the_register_reusable() {
        let pool: ScratchPool<Gpr> = ScratchPool::new(R_FREE_MASK);
        {
            let guard = pool.acquire();
            assert!(!pool.is_free(guard.reg()));
        }
        assert_eq!(pool.free.get(), R_FREE_MASK);
    }

    #[test]
    fn two_guards_from_the_same_pool_can_be_live_at_once() {
        let pool: ScratchPool<Gpr> = ScratchPool::new(R_FREE_MASK);
        let a = pool.acquire();
        let b = pool.acquire();
        assert_ne!(a.reg(), b.reg());
    }

    #[test]
    fn reset_restores_the_full_pool_after_manual_allocation() {
        let mut pool: ScratchPool<Gpr> = ScratchPool::new(R_FREE_MASK);
        let _ = pool.alloc();
        let _ = pool.alloc();
        pool.reset();
        assert_eq!(pool.free.get(), R_FREE_MASK);
    }

    #[test]
    #[should_panic]
    fn exhausting_the_pool_is_fatal() {
        let pool: ScratchPool<Gpr> = ScratchPool::new(1 << 10);
        let _a = pool.alloc();
        let _b = pool.alloc(); // only one bit in the pool; this aborts.
    }
}
