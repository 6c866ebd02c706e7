//! Register allocation: the per-instruction scratch pools every lowering
//! uses (§4.4), and the optional full LRU virtual-register allocator for
//! configurations that keep IR registers resident across a whole
//! function body (§4.5).

pub mod scratch;
pub mod vreg;

pub use scratch::{RegClass, Scratch, ScratchPool, R_FREE_MASK, X_FREE_MASK};
pub use vreg::{Lru, LoadAction, TmpAlloc};

use x86enc::Gpr;

/// x86 convention pins for the full allocator (§4.5): virtual r0 binds to
/// `rax`, r1 to `rcx`; `rsp` and the register-file pointer (`rdi`) are
/// pinned un-assignable by never appearing in the allocator's physical
/// register list at all.
pub fn pinned_gp_allocator(physical: Vec<Gpr>) -> Lru<Gpr> {
    let mut lru = Lru::new(physical);
    lru.pin(0, 0);
    lru.pin(1, 1);
    lru
}
