//! Bit-for-bit equivalence checks between the emulator and the code
//! generator (§8). Not a general testing tool — just the one property
//! this crate's own test suite needs to check repeatedly, kept out of
//! non-test builds entirely.
#![cfg(test)]

use crate::ir::{Program, RegisterFile};
use crate::isa::Capabilities;
use crate::{emulator, jit};

/// Runs `program` under both back-ends starting from the same register
/// file and asserts every scalar and vector slot agrees afterward.
pub fn assert_equivalent(
    program: &Program,
    initial: &RegisterFile,
    caps: &Capabilities,
    strategy: jit::Strategy,
) {
    let mut emulated = *initial;
    emulator::run(program, &mut emulated);

    let compiled = jit::compile(program, caps, strategy);
    let mut jitted = *initial;
    unsafe {
        compiled.call(&mut jitted);
    }

    assert_eq!(
        emulated, jitted,
        "emulator and jit disagree:\nemulated = {:?}\njitted   = {:?}",
        emulated, jitted
    );
}
