//! A typed, vector-aware JIT code generator for a fixed-width IR,
//! targeting x86-64: an [`ir`] instruction model, a bit-for-bit
//! reference [`emulator`], a capability-gated [`isa`] profile, the
//! [`regalloc`]/[`codegen`] lowering pipeline, the [`jit`] function
//! framer, and a textual [`asm`] front-end.

pub mod error;

pub mod asm;
pub mod codegen;
#[cfg(test)]
pub(crate) mod compare;
pub mod emulator;
pub mod ir;
pub mod isa;
pub mod jit;
pub mod regalloc;
pub mod util;

pub use error::Error;
