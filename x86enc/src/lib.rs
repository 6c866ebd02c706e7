//! A small, from-scratch x86-64 mnemonic-level encoder.
//!
//! This crate is deliberately dumb: it knows how to turn a mnemonic and
//! its operands into bytes, how to allocate and patch labels, and how
//! the `FXSAVE64` save area is laid out. It has no opinion about IR,
//! register allocation, or calling convention beyond the handful of
//! System V AMD64 constants in [`reg`] that every caller needs anyway.

pub mod asm;
pub mod buffer;
pub mod fxsave;
pub mod modrm;
pub mod reg;

pub use asm::{AluOp, Assembler, Cond, ShiftOp};
pub use buffer::{CodeBuffer, Label};
pub use fxsave::FxsaveArea;
pub use reg::{Gpr, Width, Xmm};
