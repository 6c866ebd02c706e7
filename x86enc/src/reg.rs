//! Register classes for the x86-64 encoder.
//!
//! Mirrors the "register classes (gp8/16/32/64, xmm)" surface that the
//! code generator depends on (see the design notes in `spec.md` §4.9):
//! one small numeric register id shared by every width, plus a width
//! tag carried alongside it at the call site rather than in the type.

/// A general-purpose register, numbered the way the ModR/M and REX.B/R/X
/// fields expect (0..=15, `Rsp`/`Rbp` included).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Gpr {
    Rax = 0,
    Rcx = 1,
    Rdx = 2,
    Rbx = 3,
    Rsp = 4,
    Rbp = 5,
    Rsi = 6,
    Rdi = 7,
    R8 = 8,
    R9 = 9,
    R10 = 10,
    R11 = 11,
    R12 = 12,
    R13 = 13,
    R14 = 14,
    R15 = 15,
}

impl Gpr {
    pub const COUNT: usize = 16;

    /// Builds a register from its raw 0..=15 encoding.
    pub fn from_index(index: u8) -> Gpr {
        assert!(index < 16, "invalid gp register index {}", index);
        // Safety: the enum is `repr(u8)` and covers every value 0..=15.
        unsafe { core::mem::transmute(index) }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    /// The low 3 bits, used directly in ModR/M and opcode `+r` encodings.
    pub fn low3(self) -> u8 {
        self.index() & 0x7
    }

    /// Whether this register needs a REX prefix byte (`B`/`R`/`X`) to be
    /// addressable at all.
    pub fn needs_rex_bit(self) -> bool {
        self.index() >= 8
    }
}

/// A 128-bit XMM register, numbered 0..=15 (AVX2 only uses the low 128
/// bits here; wide YMM/ZMM forms are a non-goal).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum Xmm {
    Xmm0 = 0,
    Xmm1 = 1,
    Xmm2 = 2,
    Xmm3 = 3,
    Xmm4 = 4,
    Xmm5 = 5,
    Xmm6 = 6,
    Xmm7 = 7,
    Xmm8 = 8,
    Xmm9 = 9,
    Xmm10 = 10,
    Xmm11 = 11,
    Xmm12 = 12,
    Xmm13 = 13,
    Xmm14 = 14,
    Xmm15 = 15,
}

impl Xmm {
    pub const COUNT: usize = 16;

    pub fn from_index(index: u8) -> Xmm {
        assert!(index < 16, "invalid xmm register index {}", index);
        unsafe { core::mem::transmute(index) }
    }

    pub fn index(self) -> u8 {
        self as u8
    }

    pub fn low3(self) -> u8 {
        self.index() & 0x7
    }

    pub fn needs_rex_bit(self) -> bool {
        self.index() >= 8
    }
}

/// Operand width for general-purpose instructions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Width {
    B8,
    B16,
    B32,
    B64,
}

impl Width {
    pub fn bytes(self) -> u32 {
        match self {
            Width::B8 => 1,
            Width::B16 => 2,
            Width::B32 => 4,
            Width::B64 => 8,
        }
    }

    pub fn is_64(self) -> bool {
        matches!(self, Width::B64)
    }

    pub fn is_16(self) -> bool {
        matches!(self, Width::B16)
    }
}

/// System V AMD64 argument/return registers relevant to this crate: the
/// sole native-function argument (the register-file pointer) arrives in
/// `Rdi`; the function result (the FXSAVE area address) leaves in `Rax`.
pub const ARG0: Gpr = Gpr::Rdi;
pub const RETURN_VALUE: Gpr = Gpr::Rax;

/// Callee-saved general-purpose registers under the System V AMD64 ABI
/// (excludes `Rsp`, which is restored structurally by push/pop balance).
pub const CALLEE_SAVED_GP: &[Gpr] = &[
    Gpr::Rbx,
    Gpr::Rbp,
    Gpr::R12,
    Gpr::R13,
    Gpr::R14,
    Gpr::R15,
];
