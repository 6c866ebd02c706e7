//! Mnemonic-level assembler: one method per instruction shape the code
//! generator needs. This is the "black box x86 encoder" that `spec.md`
//! §1/§4.9 treats as an external dependency; `vrjit`'s codegen module
//! never emits raw bytes itself, only calls through here.

use crate::buffer::{CodeBuffer, Label};
use crate::modrm::{self, ESC_0F, ESC_0F38, PFX_66, PFX_F2, PFX_F3, REX_W};
use crate::reg::{Gpr, Width, Xmm};

/// A condition code for `Jcc`, shared between signed and unsigned
/// integer comparisons (spec §4.6 "signed vs unsigned selects between
/// `JL/JLE/JG/JGE` and `JB/JBE/JA/JAE`") and the floating-point
/// `COMISS`/`COMISD` scheme (which always uses the unsigned mnemonics,
/// since the FPU comparison sets the same flags as an unsigned compare).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Cond {
    Eq,
    Ne,
    /// Signed less-than / unsigned below, selected by `signed`.
    Lt { signed: bool },
    Le { signed: bool },
    Gt { signed: bool },
    Ge { signed: bool },
    /// Raw zero/not-zero test on the flags register, used by `JZ`/`JNZ`.
    Zero,
    NotZero,
    /// `PF` set/clear — `COMISS`/`COMISD` raise this alongside `ZF`/`CF`
    /// exactly when an operand is NaN, so float lowering branches on it
    /// to give unordered comparisons their IEEE 754 outcome.
    Parity,
    NotParity,
}

fn jcc_tttn(cond: Cond) -> u8 {
    match cond {
        Cond::Eq | Cond::Zero => 0x4,
        Cond::Ne | Cond::NotZero => 0x5,
        Cond::Lt { signed: true } => 0xC,
        Cond::Lt { signed: false } => 0x2,
        Cond::Le { signed: true } => 0xE,
        Cond::Le { signed: false } => 0x6,
        Cond::Gt { signed: true } => 0xF,
        Cond::Gt { signed: false } => 0x7,
        Cond::Ge { signed: true } => 0xD,
        Cond::Ge { signed: false } => 0x3,
        Cond::Parity => 0xA,
        Cond::NotParity => 0xB,
    }
}

fn width_flag(width: Width) -> u32 {
    if width.is_64() {
        REX_W
    } else {
        0
    }
}

/// A group-1 ALU operation (`opc /digit`), shared by the register, immediate
/// and memory forms of `ADD`/`SUB`/`AND`/`OR`/`XOR`/`CMP`.
#[derive(Debug, Clone, Copy)]
pub enum AluOp {
    Add,
    Or,
    And,
    Sub,
    Xor,
    Cmp,
}

impl AluOp {
    fn digit(self) -> u8 {
        match self {
            AluOp::Add => 0,
            AluOp::Or => 1,
            AluOp::And => 4,
            AluOp::Sub => 5,
            AluOp::Xor => 6,
            AluOp::Cmp => 7,
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub enum ShiftOp {
    Shl,
    Shr,
    Sar,
}

impl ShiftOp {
    fn digit(self) -> u8 {
        match self {
            ShiftOp::Shl => 4,
            ShiftOp::Shr => 5,
            ShiftOp::Sar => 7,
        }
    }
}

/// Thin wrapper around [`CodeBuffer`] exposing one method per x86-64
/// instruction the lowering tables use.
pub struct Assembler {
    buf: CodeBuffer,
}

impl Assembler {
    pub fn new() -> Assembler {
        Assembler { buf: CodeBuffer::new() }
    }

    pub fn buffer(&self) -> &CodeBuffer {
        &self.buf
    }

    pub fn buffer_mut(&mut self) -> &mut CodeBuffer {
        &mut self.buf
    }

    pub fn offset(&self) -> u32 {
        self.buf.offset()
    }

    pub fn new_label(&mut self) -> Label {
        self.buf.new_label()
    }

    pub fn bind_label(&mut self, label: Label) {
        self.buf.bind_label(label)
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.buf.into_bytes()
    }

    // ---- data movement -------------------------------------------------

    pub fn mov_rr(&mut self, width: Width, dst: Gpr, src: Gpr) {
        if dst == src {
            return; // move economy: eliminate `mov r, r`.
        }
        if width.is_16() {
            self.buf.emit_u8(0x66);
        }
        modrm::emit_rr(&mut self.buf, 0x89 | width_flag(width), src.index(), dst.index());
    }

    /// Loads a sign-extended 32-bit immediate, or a full `movabs` for
    /// 64-bit values that do not fit in 32 bits.
    pub fn mov_ri(&mut self, width: Width, dst: Gpr, imm: i64) {
        if width.is_64() && (imm < i32::MIN as i64 || imm > i32::MAX as i64) {
            self.buf.emit_u8(0x48 | if dst.needs_rex_bit() { 0x01 } else { 0 });
            self.buf.emit_u8(0xB8 + dst.low3());
            self.buf.emit_u64(imm as u64);
            return;
        }
        modrm::emit_rr_ext(&mut self.buf, 0xC7 | width_flag(width), 0, dst.index());
        match width {
            Width::B8 => self.buf.emit_u8(imm as u8),
            Width::B16 => {
                self.buf.emit_u8(imm as u8);
                self.buf.emit_u8((imm >> 8) as u8);
            }
            Width::B32 | Width::B64 => self.buf.emit_u32(imm as u32),
        }
    }

    pub fn load(&mut self, width: Width, dst: Gpr, base: Gpr, disp: i32) {
        modrm::emit_rm(&mut self.buf, 0x8B | width_flag(width), dst.index(), base.index(), disp);
    }

    pub fn store(&mut self, width: Width, base: Gpr, disp: i32, src: Gpr) {
        modrm::emit_rm(&mut self.buf, 0x89 | width_flag(width), src.index(), base.index(), disp);
    }

    /// Zero-extending load of a narrower width into a 32/64-bit register.
    pub fn movzx(&mut self, dst: Gpr, dst_width: Width, src: Gpr, src_width: Width) {
        let opc = match src_width {
            Width::B8 => 0xB6 | ESC_0F,
            Width::B16 => 0xB7 | ESC_0F,
            _ => unreachable!("movzx source must be 8 or 16 bits"),
        };
        modrm::emit_rr(&mut self.buf, opc | width_flag(dst_width), dst.index(), src.index());
    }

    pub fn movsx(&mut self, dst: Gpr, dst_width: Width, src: Gpr, src_width: Width) {
        let opc = match src_width {
            Width::B8 => 0xBE | ESC_0F,
            Width::B16 => 0xBF | ESC_0F,
            Width::B32 => 0x63,
            _ => unreachable!("movsx source must be 8, 16 or 32 bits"),
        };
        modrm::emit_rr(&mut self.buf, opc | width_flag(dst_width), dst.index(), src.index());
    }

    // ---- integer ALU -----------------------------------------------------

    pub fn alu_rr(&mut self, op: AluOp, width: Width, dst: Gpr, src: Gpr) {
        let opc = 0x01 | ((op.digit() as u32) << 3) | width_flag(width);
        modrm::emit_rr(&mut self.buf, opc, src.index(), dst.index());
    }

    pub fn alu_ri(&mut self, op: AluOp, width: Width, dst: Gpr, imm: i32) {
        if (-128..=127).contains(&imm) {
            modrm::emit_rr_ext(&mut self.buf, 0x83 | width_flag(width), op.digit(), dst.index());
            self.buf.emit_u8(imm as i8 as u8);
        } else {
            modrm::emit_rr_ext(&mut self.buf, 0x81 | width_flag(width), op.digit(), dst.index());
            self.buf.emit_u32(imm as u32);
        }
    }

    pub fn neg(&mut self, width: Width, reg: Gpr) {
        modrm::emit_rr_ext(&mut self.buf, 0xF7 | width_flag(width), 3, reg.index());
    }

    pub fn not(&mut self, width: Width, reg: Gpr) {
        modrm::emit_rr_ext(&mut self.buf, 0xF7 | width_flag(width), 2, reg.index());
    }

    /// Two-operand signed multiply: `dst *= src`.
    pub fn imul_rr(&mut self, width: Width, dst: Gpr, src: Gpr) {
        modrm::emit_rr(&mut self.buf, 0xAF | ESC_0F | width_flag(width), dst.index(), src.index());
    }

    pub fn shift_ri(&mut self, op: ShiftOp, width: Width, dst: Gpr, count: u8) {
        if count == 1 {
            modrm::emit_rr_ext(&mut self.buf, 0xD1 | width_flag(width), op.digit(), dst.index());
        } else {
            modrm::emit_rr_ext(&mut self.buf, 0xC1 | width_flag(width), op.digit(), dst.index());
            self.buf.emit_u8(count);
        }
    }

    /// Shift by `CL`; `dst` must not be `Rcx`, the caller is responsible
    /// for saving/restoring `RCX` around this (spec §4.6 "shift by register").
    pub fn shift_cl(&mut self, op: ShiftOp, width: Width, dst: Gpr) {
        modrm::emit_rr_ext(&mut self.buf, 0xD3 | width_flag(width), op.digit(), dst.index());
    }

    pub fn cmp_rr(&mut self, width: Width, a: Gpr, b: Gpr) {
        self.alu_rr(AluOp::Cmp, width, a, b);
    }

    // ---- control flow ------------------------------------------------

    pub fn jmp(&mut self, target: Label) {
        self.buf.emit_u8(0xE9);
        self.buf.emit_rel32_fixup(target);
    }

    pub fn jcc(&mut self, cond: Cond, target: Label) {
        self.buf.emit_u8(0x0F);
        self.buf.emit_u8(0x80 | jcc_tttn(cond));
        self.buf.emit_rel32_fixup(target);
    }

    pub fn ret(&mut self) {
        self.buf.emit_u8(0xC3);
    }

    pub fn push(&mut self, reg: Gpr) {
        if reg.needs_rex_bit() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x50 + reg.low3());
    }

    pub fn pop(&mut self, reg: Gpr) {
        if reg.needs_rex_bit() {
            self.buf.emit_u8(0x41);
        }
        self.buf.emit_u8(0x58 + reg.low3());
    }

    pub fn nop(&mut self) {
        self.buf.emit_u8(0x90);
    }

    /// Loads the absolute address of `label` into `dst` via a
    /// RIP-relative `LEA`, the shape `lea dst, [rip+disp]` requires.
    pub fn lea_label(&mut self, dst: Gpr, label: Label) {
        modrm::emit_rip_rel(&mut self.buf, 0x8D | REX_W, dst.index());
        self.buf.emit_rel32_fixup(label);
    }

    // ---- SSE2 / AVX vector ops -----------------------------------------

    pub fn movdqa_rr(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x6F | ESC_0F | PFX_66, dst.index(), src.index());
    }

    pub fn movdqa_load(&mut self, dst: Xmm, base: Gpr, disp: i32) {
        modrm::emit_rm(&mut self.buf, 0x6F | ESC_0F | PFX_66, dst.index(), base.index(), disp);
    }

    pub fn movdqa_store(&mut self, base: Gpr, disp: i32, src: Xmm) {
        modrm::emit_rm(&mut self.buf, 0x7F | ESC_0F | PFX_66, src.index(), base.index(), disp);
    }

    /// `MOVD`/`MOVQ xmm, r/m{32,64}` (GP -> low lane of XMM).
    pub fn movd_to_xmm(&mut self, dst: Xmm, src: Gpr, width64: bool) {
        let rexw = if width64 { REX_W } else { 0 };
        modrm::emit_rr(&mut self.buf, 0x6E | ESC_0F | PFX_66 | rexw, dst.index(), src.index());
    }

    /// `MOVD`/`MOVQ r/m{32,64}, xmm` (low lane of XMM -> GP).
    pub fn movd_from_xmm(&mut self, dst: Gpr, src: Xmm, width64: bool) {
        let rexw = if width64 { REX_W } else { 0 };
        modrm::emit_rr(&mut self.buf, 0x7E | ESC_0F | PFX_66 | rexw, src.index(), dst.index());
    }

    /// `MOVQ xmm, xmm` (low-64-bit move, used to thread a shift count
    /// through an XMM scratch register).
    pub fn movq_xmm_xmm(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x7E | ESC_0F | PFX_F3, dst.index(), src.index());
    }

    fn vec_op_rr(&mut self, opc: u32, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, opc | ESC_0F | PFX_66, dst.index(), src.index());
    }

    pub fn paddb(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xFC, dst, src)
    }
    pub fn paddw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xFD, dst, src)
    }
    pub fn paddd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xFE, dst, src)
    }
    pub fn paddq(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xD4, dst, src)
    }
    pub fn psubb(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xF8, dst, src)
    }
    pub fn psubw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xF9, dst, src)
    }
    pub fn psubd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xFA, dst, src)
    }
    pub fn psubq(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xFB, dst, src)
    }
    pub fn pmullw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xD5, dst, src)
    }
    /// SSE4.1. Callers must have checked `use_sse4_1()` (or fall back to
    /// the scalar path) before reaching here.
    pub fn pmulld(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x40 | ESC_0F38 | PFX_66, dst.index(), src.index());
    }
    pub fn pmuludq(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xF4, dst, src)
    }
    pub fn pand(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xDB, dst, src)
    }
    pub fn pandn(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xDF, dst, src)
    }
    pub fn por(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xEB, dst, src)
    }
    pub fn pxor(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0xEF, dst, src)
    }
    pub fn pcmpgtb(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x64, dst, src)
    }
    pub fn pcmpgtw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x65, dst, src)
    }
    pub fn pcmpgtd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x66, dst, src)
    }
    /// SSE4.2 (spec §9 open question: emitted unconditionally by the
    /// source this crate is modeled after; here it is gated by
    /// `isa::Capabilities::use_sse4_2`, see `codegen::vector`).
    pub fn pcmpgtq(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x37 | ESC_0F38 | PFX_66, dst.index(), src.index());
    }
    pub fn pcmpeqb(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x74, dst, src)
    }
    pub fn pcmpeqw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x75, dst, src)
    }
    pub fn pcmpeqd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x76, dst, src)
    }
    pub fn punpcklbw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x60, dst, src)
    }
    pub fn punpcklwd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x61, dst, src)
    }
    pub fn punpckldq(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x62, dst, src)
    }
    pub fn punpcklqdq(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x6C, dst, src)
    }
    pub fn punpckhbw(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x68, dst, src)
    }
    pub fn punpckhwd(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x69, dst, src)
    }

    pub fn pshufd(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        modrm::emit_rr(&mut self.buf, 0x70 | ESC_0F | PFX_66, dst.index(), src.index());
        self.buf.emit_u8(imm8);
    }

    pub fn packuswb(&mut self, dst: Xmm, src: Xmm) {
        self.vec_op_rr(0x67, dst, src)
    }

    fn vec_shift_imm(&mut self, group_opc: u32, digit: u8, dst: Xmm, imm8: u8) {
        modrm::emit_rr_ext(&mut self.buf, group_opc | ESC_0F | PFX_66, digit, dst.index());
        self.buf.emit_u8(imm8);
    }

    pub fn psllw_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x71, 6, dst, imm8)
    }
    pub fn pslld_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x72, 6, dst, imm8)
    }
    pub fn psllq_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x73, 6, dst, imm8)
    }
    pub fn psrlw_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x71, 2, dst, imm8)
    }
    pub fn psrld_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x72, 2, dst, imm8)
    }
    pub fn psrlq_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x73, 2, dst, imm8)
    }
    pub fn psraw_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x71, 4, dst, imm8)
    }
    pub fn psrad_i(&mut self, dst: Xmm, imm8: u8) {
        self.vec_shift_imm(0x72, 4, dst, imm8)
    }

    pub fn psllw(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xF1, dst, count)
    }
    pub fn pslld(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xF2, dst, count)
    }
    pub fn psllq(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xF3, dst, count)
    }
    pub fn psrlw(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xD1, dst, count)
    }
    pub fn psrld(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xD2, dst, count)
    }
    pub fn psrlq(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xD3, dst, count)
    }
    pub fn psraw(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xE1, dst, count)
    }
    pub fn psrad(&mut self, dst: Xmm, count: Xmm) {
        self.vec_op_rr(0xE2, dst, count)
    }

    // ---- scalar/packed float ----------------------------------------

    pub fn andps(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x54 | ESC_0F, dst.index(), src.index());
    }
    pub fn andpd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x54 | ESC_0F | PFX_66, dst.index(), src.index());
    }
    pub fn orps(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x56 | ESC_0F, dst.index(), src.index());
    }
    pub fn orpd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x56 | ESC_0F | PFX_66, dst.index(), src.index());
    }
    pub fn xorps(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x57 | ESC_0F, dst.index(), src.index());
    }
    pub fn xorpd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x57 | ESC_0F | PFX_66, dst.index(), src.index());
    }

    pub fn addss(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x58 | ESC_0F | PFX_F3, dst.index(), src.index());
    }
    pub fn addsd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x58 | ESC_0F | PFX_F2, dst.index(), src.index());
    }
    pub fn subss(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x5C | ESC_0F | PFX_F3, dst.index(), src.index());
    }
    pub fn subsd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x5C | ESC_0F | PFX_F2, dst.index(), src.index());
    }
    pub fn mulss(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x59 | ESC_0F | PFX_F3, dst.index(), src.index());
    }
    pub fn mulsd(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x59 | ESC_0F | PFX_F2, dst.index(), src.index());
    }

    pub fn comiss(&mut self, a: Xmm, b: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x2F | ESC_0F, a.index(), b.index());
    }
    pub fn comisd(&mut self, a: Xmm, b: Xmm) {
        modrm::emit_rr(&mut self.buf, 0x2F | ESC_0F | PFX_66, a.index(), b.index());
    }

    pub fn cvtsi2ss(&mut self, dst: Xmm, src: Gpr, src64: bool) {
        let rexw = if src64 { REX_W } else { 0 };
        modrm::emit_rr(&mut self.buf, 0x2A | ESC_0F | PFX_F3 | rexw, dst.index(), src.index());
    }
    pub fn cvtsi2sd(&mut self, dst: Xmm, src: Gpr, src64: bool) {
        let rexw = if src64 { REX_W } else { 0 };
        modrm::emit_rr(&mut self.buf, 0x2A | ESC_0F | PFX_F2 | rexw, dst.index(), src.index());
    }

    // ---- AVX (VEX-encoded, NDS three-operand forms) -------------------

    pub fn vpaddb(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xFC, dst, a, b)
    }
    pub fn vpaddw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xFD, dst, a, b)
    }
    pub fn vpaddd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xFE, dst, a, b)
    }
    pub fn vpaddq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xD4, dst, a, b)
    }
    pub fn vpsubb(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xF8, dst, a, b)
    }
    pub fn vpsubw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xF9, dst, a, b)
    }
    pub fn vpsubd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xFA, dst, a, b)
    }
    pub fn vpsubq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xFB, dst, a, b)
    }
    pub fn vpmullw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xD5, dst, a, b)
    }
    pub fn vpmulld(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 2, 1, false, 0x40, dst.index(), a.index(), b.index());
    }
    pub fn vpmuludq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xF4, dst, a, b)
    }
    pub fn vpand(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xDB, dst, a, b)
    }
    pub fn vpandn(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xDF, dst, a, b)
    }
    pub fn vpor(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xEB, dst, a, b)
    }
    pub fn vpxor(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0xEF, dst, a, b)
    }
    pub fn vpcmpgtb(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x64, dst, a, b)
    }
    pub fn vpcmpgtw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x65, dst, a, b)
    }
    pub fn vpcmpgtd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x66, dst, a, b)
    }
    pub fn vpcmpgtq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 2, 1, false, 0x37, dst.index(), a.index(), b.index());
    }
    pub fn vpcmpeqb(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x74, dst, a, b)
    }
    pub fn vpcmpeqw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x75, dst, a, b)
    }
    pub fn vpcmpeqd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x76, dst, a, b)
    }
    pub fn vpunpcklbw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x60, dst, a, b)
    }
    pub fn vpunpcklwd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x61, dst, a, b)
    }
    pub fn vpunpckldq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x62, dst, a, b)
    }
    pub fn vpunpcklqdq(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x6C, dst, a, b)
    }
    pub fn vpunpckhbw(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x68, dst, a, b)
    }
    pub fn vpunpckhwd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x69, dst, a, b)
    }
    pub fn vpackuswb(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        self.vex3(0x67, dst, a, b)
    }

    pub fn vpshufd(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, 0x70, dst.index(), 0, src.index());
        self.buf.emit_u8(imm8);
    }

    pub fn vmovdqa(&mut self, dst: Xmm, src: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, 0x6F, dst.index(), 0, src.index());
    }

    fn vex_shift_imm(&mut self, opc_byte: u8, digit: u8, dst: Xmm, src: Xmm, imm8: u8) {
        modrm::emit_vex_rr_ext(&mut self.buf, 1, 1, opc_byte, digit, dst.index(), src.index());
        self.buf.emit_u8(imm8);
    }

    pub fn vpsllw_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x71, 6, dst, src, imm8)
    }
    pub fn vpslld_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x72, 6, dst, src, imm8)
    }
    pub fn vpsllq_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x73, 6, dst, src, imm8)
    }
    pub fn vpsrlw_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x71, 2, dst, src, imm8)
    }
    pub fn vpsrld_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x72, 2, dst, src, imm8)
    }
    pub fn vpsrlq_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x73, 2, dst, src, imm8)
    }
    pub fn vpsraw_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x71, 4, dst, src, imm8)
    }
    pub fn vpsrad_i(&mut self, dst: Xmm, src: Xmm, imm8: u8) {
        self.vex_shift_imm(0x72, 4, dst, src, imm8)
    }

    pub fn vpsllw(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xF1, dst, a, count)
    }
    pub fn vpslld(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xF2, dst, a, count)
    }
    pub fn vpsllq(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xF3, dst, a, count)
    }
    pub fn vpsrlw(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xD1, dst, a, count)
    }
    pub fn vpsrld(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xD2, dst, a, count)
    }
    pub fn vpsrlq(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xD3, dst, a, count)
    }
    pub fn vpsraw(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xE1, dst, a, count)
    }
    pub fn vpsrad(&mut self, dst: Xmm, a: Xmm, count: Xmm) {
        self.vex3(0xE2, dst, a, count)
    }

    pub fn vandps(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 0, false, 0x54, dst.index(), a.index(), b.index());
    }
    pub fn vandpd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, 0x54, dst.index(), a.index(), b.index());
    }
    pub fn vorps(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 0, false, 0x56, dst.index(), a.index(), b.index());
    }
    pub fn vorpd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, 0x56, dst.index(), a.index(), b.index());
    }
    pub fn vxorps(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 0, false, 0x57, dst.index(), a.index(), b.index());
    }
    pub fn vxorpd(&mut self, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, 0x57, dst.index(), a.index(), b.index());
    }

    fn vex3(&mut self, opc_byte: u8, dst: Xmm, a: Xmm, b: Xmm) {
        modrm::emit_vex_rr(&mut self.buf, 1, 1, false, opc_byte, dst.index(), a.index(), b.index());
    }

    // ---- FXSAVE --------------------------------------------------------

    /// `FXSAVE64 [rip+disp]`, dumping the x87/MMX/SSE state to the
    /// embedded save area referenced by `area`.
    pub fn fxsave64(&mut self, area: Label) {
        modrm::emit_rip_rel(&mut self.buf, 0xAE | ESC_0F | REX_W, 0);
        self.buf.emit_rel32_fixup(area);
    }
}

impl Default for Assembler {
    fn default() -> Self {
        Assembler::new()
    }
}
